//! Engine configuration.

use crate::error::EngineResult;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Tunables for the engine. Every field has a default, so partial JSON works.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub min_zoom: f64,
    pub max_zoom: f64,
    /// Maximum number of history entries kept (including the initial one).
    pub history_cap: usize,
    /// Maximum number of live shapes; the bottom-most shape is evicted beyond it.
    pub max_shapes: usize,
    /// Spatial grid cell size in world units.
    pub grid_cell_size: f64,
    /// Padding applied to shape bounds before registering in the grid (world units).
    pub grid_padding: f64,
    /// Eraser radius in screen pixels.
    pub eraser_radius: f64,
    /// Minimum screen distance between accepted live freehand samples.
    pub min_point_distance: f64,
    /// Simplification tolerance on freehand commit, in screen pixels.
    pub simplify_tolerance: f64,
    /// Strokes with fewer points are discarded instead of committed.
    pub min_stroke_points: usize,
    /// Hit-test tolerance for selection, in screen pixels.
    pub hit_tolerance: f64,
    /// Terminal pan velocity (px/ms) above which inertia kicks in.
    pub inertia_threshold: f64,
    /// Velocity multiplier per 16.67 ms frame during inertial pan.
    pub inertia_decay: f64,
    /// Velocity (px/ms) below which inertial pan stops.
    pub inertia_cutoff: f64,
    pub caret_blink_ms: f64,
    pub laser_fade_ms: f64,
    pub remote_cursor_stale_ms: f64,
    pub remote_cursor_sweep_ms: f64,
    /// Maximum outbound collaboration flushes per second.
    pub outbound_rate: f64,
    pub double_click_ms: f64,
    pub double_click_distance: f64,
    pub stamp_scale_snap: f64,
    pub stamp_rotate_snap_deg: f64,
    /// When set, batched updates run on a fixed timer instead of every display refresh.
    pub frame_interval_ms: Option<f64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_zoom: 0.1,
            max_zoom: 10.0,
            history_cap: 100,
            max_shapes: 10_000,
            grid_cell_size: 0.05,
            grid_padding: 0.01,
            eraser_radius: 12.0,
            min_point_distance: 2.0,
            simplify_tolerance: 0.75,
            min_stroke_points: 2,
            hit_tolerance: 6.0,
            inertia_threshold: 0.3,
            inertia_decay: 0.92,
            inertia_cutoff: 0.02,
            caret_blink_ms: 530.0,
            laser_fade_ms: 900.0,
            remote_cursor_stale_ms: 5_000.0,
            remote_cursor_sweep_ms: 1_000.0,
            outbound_rate: 60.0,
            double_click_ms: 500.0,
            double_click_distance: 5.0,
            stamp_scale_snap: 0.25,
            stamp_rotate_snap_deg: 15.0,
            frame_interval_ms: None,
        }
    }
}

impl EngineConfig {
    /// Parse a configuration from JSON.
    pub fn from_json(json: &str) -> EngineResult<Self> {
        let config = serde_json::from_str(json)?;
        Ok(config)
    }

    /// Load a configuration file.
    pub fn load(path: impl AsRef<Path>) -> EngineResult<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_json(&text)?;
        log::debug!("Loaded engine config from {}", path.as_ref().display());
        Ok(config)
    }

    /// Minimum interval between outbound flushes.
    pub fn outbound_interval_ms(&self) -> f64 {
        if self.outbound_rate > 0.0 {
            1000.0 / self.outbound_rate
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = EngineConfig::from_json(r#"{"history_cap": 7, "eraser_radius": 20.0}"#).unwrap();
        assert_eq!(config.history_cap, 7);
        assert!((config.eraser_radius - 20.0).abs() < f64::EPSILON);
        assert_eq!(config.max_shapes, 10_000);
        assert!((config.grid_cell_size - 0.05).abs() < f64::EPSILON);
    }

    #[test]
    fn test_invalid_json_is_error() {
        assert!(EngineConfig::from_json("{ not json").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"caret_blink_ms": 400.0}}"#).unwrap();
        let config = EngineConfig::load(file.path()).unwrap();
        assert!((config.caret_blink_ms - 400.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_outbound_interval() {
        let config = EngineConfig::default();
        assert!((config.outbound_interval_ms() - 1000.0 / 60.0).abs() < 1e-9);
    }
}
