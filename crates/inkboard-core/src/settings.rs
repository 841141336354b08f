//! Tool chrome settings: the fields an external toolbar reads and writes.

use crate::shapes::{FontDescriptor, Paint, SerializableColor};
use crate::tools::ToolKind;
use serde::{Deserialize, Serialize};

/// Current tool and style choices. Never holds shape data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ToolSettings {
    pub tool: ToolKind,
    #[serde(alias = "stroke")]
    pub color: SerializableColor,
    /// End color; when set, strokes get a linear gradient from `color`.
    pub gradient: Option<SerializableColor>,
    pub fill: Option<SerializableColor>,
    /// Stroke size in screen pixels.
    pub size: f64,
    pub opacity: f64,
    pub font: FontDescriptor,
    pub stamp_glyph: String,
    /// Stamp edge length in screen pixels.
    pub stamp_size: f64,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            tool: ToolKind::default(),
            color: SerializableColor::black(),
            gradient: None,
            fill: None,
            size: 3.0,
            opacity: 1.0,
            font: FontDescriptor::default(),
            stamp_glyph: "\u{2B50}".to_string(),
            stamp_size: 48.0,
        }
    }
}

impl ToolSettings {
    /// Stroke paint derived from color and optional gradient end.
    pub fn paint(&self) -> Paint {
        match self.gradient {
            Some(to) => Paint::LinearGradient { from: self.color, to },
            None => Paint::Solid(self.color),
        }
    }
}
