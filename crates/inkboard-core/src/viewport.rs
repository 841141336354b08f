//! Viewport module: pan/zoom state and coordinate-space conversions.
//!
//! Three spaces are in play:
//! - **screen**: logical pixels relative to the drawing surface's top-left,
//! - **world**: normalized content coordinates, `(0,0)..(1,1)` covers the
//!   surface at zoom 1 and zero pan,
//! - **device**: screen space multiplied by the device pixel ratio.
//!
//! The device pixel ratio is only ever applied in [`Viewport::device_mapping`].

use kurbo::{Affine, Point, Size, Vec2};
use serde::{Deserialize, Serialize};

/// Default lower zoom bound.
pub const DEFAULT_MIN_ZOOM: f64 = 0.1;
/// Default upper zoom bound.
pub const DEFAULT_MAX_ZOOM: f64 = 10.0;

fn default_min_zoom() -> f64 {
    DEFAULT_MIN_ZOOM
}

fn default_max_zoom() -> f64 {
    DEFAULT_MAX_ZOOM
}

fn default_dpr() -> f64 {
    1.0
}

/// Viewport record: pan, zoom and the surface dimensions supplied by the host.
///
/// `pan_x`/`pan_y` are expressed as fractions of the surface width/height.
/// `width`/`height` are always logical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Viewport {
    #[serde(default)]
    pub pan_x: f64,
    #[serde(default)]
    pub pan_y: f64,
    /// Zoom factor; older documents call this `scale`.
    #[serde(alias = "scale")]
    pub zoom: f64,
    #[serde(default = "default_dpr")]
    pub dpr: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default = "default_min_zoom")]
    pub min_zoom: f64,
    #[serde(default = "default_max_zoom")]
    pub max_zoom: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(1000.0, 1000.0, 1.0)
    }
}

/// World-to-device mapping handed to the renderer.
///
/// Built exclusively by [`Viewport::device_mapping`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviceMapping {
    /// World → device transform (`scale = zoom·dim·dpr`, `translate = pan·dim·dpr`).
    pub transform: Affine,
    /// Device pixels per logical pixel at zoom 1 (`zoom·dpr`), for stroke widths and glyph sizes.
    pub px_scale: f64,
    /// Device pixels per screen pixel, for overlays sized in screen pixels.
    pub screen_scale: f64,
    /// Logical surface size.
    pub surface: Size,
    /// Backing buffer size in device pixels.
    pub device_width: u32,
    pub device_height: u32,
}

impl DeviceMapping {
    /// Map a screen-space point into device space.
    pub fn screen_to_device(&self, p: Point) -> Point {
        Point::new(p.x * self.screen_scale, p.y * self.screen_scale)
    }
}

impl Viewport {
    /// Create a viewport at zoom 1 with no pan.
    pub fn new(width: f64, height: f64, dpr: f64) -> Self {
        Self {
            pan_x: 0.0,
            pan_y: 0.0,
            zoom: 1.0,
            dpr,
            width,
            height,
            min_zoom: DEFAULT_MIN_ZOOM,
            max_zoom: DEFAULT_MAX_ZOOM,
        }
    }

    /// Set the zoom bounds and re-clamp the current zoom.
    pub fn with_zoom_bounds(mut self, min_zoom: f64, max_zoom: f64) -> Self {
        self.min_zoom = min_zoom;
        self.max_zoom = max_zoom.max(min_zoom);
        self.zoom = self.zoom.clamp(self.min_zoom, self.max_zoom);
        self
    }

    /// Logical surface size.
    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    /// Zero width or height makes every conversion non-finite.
    pub fn is_degenerate(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0 && self.zoom > 0.0)
    }

    /// Convert a screen point to world coordinates.
    pub fn screen_to_world(&self, screen: Point) -> Point {
        Point::new(
            (screen.x / self.width - self.pan_x) / self.zoom,
            (screen.y / self.height - self.pan_y) / self.zoom,
        )
    }

    /// Convert a world point to screen coordinates.
    pub fn world_to_screen(&self, world: Point) -> Point {
        Point::new(
            (world.x * self.zoom + self.pan_x) * self.width,
            (world.y * self.zoom + self.pan_y) * self.height,
        )
    }

    /// World → screen transform as an affine.
    pub fn world_to_screen_transform(&self) -> Affine {
        Affine::new([
            self.zoom * self.width,
            0.0,
            0.0,
            self.zoom * self.height,
            self.pan_x * self.width,
            self.pan_y * self.height,
        ])
    }

    /// Convert a screen-space displacement into a world-space displacement.
    pub fn screen_delta_to_world(&self, delta: Vec2) -> Vec2 {
        Vec2::new(
            delta.x / (self.width * self.zoom),
            delta.y / (self.height * self.zoom),
        )
    }

    /// Convert a world-space displacement into screen pixels.
    pub fn world_delta_to_screen(&self, delta: Vec2) -> Vec2 {
        Vec2::new(
            delta.x * self.width * self.zoom,
            delta.y * self.height * self.zoom,
        )
    }

    /// Build the world → device mapping for the drawing surface.
    pub fn device_mapping(&self) -> DeviceMapping {
        let dpr = self.dpr;
        DeviceMapping {
            transform: Affine::new([
                self.zoom * self.width * dpr,
                0.0,
                0.0,
                self.zoom * self.height * dpr,
                self.pan_x * self.width * dpr,
                self.pan_y * self.height * dpr,
            ]),
            px_scale: self.zoom * dpr,
            screen_scale: dpr,
            surface: self.size(),
            device_width: (self.width * dpr).ceil().max(0.0) as u32,
            device_height: (self.height * dpr).ceil().max(0.0) as u32,
        }
    }

    /// Pan by a delta in screen pixels.
    pub fn pan_by(&mut self, delta: Vec2) {
        self.pan_x += delta.x / self.width;
        self.pan_y += delta.y / self.height;
    }

    /// Set the zoom, clamped to the configured bounds.
    pub fn set_zoom(&mut self, zoom: f64) {
        self.zoom = zoom.clamp(self.min_zoom, self.max_zoom);
    }

    /// Zoom by `factor`, keeping the given screen point fixed.
    pub fn zoom_at(&mut self, screen: Point, factor: f64) {
        let new_zoom = (self.zoom * factor).clamp(self.min_zoom, self.max_zoom);
        if (new_zoom - self.zoom).abs() < f64::EPSILON {
            return;
        }
        let anchor = self.screen_to_world(screen);
        self.zoom = new_zoom;
        // Solve (anchor * zoom + pan) * dim = screen for pan.
        self.pan_x = screen.x / self.width - anchor.x * self.zoom;
        self.pan_y = screen.y / self.height - anchor.y * self.zoom;
    }

    /// Update the surface dimensions supplied by the host.
    pub fn resize(&mut self, width: f64, height: f64, dpr: f64) {
        self.width = width;
        self.height = height;
        self.dpr = dpr;
    }

    /// Reset pan and zoom.
    pub fn reset(&mut self) {
        self.pan_x = 0.0;
        self.pan_y = 0.0;
        self.zoom = 1.0_f64.clamp(self.min_zoom, self.max_zoom);
    }
}
