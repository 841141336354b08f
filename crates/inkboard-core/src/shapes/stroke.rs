//! Freehand stroke payload (pen and highlighter).

use super::SerializableColor;
use kurbo::Point;
use serde::{Deserialize, Serialize};

/// A sampled point in world space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InkPoint {
    pub x: f64,
    pub y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pressure: Option<f32>,
    /// Sample timestamp in host milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub t: Option<f64>,
}

impl InkPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            pressure: None,
            t: None,
        }
    }

    pub fn at(point: Point) -> Self {
        Self::new(point.x, point.y)
    }

    pub fn with_pressure(mut self, pressure: Option<f32>) -> Self {
        self.pressure = pressure;
        self
    }

    pub fn with_time(mut self, t: f64) -> Self {
        self.t = Some(t);
        self
    }

    pub fn pos(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrokeTool {
    Pen,
    Highlighter,
}

/// How a stroke blends with what is already on the shapes layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompositeMode {
    #[default]
    SourceOver,
    Multiply,
}

/// Solid color or a two-stop gradient running from the first to the last point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Paint {
    Solid(SerializableColor),
    LinearGradient {
        from: SerializableColor,
        to: SerializableColor,
    },
}

impl Paint {
    /// Dominant color (the start color for gradients).
    pub fn primary(&self) -> SerializableColor {
        match self {
            Paint::Solid(c) => *c,
            Paint::LinearGradient { from, .. } => *from,
        }
    }
}

impl Default for Paint {
    fn default() -> Self {
        Paint::Solid(SerializableColor::black())
    }
}

/// Stroke payload. `thickness` is in logical pixels at zoom 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrokeData {
    pub tool: StrokeTool,
    pub points: Vec<InkPoint>,
    pub thickness: f64,
    /// Older payloads call this `stroke`.
    #[serde(default, alias = "stroke")]
    pub color: Paint,
    #[serde(default)]
    pub composite: CompositeMode,
}
