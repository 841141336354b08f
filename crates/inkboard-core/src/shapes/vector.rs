//! Two-point vector shapes: line, rectangle, circle, arrow.

use super::{InkPoint, SerializableColor};
use kurbo::{Point, Size};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Arrow head half-angle relative to the shaft.
pub const ARROW_HEAD_ANGLE: f64 = PI / 6.0;
/// Head length per unit of stroke width.
const ARROW_HEAD_PER_WIDTH: f64 = 4.0;
const MIN_ARROW_HEAD: f64 = 8.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VectorKind {
    Line,
    Rectangle,
    Circle,
    Arrow,
}

/// Vector payload: `points[0]` is the anchor, `points[1]` the dragged corner.
/// `width` is in logical pixels at zoom 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorData {
    pub kind: VectorKind,
    pub points: Vec<InkPoint>,
    #[serde(alias = "stroke")]
    pub color: SerializableColor,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill: Option<SerializableColor>,
    pub width: f64,
}

impl VectorData {
    pub fn new(kind: VectorKind, anchor: Point, corner: Point, color: SerializableColor, width: f64) -> Self {
        Self {
            kind,
            points: vec![InkPoint::at(anchor), InkPoint::at(corner)],
            color,
            fill: None,
            width,
        }
    }

    pub fn anchor(&self) -> Point {
        self.points.first().map(InkPoint::pos).unwrap_or(Point::ZERO)
    }

    pub fn corner(&self) -> Point {
        self.points.last().map(InkPoint::pos).unwrap_or(Point::ZERO)
    }

    /// Circle radius in logical pixels at zoom 1 (Euclidean anchor → corner distance).
    pub fn circle_radius_px(&self, surface: Size) -> f64 {
        let d = self.corner() - self.anchor();
        (d.x * surface.width).hypot(d.y * surface.height)
    }

    /// Arrow head length, proportional to the stroke width.
    pub fn head_length(&self) -> f64 {
        (self.width * ARROW_HEAD_PER_WIDTH).max(MIN_ARROW_HEAD)
    }
}

/// The two barb end points of an arrow head at `tip`, at ±30° from the shaft.
///
/// Works in any uniformly scaled space; callers pass screen or device points.
pub fn arrow_head(tail: Point, tip: Point, length: f64) -> [Point; 2] {
    let angle = (tip.y - tail.y).atan2(tip.x - tail.x);
    let barb = |offset: f64| {
        let a = angle + PI + offset;
        Point::new(tip.x + length * a.cos(), tip.y + length * a.sin())
    };
    [barb(-ARROW_HEAD_ANGLE), barb(ARROW_HEAD_ANGLE)]
}
