//! Stamp (emoji/glyph) payload and its handle geometry.

use super::rotate_vec;
use kurbo::{Point, Vec2};
use serde::{Deserialize, Serialize};

/// Distance of the rotate handle above the stamp's top edge, in screen px.
pub const ROTATE_HANDLE_OFFSET: f64 = 25.0;
/// Grab radius of every handle, in screen px.
pub const HANDLE_RADIUS: f64 = 8.0;

/// Stamp payload. `size` is the edge length in logical pixels at zoom 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StampData {
    pub glyph: String,
    pub size: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Corner {
    TopLeft,
    TopRight,
    BottomRight,
    BottomLeft,
}

impl Corner {
    pub const ALL: [Corner; 4] = [Corner::TopLeft, Corner::TopRight, Corner::BottomRight, Corner::BottomLeft];

    fn local(self, half: f64) -> Vec2 {
        match self {
            Corner::TopLeft => Vec2::new(-half, -half),
            Corner::TopRight => Vec2::new(half, -half),
            Corner::BottomRight => Vec2::new(half, half),
            Corner::BottomLeft => Vec2::new(-half, half),
        }
    }
}

/// Part of a stamp under the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StampHit {
    Body,
    Corner(Corner),
    Rotate,
}

/// Screen positions of the four corner handles and the rotate handle.
pub fn stamp_handles(center: Point, half: f64, rotation: f64) -> ([Point; 4], Point) {
    let place = |v: Vec2| center + rotate_vec(v, rotation);
    let corners = Corner::ALL.map(|c| place(c.local(half)));
    let rotate = place(Vec2::new(0.0, -half - ROTATE_HANDLE_OFFSET));
    (corners, rotate)
}

/// Hit test in the stamp's rotated local space.
///
/// `center` and `p` are screen points, `half` is half the on-screen edge.
/// Handles are only considered when `with_handles` is set (selected stamp).
pub fn stamp_hit(center: Point, half: f64, rotation: f64, p: Point, with_handles: bool) -> Option<StampHit> {
    let local = rotate_vec(p - center, -rotation);
    if with_handles {
        let rotate = Vec2::new(0.0, -half - ROTATE_HANDLE_OFFSET);
        if (local - rotate).hypot() <= HANDLE_RADIUS {
            return Some(StampHit::Rotate);
        }
        for corner in Corner::ALL {
            if (local - corner.local(half)).hypot() <= HANDLE_RADIUS {
                return Some(StampHit::Corner(corner));
            }
        }
    }
    (local.x.abs() <= half && local.y.abs() <= half).then_some(StampHit::Body)
}
