//! Freehand path simplification.
//!
//! Two passes: a cheap distance filter applied live while drawing, and
//! Ramer-Douglas-Peucker reduction applied once when the stroke is committed.
//! Both can measure in a scaled space so a tolerance given in screen pixels
//! holds for world-space points on a non-square surface.

use crate::shapes::InkPoint;
use kurbo::{Point, Vec2};

/// Unit scale: measure directly in the points' own space.
pub const UNIT_SCALE: Vec2 = Vec2::new(1.0, 1.0);

fn scaled(p: &InkPoint, scale: Vec2) -> Point {
    Point::new(p.x * scale.x, p.y * scale.y)
}

/// Whether `candidate` is far enough from `last` to be kept by the live filter.
pub fn passes_distance_filter(last: &InkPoint, candidate: &InkPoint, min_distance: f64, scale: Vec2) -> bool {
    (scaled(candidate, scale) - scaled(last, scale)).hypot() >= min_distance
}

/// Drop samples closer than `min_distance` to the previously kept sample.
/// The final sample is always kept.
pub fn distance_filter(points: &[InkPoint], min_distance: f64, scale: Vec2) -> Vec<InkPoint> {
    let Some((first, rest)) = points.split_first() else {
        return Vec::new();
    };
    let mut out = vec![*first];
    for (i, p) in rest.iter().enumerate() {
        let is_last = i + 1 == rest.len();
        let kept = out.last().copied().unwrap_or(*first);
        if is_last || passes_distance_filter(&kept, p, min_distance, scale) {
            out.push(*p);
        }
    }
    out
}

/// Ramer-Douglas-Peucker simplification in the points' own space.
pub fn simplify(points: &[InkPoint], tolerance: f64) -> Vec<InkPoint> {
    simplify_scaled(points, tolerance, UNIT_SCALE)
}

/// Ramer-Douglas-Peucker simplification with distances measured after
/// scaling by `scale`. First and last points are always preserved, and no
/// dropped point ends up farther than `tolerance` from the result.
pub fn simplify_scaled(points: &[InkPoint], tolerance: f64, scale: Vec2) -> Vec<InkPoint> {
    if points.len() < 3 {
        return points.to_vec();
    }
    let mut keep = vec![false; points.len()];
    keep[0] = true;
    keep[points.len() - 1] = true;
    mark_rdp(points, 0, points.len() - 1, tolerance, scale, &mut keep);
    points
        .iter()
        .zip(keep)
        .filter_map(|(p, k)| k.then_some(*p))
        .collect()
}

fn mark_rdp(points: &[InkPoint], first: usize, last: usize, tolerance: f64, scale: Vec2, keep: &mut [bool]) {
    if last <= first + 1 {
        return;
    }
    let a = scaled(&points[first], scale);
    let b = scaled(&points[last], scale);

    let mut max_dist = 0.0;
    let mut max_index = first;
    for (i, point) in points.iter().enumerate().take(last).skip(first + 1) {
        let dist = segment_distance(scaled(point, scale), a, b);
        if dist > max_dist {
            max_dist = dist;
            max_index = i;
        }
    }

    if max_dist > tolerance {
        keep[max_index] = true;
        mark_rdp(points, first, max_index, tolerance, scale, keep);
        mark_rdp(points, max_index, last, tolerance, scale, keep);
    }
}

/// Distance from a point to the chord `a..b`.
///
/// Measured against the segment rather than the infinite line, so points
/// that project past an endpoint still count toward the error bound.
fn segment_distance(point: Point, a: Point, b: Point) -> f64 {
    crate::shapes::point_to_segment_dist(point, a, b)
}
