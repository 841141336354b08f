//! Modifier-driven snapping helpers. All inputs are screen-space points.

use kurbo::Point;

/// Line and arrow angle increment with shift held, in degrees.
pub const LINE_ANGLE_INCREMENT: f64 = 45.0;

/// Snap an angle to the nearest increment, normalized to `[0, 360)`.
pub fn snap_angle(angle_degrees: f64, increment: f64) -> f64 {
    let snapped = (angle_degrees / increment).round() * increment;
    snapped.rem_euclid(360.0)
}

/// Rotate `end` around `start` onto the nearest angle increment, keeping its distance.
pub fn snap_line_endpoint(start: Point, end: Point, increment: f64) -> Point {
    let dx = end.x - start.x;
    let dy = end.y - start.y;
    let distance = dx.hypot(dy);
    if distance < 0.001 {
        return end;
    }
    let angle = snap_angle(dy.atan2(dx).to_degrees(), increment).to_radians();
    Point::new(
        start.x + distance * angle.cos(),
        start.y + distance * angle.sin(),
    )
}

/// Extend the shorter side so the box from `anchor` to the result is square.
pub fn snap_square(anchor: Point, corner: Point) -> Point {
    let dx = corner.x - anchor.x;
    let dy = corner.y - anchor.y;
    let side = dx.abs().max(dy.abs());
    let sign = |v: f64| if v < 0.0 { -1.0 } else { 1.0 };
    Point::new(anchor.x + side * sign(dx), anchor.y + side * sign(dy))
}

/// Snap a scale factor to a step, never below one step.
pub fn snap_scale(scale: f64, step: f64) -> f64 {
    if step <= 0.0 {
        return scale;
    }
    ((scale / step).round() * step).max(step)
}

/// Snap a rotation in radians to an increment given in degrees.
pub fn snap_rotation(radians: f64, increment_degrees: f64) -> f64 {
    if increment_degrees <= 0.0 {
        return radians;
    }
    let inc = increment_degrees.to_radians();
    (radians / inc).round() * inc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snap_angle() {
        assert!((snap_angle(7.0, 15.0) - 0.0).abs() < 1e-9);
        assert!((snap_angle(8.0, 15.0) - 15.0).abs() < 1e-9);
        assert!((snap_angle(50.0, 45.0) - 45.0).abs() < 1e-9);
        assert!((snap_angle(-10.0, 45.0) - 0.0).abs() < 1e-9);
        assert!((snap_angle(-30.0, 45.0) - 315.0).abs() < 1e-9);
        assert!((snap_angle(359.0, 45.0) - 0.0).abs() < 1e-9);
    }

    #[test]
    fn test_snap_line_endpoint_preserves_length() {
        let start = Point::new(100.0, 100.0);
        let end = Point::new(200.0, 110.0);
        let snapped = snap_line_endpoint(start, end, LINE_ANGLE_INCREMENT);
        assert!((snapped.y - 100.0).abs() < 1e-9);
        assert!(((snapped - start).hypot() - (end - start).hypot()).abs() < 1e-9);

        let diag = snap_line_endpoint(start, Point::new(190.0, 200.0), LINE_ANGLE_INCREMENT);
        assert!(((diag.x - start.x) - (diag.y - start.y)).abs() < 1e-9);
    }

    #[test]
    fn test_snap_square_uses_larger_delta() {
        let p = snap_square(Point::new(100.0, 100.0), Point::new(300.0, 250.0));
        assert_eq!(p, Point::new(300.0, 300.0));
        let q = snap_square(Point::new(100.0, 100.0), Point::new(60.0, 180.0));
        assert_eq!(q, Point::new(20.0, 180.0));
    }

    #[test]
    fn test_snap_scale_and_rotation() {
        assert!((snap_scale(1.13, 0.25) - 1.25).abs() < 1e-12);
        assert!((snap_scale(0.05, 0.25) - 0.25).abs() < 1e-12);
        let r = snap_rotation(20f64.to_radians(), 15.0);
        assert!((r - 15f64.to_radians()).abs() < 1e-12);
    }
}
