//! Rasterization of shapes and overlays into a device-pixel layer.

use crate::glyphs::GlyphSet;
use crate::renderer::{GridStyle, RenderConfig};
use inkboard_core::shapes::{
    CompositeMode, HANDLE_RADIUS, Paint as ShapePaint, SerializableColor, Shape, ShapeBody, StampData, StrokeData,
    StrokeTool, TextData, VectorData, VectorKind, arrow_head, stamp_handles,
};
use inkboard_core::tools::Overlay;
use inkboard_core::viewport::{DeviceMapping, Viewport};
use kurbo::{Affine, Point, Rect};
use peniko::Color;
use resvg::tiny_skia::{
    self, BlendMode, FillRule, GradientStop, LineCap, LineJoin, LinearGradient, Paint, PathBuilder, Pixmap,
    SpreadMode, Stroke, Transform,
};

/// Laser trail width in screen pixels.
const LASER_WIDTH: f64 = 4.0;
const REMOTE_CURSOR_RADIUS: f64 = 5.0;
const REMOTE_LABEL_PX: f64 = 12.0;

const REMOTE_PALETTE: [(u8, u8, u8); 6] = [
    (239, 68, 68),
    (34, 197, 94),
    (59, 130, 246),
    (234, 179, 8),
    (168, 85, 247),
    (236, 72, 153),
];

pub(crate) fn skia_color(color: Color) -> tiny_skia::Color {
    let c = color.to_rgba8();
    tiny_skia::Color::from_rgba8(c.r, c.g, c.b, c.a)
}

fn shape_color(color: SerializableColor, opacity: f64) -> tiny_skia::Color {
    let c = color.scale_alpha(opacity);
    tiny_skia::Color::from_rgba8(c.r, c.g, c.b, c.a)
}

fn with_alpha(color: Color, alpha: f64) -> tiny_skia::Color {
    let mut c = skia_color(color);
    c.apply_opacity(alpha.clamp(0.0, 1.0) as f32);
    c
}

pub(crate) fn to_transform(affine: Affine) -> Transform {
    let [a, b, c, d, e, f] = affine.as_coeffs();
    Transform::from_row(a as f32, b as f32, c as f32, d as f32, e as f32, f as f32)
}

fn solid(color: tiny_skia::Color) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color(color);
    paint.anti_alias = true;
    paint
}

fn round_stroke(width: f64) -> Stroke {
    Stroke {
        width: width.max(0.5) as f32,
        line_cap: LineCap::Round,
        line_join: LineJoin::Round,
        ..Stroke::default()
    }
}

/// Smoothed device-space path through `points`, midpoint quadratics.
fn smooth_path(points: &[Point]) -> Option<tiny_skia::Path> {
    let (first, rest) = points.split_first()?;
    let mut pb = PathBuilder::new();
    pb.move_to(first.x as f32, first.y as f32);
    if rest.len() == 1 {
        pb.line_to(rest[0].x as f32, rest[0].y as f32);
        return pb.finish();
    }
    for pair in rest.windows(2) {
        let mid = pair[0].midpoint(pair[1]);
        pb.quad_to(pair[0].x as f32, pair[0].y as f32, mid.x as f32, mid.y as f32);
    }
    if let Some(last) = rest.last() {
        pb.line_to(last.x as f32, last.y as f32);
    }
    pb.finish()
}

fn polyline(points: &[Point]) -> Option<tiny_skia::Path> {
    let (first, rest) = points.split_first()?;
    let mut pb = PathBuilder::new();
    pb.move_to(first.x as f32, first.y as f32);
    for p in rest {
        pb.line_to(p.x as f32, p.y as f32);
    }
    pb.finish()
}

fn circle(center: Point, radius: f64) -> Option<tiny_skia::Path> {
    PathBuilder::from_circle(center.x as f32, center.y as f32, radius.max(0.1) as f32)
}

fn rect_path(rect: Rect) -> Option<tiny_skia::Path> {
    let rect = tiny_skia::Rect::from_ltrb(rect.x0 as f32, rect.y0 as f32, rect.x1 as f32, rect.y1 as f32)?;
    Some(PathBuilder::from_rect(rect))
}

fn user_color(user: &str) -> tiny_skia::Color {
    // FNV-1a keeps the color stable across sessions.
    let hash = user
        .bytes()
        .fold(0xcbf2_9ce4_8422_2325_u64, |h, b| (h ^ b as u64).wrapping_mul(0x100_0000_01b3));
    let (r, g, b) = REMOTE_PALETTE[(hash % REMOTE_PALETTE.len() as u64) as usize];
    tiny_skia::Color::from_rgba8(r, g, b, 255)
}

/// Draws into one layer with the current world → device mapping.
pub(crate) struct Painter<'a> {
    pixmap: &'a mut Pixmap,
    viewport: Viewport,
    mapping: DeviceMapping,
    glyphs: Option<&'a GlyphSet>,
}

impl<'a> Painter<'a> {
    pub fn new(pixmap: &'a mut Pixmap, viewport: Viewport, glyphs: Option<&'a GlyphSet>) -> Self {
        Self {
            pixmap,
            viewport,
            mapping: viewport.device_mapping(),
            glyphs,
        }
    }

    fn device(&self, world: Point) -> Point {
        self.mapping.transform * world
    }

    fn stroke_path(&mut self, path: Option<tiny_skia::Path>, paint: &Paint<'_>, width: f64) {
        if let Some(path) = path {
            self.pixmap
                .stroke_path(&path, paint, &round_stroke(width), Transform::identity(), None);
        }
    }

    fn fill_path(&mut self, path: Option<tiny_skia::Path>, paint: &Paint<'_>, transform: Transform) {
        if let Some(path) = path {
            self.pixmap.fill_path(&path, paint, FillRule::Winding, transform, None);
        }
    }

    // --- Backgrounds ---------------------------------------------------

    pub fn background(&mut self, config: &RenderConfig) {
        self.pixmap.fill(skia_color(config.background_color));
        let step = config.grid_spacing * self.mapping.screen_scale;
        if step < 2.0 {
            return;
        }
        let (w, h) = (self.pixmap.width() as f64, self.pixmap.height() as f64);
        let paint = solid(skia_color(config.grid_color));
        match config.grid_style {
            GridStyle::None => {}
            GridStyle::Lines => {
                let width = self.mapping.screen_scale;
                let mut x = step;
                while x < w {
                    self.stroke_path(polyline(&[Point::new(x, 0.0), Point::new(x, h)]), &paint, width);
                    x += step;
                }
                let mut y = step;
                while y < h {
                    self.stroke_path(polyline(&[Point::new(0.0, y), Point::new(w, y)]), &paint, width);
                    y += step;
                }
            }
            GridStyle::Dots => {
                let r = self.mapping.screen_scale;
                let mut y = step;
                while y < h {
                    let mut x = step;
                    while x < w {
                        self.fill_path(circle(Point::new(x, y), r), &paint, Transform::identity());
                        x += step;
                    }
                    y += step;
                }
            }
        }
    }

    pub fn clear(&mut self) {
        self.pixmap.fill(tiny_skia::Color::TRANSPARENT);
    }

    // --- Shapes --------------------------------------------------------

    pub fn shape(&mut self, shape: &Shape) {
        match &shape.body {
            ShapeBody::Stroke(data) => self.stroke(shape, data),
            ShapeBody::Vector(data) => self.vector(shape, data),
            ShapeBody::Text(data) => self.text(shape, data),
            ShapeBody::Stamp(data) => self.stamp(shape, data),
        }
    }

    fn stroke(&mut self, shape: &Shape, data: &StrokeData) {
        let points: Vec<Point> = data.points.iter().map(|p| self.device(p.pos())).collect();
        let (Some(&first), Some(&last)) = (points.first(), points.last()) else {
            return;
        };
        let width = data.thickness * shape.scale * self.mapping.px_scale;
        let mut paint = match data.color {
            ShapePaint::Solid(color) => solid(shape_color(color, shape.opacity)),
            ShapePaint::LinearGradient { from, to } => {
                let mut paint = solid(shape_color(from, shape.opacity));
                if let Some(shader) = LinearGradient::new(
                    tiny_skia::Point::from_xy(first.x as f32, first.y as f32),
                    tiny_skia::Point::from_xy(last.x as f32, last.y as f32),
                    vec![
                        GradientStop::new(0.0, shape_color(from, shape.opacity)),
                        GradientStop::new(1.0, shape_color(to, shape.opacity)),
                    ],
                    SpreadMode::Pad,
                    Transform::identity(),
                ) {
                    paint.shader = shader;
                }
                paint
            }
        };
        if data.composite == CompositeMode::Multiply || data.tool == StrokeTool::Highlighter {
            paint.blend_mode = BlendMode::Multiply;
        }
        if points.iter().all(|p| (*p - first).hypot() < 0.5) {
            self.fill_path(circle(first, width / 2.0), &paint, Transform::identity());
        } else {
            self.stroke_path(smooth_path(&points), &paint, width);
        }
    }

    fn vector(&mut self, shape: &Shape, data: &VectorData) {
        let a = self.device(data.anchor());
        let b = self.device(data.corner());
        let width = data.width * self.mapping.px_scale;
        let paint = solid(shape_color(data.color, shape.opacity));
        let fill = data.fill.map(|c| solid(shape_color(c, shape.opacity)));
        match data.kind {
            VectorKind::Line => self.stroke_path(polyline(&[a, b]), &paint, width),
            VectorKind::Arrow => {
                self.stroke_path(polyline(&[a, b]), &paint, width);
                if (b - a).hypot() > f64::EPSILON {
                    let [left, right] = arrow_head(a, b, data.head_length() * self.mapping.px_scale);
                    self.stroke_path(polyline(&[left, b, right]), &paint, width);
                }
            }
            VectorKind::Rectangle => {
                let rect = Rect::from_points(a, b);
                if let Some(fill) = &fill {
                    self.fill_path(rect_path(rect), fill, Transform::identity());
                }
                self.stroke_path(rect_path(rect), &paint, width);
            }
            VectorKind::Circle => {
                let r = data.circle_radius_px(self.mapping.surface) * self.mapping.px_scale;
                if let Some(fill) = &fill {
                    self.fill_path(circle(a, r), fill, Transform::identity());
                }
                self.stroke_path(circle(a, r), &paint, width);
            }
        }
    }

    /// Text is drawn in screen space: the origin goes through the mapping,
    /// the glyphs only through translate and rotate.
    fn text(&mut self, shape: &Shape, data: &TextData) {
        let Some(glyphs) = self.glyphs else {
            log::trace!("No font loaded, skipping text {}", shape.id());
            return;
        };
        let k = shape.scale * self.mapping.px_scale;
        let Some(path) = glyphs.text_path(
            &data.content,
            (data.font.size * k) as f32,
            (data.line_height() * k) as f32,
            data.align,
            (data.box_width * k) as f32,
        ) else {
            return;
        };
        let origin = self.device(shape.origin());
        let transform = to_transform(Affine::translate(origin.to_vec2()) * Affine::rotate(shape.rotation));
        let paint = solid(shape_color(data.color, shape.opacity));
        self.fill_path(Some(path), &paint, transform);
    }

    fn stamp(&mut self, shape: &Shape, data: &StampData) {
        let center = self.device(shape.origin());
        let edge = data.size * shape.scale * self.mapping.px_scale;
        let transform = to_transform(Affine::translate(center.to_vec2()) * Affine::rotate(shape.rotation));
        let glyph = self
            .glyphs
            .filter(|g| g.covers(&data.glyph))
            .and_then(|g| g.centered_path(&data.glyph, (edge * 0.8) as f32));
        match glyph {
            Some(path) => {
                let paint = solid(tiny_skia::Color::from_rgba8(0, 0, 0, (255.0 * shape.opacity) as u8));
                self.fill_path(Some(path), &paint, transform);
            }
            None => {
                // Placeholder disc for glyphs the font cannot draw.
                let fill = solid(tiny_skia::Color::from_rgba8(250, 204, 21, (255.0 * shape.opacity) as u8));
                self.fill_path(circle(Point::ZERO, edge / 2.0), &fill, transform);
            }
        }
    }

    // --- Overlays ------------------------------------------------------

    pub fn overlay(&mut self, overlay: &Overlay, config: &RenderConfig) {
        let s = self.mapping.screen_scale;
        match overlay {
            Overlay::EraserRing { center, radius } => {
                let paint = solid(skia_color(config.eraser_color));
                self.stroke_path(circle(self.device(*center), radius * s), &paint, s);
            }
            Overlay::Marquee { rect } => {
                let r = Rect::from_points(self.device(rect.origin()), self.device(Point::new(rect.x1, rect.y1)));
                let fill = solid(with_alpha(config.selection_color, 0.1));
                self.fill_path(rect_path(r), &fill, Transform::identity());
                let paint = solid(skia_color(config.selection_color));
                self.stroke_path(rect_path(r), &paint, s);
            }
            Overlay::SelectionBox { rect } => {
                let r = Rect::from_points(self.device(rect.origin()), self.device(Point::new(rect.x1, rect.y1)))
                    .inflate(2.0 * s, 2.0 * s);
                let paint = solid(skia_color(config.selection_color));
                self.stroke_path(rect_path(r), &paint, s);
            }
            Overlay::LaserTrail { points } => {
                for pair in points.windows(2) {
                    let (a, alpha) = pair[0];
                    let (b, _) = pair[1];
                    let paint = solid(with_alpha(config.laser_color, alpha));
                    self.stroke_path(polyline(&[self.device(a), self.device(b)]), &paint, LASER_WIDTH * s);
                }
                if let Some(&(head, alpha)) = points.last() {
                    let paint = solid(with_alpha(config.laser_color, alpha));
                    self.fill_path(circle(self.device(head), LASER_WIDTH * s), &paint, Transform::identity());
                }
            }
            Overlay::Caret { origin, offset, height } => {
                let k = self.mapping.px_scale;
                let top = self.device(*origin) + *offset * k;
                let bottom = top + kurbo::Vec2::new(0.0, height * k);
                let paint = solid(skia_color(config.caret_color));
                self.stroke_path(polyline(&[top, bottom]), &paint, 2.0 * s);
            }
            Overlay::StampHandles { center, half, rotation } => {
                let c = self.viewport.world_to_screen(*center);
                let (corners, rotate) = stamp_handles(c, half * self.viewport.zoom, *rotation);
                let to_device = |p: Point| Point::new(p.x * s, p.y * s);
                let corners = corners.map(to_device);
                let paint = solid(skia_color(config.selection_color));
                let mut frame = corners.to_vec();
                frame.push(corners[0]);
                self.stroke_path(polyline(&frame), &paint, s);
                let top_mid = corners[0].midpoint(corners[1]);
                self.stroke_path(polyline(&[top_mid, to_device(rotate)]), &paint, s);
                let white = solid(tiny_skia::Color::WHITE);
                for p in corners.into_iter().chain([to_device(rotate)]) {
                    self.fill_path(circle(p, HANDLE_RADIUS * s * 0.6), &white, Transform::identity());
                    self.stroke_path(circle(p, HANDLE_RADIUS * s * 0.6), &paint, s);
                }
            }
            Overlay::RemoteCursor { position, user } => {
                let p = self.device(*position);
                let paint = solid(user_color(user));
                self.fill_path(circle(p, REMOTE_CURSOR_RADIUS * s), &paint, Transform::identity());
                if let Some(path) = self
                    .glyphs
                    .and_then(|g| g.text_path(user, (REMOTE_LABEL_PX * s) as f32, 0.0, Default::default(), 0.0))
                {
                    let at = p + kurbo::Vec2::new(8.0 * s, 4.0 * s);
                    self.fill_path(Some(path), &paint, Transform::from_translate(at.x as f32, at.y as f32));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inkboard_core::shapes::{InkPoint, StampData};

    fn pixmap(w: u32, h: u32) -> Pixmap {
        Pixmap::new(w, h).unwrap()
    }

    fn alpha_at(p: &Pixmap, x: u32, y: u32) -> u8 {
        p.pixel(x, y).unwrap().alpha()
    }

    fn pen(points: &[(f64, f64)], thickness: f64) -> Shape {
        let data = StrokeData {
            tool: StrokeTool::Pen,
            points: points.iter().map(|&(x, y)| InkPoint::new(x, y)).collect(),
            thickness,
            color: ShapePaint::default(),
            composite: CompositeMode::SourceOver,
        };
        let origin = Point::new(points[0].0, points[0].1);
        Shape::new(ShapeBody::Stroke(data), origin)
    }

    #[test]
    fn test_stroke_lands_in_device_pixels() {
        let viewport = Viewport::new(100.0, 100.0, 2.0);
        let mut p = pixmap(200, 200);
        Painter::new(&mut p, viewport, None).shape(&pen(&[(0.1, 0.5), (0.9, 0.5)], 4.0));
        // World y 0.5 is device row 100 at dpr 2.
        assert_eq!(alpha_at(&p, 100, 100), 255);
        assert_eq!(alpha_at(&p, 100, 80), 0);
    }

    #[test]
    fn test_single_point_stroke_is_a_dot() {
        let viewport = Viewport::new(100.0, 100.0, 1.0);
        let mut p = pixmap(100, 100);
        Painter::new(&mut p, viewport, None).shape(&pen(&[(0.5, 0.5)], 10.0));
        assert!(alpha_at(&p, 50, 50) > 200);
        assert_eq!(alpha_at(&p, 60, 50), 0);
    }

    #[test]
    fn test_rectangle_fill_and_outline() {
        let viewport = Viewport::new(100.0, 100.0, 1.0);
        let mut p = pixmap(100, 100);
        let mut data = VectorData::new(
            VectorKind::Rectangle,
            Point::new(0.2, 0.2),
            Point::new(0.8, 0.8),
            SerializableColor::black(),
            2.0,
        );
        data.fill = Some(SerializableColor::new(255, 0, 0, 255));
        Painter::new(&mut p, viewport, None).shape(&Shape::new(ShapeBody::Vector(data), Point::new(0.2, 0.2)));
        let inside = p.pixel(50, 50).unwrap().demultiply();
        assert_eq!((inside.red(), inside.green(), inside.alpha()), (255, 0, 255));
        let edge = p.pixel(20, 50).unwrap().demultiply();
        assert_eq!((edge.red(), edge.alpha()), (0, 255));
        assert_eq!(alpha_at(&p, 5, 5), 0);
    }

    #[test]
    fn test_stamp_without_font_draws_placeholder() {
        let viewport = Viewport::new(100.0, 100.0, 1.0);
        let mut p = pixmap(100, 100);
        let stamp = Shape::new(
            ShapeBody::Stamp(StampData {
                glyph: "\u{2B50}".into(),
                size: 20.0,
            }),
            Point::new(0.5, 0.5),
        );
        Painter::new(&mut p, viewport, None).shape(&stamp);
        assert!(alpha_at(&p, 50, 50) > 200);
        assert_eq!(alpha_at(&p, 70, 50), 0);
    }

    #[test]
    fn test_eraser_ring_scales_with_dpr() {
        let viewport = Viewport::new(100.0, 100.0, 2.0);
        let mut p = pixmap(200, 200);
        let ring = Overlay::EraserRing {
            center: Point::new(0.5, 0.5),
            radius: 10.0,
        };
        Painter::new(&mut p, viewport, None).overlay(&ring, &RenderConfig::default());
        assert!(alpha_at(&p, 120, 100) > 0);
        assert_eq!(alpha_at(&p, 100, 100), 0);
    }

    #[test]
    fn test_user_color_is_stable() {
        assert_eq!(user_color("alice"), user_color("alice"));
    }
}
