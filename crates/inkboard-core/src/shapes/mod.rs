//! Shape records for the annotation surface.
//!
//! Positions and points are world coordinates. Sizes (stroke thickness, font
//! size, text box, stamp size) are logical pixels at zoom 1, so a shape keeps
//! its on-screen proportions whatever the surface aspect ratio is.

mod stamp;
mod stroke;
mod text;
mod vector;

pub use stamp::{Corner, HANDLE_RADIUS, ROTATE_HANDLE_OFFSET, StampData, StampHit, stamp_handles, stamp_hit};
pub use stroke::{CompositeMode, InkPoint, Paint, StrokeData, StrokeTool};
pub use text::{CHAR_ADVANCE_EM, FontDescriptor, LINE_HEIGHT_EM, TextAlign, TextData};
pub use vector::{ARROW_HEAD_ANGLE, VectorData, VectorKind, arrow_head};

use crate::input::PointerKind;
use crate::time::now_millis;
use crate::viewport::Viewport;
use kurbo::{Point, Rect, Size, Vec2};
use peniko::Color;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for shapes.
pub type ShapeId = Uuid;

/// Serializable color representation (RGBA8).
///
/// Deserializes from either `{r,g,b,a}` or a CSS hex string (`#rgb`,
/// `#rrggbb`, `#rrggbbaa`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ColorRepr")]
pub struct SerializableColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

fn opaque() -> u8 {
    255
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ColorRepr {
    Hex(String),
    Rgba {
        r: u8,
        g: u8,
        b: u8,
        #[serde(default = "opaque")]
        a: u8,
    },
}

impl TryFrom<ColorRepr> for SerializableColor {
    type Error = String;

    fn try_from(repr: ColorRepr) -> Result<Self, Self::Error> {
        match repr {
            ColorRepr::Hex(hex) => {
                SerializableColor::from_hex(&hex).ok_or_else(|| format!("invalid color {hex:?}"))
            }
            ColorRepr::Rgba { r, g, b, a } => Ok(SerializableColor::new(r, g, b, a)),
        }
    }
}

impl SerializableColor {
    pub fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn black() -> Self {
        Self::new(0, 0, 0, 255)
    }

    pub fn white() -> Self {
        Self::new(255, 255, 255, 255)
    }

    pub fn transparent() -> Self {
        Self::new(0, 0, 0, 0)
    }

    /// Parse `#rgb`, `#rrggbb` or `#rrggbbaa` (leading `#` optional).
    pub fn from_hex(hex: &str) -> Option<Self> {
        let digits = hex.trim().trim_start_matches('#');
        if !digits.is_ascii() {
            return None;
        }
        let byte = |i: usize| u8::from_str_radix(digits.get(i..i + 2)?, 16).ok();
        match digits.len() {
            3 => {
                let nib = |i: usize| {
                    u8::from_str_radix(digits.get(i..i + 1)?, 16)
                        .ok()
                        .map(|v| v * 17)
                };
                Some(Self::new(nib(0)?, nib(1)?, nib(2)?, 255))
            }
            6 => Some(Self::new(byte(0)?, byte(2)?, byte(4)?, 255)),
            8 => Some(Self::new(byte(0)?, byte(2)?, byte(4)?, byte(6)?)),
            _ => None,
        }
    }

    pub fn to_hex(&self) -> String {
        if self.a == 255 {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            format!("#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }

    /// Same color with alpha multiplied by `factor`.
    pub fn scale_alpha(self, factor: f64) -> Self {
        let a = (self.a as f64 * factor.clamp(0.0, 1.0)).round() as u8;
        Self { a, ..self }
    }
}

impl From<Color> for SerializableColor {
    fn from(color: Color) -> Self {
        let rgba = color.to_rgba8();
        Self {
            r: rgba.r,
            g: rgba.g,
            b: rgba.b,
            a: rgba.a,
        }
    }
}

impl From<SerializableColor> for Color {
    fn from(color: SerializableColor) -> Self {
        Color::from_rgba8(color.r, color.g, color.b, color.a)
    }
}

/// Optional capture metadata recorded with a shape.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InputMeta {
    pub device: PointerKind,
    /// Average pointer speed over the gesture in screen px/ms.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub velocity: Option<f64>,
}

/// Variant payload of a shape, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ShapeBody {
    Stroke(StrokeData),
    Vector(VectorData),
    Text(TextData),
    Stamp(StampData),
}

/// Fine-grained kind, used for history labels and tool/shape matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShapeKind {
    Pen,
    Highlighter,
    Line,
    Rectangle,
    Circle,
    Arrow,
    Text,
    Stamp,
}

impl ShapeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShapeKind::Pen => "pen",
            ShapeKind::Highlighter => "highlighter",
            ShapeKind::Line => "line",
            ShapeKind::Rectangle => "rectangle",
            ShapeKind::Circle => "circle",
            ShapeKind::Arrow => "arrow",
            ShapeKind::Text => "text",
            ShapeKind::Stamp => "stamp",
        }
    }
}

fn one() -> f64 {
    1.0
}

/// A shape record.
///
/// `x`/`y` is the shape's origin: the first point for strokes and vectors,
/// the top-left corner for text and the center for stamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shape {
    id: ShapeId,
    pub x: f64,
    pub y: f64,
    #[serde(default = "one")]
    pub scale: f64,
    /// Rotation in radians around the origin.
    #[serde(default)]
    pub rotation: f64,
    #[serde(default = "one")]
    pub opacity: f64,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub created_at: u64,
    #[serde(default)]
    pub updated_at: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<InputMeta>,
    #[serde(flatten)]
    pub body: ShapeBody,
}

impl Shape {
    /// Create a shape with a fresh id.
    pub fn new(body: ShapeBody, origin: Point) -> Self {
        Self::with_id(Uuid::new_v4(), body, origin)
    }

    /// Create a shape with a caller-supplied id (collaboration, tests).
    pub fn with_id(id: ShapeId, body: ShapeBody, origin: Point) -> Self {
        let now = now_millis();
        Self {
            id,
            x: origin.x,
            y: origin.y,
            scale: 1.0,
            rotation: 0.0,
            opacity: 1.0,
            locked: false,
            created_at: now,
            updated_at: now,
            meta: None,
            body,
        }
    }

    pub fn with_opacity(mut self, opacity: f64) -> Self {
        self.opacity = opacity.clamp(0.0, 1.0);
        self
    }

    pub fn with_meta(mut self, meta: InputMeta) -> Self {
        self.meta = Some(meta);
        self
    }

    pub fn id(&self) -> ShapeId {
        self.id
    }

    pub fn kind(&self) -> ShapeKind {
        match &self.body {
            ShapeBody::Stroke(s) => match s.tool {
                StrokeTool::Pen => ShapeKind::Pen,
                StrokeTool::Highlighter => ShapeKind::Highlighter,
            },
            ShapeBody::Vector(v) => match v.kind {
                VectorKind::Line => ShapeKind::Line,
                VectorKind::Rectangle => ShapeKind::Rectangle,
                VectorKind::Circle => ShapeKind::Circle,
                VectorKind::Arrow => ShapeKind::Arrow,
            },
            ShapeBody::Text(_) => ShapeKind::Text,
            ShapeBody::Stamp(_) => ShapeKind::Stamp,
        }
    }

    pub fn origin(&self) -> Point {
        Point::new(self.x, self.y)
    }

    /// Control points for strokes and vectors.
    pub fn points(&self) -> Option<&[InkPoint]> {
        match &self.body {
            ShapeBody::Stroke(s) => Some(&s.points),
            ShapeBody::Vector(v) => Some(&v.points),
            _ => None,
        }
    }

    pub fn points_mut(&mut self) -> Option<&mut Vec<InkPoint>> {
        match &mut self.body {
            ShapeBody::Stroke(s) => Some(&mut s.points),
            ShapeBody::Vector(v) => Some(&mut v.points),
            _ => None,
        }
    }

    /// Move the shape by a world-space delta.
    pub fn translate(&mut self, delta: Vec2) {
        self.x += delta.x;
        self.y += delta.y;
        if let Some(points) = self.points_mut() {
            for p in points.iter_mut() {
                p.x += delta.x;
                p.y += delta.y;
            }
        }
    }

    pub fn translated(&self, delta: Vec2) -> Shape {
        let mut moved = self.clone();
        moved.translate(delta);
        moved
    }

    /// Bump `updated_at`.
    pub fn touch(&mut self) {
        self.updated_at = now_millis().max(self.updated_at);
    }

    /// Merge the fields present in `patch`.
    pub fn apply_patch(&mut self, patch: &ShapePatch) {
        if let Some(points) = &patch.points {
            let applied = match &mut self.body {
                ShapeBody::Stroke(s) => {
                    s.points = points.clone();
                    true
                }
                ShapeBody::Vector(v) if points.len() >= 2 => {
                    v.points = points.clone();
                    true
                }
                _ => false,
            };
            if let (true, Some(first)) = (applied, points.first()) {
                self.x = first.x;
                self.y = first.y;
            }
        }
        if patch.x.is_some() || patch.y.is_some() {
            let delta = Vec2::new(
                patch.x.map_or(0.0, |x| x - self.x),
                patch.y.map_or(0.0, |y| y - self.y),
            );
            self.translate(delta);
        }
        if let Some(scale) = patch.scale {
            self.scale = scale;
        }
        if let Some(rotation) = patch.rotation {
            self.rotation = rotation;
        }
        if let Some(opacity) = patch.opacity {
            self.opacity = opacity.clamp(0.0, 1.0);
        }
        if let Some(locked) = patch.locked {
            self.locked = locked;
        }
        match &mut self.body {
            ShapeBody::Text(t) => {
                if let Some(content) = &patch.content {
                    t.content = content.clone();
                }
                if let Some(w) = patch.box_width {
                    t.box_width = w;
                }
                if let Some(h) = patch.box_height {
                    t.box_height = h;
                }
            }
            ShapeBody::Stamp(s) => {
                if let Some(glyph) = &patch.glyph {
                    s.glyph = glyph.clone();
                }
            }
            _ => {}
        }
    }

    /// Axis-aligned world bounds, including stroke width.
    pub fn world_bounds(&self, surface: Size) -> Rect {
        let px = |v: f64| Vec2::new(v / surface.width, v / surface.height);
        match &self.body {
            ShapeBody::Stroke(s) => {
                let pad = px(s.thickness * self.scale / 2.0);
                inflate(points_bounds(&s.points).unwrap_or_else(|| self.origin_rect()), pad)
            }
            ShapeBody::Vector(v) => {
                if v.kind == VectorKind::Circle {
                    let r = v.circle_radius_px(surface) + v.width / 2.0;
                    let c = v.anchor();
                    return Rect::from_center_size(c, Size::new(2.0 * r / surface.width, 2.0 * r / surface.height));
                }
                let mut pad = v.width / 2.0;
                if v.kind == VectorKind::Arrow {
                    pad += v.head_length();
                }
                inflate(points_bounds(&v.points).unwrap_or_else(|| self.origin_rect()), px(pad))
            }
            ShapeBody::Text(t) => {
                let local = Rect::new(0.0, 0.0, t.box_width * self.scale, t.box_height * self.scale);
                rotated_box_bounds(self.origin(), local, self.rotation, surface)
            }
            ShapeBody::Stamp(s) => {
                let half = s.size * self.scale / 2.0;
                let local = Rect::new(-half, -half, half, half);
                rotated_box_bounds(self.origin(), local, self.rotation, surface)
            }
        }
    }

    fn origin_rect(&self) -> Rect {
        Rect::from_points(self.origin(), self.origin())
    }

    /// Screen-space hit test with a tolerance in screen pixels.
    pub fn hit_test(&self, screen: Point, tolerance: f64, viewport: &Viewport) -> bool {
        let zoom = viewport.zoom;
        match &self.body {
            ShapeBody::Stroke(s) => {
                let pts = screen_points(&s.points, viewport);
                let reach = tolerance + s.thickness * self.scale * zoom / 2.0;
                polyline_distance(screen, &pts) <= reach
            }
            ShapeBody::Vector(v) => {
                let reach = tolerance + v.width * zoom / 2.0;
                let a = viewport.world_to_screen(v.anchor());
                let b = viewport.world_to_screen(v.corner());
                match v.kind {
                    VectorKind::Line | VectorKind::Arrow => {
                        let pts = screen_points(&v.points, viewport);
                        polyline_distance(screen, &pts) <= reach
                    }
                    VectorKind::Rectangle => {
                        let rect = Rect::from_points(a, b);
                        if v.fill.is_some() && rect.inflate(tolerance, tolerance).contains(screen) {
                            return true;
                        }
                        let outline = [
                            Point::new(rect.x0, rect.y0),
                            Point::new(rect.x1, rect.y0),
                            Point::new(rect.x1, rect.y1),
                            Point::new(rect.x0, rect.y1),
                            Point::new(rect.x0, rect.y0),
                        ];
                        point_to_polyline_dist(screen, &outline) <= reach
                    }
                    VectorKind::Circle => {
                        let r = v.circle_radius_px(viewport.size()) * zoom;
                        let d = (screen - a).hypot();
                        if v.fill.is_some() {
                            d <= r + reach
                        } else {
                            (d - r).abs() <= reach
                        }
                    }
                }
            }
            ShapeBody::Text(t) => {
                let origin = viewport.world_to_screen(self.origin());
                let local = rotate_vec(screen - origin, -self.rotation);
                let w = t.box_width * self.scale * zoom;
                let h = t.box_height * self.scale * zoom;
                Rect::new(0.0, 0.0, w, h)
                    .inflate(tolerance, tolerance)
                    .contains(local.to_point())
            }
            ShapeBody::Stamp(s) => {
                let center = viewport.world_to_screen(self.origin());
                let half = s.size * self.scale * zoom / 2.0 + tolerance;
                stamp_hit(center, half, self.rotation, screen, false).is_some()
            }
        }
    }
}

/// Partial update merged by [`Shape::apply_patch`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ShapePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotation: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locked: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub points: Option<Vec<InkPoint>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub box_width: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub box_height: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub glyph: Option<String>,
}

impl ShapePatch {
    /// A patch carrying every mutable field of `shape`.
    pub fn from_shape(shape: &Shape) -> Self {
        let mut patch = ShapePatch {
            x: Some(shape.x),
            y: Some(shape.y),
            scale: Some(shape.scale),
            rotation: Some(shape.rotation),
            opacity: Some(shape.opacity),
            locked: Some(shape.locked),
            points: shape.points().map(|p| p.to_vec()),
            ..Default::default()
        };
        match &shape.body {
            ShapeBody::Text(t) => {
                patch.content = Some(t.content.clone());
                patch.box_width = Some(t.box_width);
                patch.box_height = Some(t.box_height);
            }
            ShapeBody::Stamp(s) => patch.glyph = Some(s.glyph.clone()),
            _ => {}
        }
        patch
    }

    pub fn position(x: f64, y: f64) -> Self {
        ShapePatch {
            x: Some(x),
            y: Some(y),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == ShapePatch::default()
    }
}

fn inflate(rect: Rect, pad: Vec2) -> Rect {
    rect.inflate(pad.x, pad.y)
}

fn points_bounds(points: &[InkPoint]) -> Option<Rect> {
    let first = points.first()?.pos();
    Some(
        points
            .iter()
            .fold(Rect::from_points(first, first), |r, p| r.union_pt(p.pos())),
    )
}

fn screen_points(points: &[InkPoint], viewport: &Viewport) -> Vec<Point> {
    points.iter().map(|p| viewport.world_to_screen(p.pos())).collect()
}

/// Distance to a polyline; a single point degrades to point distance.
fn polyline_distance(p: Point, pts: &[Point]) -> f64 {
    match pts {
        [] => f64::INFINITY,
        [only] => (p - *only).hypot(),
        _ => point_to_polyline_dist(p, pts),
    }
}

pub(crate) fn rotate_vec(v: Vec2, angle: f64) -> Vec2 {
    let (s, c) = angle.sin_cos();
    Vec2::new(v.x * c - v.y * s, v.x * s + v.y * c)
}

/// World bounds of a pixel-sized box rotated about a world origin.
fn rotated_box_bounds(origin: Point, local: Rect, rotation: f64, surface: Size) -> Rect {
    let corners = [
        Vec2::new(local.x0, local.y0),
        Vec2::new(local.x1, local.y0),
        Vec2::new(local.x1, local.y1),
        Vec2::new(local.x0, local.y1),
    ];
    let mut bounds: Option<Rect> = None;
    for corner in corners {
        let r = rotate_vec(corner, rotation);
        let p = Point::new(origin.x + r.x / surface.width, origin.y + r.y / surface.height);
        bounds = Some(match bounds {
            Some(b) => b.union_pt(p),
            None => Rect::from_points(p, p),
        });
    }
    bounds.unwrap_or_else(|| Rect::from_points(origin, origin))
}

/// Minimum distance from a point to a line segment.
pub fn point_to_segment_dist(point: Point, a: Point, b: Point) -> f64 {
    let seg = b - a;
    let pv = point - a;
    let len_sq = seg.hypot2();
    if len_sq < f64::EPSILON {
        return pv.hypot();
    }
    let t = (pv.dot(seg) / len_sq).clamp(0.0, 1.0);
    let proj = a + seg * t;
    (point - proj).hypot()
}

/// Minimum distance from a point to a polyline (sequence of connected segments).
pub fn point_to_polyline_dist(point: Point, points: &[Point]) -> f64 {
    points
        .windows(2)
        .map(|w| point_to_segment_dist(point, w[0], w[1]))
        .fold(f64::INFINITY, f64::min)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pen(points: &[(f64, f64)]) -> Shape {
        let pts: Vec<InkPoint> = points.iter().map(|&(x, y)| InkPoint::new(x, y)).collect();
        let origin = pts[0].pos();
        Shape::new(
            ShapeBody::Stroke(StrokeData {
                tool: StrokeTool::Pen,
                points: pts,
                thickness: 4.0,
                color: Paint::Solid(SerializableColor::black()),
                composite: CompositeMode::SourceOver,
            }),
            origin,
        )
    }

    #[test]
    fn test_color_hex_roundtrip() {
        let c = SerializableColor::from_hex("#ff8000").unwrap();
        assert_eq!(c, SerializableColor::new(255, 128, 0, 255));
        assert_eq!(c.to_hex(), "#ff8000");
        assert_eq!(SerializableColor::from_hex("#fff"), Some(SerializableColor::white()));
        assert_eq!(
            SerializableColor::from_hex("00000080"),
            Some(SerializableColor::new(0, 0, 0, 128))
        );
        assert!(SerializableColor::from_hex("#12").is_none());
        assert!(SerializableColor::from_hex("#gggggg").is_none());
    }

    #[test]
    fn test_color_deserializes_from_hex_or_struct() {
        let a: SerializableColor = serde_json::from_str(r##""#000000""##).unwrap();
        let b: SerializableColor = serde_json::from_str(r#"{"r":0,"g":0,"b":0}"#).unwrap();
        assert_eq!(a, b);
        assert!(serde_json::from_str::<SerializableColor>(r#""nope""#).is_err());
    }

    #[test]
    fn test_peniko_conversion() {
        let c = SerializableColor::new(10, 20, 30, 40);
        let back: SerializableColor = Color::from(c).into();
        assert_eq!(c, back);
    }

    #[test]
    fn test_translate_moves_origin_and_points() {
        let mut s = pen(&[(0.1, 0.1), (0.2, 0.3)]);
        s.translate(Vec2::new(0.1, -0.05));
        assert!((s.x - 0.2).abs() < 1e-12);
        let pts = s.points().unwrap();
        assert!((pts[1].x - 0.3).abs() < 1e-12);
        assert!((pts[1].y - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_patch_position_translates_points() {
        let mut s = pen(&[(0.1, 0.1), (0.2, 0.2)]);
        s.apply_patch(&ShapePatch::position(0.5, 0.5));
        let pts = s.points().unwrap();
        assert!((pts[0].x - 0.5).abs() < 1e-12);
        assert!((pts[1].y - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_patch_points_resets_origin() {
        let mut s = pen(&[(0.1, 0.1)]);
        let patch = ShapePatch {
            points: Some(vec![InkPoint::new(0.4, 0.4), InkPoint::new(0.5, 0.5)]),
            opacity: Some(3.0),
            ..Default::default()
        };
        s.apply_patch(&patch);
        assert_eq!(s.points().unwrap().len(), 2);
        assert!((s.x - 0.4).abs() < 1e-12);
        assert!((s.opacity - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_stroke_bounds_include_thickness() {
        let s = pen(&[(0.1, 0.1), (0.2, 0.2)]);
        let b = s.world_bounds(Size::new(1000.0, 1000.0));
        assert!((b.x0 - 0.098).abs() < 1e-9);
        assert!((b.x1 - 0.202).abs() < 1e-9);
    }

    #[test]
    fn test_stroke_hit_test_in_screen_space() {
        let s = pen(&[(0.1, 0.1), (0.5, 0.1)]);
        let v = Viewport::new(1000.0, 1000.0, 1.0);
        assert!(s.hit_test(Point::new(300.0, 103.0), 2.0, &v));
        assert!(!s.hit_test(Point::new(300.0, 120.0), 2.0, &v));
    }

    #[test]
    fn test_serialization_is_flat_and_tagged() {
        let s = pen(&[(0.1, 0.2), (0.3, 0.4)]);
        let json = serde_json::to_value(&s).unwrap();
        assert_eq!(json["type"], "stroke");
        assert_eq!(json["tool"], "pen");
        let back: Shape = serde_json::from_value(json).unwrap();
        assert_eq!(back, s);
    }

    #[test]
    fn test_patch_from_shape_covers_text_fields() {
        let text = Shape::new(
            ShapeBody::Text(TextData::new("hi", FontDescriptor::default(), SerializableColor::black())),
            Point::new(0.1, 0.1),
        );
        let patch = ShapePatch::from_shape(&text);
        assert_eq!(patch.content.as_deref(), Some("hi"));
        assert!(patch.points.is_none());
        assert!(!patch.is_empty());
    }
}
