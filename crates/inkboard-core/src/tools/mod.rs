//! Tool state machines.
//!
//! Exactly one tool is active at a time. Each tool owns its transient
//! gesture state; switching tools drops it after `deactivate` has run.

mod eraser;
mod freehand;
mod laser;
mod pan;
mod select;
mod stamp;
mod text;
mod vector;

pub use eraser::EraserTool;
pub use freehand::{FreehandTool, HIGHLIGHTER_MIN_SIZE, HIGHLIGHTER_OPACITY};
pub use laser::LaserTool;
pub use pan::PanTool;
pub use select::SelectTool;
pub use stamp::StampTool;
pub use text::{TextSession, TextTool};
pub use vector::VectorTool;

use crate::batcher::FrameBatcher;
use crate::config::EngineConfig;
use crate::error::{ToolError, ToolResult};
use crate::input::{KeyEvent, PointerEvent};
use crate::shapes::{Shape, ShapeId, StrokeTool, VectorKind};
use crate::spatial::SpatialIndex;
use crate::store::ShapeStore;
use crate::surface::{CursorIcon, Surface};
use crate::viewport::Viewport;
use kurbo::{Point, Rect, Vec2};
use serde::{Deserialize, Serialize};

/// Available tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    #[default]
    Pen,
    Highlighter,
    Eraser,
    Line,
    Rectangle,
    Circle,
    Arrow,
    Text,
    Stamp,
    Pan,
    Select,
    Laser,
}

impl ToolKind {
    pub fn all() -> &'static [ToolKind] {
        &[
            ToolKind::Pen,
            ToolKind::Highlighter,
            ToolKind::Eraser,
            ToolKind::Line,
            ToolKind::Rectangle,
            ToolKind::Circle,
            ToolKind::Arrow,
            ToolKind::Text,
            ToolKind::Stamp,
            ToolKind::Pan,
            ToolKind::Select,
            ToolKind::Laser,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ToolKind::Pen => "pen",
            ToolKind::Highlighter => "highlighter",
            ToolKind::Eraser => "eraser",
            ToolKind::Line => "line",
            ToolKind::Rectangle => "rectangle",
            ToolKind::Circle => "circle",
            ToolKind::Arrow => "arrow",
            ToolKind::Text => "text",
            ToolKind::Stamp => "stamp",
            ToolKind::Pan => "pan",
            ToolKind::Select => "select",
            ToolKind::Laser => "laser",
        }
    }

    /// Idle cursor for the tool.
    pub fn cursor(&self) -> CursorIcon {
        match self {
            ToolKind::Pan => CursorIcon::Grab,
            ToolKind::Text => CursorIcon::Text,
            ToolKind::Select => CursorIcon::Default,
            ToolKind::Laser => CursorIcon::Pointer,
            ToolKind::Eraser => CursorIcon::None,
            _ => CursorIcon::Crosshair,
        }
    }
}

/// Transient drawing drawn on the ui layer.
///
/// World points are converted by the renderer; pixel sizes are logical
/// pixels (screen pixels unless noted).
#[derive(Debug, Clone, PartialEq)]
pub enum Overlay {
    EraserRing { center: Point, radius: f64 },
    Marquee { rect: Rect },
    /// Trail samples with their current alpha.
    LaserTrail { points: Vec<(Point, f64)> },
    /// Text caret at `origin` plus `offset`; offset and height are px at zoom 1.
    Caret { origin: Point, offset: Vec2, height: f64 },
    /// Selected stamp frame; `half` is px at zoom 1.
    StampHandles { center: Point, half: f64, rotation: f64 },
    SelectionBox { rect: Rect },
    RemoteCursor { position: Point, user: String },
}

/// Everything a tool may touch while handling an event.
pub struct ToolContext<'a> {
    pub store: &'a mut ShapeStore,
    pub spatial: &'a mut SpatialIndex,
    pub batcher: &'a mut FrameBatcher<ShapeStore>,
    pub surface: &'a mut dyn Surface,
    pub config: &'a EngineConfig,
}

impl ToolContext<'_> {
    pub fn viewport(&self) -> Viewport {
        *self.store.viewport()
    }

    /// Screen → world, failing on a degenerate viewport.
    pub fn to_world(&self, screen: Point) -> Result<Point, ToolError> {
        let world = self.store.viewport().screen_to_world(screen);
        if world.x.is_finite() && world.y.is_finite() {
            Ok(world)
        } else {
            Err(ToolError::NonFinite {
                x: screen.x,
                y: screen.y,
            })
        }
    }

    /// Topmost shape accepted by `filter` whose outline is within
    /// `tolerance` screen pixels of `screen`.
    pub fn topmost_hit(&mut self, screen: Point, tolerance: f64, filter: impl Fn(&Shape) -> bool) -> Option<ShapeId> {
        let viewport = self.viewport();
        let world = self.to_world(screen).ok()?;
        let reach = viewport.screen_delta_to_world(Vec2::new(tolerance.max(1.0), tolerance.max(1.0)));
        let area = Rect::new(world.x - reach.x, world.y - reach.y, world.x + reach.x, world.y + reach.y);
        let candidates = self.spatial.query_rect(self.store, area);
        candidates.into_iter().rev().find(|id| {
            self.store
                .shape(*id)
                .is_some_and(|shape| filter(shape) && shape.hit_test(screen, tolerance, &viewport))
        })
    }
}

/// Scale that turns world distances into screen pixels along each axis.
pub(crate) fn pixel_scale(viewport: &Viewport) -> Vec2 {
    Vec2::new(viewport.width * viewport.zoom, viewport.height * viewport.zoom)
}

/// Contract every tool implements.
pub trait ToolBehavior {
    fn activate(&mut self, _cx: &mut ToolContext<'_>) {}

    /// Release capture and drop transient state.
    fn deactivate(&mut self, cx: &mut ToolContext<'_>);

    fn pointer_down(&mut self, event: &PointerEvent, cx: &mut ToolContext<'_>) -> ToolResult;

    fn pointer_move(&mut self, event: &PointerEvent, cx: &mut ToolContext<'_>) -> ToolResult;

    fn pointer_up(&mut self, event: &PointerEvent, cx: &mut ToolContext<'_>) -> ToolResult;

    fn key_down(&mut self, _event: &KeyEvent, _cx: &mut ToolContext<'_>) -> ToolResult {
        Ok(false)
    }

    /// Timer work (inertia, caret blink, trail fade). Returns true when
    /// something visible changed.
    fn on_frame(&mut self, _now_ms: f64, _cx: &mut ToolContext<'_>) -> bool {
        false
    }

    /// Pointer captured by an in-progress gesture.
    fn captured_pointer(&self) -> Option<u32>;

    /// Whether a gesture or edit session is in progress.
    fn is_active(&self) -> bool {
        self.captured_pointer().is_some()
    }

    /// Stored shape owned by the current gesture; the shapes layer skips it.
    fn in_flight(&self) -> Option<ShapeId> {
        None
    }

    /// Locally held shape drawn on the preview layer.
    fn preview_shape(&self) -> Option<&Shape> {
        None
    }

    fn overlays(&self, _out: &mut Vec<Overlay>) {}
}

/// The active tool, one variant per tool implementation.
#[derive(Debug)]
pub enum ActiveTool {
    Freehand(FreehandTool),
    Vector(VectorTool),
    Eraser(EraserTool),
    Text(TextTool),
    Stamp(StampTool),
    Pan(PanTool),
    Select(SelectTool),
    Laser(LaserTool),
}

impl ActiveTool {
    /// Fresh, idle tool state for `kind`.
    pub fn new(kind: ToolKind, config: &EngineConfig) -> Self {
        match kind {
            ToolKind::Pen => ActiveTool::Freehand(FreehandTool::new(StrokeTool::Pen)),
            ToolKind::Highlighter => ActiveTool::Freehand(FreehandTool::new(StrokeTool::Highlighter)),
            ToolKind::Eraser => ActiveTool::Eraser(EraserTool::new(config.eraser_radius)),
            ToolKind::Line => ActiveTool::Vector(VectorTool::new(VectorKind::Line)),
            ToolKind::Rectangle => ActiveTool::Vector(VectorTool::new(VectorKind::Rectangle)),
            ToolKind::Circle => ActiveTool::Vector(VectorTool::new(VectorKind::Circle)),
            ToolKind::Arrow => ActiveTool::Vector(VectorTool::new(VectorKind::Arrow)),
            ToolKind::Text => ActiveTool::Text(TextTool::new(config)),
            ToolKind::Stamp => ActiveTool::Stamp(StampTool::new()),
            ToolKind::Pan => ActiveTool::Pan(PanTool::new()),
            ToolKind::Select => ActiveTool::Select(SelectTool::new()),
            ToolKind::Laser => ActiveTool::Laser(LaserTool::new(config.laser_fade_ms)),
        }
    }

    pub fn kind(&self) -> ToolKind {
        match self {
            ActiveTool::Freehand(t) => match t.stroke_tool() {
                StrokeTool::Pen => ToolKind::Pen,
                StrokeTool::Highlighter => ToolKind::Highlighter,
            },
            ActiveTool::Vector(t) => match t.vector_kind() {
                VectorKind::Line => ToolKind::Line,
                VectorKind::Rectangle => ToolKind::Rectangle,
                VectorKind::Circle => ToolKind::Circle,
                VectorKind::Arrow => ToolKind::Arrow,
            },
            ActiveTool::Eraser(_) => ToolKind::Eraser,
            ActiveTool::Text(_) => ToolKind::Text,
            ActiveTool::Stamp(_) => ToolKind::Stamp,
            ActiveTool::Pan(_) => ToolKind::Pan,
            ActiveTool::Select(_) => ToolKind::Select,
            ActiveTool::Laser(_) => ToolKind::Laser,
        }
    }

    fn behavior(&self) -> &dyn ToolBehavior {
        match self {
            ActiveTool::Freehand(t) => t,
            ActiveTool::Vector(t) => t,
            ActiveTool::Eraser(t) => t,
            ActiveTool::Text(t) => t,
            ActiveTool::Stamp(t) => t,
            ActiveTool::Pan(t) => t,
            ActiveTool::Select(t) => t,
            ActiveTool::Laser(t) => t,
        }
    }

    fn behavior_mut(&mut self) -> &mut dyn ToolBehavior {
        match self {
            ActiveTool::Freehand(t) => t,
            ActiveTool::Vector(t) => t,
            ActiveTool::Eraser(t) => t,
            ActiveTool::Text(t) => t,
            ActiveTool::Stamp(t) => t,
            ActiveTool::Pan(t) => t,
            ActiveTool::Select(t) => t,
            ActiveTool::Laser(t) => t,
        }
    }

    pub fn activate(&mut self, cx: &mut ToolContext<'_>) {
        cx.surface.set_cursor(self.kind().cursor());
        self.behavior_mut().activate(cx);
    }

    pub fn deactivate(&mut self, cx: &mut ToolContext<'_>) {
        self.behavior_mut().deactivate(cx);
        cx.batcher.cancel();
        cx.surface.set_cursor(CursorIcon::Default);
    }

    /// Drop the gesture without committing anything: cancel batched work,
    /// release capture and reset to a fresh tool of the same kind.
    pub fn abort(&mut self, cx: &mut ToolContext<'_>) {
        cx.batcher.cancel();
        if let Some(pointer_id) = self.captured_pointer() {
            cx.surface.release_pointer(pointer_id);
        }
        *self = ActiveTool::new(self.kind(), cx.config);
        self.activate(cx);
    }

    /// Non-primary buttons are ignored by every tool.
    pub fn pointer_down(&mut self, event: &PointerEvent, cx: &mut ToolContext<'_>) -> ToolResult {
        if !event.is_primary() {
            return Ok(false);
        }
        self.behavior_mut().pointer_down(event, cx)
    }

    pub fn pointer_move(&mut self, event: &PointerEvent, cx: &mut ToolContext<'_>) -> ToolResult {
        self.behavior_mut().pointer_move(event, cx)
    }

    pub fn pointer_up(&mut self, event: &PointerEvent, cx: &mut ToolContext<'_>) -> ToolResult {
        if !event.is_primary() {
            return Ok(false);
        }
        self.behavior_mut().pointer_up(event, cx)
    }

    pub fn key_down(&mut self, event: &KeyEvent, cx: &mut ToolContext<'_>) -> ToolResult {
        self.behavior_mut().key_down(event, cx)
    }

    pub fn on_frame(&mut self, now_ms: f64, cx: &mut ToolContext<'_>) -> bool {
        self.behavior_mut().on_frame(now_ms, cx)
    }

    pub fn captured_pointer(&self) -> Option<u32> {
        self.behavior().captured_pointer()
    }

    pub fn is_active(&self) -> bool {
        self.behavior().is_active()
    }

    pub fn in_flight(&self) -> Option<ShapeId> {
        self.behavior().in_flight()
    }

    pub fn preview_shape(&self) -> Option<&Shape> {
        self.behavior().preview_shape()
    }

    pub fn overlays(&self, out: &mut Vec<Overlay>) {
        self.behavior().overlays(out)
    }

    /// Text edit session, when the text tool is active and editing.
    pub fn text_session(&self) -> Option<&TextSession> {
        match self {
            ActiveTool::Text(t) => t.session(),
            _ => None,
        }
    }
}
