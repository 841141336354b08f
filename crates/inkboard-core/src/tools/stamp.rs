//! Stamp tool: place glyph stamps, then move, resize and rotate them.

use super::{Overlay, ToolBehavior, ToolContext};
use crate::config::EngineConfig;
use crate::error::{ToolError, ToolResult};
use crate::input::{Key, KeyEvent, Modifiers, PointerEvent};
use crate::shapes::{stamp_hit, Shape, ShapeBody, ShapeId, ShapeKind, ShapePatch, StampData, StampHit};
use crate::snap::{snap_rotation, snap_scale};
use crate::store::ShapeStore;
use crate::surface::CursorIcon;
use crate::viewport::Viewport;
use kurbo::Point;

pub const MIN_STAMP_SCALE: f64 = 0.1;
pub const MAX_STAMP_SCALE: f64 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StampAction {
    Place,
    Move,
    Resize,
    Rotate,
}

impl StampAction {
    fn label(self) -> &'static str {
        match self {
            StampAction::Place => "stamp",
            StampAction::Move => "move",
            StampAction::Resize => "resize",
            StampAction::Rotate => "rotate",
        }
    }
}

#[derive(Debug)]
struct StampGesture {
    pointer_id: u32,
    action: StampAction,
    id: Option<ShapeId>,
    /// Press position, screen px.
    start: Point,
    /// Stamp state at press time.
    origin: Point,
    scale: f64,
    rotation: f64,
    changed: bool,
}

/// Handle frame of the selected stamp, cached for the ui layer.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Handles {
    center: Point,
    half: f64,
    rotation: f64,
}

#[derive(Debug, Default)]
pub struct StampTool {
    selected: Option<ShapeId>,
    gesture: Option<StampGesture>,
    handles: Option<Handles>,
}

/// Screen center and on-screen half edge of a stamp.
fn stamp_geometry(shape: &Shape, viewport: &Viewport) -> Option<(Point, f64)> {
    match &shape.body {
        ShapeBody::Stamp(data) => Some((
            viewport.world_to_screen(shape.origin()),
            data.size * shape.scale * viewport.zoom / 2.0,
        )),
        _ => None,
    }
}

fn is_stamp(shape: &Shape) -> bool {
    shape.kind() == ShapeKind::Stamp && !shape.locked
}

impl StampTool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selected(&self) -> Option<ShapeId> {
        self.selected
    }

    /// Re-read the selected stamp. Returns true when the frame moved.
    fn refresh_handles(&mut self, cx: &ToolContext<'_>) -> bool {
        let handles = self.selected.and_then(|id| cx.store.shape(id)).and_then(|shape| match &shape.body {
            ShapeBody::Stamp(data) => Some(Handles {
                center: shape.origin(),
                half: data.size * shape.scale / 2.0,
                rotation: shape.rotation,
            }),
            _ => None,
        });
        if handles.is_none() {
            self.selected = None;
        }
        let changed = handles != self.handles;
        self.handles = handles;
        changed
    }

    /// Which handle of the selected stamp lies under `screen`.
    fn handle_under(&self, screen: Point, cx: &ToolContext<'_>) -> Option<(ShapeId, StampHit)> {
        let id = self.selected?;
        let shape = cx.store.shape(id)?;
        let (center, half) = stamp_geometry(shape, cx.store.viewport())?;
        stamp_hit(center, half, shape.rotation, screen, true).map(|hit| (id, hit))
    }

    /// Absolute patch for the gesture at pointer position `screen`.
    fn patch_for(gesture: &StampGesture, screen: Point, modifiers: Modifiers, viewport: &Viewport, config: &EngineConfig) -> Option<ShapePatch> {
        match gesture.action {
            StampAction::Place => None,
            StampAction::Move => {
                let delta = viewport.screen_to_world(screen) - viewport.screen_to_world(gesture.start);
                let target = gesture.origin + delta;
                Some(ShapePatch::position(target.x, target.y))
            }
            StampAction::Resize => {
                let center = viewport.world_to_screen(gesture.origin);
                let d0 = (gesture.start - center).hypot();
                if d0 < 1.0 {
                    return None;
                }
                let mut scale = gesture.scale * (screen - center).hypot() / d0;
                if modifiers.shift {
                    scale = snap_scale(scale, config.stamp_scale_snap);
                }
                Some(ShapePatch {
                    scale: Some(scale.clamp(MIN_STAMP_SCALE, MAX_STAMP_SCALE)),
                    ..ShapePatch::default()
                })
            }
            StampAction::Rotate => {
                let center = viewport.world_to_screen(gesture.origin);
                let a0 = (gesture.start - center).atan2();
                let a1 = (screen - center).atan2();
                let mut rotation = gesture.rotation + (a1 - a0);
                if modifiers.shift {
                    rotation = snap_rotation(rotation, config.stamp_rotate_snap_deg);
                }
                Some(ShapePatch {
                    rotation: Some(rotation),
                    ..ShapePatch::default()
                })
            }
        }
    }

    fn place(&mut self, screen: Point, cx: &mut ToolContext<'_>) -> ToolResult {
        let world = cx.to_world(screen)?;
        let settings = cx.store.settings();
        let zoom = cx.store.viewport().zoom;
        let data = StampData {
            glyph: settings.stamp_glyph.clone(),
            size: settings.stamp_size / zoom,
        };
        let shape = Shape::new(ShapeBody::Stamp(data), world).with_opacity(settings.opacity);
        let id = cx.store.insert_shape(shape);
        cx.store.save_history(StampAction::Place.label());
        self.selected = Some(id);
        log::debug!("Placed stamp {id}");
        Ok(true)
    }
}

impl ToolBehavior for StampTool {
    fn deactivate(&mut self, cx: &mut ToolContext<'_>) {
        if let Some(gesture) = self.gesture.take() {
            cx.surface.release_pointer(gesture.pointer_id);
            if let (Some(id), true) = (gesture.id, gesture.changed) {
                let restore = ShapePatch {
                    x: Some(gesture.origin.x),
                    y: Some(gesture.origin.y),
                    scale: Some(gesture.scale),
                    rotation: Some(gesture.rotation),
                    ..ShapePatch::default()
                };
                cx.store.update_shape(id, &restore);
            }
        }
        self.selected = None;
        self.handles = None;
    }

    fn pointer_down(&mut self, event: &PointerEvent, cx: &mut ToolContext<'_>) -> ToolResult {
        if self.gesture.is_some() {
            return Ok(false);
        }
        let target = match self.handle_under(event.position, cx) {
            Some((id, StampHit::Rotate)) => Some((id, StampAction::Rotate)),
            Some((id, StampHit::Corner(_))) => Some((id, StampAction::Resize)),
            Some((id, StampHit::Body)) => Some((id, StampAction::Move)),
            None => cx
                .topmost_hit(event.position, 0.0, is_stamp)
                .map(|id| (id, StampAction::Move)),
        };
        let (id, action) = match target {
            Some((id, action)) => (Some(id), action),
            None => (None, StampAction::Place),
        };
        self.selected = id;
        let (origin, scale, rotation) = id
            .and_then(|id| cx.store.shape(id))
            .map(|s| (s.origin(), s.scale, s.rotation))
            .unwrap_or((Point::ZERO, 1.0, 0.0));
        cx.surface.capture_pointer(event.pointer_id);
        self.gesture = Some(StampGesture {
            pointer_id: event.pointer_id,
            action,
            id,
            start: event.position,
            origin,
            scale,
            rotation,
            changed: false,
        });
        self.refresh_handles(cx);
        Ok(true)
    }

    fn pointer_move(&mut self, event: &PointerEvent, cx: &mut ToolContext<'_>) -> ToolResult {
        let dragging = self
            .gesture
            .as_ref()
            .is_some_and(|g| g.pointer_id == event.pointer_id);
        if !dragging {
            // Hover feedback over the selected stamp's handles.
            let icon = match self.handle_under(event.position, cx) {
                Some((_, StampHit::Rotate)) => CursorIcon::Rotate,
                Some((_, StampHit::Corner(_))) => CursorIcon::ResizeNwse,
                Some((_, StampHit::Body)) => CursorIcon::Move,
                None => CursorIcon::Crosshair,
            };
            cx.surface.set_cursor(icon);
            return Ok(false);
        }
        let Some(gesture) = self.gesture.as_mut() else {
            return Ok(false);
        };
        let viewport = cx.viewport();
        let (Some(id), Some(patch)) = (
            gesture.id,
            Self::patch_for(gesture, event.position, event.modifiers, &viewport, cx.config),
        ) else {
            return Ok(false);
        };
        gesture.changed = true;
        cx.batcher.schedule(move |store: &mut ShapeStore| {
            store.update_shape(id, &patch);
        });
        Ok(true)
    }

    fn pointer_up(&mut self, event: &PointerEvent, cx: &mut ToolContext<'_>) -> ToolResult {
        let Some(gesture) = self.gesture.take_if(|g| g.pointer_id == event.pointer_id) else {
            return Ok(false);
        };
        cx.batcher.cancel();
        cx.surface.release_pointer(gesture.pointer_id);

        if gesture.action == StampAction::Place {
            self.place(event.position, cx)?;
            self.refresh_handles(cx);
            return Ok(true);
        }
        let Some(id) = gesture.id else {
            return Ok(false);
        };
        let viewport = cx.viewport();
        let Some(patch) = Self::patch_for(&gesture, event.position, event.modifiers, &viewport, cx.config) else {
            return Ok(true);
        };
        if !cx.store.update_shape(id, &patch) {
            return Err(ToolError::ShapeVanished(id));
        }
        let unchanged = cx
            .store
            .shape(id)
            .is_some_and(|s| s.origin() == gesture.origin && s.scale == gesture.scale && s.rotation == gesture.rotation);
        if !unchanged {
            cx.store.save_history(gesture.action.label());
        }
        self.refresh_handles(cx);
        Ok(true)
    }

    fn key_down(&mut self, event: &KeyEvent, cx: &mut ToolContext<'_>) -> ToolResult {
        let handled = match event.key {
            Key::Delete | Key::Backspace => match self.selected.take() {
                Some(id) => cx.store.delete_shape(id),
                None => false,
            },
            Key::Escape => self.selected.take().is_some(),
            _ => false,
        };
        self.refresh_handles(cx);
        Ok(handled)
    }

    fn captured_pointer(&self) -> Option<u32> {
        self.gesture.as_ref().map(|g| g.pointer_id)
    }

    fn on_frame(&mut self, _now_ms: f64, cx: &mut ToolContext<'_>) -> bool {
        self.refresh_handles(cx)
    }

    fn overlays(&self, out: &mut Vec<Overlay>) {
        if let Some(h) = self.handles {
            out.push(Overlay::StampHandles {
                center: h.center,
                half: h.half,
                rotation: h.rotation,
            });
        }
    }
}
