//! Selection tool: click or marquee to select, drag to move, keys to delete.

use super::{Overlay, ToolBehavior, ToolContext};
use crate::error::{ToolError, ToolResult};
use crate::input::{Key, KeyEvent, PointerEvent};
use crate::shapes::ShapeId;
use crate::store::ShapeStore;
use crate::surface::CursorIcon;
use kurbo::{Point, Rect, Vec2};
use std::rc::Rc;

#[derive(Debug)]
enum SelectGesture {
    Marquee {
        pointer_id: u32,
        start: Point,
        current: Point,
        additive: bool,
    },
    Move {
        pointer_id: u32,
        start: Point,
        /// Origins at press time of every movable selected shape.
        origins: Rc<Vec<(ShapeId, Point)>>,
        delta: Vec2,
    },
}

impl SelectGesture {
    fn pointer_id(&self) -> u32 {
        match self {
            SelectGesture::Marquee { pointer_id, .. } | SelectGesture::Move { pointer_id, .. } => *pointer_id,
        }
    }
}

fn move_to(store: &mut ShapeStore, origins: &[(ShapeId, Point)], delta: Vec2) -> usize {
    origins
        .iter()
        .filter(|(id, origin)| {
            let target = *origin + delta;
            store.update_shape_with(*id, |shape| shape.translate(target - shape.origin()))
        })
        .count()
}

/// Put back any shape a batched frame already moved away from its origin.
fn restore(store: &mut ShapeStore, origins: &[(ShapeId, Point)]) {
    let displaced: Vec<(ShapeId, Point)> = origins
        .iter()
        .filter(|(id, origin)| store.shape(*id).is_some_and(|shape| shape.origin() != *origin))
        .copied()
        .collect();
    move_to(store, &displaced, Vec2::ZERO);
}

#[derive(Debug, Default)]
pub struct SelectTool {
    gesture: Option<SelectGesture>,
}

impl SelectTool {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ToolBehavior for SelectTool {
    fn deactivate(&mut self, cx: &mut ToolContext<'_>) {
        if let Some(gesture) = self.gesture.take() {
            cx.surface.release_pointer(gesture.pointer_id());
            if let SelectGesture::Move { origins, .. } = gesture {
                restore(cx.store, &origins);
            }
        }
    }

    fn pointer_down(&mut self, event: &PointerEvent, cx: &mut ToolContext<'_>) -> ToolResult {
        if self.gesture.is_some() {
            return Ok(false);
        }
        let world = cx.to_world(event.position)?;
        let additive = event.modifiers.shift;
        let hit = cx.topmost_hit(event.position, cx.config.hit_tolerance, |_| true);
        cx.surface.capture_pointer(event.pointer_id);

        let Some(id) = hit else {
            if !additive {
                cx.store.clear_selection();
            }
            self.gesture = Some(SelectGesture::Marquee {
                pointer_id: event.pointer_id,
                start: world,
                current: world,
                additive,
            });
            return Ok(true);
        };

        if !cx.store.is_selected(id) {
            if additive {
                cx.store.extend_selection([id]);
            } else {
                cx.store.set_selection([id]);
            }
        }
        let origins: Vec<(ShapeId, Point)> = cx
            .store
            .selection()
            .iter()
            .filter_map(|id| cx.store.shape(*id))
            .filter(|shape| !shape.locked)
            .map(|shape| (shape.id(), shape.origin()))
            .collect();
        cx.surface.set_cursor(CursorIcon::Move);
        self.gesture = Some(SelectGesture::Move {
            pointer_id: event.pointer_id,
            start: world,
            origins: Rc::new(origins),
            delta: Vec2::ZERO,
        });
        Ok(true)
    }

    fn pointer_move(&mut self, event: &PointerEvent, cx: &mut ToolContext<'_>) -> ToolResult {
        let Some(gesture) = self.gesture.as_mut().filter(|g| g.pointer_id() == event.pointer_id) else {
            return Ok(false);
        };
        let world = cx.to_world(event.position)?;
        match gesture {
            SelectGesture::Marquee { current, .. } => *current = world,
            SelectGesture::Move {
                start, origins, delta, ..
            } => {
                *delta = world - *start;
                let origins = Rc::clone(origins);
                let delta = *delta;
                cx.batcher.schedule(move |store: &mut ShapeStore| {
                    move_to(store, &origins, delta);
                });
            }
        }
        Ok(true)
    }

    fn pointer_up(&mut self, event: &PointerEvent, cx: &mut ToolContext<'_>) -> ToolResult {
        let Some(gesture) = self.gesture.take_if(|g| g.pointer_id() == event.pointer_id) else {
            return Ok(false);
        };
        cx.surface.release_pointer(gesture.pointer_id());
        cx.surface.set_cursor(CursorIcon::Default);
        match gesture {
            SelectGesture::Marquee {
                start,
                current,
                additive,
                ..
            } => {
                let rect = Rect::from_points(start, current);
                let inside: Vec<ShapeId> = cx
                    .store
                    .shapes_ordered()
                    .filter(|shape| {
                        let o = shape.origin();
                        o.x >= rect.x0 && o.x <= rect.x1 && o.y >= rect.y0 && o.y <= rect.y1
                    })
                    .map(|shape| shape.id())
                    .collect();
                log::debug!("Marquee selected {} shapes", inside.len());
                if additive {
                    cx.store.extend_selection(inside);
                } else {
                    cx.store.set_selection(inside);
                }
            }
            SelectGesture::Move { start, origins, .. } => {
                cx.batcher.cancel();
                let world = cx.to_world(event.position)?;
                let delta = world - start;
                if origins.is_empty() {
                    return Ok(true);
                }
                if delta == Vec2::ZERO {
                    restore(cx.store, &origins);
                    return Ok(true);
                }
                if move_to(cx.store, &origins, delta) == 0 {
                    let id = origins[0].0;
                    return Err(ToolError::ShapeVanished(id));
                }
                cx.store.save_history("move");
            }
        }
        Ok(true)
    }

    fn key_down(&mut self, event: &KeyEvent, cx: &mut ToolContext<'_>) -> ToolResult {
        match &event.key {
            Key::Delete | Key::Backspace => {
                let ids: Vec<ShapeId> = cx
                    .store
                    .selection()
                    .iter()
                    .copied()
                    .filter(|id| cx.store.shape(*id).is_some_and(|shape| !shape.locked))
                    .collect();
                Ok(cx.store.delete_shapes(&ids) > 0)
            }
            Key::Character(c) if event.modifiers.command() && c.eq_ignore_ascii_case("a") => {
                cx.store.select_all();
                Ok(true)
            }
            Key::Escape => {
                let had = !cx.store.selection().is_empty();
                cx.store.clear_selection();
                Ok(had)
            }
            _ => Ok(false),
        }
    }

    fn captured_pointer(&self) -> Option<u32> {
        self.gesture.as_ref().map(SelectGesture::pointer_id)
    }

    fn overlays(&self, out: &mut Vec<Overlay>) {
        if let Some(SelectGesture::Marquee { start, current, .. }) = &self.gesture {
            out.push(Overlay::Marquee {
                rect: Rect::from_points(*start, *current),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::Harness;
    use super::*;
    use crate::input::Modifiers;
    use crate::shapes::{SerializableColor, Shape, ShapeBody, VectorData, VectorKind};

    fn add_line(h: &mut Harness, a: (f64, f64), b: (f64, f64)) -> ShapeId {
        let data = VectorData::new(
            VectorKind::Line,
            Point::new(a.0, a.1),
            Point::new(b.0, b.1),
            SerializableColor::black(),
            2.0,
        );
        h.store.add_shape(Shape::new(ShapeBody::Vector(data), Point::new(a.0, a.1)))
    }

    #[test]
    fn test_marquee_selects_by_origin() {
        let mut h = Harness::new();
        let a = add_line(&mut h, (0.2, 0.2), (0.3, 0.3));
        let b = add_line(&mut h, (0.7, 0.7), (0.8, 0.8));
        let mut tool = SelectTool::new();
        tool.pointer_down(&PointerEvent::new(100.0, 100.0), &mut h.cx()).unwrap();
        tool.pointer_move(&PointerEvent::new(400.0, 400.0), &mut h.cx()).unwrap();
        let mut out = Vec::new();
        tool.overlays(&mut out);
        assert!(matches!(out.as_slice(), [Overlay::Marquee { .. }]));
        tool.pointer_up(&PointerEvent::new(400.0, 400.0), &mut h.cx()).unwrap();
        assert!(h.store.is_selected(a));
        assert!(!h.store.is_selected(b));
    }

    #[test]
    fn test_drag_moves_selection_with_one_entry() {
        let mut h = Harness::new();
        let a = add_line(&mut h, (0.2, 0.2), (0.3, 0.3));
        let before = h.store.history_len();
        let mut tool = SelectTool::new();
        tool.pointer_down(&PointerEvent::new(250.0, 250.0), &mut h.cx()).unwrap();
        assert!(h.store.is_selected(a));
        tool.pointer_move(&PointerEvent::new(300.0, 260.0), &mut h.cx()).unwrap();
        h.frame();
        tool.pointer_move(&PointerEvent::new(350.0, 270.0), &mut h.cx()).unwrap();
        tool.pointer_up(&PointerEvent::new(350.0, 270.0), &mut h.cx()).unwrap();

        let shape = h.store.shape(a).unwrap();
        assert!((shape.x - 0.3).abs() < 1e-9);
        assert!((shape.y - 0.22).abs() < 1e-9);
        assert_eq!(h.store.history_len(), before + 1);
        assert_eq!(h.store.current_action(), "move");
    }

    #[test]
    fn test_drag_back_to_start_restores_shapes() {
        let mut h = Harness::new();
        let a = add_line(&mut h, (0.2, 0.2), (0.3, 0.3));
        let before = h.store.history_len();
        let mut tool = SelectTool::new();
        tool.pointer_down(&PointerEvent::new(250.0, 250.0), &mut h.cx()).unwrap();
        tool.pointer_move(&PointerEvent::new(350.0, 350.0), &mut h.cx()).unwrap();
        h.frame();
        assert!((h.store.shape(a).unwrap().x - 0.3).abs() < 1e-9);

        tool.pointer_move(&PointerEvent::new(250.0, 250.0), &mut h.cx()).unwrap();
        tool.pointer_up(&PointerEvent::new(250.0, 250.0), &mut h.cx()).unwrap();

        let shape = h.store.shape(a).unwrap();
        assert!((shape.x - 0.2).abs() < 1e-9);
        assert!((shape.y - 0.2).abs() < 1e-9);
        assert_eq!(h.store.history_len(), before);
    }

    #[test]
    fn test_click_without_drag_leaves_store_untouched() {
        let mut h = Harness::new();
        add_line(&mut h, (0.2, 0.2), (0.3, 0.3));
        h.store.take_changes();
        let mut tool = SelectTool::new();
        let ev = PointerEvent::new(250.0, 250.0);
        tool.pointer_down(&ev, &mut h.cx()).unwrap();
        tool.pointer_up(&ev, &mut h.cx()).unwrap();
        assert!(h.store.take_changes().is_empty());
    }

    #[test]
    fn test_delete_skips_locked_shapes() {
        let mut h = Harness::new();
        let a = add_line(&mut h, (0.2, 0.2), (0.3, 0.3));
        let b = add_line(&mut h, (0.7, 0.7), (0.8, 0.8));
        h.store.update_shape_with(b, |shape| shape.locked = true);
        h.store.save_history("lock");
        h.store.select_all();
        let mut tool = SelectTool::new();
        assert!(tool.key_down(&KeyEvent::new(Key::Backspace), &mut h.cx()).unwrap());
        assert!(!h.store.contains(a));
        assert!(h.store.contains(b));

        // Nothing left to delete.
        h.store.select_all();
        assert!(!tool.key_down(&KeyEvent::new(Key::Delete), &mut h.cx()).unwrap());
        assert!(h.store.contains(b));
    }

    #[test]
    fn test_delete_and_select_all_keys() {
        let mut h = Harness::new();
        let a = add_line(&mut h, (0.2, 0.2), (0.3, 0.3));
        let b = add_line(&mut h, (0.7, 0.7), (0.8, 0.8));
        let mut tool = SelectTool::new();
        let ctrl_a = KeyEvent::character("a").with_modifiers(Modifiers {
            ctrl: true,
            ..Modifiers::default()
        });
        assert!(tool.key_down(&ctrl_a, &mut h.cx()).unwrap());
        assert_eq!(h.store.selection().len(), 2);
        assert!(tool.key_down(&KeyEvent::new(Key::Delete), &mut h.cx()).unwrap());
        assert!(!h.store.contains(a) && !h.store.contains(b));
        assert_eq!(h.store.current_action(), "delete");
    }

    #[test]
    fn test_shift_click_extends_selection() {
        let mut h = Harness::new();
        let a = add_line(&mut h, (0.2, 0.2), (0.3, 0.3));
        let b = add_line(&mut h, (0.7, 0.7), (0.8, 0.8));
        let mut tool = SelectTool::new();
        let click = |tool: &mut SelectTool, h: &mut Harness, x: f64, y: f64, m: Modifiers| {
            let ev = PointerEvent::new(x, y).with_modifiers(m);
            tool.pointer_down(&ev, &mut h.cx()).unwrap();
            tool.pointer_up(&ev, &mut h.cx()).unwrap();
        };
        click(&mut tool, &mut h, 250.0, 250.0, Modifiers::default());
        click(&mut tool, &mut h, 750.0, 750.0, Modifiers::SHIFT);
        assert!(h.store.is_selected(a) && h.store.is_selected(b));
        click(&mut tool, &mut h, 900.0, 100.0, Modifiers::default());
        assert!(h.store.selection().is_empty());
    }
}
