//! Object eraser: removes whole shapes touched by the eraser ring.

use super::{Overlay, ToolBehavior, ToolContext};
use crate::error::{ToolError, ToolResult};
use crate::input::PointerEvent;
use crate::shapes::ShapeId;
use crate::store::ShapeStore;
use kurbo::{Point, Rect, Vec2};
use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;

#[derive(Debug)]
struct Erase {
    pointer_id: u32,
    /// Ids hit so far; removed from the store in the next frame.
    pending: Rc<RefCell<BTreeSet<ShapeId>>>,
    last_screen: Point,
}

#[derive(Debug)]
pub struct EraserTool {
    /// Ring radius in screen px.
    radius: f64,
    /// Last known cursor position (world) for the ring overlay.
    hover: Option<Point>,
    gesture: Option<Erase>,
}

impl EraserTool {
    pub fn new(radius: f64) -> Self {
        Self {
            radius: radius.max(1.0),
            hover: None,
            gesture: None,
        }
    }

    /// Stage every shape within the ring at `screen`. Returns how many were new.
    fn erase_at(&self, pending: &RefCell<BTreeSet<ShapeId>>, screen: Point, cx: &mut ToolContext<'_>) -> Result<usize, ToolError> {
        let world = cx.to_world(screen)?;
        let viewport = cx.viewport();
        let reach = viewport.screen_delta_to_world(Vec2::new(self.radius, self.radius));
        let area = Rect::new(world.x - reach.x, world.y - reach.y, world.x + reach.x, world.y + reach.y);
        let candidates = cx.spatial.query_rect(cx.store, area);

        let mut staged = 0;
        for id in candidates {
            if pending.borrow().contains(&id) {
                continue;
            }
            let Some(shape) = cx.store.shape(id) else {
                continue;
            };
            if shape.locked {
                continue;
            }
            if shape.hit_test(screen, self.radius, &viewport) {
                pending.borrow_mut().insert(id);
                staged += 1;
            }
        }
        Ok(staged)
    }

    /// Sample the segment at half-radius steps so fast strokes leave no gaps.
    fn erase_along(&self, pending: &RefCell<BTreeSet<ShapeId>>, from: Point, to: Point, cx: &mut ToolContext<'_>) -> Result<usize, ToolError> {
        let distance = (to - from).hypot();
        let steps = (distance / (self.radius / 2.0)).ceil().max(1.0) as usize;
        let mut staged = 0;
        for i in 1..=steps {
            let t = i as f64 / steps as f64;
            staged += self.erase_at(pending, from.lerp(to, t), cx)?;
        }
        Ok(staged)
    }

    fn schedule_removal(pending: &Rc<RefCell<BTreeSet<ShapeId>>>, cx: &mut ToolContext<'_>) {
        let pending = Rc::clone(pending);
        cx.batcher.schedule(move |store: &mut ShapeStore| {
            let ids: Vec<ShapeId> = pending.borrow().iter().copied().collect();
            store.remove_shapes(&ids);
        });
    }

    /// Apply pending removals now and record one history entry for the gesture.
    fn finish(erase: Erase, cx: &mut ToolContext<'_>) {
        cx.batcher.flush(cx.store);
        cx.surface.release_pointer(erase.pointer_id);
        let count = erase.pending.borrow().len();
        if count > 0 {
            cx.store.save_history("erase");
            log::debug!("Erased {count} shapes");
        }
    }
}

impl ToolBehavior for EraserTool {
    fn deactivate(&mut self, cx: &mut ToolContext<'_>) {
        self.hover = None;
        if let Some(erase) = self.gesture.take() {
            Self::finish(erase, cx);
        }
    }

    fn pointer_down(&mut self, event: &PointerEvent, cx: &mut ToolContext<'_>) -> ToolResult {
        if self.gesture.is_some() {
            return Ok(false);
        }
        self.hover = Some(cx.to_world(event.position)?);
        let pending = Rc::new(RefCell::new(BTreeSet::new()));
        cx.surface.capture_pointer(event.pointer_id);
        if self.erase_at(&pending, event.position, cx)? > 0 {
            Self::schedule_removal(&pending, cx);
        }
        self.gesture = Some(Erase {
            pointer_id: event.pointer_id,
            pending,
            last_screen: event.position,
        });
        Ok(true)
    }

    fn pointer_move(&mut self, event: &PointerEvent, cx: &mut ToolContext<'_>) -> ToolResult {
        self.hover = Some(cx.to_world(event.position)?);
        let Some((pending, last)) = self
            .gesture
            .as_ref()
            .filter(|e| e.pointer_id == event.pointer_id)
            .map(|e| (Rc::clone(&e.pending), e.last_screen))
        else {
            // Hover only moves the ring.
            return Ok(true);
        };
        if self.erase_along(&pending, last, event.position, cx)? > 0 {
            Self::schedule_removal(&pending, cx);
        }
        if let Some(erase) = self.gesture.as_mut() {
            erase.last_screen = event.position;
        }
        Ok(true)
    }

    fn pointer_up(&mut self, event: &PointerEvent, cx: &mut ToolContext<'_>) -> ToolResult {
        let Some(erase) = self.gesture.take_if(|e| e.pointer_id == event.pointer_id) else {
            return Ok(false);
        };
        if self.erase_along(&erase.pending, erase.last_screen, event.position, cx)? > 0 {
            Self::schedule_removal(&erase.pending, cx);
        }
        Self::finish(erase, cx);
        Ok(true)
    }

    fn captured_pointer(&self) -> Option<u32> {
        self.gesture.as_ref().map(|e| e.pointer_id)
    }

    fn overlays(&self, out: &mut Vec<Overlay>) {
        if let Some(center) = self.hover {
            out.push(Overlay::EraserRing {
                center,
                radius: self.radius,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::Harness;
    use super::*;
    use crate::shapes::{CompositeMode, InkPoint, Paint, Shape, ShapeBody, StrokeData, StrokeTool};

    fn horizontal_stroke(h: &mut Harness, y: f64, count: usize) -> ShapeId {
        let points: Vec<InkPoint> = (0..count)
            .map(|i| InkPoint::new(0.2 + i as f64 * 0.01, y))
            .collect();
        let origin = points[0].pos();
        let data = StrokeData {
            tool: StrokeTool::Pen,
            points,
            thickness: 2.0,
            color: Paint::default(),
            composite: CompositeMode::SourceOver,
        };
        h.store.add_shape(Shape::new(ShapeBody::Stroke(data), origin))
    }

    #[test]
    fn test_erasing_across_stroke_records_one_entry() {
        let mut h = Harness::new();
        let id = horizontal_stroke(&mut h, 0.5, 50);
        let other = horizontal_stroke(&mut h, 0.9, 5);
        let before = h.store.history_len();

        let mut tool = EraserTool::new(h.config.eraser_radius);
        tool.pointer_down(&PointerEvent::new(400.0, 400.0), &mut h.cx()).unwrap();
        tool.pointer_move(&PointerEvent::new(400.0, 500.0), &mut h.cx()).unwrap();
        tool.pointer_move(&PointerEvent::new(400.0, 600.0), &mut h.cx()).unwrap();
        tool.pointer_up(&PointerEvent::new(400.0, 600.0), &mut h.cx()).unwrap();

        assert!(!h.store.contains(id));
        assert!(h.store.contains(other));
        assert_eq!(h.store.history_len(), before + 1);
        assert_eq!(h.store.current_action(), "erase");
        assert_eq!(h.surface.captured, None);
    }

    #[test]
    fn test_fast_move_samples_the_gap() {
        let mut h = Harness::new();
        let id = horizontal_stroke(&mut h, 0.5, 50);
        let mut tool = EraserTool::new(12.0);
        // One jump from above to below the stroke.
        tool.pointer_down(&PointerEvent::new(450.0, 200.0), &mut h.cx()).unwrap();
        tool.pointer_move(&PointerEvent::new(450.0, 800.0), &mut h.cx()).unwrap();
        tool.pointer_up(&PointerEvent::new(450.0, 800.0), &mut h.cx()).unwrap();
        assert!(!h.store.contains(id));
    }

    #[test]
    fn test_miss_records_nothing() {
        let mut h = Harness::new();
        horizontal_stroke(&mut h, 0.5, 10);
        let before = h.store.history_len();
        let mut tool = EraserTool::new(12.0);
        tool.pointer_down(&PointerEvent::new(900.0, 100.0), &mut h.cx()).unwrap();
        tool.pointer_up(&PointerEvent::new(900.0, 120.0), &mut h.cx()).unwrap();
        assert_eq!(h.store.len(), 1);
        assert_eq!(h.store.history_len(), before);
    }

    #[test]
    fn test_locked_shapes_survive() {
        let mut h = Harness::new();
        let id = horizontal_stroke(&mut h, 0.5, 10);
        h.store.update_shape_with(id, |s| s.locked = true);
        let mut tool = EraserTool::new(12.0);
        tool.pointer_down(&PointerEvent::new(250.0, 500.0), &mut h.cx()).unwrap();
        tool.pointer_up(&PointerEvent::new(250.0, 500.0), &mut h.cx()).unwrap();
        assert!(h.store.contains(id));
    }

    #[test]
    fn test_hover_shows_ring() {
        let mut h = Harness::new();
        let mut tool = EraserTool::new(12.0);
        tool.pointer_move(&PointerEvent::new(100.0, 100.0), &mut h.cx()).unwrap();
        let mut out = Vec::new();
        tool.overlays(&mut out);
        assert!(matches!(out.as_slice(), [Overlay::EraserRing { radius, .. }] if *radius == 12.0));
    }
}
