//! Laser pointer: a fading trail that never touches the store.

use super::{Overlay, ToolBehavior, ToolContext};
use crate::error::ToolResult;
use crate::input::PointerEvent;
use kurbo::Point;
use std::collections::VecDeque;

const MAX_TRAIL_POINTS: usize = 256;

#[derive(Debug)]
pub struct LaserTool {
    fade_ms: f64,
    /// World position and timestamp of each sample.
    trail: VecDeque<(Point, f64)>,
    pointer_id: Option<u32>,
    now_ms: f64,
}

impl LaserTool {
    pub fn new(fade_ms: f64) -> Self {
        Self {
            fade_ms: fade_ms.max(1.0),
            trail: VecDeque::new(),
            pointer_id: None,
            now_ms: 0.0,
        }
    }

    pub fn trail_len(&self) -> usize {
        self.trail.len()
    }

    fn push(&mut self, world: Point, t: f64) {
        if self.trail.len() == MAX_TRAIL_POINTS {
            self.trail.pop_front();
        }
        self.trail.push_back((world, t));
        self.now_ms = self.now_ms.max(t);
    }
}

impl ToolBehavior for LaserTool {
    fn deactivate(&mut self, cx: &mut ToolContext<'_>) {
        if let Some(id) = self.pointer_id.take() {
            cx.surface.release_pointer(id);
        }
        self.trail.clear();
    }

    fn pointer_down(&mut self, event: &PointerEvent, cx: &mut ToolContext<'_>) -> ToolResult {
        let world = cx.to_world(event.position)?;
        cx.surface.capture_pointer(event.pointer_id);
        self.pointer_id = Some(event.pointer_id);
        self.push(world, event.timestamp_ms);
        Ok(true)
    }

    fn pointer_move(&mut self, event: &PointerEvent, cx: &mut ToolContext<'_>) -> ToolResult {
        if self.pointer_id != Some(event.pointer_id) {
            return Ok(false);
        }
        let world = cx.to_world(event.position)?;
        self.push(world, event.timestamp_ms);
        Ok(true)
    }

    fn pointer_up(&mut self, event: &PointerEvent, cx: &mut ToolContext<'_>) -> ToolResult {
        if self.pointer_id != Some(event.pointer_id) {
            return Ok(false);
        }
        cx.surface.release_pointer(event.pointer_id);
        self.pointer_id = None;
        Ok(true)
    }

    fn on_frame(&mut self, now_ms: f64, _cx: &mut ToolContext<'_>) -> bool {
        self.now_ms = now_ms;
        let before = self.trail.len();
        while self
            .trail
            .front()
            .is_some_and(|(_, t)| now_ms - t > self.fade_ms)
        {
            self.trail.pop_front();
        }
        before > 0
    }

    fn captured_pointer(&self) -> Option<u32> {
        self.pointer_id
    }

    fn overlays(&self, out: &mut Vec<Overlay>) {
        if self.trail.is_empty() {
            return;
        }
        let points = self
            .trail
            .iter()
            .map(|&(p, t)| (p, (1.0 - (self.now_ms - t) / self.fade_ms).clamp(0.0, 1.0)))
            .collect();
        out.push(Overlay::LaserTrail { points });
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::Harness;
    use super::*;

    #[test]
    fn test_trail_fades_without_touching_store() {
        let mut h = Harness::new();
        let mut tool = LaserTool::new(900.0);
        let before = h.store.history_len();
        tool.pointer_down(&PointerEvent::new(100.0, 100.0).at(0.0), &mut h.cx()).unwrap();
        tool.pointer_move(&PointerEvent::new(200.0, 100.0).at(100.0), &mut h.cx()).unwrap();
        tool.pointer_up(&PointerEvent::new(200.0, 100.0).at(200.0), &mut h.cx()).unwrap();
        assert_eq!(tool.trail_len(), 2);
        assert!(h.store.is_empty());
        assert_eq!(h.store.history_len(), before);

        assert!(tool.on_frame(500.0, &mut h.cx()));
        let mut out = Vec::new();
        tool.overlays(&mut out);
        let Overlay::LaserTrail { points } = &out[0] else {
            panic!("expected trail");
        };
        assert!(points[0].1 < points[1].1);

        tool.on_frame(950.0, &mut h.cx());
        assert_eq!(tool.trail_len(), 1);
        tool.on_frame(1100.0, &mut h.cx());
        assert_eq!(tool.trail_len(), 0);
        assert!(!tool.on_frame(1200.0, &mut h.cx()));
    }
}
