//! Pan tool with inertial release.

use super::{ToolBehavior, ToolContext};
use crate::error::ToolResult;
use crate::input::PointerEvent;
use crate::surface::CursorIcon;
use kurbo::{Point, Vec2};
use std::collections::VecDeque;

/// Samples older than this are ignored when estimating release velocity.
const VELOCITY_WINDOW_MS: f64 = 100.0;
/// Nominal frame length the decay factor is expressed against.
const FRAME_MS: f64 = 1000.0 / 60.0;
/// Longest step integrated in one frame, so a stalled host doesn't fling.
const MAX_STEP_MS: f64 = 100.0;

#[derive(Debug)]
struct PanDrag {
    pointer_id: u32,
    last: Point,
    samples: VecDeque<(f64, Point)>,
}

#[derive(Debug, Clone, Copy)]
struct Inertia {
    /// Screen px per ms.
    velocity: Vec2,
    last_ms: Option<f64>,
}

#[derive(Debug, Default)]
pub struct PanTool {
    gesture: Option<PanDrag>,
    inertia: Option<Inertia>,
}

impl PanTool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_coasting(&self) -> bool {
        self.inertia.is_some()
    }

    fn pan(cx: &mut ToolContext<'_>, delta: Vec2) {
        let mut viewport = cx.viewport();
        viewport.pan_by(delta);
        cx.store.set_viewport(viewport);
    }
}

fn release_velocity(samples: &VecDeque<(f64, Point)>) -> Vec2 {
    match (samples.front(), samples.back()) {
        (Some(&(t0, p0)), Some(&(t1, p1))) if t1 > t0 => (p1 - p0) / (t1 - t0),
        _ => Vec2::ZERO,
    }
}

impl ToolBehavior for PanTool {
    fn deactivate(&mut self, cx: &mut ToolContext<'_>) {
        if let Some(drag) = self.gesture.take() {
            cx.surface.release_pointer(drag.pointer_id);
        }
        self.inertia = None;
    }

    fn pointer_down(&mut self, event: &PointerEvent, cx: &mut ToolContext<'_>) -> ToolResult {
        if self.gesture.is_some() {
            return Ok(false);
        }
        self.inertia = None;
        cx.surface.capture_pointer(event.pointer_id);
        cx.surface.set_cursor(CursorIcon::Grabbing);
        self.gesture = Some(PanDrag {
            pointer_id: event.pointer_id,
            last: event.position,
            samples: VecDeque::from([(event.timestamp_ms, event.position)]),
        });
        Ok(true)
    }

    fn pointer_move(&mut self, event: &PointerEvent, cx: &mut ToolContext<'_>) -> ToolResult {
        let Some(drag) = self.gesture.as_mut().filter(|d| d.pointer_id == event.pointer_id) else {
            return Ok(false);
        };
        let delta = event.position - drag.last;
        drag.last = event.position;
        drag.samples.push_back((event.timestamp_ms, event.position));
        while drag
            .samples
            .front()
            .is_some_and(|(t, _)| event.timestamp_ms - t > VELOCITY_WINDOW_MS)
        {
            drag.samples.pop_front();
        }
        Self::pan(cx, delta);
        Ok(true)
    }

    fn pointer_up(&mut self, event: &PointerEvent, cx: &mut ToolContext<'_>) -> ToolResult {
        let Some(mut drag) = self.gesture.take_if(|d| d.pointer_id == event.pointer_id) else {
            return Ok(false);
        };
        cx.surface.release_pointer(drag.pointer_id);
        cx.surface.set_cursor(CursorIcon::Grab);
        let delta = event.position - drag.last;
        if delta != Vec2::ZERO {
            Self::pan(cx, delta);
            drag.samples.push_back((event.timestamp_ms, event.position));
        }
        let velocity = release_velocity(&drag.samples);
        if velocity.hypot() > cx.config.inertia_threshold {
            log::trace!("Pan inertia from {:.2} px/ms", velocity.hypot());
            self.inertia = Some(Inertia {
                velocity,
                last_ms: None,
            });
        }
        Ok(true)
    }

    fn on_frame(&mut self, now_ms: f64, cx: &mut ToolContext<'_>) -> bool {
        let Some(mut inertia) = self.inertia else {
            return false;
        };
        let dt = inertia
            .last_ms
            .map_or(FRAME_MS, |last| now_ms - last)
            .clamp(0.0, MAX_STEP_MS);
        Self::pan(cx, inertia.velocity * dt);
        inertia.velocity = inertia.velocity * cx.config.inertia_decay.powf(dt / FRAME_MS);
        inertia.last_ms = Some(now_ms);
        self.inertia = (inertia.velocity.hypot() >= cx.config.inertia_cutoff).then_some(inertia);
        true
    }

    fn captured_pointer(&self) -> Option<u32> {
        self.gesture.as_ref().map(|d| d.pointer_id)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::Harness;
    use super::*;

    #[test]
    fn test_drag_pans_viewport() {
        let mut h = Harness::new();
        let mut tool = PanTool::new();
        tool.pointer_down(&PointerEvent::new(100.0, 100.0).at(0.0), &mut h.cx()).unwrap();
        tool.pointer_move(&PointerEvent::new(150.0, 120.0).at(500.0), &mut h.cx()).unwrap();
        assert_eq!(h.surface.cursor, CursorIcon::Grabbing);
        // Slow release: no inertia.
        tool.pointer_up(&PointerEvent::new(150.0, 120.0).at(1000.0), &mut h.cx()).unwrap();
        assert!(!tool.is_coasting());

        let world = h.store.viewport().screen_to_world(Point::new(150.0, 120.0));
        assert!((world.x - 0.1).abs() < 1e-9);
        assert!((world.y - 0.1).abs() < 1e-9);
        assert_eq!(h.store.history_len(), 1);
    }

    #[test]
    fn test_fast_release_coasts_then_stops() {
        let mut h = Harness::new();
        let mut tool = PanTool::new();
        tool.pointer_down(&PointerEvent::new(100.0, 100.0).at(0.0), &mut h.cx()).unwrap();
        tool.pointer_move(&PointerEvent::new(120.0, 100.0).at(10.0), &mut h.cx()).unwrap();
        tool.pointer_up(&PointerEvent::new(140.0, 100.0).at(20.0), &mut h.cx()).unwrap();
        assert!(tool.is_coasting());

        let before = h.store.viewport().pan_x;
        assert!(tool.on_frame(100.0, &mut h.cx()));
        assert!(h.store.viewport().pan_x > before);

        let mut now = 100.0;
        while tool.is_coasting() {
            now += FRAME_MS;
            tool.on_frame(now, &mut h.cx());
            assert!(now < 10_000.0, "inertia never settled");
        }
        assert!(!tool.on_frame(now + FRAME_MS, &mut h.cx()));
    }

    #[test]
    fn test_press_cancels_inertia() {
        let mut h = Harness::new();
        let mut tool = PanTool::new();
        tool.pointer_down(&PointerEvent::new(0.0, 0.0).at(0.0), &mut h.cx()).unwrap();
        tool.pointer_up(&PointerEvent::new(50.0, 0.0).at(10.0), &mut h.cx()).unwrap();
        assert!(tool.is_coasting());
        tool.pointer_down(&PointerEvent::new(50.0, 0.0).at(20.0), &mut h.cx()).unwrap();
        assert!(!tool.is_coasting());
    }
}
