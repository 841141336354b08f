//! Pen and highlighter.

use super::{pixel_scale, ToolBehavior, ToolContext};
use crate::error::{ToolError, ToolResult};
use crate::input::PointerEvent;
use crate::shapes::{CompositeMode, InkPoint, InputMeta, Shape, ShapeBody, ShapeId, StrokeData, StrokeTool};
use crate::simplify::{passes_distance_filter, simplify_scaled};
use crate::store::ShapeStore;
use kurbo::Point;
use std::cell::RefCell;
use std::rc::Rc;

/// Highlighter strokes are never thinner than this (screen px).
pub const HIGHLIGHTER_MIN_SIZE: f64 = 12.0;
/// Opacity multiplier applied to highlighter strokes.
pub const HIGHLIGHTER_OPACITY: f64 = 0.4;

#[derive(Debug)]
struct Stroke {
    id: ShapeId,
    pointer_id: u32,
    /// Distance-filtered points mirrored into the store once per frame.
    live: Rc<RefCell<Vec<InkPoint>>>,
    /// Every sample received; simplified on commit.
    samples: Vec<InkPoint>,
    started_ms: f64,
    last_screen: Point,
    path_px: f64,
}

#[derive(Debug)]
pub struct FreehandTool {
    tool: StrokeTool,
    gesture: Option<Stroke>,
}

impl FreehandTool {
    pub fn new(tool: StrokeTool) -> Self {
        Self { tool, gesture: None }
    }

    pub fn stroke_tool(&self) -> StrokeTool {
        self.tool
    }

    fn label(&self) -> &'static str {
        match self.tool {
            StrokeTool::Pen => "pen",
            StrokeTool::Highlighter => "highlighter",
        }
    }

    fn build_shape(&self, first: InkPoint, event: &PointerEvent, cx: &ToolContext<'_>) -> Shape {
        let settings = cx.store.settings();
        let zoom = cx.store.viewport().zoom;
        let (size, composite, opacity) = match self.tool {
            StrokeTool::Pen => (settings.size, CompositeMode::SourceOver, settings.opacity),
            StrokeTool::Highlighter => (
                settings.size.max(HIGHLIGHTER_MIN_SIZE),
                CompositeMode::Multiply,
                settings.opacity * HIGHLIGHTER_OPACITY,
            ),
        };
        let data = StrokeData {
            tool: self.tool,
            points: vec![first],
            thickness: size / zoom,
            color: settings.paint(),
            composite,
        };
        Shape::new(ShapeBody::Stroke(data), first.pos())
            .with_opacity(opacity)
            .with_meta(InputMeta {
                device: event.kind,
                velocity: None,
            })
    }
}

fn sample(event: &PointerEvent, world: Point) -> InkPoint {
    InkPoint::at(world)
        .with_pressure(event.pressure)
        .with_time(event.timestamp_ms)
}

impl ToolBehavior for FreehandTool {
    fn deactivate(&mut self, cx: &mut ToolContext<'_>) {
        if let Some(stroke) = self.gesture.take() {
            cx.batcher.cancel();
            cx.store.remove_shapes(&[stroke.id]);
            cx.surface.release_pointer(stroke.pointer_id);
            log::debug!("Discarded unfinished {} stroke {}", self.label(), stroke.id);
        }
    }

    fn pointer_down(&mut self, event: &PointerEvent, cx: &mut ToolContext<'_>) -> ToolResult {
        if self.gesture.is_some() {
            return Ok(false);
        }
        let world = cx.to_world(event.position)?;
        let first = sample(event, world);
        let shape = self.build_shape(first, event, cx);
        let id = cx.store.insert_shape(shape);
        cx.surface.capture_pointer(event.pointer_id);
        self.gesture = Some(Stroke {
            id,
            pointer_id: event.pointer_id,
            live: Rc::new(RefCell::new(vec![first])),
            samples: vec![first],
            started_ms: event.timestamp_ms,
            last_screen: event.position,
            path_px: 0.0,
        });
        log::debug!("Started {} stroke {id}", self.label());
        Ok(true)
    }

    fn pointer_move(&mut self, event: &PointerEvent, cx: &mut ToolContext<'_>) -> ToolResult {
        let Some(stroke) = self.gesture.as_mut() else {
            return Ok(false);
        };
        if stroke.pointer_id != event.pointer_id {
            return Ok(false);
        }
        let world = cx.to_world(event.position)?;
        let point = sample(event, world);
        stroke.path_px += (event.position - stroke.last_screen).hypot();
        stroke.last_screen = event.position;
        stroke.samples.push(point);

        let scale = pixel_scale(&cx.viewport());
        let accepted = stroke
            .live
            .borrow()
            .last()
            .is_none_or(|last| passes_distance_filter(last, &point, cx.config.min_point_distance, scale));
        if accepted {
            stroke.live.borrow_mut().push(point);
            let live = Rc::clone(&stroke.live);
            let id = stroke.id;
            cx.batcher.schedule(move |store: &mut ShapeStore| {
                let points = live.borrow().clone();
                store.update_shape_with(id, |shape| {
                    if let Some(target) = shape.points_mut() {
                        *target = points;
                    }
                });
            });
        }
        Ok(true)
    }

    fn pointer_up(&mut self, event: &PointerEvent, cx: &mut ToolContext<'_>) -> ToolResult {
        let Some(stroke) = self.gesture.take_if(|s| s.pointer_id == event.pointer_id) else {
            return Ok(false);
        };
        cx.batcher.cancel();
        cx.surface.release_pointer(stroke.pointer_id);

        let world = cx.to_world(event.position)?;
        let mut samples = stroke.samples;
        if samples.last().map(InkPoint::pos) != Some(world) {
            samples.push(sample(event, world));
        }
        let path_px = stroke.path_px + (event.position - stroke.last_screen).hypot();

        let viewport = cx.viewport();
        let points = simplify_scaled(&samples, cx.config.simplify_tolerance, pixel_scale(&viewport));
        if points.len() < cx.config.min_stroke_points {
            cx.store.remove_shapes(&[stroke.id]);
            log::debug!("Dropped {} stroke with {} points", self.label(), points.len());
            return Ok(true);
        }

        let duration = event.timestamp_ms - stroke.started_ms;
        let velocity = (duration > 0.0).then(|| path_px / duration);
        let count = points.len();
        let committed = cx.store.update_shape_with(stroke.id, |shape| {
            if let Some(target) = shape.points_mut() {
                *target = points;
            }
            if let Some(meta) = shape.meta.as_mut() {
                meta.velocity = velocity;
            }
        });
        if !committed {
            return Err(ToolError::ShapeVanished(stroke.id));
        }
        cx.store.save_history(self.label());
        log::debug!(
            "Committed {} stroke {} ({} samples -> {count} points)",
            self.label(),
            stroke.id,
            samples.len()
        );
        Ok(true)
    }

    fn captured_pointer(&self) -> Option<u32> {
        self.gesture.as_ref().map(|s| s.pointer_id)
    }

    fn in_flight(&self) -> Option<ShapeId> {
        self.gesture.as_ref().map(|s| s.id)
    }
}
