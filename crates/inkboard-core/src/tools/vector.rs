//! Line, rectangle, circle and arrow.
//!
//! The shape lives only in the tool while dragging and is inserted into the
//! store on release.

use super::{ToolBehavior, ToolContext};
use crate::error::ToolResult;
use crate::input::{Modifiers, PointerEvent};
use crate::shapes::{InkPoint, Shape, ShapeBody, VectorData, VectorKind};
use crate::snap::{snap_line_endpoint, snap_square, LINE_ANGLE_INCREMENT};
use kurbo::Point;

/// Releases closer than this to the anchor (screen px) create nothing.
const MIN_DRAG_PX: f64 = 2.0;

#[derive(Debug)]
struct Drag {
    pointer_id: u32,
    anchor: Point,
    preview: Shape,
}

#[derive(Debug)]
pub struct VectorTool {
    kind: VectorKind,
    gesture: Option<Drag>,
}

impl VectorTool {
    pub fn new(kind: VectorKind) -> Self {
        Self { kind, gesture: None }
    }

    pub fn vector_kind(&self) -> VectorKind {
        self.kind
    }

    /// Screen-space corner after modifier snapping.
    fn constrain(&self, anchor: Point, corner: Point, modifiers: Modifiers) -> Point {
        if !modifiers.shift {
            return corner;
        }
        match self.kind {
            VectorKind::Rectangle => snap_square(anchor, corner),
            VectorKind::Line | VectorKind::Arrow => snap_line_endpoint(anchor, corner, LINE_ANGLE_INCREMENT),
            VectorKind::Circle => corner,
        }
    }
}

fn set_corner(shape: &mut Shape, corner: Point) {
    if let ShapeBody::Vector(data) = &mut shape.body {
        if let Some(last) = data.points.last_mut() {
            *last = InkPoint::at(corner);
        }
    }
}

impl ToolBehavior for VectorTool {
    fn deactivate(&mut self, cx: &mut ToolContext<'_>) {
        if let Some(drag) = self.gesture.take() {
            cx.surface.release_pointer(drag.pointer_id);
        }
    }

    fn pointer_down(&mut self, event: &PointerEvent, cx: &mut ToolContext<'_>) -> ToolResult {
        if self.gesture.is_some() {
            return Ok(false);
        }
        let world = cx.to_world(event.position)?;
        let settings = cx.store.settings();
        let zoom = cx.store.viewport().zoom;
        let mut data = VectorData::new(self.kind, world, world, settings.color, settings.size / zoom);
        if matches!(self.kind, VectorKind::Rectangle | VectorKind::Circle) {
            data.fill = settings.fill;
        }
        let preview = Shape::new(ShapeBody::Vector(data), world).with_opacity(settings.opacity);
        cx.surface.capture_pointer(event.pointer_id);
        self.gesture = Some(Drag {
            pointer_id: event.pointer_id,
            anchor: event.position,
            preview,
        });
        Ok(true)
    }

    fn pointer_move(&mut self, event: &PointerEvent, cx: &mut ToolContext<'_>) -> ToolResult {
        let Some(anchor) = self
            .gesture
            .as_ref()
            .filter(|d| d.pointer_id == event.pointer_id)
            .map(|d| d.anchor)
        else {
            return Ok(false);
        };
        let corner = self.constrain(anchor, event.position, event.modifiers);
        let world = cx.to_world(corner)?;
        if let Some(drag) = self.gesture.as_mut() {
            set_corner(&mut drag.preview, world);
        }
        Ok(true)
    }

    fn pointer_up(&mut self, event: &PointerEvent, cx: &mut ToolContext<'_>) -> ToolResult {
        let Some(mut drag) = self.gesture.take_if(|d| d.pointer_id == event.pointer_id) else {
            return Ok(false);
        };
        cx.surface.release_pointer(drag.pointer_id);
        let corner = self.constrain(drag.anchor, event.position, event.modifiers);
        if (corner - drag.anchor).hypot() < MIN_DRAG_PX {
            log::debug!("Discarded {:?} shorter than {MIN_DRAG_PX}px", self.kind);
            return Ok(true);
        }
        let world = cx.to_world(corner)?;
        set_corner(&mut drag.preview, world);
        drag.preview.touch();
        let label = drag.preview.kind().as_str();
        let id = cx.store.insert_shape(drag.preview);
        cx.store.save_history(label);
        log::debug!("Committed {label} {id}");
        Ok(true)
    }

    fn captured_pointer(&self) -> Option<u32> {
        self.gesture.as_ref().map(|d| d.pointer_id)
    }

    fn preview_shape(&self) -> Option<&Shape> {
        self.gesture.as_ref().map(|d| &d.preview)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::Harness;
    use super::*;
    use crate::shapes::SerializableColor;

    fn drag(tool: &mut VectorTool, h: &mut Harness, from: (f64, f64), to: (f64, f64), modifiers: Modifiers) {
        tool.pointer_down(&PointerEvent::new(from.0, from.1), &mut h.cx()).unwrap();
        let mv = PointerEvent::new(to.0, to.1).with_modifiers(modifiers);
        tool.pointer_move(&mv, &mut h.cx()).unwrap();
        tool.pointer_up(&mv, &mut h.cx()).unwrap();
    }

    fn only_vector(h: &Harness) -> VectorData {
        let shape = h.store.shapes_ordered().next().unwrap();
        match &shape.body {
            ShapeBody::Vector(v) => v.clone(),
            _ => panic!("expected vector"),
        }
    }

    #[test]
    fn test_preview_stays_out_of_store_until_release() {
        let mut h = Harness::new();
        let mut tool = VectorTool::new(VectorKind::Line);
        tool.pointer_down(&PointerEvent::new(100.0, 100.0), &mut h.cx()).unwrap();
        tool.pointer_move(&PointerEvent::new(200.0, 150.0), &mut h.cx()).unwrap();
        assert!(h.store.is_empty());
        assert!(tool.preview_shape().is_some());

        tool.pointer_up(&PointerEvent::new(200.0, 150.0), &mut h.cx()).unwrap();
        assert_eq!(h.store.len(), 1);
        assert!(tool.preview_shape().is_none());
        assert_eq!(h.store.current_action(), "line");
    }

    #[test]
    fn test_shift_rectangle_is_square() {
        let mut h = Harness::new();
        let mut tool = VectorTool::new(VectorKind::Rectangle);
        drag(&mut tool, &mut h, (100.0, 100.0), (300.0, 250.0), Modifiers::SHIFT);
        let v = only_vector(&h);
        let size = v.corner() - v.anchor();
        assert!((size.x.abs() - size.y.abs()).abs() < 1e-9);
        assert!((size.x - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_shift_line_snaps_to_45_degrees() {
        let mut h = Harness::new();
        let mut tool = VectorTool::new(VectorKind::Arrow);
        drag(&mut tool, &mut h, (100.0, 100.0), (300.0, 110.0), Modifiers::SHIFT);
        let v = only_vector(&h);
        assert!((v.corner().y - v.anchor().y).abs() < 1e-9);
    }

    #[test]
    fn test_tiny_drag_creates_nothing() {
        let mut h = Harness::new();
        let mut tool = VectorTool::new(VectorKind::Circle);
        let before = h.store.history_len();
        drag(&mut tool, &mut h, (100.0, 100.0), (101.0, 100.5), Modifiers::default());
        assert!(h.store.is_empty());
        assert_eq!(h.store.history_len(), before);
    }

    #[test]
    fn test_fill_applies_to_closed_kinds_only() {
        let mut h = Harness::new();
        h.store.settings_mut().fill = Some(SerializableColor::white());
        let mut rect = VectorTool::new(VectorKind::Rectangle);
        drag(&mut rect, &mut h, (10.0, 10.0), (60.0, 60.0), Modifiers::default());
        assert!(only_vector(&h).fill.is_some());

        let mut h = Harness::new();
        h.store.settings_mut().fill = Some(SerializableColor::white());
        let mut line = VectorTool::new(VectorKind::Line);
        drag(&mut line, &mut h, (10.0, 10.0), (60.0, 60.0), Modifiers::default());
        assert!(only_vector(&h).fill.is_none());
    }
}
