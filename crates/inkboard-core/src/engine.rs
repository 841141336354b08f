//! The annotation engine: owns the store, the active tool and the frame
//! scheduler, and is the single entry point for host events.

use crate::batcher::{FrameBatcher, FrameSource};
use crate::collaboration::{apply_remote, CollabEvent, CollabPayload, CollabSession, RemoteCursors};
use crate::config::EngineConfig;
use crate::document::Document;
use crate::error::{EngineResult, ToolResult};
use crate::input::{Key, KeyEvent, PointerEvent};
use crate::shapes::{Shape, ShapeId};
use crate::spatial::SpatialIndex;
use crate::store::{ShapeStore, StoreChange};
use crate::surface::{HeadlessSurface, Surface};
use crate::tools::{ActiveTool, Overlay, TextSession, ToolContext, ToolKind};
use crate::viewport::Viewport;
use kurbo::Point;
use std::path::Path;

/// What a call to [`Engine::frame`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameReport {
    /// A batched store update was applied.
    pub batch_applied: bool,
    /// The tool animated something (inertia, caret, trail).
    pub tool_animated: bool,
    /// Remote cursors dropped as stale.
    pub cursors_swept: usize,
}

impl FrameReport {
    pub fn needs_redraw(&self) -> bool {
        self.batch_applied || self.tool_animated || self.cursors_swept > 0
    }
}

pub struct Engine<S: Surface = HeadlessSurface> {
    store: ShapeStore,
    spatial: SpatialIndex,
    batcher: FrameBatcher<ShapeStore>,
    tool: ActiveTool,
    surface: S,
    config: EngineConfig,
    frame_source: FrameSource,
    collab: Option<CollabSession>,
    remote_cursors: RemoteCursors,
    last_sweep_ms: f64,
    /// Committed shapes changed since the renderer last asked.
    shapes_damaged: bool,
}

impl Engine<HeadlessSurface> {
    /// Engine on a headless surface (tests, replay).
    pub fn headless(config: EngineConfig, width: f64, height: f64, dpr: f64) -> Self {
        Self::new(config, Viewport::new(width, height, dpr), HeadlessSurface::default())
    }
}

impl<S: Surface> Engine<S> {
    pub fn new(config: EngineConfig, viewport: Viewport, surface: S) -> Self {
        let store = ShapeStore::new(&config, viewport);
        let mut spatial = SpatialIndex::new(config.grid_cell_size, config.grid_padding);
        spatial.set_surface(viewport.size());
        let frame_source = config
            .frame_interval_ms
            .map_or(FrameSource::DisplayRefresh, FrameSource::interval);
        let kind = store.settings().tool;
        let tool = ActiveTool::new(kind, &config);
        let mut engine = Self {
            store,
            spatial,
            batcher: FrameBatcher::new(),
            tool,
            surface,
            config,
            frame_source,
            collab: None,
            remote_cursors: RemoteCursors::default(),
            last_sweep_ms: 0.0,
            shapes_damaged: true,
        };
        let (tool, mut cx) = engine.split();
        tool.activate(&mut cx);
        log::info!(
            "Engine ready: {}x{} @{}x, tool {}",
            viewport.width,
            viewport.height,
            viewport.dpr,
            kind.as_str()
        );
        engine
    }

    fn split(&mut self) -> (&mut ActiveTool, ToolContext<'_>) {
        (
            &mut self.tool,
            ToolContext {
                store: &mut self.store,
                spatial: &mut self.spatial,
                batcher: &mut self.batcher,
                surface: &mut self.surface,
                config: &self.config,
            },
        )
    }

    // --- Accessors -----------------------------------------------------

    pub fn store(&self) -> &ShapeStore {
        &self.store
    }

    /// Direct store access for hosts (chrome settings, programmatic edits).
    pub fn store_mut(&mut self) -> &mut ShapeStore {
        self.shapes_damaged = true;
        &mut self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn viewport(&self) -> &Viewport {
        self.store.viewport()
    }

    pub fn tool(&self) -> &ActiveTool {
        &self.tool
    }

    pub fn active_tool(&self) -> ToolKind {
        self.tool.kind()
    }

    pub fn in_flight(&self) -> Option<ShapeId> {
        self.tool.in_flight()
    }

    pub fn preview_shape(&self) -> Option<&Shape> {
        self.tool.preview_shape()
    }

    pub fn text_session(&self) -> Option<&TextSession> {
        self.tool.text_session()
    }

    pub fn has_pending_frame(&self) -> bool {
        self.batcher.is_pending()
    }

    pub fn remote_cursors(&self) -> &RemoteCursors {
        &self.remote_cursors
    }

    /// Ids near a world point, back to front.
    pub fn query(&mut self, world: Point) -> Vec<ShapeId> {
        self.spatial.query(&self.store, world.x, world.y)
    }

    // --- Tools ---------------------------------------------------------

    /// Switch tools. The old tool is deactivated before the new one exists.
    pub fn set_tool(&mut self, kind: ToolKind) {
        self.store.settings_mut().tool = kind;
        if self.tool.kind() == kind {
            return;
        }
        let (tool, mut cx) = self.split();
        tool.deactivate(&mut cx);
        *tool = ActiveTool::new(kind, cx.config);
        tool.activate(&mut cx);
        log::debug!("Switched to {} tool", kind.as_str());
        self.publish_changes();
    }

    /// Follow a tool change written to the settings by the host.
    fn sync_tool(&mut self) {
        let wanted = self.store.settings().tool;
        if wanted != self.tool.kind() {
            self.set_tool(wanted);
        }
    }

    /// Run a tool handler behind the error boundary.
    ///
    /// A failing handler never leaves a half-applied gesture: pending batched
    /// work is dropped, capture released, the tool reset, and the store
    /// restored to its last committed history entry.
    fn dispatch(
        &mut self,
        op: &str,
        f: impl FnOnce(&mut ActiveTool, &mut ToolContext<'_>) -> ToolResult,
    ) -> bool {
        self.sync_tool();
        let (tool, mut cx) = self.split();
        let handled = match f(&mut *tool, &mut cx) {
            Ok(handled) => handled,
            Err(err) => {
                log::error!("{op} failed in {} tool: {err}", tool.kind().as_str());
                tool.abort(&mut cx);
                cx.store.revert_to_checkpoint();
                false
            }
        };
        self.publish_changes();
        handled
    }

    pub fn pointer_down(&mut self, event: &PointerEvent) -> bool {
        self.dispatch("pointer_down", |tool, cx| tool.pointer_down(event, cx))
    }

    pub fn pointer_move(&mut self, event: &PointerEvent) -> bool {
        if let Some(session) = self.collab.as_mut() {
            let world = self.store.viewport().screen_to_world(event.position);
            if world.x.is_finite() && world.y.is_finite() {
                session.push_cursor(world);
            }
        }
        self.dispatch("pointer_move", |tool, cx| tool.pointer_move(event, cx))
    }

    pub fn pointer_up(&mut self, event: &PointerEvent) -> bool {
        self.dispatch("pointer_up", |tool, cx| tool.pointer_up(event, cx))
    }

    /// Keys go to the tool first; unhandled ones fall through to the
    /// engine shortcuts (undo/redo).
    pub fn key_down(&mut self, event: &KeyEvent) -> bool {
        if self.dispatch("key_down", |tool, cx| tool.key_down(event, cx)) {
            return true;
        }
        if !event.modifiers.command() {
            return false;
        }
        match &event.key {
            Key::Character(c) if c.eq_ignore_ascii_case("z") && event.modifiers.shift => self.redo(),
            Key::Character(c) if c.eq_ignore_ascii_case("z") => self.undo(),
            Key::Character(c) if c.eq_ignore_ascii_case("y") => self.redo(),
            _ => false,
        }
    }

    /// Drop any gesture in progress and its uncommitted store mutations.
    fn abort_gesture(&mut self) {
        let (tool, mut cx) = self.split();
        if tool.is_active() {
            log::debug!("Aborting {} gesture", tool.kind().as_str());
            tool.abort(&mut cx);
            cx.store.revert_to_checkpoint();
        }
    }

    // --- History -------------------------------------------------------

    pub fn undo(&mut self) -> bool {
        self.abort_gesture();
        let moved = self.store.undo();
        self.publish_changes();
        moved
    }

    pub fn redo(&mut self) -> bool {
        self.abort_gesture();
        let moved = self.store.redo();
        self.publish_changes();
        moved
    }

    /// Remove every shape as one undoable entry.
    pub fn clear(&mut self) {
        self.abort_gesture();
        self.store.clear_shapes();
        self.publish_changes();
    }

    // --- Viewport ------------------------------------------------------

    /// New surface dimensions from the host.
    pub fn resize(&mut self, width: f64, height: f64, dpr: f64) {
        let mut viewport = *self.store.viewport();
        viewport.resize(width, height, dpr);
        self.store.set_viewport(viewport);
        self.spatial.set_surface(viewport.size());
        log::debug!("Resized to {width}x{height} @{dpr}x");
    }

    pub fn zoom_at(&mut self, screen: Point, factor: f64) {
        let mut viewport = *self.store.viewport();
        viewport.zoom_at(screen, factor);
        self.store.set_viewport(viewport);
    }

    pub fn reset_view(&mut self) {
        let mut viewport = *self.store.viewport();
        viewport.reset();
        self.store.set_viewport(viewport);
    }

    // --- Frames --------------------------------------------------------

    /// Per-frame work: the batched store update, tool timers and the remote
    /// cursor sweep. Call once per display refresh.
    pub fn frame(&mut self, now_ms: f64) -> FrameReport {
        self.sync_tool();
        let mut report = FrameReport::default();
        if self.frame_source.should_fire(now_ms) {
            report.batch_applied = self.batcher.run_frame(&mut self.store);
        }
        let (tool, mut cx) = self.split();
        report.tool_animated = tool.on_frame(now_ms, &mut cx);
        if now_ms - self.last_sweep_ms >= self.config.remote_cursor_sweep_ms {
            report.cursors_swept = self
                .remote_cursors
                .sweep(now_ms, self.config.remote_cursor_stale_ms);
            self.last_sweep_ms = now_ms;
        }
        self.publish_changes();
        report
    }

    /// Everything the ui layer draws this frame.
    pub fn overlays(&self) -> Vec<Overlay> {
        let mut out = Vec::new();
        let surface = self.store.viewport().size();
        for id in self.store.selection() {
            if let Some(shape) = self.store.shape(*id) {
                out.push(Overlay::SelectionBox {
                    rect: shape.world_bounds(surface),
                });
            }
        }
        self.tool.overlays(&mut out);
        for cursor in self.remote_cursors.list() {
            out.push(Overlay::RemoteCursor {
                position: cursor.position,
                user: cursor.user.clone(),
            });
        }
        out
    }

    // --- Documents -----------------------------------------------------

    pub fn export_document(&self) -> Document {
        Document::from_store(&self.store)
    }

    /// Replace the board with `doc` as one undoable "import" entry.
    pub fn import_document(&mut self, doc: Document) {
        self.abort_gesture();
        self.store.import_document(doc);
        self.sync_tool();
        self.publish_changes();
    }

    pub fn save(&self, path: impl AsRef<Path>) -> EngineResult<()> {
        self.export_document().write_to(path)
    }

    pub fn load(&mut self, path: impl AsRef<Path>) -> EngineResult<()> {
        let doc = Document::read_from(path)?;
        self.import_document(doc);
        Ok(())
    }

    // --- Collaboration -------------------------------------------------

    pub fn join(&mut self, room: &str, user: &str) {
        self.store.take_changes();
        self.collab = Some(CollabSession::new(room, user, self.config.outbound_interval_ms()));
        log::info!("Joined room {room} as {user}");
    }

    pub fn leave(&mut self) {
        if let Some(session) = self.collab.take() {
            log::info!("Left room {}", session.room());
        }
        self.remote_cursors = RemoteCursors::default();
    }

    pub fn collab_session(&self) -> Option<&CollabSession> {
        self.collab.as_ref()
    }

    /// Whether committed shapes changed since the last call. Edits to the
    /// in-flight shape alone do not count.
    pub fn take_shapes_damage(&mut self) -> bool {
        std::mem::take(&mut self.shapes_damaged)
    }

    fn publish_changes(&mut self) {
        let changes = self.store.take_changes();
        let in_flight = self.tool.in_flight();
        self.shapes_damaged |= changes.iter().any(|change| match change {
            StoreChange::Added(id) | StoreChange::Updated(id) | StoreChange::Deleted(id) => Some(*id) != in_flight,
            StoreChange::Cleared => true,
        });
        if let Some(session) = self.collab.as_mut() {
            session.record(changes);
        }
    }

    /// Outbound events due at `now_ms`, rate limited.
    pub fn drain_outbound(&mut self, now_ms: f64) -> Vec<CollabEvent> {
        match self.collab.as_mut() {
            Some(session) => session.drain(now_ms, &self.store),
            None => Vec::new(),
        }
    }

    /// Apply a JSON event received from the channel. Malformed or foreign
    /// events are logged and dropped.
    pub fn receive(&mut self, json: &str, now_ms: f64) -> bool {
        let event = match CollabEvent::from_json(json) {
            Ok(event) => event,
            Err(err) => {
                log::warn!("Dropping collaboration event: {err}");
                return false;
            }
        };
        if let Some(session) = &self.collab {
            if !session.accepts(&event) {
                log::trace!("Ignoring event from {} in room {}", event.user, event.room);
                return false;
            }
        }
        let touches_shapes = !matches!(event.payload, CollabPayload::CursorMove { .. });
        let applied = apply_remote(&mut self.store, &mut self.remote_cursors, event, now_ms);
        self.shapes_damaged |= applied && touches_shapes;
        applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::Modifiers;
    use crate::shapes::{SerializableColor, ShapeBody, ShapeKind, StampData, VectorData, VectorKind};

    fn engine() -> Engine {
        Engine::headless(EngineConfig::default(), 1000.0, 1000.0, 1.0)
    }

    fn stroke(engine: &mut Engine, points: &[(f64, f64)], t0: f64) {
        let mut t = t0;
        let (first, rest) = points.split_first().unwrap();
        engine.pointer_down(&PointerEvent::new(first.0, first.1).at(t));
        for p in rest {
            t += 16.0;
            engine.pointer_move(&PointerEvent::new(p.0, p.1).at(t));
            engine.frame(t);
        }
        let last = points.last().unwrap();
        engine.pointer_up(&PointerEvent::new(last.0, last.1).at(t + 1.0));
        engine.frame(t + 16.0);
    }

    #[test]
    fn test_pen_stroke_end_to_end() {
        let mut e = engine();
        e.set_tool(ToolKind::Pen);
        let before = e.store().history_len();
        stroke(&mut e, &[(300.0, 300.0), (600.0, 400.0)], 0.0);

        assert_eq!(e.store().len(), 1);
        assert_eq!(e.store().history_len(), before + 1);
        let shape = e.store().shapes_ordered().next().unwrap();
        assert_eq!(shape.kind(), ShapeKind::Pen);
        let points = shape.points().unwrap();
        let v = e.viewport();
        let first = v.screen_to_world(Point::new(300.0, 300.0));
        let last = v.screen_to_world(Point::new(600.0, 400.0));
        assert!((points[0].pos() - first).hypot() < 1e-9);
        assert!((points[points.len() - 1].pos() - last).hypot() < 1e-9);
        assert_eq!(e.in_flight(), None);
        assert_eq!(e.surface().captured, None);
    }

    #[test]
    fn test_shift_rectangle_end_to_end() {
        let mut e = engine();
        e.set_tool(ToolKind::Rectangle);
        e.pointer_down(&PointerEvent::new(100.0, 100.0));
        let mv = PointerEvent::new(300.0, 250.0).with_modifiers(Modifiers::SHIFT);
        e.pointer_move(&mv);
        assert!(e.preview_shape().is_some());
        e.pointer_up(&mv);

        let shape = e.store().shapes_ordered().next().unwrap();
        let ShapeBody::Vector(v) = &shape.body else {
            panic!("expected vector");
        };
        let size = v.corner() - v.anchor();
        assert!((size.x.abs() - size.y.abs()).abs() < 1e-9);
    }

    #[test]
    fn test_eraser_over_long_stroke_is_one_entry() {
        let mut e = engine();
        e.set_tool(ToolKind::Pen);
        let points: Vec<(f64, f64)> = (0..50).map(|i| (200.0 + i as f64 * 10.0, 500.0 + (i % 2) as f64 * 8.0)).collect();
        stroke(&mut e, &points, 0.0);
        assert_eq!(e.store().len(), 1);
        let before = e.store().history_len();

        e.set_tool(ToolKind::Eraser);
        e.pointer_down(&PointerEvent::new(450.0, 420.0).at(5000.0));
        for (i, y) in [460.0, 500.0, 540.0, 580.0].into_iter().enumerate() {
            e.pointer_move(&PointerEvent::new(450.0, y).at(5016.0 + i as f64 * 16.0));
            e.frame(5016.0 + i as f64 * 16.0);
        }
        e.pointer_up(&PointerEvent::new(450.0, 580.0).at(5100.0));

        assert!(e.store().is_empty());
        assert_eq!(e.store().history_len(), before + 1);
        assert_eq!(e.store().current_action(), "erase");
    }

    #[test]
    fn test_undo_redo_sequence() {
        let mut e = engine();
        e.set_tool(ToolKind::Pen);
        stroke(&mut e, &[(100.0, 100.0), (200.0, 200.0)], 0.0);
        stroke(&mut e, &[(300.0, 300.0), (400.0, 300.0)], 1000.0);
        assert_eq!(e.store().len(), 2);

        assert!(e.undo());
        assert_eq!(e.store().len(), 1);
        assert!(e.undo());
        assert!(e.store().is_empty());
        assert!(!e.undo());
        assert!(e.redo());
        assert!(e.redo());
        assert_eq!(e.store().len(), 2);
        assert!(!e.redo());

        // A new action after undo drops the redo tail.
        e.undo();
        stroke(&mut e, &[(500.0, 500.0), (600.0, 650.0)], 2000.0);
        assert!(!e.store().can_redo());
        assert_eq!(e.store().len(), 2);
    }

    #[test]
    fn test_ctrl_z_shortcut() {
        let mut e = engine();
        e.set_tool(ToolKind::Pen);
        stroke(&mut e, &[(100.0, 100.0), (200.0, 200.0)], 0.0);
        let ctrl = Modifiers {
            ctrl: true,
            ..Modifiers::default()
        };
        assert!(e.key_down(&KeyEvent::character("z").with_modifiers(ctrl)));
        assert!(e.store().is_empty());
        let redo = Modifiers { shift: true, ..ctrl };
        assert!(e.key_down(&KeyEvent::character("Z").with_modifiers(redo)));
        assert_eq!(e.store().len(), 1);
    }

    #[test]
    fn test_tool_error_reverts_store() {
        let mut e = engine();
        e.set_tool(ToolKind::Pen);
        stroke(&mut e, &[(100.0, 100.0), (200.0, 200.0)], 0.0);
        let committed = e.store().history_len();

        e.pointer_down(&PointerEvent::new(300.0, 300.0).at(1000.0));
        e.pointer_move(&PointerEvent::new(400.0, 400.0).at(1016.0));
        assert_eq!(e.store().len(), 2);
        // The surface collapses mid-gesture; the next sample cannot be mapped.
        e.resize(0.0, 0.0, 1.0);
        e.pointer_move(&PointerEvent::new(450.0, 450.0).at(1032.0));

        assert_eq!(e.store().len(), 1);
        assert_eq!(e.store().history_len(), committed);
        assert_eq!(e.in_flight(), None);
        assert_eq!(e.surface().captured, None);
        assert!(!e.has_pending_frame());
        assert_eq!(e.active_tool(), ToolKind::Pen);
    }

    #[test]
    fn test_undo_mid_gesture_discards_it() {
        let mut e = engine();
        e.set_tool(ToolKind::Pen);
        stroke(&mut e, &[(100.0, 100.0), (200.0, 200.0)], 0.0);
        e.pointer_down(&PointerEvent::new(300.0, 300.0).at(1000.0));
        e.pointer_move(&PointerEvent::new(400.0, 400.0).at(1016.0));
        assert!(e.undo());
        assert!(e.store().is_empty());
        assert_eq!(e.surface().captured, None);
    }

    #[test]
    fn test_tool_switch_via_settings() {
        let mut e = engine();
        e.store_mut().settings_mut().tool = ToolKind::Laser;
        e.frame(0.0);
        assert_eq!(e.active_tool(), ToolKind::Laser);
    }

    #[test]
    fn test_switch_mid_move_restores_selection() {
        let mut e = engine();
        let data = VectorData::new(
            VectorKind::Line,
            Point::new(0.2, 0.2),
            Point::new(0.3, 0.3),
            SerializableColor::black(),
            2.0,
        );
        let id = e
            .store_mut()
            .add_shape(Shape::new(ShapeBody::Vector(data), Point::new(0.2, 0.2)));
        let before = e.store().history_len();

        e.set_tool(ToolKind::Select);
        e.pointer_down(&PointerEvent::new(250.0, 250.0).at(0.0));
        e.pointer_move(&PointerEvent::new(350.0, 350.0).at(16.0));
        e.frame(16.0);
        assert!((e.store().shape(id).unwrap().x - 0.3).abs() < 1e-9);
        e.pointer_move(&PointerEvent::new(400.0, 400.0).at(32.0));

        e.set_tool(ToolKind::Pen);
        e.frame(48.0);
        let shape = e.store().shape(id).unwrap();
        assert!((shape.x - 0.2).abs() < 1e-9);
        assert!((shape.y - 0.2).abs() < 1e-9);
        assert_eq!(e.store().history_len(), before);
        assert_eq!(e.surface().captured, None);
        assert_eq!(e.tool().captured_pointer(), None);
        assert!(!e.has_pending_frame());
    }

    #[test]
    fn test_switch_mid_erase_commits_one_entry() {
        let mut e = engine();
        e.set_tool(ToolKind::Pen);
        let points: Vec<(f64, f64)> = (0..50).map(|i| (200.0 + i as f64 * 10.0, 500.0 + (i % 2) as f64 * 8.0)).collect();
        stroke(&mut e, &points, 0.0);
        let before = e.store().history_len();

        e.set_tool(ToolKind::Eraser);
        e.pointer_down(&PointerEvent::new(450.0, 420.0).at(5000.0));
        e.pointer_move(&PointerEvent::new(450.0, 540.0).at(5016.0));
        assert_eq!(e.store().len(), 1);

        e.set_tool(ToolKind::Pen);
        assert!(e.store().is_empty());
        assert_eq!(e.store().history_len(), before + 1);
        assert_eq!(e.store().current_action(), "erase");
        assert_eq!(e.surface().captured, None);
        assert_eq!(e.tool().captured_pointer(), None);
    }

    #[test]
    fn test_switch_mid_drag_drops_vector_preview() {
        let mut e = engine();
        e.set_tool(ToolKind::Rectangle);
        let before = e.store().history_len();
        e.pointer_down(&PointerEvent::new(100.0, 100.0));
        e.pointer_move(&PointerEvent::new(300.0, 250.0));
        assert!(e.preview_shape().is_some());

        e.set_tool(ToolKind::Pen);
        assert!(e.preview_shape().is_none());
        assert!(e.store().is_empty());
        assert_eq!(e.store().history_len(), before);
        assert_eq!(e.surface().captured, None);
        assert_eq!(e.tool().captured_pointer(), None);

        // The stale release is ignored by the new tool.
        assert!(!e.pointer_up(&PointerEvent::new(300.0, 250.0)));
        assert!(e.store().is_empty());
    }

    #[test]
    fn test_frame_interval_source() {
        let config = EngineConfig {
            frame_interval_ms: Some(50.0),
            ..EngineConfig::default()
        };
        let mut e = Engine::headless(config, 1000.0, 1000.0, 1.0);
        e.set_tool(ToolKind::Pen);
        e.frame(0.0);
        e.pointer_down(&PointerEvent::new(100.0, 100.0).at(10.0));
        e.pointer_move(&PointerEvent::new(200.0, 200.0).at(20.0));
        assert!(!e.frame(20.0).batch_applied);
        assert!(e.has_pending_frame());
        assert!(e.frame(50.0).batch_applied);
    }

    #[test]
    fn test_document_roundtrip_through_engine() {
        let mut e = engine();
        e.set_tool(ToolKind::Pen);
        stroke(&mut e, &[(100.0, 100.0), (200.0, 200.0)], 0.0);
        e.set_tool(ToolKind::Select);
        let doc = e.export_document();

        let mut other = engine();
        other.import_document(doc);
        assert_eq!(other.store().len(), 1);
        assert_eq!(other.active_tool(), ToolKind::Select);
        assert_eq!(other.store().current_action(), "import");
    }

    #[test]
    fn test_collaboration_outbound_and_inbound() {
        let mut alice = engine();
        let mut bob = engine();
        alice.join("room", "alice");
        bob.join("room", "bob");

        alice.set_tool(ToolKind::Pen);
        stroke(&mut alice, &[(100.0, 100.0), (200.0, 150.0), (300.0, 220.0)], 0.0);
        let events = alice.drain_outbound(1000.0);
        assert!(!events.is_empty());
        for event in &events {
            bob.receive(&event.to_json().unwrap(), 1000.0);
        }
        assert_eq!(bob.store().len(), 1);
        assert_eq!(bob.store().z_order(), alice.store().z_order());
        assert!(bob.drain_outbound(2000.0).is_empty());
        // The remote stroke is not in bob's local history.
        assert_eq!(bob.store().history_len(), 1);
        assert_eq!(bob.remote_cursors().len(), 1);
    }

    #[test]
    fn test_receive_rejects_garbage_and_own_events() {
        let mut e = engine();
        e.join("room", "me");
        assert!(!e.receive("{\"type\": 5}", 0.0));
        let own = CollabEvent::new(
            "room",
            "me",
            CollabPayload::ShapeAdd {
                shape: Shape::new(
                    ShapeBody::Stamp(StampData {
                        glyph: "x".into(),
                        size: 10.0,
                    }),
                    Point::new(0.5, 0.5),
                ),
            },
        );
        assert!(!e.receive(&own.to_json().unwrap(), 0.0));
        assert!(e.store().is_empty());
    }

    #[test]
    fn test_remote_cursor_goes_stale() {
        let mut e = engine();
        e.join("room", "me");
        let mv = CollabEvent::new("room", "peer", CollabPayload::CursorMove { x: 0.5, y: 0.5 });
        assert!(e.receive(&mv.to_json().unwrap(), 0.0));
        assert!(e
            .overlays()
            .iter()
            .any(|o| matches!(o, Overlay::RemoteCursor { user, .. } if user == "peer")));
        e.frame(1000.0);
        assert_eq!(e.remote_cursors().len(), 1);
        let report = e.frame(6000.0);
        assert_eq!(report.cursors_swept, 1);
        assert!(e.remote_cursors().is_empty());
    }

    #[test]
    fn test_live_stroke_does_not_damage_shapes() {
        let mut e = engine();
        e.set_tool(ToolKind::Pen);
        e.take_shapes_damage();
        e.pointer_down(&PointerEvent::new(100.0, 100.0).at(0.0));
        e.pointer_move(&PointerEvent::new(200.0, 200.0).at(16.0));
        e.frame(16.0);
        assert!(!e.take_shapes_damage());
        e.pointer_up(&PointerEvent::new(200.0, 200.0).at(32.0));
        assert!(e.take_shapes_damage());
        assert!(!e.take_shapes_damage());
    }

    #[test]
    fn test_selection_overlay() {
        let mut e = engine();
        e.set_tool(ToolKind::Pen);
        stroke(&mut e, &[(100.0, 100.0), (200.0, 200.0)], 0.0);
        e.store_mut().select_all();
        assert!(matches!(e.overlays().as_slice(), [Overlay::SelectionBox { .. }]));
    }
}
