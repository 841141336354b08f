//! Text tool: double-click to create or edit, single-click drag to move.

use super::{Overlay, ToolBehavior, ToolContext};
use crate::config::EngineConfig;
use crate::error::{ToolError, ToolResult};
use crate::input::{ClickTracker, Key, KeyEvent, PointerEvent};
use crate::shapes::{FontDescriptor, Shape, ShapeBody, ShapeId, ShapeKind, TextData};
use crate::store::ShapeStore;
use crate::surface::CursorIcon;
use kurbo::Point;

/// An open edit session. The store is untouched until commit.
#[derive(Debug, Clone)]
pub struct TextSession {
    /// Existing shape being edited, or `None` for a new one.
    target: Option<ShapeId>,
    draft: Shape,
    buffer: Vec<char>,
    cursor: usize,
    caret_visible: bool,
    blink_anchor_ms: f64,
}

impl TextSession {
    pub fn target(&self) -> Option<ShapeId> {
        self.target
    }

    pub fn content(&self) -> String {
        self.buffer.iter().collect()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn caret_visible(&self) -> bool {
        self.caret_visible
    }

    fn insert(&mut self, text: &str) {
        for c in text.chars() {
            self.buffer.insert(self.cursor, c);
            self.cursor += 1;
        }
    }

    fn sync_draft(&mut self) {
        let content = self.content();
        if let ShapeBody::Text(data) = &mut self.draft.body {
            data.set_content(content);
        }
    }
}

#[derive(Debug)]
struct TextDrag {
    pointer_id: u32,
    id: ShapeId,
    start: Point,
    origin: Point,
    moved: bool,
}

#[derive(Debug)]
pub struct TextTool {
    clicks: ClickTracker,
    blink_ms: f64,
    now_ms: f64,
    session: Option<TextSession>,
    drag: Option<TextDrag>,
}

impl TextTool {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            clicks: ClickTracker::new(config.double_click_ms, config.double_click_distance),
            blink_ms: config.caret_blink_ms,
            now_ms: 0.0,
            session: None,
            drag: None,
        }
    }

    pub fn session(&self) -> Option<&TextSession> {
        self.session.as_ref()
    }

    fn open_session(&mut self, hit: Option<ShapeId>, at: Point, cx: &mut ToolContext<'_>) {
        let existing = hit.and_then(|id| cx.store.shape(id)).and_then(|shape| match &shape.body {
            ShapeBody::Text(data) => Some((shape.clone(), data.content.chars().collect::<Vec<_>>())),
            _ => None,
        });
        let (target, draft, buffer) = match existing {
            Some((shape, buffer)) => (Some(shape.id()), shape, buffer),
            None => {
                let settings = cx.store.settings();
                let zoom = cx.store.viewport().zoom;
                let font = FontDescriptor {
                    size: settings.font.size / zoom,
                    ..settings.font.clone()
                };
                let data = TextData::new("", font, settings.color);
                let draft = Shape::new(ShapeBody::Text(data), at).with_opacity(settings.opacity);
                (None, draft, Vec::new())
            }
        };
        log::debug!("Opened text session on {:?}", target);
        self.session = Some(TextSession {
            target,
            draft,
            cursor: buffer.len(),
            buffer,
            caret_visible: true,
            blink_anchor_ms: self.now_ms,
        });
        cx.surface.set_cursor(CursorIcon::Text);
    }

    /// Write the session back to the store.
    fn commit(&mut self, cx: &mut ToolContext<'_>) -> ToolResult {
        let Some(session) = self.session.take() else {
            return Ok(false);
        };
        let content = session.content();
        let empty = content.trim().is_empty();
        match session.target {
            Some(id) => {
                let original = match cx.store.shape(id).map(|s| &s.body) {
                    Some(ShapeBody::Text(data)) => data.content.clone(),
                    _ => return Err(ToolError::ShapeVanished(id)),
                };
                if empty {
                    cx.store.delete_shape(id);
                    log::debug!("Deleted emptied text {id}");
                } else if original != content {
                    cx.store.update_shape_with(id, |shape| {
                        if let ShapeBody::Text(data) = &mut shape.body {
                            data.set_content(content);
                        }
                    });
                    cx.store.save_history("text");
                }
            }
            None if empty => log::debug!("Discarded empty text session"),
            None => {
                let mut draft = session.draft;
                draft.touch();
                let id = cx.store.insert_shape(draft);
                cx.store.save_history("text");
                log::debug!("Created text {id}");
            }
        }
        Ok(true)
    }

    fn edit(&mut self, event: &KeyEvent, cx: &mut ToolContext<'_>) -> ToolResult {
        let Some(session) = self.session.as_mut() else {
            return Ok(false);
        };
        match &event.key {
            Key::Escape => {
                self.session = None;
                log::debug!("Cancelled text session");
                return Ok(true);
            }
            Key::Enter if !event.modifiers.shift => return self.commit(cx),
            Key::Enter => session.insert("\n"),
            Key::Character(text) if !event.modifiers.command() => session.insert(text),
            Key::Backspace if session.cursor > 0 => {
                session.cursor -= 1;
                session.buffer.remove(session.cursor);
            }
            Key::Delete if session.cursor < session.buffer.len() => {
                session.buffer.remove(session.cursor);
            }
            Key::ArrowLeft => session.cursor = session.cursor.saturating_sub(1),
            Key::ArrowRight => session.cursor = (session.cursor + 1).min(session.buffer.len()),
            Key::Home => session.cursor = 0,
            Key::End => session.cursor = session.buffer.len(),
            _ => return Ok(false),
        }
        session.sync_draft();
        session.caret_visible = true;
        session.blink_anchor_ms = self.now_ms;
        Ok(true)
    }
}

fn is_text(shape: &Shape) -> bool {
    shape.kind() == ShapeKind::Text && !shape.locked
}

impl ToolBehavior for TextTool {
    fn deactivate(&mut self, cx: &mut ToolContext<'_>) {
        if let Some(drag) = self.drag.take() {
            cx.surface.release_pointer(drag.pointer_id);
        }
        if let Err(err) = self.commit(cx) {
            log::warn!("Could not commit text on tool switch: {err}");
        }
        self.clicks.reset();
    }

    fn pointer_down(&mut self, event: &PointerEvent, cx: &mut ToolContext<'_>) -> ToolResult {
        if self.drag.is_some() {
            return Ok(false);
        }
        let world = cx.to_world(event.position)?;
        let double = self.clicks.register(event);
        let hit = cx.topmost_hit(event.position, cx.config.hit_tolerance, is_text);

        if double {
            if let Some(session) = &self.session {
                if hit.is_some() && session.target == hit {
                    return Ok(true);
                }
                self.commit(cx)?;
            }
            self.open_session(hit, world, cx);
            return Ok(true);
        }

        if let Some(session) = &self.session {
            let viewport = cx.viewport();
            if session.draft.hit_test(event.position, cx.config.hit_tolerance, &viewport) {
                return Ok(true);
            }
            // Clicking elsewhere blurs the editor.
            self.commit(cx)?;
        }

        match hit {
            Some(id) => {
                let origin = cx.store.shape(id).map(Shape::origin).unwrap_or(world);
                cx.surface.capture_pointer(event.pointer_id);
                cx.surface.set_cursor(CursorIcon::Move);
                self.drag = Some(TextDrag {
                    pointer_id: event.pointer_id,
                    id,
                    start: world,
                    origin,
                    moved: false,
                });
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn pointer_move(&mut self, event: &PointerEvent, cx: &mut ToolContext<'_>) -> ToolResult {
        let Some(drag) = self.drag.as_mut().filter(|d| d.pointer_id == event.pointer_id) else {
            return Ok(false);
        };
        let world = cx.to_world(event.position)?;
        let target = drag.origin + (world - drag.start);
        drag.moved = true;
        let id = drag.id;
        cx.batcher.schedule(move |store: &mut ShapeStore| {
            store.update_shape_with(id, |shape| shape.translate(target - shape.origin()));
        });
        Ok(true)
    }

    fn pointer_up(&mut self, event: &PointerEvent, cx: &mut ToolContext<'_>) -> ToolResult {
        let Some(drag) = self.drag.take_if(|d| d.pointer_id == event.pointer_id) else {
            return Ok(false);
        };
        cx.batcher.cancel();
        cx.surface.release_pointer(drag.pointer_id);
        cx.surface.set_cursor(CursorIcon::Text);
        if !drag.moved {
            return Ok(true);
        }
        let world = cx.to_world(event.position)?;
        let target = drag.origin + (world - drag.start);
        let moved = cx
            .store
            .update_shape_with(drag.id, |shape| shape.translate(target - shape.origin()));
        if !moved {
            return Err(ToolError::ShapeVanished(drag.id));
        }
        if target != drag.origin {
            cx.store.save_history("move");
        }
        Ok(true)
    }

    fn key_down(&mut self, event: &KeyEvent, cx: &mut ToolContext<'_>) -> ToolResult {
        self.edit(event, cx)
    }

    fn on_frame(&mut self, now_ms: f64, _cx: &mut ToolContext<'_>) -> bool {
        self.now_ms = now_ms;
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        if now_ms - session.blink_anchor_ms >= self.blink_ms {
            session.caret_visible = !session.caret_visible;
            session.blink_anchor_ms = now_ms;
            return true;
        }
        false
    }

    fn captured_pointer(&self) -> Option<u32> {
        self.drag.as_ref().map(|d| d.pointer_id)
    }

    fn is_active(&self) -> bool {
        self.drag.is_some() || self.session.is_some()
    }

    fn in_flight(&self) -> Option<ShapeId> {
        self.session.as_ref().and_then(|s| s.target)
    }

    fn preview_shape(&self) -> Option<&Shape> {
        self.session.as_ref().map(|s| &s.draft)
    }

    fn overlays(&self, out: &mut Vec<Overlay>) {
        let Some(session) = self.session.as_ref().filter(|s| s.caret_visible) else {
            return;
        };
        if let ShapeBody::Text(data) = &session.draft.body {
            let scale = session.draft.scale;
            out.push(Overlay::Caret {
                origin: session.draft.origin(),
                offset: data.caret_offset(session.cursor) * scale,
                height: data.line_height() * scale,
            });
        }
    }
}
