//! Collaboration events for real-time multi-user annotation.
//!
//! The engine never talks to a network. It emits [`CollabEvent`]s for local
//! changes (coalesced by [`OutboundQueue`]) and applies events that the host
//! hands back from other participants.

use crate::error::{EngineError, EngineResult};
use crate::shapes::{Shape, ShapeId, ShapePatch};
use crate::store::{ShapeStore, StoreChange};
use crate::time::now_millis;
use kurbo::Point;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One message on the collaboration channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollabEvent {
    pub timestamp: u64,
    pub room: String,
    pub user: String,
    #[serde(flatten)]
    pub payload: CollabPayload,
}

/// Event payload, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CollabPayload {
    #[serde(rename = "shape:add")]
    ShapeAdd { shape: Shape },
    #[serde(rename = "shape:update")]
    ShapeUpdate { id: ShapeId, patch: ShapePatch },
    #[serde(rename = "shape:delete")]
    ShapeDelete { ids: Vec<ShapeId> },
    /// World coordinates of the sender's pointer.
    #[serde(rename = "cursor:move")]
    CursorMove { x: f64, y: f64 },
    #[serde(rename = "stroke:clear")]
    StrokeClear,
}

impl CollabEvent {
    pub fn new(room: &str, user: &str, payload: CollabPayload) -> Self {
        Self {
            timestamp: now_millis(),
            room: room.to_string(),
            user: user.to_string(),
            payload,
        }
    }

    pub fn to_json(&self) -> EngineResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> EngineResult<Self> {
        serde_json::from_str(json).map_err(|e| EngineError::MalformedEvent(e.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq)]
enum PendingOp {
    Add(ShapeId),
    Update(ShapeId),
    Delete(Vec<ShapeId>),
    Clear,
}

/// Outbound coalescing queue.
///
/// Holds ids, not shape data: every flush reads the latest state from the
/// store, so several updates of one shape collapse into one message.
#[derive(Debug, Clone)]
pub struct OutboundQueue {
    interval_ms: f64,
    last_flush_ms: Option<f64>,
    ops: Vec<PendingOp>,
    cursor: Option<Point>,
}

impl OutboundQueue {
    pub fn new(interval_ms: f64) -> Self {
        Self {
            interval_ms: interval_ms.max(0.0),
            last_flush_ms: None,
            ops: Vec::new(),
            cursor: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty() && self.cursor.is_none()
    }

    pub fn pending_ops(&self) -> usize {
        self.ops.len()
    }

    pub fn push_change(&mut self, change: StoreChange) {
        match change {
            StoreChange::Added(id) => self.ops.push(PendingOp::Add(id)),
            StoreChange::Updated(id) => {
                let covered = self
                    .ops
                    .iter()
                    .any(|op| matches!(op, PendingOp::Add(x) | PendingOp::Update(x) if *x == id));
                if !covered {
                    self.ops.push(PendingOp::Update(id));
                }
            }
            StoreChange::Deleted(id) => {
                self.ops.retain(|op| !matches!(op, PendingOp::Update(x) if *x == id));
                // An add the peers never saw cancels out with its delete.
                let add = self.ops.iter().rposition(|op| *op == PendingOp::Add(id));
                if let Some(index) = add {
                    self.ops.remove(index);
                    return;
                }
                match self.ops.last_mut() {
                    Some(PendingOp::Delete(ids)) => ids.push(id),
                    _ => self.ops.push(PendingOp::Delete(vec![id])),
                }
            }
            StoreChange::Cleared => {
                self.ops.clear();
                self.ops.push(PendingOp::Clear);
            }
        }
    }

    pub fn push_cursor(&mut self, world: Point) {
        self.cursor = Some(world);
    }

    /// Flush pending operations when at least one interval has passed since
    /// the previous flush.
    pub fn drain(&mut self, now_ms: f64, room: &str, user: &str, store: &ShapeStore) -> Vec<CollabEvent> {
        if self.is_empty() {
            return Vec::new();
        }
        if self
            .last_flush_ms
            .is_some_and(|last| now_ms - last < self.interval_ms)
        {
            return Vec::new();
        }
        self.last_flush_ms = Some(now_ms);

        let mut events: Vec<CollabEvent> = self
            .ops
            .drain(..)
            .filter_map(|op| match op {
                PendingOp::Add(id) => store.shape(id).map(|shape| CollabPayload::ShapeAdd { shape: shape.clone() }),
                PendingOp::Update(id) => store.shape(id).map(|shape| CollabPayload::ShapeUpdate {
                    id,
                    patch: ShapePatch::from_shape(shape),
                }),
                PendingOp::Delete(ids) => Some(CollabPayload::ShapeDelete { ids }),
                PendingOp::Clear => Some(CollabPayload::StrokeClear),
            })
            .map(|payload| CollabEvent::new(room, user, payload))
            .collect();
        if let Some(cursor) = self.cursor.take() {
            events.push(CollabEvent::new(
                room,
                user,
                CollabPayload::CursorMove {
                    x: cursor.x,
                    y: cursor.y,
                },
            ));
        }
        log::trace!("Flushed {} collaboration events", events.len());
        events
    }
}

/// A remote participant's pointer.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteCursor {
    pub user: String,
    pub position: Point,
    pub last_seen_ms: f64,
}

/// Remote cursors keyed by user.
#[derive(Debug, Clone, Default)]
pub struct RemoteCursors {
    cursors: HashMap<String, RemoteCursor>,
}

impl RemoteCursors {
    pub fn update(&mut self, user: &str, position: Point, now_ms: f64) {
        self.cursors.insert(
            user.to_string(),
            RemoteCursor {
                user: user.to_string(),
                position,
                last_seen_ms: now_ms,
            },
        );
    }

    pub fn remove(&mut self, user: &str) -> bool {
        self.cursors.remove(user).is_some()
    }

    /// Drop cursors not seen for `stale_ms`. Returns how many were dropped.
    pub fn sweep(&mut self, now_ms: f64, stale_ms: f64) -> usize {
        let before = self.cursors.len();
        self.cursors.retain(|_, c| now_ms - c.last_seen_ms <= stale_ms);
        before - self.cursors.len()
    }

    pub fn len(&self) -> usize {
        self.cursors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cursors.is_empty()
    }

    /// Cursors sorted by user name.
    pub fn list(&self) -> Vec<&RemoteCursor> {
        let mut list: Vec<&RemoteCursor> = self.cursors.values().collect();
        list.sort_by(|a, b| a.user.cmp(&b.user));
        list
    }
}

/// Membership in a collaboration room.
#[derive(Debug, Clone)]
pub struct CollabSession {
    room: String,
    user: String,
    outbound: OutboundQueue,
}

impl CollabSession {
    pub fn new(room: &str, user: &str, interval_ms: f64) -> Self {
        Self {
            room: room.to_string(),
            user: user.to_string(),
            outbound: OutboundQueue::new(interval_ms),
        }
    }

    pub fn room(&self) -> &str {
        &self.room
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn outbound(&self) -> &OutboundQueue {
        &self.outbound
    }

    pub fn record(&mut self, changes: Vec<StoreChange>) {
        for change in changes {
            self.outbound.push_change(change);
        }
    }

    pub fn push_cursor(&mut self, world: Point) {
        self.outbound.push_cursor(world);
    }

    pub fn drain(&mut self, now_ms: f64, store: &ShapeStore) -> Vec<CollabEvent> {
        self.outbound.drain(now_ms, &self.room, &self.user, store)
    }

    /// Whether an inbound event belongs to this room and another user.
    pub fn accepts(&self, event: &CollabEvent) -> bool {
        event.room == self.room && event.user != self.user
    }
}

/// Apply a remote event. The store does not record these changes, so they
/// are never echoed back out.
pub fn apply_remote(store: &mut ShapeStore, cursors: &mut RemoteCursors, event: CollabEvent, now_ms: f64) -> bool {
    let user = event.user;
    store.without_recording(|store| match event.payload {
        CollabPayload::ShapeAdd { shape } => {
            store.insert_shape(shape);
            true
        }
        CollabPayload::ShapeUpdate { id, patch } => store.update_shape(id, &patch),
        CollabPayload::ShapeDelete { ids } => store.remove_shapes(&ids) > 0,
        CollabPayload::StrokeClear => {
            let ids: Vec<ShapeId> = store.z_order().to_vec();
            store.remove_shapes(&ids);
            true
        }
        CollabPayload::CursorMove { x, y } => {
            cursors.update(&user, Point::new(x, y), now_ms);
            true
        }
    })
}
