//! Shape store: the canonical shape mapping, selection, viewport and history.
//!
//! Every shape mutation goes through this type. Shapes are held behind `Arc`
//! so history snapshots share unchanged records; a mutation clones only the
//! record it touches (`Arc::make_mut`).

use crate::config::EngineConfig;
use crate::settings::ToolSettings;
use crate::shapes::{Shape, ShapeId, ShapePatch};
use crate::time::now_millis;
use crate::viewport::Viewport;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// Shape mapping shared between the live state and history snapshots.
pub type ShapeMap = HashMap<ShapeId, Arc<Shape>>;

/// Label of the entry every store starts with.
pub const INITIAL_ACTION: &str = "init";

/// Immutable snapshot of the shape mapping after an action.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    shapes: ShapeMap,
    z_order: Vec<ShapeId>,
    action: String,
    timestamp: u64,
}

impl HistoryEntry {
    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn shape_count(&self) -> usize {
        self.shapes.len()
    }

    pub fn contains(&self, id: ShapeId) -> bool {
        self.shapes.contains_key(&id)
    }
}

/// A mutation of the live mapping, recorded for collaboration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreChange {
    Added(ShapeId),
    Updated(ShapeId),
    Deleted(ShapeId),
    Cleared,
}

/// The canonical store.
#[derive(Debug, Clone)]
pub struct ShapeStore {
    shapes: ShapeMap,
    /// Back to front.
    z_order: Vec<ShapeId>,
    selection: BTreeSet<ShapeId>,
    viewport: Viewport,
    settings: ToolSettings,
    history: Vec<HistoryEntry>,
    history_index: usize,
    history_cap: usize,
    max_shapes: usize,
    /// Bumped on every change to the live mapping.
    revision: u64,
    changes: Vec<StoreChange>,
    recording: bool,
}

impl Default for ShapeStore {
    fn default() -> Self {
        Self::new(&EngineConfig::default(), Viewport::default())
    }
}

impl ShapeStore {
    /// Create an empty store with the initial history entry.
    pub fn new(config: &EngineConfig, viewport: Viewport) -> Self {
        let mut store = Self {
            shapes: HashMap::new(),
            z_order: Vec::new(),
            selection: BTreeSet::new(),
            viewport: viewport.with_zoom_bounds(config.min_zoom, config.max_zoom),
            settings: ToolSettings::default(),
            history: Vec::new(),
            history_index: 0,
            history_cap: config.history_cap.max(1),
            max_shapes: config.max_shapes,
            revision: 0,
            changes: Vec::new(),
            recording: true,
        };
        store.save_history(INITIAL_ACTION);
        store
    }

    // --- Queries -------------------------------------------------------

    pub fn shape(&self, id: ShapeId) -> Option<&Shape> {
        self.shapes.get(&id).map(Arc::as_ref)
    }

    /// Shared handle to a shape record (cheap, no deep clone).
    pub fn shape_arc(&self, id: ShapeId) -> Option<Arc<Shape>> {
        self.shapes.get(&id).cloned()
    }

    pub fn contains(&self, id: ShapeId) -> bool {
        self.shapes.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    /// Shape ids back to front.
    pub fn z_order(&self) -> &[ShapeId] {
        &self.z_order
    }

    /// Shapes back to front.
    pub fn shapes_ordered(&self) -> impl DoubleEndedIterator<Item = &Shape> {
        self.z_order
            .iter()
            .filter_map(|id| self.shapes.get(id).map(Arc::as_ref))
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    // --- Mutations -----------------------------------------------------

    /// Insert a shape and push an "add" history entry.
    pub fn add_shape(&mut self, shape: Shape) -> ShapeId {
        let id = self.insert_shape(shape);
        self.save_history("add");
        id
    }

    /// Insert a shape without touching history.
    ///
    /// Tools use this on pointer-down and commit the gesture later. Re-adding
    /// an existing id replaces the record in place and keeps its z position.
    pub fn insert_shape(&mut self, shape: Shape) -> ShapeId {
        let id = shape.id();
        if let Some(slot) = self.shapes.get_mut(&id) {
            log::debug!("Shape {id} re-added; last write wins");
            *slot = Arc::new(shape);
            self.record(StoreChange::Updated(id));
        } else {
            if self.max_shapes > 0 && self.shapes.len() >= self.max_shapes {
                self.evict_oldest();
            }
            self.shapes.insert(id, Arc::new(shape));
            self.z_order.push(id);
            self.record(StoreChange::Added(id));
        }
        self.revision += 1;
        id
    }

    fn evict_oldest(&mut self) {
        if let Some(&victim) = self.z_order.first() {
            log::warn!(
                "Shape limit {} reached; evicting oldest shape {victim}",
                self.max_shapes
            );
            self.remove_shapes(&[victim]);
        }
    }

    /// Merge `patch` into a shape. Does not push history.
    /// Returns false for unknown ids.
    pub fn update_shape(&mut self, id: ShapeId, patch: &ShapePatch) -> bool {
        self.update_shape_with(id, |shape| shape.apply_patch(patch))
    }

    /// Mutate a shape in place. Does not push history.
    /// Returns false for unknown ids.
    pub fn update_shape_with(&mut self, id: ShapeId, f: impl FnOnce(&mut Shape)) -> bool {
        let Some(entry) = self.shapes.get_mut(&id) else {
            return false;
        };
        let shape = Arc::make_mut(entry);
        f(shape);
        shape.touch();
        self.record(StoreChange::Updated(id));
        self.revision += 1;
        true
    }

    /// Remove one shape and push a "delete" entry. Unknown ids are a no-op.
    pub fn delete_shape(&mut self, id: ShapeId) -> bool {
        self.delete_shapes(&[id]) > 0
    }

    /// Remove shapes and push one "delete" entry if anything was removed.
    pub fn delete_shapes(&mut self, ids: &[ShapeId]) -> usize {
        let removed = self.remove_shapes(ids);
        if removed > 0 {
            self.save_history("delete");
        }
        removed
    }

    /// Remove shapes without touching history.
    pub fn remove_shapes(&mut self, ids: &[ShapeId]) -> usize {
        let mut removed = 0;
        for id in ids {
            if self.shapes.remove(id).is_some() {
                self.selection.remove(id);
                self.record(StoreChange::Deleted(*id));
                removed += 1;
            }
        }
        if removed > 0 {
            let shapes = &self.shapes;
            self.z_order.retain(|id| shapes.contains_key(id));
            self.revision += 1;
        }
        removed
    }

    /// Remove every shape and push a "clear" entry.
    pub fn clear_shapes(&mut self) {
        self.shapes.clear();
        self.z_order.clear();
        self.selection.clear();
        self.record(StoreChange::Cleared);
        self.revision += 1;
        self.save_history("clear");
    }

    /// Replace the whole mapping (document import) and push one entry.
    pub fn replace_all(&mut self, shapes: Vec<Shape>, action: &str) {
        let mut map = ShapeMap::with_capacity(shapes.len());
        let mut order = Vec::with_capacity(shapes.len());
        for shape in shapes {
            let id = shape.id();
            if map.insert(id, Arc::new(shape)).is_none() {
                order.push(id);
            }
        }
        self.install(map, order);
        self.selection.clear();
        self.save_history(action);
    }

    // --- History -------------------------------------------------------

    /// Snapshot the live mapping as a new entry, dropping any redo tail and
    /// the oldest entries beyond the cap.
    pub fn save_history(&mut self, action: &str) {
        self.history.truncate(self.history_index + 1);
        self.history.push(HistoryEntry {
            shapes: self.shapes.clone(),
            z_order: self.z_order.clone(),
            action: action.to_string(),
            timestamp: now_millis(),
        });
        let overflow = self.history.len().saturating_sub(self.history_cap);
        if overflow > 0 {
            self.history.drain(..overflow);
            log::debug!("History cap {} reached; dropped {overflow} entries", self.history_cap);
        }
        self.history_index = self.history.len() - 1;
        log::trace!("History push {action:?} ({} entries)", self.history.len());
    }

    /// Step back one entry. No-op at the first entry.
    pub fn undo(&mut self) -> bool {
        if self.history_index == 0 {
            return false;
        }
        self.history_index -= 1;
        self.restore(self.history_index);
        true
    }

    /// Step forward one entry. No-op at the tail.
    pub fn redo(&mut self) -> bool {
        if self.history_index + 1 >= self.history.len() {
            return false;
        }
        self.history_index += 1;
        self.restore(self.history_index);
        true
    }

    /// Throw away uncommitted mutations, restoring the current entry.
    pub fn revert_to_checkpoint(&mut self) {
        self.restore(self.history_index);
    }

    pub fn can_undo(&self) -> bool {
        self.history_index > 0
    }

    pub fn can_redo(&self) -> bool {
        self.history_index + 1 < self.history.len()
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn history_index(&self) -> usize {
        self.history_index
    }

    /// Label of the current entry.
    pub fn current_action(&self) -> &str {
        self.history
            .get(self.history_index)
            .map_or(INITIAL_ACTION, HistoryEntry::action)
    }

    fn restore(&mut self, index: usize) {
        let Some(entry) = self.history.get(index) else {
            return;
        };
        let shapes = entry.shapes.clone();
        let z_order = entry.z_order.clone();
        self.install(shapes, z_order);
        let shapes = &self.shapes;
        self.selection.retain(|id| shapes.contains_key(id));
    }

    /// Swap in a new mapping, recording the precise difference.
    fn install(&mut self, shapes: ShapeMap, z_order: Vec<ShapeId>) {
        if self.recording {
            for id in &self.z_order {
                if !shapes.contains_key(id) {
                    self.changes.push(StoreChange::Deleted(*id));
                }
            }
            for id in &z_order {
                match (self.shapes.get(id), shapes.get(id)) {
                    (None, Some(_)) => self.changes.push(StoreChange::Added(*id)),
                    (Some(old), Some(new)) if !Arc::ptr_eq(old, new) => {
                        self.changes.push(StoreChange::Updated(*id))
                    }
                    _ => {}
                }
            }
        }
        self.shapes = shapes;
        self.z_order = z_order;
        self.revision += 1;
    }

    // --- Change log ----------------------------------------------------

    fn record(&mut self, change: StoreChange) {
        if self.recording {
            self.changes.push(change);
        }
    }

    /// Drain the changes recorded since the last call.
    pub fn take_changes(&mut self) -> Vec<StoreChange> {
        std::mem::take(&mut self.changes)
    }

    /// Run `f` without recording changes (for remotely originated mutations).
    pub fn without_recording<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        let previous = std::mem::replace(&mut self.recording, false);
        let result = f(self);
        self.recording = previous;
        result
    }

    // --- Selection -----------------------------------------------------

    pub fn selection(&self) -> &BTreeSet<ShapeId> {
        &self.selection
    }

    pub fn is_selected(&self, id: ShapeId) -> bool {
        self.selection.contains(&id)
    }

    /// Replace the selection; unknown ids are ignored.
    pub fn set_selection(&mut self, ids: impl IntoIterator<Item = ShapeId>) {
        self.selection.clear();
        self.extend_selection(ids);
    }

    pub fn extend_selection(&mut self, ids: impl IntoIterator<Item = ShapeId>) {
        for id in ids {
            if self.shapes.contains_key(&id) {
                self.selection.insert(id);
            }
        }
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    pub fn select_all(&mut self) {
        self.selection = self.z_order.iter().copied().collect();
    }

    // --- Viewport and chrome --------------------------------------------

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    /// Replace the viewport, clamping zoom to its bounds.
    pub fn set_viewport(&mut self, mut viewport: Viewport) {
        viewport.zoom = viewport.zoom.clamp(viewport.min_zoom, viewport.max_zoom);
        self.viewport = viewport;
    }

    pub fn settings(&self) -> &ToolSettings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut ToolSettings {
        &mut self.settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::{SerializableColor, ShapeBody, StampData, VectorData, VectorKind};
    use kurbo::{Point, Vec2};

    fn rect_shape(x: f64) -> Shape {
        Shape::new(
            ShapeBody::Vector(VectorData::new(
                VectorKind::Rectangle,
                Point::new(x, 0.1),
                Point::new(x + 0.1, 0.2),
                SerializableColor::black(),
                2.0,
            )),
            Point::new(x, 0.1),
        )
    }

    fn stamp(id: ShapeId) -> Shape {
        Shape::with_id(
            id,
            ShapeBody::Stamp(StampData {
                glyph: "*".into(),
                size: 40.0,
            }),
            Point::new(0.5, 0.5),
        )
    }

    fn small_store(cap: usize, max_shapes: usize) -> ShapeStore {
        let config = EngineConfig {
            history_cap: cap,
            max_shapes,
            ..Default::default()
        };
        ShapeStore::new(&config, Viewport::default())
    }

    #[test]
    fn test_new_store_has_initial_entry() {
        let store = ShapeStore::default();
        assert_eq!(store.history_len(), 1);
        assert_eq!(store.history_index(), 0);
        assert_eq!(store.current_action(), INITIAL_ACTION);
        assert!(!store.can_undo());
        assert!(!store.can_redo());
    }

    #[test]
    fn test_undo_redo_at_bounds_are_noops() {
        let mut store = ShapeStore::default();
        assert!(!store.undo());
        assert_eq!(store.history_index(), 0);
        store.add_shape(rect_shape(0.1));
        assert!(!store.redo());
        assert_eq!(store.history_index(), 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_add_add_delete_undo_redo_sequence() {
        let mut store = ShapeStore::default();
        let a = store.add_shape(rect_shape(0.1));
        let b = store.add_shape(rect_shape(0.3));
        assert!(store.delete_shape(a));
        assert_eq!(store.len(), 1);

        for _ in 0..3 {
            assert!(store.undo());
        }
        assert!(store.is_empty());
        assert!(!store.undo());

        for _ in 0..3 {
            assert!(store.redo());
        }
        assert!(!store.contains(a));
        assert!(store.contains(b));
        assert_eq!(store.len(), 1);
        assert_eq!(store.current_action(), "delete");
    }

    #[test]
    fn test_new_mutation_truncates_redo_tail() {
        let mut store = ShapeStore::default();
        store.add_shape(rect_shape(0.1));
        store.add_shape(rect_shape(0.2));
        store.undo();
        assert!(store.can_redo());
        store.add_shape(rect_shape(0.3));
        assert!(!store.can_redo());
        assert_eq!(store.history_len(), 3);
    }

    #[test]
    fn test_history_cap_drops_oldest() {
        let mut store = small_store(5, 0);
        for i in 0..10 {
            store.add_shape(rect_shape(i as f64 * 0.05));
        }
        assert_eq!(store.history_len(), 5);
        assert_eq!(store.history_index(), 4);
        let mut undos = 0;
        while store.undo() {
            undos += 1;
        }
        assert_eq!(undos, 4);
        // Oldest reachable state still has the first six shapes.
        assert_eq!(store.len(), 6);
    }

    #[test]
    fn test_update_does_not_push_history_and_is_copy_on_write() {
        let mut store = ShapeStore::default();
        let id = store.add_shape(rect_shape(0.1));
        let before = store.history_len();
        assert!(store.update_shape(id, &ShapePatch::position(0.5, 0.5)));
        assert_eq!(store.history_len(), before);
        assert!((store.shape(id).unwrap().x - 0.5).abs() < 1e-12);

        // The committed snapshot still holds the original record.
        store.revert_to_checkpoint();
        assert!((store.shape(id).unwrap().x - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_unknown_ids_are_silent_noops() {
        let mut store = ShapeStore::default();
        let ghost = ShapeId::new_v4();
        assert!(!store.update_shape(ghost, &ShapePatch::position(0.0, 0.0)));
        assert!(!store.delete_shape(ghost));
        assert_eq!(store.history_len(), 1);
    }

    #[test]
    fn test_delete_removes_from_selection() {
        let mut store = ShapeStore::default();
        let a = store.add_shape(rect_shape(0.1));
        let b = store.add_shape(rect_shape(0.2));
        store.set_selection([a, b, ShapeId::new_v4()]);
        assert_eq!(store.selection().len(), 2);
        store.delete_shapes(&[a]);
        assert!(!store.is_selected(a));
        assert!(store.is_selected(b));
    }

    #[test]
    fn test_clear_pushes_clear_entry() {
        let mut store = ShapeStore::default();
        store.add_shape(rect_shape(0.1));
        store.clear_shapes();
        assert!(store.is_empty());
        assert_eq!(store.current_action(), "clear");
        assert!(store.undo());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_readd_same_id_replaces_in_place() {
        let mut store = ShapeStore::default();
        let id = ShapeId::new_v4();
        store.add_shape(stamp(id));
        let other = store.add_shape(rect_shape(0.1));
        let mut replacement = stamp(id);
        replacement.scale = 3.0;
        store.add_shape(replacement);
        assert_eq!(store.len(), 2);
        assert_eq!(store.z_order(), &[id, other]);
        assert!((store.shape(id).unwrap().scale - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shape_ceiling_evicts_oldest() {
        let mut store = small_store(100, 2);
        let a = store.add_shape(rect_shape(0.1));
        let b = store.add_shape(rect_shape(0.2));
        let c = store.add_shape(rect_shape(0.3));
        assert_eq!(store.len(), 2);
        assert!(!store.contains(a));
        assert_eq!(store.z_order(), &[b, c]);
    }

    #[test]
    fn test_change_log_and_remote_suppression() {
        let mut store = ShapeStore::default();
        let a = store.add_shape(rect_shape(0.1));
        store.update_shape_with(a, |s| s.translate(Vec2::new(0.1, 0.0)));
        assert_eq!(
            store.take_changes(),
            vec![StoreChange::Added(a), StoreChange::Updated(a)]
        );

        store.without_recording(|s| {
            s.add_shape(rect_shape(0.4));
        });
        assert!(store.take_changes().is_empty());
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_undo_records_precise_diff() {
        let mut store = ShapeStore::default();
        let a = store.add_shape(rect_shape(0.1));
        store.update_shape(a, &ShapePatch::position(0.2, 0.2));
        store.save_history("move");
        let b = store.add_shape(rect_shape(0.5));
        store.take_changes();

        store.undo();
        assert_eq!(store.take_changes(), vec![StoreChange::Deleted(b)]);
        store.undo();
        assert_eq!(store.take_changes(), vec![StoreChange::Updated(a)]);
        store.redo();
        store.redo();
        assert_eq!(
            store.take_changes(),
            vec![StoreChange::Updated(a), StoreChange::Added(b)]
        );
    }

    #[test]
    fn test_replace_all_pushes_one_entry() {
        let mut store = ShapeStore::default();
        store.add_shape(rect_shape(0.1));
        store.replace_all(vec![rect_shape(0.2), rect_shape(0.3)], "import");
        assert_eq!(store.len(), 2);
        assert_eq!(store.history_len(), 3);
        assert_eq!(store.current_action(), "import");
    }

    #[test]
    fn test_revision_bumps_on_mutation() {
        let mut store = ShapeStore::default();
        let r0 = store.revision();
        let id = store.add_shape(rect_shape(0.1));
        let r1 = store.revision();
        assert!(r1 > r0);
        store.update_shape(id, &ShapePatch::position(0.3, 0.3));
        assert!(store.revision() > r1);
        store.set_viewport(Viewport::new(10.0, 10.0, 1.0));
        assert_eq!(store.revision(), r1 + 1);
    }
}
