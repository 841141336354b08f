//! Grid-based spatial index for approximate hit queries.
//!
//! The grid holds only id back-references. It is rebuilt in full, lazily, on
//! the first query after the store's revision moves.

use crate::shapes::ShapeId;
use crate::store::ShapeStore;
use kurbo::{Rect, Size};
use std::collections::{HashMap, HashSet};

/// Default cell edge in world units.
pub const DEFAULT_CELL_SIZE: f64 = 0.05;
/// Default bounds padding in world units (roughly an eraser radius).
pub const DEFAULT_PADDING: f64 = 0.01;
/// Shapes spanning more cells than this go to an always-returned overflow list.
const MAX_CELLS_PER_SHAPE: i64 = 4096;

type CellKey = (i32, i32);

#[derive(Debug, Clone)]
pub struct SpatialIndex {
    cell_size: f64,
    padding: f64,
    cells: HashMap<CellKey, HashSet<ShapeId>>,
    /// Shapes too large (or non-finite) to register cell by cell.
    oversized: HashSet<ShapeId>,
    surface: Size,
    built_revision: Option<u64>,
}

impl Default for SpatialIndex {
    fn default() -> Self {
        Self::new(DEFAULT_CELL_SIZE, DEFAULT_PADDING)
    }
}

impl SpatialIndex {
    pub fn new(cell_size: f64, padding: f64) -> Self {
        Self {
            cell_size: if cell_size > 0.0 { cell_size } else { DEFAULT_CELL_SIZE },
            padding: padding.max(0.0),
            cells: HashMap::new(),
            oversized: HashSet::new(),
            surface: Size::new(1000.0, 1000.0),
            built_revision: None,
        }
    }

    /// Cell containing a world point.
    pub fn cell_of(&self, x: f64, y: f64) -> CellKey {
        (
            (x / self.cell_size).floor() as i32,
            (y / self.cell_size).floor() as i32,
        )
    }

    /// Surface size used to convert pixel extents to world units.
    pub fn set_surface(&mut self, surface: Size) {
        if surface != self.surface && surface.width > 0.0 && surface.height > 0.0 {
            self.surface = surface;
            self.mark_dirty();
        }
    }

    pub fn mark_dirty(&mut self) {
        self.built_revision = None;
    }

    pub fn is_stale(&self, store: &ShapeStore) -> bool {
        self.built_revision != Some(store.revision())
    }

    /// Rebuild if the store changed since the last build.
    pub fn ensure_fresh(&mut self, store: &ShapeStore) {
        if self.is_stale(store) {
            self.rebuild(store);
        }
    }

    /// Full rebuild. Cost is proportional to the total number of points.
    pub fn rebuild(&mut self, store: &ShapeStore) {
        self.cells.clear();
        self.oversized.clear();
        for shape in store.shapes_ordered() {
            let bounds = shape.world_bounds(self.surface);
            self.insert(shape.id(), bounds);
        }
        self.built_revision = Some(store.revision());
        log::debug!(
            "Spatial index rebuilt: {} shapes in {} cells",
            store.len(),
            self.cells.len()
        );
    }

    /// Register an id in every cell its padded bounds overlap.
    pub fn insert(&mut self, id: ShapeId, bounds: Rect) {
        let padded = bounds.inflate(self.padding, self.padding);
        let Some((lo, hi)) = self.cell_range(padded) else {
            self.oversized.insert(id);
            return;
        };
        for cx in lo.0..=hi.0 {
            for cy in lo.1..=hi.1 {
                self.cells.entry((cx, cy)).or_default().insert(id);
            }
        }
    }

    fn cell_range(&self, rect: Rect) -> Option<(CellKey, CellKey)> {
        if ![rect.x0, rect.y0, rect.x1, rect.y1].iter().all(|v| v.is_finite()) {
            return None;
        }
        let lo = self.cell_of(rect.x0, rect.y0);
        let hi = self.cell_of(rect.x1, rect.y1);
        let span = (hi.0 as i64 - lo.0 as i64 + 1) * (hi.1 as i64 - lo.1 as i64 + 1);
        (span <= MAX_CELLS_PER_SHAPE).then_some((lo, hi))
    }

    /// Ids registered in the single cell containing `(x, y)`.
    ///
    /// This can miss a shape that reaches the point only through padding in
    /// a neighbouring cell; [`SpatialIndex::query_rect`] checks every
    /// overlapped cell.
    pub fn query(&mut self, store: &ShapeStore, x: f64, y: f64) -> Vec<ShapeId> {
        self.ensure_fresh(store);
        let mut out: HashSet<ShapeId> = self.oversized.clone();
        if let Some(ids) = self.cells.get(&self.cell_of(x, y)) {
            out.extend(ids.iter().copied());
        }
        ordered(store, out)
    }

    /// Ids in every cell overlapping `rect` (world units).
    pub fn query_rect(&mut self, store: &ShapeStore, rect: Rect) -> Vec<ShapeId> {
        self.ensure_fresh(store);
        let mut out: HashSet<ShapeId> = self.oversized.clone();
        match self.cell_range(rect) {
            Some((lo, hi)) => {
                for cx in lo.0..=hi.0 {
                    for cy in lo.1..=hi.1 {
                        if let Some(ids) = self.cells.get(&(cx, cy)) {
                            out.extend(ids.iter().copied());
                        }
                    }
                }
            }
            None => out.extend(store.z_order().iter().copied()),
        }
        ordered(store, out)
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }
}

/// Sort ids back to front so callers can pick the topmost hit.
fn ordered(store: &ShapeStore, ids: HashSet<ShapeId>) -> Vec<ShapeId> {
    store
        .z_order()
        .iter()
        .filter(|id| ids.contains(id))
        .copied()
        .collect()
}
