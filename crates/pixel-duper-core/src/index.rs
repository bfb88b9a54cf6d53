use crate::file_id::FileId;
use crate::signature::{Color, GridPoint, Signature};
use ahash::AHashMap;
use std::collections::BTreeSet;
use std::sync::{PoisonError, RwLock, RwLockReadGuard};

type CellMap = AHashMap<GridPoint, AHashMap<Color, BTreeSet<FileId>>>;

/// Lookup table from a quantized grid cell value to every file that has it.
///
/// Written by many workers while signatures are being produced, then only
/// read while matching.
#[derive(Default)]
pub struct InvertedIndex {
    cells: RwLock<CellMap>,
}

/// Read access held for the duration of a lookup batch.
pub struct IndexReader<'a> {
    cells: RwLockReadGuard<'a, CellMap>,
}

impl InvertedIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add every cell of an already-quantized signature.
    pub fn insert(&self, id: &FileId, quantized: &Signature) {
        let mut cells = self.cells.write().unwrap_or_else(PoisonError::into_inner);
        for (point, color) in quantized.iter() {
            cells
                .entry(*point)
                .or_default()
                .entry(*color)
                .or_default()
                .insert(id.clone());
        }
    }

    pub fn reader(&self) -> IndexReader<'_> {
        IndexReader {
            cells: self.cells.read().unwrap_or_else(PoisonError::into_inner),
        }
    }
}

impl IndexReader<'_> {
    /// Files whose cell at `point` quantized to exactly `color`.
    pub fn files_at(&self, point: &GridPoint, color: &Color) -> Option<&BTreeSet<FileId>> {
        self.cells.get(point)?.get(color)
    }

    pub fn cell_count(&self) -> usize {
        self.cells.values().map(|colors| colors.len()).sum()
    }
}
