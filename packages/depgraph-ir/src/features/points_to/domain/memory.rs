//! Abstract memory: per-allocation objects and per-program-point maps

use super::offset::Offset;
use super::pointer::{Pointer, PointsToSet};
use super::pss::PssNodeId;
use rustc_hash::FxHashMap;

/// The memory associated with a single allocation site
///
/// Indexed by offset; each cell holds the pointers that may be stored
/// there. A write through an unknown offset lands in the `Unknown` cell;
/// a read at an unknown offset sees every cell.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryObject {
    /// Owning allocation node
    pub node: Option<PssNodeId>,
    cells: FxHashMap<Offset, PointsToSet>,
}

impl MemoryObject {
    pub fn new(node: PssNodeId) -> Self {
        MemoryObject {
            node: Some(node),
            cells: FxHashMap::default(),
        }
    }

    /// Weak update: union `values` into the cell at `offset`
    pub fn write(&mut self, offset: Offset, values: &PointsToSet) -> bool {
        self.cells.entry(offset).or_default().union(values)
    }

    /// Strong update: replace the cell at `offset`
    pub fn write_strong(&mut self, offset: Offset, values: PointsToSet) -> bool {
        let cell = self.cells.entry(offset).or_default();
        if *cell == values {
            false
        } else {
            *cell = values;
            true
        }
    }

    /// Read the pointers visible at `offset`
    ///
    /// A concrete read also sees the `Unknown` cell; an unknown read sees
    /// every offset.
    pub fn read(&self, offset: Offset) -> PointsToSet {
        let mut out = PointsToSet::new();
        if offset.is_unknown() {
            for cell in self.cells.values() {
                out.union(cell);
            }
        } else {
            if let Some(cell) = self.cells.get(&offset) {
                out.union(cell);
            }
            if let Some(cell) = self.cells.get(&Offset::Unknown) {
                out.union(cell);
            }
        }
        out
    }

    /// Pointwise union with another object; returns true on growth
    pub fn merge(&mut self, other: &MemoryObject) -> bool {
        let mut changed = false;
        for (&offset, cell) in &other.cells {
            changed |= self.cells.entry(offset).or_default().union(cell);
        }
        changed
    }

    pub fn is_empty(&self) -> bool {
        self.cells.values().all(|c| c.is_empty())
    }

    /// Cells in offset order, for deterministic output
    pub fn sorted_cells(&self) -> Vec<(Offset, Vec<Pointer>)> {
        let mut v: Vec<(Offset, Vec<Pointer>)> = self
            .cells
            .iter()
            .map(|(&o, c)| (o, c.sorted()))
            .collect();
        v.sort_by_key(|(o, _)| *o);
        v
    }
}

/// Memory state effective at one program point (flow-sensitive analysis)
///
/// Keyed by the pointer that introduced the object; one object per key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryMap {
    objects: FxHashMap<Pointer, MemoryObject>,
}

impl MemoryMap {
    pub fn new() -> Self {
        MemoryMap::default()
    }

    /// Object under `key`, created on first use
    pub fn object_mut(&mut self, key: Pointer) -> &mut MemoryObject {
        self.objects.entry(key).or_insert_with(|| MemoryObject {
            node: Some(key.target),
            cells: FxHashMap::default(),
        })
    }

    pub fn object(&self, key: &Pointer) -> Option<&MemoryObject> {
        self.objects.get(key)
    }

    /// Objects whose key targets `target`, regardless of key offset
    pub fn objects_of(&self, target: PssNodeId) -> impl Iterator<Item = &MemoryObject> {
        self.objects
            .iter()
            .filter(move |(k, _)| k.target == target)
            .map(|(_, o)| o)
    }

    /// Pointwise join with another map; returns true on growth
    pub fn merge(&mut self, other: &MemoryMap) -> bool {
        let mut changed = false;
        for (&key, obj) in &other.objects {
            match self.objects.get_mut(&key) {
                Some(existing) => changed |= existing.merge(obj),
                None => {
                    self.objects.insert(key, obj.clone());
                    changed = true;
                }
            }
        }
        changed
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Entries in key order, for deterministic output
    pub fn sorted_entries(&self) -> Vec<(Pointer, &MemoryObject)> {
        let mut v: Vec<(Pointer, &MemoryObject)> =
            self.objects.iter().map(|(&k, o)| (k, o)).collect();
        v.sort_by_key(|(k, _)| *k);
        v
    }
}
