//! Pointers and points-to sets

use super::offset::Offset;
use super::pss::PssNodeId;
use rustc_hash::FxHashSet;
use std::fmt;

/// One element of a points-to set: a target node plus a byte offset into it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pointer {
    pub target: PssNodeId,
    pub offset: Offset,
}

impl Pointer {
    pub fn new(target: PssNodeId, offset: Offset) -> Self {
        Pointer { target, offset }
    }

    pub fn at_zero(target: PssNodeId) -> Self {
        Pointer {
            target,
            offset: Offset::ZERO,
        }
    }
}

impl fmt::Display for Pointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.target, self.offset)
    }
}

/// A monotone set of pointers: the solvers only ever add pairs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PointsToSet {
    set: FxHashSet<Pointer>,
}

impl PointsToSet {
    pub fn new() -> Self {
        PointsToSet::default()
    }

    /// Insert a pointer; returns true when the set grew
    pub fn insert(&mut self, ptr: Pointer) -> bool {
        self.set.insert(ptr)
    }

    /// Union another set in; returns true when the set grew
    pub fn union(&mut self, other: &PointsToSet) -> bool {
        let before = self.set.len();
        self.set.extend(other.set.iter().copied());
        self.set.len() > before
    }

    pub fn contains(&self, ptr: &Pointer) -> bool {
        self.set.contains(ptr)
    }

    pub fn contains_target(&self, target: PssNodeId) -> bool {
        self.set.iter().any(|p| p.target == target)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Pointer> {
        self.set.iter()
    }

    /// Pointers in `(target, offset)` order, for deterministic output
    pub fn sorted(&self) -> Vec<Pointer> {
        let mut v: Vec<Pointer> = self.set.iter().copied().collect();
        v.sort();
        v
    }

    pub fn len(&self) -> usize {
        self.set.len()
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    /// Whether the two sets share a target, offsets compatible
    ///
    /// Offsets are compatible when equal or when either side is unknown.
    pub fn may_overlap(&self, other: &PointsToSet) -> bool {
        self.set.iter().any(|a| {
            other.set.iter().any(|b| {
                a.target == b.target
                    && (a.offset == b.offset || a.offset.is_unknown() || b.offset.is_unknown())
            })
        })
    }
}

impl FromIterator<Pointer> for PointsToSet {
    fn from_iter<T: IntoIterator<Item = Pointer>>(iter: T) -> Self {
        PointsToSet {
            set: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn union_reports_growth() {
        let mut a = PointsToSet::new();
        assert!(a.insert(Pointer::at_zero(PssNodeId(1))));
        assert!(!a.insert(Pointer::at_zero(PssNodeId(1))));

        let b: PointsToSet = [Pointer::at_zero(PssNodeId(2))].into_iter().collect();
        assert!(a.union(&b));
        assert!(!a.union(&b));
        assert_eq!(a.len(), 2);
    }

    #[test]
    fn overlap_respects_offsets() {
        let a: PointsToSet = [Pointer::new(PssNodeId(1), Offset::Concrete(0))]
            .into_iter()
            .collect();
        let b: PointsToSet = [Pointer::new(PssNodeId(1), Offset::Concrete(8))]
            .into_iter()
            .collect();
        let c: PointsToSet = [Pointer::new(PssNodeId(1), Offset::Unknown)]
            .into_iter()
            .collect();
        assert!(!a.may_overlap(&b));
        assert!(a.may_overlap(&c));
        assert!(b.may_overlap(&c));
    }
}
