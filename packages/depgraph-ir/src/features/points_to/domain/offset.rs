//! Byte offsets within abstract memory objects

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Add;

/// A byte displacement, possibly statically unknown
///
/// Arithmetic saturates at `Unknown`: a finite offset plus a finite offset
/// is finite, anything plus `Unknown` is `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Offset {
    Concrete(u64),
    Unknown,
}

impl Offset {
    pub const ZERO: Offset = Offset::Concrete(0);

    pub fn is_unknown(&self) -> bool {
        matches!(self, Offset::Unknown)
    }

    pub fn value(&self) -> Option<u64> {
        match self {
            Offset::Concrete(v) => Some(*v),
            Offset::Unknown => None,
        }
    }
}

impl From<Option<u64>> for Offset {
    fn from(v: Option<u64>) -> Self {
        match v {
            Some(v) => Offset::Concrete(v),
            None => Offset::Unknown,
        }
    }
}

impl Add for Offset {
    type Output = Offset;

    fn add(self, rhs: Offset) -> Offset {
        match (self, rhs) {
            (Offset::Concrete(a), Offset::Concrete(b)) => Offset::Concrete(a.wrapping_add(b)),
            _ => Offset::Unknown,
        }
    }
}

impl fmt::Display for Offset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Offset::Concrete(v) => write!(f, "{}", v),
            Offset::Unknown => write!(f, "UNKNOWN"),
        }
    }
}
