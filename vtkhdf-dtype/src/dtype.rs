use std::fmt::{Display, Formatter};

use crate::PType;

/// The element type tags of the in-memory array system.
///
/// Only [`DType::Primitive`] elements have a container-native counterpart; the remaining tags
/// exist so that arrays which cannot be stored are reported rather than silently dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DType {
    /// Fixed-width numeric or character elements
    Primitive(PType),
    /// Packed single-bit elements
    Bit,
    /// Variable-length UTF-8 strings
    Utf8,
}

impl DType {
    /// Returns the [`PType`] of a primitive DType
    pub fn as_ptype(&self) -> Option<PType> {
        match self {
            DType::Primitive(ptype) => Some(*ptype),
            DType::Bit | DType::Utf8 => None,
        }
    }

    /// Check if `self` is a primitive type
    pub fn is_primitive(&self) -> bool {
        matches!(self, DType::Primitive(_))
    }
}

impl From<PType> for DType {
    fn from(ptype: PType) -> Self {
        DType::Primitive(ptype)
    }
}

impl Display for DType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            DType::Primitive(ptype) => write!(f, "{ptype}"),
            DType::Bit => write!(f, "bit"),
            DType::Utf8 => write!(f, "utf8"),
        }
    }
}
