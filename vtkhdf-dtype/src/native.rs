//! The mapping table between in-memory element types and container-native type identifiers.

use std::fmt::{Display, Formatter};

use num_enum::{IntoPrimitive, TryFromPrimitive};
use vtkhdf_error::{VtkHdfError, VtkHdfResult, vtkhdf_bail};

use crate::{DType, PType};

/// Identifies the element type of a dataset or attribute inside the container.
///
/// [`NativeType::Invalid`] is the sentinel returned for element types with no container-native
/// counterpart. A caller receiving it must treat the array as unwritable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum NativeType {
    /// No corresponding container type
    Invalid = 0,
    /// `char`
    Char = 1,
    /// `signed char`
    SChar = 2,
    /// `unsigned char`
    UChar = 3,
    /// `short`
    Short = 4,
    /// `unsigned short`
    UShort = 5,
    /// `int`
    Int = 6,
    /// `unsigned int`
    UInt = 7,
    /// `long long`
    LLong = 8,
    /// `unsigned long long`
    ULLong = 9,
    /// `float`
    Float = 10,
    /// `double`
    Double = 11,
}

impl NativeType {
    /// Maps an element type to its container type.
    pub const fn from_ptype(ptype: PType) -> Self {
        match ptype {
            PType::F64 => NativeType::Double,
            PType::F32 => NativeType::Float,
            PType::I64 => NativeType::LLong,
            PType::U64 => NativeType::ULLong,
            PType::I32 => NativeType::Int,
            PType::U32 => NativeType::UInt,
            PType::I16 => NativeType::Short,
            PType::U16 => NativeType::UShort,
            PType::Char => NativeType::Char,
            PType::I8 => NativeType::SChar,
            PType::U8 => NativeType::UChar,
        }
    }

    /// Maps an element type tag to its container type, or [`NativeType::Invalid`].
    pub const fn from_dtype(dtype: &DType) -> Self {
        match dtype {
            DType::Primitive(ptype) => Self::from_ptype(*ptype),
            DType::Bit | DType::Utf8 => NativeType::Invalid,
        }
    }

    /// Returns `false` for the [`NativeType::Invalid`] sentinel.
    pub const fn is_valid(self) -> bool {
        !matches!(self, NativeType::Invalid)
    }

    /// Maps a container type back to its element type.
    pub fn ptype(self) -> VtkHdfResult<PType> {
        Ok(match self {
            NativeType::Double => PType::F64,
            NativeType::Float => PType::F32,
            NativeType::LLong => PType::I64,
            NativeType::ULLong => PType::U64,
            NativeType::Int => PType::I32,
            NativeType::UInt => PType::U32,
            NativeType::Short => PType::I16,
            NativeType::UShort => PType::U16,
            NativeType::Char => PType::Char,
            NativeType::SChar => PType::I8,
            NativeType::UChar => PType::U8,
            NativeType::Invalid => {
                vtkhdf_bail!(TypeError: "the invalid native type has no element type")
            }
        })
    }

    /// The width in bytes of one element, or zero for the invalid sentinel.
    pub fn byte_width(self) -> usize {
        self.ptype().map(|p| p.byte_width()).unwrap_or(0)
    }
}

impl From<PType> for NativeType {
    fn from(ptype: PType) -> Self {
        NativeType::from_ptype(ptype)
    }
}

impl TryFrom<NativeType> for PType {
    type Error = VtkHdfError;

    fn try_from(value: NativeType) -> Result<Self, Self::Error> {
        value.ptype()
    }
}

impl TryFrom<NativeType> for DType {
    type Error = VtkHdfError;

    fn try_from(value: NativeType) -> Result<Self, Self::Error> {
        value.ptype().map(DType::Primitive)
    }
}

impl Display for NativeType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            NativeType::Invalid => "invalid",
            NativeType::Char => "native_char",
            NativeType::SChar => "native_schar",
            NativeType::UChar => "native_uchar",
            NativeType::Short => "native_short",
            NativeType::UShort => "native_ushort",
            NativeType::Int => "native_int",
            NativeType::UInt => "native_uint",
            NativeType::LLong => "native_llong",
            NativeType::ULLong => "native_ullong",
            NativeType::Float => "native_float",
            NativeType::Double => "native_double",
        };
        write!(f, "{name}")
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::ALL_PTYPES;

    #[test]
    fn mapping_roundtrips_for_every_ptype() {
        for ptype in ALL_PTYPES {
            let native = NativeType::from(ptype);
            assert!(native.is_valid(), "{ptype} has no native type");
            assert_eq!(PType::try_from(native).unwrap(), ptype);
            assert_eq!(native.byte_width(), ptype.byte_width());
        }
    }

    #[test]
    fn char_and_schar_stay_distinct() {
        assert_ne!(NativeType::from(PType::Char), NativeType::from(PType::I8));
    }

    #[rstest]
    #[case(DType::Bit)]
    #[case(DType::Utf8)]
    fn unsupported_tags_map_to_sentinel(#[case] dtype: DType) {
        let native = NativeType::from_dtype(&dtype);
        assert_eq!(native, NativeType::Invalid);
        assert!(!native.is_valid());
        assert!(matches!(
            DType::try_from(native).unwrap_err(),
            VtkHdfError::TypeError(..)
        ));
    }

    #[test]
    fn discriminants_are_stable() {
        assert_eq!(u8::from(NativeType::Invalid), 0);
        assert_eq!(u8::from(NativeType::Double), 11);
        assert_eq!(NativeType::try_from(6u8).unwrap(), NativeType::Int);
    }
}
