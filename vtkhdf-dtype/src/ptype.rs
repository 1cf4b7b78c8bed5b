//! Physical type definitions and behavior.

use std::fmt::{Debug, Display, Formatter};

use num_enum::{IntoPrimitive, TryFromPrimitive};
use num_traits::{NumCast, ToPrimitive};
use vtkhdf_error::{VtkHdfResult, vtkhdf_bail};

/// Physical type enum, represents the in-memory physical layout of the elements of a numeric
/// array.
///
/// `Char` shares its storage with `I8` but is a distinct tag: the container keeps the two apart,
/// and a character array read back from a file is a character array again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, IntoPrimitive, TryFromPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum PType {
    /// An 8-bit unsigned integer
    U8 = 0,
    /// A 16-bit unsigned integer
    U16 = 1,
    /// A 32-bit unsigned integer
    U32 = 2,
    /// A 64-bit unsigned integer
    U64 = 3,
    /// An 8-bit signed integer
    I8 = 4,
    /// A 16-bit signed integer
    I16 = 5,
    /// A 32-bit signed integer
    I32 = 6,
    /// A 64-bit signed integer
    I64 = 7,
    /// A 32-bit floating point number
    F32 = 8,
    /// A 64-bit floating point number
    F64 = 9,
    /// A character, stored as an 8-bit signed integer
    Char = 10,
}

/// Every [`PType`], in declaration order.
pub const ALL_PTYPES: [PType; 11] = [
    PType::U8,
    PType::U16,
    PType::U32,
    PType::U64,
    PType::I8,
    PType::I16,
    PType::I32,
    PType::I64,
    PType::F32,
    PType::F64,
    PType::Char,
];

/// A trait for native Rust types that correspond 1:1 to a PType
pub trait NativePType:
    Send
    + Sync
    + Clone
    + Copy
    + Debug
    + Display
    + Default
    + PartialEq
    + PartialOrd
    + NumCast
    + ToPrimitive
    + 'static
{
    /// The PType that corresponds to this native type
    const PTYPE: PType;

    /// Append the little-endian encoding of `self` to `out`.
    fn write_le(self, out: &mut Vec<u8>);

    /// Decode a value from exactly `size_of::<Self>()` little-endian bytes.
    fn read_le(bytes: &[u8]) -> Self;
}

macro_rules! native_ptype {
    ($T:ty, $ptype:tt) => {
        impl NativePType for $T {
            const PTYPE: PType = PType::$ptype;

            #[inline]
            fn write_le(self, out: &mut Vec<u8>) {
                out.extend_from_slice(&self.to_le_bytes());
            }

            #[inline]
            fn read_le(bytes: &[u8]) -> Self {
                let mut buf = [0u8; size_of::<$T>()];
                buf.copy_from_slice(&bytes[..size_of::<$T>()]);
                <$T>::from_le_bytes(buf)
            }
        }
    };
}

native_ptype!(u8, U8);
native_ptype!(u16, U16);
native_ptype!(u32, U32);
native_ptype!(u64, U64);
native_ptype!(i8, I8);
native_ptype!(i16, I16);
native_ptype!(i32, I32);
native_ptype!(i64, I64);
native_ptype!(f32, F32);
native_ptype!(f64, F64);

/// Macro to match over each PType, binding the corresponding native type (from `NativePType`)
///
/// `Char` binds `i8`, the storage type of character arrays.
#[macro_export]
macro_rules! match_each_native_ptype {
    ($self:expr, | $_:tt $enc:ident | $($body:tt)*) => ({
        macro_rules! __with__ {( $_ $enc:ident ) => ( $($body)* )}
        use $crate::PType;
        match $self {
            PType::U8 => __with__! { u8 },
            PType::U16 => __with__! { u16 },
            PType::U32 => __with__! { u32 },
            PType::U64 => __with__! { u64 },
            PType::I8 => __with__! { i8 },
            PType::I16 => __with__! { i16 },
            PType::I32 => __with__! { i32 },
            PType::I64 => __with__! { i64 },
            PType::F32 => __with__! { f32 },
            PType::F64 => __with__! { f64 },
            PType::Char => __with__! { i8 },
        }
    })
}

impl PType {
    /// Returns `true` iff this PType is an unsigned integer type
    pub const fn is_unsigned_int(self) -> bool {
        matches!(self, Self::U8 | Self::U16 | Self::U32 | Self::U64)
    }

    /// Returns `true` iff this PType is a signed integer type
    ///
    /// `Char` is not considered an integer type.
    pub const fn is_signed_int(self) -> bool {
        matches!(self, Self::I8 | Self::I16 | Self::I32 | Self::I64)
    }

    /// Returns `true` iff this PType is an integer type, signed or unsigned
    pub const fn is_int(self) -> bool {
        self.is_unsigned_int() || self.is_signed_int()
    }

    /// Returns `true` iff this PType is a floating point type
    pub const fn is_float(self) -> bool {
        matches!(self, Self::F32 | Self::F64)
    }

    /// Returns the number of bytes in this PType
    pub const fn byte_width(&self) -> usize {
        match self {
            Self::U8 | Self::I8 | Self::Char => 1,
            Self::U16 | Self::I16 => 2,
            Self::U32 | Self::I32 | Self::F32 => 4,
            Self::U64 | Self::I64 | Self::F64 => 8,
        }
    }
}

impl Display for PType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::U8 => write!(f, "u8"),
            Self::U16 => write!(f, "u16"),
            Self::U32 => write!(f, "u32"),
            Self::U64 => write!(f, "u64"),
            Self::I8 => write!(f, "i8"),
            Self::I16 => write!(f, "i16"),
            Self::I32 => write!(f, "i32"),
            Self::I64 => write!(f, "i64"),
            Self::F32 => write!(f, "f32"),
            Self::F64 => write!(f, "f64"),
            Self::Char => write!(f, "char"),
        }
    }
}

/// Encode a slice of native values as contiguous little-endian bytes.
pub fn encode_le<T: NativePType>(values: &[T]) -> Vec<u8> {
    let mut out = Vec::with_capacity(values.len() * size_of::<T>());
    for v in values {
        v.write_le(&mut out);
    }
    out
}

/// Decode contiguous little-endian bytes into native values.
///
/// Fails if the byte count is not a multiple of the element width.
pub fn decode_le<T: NativePType>(bytes: &[u8]) -> VtkHdfResult<Vec<T>> {
    let width = size_of::<T>();
    if bytes.len() % width != 0 {
        vtkhdf_bail!(
            TypeError: "{} bytes cannot hold a whole number of {} elements",
            bytes.len(),
            T::PTYPE
        );
    }
    Ok(bytes.chunks_exact(width).map(T::read_le).collect())
}
