use std::ops::Range;

use num_traits::{NumCast, ToPrimitive};
use vtkhdf_dtype::{DType, NativePType, PType, decode_le, encode_le, match_each_native_ptype};
use vtkhdf_error::{VtkHdfResult, vtkhdf_bail, vtkhdf_err};

/// The values of an array, one variant per supported element type.
///
/// The set of variants is closed: adding an element type means adding a variant here, and every
/// exhaustive match over it becomes a compile error until the new type is handled.
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayData {
    /// 8-bit unsigned integers
    U8(Vec<u8>),
    /// 16-bit unsigned integers
    U16(Vec<u16>),
    /// 32-bit unsigned integers
    U32(Vec<u32>),
    /// 64-bit unsigned integers
    U64(Vec<u64>),
    /// 8-bit signed integers
    I8(Vec<i8>),
    /// 16-bit signed integers
    I16(Vec<i16>),
    /// 32-bit signed integers
    I32(Vec<i32>),
    /// 64-bit signed integers
    I64(Vec<i64>),
    /// 32-bit floats
    F32(Vec<f32>),
    /// 64-bit floats
    F64(Vec<f64>),
    /// Characters
    Char(Vec<i8>),
    /// Single bits; has no container-native type
    Bit(Vec<bool>),
    /// Strings; has no container-native type
    Utf8(Vec<String>),
}

/// Macro to match over the numeric variants of an [`ArrayData`], binding the values.
///
/// The `else` expression is used for the variants without a native element type.
#[macro_export]
macro_rules! match_each_array_data {
    ($self:expr, | $values:ident | $body:expr, else $other:expr) => {{
        use $crate::ArrayData;
        match $self {
            ArrayData::U8($values) => $body,
            ArrayData::U16($values) => $body,
            ArrayData::U32($values) => $body,
            ArrayData::U64($values) => $body,
            ArrayData::I8($values) => $body,
            ArrayData::I16($values) => $body,
            ArrayData::I32($values) => $body,
            ArrayData::I64($values) => $body,
            ArrayData::F32($values) => $body,
            ArrayData::F64($values) => $body,
            ArrayData::Char($values) => $body,
            ArrayData::Bit(_) | ArrayData::Utf8(_) => $other,
        }
    }};
}

macro_rules! map_each_variant {
    ($self:expr, | $values:ident | $body:expr) => {
        match $self {
            ArrayData::U8($values) => ArrayData::U8($body),
            ArrayData::U16($values) => ArrayData::U16($body),
            ArrayData::U32($values) => ArrayData::U32($body),
            ArrayData::U64($values) => ArrayData::U64($body),
            ArrayData::I8($values) => ArrayData::I8($body),
            ArrayData::I16($values) => ArrayData::I16($body),
            ArrayData::I32($values) => ArrayData::I32($body),
            ArrayData::I64($values) => ArrayData::I64($body),
            ArrayData::F32($values) => ArrayData::F32($body),
            ArrayData::F64($values) => ArrayData::F64($body),
            ArrayData::Char($values) => ArrayData::Char($body),
            ArrayData::Bit($values) => ArrayData::Bit($body),
            ArrayData::Utf8($values) => ArrayData::Utf8($body),
        }
    };
}

/// A native element type with its own [`ArrayData`] variant.
pub trait NativeArray: NativePType {
    /// Wraps values in their variant.
    fn into_data(values: Vec<Self>) -> ArrayData;

    /// Borrows the values of `data` if it holds this element type.
    fn as_values(data: &ArrayData) -> Option<&[Self]>;
}

macro_rules! native_array {
    ($T:ty, $variant:ident) => {
        impl NativeArray for $T {
            fn into_data(values: Vec<Self>) -> ArrayData {
                ArrayData::$variant(values)
            }

            fn as_values(data: &ArrayData) -> Option<&[Self]> {
                match data {
                    ArrayData::$variant(values) => Some(values),
                    _ => None,
                }
            }
        }
    };
}

native_array!(u8, U8);
native_array!(u16, U16);
native_array!(u32, U32);
native_array!(u64, U64);
native_array!(i16, I16);
native_array!(i32, I32);
native_array!(i64, I64);
native_array!(f32, F32);
native_array!(f64, F64);

// Character arrays share their storage with i8.
impl NativeArray for i8 {
    fn into_data(values: Vec<Self>) -> ArrayData {
        ArrayData::I8(values)
    }

    fn as_values(data: &ArrayData) -> Option<&[Self]> {
        match data {
            ArrayData::I8(values) | ArrayData::Char(values) => Some(values),
            _ => None,
        }
    }
}

impl ArrayData {
    /// Wraps native values in their variant.
    pub fn from_values<T: NativeArray>(values: Vec<T>) -> Self {
        T::into_data(values)
    }

    /// Wraps native values under an explicit element type.
    ///
    /// This is how character arrays are built: their storage type is `i8`.
    pub fn from_ptype_values<T: NativeArray>(ptype: PType, values: Vec<T>) -> VtkHdfResult<Self> {
        let storage = match ptype {
            PType::Char => PType::I8,
            other => other,
        };
        if T::PTYPE != storage {
            vtkhdf_bail!(TypeError: "{} values cannot be stored as {ptype}", T::PTYPE);
        }
        Ok(T::into_data(values).retag(ptype))
    }

    /// An array with no values of the given element type.
    pub fn empty(dtype: DType) -> Self {
        match dtype {
            DType::Primitive(ptype) => match_each_native_ptype!(ptype, |$T| {
                ArrayData::from_values(Vec::<$T>::new())
            })
            .retag(ptype),
            DType::Bit => ArrayData::Bit(Vec::new()),
            DType::Utf8 => ArrayData::Utf8(Vec::new()),
        }
    }

    /// Decodes contiguous little-endian bytes of the given element type.
    pub fn from_le_bytes(ptype: PType, bytes: &[u8]) -> VtkHdfResult<Self> {
        let data = match_each_native_ptype!(ptype, |$T| {
            ArrayData::from_values(decode_le::<$T>(bytes)?)
        });
        Ok(data.retag(ptype))
    }

    /// Encodes the values as contiguous little-endian bytes.
    pub fn to_le_bytes(&self) -> VtkHdfResult<Vec<u8>> {
        match_each_array_data!(self, |values| Ok(encode_le(values)), else {
            Err(vtkhdf_err!(TypeError: "{} arrays have no byte encoding", self.dtype()))
        })
    }

    fn retag(self, ptype: PType) -> Self {
        match (self, ptype) {
            (ArrayData::I8(values), PType::Char) => ArrayData::Char(values),
            (data, _) => data,
        }
    }

    /// The element type tag of the values.
    pub fn dtype(&self) -> DType {
        match self {
            ArrayData::U8(_) => PType::U8.into(),
            ArrayData::U16(_) => PType::U16.into(),
            ArrayData::U32(_) => PType::U32.into(),
            ArrayData::U64(_) => PType::U64.into(),
            ArrayData::I8(_) => PType::I8.into(),
            ArrayData::I16(_) => PType::I16.into(),
            ArrayData::I32(_) => PType::I32.into(),
            ArrayData::I64(_) => PType::I64.into(),
            ArrayData::F32(_) => PType::F32.into(),
            ArrayData::F64(_) => PType::F64.into(),
            ArrayData::Char(_) => PType::Char.into(),
            ArrayData::Bit(_) => DType::Bit,
            ArrayData::Utf8(_) => DType::Utf8,
        }
    }

    /// The element type of a numeric or character array.
    pub fn ptype(&self) -> VtkHdfResult<PType> {
        self.dtype()
            .as_ptype()
            .ok_or_else(|| vtkhdf_err!(TypeError: "{} arrays have no element type", self.dtype()))
    }

    /// Number of values.
    pub fn len(&self) -> usize {
        match self {
            ArrayData::Bit(values) => values.len(),
            ArrayData::Utf8(values) => values.len(),
            other => match_each_array_data!(other, |values| values.len(), else 0),
        }
    }

    /// Returns `true` if there are no values.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Borrows the values as a native slice.
    pub fn values<T: NativeArray>(&self) -> Option<&[T]> {
        T::as_values(self)
    }

    /// A copy of the values in `range`.
    pub fn slice(&self, range: Range<usize>) -> VtkHdfResult<Self> {
        let len = self.len();
        if range.start > range.end || range.end > len {
            vtkhdf_bail!(OutOfBounds: range.end, 0, len);
        }
        Ok(map_each_variant!(self, |values| values[range.clone()].to_vec()))
    }

    /// Appends the values of `other`, which must hold the same element type.
    pub fn extend_from(&mut self, other: &ArrayData) -> VtkHdfResult<()> {
        macro_rules! extend {
            ($($variant:ident),*) => {
                match (self, other) {
                    $((ArrayData::$variant(a), ArrayData::$variant(b)) => a.extend_from_slice(b),)*
                    (a, b) => vtkhdf_bail!(
                        TypeError: "cannot append {} values to a {} array",
                        b.dtype(),
                        a.dtype()
                    ),
                }
            };
        }
        extend!(U8, U16, U32, U64, I8, I16, I32, I64, F32, F64, Char, Bit, Utf8);
        Ok(())
    }

    /// The value at `index` widened to a double.
    pub fn get_f64(&self, index: usize) -> Option<f64> {
        match_each_array_data!(self, |values| values.get(index).and_then(|v| v.to_f64()), else None)
    }

    /// Overwrites the value at `index`, casting `value` to the element type.
    pub fn set_f64(&mut self, index: usize, value: f64) -> VtkHdfResult<()> {
        let len = self.len();
        let dtype = self.dtype();
        match_each_array_data!(self, |values| {
            let slot = values
                .get_mut(index)
                .ok_or_else(|| vtkhdf_err!(OutOfBounds: index, 0, len))?;
            *slot = NumCast::from(value)
                .ok_or_else(|| vtkhdf_err!(TypeError: "{value} does not fit in {dtype}"))?;
            Ok(())
        }, else Err(vtkhdf_err!(TypeError: "{dtype} arrays have no numeric values")))
    }

    /// The values of an integer array widened to the index type.
    pub fn to_i64(&self) -> VtkHdfResult<Vec<i64>> {
        let ptype = self.ptype()?;
        if !ptype.is_int() {
            vtkhdf_bail!(TypeError: "{ptype} is not an integer type");
        }
        match_each_array_data!(self, |values| {
            values
                .iter()
                .map(|v| {
                    v.to_i64()
                        .ok_or_else(|| vtkhdf_err!(RangeError: "{v} does not fit in an index"))
                })
                .collect()
        }, else Ok(Vec::new()))
    }
}

impl<T: NativeArray> From<Vec<T>> for ArrayData {
    fn from(values: Vec<T>) -> Self {
        T::into_data(values)
    }
}

impl From<Vec<bool>> for ArrayData {
    fn from(values: Vec<bool>) -> Self {
        ArrayData::Bit(values)
    }
}

impl From<Vec<String>> for ArrayData {
    fn from(values: Vec<String>) -> Self {
        ArrayData::Utf8(values)
    }
}
