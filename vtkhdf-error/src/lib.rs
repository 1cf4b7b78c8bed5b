#![deny(missing_docs)]
#![feature(error_generic_member_access)]

//! This crate defines error & result types for VTKHDF.
//! It also contains a variety of useful macros for error handling.

pub use ext::*;

mod ext;

use std::backtrace::Backtrace;
use std::borrow::Cow;
use std::fmt::{Debug, Display, Formatter};
use std::ops::Deref;
use std::{fmt, io};

/// A string that can be used as an error message.
#[derive(Debug)]
pub struct ErrString(Cow<'static, str>);

impl<T> From<T> for ErrString
where
    T: Into<Cow<'static, str>>,
{
    fn from(msg: T) -> Self {
        Self(msg.into())
    }
}

impl AsRef<str> for ErrString {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Deref for ErrString {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Display for ErrString {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

/// The top-level error type for VTKHDF.
#[derive(thiserror::Error)]
#[non_exhaustive]
pub enum VtkHdfError {
    /// The root descriptor is missing, or carries an unknown type or an unsupported version.
    #[error("format error: {0}\nBacktrace:\n{1}")]
    FormatError(ErrString, Backtrace),
    /// An element type has no container-native counterpart, or two types do not agree.
    #[error("type error: {0}\nBacktrace:\n{1}")]
    TypeError(ErrString, Backtrace),
    /// A requested extent or slice lies outside of the declared dimensions.
    #[error("range error: {0}\nBacktrace:\n{1}")]
    RangeError(ErrString, Backtrace),
    /// An index is out of bounds.
    #[error("index {0} out of bounds from {1} to {2}\nBacktrace:\n{3}")]
    OutOfBounds(usize, usize, usize, Backtrace),
    /// A temporal step was written out of order, or re-written.
    #[error("sequence error: {0}\nBacktrace:\n{1}")]
    SequenceError(ErrString, Backtrace),
    /// An externally referenced file is missing or unreadable.
    #[error("reference error: {0}\nBacktrace:\n{1}")]
    ReferenceError(ErrString, Backtrace),
    /// A named group, dataset or attribute does not exist.
    #[error("not found: {0}\nBacktrace:\n{1}")]
    NotFound(ErrString, Backtrace),
    /// An invalid argument was provided.
    #[error("{0}\nBacktrace:\n{1}")]
    InvalidArgument(ErrString, Backtrace),
    /// An error annotated with some additional context.
    #[error("{0}: {1}")]
    Context(ErrString, #[source] Box<VtkHdfError>),
    /// A wrapper for IO errors of the underlying storage.
    #[error("{0}\nBacktrace:\n{1}")]
    IOError(io::Error, Backtrace),
    /// A wrapper for errors decoding or encoding the container footer.
    #[cfg(feature = "serde")]
    #[error("{0}\nBacktrace:\n{1}")]
    JsonError(serde_json::Error, Backtrace),
}

impl VtkHdfError {
    /// Adds additional context to an error.
    pub fn with_context<T: Into<ErrString>>(self, msg: T) -> Self {
        VtkHdfError::Context(msg.into(), Box::new(self))
    }

    /// Strips every layer of [`VtkHdfError::Context`] and returns the underlying error.
    pub fn innermost(&self) -> &VtkHdfError {
        match self {
            VtkHdfError::Context(_, inner) => inner.innermost(),
            other => other,
        }
    }
}

impl Debug for VtkHdfError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(self, f)
    }
}

impl From<io::Error> for VtkHdfError {
    fn from(value: io::Error) -> Self {
        VtkHdfError::IOError(value, Backtrace::capture())
    }
}

#[cfg(feature = "serde")]
impl From<serde_json::Error> for VtkHdfError {
    fn from(value: serde_json::Error) -> Self {
        VtkHdfError::JsonError(value, Backtrace::capture())
    }
}

/// A type alias for Results that return VtkHdfErrors as their error type.
pub type VtkHdfResult<T> = Result<T, VtkHdfError>;

/// A trait for unwrapping a VtkHdfResult.
pub trait VtkHdfUnwrap {
    /// The type of the value being unwrapped.
    type Output;

    /// Returns the value of the result if it is Ok, otherwise panics with the error.
    /// Should be called only in contexts where the error condition represents a bug (programmer error).
    fn vtkhdf_unwrap(self) -> Self::Output;
}

impl<T, E> VtkHdfUnwrap for Result<T, E>
where
    E: Into<VtkHdfError>,
{
    type Output = T;

    #[inline(always)]
    fn vtkhdf_unwrap(self) -> Self::Output {
        self.map_err(|err| err.into())
            .unwrap_or_else(|err| vtkhdf_panic!(err))
    }
}

/// A trait for expect-ing a VtkHdfResult or an Option.
pub trait VtkHdfExpect {
    /// The type of the value being expected.
    type Output;

    /// Returns the value of the result if it is Ok, otherwise panics with the error.
    /// Should be called only in contexts where the error condition represents a bug (programmer error).
    fn vtkhdf_expect(self, msg: &str) -> Self::Output;
}

impl<T, E> VtkHdfExpect for Result<T, E>
where
    E: Into<VtkHdfError>,
{
    type Output = T;

    #[inline(always)]
    fn vtkhdf_expect(self, msg: &str) -> Self::Output {
        self.map_err(|err| err.into())
            .unwrap_or_else(|e| vtkhdf_panic!(e.with_context(msg.to_string())))
    }
}

impl<T> VtkHdfExpect for Option<T> {
    type Output = T;

    #[inline(always)]
    fn vtkhdf_expect(self, msg: &str) -> Self::Output {
        self.unwrap_or_else(|| {
            let err = VtkHdfError::InvalidArgument(msg.to_string().into(), Backtrace::capture());
            vtkhdf_panic!(err)
        })
    }
}

/// A convenient macro for creating a VtkHdfError.
#[macro_export]
macro_rules! vtkhdf_err {
    (OutOfBounds: $idx:expr, $start:expr, $stop:expr) => {{
        use std::backtrace::Backtrace;
        $crate::__private::must_use(
            $crate::VtkHdfError::OutOfBounds($idx, $start, $stop, Backtrace::capture())
        )
    }};
    (Context: $msg:literal, $err:expr) => {{
        $crate::__private::must_use(
            $crate::VtkHdfError::Context($msg.into(), Box::new($err))
        )
    }};
    ($variant:ident: $fmt:literal $(, $arg:expr)* $(,)?) => {{
        use std::backtrace::Backtrace;
        $crate::__private::must_use(
            $crate::VtkHdfError::$variant(format!($fmt, $($arg),*).into(), Backtrace::capture())
        )
    }};
    ($variant:ident: $err:expr $(,)?) => {
        $crate::__private::must_use(
            $crate::VtkHdfError::$variant($err)
        )
    };
    ($fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::vtkhdf_err!(InvalidArgument: $fmt, $($arg),*)
    };
}

/// A convenient macro for returning a VtkHdfError.
#[macro_export]
macro_rules! vtkhdf_bail {
    ($($tt:tt)+) => {
        return Err($crate::vtkhdf_err!($($tt)+))
    };
}

/// A convenient macro for panicking with a VtkHdfError in the presence of a programmer error
/// (e.g., an invariant has been violated).
#[macro_export]
macro_rules! vtkhdf_panic {
    (OutOfBounds: $idx:expr, $start:expr, $stop:expr) => {{
        $crate::vtkhdf_panic!($crate::vtkhdf_err!(OutOfBounds: $idx, $start, $stop))
    }};
    ($variant:ident: $fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::vtkhdf_panic!($crate::vtkhdf_err!($variant: $fmt, $($arg),*))
    };
    ($err:expr, $fmt:literal $(, $arg:expr)* $(,)?) => {{
        let err: $crate::VtkHdfError = $err;
        panic!("{}", err.with_context(format!($fmt, $($arg),*)))
    }};
    ($fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::vtkhdf_panic!($crate::vtkhdf_err!($fmt, $($arg),*))
    };
    ($err:expr) => {{
        let err: $crate::VtkHdfError = $err;
        panic!("{}", err)
    }};
}

#[doc(hidden)]
pub mod __private {
    #[doc(hidden)]
    #[inline]
    #[must_use]
    pub const fn must_use(error: crate::VtkHdfError) -> crate::VtkHdfError {
        error
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failing() -> VtkHdfResult<()> {
        vtkhdf_bail!(RangeError: "slice {}..{} exceeds {}", 4, 9, 6)
    }

    #[test]
    fn bail_builds_variant() {
        let err = failing().unwrap_err();
        assert!(matches!(err, VtkHdfError::RangeError(..)));
        assert!(err.to_string().contains("slice 4..9 exceeds 6"));
    }

    #[test]
    fn innermost_skips_context() {
        let err = failing()
            .map_err(|e| e.with_context("reading Points"))
            .map_err(|e| e.with_context("reading piece 2"))
            .unwrap_err();
        assert!(matches!(err, VtkHdfError::Context(..)));
        assert!(matches!(err.innermost(), VtkHdfError::RangeError(..)));
        assert!(err.to_string().starts_with("reading piece 2"));
    }

    #[test]
    fn io_errors_convert() {
        let err: VtkHdfError = io::Error::new(io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(err, VtkHdfError::IOError(..)));
    }
}
