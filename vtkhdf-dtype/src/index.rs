//! Conversions between the wide signed index type of the container and in-memory sizes.
//!
//! Every size and offset stored in a file is an `i64`. Converting one to a `usize` is checked
//! so that a corrupt or hostile file surfaces as a [`RangeError`](vtkhdf_error::VtkHdfError)
//! instead of a silently truncated length.

use vtkhdf_error::{VtkHdfResult, vtkhdf_err};

/// The element type of every size, offset and step index stored in a file.
pub type Index = i64;

/// Converts a stored index into an in-memory size.
pub fn to_usize(index: Index) -> VtkHdfResult<usize> {
    usize::try_from(index).map_err(|_| vtkhdf_err!(RangeError: "{index} is not a valid size"))
}

/// Converts an in-memory size into a stored index.
pub fn to_index(size: usize) -> VtkHdfResult<Index> {
    Index::try_from(size).map_err(|_| vtkhdf_err!(RangeError: "{size} does not fit in an index"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_sizes_are_rejected() {
        assert!(to_usize(-1).is_err());
        assert_eq!(to_usize(42).unwrap(), 42);
        assert_eq!(to_index(7).unwrap(), 7);
    }
}
