//! A random-access container file of nested groups, attributes and extendible datasets.
//!
//! A file is laid out as
//!
//! ```text
//! MAGIC | live end | data segments ... | footer (JSON tree) | EOF | ...
//! ```
//!
//! where the EOF marker holds the container version, the footer length and the magic bytes
//! again, and the header's live end is the offset just past the EOF marker of the live footer.
//! Row payloads are written after the live footer as soon as they are appended. On
//! [`ContainerFile::flush`], and when the last reference to a writable file is dropped, a new
//! footer is written after them and the header is pointed at it; an interrupted write leaves the
//! previous footer live and intact.
//!
//! Datasets grow along their first axis. Each run of appended rows is a segment, stored either
//! in this file (optionally deflated) or as a virtual mapping onto rows of a dataset in a
//! sibling file.

pub use dataset::*;
pub use file::*;
pub use filter::MAX_DEFLATE_LEVEL;
pub use footer::{AttributeValue, NodeKind};
pub use group::*;
pub use hyperslab::*;

mod dataset;
mod file;
mod filter;
mod footer;
mod group;
mod hyperslab;

/// The current version of the container layout
pub const VERSION: u16 = 2;

/// The magic bytes opening and closing every container file
pub const MAGIC_BYTES: [u8; 4] = *b"VHDF";

/// The size of the header in bytes: the magic bytes and the live end
pub const HEADER_SIZE: usize = 12;

/// The size of the EOF marker in bytes
pub const EOF_SIZE: usize = 16;

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn never_change_these_constants() {
        assert_eq!(VERSION, 2);
        assert_eq!(HEADER_SIZE, 12);
        assert_eq!(MAGIC_BYTES, *b"VHDF");
        assert_eq!(EOF_SIZE, 16);
    }
}
