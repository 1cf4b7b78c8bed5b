//! Read and write VTKHDF files: meshes, their composites and their time series, laid out as
//! groups and extendible datasets of a [`vtkhdf_container`] file.
//!
//! Every file holds a root group `/VTKHDF` tagged with a `Version` pair and a `Type` name. What
//! lives below depends on the type:
//!
//! 1. Leaf datasets (`ImageData`, `PolyData`, `UnstructuredGrid`) store their geometry and their
//!    `PointData`, `CellData` and `FieldData` arrays directly below the root. A dataset split into
//!    several pieces stores the pieces one after the other, with per-piece counts in the
//!    `NumberOfPoints`, `NumberOfCells` and `NumberOfConnectivityIds` datasets. A leaf written
//!    from a partitioned dataset is also tagged with a `Partitioned` attribute.
//!
//! 2. Composite datasets (`PartitionedDataSetCollection`, `MultiBlockDataSet`) store every leaf in
//!    a `Block<ordinal>` group and describe their tree in an `Assembly` group whose leaves point
//!    at those blocks, possibly in a sibling file.
//!
//! 3. Time series store each step after the previous one and index them in a `Steps` group. A
//!    step that repeats the geometry or an array of the step before it points at the earlier data
//!    instead of copying it.
//!
//! # Reading
//!
//! ```no_run
//! use vtkhdf_file::{ReadOptions, VtkHdfFile};
//!
//! # fn main() -> vtkhdf_error::VtkHdfResult<()> {
//! let file = VtkHdfFile::open("mesh.vtkhdf")?;
//! let second_step = file.read(&ReadOptions::default().with_step(1))?;
//! # Ok(())
//! # }
//! ```
//!
//! # Writing
//!
//! [`VtkHdfWriter`] writes one data object, or a sequence of steps of the same structure, to a
//! new file. [`WriteOptions`] can move the pieces of a partitioned dataset or the blocks of a
//! composite dataset into sibling files that the main file references.

pub use array_io::*;
pub use controller::*;
pub use data_type::*;
pub use distributed::*;
pub use metadata::*;
pub use naming::*;
pub use offsets::*;
pub use options::*;
pub use read::*;
pub use root::*;
pub use write::*;

mod array_io;
mod controller;
mod data_type;
mod distributed;
mod metadata;
mod naming;
mod offsets;
mod options;
mod read;
mod root;
#[cfg(test)]
mod tests;
mod write;

/// Path of the group every VTKHDF file is rooted at.
pub const VTKHDF_ROOT_PATH: &str = "/VTKHDF";

/// The `Version` written to new files.
pub const VERSION: [i64; 2] = [2, 3];

/// Highest major version this crate reads.
pub const MAX_MAJOR_VERSION: i64 = 2;

/// File extension used when a path has none.
pub const DEFAULT_EXTENSION: &str = "vtkhdf";

/// Attribute marking a leaf group written from a partitioned dataset.
pub const PARTITIONED_ATTRIBUTE: &str = "Partitioned";
