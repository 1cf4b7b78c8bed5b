//! The in-memory side of VTKHDF: typed arrays, leaf meshes and composite datasets.
//!
//! Arrays are a closed tagged variant over the supported element types ([`ArrayData`]); code
//! that needs the concrete element type dispatches with [`match_each_array_data!`]. Datasets
//! are plain sum types ([`DataSet`], [`DataObject`]) matched on by the reader and writer.

pub use array::*;
pub use attributes::*;
pub use cells::*;
pub use composite::*;
pub use data::*;
pub use dataset::*;
pub use merge::*;

mod array;
mod attributes;
mod cells;
mod composite;
mod data;
mod dataset;
mod merge;
