//! VTKHDF mesh files.
//!
//! The in-memory datasets live at the crate root; the lower layers are re-exported as modules.
//!
//! ```no_run
//! use vtkhdf::file::{ReadOptions, WriteOptions, read, write};
//!
//! # fn main() -> vtkhdf::error::VtkHdfResult<()> {
//! let mesh = read("in.vtkhdf", &ReadOptions::default().with_merge_parts(true))?;
//! write("out.vtkhdf", &mesh, &WriteOptions::default().with_compression_level(4))?;
//! # Ok(())
//! # }
//! ```

pub use vtkhdf_array::*;
pub use {
    vtkhdf_container as container, vtkhdf_dtype as dtype, vtkhdf_error as error,
    vtkhdf_file as file,
};
