#![cfg(target_endian = "little")]
#![deny(missing_docs)]

//! The element type system for VTKHDF
//!
//! This crate contains the element type tags of in-memory arrays ([`PType`], [`DType`]), the
//! identifiers the container uses for the same types ([`NativeType`]), and the mapping table
//! between the two.

pub use dtype::*;
pub use index::{Index, to_index, to_usize};
pub use native::*;
pub use ptype::*;

mod dtype;
mod index;
mod native;
mod ptype;
