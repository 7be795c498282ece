//! The `MethodPtr` indirection table (0x05), present in unoptimized (`#-`) metadata.
//!
//! When present, the method ranges of `TypeDef` index into this table, whose rows name the
//! actual `MethodDef` row.

mod raw;

pub use raw::*;
