//! The `PropertyPtr` indirection table (0x16), present in unoptimized (`#-`) metadata.

mod raw;

pub use raw::*;
