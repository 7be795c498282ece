//! The `EventPtr` indirection table (0x13), present in unoptimized (`#-`) metadata.

mod raw;

pub use raw::*;
