//! The `Property` table (0x17).

mod raw;

pub use raw::*;
