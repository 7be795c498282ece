//! The `PropertyMap` table (0x15), assigning contiguous ranges of `Property` rows to their
//! owning type.

mod raw;

pub use raw::*;
