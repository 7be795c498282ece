//! The `EventMap` table (0x12), assigning contiguous ranges of `Event` rows to their owning
//! type.

mod raw;

pub use raw::*;
