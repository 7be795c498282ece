//! The `Event` table (0x14).

mod raw;

pub use raw::*;
