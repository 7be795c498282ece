//! The `Module` table (0x00), holding the single row that names the current module.

mod raw;

pub use raw::*;
