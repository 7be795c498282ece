//! The `Assembly` table (0x20), present in the manifest module of an assembly.

mod raw;

pub use raw::*;
