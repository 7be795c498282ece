//! The `MethodDef` table (0x06).
//!
//! Besides name, flags and signature, each row carries the RVA of the method body. The
//! rewriter patches that column in place when a body moves, so rows remember their offset.

mod raw;

pub use raw::*;
