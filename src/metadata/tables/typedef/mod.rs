//! The `TypeDef` table (0x02).
//!
//! Each row defines one type. Methods (and fields) are owned as contiguous ranges: a row's
//! `method_list` is the first method of the type, and the range runs up to the next row's
//! `method_list` (or the end of the `MethodDef` table for the last row).

mod raw;

pub use raw::*;
