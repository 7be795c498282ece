//! Metadata streams (ECMA-335 II.24.2.2).
//!
//! The metadata root lists a set of named streams. Reading method bodies only needs three
//! of them:
//!
//! - **`#~`** (or the unoptimized **`#-`**) - the metadata tables, see [`TablesHeader`]
//! - **`#Strings`** - null-terminated UTF-8 identifiers, see [`Strings`]
//! - **`#Blob`** - length-prefixed binary data such as signatures, see [`Blob`]
//!
//! `#US` and `#GUID` are accepted in the stream directory but never decoded.

mod blob;
mod streamheader;
mod strings;
mod tablesheader;

pub use blob::Blob;
pub use streamheader::StreamHeader;
pub use strings::Strings;
pub use tablesheader::TablesHeader;
