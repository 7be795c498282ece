//! ECMA-335 metadata of .NET images.
//!
//! This module holds everything needed to get from the CLR runtime header of a PE image to
//! the method bodies of its types.
//!
//! # Key Components
//!
//! - [`cor20header`] - the CLI header, locating the metadata root
//! - [`root`] - the metadata root and its stream directory
//! - [`streams`] - the `#~`, `#Strings` and `#Blob` streams
//! - [`tables`] - row readers for the tables describing types and their members
//! - [`method`] - method body decoding and encoding
//! - [`token`] - metadata tokens
//!
//! # Examples
//!
//! ```rust,no_run
//! use cilshred::{File, metadata::{cor20header::Cor20Header, root::Root}};
//!
//! let file = File::from_file("Library.dll".as_ref())?;
//! let (clr_rva, clr_size) = file.clr()?;
//! let clr = file.data_slice(file.rva_to_offset(clr_rva)?, clr_size)?;
//! let header = Cor20Header::read(clr)?;
//!
//! let metadata = file.rva_to_offset(header.meta_data_rva as usize)?;
//! let root = Root::read(file.data_slice(metadata, header.meta_data_size as usize)?)?;
//! println!("Runtime: {}", root.version);
//! # Ok::<(), cilshred::Error>(())
//! ```

/// Implementation of the Header of CIL
pub mod cor20header;
/// Implementation of method bodies and method flags
pub mod method;
/// Implementation of the root metadata structure
pub mod root;
/// Implementation of the metadata streams (tables, heaps)
pub mod streams;
/// Implementation of the .NET metadata tables
pub mod tables;
/// Commonly used metadata token type
pub mod token;
