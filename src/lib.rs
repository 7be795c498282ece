// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![deny(unsafe_code)]

//! # cilshred
//!
//! Strips the code out of .NET assemblies. Every method, property accessor, event accessor and
//! constructor keeps its name, signature, flags and token, but its body is replaced with
//! `nop; ret`. The result is a shell binary that still describes the full API of the original
//! and can be referenced by compilers and tools, without carrying any of its logic.
//!
//! Built in pure Rust on top of an ECMA-335 reader and writer for method bodies; neither
//! Windows nor the .NET runtime is required.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cilshred::remove_code;
//! use std::path::Path;
//!
//! // rewrite Library.dll in place
//! match remove_code(Path::new("Library.dll"), None)? {
//!     Some(report) => println!("{} bodies shredded", report.stats.bodies_shredded),
//!     None => println!("nothing to do"),
//! }
//! # Ok::<(), cilshred::Error>(())
//! ```
//!
//! ### Using the Prelude
//!
//! ```rust,no_run
//! use cilshred::prelude::*;
//! use std::path::Path;
//!
//! let shredder = Shredder::new().with_options(ShredOptions::new().keep_auxiliary_tables(true));
//! shredder.run(Path::new("Library.dll"), Some(Path::new("Library.shell.dll")))?;
//! # Ok::<(), cilshred::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`file`](File) - PE image access and address translation
//! - [`metadata`] - CLI header, metadata root, streams, tables and method bodies
//! - [`assembly`] - CIL instruction decoding, encoding and in-place editing
//! - [`model`] - the owned object model with its [`Loader`] and [`Persister`]
//! - [`shredder`] - the body shredder, the member walker and the orchestration
//!
//! A run loads the assembly into the model, walks every module and rewrites each body, then
//! persists the modules. Only the method bodies and, for bodies that had to move, the RVA
//! column of the `MethodDef` table change; every other byte of the image is kept.
//!
//! ## Error Handling
//!
//! All operations return [`Result<T, Error>`](Result):
//!
//! ```rust,no_run
//! use cilshred::{remove_code, Error};
//! use std::path::Path;
//!
//! match remove_code(Path::new("native.exe"), None) {
//!     Ok(_) => println!("done"),
//!     Err(Error::AssemblyLoad { path, source }) => {
//!         println!("{} is not a .NET assembly: {}", path.display(), source)
//!     }
//!     Err(e) => println!("Other error: {}", e),
//! }
//! ```
//!
//! ## Development and Testing
//!
//! ```bash
//! cargo test
//! cargo bench
//!
//! # fuzz the loader and walker
//! cargo +nightly fuzz run shred --release
//! ```

#[macro_use]
pub(crate) mod error;
pub(crate) mod file;

/// Shared functionality which is used in unit- and integration-tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust,no_run
/// use cilshred::prelude::*;
///
/// let assembly = CilLoader::new().load("Library.dll".as_ref())?;
/// println!("Assembly: {:?}", assembly.name);
/// # Ok::<(), cilshred::Error>(())
/// ```
pub mod prelude;

/// CIL instructions based on ECMA-335
///
/// - [`assembly::decode_stream`] / [`assembly::decode_instruction`] - linear decoding
/// - [`assembly::encode_stream`] / [`assembly::encode_instruction`] - the inverse
/// - [`assembly::IlProcessor`] - remove, append and insert instructions of a body
/// - [`assembly::INSTRUCTIONS`] / [`assembly::INSTRUCTIONS_FE`] - the opcode tables
///
/// # Examples
///
/// ```rust
/// use cilshred::{assembly::decode_instruction, Parser};
///
/// let bytecode = &[0x00, 0x2A]; // nop, ret
/// let mut parser = Parser::new(bytecode);
/// let instruction = decode_instruction(&mut parser)?;
///
/// assert_eq!(instruction.mnemonic, "nop");
/// # Ok::<(), cilshred::Error>(())
/// ```
pub mod assembly;

/// Parsing of CIL metadata based on ECMA-335
///
/// Covers exactly what is needed to locate and rewrite method bodies:
///
/// - [`metadata::cor20header`] - the CLI header
/// - [`metadata::root`] - metadata root and stream directory
/// - [`metadata::streams`] - `#~`, `#Strings` and `#Blob`
/// - [`metadata::tables`] - row readers for modules, types, methods, properties, events and
///   their links
/// - [`metadata::method`] - method body headers, exception sections and encoding
/// - [`metadata::token`] - metadata tokens
pub mod metadata;

/// The owned object model and its loader and persister
pub mod model;

/// Body shredding and the run orchestration
pub mod shredder;

/// `cilshred` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `cilshred` Error type
///
/// The main error type for all operations in this crate.
pub use error::Error;

/// Low-level file and memory parsing utilities.
///
/// # Example
///
/// ```rust
/// use cilshred::{Parser, assembly::decode_instruction};
/// let code = [0x2A]; // ret
/// let mut parser = Parser::new(&code);
/// let instr = decode_instruction(&mut parser)?;
/// assert_eq!(instr.mnemonic, "ret");
/// # Ok::<(), cilshred::Error>(())
/// ```
pub use file::{parser::Parser, File};

/// The object model.
pub use model::{
    Assembly, CilLoader, CilWriter, Event, EventAccessor, Loader, Member, MethodDef, Module,
    Persister, Property, PropertyAccessor, TypeDef,
};

/// Entry points of a shredding run.
pub use shredder::{remove_code, ShredOptions, ShredReport, Shredder, WalkStats};
