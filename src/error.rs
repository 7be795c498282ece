use std::path::PathBuf;

use thiserror::Error;

use crate::metadata::token::Token;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

macro_rules! out_of_bounds_error {
    () => {
        crate::Error::OutOfBounds {
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which covers every failure this library can report.
///
/// # Error Categories
///
/// ## Image Parsing Errors
/// - [`Error::Malformed`] - Corrupted or invalid file structure
/// - [`Error::OutOfBounds`] - Attempted to read beyond the end of a buffer
/// - [`Error::NotSupported`] - The input is not a .NET PE image
/// - [`Error::Empty`] - Empty input provided
///
/// ## I/O and External Errors
/// - [`Error::FileError`] - Filesystem I/O errors
/// - [`Error::GoblinErr`] - PE parsing errors from the goblin crate
///
/// ## Shredding Errors
/// - [`Error::AssemblyLoad`] - The input assembly could not be loaded
/// - [`Error::NoModules`] - The loaded assembly exposes no module collection
/// - [`Error::NoSpace`] - A rewritten method body could not be placed into the image
///
/// # Examples
///
/// ```rust,no_run
/// use cilshred::{remove_code, Error};
/// use std::path::Path;
///
/// match remove_code(Path::new("Library.dll"), None) {
///     Ok(Some(report)) => println!("{} bodies shredded", report.stats.bodies_shredded),
///     Ok(None) => println!("nothing to do"),
///     Err(Error::AssemblyLoad { path, source }) => {
///         eprintln!("Cannot read the assembly: {} ({source})", path.display());
///     }
///     Err(e) => eprintln!("Other error: {e}"),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The file is damaged and could not be parsed.
    ///
    /// The error carries the source location where the malformation was detected.
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// An out of bound access was attempted while parsing the file.
    #[error("Out of Bound read would have occurred - {file}:{line}")]
    OutOfBounds {
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// This file type is not supported.
    ///
    /// Raised for PE images without a CLR runtime header, or for metadata features this
    /// library does not understand (e.g. unknown tables).
    #[error("This file type is not supported")]
    NotSupported,

    /// Provided input was empty.
    #[error("Provided input was empty")]
    Empty,

    /// File I/O error.
    #[error("{0}")]
    FileError(#[from] std::io::Error),

    /// Error from the goblin crate during PE parsing.
    #[error("{0}")]
    GoblinErr(#[from] goblin::error::Error),

    /// The assembly at `path` could not be loaded.
    ///
    /// Wraps the underlying parse or I/O failure.
    #[error("Cannot read the assembly: {}", path.display())]
    AssemblyLoad {
        /// The path that was passed to the loader
        path: PathBuf,
        /// The error reported by the loader
        #[source]
        source: Box<Error>,
    },

    /// The loaded assembly has no module collection.
    #[error("Cannot find modules in {}", .0.display())]
    NoModules(PathBuf),

    /// A rewritten method body neither fits its original location nor any free gap.
    #[error("No space left to place the body of method {0}")]
    NoSpace(Token),
}
