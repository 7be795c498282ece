//! Removing the code of an assembly while keeping its shape.
//!
//! Shredding replaces the body of every method, property accessor, event accessor and
//! constructor with `nop; ret`. Names, signatures, flags, tokens and the type hierarchy stay
//! untouched, so the result still works as a reference assembly for compilers and tooling.
//!
//! The work is split into three steps, each exposed on its own:
//!
//! - [`shred_body`] rewrites a single body
//! - [`walk_module`] visits every body-carrying member of a module
//! - [`Shredder`] loads an assembly, walks all modules and persists the result
//!
//! # Examples
//!
//! ```rust,no_run
//! use cilshred::{remove_code, Shredder, ShredOptions};
//! use std::path::Path;
//!
//! // in place, with the default options
//! remove_code(Path::new("Library.dll"), None)?;
//!
//! // keep exception handlers and locals, write to a different file
//! let report = Shredder::new()
//!     .with_options(ShredOptions::new().keep_auxiliary_tables(true))
//!     .run(Path::new("Library.dll"), Some(Path::new("Library.ref.dll")))?;
//!
//! if let Some(report) = report {
//!     println!("{} bodies shredded", report.stats.bodies_shredded);
//! }
//! # Ok::<(), cilshred::Error>(())
//! ```

mod body;
mod walker;

pub use body::shred_body;
pub use walker::{walk_module, WalkStats};

use std::path::{Path, PathBuf};

use log::info;

use crate::{
    model::{CilLoader, CilWriter, Loader, Persister},
    Error, Result,
};

/// Options of a shredding run
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ShredOptions {
    /// Keep exception handlers, locals and the stack depth of shredded bodies
    pub keep_auxiliary_tables: bool,
}

impl ShredOptions {
    /// The default options: auxiliary tables are dropped
    #[must_use]
    pub fn new() -> Self {
        ShredOptions::default()
    }

    /// Keep or drop exception handlers, locals and the stack depth
    #[must_use]
    pub fn keep_auxiliary_tables(mut self, keep: bool) -> Self {
        self.keep_auxiliary_tables = keep;
        self
    }
}

/// Outcome of a successful run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShredReport {
    /// Number of modules written
    pub modules_written: usize,
    /// Counters of all walked modules
    pub stats: WalkStats,
    /// Where the modules were written to
    pub output: PathBuf,
}

/// Load, shred and persist an assembly.
///
/// The loader and persister are exchangeable; [`Shredder::new`] uses [`CilLoader`] and
/// [`CilWriter`].
pub struct Shredder<L = CilLoader, P = CilWriter> {
    loader: L,
    persister: P,
    options: ShredOptions,
}

impl Shredder {
    /// A shredder for PE images with the default options
    #[must_use]
    pub fn new() -> Self {
        Shredder::with_collaborators(CilLoader::new(), CilWriter::new())
    }
}

impl Default for Shredder {
    fn default() -> Self {
        Shredder::new()
    }
}

impl<L: Loader, P: Persister> Shredder<L, P> {
    /// A shredder using `loader` and `persister`
    pub fn with_collaborators(loader: L, persister: P) -> Self {
        Shredder {
            loader,
            persister,
            options: ShredOptions::default(),
        }
    }

    /// Replace the options
    #[must_use]
    pub fn with_options(mut self, options: ShredOptions) -> Self {
        self.options = options;
        self
    }

    /// The active options
    pub fn options(&self) -> &ShredOptions {
        &self.options
    }

    /// Shred the assembly at `input` and write it to `output`, or back to `input`.
    ///
    /// A missing `input` is not an error: nothing is written and `Ok(None)` is returned.
    /// Modules are written one after another; if writing one fails, the ones before it stay
    /// written.
    ///
    /// # Errors
    /// - [`crate::Error::AssemblyLoad`] if the loader fails
    /// - [`crate::Error::NoModules`] if the assembly has no module collection
    /// - the errors of [`shred_body`] and of the persister
    pub fn run(&self, input: &Path, output: Option<&Path>) -> Result<Option<ShredReport>> {
        if !input.exists() {
            info!("{} does not exist, nothing to do", input.display());
            return Ok(None);
        }

        let mut assembly = self
            .loader
            .load(input)
            .map_err(|source| Error::AssemblyLoad {
                path: input.to_path_buf(),
                source: Box::new(source),
            })?;

        let Some(modules) = assembly.modules.as_mut() else {
            return Err(Error::NoModules(input.to_path_buf()));
        };

        let mut stats = WalkStats::default();
        for module in modules.iter_mut() {
            stats += walk_module(module, &self.options)?;
        }

        let output = output.unwrap_or(input);
        for module in modules.iter() {
            self.persister.write(module, output)?;
        }

        info!(
            "Shredded {} bodies in {} types of {}",
            stats.bodies_shredded,
            stats.types_visited,
            assembly.name.as_deref().unwrap_or("<unnamed>")
        );

        Ok(Some(ShredReport {
            modules_written: modules.len(),
            stats,
            output: output.to_path_buf(),
        }))
    }
}

/// Shred the assembly at `input` with the default options.
///
/// `output` defaults to `input`, which rewrites the file in place. See [`Shredder::run`].
///
/// # Errors
/// See [`Shredder::run`].
pub fn remove_code(input: &Path, output: Option<&Path>) -> Result<Option<ShredReport>> {
    Shredder::new().run(input, output)
}
