//! Test fixtures.
//!
//! [`builder`] produces synthetic assemblies; it is shared with the integration tests and the
//! benchmarks through `#[path]` includes.

#[allow(dead_code)]
pub(crate) mod builder;
