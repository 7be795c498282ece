//! # cilshred Prelude
//!
//! The most commonly used types and traits of cilshred in one place.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all cilshred operations
pub use crate::Error;

/// The result type used throughout cilshred
pub use crate::Result;

/// Low-level file parsing utilities
pub use crate::{File, Parser};

// ================================================================================================
// Shredding
// ================================================================================================

/// Shred an assembly with the default options
pub use crate::remove_code;

/// Configurable shredding runs and their outcome
pub use crate::{ShredOptions, ShredReport, Shredder, WalkStats};

/// Single body and single module steps
pub use crate::shredder::{shred_body, walk_module};

// ================================================================================================
// Object Model
// ================================================================================================

/// Loading and persisting
pub use crate::{CilLoader, CilWriter, Loader, Persister};

/// The model types
pub use crate::{
    Assembly, Event, EventAccessor, Member, MethodDef, Module, Property, PropertyAccessor,
    TypeDef,
};

// ================================================================================================
// Method Bodies and Instructions
// ================================================================================================

/// Method bodies and their exception handlers
pub use crate::metadata::method::{ExceptionHandler, ExceptionHandlerFlags, MethodBody};

/// Instructions and their mutation
pub use crate::assembly::{FlowType, IlProcessor, Instruction, OpCode, Operand};

/// Metadata tokens
pub use crate::metadata::token::Token;
