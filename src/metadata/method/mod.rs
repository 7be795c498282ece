//! Method bodies and the flags describing methods.
//!
//! # Key Components
//!
//! - [`MethodBody`] - a decoded tiny or fat body, editable through
//!   [`MethodBody::processor`] and re-encodable with [`MethodBody::encode`]
//! - [`ExceptionHandler`] - one try / handler clause of a body
//! - [`MethodImplCodeType`], [`MethodModifiers`] - method definition flags
//! - [`MethodBodyFlags`], [`SectionFlags`] - header and extra section flags

mod body;
mod exceptions;
mod types;

pub use body::{align4, MethodBody, FAT_HEADER_SIZE, TINY_MAX_CODE_SIZE, TINY_MAX_STACK};
pub use exceptions::{ExceptionHandler, ExceptionHandlerFlags};
pub use types::*;
