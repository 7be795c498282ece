//! Exception handling clauses of CIL method bodies (ECMA-335 II.25.4.6).

use bitflags::bitflags;

bitflags! {
    /// Kind of an exception handling clause.
    ///
    /// A typed `catch` clause is the zero value.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ExceptionHandlerFlags: u16 {
        /// A typed exception clause
        const EXCEPTION = 0x0000;
        /// An exception filter and handler clause
        const FILTER = 0x0001;
        /// A finally clause
        const FINALLY = 0x0002;
        /// A fault clause, a finally that only runs on exceptions
        const FAULT = 0x0004;
    }
}

/// One try / handler region pair of a method body.
///
/// Offsets and lengths are in bytes, relative to the first byte of the method's code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionHandler {
    /// Kind of the clause
    pub flags: ExceptionHandlerFlags,
    /// Start of the protected region
    pub try_offset: u32,
    /// Length of the protected region
    pub try_length: u32,
    /// Start of the handler
    pub handler_offset: u32,
    /// Length of the handler
    pub handler_length: u32,
    /// Catch type token for `EXCEPTION` clauses, filter start for `FILTER` clauses
    pub class_token_or_filter: u32,
}

impl ExceptionHandler {
    /// True if the clause can be stored in a small exception section
    #[must_use]
    pub fn fits_small(&self) -> bool {
        self.try_offset <= u32::from(u16::MAX)
            && self.try_length <= u32::from(u8::MAX)
            && self.handler_offset <= u32::from(u16::MAX)
            && self.handler_length <= u32::from(u8::MAX)
    }
}
