//! The `MethodSemantics` table (0x18), linking accessor methods to the property or event they
//! implement.

mod raw;

pub use raw::*;

/// Semantics flags of the `MethodSemantics` table (ECMA-335 II.23.1.12)
#[allow(non_snake_case)]
pub mod MethodSemanticsAttributes {
    /// Setter of a property
    pub const SETTER: u32 = 0x0001;
    /// Getter of a property
    pub const GETTER: u32 = 0x0002;
    /// Other accessor of a property or event
    pub const OTHER: u32 = 0x0004;
    /// `add` accessor of an event
    pub const ADD_ON: u32 = 0x0008;
    /// `remove` accessor of an event
    pub const REMOVE_ON: u32 = 0x0010;
    /// `raise` accessor of an event
    pub const FIRE: u32 = 0x0020;
}
