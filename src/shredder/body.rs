//! Replacing a single method body.

use crate::{
    assembly::OpCode,
    metadata::method::MethodBody,
    shredder::ShredOptions,
    Result,
};

/// Replace the instructions of `body` with `nop; ret`.
///
/// Instructions are removed from the end, so no offsets have to be recomputed in between.
/// Unless [`ShredOptions::keep_auxiliary_tables`] is set, the exception handlers and locals
/// are dropped as well, which lets the body be written with a tiny header.
///
/// Returns `false` for an absent body, which is left alone.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] if the replacement instructions cannot be created.
pub fn shred_body(body: Option<&mut MethodBody>, options: &ShredOptions) -> Result<bool> {
    let Some(body) = body else {
        return Ok(false);
    };

    let mut processor = body.processor();
    while let Some(last) = processor.len().checked_sub(1) {
        processor.remove(last);
    }

    let nop = processor.create(OpCode::NOP)?;
    processor.append(nop);
    let ret = processor.create(OpCode::RET)?;
    processor.append(ret);

    if !options.keep_auxiliary_tables {
        body.clear_auxiliary();
    }

    Ok(true)
}
