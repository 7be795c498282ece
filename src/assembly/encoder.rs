//! CIL encoding, the inverse of [`crate::assembly::decode_stream`].

use crate::{
    assembly::{Immediate, Instruction, Operand, PREFIX_FE},
    Result,
};

/// Append the bytes of `instruction` to `out`
///
/// # Errors
/// Returns [`crate::Error::Malformed`] if the opcode is unknown or the operand does not match
/// the opcode's operand kind.
pub fn encode_instruction(instruction: &Instruction, out: &mut Vec<u8>) -> Result<()> {
    let Some(info) = instruction.op_code().info() else {
        return Err(malformed_error!(
            "Cannot encode opcode {:02X} {:02X}",
            instruction.prefix,
            instruction.opcode
        ));
    };

    if !instruction.operand.fits(info.op_type) {
        return Err(malformed_error!(
            "Cannot encode {} with operand {:?}",
            info.instr,
            instruction.operand
        ));
    }

    if instruction.prefix == PREFIX_FE {
        out.push(PREFIX_FE);
    }
    out.push(instruction.opcode);

    match &instruction.operand {
        Operand::None => {}
        Operand::Immediate(value) => match value {
            Immediate::Int8(value) => out.extend_from_slice(&value.to_le_bytes()),
            Immediate::UInt8(value) => out.push(*value),
            Immediate::UInt16(value) => out.extend_from_slice(&value.to_le_bytes()),
            Immediate::Int32(value) => out.extend_from_slice(&value.to_le_bytes()),
            Immediate::Int64(value) => out.extend_from_slice(&value.to_le_bytes()),
            Immediate::Float32(value) => out.extend_from_slice(&value.to_le_bytes()),
            Immediate::Float64(value) => out.extend_from_slice(&value.to_le_bytes()),
        },
        Operand::Token(token) => out.extend_from_slice(&token.value().to_le_bytes()),
        Operand::Switch(targets) => {
            let Ok(count) = u32::try_from(targets.len()) else {
                return Err(malformed_error!("Too many switch targets - {}", targets.len()));
            };

            out.extend_from_slice(&count.to_le_bytes());
            for target in targets {
                out.extend_from_slice(&target.to_le_bytes());
            }
        }
    }

    Ok(())
}

/// Encode a full instruction list into IL bytes
///
/// # Errors
/// Returns the error of the first instruction that cannot be encoded.
pub fn encode_stream(instructions: &[Instruction]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(instructions.iter().map(|i| i.size as usize).sum());
    for instruction in instructions {
        encode_instruction(instruction, &mut out)?;
    }

    Ok(out)
}
