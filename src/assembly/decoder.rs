//! Linear CIL decoding.
//!
//! Method bodies are decoded front to back into an instruction list; no control flow analysis
//! is performed, every byte of the code must belong to exactly one instruction.
//!
//! # Examples
//!
//! ```rust
//! use cilshred::{Parser, assembly::decode_stream};
//!
//! let code = [0x00, 0x02, 0x2A]; // nop, ldarg.0, ret
//! let mut parser = Parser::new(&code);
//! let instructions = decode_stream(&mut parser)?;
//!
//! assert_eq!(instructions.len(), 3);
//! assert_eq!(instructions[2].mnemonic, "ret");
//! assert_eq!(instructions[2].offset, 2);
//! # Ok::<(), cilshred::Error>(())
//! ```

use crate::{
    assembly::{Immediate, Instruction, Operand, OperandType, INSTRUCTIONS, INSTRUCTIONS_FE, PREFIX_FE},
    file::parser::Parser,
    metadata::token::Token,
    Result,
};

/// Upper bound of `switch` targets accepted before reading the table
const MAX_SWITCH_TARGETS: usize = 0x0010_0000;

/// Decode all instructions until the parser runs out of data
///
/// # Errors
/// Returns an error if an opcode is invalid or an operand is truncated.
pub fn decode_stream(parser: &mut Parser) -> Result<Vec<Instruction>> {
    let mut instructions = Vec::new();

    while parser.has_more_data() {
        instructions.push(decode_instruction(parser)?);
    }

    Ok(instructions)
}

/// Decode one instruction at the current parser position.
///
/// The instruction's offset is the parser position before decoding; the parser is left
/// directly behind the operand.
///
/// # Errors
/// - [`crate::Error::Malformed`] for reserved or unknown opcodes
/// - [`crate::Error::OutOfBounds`] if the operand is truncated
pub fn decode_instruction(parser: &mut Parser) -> Result<Instruction> {
    let offset = parser.pos();
    let first_byte = parser.read_le::<u8>()?;

    let (cil_instruction, prefix, opcode) = match first_byte {
        PREFIX_FE => {
            let second_byte = parser.read_le::<u8>()?;

            match INSTRUCTIONS_FE.get(usize::from(second_byte)) {
                Some(instr) => (instr, PREFIX_FE, second_byte),
                None => return Err(malformed_error!("Invalid opcode: FE {:02X}", second_byte)),
            }
        }
        _ => match INSTRUCTIONS.get(usize::from(first_byte)) {
            Some(instr) => (instr, 0, first_byte),
            None => return Err(malformed_error!("Invalid opcode: {:02X}", first_byte)),
        },
    };

    if cil_instruction.is_reserved() {
        return Err(malformed_error!(
            "Reserved opcode: {:02X}{:02X}",
            prefix,
            opcode
        ));
    }

    let operand = match cil_instruction.op_type {
        OperandType::None => Operand::None,
        OperandType::Int8 => Operand::Immediate(Immediate::Int8(parser.read_le::<i8>()?)),
        OperandType::UInt8 => Operand::Immediate(Immediate::UInt8(parser.read_le::<u8>()?)),
        OperandType::UInt16 => Operand::Immediate(Immediate::UInt16(parser.read_le::<u16>()?)),
        OperandType::Int32 => Operand::Immediate(Immediate::Int32(parser.read_le::<i32>()?)),
        OperandType::Int64 => Operand::Immediate(Immediate::Int64(parser.read_le::<i64>()?)),
        OperandType::Float32 => Operand::Immediate(Immediate::Float32(parser.read_le::<f32>()?)),
        OperandType::Float64 => Operand::Immediate(Immediate::Float64(parser.read_le::<f64>()?)),
        OperandType::Token => Operand::Token(Token::new(parser.read_le::<u32>()?)),
        OperandType::Switch => {
            let case_count = parser.read_le::<u32>()? as usize;
            if case_count > MAX_SWITCH_TARGETS || case_count * 4 > parser.remaining() {
                return Err(out_of_bounds_error!());
            }

            let mut targets = Vec::with_capacity(case_count);
            for _ in 0..case_count {
                targets.push(parser.read_le::<i32>()?);
            }

            Operand::Switch(targets)
        }
    };

    let (Ok(start), Ok(size)) = (u32::try_from(offset), u32::try_from(parser.pos() - offset)) else {
        return Err(out_of_bounds_error!());
    };

    Ok(Instruction {
        offset: start,
        size,
        opcode,
        prefix,
        mnemonic: cil_instruction.instr,
        flow_type: cil_instruction.flow,
        operand,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembly::FlowType;

    #[test]
    fn decode_instruction_basic() {
        // ldloc.s 16
        let mut parser = Parser::new(&[0x11, 0x10]);

        let result = decode_instruction(&mut parser).unwrap();

        assert_eq!(result.offset, 0);
        assert_eq!(result.size, 2);
        assert_eq!(result.opcode, 0x11);
        assert_eq!(result.prefix, 0);
        assert_eq!(result.mnemonic, "ldloc.s");
        assert_eq!(result.flow_type, FlowType::Sequential);
        assert_eq!(result.operand, Operand::Immediate(Immediate::UInt8(0x10)));
    }

    #[test]
    fn decode_instruction_two_byte() {
        // ldloc 0x0102
        let mut parser = Parser::new(&[0xFE, 0x0C, 0x02, 0x01]);

        let result = decode_instruction(&mut parser).unwrap();

        assert_eq!(result.prefix, 0xFE);
        assert_eq!(result.opcode, 0x0C);
        assert_eq!(result.size, 4);
        assert_eq!(result.mnemonic, "ldloc");
        assert_eq!(result.operand, Operand::Immediate(Immediate::UInt16(0x0102)));
    }

    #[test]
    fn decode_instruction_branch() {
        // br.s -2
        let mut parser = Parser::new(&[0x2B, 0xFE]);

        let result = decode_instruction(&mut parser).unwrap();

        assert_eq!(result.mnemonic, "br.s");
        assert_eq!(result.flow_type, FlowType::UnconditionalBranch);
        assert_eq!(result.operand, Operand::Immediate(Immediate::Int8(-2)));
    }

    #[test]
    fn decode_instruction_switch() {
        #[rustfmt::skip]
        let mut parser = Parser::new(&[
            0x45, 0x02, 0x00, 0x00, 0x00,
            0x0A, 0x00, 0x00, 0x00,
            0xF6, 0xFF, 0xFF, 0xFF,
        ]);

        let result = decode_instruction(&mut parser).unwrap();

        assert_eq!(result.mnemonic, "switch");
        assert_eq!(result.size, 13);
        assert_eq!(result.operand, Operand::Switch(vec![10, -10]));
    }

    #[test]
    fn decode_instruction_token() {
        let mut parser = Parser::new(&[0x72, 0x01, 0x00, 0x00, 0x70]);

        let result = decode_instruction(&mut parser).unwrap();

        assert_eq!(result.mnemonic, "ldstr");
        assert_eq!(result.operand, Operand::Token(Token::new(0x7000_0001)));
    }

    #[test]
    fn decode_invalid() {
        // reserved
        assert!(decode_instruction(&mut Parser::new(&[0x24])).is_err());
        // past the FE table
        assert!(decode_instruction(&mut Parser::new(&[0xFE, 0x30])).is_err());
        // truncated operand
        assert!(decode_instruction(&mut Parser::new(&[0x20, 0x01, 0x00])).is_err());
        // switch with more targets than data
        assert!(decode_instruction(&mut Parser::new(&[0x45, 0xFF, 0xFF, 0xFF, 0x7F])).is_err());
        // lone prefix
        assert!(decode_instruction(&mut Parser::new(&[0xFE])).is_err());
    }

    #[test]
    fn decode_stream_offsets() {
        #[rustfmt::skip]
        let code = [
            0x00,                         // nop
            0x03,                         // ldarg.1
            0x28, 0x01, 0x00, 0x00, 0x0A, // call
            0x2A,                         // ret
        ];
        let mut parser = Parser::new(&code);

        let instructions = decode_stream(&mut parser).unwrap();

        let offsets: Vec<u32> = instructions.iter().map(|i| i.offset).collect();
        assert_eq!(offsets, vec![0, 1, 2, 7]);
        assert_eq!(instructions[2].flow_type, FlowType::Call);
        assert_eq!(instructions[3].flow_type, FlowType::Return);
    }
}
