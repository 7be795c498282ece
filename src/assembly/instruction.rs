//! Decoded CIL instructions and their operands.

use std::fmt;

use crate::{
    assembly::{CilInstruction, INSTRUCTIONS, INSTRUCTIONS_FE},
    metadata::token::Token,
    Result,
};

/// Prefix byte of the two byte opcodes
pub const PREFIX_FE: u8 = 0xFE;

/// Kind of the inline operand that follows an opcode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandType {
    /// No operand
    None,
    /// Signed 8-bit value, short branch targets and `ldc.i4.s`
    Int8,
    /// Unsigned 8-bit value, short argument / local indexes
    UInt8,
    /// Unsigned 16-bit value, long argument / local indexes
    UInt16,
    /// Signed 32-bit value, long branch targets and `ldc.i4`
    Int32,
    /// Signed 64-bit value
    Int64,
    /// 32-bit float
    Float32,
    /// 64-bit float
    Float64,
    /// Metadata token
    Token,
    /// Jump table of `switch`
    Switch,
}

/// How an instruction transfers control
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowType {
    /// Falls through to the next instruction
    Sequential,
    /// Branches or falls through
    ConditionalBranch,
    /// Always branches
    UnconditionalBranch,
    /// Calls another method and continues after it
    Call,
    /// Returns from the method
    Return,
    /// Multi-way branch
    Switch,
    /// Raises an exception
    Throw,
    /// Ends a `finally` or `fault` handler
    EndFinally,
    /// Ends a filter block
    EndFilter,
    /// Leaves a protected region
    Leave,
    /// Prefix modifying the next instruction
    Meta,
}

/// An immediate operand value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Immediate {
    /// Signed 8-bit
    Int8(i8),
    /// Unsigned 8-bit
    UInt8(u8),
    /// Unsigned 16-bit
    UInt16(u16),
    /// Signed 32-bit
    Int32(i32),
    /// Signed 64-bit
    Int64(i64),
    /// 32-bit float
    Float32(f32),
    /// 64-bit float
    Float64(f64),
}

/// The operand of an instruction
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// No operand
    None,
    /// An immediate value or branch displacement
    Immediate(Immediate),
    /// A metadata token
    Token(Token),
    /// Branch displacements of a `switch`, relative to the next instruction
    Switch(Vec<i32>),
}

impl Operand {
    /// True if this operand can be encoded as `op_type`
    #[must_use]
    pub fn fits(&self, op_type: OperandType) -> bool {
        matches!(
            (op_type, self),
            (OperandType::None, Operand::None)
                | (OperandType::Int8, Operand::Immediate(Immediate::Int8(_)))
                | (OperandType::UInt8, Operand::Immediate(Immediate::UInt8(_)))
                | (OperandType::UInt16, Operand::Immediate(Immediate::UInt16(_)))
                | (OperandType::Int32, Operand::Immediate(Immediate::Int32(_)))
                | (OperandType::Int64, Operand::Immediate(Immediate::Int64(_)))
                | (OperandType::Float32, Operand::Immediate(Immediate::Float32(_)))
                | (OperandType::Float64, Operand::Immediate(Immediate::Float64(_)))
                | (OperandType::Token, Operand::Token(_))
                | (OperandType::Switch, Operand::Switch(_))
        )
    }

    /// Encoded size of the operand in bytes
    #[must_use]
    pub fn size(&self) -> u32 {
        match self {
            Operand::None => 0,
            Operand::Immediate(Immediate::Int8(_) | Immediate::UInt8(_)) => 1,
            Operand::Immediate(Immediate::UInt16(_)) => 2,
            Operand::Immediate(Immediate::Int32(_) | Immediate::Float32(_)) | Operand::Token(_) => 4,
            Operand::Immediate(Immediate::Int64(_) | Immediate::Float64(_)) => 8,
            Operand::Switch(targets) => 4 + 4 * targets.len() as u32,
        }
    }
}

/// An opcode, optionally prefixed with `0xFE`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OpCode {
    /// `0xFE` for two byte opcodes, 0 otherwise
    pub prefix: u8,
    /// The opcode byte
    pub code: u8,
}

impl OpCode {
    /// `nop`
    pub const NOP: OpCode = OpCode::new(0x00);
    /// `ldarg.0`
    pub const LDARG_0: OpCode = OpCode::new(0x02);
    /// `ldnull`
    pub const LDNULL: OpCode = OpCode::new(0x14);
    /// `ldc.i4.s`
    pub const LDC_I4_S: OpCode = OpCode::new(0x1F);
    /// `pop`
    pub const POP: OpCode = OpCode::new(0x26);
    /// `call`
    pub const CALL: OpCode = OpCode::new(0x28);
    /// `ret`
    pub const RET: OpCode = OpCode::new(0x2A);
    /// `ldstr`
    pub const LDSTR: OpCode = OpCode::new(0x72);
    /// `throw`
    pub const THROW: OpCode = OpCode::new(0x7A);

    /// A single byte opcode
    #[must_use]
    pub const fn new(code: u8) -> OpCode {
        OpCode { prefix: 0, code }
    }

    /// A two byte opcode, `0xFE code`
    #[must_use]
    pub const fn extended(code: u8) -> OpCode {
        OpCode {
            prefix: PREFIX_FE,
            code,
        }
    }

    /// Table entry of this opcode, `None` for unknown and reserved opcodes
    #[must_use]
    pub fn info(self) -> Option<&'static CilInstruction> {
        let entry = match self.prefix {
            0 => INSTRUCTIONS.get(usize::from(self.code)),
            PREFIX_FE => INSTRUCTIONS_FE.get(usize::from(self.code)),
            _ => None,
        }?;

        if entry.is_reserved() {
            None
        } else {
            Some(entry)
        }
    }

    /// Encoded size of the opcode, 1 or 2 bytes
    #[must_use]
    pub fn size(self) -> u32 {
        if self.prefix == PREFIX_FE {
            2
        } else {
            1
        }
    }
}

/// One decoded CIL instruction
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    /// Offset from the start of the method's code
    pub offset: u32,
    /// Encoded size, opcode and operand
    pub size: u32,
    /// The opcode byte
    pub opcode: u8,
    /// `0xFE` for two byte opcodes, 0 otherwise
    pub prefix: u8,
    /// Mnemonic, e.g. `ldarg.1`
    pub mnemonic: &'static str,
    /// How the instruction transfers control
    pub flow_type: FlowType,
    /// The inline operand
    pub operand: Operand,
}

impl Instruction {
    /// Build an instruction at offset 0 from an opcode and its operand
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the opcode is reserved or the operand does not
    /// match the opcode's operand kind.
    pub fn new(opcode: OpCode, operand: Operand) -> Result<Instruction> {
        let Some(info) = opcode.info() else {
            return Err(malformed_error!(
                "Invalid opcode: {:02X} {:02X}",
                opcode.prefix,
                opcode.code
            ));
        };

        if !operand.fits(info.op_type) {
            return Err(malformed_error!(
                "Operand {:?} does not fit {} - expected {:?}",
                operand,
                info.instr,
                info.op_type
            ));
        }

        Ok(Instruction {
            offset: 0,
            size: opcode.size() + operand.size(),
            opcode: opcode.code,
            prefix: opcode.prefix,
            mnemonic: info.instr,
            flow_type: info.flow,
            operand,
        })
    }

    /// The opcode of this instruction
    #[must_use]
    pub fn op_code(&self) -> OpCode {
        OpCode {
            prefix: self.prefix,
            code: self.opcode,
        }
    }

    /// True if this instruction is `opcode`
    #[must_use]
    pub fn is(&self, opcode: OpCode) -> bool {
        self.op_code() == opcode
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IL_{:04X}: {}", self.offset, self.mnemonic)?;
        match &self.operand {
            Operand::None => Ok(()),
            Operand::Immediate(value) => match value {
                Immediate::Int8(value) => write!(f, " {value}"),
                Immediate::UInt8(value) => write!(f, " {value}"),
                Immediate::UInt16(value) => write!(f, " {value}"),
                Immediate::Int32(value) => write!(f, " {value}"),
                Immediate::Int64(value) => write!(f, " {value}"),
                Immediate::Float32(value) => write!(f, " {value}"),
                Immediate::Float64(value) => write!(f, " {value}"),
            },
            Operand::Token(token) => write!(f, " {token}"),
            Operand::Switch(targets) => write!(f, " ({} targets)", targets.len()),
        }
    }
}
