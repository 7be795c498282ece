//! CIL instruction handling.
//!
//! Method bodies are decoded into a flat list of [`Instruction`]s, edited through an
//! [`IlProcessor`] and encoded back into IL bytes when the image is written.
//!
//! # Key Components
//!
//! - [`decode_instruction`] / [`decode_stream`] - IL bytes to instructions
//! - [`encode_instruction`] / [`encode_stream`] - instructions to IL bytes
//! - [`IlProcessor`] - remove, append and create instructions of a body
//! - [`INSTRUCTIONS`] / [`INSTRUCTIONS_FE`] - the opcode tables
//!
//! # Examples
//!
//! ```rust
//! use cilshred::{Parser, assembly::{decode_stream, encode_stream}};
//!
//! let code = [0x02, 0x7B, 0x01, 0x00, 0x00, 0x04, 0x2A]; // ldarg.0, ldfld, ret
//! let instructions = decode_stream(&mut Parser::new(&code))?;
//! assert_eq!(instructions[1].mnemonic, "ldfld");
//! assert_eq!(encode_stream(&instructions)?, code.to_vec());
//! # Ok::<(), cilshred::Error>(())
//! ```

mod decoder;
mod encoder;
mod instruction;
mod instructions;
mod processor;

pub use decoder::{decode_instruction, decode_stream};
pub use encoder::{encode_instruction, encode_stream};
pub use instruction::{FlowType, Immediate, Instruction, OpCode, Operand, OperandType, PREFIX_FE};
pub use instructions::{CilInstruction, INSTRUCTIONS, INSTRUCTIONS_FE};
pub use processor::IlProcessor;
