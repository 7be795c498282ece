//! In-place editing of a method body's instruction list.

use crate::{
    assembly::{Instruction, OpCode, Operand},
    Result,
};

/// Mutation handle over the instructions of one method body.
///
/// Obtained from [`crate::metadata::method::MethodBody::processor`]. Every mutation recomputes
/// the offsets of the following instructions and marks the body as modified, so the writer
/// knows it has to re-encode it.
///
/// # Examples
///
/// ```rust,ignore
/// let mut processor = body.processor();
/// while let Some(last) = processor.len().checked_sub(1) {
///     processor.remove(last);
/// }
/// let ret = processor.create(OpCode::RET)?;
/// processor.append(ret);
/// ```
pub struct IlProcessor<'a> {
    instructions: &'a mut Vec<Instruction>,
    modified: &'a mut bool,
}

impl<'a> IlProcessor<'a> {
    pub(crate) fn new(instructions: &'a mut Vec<Instruction>, modified: &'a mut bool) -> Self {
        IlProcessor {
            instructions,
            modified,
        }
    }

    /// Number of instructions
    #[must_use]
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// True if the body holds no instructions
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Create an operand-less instruction for `opcode`, not yet part of the body
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if `opcode` is reserved or requires an operand.
    pub fn create(&self, opcode: OpCode) -> Result<Instruction> {
        Instruction::new(opcode, Operand::None)
    }

    /// Remove and return the instruction at `index`, `None` if out of range
    pub fn remove(&mut self, index: usize) -> Option<Instruction> {
        if index >= self.instructions.len() {
            return None;
        }

        let removed = self.instructions.remove(index);
        self.relayout(index);
        *self.modified = true;
        Some(removed)
    }

    /// Append `instruction` at the end of the body
    pub fn append(&mut self, instruction: Instruction) {
        self.instructions.push(instruction);
        self.relayout(self.instructions.len() - 1);
        *self.modified = true;
    }

    fn relayout(&mut self, from: usize) {
        let mut offset = match from.checked_sub(1).and_then(|prev| self.instructions.get(prev)) {
            Some(prev) => prev.offset + prev.size,
            None => 0,
        };

        for instruction in self.instructions.iter_mut().skip(from) {
            instruction.offset = offset;
            offset += instruction.size;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{assembly::Immediate, metadata::token::Token};

    fn body() -> Vec<Instruction> {
        let mut instructions = vec![
            Instruction::new(OpCode::LDARG_0, Operand::None).unwrap(),
            Instruction::new(OpCode::CALL, Operand::Token(Token::new(0x0A00_0001))).unwrap(),
            Instruction::new(OpCode::RET, Operand::None).unwrap(),
        ];
        instructions[1].offset = 1;
        instructions[2].offset = 6;
        instructions
    }

    #[test]
    fn remove_relayouts() {
        let mut instructions = body();
        let mut modified = false;
        let mut processor = IlProcessor::new(&mut instructions, &mut modified);

        let call = processor.remove(1).unwrap();
        assert_eq!(call.mnemonic, "call");
        assert_eq!(processor.len(), 2);
        assert!(processor.remove(5).is_none());

        assert!(modified);
        assert_eq!(instructions[1].offset, 1);
    }

    #[test]
    fn append_relayouts() {
        let mut instructions = Vec::new();
        let mut modified = false;
        let mut processor = IlProcessor::new(&mut instructions, &mut modified);
        assert!(processor.is_empty());

        let ldnull = processor.create(OpCode::LDNULL).unwrap();
        processor.append(ldnull);
        let pop = processor.create(OpCode::POP).unwrap();
        processor.append(pop);
        let ldc = Instruction::new(OpCode::LDC_I4_S, Operand::Immediate(Immediate::Int8(7))).unwrap();
        processor.append(ldc);
        let ret = processor.create(OpCode::RET).unwrap();
        processor.append(ret);

        assert!(processor.create(OpCode::LDSTR).is_err());

        assert!(modified);
        let offsets: Vec<u32> = instructions.iter().map(|i| i.offset).collect();
        assert_eq!(offsets, vec![0, 1, 2, 4]);
    }

    #[test]
    fn untouched_is_not_modified() {
        let mut instructions = body();
        let mut modified = false;
        let processor = IlProcessor::new(&mut instructions, &mut modified);
        assert_eq!(processor.len(), 3);
        drop(processor);

        assert!(!modified);
    }
}
