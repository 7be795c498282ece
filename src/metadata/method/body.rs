//! CIL method bodies: header, instructions and exception handling sections.
//!
//! A body starts with either a tiny (1 byte) or a fat (12 byte, 4-byte aligned) header,
//! followed by the IL code. Fat bodies may carry extra data sections after the code, which in
//! practice only hold exception handling clauses.
//!
//! ```text
//! tiny:  [size << 2 | 0x2] [code ...]
//! fat:   [flags|size:u16] [max_stack:u16] [code_size:u32] [local_var_sig:u32] [code ...]
//!        (pad to 4) [kind:u8] [data_size:u8 or u24] [clauses ...]
//! ```
//!
//! # Examples
//!
//! ```rust
//! use cilshred::metadata::method::MethodBody;
//!
//! // tiny body: nop, ldarg.0, ret
//! let body = MethodBody::from(&[0x0E, 0x00, 0x02, 0x2A], 0x2050)?;
//! assert!(!body.is_fat);
//! assert_eq!(body.instructions.len(), 3);
//! assert_eq!(body.span(), 4);
//! # Ok::<(), cilshred::Error>(())
//! ```
//!
//! # References
//! - ECMA-335 6th Edition, Partition II, Section 25.4 - Common Intermediate Language physical layout

use crate::{
    assembly::{decode_stream, encode_stream, IlProcessor, Instruction},
    file::{io::read_le_at, parser::Parser},
    metadata::method::{ExceptionHandler, ExceptionHandlerFlags, MethodBodyFlags, SectionFlags},
    Result,
};

/// Size of a fat method header
pub const FAT_HEADER_SIZE: usize = 12;
/// Largest code size a tiny header can describe
pub const TINY_MAX_CODE_SIZE: usize = 63;
/// Maximum stack depth implied by a tiny header
pub const TINY_MAX_STACK: usize = 8;

const SMALL_CLAUSE_SIZE: usize = 12;
const FAT_CLAUSE_SIZE: usize = 24;
const SECTION_HEADER_SIZE: usize = 4;

/// A decoded method body.
///
/// Besides the decoded content, the body remembers where it came from (`rva` and the number of
/// bytes it occupied, see [`MethodBody::span`]) and whether it has been changed since it was
/// read, so a writer can re-encode only what changed and reuse the old space.
#[derive(Debug, Clone)]
pub struct MethodBody {
    /// Size of the original IL code in bytes
    pub size_code: usize,
    /// Size of the original header in bytes
    pub size_header: usize,
    /// `StandAloneSig` token describing the locals, 0 if there are none
    pub local_var_sig_token: u32,
    /// Maximum number of items on the operand stack
    pub max_stack: usize,
    /// The original header was fat
    pub is_fat: bool,
    /// Locals are zero-initialized
    pub is_init_local: bool,
    /// Exception handling clauses
    pub exception_handlers: Vec<ExceptionHandler>,
    /// The instructions, in code order
    pub instructions: Vec<Instruction>,
    /// RVA the body was read from
    pub rva: u32,
    span: usize,
    modified: bool,
}

impl MethodBody {
    /// Parse the body at the start of `data`, which was found at `rva`
    ///
    /// # Errors
    /// - [`crate::Error::Malformed`] for an unknown header format or invalid instructions
    /// - [`crate::Error::OutOfBounds`] if the header, code or sections exceed `data`
    pub fn from(data: &[u8], rva: u32) -> Result<MethodBody> {
        if data.is_empty() {
            return Err(malformed_error!("Provided data for body parsing is empty"));
        }

        let first_byte = data[0];
        let format = u16::from(first_byte & 0b_0000_0011);

        if format == MethodBodyFlags::TINY_FORMAT.bits() {
            let size_code = usize::from(first_byte >> 2);
            let Some(code) = data.get(1..=size_code) else {
                return Err(out_of_bounds_error!());
            };

            return Ok(MethodBody {
                size_code,
                size_header: 1,
                local_var_sig_token: 0,
                max_stack: TINY_MAX_STACK,
                is_fat: false,
                is_init_local: false,
                exception_handlers: Vec::new(),
                instructions: decode_stream(&mut Parser::new(code))?,
                rva,
                span: 1 + size_code,
                modified: false,
            });
        }

        if format != MethodBodyFlags::FAT_FORMAT.bits() {
            return Err(malformed_error!(
                "MethodHeader is neither FAT nor TINY - {}",
                first_byte
            ));
        }

        if data.len() < FAT_HEADER_SIZE {
            return Err(out_of_bounds_error!());
        }

        let mut offset = 0;
        let first_duo = read_le_at::<u16>(data, &mut offset)?;
        let max_stack = usize::from(read_le_at::<u16>(data, &mut offset)?);
        let size_code = read_le_at::<u32>(data, &mut offset)? as usize;
        let local_var_sig_token = read_le_at::<u32>(data, &mut offset)?;

        let size_header = usize::from(first_duo >> 12) * 4;
        if size_header < FAT_HEADER_SIZE {
            return Err(malformed_error!("Invalid fat header size - {}", size_header));
        }

        let Some(code) = size_header
            .checked_add(size_code)
            .and_then(|end| data.get(size_header..end))
        else {
            return Err(out_of_bounds_error!());
        };

        let flags_header = MethodBodyFlags::from_bits_truncate(first_duo & 0b_0000_1111_1111_1111);
        let mut span = size_header + size_code;

        let mut exception_handlers = Vec::new();
        if flags_header.contains(MethodBodyFlags::MORE_SECTS) {
            span = read_sections(data, align4(span), &mut exception_handlers)?;
        }

        Ok(MethodBody {
            size_code,
            size_header,
            local_var_sig_token,
            max_stack,
            is_fat: true,
            is_init_local: flags_header.contains(MethodBodyFlags::INIT_LOCALS),
            exception_handlers,
            instructions: decode_stream(&mut Parser::new(code))?,
            rva,
            span,
            modified: false,
        })
    }

    /// Size of the original header and code
    #[must_use]
    pub fn size(&self) -> usize {
        self.size_code + self.size_header
    }

    /// Bytes the original body occupied in the image, extra data sections included
    #[must_use]
    pub fn span(&self) -> usize {
        self.span
    }

    /// True once the instructions or auxiliary tables have been changed
    #[must_use]
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Mutation handle over the instruction list
    pub fn processor(&mut self) -> IlProcessor<'_> {
        IlProcessor::new(&mut self.instructions, &mut self.modified)
    }

    /// Drop the exception handlers and locals and reset the stack depth to the tiny default
    pub fn clear_auxiliary(&mut self) {
        self.exception_handlers.clear();
        self.local_var_sig_token = 0;
        self.is_init_local = false;
        self.max_stack = TINY_MAX_STACK;
        self.modified = true;
    }

    /// Size of the current instructions in bytes
    #[must_use]
    pub fn code_size(&self) -> usize {
        self.instructions.iter().map(|i| i.size as usize).sum()
    }

    /// True if the current content can only be encoded with a fat header
    #[must_use]
    pub fn needs_fat_header(&self) -> bool {
        !self.fits_tiny(self.code_size())
    }

    /// Encode the current content, choosing the smallest header that can hold it.
    ///
    /// Fat encodings assume a 4-byte aligned start; the exception section is padded relative
    /// to the first header byte.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if an instruction cannot be encoded or a value
    /// exceeds its header field.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let code = encode_stream(&self.instructions)?;

        if self.fits_tiny(code.len()) {
            let mut out = Vec::with_capacity(code.len() + 1);
            #[allow(clippy::cast_possible_truncation)]
            let header = ((code.len() as u8) << 2) | MethodBodyFlags::TINY_FORMAT.bits() as u8;
            out.push(header);
            out.extend_from_slice(&code);
            return Ok(out);
        }

        let Ok(max_stack) = u16::try_from(self.max_stack) else {
            return Err(malformed_error!("Max stack too large - {}", self.max_stack));
        };
        let Ok(code_size) = u32::try_from(code.len()) else {
            return Err(malformed_error!("Code too large - {}", code.len()));
        };

        let mut flags = MethodBodyFlags::FAT_FORMAT;
        if self.is_init_local {
            flags |= MethodBodyFlags::INIT_LOCALS;
        }
        if !self.exception_handlers.is_empty() {
            flags |= MethodBodyFlags::MORE_SECTS;
        }

        #[allow(clippy::cast_possible_truncation)]
        let first_duo = flags.bits() | ((FAT_HEADER_SIZE / 4) as u16) << 12;

        let mut out = Vec::with_capacity(FAT_HEADER_SIZE + code.len());
        out.extend_from_slice(&first_duo.to_le_bytes());
        out.extend_from_slice(&max_stack.to_le_bytes());
        out.extend_from_slice(&code_size.to_le_bytes());
        out.extend_from_slice(&self.local_var_sig_token.to_le_bytes());
        out.extend_from_slice(&code);

        if !self.exception_handlers.is_empty() {
            out.resize(align4(out.len()), 0);
            self.encode_section(&mut out)?;
        }

        Ok(out)
    }

    fn fits_tiny(&self, code_len: usize) -> bool {
        code_len <= TINY_MAX_CODE_SIZE
            && self.max_stack <= TINY_MAX_STACK
            && self.local_var_sig_token == 0
            && !self.is_init_local
            && self.exception_handlers.is_empty()
    }

    #[allow(clippy::cast_possible_truncation)]
    fn encode_section(&self, out: &mut Vec<u8>) -> Result<()> {
        let handlers = &self.exception_handlers;
        let small_size = SECTION_HEADER_SIZE + handlers.len() * SMALL_CLAUSE_SIZE;

        if small_size <= usize::from(u8::MAX) && handlers.iter().all(ExceptionHandler::fits_small) {
            out.push(SectionFlags::EHTABLE.bits());
            out.push(small_size as u8);
            out.extend_from_slice(&[0, 0]);

            for handler in handlers {
                out.extend_from_slice(&handler.flags.bits().to_le_bytes());
                out.extend_from_slice(&(handler.try_offset as u16).to_le_bytes());
                out.push(handler.try_length as u8);
                out.extend_from_slice(&(handler.handler_offset as u16).to_le_bytes());
                out.push(handler.handler_length as u8);
                out.extend_from_slice(&handler.class_token_or_filter.to_le_bytes());
            }

            return Ok(());
        }

        let fat_size = SECTION_HEADER_SIZE + handlers.len() * FAT_CLAUSE_SIZE;
        let Ok(fat_size) = u32::try_from(fat_size) else {
            return Err(malformed_error!("Too many exception handlers - {}", handlers.len()));
        };
        if fat_size > 0x00FF_FFFF {
            return Err(malformed_error!("Too many exception handlers - {}", handlers.len()));
        }

        out.push((SectionFlags::EHTABLE | SectionFlags::FAT_FORMAT).bits());
        out.extend_from_slice(&fat_size.to_le_bytes()[..3]);

        for handler in handlers {
            out.extend_from_slice(&u32::from(handler.flags.bits()).to_le_bytes());
            out.extend_from_slice(&handler.try_offset.to_le_bytes());
            out.extend_from_slice(&handler.try_length.to_le_bytes());
            out.extend_from_slice(&handler.handler_offset.to_le_bytes());
            out.extend_from_slice(&handler.handler_length.to_le_bytes());
            out.extend_from_slice(&handler.class_token_or_filter.to_le_bytes());
        }

        Ok(())
    }
}

/// Round `value` up to the next multiple of 4
#[must_use]
pub fn align4(value: usize) -> usize {
    (value + 3) & !3
}

/// Read the extra data sections starting at `cursor`, returning the end of the last section
fn read_sections(
    data: &[u8],
    mut cursor: usize,
    exception_handlers: &mut Vec<ExceptionHandler>,
) -> Result<usize> {
    loop {
        if cursor + SECTION_HEADER_SIZE > data.len() {
            return Err(out_of_bounds_error!());
        }

        let section_flags = SectionFlags::from_bits_truncate(data[cursor]);
        let is_fat = section_flags.contains(SectionFlags::FAT_FORMAT);

        let section_size = if is_fat {
            let mut offset = cursor;
            (read_le_at::<u32>(data, &mut offset)? >> 8) as usize
        } else {
            usize::from(data[cursor + 1])
        };

        if section_size < SECTION_HEADER_SIZE || cursor + section_size > data.len() {
            return Err(malformed_error!(
                "Invalid method data section size - {}",
                section_size
            ));
        }

        if section_flags.contains(SectionFlags::EHTABLE) {
            let mut offset = cursor + SECTION_HEADER_SIZE;
            let clause_size = if is_fat {
                FAT_CLAUSE_SIZE
            } else {
                SMALL_CLAUSE_SIZE
            };

            for _ in 0..(section_size - SECTION_HEADER_SIZE) / clause_size {
                exception_handlers.push(if is_fat {
                    read_fat_clause(data, &mut offset)?
                } else {
                    read_small_clause(data, &mut offset)?
                });
            }
        }

        cursor += section_size;
        if !section_flags.contains(SectionFlags::MORE_SECTS) {
            return Ok(cursor);
        }

        cursor = align4(cursor);
    }
}

fn read_small_clause(data: &[u8], offset: &mut usize) -> Result<ExceptionHandler> {
    Ok(ExceptionHandler {
        flags: ExceptionHandlerFlags::from_bits_truncate(read_le_at::<u16>(data, offset)?),
        try_offset: u32::from(read_le_at::<u16>(data, offset)?),
        try_length: u32::from(read_le_at::<u8>(data, offset)?),
        handler_offset: u32::from(read_le_at::<u16>(data, offset)?),
        handler_length: u32::from(read_le_at::<u8>(data, offset)?),
        class_token_or_filter: read_le_at::<u32>(data, offset)?,
    })
}

fn read_fat_clause(data: &[u8], offset: &mut usize) -> Result<ExceptionHandler> {
    #[allow(clippy::cast_possible_truncation)]
    let flags = read_le_at::<u32>(data, offset)? as u16;

    Ok(ExceptionHandler {
        flags: ExceptionHandlerFlags::from_bits_truncate(flags),
        try_offset: read_le_at::<u32>(data, offset)?,
        try_length: read_le_at::<u32>(data, offset)?,
        handler_offset: read_le_at::<u32>(data, offset)?,
        handler_length: read_le_at::<u32>(data, offset)?,
        class_token_or_filter: read_le_at::<u32>(data, offset)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembly::OpCode;

    #[rustfmt::skip]
    const FAT_SMALL_EH: [u8; 40] = [
        0x1B, 0x30,             // flags: fat, more sections, init locals, header size 3
        0x02, 0x00,             // max stack
        0x0A, 0x00, 0x00, 0x00, // code size
        0x01, 0x00, 0x00, 0x11, // local var sig
        0x00,                   // nop
        0x14,                   // ldnull
        0x7A,                   // throw
        0xDE, 0x03,             // leave.s
        0x26,                   // pop
        0xDE, 0x00,             // leave.s
        0x00,                   // nop
        0x2A,                   // ret
        0x00, 0x00,             // padding
        0x01, 0x10, 0x00, 0x00, // small EH section, 16 bytes
        0x00, 0x00,             // catch
        0x00, 0x00, 0x05,       // try 0, 5
        0x05, 0x00, 0x03,       // handler 5, 3
        0x01, 0x00, 0x00, 0x01, // TypeRef 1
    ];

    #[rustfmt::skip]
    const FAT_FAT_EH: [u8; 68] = [
        0x0B, 0x30,             // flags: fat, more sections
        0x01, 0x00,             // max stack
        0x04, 0x00, 0x00, 0x00, // code size
        0x00, 0x00, 0x00, 0x00, // no locals
        0x00, 0x00, 0x00, 0x2A, // nop, nop, nop, ret
        0x41, 0x34, 0x00, 0x00, // fat EH section, 52 bytes
        0x02, 0x00, 0x00, 0x00, // finally
        0x00, 0x00, 0x00, 0x00,
        0x01, 0x00, 0x00, 0x00,
        0x01, 0x00, 0x00, 0x00,
        0x01, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00,
        0x01, 0x00, 0x00, 0x00, // filter
        0x00, 0x00, 0x00, 0x00,
        0x02, 0x00, 0x00, 0x00,
        0x03, 0x00, 0x00, 0x00,
        0x01, 0x00, 0x00, 0x00,
        0x02, 0x00, 0x00, 0x00,
    ];

    #[test]
    fn tiny() {
        let data = [0x0E, 0x00, 0x02, 0x2A, 0xFF, 0xFF];

        let body = MethodBody::from(&data, 0x2050).unwrap();

        assert!(!body.is_fat);
        assert!(!body.is_init_local);
        assert!(!body.is_modified());
        assert_eq!(body.rva, 0x2050);
        assert_eq!(body.max_stack, 8);
        assert_eq!(body.size_code, 3);
        assert_eq!(body.size_header, 1);
        assert_eq!(body.size(), 4);
        assert_eq!(body.span(), 4);
        assert_eq!(body.local_var_sig_token, 0);
        assert_eq!(body.instructions.len(), 3);
        assert_eq!(body.instructions[1].mnemonic, "ldarg.0");
    }

    #[test]
    fn fat_small_section() {
        let body = MethodBody::from(&FAT_SMALL_EH, 0x2000).unwrap();

        assert!(body.is_fat);
        assert!(body.is_init_local);
        assert_eq!(body.max_stack, 2);
        assert_eq!(body.size_code, 10);
        assert_eq!(body.size_header, 12);
        assert_eq!(body.size(), 22);
        assert_eq!(body.span(), 40);
        assert_eq!(body.local_var_sig_token, 0x1100_0001);
        assert_eq!(body.instructions.len(), 8);
        assert_eq!(body.code_size(), 10);

        assert_eq!(body.exception_handlers.len(), 1);
        let handler = &body.exception_handlers[0];
        assert_eq!(handler.flags, ExceptionHandlerFlags::EXCEPTION);
        assert_eq!(handler.try_offset, 0);
        assert_eq!(handler.try_length, 5);
        assert_eq!(handler.handler_offset, 5);
        assert_eq!(handler.handler_length, 3);
        assert_eq!(handler.class_token_or_filter, 0x0100_0001);
    }

    #[test]
    fn fat_fat_section() {
        let body = MethodBody::from(&FAT_FAT_EH, 0x2000).unwrap();

        assert!(body.is_fat);
        assert!(!body.is_init_local);
        assert_eq!(body.span(), 68);
        assert_eq!(body.exception_handlers.len(), 2);
        assert!(body.exception_handlers[0]
            .flags
            .contains(ExceptionHandlerFlags::FINALLY));
        assert!(body.exception_handlers[1]
            .flags
            .contains(ExceptionHandlerFlags::FILTER));
        assert_eq!(body.exception_handlers[1].handler_offset, 3);
        assert_eq!(body.exception_handlers[1].class_token_or_filter, 2);
    }

    #[test]
    fn skips_unknown_sections() {
        #[rustfmt::skip]
        let data = [
            0x0B, 0x30, 0x01, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x2A, 0x00, 0x00, 0x00,
            0x82, 0x04, 0x00, 0x00, // OptIL table, more sections follow
            0x01, 0x10, 0x00, 0x00, // small EH section
            0x02, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        ];

        let body = MethodBody::from(&data, 0x2000).unwrap();

        assert_eq!(body.exception_handlers.len(), 1);
        assert_eq!(body.span(), data.len());
    }

    #[test]
    fn invalid() {
        assert!(MethodBody::from(&[], 0).is_err());
        // neither tiny nor fat
        assert!(MethodBody::from(&[0x00, 0x2A], 0).is_err());
        // tiny, code cut short
        assert!(MethodBody::from(&[0x0E, 0x00], 0).is_err());
        // fat, header cut short
        assert!(MethodBody::from(&FAT_SMALL_EH[..10], 0).is_err());
        // fat, section missing
        assert!(MethodBody::from(&FAT_SMALL_EH[..24], 0).is_err());
        // fat, section larger than the data
        assert!(MethodBody::from(&FAT_FAT_EH[..60], 0).is_err());
        // reserved opcode
        assert!(MethodBody::from(&[0x06, 0x24], 0).is_err());
    }

    #[test]
    fn encode_canonical() {
        let body = MethodBody::from(&FAT_SMALL_EH, 0x2000).unwrap();
        assert!(body.needs_fat_header());
        assert_eq!(body.encode().unwrap(), FAT_SMALL_EH.to_vec());

        let body = MethodBody::from(&FAT_FAT_EH, 0x2000).unwrap();
        // the clauses fit a small section
        let encoded = body.encode().unwrap();
        assert_eq!(encoded.len(), 16 + 4 + 2 * 12);
        assert_eq!(encoded[16], 0x01);

        let reread = MethodBody::from(&encoded, 0x2000).unwrap();
        assert_eq!(reread.exception_handlers, body.exception_handlers);
    }

    #[test]
    fn encode_large_clauses_fat() {
        let mut body = MethodBody::from(&FAT_FAT_EH, 0x2000).unwrap();
        body.exception_handlers[0].try_length = 0x1000;

        let encoded = body.encode().unwrap();
        assert_eq!(encoded[16], 0x41);
        assert_eq!(encoded.len(), 16 + 4 + 2 * 24);
    }

    #[test]
    fn shrink_to_tiny() {
        let mut body = MethodBody::from(&FAT_SMALL_EH, 0x2000).unwrap();

        let mut processor = body.processor();
        while let Some(last) = processor.len().checked_sub(1) {
            processor.remove(last);
        }
        let nop = processor.create(OpCode::NOP).unwrap();
        processor.append(nop);
        let ret = processor.create(OpCode::RET).unwrap();
        processor.append(ret);

        assert!(body.is_modified());
        // locals and handlers still force a fat header
        assert!(body.needs_fat_header());
        assert_eq!(body.encode().unwrap().len(), 12 + 2 + 2 + 16);

        body.clear_auxiliary();
        assert!(!body.needs_fat_header());
        assert_eq!(body.encode().unwrap(), vec![0x0A, 0x00, 0x2A]);
    }
}
