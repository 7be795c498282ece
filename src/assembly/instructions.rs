//! Static opcode tables of the CIL instruction set (ECMA-335 Partition III).
//!
//! Single byte opcodes are looked up in [`INSTRUCTIONS`], opcodes following the `0xFE` prefix
//! in [`INSTRUCTIONS_FE`]. Reserved slots carry an empty mnemonic.

use crate::assembly::{FlowType, OperandType};

/// Static description of one opcode
#[derive(Debug, Clone, Copy)]
pub struct CilInstruction {
    /// Mnemonic, empty for reserved opcodes
    pub instr: &'static str,
    /// Kind of the inline operand
    pub op_type: OperandType,
    /// How the instruction transfers control
    pub flow: FlowType,
}

impl CilInstruction {
    /// True for unassigned opcode slots
    #[must_use]
    pub fn is_reserved(&self) -> bool {
        self.instr.is_empty()
    }
}

const fn op(instr: &'static str, op_type: OperandType, flow: FlowType) -> CilInstruction {
    CilInstruction {
        instr,
        op_type,
        flow,
    }
}

const RESERVED: CilInstruction = op("", OperandType::None, FlowType::Sequential);

/// Single byte opcodes 0x00 - 0xE0, indexed by the opcode byte
pub static INSTRUCTIONS: [CilInstruction; 225] = [
    op("nop", OperandType::None, FlowType::Sequential), // 0x00
    op("break", OperandType::None, FlowType::Sequential), // 0x01
    op("ldarg.0", OperandType::None, FlowType::Sequential), // 0x02
    op("ldarg.1", OperandType::None, FlowType::Sequential), // 0x03
    op("ldarg.2", OperandType::None, FlowType::Sequential), // 0x04
    op("ldarg.3", OperandType::None, FlowType::Sequential), // 0x05
    op("ldloc.0", OperandType::None, FlowType::Sequential), // 0x06
    op("ldloc.1", OperandType::None, FlowType::Sequential), // 0x07
    op("ldloc.2", OperandType::None, FlowType::Sequential), // 0x08
    op("ldloc.3", OperandType::None, FlowType::Sequential), // 0x09
    op("stloc.0", OperandType::None, FlowType::Sequential), // 0x0A
    op("stloc.1", OperandType::None, FlowType::Sequential), // 0x0B
    op("stloc.2", OperandType::None, FlowType::Sequential), // 0x0C
    op("stloc.3", OperandType::None, FlowType::Sequential), // 0x0D
    op("ldarg.s", OperandType::UInt8, FlowType::Sequential), // 0x0E
    op("ldarga.s", OperandType::UInt8, FlowType::Sequential), // 0x0F
    op("starg.s", OperandType::UInt8, FlowType::Sequential), // 0x10
    op("ldloc.s", OperandType::UInt8, FlowType::Sequential), // 0x11
    op("ldloca.s", OperandType::UInt8, FlowType::Sequential), // 0x12
    op("stloc.s", OperandType::UInt8, FlowType::Sequential), // 0x13
    op("ldnull", OperandType::None, FlowType::Sequential), // 0x14
    op("ldc.i4.m1", OperandType::None, FlowType::Sequential), // 0x15
    op("ldc.i4.0", OperandType::None, FlowType::Sequential), // 0x16
    op("ldc.i4.1", OperandType::None, FlowType::Sequential), // 0x17
    op("ldc.i4.2", OperandType::None, FlowType::Sequential), // 0x18
    op("ldc.i4.3", OperandType::None, FlowType::Sequential), // 0x19
    op("ldc.i4.4", OperandType::None, FlowType::Sequential), // 0x1A
    op("ldc.i4.5", OperandType::None, FlowType::Sequential), // 0x1B
    op("ldc.i4.6", OperandType::None, FlowType::Sequential), // 0x1C
    op("ldc.i4.7", OperandType::None, FlowType::Sequential), // 0x1D
    op("ldc.i4.8", OperandType::None, FlowType::Sequential), // 0x1E
    op("ldc.i4.s", OperandType::Int8, FlowType::Sequential), // 0x1F
    op("ldc.i4", OperandType::Int32, FlowType::Sequential), // 0x20
    op("ldc.i8", OperandType::Int64, FlowType::Sequential), // 0x21
    op("ldc.r4", OperandType::Float32, FlowType::Sequential), // 0x22
    op("ldc.r8", OperandType::Float64, FlowType::Sequential), // 0x23
    RESERVED, // 0x24
    op("dup", OperandType::None, FlowType::Sequential), // 0x25
    op("pop", OperandType::None, FlowType::Sequential), // 0x26
    op("jmp", OperandType::Token, FlowType::Call), // 0x27
    op("call", OperandType::Token, FlowType::Call), // 0x28
    op("calli", OperandType::Token, FlowType::Call), // 0x29
    op("ret", OperandType::None, FlowType::Return), // 0x2A
    op("br.s", OperandType::Int8, FlowType::UnconditionalBranch), // 0x2B
    op("brfalse.s", OperandType::Int8, FlowType::ConditionalBranch), // 0x2C
    op("brtrue.s", OperandType::Int8, FlowType::ConditionalBranch), // 0x2D
    op("beq.s", OperandType::Int8, FlowType::ConditionalBranch), // 0x2E
    op("bge.s", OperandType::Int8, FlowType::ConditionalBranch), // 0x2F
    op("bgt.s", OperandType::Int8, FlowType::ConditionalBranch), // 0x30
    op("ble.s", OperandType::Int8, FlowType::ConditionalBranch), // 0x31
    op("blt.s", OperandType::Int8, FlowType::ConditionalBranch), // 0x32
    op("bne.un.s", OperandType::Int8, FlowType::ConditionalBranch), // 0x33
    op("bge.un.s", OperandType::Int8, FlowType::ConditionalBranch), // 0x34
    op("bgt.un.s", OperandType::Int8, FlowType::ConditionalBranch), // 0x35
    op("ble.un.s", OperandType::Int8, FlowType::ConditionalBranch), // 0x36
    op("blt.un.s", OperandType::Int8, FlowType::ConditionalBranch), // 0x37
    op("br", OperandType::Int32, FlowType::UnconditionalBranch), // 0x38
    op("brfalse", OperandType::Int32, FlowType::ConditionalBranch), // 0x39
    op("brtrue", OperandType::Int32, FlowType::ConditionalBranch), // 0x3A
    op("beq", OperandType::Int32, FlowType::ConditionalBranch), // 0x3B
    op("bge", OperandType::Int32, FlowType::ConditionalBranch), // 0x3C
    op("bgt", OperandType::Int32, FlowType::ConditionalBranch), // 0x3D
    op("ble", OperandType::Int32, FlowType::ConditionalBranch), // 0x3E
    op("blt", OperandType::Int32, FlowType::ConditionalBranch), // 0x3F
    op("bne.un", OperandType::Int32, FlowType::ConditionalBranch), // 0x40
    op("bge.un", OperandType::Int32, FlowType::ConditionalBranch), // 0x41
    op("bgt.un", OperandType::Int32, FlowType::ConditionalBranch), // 0x42
    op("ble.un", OperandType::Int32, FlowType::ConditionalBranch), // 0x43
    op("blt.un", OperandType::Int32, FlowType::ConditionalBranch), // 0x44
    op("switch", OperandType::Switch, FlowType::Switch), // 0x45
    op("ldind.i1", OperandType::None, FlowType::Sequential), // 0x46
    op("ldind.u1", OperandType::None, FlowType::Sequential), // 0x47
    op("ldind.i2", OperandType::None, FlowType::Sequential), // 0x48
    op("ldind.u2", OperandType::None, FlowType::Sequential), // 0x49
    op("ldind.i4", OperandType::None, FlowType::Sequential), // 0x4A
    op("ldind.u4", OperandType::None, FlowType::Sequential), // 0x4B
    op("ldind.i8", OperandType::None, FlowType::Sequential), // 0x4C
    op("ldind.i", OperandType::None, FlowType::Sequential), // 0x4D
    op("ldind.r4", OperandType::None, FlowType::Sequential), // 0x4E
    op("ldind.r8", OperandType::None, FlowType::Sequential), // 0x4F
    op("ldind.ref", OperandType::None, FlowType::Sequential), // 0x50
    op("stind.ref", OperandType::None, FlowType::Sequential), // 0x51
    op("stind.i1", OperandType::None, FlowType::Sequential), // 0x52
    op("stind.i2", OperandType::None, FlowType::Sequential), // 0x53
    op("stind.i4", OperandType::None, FlowType::Sequential), // 0x54
    op("stind.i8", OperandType::None, FlowType::Sequential), // 0x55
    op("stind.r4", OperandType::None, FlowType::Sequential), // 0x56
    op("stind.r8", OperandType::None, FlowType::Sequential), // 0x57
    op("add", OperandType::None, FlowType::Sequential), // 0x58
    op("sub", OperandType::None, FlowType::Sequential), // 0x59
    op("mul", OperandType::None, FlowType::Sequential), // 0x5A
    op("div", OperandType::None, FlowType::Sequential), // 0x5B
    op("div.un", OperandType::None, FlowType::Sequential), // 0x5C
    op("rem", OperandType::None, FlowType::Sequential), // 0x5D
    op("rem.un", OperandType::None, FlowType::Sequential), // 0x5E
    op("and", OperandType::None, FlowType::Sequential), // 0x5F
    op("or", OperandType::None, FlowType::Sequential), // 0x60
    op("xor", OperandType::None, FlowType::Sequential), // 0x61
    op("shl", OperandType::None, FlowType::Sequential), // 0x62
    op("shr", OperandType::None, FlowType::Sequential), // 0x63
    op("shr.un", OperandType::None, FlowType::Sequential), // 0x64
    op("neg", OperandType::None, FlowType::Sequential), // 0x65
    op("not", OperandType::None, FlowType::Sequential), // 0x66
    op("conv.i1", OperandType::None, FlowType::Sequential), // 0x67
    op("conv.i2", OperandType::None, FlowType::Sequential), // 0x68
    op("conv.i4", OperandType::None, FlowType::Sequential), // 0x69
    op("conv.i8", OperandType::None, FlowType::Sequential), // 0x6A
    op("conv.r4", OperandType::None, FlowType::Sequential), // 0x6B
    op("conv.r8", OperandType::None, FlowType::Sequential), // 0x6C
    op("conv.u4", OperandType::None, FlowType::Sequential), // 0x6D
    op("conv.u8", OperandType::None, FlowType::Sequential), // 0x6E
    op("callvirt", OperandType::Token, FlowType::Call), // 0x6F
    op("cpobj", OperandType::Token, FlowType::Sequential), // 0x70
    op("ldobj", OperandType::Token, FlowType::Sequential), // 0x71
    op("ldstr", OperandType::Token, FlowType::Sequential), // 0x72
    op("newobj", OperandType::Token, FlowType::Call), // 0x73
    op("castclass", OperandType::Token, FlowType::Sequential), // 0x74
    op("isinst", OperandType::Token, FlowType::Sequential), // 0x75
    op("conv.r.un", OperandType::None, FlowType::Sequential), // 0x76
    RESERVED, // 0x77
    RESERVED, // 0x78
    op("unbox", OperandType::Token, FlowType::Sequential), // 0x79
    op("throw", OperandType::None, FlowType::Throw), // 0x7A
    op("ldfld", OperandType::Token, FlowType::Sequential), // 0x7B
    op("ldflda", OperandType::Token, FlowType::Sequential), // 0x7C
    op("stfld", OperandType::Token, FlowType::Sequential), // 0x7D
    op("ldsfld", OperandType::Token, FlowType::Sequential), // 0x7E
    op("ldsflda", OperandType::Token, FlowType::Sequential), // 0x7F
    op("stsfld", OperandType::Token, FlowType::Sequential), // 0x80
    op("stobj", OperandType::Token, FlowType::Sequential), // 0x81
    op("conv.ovf.i1.un", OperandType::None, FlowType::Sequential), // 0x82
    op("conv.ovf.i2.un", OperandType::None, FlowType::Sequential), // 0x83
    op("conv.ovf.i4.un", OperandType::None, FlowType::Sequential), // 0x84
    op("conv.ovf.i8.un", OperandType::None, FlowType::Sequential), // 0x85
    op("conv.ovf.u1.un", OperandType::None, FlowType::Sequential), // 0x86
    op("conv.ovf.u2.un", OperandType::None, FlowType::Sequential), // 0x87
    op("conv.ovf.u4.un", OperandType::None, FlowType::Sequential), // 0x88
    op("conv.ovf.u8.un", OperandType::None, FlowType::Sequential), // 0x89
    op("conv.ovf.i.un", OperandType::None, FlowType::Sequential), // 0x8A
    op("conv.ovf.u.un", OperandType::None, FlowType::Sequential), // 0x8B
    op("box", OperandType::Token, FlowType::Sequential), // 0x8C
    op("newarr", OperandType::Token, FlowType::Sequential), // 0x8D
    op("ldlen", OperandType::None, FlowType::Sequential), // 0x8E
    op("ldelema", OperandType::Token, FlowType::Sequential), // 0x8F
    op("ldelem.i1", OperandType::None, FlowType::Sequential), // 0x90
    op("ldelem.u1", OperandType::None, FlowType::Sequential), // 0x91
    op("ldelem.i2", OperandType::None, FlowType::Sequential), // 0x92
    op("ldelem.u2", OperandType::None, FlowType::Sequential), // 0x93
    op("ldelem.i4", OperandType::None, FlowType::Sequential), // 0x94
    op("ldelem.u4", OperandType::None, FlowType::Sequential), // 0x95
    op("ldelem.i8", OperandType::None, FlowType::Sequential), // 0x96
    op("ldelem.i", OperandType::None, FlowType::Sequential), // 0x97
    op("ldelem.r4", OperandType::None, FlowType::Sequential), // 0x98
    op("ldelem.r8", OperandType::None, FlowType::Sequential), // 0x99
    op("ldelem.ref", OperandType::None, FlowType::Sequential), // 0x9A
    op("stelem.i", OperandType::None, FlowType::Sequential), // 0x9B
    op("stelem.i1", OperandType::None, FlowType::Sequential), // 0x9C
    op("stelem.i2", OperandType::None, FlowType::Sequential), // 0x9D
    op("stelem.i4", OperandType::None, FlowType::Sequential), // 0x9E
    op("stelem.i8", OperandType::None, FlowType::Sequential), // 0x9F
    op("stelem.r4", OperandType::None, FlowType::Sequential), // 0xA0
    op("stelem.r8", OperandType::None, FlowType::Sequential), // 0xA1
    op("stelem.ref", OperandType::None, FlowType::Sequential), // 0xA2
    op("ldelem", OperandType::Token, FlowType::Sequential), // 0xA3
    op("stelem", OperandType::Token, FlowType::Sequential), // 0xA4
    op("unbox.any", OperandType::Token, FlowType::Sequential), // 0xA5
    RESERVED, // 0xA6
    RESERVED, // 0xA7
    RESERVED, // 0xA8
    RESERVED, // 0xA9
    RESERVED, // 0xAA
    RESERVED, // 0xAB
    RESERVED, // 0xAC
    RESERVED, // 0xAD
    RESERVED, // 0xAE
    RESERVED, // 0xAF
    RESERVED, // 0xB0
    RESERVED, // 0xB1
    RESERVED, // 0xB2
    op("conv.ovf.i1", OperandType::None, FlowType::Sequential), // 0xB3
    op("conv.ovf.u1", OperandType::None, FlowType::Sequential), // 0xB4
    op("conv.ovf.i2", OperandType::None, FlowType::Sequential), // 0xB5
    op("conv.ovf.u2", OperandType::None, FlowType::Sequential), // 0xB6
    op("conv.ovf.i4", OperandType::None, FlowType::Sequential), // 0xB7
    op("conv.ovf.u4", OperandType::None, FlowType::Sequential), // 0xB8
    op("conv.ovf.i8", OperandType::None, FlowType::Sequential), // 0xB9
    op("conv.ovf.u8", OperandType::None, FlowType::Sequential), // 0xBA
    RESERVED, // 0xBB
    RESERVED, // 0xBC
    RESERVED, // 0xBD
    RESERVED, // 0xBE
    RESERVED, // 0xBF
    RESERVED, // 0xC0
    RESERVED, // 0xC1
    op("refanyval", OperandType::Token, FlowType::Sequential), // 0xC2
    op("ckfinite", OperandType::None, FlowType::Sequential), // 0xC3
    RESERVED, // 0xC4
    RESERVED, // 0xC5
    op("mkrefany", OperandType::Token, FlowType::Sequential), // 0xC6
    RESERVED, // 0xC7
    RESERVED, // 0xC8
    RESERVED, // 0xC9
    RESERVED, // 0xCA
    RESERVED, // 0xCB
    RESERVED, // 0xCC
    RESERVED, // 0xCD
    RESERVED, // 0xCE
    RESERVED, // 0xCF
    op("ldtoken", OperandType::Token, FlowType::Sequential), // 0xD0
    op("conv.u2", OperandType::None, FlowType::Sequential), // 0xD1
    op("conv.u1", OperandType::None, FlowType::Sequential), // 0xD2
    op("conv.i", OperandType::None, FlowType::Sequential), // 0xD3
    op("conv.ovf.i", OperandType::None, FlowType::Sequential), // 0xD4
    op("conv.ovf.u", OperandType::None, FlowType::Sequential), // 0xD5
    op("add.ovf", OperandType::None, FlowType::Sequential), // 0xD6
    op("add.ovf.un", OperandType::None, FlowType::Sequential), // 0xD7
    op("mul.ovf", OperandType::None, FlowType::Sequential), // 0xD8
    op("mul.ovf.un", OperandType::None, FlowType::Sequential), // 0xD9
    op("sub.ovf", OperandType::None, FlowType::Sequential), // 0xDA
    op("sub.ovf.un", OperandType::None, FlowType::Sequential), // 0xDB
    op("endfinally", OperandType::None, FlowType::EndFinally), // 0xDC
    op("leave", OperandType::Int32, FlowType::Leave), // 0xDD
    op("leave.s", OperandType::Int8, FlowType::Leave), // 0xDE
    op("stind.i", OperandType::None, FlowType::Sequential), // 0xDF
    op("conv.u", OperandType::None, FlowType::Sequential), // 0xE0
];

/// Two byte opcodes 0xFE 0x00 - 0xFE 0x1E, indexed by the second byte
pub static INSTRUCTIONS_FE: [CilInstruction; 31] = [
    op("arglist", OperandType::None, FlowType::Sequential), // 0xFE 00
    op("ceq", OperandType::None, FlowType::Sequential), // 0xFE 01
    op("cgt", OperandType::None, FlowType::Sequential), // 0xFE 02
    op("cgt.un", OperandType::None, FlowType::Sequential), // 0xFE 03
    op("clt", OperandType::None, FlowType::Sequential), // 0xFE 04
    op("clt.un", OperandType::None, FlowType::Sequential), // 0xFE 05
    op("ldftn", OperandType::Token, FlowType::Sequential), // 0xFE 06
    op("ldvirtftn", OperandType::Token, FlowType::Sequential), // 0xFE 07
    RESERVED, // 0xFE 08
    op("ldarg", OperandType::UInt16, FlowType::Sequential), // 0xFE 09
    op("ldarga", OperandType::UInt16, FlowType::Sequential), // 0xFE 0A
    op("starg", OperandType::UInt16, FlowType::Sequential), // 0xFE 0B
    op("ldloc", OperandType::UInt16, FlowType::Sequential), // 0xFE 0C
    op("ldloca", OperandType::UInt16, FlowType::Sequential), // 0xFE 0D
    op("stloc", OperandType::UInt16, FlowType::Sequential), // 0xFE 0E
    op("localloc", OperandType::None, FlowType::Sequential), // 0xFE 0F
    RESERVED, // 0xFE 10
    op("endfilter", OperandType::None, FlowType::EndFilter), // 0xFE 11
    op("unaligned.", OperandType::UInt8, FlowType::Meta), // 0xFE 12
    op("volatile.", OperandType::None, FlowType::Meta), // 0xFE 13
    op("tail.", OperandType::None, FlowType::Meta), // 0xFE 14
    op("initobj", OperandType::Token, FlowType::Sequential), // 0xFE 15
    op("constrained.", OperandType::Token, FlowType::Meta), // 0xFE 16
    op("cpblk", OperandType::None, FlowType::Sequential), // 0xFE 17
    op("initblk", OperandType::None, FlowType::Sequential), // 0xFE 18
    op("no.", OperandType::UInt8, FlowType::Meta), // 0xFE 19
    op("rethrow", OperandType::None, FlowType::Throw), // 0xFE 1A
    RESERVED, // 0xFE 1B
    op("sizeof", OperandType::Token, FlowType::Sequential), // 0xFE 1C
    op("refanytype", OperandType::None, FlowType::Sequential), // 0xFE 1D
    op("readonly.", OperandType::None, FlowType::Meta), // 0xFE 1E
];
