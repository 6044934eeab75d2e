//! WebAssembly instruction decoding
//!
//! Function bodies are decoded once at load time into a flat instruction
//! list. Structured control instructions carry the positions of their
//! matching `else` and `end`, so an engine can branch without rescanning.

use wlm_error::{Error, Result};
use wlm_format::binary::{self, read_f32, read_f64, read_leb128_i32, read_leb128_i64, read_leb128_s33, read_leb128_u32, read_u8};
use wlm_format::{FuncType, GlobalType, RefType, TableType, ValueType};

/// Type of a structured control block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockType {
    /// No parameters, no results
    Empty,
    /// No parameters, one result
    Value(ValueType),
    /// Parameters and results from a type index
    FuncType(u32),
}

impl BlockType {
    /// Number of values the block consumes on entry.
    pub fn param_count(&self, types: &[FuncType]) -> usize {
        match self {
            Self::FuncType(idx) => types.get(*idx as usize).map_or(0, |ty| ty.params.len()),
            _ => 0,
        }
    }

    /// Number of values the block leaves on exit.
    pub fn result_count(&self, types: &[FuncType]) -> usize {
        match self {
            Self::Empty => 0,
            Self::Value(_) => 1,
            Self::FuncType(idx) => types.get(*idx as usize).map_or(0, |ty| ty.results.len()),
        }
    }
}

/// Immediate of a memory access
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MemArg {
    /// Alignment hint as a power of two
    pub align:  u32,
    /// Static offset added to the dynamic address
    pub offset: u32,
}

/// A decoded WebAssembly instruction
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    // Control
    Unreachable,
    Nop,
    /// `end` is the position of the matching `End`
    Block { ty: BlockType, end: u32 },
    Loop { ty: BlockType },
    /// `else_pos` is the position of the matching `Else`, if any
    If { ty: BlockType, else_pos: Option<u32>, end: u32 },
    /// `end` is the position of the `End` closing the `if`
    Else { end: u32 },
    End,
    Br(u32),
    BrIf(u32),
    BrTable { targets: Box<[u32]>, default: u32 },
    Return,
    Call(u32),
    CallIndirect { type_idx: u32, table: u32 },

    // Parametric
    Drop,
    Select,

    // Variable
    LocalGet(u32),
    LocalSet(u32),
    LocalTee(u32),
    GlobalGet(u32),
    GlobalSet(u32),

    // Memory
    I32Load(MemArg),
    I64Load(MemArg),
    F32Load(MemArg),
    F64Load(MemArg),
    I32Load8S(MemArg),
    I32Load8U(MemArg),
    I32Load16S(MemArg),
    I32Load16U(MemArg),
    I64Load8S(MemArg),
    I64Load8U(MemArg),
    I64Load16S(MemArg),
    I64Load16U(MemArg),
    I64Load32S(MemArg),
    I64Load32U(MemArg),
    I32Store(MemArg),
    I64Store(MemArg),
    F32Store(MemArg),
    F64Store(MemArg),
    I32Store8(MemArg),
    I32Store16(MemArg),
    I64Store8(MemArg),
    I64Store16(MemArg),
    I64Store32(MemArg),
    MemorySize,
    MemoryGrow,
    MemoryCopy,
    MemoryFill,

    // Constants
    I32Const(i32),
    I64Const(i64),
    F32Const(f32),
    F64Const(f64),

    // i32 comparison
    I32Eqz,
    I32Eq,
    I32Ne,
    I32LtS,
    I32LtU,
    I32GtS,
    I32GtU,
    I32LeS,
    I32LeU,
    I32GeS,
    I32GeU,

    // i64 comparison
    I64Eqz,
    I64Eq,
    I64Ne,
    I64LtS,
    I64LtU,
    I64GtS,
    I64GtU,
    I64LeS,
    I64LeU,
    I64GeS,
    I64GeU,

    // float comparison
    F32Eq,
    F32Ne,
    F32Lt,
    F32Gt,
    F32Le,
    F32Ge,
    F64Eq,
    F64Ne,
    F64Lt,
    F64Gt,
    F64Le,
    F64Ge,

    // i32 arithmetic
    I32Clz,
    I32Ctz,
    I32Popcnt,
    I32Add,
    I32Sub,
    I32Mul,
    I32DivS,
    I32DivU,
    I32RemS,
    I32RemU,
    I32And,
    I32Or,
    I32Xor,
    I32Shl,
    I32ShrS,
    I32ShrU,
    I32Rotl,
    I32Rotr,

    // i64 arithmetic
    I64Clz,
    I64Ctz,
    I64Popcnt,
    I64Add,
    I64Sub,
    I64Mul,
    I64DivS,
    I64DivU,
    I64RemS,
    I64RemU,
    I64And,
    I64Or,
    I64Xor,
    I64Shl,
    I64ShrS,
    I64ShrU,
    I64Rotl,
    I64Rotr,

    // f32 arithmetic
    F32Abs,
    F32Neg,
    F32Ceil,
    F32Floor,
    F32Trunc,
    F32Nearest,
    F32Sqrt,
    F32Add,
    F32Sub,
    F32Mul,
    F32Div,
    F32Min,
    F32Max,
    F32Copysign,

    // f64 arithmetic
    F64Abs,
    F64Neg,
    F64Ceil,
    F64Floor,
    F64Trunc,
    F64Nearest,
    F64Sqrt,
    F64Add,
    F64Sub,
    F64Mul,
    F64Div,
    F64Min,
    F64Max,
    F64Copysign,

    // Conversions
    I32WrapI64,
    I32TruncF32S,
    I32TruncF32U,
    I32TruncF64S,
    I32TruncF64U,
    I64ExtendI32S,
    I64ExtendI32U,
    I64TruncF32S,
    I64TruncF32U,
    I64TruncF64S,
    I64TruncF64U,
    F32ConvertI32S,
    F32ConvertI32U,
    F32ConvertI64S,
    F32ConvertI64U,
    F32DemoteF64,
    F64ConvertI32S,
    F64ConvertI32U,
    F64ConvertI64S,
    F64ConvertI64U,
    F64PromoteF32,
    I32ReinterpretF32,
    I64ReinterpretF64,
    F32ReinterpretI32,
    F64ReinterpretI64,

    // Sign extension
    I32Extend8S,
    I32Extend16S,
    I64Extend8S,
    I64Extend16S,
    I64Extend32S,

    // Saturating truncation
    I32TruncSatF32S,
    I32TruncSatF32U,
    I32TruncSatF64S,
    I32TruncSatF64U,
    I64TruncSatF32S,
    I64TruncSatF32U,
    I64TruncSatF64S,
    I64TruncSatF64U,
}

/// Everything a function body may refer to, in module index spaces.
#[derive(Debug, Clone, Copy)]
pub struct BodyContext<'a> {
    /// Type section
    pub types:      &'a [FuncType],
    /// Type index of every function, imported first
    pub functions:  &'a [u32],
    /// Type of every global, imported first
    pub globals:    &'a [GlobalType],
    /// Type of every table, imported first
    pub tables:     &'a [TableType],
    /// Number of memories, imported included
    pub memories:   u32,
    /// Upper bound on declared locals per function
    pub max_locals: u32,
}

/// A decoded function body
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionBody {
    /// Declared locals, parameters excluded
    pub locals: Vec<ValueType>,
    /// Decoded instructions, ending with the function's `End`
    pub code:   Vec<Instruction>,
    /// Offset of the body within the module, for diagnostics
    pub offset: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameKind {
    Function,
    Block,
    Loop,
    If,
}

struct Frame {
    kind:    FrameKind,
    /// Position of the opening instruction
    start:   usize,
    /// Position of the `else` of an `if`
    else_at: Option<usize>,
}

struct BodyDecoder<'a, 'c> {
    bytes:  &'a [u8],
    pos:    usize,
    base:   usize,
    ctx:    &'c BodyContext<'c>,
    locals: usize,
}

impl BodyDecoder<'_, '_> {
    fn err(&self, msg: impl core::fmt::Display) -> Error {
        Error::invalid_module(format!(
            "{msg} in function body at offset 0x{:x}",
            self.base + self.pos
        ))
    }

    fn u8(&mut self) -> Result<u8> {
        let (value, len) = read_u8(self.bytes, self.pos)?;
        self.pos += len;
        Ok(value)
    }

    fn u32(&mut self) -> Result<u32> {
        let (value, len) = read_leb128_u32(self.bytes, self.pos)?;
        self.pos += len;
        Ok(value)
    }

    fn block_type(&mut self) -> Result<BlockType> {
        let byte = *self.bytes.get(self.pos).ok_or_else(|| self.err("truncated block type"))?;
        if byte == binary::BLOCK_TYPE_EMPTY {
            self.pos += 1;
            return Ok(BlockType::Empty);
        }
        if let Ok(ty) = ValueType::from_binary(byte) {
            self.pos += 1;
            return Ok(BlockType::Value(ty));
        }
        let (idx, len) = read_leb128_s33(self.bytes, self.pos)?;
        self.pos += len;
        if idx < 0 || idx as usize >= self.ctx.types.len() {
            return Err(self.err(format!("unknown block type {idx}")));
        }
        Ok(BlockType::FuncType(idx as u32))
    }

    fn mem_arg(&mut self, natural_align: u32) -> Result<MemArg> {
        if self.ctx.memories == 0 {
            return Err(self.err("memory instruction without a memory"));
        }
        let align = self.u32()?;
        let offset = self.u32()?;
        if align > natural_align {
            return Err(self.err(format!("alignment 2^{align} larger than natural 2^{natural_align}")));
        }
        Ok(MemArg { align, offset })
    }

    fn memory_index(&mut self) -> Result<()> {
        if self.ctx.memories == 0 {
            return Err(self.err("memory instruction without a memory"));
        }
        if self.u8()? != 0 {
            return Err(Error::unsupported_feature("multiple memories are not supported"));
        }
        Ok(())
    }

    fn local(&mut self) -> Result<u32> {
        let idx = self.u32()?;
        if idx as usize >= self.locals {
            return Err(self.err(format!("unknown local {idx}")));
        }
        Ok(idx)
    }

    fn global(&mut self) -> Result<u32> {
        let idx = self.u32()?;
        if idx as usize >= self.ctx.globals.len() {
            return Err(self.err(format!("unknown global {idx}")));
        }
        Ok(idx)
    }

    fn label(&mut self, frames: &[Frame]) -> Result<u32> {
        let depth = self.u32()?;
        if depth as usize >= frames.len() {
            return Err(self.err(format!("unknown label {depth}")));
        }
        Ok(depth)
    }
}

/// Decode and structurally validate one function body.
///
/// `bytes` is the body without its size prefix; `offset` is where it starts
/// in the module. Every index the body uses is checked against `ctx`.
pub fn decode_function_body(bytes: &[u8], offset: usize, ty: &FuncType, ctx: &BodyContext<'_>) -> Result<FunctionBody> {
    let mut d = BodyDecoder {
        bytes,
        pos: 0,
        base: offset,
        ctx,
        locals: ty.params.len(),
    };

    let groups = d.u32()?;
    let mut locals = Vec::new();
    let mut total: u64 = 0;
    for _ in 0..groups {
        let count = d.u32()?;
        total += u64::from(count);
        if total > u64::from(ctx.max_locals) {
            return Err(d.err(format!("too many locals ({total} > {})", ctx.max_locals)));
        }
        let ty = ValueType::from_binary(d.u8()?)?;
        locals.extend(core::iter::repeat_n(ty, count as usize));
    }
    d.locals += locals.len();

    let mut code = Vec::new();
    let mut frames = vec![Frame {
        kind:    FrameKind::Function,
        start:   0,
        else_at: None,
    }];

    while !frames.is_empty() {
        let opcode = d.u8()?;
        let here = code.len();
        let instr = match opcode {
            0x00 => Instruction::Unreachable,
            0x01 => Instruction::Nop,
            0x02 | 0x03 | 0x04 => {
                let ty = d.block_type()?;
                let (kind, instr) = match opcode {
                    0x02 => (FrameKind::Block, Instruction::Block { ty, end: 0 }),
                    0x03 => (FrameKind::Loop, Instruction::Loop { ty }),
                    _ => (
                        FrameKind::If,
                        Instruction::If {
                            ty,
                            else_pos: None,
                            end: 0,
                        },
                    ),
                };
                frames.push(Frame {
                    kind,
                    start: here,
                    else_at: None,
                });
                instr
            }
            0x05 => {
                let frame = frames.last_mut().ok_or_else(|| d.err("else outside if"))?;
                if frame.kind != FrameKind::If || frame.else_at.is_some() {
                    return Err(d.err("else without matching if"));
                }
                if let Instruction::If { else_pos, .. } = &mut code[frame.start] {
                    *else_pos = Some(here as u32);
                }
                frame.else_at = Some(here);
                Instruction::Else { end: 0 }
            }
            0x0B => {
                let frame = frames.pop().ok_or_else(|| d.err("unbalanced end"))?;
                match frame.kind {
                    FrameKind::Block => {
                        if let Instruction::Block { end, .. } = &mut code[frame.start] {
                            *end = here as u32;
                        }
                    }
                    FrameKind::If => {
                        if let Instruction::If { end, .. } = &mut code[frame.start] {
                            *end = here as u32;
                        }
                        if let Some(else_at) = frame.else_at {
                            if let Instruction::Else { end } = &mut code[else_at] {
                                *end = here as u32;
                            }
                        }
                    }
                    FrameKind::Loop | FrameKind::Function => {}
                }
                Instruction::End
            }
            0x0C => Instruction::Br(d.label(&frames)?),
            0x0D => Instruction::BrIf(d.label(&frames)?),
            0x0E => {
                let count = d.u32()?;
                if count as usize > bytes.len() {
                    return Err(d.err("br_table target count exceeds body size"));
                }
                let mut targets = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    targets.push(d.label(&frames)?);
                }
                let default = d.label(&frames)?;
                Instruction::BrTable {
                    targets: targets.into_boxed_slice(),
                    default,
                }
            }
            0x0F => Instruction::Return,
            0x10 => {
                let idx = d.u32()?;
                if idx as usize >= ctx.functions.len() {
                    return Err(d.err(format!("unknown function {idx}")));
                }
                Instruction::Call(idx)
            }
            0x11 => {
                let type_idx = d.u32()?;
                let table = d.u32()?;
                if type_idx as usize >= ctx.types.len() {
                    return Err(d.err(format!("unknown type {type_idx}")));
                }
                match ctx.tables.get(table as usize) {
                    Some(t) if t.element_type == RefType::FuncRef => {}
                    Some(_) => return Err(d.err("call_indirect on a table that does not hold funcref")),
                    None => return Err(d.err(format!("unknown table {table}"))),
                }
                Instruction::CallIndirect { type_idx, table }
            }
            0x1A => Instruction::Drop,
            0x1B => Instruction::Select,
            0x1C => {
                let count = d.u32()?;
                if count != 1 {
                    return Err(d.err("typed select must name exactly one type"));
                }
                let ty = ValueType::from_binary(d.u8()?)?;
                if ty.is_reference() {
                    return Err(Error::unsupported_feature("reference typed select is not supported"));
                }
                Instruction::Select
            }
            0x20 => Instruction::LocalGet(d.local()?),
            0x21 => Instruction::LocalSet(d.local()?),
            0x22 => Instruction::LocalTee(d.local()?),
            0x23 => Instruction::GlobalGet(d.global()?),
            0x24 => {
                let idx = d.global()?;
                if !ctx.globals[idx as usize].mutable {
                    return Err(d.err(format!("global.set on immutable global {idx}")));
                }
                Instruction::GlobalSet(idx)
            }
            0x28 => Instruction::I32Load(d.mem_arg(2)?),
            0x29 => Instruction::I64Load(d.mem_arg(3)?),
            0x2A => Instruction::F32Load(d.mem_arg(2)?),
            0x2B => Instruction::F64Load(d.mem_arg(3)?),
            0x2C => Instruction::I32Load8S(d.mem_arg(0)?),
            0x2D => Instruction::I32Load8U(d.mem_arg(0)?),
            0x2E => Instruction::I32Load16S(d.mem_arg(1)?),
            0x2F => Instruction::I32Load16U(d.mem_arg(1)?),
            0x30 => Instruction::I64Load8S(d.mem_arg(0)?),
            0x31 => Instruction::I64Load8U(d.mem_arg(0)?),
            0x32 => Instruction::I64Load16S(d.mem_arg(1)?),
            0x33 => Instruction::I64Load16U(d.mem_arg(1)?),
            0x34 => Instruction::I64Load32S(d.mem_arg(2)?),
            0x35 => Instruction::I64Load32U(d.mem_arg(2)?),
            0x36 => Instruction::I32Store(d.mem_arg(2)?),
            0x37 => Instruction::I64Store(d.mem_arg(3)?),
            0x38 => Instruction::F32Store(d.mem_arg(2)?),
            0x39 => Instruction::F64Store(d.mem_arg(3)?),
            0x3A => Instruction::I32Store8(d.mem_arg(0)?),
            0x3B => Instruction::I32Store16(d.mem_arg(1)?),
            0x3C => Instruction::I64Store8(d.mem_arg(0)?),
            0x3D => Instruction::I64Store16(d.mem_arg(1)?),
            0x3E => Instruction::I64Store32(d.mem_arg(2)?),
            0x3F => {
                d.memory_index()?;
                Instruction::MemorySize
            }
            0x40 => {
                d.memory_index()?;
                Instruction::MemoryGrow
            }
            0x41 => {
                let (value, len) = read_leb128_i32(bytes, d.pos)?;
                d.pos += len;
                Instruction::I32Const(value)
            }
            0x42 => {
                let (value, len) = read_leb128_i64(bytes, d.pos)?;
                d.pos += len;
                Instruction::I64Const(value)
            }
            0x43 => {
                let (value, len) = read_f32(bytes, d.pos)?;
                d.pos += len;
                Instruction::F32Const(value)
            }
            0x44 => {
                let (value, len) = read_f64(bytes, d.pos)?;
                d.pos += len;
                Instruction::F64Const(value)
            }
            0x45..=0xC4 => numeric(opcode).ok_or_else(|| d.err(format!("unknown opcode 0x{opcode:02x}")))?,
            0xFC => {
                let sub = d.u32()?;
                match sub {
                    0 => Instruction::I32TruncSatF32S,
                    1 => Instruction::I32TruncSatF32U,
                    2 => Instruction::I32TruncSatF64S,
                    3 => Instruction::I32TruncSatF64U,
                    4 => Instruction::I64TruncSatF32S,
                    5 => Instruction::I64TruncSatF32U,
                    6 => Instruction::I64TruncSatF64S,
                    7 => Instruction::I64TruncSatF64U,
                    10 => {
                        d.memory_index()?;
                        d.memory_index()?;
                        Instruction::MemoryCopy
                    }
                    11 => {
                        d.memory_index()?;
                        Instruction::MemoryFill
                    }
                    8 | 9 | 12..=17 => {
                        return Err(Error::unsupported_feature(format!(
                            "bulk memory/table instruction 0xfc {sub} is not supported"
                        )));
                    }
                    _ => return Err(d.err(format!("unknown opcode 0xfc {sub}"))),
                }
            }
            0x06..=0x09 | 0x18 | 0x19 => {
                return Err(Error::unsupported_feature("exception handling is not supported"));
            }
            0x12 | 0x13 => return Err(Error::unsupported_feature("tail calls are not supported")),
            0x25 | 0x26 | 0xD0..=0xD2 => {
                return Err(Error::unsupported_feature(
                    "reference instructions in function bodies are not supported",
                ));
            }
            0xFD => return Err(Error::unsupported_feature("SIMD is not supported")),
            0xFE => return Err(Error::unsupported_feature("threads are not supported")),
            other => return Err(d.err(format!("unknown opcode 0x{other:02x}"))),
        };
        code.push(instr);
    }

    if d.pos != bytes.len() {
        return Err(d.err("trailing bytes after function end"));
    }

    Ok(FunctionBody { locals, code, offset })
}

fn numeric(opcode: u8) -> Option<Instruction> {
    use Instruction::*;
    let instr = match opcode {
        0x45 => I32Eqz,
        0x46 => I32Eq,
        0x47 => I32Ne,
        0x48 => I32LtS,
        0x49 => I32LtU,
        0x4A => I32GtS,
        0x4B => I32GtU,
        0x4C => I32LeS,
        0x4D => I32LeU,
        0x4E => I32GeS,
        0x4F => I32GeU,
        0x50 => I64Eqz,
        0x51 => I64Eq,
        0x52 => I64Ne,
        0x53 => I64LtS,
        0x54 => I64LtU,
        0x55 => I64GtS,
        0x56 => I64GtU,
        0x57 => I64LeS,
        0x58 => I64LeU,
        0x59 => I64GeS,
        0x5A => I64GeU,
        0x5B => F32Eq,
        0x5C => F32Ne,
        0x5D => F32Lt,
        0x5E => F32Gt,
        0x5F => F32Le,
        0x60 => F32Ge,
        0x61 => F64Eq,
        0x62 => F64Ne,
        0x63 => F64Lt,
        0x64 => F64Gt,
        0x65 => F64Le,
        0x66 => F64Ge,
        0x67 => I32Clz,
        0x68 => I32Ctz,
        0x69 => I32Popcnt,
        0x6A => I32Add,
        0x6B => I32Sub,
        0x6C => I32Mul,
        0x6D => I32DivS,
        0x6E => I32DivU,
        0x6F => I32RemS,
        0x70 => I32RemU,
        0x71 => I32And,
        0x72 => I32Or,
        0x73 => I32Xor,
        0x74 => I32Shl,
        0x75 => I32ShrS,
        0x76 => I32ShrU,
        0x77 => I32Rotl,
        0x78 => I32Rotr,
        0x79 => I64Clz,
        0x7A => I64Ctz,
        0x7B => I64Popcnt,
        0x7C => I64Add,
        0x7D => I64Sub,
        0x7E => I64Mul,
        0x7F => I64DivS,
        0x80 => I64DivU,
        0x81 => I64RemS,
        0x82 => I64RemU,
        0x83 => I64And,
        0x84 => I64Or,
        0x85 => I64Xor,
        0x86 => I64Shl,
        0x87 => I64ShrS,
        0x88 => I64ShrU,
        0x89 => I64Rotl,
        0x8A => I64Rotr,
        0x8B => F32Abs,
        0x8C => F32Neg,
        0x8D => F32Ceil,
        0x8E => F32Floor,
        0x8F => F32Trunc,
        0x90 => F32Nearest,
        0x91 => F32Sqrt,
        0x92 => F32Add,
        0x93 => F32Sub,
        0x94 => F32Mul,
        0x95 => F32Div,
        0x96 => F32Min,
        0x97 => F32Max,
        0x98 => F32Copysign,
        0x99 => F64Abs,
        0x9A => F64Neg,
        0x9B => F64Ceil,
        0x9C => F64Floor,
        0x9D => F64Trunc,
        0x9E => F64Nearest,
        0x9F => F64Sqrt,
        0xA0 => F64Add,
        0xA1 => F64Sub,
        0xA2 => F64Mul,
        0xA3 => F64Div,
        0xA4 => F64Min,
        0xA5 => F64Max,
        0xA6 => F64Copysign,
        0xA7 => I32WrapI64,
        0xA8 => I32TruncF32S,
        0xA9 => I32TruncF32U,
        0xAA => I32TruncF64S,
        0xAB => I32TruncF64U,
        0xAC => I64ExtendI32S,
        0xAD => I64ExtendI32U,
        0xAE => I64TruncF32S,
        0xAF => I64TruncF32U,
        0xB0 => I64TruncF64S,
        0xB1 => I64TruncF64U,
        0xB2 => F32ConvertI32S,
        0xB3 => F32ConvertI32U,
        0xB4 => F32ConvertI64S,
        0xB5 => F32ConvertI64U,
        0xB6 => F32DemoteF64,
        0xB7 => F64ConvertI32S,
        0xB8 => F64ConvertI32U,
        0xB9 => F64ConvertI64S,
        0xBA => F64ConvertI64U,
        0xBB => F64PromoteF32,
        0xBC => I32ReinterpretF32,
        0xBD => I64ReinterpretF64,
        0xBE => F32ReinterpretI32,
        0xBF => F64ReinterpretI64,
        0xC0 => I32Extend8S,
        0xC1 => I32Extend16S,
        0xC2 => I64Extend8S,
        0xC3 => I64Extend16S,
        0xC4 => I64Extend32S,
        _ => return None,
    };
    Some(instr)
}
