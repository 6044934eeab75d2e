//! The instruction loop.

use std::sync::Arc;

use wlm_decoder::{BlockType, Instruction, MemArg, Module};
use wlm_format::Value;

use super::{call_func_ref, numeric};
use crate::engine::{EngineError, EngineResult, ExecutionContext};
use crate::externals::SharedMemory;
use crate::func::{FuncRef, Function};
use crate::instance::InstanceCore;
use crate::trap::{Trap, TrapKind};

macro_rules! unary {
    ($m:expr, $pop:ident, $wrap:ident, |$a:ident| $body:expr) => {{
        let $a = $m.$pop()?;
        $m.stack.push(Value::$wrap($body));
    }};
}

macro_rules! binary {
    ($m:expr, $pop:ident, $wrap:ident, |$a:ident, $b:ident| $body:expr) => {{
        let $b = $m.$pop()?;
        let $a = $m.$pop()?;
        $m.stack.push(Value::$wrap($body));
    }};
}

macro_rules! load {
    ($m:expr, $arg:expr, $n:literal, $wrap:ident, |$bytes:ident| $conv:expr) => {{
        let addr = $m.effective_address($arg)?;
        let $bytes = $m.memory()?.lock().load::<$n>(addr)?;
        $m.stack.push(Value::$wrap($conv));
    }};
}

macro_rules! store {
    ($m:expr, $arg:expr, $pop:ident, |$v:ident| $bytes:expr) => {{
        let $v = $m.$pop()?;
        let addr = $m.effective_address($arg)?;
        $m.memory()?.lock().write(addr, &$bytes)?;
    }};
}

macro_rules! typed_pop {
    ($name:ident, $variant:ident, $ty:ty) => {
        fn $name(&mut self) -> EngineResult<$ty> {
            match self.pop()? {
                Value::$variant(v) => Ok(v),
                other => Err(EngineError::fault(format!(
                    "expected {} on the value stack, found {}",
                    stringify!($variant),
                    other.value_type()
                ))),
            }
        }
    };
}

#[derive(Debug, Clone, Copy)]
struct Label {
    /// Values carried by a branch to this label
    arity:   usize,
    /// Stack height below the block's parameters
    height:  usize,
    /// Where a branch continues
    target:  usize,
    is_loop: bool,
}

struct Frame<'a> {
    func:        u32,
    code:        &'a [Instruction],
    pc:          usize,
    locals:      Vec<Value>,
    stack_base:  usize,
    labels_base: usize,
    arity:       usize,
}

/// Runs functions of one instance to completion
pub(super) struct Machine<'a, 'c> {
    instance: &'a Arc<InstanceCore>,
    module:   &'a Module,
    ctx:      &'c mut ExecutionContext,
    stack:    Vec<Value>,
    frames:   Vec<Frame<'a>>,
    labels:   Vec<Label>,
}

impl<'a, 'c> Machine<'a, 'c> {
    pub(super) fn new(instance: &'a Arc<InstanceCore>, ctx: &'c mut ExecutionContext) -> Self {
        Self {
            instance,
            module: instance.module(),
            ctx,
            stack: Vec::new(),
            frames: Vec::new(),
            labels: Vec::new(),
        }
    }

    /// Run function `func` with `args` and return its results.
    pub(super) fn run(mut self, func: u32, args: &[Value]) -> EngineResult<Vec<Value>> {
        self.stack.extend_from_slice(args);
        let result = self.enter(func).and_then(|()| self.execute());
        if result.is_err() {
            for _ in 0..self.frames.len() {
                self.ctx.pop_call();
            }
        }
        result.map(|()| self.stack)
    }

    fn execute(&mut self) -> EngineResult<()> {
        while let Some(frame) = self.frames.last() {
            let (code, pc, func) = (frame.code, frame.pc, frame.func);
            let instr = code
                .get(pc)
                .ok_or_else(|| EngineError::fault(format!("function {func} ran past its end")))?;
            self.ctx
                .consume_fuel()
                .and_then(|()| self.step(instr, pc))
                .map_err(|err| match err {
                    EngineError::Trap(trap) => EngineError::Trap(trap.at(func, pc)),
                    other => other,
                })?;
        }
        Ok(())
    }

    fn enter(&mut self, func: u32) -> EngineResult<()> {
        let imported = self.instance.imported_function_count();
        let body = func
            .checked_sub(imported)
            .and_then(|i| self.module.code.get(i as usize))
            .ok_or_else(|| EngineError::fault(format!("function {func} has no body")))?;
        let ty = self
            .module
            .func_type(func)
            .ok_or_else(|| EngineError::fault(format!("function {func} has no type")))?;

        self.ctx.push_call()?;
        self.ctx.check_interrupt()?;

        let base = self
            .stack
            .len()
            .checked_sub(ty.params.len())
            .ok_or_else(|| EngineError::fault("missing call arguments"))?;
        let mut locals = self.stack.split_off(base);
        if locals.iter().zip(&ty.params).any(|(value, param)| !value.matches_type(*param)) {
            return Err(EngineError::fault(format!("arguments of function {func} do not match {ty}")));
        }
        locals.extend(body.locals.iter().map(|ty| Value::default_for_type(*ty)));

        self.frames.push(Frame {
            func,
            code: &body.code,
            pc: 0,
            locals,
            stack_base: base,
            labels_base: self.labels.len(),
            arity: ty.results.len(),
        });
        Ok(())
    }

    fn do_return(&mut self) -> EngineResult<()> {
        let frame = self
            .frames
            .pop()
            .ok_or_else(|| EngineError::fault("return without a frame"))?;
        self.unwind(frame.stack_base, frame.arity)?;
        self.labels.truncate(frame.labels_base);
        self.ctx.pop_call();
        Ok(())
    }

    /// Drop everything between `height` and the top `arity` values.
    fn unwind(&mut self, height: usize, arity: usize) -> EngineResult<()> {
        let keep = self
            .stack
            .len()
            .checked_sub(arity)
            .filter(|keep| *keep >= height)
            .ok_or_else(|| EngineError::fault("value stack underflow at branch"))?;
        self.stack.drain(height..keep);
        Ok(())
    }

    fn branch(&mut self, depth: u32) -> EngineResult<()> {
        let labels_base = self.frame()?.labels_base;
        let depth = depth as usize;
        if depth == self.labels.len() - labels_base {
            return self.do_return();
        }
        let idx = self
            .labels
            .len()
            .checked_sub(depth + 1)
            .filter(|idx| *idx >= labels_base)
            .ok_or_else(|| EngineError::fault(format!("branch depth {depth} out of range")))?;
        let label = self.labels[idx];
        self.unwind(label.height, label.arity)?;
        if label.is_loop {
            self.labels.truncate(idx + 1);
            self.ctx.check_interrupt()?;
        } else {
            self.labels.truncate(idx);
        }
        self.frame_mut()?.pc = label.target;
        Ok(())
    }

    fn push_label(&mut self, ty: BlockType, target: usize, is_loop: bool) -> EngineResult<()> {
        let params = ty.param_count(&self.module.types);
        let arity = if is_loop { params } else { ty.result_count(&self.module.types) };
        let height = self
            .stack
            .len()
            .checked_sub(params)
            .ok_or_else(|| EngineError::fault("missing block parameters"))?;
        self.labels.push(Label {
            arity,
            height,
            target,
            is_loop,
        });
        Ok(())
    }

    fn call(&mut self, func: &FuncRef) -> EngineResult<()> {
        if let Function::Wasm(wasm) = func.as_ref() {
            if func.is_owned_by(self.instance) {
                return self.enter(wasm.index);
            }
        }
        let at = self
            .stack
            .len()
            .checked_sub(func.ty().params.len())
            .ok_or_else(|| EngineError::fault("missing call arguments"))?;
        let args = self.stack.split_off(at);
        let results = call_func_ref(func, &args, self.ctx)?;
        self.stack.extend(results);
        Ok(())
    }

    fn frame(&self) -> EngineResult<&Frame<'a>> {
        self.frames.last().ok_or_else(|| EngineError::fault("no active frame"))
    }

    fn frame_mut(&mut self) -> EngineResult<&mut Frame<'a>> {
        self.frames.last_mut().ok_or_else(|| EngineError::fault("no active frame"))
    }

    fn local(&mut self, idx: u32) -> EngineResult<&mut Value> {
        self.frame_mut()?
            .locals
            .get_mut(idx as usize)
            .ok_or_else(|| EngineError::fault(format!("local {idx} does not exist")))
    }

    fn memory(&self) -> EngineResult<&'a SharedMemory> {
        let instance: &'a Arc<InstanceCore> = self.instance;
        instance.memory(0).ok_or_else(|| EngineError::fault("instance has no memory"))
    }

    fn effective_address(&mut self, arg: &MemArg) -> EngineResult<u64> {
        let base = self.pop_i32()? as u32;
        Ok(u64::from(base) + u64::from(arg.offset))
    }

    fn pop(&mut self) -> EngineResult<Value> {
        self.stack.pop().ok_or_else(|| EngineError::fault("value stack underflow"))
    }

    typed_pop!(pop_i32, I32, i32);
    typed_pop!(pop_i64, I64, i64);
    typed_pop!(pop_f32, F32, f32);
    typed_pop!(pop_f64, F64, f64);

    #[allow(clippy::too_many_lines, clippy::cast_sign_loss, clippy::cast_possible_wrap)]
    fn step(&mut self, instr: &'a Instruction, pc: usize) -> EngineResult<()> {
        use Instruction as I;

        self.frame_mut()?.pc = pc + 1;
        let instance: &'a Arc<InstanceCore> = self.instance;

        match instr {
            I::Unreachable => return Err(TrapKind::Unreachable.into()),
            I::Nop => {}
            I::Block { ty, end } => self.push_label(*ty, *end as usize + 1, false)?,
            I::Loop { ty } => self.push_label(*ty, pc + 1, true)?,
            I::If { ty, else_pos, end } => {
                let cond = self.pop_i32()?;
                if cond != 0 {
                    self.push_label(*ty, *end as usize + 1, false)?;
                } else if let Some(else_pos) = else_pos {
                    self.push_label(*ty, *end as usize + 1, false)?;
                    self.frame_mut()?.pc = *else_pos as usize + 1;
                } else {
                    self.frame_mut()?.pc = *end as usize + 1;
                }
            }
            // Reached by falling out of the `then` arm; the `end` pops the label.
            I::Else { end } => self.frame_mut()?.pc = *end as usize,
            I::End => {
                if self.labels.len() > self.frame()?.labels_base {
                    self.labels.pop();
                } else {
                    self.do_return()?;
                }
            }
            I::Br(depth) => self.branch(*depth)?,
            I::BrIf(depth) => {
                if self.pop_i32()? != 0 {
                    self.branch(*depth)?;
                }
            }
            I::BrTable { targets, default } => {
                let i = self.pop_i32()? as u32;
                let depth = targets.get(i as usize).copied().unwrap_or(*default);
                self.branch(depth)?;
            }
            I::Return => self.do_return()?,
            I::Call(idx) => {
                let func = instance
                    .function(*idx)
                    .ok_or_else(|| EngineError::fault(format!("function {idx} does not exist")))?;
                self.call(func)?;
            }
            I::CallIndirect { type_idx, table } => {
                let i = self.pop_i32()? as u32;
                let table = instance
                    .table(*table)
                    .ok_or_else(|| EngineError::fault(format!("table {table} does not exist")))?;
                let entry = table.lock().get(i)?;
                let func = entry.ok_or(TrapKind::IndirectCallToNull)?;
                let expected = self
                    .module
                    .types
                    .get(*type_idx as usize)
                    .ok_or_else(|| EngineError::fault(format!("type {type_idx} does not exist")))?;
                if func.ty() != expected {
                    return Err(Trap::with_message(
                        TrapKind::IndirectCallTypeMismatch,
                        format!("expected {expected}, found {}", func.ty()),
                    )
                    .into());
                }
                self.call(&func)?;
            }

            I::Drop => {
                self.pop()?;
            }
            I::Select => {
                let cond = self.pop_i32()?;
                let b = self.pop()?;
                let a = self.pop()?;
                self.stack.push(if cond != 0 { a } else { b });
            }

            I::LocalGet(idx) => {
                let value = *self.local(*idx)?;
                self.stack.push(value);
            }
            I::LocalSet(idx) => {
                let value = self.pop()?;
                *self.local(*idx)? = value;
            }
            I::LocalTee(idx) => {
                let value = *self.stack.last().ok_or_else(|| EngineError::fault("value stack underflow"))?;
                *self.local(*idx)? = value;
            }
            I::GlobalGet(idx) => {
                let global = instance
                    .global(*idx)
                    .ok_or_else(|| EngineError::fault(format!("global {idx} does not exist")))?;
                let value = global.lock().get();
                self.stack.push(value);
            }
            I::GlobalSet(idx) => {
                let value = self.pop()?;
                let global = instance
                    .global(*idx)
                    .ok_or_else(|| EngineError::fault(format!("global {idx} does not exist")))?;
                global.lock().set(value).map_err(|err| EngineError::fault(err.to_string()))?;
            }

            I::I32Load(arg) => load!(self, arg, 4, I32, |b| i32::from_le_bytes(b)),
            I::I64Load(arg) => load!(self, arg, 8, I64, |b| i64::from_le_bytes(b)),
            I::F32Load(arg) => load!(self, arg, 4, F32, |b| f32::from_le_bytes(b)),
            I::F64Load(arg) => load!(self, arg, 8, F64, |b| f64::from_le_bytes(b)),
            I::I32Load8S(arg) => load!(self, arg, 1, I32, |b| i32::from(i8::from_le_bytes(b))),
            I::I32Load8U(arg) => load!(self, arg, 1, I32, |b| i32::from(b[0])),
            I::I32Load16S(arg) => load!(self, arg, 2, I32, |b| i32::from(i16::from_le_bytes(b))),
            I::I32Load16U(arg) => load!(self, arg, 2, I32, |b| i32::from(u16::from_le_bytes(b))),
            I::I64Load8S(arg) => load!(self, arg, 1, I64, |b| i64::from(i8::from_le_bytes(b))),
            I::I64Load8U(arg) => load!(self, arg, 1, I64, |b| i64::from(b[0])),
            I::I64Load16S(arg) => load!(self, arg, 2, I64, |b| i64::from(i16::from_le_bytes(b))),
            I::I64Load16U(arg) => load!(self, arg, 2, I64, |b| i64::from(u16::from_le_bytes(b))),
            I::I64Load32S(arg) => load!(self, arg, 4, I64, |b| i64::from(i32::from_le_bytes(b))),
            I::I64Load32U(arg) => load!(self, arg, 4, I64, |b| i64::from(u32::from_le_bytes(b))),
            I::I32Store(arg) => store!(self, arg, pop_i32, |v| v.to_le_bytes()),
            I::I64Store(arg) => store!(self, arg, pop_i64, |v| v.to_le_bytes()),
            I::F32Store(arg) => store!(self, arg, pop_f32, |v| v.to_le_bytes()),
            I::F64Store(arg) => store!(self, arg, pop_f64, |v| v.to_le_bytes()),
            I::I32Store8(arg) => store!(self, arg, pop_i32, |v| [v as u8]),
            I::I32Store16(arg) => store!(self, arg, pop_i32, |v| (v as u16).to_le_bytes()),
            I::I64Store8(arg) => store!(self, arg, pop_i64, |v| [v as u8]),
            I::I64Store16(arg) => store!(self, arg, pop_i64, |v| (v as u16).to_le_bytes()),
            I::I64Store32(arg) => store!(self, arg, pop_i64, |v| (v as u32).to_le_bytes()),
            I::MemorySize => {
                let pages = self.memory()?.lock().size();
                self.stack.push(Value::I32(pages as i32));
            }
            I::MemoryGrow => {
                let delta = self.pop_i32()? as u32;
                let old = self.memory()?.lock().grow(delta);
                self.stack.push(Value::I32(old.map_or(-1, |pages| pages as i32)));
            }
            I::MemoryCopy => {
                let len = self.pop_i32()? as u32;
                let src = self.pop_i32()? as u32;
                let dst = self.pop_i32()? as u32;
                self.memory()?
                    .lock()
                    .copy_within(u64::from(dst), u64::from(src), u64::from(len))?;
            }
            I::MemoryFill => {
                let len = self.pop_i32()? as u32;
                let value = self.pop_i32()?;
                let dst = self.pop_i32()? as u32;
                self.memory()?.lock().fill(u64::from(dst), value as u8, u64::from(len))?;
            }

            I::I32Const(v) => self.stack.push(Value::I32(*v)),
            I::I64Const(v) => self.stack.push(Value::I64(*v)),
            I::F32Const(v) => self.stack.push(Value::F32(*v)),
            I::F64Const(v) => self.stack.push(Value::F64(*v)),

            I::I32Eqz => unary!(self, pop_i32, I32, |a| i32::from(a == 0)),
            I::I32Eq => binary!(self, pop_i32, I32, |a, b| i32::from(a == b)),
            I::I32Ne => binary!(self, pop_i32, I32, |a, b| i32::from(a != b)),
            I::I32LtS => binary!(self, pop_i32, I32, |a, b| i32::from(a < b)),
            I::I32LtU => binary!(self, pop_i32, I32, |a, b| i32::from((a as u32) < (b as u32))),
            I::I32GtS => binary!(self, pop_i32, I32, |a, b| i32::from(a > b)),
            I::I32GtU => binary!(self, pop_i32, I32, |a, b| i32::from((a as u32) > (b as u32))),
            I::I32LeS => binary!(self, pop_i32, I32, |a, b| i32::from(a <= b)),
            I::I32LeU => binary!(self, pop_i32, I32, |a, b| i32::from((a as u32) <= (b as u32))),
            I::I32GeS => binary!(self, pop_i32, I32, |a, b| i32::from(a >= b)),
            I::I32GeU => binary!(self, pop_i32, I32, |a, b| i32::from((a as u32) >= (b as u32))),

            I::I64Eqz => unary!(self, pop_i64, I32, |a| i32::from(a == 0)),
            I::I64Eq => binary!(self, pop_i64, I32, |a, b| i32::from(a == b)),
            I::I64Ne => binary!(self, pop_i64, I32, |a, b| i32::from(a != b)),
            I::I64LtS => binary!(self, pop_i64, I32, |a, b| i32::from(a < b)),
            I::I64LtU => binary!(self, pop_i64, I32, |a, b| i32::from((a as u64) < (b as u64))),
            I::I64GtS => binary!(self, pop_i64, I32, |a, b| i32::from(a > b)),
            I::I64GtU => binary!(self, pop_i64, I32, |a, b| i32::from((a as u64) > (b as u64))),
            I::I64LeS => binary!(self, pop_i64, I32, |a, b| i32::from(a <= b)),
            I::I64LeU => binary!(self, pop_i64, I32, |a, b| i32::from((a as u64) <= (b as u64))),
            I::I64GeS => binary!(self, pop_i64, I32, |a, b| i32::from(a >= b)),
            I::I64GeU => binary!(self, pop_i64, I32, |a, b| i32::from((a as u64) >= (b as u64))),

            I::F32Eq => binary!(self, pop_f32, I32, |a, b| i32::from(a == b)),
            I::F32Ne => binary!(self, pop_f32, I32, |a, b| i32::from(a != b)),
            I::F32Lt => binary!(self, pop_f32, I32, |a, b| i32::from(a < b)),
            I::F32Gt => binary!(self, pop_f32, I32, |a, b| i32::from(a > b)),
            I::F32Le => binary!(self, pop_f32, I32, |a, b| i32::from(a <= b)),
            I::F32Ge => binary!(self, pop_f32, I32, |a, b| i32::from(a >= b)),
            I::F64Eq => binary!(self, pop_f64, I32, |a, b| i32::from(a == b)),
            I::F64Ne => binary!(self, pop_f64, I32, |a, b| i32::from(a != b)),
            I::F64Lt => binary!(self, pop_f64, I32, |a, b| i32::from(a < b)),
            I::F64Gt => binary!(self, pop_f64, I32, |a, b| i32::from(a > b)),
            I::F64Le => binary!(self, pop_f64, I32, |a, b| i32::from(a <= b)),
            I::F64Ge => binary!(self, pop_f64, I32, |a, b| i32::from(a >= b)),

            I::I32Clz => unary!(self, pop_i32, I32, |a| a.leading_zeros() as i32),
            I::I32Ctz => unary!(self, pop_i32, I32, |a| a.trailing_zeros() as i32),
            I::I32Popcnt => unary!(self, pop_i32, I32, |a| a.count_ones() as i32),
            I::I32Add => binary!(self, pop_i32, I32, |a, b| a.wrapping_add(b)),
            I::I32Sub => binary!(self, pop_i32, I32, |a, b| a.wrapping_sub(b)),
            I::I32Mul => binary!(self, pop_i32, I32, |a, b| a.wrapping_mul(b)),
            I::I32DivS => binary!(self, pop_i32, I32, |a, b| {
                if b == 0 {
                    return Err(TrapKind::IntegerDivideByZero.into());
                }
                a.checked_div(b).ok_or(TrapKind::IntegerOverflow)?
            }),
            I::I32DivU => binary!(self, pop_i32, I32, |a, b| {
                (a as u32).checked_div(b as u32).ok_or(TrapKind::IntegerDivideByZero)? as i32
            }),
            I::I32RemS => binary!(self, pop_i32, I32, |a, b| {
                if b == 0 {
                    return Err(TrapKind::IntegerDivideByZero.into());
                }
                a.wrapping_rem(b)
            }),
            I::I32RemU => binary!(self, pop_i32, I32, |a, b| {
                (a as u32).checked_rem(b as u32).ok_or(TrapKind::IntegerDivideByZero)? as i32
            }),
            I::I32And => binary!(self, pop_i32, I32, |a, b| a & b),
            I::I32Or => binary!(self, pop_i32, I32, |a, b| a | b),
            I::I32Xor => binary!(self, pop_i32, I32, |a, b| a ^ b),
            I::I32Shl => binary!(self, pop_i32, I32, |a, b| a.wrapping_shl(b as u32)),
            I::I32ShrS => binary!(self, pop_i32, I32, |a, b| a.wrapping_shr(b as u32)),
            I::I32ShrU => binary!(self, pop_i32, I32, |a, b| (a as u32).wrapping_shr(b as u32) as i32),
            I::I32Rotl => binary!(self, pop_i32, I32, |a, b| a.rotate_left(b as u32)),
            I::I32Rotr => binary!(self, pop_i32, I32, |a, b| a.rotate_right(b as u32)),

            I::I64Clz => unary!(self, pop_i64, I64, |a| i64::from(a.leading_zeros())),
            I::I64Ctz => unary!(self, pop_i64, I64, |a| i64::from(a.trailing_zeros())),
            I::I64Popcnt => unary!(self, pop_i64, I64, |a| i64::from(a.count_ones())),
            I::I64Add => binary!(self, pop_i64, I64, |a, b| a.wrapping_add(b)),
            I::I64Sub => binary!(self, pop_i64, I64, |a, b| a.wrapping_sub(b)),
            I::I64Mul => binary!(self, pop_i64, I64, |a, b| a.wrapping_mul(b)),
            I::I64DivS => binary!(self, pop_i64, I64, |a, b| {
                if b == 0 {
                    return Err(TrapKind::IntegerDivideByZero.into());
                }
                a.checked_div(b).ok_or(TrapKind::IntegerOverflow)?
            }),
            I::I64DivU => binary!(self, pop_i64, I64, |a, b| {
                (a as u64).checked_div(b as u64).ok_or(TrapKind::IntegerDivideByZero)? as i64
            }),
            I::I64RemS => binary!(self, pop_i64, I64, |a, b| {
                if b == 0 {
                    return Err(TrapKind::IntegerDivideByZero.into());
                }
                a.wrapping_rem(b)
            }),
            I::I64RemU => binary!(self, pop_i64, I64, |a, b| {
                (a as u64).checked_rem(b as u64).ok_or(TrapKind::IntegerDivideByZero)? as i64
            }),
            I::I64And => binary!(self, pop_i64, I64, |a, b| a & b),
            I::I64Or => binary!(self, pop_i64, I64, |a, b| a | b),
            I::I64Xor => binary!(self, pop_i64, I64, |a, b| a ^ b),
            I::I64Shl => binary!(self, pop_i64, I64, |a, b| a.wrapping_shl(b as u32)),
            I::I64ShrS => binary!(self, pop_i64, I64, |a, b| a.wrapping_shr(b as u32)),
            I::I64ShrU => binary!(self, pop_i64, I64, |a, b| (a as u64).wrapping_shr(b as u32) as i64),
            I::I64Rotl => binary!(self, pop_i64, I64, |a, b| a.rotate_left((b & 63) as u32)),
            I::I64Rotr => binary!(self, pop_i64, I64, |a, b| a.rotate_right((b & 63) as u32)),

            I::F32Abs => unary!(self, pop_f32, F32, |a| a.abs()),
            I::F32Neg => unary!(self, pop_f32, F32, |a| -a),
            I::F32Ceil => unary!(self, pop_f32, F32, |a| a.ceil()),
            I::F32Floor => unary!(self, pop_f32, F32, |a| a.floor()),
            I::F32Trunc => unary!(self, pop_f32, F32, |a| a.trunc()),
            I::F32Nearest => unary!(self, pop_f32, F32, |a| a.round_ties_even()),
            I::F32Sqrt => unary!(self, pop_f32, F32, |a| a.sqrt()),
            I::F32Add => binary!(self, pop_f32, F32, |a, b| a + b),
            I::F32Sub => binary!(self, pop_f32, F32, |a, b| a - b),
            I::F32Mul => binary!(self, pop_f32, F32, |a, b| a * b),
            I::F32Div => binary!(self, pop_f32, F32, |a, b| a / b),
            I::F32Min => binary!(self, pop_f32, F32, |a, b| numeric::f32_min(a, b)),
            I::F32Max => binary!(self, pop_f32, F32, |a, b| numeric::f32_max(a, b)),
            I::F32Copysign => binary!(self, pop_f32, F32, |a, b| a.copysign(b)),

            I::F64Abs => unary!(self, pop_f64, F64, |a| a.abs()),
            I::F64Neg => unary!(self, pop_f64, F64, |a| -a),
            I::F64Ceil => unary!(self, pop_f64, F64, |a| a.ceil()),
            I::F64Floor => unary!(self, pop_f64, F64, |a| a.floor()),
            I::F64Trunc => unary!(self, pop_f64, F64, |a| a.trunc()),
            I::F64Nearest => unary!(self, pop_f64, F64, |a| a.round_ties_even()),
            I::F64Sqrt => unary!(self, pop_f64, F64, |a| a.sqrt()),
            I::F64Add => binary!(self, pop_f64, F64, |a, b| a + b),
            I::F64Sub => binary!(self, pop_f64, F64, |a, b| a - b),
            I::F64Mul => binary!(self, pop_f64, F64, |a, b| a * b),
            I::F64Div => binary!(self, pop_f64, F64, |a, b| a / b),
            I::F64Min => binary!(self, pop_f64, F64, |a, b| numeric::f64_min(a, b)),
            I::F64Max => binary!(self, pop_f64, F64, |a, b| numeric::f64_max(a, b)),
            I::F64Copysign => binary!(self, pop_f64, F64, |a, b| a.copysign(b)),

            I::I32WrapI64 => unary!(self, pop_i64, I32, |a| a as i32),
            I::I32TruncF32S => unary!(self, pop_f32, I32, |a| numeric::i32_trunc_s(f64::from(a))?),
            I::I32TruncF32U => unary!(self, pop_f32, I32, |a| numeric::i32_trunc_u(f64::from(a))?),
            I::I32TruncF64S => unary!(self, pop_f64, I32, |a| numeric::i32_trunc_s(a)?),
            I::I32TruncF64U => unary!(self, pop_f64, I32, |a| numeric::i32_trunc_u(a)?),
            I::I64ExtendI32S => unary!(self, pop_i32, I64, |a| i64::from(a)),
            I::I64ExtendI32U => unary!(self, pop_i32, I64, |a| i64::from(a as u32)),
            I::I64TruncF32S => unary!(self, pop_f32, I64, |a| numeric::i64_trunc_s(f64::from(a))?),
            I::I64TruncF32U => unary!(self, pop_f32, I64, |a| numeric::i64_trunc_u(f64::from(a))?),
            I::I64TruncF64S => unary!(self, pop_f64, I64, |a| numeric::i64_trunc_s(a)?),
            I::I64TruncF64U => unary!(self, pop_f64, I64, |a| numeric::i64_trunc_u(a)?),
            I::F32ConvertI32S => unary!(self, pop_i32, F32, |a| a as f32),
            I::F32ConvertI32U => unary!(self, pop_i32, F32, |a| a as u32 as f32),
            I::F32ConvertI64S => unary!(self, pop_i64, F32, |a| a as f32),
            I::F32ConvertI64U => unary!(self, pop_i64, F32, |a| a as u64 as f32),
            I::F32DemoteF64 => unary!(self, pop_f64, F32, |a| a as f32),
            I::F64ConvertI32S => unary!(self, pop_i32, F64, |a| f64::from(a)),
            I::F64ConvertI32U => unary!(self, pop_i32, F64, |a| f64::from(a as u32)),
            I::F64ConvertI64S => unary!(self, pop_i64, F64, |a| a as f64),
            I::F64ConvertI64U => unary!(self, pop_i64, F64, |a| a as u64 as f64),
            I::F64PromoteF32 => unary!(self, pop_f32, F64, |a| f64::from(a)),
            I::I32ReinterpretF32 => unary!(self, pop_f32, I32, |a| a.to_bits() as i32),
            I::I64ReinterpretF64 => unary!(self, pop_f64, I64, |a| a.to_bits() as i64),
            I::F32ReinterpretI32 => unary!(self, pop_i32, F32, |a| f32::from_bits(a as u32)),
            I::F64ReinterpretI64 => unary!(self, pop_i64, F64, |a| f64::from_bits(a as u64)),

            I::I32Extend8S => unary!(self, pop_i32, I32, |a| i32::from(a as i8)),
            I::I32Extend16S => unary!(self, pop_i32, I32, |a| i32::from(a as i16)),
            I::I64Extend8S => unary!(self, pop_i64, I64, |a| i64::from(a as i8)),
            I::I64Extend16S => unary!(self, pop_i64, I64, |a| i64::from(a as i16)),
            I::I64Extend32S => unary!(self, pop_i64, I64, |a| i64::from(a as i32)),

            // `as` from float to int saturates and maps NaN to zero.
            I::I32TruncSatF32S => unary!(self, pop_f32, I32, |a| a as i32),
            I::I32TruncSatF32U => unary!(self, pop_f32, I32, |a| a as u32 as i32),
            I::I32TruncSatF64S => unary!(self, pop_f64, I32, |a| a as i32),
            I::I32TruncSatF64U => unary!(self, pop_f64, I32, |a| a as u32 as i32),
            I::I64TruncSatF32S => unary!(self, pop_f32, I64, |a| a as i64),
            I::I64TruncSatF32U => unary!(self, pop_f32, I64, |a| a as u64 as i64),
            I::I64TruncSatF64S => unary!(self, pop_f64, I64, |a| a as i64),
            I::I64TruncSatF64U => unary!(self, pop_f64, I64, |a| a as u64 as i64),
        }
        Ok(())
    }
}
