//! Reference execution engine
//!
//! A straightforward interpreter over the decoded instruction list. Calls
//! within one instance run on an explicit frame stack; calls that leave
//! the instance go through [`call_func_ref`], which takes the callee's
//! execution lock and taints it if the callee faults.

mod executor;
mod numeric;

use std::sync::Arc;

use wlm_error::{Error, ErrorKind};
use wlm_format::Value;

use crate::engine::{EngineError, EngineResult, ExecutionContext, ExecutionEngine};
use crate::func::{FuncRef, Function};
use crate::instance::InstanceCore;
use crate::trap::{Trap, TrapKind};

use self::executor::Machine;

/// The bundled interpreter
#[derive(Debug, Default, Clone, Copy)]
pub struct Interpreter;

impl Interpreter {
    /// Create an interpreter
    pub fn new() -> Self {
        Self
    }
}

impl ExecutionEngine for Interpreter {
    fn name(&self) -> &'static str {
        "interpreter"
    }

    fn invoke(
        &self,
        instance: &Arc<InstanceCore>,
        func_index: u32,
        args: &[Value],
        ctx: &mut ExecutionContext,
    ) -> EngineResult<Vec<Value>> {
        let func = instance
            .function(func_index)
            .ok_or_else(|| EngineError::fault(format!("function {func_index} does not exist")))?;
        if func.is_owned_by(instance) {
            Machine::new(instance, ctx).run(func_index, args)
        } else {
            call_func_ref(func, args, ctx)
        }
    }
}

/// Call a function that lives outside the running instance.
pub(crate) fn call_func_ref(func: &FuncRef, args: &[Value], ctx: &mut ExecutionContext) -> EngineResult<Vec<Value>> {
    match func.as_ref() {
        Function::Host(host) => {
            ctx.push_call()?;
            let result = host.call(args);
            ctx.pop_call();
            result.map_err(|err| {
                if err.kind() == ErrorKind::EngineFault {
                    EngineError::Error(err)
                } else {
                    Trap::with_message(TrapKind::Host, err.message.into_owned()).into()
                }
            })
        }
        Function::Wasm(wasm) => {
            let callee = wasm
                .instance
                .upgrade()
                .ok_or_else(|| Error::use_after_free("call into a released instance"))?;
            call_into(&callee, wasm.index, args, ctx)
        }
    }
}

fn call_into(
    callee: &Arc<InstanceCore>,
    func_index: u32,
    args: &[Value],
    ctx: &mut ExecutionContext,
) -> EngineResult<Vec<Value>> {
    check_callable(callee)?;
    let _guard = callee.lock().enter();
    // Teardown may have won the race for the lock.
    check_callable(callee)?;
    let result = Machine::new(callee, ctx).run(func_index, args);
    if let Err(err) = &result {
        if err.is_fault() {
            callee.taint(&err.to_string());
        }
    }
    result
}

fn check_callable(instance: &InstanceCore) -> EngineResult<()> {
    if instance.is_retired() {
        return Err(Error::use_after_free("call into a deinstantiated instance").into());
    }
    if instance.is_tainted() {
        return Err(Error::illegal_state("call", "tainted").into());
    }
    Ok(())
}
