//! Top-level invocation of an instance's function.

use std::sync::Arc;

use log::{debug, warn};
use wlm_error::{Error, ErrorKind, Result};
use wlm_format::Value;

use crate::engine::{EngineError, ExecutionEngine};
use crate::instance::InstanceCore;
use crate::stats::ExecutionStats;
use crate::trap::Trap;

/// How a call ended when it did not fail outright
#[derive(Debug, Clone, PartialEq)]
pub enum Invocation {
    /// The function returned these values
    Returned(Vec<Value>),
    /// The function trapped; the instance stays usable
    Trapped(Trap),
}

impl Invocation {
    /// Turn a trap into an error of kind `Trap`.
    ///
    /// # Errors
    ///
    /// Returns the trap as an error.
    pub fn into_result(self) -> Result<Vec<Value>> {
        match self {
            Self::Returned(values) => Ok(values),
            Self::Trapped(trap) => Err(trap.into_error()),
        }
    }
}

fn check_callable(instance: &InstanceCore) -> Result<()> {
    if instance.is_retired() {
        return Err(Error::use_after_free("instance has been deinstantiated"));
    }
    if instance.is_tainted() {
        return Err(Error::illegal_state("execute", "tainted"));
    }
    Ok(())
}

/// Call function `func_index` of `instance` with `args`.
///
/// Blocks until the instance's execution lock is free, so calls into one
/// instance never overlap. Traps are reported as [`Invocation::Trapped`];
/// an engine fault taints the instance before it is returned.
///
/// # Errors
///
/// `UseAfterFree` for a deinstantiated instance, `IllegalState` for a
/// tainted one, `ArityMismatch` or `TypeMismatch` for bad arguments,
/// `EngineFault` when the engine fails.
pub fn execute(
    engine: &dyn ExecutionEngine,
    instance: &Arc<InstanceCore>,
    func_index: u32,
    args: &[Value],
) -> Result<Invocation> {
    check_callable(instance)?;
    let func = instance
        .function(func_index)
        .ok_or_else(|| Error::engine_fault(format!("function {func_index} does not exist")))?;
    let ty = func.ty();
    if args.len() != ty.params.len() {
        return Err(Error::arity_mismatch(ty.params.len(), args.len()));
    }
    for (i, (arg, param)) in args.iter().zip(&ty.params).enumerate() {
        if !arg.matches_type(*param) {
            return Err(Error::type_mismatch(format!("argument {i}"), param, arg.value_type()));
        }
    }

    let _guard = instance.lock().enter();
    check_callable(instance)?;

    let mut ctx = instance.context();
    let outcome = engine.invoke(instance, func_index, args, &mut ctx);
    let mut stats = ExecutionStats {
        invocations: 1,
        ..ctx.stats
    };

    let result = match outcome {
        Ok(values) => {
            let well_typed = values.len() == ty.results.len()
                && values.iter().zip(&ty.results).all(|(value, result)| value.matches_type(*result));
            if well_typed {
                debug!("function {func_index} returned {} values", values.len());
                Ok(Invocation::Returned(values))
            } else {
                let err = Error::engine_fault(format!("function {func_index} returned values not matching {ty}"));
                instance.taint(&err.to_string());
                Err(err)
            }
        }
        Err(EngineError::Trap(trap)) => {
            warn!("function {func_index} trapped: {trap}");
            stats.traps += 1;
            Ok(Invocation::Trapped(trap))
        }
        Err(EngineError::Error(err)) => {
            if err.kind() == ErrorKind::EngineFault {
                instance.taint(&err.to_string());
            }
            Err(err)
        }
    };
    instance.record(stats);
    result
}
