//! The seam between instance management and code execution.
//!
//! Everything above this module (linking, instantiation, the lifecycle
//! coordinator) drives execution only through [`ExecutionEngine`]. The
//! bundled [`crate::interpreter::Interpreter`] is the default
//! implementation.

use core::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use wlm_error::Error;
use wlm_format::Value;

use crate::instance::InstanceCore;
use crate::stats::ExecutionStats;
use crate::trap::{Trap, TrapKind};

/// Failure of an engine call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The code trapped; the instance stays usable
    Trap(Trap),
    /// Anything else: an `EngineFault` taints the instance, lifecycle
    /// errors such as `UseAfterFree` are passed through unchanged
    Error(Error),
}

impl EngineError {
    /// An engine fault with `message`
    pub fn fault(message: impl Into<String>) -> Self {
        Self::Error(Error::engine_fault(message.into()))
    }

    /// Whether this failure must taint the instance
    pub fn is_fault(&self) -> bool {
        matches!(self, Self::Error(err) if err.kind() == wlm_error::ErrorKind::EngineFault)
    }
}

impl From<Trap> for EngineError {
    fn from(trap: Trap) -> Self {
        Self::Trap(trap)
    }
}

impl From<TrapKind> for EngineError {
    fn from(kind: TrapKind) -> Self {
        Self::Trap(Trap::new(kind))
    }
}

impl From<Error> for EngineError {
    fn from(err: Error) -> Self {
        Self::Error(err)
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Trap(trap) => write!(f, "trap: {trap}"),
            Self::Error(err) => write!(f, "{err}"),
        }
    }
}

/// Result of an engine call
pub type EngineResult<T> = core::result::Result<T, EngineError>;

/// Budget and bookkeeping for one top-level invocation
#[derive(Debug)]
pub struct ExecutionContext {
    /// Remaining instruction budget, unlimited when `None`
    pub fuel:           Option<u64>,
    /// Cooperative cancellation flag of the invoked instance
    pub interrupt:      Arc<AtomicBool>,
    /// Maximum nesting of calls
    pub max_call_depth: u32,
    /// Current nesting of calls
    pub depth:          u32,
    /// Counters accumulated by this invocation
    pub stats:          ExecutionStats,
}

impl ExecutionContext {
    /// Context for a call with the given budget
    pub fn new(fuel: Option<u64>, interrupt: Arc<AtomicBool>, max_call_depth: u32) -> Self {
        Self {
            fuel,
            interrupt,
            max_call_depth,
            depth: 0,
            stats: ExecutionStats::default(),
        }
    }

    /// Charge one instruction.
    pub fn consume_fuel(&mut self) -> EngineResult<()> {
        self.stats.instructions_executed += 1;
        if let Some(fuel) = self.fuel.as_mut() {
            if *fuel == 0 {
                return Err(TrapKind::OutOfFuel.into());
            }
            *fuel -= 1;
            self.stats.fuel_consumed += 1;
        }
        Ok(())
    }

    /// Cooperative cancellation point.
    ///
    /// A pending interrupt is consumed by the first check that observes it.
    pub fn check_interrupt(&self) -> EngineResult<()> {
        if self.interrupt.swap(false, Ordering::AcqRel) {
            return Err(TrapKind::Interrupted.into());
        }
        Ok(())
    }

    /// Enter a nested call.
    pub fn push_call(&mut self) -> EngineResult<()> {
        if self.depth >= self.max_call_depth {
            return Err(Trap::with_message(
                TrapKind::StackOverflow,
                format!("call depth limit of {} reached", self.max_call_depth),
            )
            .into());
        }
        self.depth += 1;
        self.stats.function_calls += 1;
        self.stats.max_call_depth = self.stats.max_call_depth.max(self.depth);
        Ok(())
    }

    /// Leave a nested call.
    pub fn pop_call(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }
}

/// Executes functions of instances
///
/// Implementations run function `func_index` of `instance` to completion.
/// The caller has already checked the argument count and types and holds
/// the instance's execution lock. Calls that leave the instance (imported
/// functions, functions of other instances reached through tables) are the
/// engine's responsibility, including taking the callee's execution lock.
pub trait ExecutionEngine: Send + Sync + fmt::Debug {
    /// Name used in logs and diagnostics
    fn name(&self) -> &'static str;

    /// Run a function to completion.
    fn invoke(
        &self,
        instance: &Arc<InstanceCore>,
        func_index: u32,
        args: &[Value],
        ctx: &mut ExecutionContext,
    ) -> EngineResult<Vec<Value>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fuel_runs_out() {
        let mut ctx = ExecutionContext::new(Some(2), Arc::new(AtomicBool::new(false)), 4);
        assert!(ctx.consume_fuel().is_ok());
        assert!(ctx.consume_fuel().is_ok());
        assert_eq!(ctx.consume_fuel(), Err(EngineError::Trap(Trap::new(TrapKind::OutOfFuel))));
        assert_eq!(ctx.stats.fuel_consumed, 2);
    }

    #[test]
    fn interrupt_is_consumed_once() {
        let flag = Arc::new(AtomicBool::new(true));
        let ctx = ExecutionContext::new(None, Arc::clone(&flag), 4);
        assert!(ctx.check_interrupt().is_err());
        assert!(ctx.check_interrupt().is_ok());
        assert!(!flag.load(Ordering::Acquire));
    }

    #[test]
    fn call_depth_is_bounded() {
        let mut ctx = ExecutionContext::new(None, Arc::new(AtomicBool::new(false)), 2);
        ctx.push_call().unwrap();
        ctx.push_call().unwrap();
        match ctx.push_call() {
            Err(EngineError::Trap(trap)) => assert_eq!(trap.kind, TrapKind::StackOverflow),
            other => panic!("expected stack overflow, got {other:?}"),
        }
        ctx.pop_call();
        assert!(ctx.push_call().is_ok());
        assert_eq!(ctx.stats.max_call_depth, 2);
    }

    #[test]
    fn only_engine_faults_taint() {
        assert!(EngineError::fault("bad stack").is_fault());
        assert!(!EngineError::Trap(Trap::new(TrapKind::Unreachable)).is_fault());
        assert!(!EngineError::Error(Error::USE_AFTER_FREE).is_fault());
    }
}
