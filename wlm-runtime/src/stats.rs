//! Execution counters kept per instance.

use core::ops::AddAssign;

/// Counters accumulated over the invocations of an instance
///
/// Work done in other instances reached through imports is charged to the
/// instance whose function was invoked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutionStats {
    /// Completed top-level invocations, trapped ones included
    pub invocations:           u64,
    /// Instructions executed
    pub instructions_executed: u64,
    /// Function calls made, the entry call included
    pub function_calls:        u64,
    /// Invocations that ended in a trap
    pub traps:                 u64,
    /// Fuel consumed
    pub fuel_consumed:         u64,
    /// Deepest call nesting observed
    pub max_call_depth:        u32,
}

impl AddAssign for ExecutionStats {
    fn add_assign(&mut self, other: Self) {
        self.invocations += other.invocations;
        self.instructions_executed += other.instructions_executed;
        self.function_calls += other.function_calls;
        self.traps += other.traps;
        self.fuel_consumed += other.fuel_consumed;
        self.max_call_depth = self.max_call_depth.max(other.max_call_depth);
    }
}
