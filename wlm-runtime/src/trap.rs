//! Traps: well-defined abnormal termination of an invocation.

use core::fmt;

use wlm_error::Error;

/// Reason an invocation trapped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrapKind {
    /// `unreachable` was executed
    Unreachable,
    /// Memory access outside the current memory size
    MemoryOutOfBounds,
    /// Table access outside the current table size
    TableOutOfBounds,
    /// `call_indirect` through a null table entry
    IndirectCallToNull,
    /// `call_indirect` signature disagreement
    IndirectCallTypeMismatch,
    /// Integer division or remainder by zero
    IntegerDivideByZero,
    /// Signed division overflow
    IntegerOverflow,
    /// Float to integer conversion of NaN or an out-of-range value
    InvalidConversionToInteger,
    /// Call depth limit reached
    StackOverflow,
    /// Configured fuel exhausted
    OutOfFuel,
    /// Cooperative cancellation requested through the interrupt flag
    Interrupted,
    /// A host function reported an error
    Host,
}

impl TrapKind {
    /// Short human readable description
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unreachable => "unreachable executed",
            Self::MemoryOutOfBounds => "out of bounds memory access",
            Self::TableOutOfBounds => "out of bounds table access",
            Self::IndirectCallToNull => "indirect call to null",
            Self::IndirectCallTypeMismatch => "indirect call type mismatch",
            Self::IntegerDivideByZero => "integer divide by zero",
            Self::IntegerOverflow => "integer overflow",
            Self::InvalidConversionToInteger => "invalid conversion to integer",
            Self::StackOverflow => "call stack exhausted",
            Self::OutOfFuel => "fuel exhausted",
            Self::Interrupted => "interrupted",
            Self::Host => "host function failed",
        }
    }
}

impl fmt::Display for TrapKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A trap with its location when known
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trap {
    /// What went wrong
    pub kind:     TrapKind,
    /// Extra detail, empty when the kind says it all
    pub message:  String,
    /// Index of the trapping function in its instance's function space
    pub function: Option<u32>,
    /// Position of the trapping instruction in the function body
    pub offset:   Option<usize>,
}

impl Trap {
    /// A trap of `kind` without detail or location
    pub fn new(kind: TrapKind) -> Self {
        Self {
            kind,
            message: String::new(),
            function: None,
            offset: None,
        }
    }

    /// A trap with a detail message
    pub fn with_message(kind: TrapKind, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::new(kind)
        }
    }

    /// Record where the trap happened unless already known.
    #[must_use]
    pub fn at(mut self, function: u32, offset: usize) -> Self {
        if self.function.is_none() {
            self.function = Some(function);
            self.offset = Some(offset);
        }
        self
    }

    /// Convert into an error of kind `Trap`
    pub fn into_error(self) -> Error {
        Error::trap(self)
    }
}

impl fmt::Display for Trap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind.as_str())?;
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let (Some(function), Some(offset)) = (self.function, self.offset) {
            write!(f, " (function {function}, instruction {offset})")?;
        }
        Ok(())
    }
}

impl From<TrapKind> for Trap {
    fn from(kind: TrapKind) -> Self {
        Self::new(kind)
    }
}

#[cfg(test)]
mod tests {
    use wlm_error::ErrorKind;

    use super::*;

    #[test]
    fn display_includes_location_once_set() {
        let trap = Trap::new(TrapKind::IntegerDivideByZero).at(3, 7).at(9, 9);
        assert_eq!(trap.to_string(), "integer divide by zero (function 3, instruction 7)");
        let trap = Trap::with_message(TrapKind::Host, "no file");
        assert_eq!(trap.to_string(), "host function failed: no file");
    }

    #[test]
    fn converts_to_trap_error() {
        let err = Trap::new(TrapKind::Unreachable).into_error();
        assert_eq!(err.kind(), ErrorKind::Trap);
        assert!(err.message.contains("unreachable executed"));
    }
}
