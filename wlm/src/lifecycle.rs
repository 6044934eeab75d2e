//! Lifecycle states reported by the coordinator.

use core::fmt;

/// State of a module handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleState {
    /// Loaded; `instances` live instances derive from it
    Loaded {
        /// Live instances, instantiations in progress included
        instances: usize,
    },
    /// Unloaded; terminal
    Unloaded,
}

/// State of an instance handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceState {
    /// Ready for calls
    Instantiated,
    /// A call is in flight
    Executing,
    /// An engine fault occurred; only teardown is allowed
    Tainted,
    /// Torn down; terminal
    Deinstantiated,
}

impl fmt::Display for ModuleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Loaded { instances: 0 } => f.write_str("loaded"),
            Self::Loaded { instances } => write!(f, "loaded with {instances} instances"),
            Self::Unloaded => f.write_str("unloaded"),
        }
    }
}

impl fmt::Display for InstanceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Instantiated => "instantiated",
            Self::Executing => "executing",
            Self::Tainted => "tainted",
            Self::Deinstantiated => "deinstantiated",
        })
    }
}
