//! Opaque handles into a [`crate::Runtime`]'s registries.
//!
//! Handles are indices into append-only arenas, tagged with the identity of
//! the runtime that issued them. A slot is never reused, so a handle that
//! outlives its module or instance is always recognized as stale, and a
//! handle presented to another runtime is never resolved there.

use core::fmt;
use std::sync::Arc;

use wlm_format::FuncType;

/// A loaded module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModuleHandle {
    pub(crate) runtime: u64,
    pub(crate) index:   u32,
}

/// A live instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstanceHandle {
    pub(crate) runtime: u64,
    pub(crate) index:   u32,
}

impl ModuleHandle {
    /// Arena index
    pub fn index(self) -> u32 {
        self.index
    }

    /// Arena slot, if this handle was issued by runtime `runtime`
    pub(crate) fn slot(self, runtime: u64) -> Option<usize> {
        (self.runtime == runtime).then_some(self.index as usize)
    }
}

impl InstanceHandle {
    /// Arena index
    pub fn index(self) -> u32 {
        self.index
    }

    pub(crate) fn slot(self, runtime: u64) -> Option<usize> {
        (self.runtime == runtime).then_some(self.index as usize)
    }
}

impl fmt::Display for ModuleHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "module#{}.{}", self.runtime, self.index)
    }
}

impl fmt::Display for InstanceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "instance#{}.{}", self.runtime, self.index)
    }
}

/// A function export resolved by [`crate::Runtime::lookup_function`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedFunction {
    pub(crate) instance: InstanceHandle,
    pub(crate) name:     Arc<str>,
    pub(crate) ty:       FuncType,
    pub(crate) index:    u32,
}

impl ExportedFunction {
    /// Instance the function belongs to
    pub fn instance(&self) -> InstanceHandle {
        self.instance
    }

    /// Export name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Signature
    pub fn ty(&self) -> &FuncType {
        &self.ty
    }

    /// Index in the instance's function space
    pub fn index(&self) -> u32 {
        self.index
    }
}

impl fmt::Display for ExportedFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{} {}", self.instance, self.name, self.ty)
    }
}
