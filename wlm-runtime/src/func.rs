//! Function references shared between instances, tables and hosts.

use core::fmt;
use std::sync::{Arc, Weak};

use wlm_format::FuncType;
use wlm_host::HostFunc;

use crate::instance::InstanceCore;

/// A function defined by a module, bound to the instance that owns it
#[derive(Clone)]
pub struct WasmFunc {
    /// Owning instance; weak so that instances never keep each other alive
    pub instance: Weak<InstanceCore>,
    /// Index in the owning instance's function space
    pub index:    u32,
    /// Signature
    pub ty:       FuncType,
}

/// A callable function
#[derive(Clone)]
pub enum Function {
    /// Defined in a module
    Wasm(WasmFunc),
    /// Provided by the embedder
    Host(HostFunc),
}

/// Shared handle to a function
pub type FuncRef = Arc<Function>;

impl Function {
    /// Signature of the function
    pub fn ty(&self) -> &FuncType {
        match self {
            Self::Wasm(func) => &func.ty,
            Self::Host(func) => func.ty(),
        }
    }

    /// Whether this is a module function owned by `instance`
    pub fn is_owned_by(&self, instance: &Arc<InstanceCore>) -> bool {
        match self {
            Self::Wasm(func) => Weak::as_ptr(&func.instance) == Arc::as_ptr(instance),
            Self::Host(_) => false,
        }
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Wasm(func) => f
                .debug_struct("WasmFunc")
                .field("index", &func.index)
                .field("ty", &func.ty)
                .finish_non_exhaustive(),
            Self::Host(func) => f.debug_struct("HostFunc").field("ty", func.ty()).finish(),
        }
    }
}
