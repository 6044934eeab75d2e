//! External values: what an instance exports and what an import binds to.

use std::sync::Arc;

use wlm_error::Result;
use wlm_format::{ExternKind, ExternType, GlobalType, MemoryType, TableType, Value};
use wlm_host::HostFunc;
use wlm_sync::WlmMutex;

use crate::func::{FuncRef, Function};
use crate::global::Global;
use crate::memory::Memory;
use crate::table::Table;

/// A memory shared between its owner and importers
pub type SharedMemory = Arc<WlmMutex<Memory>>;
/// A table shared between its owner and importers
pub type SharedTable = Arc<WlmMutex<Table>>;
/// A global shared between its owner and importers
pub type SharedGlobal = Arc<WlmMutex<Global>>;

/// An external value, tagged by kind
#[derive(Debug, Clone)]
pub enum Extern {
    /// A function
    Function(FuncRef),
    /// A linear memory
    Memory(SharedMemory),
    /// A table
    Table(SharedTable),
    /// A global
    Global(SharedGlobal),
}

impl Extern {
    /// Wrap a host function
    pub fn host_function(func: HostFunc) -> Self {
        Self::Function(Arc::new(Function::Host(func)))
    }

    /// A new host-owned memory.
    ///
    /// # Errors
    ///
    /// Fails if the initial size exceeds the page cap.
    pub fn memory(ty: MemoryType, page_cap: u32) -> Result<Self> {
        Ok(Self::Memory(Arc::new(WlmMutex::new(Memory::new(ty, page_cap)?))))
    }

    /// A new host-owned table of null entries.
    ///
    /// # Errors
    ///
    /// Fails if the initial size exceeds `max_elements`.
    pub fn table(ty: TableType, max_elements: u32) -> Result<Self> {
        Ok(Self::Table(Arc::new(WlmMutex::new(Table::new(ty, max_elements)?))))
    }

    /// A new host-owned global.
    ///
    /// # Errors
    ///
    /// `TypeMismatch` if `value` does not have the declared type.
    pub fn global(ty: GlobalType, value: Value) -> Result<Self> {
        Ok(Self::Global(Arc::new(WlmMutex::new(Global::new(ty, value)?))))
    }

    /// Kind tag
    pub fn kind(&self) -> ExternKind {
        match self {
            Self::Function(_) => ExternKind::Function,
            Self::Memory(_) => ExternKind::Memory,
            Self::Table(_) => ExternKind::Table,
            Self::Global(_) => ExternKind::Global,
        }
    }

    /// Current type; memories and tables report their current size as the
    /// minimum.
    pub fn ty(&self) -> ExternType {
        match self {
            Self::Function(func) => ExternType::Function(func.ty().clone()),
            Self::Memory(memory) => ExternType::Memory(memory.lock().current_type()),
            Self::Table(table) => ExternType::Table(table.lock().current_type()),
            Self::Global(global) => ExternType::Global(global.lock().ty()),
        }
    }

    /// The function, if this is one
    pub fn as_function(&self) -> Option<&FuncRef> {
        match self {
            Self::Function(func) => Some(func),
            _ => None,
        }
    }

    /// The memory, if this is one
    pub fn as_memory(&self) -> Option<&SharedMemory> {
        match self {
            Self::Memory(memory) => Some(memory),
            _ => None,
        }
    }

    /// The global, if this is one
    pub fn as_global(&self) -> Option<&SharedGlobal> {
        match self {
            Self::Global(global) => Some(global),
            _ => None,
        }
    }
}
