//! Module instances
//!
//! An [`InstanceCore`] is the live realization of a module: its function
//! index space, memories, tables, globals and exports, plus the execution
//! lock and the flags the lifecycle coordinator drives.

use core::fmt;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use log::{debug, warn};
use wlm_decoder::{ConstExpr, DataMode, ElementMode, Module};
use wlm_error::{Error, ErrorCategory, Result, codes};
use wlm_format::binary::MAX_PAGES;
use wlm_format::{ExternKind, RefType, Value};
use wlm_sync::{ExecutionLock, WlmMutex};

use crate::engine::{EngineError, ExecutionContext, ExecutionEngine};
use crate::externals::{Extern, SharedGlobal, SharedMemory, SharedTable};
use crate::func::{FuncRef, Function, WasmFunc};
use crate::global::Global;
use crate::linker::{Imports, resolve_imports};
use crate::memory::Memory;
use crate::stats::ExecutionStats;
use crate::table::Table;

/// Resource limits applied to each instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstanceConfig {
    /// Largest size in pages any memory may reach
    pub max_memory_pages:   u32,
    /// Largest initial size of a table
    pub max_table_elements: u32,
    /// Maximum nesting of calls
    pub max_call_depth:     u32,
    /// Instruction budget per invocation
    pub fuel:               Option<u64>,
}

impl Default for InstanceConfig {
    fn default() -> Self {
        Self {
            max_memory_pages:   MAX_PAGES,
            max_table_elements: 100_000,
            max_call_depth:     1024,
            fuel:               None,
        }
    }
}

/// A live instance
pub struct InstanceCore {
    module:    Arc<Module>,
    functions: Vec<FuncRef>,
    tables:    Vec<SharedTable>,
    memories:  Vec<SharedMemory>,
    globals:   Vec<SharedGlobal>,
    exports:   HashMap<String, Extern>,
    /// Instances this one imports from
    providers: Vec<Weak<InstanceCore>>,
    config:    InstanceConfig,
    lock:      ExecutionLock,
    tainted:   AtomicBool,
    retired:   AtomicBool,
    interrupt: Arc<AtomicBool>,
    stats:     WlmMutex<ExecutionStats>,
}

fn segment_error(code: u16, message: String) -> Error {
    Error::with_message(ErrorCategory::Link, code, message)
}

impl InstanceCore {
    /// Instantiate `module` against `imports`.
    ///
    /// Resolves imports, allocates memories and tables, evaluates global
    /// initializers, applies element and data segments and runs the start
    /// function. Segments are bounds checked before any of them is written,
    /// so a failing instantiation leaves shared memories and tables
    /// untouched. On failure everything allocated so far is dropped.
    ///
    /// # Errors
    ///
    /// `UnresolvedImport` or `TypeMismatch` from resolution, `LinkError` for
    /// segments that do not fit, `InstantiationTrap` if the start function
    /// traps, `EngineFault` if it faults, and a resource error when a
    /// memory or table exceeds the configured limits.
    pub fn instantiate(
        module: Arc<Module>,
        imports: &Imports,
        config: &InstanceConfig,
        engine: &dyn ExecutionEngine,
    ) -> Result<Arc<Self>> {
        let resolved = resolve_imports(&module, imports)?;

        let mut functions = Vec::with_capacity(module.imports.len() + module.functions.len());
        let mut tables = Vec::new();
        let mut memories = Vec::new();
        let mut globals = Vec::new();
        for ext in resolved.externs {
            match ext {
                Extern::Function(func) => functions.push(func),
                Extern::Table(table) => tables.push(table),
                Extern::Memory(memory) => memories.push(memory),
                Extern::Global(global) => globals.push(global),
            }
        }

        for ty in &module.memories {
            memories.push(Arc::new(WlmMutex::new(Memory::new(*ty, config.max_memory_pages)?)));
        }
        for ty in &module.tables {
            tables.push(Arc::new(WlmMutex::new(Table::new(*ty, config.max_table_elements)?)));
        }
        for global in &module.globals {
            let value = eval_const(&global.init, &globals)?;
            globals.push(Arc::new(WlmMutex::new(Global::new(global.ty, value)?)));
        }

        let imported_functions = functions.len() as u32;
        let instance = Arc::new_cyclic(|weak: &Weak<Self>| {
            for (i, type_idx) in module.functions.iter().enumerate() {
                let ty = module.types.get(*type_idx as usize).cloned().unwrap_or_default();
                functions.push(Arc::new(Function::Wasm(WasmFunc {
                    instance: weak.clone(),
                    index: imported_functions + i as u32,
                    ty,
                })));
            }

            let mut exports = HashMap::with_capacity(module.exports.len());
            for export in &module.exports {
                let idx = export.index as usize;
                let value = match export.kind {
                    ExternKind::Function => functions.get(idx).cloned().map(Extern::Function),
                    ExternKind::Table => tables.get(idx).cloned().map(Extern::Table),
                    ExternKind::Memory => memories.get(idx).cloned().map(Extern::Memory),
                    ExternKind::Global => globals.get(idx).cloned().map(Extern::Global),
                };
                if let Some(value) = value {
                    exports.insert(export.name.clone(), value);
                }
            }

            Self {
                module: Arc::clone(&module),
                functions,
                tables,
                memories,
                globals,
                exports,
                providers: resolved.providers,
                config: *config,
                lock: ExecutionLock::new(),
                tainted: AtomicBool::new(false),
                retired: AtomicBool::new(false),
                interrupt: Arc::new(AtomicBool::new(false)),
                stats: WlmMutex::new(ExecutionStats::default()),
            }
        });

        instance.initialize_segments()?;

        if let Some(start) = module.start {
            let _guard = instance.lock.enter();
            let mut ctx = instance.context();
            let outcome = engine.invoke(&instance, start, &[], &mut ctx);
            instance.record(ctx.stats);
            match outcome {
                Ok(_) => {}
                Err(EngineError::Trap(trap)) => {
                    warn!("start function {start} trapped: {trap}");
                    return Err(Error::instantiation_trap(trap));
                }
                Err(EngineError::Error(err)) => return Err(err),
            }
        }

        debug!(
            "instantiated module with {} functions, {} memories, {} tables, {} globals",
            instance.functions.len(),
            instance.memories.len(),
            instance.tables.len(),
            instance.globals.len()
        );
        Ok(instance)
    }

    fn initialize_segments(&self) -> Result<()> {
        let mut element_writes = Vec::new();
        for (i, segment) in self.module.elements.iter().enumerate() {
            let ElementMode::Active { table, offset } = &segment.mode else {
                continue;
            };
            let shared = self
                .tables
                .get(*table as usize)
                .ok_or_else(|| Error::link_error(format!("element segment {i} refers to missing table {table}")))?;
            let table_ty = shared.lock().current_type();
            if table_ty.element_type != segment.element_type {
                return Err(Error::link_error(format!(
                    "element segment {i} of type {} does not fit table of type {}",
                    segment.element_type, table_ty.element_type
                )));
            }
            let offset = self.offset(offset)?;
            let items = segment
                .items
                .iter()
                .map(|item| self.element_item(item))
                .collect::<Result<Vec<_>>>()?;
            if u64::from(offset) + items.len() as u64 > u64::from(table_ty.limits.min) {
                return Err(segment_error(
                    codes::ELEMENT_SEGMENT_OUT_OF_BOUNDS,
                    format!(
                        "element segment {i} writes {} entries at {offset} into a table of {}",
                        items.len(),
                        table_ty.limits.min
                    ),
                ));
            }
            element_writes.push((Arc::clone(shared), offset, items));
        }

        let mut data_writes = Vec::new();
        for (i, segment) in self.module.data.iter().enumerate() {
            let DataMode::Active { memory, offset } = &segment.mode else {
                continue;
            };
            let shared = self
                .memories
                .get(*memory as usize)
                .ok_or_else(|| Error::link_error(format!("data segment {i} refers to missing memory {memory}")))?;
            let offset = self.offset(offset)?;
            let size = shared.lock().size_in_bytes() as u64;
            if u64::from(offset) + segment.bytes.len() as u64 > size {
                return Err(segment_error(
                    codes::DATA_SEGMENT_OUT_OF_BOUNDS,
                    format!(
                        "data segment {i} writes {} bytes at {offset} into a memory of {size} bytes",
                        segment.bytes.len()
                    ),
                ));
            }
            data_writes.push((Arc::clone(shared), offset, segment.bytes.as_slice()));
        }

        for (table, offset, items) in element_writes {
            table
                .lock()
                .init(offset, &items)
                .map_err(|trap| Error::link_error(trap.to_string()))?;
        }
        for (memory, offset, bytes) in data_writes {
            memory
                .lock()
                .write(u64::from(offset), bytes)
                .map_err(|trap| Error::link_error(trap.to_string()))?;
        }
        Ok(())
    }

    fn offset(&self, expr: &ConstExpr) -> Result<u32> {
        match eval_const(expr, &self.globals)? {
            Value::I32(offset) => Ok(offset as u32),
            other => Err(Error::link_error(format!("segment offset of type {} is not i32", other.value_type()))),
        }
    }

    fn element_item(&self, item: &ConstExpr) -> Result<Option<FuncRef>> {
        let index = match eval_const(item, &self.globals)? {
            Value::FuncRef(index) | Value::ExternRef(index) => index,
            other => return Err(Error::link_error(format!("element of type {} is not a reference", other.value_type()))),
        };
        match index {
            None => Ok(None),
            Some(idx) => self
                .functions
                .get(idx as usize)
                .cloned()
                .map(Some)
                .ok_or_else(|| Error::link_error(format!("element refers to missing function {idx}"))),
        }
    }

    /// Fresh execution context carrying this instance's budget
    pub fn context(&self) -> ExecutionContext {
        ExecutionContext::new(self.config.fuel, Arc::clone(&self.interrupt), self.config.max_call_depth)
    }

    /// The module this instance was created from
    pub fn module(&self) -> &Arc<Module> {
        &self.module
    }

    /// Function `idx` of the function index space
    pub fn function(&self, idx: u32) -> Option<&FuncRef> {
        self.functions.get(idx as usize)
    }

    /// Number of imported functions; defined functions follow them
    pub fn imported_function_count(&self) -> u32 {
        self.functions.len() as u32 - self.module.functions.len() as u32
    }

    /// Memory `idx`
    pub fn memory(&self, idx: u32) -> Option<&SharedMemory> {
        self.memories.get(idx as usize)
    }

    /// Table `idx`
    pub fn table(&self, idx: u32) -> Option<&SharedTable> {
        self.tables.get(idx as usize)
    }

    /// Global `idx`
    pub fn global(&self, idx: u32) -> Option<&SharedGlobal> {
        self.globals.get(idx as usize)
    }

    /// Export named `name`; names are case-sensitive
    pub fn export(&self, name: &str) -> Option<&Extern> {
        self.exports.get(name)
    }

    /// Index of the function exported as `name`, if the export exists and
    /// is a function
    pub fn exported_function(&self, name: &str) -> Option<u32> {
        self.module
            .export(name)
            .filter(|export| export.kind == ExternKind::Function)
            .map(|export| export.index)
    }

    /// Exports in declaration order
    pub fn exports(&self) -> impl Iterator<Item = (&str, &Extern)> + '_ {
        self.module
            .exports
            .iter()
            .filter_map(|export| self.exports.get(&export.name).map(|value| (export.name.as_str(), value)))
    }

    /// Whether this instance imports anything from `provider`
    pub fn imports_from(&self, provider: &Arc<Self>) -> bool {
        self.providers
            .iter()
            .any(|weak| Weak::as_ptr(weak) == Arc::as_ptr(provider))
    }

    /// The per-instance execution lock
    pub fn lock(&self) -> &ExecutionLock {
        &self.lock
    }

    /// Limits this instance runs under
    pub fn config(&self) -> &InstanceConfig {
        &self.config
    }

    /// Whether an engine fault has tainted the instance
    pub fn is_tainted(&self) -> bool {
        self.tainted.load(Ordering::Acquire)
    }

    /// Mark the instance unusable for further calls.
    pub fn taint(&self, reason: &str) {
        if !self.tainted.swap(true, Ordering::AcqRel) {
            warn!("instance tainted: {reason}");
        }
    }

    /// Whether the instance has been torn down
    pub fn is_retired(&self) -> bool {
        self.retired.load(Ordering::Acquire)
    }

    /// Mark the instance torn down. Callers hold the exclusive execution
    /// lock while doing so.
    pub fn retire(&self) {
        self.retired.store(true, Ordering::Release);
    }

    /// Ask the running call, or the next one, to stop at its next
    /// cancellation point.
    pub fn request_interrupt(&self) {
        self.interrupt.store(true, Ordering::Release);
    }

    /// Accumulated execution statistics
    pub fn stats(&self) -> ExecutionStats {
        *self.stats.lock()
    }

    /// Add the counters of one invocation.
    pub fn record(&self, stats: ExecutionStats) {
        *self.stats.lock() += stats;
    }
}

impl fmt::Debug for InstanceCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceCore")
            .field("functions", &self.functions.len())
            .field("memories", &self.memories.len())
            .field("tables", &self.tables.len())
            .field("globals", &self.globals.len())
            .field("tainted", &self.is_tainted())
            .field("retired", &self.is_retired())
            .finish_non_exhaustive()
    }
}

/// Evaluate a constant expression; `global.get` reads from `globals`.
pub(crate) fn eval_const(expr: &ConstExpr, globals: &[SharedGlobal]) -> Result<Value> {
    Ok(match expr {
        ConstExpr::I32(v) => Value::I32(*v),
        ConstExpr::I64(v) => Value::I64(*v),
        ConstExpr::F32(v) => Value::F32(*v),
        ConstExpr::F64(v) => Value::F64(*v),
        ConstExpr::RefNull(RefType::FuncRef) => Value::FuncRef(None),
        ConstExpr::RefNull(RefType::ExternRef) => Value::ExternRef(None),
        ConstExpr::RefFunc(idx) => Value::FuncRef(Some(*idx)),
        ConstExpr::GlobalGet(idx) => globals
            .get(*idx as usize)
            .map(|global| global.lock().get())
            .ok_or_else(|| Error::link_error(format!("initializer reads missing global {idx}")))?,
    })
}
