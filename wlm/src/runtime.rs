//! The lifecycle coordinator.
//!
//! [`Runtime`] owns two arenas: loaded modules and instances. Registry
//! locks are held only for bookkeeping, never across decoding,
//! instantiation or engine calls. Instances are torn down under their
//! exclusive execution lock, so teardown waits for (or, with
//! [`Runtime::try_deinstantiate`], refuses to interrupt) a call in flight.

use core::fmt;
use core::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use log::{debug, trace};
use wlm_decoder::{Module, decode_module_with_config};
use wlm_error::{Error, ErrorCategory, Result, codes};
use wlm_format::Value;
use wlm_runtime::{
    ExecutionEngine, ExecutionStats, Extern, Imports, InstanceCore, Interpreter, Invocation, execute,
};
use wlm_sync::WlmRwLock;

use crate::config::RuntimeConfig;
use crate::description::ModuleDescription;
use crate::handles::{ExportedFunction, InstanceHandle, ModuleHandle};
use crate::lifecycle::{InstanceState, ModuleState};
use crate::marshal;

static NEXT_RUNTIME_ID: AtomicU64 = AtomicU64::new(1);

struct ModuleSlot {
    /// `None` once unloaded
    module:    Option<Arc<Module>>,
    /// Live instances plus instantiations in progress
    instances: usize,
}

struct InstanceSlot {
    module: ModuleHandle,
    /// `None` once deinstantiated
    core:   Option<Arc<InstanceCore>>,
}

/// Loads, instantiates, invokes and tears down WebAssembly modules
///
/// A `Runtime` is plain state: create as many as needed, share one across
/// threads behind an `Arc`, and drop it to release everything it holds.
pub struct Runtime {
    /// Identity stamped into every handle this runtime issues
    id:        u64,
    config:    RuntimeConfig,
    engine:    Arc<dyn ExecutionEngine>,
    modules:   WlmRwLock<Vec<ModuleSlot>>,
    instances: WlmRwLock<Vec<InstanceSlot>>,
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new(RuntimeConfig::default())
    }
}

impl Runtime {
    /// A runtime executing with the bundled interpreter
    pub fn new(config: RuntimeConfig) -> Self {
        Self::with_engine(config, Arc::new(Interpreter::new()))
    }

    /// A runtime executing with `engine`
    pub fn with_engine(config: RuntimeConfig, engine: Arc<dyn ExecutionEngine>) -> Self {
        debug!("creating runtime with engine {}", engine.name());
        Self {
            id: NEXT_RUNTIME_ID.fetch_add(1, Ordering::Relaxed),
            config,
            engine,
            modules: WlmRwLock::new(Vec::new()),
            instances: WlmRwLock::new(Vec::new()),
        }
    }

    /// Configuration in effect
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Name of the execution engine
    pub fn engine_name(&self) -> &'static str {
        self.engine.name()
    }

    /// Decode and validate `bytes` into a module.
    ///
    /// # Errors
    ///
    /// `InvalidModule` naming the violated rule, or `ResourceExhausted` when
    /// the module limit is reached. Nothing is registered on failure.
    pub fn load(&self, bytes: &[u8]) -> Result<ModuleHandle> {
        let module = Arc::new(decode_module_with_config(bytes, &self.config.validation)?);

        let mut modules = self.modules.write();
        let loaded = modules.iter().filter(|slot| slot.module.is_some()).count();
        if loaded >= self.config.limits.max_modules {
            return Err(Error::resource_limit(format!(
                "{loaded} modules loaded, the limit is {}",
                self.config.limits.max_modules
            )));
        }
        let handle = ModuleHandle {
            runtime: self.id,
            index:   arena_index(modules.len())?,
        };
        modules.push(ModuleSlot {
            module:    Some(module),
            instances: 0,
        });
        debug!("loaded {handle} from {} bytes", bytes.len());
        Ok(handle)
    }

    /// Release a module.
    ///
    /// # Errors
    ///
    /// `InUse` while instances derived from it are alive or being created,
    /// `UseAfterFree` if it was already unloaded.
    pub fn unload(&self, handle: ModuleHandle) -> Result<()> {
        let mut modules = self.modules.write();
        let slot = module_slot(&mut modules, self.id, handle)?;
        if slot.instances > 0 {
            return Err(Error::in_use(format!("{handle} still has {} live instances", slot.instances)));
        }
        slot.module = None;
        debug!("unloaded {handle}");
        Ok(())
    }

    /// Imports and exports of a loaded module.
    ///
    /// # Errors
    ///
    /// `UseAfterFree` if the module was unloaded.
    pub fn describe_module(&self, handle: ModuleHandle) -> Result<ModuleDescription> {
        let module = self.module(handle)?;
        Ok(ModuleDescription::of(&module))
    }

    /// Lifecycle state of a module handle.
    ///
    /// # Errors
    ///
    /// `UseAfterFree` for a handle this runtime never issued.
    pub fn module_state(&self, handle: ModuleHandle) -> Result<ModuleState> {
        let modules = self.modules.read();
        let slot = handle
            .slot(self.id)
            .and_then(|index| modules.get(index))
            .ok_or_else(|| Error::use_after_free(format!("unknown {handle}")))?;
        Ok(match slot.module {
            Some(_) => ModuleState::Loaded {
                instances: slot.instances,
            },
            None => ModuleState::Unloaded,
        })
    }

    /// Instantiate a module without imports.
    ///
    /// # Errors
    ///
    /// See [`Runtime::instantiate_with`].
    pub fn instantiate(&self, module: ModuleHandle) -> Result<InstanceHandle> {
        self.instantiate_with(module, &Imports::new())
    }

    /// Instantiate a module, resolving its imports from `imports`.
    ///
    /// # Errors
    ///
    /// `UseAfterFree` for an unloaded module, `ResourceExhausted` at the
    /// instance limit, `UnresolvedImport` or `TypeMismatch` from import
    /// resolution, `LinkError` for segments that do not fit,
    /// `InstantiationTrap` if the start function traps and `EngineFault` if
    /// the engine fails. Nothing stays allocated on failure.
    pub fn instantiate_with(&self, module: ModuleHandle, imports: &Imports) -> Result<InstanceHandle> {
        let code = self.reserve_instance(module)?;
        let created = InstanceCore::instantiate(code, imports, &self.config.instance_config(), self.engine.as_ref());
        let core = match created {
            Ok(core) => core,
            Err(err) => {
                self.release_instance(module);
                debug!("instantiation of {module} failed: {err}");
                return Err(err);
            }
        };

        let mut instances = self.instances.write();
        let handle = match arena_index(instances.len()) {
            Ok(index) => InstanceHandle {
                runtime: self.id,
                index,
            },
            Err(err) => {
                drop(instances);
                self.release_instance(module);
                return Err(err);
            }
        };
        instances.push(InstanceSlot {
            module,
            core: Some(core),
        });
        debug!("instantiated {module} as {handle}");
        Ok(handle)
    }

    fn reserve_instance(&self, handle: ModuleHandle) -> Result<Arc<Module>> {
        let mut modules = self.modules.write();
        let live: usize = modules.iter().map(|slot| slot.instances).sum();
        if live >= self.config.limits.max_instances {
            return Err(Error::resource_limit(format!(
                "{live} instances live, the limit is {}",
                self.config.limits.max_instances
            )));
        }
        let slot = module_slot(&mut modules, self.id, handle)?;
        let module = slot
            .module
            .clone()
            .ok_or_else(|| Error::use_after_free(format!("{handle} has been unloaded")))?;
        slot.instances += 1;
        Ok(module)
    }

    fn release_instance(&self, handle: ModuleHandle) {
        let mut modules = self.modules.write();
        if let Some(slot) = handle.slot(self.id).and_then(|index| modules.get_mut(index)) {
            slot.instances = slot.instances.saturating_sub(1);
        }
    }

    /// Offer every export of `instance` to importers under `module_name`.
    ///
    /// # Errors
    ///
    /// `UseAfterFree` if the instance was deinstantiated.
    pub fn imports_from(&self, instance: InstanceHandle, module_name: &str) -> Result<Imports> {
        let core = self.instance(instance)?;
        let mut imports = Imports::new();
        imports.instance(module_name, &core);
        Ok(imports)
    }

    /// Tear an instance down, waiting for a call in flight to finish.
    ///
    /// # Errors
    ///
    /// `UseAfterFree` if already torn down, `InUse` while other instances
    /// import from it, `Busy` when called from inside a call on the same
    /// instance.
    pub fn deinstantiate(&self, instance: InstanceHandle) -> Result<()> {
        self.teardown(instance, true)
    }

    /// Tear an instance down unless a call is in flight.
    ///
    /// # Errors
    ///
    /// As [`Runtime::deinstantiate`], and `Busy` while a call is running.
    pub fn try_deinstantiate(&self, instance: InstanceHandle) -> Result<()> {
        self.teardown(instance, false)
    }

    fn teardown(&self, handle: InstanceHandle, blocking: bool) -> Result<()> {
        let core = self.instance(handle)?;
        if let Some(dependent) = self.dependent_of(&core) {
            return Err(Error::in_use(format!("{dependent} imports from {handle}")));
        }

        let guard = if blocking {
            core.lock().acquire_exclusive()?
        } else {
            core.lock().try_acquire_exclusive()?
        };
        if core.is_retired() {
            return Err(Error::use_after_free(format!("{handle} has been deinstantiated")));
        }
        core.retire();
        drop(guard);

        let module = {
            let mut instances = self.instances.write();
            let slot = handle
                .slot(self.id)
                .and_then(|index| instances.get_mut(index))
                .ok_or_else(|| Error::use_after_free(format!("unknown {handle}")))?;
            slot.core = None;
            slot.module
        };
        self.release_instance(module);
        debug!("deinstantiated {handle}");
        Ok(())
    }

    fn dependent_of(&self, provider: &Arc<InstanceCore>) -> Option<InstanceHandle> {
        let instances = self.instances.read();
        instances.iter().enumerate().find_map(|(index, slot)| {
            slot.core
                .as_ref()
                .filter(|core| !Arc::ptr_eq(core, provider) && core.imports_from(provider))
                .map(|_| InstanceHandle {
                    runtime: self.id,
                    index:   index as u32,
                })
        })
    }

    /// Lifecycle state of an instance handle.
    ///
    /// # Errors
    ///
    /// `UseAfterFree` for a handle this runtime never issued.
    pub fn instance_state(&self, handle: InstanceHandle) -> Result<InstanceState> {
        let instances = self.instances.read();
        let slot = handle
            .slot(self.id)
            .and_then(|index| instances.get(index))
            .ok_or_else(|| Error::use_after_free(format!("unknown {handle}")))?;
        Ok(match &slot.core {
            None => InstanceState::Deinstantiated,
            Some(core) if core.is_retired() => InstanceState::Deinstantiated,
            Some(core) if core.is_tainted() => InstanceState::Tainted,
            Some(core) if core.lock().is_locked() => InstanceState::Executing,
            Some(_) => InstanceState::Instantiated,
        })
    }

    /// Find the function exported as `name`. Names are case-sensitive.
    ///
    /// # Errors
    ///
    /// `ExportNotFound` if there is no export of that name or it is not a
    /// function, `IllegalState` for a tainted instance, `UseAfterFree` for
    /// a deinstantiated one.
    pub fn lookup_function(&self, instance: InstanceHandle, name: &str) -> Result<ExportedFunction> {
        let core = self.instance(instance)?;
        if core.is_tainted() {
            return Err(Error::illegal_state("look up a function", InstanceState::Tainted));
        }
        match core.export(name) {
            Some(Extern::Function(func)) => {
                let index = core
                    .exported_function(name)
                    .ok_or_else(|| Error::export_not_found(name))?;
                trace!("resolved {instance}::{name} to function {index}");
                Ok(ExportedFunction {
                    instance,
                    name: Arc::from(name),
                    ty: func.ty().clone(),
                    index,
                })
            }
            Some(other) => Err(Error::with_message(
                ErrorCategory::Validation,
                codes::EXPORT_NOT_FOUND,
                format!("export \"{name}\" is a {}, not a function", other.kind()),
            )),
            None => Err(Error::export_not_found(name)),
        }
    }

    /// Call a function.
    ///
    /// Blocks while another call into the same instance is running. A trap
    /// is a normal outcome and leaves the instance usable.
    ///
    /// # Errors
    ///
    /// `ArityMismatch` or `TypeMismatch` for bad arguments (the engine is
    /// not called), `IllegalState` for a tainted instance, `UseAfterFree`
    /// for a deinstantiated one, `EngineFault` if the engine fails.
    pub fn execute_function(&self, function: &ExportedFunction, args: &[Value]) -> Result<Invocation> {
        let core = self.instance(function.instance)?;
        trace!("calling {function} with {} arguments", args.len());
        execute(self.engine.as_ref(), &core, function.index, args)
    }

    /// Call a function, reporting a trap as an error of kind `Trap`.
    ///
    /// # Errors
    ///
    /// As [`Runtime::execute_function`], plus `Trap`.
    pub fn call(&self, function: &ExportedFunction, args: &[Value]) -> Result<Vec<Value>> {
        self.execute_function(function, args)?.into_result()
    }

    /// Call a function with numeric arguments converted per its signature.
    ///
    /// # Errors
    ///
    /// As [`Runtime::call`], plus `TypeMismatch` for reference parameters
    /// or results.
    pub fn call_numeric(&self, function: &ExportedFunction, args: &[f64]) -> Result<Vec<f64>> {
        let values = marshal::to_values(function.ty(), args)?;
        marshal::from_values(&self.call(function, &values)?)
    }

    /// Ask the running call of an instance, or its next call, to stop.
    ///
    /// # Errors
    ///
    /// `UseAfterFree` for a deinstantiated instance.
    pub fn interrupt(&self, instance: InstanceHandle) -> Result<()> {
        self.instance(instance)?.request_interrupt();
        Ok(())
    }

    /// Counters accumulated over the calls into an instance.
    ///
    /// # Errors
    ///
    /// `UseAfterFree` for a deinstantiated instance.
    pub fn instance_stats(&self, instance: InstanceHandle) -> Result<ExecutionStats> {
        Ok(self.instance(instance)?.stats())
    }

    /// Any export of an instance.
    ///
    /// # Errors
    ///
    /// `ExportNotFound` if there is no such export, `UseAfterFree` for a
    /// deinstantiated instance.
    pub fn export(&self, instance: InstanceHandle, name: &str) -> Result<Extern> {
        self.instance(instance)?
            .export(name)
            .cloned()
            .ok_or_else(|| Error::export_not_found(name))
    }

    /// Number of loaded modules
    pub fn module_count(&self) -> usize {
        self.modules.read().iter().filter(|slot| slot.module.is_some()).count()
    }

    /// Number of live instances
    pub fn instance_count(&self) -> usize {
        self.instances.read().iter().filter(|slot| slot.core.is_some()).count()
    }

    fn module(&self, handle: ModuleHandle) -> Result<Arc<Module>> {
        let modules = self.modules.read();
        handle
            .slot(self.id)
            .and_then(|index| modules.get(index))
            .ok_or_else(|| Error::use_after_free(format!("unknown {handle}")))?
            .module
            .clone()
            .ok_or_else(|| Error::use_after_free(format!("{handle} has been unloaded")))
    }

    fn instance(&self, handle: InstanceHandle) -> Result<Arc<InstanceCore>> {
        let instances = self.instances.read();
        let core = handle
            .slot(self.id)
            .and_then(|index| instances.get(index))
            .ok_or_else(|| Error::use_after_free(format!("unknown {handle}")))?
            .core
            .clone()
            .filter(|core| !core.is_retired())
            .ok_or_else(|| Error::use_after_free(format!("{handle} has been deinstantiated")))?;
        Ok(core)
    }
}

fn module_slot(modules: &mut [ModuleSlot], runtime: u64, handle: ModuleHandle) -> Result<&mut ModuleSlot> {
    handle
        .slot(runtime)
        .and_then(|index| modules.get_mut(index))
        .filter(|slot| slot.module.is_some())
        .ok_or_else(|| Error::use_after_free(format!("{handle} has been unloaded")))
}

fn arena_index(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| Error::resource_limit("handle space exhausted"))
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("engine", &self.engine.name())
            .field("modules", &self.module_count())
            .field("instances", &self.instance_count())
            .finish_non_exhaustive()
    }
}
