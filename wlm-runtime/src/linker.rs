//! Import resolution
//!
//! [`Imports`] is the provider set offered to a module; [`resolve_imports`]
//! binds every declared import to exactly one provided extern, in
//! declaration order, stopping at the first failure. Externs exported by
//! another instance remember that instance, so the lifecycle coordinator
//! can refuse to tear down a provider while importers are alive.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use log::trace;
use wlm_decoder::{Import, Module};
use wlm_error::{Error, Result};
use wlm_format::{ExternType, Limits};
use wlm_host::{HostFunc, HostRegistry};

use crate::externals::Extern;
use crate::func::Function;
use crate::instance::InstanceCore;

#[derive(Debug, Clone)]
struct Definition {
    value: Extern,
    owner: Option<Weak<InstanceCore>>,
}

/// Externs available for linking, keyed by module and field name
#[derive(Debug, Clone, Default)]
pub struct Imports {
    definitions: HashMap<(String, String), Definition>,
}

/// Outcome of a successful resolution
#[derive(Debug)]
pub struct ResolvedImports {
    /// One extern per declared import, in declaration order
    pub externs:   Vec<Extern>,
    /// Distinct instances the externs were taken from
    pub providers: Vec<Weak<InstanceCore>>,
}

impl Imports {
    /// An empty provider set
    pub fn new() -> Self {
        Self::default()
    }

    /// Every host function of `registry`
    pub fn from_host_registry(registry: &HostRegistry) -> Self {
        let mut imports = Self::new();
        for module in registry.get_registered_modules() {
            for name in registry.get_registered_functions(module) {
                if let Some(func) = registry.get_host_function(module, name) {
                    imports.define(module, name, Extern::host_function(func.clone()));
                }
            }
        }
        imports
    }

    /// Provide `value` as `module.name`, replacing any earlier definition.
    ///
    /// A module-defined function remembers the instance that owns it.
    pub fn define(&mut self, module: &str, name: &str, value: Extern) -> &mut Self {
        let owner = match &value {
            Extern::Function(func) => match func.as_ref() {
                Function::Wasm(wasm) => Some(wasm.instance.clone()),
                Function::Host(_) => None,
            },
            _ => None,
        };
        self.definitions
            .insert((module.to_string(), name.to_string()), Definition { value, owner });
        self
    }

    /// Provide every export of `instance` under the module name `module`.
    pub fn instance(&mut self, module: &str, instance: &Arc<InstanceCore>) -> &mut Self {
        for (name, value) in instance.exports() {
            self.definitions.insert(
                (module.to_string(), name.to_string()),
                Definition {
                    value: value.clone(),
                    owner: Some(Arc::downgrade(instance)),
                },
            );
        }
        self
    }

    /// Provide a host function as `module.name`.
    pub fn func(&mut self, module: &str, name: &str, func: HostFunc) -> &mut Self {
        self.define(module, name, Extern::host_function(func))
    }

    /// Add every definition of `other`, which takes precedence.
    pub fn extend(&mut self, other: Self) -> &mut Self {
        self.definitions.extend(other.definitions);
        self
    }

    /// The extern provided as `module.name`
    pub fn get(&self, module: &str, name: &str) -> Option<&Extern> {
        self.definitions
            .get(&(module.to_string(), name.to_string()))
            .map(|definition| &definition.value)
    }

    /// Number of definitions
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Whether nothing is provided
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

/// Bind every import of `module` to an extern from `imports`.
///
/// # Errors
///
/// `UnresolvedImport` naming the first import without a provider,
/// `TypeMismatch` naming expected and actual types for the first import
/// whose provider has the wrong kind or type, `UseAfterFree` for an import
/// provided by an instance that has since been torn down.
pub fn resolve_imports(module: &Module, imports: &Imports) -> Result<ResolvedImports> {
    let mut resolved = ResolvedImports {
        externs:   Vec::with_capacity(module.imports.len()),
        providers: Vec::new(),
    };
    for import in &module.imports {
        let provided = imports
            .definitions
            .get(&(import.module.clone(), import.name.clone()))
            .ok_or_else(|| Error::unresolved_import(&import.module, &import.name))?;
        check_import_type(import, &provided.value.ty())?;
        if let Some(owner) = &provided.owner {
            if !owner.upgrade().is_some_and(|instance| !instance.is_retired()) {
                return Err(Error::use_after_free(format!(
                    "import {}.{} is provided by a released instance",
                    import.module, import.name
                )));
            }
        }
        trace!("resolved import {}.{} as {}", import.module, import.name, import.ty.kind());
        if let Some(owner) = &provided.owner {
            if !resolved.providers.iter().any(|known| Weak::ptr_eq(known, owner)) {
                resolved.providers.push(owner.clone());
            }
        }
        resolved.externs.push(provided.value.clone());
    }
    Ok(resolved)
}

fn check_import_type(import: &Import, actual: &ExternType) -> Result<()> {
    let matches = match (&import.ty, actual) {
        (ExternType::Function(expected), ExternType::Function(actual)) => expected == actual,
        (ExternType::Global(expected), ExternType::Global(actual)) => expected == actual,
        (ExternType::Memory(expected), ExternType::Memory(actual)) => limits_match(&actual.limits, &expected.limits),
        (ExternType::Table(expected), ExternType::Table(actual)) => {
            expected.element_type == actual.element_type && limits_match(&actual.limits, &expected.limits)
        }
        _ => false,
    };
    if matches {
        Ok(())
    } else {
        Err(Error::type_mismatch(
            format!("import {}.{}", import.module, import.name),
            &import.ty,
            actual,
        ))
    }
}

fn limits_match(provided: &Limits, declared: &Limits) -> bool {
    provided.satisfies(declared)
}

#[cfg(test)]
mod tests {
    use wlm_error::ErrorKind;
    use wlm_format::{FuncType, GlobalType, MemoryType, Value, ValueType};

    use super::*;

    fn module(imports: Vec<Import>) -> Module {
        Module {
            imports,
            ..Module::default()
        }
    }

    fn import(module: &str, name: &str, ty: ExternType) -> Import {
        Import {
            module: module.into(),
            name:   name.into(),
            ty,
        }
    }

    fn log_ty() -> FuncType {
        FuncType::new([ValueType::I32], [])
    }

    #[test]
    fn missing_provider_is_unresolved_and_named() {
        let m = module(vec![import("env", "log", ExternType::Function(log_ty()))]);
        let err = resolve_imports(&m, &Imports::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnresolvedImport);
        assert!(err.message.contains("env.log"));
    }

    #[test]
    fn first_failure_in_declaration_order_wins() {
        let m = module(vec![
            import("env", "a", ExternType::Function(log_ty())),
            import("env", "b", ExternType::Function(log_ty())),
        ]);
        let mut imports = Imports::new();
        imports.func("env", "a", HostFunc::wrap(FuncType::new([], []), |_: &[Value]| Ok(vec![])));
        let err = resolve_imports(&m, &imports).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
        assert!(err.message.contains("env.a"));
        assert!(err.message.contains("[i32] -> []"));
    }

    #[test]
    fn kind_mismatch_is_type_mismatch() {
        let m = module(vec![import("env", "g", ExternType::Function(log_ty()))]);
        let mut imports = Imports::new();
        imports.define(
            "env",
            "g",
            Extern::global(
                GlobalType {
                    value_type: ValueType::I32,
                    mutable:    false,
                },
                Value::I32(1),
            )
            .unwrap(),
        );
        assert_eq!(resolve_imports(&m, &imports).unwrap_err().kind(), ErrorKind::TypeMismatch);
    }

    #[test]
    fn memory_limits_use_subtyping() {
        let declared = MemoryType {
            limits: Limits::new(1, Some(4)),
        };
        let m = module(vec![import("env", "mem", ExternType::Memory(declared))]);

        let fits = Extern::memory(MemoryType { limits: Limits::new(2, Some(3)) }, 100).unwrap();
        let mut imports = Imports::new();
        imports.define("env", "mem", fits);
        assert_eq!(resolve_imports(&m, &imports).unwrap().externs.len(), 1);

        let unbounded = Extern::memory(MemoryType { limits: Limits::new(2, None) }, 100).unwrap();
        imports.define("env", "mem", unbounded);
        assert_eq!(resolve_imports(&m, &imports).unwrap_err().kind(), ErrorKind::TypeMismatch);
    }

    #[test]
    fn host_registry_becomes_providers() {
        let mut registry = HostRegistry::new();
        registry.register_host_function(
            "env",
            "log",
            log_ty(),
            wlm_host::CloneableFn::new(|_: &[Value]| Ok(vec![])),
        );
        let imports = Imports::from_host_registry(&registry);
        assert_eq!(imports.len(), 1);
        let m = module(vec![import("env", "log", ExternType::Function(log_ty()))]);
        let resolved = resolve_imports(&m, &imports).unwrap();
        assert!(resolved.providers.is_empty());
    }
}
