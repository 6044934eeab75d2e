//! Registry of host functions keyed by import module and field name.

use std::collections::HashMap;
use std::fmt;

use log::debug;
use wlm_error::{Error, Result};
use wlm_format::{FuncType, Value};

use crate::function::{HostFunc, HostFunctionHandler};

/// Host functions available for linking, grouped by module name
#[derive(Default, Clone)]
pub struct HostRegistry {
    /// Module name -> field name -> function
    host_functions: HashMap<String, HashMap<String, HostFunc>>,
}

impl fmt::Debug for HostRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<String> = self
            .host_functions
            .iter()
            .flat_map(|(module, fields)| fields.keys().map(move |name| function_key(module, name)))
            .collect();
        keys.sort();
        f.debug_struct("HostRegistry").field("host_functions", &keys).finish()
    }
}

impl HostRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a host function, replacing any previous one with the same
    /// module and field name.
    pub fn register_host_function(
        &mut self,
        module_name: &str,
        function_name: &str,
        ty: FuncType,
        handler: HostFunctionHandler,
    ) {
        debug!("registering host function {} with type {ty}", function_key(module_name, function_name));
        self.host_functions
            .entry(module_name.to_string())
            .or_default()
            .insert(function_name.to_string(), HostFunc::new(ty, handler));
    }

    /// Check if a host function is registered
    pub fn has_host_function(&self, module_name: &str, function_name: &str) -> bool {
        self.get_host_function(module_name, function_name).is_some()
    }

    /// The host function registered under `module_name.function_name`.
    pub fn get_host_function(&self, module_name: &str, function_name: &str) -> Option<&HostFunc> {
        self.host_functions.get(module_name)?.get(function_name)
    }

    /// Call a host function directly, outside of any instance.
    ///
    /// # Errors
    ///
    /// `UnresolvedImport` if nothing is registered under the name,
    /// `ArityMismatch` or `TypeMismatch` if `args` do not fit the signature,
    /// and whatever the handler itself returns.
    pub fn call_host_function(&self, module_name: &str, function_name: &str, args: &[Value]) -> Result<Vec<Value>> {
        let func = self
            .get_host_function(module_name, function_name)
            .ok_or_else(|| Error::unresolved_import(module_name, function_name))?;
        let params = &func.ty().params;
        if args.len() != params.len() {
            return Err(Error::arity_mismatch(params.len(), args.len()));
        }
        for (i, (arg, ty)) in args.iter().zip(params).enumerate() {
            if !arg.matches_type(*ty) {
                return Err(Error::type_mismatch(format!("argument {i}"), ty, arg.value_type()));
            }
        }
        func.call(args)
    }

    /// Names of all modules with at least one host function, sorted.
    pub fn get_registered_modules(&self) -> Vec<&String> {
        let mut modules: Vec<&String> = self.host_functions.keys().collect();
        modules.sort();
        modules
    }

    /// Names of the functions registered under `module_name`, sorted.
    pub fn get_registered_functions(&self, module_name: &str) -> Vec<&String> {
        let mut names: Vec<&String> = self
            .host_functions
            .get(module_name)
            .map(|fields| fields.keys().collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    /// Number of registered functions across all modules.
    pub fn len(&self) -> usize {
        self.host_functions.values().map(HashMap::len).sum()
    }

    /// Whether no function is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// `module.name`, the form used in diagnostics
pub fn function_key(module_name: &str, function_name: &str) -> String {
    format!("{module_name}.{function_name}")
}

#[cfg(test)]
mod tests {
    use wlm_error::ErrorKind;
    use wlm_format::ValueType;

    use super::*;
    use crate::function::CloneableFn;

    fn registry() -> HostRegistry {
        let mut registry = HostRegistry::new();
        registry.register_host_function(
            "env",
            "add",
            FuncType::new([ValueType::I32, ValueType::I32], [ValueType::I32]),
            CloneableFn::new(|args: &[Value]| {
                let a = args[0].as_i32().unwrap_or_default();
                let b = args[1].as_i32().unwrap_or_default();
                Ok(vec![Value::I32(a.wrapping_add(b))])
            }),
        );
        registry
    }

    #[test]
    fn test_register_and_call() {
        let registry = registry();
        assert!(registry.has_host_function("env", "add"));
        assert!(!registry.has_host_function("env", "sub"));
        assert!(!registry.has_host_function("Env", "add"));
        assert_eq!(
            registry.call_host_function("env", "add", &[Value::I32(2), Value::I32(3)]).unwrap(),
            vec![Value::I32(5)]
        );
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get_registered_modules(), vec!["env"]);
        assert_eq!(registry.get_registered_functions("env"), vec!["add"]);
    }

    #[test]
    fn test_call_validation() {
        let registry = registry();
        let err = registry.call_host_function("env", "missing", &[]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnresolvedImport);
        let err = registry.call_host_function("env", "add", &[Value::I32(1)]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ArityMismatch);
        let err = registry.call_host_function("env", "add", &[Value::I32(1), Value::F32(1.0)]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
    }

    #[test]
    fn test_function_key() {
        assert_eq!(function_key("env", "log"), "env.log");
    }
}
