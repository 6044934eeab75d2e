//! Fluent construction of a [`HostRegistry`].

use wlm_error::{Error, Result};
use wlm_format::{FuncType, Value};

use crate::callback::{HostRegistry, function_key};
use crate::function::{CloneableFn, HostFunctionHandler};

/// Builder collecting host functions before linking
///
/// ```
/// use wlm_format::{FuncType, Value, ValueType};
/// use wlm_host::HostBuilder;
///
/// let registry = HostBuilder::new()
///     .with_host_function(
///         "env",
///         "answer",
///         FuncType::new([], [ValueType::I32]),
///         |_: &[Value]| Ok(vec![Value::I32(42)]),
///     )
///     .build()
///     .unwrap();
/// assert!(registry.has_host_function("env", "answer"));
/// ```
#[derive(Debug, Default)]
pub struct HostBuilder {
    registry:   HostRegistry,
    duplicates: Vec<String>,
}

impl HostBuilder {
    /// Start with an empty set of functions
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a closure as `module_name.function_name` with signature `ty`.
    #[must_use]
    pub fn with_host_function<F>(self, module_name: &str, function_name: &str, ty: FuncType, f: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Vec<Value>> + Send + Sync + Clone + 'static,
    {
        self.with_handler(module_name, function_name, ty, CloneableFn::new(f))
    }

    /// Add an existing handler as `module_name.function_name`.
    #[must_use]
    pub fn with_handler(
        mut self,
        module_name: &str,
        function_name: &str,
        ty: FuncType,
        handler: HostFunctionHandler,
    ) -> Self {
        if self.registry.has_host_function(module_name, function_name) {
            self.duplicates.push(function_key(module_name, function_name));
        }
        self.registry.register_host_function(module_name, function_name, ty, handler);
        self
    }

    /// Finish the registry.
    ///
    /// # Errors
    ///
    /// Fails if the same name was registered twice.
    pub fn build(self) -> Result<HostRegistry> {
        if !self.duplicates.is_empty() {
            return Err(Error::link_error(format!(
                "host functions registered more than once: {}",
                self.duplicates.join(", ")
            )));
        }
        Ok(self.registry)
    }
}
