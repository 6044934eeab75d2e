//! Host function implementation for the WebAssembly Lifecycle Manager.
//!
//! A host function is a native closure paired with the signature it is
//! exposed under. Instances call it through the import they were linked
//! with; the closure never sees the calling instance.

use core::fmt;

use wlm_error::{Error, Result};
use wlm_format::{FuncType, Value};

/// A trait for functions that can be cloned and operate on a slice of
/// [`Value`]s.
pub trait FnWithValues: Send + Sync {
    /// Calls the function with the given arguments.
    fn call(&self, args: &[Value]) -> Result<Vec<Value>>;

    /// Clones the function into a `Box`.
    fn clone_box(&self) -> Box<dyn FnWithValues>;
}

impl<F> FnWithValues for F
where
    F: Fn(&[Value]) -> Result<Vec<Value>> + Send + Sync + Clone + 'static,
{
    fn call(&self, args: &[Value]) -> Result<Vec<Value>> {
        self(args)
    }

    fn clone_box(&self) -> Box<dyn FnWithValues> {
        Box::new(self.clone())
    }
}

/// A wrapper struct that makes a closure implementing `Fn` cloneable
/// by boxing it and handling the cloning via the `FnWithValues` trait.
pub struct CloneableFn(Box<dyn FnWithValues>);

impl CloneableFn {
    /// Creates a new `CloneableFn` from a closure.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Vec<Value>> + Send + Sync + Clone + 'static,
    {
        Self(Box::new(f))
    }

    /// Calls the wrapped function.
    pub fn call(&self, args: &[Value]) -> Result<Vec<Value>> {
        self.0.call(args)
    }
}

impl Clone for CloneableFn {
    fn clone(&self) -> Self {
        Self(self.0.clone_box())
    }
}

impl fmt::Debug for CloneableFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CloneableFn")
    }
}

/// Host function handler type for implementing WebAssembly imports
pub type HostFunctionHandler = CloneableFn;

/// A host function together with the signature it is imported under
#[derive(Debug, Clone)]
pub struct HostFunc {
    ty:      FuncType,
    handler: HostFunctionHandler,
}

impl HostFunc {
    /// Pair `handler` with the signature `ty`.
    pub fn new(ty: FuncType, handler: HostFunctionHandler) -> Self {
        Self { ty, handler }
    }

    /// Wrap a closure directly.
    pub fn wrap<F>(ty: FuncType, f: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Vec<Value>> + Send + Sync + Clone + 'static,
    {
        Self::new(ty, CloneableFn::new(f))
    }

    /// Signature of the function.
    pub fn ty(&self) -> &FuncType {
        &self.ty
    }

    /// Invoke the handler and check the shape of what it returns.
    ///
    /// Arguments are expected to match the signature already. A handler
    /// returning the wrong number or types of results is an engine fault,
    /// since the calling code cannot continue with a malformed stack.
    pub fn call(&self, args: &[Value]) -> Result<Vec<Value>> {
        let results = self.handler.call(args)?;
        if results.len() != self.ty.results.len()
            || results.iter().zip(&self.ty.results).any(|(value, ty)| !value.matches_type(*ty))
        {
            return Err(Error::engine_fault(format!(
                "host function of type {} returned {} values of the wrong shape",
                self.ty,
                results.len()
            )));
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use wlm_error::ErrorKind;
    use wlm_format::ValueType;

    use super::*;

    #[test]
    fn test_cloneable_fn() {
        let f = CloneableFn::new(|_: &[Value]| Ok(vec![Value::I32(42)]));
        let f2 = f.clone();

        assert_eq!(f.call(&[]).unwrap(), vec![Value::I32(42)]);
        assert_eq!(f2.call(&[]).unwrap(), vec![Value::I32(42)]);
    }

    #[test]
    fn host_func_checks_result_shape() {
        let ty = FuncType::new([ValueType::I32], [ValueType::I32]);
        let double = HostFunc::wrap(ty.clone(), |args: &[Value]| {
            let x = args[0].as_i32().unwrap_or_default();
            Ok(vec![Value::I32(x * 2)])
        });
        assert_eq!(double.call(&[Value::I32(21)]).unwrap(), vec![Value::I32(42)]);

        let wrong = HostFunc::wrap(ty, |_: &[Value]| Ok(vec![Value::I64(1)]));
        assert_eq!(wrong.call(&[Value::I32(0)]).unwrap_err().kind(), ErrorKind::EngineFault);
    }

    #[test]
    fn host_errors_propagate() {
        let ty = FuncType::new([], []);
        let failing = HostFunc::wrap(ty, |_: &[Value]| Err(Error::trap("host refused")));
        assert_eq!(failing.call(&[]).unwrap_err().kind(), ErrorKind::Trap);
    }
}
