//! WebAssembly global value implementation

use wlm_error::{Error, Result};
use wlm_format::{GlobalType, Value};

/// Represents a WebAssembly global variable in the runtime
#[derive(Debug, Clone, PartialEq)]
pub struct Global {
    ty:    GlobalType,
    value: Value,
}

impl Global {
    /// Create a global holding `value`.
    ///
    /// # Errors
    ///
    /// `TypeMismatch` if `value` does not have the global's value type.
    pub fn new(ty: GlobalType, value: Value) -> Result<Self> {
        if !value.matches_type(ty.value_type) {
            return Err(Error::type_mismatch("global initial value", ty.value_type, value.value_type()));
        }
        Ok(Self { ty, value })
    }

    /// Get the current value
    pub fn get(&self) -> Value {
        self.value
    }

    /// Set the value.
    ///
    /// # Errors
    ///
    /// `IllegalState` for an immutable global, `TypeMismatch` if the value
    /// has the wrong type.
    pub fn set(&mut self, value: Value) -> Result<()> {
        if !self.ty.mutable {
            return Err(Error::illegal_state("set a global", "immutable"));
        }
        if !value.matches_type(self.ty.value_type) {
            return Err(Error::type_mismatch("global value", self.ty.value_type, value.value_type()));
        }
        self.value = value;
        Ok(())
    }

    /// Type of the global
    pub fn ty(&self) -> GlobalType {
        self.ty
    }
}

#[cfg(test)]
mod tests {
    use wlm_error::ErrorKind;
    use wlm_format::ValueType;

    use super::*;

    #[test]
    fn set_respects_mutability_and_type() {
        let mut counter = Global::new(
            GlobalType {
                value_type: ValueType::I32,
                mutable:    true,
            },
            Value::I32(0),
        )
        .unwrap();
        counter.set(Value::I32(5)).unwrap();
        assert_eq!(counter.get(), Value::I32(5));
        assert_eq!(counter.set(Value::I64(5)).unwrap_err().kind(), ErrorKind::TypeMismatch);

        let mut constant = Global::new(
            GlobalType {
                value_type: ValueType::F64,
                mutable:    false,
            },
            Value::F64(1.5),
        )
        .unwrap();
        assert_eq!(constant.set(Value::F64(2.0)).unwrap_err().kind(), ErrorKind::IllegalState);
        assert!(Global::new(constant.ty(), Value::I32(0)).is_err());
    }
}
