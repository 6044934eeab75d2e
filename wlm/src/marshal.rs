//! Conversion between plain numbers and typed values.
//!
//! Embedders that only deal in `f64` (command lines, scripting bridges)
//! pass arguments through [`to_values`] and read results back through
//! [`from_values`].

use wlm_error::{Error, Result};
use wlm_format::{FuncType, Value, ValueType};

/// Convert `args` into values of the parameter types of `ty`.
///
/// Integers are truncated toward zero and saturate at the bounds of their
/// type; `f32` parameters are narrowed.
///
/// # Errors
///
/// `ArityMismatch` on a wrong argument count, `TypeMismatch` for reference
/// parameters, which have no numeric form.
pub fn to_values(ty: &FuncType, args: &[f64]) -> Result<Vec<Value>> {
    if args.len() != ty.params.len() {
        return Err(Error::arity_mismatch(ty.params.len(), args.len()));
    }
    args.iter()
        .zip(&ty.params)
        .enumerate()
        .map(|(i, (arg, param))| match param {
            ValueType::I32 => Ok(Value::I32(*arg as i32)),
            ValueType::I64 => Ok(Value::I64(*arg as i64)),
            ValueType::F32 => Ok(Value::F32(*arg as f32)),
            ValueType::F64 => Ok(Value::F64(*arg)),
            ValueType::FuncRef | ValueType::ExternRef => {
                Err(Error::type_mismatch(format!("argument {i}"), param, "number"))
            }
        })
        .collect()
}

/// Convert numeric results back to `f64`.
///
/// # Errors
///
/// `TypeMismatch` for reference results.
pub fn from_values(values: &[Value]) -> Result<Vec<f64>> {
    values
        .iter()
        .enumerate()
        .map(|(i, value)| match value {
            Value::I32(v) => Ok(f64::from(*v)),
            Value::I64(v) => Ok(*v as f64),
            Value::F32(v) => Ok(f64::from(*v)),
            Value::F64(v) => Ok(*v),
            Value::FuncRef(_) | Value::ExternRef(_) => {
                Err(Error::type_mismatch(format!("result {i}"), "number", value.value_type()))
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use wlm_error::ErrorKind;

    use super::*;

    #[test]
    fn arguments_follow_the_signature() {
        let ty = FuncType::new([ValueType::I32, ValueType::I64, ValueType::F32, ValueType::F64], []);
        let values = to_values(&ty, &[-2.7, 1e10, 0.1, 0.1]).unwrap();
        assert_eq!(
            values,
            vec![Value::I32(-2), Value::I64(10_000_000_000), Value::F32(0.1), Value::F64(0.1)]
        );
        assert_eq!(to_values(&ty, &[1.0]).unwrap_err().kind(), ErrorKind::ArityMismatch);
        assert_eq!(to_values(&FuncType::new([ValueType::I32], []), &[1e12]).unwrap(), vec![Value::I32(i32::MAX)]);
    }

    #[test]
    fn references_have_no_numeric_form() {
        let ty = FuncType::new([ValueType::FuncRef], []);
        assert_eq!(to_values(&ty, &[0.0]).unwrap_err().kind(), ErrorKind::TypeMismatch);
        assert_eq!(from_values(&[Value::ExternRef(None)]).unwrap_err().kind(), ErrorKind::TypeMismatch);
        assert_eq!(from_values(&[Value::I32(-1), Value::F32(0.5)]).unwrap(), vec![-1.0, 0.5]);
    }
}
