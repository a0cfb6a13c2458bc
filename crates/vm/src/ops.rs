//! Value-level operators.
//!
//! Shared between the main interpreter loop and the detached
//! expression evaluator so `1 + 1` means the same thing in a statement,
//! a lock binding, and a trigger condition.

use crate::error::RuntimeError;
use helmscript_common::Value;

pub fn add(a: Value, b: Value) -> Result<Value, RuntimeError> {
    match (&a, &b) {
        (Value::Text(_), _) | (_, Value::Text(_)) => {
            Ok(Value::Text(format!("{}{}", a, b)))
        }
        _ => {
            let (a, b) = scalars(a, b, "ADD")?;
            Ok(Value::Scalar(a + b))
        }
    }
}

pub fn sub(a: Value, b: Value) -> Result<Value, RuntimeError> {
    let (a, b) = scalars(a, b, "SUB")?;
    Ok(Value::Scalar(a - b))
}

pub fn mul(a: Value, b: Value) -> Result<Value, RuntimeError> {
    let (a, b) = scalars(a, b, "MUL")?;
    Ok(Value::Scalar(a * b))
}

pub fn div(a: Value, b: Value) -> Result<Value, RuntimeError> {
    let (a, b) = scalars(a, b, "DIV")?;
    if b == 0.0 {
        return Err(RuntimeError::DivisionByZero);
    }
    Ok(Value::Scalar(a / b))
}

pub fn pow(a: Value, b: Value) -> Result<Value, RuntimeError> {
    let (a, b) = scalars(a, b, "POW")?;
    Ok(Value::Scalar(a.powf(b)))
}

pub fn neg(a: Value) -> Result<Value, RuntimeError> {
    let a = scalar(a, "NEG")?;
    Ok(Value::Scalar(-a))
}

pub fn not(a: Value) -> Result<Value, RuntimeError> {
    let a = truthy(a, "NOT")?;
    Ok(Value::Bool(!a))
}

pub fn and(a: Value, b: Value) -> Result<Value, RuntimeError> {
    Ok(Value::Bool(truthy(a, "AND")? && truthy(b, "AND")?))
}

pub fn or(a: Value, b: Value) -> Result<Value, RuntimeError> {
    Ok(Value::Bool(truthy(a, "OR")? || truthy(b, "OR")?))
}

pub fn eq(a: Value, b: Value) -> Result<Value, RuntimeError> {
    Ok(Value::Bool(values_equal(&a, &b)))
}

pub fn ne(a: Value, b: Value) -> Result<Value, RuntimeError> {
    Ok(Value::Bool(!values_equal(&a, &b)))
}

pub fn lt(a: Value, b: Value) -> Result<Value, RuntimeError> {
    let (a, b) = scalars(a, b, "LT")?;
    Ok(Value::Bool(a < b))
}

pub fn gt(a: Value, b: Value) -> Result<Value, RuntimeError> {
    let (a, b) = scalars(a, b, "GT")?;
    Ok(Value::Bool(a > b))
}

pub fn le(a: Value, b: Value) -> Result<Value, RuntimeError> {
    let (a, b) = scalars(a, b, "LE")?;
    Ok(Value::Bool(a <= b))
}

pub fn ge(a: Value, b: Value) -> Result<Value, RuntimeError> {
    let (a, b) = scalars(a, b, "GE")?;
    Ok(Value::Bool(a >= b))
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Text(a), Value::Text(b)) => a == b,
        _ => match (a.as_scalar(), b.as_scalar()) {
            (Some(a), Some(b)) => a == b,
            _ => a == b,
        },
    }
}

fn scalar(value: Value, op: &'static str) -> Result<f64, RuntimeError> {
    value.as_scalar().ok_or(RuntimeError::TypeMismatch { op })
}

fn scalars(a: Value, b: Value, op: &'static str) -> Result<(f64, f64), RuntimeError> {
    Ok((scalar(a, op)?, scalar(b, op)?))
}

fn truthy(value: Value, op: &'static str) -> Result<bool, RuntimeError> {
    value.truthiness().ok_or(RuntimeError::TypeMismatch { op })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_arithmetic() {
        assert_eq!(add(Value::Scalar(2.0), Value::Scalar(3.0)), Ok(Value::Scalar(5.0)));
        assert_eq!(div(Value::Scalar(1.0), Value::Scalar(4.0)), Ok(Value::Scalar(0.25)));
        assert_eq!(pow(Value::Scalar(2.0), Value::Scalar(10.0)), Ok(Value::Scalar(1024.0)));
    }

    #[test]
    fn text_concatenation_on_add() {
        assert_eq!(
            add(Value::Text("alt: ".into()), Value::Scalar(100.0)),
            Ok(Value::Text("alt: 100".into()))
        );
    }

    #[test]
    fn division_by_zero() {
        assert_eq!(
            div(Value::Scalar(1.0), Value::Scalar(0.0)),
            Err(RuntimeError::DivisionByZero)
        );
    }

    #[test]
    fn booleans_coerce_in_arithmetic() {
        assert_eq!(add(Value::Bool(true), Value::Scalar(1.0)), Ok(Value::Scalar(2.0)));
    }

    #[test]
    fn comparisons_need_scalars() {
        assert_eq!(
            lt(Value::Text("a".into()), Value::Scalar(1.0)),
            Err(RuntimeError::TypeMismatch { op: "LT" })
        );
    }

    #[test]
    fn equality_crosses_bool_and_scalar() {
        assert_eq!(eq(Value::Bool(true), Value::Scalar(1.0)), Ok(Value::Bool(true)));
        assert_eq!(eq(Value::Text("a".into()), Value::Text("a".into())), Ok(Value::Bool(true)));
        assert_eq!(eq(Value::Text("a".into()), Value::Scalar(1.0)), Ok(Value::Bool(false)));
    }

    #[test]
    fn logic_rejects_text() {
        assert_eq!(
            not(Value::Text("yes".into())),
            Err(RuntimeError::TypeMismatch { op: "NOT" })
        );
        assert_eq!(and(Value::Bool(true), Value::Scalar(2.0)), Ok(Value::Bool(true)));
    }
}
