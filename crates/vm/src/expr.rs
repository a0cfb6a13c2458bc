//! Detached expression evaluation.
//!
//! Lock bindings, trigger conditions, and WAIT UNTIL conditions carry
//! their expressions as pure opcode slices, re-evaluated outside the
//! main instruction loop. Evaluation is depth-limited so a lock whose
//! expression reads itself fails instead of recursing forever.

use crate::error::RuntimeError;
use crate::host::Host;
use crate::ops;
use crate::variables::Variables;
use helmscript_common::{Opcode, OpcodeKind, Value};

/// How many lock bindings a single read may traverse.
const MAX_LOCK_DEPTH: u32 = 32;

/// Evaluate a pure expression slice to a single value.
pub fn eval(
    code: &[Opcode],
    vars: &Variables,
    host: &mut dyn Host,
) -> Result<Value, RuntimeError> {
    eval_at_depth(code, vars, host, 0)
}

/// Read a named value: a lock binding shadows a variable slot, which
/// shadows a host binding.
pub fn load_value(
    name: &str,
    vars: &Variables,
    host: &mut dyn Host,
) -> Result<Value, RuntimeError> {
    load_at_depth(name, vars, host, 0)
}

fn eval_at_depth(
    code: &[Opcode],
    vars: &Variables,
    host: &mut dyn Host,
    depth: u32,
) -> Result<Value, RuntimeError> {
    let mut stack: Vec<Value> = Vec::new();
    for op in code {
        let result = step(&op.kind, &mut stack, vars, host, depth)?;
        stack.push(result);
    }
    Ok(stack.pop().unwrap_or(Value::Empty))
}

fn load_at_depth(
    name: &str,
    vars: &Variables,
    host: &mut dyn Host,
    depth: u32,
) -> Result<Value, RuntimeError> {
    if let Some(expr) = vars.lock_expr(name) {
        if depth >= MAX_LOCK_DEPTH {
            return Err(RuntimeError::LockRecursion {
                name: name.to_string(),
            });
        }
        let expr = expr.clone();
        return eval_at_depth(&expr, vars, host, depth + 1);
    }
    if let Some(value) = vars.get(name) {
        return Ok(value.clone());
    }
    if let Some(value) = host.binding_get(name) {
        return Ok(value);
    }
    Err(RuntimeError::UndefinedVariable {
        name: name.to_string(),
    })
}

fn step(
    kind: &OpcodeKind,
    stack: &mut Vec<Value>,
    vars: &Variables,
    host: &mut dyn Host,
    depth: u32,
) -> Result<Value, RuntimeError> {
    match kind {
        OpcodeKind::Push(value) => Ok(value.clone()),
        OpcodeKind::Load(name) => load_at_depth(name, vars, host, depth),
        OpcodeKind::Neg => ops::neg(stack.pop().unwrap_or(Value::Empty)),
        OpcodeKind::Not => ops::not(stack.pop().unwrap_or(Value::Empty)),
        OpcodeKind::Add => binary(stack, ops::add),
        OpcodeKind::Sub => binary(stack, ops::sub),
        OpcodeKind::Mul => binary(stack, ops::mul),
        OpcodeKind::Div => binary(stack, ops::div),
        OpcodeKind::Pow => binary(stack, ops::pow),
        OpcodeKind::And => binary(stack, ops::and),
        OpcodeKind::Or => binary(stack, ops::or),
        OpcodeKind::Eq => binary(stack, ops::eq),
        OpcodeKind::Ne => binary(stack, ops::ne),
        OpcodeKind::Lt => binary(stack, ops::lt),
        OpcodeKind::Gt => binary(stack, ops::gt),
        OpcodeKind::Le => binary(stack, ops::le),
        OpcodeKind::Ge => binary(stack, ops::ge),
        // Expression slices are pure; anything else never appears.
        _ => Err(RuntimeError::TypeMismatch { op: "expression" }),
    }
}

fn binary(
    stack: &mut Vec<Value>,
    op: fn(Value, Value) -> Result<Value, RuntimeError>,
) -> Result<Value, RuntimeError> {
    let b = stack.pop().unwrap_or(Value::Empty);
    let a = stack.pop().unwrap_or(Value::Empty);
    op(a, b)
}

/// Evaluate an expression slice down to a boolean reading.
pub fn eval_condition(
    code: &[Opcode],
    vars: &Variables,
    host: &mut dyn Host,
) -> Result<bool, RuntimeError> {
    let value = eval(code, vars, host)?;
    value
        .truthiness()
        .ok_or(RuntimeError::TypeMismatch { op: "condition" })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::NullHost;
    use helmscript_common::Opcode;
    use std::sync::Arc;

    fn code(kinds: Vec<OpcodeKind>) -> Vec<Opcode> {
        kinds.into_iter().map(Opcode::new).collect()
    }

    #[test]
    fn arithmetic_evaluates() {
        let code = code(vec![
            OpcodeKind::Push(Value::Scalar(5.0)),
            OpcodeKind::Push(Value::Scalar(5.0)),
            OpcodeKind::Add,
        ]);
        let vars = Variables::new();
        let mut host = NullHost;
        assert_eq!(eval(&code, &vars, &mut host), Ok(Value::Scalar(10.0)));
    }

    #[test]
    fn lock_chain_resolves_through_variables() {
        let mut vars = Variables::new();
        vars.set("base", Value::Scalar(2.0));
        vars.lock(
            "doubled",
            Arc::new(code(vec![
                OpcodeKind::Load("base".into()),
                OpcodeKind::Push(Value::Scalar(2.0)),
                OpcodeKind::Mul,
            ])),
        );
        let mut host = NullHost;
        assert_eq!(
            load_value("doubled", &vars, &mut host),
            Ok(Value::Scalar(4.0))
        );
    }

    #[test]
    fn self_referential_lock_errors() {
        let mut vars = Variables::new();
        vars.lock("x", Arc::new(code(vec![OpcodeKind::Load("x".into())])));
        let mut host = NullHost;
        assert_eq!(
            load_value("x", &vars, &mut host),
            Err(RuntimeError::LockRecursion { name: "x".into() })
        );
    }

    #[test]
    fn undefined_name_errors() {
        let vars = Variables::new();
        let mut host = NullHost;
        assert_eq!(
            load_value("ghost", &vars, &mut host),
            Err(RuntimeError::UndefinedVariable { name: "ghost".into() })
        );
    }

    #[test]
    fn condition_rejects_text() {
        let code = code(vec![OpcodeKind::Push(Value::Text("go".into()))]);
        let vars = Variables::new();
        let mut host = NullHost;
        assert!(eval_condition(&code, &vars, &mut host).is_err());
    }
}
