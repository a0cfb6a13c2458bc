//! Operand stack.

use crate::error::RuntimeError;
use helmscript_common::Value;

/// Default ceiling on operand stack depth.
pub const MAX_STACK_SIZE: usize = 1024;

/// The machine's operand stack. Popping an empty stack yields
/// [`Value::Empty`] rather than an error; script fragments entered
/// interactively routinely leave the stack empty between commands.
#[derive(Debug)]
pub struct Stack {
    values: Vec<Value>,
    limit: usize,
    safe_mode: bool,
}

impl Stack {
    pub fn new(limit: usize, safe_mode: bool) -> Stack {
        Stack {
            values: Vec::new(),
            limit,
            safe_mode,
        }
    }

    pub fn push(&mut self, value: Value) -> Result<(), RuntimeError> {
        if self.values.len() >= self.limit {
            return Err(RuntimeError::StackOverflow);
        }
        if self.safe_mode {
            if let Value::Scalar(n) = value {
                if !n.is_finite() {
                    return Err(RuntimeError::InvalidNumber { value: n });
                }
            }
        }
        self.values.push(value);
        Ok(())
    }

    pub fn pop(&mut self) -> Value {
        self.values.pop().unwrap_or(Value::Empty)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Discard everything. Runs when a program aborts.
    pub fn clear(&mut self) {
        self.values.clear();
    }
}
