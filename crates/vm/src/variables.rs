//! Variable storage.
//!
//! A name is either a plain value slot or locked to an expression.
//! A lock shadows the slot: reads re-evaluate the expression, and the
//! slot value (if any) reappears when the lock is removed.

use helmscript_common::ExprCode;
use helmscript_common::Value;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct Variables {
    values: HashMap<String, Value>,
    locks: HashMap<String, ExprCode>,
}

impl Variables {
    pub fn new() -> Variables {
        Variables::default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn set(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_string(), value);
    }

    /// The lock expression shadowing `name`, if any.
    pub fn lock_expr(&self, name: &str) -> Option<&ExprCode> {
        self.locks.get(name)
    }

    /// Install a lock, replacing any previous lock on the same name.
    pub fn lock(&mut self, name: &str, expr: ExprCode) {
        self.locks.insert(name.to_string(), expr);
    }

    /// Remove one lock. Returns whether a lock was present.
    pub fn unlock(&mut self, name: &str) -> bool {
        self.locks.remove(name).is_some()
    }

    /// Remove every lock, returning the names that were locked.
    pub fn unlock_all(&mut self) -> Vec<String> {
        self.locks.drain().map(|(name, _)| name).collect()
    }

    pub fn locked_names(&self) -> impl Iterator<Item = &str> {
        self.locks.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use helmscript_common::{Opcode, OpcodeKind};
    use std::sync::Arc;

    fn push_one() -> ExprCode {
        Arc::new(vec![Opcode::new(OpcodeKind::Push(Value::Scalar(1.0)))])
    }

    #[test]
    fn lock_shadows_without_erasing_the_slot() {
        let mut vars = Variables::new();
        vars.set("x", Value::Scalar(5.0));
        vars.lock("x", push_one());
        assert!(vars.lock_expr("x").is_some());
        assert_eq!(vars.get("x"), Some(&Value::Scalar(5.0)));
        assert!(vars.unlock("x"));
        assert!(vars.lock_expr("x").is_none());
    }

    #[test]
    fn relock_replaces_the_binding() {
        let mut vars = Variables::new();
        let first = push_one();
        vars.lock("x", first.clone());
        let second = push_one();
        vars.lock("x", second.clone());
        assert!(Arc::ptr_eq(vars.lock_expr("x").unwrap(), &second));
    }

    #[test]
    fn unlock_all_reports_names() {
        let mut vars = Variables::new();
        vars.lock("a", push_one());
        vars.lock("b", push_one());
        let mut names = vars.unlock_all();
        names.sort();
        assert_eq!(names, vec!["a", "b"]);
        assert!(!vars.unlock("a"));
    }
}
