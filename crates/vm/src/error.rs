//! Runtime error taxonomy.

use thiserror::Error;

/// Errors raised while executing opcodes. Each one aborts the current
/// program (the machine reports it and returns to the interpreter);
/// none of them poison the machine itself.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    #[error("type mismatch in {op}")]
    TypeMismatch { op: &'static str },

    #[error("undefined variable '{name}'")]
    UndefinedVariable { name: String },

    #[error("division by zero")]
    DivisionByZero,

    #[error("stack overflow")]
    StackOverflow,

    #[error("invalid number {value}")]
    InvalidNumber { value: f64 },

    #[error("lock '{name}' recursively references itself")]
    LockRecursion { name: String },

    #[error("WAIT is not allowed inside a trigger body")]
    WaitInTrigger,

    #[error("RUN is not allowed inside a trigger body")]
    RunInTrigger,

    #[error("PRESERVE outside a trigger body")]
    PreserveOutsideTrigger,

    #[error("trigger body exceeded its instruction budget")]
    TriggerBudgetExceeded,

    #[error("could not load program: {message}")]
    LoadFailed { message: String },

    #[error("instruction pointer {addr} out of range")]
    InvalidAddress { addr: usize },

    #[error("end of trigger reached outside a trigger body")]
    StrayEndTrigger,

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

/// Errors raised while routing a program to another machine.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DispatchError {
    #[error("no machine owns volume '{volume}'")]
    VolumeNotAttached { volume: String },

    #[error("machine is no longer registered")]
    ProcessorNotFound,
}
