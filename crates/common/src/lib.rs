//! HelmScript common types.
//!
//! The foundational data structures shared by the compiler, the
//! linker, and the virtual machine:
//!
//! - [`Value`] — the closed runtime value representation
//! - [`Opcode`] / [`OpcodeKind`] — one VM instruction with a stable
//!   [`OpcodeId`] identity drawn from a single arena at creation
//! - [`CodePart`] — a named opcode group produced by one compile
//! - [`Program`] — the linked opcode sequence for one machine

pub mod opcode;
pub mod program;
pub mod value;

pub use opcode::{Address, ExprCode, Label, Opcode, OpcodeId, OpcodeKind, Target, TriggerKind};
pub use program::{CodePart, PartKind, Program};
pub use value::Value;
