//! HelmScript virtual machine.
//!
//! The VM side of the toolchain: linking compiled parts into programs
//! with identity-stable relocation, the time-sliced stack machine with
//! temporal triggers and lock bindings, and the registry that routes
//! programs between machines by storage volume.

mod dispatch;
mod error;
mod execute;
mod expr;
mod host;
mod machine;
mod ops;
mod program_context;
mod stack;
mod triggers;
mod variables;

pub use dispatch::{ProcessorId, ProcessorRegistry, QueuedProgram};
pub use error::{DispatchError, RuntimeError};
pub use host::{Host, NullHost};
pub use machine::{Machine, MachineConfig, MachineState, WaitCondition};
pub use program_context::{ContextKind, ProgramContext};
pub use stack::MAX_STACK_SIZE;
