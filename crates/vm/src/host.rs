//! The machine's view of the world outside it.
//!
//! Everything environment-specific sits behind [`Host`]: named
//! bindings (sensor reads, actuator writes), the output sink, program
//! storage, and routing of programs to other machines. The interpreter
//! core never touches the environment directly.

use crate::error::RuntimeError;
use helmscript_common::{CodePart, Value};

pub trait Host {
    /// Read a host binding. `None` when the host exposes no binding
    /// under this name.
    fn binding_get(&self, name: &str) -> Option<Value>;

    /// Write a host binding. Returns false when the host exposes no
    /// writable binding under this name; the value then lands in the
    /// machine's own variables instead.
    fn binding_set(&mut self, name: &str, value: Value) -> bool;

    /// Write a line to the machine's output.
    fn print(&mut self, text: &str);

    /// Claim or release continuous control of a binding for a lock.
    /// Returns whether the host accepted the claim.
    fn toggle_fly_by_wire(&mut self, name: &str, enabled: bool) -> bool;

    /// Fetch and compile a program from the machine's own storage.
    fn load_program(&mut self, file: &str) -> Result<Vec<CodePart>, RuntimeError>;

    /// Route a program to whichever machine owns `volume`.
    fn dispatch_program(&mut self, file: &str, volume: &str) -> Result<(), RuntimeError>;
}

/// A host with no environment: no bindings, no storage, output is
/// discarded. Useful as a default and in tests that only exercise the
/// interpreter core.
#[derive(Debug, Default)]
pub struct NullHost;

impl Host for NullHost {
    fn binding_get(&self, _name: &str) -> Option<Value> {
        None
    }

    fn binding_set(&mut self, _name: &str, _value: Value) -> bool {
        false
    }

    fn print(&mut self, _text: &str) {}

    fn toggle_fly_by_wire(&mut self, _name: &str, _enabled: bool) -> bool {
        false
    }

    fn load_program(&mut self, file: &str) -> Result<Vec<CodePart>, RuntimeError> {
        Err(RuntimeError::LoadFailed {
            message: format!("no storage holds '{}'", file),
        })
    }

    fn dispatch_program(&mut self, _file: &str, volume: &str) -> Result<(), RuntimeError> {
        Err(crate::error::DispatchError::VolumeNotAttached {
            volume: volume.to_string(),
        }
        .into())
    }
}
