//! Inter-machine program dispatch.
//!
//! `RUN "file" ON volume` routes a compiled program to whichever
//! machine owns the named storage volume. The registry maps volumes to
//! machines and queues delivered programs in per-machine mailboxes;
//! the host drains each mailbox into its machine at the start of that
//! machine's next slice.

use crate::error::DispatchError;
use helmscript_common::CodePart;
use std::collections::{HashMap, VecDeque};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProcessorId(pub u32);

/// A program queued for delivery: its name and its compiled parts.
#[derive(Debug, Clone)]
pub struct QueuedProgram {
    pub name: String,
    pub parts: Vec<CodePart>,
}

#[derive(Debug, Default)]
pub struct ProcessorRegistry {
    next_id: u32,
    owners: HashMap<String, ProcessorId>,
    mailboxes: HashMap<ProcessorId, VecDeque<QueuedProgram>>,
}

impl ProcessorRegistry {
    pub fn new() -> ProcessorRegistry {
        ProcessorRegistry::default()
    }

    /// Register a machine and create its mailbox.
    pub fn register(&mut self) -> ProcessorId {
        let id = ProcessorId(self.next_id);
        self.next_id += 1;
        self.mailboxes.insert(id, VecDeque::new());
        id
    }

    /// Remove a machine, its mailbox, and every volume it owned.
    pub fn unregister(&mut self, id: ProcessorId) {
        self.mailboxes.remove(&id);
        self.owners.retain(|_, owner| *owner != id);
    }

    /// Declare a machine the owner of a volume, replacing any previous
    /// owner.
    pub fn attach_volume(&mut self, id: ProcessorId, volume: &str) {
        self.owners.insert(volume.to_string(), id);
    }

    pub fn detach_volume(&mut self, volume: &str) {
        self.owners.remove(volume);
    }

    pub fn owner_of(&self, volume: &str) -> Option<ProcessorId> {
        self.owners.get(volume).copied()
    }

    /// Queue a program on the machine owning `volume`.
    pub fn run_program_on(
        &mut self,
        program: QueuedProgram,
        volume: &str,
    ) -> Result<(), DispatchError> {
        let id = self
            .owners
            .get(volume)
            .copied()
            .ok_or_else(|| DispatchError::VolumeNotAttached {
                volume: volume.to_string(),
            })?;
        let mailbox = self
            .mailboxes
            .get_mut(&id)
            .ok_or(DispatchError::ProcessorNotFound)?;
        info!(program = %program.name, volume, machine = id.0, "dispatching program");
        mailbox.push_back(program);
        Ok(())
    }

    /// Drain a machine's mailbox, oldest first.
    pub fn take_pending(&mut self, id: ProcessorId) -> Vec<QueuedProgram> {
        self.mailboxes
            .get_mut(&id)
            .map(|mailbox| mailbox.drain(..).collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn program(name: &str) -> QueuedProgram {
        QueuedProgram {
            name: name.to_string(),
            parts: Vec::new(),
        }
    }

    #[test]
    fn dispatch_reaches_the_volume_owner() {
        let mut registry = ProcessorRegistry::new();
        let a = registry.register();
        let b = registry.register();
        registry.attach_volume(a, "core");
        registry.attach_volume(b, "probe");

        registry.run_program_on(program("boot"), "probe").unwrap();
        assert!(registry.take_pending(a).is_empty());
        let delivered = registry.take_pending(b);
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].name, "boot");
        assert!(registry.take_pending(b).is_empty());
    }

    #[test]
    fn unknown_volume_is_an_error() {
        let mut registry = ProcessorRegistry::new();
        registry.register();
        let err = registry.run_program_on(program("boot"), "ghost").unwrap_err();
        assert_eq!(
            err,
            DispatchError::VolumeNotAttached {
                volume: "ghost".into()
            }
        );
    }

    #[test]
    fn unregistered_machine_keeps_no_volumes() {
        let mut registry = ProcessorRegistry::new();
        let a = registry.register();
        registry.attach_volume(a, "core");
        registry.unregister(a);
        let err = registry.run_program_on(program("boot"), "core").unwrap_err();
        assert!(matches!(err, DispatchError::VolumeNotAttached { .. }));
    }

    #[test]
    fn reattaching_a_volume_moves_ownership() {
        let mut registry = ProcessorRegistry::new();
        let a = registry.register();
        let b = registry.register();
        registry.attach_volume(a, "core");
        registry.attach_volume(b, "core");
        registry.run_program_on(program("boot"), "core").unwrap();
        assert!(registry.take_pending(a).is_empty());
        assert_eq!(registry.take_pending(b).len(), 1);
    }

    #[test]
    fn mailboxes_deliver_in_order() {
        let mut registry = ProcessorRegistry::new();
        let a = registry.register();
        registry.attach_volume(a, "core");
        registry.run_program_on(program("first"), "core").unwrap();
        registry.run_program_on(program("second"), "core").unwrap();
        let names: Vec<String> = registry
            .take_pending(a)
            .into_iter()
            .map(|queued| queued.name)
            .collect();
        assert_eq!(names, vec!["first", "second"]);
    }
}
