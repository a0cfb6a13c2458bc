//! Armed trigger bookkeeping.
//!
//! Arming is keyed by the identity of the body's first opcode, so
//! re-running the statement that armed a trigger replaces the old
//! arming instead of stacking a duplicate. Addresses held here are
//! re-anchored through the same identity after every relink.

use crate::program_context::ProgramContext;
use helmscript_common::{Address, ExprCode, OpcodeId, TriggerKind};
use tracing::warn;

#[derive(Debug, Clone)]
pub struct ArmedTrigger {
    pub kind: TriggerKind,
    pub cond: ExprCode,
    /// Address of the body's first opcode in the current layout.
    pub body_addr: Address,
    /// Identity of the body's first opcode; survives relinks.
    pub body_id: OpcodeId,
    /// Previous condition sample, for edge detection.
    pub last_sample: bool,
}

#[derive(Debug, Default)]
pub struct TriggerSet {
    triggers: Vec<ArmedTrigger>,
}

impl TriggerSet {
    pub fn new() -> TriggerSet {
        TriggerSet::default()
    }

    /// Arm a trigger. An existing arming with the same body identity
    /// is replaced in place, keeping its slot in the firing order.
    pub fn arm(&mut self, trigger: ArmedTrigger) {
        match self
            .triggers
            .iter_mut()
            .find(|armed| armed.body_id == trigger.body_id)
        {
            Some(slot) => *slot = trigger,
            None => self.triggers.push(trigger),
        }
    }

    pub fn disarm(&mut self, body_id: OpcodeId) {
        self.triggers.retain(|armed| armed.body_id != body_id);
    }

    pub fn clear(&mut self) {
        self.triggers.clear();
    }

    pub fn len(&self) -> usize {
        self.triggers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triggers.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ArmedTrigger> {
        self.triggers.get(index)
    }

    pub fn by_id(&self, body_id: OpcodeId) -> Option<&ArmedTrigger> {
        self.triggers.iter().find(|armed| armed.body_id == body_id)
    }

    pub fn by_id_mut(&mut self, body_id: OpcodeId) -> Option<&mut ArmedTrigger> {
        self.triggers
            .iter_mut()
            .find(|armed| armed.body_id == body_id)
    }

    /// Re-anchor every body address after a relink. A body whose
    /// identity vanished from the layout is disarmed.
    pub fn relocate(&mut self, ctx: &ProgramContext) {
        self.triggers.retain_mut(|armed| match ctx.address_of(armed.body_id) {
            Some(addr) => {
                armed.body_addr = addr;
                true
            }
            None => {
                warn!(context = %ctx.name(), "armed trigger body vanished across relink");
                false
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program_context::ContextKind;
    use helmscript_common::{CodePart, Opcode, OpcodeKind, PartKind};
    use std::sync::Arc;

    fn armed(body_id: OpcodeId, body_addr: Address) -> ArmedTrigger {
        ArmedTrigger {
            kind: TriggerKind::Edge,
            cond: Arc::new(vec![]),
            body_addr,
            body_id,
            last_sample: false,
        }
    }

    #[test]
    fn rearming_same_body_replaces_in_place() {
        let mut set = TriggerSet::new();
        let id_a = OpcodeId::fresh();
        let id_b = OpcodeId::fresh();
        set.arm(armed(id_a, 1));
        set.arm(armed(id_b, 5));
        set.arm(ArmedTrigger {
            last_sample: true,
            ..armed(id_a, 1)
        });
        assert_eq!(set.len(), 2);
        assert_eq!(set.get(0).unwrap().body_id, id_a);
        assert!(set.get(0).unwrap().last_sample);
    }

    #[test]
    fn disarm_removes_only_its_trigger() {
        let mut set = TriggerSet::new();
        let id_a = OpcodeId::fresh();
        let id_b = OpcodeId::fresh();
        set.arm(armed(id_a, 1));
        set.arm(armed(id_b, 5));
        set.disarm(id_a);
        assert_eq!(set.len(), 1);
        assert_eq!(set.get(0).unwrap().body_id, id_b);
    }

    #[test]
    fn relocate_follows_body_identity() {
        let mut ctx = ProgramContext::new("interp", ContextKind::Interpreter);
        let mut body = CodePart::new("trigger-L0", PartKind::Trigger, 1);
        body.code = vec![
            Opcode::new(OpcodeKind::Nop),
            Opcode::new(OpcodeKind::EndTrigger),
        ];
        let body_id = body.code[0].id;
        ctx.add_parts(vec![body]);
        let addr = ctx.address_of(body_id).unwrap();

        let mut set = TriggerSet::new();
        set.arm(armed(body_id, addr));

        // A second trigger batch shifts nothing before it, but a new
        // leading trigger would; exercise both by adding one.
        let mut second = CodePart::new("trigger-L1", PartKind::Trigger, 2);
        second.code = vec![
            Opcode::new(OpcodeKind::Nop),
            Opcode::new(OpcodeKind::EndTrigger),
        ];
        ctx.add_parts(vec![second]);
        set.relocate(&ctx);
        assert_eq!(set.get(0).unwrap().body_addr, ctx.address_of(body_id).unwrap());
    }

    #[test]
    fn relocate_drops_vanished_bodies() {
        let ctx = ProgramContext::new("interp", ContextKind::Interpreter);
        let mut set = TriggerSet::new();
        set.arm(armed(OpcodeId::fresh(), 3));
        set.relocate(&ctx);
        assert!(set.is_empty());
    }
}
