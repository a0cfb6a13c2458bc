//! Program linking and identity-stable relocation.
//!
//! A [`ProgramContext`] owns everything one running program needs: the
//! code parts delivered to it so far, the linked [`Program`] built from
//! them, the instruction pointer into that program, and the set of
//! fly-by-wire claims made while it was active.
//!
//! Every call to [`ProgramContext::add_parts`] relinks the whole
//! program from scratch. Addresses move; opcode identities do not. The
//! instruction pointer is carried across the rebuild by anchoring it to
//! the identity of the opcode it sat on (or just after, when parked on
//! the terminal opcode) and finding that identity in the new layout.

use crate::error::RuntimeError;
use crate::host::Host;
use helmscript_common::{
    Address, CodePart, Label, Opcode, OpcodeId, OpcodeKind, PartKind, Program, Target,
};
use std::collections::{HashMap, HashSet};
use tracing::warn;

/// What the terminal opcode of a context means to the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextKind {
    /// The bottom context. Reaching its end parks the machine idle,
    /// waiting for the next appended command.
    Interpreter,
    /// A loaded program. Reaching its end pops the context.
    Program,
}

#[derive(Debug)]
pub struct ProgramContext {
    name: String,
    kind: ContextKind,
    /// One entry per `add_parts` call, parts kept pristine. Labels in
    /// branch targets are scoped to their batch.
    batches: Vec<Vec<CodePart>>,
    program: Program,
    instruction_pointer: Address,
    /// Identities of the synthetic entry jump and terminal opcode.
    /// Minted once so they survive relinks like every real opcode.
    entry_id: OpcodeId,
    terminal_id: OpcodeId,
    /// Names this context claimed fly-by-wire control over.
    fly_by_wire: HashSet<String>,
}

impl ProgramContext {
    pub fn new(name: impl Into<String>, kind: ContextKind) -> ProgramContext {
        let mut ctx = ProgramContext {
            name: name.into(),
            kind,
            batches: Vec::new(),
            program: Program::default(),
            instruction_pointer: 0,
            entry_id: OpcodeId::fresh(),
            terminal_id: OpcodeId::fresh(),
            fly_by_wire: HashSet::new(),
        };
        ctx.rebuild();
        ctx
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ContextKind {
        self.kind
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn instruction_pointer(&self) -> Address {
        self.instruction_pointer
    }

    pub fn set_instruction_pointer(&mut self, addr: Address) {
        self.instruction_pointer = addr;
    }

    /// Append a batch of parts and relink. Returns the entry address
    /// of the batch's main code in the new layout.
    pub fn add_parts(&mut self, parts: Vec<CodePart>) -> Address {
        let old = std::mem::take(&mut self.program);
        self.batches.push(parts);
        self.rebuild();
        self.relocate(&old);
        self.batch_entry(self.batches.len() - 1)
    }

    /// Install a compiled file as a fresh batch and return its entry
    /// address. Compiled parts already carry fresh opcode ids and
    /// batch-scoped labels, so a file install is the same operation as
    /// appending interpreter commands.
    pub fn add_object_parts(&mut self, parts: Vec<CodePart>) -> Address {
        self.add_parts(parts)
    }

    /// Relink every batch: triggers first in delivery order, then main
    /// parts in delivery order, bracketed by the entry jump and the
    /// terminal opcode. Labels resolve from scratch, scoped per batch.
    fn rebuild(&mut self) {
        let mut ops: Vec<Opcode> = Vec::new();
        let mut batch_of: Vec<usize> = Vec::new();

        let mut entry_jump = Opcode::new(OpcodeKind::Jump(Target::Addr(0)));
        entry_jump.id = self.entry_id;
        ops.push(entry_jump);
        batch_of.push(usize::MAX);

        let mut labels: Vec<HashMap<Label, Address>> =
            vec![HashMap::new(); self.batches.len()];
        for pass in [PartKind::Trigger, PartKind::Main] {
            for (batch_idx, batch) in self.batches.iter().enumerate() {
                for part in batch.iter().filter(|part| part.kind == pass) {
                    for op in &part.code {
                        if let Some(label) = op.label {
                            labels[batch_idx].insert(label, ops.len());
                        }
                        ops.push(op.clone());
                        batch_of.push(batch_idx);
                    }
                }
            }
        }

        let terminal = match self.kind {
            ContextKind::Interpreter => OpcodeKind::Eof,
            ContextKind::Program => OpcodeKind::Eop,
        };
        let terminal_addr = ops.len();
        let mut terminal_op = Opcode::new(terminal);
        terminal_op.id = self.terminal_id;
        ops.push(terminal_op);
        batch_of.push(usize::MAX);

        let entry = self.first_main_addr(&ops, &batch_of);
        ops[0].kind = OpcodeKind::Jump(Target::Addr(entry));

        for (op, batch_idx) in ops.iter_mut().zip(&batch_of) {
            if *batch_idx == usize::MAX {
                continue;
            }
            resolve_targets(op, &labels[*batch_idx], terminal_addr, &self.name);
        }

        self.program = Program::new(ops);
    }

    /// Address of the first main-section opcode, or the terminal when
    /// no batch has main code.
    fn first_main_addr(&self, ops: &[Opcode], batch_of: &[usize]) -> Address {
        let trigger_len: usize = self
            .batches
            .iter()
            .flatten()
            .filter(|part| part.kind == PartKind::Trigger)
            .map(|part| part.code.len())
            .sum();
        let first_main = 1 + trigger_len;
        if first_main < ops.len() - 1 && batch_of[first_main] != usize::MAX {
            first_main
        } else {
            ops.len() - 1
        }
    }

    /// Carry the instruction pointer from the previous layout into the
    /// current one by opcode identity.
    fn relocate(&mut self, old: &Program) {
        if old.len() <= 1 {
            self.instruction_pointer = 0;
            return;
        }
        let ip = self.instruction_pointer.min(old.len() - 1);
        // Parked on the terminal opcode means "after the last real
        // opcode": anchor one back and land one past it.
        let delta: Address = if ip == old.len() - 1 { 1 } else { 0 };
        // Anchored to the entry jump (a fresh context, or parked at
        // the terminal of an empty one): re-run the jump so the new
        // layout's entry routing applies.
        if ip - delta == 0 {
            self.instruction_pointer = 0;
            return;
        }
        let anchor = old.ops[ip - delta].id;
        match self.program.index_of(anchor) {
            Some(addr) => self.instruction_pointer = addr + delta,
            None => {
                warn!(
                    context = %self.name,
                    "instruction pointer anchor vanished across relink, restarting"
                );
                self.instruction_pointer = 0;
            }
        }
    }

    /// Entry address of a batch: the first opcode of its first
    /// non-empty main part, or the terminal when it has none.
    fn batch_entry(&self, batch_idx: usize) -> Address {
        let first = self.batches[batch_idx]
            .iter()
            .filter(|part| part.kind == PartKind::Main)
            .flat_map(|part| part.code.first())
            .next();
        match first {
            Some(op) => match self.program.index_of(op.id) {
                Some(addr) => addr,
                None => self.program.len() - 1,
            },
            None => self.program.len() - 1,
        }
    }

    /// Record a fly-by-wire claim or release made while this context
    /// was active.
    pub fn note_fly_by_wire(&mut self, name: &str, enabled: bool) {
        if enabled {
            self.fly_by_wire.insert(name.to_string());
        } else {
            self.fly_by_wire.remove(name);
        }
    }

    /// Release every fly-by-wire claim this context still holds. Runs
    /// when the context pops or the machine powers down.
    pub fn release_fly_by_wire(&mut self, host: &mut dyn Host) {
        for name in self.fly_by_wire.drain() {
            host.toggle_fly_by_wire(&name, false);
        }
    }

    /// Address of the opcode carrying `id`, for re-anchoring armed
    /// triggers after a relink.
    pub fn address_of(&self, id: helmscript_common::OpcodeId) -> Option<Address> {
        self.program.index_of(id)
    }

    /// The opcode under an address, as an execution-time check.
    pub fn fetch(&self, addr: Address) -> Result<&Opcode, RuntimeError> {
        self.program
            .get(addr)
            .ok_or(RuntimeError::InvalidAddress { addr })
    }

    /// A listing of the opcodes around an address, the addressed one
    /// marked. Used in diagnostics.
    pub fn code_fragment(&self, around: Address, window: usize) -> Vec<String> {
        let start = around.saturating_sub(window);
        let end = (around + window + 1).min(self.program.len());
        (start..end)
            .map(|addr| {
                let marker = if addr == around { '>' } else { ' ' };
                format!("{} {:4}  {}", marker, addr, self.program.ops[addr])
            })
            .collect()
    }
}

fn resolve_targets(
    op: &mut Opcode,
    labels: &HashMap<Label, Address>,
    terminal_addr: Address,
    context: &str,
) {
    let fix = |target: &mut Target| {
        if let Target::Label(label) = target {
            match labels.get(label) {
                Some(addr) => *target = Target::Addr(*addr),
                None => {
                    warn!(context, label = label.0, "unresolved branch label");
                    *target = Target::Addr(terminal_addr);
                }
            }
        }
    };
    match &mut op.kind {
        OpcodeKind::Jump(target) => fix(target),
        OpcodeKind::BranchFalse(target) => fix(target),
        OpcodeKind::ArmTrigger { body, .. } => fix(body),
        _ => {}
    }
}
