//! Opcode dispatch.
//!
//! [`Machine::step`] runs exactly one main-line instruction; the
//! shared [`Machine::execute_op`] body is also driven by the trigger
//! machinery, which handles the opcodes that mean something different
//! inside a trigger body (WAIT, PRESERVE, ENDTRIGGER, local RUN).

use crate::error::RuntimeError;
use crate::expr;
use crate::host::Host;
use crate::machine::{Machine, MachineState, WaitCondition};
use crate::ops;
use crate::triggers::ArmedTrigger;
use helmscript_common::{Address, Opcode, OpcodeKind, Target, Value};

impl Machine {
    /// Execute the instruction under the pointer and advance it.
    pub(crate) fn step(&mut self, host: &mut dyn Host) -> Result<(), RuntimeError> {
        let ip = self.top().ctx.instruction_pointer();
        let op = self.top().ctx.fetch(ip)?.clone();

        match &op.kind {
            OpcodeKind::Eof => {
                // Park on the terminal so appended commands relocate
                // the pointer onto their first opcode.
                self.state = MachineState::Idle;
                Ok(())
            }
            OpcodeKind::Eop => {
                self.pop_program(host);
                Ok(())
            }
            OpcodeKind::Wait => {
                let seconds = self
                    .stack
                    .pop()
                    .as_scalar()
                    .ok_or(RuntimeError::TypeMismatch { op: "WAIT" })?;
                self.top_mut().ctx.set_instruction_pointer(ip + 1);
                self.state =
                    MachineState::Suspended(WaitCondition::Until(self.now + seconds.max(0.0)));
                Ok(())
            }
            OpcodeKind::WaitUntil { cond } => {
                self.top_mut().ctx.set_instruction_pointer(ip + 1);
                if !expr::eval_condition(cond, &self.vars, host)? {
                    self.state = MachineState::Suspended(WaitCondition::When(cond.clone()));
                }
                Ok(())
            }
            OpcodeKind::Preserve => Err(RuntimeError::PreserveOutsideTrigger),
            OpcodeKind::EndTrigger => Err(RuntimeError::StrayEndTrigger),
            _ => self.execute_op(host, &op, ip),
        }
    }

    /// The opcodes legal both in main-line code and trigger bodies.
    pub(crate) fn execute_op(
        &mut self,
        host: &mut dyn Host,
        op: &Opcode,
        ip: Address,
    ) -> Result<(), RuntimeError> {
        match &op.kind {
            OpcodeKind::Push(value) => {
                self.stack.push(value.clone())?;
                self.advance(ip)
            }
            OpcodeKind::Load(name) => {
                let value = expr::load_value(name, &self.vars, host)?;
                self.stack.push(value)?;
                self.advance(ip)
            }
            OpcodeKind::Store(name) => {
                let value = self.stack.pop();
                if !host.binding_set(name, value.clone()) {
                    self.vars.set(name, value);
                }
                self.advance(ip)
            }

            OpcodeKind::Add => self.binary(ops::add, ip),
            OpcodeKind::Sub => self.binary(ops::sub, ip),
            OpcodeKind::Mul => self.binary(ops::mul, ip),
            OpcodeKind::Div => self.binary(ops::div, ip),
            OpcodeKind::Pow => self.binary(ops::pow, ip),
            OpcodeKind::And => self.binary(ops::and, ip),
            OpcodeKind::Or => self.binary(ops::or, ip),
            OpcodeKind::Eq => self.binary(ops::eq, ip),
            OpcodeKind::Ne => self.binary(ops::ne, ip),
            OpcodeKind::Lt => self.binary(ops::lt, ip),
            OpcodeKind::Gt => self.binary(ops::gt, ip),
            OpcodeKind::Le => self.binary(ops::le, ip),
            OpcodeKind::Ge => self.binary(ops::ge, ip),
            OpcodeKind::Neg => self.unary(ops::neg, ip),
            OpcodeKind::Not => self.unary(ops::not, ip),

            OpcodeKind::Jump(target) => self.jump(target, ip),
            OpcodeKind::BranchFalse(target) => {
                let taken = !self
                    .stack
                    .pop()
                    .truthiness()
                    .ok_or(RuntimeError::TypeMismatch { op: "BRANCHFALSE" })?;
                if taken {
                    self.jump(target, ip)
                } else {
                    self.advance(ip)
                }
            }
            OpcodeKind::Nop => self.advance(ip),

            OpcodeKind::Lock { name, expr } => {
                self.vars.lock(name, expr.clone());
                if host.toggle_fly_by_wire(name, true) {
                    self.top_mut().ctx.note_fly_by_wire(name, true);
                }
                self.advance(ip)
            }
            OpcodeKind::Unlock { name } => {
                if self.vars.unlock(name) {
                    host.toggle_fly_by_wire(name, false);
                    self.top_mut().ctx.note_fly_by_wire(name, false);
                }
                self.advance(ip)
            }
            OpcodeKind::UnlockAll => {
                for name in self.vars.unlock_all() {
                    host.toggle_fly_by_wire(&name, false);
                    self.top_mut().ctx.note_fly_by_wire(&name, false);
                }
                self.advance(ip)
            }

            OpcodeKind::ArmTrigger { kind, cond, body } => {
                let body_addr = match body {
                    Target::Addr(addr) => *addr,
                    Target::Label(_) => return Err(RuntimeError::InvalidAddress { addr: ip }),
                };
                let body_id = self.top().ctx.fetch(body_addr)?.id;
                // Sample now so an already-true edge condition waits
                // for the next transition instead of firing at once.
                let last_sample = expr::eval_condition(cond, &self.vars, host)?;
                self.top_mut().triggers.arm(ArmedTrigger {
                    kind: *kind,
                    cond: cond.clone(),
                    body_addr,
                    body_id,
                    last_sample,
                });
                self.advance(ip)
            }

            OpcodeKind::Print => {
                let value = self.stack.pop();
                host.print(&value.to_string());
                self.advance(ip)
            }

            OpcodeKind::RunFile { targeted: false } => {
                let file = self.pop_text("RUN")?;
                let parts = host.load_program(&file)?;
                self.advance(ip)?;
                self.run_program(file, parts);
                Ok(())
            }
            OpcodeKind::RunFile { targeted: true } => {
                let volume = self.pop_text("RUN ON")?;
                let file = self.pop_text("RUN ON")?;
                host.dispatch_program(&file, &volume)?;
                self.advance(ip)
            }

            // Handled by step and the trigger runner.
            OpcodeKind::Eof
            | OpcodeKind::Eop
            | OpcodeKind::Wait
            | OpcodeKind::WaitUntil { .. }
            | OpcodeKind::Preserve
            | OpcodeKind::EndTrigger => Err(RuntimeError::InvalidAddress { addr: ip }),
        }
    }

    fn advance(&mut self, ip: Address) -> Result<(), RuntimeError> {
        self.top_mut().ctx.set_instruction_pointer(ip + 1);
        Ok(())
    }

    fn jump(&mut self, target: &Target, ip: Address) -> Result<(), RuntimeError> {
        match target {
            Target::Addr(addr) => {
                self.top_mut().ctx.set_instruction_pointer(*addr);
                Ok(())
            }
            Target::Label(_) => Err(RuntimeError::InvalidAddress { addr: ip }),
        }
    }

    fn binary(
        &mut self,
        op: fn(Value, Value) -> Result<Value, RuntimeError>,
        ip: Address,
    ) -> Result<(), RuntimeError> {
        let b = self.stack.pop();
        let a = self.stack.pop();
        self.stack.push(op(a, b)?)?;
        self.advance(ip)
    }

    fn unary(
        &mut self,
        op: fn(Value) -> Result<Value, RuntimeError>,
        ip: Address,
    ) -> Result<(), RuntimeError> {
        let a = self.stack.pop();
        self.stack.push(op(a)?)?;
        self.advance(ip)
    }

    fn pop_text(&mut self, op: &'static str) -> Result<String, RuntimeError> {
        match self.stack.pop() {
            Value::Text(text) => Ok(text),
            _ => Err(RuntimeError::TypeMismatch { op }),
        }
    }

    /// Leave a finished program: release its fly-by-wire claims, drop
    /// its triggers with its frame, and resume whatever is below.
    fn pop_program(&mut self, host: &mut dyn Host) {
        if self.frames.len() > 1 {
            if let Some(mut frame) = self.frames.pop() {
                frame.ctx.release_fly_by_wire(host);
            }
            self.stack.clear();
        } else {
            self.state = MachineState::Idle;
        }
    }
}
