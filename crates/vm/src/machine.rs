//! The virtual machine.
//!
//! A [`Machine`] runs one script processor: a stack of program
//! contexts (interpreter at the bottom), an operand stack, variables,
//! and the armed triggers of whichever context is on top. The host
//! calls [`Machine::tick`] once per update with the current time; the
//! machine runs triggers, checks its wait condition, then executes at
//! most one budget's worth of instructions before yielding.

use crate::error::RuntimeError;
use crate::expr;
use crate::host::Host;
use crate::program_context::{ContextKind, ProgramContext};
use crate::stack::{Stack, MAX_STACK_SIZE};
use crate::triggers::TriggerSet;
use crate::variables::Variables;
use helmscript_common::{CodePart, ExprCode, OpcodeKind};
use tracing::{debug, trace};

/// Tuning knobs for one machine.
#[derive(Debug, Clone)]
pub struct MachineConfig {
    /// Instructions executed per tick before yielding to the host.
    pub instructions_per_tick: u32,
    /// Ceiling on operand stack depth.
    pub max_stack_size: usize,
    /// Reject NaN and infinite scalars at the stack boundary.
    pub safe_mode: bool,
}

impl Default for MachineConfig {
    fn default() -> MachineConfig {
        MachineConfig {
            instructions_per_tick: 200,
            max_stack_size: MAX_STACK_SIZE,
            safe_mode: true,
        }
    }
}

/// What the machine is doing between ticks.
#[derive(Debug, Clone, PartialEq)]
pub enum MachineState {
    /// Parked at the end of the interpreter program, waiting for
    /// appended commands.
    Idle,
    Running,
    /// Main-line execution is suspended; triggers still run.
    Suspended(WaitCondition),
    /// Powered off. Nothing runs until [`Machine::reset`].
    Halted,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WaitCondition {
    /// Resume at or after this time.
    Until(f64),
    /// Resume when this condition reads true.
    When(ExprCode),
}

/// One context plus the triggers armed while it was on top. Triggers
/// belong to their context: a program's triggers die with it, and the
/// interpreter's lie dormant while a program runs.
pub(crate) struct Frame {
    pub(crate) ctx: ProgramContext,
    pub(crate) triggers: TriggerSet,
}

pub struct Machine {
    pub(crate) config: MachineConfig,
    pub(crate) frames: Vec<Frame>,
    pub(crate) stack: Stack,
    pub(crate) vars: Variables,
    pub(crate) state: MachineState,
    pub(crate) last_error: Option<RuntimeError>,
    pub(crate) now: f64,
}

impl Machine {
    pub fn new(config: MachineConfig) -> Machine {
        let stack = Stack::new(config.max_stack_size, config.safe_mode);
        Machine {
            config,
            frames: vec![interpreter_frame()],
            stack,
            vars: Variables::new(),
            state: MachineState::Idle,
            last_error: None,
            now: 0.0,
        }
    }

    pub fn state(&self) -> &MachineState {
        &self.state
    }

    pub fn last_error(&self) -> Option<&RuntimeError> {
        self.last_error.as_ref()
    }

    /// Variables of this machine, for seeding values at boot.
    pub fn variables_mut(&mut self) -> &mut Variables {
        &mut self.vars
    }

    /// Number of triggers armed in the active context.
    pub fn armed_triggers(&self) -> usize {
        self.top().triggers.len()
    }

    /// Depth of the context stack, counting the interpreter.
    pub fn context_depth(&self) -> usize {
        self.frames.len()
    }

    pub(crate) fn top(&self) -> &Frame {
        // frames always holds at least the interpreter
        self.frames.last().unwrap_or_else(|| unreachable!())
    }

    pub(crate) fn top_mut(&mut self) -> &mut Frame {
        self.frames.last_mut().unwrap_or_else(|| unreachable!())
    }

    /// Append compiled interpreter commands. They run once whatever is
    /// already queued (or running) finishes.
    pub fn append_commands(&mut self, parts: Vec<CodePart>) {
        if self.state == MachineState::Halted {
            return;
        }
        let frame = &mut self.frames[0];
        frame.ctx.add_parts(parts);
        frame.triggers.relocate(&frame.ctx);
        if self.state == MachineState::Idle {
            self.state = MachineState::Running;
        }
    }

    /// Push a program context and start executing it.
    pub fn run_program(&mut self, name: impl Into<String>, parts: Vec<CodePart>) {
        if self.state == MachineState::Halted {
            return;
        }
        let mut ctx = ProgramContext::new(name, ContextKind::Program);
        let entry = ctx.add_object_parts(parts);
        ctx.set_instruction_pointer(entry);
        debug!(program = %ctx.name(), entry, "starting program");
        self.frames.push(Frame {
            ctx,
            triggers: TriggerSet::new(),
        });
        self.state = MachineState::Running;
    }

    /// One cooperative slice: process triggers, check the wait
    /// condition, then run main-line code up to the budget.
    pub fn tick(&mut self, host: &mut dyn Host, now: f64) {
        if self.state == MachineState::Halted {
            return;
        }
        self.now = now;

        self.process_triggers(host);
        self.check_wait(host);

        if self.state != MachineState::Running {
            return;
        }

        let budget = self.config.instructions_per_tick;
        let mut executed = 0u32;
        while self.state == MachineState::Running && executed < budget {
            let line = self.current_line();
            if let Err(err) = self.step(host) {
                self.recover(host, err, line);
            }
            executed += 1;
        }
        trace!(executed, "tick finished");
    }

    /// Abandon whatever is running: drop program contexts, clear the
    /// remaining triggers and the stack, and go idle. The interpreter
    /// context and its variables survive. Call between ticks.
    pub fn break_execution(&mut self, host: &mut dyn Host) {
        while self.frames.len() > 1 {
            if let Some(mut frame) = self.frames.pop() {
                frame.ctx.release_fly_by_wire(host);
            }
        }
        self.top_mut().triggers.clear();
        self.stack.clear();
        self.state = MachineState::Idle;
    }

    /// Power the machine off, releasing every fly-by-wire claim.
    pub fn halt(&mut self, host: &mut dyn Host) {
        for frame in self.frames.iter_mut().rev() {
            frame.ctx.release_fly_by_wire(host);
        }
        self.state = MachineState::Halted;
    }

    /// Power back on with a fresh interpreter and no state.
    pub fn reset(&mut self) {
        self.frames = vec![interpreter_frame()];
        self.stack = Stack::new(self.config.max_stack_size, self.config.safe_mode);
        self.vars = Variables::new();
        self.state = MachineState::Idle;
        self.last_error = None;
    }

    fn current_line(&self) -> u32 {
        let frame = self.top();
        frame
            .ctx
            .program()
            .get(frame.ctx.instruction_pointer())
            .map(|op| op.line)
            .unwrap_or(0)
    }

    /// Evaluate every armed trigger of the active context once, in
    /// arming order, running the bodies of those that fire.
    fn process_triggers(&mut self, host: &mut dyn Host) {
        let ids: Vec<_> = {
            let set = &self.top().triggers;
            (0..set.len())
                .filter_map(|idx| set.get(idx).map(|armed| armed.body_id))
                .collect()
        };

        for body_id in ids {
            let Some(armed) = self.top().triggers.by_id(body_id).cloned() else {
                continue;
            };
            let sample = match expr::eval_condition(&armed.cond, &self.vars, host) {
                Ok(sample) => sample,
                Err(err) => {
                    let line = self
                        .top()
                        .ctx
                        .fetch(armed.body_addr)
                        .map(|op| op.line)
                        .unwrap_or(0);
                    self.top_mut().triggers.disarm(body_id);
                    self.report(host, &err, line);
                    continue;
                }
            };

            let fire = match armed.kind {
                helmscript_common::TriggerKind::Edge => sample && !armed.last_sample,
                helmscript_common::TriggerKind::Level => sample,
            };
            if let Some(slot) = self.top_mut().triggers.by_id_mut(body_id) {
                slot.last_sample = sample;
            }
            if !fire {
                continue;
            }

            match self.run_trigger_body(host, armed.body_addr) {
                Ok(preserved) => {
                    if armed.kind == helmscript_common::TriggerKind::Edge && !preserved {
                        self.top_mut().triggers.disarm(body_id);
                    }
                }
                Err(err) => {
                    let line = self
                        .top()
                        .ctx
                        .fetch(armed.body_addr)
                        .map(|op| op.line)
                        .unwrap_or(0);
                    self.top_mut().triggers.disarm(body_id);
                    self.report(host, &err, line);
                }
            }
        }
    }

    /// Run one trigger body to its EndTrigger within the instruction
    /// budget, preserving the main-line instruction pointer. Returns
    /// whether the body executed PRESERVE.
    fn run_trigger_body(
        &mut self,
        host: &mut dyn Host,
        body_addr: helmscript_common::Address,
    ) -> Result<bool, RuntimeError> {
        let saved_ip = self.top().ctx.instruction_pointer();
        self.top_mut().ctx.set_instruction_pointer(body_addr);

        let budget = self.config.instructions_per_tick;
        let mut executed = 0u32;
        let mut preserved = false;
        let result = loop {
            if executed >= budget {
                break Err(RuntimeError::TriggerBudgetExceeded);
            }
            let ip = self.top().ctx.instruction_pointer();
            let op = match self.top().ctx.fetch(ip) {
                Ok(op) => op.clone(),
                Err(err) => break Err(err),
            };
            match &op.kind {
                OpcodeKind::EndTrigger => break Ok(()),
                OpcodeKind::Preserve => {
                    preserved = true;
                    self.top_mut().ctx.set_instruction_pointer(ip + 1);
                }
                OpcodeKind::Wait | OpcodeKind::WaitUntil { .. } => {
                    break Err(RuntimeError::WaitInTrigger);
                }
                OpcodeKind::RunFile { targeted: false } => {
                    break Err(RuntimeError::RunInTrigger);
                }
                OpcodeKind::Eof | OpcodeKind::Eop => break Err(RuntimeError::StrayEndTrigger),
                _ => {
                    if let Err(err) = self.execute_op(host, &op, ip) {
                        break Err(err);
                    }
                }
            }
            executed += 1;
        };

        self.top_mut().ctx.set_instruction_pointer(saved_ip);
        result.map(|_| preserved)
    }

    /// Wake a suspended machine when its wait condition is met.
    fn check_wait(&mut self, host: &mut dyn Host) {
        let cond = match &self.state {
            MachineState::Suspended(cond) => cond.clone(),
            _ => return,
        };
        match cond {
            WaitCondition::Until(time) => {
                if self.now >= time {
                    self.state = MachineState::Running;
                }
            }
            WaitCondition::When(expr) => {
                match expr::eval_condition(&expr, &self.vars, host) {
                    Ok(true) => self.state = MachineState::Running,
                    Ok(false) => {}
                    Err(err) => {
                        let line = self.current_line();
                        self.recover(host, err, line);
                    }
                }
            }
        }
    }

    /// Abort the current program on a runtime error: report it, drop
    /// program contexts back to the interpreter, and go idle. An error
    /// in an interpreter command skips the rest of that command only.
    fn recover(&mut self, host: &mut dyn Host, err: RuntimeError, line: u32) {
        self.report(host, &err, line);
        {
            let frame = self.top();
            let ip = frame.ctx.instruction_pointer();
            for listing in frame.ctx.code_fragment(ip, 2) {
                debug!("{}", listing);
            }
        }
        self.stack.clear();

        if self.frames.len() > 1 {
            while self.frames.len() > 1 {
                if let Some(mut frame) = self.frames.pop() {
                    frame.ctx.release_fly_by_wire(host);
                }
            }
            self.state = MachineState::Idle;
            return;
        }

        // Interpreter command: skip the remaining opcodes of the
        // generation that failed, then keep running into Eof.
        let frame = self.top_mut();
        let failed_gen = frame
            .ctx
            .program()
            .get(frame.ctx.instruction_pointer())
            .map(|op| op.generation);
        if let Some(generation) = failed_gen {
            let mut ip = frame.ctx.instruction_pointer();
            while let Some(op) = frame.ctx.program().get(ip) {
                if op.generation != generation || matches!(op.kind, OpcodeKind::Eof) {
                    break;
                }
                ip += 1;
            }
            frame.ctx.set_instruction_pointer(ip);
        }
        self.state = MachineState::Running;
    }

    fn report(&mut self, host: &mut dyn Host, err: &RuntimeError, line: u32) {
        debug!(%err, line, "runtime error");
        if line > 0 {
            host.print(&format!("runtime error at line {}: {}", line, err));
        } else {
            host.print(&format!("runtime error: {}", err));
        }
        self.last_error = Some(err.clone());
    }
}

fn interpreter_frame() -> Frame {
    Frame {
        ctx: ProgramContext::new("interpreter", ContextKind::Interpreter),
        triggers: TriggerSet::new(),
    }
}
