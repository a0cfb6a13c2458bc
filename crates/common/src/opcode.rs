//! HelmScript VM instruction set.
//!
//! An [`Opcode`] is one VM instruction: a kind tag with operands, plus
//! bookkeeping the toolchain needs — a stable identity, the generation
//! stamp of the compile that produced it, an optional branch label, and
//! the source line it was lowered from.
//!
//! Identity is the anchor for incremental relinking. Every opcode draws
//! an [`OpcodeId`] from a single process-wide arena at creation and
//! keeps it forever; its *address* in a linked program is transient and
//! recomputed on every rebuild.

use crate::value::Value;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// An address into a linked program.
pub type Address = usize;

/// Immutable opcode identity, assigned once at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OpcodeId(pub u64);

static NEXT_OPCODE_ID: AtomicU64 = AtomicU64::new(1);

impl OpcodeId {
    /// Draw the next identity from the arena.
    pub fn fresh() -> OpcodeId {
        OpcodeId(NEXT_OPCODE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// A branch label, scoped to the compile that allocated it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Label(pub u32);

/// A branch destination: a label before linking, an absolute address
/// after. Labels are resolved from scratch on every program rebuild.
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    Label(Label),
    Addr(Address),
}

/// Trigger flavor carried by `ArmTrigger`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerKind {
    /// Fires once per false→true transition of the condition, then
    /// disarms unless the body re-arms it.
    Edge,
    /// Fires every tick the condition holds; stays armed.
    Level,
}

/// A compiled pure-expression slice, shared between the opcode that
/// installs it and the machine state that re-evaluates it (lock
/// bindings, trigger conditions, WAIT UNTIL conditions).
pub type ExprCode = Arc<Vec<Opcode>>;

/// The instruction kinds. Exhaustive; the interpreter dispatches over
/// this enum with no fallback arm.
#[derive(Debug, Clone, PartialEq)]
pub enum OpcodeKind {
    /// Push a literal value.
    Push(Value),
    /// Push the value of a named variable or binding. Re-evaluates the
    /// bound expression when the name is locked.
    Load(String),
    /// Pop into a named variable.
    Store(String),

    // Arithmetic and comparison, all stack-to-stack.
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Neg,
    Not,
    And,
    Or,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,

    /// Unconditional branch.
    Jump(Target),
    /// Pop; branch when the popped value reads false.
    BranchFalse(Target),
    /// No effect; exists to carry a label at the end of a block.
    Nop,

    /// Install or replace an expression binding on a variable.
    Lock { name: String, expr: ExprCode },
    /// Remove one expression binding.
    Unlock { name: String },
    /// Remove every expression binding.
    UnlockAll,

    /// Arm a trigger whose body starts at `body`.
    ArmTrigger {
        kind: TriggerKind,
        cond: ExprCode,
        body: Target,
    },
    /// Terminates a trigger body.
    EndTrigger,
    /// Re-arm the innermost firing trigger.
    Preserve,

    /// Pop a scalar number of seconds and suspend the machine.
    Wait,
    /// Suspend the machine until the condition reads true.
    WaitUntil { cond: ExprCode },

    /// Pop and write to the output sink.
    Print,
    /// Pop a file name (and a volume name when `targeted`) and run the
    /// compiled file — locally, or on the machine owning the volume.
    RunFile { targeted: bool },

    /// End of an interpreter fragment: the machine goes idle with the
    /// pointer parked here.
    Eof,
    /// End of a program: the program context pops.
    Eop,
}

/// One VM instruction.
#[derive(Debug, Clone, PartialEq)]
pub struct Opcode {
    /// Stable identity from the arena.
    pub id: OpcodeId,
    /// Generation stamp of the compile that produced this opcode.
    pub generation: u32,
    /// Label carried by this opcode, if any branch resolves to it.
    pub label: Option<Label>,
    /// Source line this opcode was lowered from (1-based, 0 when
    /// synthesized by the linker).
    pub line: u32,
    pub kind: OpcodeKind,
}

impl Opcode {
    /// Create an opcode with a fresh identity and no position data.
    pub fn new(kind: OpcodeKind) -> Opcode {
        Opcode {
            id: OpcodeId::fresh(),
            generation: 0,
            label: None,
            line: 0,
            kind,
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use OpcodeKind::*;
        match &self.kind {
            Push(v) => write!(f, "PUSH {:?}", v),
            Load(name) => write!(f, "LOAD {}", name),
            Store(name) => write!(f, "STORE {}", name),
            Add => write!(f, "ADD"),
            Sub => write!(f, "SUB"),
            Mul => write!(f, "MUL"),
            Div => write!(f, "DIV"),
            Pow => write!(f, "POW"),
            Neg => write!(f, "NEG"),
            Not => write!(f, "NOT"),
            And => write!(f, "AND"),
            Or => write!(f, "OR"),
            Eq => write!(f, "EQ"),
            Ne => write!(f, "NE"),
            Lt => write!(f, "LT"),
            Gt => write!(f, "GT"),
            Le => write!(f, "LE"),
            Ge => write!(f, "GE"),
            Jump(t) => write!(f, "JUMP {}", fmt_target(t)),
            BranchFalse(t) => write!(f, "BRANCHFALSE {}", fmt_target(t)),
            Nop => write!(f, "NOP"),
            Lock { name, .. } => write!(f, "LOCK {}", name),
            Unlock { name } => write!(f, "UNLOCK {}", name),
            UnlockAll => write!(f, "UNLOCKALL"),
            ArmTrigger { kind, body, .. } => match kind {
                TriggerKind::Edge => write!(f, "ARMTRIGGER EDGE {}", fmt_target(body)),
                TriggerKind::Level => write!(f, "ARMTRIGGER LEVEL {}", fmt_target(body)),
            },
            EndTrigger => write!(f, "ENDTRIGGER"),
            Preserve => write!(f, "PRESERVE"),
            Wait => write!(f, "WAIT"),
            WaitUntil { .. } => write!(f, "WAITUNTIL"),
            Print => write!(f, "PRINT"),
            RunFile { targeted: false } => write!(f, "RUNFILE"),
            RunFile { targeted: true } => write!(f, "RUNFILE ON"),
            Eof => write!(f, "EOF"),
            Eop => write!(f, "EOP"),
        }
    }
}

fn fmt_target(target: &Target) -> String {
    match target {
        Target::Label(Label(n)) => format!("@L{}", n),
        Target::Addr(addr) => format!("@{}", addr),
    }
}
