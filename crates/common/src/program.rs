//! Compiled code containers: [`CodePart`] (compiler output) and
//! [`Program`] (linker output).

use crate::opcode::{Address, Opcode, OpcodeId};

/// Which section of a program a part belongs to. The linker lays out
/// every trigger part before every main part, so trigger bodies are
/// addressable before the code that arms them runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartKind {
    /// A trigger or lock body, entered only by the trigger machinery.
    Trigger,
    /// Straight-line program code.
    Main,
}

/// A named, ordered group of opcodes produced by one compilation.
#[derive(Debug, Clone, PartialEq)]
pub struct CodePart {
    pub name: String,
    pub kind: PartKind,
    /// Generation stamp of the compile that produced this part.
    pub generation: u32,
    pub code: Vec<Opcode>,
}

impl CodePart {
    pub fn new(name: impl Into<String>, kind: PartKind, generation: u32) -> CodePart {
        CodePart {
            name: name.into(),
            kind,
            generation,
            code: Vec::new(),
        }
    }
}

/// The full linked opcode sequence loaded into one virtual machine.
///
/// The instruction pointer into a program is always either a valid
/// index or the defined beyond-end address `len()`, meaning halted.
#[derive(Debug, Clone, Default)]
pub struct Program {
    pub ops: Vec<Opcode>,
}

impl Program {
    pub fn new(ops: Vec<Opcode>) -> Program {
        Program { ops }
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn get(&self, addr: Address) -> Option<&Opcode> {
        self.ops.get(addr)
    }

    /// Address of the first opcode carrying `id`, if any.
    pub fn index_of(&self, id: OpcodeId) -> Option<Address> {
        self.ops.iter().position(|op| op.id == id)
    }
}
