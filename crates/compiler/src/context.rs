//! Compilation namespaces.
//!
//! A [`Context`] is the persistent state behind repeated compiles of
//! the same logical program: the generation counter that stamps every
//! opcode, the label allocator, and the trigger bodies registered
//! since the previous compile. Two contexts never see each other's
//! state.

use helmscript_common::{CodePart, Label};

#[derive(Debug, Default)]
pub struct Context {
    generation: u32,
    next_label: u32,
    /// Trigger/lock body parts registered since the last compile of
    /// this context, drained into the front of each compile's output.
    pending_parts: Vec<CodePart>,
}

impl Context {
    pub fn new() -> Context {
        Context::default()
    }

    /// Start a new compile: bump the generation that stamps every
    /// opcode produced by this call.
    pub fn begin_compile(&mut self) -> u32 {
        self.generation += 1;
        self.generation
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Allocate a branch label. Labels are scoped to one compile's
    /// output: the linker resolves each batch of parts independently.
    pub fn next_label(&mut self) -> Label {
        let label = Label(self.next_label);
        self.next_label += 1;
        label
    }

    /// Register a trigger body produced while lowering this compile.
    pub fn register_part(&mut self, part: CodePart) {
        self.pending_parts.push(part);
    }

    /// Drain the parts registered since the previous compile.
    pub fn take_pending_parts(&mut self) -> Vec<CodePart> {
        std::mem::take(&mut self.pending_parts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use helmscript_common::PartKind;

    #[test]
    fn generations_increase_per_compile() {
        let mut ctx = Context::new();
        assert_eq!(ctx.begin_compile(), 1);
        assert_eq!(ctx.begin_compile(), 2);
    }

    #[test]
    fn labels_never_repeat_across_compiles() {
        let mut ctx = Context::new();
        ctx.begin_compile();
        let a = ctx.next_label();
        ctx.begin_compile();
        let b = ctx.next_label();
        assert_ne!(a, b);
    }

    #[test]
    fn pending_parts_drain_once() {
        let mut ctx = Context::new();
        ctx.register_part(CodePart::new("trigger-L0", PartKind::Trigger, 1));
        assert_eq!(ctx.take_pending_parts().len(), 1);
        assert!(ctx.take_pending_parts().is_empty());
    }
}
