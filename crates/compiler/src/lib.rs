//! HelmScript compiler.
//!
//! Turns source text into [`CodePart`]s: a main part plus one part per
//! trigger body, ready for the VM's linker. Compilation happens inside
//! a named [`Context`] so repeated compiles of the same logical program
//! accumulate consistently stamped parts; the [`CompileCache`] reuses
//! whole compiles keyed by source hash.

mod ast;
mod cache;
mod codegen;
mod context;
mod error;
mod lexer;
mod parser;

pub use cache::{CompileCache, SourceHash};
pub use context::Context;
pub use error::ParseError;

use helmscript_common::CodePart;
use std::collections::HashMap;

/// Compiler front door. Owns every named compilation context.
#[derive(Debug, Default)]
pub struct ScriptCompiler {
    contexts: HashMap<String, Context>,
}

impl ScriptCompiler {
    pub fn new() -> ScriptCompiler {
        ScriptCompiler::default()
    }

    /// Compile `text` inside the named context. An empty `context_id`
    /// compiles in a throwaway context that nothing else ever sees.
    ///
    /// The returned parts are ordered trigger bodies first, main part
    /// last; the linker relies on that order.
    pub fn compile(&mut self, text: &str, context_id: &str) -> Result<Vec<CodePart>, ParseError> {
        // Parse before touching any context so a syntax error leaves
        // the context untouched.
        let stmts = parser::parse(&lexer::tokenize(text)?)?;

        let mut anonymous;
        let ctx = if context_id.is_empty() {
            anonymous = Context::new();
            &mut anonymous
        } else {
            self.contexts.entry(context_id.to_string()).or_default()
        };

        ctx.begin_compile();
        let main = codegen::lower(ctx, &stmts);
        let mut parts = ctx.take_pending_parts();
        parts.push(main);
        Ok(parts)
    }

    /// Forget a named context. The next compile under this id starts
    /// from generation one again.
    pub fn clear_context(&mut self, context_id: &str) {
        self.contexts.remove(context_id);
    }
}

/// Whether `text` is a complete command, or a fragment still waiting
/// for closing braces or parentheses. Interactive front ends use this
/// to decide between executing and prompting for more input.
pub fn is_command_complete(text: &str) -> bool {
    let mut braces: i32 = 0;
    let mut parens: i32 = 0;
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' => {
                for c in chars.by_ref() {
                    if c == '"' {
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'/') => {
                for c in chars.by_ref() {
                    if c == '\n' {
                        break;
                    }
                }
            }
            '{' => braces += 1,
            '}' => braces -= 1,
            '(' => parens += 1,
            ')' => parens -= 1,
            _ => {}
        }
    }
    braces <= 0 && parens <= 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use helmscript_common::{OpcodeKind, PartKind};

    #[test]
    fn compile_orders_triggers_before_main() {
        let mut compiler = ScriptCompiler::new();
        let parts = compiler
            .compile("on flag { print 1. } print 2.", "cpu-0")
            .unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].kind, PartKind::Trigger);
        assert_eq!(parts[1].kind, PartKind::Main);
    }

    #[test]
    fn named_contexts_accumulate_generations() {
        let mut compiler = ScriptCompiler::new();
        let first = compiler.compile("print 1.", "cpu-0").unwrap();
        let second = compiler.compile("print 2.", "cpu-0").unwrap();
        assert_eq!(first[0].generation, 1);
        assert_eq!(second[0].generation, 2);
    }

    #[test]
    fn contexts_are_isolated() {
        let mut compiler = ScriptCompiler::new();
        compiler.compile("print 1.", "cpu-0").unwrap();
        let other = compiler.compile("print 1.", "cpu-1").unwrap();
        assert_eq!(other[0].generation, 1);
    }

    #[test]
    fn empty_context_id_is_throwaway() {
        let mut compiler = ScriptCompiler::new();
        let a = compiler.compile("print 1.", "").unwrap();
        let b = compiler.compile("print 1.", "").unwrap();
        assert_eq!(a[0].generation, 1);
        assert_eq!(b[0].generation, 1);
    }

    #[test]
    fn clear_context_resets_generation() {
        let mut compiler = ScriptCompiler::new();
        compiler.compile("print 1.", "cpu-0").unwrap();
        compiler.clear_context("cpu-0");
        let fresh = compiler.compile("print 1.", "cpu-0").unwrap();
        assert_eq!(fresh[0].generation, 1);
    }

    #[test]
    fn syntax_error_leaves_context_untouched() {
        let mut compiler = ScriptCompiler::new();
        compiler.compile("print 1.", "cpu-0").unwrap();
        assert!(compiler.compile("set to to.", "cpu-0").is_err());
        let next = compiler.compile("print 2.", "cpu-0").unwrap();
        assert_eq!(next[0].generation, 2);
    }

    #[test]
    fn recompiling_same_text_yields_fresh_opcode_ids() {
        let mut compiler = ScriptCompiler::new();
        let a = compiler.compile("print 1.", "cpu-0").unwrap();
        let b = compiler.compile("print 1.", "cpu-0").unwrap();
        assert_ne!(a[0].code[0].id, b[0].code[0].id);
    }

    #[test]
    fn wait_until_compiles_to_condition_operand() {
        let mut compiler = ScriptCompiler::new();
        let parts = compiler.compile("wait until alt > 100.", "").unwrap();
        match &parts[0].code[0].kind {
            OpcodeKind::WaitUntil { cond } => assert_eq!(cond.len(), 3),
            other => panic!("unexpected opcode {:?}", other),
        }
    }

    #[test]
    fn command_completeness_tracks_braces() {
        assert!(is_command_complete("print 1."));
        assert!(!is_command_complete("when alt > 100 then {"));
        assert!(is_command_complete("when alt > 100 then { print 1. }"));
        assert!(is_command_complete("print \"{\"."));
        assert!(!is_command_complete("if a { // }\n"));
    }
}
