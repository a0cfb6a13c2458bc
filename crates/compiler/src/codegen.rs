//! Lowering from the syntax tree to opcodes.
//!
//! Straight-line statements lower into the main part. Trigger bodies
//! lower into their own [`CodePart`]s registered on the [`Context`],
//! so the linker can place them ahead of the code that arms them.
//! Lock bindings, trigger conditions, and WAIT UNTIL conditions lower
//! into shared pure-opcode slices ([`ExprCode`]) carried as operands.

use crate::ast::{BinaryOp, Expr, Stmt, StmtNode, UnaryOp};
use crate::context::Context;
use helmscript_common::{
    CodePart, ExprCode, Label, Opcode, OpcodeKind, PartKind, Target, TriggerKind, Value,
};
use std::sync::Arc;

/// Lower a parsed script into its main part, registering any trigger
/// bodies on the context.
pub(crate) fn lower(ctx: &mut Context, stmts: &[StmtNode]) -> CodePart {
    let mut gen = CodeGen { ctx };
    let code = gen.lower_block(stmts);
    let mut part = CodePart::new("main", PartKind::Main, gen.ctx.generation());
    part.code = code;
    part
}

struct CodeGen<'a> {
    ctx: &'a mut Context,
}

/// Emission buffer with label bookkeeping. A label becomes pending
/// when its position is reached and attaches to the next emitted
/// opcode; a trailing Nop is emitted for labels pending at the end of
/// the buffer.
struct Buf {
    generation: u32,
    code: Vec<Opcode>,
    pending: Vec<Label>,
}

impl Buf {
    fn new(generation: u32) -> Buf {
        Buf {
            generation,
            code: Vec::new(),
            pending: Vec::new(),
        }
    }

    fn mark(&mut self, label: Label) {
        self.pending.push(label);
    }

    fn emit(&mut self, line: u32, kind: OpcodeKind) {
        // Extra pending labels each ride a Nop at the same spot.
        while self.pending.len() > 1 {
            let label = self.pending.remove(0);
            let mut nop = self.make(line, OpcodeKind::Nop);
            nop.label = Some(label);
            self.code.push(nop);
        }
        let mut op = self.make(line, kind);
        op.label = self.pending.pop();
        self.code.push(op);
    }

    fn make(&self, line: u32, kind: OpcodeKind) -> Opcode {
        let mut op = Opcode::new(kind);
        op.generation = self.generation;
        op.line = line;
        op
    }

    fn seal(mut self, line: u32) -> Vec<Opcode> {
        while let Some(label) = self.pending.pop() {
            let mut nop = self.make(line, OpcodeKind::Nop);
            nop.label = Some(label);
            self.code.push(nop);
        }
        self.code
    }
}

impl<'a> CodeGen<'a> {
    fn lower_block(&mut self, stmts: &[StmtNode]) -> Vec<Opcode> {
        let mut buf = Buf::new(self.ctx.generation());
        let last_line = stmts.last().map(|s| s.line).unwrap_or(0);
        for node in stmts {
            self.stmt(&mut buf, node);
        }
        buf.seal(last_line)
    }

    fn stmt(&mut self, buf: &mut Buf, node: &StmtNode) {
        let line = node.line;
        match &node.stmt {
            Stmt::Set { name, expr } => {
                self.expr(buf, line, expr);
                buf.emit(line, OpcodeKind::Store(name.clone()));
            }
            Stmt::Lock { name, expr } => {
                buf.emit(
                    line,
                    OpcodeKind::Lock {
                        name: name.clone(),
                        expr: self.expr_code(line, expr),
                    },
                );
            }
            Stmt::Unlock { name: Some(name) } => {
                buf.emit(line, OpcodeKind::Unlock { name: name.clone() });
            }
            Stmt::Unlock { name: None } => {
                buf.emit(line, OpcodeKind::UnlockAll);
            }
            Stmt::Print(expr) => {
                self.expr(buf, line, expr);
                buf.emit(line, OpcodeKind::Print);
            }
            Stmt::Wait { until: false, expr } => {
                self.expr(buf, line, expr);
                buf.emit(line, OpcodeKind::Wait);
            }
            Stmt::Wait { until: true, expr } => {
                buf.emit(
                    line,
                    OpcodeKind::WaitUntil {
                        cond: self.expr_code(line, expr),
                    },
                );
            }
            Stmt::On { cond, body } => {
                let label = self.trigger_body(line, body);
                buf.emit(
                    line,
                    OpcodeKind::ArmTrigger {
                        kind: TriggerKind::Edge,
                        cond: self.expr_code(line, cond),
                        body: Target::Label(label),
                    },
                );
            }
            Stmt::When { cond, body } => {
                let label = self.trigger_body(line, body);
                buf.emit(
                    line,
                    OpcodeKind::ArmTrigger {
                        kind: TriggerKind::Level,
                        cond: self.expr_code(line, cond),
                        body: Target::Label(label),
                    },
                );
            }
            Stmt::Preserve => {
                buf.emit(line, OpcodeKind::Preserve);
            }
            Stmt::If {
                cond,
                then_body,
                else_body,
            } => {
                let end = self.ctx.next_label();
                self.expr(buf, line, cond);
                match else_body {
                    None => {
                        buf.emit(line, OpcodeKind::BranchFalse(Target::Label(end)));
                        for node in then_body {
                            self.stmt(buf, node);
                        }
                    }
                    Some(else_body) => {
                        let otherwise = self.ctx.next_label();
                        buf.emit(line, OpcodeKind::BranchFalse(Target::Label(otherwise)));
                        for node in then_body {
                            self.stmt(buf, node);
                        }
                        buf.emit(line, OpcodeKind::Jump(Target::Label(end)));
                        buf.mark(otherwise);
                        for node in else_body {
                            self.stmt(buf, node);
                        }
                    }
                }
                buf.mark(end);
            }
            Stmt::Until { cond, body } => {
                let top = self.ctx.next_label();
                let end = self.ctx.next_label();
                buf.mark(top);
                self.expr(buf, line, cond);
                buf.emit(line, OpcodeKind::Not);
                buf.emit(line, OpcodeKind::BranchFalse(Target::Label(end)));
                for node in body {
                    self.stmt(buf, node);
                }
                buf.emit(line, OpcodeKind::Jump(Target::Label(top)));
                buf.mark(end);
            }
            Stmt::Run { file, on } => {
                buf.emit(line, OpcodeKind::Push(Value::Text(file.clone())));
                match on {
                    None => buf.emit(line, OpcodeKind::RunFile { targeted: false }),
                    Some(volume) => {
                        self.expr(buf, line, volume);
                        buf.emit(line, OpcodeKind::RunFile { targeted: true });
                    }
                }
            }
        }
    }

    /// Lower a trigger body into its own part; returns the label on
    /// the body's first opcode.
    fn trigger_body(&mut self, line: u32, body: &[StmtNode]) -> Label {
        let label = self.ctx.next_label();
        let mut buf = Buf::new(self.ctx.generation());
        buf.mark(label);
        for node in body {
            self.stmt(&mut buf, node);
        }
        buf.emit(body.last().map(|s| s.line).unwrap_or(line), OpcodeKind::EndTrigger);
        let mut part = CodePart::new(
            format!("trigger-L{}", label.0),
            PartKind::Trigger,
            self.ctx.generation(),
        );
        part.code = buf.seal(line);
        self.ctx.register_part(part);
        label
    }

    /// Lower an expression inline into the current buffer.
    fn expr(&mut self, buf: &mut Buf, line: u32, expr: &Expr) {
        walk_expr(expr, &mut |kind| buf.emit(line, kind));
    }

    /// Lower an expression into a detached pure-opcode slice.
    fn expr_code(&mut self, line: u32, expr: &Expr) -> ExprCode {
        let generation = self.ctx.generation();
        let mut code = Vec::new();
        walk_expr(expr, &mut |kind| {
            let mut op = Opcode::new(kind);
            op.generation = generation;
            op.line = line;
            code.push(op);
        });
        Arc::new(code)
    }
}

/// Postorder walk emitting stack-machine opcodes.
fn walk_expr(expr: &Expr, emit: &mut dyn FnMut(OpcodeKind)) {
    match expr {
        Expr::Scalar(n) => emit(OpcodeKind::Push(Value::Scalar(*n))),
        Expr::Text(s) => emit(OpcodeKind::Push(Value::Text(s.clone()))),
        Expr::Bool(b) => emit(OpcodeKind::Push(Value::Bool(*b))),
        Expr::Var(name) => emit(OpcodeKind::Load(name.clone())),
        Expr::Unary { op, operand } => {
            walk_expr(operand, emit);
            emit(match op {
                UnaryOp::Neg => OpcodeKind::Neg,
                UnaryOp::Not => OpcodeKind::Not,
            });
        }
        Expr::Binary { op, lhs, rhs } => {
            walk_expr(lhs, emit);
            walk_expr(rhs, emit);
            emit(match op {
                BinaryOp::Add => OpcodeKind::Add,
                BinaryOp::Sub => OpcodeKind::Sub,
                BinaryOp::Mul => OpcodeKind::Mul,
                BinaryOp::Div => OpcodeKind::Div,
                BinaryOp::Pow => OpcodeKind::Pow,
                BinaryOp::Eq => OpcodeKind::Eq,
                BinaryOp::Ne => OpcodeKind::Ne,
                BinaryOp::Lt => OpcodeKind::Lt,
                BinaryOp::Gt => OpcodeKind::Gt,
                BinaryOp::Le => OpcodeKind::Le,
                BinaryOp::Ge => OpcodeKind::Ge,
                BinaryOp::And => OpcodeKind::And,
                BinaryOp::Or => OpcodeKind::Or,
            });
        }
    }
}
