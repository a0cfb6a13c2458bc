//! Recursive descent parser for HelmScript.
//!
//! Statements dispatch on their leading keyword; expressions use
//! precedence climbing. The parser consumes the whole token stream
//! before codegen runs, so a parse failure never leaves partial
//! compilation state behind.

use crate::ast::{BinaryOp, Expr, Stmt, StmtNode, UnaryOp};
use crate::error::ParseError;
use crate::lexer::{Tok, Token};

pub(crate) fn parse(tokens: &[Token]) -> Result<Vec<StmtNode>, ParseError> {
    let mut stream = Stream { tokens, pos: 0 };
    let stmts = stream.statements(false)?;
    if let Some(token) = stream.peek() {
        return Err(stream.unexpected(token, "a statement"));
    }
    Ok(stmts)
}

struct Stream<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Stream<'a> {
    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<&'a Token> {
        let token = self.tokens.get(self.pos)?;
        self.pos += 1;
        Some(token)
    }

    /// Position to report when the stream runs out early.
    fn end_position(&self) -> (u32, u32) {
        match self.tokens.last() {
            Some(token) => (token.line, token.column),
            None => (1, 1),
        }
    }

    fn unexpected(&self, token: &Token, wanted: &str) -> ParseError {
        ParseError::new(
            token.line,
            token.column,
            format!("expected {}, found {}", wanted, describe(&token.tok)),
        )
    }

    fn missing(&self, wanted: &str) -> ParseError {
        let (line, column) = self.end_position();
        ParseError::new(line, column, format!("expected {}, found end of input", wanted))
    }

    fn expect(&mut self, tok: &Tok, wanted: &str) -> Result<&'a Token, ParseError> {
        match self.next() {
            Some(token) if token.tok == *tok => Ok(token),
            Some(token) => Err(self.unexpected(token, wanted)),
            None => Err(self.missing(wanted)),
        }
    }

    fn expect_keyword(&mut self, word: &str) -> Result<(), ParseError> {
        match self.next() {
            Some(token) if token.tok == Tok::Ident(word.into()) => Ok(()),
            Some(token) => Err(self.unexpected(token, &word.to_uppercase())),
            None => Err(self.missing(&word.to_uppercase())),
        }
    }

    fn expect_ident(&mut self, wanted: &str) -> Result<String, ParseError> {
        match self.next() {
            Some(Token {
                tok: Tok::Ident(name),
                ..
            }) => Ok(name.clone()),
            Some(token) => Err(self.unexpected(token, wanted)),
            None => Err(self.missing(wanted)),
        }
    }

    fn expect_dot(&mut self) -> Result<(), ParseError> {
        self.expect(&Tok::Dot, "'.'")?;
        Ok(())
    }

    /// Parse statements until end of input, or until a closing brace
    /// when `in_block`.
    fn statements(&mut self, in_block: bool) -> Result<Vec<StmtNode>, ParseError> {
        let mut stmts = Vec::new();
        loop {
            match self.peek() {
                None => {
                    if in_block {
                        return Err(self.missing("'}'"));
                    }
                    return Ok(stmts);
                }
                Some(token) if token.tok == Tok::RBrace => {
                    if in_block {
                        self.next();
                        return Ok(stmts);
                    }
                    return Err(self.unexpected(token, "a statement"));
                }
                Some(_) => stmts.push(self.statement()?),
            }
        }
    }

    fn block(&mut self) -> Result<Vec<StmtNode>, ParseError> {
        self.expect(&Tok::LBrace, "'{'")?;
        self.statements(true)
    }

    fn statement(&mut self) -> Result<StmtNode, ParseError> {
        let token = match self.peek() {
            Some(token) => token,
            None => return Err(self.missing("a statement")),
        };
        let line = token.line;
        let keyword = match &token.tok {
            Tok::Ident(word) => word.clone(),
            _ => return Err(self.unexpected(token, "a statement")),
        };
        self.next();

        let stmt = match keyword.as_str() {
            "set" => {
                let name = self.expect_ident("a variable name")?;
                self.expect_keyword("to")?;
                let expr = self.expression()?;
                self.expect_dot()?;
                Stmt::Set { name, expr }
            }
            "lock" => {
                let name = self.expect_ident("a variable name")?;
                self.expect_keyword("to")?;
                let expr = self.expression()?;
                self.expect_dot()?;
                Stmt::Lock { name, expr }
            }
            "unlock" => {
                let name = self.expect_ident("a variable name or ALL")?;
                self.expect_dot()?;
                if name == "all" {
                    Stmt::Unlock { name: None }
                } else {
                    Stmt::Unlock { name: Some(name) }
                }
            }
            "print" => {
                let expr = self.expression()?;
                self.expect_dot()?;
                Stmt::Print(expr)
            }
            "wait" => {
                let until = matches!(
                    self.peek(),
                    Some(Token { tok: Tok::Ident(word), .. }) if word == "until"
                );
                if until {
                    self.next();
                }
                let expr = self.expression()?;
                self.expect_dot()?;
                Stmt::Wait { until, expr }
            }
            "on" => {
                let cond = self.expression()?;
                let body = self.block()?;
                Stmt::On { cond, body }
            }
            "when" => {
                let cond = self.expression()?;
                self.expect_keyword("then")?;
                let body = self.block()?;
                Stmt::When { cond, body }
            }
            "preserve" => {
                self.expect_dot()?;
                Stmt::Preserve
            }
            "if" => {
                let cond = self.expression()?;
                let then_body = self.block()?;
                let else_body = match self.peek() {
                    Some(Token { tok: Tok::Ident(word), .. }) if word == "else" => {
                        self.next();
                        Some(self.block()?)
                    }
                    _ => None,
                };
                Stmt::If {
                    cond,
                    then_body,
                    else_body,
                }
            }
            "until" => {
                let cond = self.expression()?;
                let body = self.block()?;
                Stmt::Until { cond, body }
            }
            "run" => {
                let file = match self.next() {
                    Some(Token { tok: Tok::Str(s), .. }) => s.clone(),
                    Some(token) => return Err(self.unexpected(token, "a file name string")),
                    None => return Err(self.missing("a file name string")),
                };
                let on = match self.peek() {
                    Some(Token { tok: Tok::Ident(word), .. }) if word == "on" => {
                        self.next();
                        Some(self.expression()?)
                    }
                    _ => None,
                };
                self.expect_dot()?;
                Stmt::Run { file, on }
            }
            other => {
                return Err(ParseError::new(
                    line,
                    token.column,
                    format!("unknown statement '{}'", other),
                ));
            }
        };

        Ok(StmtNode { line, stmt })
    }

    fn expression(&mut self) -> Result<Expr, ParseError> {
        self.binary_expr(0)
    }

    fn binary_expr(&mut self, min_prec: u8) -> Result<Expr, ParseError> {
        let mut lhs = self.unary_expr()?;
        loop {
            let op = match self.peek() {
                Some(token) => match binary_op(&token.tok) {
                    Some(op) => op,
                    None => break,
                },
                None => break,
            };
            let (prec, right_assoc) = precedence(op);
            if prec < min_prec {
                break;
            }
            self.next();
            let next_min = if right_assoc { prec } else { prec + 1 };
            let rhs = self.binary_expr(next_min)?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn unary_expr(&mut self) -> Result<Expr, ParseError> {
        match self.peek() {
            Some(Token { tok: Tok::Minus, .. }) => {
                self.next();
                let operand = self.unary_expr()?;
                Ok(Expr::Unary {
                    op: UnaryOp::Neg,
                    operand: Box::new(operand),
                })
            }
            Some(Token { tok: Tok::Ident(word), .. }) if word == "not" => {
                self.next();
                let operand = self.unary_expr()?;
                Ok(Expr::Unary {
                    op: UnaryOp::Not,
                    operand: Box::new(operand),
                })
            }
            _ => self.primary_expr(),
        }
    }

    fn primary_expr(&mut self) -> Result<Expr, ParseError> {
        match self.next() {
            Some(Token { tok: Tok::Number(n), .. }) => Ok(Expr::Scalar(*n)),
            Some(Token { tok: Tok::Str(s), .. }) => Ok(Expr::Text(s.clone())),
            Some(Token { tok: Tok::Ident(word), .. }) => match word.as_str() {
                "true" => Ok(Expr::Bool(true)),
                "false" => Ok(Expr::Bool(false)),
                _ => Ok(Expr::Var(word.clone())),
            },
            Some(Token { tok: Tok::LParen, .. }) => {
                let expr = self.expression()?;
                self.expect(&Tok::RParen, "')'")?;
                Ok(expr)
            }
            Some(token) => Err(self.unexpected(token, "an expression")),
            None => Err(self.missing("an expression")),
        }
    }
}

fn binary_op(tok: &Tok) -> Option<BinaryOp> {
    match tok {
        Tok::Plus => Some(BinaryOp::Add),
        Tok::Minus => Some(BinaryOp::Sub),
        Tok::Star => Some(BinaryOp::Mul),
        Tok::Slash => Some(BinaryOp::Div),
        Tok::Caret => Some(BinaryOp::Pow),
        Tok::Eq => Some(BinaryOp::Eq),
        Tok::Ne => Some(BinaryOp::Ne),
        Tok::Lt => Some(BinaryOp::Lt),
        Tok::Gt => Some(BinaryOp::Gt),
        Tok::Le => Some(BinaryOp::Le),
        Tok::Ge => Some(BinaryOp::Ge),
        Tok::Ident(word) if word == "and" => Some(BinaryOp::And),
        Tok::Ident(word) if word == "or" => Some(BinaryOp::Or),
        _ => None,
    }
}

/// (precedence, right-associative)
fn precedence(op: BinaryOp) -> (u8, bool) {
    match op {
        BinaryOp::Or => (1, false),
        BinaryOp::And => (2, false),
        BinaryOp::Eq
        | BinaryOp::Ne
        | BinaryOp::Lt
        | BinaryOp::Gt
        | BinaryOp::Le
        | BinaryOp::Ge => (3, false),
        BinaryOp::Add | BinaryOp::Sub => (4, false),
        BinaryOp::Mul | BinaryOp::Div => (5, false),
        BinaryOp::Pow => (6, true),
    }
}

fn describe(tok: &Tok) -> String {
    match tok {
        Tok::Ident(word) => format!("'{}'", word),
        Tok::Number(n) => format!("number {}", n),
        Tok::Str(_) => "a string".into(),
        Tok::Dot => "'.'".into(),
        Tok::LBrace => "'{'".into(),
        Tok::RBrace => "'}'".into(),
        Tok::LParen => "'('".into(),
        Tok::RParen => "')'".into(),
        Tok::Plus => "'+'".into(),
        Tok::Minus => "'-'".into(),
        Tok::Star => "'*'".into(),
        Tok::Slash => "'/'".into(),
        Tok::Caret => "'^'".into(),
        Tok::Lt => "'<'".into(),
        Tok::Gt => "'>'".into(),
        Tok::Le => "'<='".into(),
        Tok::Ge => "'>='".into(),
        Tok::Eq => "'='".into(),
        Tok::Ne => "'<>'".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;

    fn parse_text(text: &str) -> Result<Vec<StmtNode>, ParseError> {
        parse(&tokenize(text)?)
    }

    #[test]
    fn set_statement() {
        let stmts = parse_text("set x to 1 + 2.").unwrap();
        assert_eq!(stmts.len(), 1);
        match &stmts[0].stmt {
            Stmt::Set { name, expr } => {
                assert_eq!(name, "x");
                assert!(matches!(expr, Expr::Binary { op: BinaryOp::Add, .. }));
            }
            other => panic!("unexpected statement {:?}", other),
        }
    }

    #[test]
    fn unlock_all_vs_name() {
        let stmts = parse_text("unlock all. unlock x.").unwrap();
        assert_eq!(stmts[0].stmt, Stmt::Unlock { name: None });
        assert_eq!(
            stmts[1].stmt,
            Stmt::Unlock {
                name: Some("x".into())
            }
        );
    }

    #[test]
    fn wait_and_wait_until() {
        let stmts = parse_text("wait 5. wait until flag.").unwrap();
        assert!(matches!(stmts[0].stmt, Stmt::Wait { until: false, .. }));
        assert!(matches!(stmts[1].stmt, Stmt::Wait { until: true, .. }));
    }

    #[test]
    fn on_block_needs_no_terminator() {
        let stmts = parse_text("on flag { print \"fired\". } print 1.").unwrap();
        assert_eq!(stmts.len(), 2);
        match &stmts[0].stmt {
            Stmt::On { body, .. } => assert_eq!(body.len(), 1),
            other => panic!("unexpected statement {:?}", other),
        }
    }

    #[test]
    fn when_then_block() {
        let stmts = parse_text("when alt > 100 then { print \"high\". }").unwrap();
        assert!(matches!(stmts[0].stmt, Stmt::When { .. }));
    }

    #[test]
    fn if_else() {
        let stmts = parse_text("if x = 1 { print 1. } else { print 2. }").unwrap();
        match &stmts[0].stmt {
            Stmt::If { else_body, .. } => assert!(else_body.is_some()),
            other => panic!("unexpected statement {:?}", other),
        }
    }

    #[test]
    fn run_with_and_without_target() {
        let stmts = parse_text("run \"boot\". run \"probe\" on drone.").unwrap();
        assert_eq!(
            stmts[0].stmt,
            Stmt::Run {
                file: "boot".into(),
                on: None
            }
        );
        match &stmts[1].stmt {
            Stmt::Run { file, on: Some(_) } => assert_eq!(file, "probe"),
            other => panic!("unexpected statement {:?}", other),
        }
    }

    #[test]
    fn pow_is_right_associative() {
        let stmts = parse_text("set x to 2 ^ 3 ^ 2.").unwrap();
        match &stmts[0].stmt {
            Stmt::Set { expr, .. } => match expr {
                Expr::Binary { op: BinaryOp::Pow, rhs, .. } => {
                    assert!(matches!(**rhs, Expr::Binary { op: BinaryOp::Pow, .. }));
                }
                other => panic!("unexpected expression {:?}", other),
            },
            other => panic!("unexpected statement {:?}", other),
        }
    }

    #[test]
    fn precedence_mul_over_add() {
        let stmts = parse_text("set x to 1 + 2 * 3.").unwrap();
        match &stmts[0].stmt {
            Stmt::Set { expr, .. } => match expr {
                Expr::Binary { op: BinaryOp::Add, rhs, .. } => {
                    assert!(matches!(**rhs, Expr::Binary { op: BinaryOp::Mul, .. }));
                }
                other => panic!("unexpected expression {:?}", other),
            },
            other => panic!("unexpected statement {:?}", other),
        }
    }

    #[test]
    fn missing_terminator_reports_position() {
        let err = parse_text("print 1").unwrap_err();
        assert_eq!(err.line, 1);
        assert!(err.message.contains("'.'"));
    }

    #[test]
    fn unknown_statement_reports_word() {
        let err = parse_text("launch now.").unwrap_err();
        assert!(err.message.contains("launch"));
    }

    #[test]
    fn unclosed_block_reports_missing_brace() {
        let err = parse_text("on flag { print 1.").unwrap_err();
        assert!(err.message.contains("'}'"));
    }
}
