//! Syntax tree for HelmScript statements and expressions.

/// A statement plus the source line it starts on.
#[derive(Debug, Clone, PartialEq)]
pub struct StmtNode {
    pub line: u32,
    pub stmt: Stmt,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// `SET name TO expr.`
    Set { name: String, expr: Expr },
    /// `LOCK name TO expr.`
    Lock { name: String, expr: Expr },
    /// `UNLOCK name.` / `UNLOCK ALL.` (`None` means ALL)
    Unlock { name: Option<String> },
    /// `PRINT expr.`
    Print(Expr),
    /// `WAIT expr.` / `WAIT UNTIL expr.`
    Wait { until: bool, expr: Expr },
    /// `ON expr { … }` — edge trigger.
    On { cond: Expr, body: Vec<StmtNode> },
    /// `WHEN expr THEN { … }` — level trigger.
    When { cond: Expr, body: Vec<StmtNode> },
    /// `PRESERVE.`
    Preserve,
    /// `IF expr { … } [ELSE { … }]`
    If {
        cond: Expr,
        then_body: Vec<StmtNode>,
        else_body: Option<Vec<StmtNode>>,
    },
    /// `UNTIL expr { … }`
    Until { cond: Expr, body: Vec<StmtNode> },
    /// `RUN "file".` / `RUN "file" ON expr.`
    Run { file: String, on: Option<Expr> },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Scalar(f64),
    Text(String),
    Bool(bool),
    Var(String),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    And,
    Or,
}
