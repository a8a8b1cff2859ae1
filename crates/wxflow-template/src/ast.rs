//! Template AST.

/// A node in a compiled template.
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateNode {
    /// Literal text emitted verbatim.
    Literal(String),

    /// A `{{ expr }}` substitution.
    Expr(Expr),

    /// A `{% if %}` chain: condition/body branches plus an optional else.
    If {
        branches: Vec<(Expr, Vec<TemplateNode>)>,
        else_branch: Option<Vec<TemplateNode>>,
    },

    /// A `{% for var in iterable %}` loop.
    For {
        var: String,
        iterable: Expr,
        body: Vec<TemplateNode>,
    },
}

/// An expression inside a substitution or control block.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A literal scalar.
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    Null,

    /// A dotted variable path (`a.b.c`).
    Var(Vec<String>),

    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),

    /// A filter application: `input | name(args...)`.
    Filter {
        input: Box<Expr>,
        name: String,
        args: Vec<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Concat,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}
