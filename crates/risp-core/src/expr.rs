use std::rc::Rc;

use crate::error::Span;

/// A parsed expression. The reader produces these with macros already
/// expanded; only `MacroDef` sentinels survive to the evaluator.
#[derive(Debug, Clone)]
pub enum Expr {
    Number(f64),
    Str(String),
    Var(String, Span),
    /// The empty S-expression `()`.
    Unit(Span),
    SExpr {
        head: Box<Expr>,
        args: Vec<Expr>,
        span: Span,
    },
    ListExpr(Vec<Expr>),
    DictExpr(Vec<(Expr, Expr)>),
    LetVar {
        name: String,
        value: Box<Expr>,
    },
    LetFunc {
        name: String,
        params: Vec<String>,
        body: Rc<Expr>,
        span: Span,
    },
    Lambda {
        params: Vec<String>,
        body: Rc<Expr>,
        span: Span,
    },
    Do(Vec<Expr>),
    MacroDef {
        name: String,
        span: Span,
    },
}

impl Expr {
    pub fn span(&self) -> Option<Span> {
        match self {
            Expr::Var(_, span)
            | Expr::Unit(span)
            | Expr::SExpr { span, .. }
            | Expr::LetFunc { span, .. }
            | Expr::Lambda { span, .. }
            | Expr::MacroDef { span, .. } => Some(*span),
            _ => None,
        }
    }
}
