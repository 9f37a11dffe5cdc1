use std::rc::Rc;

use risp_core::{Expr, RispError, Span};

use crate::lexer::{Lexer, Token, TokenKind};
use crate::macros;

/// Identifiers that dispatch to special-form handlers and are rejected in
/// every binding position. The macro layer never adds to this set.
const RESERVED: &[&str] = &["let", "\\", "do", "macro"];

pub(crate) fn is_reserved(name: &str) -> bool {
    RESERVED.contains(&name)
}

/// Read every top-level expression from `src`. Macro calls are expanded
/// during reading; the returned nodes are fully expanded forms or
/// `MacroDef` sentinels.
pub fn read_program(src: &str) -> Result<Vec<Expr>, RispError> {
    let mut reader = Reader::new(src);
    let mut exprs = Vec::new();
    while !reader.lexer.look_next()?.is_eof() {
        exprs.push(reader.read_expr()?);
    }
    Ok(exprs)
}

pub(crate) struct Reader {
    pub(crate) lexer: Lexer,
}

impl Reader {
    fn new(src: &str) -> Self {
        Reader {
            lexer: Lexer::new(src),
        }
    }

    /// Consume the next token, turning end-of-input into a parse failure.
    pub(crate) fn checked_next(&mut self) -> Result<Token, RispError> {
        let tok = self.lexer.next()?;
        if tok.is_eof() {
            return Err(RispError::Parse {
                message: "unexpected end of input".to_string(),
                span: tok.span,
            });
        }
        Ok(tok)
    }

    pub(crate) fn expect_sym(&mut self, ch: char) -> Result<Token, RispError> {
        let tok = self.lexer.next()?;
        match tok.kind {
            TokenKind::Sym(c) if c == ch => Ok(tok),
            TokenKind::Eof => Err(RispError::Parse {
                message: format!("expected `{ch}`, got end of input"),
                span: tok.span,
            }),
            _ => Err(RispError::Parse {
                message: format!("expected `{ch}`, got `{}`", tok.text),
                span: tok.span,
            }),
        }
    }

    pub(crate) fn read_expr(&mut self) -> Result<Expr, RispError> {
        let tok = self.lexer.look_next()?;
        match tok.kind {
            TokenKind::Eof => Err(RispError::Parse {
                message: "unexpected end of input".to_string(),
                span: tok.span,
            }),
            TokenKind::Number(n) => {
                self.lexer.next()?;
                Ok(Expr::Number(n))
            }
            TokenKind::Str(s) => {
                self.lexer.next()?;
                Ok(Expr::Str(s))
            }
            TokenKind::Ident(name) => {
                self.lexer.next()?;
                if is_reserved(&name) {
                    return Err(RispError::Parse {
                        message: format!("keyword `{name}` cannot be used here"),
                        span: tok.span,
                    });
                }
                Ok(Expr::Var(name, tok.span))
            }
            TokenKind::Sym('(') => self.read_form(),
            TokenKind::Sym('[') => self.read_list(),
            TokenKind::Sym('{') => self.read_dict(),
            TokenKind::Sym(ch @ (')' | ']' | '}')) => {
                // raises the unmatched-bracket error when the counter is spent
                self.lexer.next()?;
                Err(RispError::Parse {
                    message: format!("unexpected `{ch}`"),
                    span: tok.span,
                })
            }
            TokenKind::Sym(ch) => Err(RispError::Parse {
                message: format!("unexpected `{ch}`"),
                span: tok.span,
            }),
        }
    }

    fn read_form(&mut self) -> Result<Expr, RispError> {
        let open = self.expect_sym('(')?;
        let span = open.span;

        let first = self.lexer.look_next()?;
        if let TokenKind::Sym(')') = first.kind {
            self.lexer.next()?;
            return Ok(Expr::Unit(span));
        }
        if let TokenKind::Ident(name) = &first.kind {
            if is_reserved(name) {
                let name = name.clone();
                self.lexer.next()?;
                return match name.as_str() {
                    "let" => self.read_let(span),
                    "\\" => self.read_lambda(span),
                    "do" => self.read_do(span),
                    _ => macros::read_definition(self, span),
                };
            }
        }

        // Head identifier noted without consuming: a registered macro name
        // rewrites the collected argument list before the evaluator runs.
        let head_name = match &first.kind {
            TokenKind::Ident(name) => Some(name.clone()),
            _ => None,
        };

        let mut items = Vec::new();
        loop {
            let tok = self.lexer.look_next()?;
            match tok.kind {
                TokenKind::Sym(')') => break,
                TokenKind::Eof => {
                    return Err(RispError::Parse {
                        message: "unterminated S-expression".to_string(),
                        span,
                    })
                }
                _ => items.push(self.read_expr()?),
            }
        }
        self.lexer.next()?;

        if let Some(name) = head_name {
            if macros::is_macro(&name) {
                return macros::expand(&name, &items[1..], span);
            }
        }
        let head = items.remove(0);
        Ok(Expr::SExpr {
            head: Box::new(head),
            args: items,
            span,
        })
    }

    fn read_list(&mut self) -> Result<Expr, RispError> {
        let open = self.expect_sym('[')?;
        let mut items = Vec::new();
        loop {
            let tok = self.lexer.look_next()?;
            match tok.kind {
                TokenKind::Sym(']') => break,
                TokenKind::Eof => {
                    return Err(RispError::Parse {
                        message: "unterminated list".to_string(),
                        span: open.span,
                    })
                }
                _ => items.push(self.read_expr()?),
            }
        }
        self.lexer.next()?;
        Ok(Expr::ListExpr(items))
    }

    fn read_dict(&mut self) -> Result<Expr, RispError> {
        let open = self.expect_sym('{')?;
        let mut pairs = Vec::new();
        loop {
            let tok = self.lexer.look_next()?;
            match tok.kind {
                TokenKind::Sym('}') => break,
                TokenKind::Eof => {
                    return Err(RispError::Parse {
                        message: "unterminated dictionary".to_string(),
                        span: open.span,
                    })
                }
                _ => {
                    self.expect_sym('(')?;
                    let key = self.read_expr()?;
                    let value = self.read_expr()?;
                    self.expect_sym(')')?;
                    pairs.push((key, value));
                }
            }
        }
        self.lexer.next()?;
        Ok(Expr::DictExpr(pairs))
    }

    fn read_let(&mut self, span: Span) -> Result<Expr, RispError> {
        let tok = self.checked_next()?;
        match tok.kind {
            TokenKind::Ident(name) => {
                if is_reserved(&name) {
                    return Err(RispError::Parse {
                        message: format!("keyword `{name}` is not a valid binding name"),
                        span: tok.span,
                    });
                }
                let value = self.read_expr()?;
                self.expect_sym(')')?;
                Ok(Expr::LetVar {
                    name,
                    value: Box::new(value),
                })
            }
            TokenKind::Sym('(') => {
                let name_tok = self.checked_next()?;
                let name = match name_tok.kind {
                    TokenKind::Ident(name) if !is_reserved(&name) => name,
                    _ => {
                        return Err(RispError::Parse {
                            message: format!("expected function name, got `{}`", name_tok.text),
                            span: name_tok.span,
                        })
                    }
                };
                let params = self.read_params()?;
                let body = self.read_expr()?;
                self.expect_sym(')')?;
                Ok(Expr::LetFunc {
                    name,
                    params,
                    body: Rc::new(body),
                    span,
                })
            }
            _ => Err(RispError::Parse {
                message: format!("expected identifier or `(` after `let`, got `{}`", tok.text),
                span: tok.span,
            }),
        }
    }

    fn read_lambda(&mut self, span: Span) -> Result<Expr, RispError> {
        self.expect_sym('(')?;
        let params = self.read_params()?;
        let body = self.read_expr()?;
        self.expect_sym(')')?;
        Ok(Expr::Lambda {
            params,
            body: Rc::new(body),
            span,
        })
    }

    /// Parameter identifiers of a `let` function header or lambda. The
    /// opening `(` has been consumed, so the loop snapshots the round
    /// counter minus one and reads until the live counter drops back to
    /// it — the closing `)` is consumed as part of the loop.
    fn read_params(&mut self) -> Result<Vec<String>, RispError> {
        let target = self.lexer.brackets().round - 1;
        let mut params = Vec::new();
        while self.lexer.brackets().round != target {
            let tok = self.checked_next()?;
            match tok.kind {
                TokenKind::Ident(name) => {
                    if is_reserved(&name) {
                        return Err(RispError::Parse {
                            message: format!("keyword `{name}` is not a valid parameter name"),
                            span: tok.span,
                        });
                    }
                    params.push(name);
                }
                TokenKind::Sym(')') => {}
                _ => {
                    return Err(RispError::Parse {
                        message: format!("expected parameter name, got `{}`", tok.text),
                        span: tok.span,
                    })
                }
            }
        }
        Ok(params)
    }

    fn read_do(&mut self, span: Span) -> Result<Expr, RispError> {
        let mut items = Vec::new();
        loop {
            let tok = self.lexer.look_next()?;
            match tok.kind {
                TokenKind::Sym(')') => break,
                TokenKind::Eof => {
                    return Err(RispError::Parse {
                        message: "unterminated `do` form".to_string(),
                        span,
                    })
                }
                _ => items.push(self.read_expr()?),
            }
        }
        self.lexer.next()?;
        if items.is_empty() {
            return Err(RispError::Parse {
                message: "empty `do` form".to_string(),
                span,
            });
        }
        Ok(Expr::Do(items))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_one(src: &str) -> Expr {
        let mut exprs = read_program(src).expect("read failure");
        assert_eq!(exprs.len(), 1, "expected a single expression");
        exprs.remove(0)
    }

    fn read_err(src: &str) -> String {
        read_program(src).unwrap_err().to_string()
    }

    #[test]
    fn test_atoms() {
        assert!(matches!(read_one("41"), Expr::Number(n) if n == 41.0));
        assert!(matches!(read_one("\"hi\""), Expr::Str(s) if s == "hi"));
        assert!(matches!(read_one("inc"), Expr::Var(name, _) if name == "inc"));
    }

    #[test]
    fn test_empty_sexpr_is_unit() {
        assert!(matches!(read_one("()"), Expr::Unit(_)));
    }

    #[test]
    fn test_sexpr_head_and_args() {
        match read_one("(add 1 2)") {
            Expr::SExpr { head, args, .. } => {
                assert!(matches!(*head, Expr::Var(name, _) if name == "add"));
                assert_eq!(args.len(), 2);
            }
            other => panic!("expected SExpr, got {other:?}"),
        }
    }

    #[test]
    fn test_computed_head() {
        match read_one("((f 1) 2)") {
            Expr::SExpr { head, args, .. } => {
                assert!(matches!(*head, Expr::SExpr { .. }));
                assert_eq!(args.len(), 1);
            }
            other => panic!("expected SExpr, got {other:?}"),
        }
    }

    #[test]
    fn test_list_and_dict_literals() {
        assert!(matches!(read_one("[1 2 3]"), Expr::ListExpr(items) if items.len() == 3));
        match read_one("{ (1 \"a\") (2 \"b\") }") {
            Expr::DictExpr(pairs) => assert_eq!(pairs.len(), 2),
            other => panic!("expected DictExpr, got {other:?}"),
        }
    }

    #[test]
    fn test_let_var() {
        match read_one("(let x 41)") {
            Expr::LetVar { name, value } => {
                assert_eq!(name, "x");
                assert!(matches!(*value, Expr::Number(n) if n == 41.0));
            }
            other => panic!("expected LetVar, got {other:?}"),
        }
    }

    #[test]
    fn test_let_func() {
        match read_one("(let (add2 a b) (add a b))") {
            Expr::LetFunc { name, params, .. } => {
                assert_eq!(name, "add2");
                assert_eq!(params, vec!["a".to_string(), "b".to_string()]);
            }
            other => panic!("expected LetFunc, got {other:?}"),
        }
    }

    #[test]
    fn test_lambda() {
        match read_one("(\\ (x) (mul x x))") {
            Expr::Lambda { params, .. } => assert_eq!(params, vec!["x".to_string()]),
            other => panic!("expected Lambda, got {other:?}"),
        }
    }

    #[test]
    fn test_lambda_no_params() {
        match read_one("(\\ () 1)") {
            Expr::Lambda { params, .. } => assert!(params.is_empty()),
            other => panic!("expected Lambda, got {other:?}"),
        }
    }

    #[test]
    fn test_do_form() {
        assert!(matches!(read_one("(do 1 2 3)"), Expr::Do(items) if items.len() == 3));
    }

    #[test]
    fn test_empty_do_is_rejected() {
        assert!(read_err("(do)").contains("empty `do`"));
    }

    #[test]
    fn test_keyword_misuse() {
        assert!(read_err("let").contains("keyword `let`"));
        assert!(read_err("(let do 1)").contains("not a valid binding name"));
        assert!(read_err("(let (f do) 1)").contains("not a valid parameter name"));
        assert!(read_err("(add let 1)").contains("keyword `let`"));
    }

    #[test]
    fn test_unterminated_forms() {
        assert!(read_err("(add 1").contains("unterminated S-expression"));
        assert!(read_err("[1 2").contains("unterminated list"));
        assert!(read_err("{ (1 2)").contains("unterminated dictionary"));
    }

    #[test]
    fn test_stray_close_bracket() {
        assert!(read_err(")").contains("unmatched `)`"));
    }

    #[test]
    fn test_dict_entries_must_be_pairs() {
        assert!(read_err("{ 1 }").contains("expected `(`"));
    }

    #[test]
    fn test_top_level_sequence() {
        let exprs = read_program("(let x 1) x (add x 1)").unwrap();
        assert_eq!(exprs.len(), 3);
    }
}
