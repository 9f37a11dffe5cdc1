use std::cell::RefCell;
use std::rc::Rc;

use hashbrown::{HashMap, HashSet};
use risp_core::{Expr, RispError, Span};

use crate::lexer::TokenKind;
use crate::reader::{is_reserved, Reader};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bracket {
    Round,
    Square,
    Curly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CaptureKind {
    Expr,
    Token,
    Number,
    String,
    Ident,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RepKind {
    /// `%?` — zero or one
    Optional,
    /// `%*` — zero or more
    ZeroOrMore,
    /// `%+` — one or more
    OneOrMore,
}

#[derive(Debug, Clone)]
enum Pattern {
    LitNumber(f64),
    LitString(String),
    LitIdent(String),
    Capture {
        name: Option<String>,
        kind: CaptureKind,
    },
    Section {
        name: Option<String>,
        terms: Vec<Pattern>,
    },
    Selector {
        name: Option<String>,
        choices: Vec<Pattern>,
    },
    Group {
        bracket: Bracket,
        terms: Vec<Pattern>,
    },
    Repeat {
        name: Option<String>,
        term: Box<Pattern>,
        rep: RepKind,
    },
}

#[derive(Debug, Clone)]
enum Template {
    Number(f64),
    Str(String),
    Ident(String),
    /// `%name` — substitute a single captured expression.
    Subst(String),
    /// `%%name` — splice an accumulated sequence into the enclosing group.
    Splice(String),
    Group {
        bracket: Bracket,
        items: Vec<Template>,
    },
}

#[derive(Debug)]
struct MacroDef {
    name: String,
    pattern: Vec<Pattern>,
    template: Template,
}

/// What a pattern name captured: a single expression, or the sequence
/// consumed by a section, selector, or repeat.
#[derive(Debug, Clone)]
enum Binding {
    One(Expr),
    Seq(Vec<Expr>),
}

type Bindings = HashMap<String, Binding>;

// ── Registry ──────────────────────────────────────────────────────
//
// Initialized empty, mutated by every `macro` form read, never cleared.
// One interpreter thread owns one registry; isolation means a fresh
// thread.

thread_local! {
    static REGISTRY: RefCell<HashMap<String, Rc<MacroDef>>> = RefCell::new(HashMap::new());
}

pub(crate) fn is_macro(name: &str) -> bool {
    REGISTRY.with(|r| r.borrow().contains_key(name))
}

fn lookup(name: &str) -> Option<Rc<MacroDef>> {
    REGISTRY.with(|r| r.borrow().get(name).cloned())
}

// ── Definition parsing ────────────────────────────────────────────

/// Parse `(macro (<name> <pattern-term>...) <template>)` — the leading
/// `macro` keyword has been consumed. Registers the definition and
/// returns the sentinel node, which evaluates to unit.
pub(crate) fn read_definition(r: &mut Reader, span: Span) -> Result<Expr, RispError> {
    r.expect_sym('(')?;
    let name_tok = r.checked_next()?;
    let name = match name_tok.kind {
        TokenKind::Ident(name) if !is_reserved(&name) => name,
        _ => {
            return Err(RispError::Parse {
                message: format!("expected macro name, got `{}`", name_tok.text),
                span: name_tok.span,
            })
        }
    };

    let mut seen = HashSet::new();
    let pattern = parse_pattern_seq(r, ')', &mut seen)?;
    let template = parse_template(r)?;
    r.expect_sym(')')?;

    REGISTRY.with(|reg| {
        let mut reg = reg.borrow_mut();
        if reg.contains_key(&name) {
            return Err(RispError::Macro {
                message: format!("macro `{name}` is already defined"),
                span,
            });
        }
        reg.insert(
            name.clone(),
            Rc::new(MacroDef {
                name: name.clone(),
                pattern,
                template,
            }),
        );
        Ok(())
    })?;

    Ok(Expr::MacroDef { name, span })
}

/// Parse pattern terms up to (and including) the closing bracket `close`.
fn parse_pattern_seq(
    r: &mut Reader,
    close: char,
    seen: &mut HashSet<String>,
) -> Result<Vec<Pattern>, RispError> {
    let mut terms: Vec<Pattern> = Vec::new();
    loop {
        let tok = r.checked_next()?;
        match tok.kind {
            TokenKind::Sym(c) if c == close => return Ok(terms),
            TokenKind::Number(n) => terms.push(Pattern::LitNumber(n)),
            TokenKind::Str(s) => terms.push(Pattern::LitString(s)),
            TokenKind::Ident(id) => terms.push(Pattern::LitIdent(id)),
            TokenKind::Sym('(') => terms.push(Pattern::Group {
                bracket: Bracket::Round,
                terms: parse_pattern_seq(r, ')', seen)?,
            }),
            TokenKind::Sym('[') => terms.push(Pattern::Group {
                bracket: Bracket::Square,
                terms: parse_pattern_seq(r, ']', seen)?,
            }),
            TokenKind::Sym('{') => terms.push(Pattern::Group {
                bracket: Bracket::Curly,
                terms: parse_pattern_seq(r, '}', seen)?,
            }),
            TokenKind::Sym('%') => {
                let name_tok = r.checked_next()?;
                let id = match name_tok.kind {
                    TokenKind::Ident(id) => id,
                    _ => {
                        return Err(RispError::Macro {
                            message: format!("expected name after `%`, got `{}`", name_tok.text),
                            span: name_tok.span,
                        })
                    }
                };
                match id.as_str() {
                    // Repetition markers re-scope the preceding term: its
                    // name moves to the repeat node, the term itself
                    // becomes anonymous under it.
                    "?" | "*" | "+" => {
                        let rep = match id.as_str() {
                            "?" => RepKind::Optional,
                            "*" => RepKind::ZeroOrMore,
                            _ => RepKind::OneOrMore,
                        };
                        let prev = terms.pop().ok_or_else(|| RispError::Macro {
                            message: format!("`%{id}` has no preceding pattern term"),
                            span: name_tok.span,
                        })?;
                        if matches!(prev, Pattern::Repeat { .. }) {
                            return Err(RispError::Macro {
                                message: "cannot repeat a repetition".to_string(),
                                span: name_tok.span,
                            });
                        }
                        let (name, term) = take_name(prev);
                        terms.push(Pattern::Repeat {
                            name,
                            term: Box::new(term),
                            rep,
                        });
                    }
                    _ => {
                        if !seen.insert(id.clone()) {
                            return Err(RispError::Macro {
                                message: format!("duplicated bound name `{id}`"),
                                span: name_tok.span,
                            });
                        }
                        terms.push(parse_named_term(r, id, seen)?);
                    }
                }
            }
            _ => {
                return Err(RispError::Macro {
                    message: format!("unexpected `{}` in macro pattern", tok.text),
                    span: tok.span,
                })
            }
        }
    }
}

/// Parse the body of a `%name…` term, after the name.
fn parse_named_term(
    r: &mut Reader,
    name: String,
    seen: &mut HashSet<String>,
) -> Result<Pattern, RispError> {
    let next = r.lexer.look_next()?;
    match next.kind {
        TokenKind::Sym('{') => {
            r.lexer.next()?;
            let kind_tok = r.checked_next()?;
            let kind = match &kind_tok.kind {
                TokenKind::Ident(k) => match k.as_str() {
                    "expr" => CaptureKind::Expr,
                    "token" => CaptureKind::Token,
                    "number" => CaptureKind::Number,
                    "string" => CaptureKind::String,
                    "ident" => CaptureKind::Ident,
                    other => {
                        return Err(RispError::Macro {
                            message: format!("unknown capture kind `{other}`"),
                            span: kind_tok.span,
                        })
                    }
                },
                _ => {
                    return Err(RispError::Macro {
                        message: format!("expected capture kind, got `{}`", kind_tok.text),
                        span: kind_tok.span,
                    })
                }
            };
            r.expect_sym('}')?;
            Ok(Pattern::Capture {
                name: Some(name),
                kind,
            })
        }
        TokenKind::Sym('(') => {
            r.lexer.next()?;
            Ok(Pattern::Section {
                name: Some(name),
                terms: parse_pattern_seq(r, ')', seen)?,
            })
        }
        TokenKind::Sym('[') => {
            r.lexer.next()?;
            Ok(Pattern::Selector {
                name: Some(name),
                choices: parse_pattern_seq(r, ']', seen)?,
            })
        }
        _ => Err(RispError::Macro {
            message: format!("expected `{{`, `(` or `[` after `%{name}`"),
            span: next.span,
        }),
    }
}

fn take_name(pattern: Pattern) -> (Option<String>, Pattern) {
    match pattern {
        Pattern::Capture { name, kind } => (name, Pattern::Capture { name: None, kind }),
        Pattern::Section { name, terms } => (name, Pattern::Section { name: None, terms }),
        Pattern::Selector { name, choices } => (name, Pattern::Selector { name: None, choices }),
        other => (None, other),
    }
}

// ── Template parsing ──────────────────────────────────────────────

fn parse_template(r: &mut Reader) -> Result<Template, RispError> {
    let tok = r.checked_next()?;
    match tok.kind {
        TokenKind::Number(n) => Ok(Template::Number(n)),
        TokenKind::Str(s) => Ok(Template::Str(s)),
        TokenKind::Ident(id) => Ok(Template::Ident(id)),
        TokenKind::Sym('%') => {
            let next = r.checked_next()?;
            match next.kind {
                TokenKind::Ident(name) => Ok(Template::Subst(name)),
                TokenKind::Sym('%') => {
                    let name_tok = r.checked_next()?;
                    match name_tok.kind {
                        TokenKind::Ident(name) => Ok(Template::Splice(name)),
                        _ => Err(RispError::Macro {
                            message: format!("expected name after `%%`, got `{}`", name_tok.text),
                            span: name_tok.span,
                        }),
                    }
                }
                _ => Err(RispError::Macro {
                    message: format!("expected name after `%`, got `{}`", next.text),
                    span: next.span,
                }),
            }
        }
        TokenKind::Sym('(') => Ok(Template::Group {
            bracket: Bracket::Round,
            items: parse_template_seq(r, ')')?,
        }),
        TokenKind::Sym('[') => Ok(Template::Group {
            bracket: Bracket::Square,
            items: parse_template_seq(r, ']')?,
        }),
        TokenKind::Sym('{') => Ok(Template::Group {
            bracket: Bracket::Curly,
            items: parse_template_seq(r, '}')?,
        }),
        _ => Err(RispError::Macro {
            message: format!("unexpected `{}` in macro template", tok.text),
            span: tok.span,
        }),
    }
}

fn parse_template_seq(r: &mut Reader, close: char) -> Result<Vec<Template>, RispError> {
    let mut items = Vec::new();
    loop {
        let tok = r.lexer.look_next()?;
        match tok.kind {
            TokenKind::Sym(c) if c == close => {
                r.lexer.next()?;
                return Ok(items);
            }
            TokenKind::Eof => {
                return Err(RispError::Parse {
                    message: "unexpected end of input in macro template".to_string(),
                    span: tok.span,
                })
            }
            _ => items.push(parse_template(r)?),
        }
    }
}

// ── Matching ──────────────────────────────────────────────────────
//
// A deterministic greedy backtracking matcher over the argument
// expression sequence: each term enumerates its possible consumptions
// longest-first and the sequence matcher recurses over the rest. The
// first complete traversal that exhausts the input wins.

/// Expand the macro `name` against a call site's argument expressions.
pub(crate) fn expand(name: &str, args: &[Expr], span: Span) -> Result<Expr, RispError> {
    let def = lookup(name).ok_or_else(|| RispError::Macro {
        message: format!("unknown macro `{name}`"),
        span,
    })?;
    let binds = match_seq(&def.pattern, args, &Bindings::new()).ok_or_else(|| RispError::Macro {
        message: format!("arguments do not match the pattern of macro `{}`", def.name),
        span,
    })?;
    expand_template(&def.template, &binds, span)
}

fn match_seq(terms: &[Pattern], input: &[Expr], binds: &Bindings) -> Option<Bindings> {
    let Some((term, rest)) = terms.split_first() else {
        return input.is_empty().then(|| binds.clone());
    };
    for (consumed, new_binds) in term_options(term, input, binds) {
        if let Some(done) = match_seq(rest, &input[consumed..], &new_binds) {
            return Some(done);
        }
    }
    None
}

/// All ways `term` can consume a prefix of `input`, preferred first.
fn term_options(term: &Pattern, input: &[Expr], binds: &Bindings) -> Vec<(usize, Bindings)> {
    match term {
        Pattern::LitNumber(n) => match input.first() {
            Some(Expr::Number(m)) if m == n => vec![(1, binds.clone())],
            _ => Vec::new(),
        },
        Pattern::LitString(s) => match input.first() {
            Some(Expr::Str(t)) if t == s => vec![(1, binds.clone())],
            _ => Vec::new(),
        },
        Pattern::LitIdent(id) => match input.first() {
            Some(Expr::Var(v, _)) if v == id => vec![(1, binds.clone())],
            _ => Vec::new(),
        },
        Pattern::Capture { name, kind } => match input.first() {
            Some(expr) if capture_accepts(*kind, expr) => {
                let mut binds = binds.clone();
                if let Some(name) = name {
                    binds.insert(name.clone(), Binding::One(expr.clone()));
                }
                vec![(1, binds)]
            }
            _ => Vec::new(),
        },
        Pattern::Group { bracket, terms } => match input.first() {
            Some(expr) => match group_parts(*bracket, expr) {
                Some(parts) => match match_seq(terms, &parts, binds) {
                    Some(binds) => vec![(1, binds)],
                    None => Vec::new(),
                },
                None => Vec::new(),
            },
            None => Vec::new(),
        },
        Pattern::Section { name, terms } => {
            let mut options = Vec::new();
            for take in (0..=input.len()).rev() {
                if let Some(mut binds) = match_seq(terms, &input[..take], binds) {
                    if let Some(name) = name {
                        binds.insert(name.clone(), Binding::Seq(input[..take].to_vec()));
                    }
                    options.push((take, binds));
                }
            }
            options
        }
        Pattern::Selector { name, choices } => {
            for choice in choices {
                let options = term_options(choice, input, binds);
                if !options.is_empty() {
                    return options
                        .into_iter()
                        .map(|(take, mut binds)| {
                            if let Some(name) = name {
                                let consumed = input[..take].to_vec();
                                let binding = match consumed.len() {
                                    1 => Binding::One(consumed.into_iter().next().unwrap()),
                                    _ => Binding::Seq(consumed),
                                };
                                binds.insert(name.clone(), binding);
                            }
                            (take, binds)
                        })
                        .collect();
                }
            }
            Vec::new()
        }
        Pattern::Repeat { name, term, rep } => repeat_options(name, term, *rep, input, binds),
    }
}

fn capture_accepts(kind: CaptureKind, expr: &Expr) -> bool {
    match kind {
        CaptureKind::Expr => true,
        CaptureKind::Token => matches!(expr, Expr::Number(_) | Expr::Str(_) | Expr::Var(..)),
        CaptureKind::Number => matches!(expr, Expr::Number(_)),
        CaptureKind::String => matches!(expr, Expr::Str(_)),
        CaptureKind::Ident => matches!(expr, Expr::Var(..)),
    }
}

/// Decompose a bracketed argument form into the sequence a structural
/// group's terms match against. Dictionary entries reappear as
/// `(key value)` forms, mirroring the literal syntax.
fn group_parts(bracket: Bracket, expr: &Expr) -> Option<Vec<Expr>> {
    match (bracket, expr) {
        (Bracket::Round, Expr::Unit(_)) => Some(Vec::new()),
        (Bracket::Round, Expr::SExpr { head, args, .. }) => {
            let mut parts = vec![(**head).clone()];
            parts.extend(args.iter().cloned());
            Some(parts)
        }
        (Bracket::Square, Expr::ListExpr(items)) => Some(items.clone()),
        (Bracket::Curly, Expr::DictExpr(pairs)) => Some(
            pairs
                .iter()
                .map(|(k, v)| Expr::SExpr {
                    head: Box::new(k.clone()),
                    args: vec![v.clone()],
                    span: k.span().unwrap_or(Span::new(0, 0)),
                })
                .collect(),
        ),
        _ => None,
    }
}

fn repeat_options(
    name: &Option<String>,
    term: &Pattern,
    rep: RepKind,
    input: &[Expr],
    binds: &Bindings,
) -> Vec<(usize, Bindings)> {
    let max_iters = match rep {
        RepKind::Optional => 1,
        _ => usize::MAX,
    };
    let min_iters = match rep {
        RepKind::OneOrMore => 1,
        _ => 0,
    };

    let mut raw = Vec::new();
    collect_repeat(term, input, 0, 0, max_iters, &Bindings::new(), &mut raw);

    raw.into_iter()
        .filter(|(_, _, iters)| *iters >= min_iters)
        .map(|(take, acc, _)| {
            let mut out = binds.clone();
            for (k, v) in acc {
                out.insert(k, v);
            }
            if let Some(name) = name {
                out.insert(name.clone(), Binding::Seq(input[..take].to_vec()));
            }
            (take, out)
        })
        .collect()
}

/// Depth-first enumeration of repeat iterations; deeper traversals are
/// recorded first, which makes the repeat greedy.
fn collect_repeat(
    term: &Pattern,
    input: &[Expr],
    consumed: usize,
    iters: usize,
    max_iters: usize,
    acc: &Bindings,
    out: &mut Vec<(usize, Bindings, usize)>,
) {
    if iters < max_iters {
        for (take, iter_binds) in term_options(term, &input[consumed..], &Bindings::new()) {
            if take == 0 {
                continue;
            }
            let mut next = acc.clone();
            merge_iteration(&mut next, iter_binds);
            collect_repeat(term, input, consumed + take, iters + 1, max_iters, &next, out);
        }
    }
    out.push((consumed, acc.clone(), iters));
}

/// Names captured inside a repeated term accumulate across iterations.
fn merge_iteration(acc: &mut Bindings, iteration: Bindings) {
    for (name, binding) in iteration {
        let slot = acc
            .entry(name)
            .or_insert_with(|| Binding::Seq(Vec::new()));
        if let Binding::Seq(seq) = slot {
            match binding {
                Binding::One(expr) => seq.push(expr),
                Binding::Seq(exprs) => seq.extend(exprs),
            }
        }
    }
}

// ── Expansion ─────────────────────────────────────────────────────

fn expand_template(template: &Template, binds: &Bindings, span: Span) -> Result<Expr, RispError> {
    match template {
        Template::Number(n) => Ok(Expr::Number(*n)),
        Template::Str(s) => Ok(Expr::Str(s.clone())),
        Template::Ident(id) => Ok(Expr::Var(id.clone(), span)),
        Template::Subst(name) => match binds.get(name) {
            Some(Binding::One(expr)) => Ok(expr.clone()),
            Some(Binding::Seq(_)) => Err(RispError::Macro {
                message: format!("`%{name}` holds a sequence; use `%%{name}` to splice it"),
                span,
            }),
            None => Err(RispError::Macro {
                message: format!("macro template references unbound name `{name}`"),
                span,
            }),
        },
        Template::Splice(name) => Err(RispError::Macro {
            message: format!("`%%{name}` may only appear inside a bracketed group"),
            span,
        }),
        Template::Group { bracket, items } => {
            let mut out = Vec::new();
            for item in items {
                if let Template::Splice(name) = item {
                    match binds.get(name) {
                        Some(Binding::Seq(exprs)) => out.extend(exprs.iter().cloned()),
                        Some(Binding::One(expr)) => out.push(expr.clone()),
                        None => {
                            return Err(RispError::Macro {
                                message: format!(
                                    "macro template references unbound name `{name}`"
                                ),
                                span,
                            })
                        }
                    }
                } else {
                    out.push(expand_template(item, binds, span)?);
                }
            }
            match bracket {
                Bracket::Round => {
                    if let Some(Template::Ident(head)) = items.first() {
                        // A group headed by another macro's name is itself
                        // expanded, keeping reader output fully expanded.
                        if is_macro(head) {
                            return expand(head, &out[1..], span);
                        }
                        // Reserved heads assemble the special form the
                        // reader would have produced for the same text.
                        if is_reserved(head) {
                            return assemble_special(head, out, span);
                        }
                    }
                    if out.is_empty() {
                        return Ok(Expr::Unit(span));
                    }
                    let head = out.remove(0);
                    Ok(Expr::SExpr {
                        head: Box::new(head),
                        args: out,
                        span,
                    })
                }
                Bracket::Square => Ok(Expr::ListExpr(out)),
                Bracket::Curly => {
                    let mut pairs = Vec::new();
                    for entry in out {
                        match entry {
                            Expr::SExpr { head, args, .. } if args.len() == 1 => {
                                let mut args = args;
                                pairs.push((*head, args.remove(0)));
                            }
                            _ => {
                                return Err(RispError::Macro {
                                    message:
                                        "dictionary template entries must be (key value) groups"
                                            .to_string(),
                                    span,
                                })
                            }
                        }
                    }
                    Ok(Expr::DictExpr(pairs))
                }
            }
        }
    }
}

/// Rebuild the special-form node a reserved head denotes. Template
/// groups expand to plain S-expressions, so `(let …)`, `(do …)` and
/// `(\ …)` written in a template must be reassembled into the nodes the
/// reader would have produced for the same text.
fn assemble_special(head: &str, out: Vec<Expr>, span: Span) -> Result<Expr, RispError> {
    let mut rest: Vec<Expr> = out.into_iter().skip(1).collect();
    match head {
        "do" => {
            if rest.is_empty() {
                return Err(RispError::Macro {
                    message: "macro template produced an empty `do` form".to_string(),
                    span,
                });
            }
            Ok(Expr::Do(rest))
        }
        "let" => {
            if rest.len() != 2 {
                return Err(malformed("let", span));
            }
            let value_or_body = rest.pop().unwrap_or(Expr::Unit(span));
            match rest.pop() {
                Some(Expr::Var(name, _)) => Ok(Expr::LetVar {
                    name,
                    value: Box::new(value_or_body),
                }),
                Some(Expr::SExpr { head, args, .. }) => {
                    let Expr::Var(name, _) = *head else {
                        return Err(malformed("let", span));
                    };
                    let params = param_names("let", &args, span)?;
                    Ok(Expr::LetFunc {
                        name,
                        params,
                        body: Rc::new(value_or_body),
                        span,
                    })
                }
                _ => Err(malformed("let", span)),
            }
        }
        "\\" => {
            if rest.len() != 2 {
                return Err(malformed("\\", span));
            }
            let body = rest.pop().unwrap_or(Expr::Unit(span));
            let params = match rest.pop() {
                Some(Expr::Unit(_)) => Vec::new(),
                Some(Expr::SExpr { head, args, .. }) => {
                    let mut all = vec![*head];
                    all.extend(args);
                    param_names("\\", &all, span)?
                }
                _ => return Err(malformed("\\", span)),
            };
            Ok(Expr::Lambda {
                params,
                body: Rc::new(body),
                span,
            })
        }
        _ => Err(RispError::Macro {
            message: "macro templates cannot define macros".to_string(),
            span,
        }),
    }
}

fn param_names(head: &str, exprs: &[Expr], span: Span) -> Result<Vec<String>, RispError> {
    exprs
        .iter()
        .map(|expr| match expr {
            Expr::Var(name, _) => Ok(name.clone()),
            _ => Err(malformed(head, span)),
        })
        .collect()
}

fn malformed(head: &str, span: Span) -> RispError {
    RispError::Macro {
        message: format!("macro template produced a malformed `{head}` form"),
        span,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::read_program;

    fn read_all(src: &str) -> Vec<Expr> {
        read_program(src).expect("read failure")
    }

    fn read_err(src: &str) -> String {
        read_program(src).unwrap_err().to_string()
    }

    #[test]
    fn test_simple_expansion() {
        let exprs = read_all(
            "(macro (twice-a %b{expr}) (do %b %b)) (twice-a (println \"hi\"))",
        );
        assert!(matches!(&exprs[0], Expr::MacroDef { name, .. } if name == "twice-a"));
        match &exprs[1] {
            Expr::Do(items) => {
                assert_eq!(items.len(), 2);
                assert!(matches!(&items[0], Expr::SExpr { .. }));
            }
            other => panic!("expected expanded Do, got {other:?}"),
        }
    }

    #[test]
    fn test_unit_group_in_template() {
        let exprs = read_all("(macro (unless-a %c{expr} %b{expr}) (%c () %b)) (unless-a x 1)");
        match &exprs[1] {
            Expr::SExpr { head, args, .. } => {
                assert!(matches!(&**head, Expr::Var(name, _) if name == "x"));
                assert!(matches!(args[0], Expr::Unit(_)));
                assert!(matches!(args[1], Expr::Number(n) if n == 1.0));
            }
            other => panic!("expected expanded SExpr, got {other:?}"),
        }
    }

    #[test]
    fn test_repeat_splice() {
        let exprs = read_all("(macro (collect-a %x{expr}%*) [%%x]) (collect-a 1 2 3)");
        match &exprs[1] {
            Expr::ListExpr(items) => assert_eq!(items.len(), 3),
            other => panic!("expected ListExpr, got {other:?}"),
        }
        let exprs = read_all("(collect-a)");
        assert!(matches!(&exprs[0], Expr::ListExpr(items) if items.is_empty()));
    }

    #[test]
    fn test_one_or_more_requires_one() {
        read_all("(macro (some-a %x{expr}%+) [%%x])");
        assert!(read_err("(some-a)").contains("do not match"));
        assert!(matches!(
            &read_all("(some-a 1)")[0],
            Expr::ListExpr(items) if items.len() == 1
        ));
    }

    #[test]
    fn test_optional() {
        read_all("(macro (opt-a %x{number}%?) [%%x])");
        assert!(matches!(&read_all("(opt-a 5)")[0], Expr::ListExpr(items) if items.len() == 1));
        assert!(matches!(&read_all("(opt-a)")[0], Expr::ListExpr(items) if items.is_empty()));
    }

    #[test]
    fn test_literal_terms() {
        read_all("(macro (lit-a to %x{expr}) %x)");
        assert!(matches!(&read_all("(lit-a to 7)")[0], Expr::Number(n) if *n == 7.0));
        assert!(read_err("(lit-a from 7)").contains("do not match"));
    }

    #[test]
    fn test_capture_kinds() {
        read_all("(macro (kinds-a %n{number} %s{string} %i{ident}) [%n %s %i])");
        assert!(matches!(&read_all("(kinds-a 1 \"s\" x)")[0], Expr::ListExpr(_)));
        assert!(read_err("(kinds-a \"s\" 1 x)").contains("do not match"));
    }

    #[test]
    fn test_structural_group() {
        read_all("(macro (swap-a (%x{expr} %y{expr})) (%y %x))");
        match &read_all("(swap-a (f 1))")[0] {
            Expr::SExpr { head, args, .. } => {
                assert!(matches!(&**head, Expr::Number(n) if *n == 1.0));
                assert!(matches!(&args[0], Expr::Var(name, _) if name == "f"));
            }
            other => panic!("expected SExpr, got {other:?}"),
        }
        assert!(read_err("(swap-a [1 2])").contains("do not match"));
    }

    #[test]
    fn test_list_group() {
        read_all("(macro (head-a [%x{expr} %rest{expr}%*]) %x)");
        assert!(matches!(&read_all("(head-a [9 8 7])")[0], Expr::Number(n) if *n == 9.0));
    }

    #[test]
    fn test_dict_group() {
        read_all("(macro (key-a {(%k{expr} %v{expr})}) %k)");
        assert!(matches!(
            &read_all("(key-a { (1 \"a\") })")[0],
            Expr::Number(n) if *n == 1.0
        ));
    }

    #[test]
    fn test_selector() {
        read_all("(macro (sel-a %x[ up down ]) \"ok\")");
        assert!(matches!(&read_all("(sel-a up)")[0], Expr::Str(s) if s == "ok"));
        assert!(matches!(&read_all("(sel-a down)")[0], Expr::Str(s) if s == "ok"));
        assert!(read_err("(sel-a sideways)").contains("do not match"));
    }

    #[test]
    fn test_section() {
        read_all("(macro (sec-a %pair(%k{ident} %v{expr}) end) [%%pair])");
        match &read_all("(sec-a x 1 end)")[0] {
            Expr::ListExpr(items) => assert_eq!(items.len(), 2),
            other => panic!("expected ListExpr, got {other:?}"),
        }
    }

    #[test]
    fn test_greedy_repeat() {
        // the repeat takes as much as it can while the tail still matches
        read_all("(macro (greedy-a %xs{expr}%* %last{expr}) %last)");
        assert!(matches!(&read_all("(greedy-a 1 2 3)")[0], Expr::Number(n) if *n == 3.0));
    }

    #[test]
    fn test_repeated_group_accumulates_inner_names() {
        read_all("(macro (pairs-a (%k{ident} %v{expr})%*) [%%v])");
        match &read_all("(pairs-a (x 1) (y 2))")[0] {
            Expr::ListExpr(items) => {
                assert_eq!(items.len(), 2);
                assert!(matches!(&items[1], Expr::Number(n) if *n == 2.0));
            }
            other => panic!("expected ListExpr, got {other:?}"),
        }
    }

    #[test]
    fn test_template_assembles_let_and_do() {
        read_all("(macro (setq-a %n{ident} %v{expr}) (do (let %n %v) %n))");
        match &read_all("(setq-a x 5)")[0] {
            Expr::Do(items) => {
                assert!(matches!(&items[0], Expr::LetVar { name, .. } if name == "x"));
                assert!(matches!(&items[1], Expr::Var(name, _) if name == "x"));
            }
            other => panic!("expected Do, got {other:?}"),
        }
    }

    #[test]
    fn test_template_assembles_lambda() {
        read_all("(macro (thunk-a %b{expr}) (\\ () %b))");
        match &read_all("(thunk-a 42)")[0] {
            Expr::Lambda { params, body, .. } => {
                assert!(params.is_empty());
                assert!(matches!(**body, Expr::Number(n) if n == 42.0));
            }
            other => panic!("expected Lambda, got {other:?}"),
        }
    }

    #[test]
    fn test_template_assembles_let_func() {
        read_all("(macro (defid-a %n{ident}) (let (%n x) x))");
        match &read_all("(defid-a my-id)")[0] {
            Expr::LetFunc { name, params, .. } => {
                assert_eq!(name, "my-id");
                assert_eq!(params, &vec!["x".to_string()]);
            }
            other => panic!("expected LetFunc, got {other:?}"),
        }
    }

    #[test]
    fn test_template_calls_another_macro() {
        read_all("(macro (inner-a %x{expr}) [%x]) (macro (outer-a %x{expr}) (inner-a %x))");
        assert!(matches!(&read_all("(outer-a 3)")[0], Expr::ListExpr(_)));
    }

    #[test]
    fn test_redefinition_is_an_error() {
        read_all("(macro (re-a %x{expr}) %x)");
        assert!(read_err("(macro (re-a %y{expr}) %y)").contains("already defined"));
    }

    #[test]
    fn test_duplicated_bound_name() {
        assert!(read_err("(macro (dup-a %x{expr} %x{expr}) %x)").contains("duplicated bound name"));
    }

    #[test]
    fn test_repeat_of_repeat() {
        assert!(read_err("(macro (rr-a %x{expr}%*%*) [%%x])").contains("cannot repeat"));
    }

    #[test]
    fn test_subst_of_sequence_is_rejected() {
        read_all("(macro (seq-a %x{expr}%*) %x)");
        assert!(read_err("(seq-a 1 2)").contains("use `%%x`"));
    }

    #[test]
    fn test_no_match_names_macro() {
        read_all("(macro (strict-a %n{number}) %n)");
        let err = read_err("(strict-a \"nope\")");
        assert!(err.contains("strict-a"));
        assert!(err.contains("line 1"));
    }
}
