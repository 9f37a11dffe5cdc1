use std::rc::Rc;

use risp_core::value::BuiltinKind;
use risp_core::{CallFrame, Closure, Env, Expr, RispError, Span, Value};

pub type EvalResult = Result<Value, RispError>;

/// The interpreter owns the global environment with the builtin table
/// installed at its bottom. User code runs in child frames so that
/// `let` never overwrites a builtin in place.
pub struct Interpreter {
    pub global_env: Rc<Env>,
}

impl Interpreter {
    pub fn new() -> Self {
        let env = Env::new();
        risp_stdlib::register_stdlib(&env);
        crate::special::register(&env);
        Interpreter {
            global_env: Rc::new(env),
        }
    }

    /// A fresh user frame atop the builtin table.
    pub fn user_env(&self) -> Env {
        Env::with_parent(self.global_env.clone())
    }

    /// Evaluate a whole program, returning the last value.
    pub fn eval_str(&self, input: &str) -> EvalResult {
        eval_string(input, &self.user_env())
    }

    /// Evaluate a whole program, returning every top-level value.
    pub fn eval_program(&self, input: &str) -> Result<Vec<Value>, RispError> {
        eval_program(input, &self.user_env())
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

/// Evaluate a string of expressions in `env`, returning the last value.
pub fn eval_string(input: &str, env: &Env) -> EvalResult {
    let exprs = risp_reader::read_program(input)?;
    let mut result = Value::Unit;
    for expr in &exprs {
        result = eval_expr(expr, env)?;
    }
    Ok(result)
}

/// Evaluate a string of expressions in `env`, returning all values —
/// the host contract: a sequence of values or a single error.
pub fn eval_program(input: &str, env: &Env) -> Result<Vec<Value>, RispError> {
    let exprs = risp_reader::read_program(input)?;
    exprs.iter().map(|expr| eval_expr(expr, env)).collect()
}

pub fn eval_expr(expr: &Expr, env: &Env) -> EvalResult {
    match expr {
        Expr::Number(n) => Ok(Value::Number(*n)),
        Expr::Str(s) => Ok(Value::string(s.clone())),
        Expr::Unit(_) => Ok(Value::Unit),

        Expr::Var(name, span) => env.get(name).ok_or_else(|| RispError::Unbound {
            name: name.clone(),
            span: *span,
        }),

        Expr::ListExpr(items) => {
            let mut values = Vec::with_capacity(items.len());
            for item in items {
                values.push(eval_expr(item, env)?);
            }
            Ok(Value::list(values))
        }

        Expr::DictExpr(entries) => {
            let mut pairs = Vec::with_capacity(entries.len());
            for (k, v) in entries {
                let key = eval_expr(k, env)?;
                let value = eval_expr(v, env)?;
                pairs.push((key, value));
            }
            Ok(Value::dict(pairs))
        }

        Expr::LetVar { name, value } => {
            let value = eval_expr(value, env)?;
            env.set(name.clone(), value.clone());
            Ok(value)
        }

        Expr::LetFunc {
            name,
            params,
            body,
            span,
        } => {
            // The closure captures the frame it is being bound into, so
            // the binding itself is visible to recursive calls.
            let closure = Value::Closure(Rc::new(Closure {
                name: Some(name.clone()),
                params: params.clone(),
                body: body.clone(),
                env: env.clone(),
                span: *span,
            }));
            env.set(name.clone(), closure.clone());
            Ok(closure)
        }

        Expr::Lambda { params, body, span } => Ok(Value::Closure(Rc::new(Closure {
            name: None,
            params: params.clone(),
            body: body.clone(),
            env: env.clone(),
            span: *span,
        }))),

        Expr::Do(items) => {
            let mut result = Value::Unit;
            for item in items {
                result = eval_expr(item, env)?;
            }
            Ok(result)
        }

        // Registration happened at read time.
        Expr::MacroDef { .. } => Ok(Value::Unit),

        Expr::SExpr { head, args, span } => eval_call(head, args, *span, env),
    }
}

fn eval_call(head: &Expr, args: &[Expr], span: Span, env: &Env) -> EvalResult {
    let callee = eval_expr(head, env)?;
    match &callee {
        Value::Closure(closure) => {
            if args.len() != closure.params.len() {
                return Err(RispError::arity(
                    closure_name(closure),
                    closure.params.len(),
                    args.len(),
                ));
            }
            let mut values = Vec::with_capacity(args.len());
            for arg in args {
                values.push(eval_expr(arg, env)?);
            }
            let frame = CallFrame {
                name: closure_name(closure),
                span: Some(span),
            };
            let call_env = Env::with_frame(Rc::new(closure.env.clone()), frame.clone());
            for (param, value) in closure.params.iter().zip(values) {
                call_env.set(param.clone(), value);
            }
            // The trace accumulates one frame per call site as the error
            // unwinds, innermost first.
            eval_expr(&closure.body, &call_env).map_err(|e| e.push_frame(frame))
        }

        Value::Builtin(builtin) => {
            if args.len() != builtin.arity {
                return Err(RispError::arity(builtin.name, builtin.arity, args.len()));
            }
            match &builtin.kind {
                // Boolean selection evaluates exactly one branch.
                BuiltinKind::Select(flag) => {
                    eval_expr(&args[if *flag { 0 } else { 1 }], env)
                }
                BuiltinKind::Lazy(f) => f(env, args).map_err(|e| e.with_span(span)),
                BuiltinKind::Eager(f) => {
                    let mut values = Vec::with_capacity(args.len());
                    for arg in args {
                        values.push(eval_expr(arg, env)?);
                    }
                    f(env, &values).map_err(|e| e.with_span(span))
                }
            }
        }

        other => Err(RispError::eval(format!(
            "not callable: {} ({}) at {span}",
            other,
            other.type_name()
        ))),
    }
}

fn closure_name(closure: &Closure) -> String {
    closure
        .name
        .clone()
        .unwrap_or_else(|| "<lambda>".to_string())
}
