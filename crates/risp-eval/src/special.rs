use risp_core::{unaccepted, BuiltinFn, Env, Expr, RispError, Value};

use crate::eval::{eval_expr, eval_string};

/// Register the boolean singletons and the builtins that must see their
/// argument forms unevaluated or re-enter the pipeline.
pub fn register(env: &Env) {
    env.set("#t", Value::truth(true));
    env.set("#f", Value::truth(false));

    env.set(
        "and",
        BuiltinFn::lazy("and", 2, |env, args| {
            let first = eval_expr(&args[0], env)?;
            match first.as_bool() {
                Some(false) => Ok(first),
                Some(true) => expect_bool("and", eval_expr(&args[1], env)?),
                None => Err(unaccepted("and", &[first])),
            }
        }),
    );

    env.set(
        "or",
        BuiltinFn::lazy("or", 2, |env, args| {
            let first = eval_expr(&args[0], env)?;
            match first.as_bool() {
                Some(true) => Ok(first),
                Some(false) => expect_bool("or", eval_expr(&args[1], env)?),
                None => Err(unaccepted("or", &[first])),
            }
        }),
    );

    // Dotted access: a bare identifier in key position is a string key,
    // anything else evaluates normally.
    env.set(
        ".",
        BuiltinFn::lazy(".", 2, |env, args| {
            let target = eval_expr(&args[0], env)?;
            let key = match &args[1] {
                Expr::Var(name, _) => Value::string(name.clone()),
                other => eval_expr(other, env)?,
            };
            match &target {
                Value::Dict(d) => d
                    .borrow()
                    .get(&key)
                    .cloned()
                    .ok_or_else(|| RispError::eval(format!("key {key} not found in dictionary"))),
                _ => Err(unaccepted(".", &[target])),
            }
        }),
    );

    // Path handles are a host-boundary feature; the form stays parseable.
    env.set(
        "$",
        BuiltinFn::lazy("$", 1, |_env, _args| {
            Err(RispError::Host(
                "`$` path handles are not supported in this build".to_string(),
            ))
        }),
    );

    // Restart the pipeline on a string, sharing the current environment.
    env.set(
        "eval",
        BuiltinFn::eager_env("eval", 1, |env, args| match &args[0] {
            Value::Str(s) => eval_string(s, env),
            _ => Err(unaccepted("eval", args)),
        }),
    );
}

fn expect_bool(name: &str, value: Value) -> Result<Value, RispError> {
    if value.as_bool().is_none() {
        return Err(unaccepted(name, &[value]));
    }
    Ok(value)
}
