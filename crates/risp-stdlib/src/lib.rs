#![allow(clippy::mutable_key_type)]
mod arithmetic;
mod bitwise;
mod comparison;
mod convert;
mod host;
mod io;
mod meta;
mod sequence;

use risp_core::{BuiltinFn, Env, RispError, Value};

/// Install the eager builtin table at the bottom of a fresh environment.
/// The lazy builtins (`and`, `or`, `.`, `$`, `eval`) and the boolean
/// singletons are registered by the evaluator crate.
pub fn register_stdlib(env: &Env) {
    arithmetic::register(env);
    bitwise::register(env);
    comparison::register(env);
    convert::register(env);
    sequence::register(env);
    io::register(env);
    meta::register(env);
    host::register(env);
}

pub(crate) fn register_fn(
    env: &Env,
    name: &'static str,
    arity: usize,
    f: impl Fn(&[Value]) -> Result<Value, RispError> + 'static,
) {
    env.set(name, BuiltinFn::eager(name, arity, f));
}

pub(crate) fn register_fn_env(
    env: &Env,
    name: &'static str,
    arity: usize,
    f: impl Fn(&Env, &[Value]) -> Result<Value, RispError> + 'static,
) {
    env.set(name, BuiltinFn::eager_env(name, arity, f));
}
