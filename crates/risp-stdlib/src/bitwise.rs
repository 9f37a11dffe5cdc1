use risp_core::{unaccepted, Value};

use crate::register_fn;

/// Bitwise builtins truncate their operands to 64-bit integers and
/// return the result as a number.
pub fn register(env: &risp_core::Env) {
    register_binary(env, "band", |a, b| a & b);
    register_binary(env, "bor", |a, b| a | b);
    register_binary(env, "bxor", |a, b| a ^ b);
    register_binary(env, "<<", |a, b| a.wrapping_shl(shift_amount(b)));
    register_binary(env, ">>", |a, b| a.wrapping_shr(shift_amount(b)));

    register_fn(env, "bcom", 1, |args| match &args[0] {
        Value::Number(n) => Ok(Value::Number(!(*n as i64) as f64)),
        _ => Err(unaccepted("bcom", args)),
    });
}

fn shift_amount(b: i64) -> u32 {
    b.clamp(0, 63) as u32
}

fn register_binary(env: &risp_core::Env, name: &'static str, f: impl Fn(i64, i64) -> i64 + 'static) {
    register_fn(env, name, 2, move |args| {
        match (&args[0], &args[1]) {
            (Value::Number(a), Value::Number(b)) => {
                Ok(Value::Number(f(*a as i64, *b as i64) as f64))
            }
            _ => Err(unaccepted(name, args)),
        }
    });
}
