use std::cmp::Ordering;
use std::rc::Rc;

use risp_core::{unaccepted, RispError, Value};

use crate::register_fn;

pub fn register(env: &risp_core::Env) {
    register_fn(env, "=", 2, |args| Ok(Value::truth(args[0] == args[1])));
    register_fn(env, "!=", 2, |args| Ok(Value::truth(args[0] != args[1])));

    register_ord(env, "lt", |ord| ord == Ordering::Less);
    register_ord(env, "gt", |ord| ord == Ordering::Greater);
    register_ord(env, "le", |ord| ord != Ordering::Greater);
    register_ord(env, "ge", |ord| ord != Ordering::Less);

    register_fn(env, "not", 1, |args| match args[0].as_bool() {
        Some(b) => Ok(Value::truth(!b)),
        None => Err(unaccepted("not", args)),
    });
}

fn register_ord(env: &risp_core::Env, name: &'static str, f: impl Fn(Ordering) -> bool + 'static) {
    register_fn(env, name, 2, move |args| {
        compare(name, &args[0], &args[1]).map(|ord| Value::truth(f(ord)))
    });
}

/// Ordering over numbers, strings, and lists. Lists compare
/// lexicographically, recursing with the same ordering on elements.
fn compare(name: &str, a: &Value, b: &Value) -> Result<Ordering, RispError> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x
            .partial_cmp(y)
            .ok_or_else(|| unaccepted(name, &[a.clone(), b.clone()])),
        (Value::Str(x), Value::Str(y)) => Ok(x.cmp(y)),
        (Value::List(x), Value::List(y)) => {
            if Rc::ptr_eq(x, y) {
                return Ok(Ordering::Equal);
            }
            let xs = x.borrow();
            let ys = y.borrow();
            for (xi, yi) in xs.iter().zip(ys.iter()) {
                match compare(name, xi, yi)? {
                    Ordering::Equal => {}
                    ord => return Ok(ord),
                }
            }
            Ok(xs.len().cmp(&ys.len()))
        }
        _ => Err(unaccepted(name, &[a.clone(), b.clone()])),
    }
}
