use risp_core::{unaccepted, RispError, Value};

use crate::register_fn;

pub fn register(env: &risp_core::Env) {
    register_fn(env, "add", 2, |args| match (&args[0], &args[1]) {
        (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
        (Value::Str(a), Value::Str(b)) => Ok(Value::string(format!("{a}{b}"))),
        (Value::List(a), Value::List(b)) => {
            let mut items = a.borrow().clone();
            items.extend(b.borrow().iter().cloned());
            Ok(Value::list(items))
        }
        _ => Err(unaccepted("add", args)),
    });

    register_fn(env, "sub", 2, |args| match (&args[0], &args[1]) {
        (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a - b)),
        _ => Err(unaccepted("sub", args)),
    });

    register_fn(env, "mul", 2, |args| match (&args[0], &args[1]) {
        (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a * b)),
        _ => Err(unaccepted("mul", args)),
    });

    // Numbers divide; strings join as paths.
    register_fn(env, "div", 2, |args| match (&args[0], &args[1]) {
        (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a / b)),
        (Value::Str(a), Value::Str(b)) => Ok(Value::string(join_path(a, b))),
        _ => Err(unaccepted("div", args)),
    });

    register_fn(env, "mod", 2, |args| match (&args[0], &args[1]) {
        (Value::Number(a), Value::Number(b)) => {
            if *b == 0.0 {
                return Err(RispError::eval("modulus by zero"));
            }
            Ok(Value::Number(a % b))
        }
        _ => Err(unaccepted("mod", args)),
    });
}

/// Join two path fragments with forward-slash normalization.
fn join_path(a: &str, b: &str) -> String {
    let a = a.replace('\\', "/");
    let b = b.replace('\\', "/");
    let left = a.trim_end_matches('/');
    let right = b.trim_start_matches('/');
    if left.is_empty() && a.starts_with('/') {
        format!("/{right}")
    } else if left.is_empty() {
        right.to_string()
    } else {
        format!("{left}/{right}")
    }
}

#[cfg(test)]
mod tests {
    use super::join_path;

    #[test]
    fn test_join_path() {
        assert_eq!(join_path("a", "b"), "a/b");
        assert_eq!(join_path("a/", "/b"), "a/b");
        assert_eq!(join_path("/", "b"), "/b");
        assert_eq!(join_path("a\\c", "b"), "a/c/b");
        assert_eq!(join_path("", "b"), "b");
    }
}
