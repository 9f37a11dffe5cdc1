use std::path::{Component, Path, PathBuf};

use risp_core::{unaccepted, RispError, Value};

use crate::register_fn;

pub fn register(env: &risp_core::Env) {
    register_numeric(env, "trunc", f64::trunc);
    register_numeric(env, "floor", f64::floor);
    register_numeric(env, "ceil", f64::ceil);
    register_numeric(env, "round", f64::round);

    // abs is polymorphic: absolute value on numbers, normalized absolute
    // path on strings.
    register_fn(env, "abs", 1, |args| match &args[0] {
        Value::Number(n) => Ok(Value::Number(n.abs())),
        Value::Str(s) => Ok(Value::string(absolute_path(s))),
        _ => Err(unaccepted("abs", args)),
    });

    register_fn(env, "show", 1, |args| Ok(Value::string(args[0].show())));

    register_fn(env, "repr", 1, |args| {
        Ok(Value::string(args[0].to_string()))
    });

    register_fn(env, "parse", 1, |args| match &args[0] {
        Value::Str(s) => s
            .trim()
            .parse::<f64>()
            .map(Value::Number)
            .map_err(|_| RispError::eval(format!("cannot parse {s:?} as a number"))),
        _ => Err(unaccepted("parse", args)),
    });

    register_fn(env, "chars", 1, |args| match &args[0] {
        Value::Str(s) => Ok(Value::list(
            s.chars().map(|c| Value::string(c.to_string())).collect(),
        )),
        _ => Err(unaccepted("chars", args)),
    });
}

fn register_numeric(env: &risp_core::Env, name: &'static str, f: impl Fn(f64) -> f64 + 'static) {
    register_fn(env, name, 1, move |args| match &args[0] {
        Value::Number(n) => Ok(Value::Number(f(*n))),
        _ => Err(unaccepted(name, args)),
    });
}

/// Normalize to an absolute path with forward slashes, resolving `.` and
/// `..` textually (no filesystem access beyond the working directory).
fn absolute_path(s: &str) -> String {
    let cleaned = s.replace('\\', "/");
    let path = Path::new(&cleaned);
    let mut out = if path.is_absolute() {
        PathBuf::new()
    } else {
        std::env::current_dir().unwrap_or_default()
    };
    for comp in path.components() {
        match comp {
            Component::RootDir => out.push("/"),
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            Component::Normal(part) => out.push(part),
            Component::Prefix(_) => {}
        }
    }
    out.to_string_lossy().replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::absolute_path;

    #[test]
    fn test_absolute_path_normalization() {
        assert_eq!(absolute_path("/a/b/../c/./d"), "/a/c/d");
        assert_eq!(absolute_path("/x//y"), "/x/y");
        assert!(absolute_path("rel").ends_with("/rel"));
    }
}
