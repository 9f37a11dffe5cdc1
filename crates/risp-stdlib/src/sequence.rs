use risp_core::{unaccepted, RispError, Value};

use crate::register_fn;

pub fn register(env: &risp_core::Env) {
    register_fn(env, "empty?", 1, |args| match &args[0] {
        Value::List(l) => Ok(Value::truth(l.borrow().is_empty())),
        Value::Dict(d) => Ok(Value::truth(d.borrow().is_empty())),
        Value::Str(s) => Ok(Value::truth(s.is_empty())),
        _ => Err(unaccepted("empty?", args)),
    });

    register_fn(env, "len", 1, |args| match &args[0] {
        Value::List(l) => Ok(Value::Number(l.borrow().len() as f64)),
        Value::Dict(d) => Ok(Value::Number(d.borrow().len() as f64)),
        Value::Str(s) => Ok(Value::Number(s.chars().count() as f64)),
        _ => Err(unaccepted("len", args)),
    });

    register_fn(env, "slice", 3, |args| {
        let start = index("slice", &args[1])?;
        let end = index("slice", &args[2])?;
        if start > end {
            return Err(RispError::eval(format!(
                "slice start {start} is past end {end}"
            )));
        }
        match &args[0] {
            Value::List(l) => {
                let items = l.borrow();
                check_range("slice", end, items.len() + 1)?;
                Ok(Value::list(items[start..end].to_vec()))
            }
            Value::Str(s) => {
                let chars: Vec<char> = s.chars().collect();
                check_range("slice", end, chars.len() + 1)?;
                Ok(Value::string(chars[start..end].iter().collect::<String>()))
            }
            _ => Err(unaccepted("slice", args)),
        }
    });

    // List splice: remove `count` elements at `index`, insert the
    // elements of `items` in their place. Returns the mutated list.
    register_fn(env, "del-ins", 4, |args| {
        let (list, items) = match (&args[0], &args[3]) {
            (Value::List(l), Value::List(items)) => (l, items),
            _ => return Err(unaccepted("del-ins", args)),
        };
        let at = index("del-ins", &args[1])?;
        let count = index("del-ins", &args[2])?;
        let insert: Vec<Value> = items.borrow().clone();
        {
            let mut list = list.borrow_mut();
            if at > list.len() || at + count > list.len() {
                return Err(RispError::eval(format!(
                    "del-ins range {at}..{} out of bounds for length {}",
                    at + count,
                    list.len()
                )));
            }
            list.splice(at..at + count, insert);
        }
        Ok(args[0].clone())
    });

    register_fn(env, "get", 2, |args| match &args[0] {
        Value::List(l) => {
            let items = l.borrow();
            let i = index("get", &args[1])?;
            check_range("get", i, items.len())?;
            Ok(items[i].clone())
        }
        Value::Str(s) => {
            let i = index("get", &args[1])?;
            let chars: Vec<char> = s.chars().collect();
            check_range("get", i, chars.len())?;
            Ok(Value::string(chars[i].to_string()))
        }
        Value::Dict(d) => d
            .borrow()
            .get(&args[1])
            .cloned()
            .ok_or_else(|| RispError::eval(format!("key {} not found in dictionary", args[1]))),
        _ => Err(unaccepted("get", args)),
    });

    register_fn(env, "tryget", 2, |args| match &args[0] {
        Value::List(l) => {
            let items = l.borrow();
            match slot(&args[1], items.len()) {
                Some(i) => Ok(items[i].clone()),
                None => Ok(Value::Unit),
            }
        }
        Value::Str(s) => {
            let chars: Vec<char> = s.chars().collect();
            match slot(&args[1], chars.len()) {
                Some(i) => Ok(Value::string(chars[i].to_string())),
                None => Ok(Value::Unit),
            }
        }
        Value::Dict(d) => Ok(d.borrow().get(&args[1]).cloned().unwrap_or(Value::Unit)),
        _ => Err(unaccepted("tryget", args)),
    });

    register_fn(env, "set", 3, |args| match &args[0] {
        Value::List(l) => {
            let i = index("set", &args[1])?;
            let mut items = l.borrow_mut();
            check_range("set", i, items.len())?;
            items[i] = args[2].clone();
            Ok(args[2].clone())
        }
        // Strict update: the key must already be present.
        Value::Dict(d) => {
            let mut map = d.borrow_mut();
            match map.get_mut(&args[1]) {
                Some(slot) => {
                    *slot = args[2].clone();
                    Ok(args[2].clone())
                }
                None => Err(RispError::eval(format!(
                    "key {} not found in dictionary",
                    args[1]
                ))),
            }
        }
        _ => Err(unaccepted("set", args)),
    });

    register_fn(env, "tryset", 3, |args| match &args[0] {
        Value::List(l) => {
            let mut items = l.borrow_mut();
            let len = items.len();
            match slot(&args[1], len) {
                Some(i) => {
                    items[i] = args[2].clone();
                    Ok(args[2].clone())
                }
                None => Ok(Value::Unit),
            }
        }
        // Never raises: a missing key is inserted, reported as unit.
        Value::Dict(d) => {
            let mut map = d.borrow_mut();
            let existed = map.contains_key(&args[1]);
            map.insert(args[1].clone(), args[2].clone());
            if existed {
                Ok(args[2].clone())
            } else {
                Ok(Value::Unit)
            }
        }
        _ => Err(unaccepted("tryset", args)),
    });

    register_fn(env, "push", 2, |args| match &args[0] {
        Value::List(l) => {
            l.borrow_mut().push(args[1].clone());
            Ok(args[0].clone())
        }
        _ => Err(unaccepted("push", args)),
    });

    register_fn(env, "pop", 1, |args| match &args[0] {
        Value::List(l) => l
            .borrow_mut()
            .pop()
            .ok_or_else(|| RispError::eval("pop from an empty list")),
        _ => Err(unaccepted("pop", args)),
    });

    register_fn(env, "push-front", 2, |args| match &args[0] {
        Value::List(l) => {
            l.borrow_mut().insert(0, args[1].clone());
            Ok(args[0].clone())
        }
        _ => Err(unaccepted("push-front", args)),
    });

    // Removes and returns the first element.
    register_fn(env, "pop-front", 1, |args| match &args[0] {
        Value::List(l) => {
            let mut items = l.borrow_mut();
            if items.is_empty() {
                return Err(RispError::eval("pop-front from an empty list"));
            }
            Ok(items.remove(0))
        }
        _ => Err(unaccepted("pop-front", args)),
    });

    register_fn(env, "keys", 1, |args| match &args[0] {
        Value::Dict(d) => Ok(Value::list(d.borrow().keys().cloned().collect())),
        _ => Err(unaccepted("keys", args)),
    });

    register_fn(env, "entries", 1, |args| match &args[0] {
        Value::Dict(d) => Ok(Value::list(
            d.borrow()
                .iter()
                .map(|(k, v)| Value::list(vec![k.clone(), v.clone()]))
                .collect(),
        )),
        _ => Err(unaccepted("entries", args)),
    });
}

/// A non-negative integral index, or a type/value error.
fn index(name: &str, v: &Value) -> Result<usize, RispError> {
    match v {
        Value::Number(n) if n.fract() == 0.0 && *n >= 0.0 => Ok(*n as usize),
        Value::Number(n) => Err(RispError::eval(format!(
            "'{name}' requires a non-negative integer index, got {n}"
        ))),
        other => Err(unaccepted(name, &[other.clone()])),
    }
}

/// `index` for the try-variants: `None` for anything out of range or
/// non-integral instead of an error.
fn slot(v: &Value, len: usize) -> Option<usize> {
    match v {
        Value::Number(n) if n.fract() == 0.0 && *n >= 0.0 && (*n as usize) < len => {
            Some(*n as usize)
        }
        _ => None,
    }
}

fn check_range(name: &str, i: usize, len: usize) -> Result<(), RispError> {
    if i >= len {
        return Err(RispError::eval(format!(
            "index {i} out of range for '{name}' (length {len})"
        )));
    }
    Ok(())
}
