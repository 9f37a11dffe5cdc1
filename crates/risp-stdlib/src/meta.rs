use risp_core::{unaccepted, Value};

use crate::{register_fn, register_fn_env};

pub fn register(env: &risp_core::Env) {
    register_fn(env, "type", 1, |args| {
        Ok(Value::string(args[0].type_name()))
    });

    register_fn(env, "type-is", 2, |args| match &args[1] {
        Value::Str(name) => Ok(Value::truth(args[0].type_name() == name.as_str())),
        _ => Err(unaccepted("type-is", args)),
    });

    // The environment chain doubles as the call stack; render it as a
    // list of frame strings, innermost first.
    register_fn_env(env, "__stack__", 0, |env, _args| {
        Ok(Value::list(
            env.trace()
                .0
                .iter()
                .map(|frame| Value::string(frame.to_string()))
                .collect(),
        ))
    });
}
