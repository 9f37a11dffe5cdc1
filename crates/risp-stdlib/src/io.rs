use risp_core::Value;

use crate::register_fn;

pub fn register(env: &risp_core::Env) {
    register_fn(env, "print", 1, |args| {
        print!("{}", args[0].show());
        Ok(Value::Unit)
    });

    register_fn(env, "println", 1, |args| {
        println!("{}", args[0].show());
        Ok(Value::Unit)
    });
}
