use risp_core::{RispError, Value};

use crate::register_fn;

/// Host-boundary builtins. This build carries no file-path handler or
/// subprocess executor, so the names stay parseable and callable but
/// report themselves unsupported.
pub fn register(env: &risp_core::Env) {
    register_stub(env, "read");
    register_stub(env, "import");
    register_stub(env, "@");
}

fn register_stub(env: &risp_core::Env, name: &'static str) {
    register_fn(env, name, 1, move |_args| {
        Err(RispError::Host(format!(
            "`{name}` is not supported in this build"
        )))
    });
}
