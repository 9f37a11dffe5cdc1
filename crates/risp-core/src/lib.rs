#![allow(clippy::mutable_key_type)]
pub mod error;
pub mod expr;
pub mod value;

pub use error::{CallFrame, RispError, Span, StackTrace};
pub use expr::Expr;
pub use value::{unaccepted, BuiltinFn, BuiltinKind, Closure, Env, Value};
