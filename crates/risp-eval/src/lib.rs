#![allow(clippy::mutable_key_type)]
mod eval;
mod special;

pub use eval::{eval_expr, eval_program, eval_string, EvalResult, Interpreter};
