use std::cell::RefCell;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use hashbrown::HashMap;
use indexmap::IndexMap;

use crate::error::{CallFrame, RispError, Span, StackTrace};
use crate::expr::Expr;

pub type List = Rc<RefCell<Vec<Value>>>;
pub type Dict = Rc<RefCell<IndexMap<Value, Value>>>;

/// The RumLisp value type. Aggregates are reference-shared; cloning a
/// `Value` clones a handle, never the underlying list or dictionary.
#[derive(Clone)]
pub enum Value {
    Unit,
    Number(f64),
    Str(Rc<String>),
    List(List),
    Dict(Dict),
    Closure(Rc<Closure>),
    Builtin(Rc<BuiltinFn>),
}

/// A user-defined closure: parameter names, shared body, captured
/// environment. The capture is by reference — later mutations of the
/// captured frames are visible to every call.
pub struct Closure {
    pub name: Option<String>,
    pub params: Vec<String>,
    pub body: Rc<Expr>,
    pub env: Env,
    pub span: Span,
}

impl fmt::Debug for Closure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "<closure {name}>"),
            None => write!(f, "<closure>"),
        }
    }
}

pub type EagerFn = dyn Fn(&Env, &[Value]) -> Result<Value, RispError>;
pub type LazyFn = dyn Fn(&Env, &[Expr]) -> Result<Value, RispError>;

/// How a builtin consumes its call site.
pub enum BuiltinKind {
    /// Arguments evaluated left-to-right before the call.
    Eager(Box<EagerFn>),
    /// Receives the unevaluated argument expressions plus the caller's
    /// environment (`and`, `or`, `.`, `$`).
    Lazy(Box<LazyFn>),
    /// Boolean branch selection: evaluate only the first (`#t`) or the
    /// second (`#f`) of two argument expressions.
    Select(bool),
}

pub struct BuiltinFn {
    pub name: &'static str,
    pub arity: usize,
    pub kind: BuiltinKind,
}

impl BuiltinFn {
    pub fn eager(
        name: &'static str,
        arity: usize,
        f: impl Fn(&[Value]) -> Result<Value, RispError> + 'static,
    ) -> Value {
        Value::Builtin(Rc::new(BuiltinFn {
            name,
            arity,
            kind: BuiltinKind::Eager(Box::new(move |_env, args| f(args))),
        }))
    }

    pub fn eager_env(
        name: &'static str,
        arity: usize,
        f: impl Fn(&Env, &[Value]) -> Result<Value, RispError> + 'static,
    ) -> Value {
        Value::Builtin(Rc::new(BuiltinFn {
            name,
            arity,
            kind: BuiltinKind::Eager(Box::new(f)),
        }))
    }

    pub fn lazy(
        name: &'static str,
        arity: usize,
        f: impl Fn(&Env, &[Expr]) -> Result<Value, RispError> + 'static,
    ) -> Value {
        Value::Builtin(Rc::new(BuiltinFn {
            name,
            arity,
            kind: BuiltinKind::Lazy(Box::new(f)),
        }))
    }
}

impl fmt::Debug for BuiltinFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<builtin {}>", self.name)
    }
}

// ── Booleans ──────────────────────────────────────────────────────
//
// `#t` and `#f` are two distinguished builtin singletons of arity 2 that
// select their first or second argument without evaluating the other.
// Boolean equality is identity of these singletons, so they must be
// created once per interpreter thread.

thread_local! {
    static TRUE: Value = Value::Builtin(Rc::new(BuiltinFn {
        name: "#t",
        arity: 2,
        kind: BuiltinKind::Select(true),
    }));
    static FALSE: Value = Value::Builtin(Rc::new(BuiltinFn {
        name: "#f",
        arity: 2,
        kind: BuiltinKind::Select(false),
    }));
}

impl Value {
    pub fn truth(b: bool) -> Value {
        if b {
            TRUE.with(Clone::clone)
        } else {
            FALSE.with(Clone::clone)
        }
    }

    pub fn string(s: impl Into<String>) -> Value {
        Value::Str(Rc::new(s.into()))
    }

    pub fn list(items: Vec<Value>) -> Value {
        Value::List(Rc::new(RefCell::new(items)))
    }

    pub fn dict(pairs: Vec<(Value, Value)>) -> Value {
        let mut map = IndexMap::new();
        for (k, v) in pairs {
            map.insert(k, v);
        }
        Value::Dict(Rc::new(RefCell::new(map)))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Builtin(b) => match b.kind {
                BuiltinKind::Select(flag) => Some(flag),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn is_unit(&self) -> bool {
        matches!(self, Value::Unit)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Unit => "unit",
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Dict(_) => "dict",
            Value::Closure(_) => "closure",
            Value::Builtin(_) => {
                if self.as_bool().is_some() {
                    "bool"
                } else {
                    "builtin"
                }
            }
        }
    }

    /// The display form `print` and `show` use: string content unquoted,
    /// everything else as `Display`.
    pub fn show(&self) -> String {
        match self {
            Value::Str(s) => (**s).clone(),
            other => other.to_string(),
        }
    }
}

/// The standardized type-mismatch error for a builtin.
pub fn unaccepted(name: &str, args: &[Value]) -> RispError {
    RispError::Types {
        name: name.to_string(),
        types: args
            .iter()
            .map(Value::type_name)
            .collect::<Vec<_>>()
            .join(" "),
        span: None,
    }
}

// ── Equality and hashing ──────────────────────────────────────────
//
// Scalars compare by value, aggregates and callables by identity. This
// relation doubles as dictionary-key equality, so it must stay consistent
// with `Hash`: numbers are compared through canonical bits (-0.0 == 0.0,
// NaN == NaN), and cross-type comparisons are always false.

fn canonical_bits(n: f64) -> u64 {
    if n == 0.0 {
        0
    } else if n.is_nan() {
        f64::NAN.to_bits()
    } else {
        n.to_bits()
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Unit, Value::Unit) => true,
            (Value::Number(a), Value::Number(b)) => canonical_bits(*a) == canonical_bits(*b),
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b),
            (Value::Dict(a), Value::Dict(b)) => Rc::ptr_eq(a, b),
            (Value::Closure(a), Value::Closure(b)) => Rc::ptr_eq(a, b),
            (Value::Builtin(a), Value::Builtin(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Unit => {}
            Value::Number(n) => canonical_bits(*n).hash(state),
            Value::Str(s) => s.hash(state),
            Value::List(l) => (Rc::as_ptr(l) as usize).hash(state),
            Value::Dict(d) => (Rc::as_ptr(d) as *const u8 as usize).hash(state),
            Value::Closure(c) => (Rc::as_ptr(c) as usize).hash(state),
            Value::Builtin(b) => (Rc::as_ptr(b) as usize).hash(state),
        }
    }
}

// ── Printing ──────────────────────────────────────────────────────

fn fmt_number(f: &mut fmt::Formatter<'_>, n: f64) -> fmt::Result {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        write!(f, "{}", n as i64)
    } else {
        write!(f, "{n}")
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unit => write!(f, "()"),
            Value::Number(n) => fmt_number(f, *n),
            Value::Str(s) => write!(f, "\"{s}\""),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Dict(map) => {
                let map = map.borrow();
                if map.is_empty() {
                    return write!(f, "{{}}");
                }
                write!(f, "{{")?;
                for (k, v) in map.iter() {
                    write!(f, " ({k} {v})")?;
                }
                write!(f, " }}")
            }
            Value::Closure(c) => write!(f, "{c:?}"),
            Value::Builtin(b) => match b.kind {
                BuiltinKind::Select(true) => write!(f, "#t"),
                BuiltinKind::Select(false) => write!(f, "#f"),
                _ => write!(f, "{b:?}"),
            },
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unit => write!(f, "Unit"),
            Value::Number(n) => write!(f, "Number({n})"),
            Value::Str(s) => write!(f, "Str({:?})", &**s),
            Value::List(items) => write!(f, "List({:?})", items.borrow()),
            Value::Dict(_) => write!(f, "Dict({self})"),
            Value::Closure(c) => write!(f, "{c:?}"),
            Value::Builtin(b) => write!(f, "{b:?}"),
        }
    }
}

// ── Env ───────────────────────────────────────────────────────────

/// One frame in the environment chain. `set` always binds in this frame;
/// `get` walks toward the root. Frames pushed by closure calls carry a
/// `CallFrame`, which makes the chain double as the call stack.
#[derive(Debug, Clone)]
pub struct Env {
    pub bindings: Rc<RefCell<HashMap<String, Value>>>,
    pub parent: Option<Rc<Env>>,
    pub frame: Option<CallFrame>,
}

impl Env {
    pub fn new() -> Self {
        Env {
            bindings: Rc::new(RefCell::new(HashMap::new())),
            parent: None,
            frame: None,
        }
    }

    pub fn with_parent(parent: Rc<Env>) -> Self {
        Env {
            bindings: Rc::new(RefCell::new(HashMap::new())),
            parent: Some(parent),
            frame: None,
        }
    }

    pub fn with_frame(parent: Rc<Env>, frame: CallFrame) -> Self {
        Env {
            bindings: Rc::new(RefCell::new(HashMap::new())),
            parent: Some(parent),
            frame: Some(frame),
        }
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        if let Some(val) = self.bindings.borrow().get(name) {
            Some(val.clone())
        } else if let Some(parent) = &self.parent {
            parent.get(name)
        } else {
            None
        }
    }

    pub fn set(&self, name: impl Into<String>, val: Value) {
        self.bindings.borrow_mut().insert(name.into(), val);
    }

    /// Walk the chain innermost-out, collecting call frames.
    pub fn trace(&self) -> StackTrace {
        let mut frames = Vec::new();
        let mut env = self.clone();
        loop {
            if let Some(frame) = &env.frame {
                frames.push(frame.clone());
            }
            match env.parent.clone() {
                Some(parent) => env = (*parent).clone(),
                None => break,
            }
        }
        StackTrace(frames)
    }
}

impl Default for Env {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ─────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit() {
        let v = Value::Unit;
        assert!(v.is_unit());
        assert_eq!(v.type_name(), "unit");
        assert_eq!(format!("{v}"), "()");
    }

    #[test]
    fn test_booleans_are_singletons() {
        let a = Value::truth(true);
        let b = Value::truth(true);
        assert_eq!(a, b);
        assert_ne!(a, Value::truth(false));
        assert_eq!(a.as_bool(), Some(true));
        assert_eq!(a.type_name(), "bool");
        assert_eq!(format!("{a}"), "#t");
        assert_eq!(format!("{}", Value::truth(false)), "#f");
    }

    #[test]
    fn test_number_display() {
        assert_eq!(format!("{}", Value::Number(42.0)), "42");
        assert_eq!(format!("{}", Value::Number(-3.0)), "-3");
        assert_eq!(format!("{}", Value::Number(2.5)), "2.5");
    }

    #[test]
    fn test_scalar_equality() {
        assert_eq!(Value::Number(1.0), Value::Number(1.0));
        assert_eq!(Value::Number(0.0), Value::Number(-0.0));
        assert_eq!(Value::string("a"), Value::string("a"));
        assert_ne!(Value::Number(1.0), Value::string("1"));
    }

    #[test]
    fn test_aggregate_identity() {
        let a = Value::list(vec![Value::Number(1.0)]);
        let b = Value::list(vec![Value::Number(1.0)]);
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }

    #[test]
    fn test_list_display() {
        let v = Value::list(vec![
            Value::Number(1.0),
            Value::string("x"),
            Value::Unit,
        ]);
        assert_eq!(format!("{v}"), "[1 \"x\" ()]");
    }

    #[test]
    fn test_dict_display_is_insertion_ordered() {
        let v = Value::dict(vec![
            (Value::Number(1.0), Value::string("a")),
            (Value::Number(2.0), Value::string("b")),
        ]);
        assert_eq!(format!("{v}"), "{ (1 \"a\") (2 \"b\") }");
    }

    #[test]
    fn test_env_chain() {
        let root = Env::new();
        root.set("x", Value::Number(1.0));
        let child = Env::with_parent(Rc::new(root.clone()));
        assert_eq!(child.get("x"), Some(Value::Number(1.0)));
        child.set("x", Value::Number(2.0));
        assert_eq!(child.get("x"), Some(Value::Number(2.0)));
        assert_eq!(root.get("x"), Some(Value::Number(1.0)));
    }

    #[test]
    fn test_env_mutation_is_shared() {
        let root = Rc::new(Env::new());
        let a = Env::with_parent(root.clone());
        a.set("n", Value::Number(1.0));
        let b = a.clone();
        b.set("n", Value::Number(2.0));
        assert_eq!(a.get("n"), Some(Value::Number(2.0)));
    }
}
