use std::fmt;

/// A source position: 1-based line and column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub line: usize,
    pub col: usize,
}

impl Span {
    pub fn new(line: usize, col: usize) -> Self {
        Span { line, col }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.col)
    }
}

/// A single frame in a call stack trace.
#[derive(Debug, Clone)]
pub struct CallFrame {
    pub name: String,
    pub span: Option<Span>,
}

impl fmt::Display for CallFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.span {
            Some(span) => write!(f, "{} at {span}", self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// A captured stack trace (list of call frames, innermost first).
#[derive(Debug, Clone)]
pub struct StackTrace(pub Vec<CallFrame>);

impl fmt::Display for StackTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Trace")?;
        for frame in &self.0 {
            write!(f, "\n  {frame}")?;
        }
        Ok(())
    }
}

fn span_text(span: &Option<Span>) -> String {
    match span {
        Some(span) => format!(" at {span}"),
        None => String::new(),
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum RispError {
    #[error("{message} at {span}")]
    Lex { message: String, span: Span },

    #[error("{message} at {span}")]
    Parse { message: String, span: Span },

    #[error("{message} at {span}")]
    Macro { message: String, span: Span },

    #[error("{0}")]
    Eval(String),

    #[error("unaccepted arguments types ({types}) for '{name}'{}", span_text(.span))]
    Types {
        name: String,
        types: String,
        span: Option<Span>,
    },

    #[error("'{name}' expects {expected} arguments, got {got}")]
    Arity {
        name: String,
        expected: usize,
        got: usize,
    },

    #[error("undefined variable '{name}' at {span}")]
    Unbound { name: String, span: Span },

    #[error("{0}")]
    Host(String),

    #[error("{inner}")]
    WithTrace {
        inner: Box<RispError>,
        trace: StackTrace,
    },
}

impl RispError {
    pub fn eval(msg: impl Into<String>) -> Self {
        RispError::Eval(msg.into())
    }

    pub fn arity(name: impl Into<String>, expected: usize, got: usize) -> Self {
        RispError::Arity {
            name: name.into(),
            expected,
            got,
        }
    }

    /// Fill in a source location on errors raised without one.
    pub fn with_span(self, span: Span) -> Self {
        match self {
            RispError::Types {
                name,
                types,
                span: None,
            } => RispError::Types {
                name,
                types,
                span: Some(span),
            },
            other => other,
        }
    }

    /// Append one call frame to this error's trace. Called at each
    /// closure call site as the error unwinds, so the finished trace
    /// lists frames innermost first.
    pub fn push_frame(self, frame: CallFrame) -> Self {
        match self {
            RispError::WithTrace { inner, mut trace } => {
                trace.0.push(frame);
                RispError::WithTrace { inner, trace }
            }
            other => RispError::WithTrace {
                inner: Box::new(other),
                trace: StackTrace(vec![frame]),
            },
        }
    }

    /// Wrap this error with a stack trace (no-op if already wrapped or empty).
    pub fn with_stack_trace(self, trace: StackTrace) -> Self {
        if trace.0.is_empty() {
            return self;
        }
        match self {
            RispError::WithTrace { .. } => self,
            other => RispError::WithTrace {
                inner: Box::new(other),
                trace,
            },
        }
    }

    pub fn stack_trace(&self) -> Option<&StackTrace> {
        match self {
            RispError::WithTrace { trace, .. } => Some(trace),
            _ => None,
        }
    }

    pub fn inner(&self) -> &RispError {
        match self {
            RispError::WithTrace { inner, .. } => inner.inner(),
            other => other,
        }
    }

    /// The host contract: one human-readable string, trace block included.
    pub fn render(&self) -> String {
        match self.stack_trace() {
            Some(trace) => format!("{}\n{trace}", self.inner()),
            None => self.inner().to_string(),
        }
    }
}
