//! Script evaluation error types

use rhai::{EvalAltResult, ParseError, Position};

/// Script execution result type
pub type Result<T> = std::result::Result<T, ScriptError>;

/// Engine-side failure while evaluating a script
///
/// This covers scripts that do not parse or that raise while running. A script
/// that deliberately reports a failure through `result` is not an error; see
/// [`PolicyOutcome`](crate::PolicyOutcome).
#[derive(Debug, Clone, thiserror::Error)]
pub enum ScriptError {
    /// Script compilation/parsing error
    #[error("Script compilation error: {message}{}", at(.line, .column))]
    CompilationError {
        /// Error message
        message: String,
        /// Line number if available
        line: Option<usize>,
        /// Column number if available
        column: Option<usize>,
    },

    /// Script runtime error
    #[error("Script runtime error: {message}{}", at(.line, &None))]
    RuntimeError {
        /// Error message
        message: String,
        /// Script line where error occurred
        line: Option<usize>,
        /// Function calls leading to the error, outermost first
        trace: Vec<String>,
    },
}

fn at(line: &Option<usize>, column: &Option<usize>) -> String {
    match (line, column) {
        (Some(line), Some(col)) => format!(" at line {}, column {}", line, col),
        (Some(line), None) => format!(" at line {}", line),
        _ => String::new(),
    }
}

impl ScriptError {
    /// Underlying message without location details
    pub fn message(&self) -> &str {
        match self {
            Self::CompilationError { message, .. } | Self::RuntimeError { message, .. } => {
                message
            }
        }
    }

    /// Call trace for runtime errors, outermost call first
    pub fn trace(&self) -> &[String] {
        match self {
            Self::RuntimeError { trace, .. } => trace,
            _ => &[],
        }
    }

    /// Message followed by the call trace, for diagnostics
    pub fn detailed(&self) -> String {
        let mut out = self.to_string();
        for frame in self.trace() {
            out.push_str("\n    ");
            out.push_str(frame);
        }
        out
    }
}

impl From<ParseError> for ScriptError {
    fn from(err: ParseError) -> Self {
        let pos = err.position();
        Self::CompilationError {
            message: err.err_type().to_string(),
            line: pos.line(),
            column: pos.position(),
        }
    }
}

impl From<Box<EvalAltResult>> for ScriptError {
    fn from(err: Box<EvalAltResult>) -> Self {
        let mut trace = Vec::new();
        let mut current: &EvalAltResult = &err;

        // Unwrap nested function-call errors down to the one that was raised
        while let EvalAltResult::ErrorInFunctionCall(name, _, inner, pos) = current {
            trace.push(match pos.line() {
                Some(line) => format!("in call to function '{}' at line {}", name, line),
                None => format!("in call to function '{}'", name),
            });
            current = inner;
        }

        let message = match current {
            EvalAltResult::ErrorRuntime(value, _) => value.to_string(),
            other => strip_position(other.to_string(), other.position()),
        };

        Self::RuntimeError {
            message,
            line: err.position().line(),
            trace,
        }
    }
}

fn strip_position(message: String, pos: Position) -> String {
    if pos.is_none() {
        return message;
    }
    let suffix = format!(" ({})", pos);
    match message.strip_suffix(&suffix) {
        Some(stripped) => stripped.to_string(),
        None => message,
    }
}
