//! Result record through which a script reports its outcome

use http::StatusCode;
use std::fmt;
use tentacle_core::PolicyFailure;
use tracing::warn;

/// Outcome state set by a script
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ResultState {
    /// Continue processing (default)
    #[default]
    Success,
    /// Abort processing with the recorded failure
    Failure,
}

impl fmt::Display for ResultState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "SUCCESS"),
            Self::Failure => write!(f, "FAILURE"),
        }
    }
}

/// Mutable record bound as `result` for one hook invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionResult {
    /// Outcome state
    pub state: ResultState,
    /// HTTP status to report on failure
    pub code: Option<i64>,
    /// Failure message
    pub error: Option<String>,
    /// Content type of the error body
    pub content_type: Option<String>,
}

/// Business outcome decided by a script
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyOutcome {
    /// Let the pipeline continue
    Continue,
    /// Abort with this failure
    Fail(PolicyFailure),
}

impl ExecutionResult {
    /// Fresh record in the success state
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark as failed with a status and message
    pub fn fail(&mut self, code: i64, error: impl Into<String>) {
        self.state = ResultState::Failure;
        self.code = Some(code);
        self.error = Some(error.into());
    }

    /// Interpret the record once the script has finished
    ///
    /// A missing or out-of-range code becomes 500, and a missing message becomes
    /// the status' reason phrase. The failure carries a content type only when
    /// the script set one.
    pub fn outcome(&self) -> PolicyOutcome {
        if self.state == ResultState::Success {
            return PolicyOutcome::Continue;
        }

        let status = match self.code {
            None => StatusCode::INTERNAL_SERVER_ERROR,
            Some(code) => u16::try_from(code)
                .ok()
                .and_then(|code| StatusCode::from_u16(code).ok())
                .unwrap_or_else(|| {
                    warn!(code, "Script set an invalid status code, using 500");
                    StatusCode::INTERNAL_SERVER_ERROR
                }),
        };

        let message = self
            .error
            .clone()
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("Policy failure").to_string());

        PolicyOutcome::Fail(match &self.content_type {
            Some(content_type) => PolicyFailure::with_content_type(status, message, content_type),
            None => PolicyFailure::new(status, message),
        })
    }
}
