//! Policy chain: how a policy tells the pipeline to go on or stop

use crate::{GatewayRequest, GatewayResponse, Result};
use bytes::Bytes;
use http::{header, Response, StatusCode};
use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;

/// Structured failure reported to the pipeline
///
/// A failure without a content type is rendered with the gateway's default error
/// body; a failure with one sends the message verbatim under that content type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyFailure {
    status: StatusCode,
    message: String,
    content_type: Option<String>,
}

impl PolicyFailure {
    /// Failure with a status and message
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            content_type: None,
        }
    }

    /// Failure with a status, message and the content type of the error body
    pub fn with_content_type(
        status: StatusCode,
        message: impl Into<String>,
        content_type: impl Into<String>,
    ) -> Self {
        Self {
            status,
            message: message.into(),
            content_type: Some(content_type.into()),
        }
    }

    /// Failure carrying only a message, reported as 500
    pub fn from_message(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    /// HTTP status
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Human-readable message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Content type of the error body, if the policy chose one
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// Render the failure as the response returned to the API caller
    pub fn to_response(&self) -> Result<Response<Bytes>> {
        let builder = Response::builder().status(self.status);

        let response = match &self.content_type {
            Some(content_type) => builder
                .header(header::CONTENT_TYPE, content_type.as_str())
                .body(Bytes::from(self.message.clone()))?,
            None => {
                let body = serde_json::to_vec(&FailureBody {
                    message: &self.message,
                    http_status_code: self.status.as_u16(),
                })?;
                builder
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Bytes::from(body))?
            }
        };

        Ok(response)
    }
}

impl fmt::Display for PolicyFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.status.as_u16(), self.message)?;
        if let Some(content_type) = &self.content_type {
            write!(f, " ({})", content_type)?;
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct FailureBody<'a> {
    message: &'a str,
    http_status_code: u16,
}

/// Pipeline handle given to every hook invocation
///
/// Decision hooks call exactly one of [`do_next`](Self::do_next) or
/// [`fail_with`](Self::fail_with). Body transformations report business failures
/// through [`stream_fail_with`](Self::stream_fail_with).
pub trait PolicyChain: Send + Sync {
    /// Continue with the next policy
    fn do_next(&self, request: &GatewayRequest, response: &GatewayResponse);

    /// Abort processing of the request
    fn fail_with(&self, failure: PolicyFailure);

    /// Abort while a body stream is being transformed
    fn stream_fail_with(&self, failure: PolicyFailure);
}

/// Signal received by a [`RecordingChain`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainSignal {
    /// `do_next` was called
    Next,
    /// `fail_with` was called
    Fail(PolicyFailure),
    /// `stream_fail_with` was called
    StreamFail(PolicyFailure),
}

impl ChainSignal {
    /// Failure carried by the signal, if any
    pub fn failure(&self) -> Option<&PolicyFailure> {
        match self {
            Self::Next => None,
            Self::Fail(failure) | Self::StreamFail(failure) => Some(failure),
        }
    }
}

/// Chain that records every signal it receives
#[derive(Debug, Default)]
pub struct RecordingChain {
    signals: Mutex<Vec<ChainSignal>>,
}

impl RecordingChain {
    /// Create an empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// All signals received so far
    pub fn signals(&self) -> Vec<ChainSignal> {
        self.signals.lock().clone()
    }

    /// Most recent signal
    pub fn last(&self) -> Option<ChainSignal> {
        self.signals.lock().last().cloned()
    }

    /// First failure received, if any
    pub fn failure(&self) -> Option<PolicyFailure> {
        self.signals
            .lock()
            .iter()
            .find_map(|signal| signal.failure().cloned())
    }

    /// Forget recorded signals
    pub fn clear(&self) {
        self.signals.lock().clear();
    }

    fn record(&self, signal: ChainSignal) {
        self.signals.lock().push(signal);
    }
}

impl PolicyChain for RecordingChain {
    fn do_next(&self, _request: &GatewayRequest, _response: &GatewayResponse) {
        self.record(ChainSignal::Next);
    }

    fn fail_with(&self, failure: PolicyFailure) {
        self.record(ChainSignal::Fail(failure));
    }

    fn stream_fail_with(&self, failure: PolicyFailure) {
        self.record(ChainSignal::StreamFail(failure));
    }
}
