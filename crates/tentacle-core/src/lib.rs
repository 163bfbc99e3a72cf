//! # Tentacle Core
//!
//! Core types, traits, and error handling shared by the Tentacle policy crates.
//!
//! This crate models the parts of the gateway that policies talk to:
//! - Shared request/response heads
//! - The execution context of a request
//! - The policy chain and its failure signals
//! - Body stream transformation
//! - Hook configuration

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod chain;
pub mod context;
pub mod error;
pub mod request;
pub mod response;
pub mod stream;
pub mod types;

pub use chain::{ChainSignal, PolicyChain, PolicyFailure, RecordingChain};
pub use context::ExecutionContext;
pub use error::{Error, Result};
pub use request::GatewayRequest;
pub use response::GatewayResponse;
pub use stream::{BodyTransformer, ChunkOutcome, TransformableStream, TransformationError};
pub use types::{BodySide, Hook, HookScripts};

// Re-export commonly used HTTP types
pub use bytes::Bytes;
pub use http::{Method, Request, Response, StatusCode};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::chain::{ChainSignal, PolicyChain, PolicyFailure, RecordingChain};
    pub use crate::context::ExecutionContext;
    pub use crate::error::{Error, Result};
    pub use crate::request::GatewayRequest;
    pub use crate::response::GatewayResponse;
    pub use crate::stream::{BodyTransformer, ChunkOutcome, TransformableStream};
    pub use crate::types::{BodySide, Hook, HookScripts};
}
