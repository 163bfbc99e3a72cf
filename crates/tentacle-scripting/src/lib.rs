//! # Tentacle Scripting
//!
//! Script policy for gateway requests and responses.
//!
//! Operators attach Rhai scripts to four hook points:
//!
//! - **onRequest** - inspect or mutate the request head, then continue or fail
//! - **onResponse** - same for the response head
//! - **onRequestContent** - rewrite the buffered request body
//! - **onResponseContent** - rewrite the buffered response body
//!
//! Every evaluation gets fresh bindings (`request`, `response`, `context`,
//! `result`) and runs on an interpreter checked out of a shared pool.

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod engine;
pub mod error;
pub mod policy;
pub mod pool;
pub mod result;
pub mod rhai_engine;
pub mod runner;
pub mod transform;
pub mod view;

pub use engine::{Bindings, Interpreter};
pub use error::{Result, ScriptError};
pub use policy::ScriptPolicy;
pub use pool::{InterpreterPool, PoolStats, PooledInterpreter};
pub use result::{ExecutionResult, PolicyOutcome, ResultState};
pub use rhai_engine::RhaiInterpreter;
pub use runner::ScriptRunner;
pub use transform::ContentScriptTransform;
pub use view::{RequestView, ResponseView};

/// Prelude with commonly used types
pub mod prelude {
    pub use crate::engine::{Bindings, Interpreter};
    pub use crate::error::{Result, ScriptError};
    pub use crate::policy::ScriptPolicy;
    pub use crate::result::{ExecutionResult, ResultState};
    pub use crate::runner::ScriptRunner;
}
