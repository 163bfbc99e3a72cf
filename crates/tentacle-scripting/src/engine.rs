//! Interpreter abstraction and the bindings handed to it

use crate::error::Result;
use crate::result::ExecutionResult;
use crate::view::{RequestView, ResponseView};
use std::fmt;
use tentacle_core::ExecutionContext;

/// Values bound into a script's scope for one evaluation
///
/// The set of names is fixed. Any change to it bumps [`Bindings::VERSION`] so
/// interpreter implementations can tell which layout they are given.
#[derive(Debug, Clone)]
pub struct Bindings {
    /// Bound as `request`
    pub request: RequestView,
    /// Bound as `response`
    pub response: ResponseView,
    /// Bound as `context`
    pub context: ExecutionContext,
    /// Bound as `result`; read back after evaluation
    pub result: ExecutionResult,
}

impl Bindings {
    /// Layout version of the binding set
    pub const VERSION: u32 = 1;

    /// Name of the request view
    pub const REQUEST: &'static str = "request";
    /// Name of the response view
    pub const RESPONSE: &'static str = "response";
    /// Name of the pipeline context
    pub const CONTEXT: &'static str = "context";
    /// Name of the result record
    pub const RESULT: &'static str = "result";

    /// Bind views and context with a fresh result record
    pub fn new(request: RequestView, response: ResponseView, context: &ExecutionContext) -> Self {
        Self {
            request,
            response,
            context: context.clone(),
            result: ExecutionResult::new(),
        }
    }
}

/// Script interpreter
///
/// Implementations evaluate source text once against the given bindings and
/// write the script's final `result` back into `bindings.result`.
pub trait Interpreter: Send + Sync + fmt::Debug {
    /// Name of the scripting language
    fn language(&self) -> &'static str;

    /// Check that a script parses, without running it
    fn compile(&self, source: &str) -> Result<()>;

    /// Evaluate a script once
    ///
    /// Returns the script's final value as text, or `None` if it produced none.
    fn evaluate(&self, source: &str, bindings: &mut Bindings) -> Result<Option<String>>;
}
