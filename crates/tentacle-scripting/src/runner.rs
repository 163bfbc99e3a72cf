//! Script runner: one evaluation per hook invocation

use crate::engine::{Bindings, Interpreter};
use crate::error::Result;
use crate::pool::{InterpreterPool, PoolStats};
use crate::rhai_engine::RhaiInterpreter;
use std::sync::Arc;
use std::time::Instant;
use tracing::trace;

/// Evaluates scripts on interpreters drawn from a shared pool
///
/// Cloning is cheap; clones share the pool.
#[derive(Debug, Clone)]
pub struct ScriptRunner {
    pool: Arc<InterpreterPool>,
}

impl ScriptRunner {
    /// Runner with one Rhai interpreter per CPU
    pub fn new() -> Self {
        Self::with_pool_size(num_cpus::get())
    }

    /// Runner with a fixed number of Rhai interpreters
    pub fn with_pool_size(size: usize) -> Self {
        Self::with_pool(InterpreterPool::new(size, || {
            Box::new(RhaiInterpreter::new()) as Box<dyn Interpreter>
        }))
    }

    /// Runner over a custom pool
    pub fn with_pool(pool: InterpreterPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Evaluate a script once against the given bindings
    ///
    /// The script's `result` is written back into `bindings.result`. Returns the
    /// script's final value as text, if it produced one.
    pub fn evaluate(&self, bindings: &mut Bindings, source: &str) -> Result<Option<String>> {
        let start = Instant::now();
        let interpreter = self.pool.checkout();
        let output = interpreter.evaluate(source, bindings);
        let elapsed = start.elapsed();

        trace!(
            language = interpreter.language(),
            elapsed_us = elapsed.as_micros(),
            ok = output.is_ok(),
            "Script evaluated"
        );
        output
    }

    /// Check that a script compiles
    pub fn compile(&self, source: &str) -> Result<()> {
        self.pool.checkout().compile(source)
    }

    /// Interpreter pool statistics
    pub fn stats(&self) -> PoolStats {
        self.pool.stats()
    }
}

impl Default for ScriptRunner {
    fn default() -> Self {
        Self::new()
    }
}
