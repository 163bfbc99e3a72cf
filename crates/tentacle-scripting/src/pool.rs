//! Pool of interpreters shared by concurrent requests

use crate::engine::Interpreter;
use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::ops::Deref;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::trace;

/// Fixed-size pool of interpreters
///
/// Each evaluation checks out one interpreter for its whole duration, so no two
/// evaluations ever share an interpreter. A pool of size one serializes every
/// evaluation.
pub struct InterpreterPool {
    idle: Mutex<Vec<Box<dyn Interpreter>>>,
    available: Condvar,
    size: usize,
    checkouts: AtomicU64,
    waits: AtomicU64,
}

impl InterpreterPool {
    /// Create a pool of `size` interpreters built by `factory`
    ///
    /// A size of zero is treated as one.
    pub fn new<F>(size: usize, mut factory: F) -> Self
    where
        F: FnMut() -> Box<dyn Interpreter>,
    {
        let size = size.max(1);
        let idle = (0..size).map(|_| factory()).collect();

        Self {
            idle: Mutex::new(idle),
            available: Condvar::new(),
            size,
            checkouts: AtomicU64::new(0),
            waits: AtomicU64::new(0),
        }
    }

    /// Check out an interpreter, blocking until one is free
    pub fn checkout(&self) -> PooledInterpreter<'_> {
        let mut idle = self.idle.lock();
        if idle.is_empty() {
            self.waits.fetch_add(1, Ordering::Relaxed);
            trace!(size = self.size, "All interpreters busy, waiting");
        }
        let interpreter = loop {
            if let Some(interpreter) = idle.pop() {
                break interpreter;
            }
            self.available.wait(&mut idle);
        };
        self.checkouts.fetch_add(1, Ordering::Relaxed);

        PooledInterpreter {
            pool: self,
            interpreter: Some(interpreter),
        }
    }

    /// Number of interpreters owned by the pool
    pub fn size(&self) -> usize {
        self.size
    }

    /// Pool statistics
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            size: self.size,
            idle: self.idle.lock().len(),
            checkouts: self.checkouts.load(Ordering::Relaxed),
            waits: self.waits.load(Ordering::Relaxed),
        }
    }

    fn checkin(&self, interpreter: Box<dyn Interpreter>) {
        self.idle.lock().push(interpreter);
        self.available.notify_one();
    }
}

impl fmt::Debug for InterpreterPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterpreterPool")
            .field("size", &self.size)
            .field("stats", &self.stats())
            .finish()
    }
}

/// Interpreter checked out of an [`InterpreterPool`], returned on drop
pub struct PooledInterpreter<'a> {
    pool: &'a InterpreterPool,
    interpreter: Option<Box<dyn Interpreter>>,
}

impl Deref for PooledInterpreter<'_> {
    type Target = dyn Interpreter;

    fn deref(&self) -> &Self::Target {
        match &self.interpreter {
            Some(interpreter) => interpreter.as_ref(),
            None => unreachable!("interpreter is only taken on drop"),
        }
    }
}

impl Drop for PooledInterpreter<'_> {
    fn drop(&mut self) {
        if let Some(interpreter) = self.interpreter.take() {
            self.pool.checkin(interpreter);
        }
    }
}

impl fmt::Debug for PooledInterpreter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledInterpreter")
            .field("interpreter", &self.interpreter)
            .finish()
    }
}

/// Interpreter pool statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Number of interpreters in the pool
    pub size: usize,
    /// Interpreters currently idle
    pub idle: usize,
    /// Total checkouts
    pub checkouts: u64,
    /// Checkouts that had to wait for a free interpreter
    pub waits: u64,
}

impl PoolStats {
    /// Fraction of checkouts that had to wait (0.0 to 1.0)
    pub fn contention(&self) -> f64 {
        if self.checkouts == 0 {
            0.0
        } else {
            self.waits as f64 / self.checkouts as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rhai_engine::RhaiInterpreter;
    use std::sync::Arc;
    use std::time::Duration;

    fn rhai() -> Box<dyn Interpreter> {
        Box::new(RhaiInterpreter::new())
    }

    #[test]
    fn test_checkout_returns_on_drop() {
        let pool = InterpreterPool::new(2, rhai);
        {
            let a = pool.checkout();
            let _b = pool.checkout();
            assert_eq!(a.language(), "rhai");
            assert_eq!(pool.stats().idle, 0);
        }
        let stats = pool.stats();
        assert_eq!(stats.idle, 2);
        assert_eq!(stats.checkouts, 2);
        assert_eq!(stats.waits, 0);
    }

    #[test]
    fn test_zero_size_becomes_one() {
        let pool = InterpreterPool::new(0, rhai);
        assert_eq!(pool.size(), 1);
    }

    #[test]
    fn test_checkout_waits_for_free_interpreter() {
        let pool = Arc::new(InterpreterPool::new(1, rhai));
        let held = pool.checkout();

        let waiter = {
            let pool = Arc::clone(&pool);
            std::thread::spawn(move || {
                let interpreter = pool.checkout();
                interpreter.language().to_string()
            })
        };

        std::thread::sleep(Duration::from_millis(50));
        drop(held);

        assert_eq!(waiter.join().unwrap(), "rhai");
        let stats = pool.stats();
        assert_eq!(stats.checkouts, 2);
        assert_eq!(stats.idle, 1);
    }

    #[test]
    fn test_contention() {
        assert_eq!(PoolStats::default().contention(), 0.0);

        let stats = PoolStats {
            size: 1,
            idle: 1,
            checkouts: 4,
            waits: 1,
        };
        assert_eq!(stats.contention(), 0.25);
    }
}
