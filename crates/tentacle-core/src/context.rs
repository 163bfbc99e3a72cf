//! Execution-scoped context shared by every policy of one request

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Key/value store attached to a single request's execution
///
/// Every hook run for the same request sees the same attributes; clones share
/// the underlying store.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    request_id: Arc<str>,
    start_time: Instant,
    attributes: Arc<RwLock<HashMap<String, serde_json::Value>>>,
}

impl ExecutionContext {
    /// Create a context for a request
    pub fn new(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into().into(),
            start_time: Instant::now(),
            attributes: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Request ID this context belongs to
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Elapsed time since the context was created
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Get an attribute value
    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        self.attributes.read().get(key).cloned()
    }

    /// Set an attribute value, returning the previous one
    pub fn set(&self, key: impl Into<String>, value: serde_json::Value) -> Option<serde_json::Value> {
        self.attributes.write().insert(key.into(), value)
    }

    /// Remove an attribute
    pub fn remove(&self, key: &str) -> Option<serde_json::Value> {
        self.attributes.write().remove(key)
    }

    /// Whether an attribute is set
    pub fn contains(&self, key: &str) -> bool {
        self.attributes.read().contains_key(key)
    }

    /// Copy of all attributes
    pub fn attributes(&self) -> HashMap<String, serde_json::Value> {
        self.attributes.read().clone()
    }
}
