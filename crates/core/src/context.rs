//! Per-invocation tool context.
//!
//! Tools that need state across calls within one run (a previously chosen
//! list id, a created ticket number) read and write it here. One context is
//! created per loop invocation and passed explicitly to every tool call, so
//! concurrent invocations never observe each other's state regardless of
//! which worker thread executes them.

use serde_json::{Map, Value};
use std::sync::Mutex;
use uuid::Uuid;

/// Key/value state scoped to a single loop invocation.
#[derive(Debug)]
pub struct ToolContext {
    run_id: String,
    values: Mutex<Map<String, Value>>,
}

impl ToolContext {
    /// Create an empty context with a fresh run id.
    pub fn new() -> Self {
        Self::with_run_id(Uuid::new_v4().to_string())
    }

    pub fn with_run_id(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            values: Mutex::new(Map::new()),
        }
    }

    /// Identifier of the invocation this context belongs to.
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.lock().get(key).cloned()
    }

    pub fn get_str(&self, key: &str) -> Option<String> {
        self.get(key).and_then(|v| v.as_str().map(String::from))
    }

    /// Store a value, returning the previous one.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.lock().insert(key.into(), value.into())
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.lock().remove(key)
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Copy of all values, for reporting once the run is over.
    pub fn snapshot(&self) -> Map<String, Value> {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Map<String, Value>> {
        // A panicking tool must not take the rest of the run down with it.
        self.values.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for ToolContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn set_and_get_values() {
        let ctx = ToolContext::new();
        assert!(ctx.is_empty());
        assert!(ctx.set("list_id", "abc").is_none());
        assert_eq!(ctx.get_str("list_id").as_deref(), Some("abc"));
        assert_eq!(ctx.set("list_id", "def"), Some(json!("abc")));
        assert_eq!(ctx.snapshot().len(), 1);
    }

    #[test]
    fn contexts_are_independent() {
        let a = ToolContext::new();
        let b = ToolContext::new();
        a.set("k", 1);
        assert!(b.get("k").is_none());
        assert_ne!(a.run_id(), b.run_id());
    }
}
