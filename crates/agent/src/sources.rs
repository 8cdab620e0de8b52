//! Document source collection from retrieval tool outputs.
//!
//! Search-style tools return JSON objects (or arrays of them) that name the
//! document each hit came from. Those names are gathered so the final answer
//! can cite them.

use serde_json::Value;
use tracing::debug;

const SOURCE_FIELDS: [&str; 2] = ["documentName", "source"];

/// Unique source names in first-seen order.
#[derive(Debug, Default, Clone)]
pub struct SourceCollector {
    names: Vec<String>,
}

impl SourceCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scan one tool payload. Non-JSON payloads are ignored.
    pub fn scan(&mut self, payload: &str) {
        let Ok(doc) = serde_json::from_str::<Value>(payload) else {
            debug!("Source tool output is not JSON, skipping");
            return;
        };

        match doc {
            Value::Array(items) => items.iter().for_each(|item| self.scan_hit(item)),
            other => self.scan_hit(&other),
        }
    }

    fn scan_hit(&mut self, hit: &Value) {
        let Some(obj) = hit.as_object() else {
            return;
        };
        let name = SOURCE_FIELDS
            .iter()
            .filter_map(|field| obj.get(*field).and_then(Value::as_str))
            .map(str::trim)
            .find(|name| !name.is_empty());

        if let Some(name) = name {
            if !self.names.iter().any(|n| n == name) {
                self.names.push(name.to_string());
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn into_names(self) -> Vec<String> {
        self.names
    }
}
