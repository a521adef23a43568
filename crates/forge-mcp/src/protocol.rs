//! Line-delimited JSON-RPC 2.0 framing (spec.md §4.G).
//!
//! A purpose-built client, not a wrapper around a general MCP SDK: each
//! spawned stack gets its own request-id counter and a small pending-table
//! keyed by id, matching the shape the tool indexer actually needs.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The fixed MCP protocol version this client speaks.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// A JSON-RPC request or notification (omit `id` for a notification).
#[derive(Debug, Clone, Serialize)]
pub struct RpcRequest {
    /// Always `"2.0"`.
    pub jsonrpc: &'static str,
    /// Present for requests, absent for notifications.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    /// The RPC method name.
    pub method: String,
    /// Method parameters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl RpcRequest {
    /// Build a request expecting a response.
    #[must_use]
    pub fn call(id: u64, method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id: Some(id),
            method: method.into(),
            params: Some(params),
        }
    }

    /// Build a fire-and-forget notification.
    #[must_use]
    pub fn notify(method: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0",
            id: None,
            method: method.into(),
            params: None,
        }
    }

    /// Serialize to a single newline-terminated JSON-RPC line.
    #[must_use]
    pub fn to_line(&self) -> String {
        format!("{}\n", serde_json::to_string(self).unwrap_or_default())
    }
}

/// A JSON-RPC response.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcResponse {
    /// Echoes the request's id.
    pub id: Option<u64>,
    /// Present on success.
    #[serde(default)]
    pub result: Option<Value>,
    /// Present on failure.
    #[serde(default)]
    pub error: Option<RpcErrorObject>,
}

/// A JSON-RPC error object.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcErrorObject {
    /// Error code.
    pub code: i64,
    /// Error message.
    pub message: String,
}

/// A request-id generator scoped to a single spawned process, starting at 1
/// (spec.md §4.G "Concurrency": "each spawn runs with its own request-id
/// counter starting at 1").
#[derive(Debug, Default)]
pub struct RequestIdCounter {
    next: u64,
}

impl RequestIdCounter {
    /// Build a counter that will hand out `1, 2, 3, ...`.
    #[must_use]
    pub fn new() -> Self {
        Self { next: 1 }
    }

    /// Hand out the next id.
    pub fn next(&mut self) -> u64 {
        let id = self.next;
        self.next += 1;
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_starts_at_one() {
        let mut counter = RequestIdCounter::new();
        assert_eq!(counter.next(), 1);
        assert_eq!(counter.next(), 2);
    }

    #[test]
    fn notification_omits_id_field() {
        let line = RpcRequest::notify("notifications/initialized").to_line();
        assert!(!line.contains("\"id\""));
    }

    #[test]
    fn call_includes_id_field() {
        let line = RpcRequest::call(1, "tools/list", serde_json::json!({})).to_line();
        assert!(line.contains("\"id\":1"));
    }
}
