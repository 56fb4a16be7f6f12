//! JSON-RPC envelopes for the ethminer API.
//!
//! ethminer speaks a small JSON-RPC 2.0 dialect: requests carry the version
//! string, responses usually omit it, and every message is one line of JSON.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Protocol version string sent with every request.
pub const JSONRPC_VERSION: &str = "2.0";

/// Outgoing request.
///
/// Built by the RPC client at send time, which is when the id is assigned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub jsonrpc: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub params: Option<Value>,
    pub id: u64,
}

impl Request {
    pub fn new(id: u64, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
            id,
        }
    }
}

/// Error object carried by a failed response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorObject {
    pub code: i64,
    pub message: String,
}

/// Incoming response.
///
/// `id` is optional because ethminer answers unparseable requests with a
/// null id; such responses never match an outstanding request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    #[serde(default)]
    pub id: Option<u64>,
    /// Result value (present on success)
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub result: Option<Value>,
    /// Error object (present on failure)
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<ErrorObject>,
}

impl Response {
    pub fn success(id: u64, result: Value) -> Self {
        Self {
            id: Some(id),
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: u64, code: i64, message: impl Into<String>) -> Self {
        Self {
            id: Some(id),
            result: None,
            error: Some(ErrorObject {
                code,
                message: message.into(),
            }),
        }
    }
}
