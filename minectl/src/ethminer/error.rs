//! Error types for the ethminer JSON-RPC API.

use serde_json::Value;
use thiserror::Error;

/// Failures talking to an ethminer API endpoint.
#[derive(Error, Debug)]
pub enum RpcError {
    /// TCP connect failed or timed out
    #[error("{endpoint}: {source}")]
    ConnectError {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },

    /// Request attempted without a live connection
    #[error("Not connected")]
    NotConnected,

    /// Read or write failed mid-session; the connection has been torn down
    #[error("Connection lost: {0}")]
    ConnectionLost(#[source] std::io::Error),

    /// No matching response arrived before the deadline
    #[error("No response from miner")]
    EmptyResponse,

    /// The miner answered with an error object
    #[error("({code}): {message}")]
    Protocol { code: i64, message: String },

    /// Response carried neither a result nor an error
    #[error("invalid response, missing result")]
    MalformedResponse,

    /// Result present but not the expected value
    #[error("invalid response, unexpected result: {actual} != {expected}")]
    UnexpectedResult { actual: Value, expected: Value },

    /// A line could not be decoded, or a result had the wrong shape
    #[error("Invalid message: {0}")]
    InvalidMessage(String),
}

impl RpcError {
    /// True for errors that tore the connection down.
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            RpcError::ConnectError { .. } | RpcError::ConnectionLost(_) | RpcError::NotConnected
        )
    }
}

/// Convenient Result type for RPC operations.
pub type RpcResult<T> = Result<T, RpcError>;
