//! Request/response correlation over a [`Transport`].
//!
//! The protocol is effectively synchronous: one request goes out, then the
//! client waits up to [`RESPONSE_TIMEOUT`] for the response carrying the same
//! id. Responses with any other id are stale (typically answers to a request
//! that previously timed out) and are dropped with a warning.

use std::time::Duration;

use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::time::Instant;

use super::error::{RpcError, RpcResult};
use super::messages::{Request, Response};
use super::transport::Transport;
use crate::tracing::prelude::*;

/// How long to wait for the matching response, measured from when the
/// request is issued.
pub const RESPONSE_TIMEOUT: Duration = Duration::from_secs(1);

/// JSON-RPC client for one miner connection.
///
/// Methods take `&mut self`, so at most one request is outstanding at a
/// time.
pub struct RpcClient<S = TcpStream> {
    transport: Transport<S>,

    /// Auto-incrementing message ID. Survives reconnects so ids are never
    /// reused for the lifetime of the client.
    next_id: u64,
}

impl<S> RpcClient<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(transport: Transport<S>) -> Self {
        Self {
            transport,
            next_id: 0,
        }
    }

    pub fn transport(&self) -> &Transport<S> {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut Transport<S> {
        &mut self.transport
    }

    /// Get next message ID and increment counter.
    fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Send a request and wait for its response.
    ///
    /// Returns `Ok(None)` if no response with the request's id arrived
    /// before the deadline. Connection failures tear the transport down and
    /// come back as [`RpcError::ConnectionLost`].
    pub async fn send_request(
        &mut self,
        method: &str,
        params: Option<Value>,
    ) -> RpcResult<Option<Response>> {
        if !self.transport.is_connected() {
            return Err(RpcError::NotConnected);
        }

        let id = self.next_id();
        let deadline = Instant::now() + RESPONSE_TIMEOUT;

        let request = Request::new(id, method, params);
        let line = serde_json::to_string(&request)
            .map_err(|e| RpcError::InvalidMessage(format!("Failed to encode request: {}", e)))?;
        self.transport.send_line(&line).await?;

        while let Some(line) = self.transport.recv_line(deadline).await? {
            let response: Response = serde_json::from_str(&line).map_err(|e| {
                RpcError::InvalidMessage(format!("Failed to parse JSON: {}, line: {}", e, line))
            })?;

            if response.id == Some(id) {
                return Ok(Some(response));
            }

            warn!(
                expected = id,
                received = ?response.id,
                "Response doesn't have same id as request, waiting for another response"
            );
        }

        debug!(method, id, "No response before deadline");
        Ok(None)
    }

    /// Send a request and validate the response.
    ///
    /// With `expected` set, the result must equal it.
    pub async fn call(
        &mut self,
        method: &str,
        params: Option<Value>,
        expected: Option<&Value>,
    ) -> RpcResult<Value> {
        let response = self.send_request(method, params).await?;
        validate(response, expected)
    }
}

/// Check a response for protocol errors and, optionally, an expected result.
///
/// Returns the result value on success.
pub fn validate(response: Option<Response>, expected: Option<&Value>) -> RpcResult<Value> {
    let response = response.ok_or(RpcError::EmptyResponse)?;

    if let Some(error) = response.error {
        return Err(RpcError::Protocol {
            code: error.code,
            message: error.message,
        });
    }

    let result = response.result.ok_or(RpcError::MalformedResponse)?;

    match expected {
        Some(expected) if &result != expected => Err(RpcError::UnexpectedResult {
            actual: result,
            expected: expected.clone(),
        }),
        _ => Ok(result),
    }
}
