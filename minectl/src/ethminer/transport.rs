//! TCP connection management with line-delimited I/O.
//!
//! ethminer's API is newline-delimited JSON over a plain TCP socket. The
//! [`Transport`] owns that socket and tracks whether it is up. Every I/O
//! failure tears the socket down before the error is returned, so nothing is
//! ever retried against a half-open connection.
//!
//! Byte accumulation and line splitting are handled by a [`LineCodec`]
//! inside a [`Framed`] stream: a single read may deliver part of a line or
//! several lines, and the codec's buffer carries the remainder across reads.
//! A line that is too long or not UTF-8 is reported as
//! [`RpcError::InvalidMessage`] and the connection stays up.

use std::fmt;
use std::io;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use time::OffsetDateTime;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::time::{Instant, timeout, timeout_at};
use tokio_util::codec::Framed;

use super::codec::{Frame, LineCodec};
use super::error::{RpcError, RpcResult};
use crate::tracing::prelude::*;

/// Bound on the TCP handshake.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(1);

/// Longest line accepted from a miner. `miner_getstatdetail` on a large rig
/// is the biggest message in practice, at a few tens of kilobytes.
const MAX_LINE_LENGTH: usize = 1024 * 1024;

/// Host and port of a miner API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// A single stream connection to one miner.
///
/// Generic over the stream so tests can run over in-memory pipes; in
/// production `S` is a [`TcpStream`].
pub struct Transport<S = TcpStream> {
    endpoint: Endpoint,

    /// The open socket, if any. Taking it out of the option is what closes
    /// it, so it can only ever be closed once.
    framed: Option<Framed<S, LineCodec>>,

    connected: bool,

    /// When the connection last went down. Kept for reconnect backoff;
    /// cleared on a successful connect.
    last_disconnected_at: Option<OffsetDateTime>,
}

fn codec() -> LineCodec {
    LineCodec::new(MAX_LINE_LENGTH)
}

impl<S> Transport<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Create a transport that is not yet connected.
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            framed: None,
            connected: false,
            last_disconnected_at: None,
        }
    }

    /// Wrap an already-open stream. The transport starts out connected.
    pub fn from_stream(endpoint: Endpoint, stream: S) -> Self {
        Self {
            endpoint,
            framed: Some(Framed::new(stream, codec())),
            connected: true,
            last_disconnected_at: None,
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn is_connected(&self) -> bool {
        self.connected && self.framed.is_some()
    }

    pub fn last_disconnected_at(&self) -> Option<OffsetDateTime> {
        self.last_disconnected_at
    }

    /// Close the socket, if open, and record the transition.
    ///
    /// Idempotent: safe to call repeatedly and on a transport that never
    /// connected.
    pub fn disconnect(&mut self) {
        // Dropping the framed stream closes the socket.
        let had_socket = self.framed.take().is_some();

        if self.connected {
            self.connected = false;
            self.last_disconnected_at = Some(OffsetDateTime::now_utc());
            debug!(endpoint = %self.endpoint, "Miner disconnected");
        } else if had_socket {
            trace!(endpoint = %self.endpoint, "Closed socket of a connection that was not up");
        } else {
            trace!(endpoint = %self.endpoint, "Miner connection still down");
        }
    }

    /// Write one line, appending the newline delimiter.
    pub async fn send_line(&mut self, line: &str) -> RpcResult<()> {
        let framed = self.framed.as_mut().ok_or(RpcError::NotConnected)?;

        trace!(tx = %line, "Sending message");

        if let Err(e) = framed.send(line).await {
            self.disconnect();
            return Err(RpcError::ConnectionLost(e));
        }

        Ok(())
    }

    /// Read the next non-empty line, waiting no later than `deadline`.
    ///
    /// Returns `Ok(None)` when the deadline passes first. The partially
    /// received bytes stay buffered for the next call.
    pub async fn recv_line(&mut self, deadline: Instant) -> RpcResult<Option<String>> {
        loop {
            let framed = self.framed.as_mut().ok_or(RpcError::NotConnected)?;

            let next = match timeout_at(deadline, framed.next()).await {
                Ok(next) => next,
                Err(_) => return Ok(None),
            };

            match next {
                Some(Ok(Frame::Line(line))) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    trace!(rx = %line, "Received message");
                    return Ok(Some(line.to_string()));
                }
                Some(Ok(Frame::Undecodable(reason))) => {
                    warn!(endpoint = %self.endpoint, %reason, "Dropped undecodable line");
                    return Err(RpcError::InvalidMessage(reason));
                }
                Some(Err(e)) => {
                    self.disconnect();
                    return Err(RpcError::ConnectionLost(e));
                }
                None => {
                    self.disconnect();
                    return Err(RpcError::ConnectionLost(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "connection closed by miner",
                    )));
                }
            }
        }
    }
}

impl Transport<TcpStream> {
    /// Open the TCP connection.
    ///
    /// The handshake is bounded by [`CONNECT_TIMEOUT`]. On failure the
    /// disconnect path runs and the error is returned as
    /// [`RpcError::ConnectError`].
    pub async fn connect(&mut self) -> RpcResult<()> {
        if self.framed.is_some() {
            self.disconnect();
        }

        debug!(endpoint = %self.endpoint, "Connecting to miner");

        let addr = (self.endpoint.host.as_str(), self.endpoint.port);
        let result = match timeout(CONNECT_TIMEOUT, TcpStream::connect(addr)).await {
            Ok(result) => result,
            Err(_) => Err(io::Error::new(
                io::ErrorKind::TimedOut,
                "connection attempt timed out",
            )),
        };

        match result {
            Ok(stream) => {
                self.framed = Some(Framed::new(stream, codec()));
                self.connected = true;
                self.last_disconnected_at = None;
                debug!(endpoint = %self.endpoint, "Miner connected");
                Ok(())
            }
            Err(source) => {
                self.disconnect();
                Err(RpcError::ConnectError {
                    endpoint: self.endpoint.to_string(),
                    source,
                })
            }
        }
    }
}
