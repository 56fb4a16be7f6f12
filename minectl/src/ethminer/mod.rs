//! ethminer JSON-RPC API client.
//!
//! ethminer (and forks that kept its API) listen on a TCP port, usually
//! 3333, for newline-delimited JSON-RPC requests. The protocol is
//! request-then-wait: the client sends one request and reads lines until the
//! response with the same id arrives or a one-second deadline passes.
//!
//! # Layers
//!
//! - `codec`: newline framing that reports bad lines instead of failing.
//! - `transport`: the TCP socket and connection state.
//! - `rpc`: id assignment, the bounded receive loop, id correlation, and
//!   response validation.
//! - `client`: the method catalog, one function per API method.
//! - `stats`: shaping of `miner_getstat1`'s positional result.
//!
//! # Usage
//!
//! ```rust,ignore
//! use minectl::ethminer::{EthminerClient, Endpoint};
//!
//! let mut miner = EthminerClient::new(Endpoint::new("localhost", 3333));
//! miner.connect().await?;
//! let stats = miner.get_stats().await?;
//! println!("{:.2} MH/s", stats.hashrate);
//! ```

mod client;
mod codec;
mod error;
mod messages;
mod rpc;
mod stats;
mod transport;

pub use client::EthminerClient;
pub use error::{RpcError, RpcResult};
pub use messages::{ErrorObject, JSONRPC_VERSION, Request, Response};
pub use rpc::{RESPONSE_TIMEOUT, RpcClient, validate};
pub use stats::parse_getstat1;
pub use transport::{CONNECT_TIMEOUT, Endpoint, Transport};
