//! Common error types for minectl.
//!
//! Protocol-level failures from each miner API keep their own error type;
//! this enum attaches the operation that was being attempted so the CLI can
//! print a useful message.

use thiserror::Error;

use crate::ethminer::RpcError;

/// Main error type for minectl operations.
#[derive(Error, Debug)]
pub enum Error {
    /// A request to an ethminer-compatible API failed.
    #[error("{operation}: {source}")]
    Ethminer {
        operation: String,
        #[source]
        source: RpcError,
    },

    /// A request to an NBMiner REST API failed.
    #[error("{operation}: {source}")]
    NbMiner {
        operation: String,
        #[source]
        source: reqwest::Error,
    },

    /// An NBMiner API was used before `connect()`.
    #[error("{0}: not connected")]
    NbMinerNotConnected(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration file is not valid TOML or has the wrong shape
    #[error("Failed to parse configuration: {0}")]
    Toml(#[from] toml::de::Error),

    /// No miner with the requested name
    #[error("No such miner: {0}")]
    UnknownMiner(String),
}

impl Error {
    /// Wrap an RPC failure with the operation it interrupted.
    pub fn ethminer(operation: impl Into<String>, source: RpcError) -> Self {
        Error::Ethminer {
            operation: operation.into(),
            source,
        }
    }

    /// The underlying RPC error, if this came from an ethminer API.
    pub fn rpc(&self) -> Option<&RpcError> {
        match self {
            Error::Ethminer { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Convenience type alias for Results using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
