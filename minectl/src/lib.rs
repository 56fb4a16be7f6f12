//! Query and control mining processes through their network APIs.
//!
//! The heart of the crate is [`ethminer`], a line-delimited JSON-RPC client
//! for ethminer-compatible processes. [`nbminer`] covers NBMiner's REST API.
//! Both are reachable through the [`miner::Miner`] trait, and a
//! [`session::Session`] holds the set of miners named in the
//! [`config::Config`].

pub mod config;
pub mod display;
pub mod error;
pub mod ethminer;
pub mod miner;
pub mod nbminer;
pub mod session;
pub mod tracing;
pub mod types;

pub use error::{Error, Result};
