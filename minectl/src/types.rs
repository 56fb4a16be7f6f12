//! Normalized records shared by every miner API.
//!
//! Each API reports status in its own shape; the clients translate into
//! these types so the session and display code never care which miner
//! software is on the other end.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Miner status snapshot.
///
/// Recomputed on every query, never cached.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Stats {
    pub version: String,
    pub runtime_secs: u64,
    /// Total hashrate in MH/s.
    pub hashrate: f64,
    pub shares_accepted: u64,
    pub shares_rejected: u64,
    pub shares_failed: u64,
    pub devices: Vec<DeviceStats>,
    /// Label of the pool currently mined on, when the API reports it.
    pub active_pool: Option<String>,
    pub pool_switches: Option<u64>,
}

/// Per-device status.
///
/// The first three fields come from every API. The rest are only reported
/// by NBMiner.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct DeviceStats {
    /// Hashrate in MH/s.
    pub hashrate: f64,
    pub core_temp: i64,
    /// Fan speed in percent.
    pub fan: i64,
    pub name: Option<String>,
    pub pci_bus_id: Option<i64>,
    pub accepted_shares: Option<u64>,
    pub rejected_shares: Option<u64>,
    pub invalid_shares: Option<u64>,
    pub core_clock: Option<i64>,
    pub memory_clock: Option<i64>,
    pub core_usage: Option<i64>,
    pub memory_usage: Option<i64>,
    pub lhr_target: Option<f64>,
    pub mem_temp: Option<i64>,
    pub power: Option<i64>,
}

/// A configured pool connection.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Pool {
    pub index: u32,
    pub active: bool,
    pub scheme: String,
    pub host: String,
    pub port: u16,
}

impl Pool {
    /// `scheme://host:port`
    pub fn uri(&self) -> String {
        format!("{}://{}:{}", self.scheme, self.host, self.port)
    }
}

/// Which devices a per-device control operation applies to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeviceSelection {
    All,
    Index(u32),
}

impl DeviceSelection {
    /// Parse a CLI device argument: `all`, `-1`, or a device index.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "all" | "-1" => Some(DeviceSelection::All),
            _ => s.parse().ok().map(DeviceSelection::Index),
        }
    }
}

impl fmt::Display for DeviceSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceSelection::All => write!(f, "all GPUs"),
            DeviceSelection::Index(i) => write!(f, "GPU {}", i),
        }
    }
}
