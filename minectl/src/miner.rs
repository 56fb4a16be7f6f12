//! Miner capabilities.
//!
//! Every supported miner API can connect and report statistics. Control
//! operations are an optional capability, reached through
//! [`Miner::control`], so callers ask what a miner can do instead of
//! branching on its API type.

use async_trait::async_trait;
use serde_json::Value;
use tokio::net::TcpStream;

use crate::error::Result;
use crate::ethminer::EthminerClient;
use crate::nbminer::NbMinerClient;
use crate::types::{DeviceSelection, Pool, Stats};

/// A miner reachable through some network API.
#[async_trait]
pub trait Miner: Send {
    /// Short description of where the miner lives, for log messages.
    fn location(&self) -> String;

    async fn connect(&mut self) -> Result<()>;

    fn disconnect(&mut self);

    fn is_connected(&self) -> bool;

    /// Query current statistics. Never cached.
    async fn get_stats(&mut self) -> Result<Stats>;

    /// Control operations, if this API supports them.
    fn control(&mut self) -> Option<&mut dyn MinerControl> {
        None
    }
}

/// Operations that change or inspect miner state beyond statistics.
#[async_trait]
pub trait MinerControl: Send {
    async fn ping(&mut self) -> Result<()>;
    async fn restart(&mut self) -> Result<()>;
    async fn get_detailed_stats(&mut self) -> Result<Value>;
    async fn get_pools(&mut self) -> Result<Vec<Pool>>;
    async fn set_active_pool(&mut self, index: u32) -> Result<()>;
    async fn pause_gpu(&mut self, devices: DeviceSelection, pause: bool) -> Result<()>;
    async fn set_lhr_tune(&mut self, devices: DeviceSelection, tune: i64) -> Result<()>;
    async fn set_verbosity(&mut self, verbosity: u32) -> Result<()>;
    async fn shuffle_scrambler(&mut self) -> Result<()>;
    async fn get_scrambler_info(&mut self) -> Result<Value>;
    async fn set_scrambler_info(&mut self, nonce_scrambler: u64, segment_width: u32)
    -> Result<Value>;
}

#[async_trait]
impl Miner for EthminerClient<TcpStream> {
    fn location(&self) -> String {
        self.endpoint().to_string()
    }

    async fn connect(&mut self) -> Result<()> {
        Self::connect(self).await
    }

    fn disconnect(&mut self) {
        Self::disconnect(self)
    }

    fn is_connected(&self) -> bool {
        Self::is_connected(self)
    }

    async fn get_stats(&mut self) -> Result<Stats> {
        Self::get_stats(self).await
    }

    fn control(&mut self) -> Option<&mut dyn MinerControl> {
        Some(self)
    }
}

#[async_trait]
impl MinerControl for EthminerClient<TcpStream> {
    async fn ping(&mut self) -> Result<()> {
        Self::ping(self).await
    }

    async fn restart(&mut self) -> Result<()> {
        Self::restart(self).await
    }

    async fn get_detailed_stats(&mut self) -> Result<Value> {
        Self::get_detailed_stats(self).await
    }

    async fn get_pools(&mut self) -> Result<Vec<Pool>> {
        Self::get_pools(self).await
    }

    async fn set_active_pool(&mut self, index: u32) -> Result<()> {
        Self::set_active_pool(self, index).await
    }

    async fn pause_gpu(&mut self, devices: DeviceSelection, pause: bool) -> Result<()> {
        Self::pause_gpu(self, devices, pause).await
    }

    async fn set_lhr_tune(&mut self, devices: DeviceSelection, tune: i64) -> Result<()> {
        Self::set_lhr_tune(self, devices, tune).await
    }

    async fn set_verbosity(&mut self, verbosity: u32) -> Result<()> {
        Self::set_verbosity(self, verbosity).await
    }

    async fn shuffle_scrambler(&mut self) -> Result<()> {
        Self::shuffle_scrambler(self).await
    }

    async fn get_scrambler_info(&mut self) -> Result<Value> {
        Self::get_scrambler_info(self).await
    }

    async fn set_scrambler_info(
        &mut self,
        nonce_scrambler: u64,
        segment_width: u32,
    ) -> Result<Value> {
        Self::set_scrambler_info(self, nonce_scrambler, segment_width).await
    }
}

#[async_trait]
impl Miner for NbMinerClient {
    fn location(&self) -> String {
        self.url().to_string()
    }

    async fn connect(&mut self) -> Result<()> {
        Self::connect(self);
        Ok(())
    }

    fn disconnect(&mut self) {
        Self::disconnect(self)
    }

    fn is_connected(&self) -> bool {
        Self::is_connected(self)
    }

    async fn get_stats(&mut self) -> Result<Stats> {
        Self::get_stats(self).await
    }
}
