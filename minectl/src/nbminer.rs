//! NBMiner REST API client.
//!
//! NBMiner serves status as JSON over HTTP at `/api/v1/status`. Only
//! statistics are supported; NBMiner's control endpoints are not used.

use std::time::Duration;

use reqwest::Client as HttpClient;
use serde::Deserialize;
use time::OffsetDateTime;

use crate::error::{Error, Result};
use crate::tracing::prelude::*;
use crate::types::{DeviceStats, Stats};

/// Default API base URL.
pub const DEFAULT_URL: &str = "http://localhost:22333";

const API_V1_PATH: &str = "/api/v1";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(1);

/// Raw hashrate units (H/s) per MH/s.
const HS_PER_MHS: f64 = 1_000_000.0;

/// HTTP client for one NBMiner instance.
pub struct NbMinerClient {
    http: HttpClient,
    configured_url: String,
    /// Base URL while "connected". HTTP is stateless, so connecting only
    /// arms the client.
    url: Option<String>,
}

impl NbMinerClient {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            http: HttpClient::new(),
            configured_url: url.into(),
            url: None,
        }
    }

    pub fn url(&self) -> &str {
        &self.configured_url
    }

    pub fn connect(&mut self) {
        debug!(url = %self.configured_url, "Using NBMiner API");
        self.url = Some(self.configured_url.trim_end_matches('/').to_string());
    }

    pub fn disconnect(&mut self) {
        self.url = None;
    }

    pub fn is_connected(&self) -> bool {
        self.url.is_some()
    }

    /// Fetch and normalize the current status.
    pub async fn get_stats(&self) -> Result<Stats> {
        const OPERATION: &str = "Failed to get statistics";

        let base = self
            .url
            .as_deref()
            .ok_or_else(|| Error::NbMinerNotConnected(OPERATION.to_string()))?;
        let url = format!("{}{}/status", base, API_V1_PATH);

        let wrap = |source| Error::NbMiner {
            operation: OPERATION.to_string(),
            source,
        };

        let response = self
            .http
            .get(&url)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(wrap)?
            .error_for_status()
            .map_err(wrap)?;
        let status: Status = response.json().await.map_err(wrap)?;

        Ok(status.into_stats(OffsetDateTime::now_utc().unix_timestamp()))
    }
}

/// Body of `GET /api/v1/status`, limited to the fields we use.
#[derive(Debug, Deserialize)]
pub struct Status {
    pub version: String,
    /// Unix time the miner started.
    pub start_time: i64,
    pub miner: MinerStatus,
    pub stratum: StratumStatus,
}

#[derive(Debug, Deserialize)]
pub struct MinerStatus {
    pub devices: Vec<Device>,
    pub total_hashrate_raw: f64,
}

#[derive(Debug, Deserialize)]
pub struct StratumStatus {
    pub accepted_shares: u64,
    pub rejected_shares: u64,
    pub invalid_shares: u64,
}

#[derive(Debug, Deserialize)]
pub struct Device {
    #[serde(default)]
    pub info: Option<String>,
    #[serde(default)]
    pub pci_bus_id: Option<i64>,
    #[serde(default)]
    pub accepted_shares: Option<u64>,
    #[serde(default)]
    pub rejected_shares: Option<u64>,
    #[serde(default)]
    pub invalid_shares: Option<u64>,
    pub hashrate_raw: f64,
    #[serde(default)]
    pub core_clock: Option<i64>,
    #[serde(default)]
    pub mem_clock: Option<i64>,
    #[serde(default)]
    pub core_utilization: Option<i64>,
    #[serde(default)]
    pub mem_utilization: Option<i64>,
    #[serde(default)]
    pub lhr: Option<f64>,
    pub temperature: i64,
    #[serde(default, rename = "memTemperature")]
    pub mem_temperature: Option<i64>,
    pub fan: i64,
    #[serde(default)]
    pub power: Option<i64>,
}

impl Status {
    /// Normalize, computing runtime relative to `now` (unix seconds).
    pub fn into_stats(self, now: i64) -> Stats {
        let devices = self
            .miner
            .devices
            .into_iter()
            .map(|dev| DeviceStats {
                hashrate: dev.hashrate_raw / HS_PER_MHS,
                core_temp: dev.temperature,
                fan: dev.fan,
                name: dev.info,
                pci_bus_id: dev.pci_bus_id,
                accepted_shares: dev.accepted_shares,
                rejected_shares: dev.rejected_shares,
                invalid_shares: dev.invalid_shares,
                core_clock: dev.core_clock,
                memory_clock: dev.mem_clock,
                core_usage: dev.core_utilization,
                memory_usage: dev.mem_utilization,
                lhr_target: dev.lhr,
                mem_temp: dev.mem_temperature,
                power: dev.power,
            })
            .collect();

        Stats {
            version: self.version,
            runtime_secs: u64::try_from(now - self.start_time).unwrap_or(0),
            hashrate: self.miner.total_hashrate_raw / HS_PER_MHS,
            shares_accepted: self.stratum.accepted_shares,
            shares_rejected: self.stratum.rejected_shares,
            shares_failed: self.stratum.invalid_shares,
            devices,
            active_pool: None,
            pool_switches: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Json, Router, routing::get};
    use serde_json::{Value, json};
    use tokio::net::TcpListener;

    fn status_body(start_time: i64) -> Value {
        json!({
            "version": "42.2",
            "start_time": start_time,
            "reboot_times": 0,
            "miner": {
                "devices": [
                    {
                        "id": 0,
                        "info": "NVIDIA GeForce RTX 3070",
                        "pci_bus_id": 1,
                        "accepted_shares": 120,
                        "rejected_shares": 1,
                        "invalid_shares": 0,
                        "hashrate": "61.50 M",
                        "hashrate_raw": 61500000.0,
                        "core_clock": 1500,
                        "mem_clock": 7000,
                        "core_utilization": 100,
                        "mem_utilization": 95,
                        "lhr": 74.0,
                        "temperature": 63,
                        "memTemperature": 82,
                        "fan": 70,
                        "power": 120
                    },
                    {
                        "id": 1,
                        "info": "NVIDIA GeForce RTX 3060",
                        "pci_bus_id": 2,
                        "hashrate_raw": 48000000.0,
                        "temperature": 58,
                        "fan": 65
                    }
                ],
                "total_hashrate": "109.50 M",
                "total_hashrate_raw": 109500000.0
            },
            "stratum": {
                "accepted_shares": 200,
                "rejected_shares": 3,
                "invalid_shares": 1,
                "url": "eth.example:4444"
            }
        })
    }

    #[test]
    fn test_into_stats() {
        let status: Status = serde_json::from_value(status_body(1_000)).unwrap();
        let stats = status.into_stats(4_600);

        assert_eq!(stats.version, "42.2");
        assert_eq!(stats.runtime_secs, 3_600);
        assert_eq!(stats.hashrate, 109.5);
        assert_eq!(stats.shares_accepted, 200);
        assert_eq!(stats.shares_rejected, 3);
        assert_eq!(stats.shares_failed, 1);
        assert_eq!(stats.active_pool, None);

        assert_eq!(stats.devices.len(), 2);
        let first = &stats.devices[0];
        assert_eq!(first.hashrate, 61.5);
        assert_eq!(first.core_temp, 63);
        assert_eq!(first.fan, 70);
        assert_eq!(first.name.as_deref(), Some("NVIDIA GeForce RTX 3070"));
        assert_eq!(first.mem_temp, Some(82));
        assert_eq!(first.lhr_target, Some(74.0));

        let second = &stats.devices[1];
        assert_eq!(second.hashrate, 48.0);
        assert_eq!(second.power, None);
    }

    #[test]
    fn test_clock_skew_runtime_floors_at_zero() {
        let status: Status = serde_json::from_value(status_body(5_000)).unwrap();
        assert_eq!(status.into_stats(4_000).runtime_secs, 0);
    }

    #[tokio::test]
    async fn test_not_connected() {
        let client = NbMinerClient::new(DEFAULT_URL);
        let err = client.get_stats().await.unwrap_err();
        assert!(matches!(err, Error::NbMinerNotConnected(_)));
    }

    async fn serve(router: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_get_stats_over_http() {
        let start = OffsetDateTime::now_utc().unix_timestamp() - 120;
        let body = status_body(start);
        let router = Router::new().route(
            "/api/v1/status",
            get(move || {
                let body = body.clone();
                async move { Json(body) }
            }),
        );
        let url = serve(router).await;

        let mut client = NbMinerClient::new(format!("{}/", url));
        client.connect();
        let stats = client.get_stats().await.unwrap();

        assert_eq!(stats.hashrate, 109.5);
        assert!(stats.runtime_secs >= 120);
        assert_eq!(stats.devices.len(), 2);

        client.disconnect();
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn test_http_error_is_labeled() {
        let url = serve(Router::new()).await;

        let mut client = NbMinerClient::new(url);
        client.connect();
        let err = client.get_stats().await.unwrap_err();

        assert!(matches!(err, Error::NbMiner { .. }));
        assert!(err.to_string().starts_with("Failed to get statistics"));
    }
}
