//! ethminer API operations.
//!
//! Each operation is one request: a method name, a params shape, a policy
//! for what result to expect, and possibly some shaping of that result.
//! Failures carry a label naming the operation.

use serde_json::{Value, json};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

use super::error::RpcError;
use super::rpc::RpcClient;
use super::stats::parse_getstat1;
use super::transport::{Endpoint, Transport};
use crate::error::{Error, Result};
use crate::tracing::prelude::*;
use crate::types::{DeviceSelection, Pool, Stats};

/// Client for one ethminer-compatible API endpoint.
pub struct EthminerClient<S = TcpStream> {
    rpc: RpcClient<S>,
    /// Sent with `api_authorize` after every connect, when set.
    password: Option<String>,
}

impl EthminerClient<TcpStream> {
    /// Create a client for `host:port`. Call [`connect`](Self::connect)
    /// before issuing requests.
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            rpc: RpcClient::new(Transport::new(endpoint)),
            password: None,
        }
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Open the connection, authorizing if a password is configured.
    pub async fn connect(&mut self) -> Result<()> {
        self.rpc
            .transport_mut()
            .connect()
            .await
            .map_err(|source| Error::ethminer("Failed to connect", source))?;

        if let Some(password) = self.password.clone() {
            self.authorize(&password).await?;
        }
        Ok(())
    }
}

impl<S> EthminerClient<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wrap an existing RPC client.
    pub fn with_rpc(rpc: RpcClient<S>) -> Self {
        Self {
            rpc,
            password: None,
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        self.rpc.transport().endpoint()
    }

    pub fn is_connected(&self) -> bool {
        self.rpc.transport().is_connected()
    }

    pub fn disconnect(&mut self) {
        self.rpc.transport_mut().disconnect();
    }

    /// One round trip, with failures labeled by `operation`.
    async fn call(
        &mut self,
        operation: impl Into<String>,
        method: &str,
        params: Option<Value>,
        expected: Option<Value>,
    ) -> Result<Value> {
        self.rpc
            .call(method, params, expected.as_ref())
            .await
            .map_err(|source| Error::ethminer(operation, source))
    }

    pub async fn authorize(&mut self, password: &str) -> Result<()> {
        self.call(
            "Failed to authorize",
            "api_authorize",
            Some(json!({ "psw": password })),
            Some(json!(true)),
        )
        .await?;
        Ok(())
    }

    pub async fn ping(&mut self) -> Result<()> {
        self.call("Failed to ping", "miner_ping", None, Some(json!("pong")))
            .await?;
        Ok(())
    }

    pub async fn get_stats(&mut self) -> Result<Stats> {
        const OPERATION: &str = "Failed to get statistics";

        let result = self.call(OPERATION, "miner_getstat1", None, None).await?;
        parse_getstat1(&result).map_err(|source| Error::ethminer(OPERATION, source))
    }

    /// Detailed statistics, passed through as returned by the miner.
    pub async fn get_detailed_stats(&mut self) -> Result<Value> {
        self.call(
            "Failed to get detailed statistics",
            "miner_getstatdetail",
            None,
            None,
        )
        .await
    }

    pub async fn restart(&mut self) -> Result<()> {
        self.call(
            "Failed to restart miner",
            "miner_restart",
            None,
            Some(json!(true)),
        )
        .await?;
        Ok(())
    }

    pub async fn shuffle_scrambler(&mut self) -> Result<()> {
        self.call(
            "Failed to shuffle scramble nonce",
            "miner_shuffle",
            None,
            Some(json!(true)),
        )
        .await?;
        Ok(())
    }

    pub async fn get_scrambler_info(&mut self) -> Result<Value> {
        self.call(
            "Failed to get scrambler info",
            "miner_getscramblerinfo",
            None,
            None,
        )
        .await
    }

    pub async fn set_scrambler_info(
        &mut self,
        nonce_scrambler: u64,
        segment_width: u32,
    ) -> Result<Value> {
        self.call(
            "Failed to set scrambler info",
            "miner_setscramblerinfo",
            Some(json!({
                "noncescrambler": nonce_scrambler,
                "segmentwidth": segment_width,
            })),
            None,
        )
        .await
    }

    pub async fn get_pools(&mut self) -> Result<Vec<Pool>> {
        const OPERATION: &str = "Failed to get pools";

        let result = self
            .call(OPERATION, "miner_getconnections", None, None)
            .await?;
        serde_json::from_value(result).map_err(|e| {
            Error::ethminer(
                OPERATION,
                RpcError::InvalidMessage(format!("bad connection list: {}", e)),
            )
        })
    }

    pub async fn set_active_pool(&mut self, index: u32) -> Result<()> {
        self.call(
            "Failed to set active pool",
            "miner_setactiveconnection",
            Some(json!({ "index": index })),
            Some(json!(true)),
        )
        .await?;
        Ok(())
    }

    /// Pause or resume mining on one device or all of them.
    ///
    /// With [`DeviceSelection::All`], the device list comes from a stats
    /// query and one request is issued per device. Every device is
    /// attempted even if an earlier one fails; the first failure is
    /// returned once all have been tried.
    pub async fn pause_gpu(&mut self, devices: DeviceSelection, pause: bool) -> Result<()> {
        let indices = self.resolve_devices(devices).await?;
        let verb = if pause { "pause" } else { "resume" };

        let mut first_error = None;
        for index in indices {
            let result = self
                .call(
                    format!("Failed to {} GPU {}", verb, index),
                    "miner_pausegpu",
                    Some(json!({ "index": index, "pause": pause })),
                    Some(json!(true)),
                )
                .await;

            if let Err(e) = result {
                warn!(device = index, error = %e, "Device request failed");
                first_error.get_or_insert(e);
            }
        }

        first_error.map_or(Ok(()), Err)
    }

    pub async fn set_verbosity(&mut self, verbosity: u32) -> Result<()> {
        self.call(
            "Failed to set verbosity",
            "miner_setverbosity",
            Some(json!({ "verbosity": verbosity })),
            Some(json!(true)),
        )
        .await?;
        Ok(())
    }

    /// Set the LHR tune value on one device or all of them.
    ///
    /// Device resolution and failure handling are as for
    /// [`pause_gpu`](Self::pause_gpu).
    pub async fn set_lhr_tune(&mut self, devices: DeviceSelection, tune: i64) -> Result<()> {
        let indices = self.resolve_devices(devices).await?;

        let mut first_error = None;
        for index in indices {
            let result = self
                .call(
                    format!("Failed to set LHR tune for GPU {}", index),
                    "miner_setlhrtune",
                    Some(json!({ "index": index, "tune": tune })),
                    Some(json!(true)),
                )
                .await;

            if let Err(e) = result {
                warn!(device = index, error = %e, "Device request failed");
                first_error.get_or_insert(e);
            }
        }

        first_error.map_or(Ok(()), Err)
    }

    async fn resolve_devices(&mut self, devices: DeviceSelection) -> Result<Vec<u32>> {
        match devices {
            DeviceSelection::Index(index) => Ok(vec![index]),
            DeviceSelection::All => {
                let stats = self.get_stats().await?;
                Ok((0..stats.devices.len() as u32).collect())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ethminer::messages::{Request, Response};
    use futures::{SinkExt, StreamExt};
    use tokio::io::DuplexStream;
    use tokio::sync::mpsc;
    use tokio_util::codec::{Framed, LinesCodec};

    /// Scripted miner: answers each request with the closure's response and
    /// reports every request it saw.
    fn client_with_miner<F>(mut answer: F) -> (EthminerClient<DuplexStream>, mpsc::UnboundedReceiver<Request>)
    where
        F: FnMut(&Request) -> Response + Send + 'static,
    {
        let (client, server) = tokio::io::duplex(8192);
        let (seen_tx, seen_rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            let mut peer = Framed::new(server, LinesCodec::new());
            while let Some(Ok(line)) = peer.next().await {
                let req: Request = serde_json::from_str(&line).unwrap();
                let response = answer(&req);
                let _ = seen_tx.send(req);
                if peer.send(serde_json::to_string(&response).unwrap()).await.is_err() {
                    break;
                }
            }
        });

        let transport = Transport::from_stream(Endpoint::new("rig", 3333), client);
        (EthminerClient::with_rpc(RpcClient::new(transport)), seen_rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<Request>) -> Vec<Request> {
        let mut out = Vec::new();
        while let Ok(req) = rx.try_recv() {
            out.push(req);
        }
        out
    }

    fn getstat1(devices: usize) -> Value {
        let rates = vec!["30000"; devices].join(";");
        let temps = vec!["60;70"; devices].join(";");
        json!([
            "0.19.0",
            "15",
            "90000;5;0",
            rates,
            "",
            "",
            temps,
            "eu1.ethermine.org:4444",
            "0;0",
        ])
    }

    #[tokio::test]
    async fn test_ping() {
        let (mut client, mut seen) = client_with_miner(|req| Response::success(req.id, json!("pong")));

        client.ping().await.unwrap();

        let reqs = drain(&mut seen);
        assert_eq!(reqs.len(), 1);
        assert_eq!(reqs[0].method, "miner_ping");
        assert_eq!(reqs[0].params, None);
    }

    #[tokio::test]
    async fn test_authorize_rejected() {
        let (mut client, _seen) =
            client_with_miner(|req| Response::failure(req.id, -401, "Invalid password"));

        let err = client.authorize("hunter2").await.unwrap_err();

        assert_eq!(err.to_string(), "Failed to authorize: (-401): Invalid password");
        assert!(matches!(err.rpc(), Some(RpcError::Protocol { code: -401, .. })));
    }

    #[tokio::test]
    async fn test_get_stats() {
        let (mut client, _seen) = client_with_miner(|req| Response::success(req.id, getstat1(3)));

        let stats = client.get_stats().await.unwrap();

        assert_eq!(stats.version, "0.19.0");
        assert_eq!(stats.runtime_secs, 900);
        assert_eq!(stats.hashrate, 90.0);
        assert_eq!(stats.devices.len(), 3);
        assert_eq!(stats.devices[2].hashrate, 30.0);
    }

    #[tokio::test]
    async fn test_get_stats_bad_shape_is_labeled() {
        let (mut client, _seen) = client_with_miner(|req| Response::success(req.id, json!(42)));

        let err = client.get_stats().await.unwrap_err();
        assert!(err.to_string().starts_with("Failed to get statistics"));
        assert!(matches!(err.rpc(), Some(RpcError::InvalidMessage(_))));
    }

    #[tokio::test]
    async fn test_get_pools() {
        let (mut client, _seen) = client_with_miner(|req| {
            Response::success(
                req.id,
                json!([
                    {"index": 0, "active": false, "scheme": "stratum+tcp", "host": "a.example", "port": 4444},
                    {"index": 1, "active": true, "scheme": "stratum+ssl", "host": "b.example", "port": 5555},
                ]),
            )
        });

        let pools = client.get_pools().await.unwrap();

        assert_eq!(pools.len(), 2);
        assert!(pools[1].active);
        assert_eq!(pools[1].uri(), "stratum+ssl://b.example:5555");
    }

    #[tokio::test]
    async fn test_set_scrambler_info_params() {
        let (mut client, mut seen) = client_with_miner(|req| {
            Response::success(req.id, json!({"noncescrambler": 16, "segmentwidth": 40}))
        });

        let result = client.set_scrambler_info(16, 40).await.unwrap();
        assert_eq!(result["segmentwidth"], 40);

        let reqs = drain(&mut seen);
        assert_eq!(reqs[0].method, "miner_setscramblerinfo");
        assert_eq!(
            reqs[0].params,
            Some(json!({"noncescrambler": 16, "segmentwidth": 40}))
        );
    }

    #[tokio::test]
    async fn test_restart_expects_true() {
        let (mut client, _seen) = client_with_miner(|req| Response::success(req.id, json!(false)));

        let err = client.restart().await.unwrap_err();
        assert!(matches!(err.rpc(), Some(RpcError::UnexpectedResult { .. })));
    }

    #[tokio::test]
    async fn test_pause_single_device() {
        let (mut client, mut seen) = client_with_miner(|req| Response::success(req.id, json!(true)));

        client.pause_gpu(DeviceSelection::Index(2), true).await.unwrap();

        let reqs = drain(&mut seen);
        assert_eq!(reqs.len(), 1);
        assert_eq!(reqs[0].method, "miner_pausegpu");
        assert_eq!(reqs[0].params, Some(json!({"index": 2, "pause": true})));
    }

    #[tokio::test]
    async fn test_pause_all_devices() {
        let (mut client, mut seen) = client_with_miner(|req| match req.method.as_str() {
            "miner_getstat1" => Response::success(req.id, getstat1(4)),
            _ => Response::success(req.id, json!(true)),
        });

        client.pause_gpu(DeviceSelection::All, true).await.unwrap();

        let reqs = drain(&mut seen);
        assert_eq!(reqs[0].method, "miner_getstat1");

        let pauses: Vec<_> = reqs[1..]
            .iter()
            .map(|r| (r.method.as_str(), r.params.clone().unwrap()))
            .collect();
        assert_eq!(pauses.len(), 4);
        for (i, (method, params)) in pauses.iter().enumerate() {
            assert_eq!(*method, "miner_pausegpu");
            assert_eq!(*params, json!({"index": i, "pause": true}));
        }
    }

    #[tokio::test]
    async fn test_pause_all_continues_past_failure() {
        let (mut client, mut seen) = client_with_miner(|req| match req.method.as_str() {
            "miner_getstat1" => Response::success(req.id, getstat1(3)),
            _ if req.params.as_ref().unwrap()["index"] == 1 => {
                Response::failure(req.id, -1, "GPU busy")
            }
            _ => Response::success(req.id, json!(true)),
        });

        let err = client.pause_gpu(DeviceSelection::All, false).await.unwrap_err();
        assert_eq!(err.to_string(), "Failed to resume GPU 1: (-1): GPU busy");

        let reqs = drain(&mut seen);
        let indices: Vec<_> = reqs[1..]
            .iter()
            .map(|r| r.params.as_ref().unwrap()["index"].clone())
            .collect();
        assert_eq!(indices, vec![json!(0), json!(1), json!(2)]);
    }

    #[tokio::test]
    async fn test_lhr_tune_all_devices() {
        let (mut client, mut seen) = client_with_miner(|req| match req.method.as_str() {
            "miner_getstat1" => Response::success(req.id, getstat1(2)),
            _ => Response::success(req.id, json!(true)),
        });

        client.set_lhr_tune(DeviceSelection::All, 72).await.unwrap();

        let reqs = drain(&mut seen);
        assert_eq!(reqs.len(), 3);
        assert_eq!(reqs[1].params, Some(json!({"index": 0, "tune": 72})));
        assert_eq!(reqs[2].params, Some(json!({"index": 1, "tune": 72})));
    }

    #[tokio::test]
    async fn test_all_devices_needs_stats() {
        let (mut client, mut seen) =
            client_with_miner(|req| Response::failure(req.id, -32601, "Method not found"));

        let err = client.set_lhr_tune(DeviceSelection::All, 10).await.unwrap_err();

        assert!(err.to_string().starts_with("Failed to get statistics"));
        assert_eq!(drain(&mut seen).len(), 1);
    }

    #[tokio::test]
    async fn test_disconnected_client_fails_fast() {
        let (mut client, _seen) = client_with_miner(|req| Response::success(req.id, json!(true)));
        client.disconnect();
        assert!(!client.is_connected());

        let err = client.set_verbosity(2).await.unwrap_err();
        assert!(matches!(err.rpc(), Some(RpcError::NotConnected)));
    }
}
