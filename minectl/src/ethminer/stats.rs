//! Shaping of `miner_getstat1` results.
//!
//! The result is a Claymore-compatible positional array of strings:
//!
//! ```text
//! [0] version             "0.19.0"
//! [1] runtime, minutes    "120"
//! [2] total;acc;rej       "1500;10;2"        hashrate in kH/s
//! [3] per-GPU hashrates   "1500;1600"        kH/s, `off` when paused
//! [4] (dual mining)       ""
//! [5] (dual mining)       ""
//! [6] temp;fan pairs      "45;60;46;61"
//! [7] active pool         "eu1.ethermine.org:4444"
//! [8] failed;switches     "2;1"
//! ```

use std::str::FromStr;

use serde_json::Value;

use super::error::{RpcError, RpcResult};
use crate::types::{DeviceStats, Stats};

/// Raw hashrate units per MH/s.
const KHS_PER_MHS: f64 = 1000.0;

/// Build [`Stats`] from a `miner_getstat1` result.
pub fn parse_getstat1(result: &Value) -> RpcResult<Stats> {
    let fields = result
        .as_array()
        .ok_or_else(|| invalid("statistics result not an array".to_string()))?;

    let at = |index: usize| field(fields, index);

    let version = at(0)?.to_string();
    let runtime_minutes: u64 = parse_number(at(1)?, "runtime")?;
    let runtime_secs = runtime_minutes
        .checked_mul(60)
        .ok_or_else(|| invalid(format!("runtime out of range: {} minutes", runtime_minutes)))?;

    let totals = split(at(2)?);
    let hashrate: f64 = parse_number(nth(&totals, 0, "total hashrate")?, "total hashrate")?;
    let shares_accepted = parse_number(nth(&totals, 1, "accepted shares")?, "accepted shares")?;
    let shares_rejected = parse_number(nth(&totals, 2, "rejected shares")?, "rejected shares")?;

    let device_hashrates = split(at(3)?);
    let temps_and_fans = split(at(6)?);
    let devices = device_hashrates
        .iter()
        .zip(temps_and_fans.chunks_exact(2))
        .map(|(rate, pair)| -> RpcResult<DeviceStats> {
            Ok(DeviceStats {
                hashrate: parse_device_hashrate(rate)? / KHS_PER_MHS,
                core_temp: parse_number(pair[0], "device temperature")?,
                fan: parse_number(pair[1], "device fan speed")?,
                ..Default::default()
            })
        })
        .collect::<RpcResult<Vec<_>>>()?;

    let active_pool = at(7)?.to_string();

    let status = split(at(8)?);
    let shares_failed = parse_number(nth(&status, 0, "failed shares")?, "failed shares")?;
    let pool_switches = parse_number(nth(&status, 1, "pool switches")?, "pool switches")?;

    Ok(Stats {
        version,
        runtime_secs,
        hashrate: hashrate / KHS_PER_MHS,
        shares_accepted,
        shares_rejected,
        shares_failed,
        devices,
        active_pool: Some(active_pool),
        pool_switches: Some(pool_switches),
    })
}

fn field(fields: &[Value], index: usize) -> RpcResult<&str> {
    fields
        .get(index)
        .ok_or_else(|| invalid(format!("statistics result too short, no field {}", index)))?
        .as_str()
        .ok_or_else(|| invalid(format!("statistics field {} not a string", index)))
}

fn invalid(msg: String) -> RpcError {
    RpcError::InvalidMessage(msg)
}

/// Split a `;`-separated field. An empty field has no entries.
fn split(field: &str) -> Vec<&str> {
    if field.trim().is_empty() {
        Vec::new()
    } else {
        field.split(';').map(str::trim).collect()
    }
}

fn nth<'a>(parts: &[&'a str], index: usize, what: &str) -> RpcResult<&'a str> {
    parts
        .get(index)
        .copied()
        .ok_or_else(|| invalid(format!("missing {}", what)))
}

fn parse_number<T: FromStr>(s: &str, what: &str) -> RpcResult<T> {
    s.parse()
        .map_err(|_| invalid(format!("{} not a number: {:?}", what, s)))
}

fn parse_device_hashrate(s: &str) -> RpcResult<f64> {
    if s == "off" {
        return Ok(0.0);
    }
    parse_number(s, "device hashrate")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Value {
        json!([
            "1.2.3",
            "120",
            "1500;10;2",
            "1500;1600",
            "",
            "",
            "45;60;46;61",
            "pool0",
            "2;1",
        ])
    }

    #[test]
    fn test_parse_reference_sample() {
        let stats = parse_getstat1(&sample()).unwrap();

        assert_eq!(stats.version, "1.2.3");
        assert_eq!(stats.runtime_secs, 7200);
        assert_eq!(stats.hashrate, 1.5);
        assert_eq!(stats.shares_accepted, 10);
        assert_eq!(stats.shares_rejected, 2);
        assert_eq!(stats.shares_failed, 2);
        assert_eq!(stats.pool_switches, Some(1));
        assert_eq!(stats.active_pool.as_deref(), Some("pool0"));

        assert_eq!(stats.devices.len(), 2);
        assert_eq!(stats.devices[0].hashrate, 1.5);
        assert_eq!(stats.devices[1].hashrate, 1.6);
        assert_eq!((stats.devices[0].core_temp, stats.devices[0].fan), (45, 60));
        assert_eq!((stats.devices[1].core_temp, stats.devices[1].fan), (46, 61));
    }

    #[test]
    fn test_device_hashrate_divided_by_1000() {
        let mut result = sample();
        result[3] = json!("1500000;31250");

        let stats = parse_getstat1(&result).unwrap();
        assert_eq!(stats.devices[0].hashrate, 1500.0);
        assert_eq!(stats.devices[1].hashrate, 31.25);
    }

    #[test]
    fn test_paused_device_reports_off() {
        let mut result = sample();
        result[3] = json!("off;1600");

        let stats = parse_getstat1(&result).unwrap();
        assert_eq!(stats.devices[0].hashrate, 0.0);
        assert_eq!(stats.devices[1].hashrate, 1.6);
    }

    #[test]
    fn test_no_devices() {
        let mut result = sample();
        result[3] = json!("");
        result[6] = json!("");

        let stats = parse_getstat1(&result).unwrap();
        assert!(stats.devices.is_empty());
    }

    #[test]
    fn test_devices_stop_at_shorter_list() {
        let mut result = sample();
        result[6] = json!("45;60");

        let stats = parse_getstat1(&result).unwrap();
        assert_eq!(stats.devices.len(), 1);
    }

    #[test]
    fn test_too_short() {
        let result = json!(["1.2.3", "120", "1500;10;2"]);
        let err = parse_getstat1(&result).unwrap_err();
        assert!(matches!(err, RpcError::InvalidMessage(_)));
    }

    #[test]
    fn test_not_an_array() {
        let err = parse_getstat1(&json!({"version": "1"})).unwrap_err();
        assert!(matches!(err, RpcError::InvalidMessage(_)));
    }

    #[test]
    fn test_bad_number() {
        let mut result = sample();
        result[1] = json!("two hours");

        match parse_getstat1(&result) {
            Err(RpcError::InvalidMessage(msg)) => assert!(msg.contains("runtime")),
            other => panic!("Expected invalid message, got {:?}", other),
        }
    }

    #[test]
    fn test_runtime_out_of_range() {
        let mut result = sample();
        result[1] = json!("18446744073709551615");

        match parse_getstat1(&result) {
            Err(RpcError::InvalidMessage(msg)) => assert!(msg.contains("runtime out of range")),
            other => panic!("Expected invalid message, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_share_counts() {
        let mut result = sample();
        result[2] = json!("1500");

        let err = parse_getstat1(&result).unwrap_err();
        assert!(matches!(err, RpcError::InvalidMessage(_)));
    }
}
