//! Terminal formatting of miner status and pools.
//!
//! Colors come from `colored`, which honors `NO_COLOR` and the override set
//! by `--no-color`.

use colored::Colorize;

use crate::session::MinerStats;
use crate::types::{Pool, Stats};

/// `HH:MM` from a runtime in seconds.
pub fn format_runtime(secs: u64) -> String {
    format!("{:02}:{:02}", secs / 3600, (secs / 60) % 60)
}

/// Status of every queried miner, separated by blank lines.
///
/// Each miner is prefixed with its name only when more than one is shown.
pub fn status_report(miners: &[MinerStats]) -> String {
    let named = miners.len() > 1;
    miners
        .iter()
        .map(|miner| {
            let name = named.then_some(miner.name.as_str());
            status(name, miner.stats.as_ref())
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Two-line status of one miner: runtime and shares, then hashrates.
pub fn status(name: Option<&str>, stats: Option<&Stats>) -> String {
    let prefix = name
        .map(|name| format!("{} - ", format!("Miner {}", name).bold()))
        .unwrap_or_default();

    let Some(stats) = stats else {
        return format!("{}Connection Error", prefix);
    };

    let mut summary = vec![
        format_runtime(stats.runtime_secs).cyan().to_string(),
        format!("A{}", stats.shares_accepted).green().bold().to_string(),
    ];
    if stats.shares_rejected > 0 {
        summary.push(format!("R{}", stats.shares_rejected).yellow().bold().to_string());
    }
    if stats.shares_failed > 0 {
        summary.push(format!("F{}", stats.shares_failed).red().bold().to_string());
    }
    if stats.shares_accepted > 0 {
        let accepted = stats.shares_accepted as f64;
        if stats.shares_rejected > 0 {
            let pct = stats.shares_rejected as f64 / accepted * 100.0;
            summary.push(format!("R{:.2}%", pct).yellow().bold().to_string());
        }
        if stats.shares_failed > 0 {
            let pct = stats.shares_failed as f64 / accepted * 100.0;
            summary.push(format!("F{:.2}%", pct).red().bold().to_string());
        }
    }

    let mut hashrates = format!("{:.2}Mh/s", stats.hashrate).cyan().bold().to_string();
    if stats.devices.len() > 1 {
        let devices: Vec<_> = stats
            .devices
            .iter()
            .map(|dev| {
                format!(
                    "{} {}",
                    format!("{:.2}Mh/s", dev.hashrate).cyan().bold(),
                    format!("{}C", dev.core_temp).red()
                )
            })
            .collect();
        hashrates.push_str("  ");
        hashrates.push_str(&devices.join(" "));
    }

    format!("{}{}\n{}", prefix, summary.join(" "), hashrates)
}

/// Pool list of one miner under a `-- Miner {name} --` heading.
///
/// Pools are numbered by position; the active one is marked with `* `.
pub fn pool_list(name: &str, pools: &[Pool]) -> String {
    let mut lines = vec![format!("-- Miner {} --", name)];
    lines.extend(pools.iter().enumerate().map(|(i, pool)| {
        let marker = if pool.active { "* " } else { "" };
        format!("{}[{}] {}", marker, i, pool.uri())
    }));
    lines.join("\n")
}
