//! The set of configured miners for one invocation.

use futures::future::join_all;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::miner::{Miner, MinerControl};
use crate::tracing::prelude::*;
use crate::types::Stats;

/// Selects every configured miner.
pub const ALL: &str = "all";

struct Entry {
    name: String,
    miner: Box<dyn Miner>,
    connect_error: Option<Error>,
}

impl Entry {
    fn usable(&self) -> bool {
        self.connect_error.is_none() && self.miner.is_connected()
    }
}

/// Miners chosen by [`Session::select`], in configuration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection(Vec<usize>);

/// Statistics for one miner; `None` when it could not be queried.
#[derive(Debug)]
pub struct MinerStats {
    pub name: String,
    pub stats: Option<Stats>,
}

/// Owned, ordered collection of miners.
pub struct Session {
    miners: Vec<Entry>,
}

impl Session {
    pub fn new(miners: impl IntoIterator<Item = (String, Box<dyn Miner>)>) -> Self {
        let miners = miners
            .into_iter()
            .map(|(name, miner)| Entry {
                name,
                miner,
                connect_error: None,
            })
            .collect();
        Self { miners }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config
                .miners
                .iter()
                .map(|miner| (miner.name.clone(), miner.build())),
        )
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.miners.iter().map(|entry| entry.name.as_str())
    }

    /// Resolve `all` or a miner name.
    pub fn select(&self, name: &str) -> Result<Selection> {
        if name == ALL {
            return Ok(Selection((0..self.miners.len()).collect()));
        }
        self.miners
            .iter()
            .position(|entry| entry.name == name)
            .map(|index| Selection(vec![index]))
            .ok_or_else(|| Error::UnknownMiner(name.to_string()))
    }

    fn selected_mut<'a>(
        &'a mut self,
        selection: &'a Selection,
    ) -> impl Iterator<Item = &'a mut Entry> + 'a {
        self.miners
            .iter_mut()
            .enumerate()
            .filter(move |(index, _)| selection.0.contains(index))
            .map(|(_, entry)| entry)
    }

    /// Connect every selected miner concurrently.
    ///
    /// A failure is recorded against that miner and does not affect the
    /// others. Returns the number of miners that failed.
    pub async fn connect(&mut self, selection: &Selection) -> usize {
        let attempts = self.selected_mut(selection).map(|entry| async move {
            match entry.miner.connect().await {
                Ok(()) => {
                    debug!(miner = %entry.name, at = %entry.miner.location(), "Connected");
                    entry.connect_error = None;
                }
                Err(e) => {
                    info!(miner = %entry.name, error = %e, "Connection failed");
                    entry.miner.disconnect();
                    entry.connect_error = Some(e);
                }
            }
        });
        join_all(attempts).await;

        self.selected_mut(selection)
            .filter(|entry| entry.connect_error.is_some())
            .count()
    }

    /// The error recorded by the last [`connect`](Self::connect) of `name`.
    pub fn connect_error(&self, name: &str) -> Option<&Error> {
        self.miners
            .iter()
            .find(|entry| entry.name == name)
            .and_then(|entry| entry.connect_error.as_ref())
    }

    /// Query every selected miner concurrently.
    pub async fn stats(&mut self, selection: &Selection) -> Vec<MinerStats> {
        let queries = self.selected_mut(selection).map(|entry| async move {
            let stats = if entry.usable() {
                entry
                    .miner
                    .get_stats()
                    .await
                    .inspect_err(|e| info!(miner = %entry.name, error = %e, "Stats query failed"))
                    .ok()
            } else {
                None
            };
            MinerStats {
                name: entry.name.clone(),
                stats,
            }
        });
        join_all(queries).await
    }

    /// Selected, connected miners that support control operations.
    ///
    /// Miners without the capability are skipped with a log message.
    pub fn controls<'a>(
        &'a mut self,
        selection: &'a Selection,
    ) -> Vec<(&'a str, &'a mut dyn MinerControl)> {
        self.selected_mut(selection)
            .filter(|entry| entry.usable())
            .filter_map(|entry| {
                let Entry { name, miner, .. } = entry;
                match miner.control() {
                    Some(control) => Some((name.as_str(), control)),
                    None => {
                        info!(miner = %name, "No control API, skipping");
                        None
                    }
                }
            })
            .collect()
    }

    pub fn disconnect_all(&mut self) {
        for entry in &mut self.miners {
            entry.miner.disconnect();
        }
    }
}
