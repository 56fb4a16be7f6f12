//! Configuration loading.
//!
//! The configuration is a TOML file listing the miners to manage:
//!
//! ```toml
//! [[miners]]
//! name = "local"
//! host = "localhost"
//! port = 3333
//!
//! [[miners]]
//! name = "rig2"
//! api_type = "nbminer"
//! url = "http://10.0.0.124:22333"
//! ```

use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::ethminer::{Endpoint, EthminerClient};
use crate::miner::Miner;
use crate::nbminer::{self, NbMinerClient};

/// Used when neither `--config` nor `MINECTL_CONFIG` is given.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/minectl.toml";

/// Environment variable overriding the configuration path.
pub const CONFIG_ENV: &str = "MINECTL_CONFIG";

/// Printed by `minectl confighelp`.
pub const EXAMPLE_CONFIG: &str = r#"# ethminer-compatible API (the default api_type)
[[miners]]
name = "local"
host = "localhost"
port = 3333

[[miners]]
name = "remote"
host = "10.0.0.123"
port = 3333
password = "secret"

# NBMiner REST API
[[miners]]
name = "rig2"
api_type = "nbminer"
url = "http://10.0.0.124:22333"
"#;

const DEFAULT_HOST: &str = "localhost";
const DEFAULT_PORT: u16 = 3333;

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub miners: Vec<MinerConfig>,
}

/// Which API a miner speaks.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ApiType {
    #[default]
    Ethminer,
    Nbminer,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct MinerConfig {
    pub name: String,

    #[serde(default)]
    pub api_type: ApiType,

    /// ethminer API host
    #[serde(default = "default_host")]
    pub host: String,

    /// ethminer API port
    #[serde(default = "default_port")]
    pub port: u16,

    /// ethminer API password, sent right after connecting
    #[serde(default)]
    pub password: Option<String>,

    /// NBMiner API base URL
    #[serde(default = "default_url")]
    pub url: String,
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_url() -> String {
    nbminer::DEFAULT_URL.to_string()
}

impl Config {
    /// Read and validate the configuration at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        contents.parse()
    }

    fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for miner in &self.miners {
            if miner.name.trim().is_empty() {
                return Err(Error::Config("miner name must not be empty".to_string()));
            }
            if miner.name == "all" {
                return Err(Error::Config(
                    "\"all\" is reserved and cannot be a miner name".to_string(),
                ));
            }
            if !seen.insert(miner.name.as_str()) {
                return Err(Error::Config(format!(
                    "duplicate miner name: {}",
                    miner.name
                )));
            }
        }
        Ok(())
    }
}

impl std::str::FromStr for Config {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }
}

impl MinerConfig {
    /// Build an unconnected client for this miner.
    pub fn build(&self) -> Box<dyn Miner> {
        match self.api_type {
            ApiType::Ethminer => {
                let client = EthminerClient::new(Endpoint::new(self.host.clone(), self.port));
                match &self.password {
                    Some(password) => Box::new(client.with_password(password.clone())),
                    None => Box::new(client),
                }
            }
            ApiType::Nbminer => Box::new(NbMinerClient::new(self.url.clone())),
        }
    }
}
