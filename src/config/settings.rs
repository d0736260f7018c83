use crate::crypto::PrivateKey;
use crate::error::{LedgerError, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:3000";
pub const DEFAULT_BLOCK_TIME_SECS: u64 = 5;
pub const DEFAULT_DIAL_TIMEOUT_MS: u64 = 5000;
pub const PROTOCOL_VERSION: &str = "ledger-0.1";

const NODE_ADDRESS_KEY: &str = "NODE_ADDRESS";
const BOOTSTRAP_PEERS_KEY: &str = "BOOTSTRAP_PEERS";
const VALIDATOR_SEED_KEY: &str = "VALIDATOR_SEED";

/// Node settings. Every field has a default, so a TOML file only needs the
/// keys it changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub listen_addr: String,
    pub bootstrap_peers: Vec<String>,
    pub is_validator: bool,
    pub private_key_seed: Option<String>,
    pub block_time_secs: u64,
    pub dial_timeout_ms: u64,
    pub version: String,
    /// sled directory. In-memory stores when unset.
    pub data_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            bootstrap_peers: vec![],
            is_validator: false,
            private_key_seed: None,
            block_time_secs: DEFAULT_BLOCK_TIME_SECS,
            dial_timeout_ms: DEFAULT_DIAL_TIMEOUT_MS,
            version: PROTOCOL_VERSION.to_string(),
            data_dir: None,
        }
    }
}

impl Config {
    pub fn new(listen_addr: &str) -> Config {
        Config {
            listen_addr: listen_addr.to_string(),
            ..Config::default()
        }
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Config> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            LedgerError::Config(format!(
                "Failed to read {}: {e}",
                path.as_ref().display()
            ))
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Config> {
        Ok(toml::from_str(content)?)
    }

    /// `NODE_ADDRESS`, `BOOTSTRAP_PEERS` (comma separated) and
    /// `VALIDATOR_SEED` override the loaded values. A seed implies a validator.
    pub fn apply_env(&mut self) {
        self.apply_vars(|key| env::var(key).ok());
    }

    fn apply_vars(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(addr) = lookup(NODE_ADDRESS_KEY) {
            self.listen_addr = addr;
        }
        if let Some(peers) = lookup(BOOTSTRAP_PEERS_KEY) {
            self.bootstrap_peers = peers
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(seed) = lookup(VALIDATOR_SEED_KEY) {
            self.private_key_seed = Some(seed);
            self.is_validator = true;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.listen_addr.is_empty() {
            return Err(LedgerError::Config("listen_addr is empty".to_string()));
        }
        if self.block_time_secs == 0 {
            return Err(LedgerError::Config(
                "block_time_secs must be greater than zero".to_string(),
            ));
        }
        if self.is_validator && self.private_key_seed.is_none() {
            return Err(LedgerError::Config(
                "validator requires private_key_seed".to_string(),
            ));
        }
        self.validator_key()?;
        Ok(())
    }

    /// Signing key for produced blocks, present only on validators.
    pub fn validator_key(&self) -> Result<Option<PrivateKey>> {
        if !self.is_validator {
            return Ok(None);
        }
        match &self.private_key_seed {
            Some(seed) => PrivateKey::from_seed_str(seed)
                .map(Some)
                .map_err(|e| LedgerError::Config(format!("Invalid private_key_seed: {e}"))),
            None => Ok(None),
        }
    }

    pub fn block_time(&self) -> Duration {
        Duration::from_secs(self.block_time_secs)
    }

    pub fn dial_timeout(&self) -> Duration {
        Duration::from_millis(self.dial_timeout_ms)
    }
}
