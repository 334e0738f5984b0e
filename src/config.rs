use std::collections::HashMap;
use std::path::PathBuf;

use eyre::{Context, ContextCompat};
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::types::Network;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub networks: HashMap<String, NetworkConfig>,
    pub contracts: ContractsConfig,

    /// Root directory of the address book, transaction hash and task output
    /// ledgers.
    #[serde(default = "default_ledger_dir")]
    pub ledger_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub rpc_url: String,

    #[serde(default)]
    pub etherscan_api_key: Option<String>,
}

impl NetworkConfig {
    pub fn rpc_url(&self) -> eyre::Result<Url> {
        self.rpc_url
            .parse()
            .with_context(|| format!("Parsing rpc url `{}`", self.rpc_url))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractsConfig {
    /// Checkout of the contracts package the toolchain builds from.
    pub dir: PathBuf,
}

impl Config {
    pub fn network(&self, network: &Network) -> eyre::Result<&NetworkConfig> {
        self.networks
            .get(network.as_str())
            .with_context(|| format!("Network `{network}` is not configured"))
    }
}

fn default_ledger_dir() -> PathBuf {
    PathBuf::from(".")
}
