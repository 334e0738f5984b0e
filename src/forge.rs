//! Wrappers around the Foundry toolchain, which does the actual contract
//! creation and explorer submission.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use ethers::types::{Address, H256};
use eyre::ContextCompat;
use reqwest::Url;
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, instrument};

use crate::backend::{ContractBackend, ContractSpec, Deployment, Library};
use crate::cli::PrivateKey;

#[derive(Debug)]
pub struct ForgeCreate {
    cwd: Option<PathBuf>,
    contract_spec: ContractSpec,
    private_key: Option<PrivateKey>,
    rpc_url: Option<String>,
    override_nonce: Option<u64>,
    constructor_args: Vec<String>,
    libraries: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForgeOutput {
    pub deployer: Address,
    pub deployed_to: Address,
    pub transaction_hash: H256,
}

impl ForgeCreate {
    pub fn new(contract_spec: ContractSpec) -> Self {
        Self {
            cwd: None,
            contract_spec,
            private_key: None,
            rpc_url: None,
            override_nonce: None,
            constructor_args: vec![],
            libraries: vec![],
        }
    }

    pub fn with_cwd(mut self, cwd: impl AsRef<Path>) -> Self {
        self.cwd = Some(cwd.as_ref().to_owned());
        self
    }

    pub fn with_private_key(mut self, private_key: PrivateKey) -> Self {
        self.private_key = Some(private_key);
        self
    }

    pub fn with_rpc_url(mut self, rpc_url: String) -> Self {
        self.rpc_url = Some(rpc_url);
        self
    }

    pub fn with_override_nonce(mut self, override_nonce: u64) -> Self {
        self.override_nonce = Some(override_nonce);
        self
    }

    pub fn with_constructor_arg(mut self, arg: impl ToString) -> Self {
        self.constructor_args.push(arg.to_string());
        self
    }

    pub fn with_library(mut self, library: &Library) -> Self {
        self.libraries.push(library.to_string());
        self
    }

    #[instrument(name = "forge_create", skip_all)]
    pub async fn run(&self) -> eyre::Result<ForgeOutput> {
        let mut cmd = tokio::process::Command::new("forge");
        cmd.arg("create");

        if let Some(cwd) = &self.cwd {
            cmd.current_dir(cwd);
        }

        cmd.arg(self.contract_spec.to_string());

        if !self.libraries.is_empty() {
            let libraries = self.libraries.join(",");

            info!("libraries = {libraries}");

            cmd.arg("--libraries");
            cmd.arg(libraries);
        }

        if let Some(private_key) = &self.private_key {
            cmd.arg("--private-key");
            cmd.arg(format!("{private_key:#}"));
        }

        if let Some(rpc_url) = &self.rpc_url {
            cmd.arg("--rpc-url");
            cmd.arg(rpc_url);
        }

        if let Some(nonce) = self.override_nonce {
            cmd.arg("--nonce");
            cmd.arg(nonce.to_string());
        }

        for constructor_arg in &self.constructor_args {
            cmd.arg("--constructor-args");
            cmd.arg(constructor_arg);
        }

        cmd.arg("--json");

        info!("Creating contract with {cmd:?}");

        let output = cmd.output().await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            eyre::bail!("forge create failed: {}", stderr);
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let s = strip_non_json(&stdout);

        let output = serde_json::from_str(s)?;

        info!("Created: {output:?}");

        Ok(output)
    }
}

#[derive(Debug)]
pub struct ForgeVerify {
    contract_spec: ContractSpec,
    address: Address,
    root: Option<PathBuf>,
    chain: Option<u64>,
    etherscan_api_key: Option<String>,
    constructor_args: Vec<String>,
}

impl ForgeVerify {
    pub fn new(contract_spec: ContractSpec, address: Address) -> Self {
        Self {
            contract_spec,
            address,
            root: None,
            chain: None,
            etherscan_api_key: None,
            constructor_args: vec![],
        }
    }

    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    pub fn with_chain(mut self, chain: u64) -> Self {
        self.chain = Some(chain);
        self
    }

    pub fn with_etherscan_api_key(
        mut self,
        etherscan_api_key: impl ToString,
    ) -> Self {
        self.etherscan_api_key = Some(etherscan_api_key.to_string());
        self
    }

    pub fn with_constructor_arg(mut self, arg: impl ToString) -> Self {
        self.constructor_args.push(arg.to_string());
        self
    }

    #[instrument(name = "forge_verify", skip_all)]
    pub async fn run(&self) -> eyre::Result<()> {
        let mut cmd = tokio::process::Command::new("forge");
        cmd.arg("verify-contract");

        cmd.arg("--watch");

        let root = self.root.as_ref().context("Missing root")?;

        cmd.arg("--root");
        cmd.arg(root);

        let chain = self.chain.context("Missing chain")?;

        cmd.arg("--chain");
        cmd.arg(chain.to_string());

        let etherscan_api_key = self
            .etherscan_api_key
            .as_ref()
            .context("Missing etherscan api key")?;

        cmd.arg("--etherscan-api-key");
        cmd.arg(etherscan_api_key);

        for constructor_arg in &self.constructor_args {
            cmd.arg("--constructor-args");
            cmd.arg(constructor_arg);
        }

        cmd.arg(format!("{:?}", self.address));
        cmd.arg(self.contract_spec.to_string());

        info!("Verifying contract with {cmd:?}");

        let output = cmd.output().await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            eyre::bail!("forge verify failed: {}", stderr);
        }

        Ok(())
    }
}

/// Live backend driving `forge` against a configured rpc endpoint.
///
/// Account nonces are assigned from a local counter seeded with the chain
/// state at startup, sequential task execution keeps it accurate.
#[derive(Debug)]
pub struct ForgeBackend {
    contracts_dir: PathBuf,
    rpc_url: Url,
    chain_id: u64,
    private_key: Option<PrivateKey>,
    etherscan_api_key: Option<String>,
    nonce: AtomicU64,
}

impl ForgeBackend {
    pub fn new(
        contracts_dir: impl Into<PathBuf>,
        rpc_url: Url,
        chain_id: u64,
        private_key: Option<PrivateKey>,
        etherscan_api_key: Option<String>,
        starting_nonce: u64,
    ) -> Self {
        Self {
            contracts_dir: contracts_dir.into(),
            rpc_url,
            chain_id,
            private_key,
            etherscan_api_key,
            nonce: AtomicU64::new(starting_nonce),
        }
    }

    fn next_nonce(&self) -> u64 {
        self.nonce.fetch_add(1, Ordering::SeqCst)
    }
}

#[async_trait]
impl ContractBackend for ForgeBackend {
    async fn deploy(
        &self,
        contract: &ContractSpec,
        args: &[Value],
        from: Option<&PrivateKey>,
        libraries: &[Library],
    ) -> eyre::Result<Deployment> {
        let key = from
            .or(self.private_key.as_ref())
            .context("No private key configured for deployment")?;

        let mut create = ForgeCreate::new(contract.clone())
            .with_cwd(&self.contracts_dir)
            .with_private_key(key.clone())
            .with_rpc_url(self.rpc_url.to_string());

        // The nonce counter tracks the configured key only. An explicit
        // `from` sender fetches its own nonce through forge.
        if from.is_none() {
            create = create.with_override_nonce(self.next_nonce());
        }

        for library in libraries {
            create = create.with_library(library);
        }

        for arg in args {
            create = create.with_constructor_arg(constructor_arg(arg));
        }

        let output = create.run().await?;

        Ok(Deployment {
            address: output.deployed_to,
            deployer: output.deployer,
            transaction_hash: output.transaction_hash,
        })
    }

    async fn verify(
        &self,
        contract: &ContractSpec,
        address: Address,
        args: &[Value],
    ) -> eyre::Result<()> {
        let etherscan_api_key = self
            .etherscan_api_key
            .as_ref()
            .context("No explorer api key configured for this network")?;

        let mut verify = ForgeVerify::new(contract.clone(), address)
            .with_root(&self.contracts_dir)
            .with_chain(self.chain_id)
            .with_etherscan_api_key(etherscan_api_key);

        for arg in args {
            verify = verify.with_constructor_arg(constructor_arg(arg));
        }

        verify.run().await
    }
}

/// Renders a JSON input value the way forge expects it on the command line:
/// strings unquoted, everything else in its JSON form.
fn constructor_arg(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn strip_non_json(s: &str) -> &str {
    // forge logs compilation progress around the JSON document
    let start = s.find('{').unwrap_or(0);

    if let Some(last_closing_brace) = s.rfind('}') {
        &s[start..=last_closing_brace]
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn strips_surrounding_forge_noise() {
        let raw = "Compiling 12 files\n{\"deployer\":\"0x0\"}\nDone";

        assert_eq!(strip_non_json(raw), "{\"deployer\":\"0x0\"}");
    }

    #[test]
    fn renders_constructor_args() {
        assert_eq!(constructor_arg(&json!("0xabc")), "0xabc");
        assert_eq!(constructor_arg(&json!(7776000)), "7776000");
        assert_eq!(constructor_arg(&json!(true)), "true");
    }
}
