//! Ephemeral forked-chain nodes for test-mode runs.

use std::process::Stdio;
use std::time::Duration;

use ethers::providers::{Middleware, Provider};
use eyre::Context;
use reqwest::Url;
use tracing::{info, instrument};

/// A local `anvil` node forking the state of an upstream network. The child
/// process is killed when the handle is dropped, nothing survives the run.
#[derive(Debug)]
pub struct AnvilFork {
    _child: tokio::process::Child,
    url: Url,
}

impl AnvilFork {
    #[instrument(skip_all, fields(upstream = %fork_url))]
    pub async fn spawn(fork_url: &Url, port: u16) -> eyre::Result<Self> {
        let mut cmd = tokio::process::Command::new("anvil");

        cmd.arg("--fork-url")
            .arg(fork_url.as_str())
            .arg("--port")
            .arg(port.to_string())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let child = cmd
            .spawn()
            .context("Spawning anvil, is foundry installed?")?;

        let url: Url = format!("http://127.0.0.1:{port}").parse()?;
        let provider = Provider::try_from(url.as_str())?;

        for _ in 0..50 {
            if provider.get_chainid().await.is_ok() {
                info!("Fork ready at {url}");

                return Ok(Self { _child: child, url });
            }

            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        eyre::bail!("anvil did not become ready at {url}")
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}
