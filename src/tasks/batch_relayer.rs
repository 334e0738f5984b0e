use async_trait::async_trait;
use ethers::types::Address;
use serde::Deserialize;
use serde_json::json;

use super::vault;
use crate::task::{
    DeploymentScript, Input, Inputs, Task, TaskDefinition, TaskRunOptions,
};

pub const TASK_ID: &str = "20220325-batch-relayer";

#[derive(Debug, Deserialize)]
pub struct BatchRelayerInput {
    #[serde(rename = "Vault")]
    pub vault: Address,

    #[serde(rename = "wstETH")]
    pub wst_eth: Address,

    #[serde(rename = "Version")]
    pub version: String,
}

struct BatchRelayer;

#[async_trait]
impl DeploymentScript for BatchRelayer {
    async fn run(&self, task: &Task, options: &TaskRunOptions) -> eyre::Result<()> {
        let input: BatchRelayerInput = task.typed_input()?;

        let args = [
            json!(input.vault),
            json!(input.wst_eth),
            json!(input.version),
        ];
        task.deploy_and_verify("BatchRelayerLibrary", &args, options)
            .await?;

        Ok(())
    }
}

pub fn definition() -> eyre::Result<TaskDefinition> {
    let version = serde_json::json!({
        "name": "BatchRelayer",
        "version": 1,
        "deployment": TASK_ID,
    })
    .to_string();

    let inputs = Inputs::new()
        .common("Vault", Input::output(vault::TASK_ID.parse()?, "Vault"))
        .for_network(
            "wstETH",
            "mainnet",
            Input::address("0x7f39C581F595B53c5cb19bD0b3f8dA6c935E2Ca0".parse()?),
        )
        // wstETH does not exist on the test networks.
        .for_network("wstETH", "goerli", Input::address(Address::zero()))
        .for_network("wstETH", "local", Input::address(Address::zero()))
        .common("Version", Input::value(version));

    Ok(TaskDefinition::new(TASK_ID.parse()?, BatchRelayer).with_inputs(inputs))
}
