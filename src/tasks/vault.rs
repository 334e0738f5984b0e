use async_trait::async_trait;
use ethers::types::Address;
use serde::Deserialize;
use serde_json::json;

use super::authorizer;
use crate::task::{
    DeploymentScript, Input, Inputs, Task, TaskDefinition, TaskRunOptions,
};

pub const TASK_ID: &str = "20210418-vault";

const MONTH: u64 = 30 * 24 * 60 * 60;

#[derive(Debug, Deserialize)]
pub struct VaultInput {
    #[serde(rename = "Authorizer")]
    pub authorizer: Address,

    #[serde(rename = "WETH")]
    pub weth: Address,

    #[serde(rename = "pauseWindowDuration")]
    pub pause_window_duration: u64,

    #[serde(rename = "bufferPeriodDuration")]
    pub buffer_period_duration: u64,
}

struct Vault;

#[async_trait]
impl DeploymentScript for Vault {
    async fn run(&self, task: &Task, options: &TaskRunOptions) -> eyre::Result<()> {
        let input: VaultInput = task.typed_input()?;

        let vault_args = [
            json!(input.authorizer),
            json!(input.weth),
            json!(input.pause_window_duration),
            json!(input.buffer_period_duration),
        ];
        let vault = task.deploy_and_verify("Vault", &vault_args, options).await?;

        let helpers_args = [json!(vault.address)];
        task.deploy_and_verify("BalancerHelpers", &helpers_args, options)
            .await?;

        Ok(())
    }
}

pub fn definition() -> eyre::Result<TaskDefinition> {
    let inputs = Inputs::new()
        .common(
            "Authorizer",
            Input::output(authorizer::TASK_ID.parse()?, "Authorizer"),
        )
        .for_network(
            "WETH",
            "mainnet",
            Input::address("0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2".parse()?),
        )
        .for_network(
            "WETH",
            "goerli",
            Input::address("0xdFCeA9088c8A88A76FF74892C1457C17dfeef9C1".parse()?),
        )
        .for_network("WETH", "local", Input::address(Address::zero()))
        .common("pauseWindowDuration", Input::value(3 * MONTH))
        .common("bufferPeriodDuration", Input::value(MONTH));

    Ok(TaskDefinition::new(TASK_ID.parse()?, Vault).with_inputs(inputs))
}
