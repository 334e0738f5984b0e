use async_trait::async_trait;
use ethers::types::Address;
use serde::Deserialize;
use serde_json::json;

use super::{vault, weighted_pool_factory};
use crate::task::{
    DeploymentScript, Input, Inputs, Task, TaskDefinition, TaskRunOptions,
};

pub const TASK_ID: &str = "20230320-weighted-pool-factory-v4";

#[derive(Debug, Deserialize)]
pub struct WeightedPoolFactoryV4Input {
    #[serde(rename = "Vault")]
    pub vault: Address,

    #[serde(rename = "FactoryVersion")]
    pub factory_version: String,

    #[serde(rename = "PoolVersion")]
    pub pool_version: String,
}

struct WeightedPoolFactoryV4;

#[async_trait]
impl DeploymentScript for WeightedPoolFactoryV4 {
    async fn run(&self, task: &Task, options: &TaskRunOptions) -> eyre::Result<()> {
        let input: WeightedPoolFactoryV4Input = task.typed_input()?;

        let args = [
            json!(input.vault),
            json!(input.factory_version),
            json!(input.pool_version),
        ];
        task.deploy_and_verify("WeightedPoolFactory", &args, options)
            .await?;

        Ok(())
    }
}

pub fn definition() -> eyre::Result<TaskDefinition> {
    let factory_version = serde_json::json!({
        "name": "WeightedPoolFactory",
        "version": 4,
        "deployment": TASK_ID,
    })
    .to_string();

    let pool_version = serde_json::json!({
        "name": "WeightedPool",
        "version": 4,
        "deployment": TASK_ID,
    })
    .to_string();

    let inputs = Inputs::new()
        .common("Vault", Input::output(vault::TASK_ID.parse()?, "Vault"))
        .common("FactoryVersion", Input::value(factory_version))
        .common("PoolVersion", Input::value(pool_version));

    Ok(TaskDefinition::new(TASK_ID.parse()?, WeightedPoolFactoryV4)
        .with_inputs(inputs)
        .supersedes(weighted_pool_factory::TASK_ID.parse()?))
}
