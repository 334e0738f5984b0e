use async_trait::async_trait;
use ethers::types::Address;
use serde::Deserialize;
use serde_json::json;

use super::vault;
use crate::task::{
    DeploymentScript, Input, Inputs, Task, TaskDefinition, TaskRunOptions,
};

pub const TASK_ID: &str = "20210418-weighted-pool-factory";

#[derive(Debug, Deserialize)]
pub struct WeightedPoolFactoryInput {
    #[serde(rename = "Vault")]
    pub vault: Address,
}

struct WeightedPoolFactory;

#[async_trait]
impl DeploymentScript for WeightedPoolFactory {
    async fn run(&self, task: &Task, options: &TaskRunOptions) -> eyre::Result<()> {
        let input: WeightedPoolFactoryInput = task.typed_input()?;

        task.deploy_and_verify("WeightedPoolFactory", &[json!(input.vault)], options)
            .await?;

        Ok(())
    }
}

pub fn definition() -> eyre::Result<TaskDefinition> {
    let inputs =
        Inputs::new().common("Vault", Input::output(vault::TASK_ID.parse()?, "Vault"));

    Ok(TaskDefinition::new(TASK_ID.parse()?, WeightedPoolFactory).with_inputs(inputs))
}
