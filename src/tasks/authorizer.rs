use async_trait::async_trait;
use ethers::types::Address;
use serde::Deserialize;
use serde_json::json;

use crate::task::{
    DeploymentScript, Input, Inputs, Task, TaskDefinition, TaskRunOptions,
};

pub const TASK_ID: &str = "20210418-authorizer";

#[derive(Debug, Deserialize)]
pub struct AuthorizerInput {
    pub admin: Address,
}

struct Authorizer;

#[async_trait]
impl DeploymentScript for Authorizer {
    async fn run(&self, task: &Task, options: &TaskRunOptions) -> eyre::Result<()> {
        let input: AuthorizerInput = task.typed_input()?;

        task.deploy_and_verify("Authorizer", &[json!(input.admin)], options)
            .await?;

        Ok(())
    }
}

pub fn definition() -> eyre::Result<TaskDefinition> {
    let inputs = Inputs::new()
        .for_network(
            "admin",
            "mainnet",
            Input::address("0x10A19e7eE7d7F8a52822f6817de8ea18204F2e4f".parse()?),
        )
        .for_network(
            "admin",
            "goerli",
            Input::address("0xE0a171587b1Cae546E069A943EDa96916F5EE977".parse()?),
        )
        // First anvil dev account.
        .for_network(
            "admin",
            "local",
            Input::address("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266".parse()?),
        );

    Ok(TaskDefinition::new(TASK_ID.parse()?, Authorizer).with_inputs(inputs))
}
