//! End-to-end runs of the harness against in-memory storage and a chain-less
//! backend double.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use deployments::backend::{ContractBackend, MockBackend};
use deployments::context::DeploymentContext;
use deployments::registry::TaskRegistry;
use deployments::runner;
use deployments::storage::{MemStorage, Storage};
use deployments::task::{
    DeploymentScript, Input, Inputs, OutputOptions, Task, TaskDefinition,
    TaskMode, TaskRunOptions, TaskStatus,
};
use deployments::tasks;
use deployments::types::Network;
use indoc::indoc;
use serde_json::json;

struct Harness {
    registry: Arc<TaskRegistry>,
    context: Arc<DeploymentContext>,
    storage: Arc<MemStorage>,
    backend: Arc<MockBackend>,
    network: Network,
}

fn harness(registry: TaskRegistry, network: &str) -> Harness {
    let storage = Arc::new(MemStorage::new());
    let backend = Arc::new(MockBackend::new());
    let network = Network::from(network);

    let context = Arc::new(DeploymentContext::new(
        network.clone(),
        storage.clone() as Arc<dyn Storage>,
        Some(backend.clone() as Arc<dyn ContractBackend>),
    ));

    Harness {
        registry: Arc::new(registry),
        context,
        storage,
        backend,
        network,
    }
}

impl Harness {
    fn all_tasks(&self) -> Vec<Task> {
        self.registry
            .tasks(TaskMode::ReadOnly, self.context.clone())
    }

    async fn run_all(&self, options: &TaskRunOptions) -> eyre::Result<()> {
        runner::run_all(
            &self.registry,
            self.context.clone(),
            TaskMode::Live,
            options,
        )
        .await
    }
}

struct VaultScript;

#[async_trait]
impl DeploymentScript for VaultScript {
    async fn run(&self, task: &Task, options: &TaskRunOptions) -> eyre::Result<()> {
        let input = task.input()?;

        let args = [
            input["Authorizer"].clone(),
            input["WETH"].clone(),
        ];
        task.deploy("Vault", &args, options).await?;

        Ok(())
    }
}

fn vault_registry() -> TaskRegistry {
    let inputs = Inputs::new()
        .common(
            "Authorizer",
            Input::address(
                "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa".parse().unwrap(),
            ),
        )
        .for_network(
            "WETH",
            "goerli",
            Input::address(
                "0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb".parse().unwrap(),
            ),
        );

    let definition =
        TaskDefinition::new("20210418-vault".parse().unwrap(), VaultScript)
            .with_inputs(inputs);

    let mut registry = TaskRegistry::new();
    registry.register(definition).unwrap();
    registry
}

#[tokio::test]
async fn single_task_run_populates_the_ledgers() -> eyre::Result<()> {
    let harness = harness(vault_registry(), "goerli");

    harness.run_all(&TaskRunOptions::default()).await?;

    let all = harness.all_tasks();
    harness.context.ledger().save(&all, &harness.network)?;

    let address_book = harness
        .storage
        .read(Path::new("addresses/goerli.json"))?
        .expect("address book written");

    assert_eq!(
        address_book,
        indoc! {r#"
            {
              "20210418-vault": {
                "contracts": [
                  {
                    "name": "Vault",
                    "address": "0x0000000000000000000000000000000000000001"
                  }
                ],
                "status": "ACTIVE"
              }
            }"#}
    );

    let tx_hashes = harness
        .storage
        .read(Path::new("deployment-txs/goerli.json"))?
        .expect("tx hashes written");

    assert_eq!(
        tx_hashes,
        indoc! {r#"
            {
              "0x0000000000000000000000000000000000000001": "0x0000000000000000000000000000000000000000000000000000000000000001"
            }"#}
    );

    // The constructor received the resolved input values.
    let deploys = harness.backend.deploys();
    assert_eq!(deploys.len(), 1);
    assert_eq!(
        deploys[0].args,
        vec![
            json!("0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"),
            json!("0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb"),
        ]
    );

    Ok(())
}

#[tokio::test]
async fn check_holds_right_after_save() -> eyre::Result<()> {
    let harness = harness(vault_registry(), "goerli");

    harness.run_all(&TaskRunOptions::default()).await?;

    let all = harness.all_tasks();
    let ledger = harness.context.ledger();

    // Before saving, the on-disk book does not match.
    assert!(!ledger.check(&all, &harness.network)?);

    ledger.save(&all, &harness.network)?;

    assert!(ledger.check(&all, &harness.network)?);

    Ok(())
}

#[tokio::test]
async fn build_entries_is_deterministic() -> eyre::Result<()> {
    let harness = harness(vault_registry(), "goerli");

    harness.run_all(&TaskRunOptions::default()).await?;

    let all = harness.all_tasks();
    let ledger = harness.context.ledger();

    let first = serde_json::to_string_pretty(&ledger.build_entries(&all)?)?;
    let second = serde_json::to_string_pretty(&ledger.build_entries(&all)?)?;

    assert_eq!(first, second);

    Ok(())
}

#[tokio::test]
async fn pending_tasks_are_left_out_of_the_address_book() -> eyre::Result<()> {
    let harness = harness(vault_registry(), "goerli");

    let all = harness.all_tasks();

    assert_eq!(all[0].status()?, TaskStatus::Pending);
    assert!(harness.context.ledger().build_entries(&all)?.is_empty());

    Ok(())
}

#[tokio::test]
async fn forced_rerun_after_manual_deletion_invalidates_the_snapshot(
) -> eyre::Result<()> {
    let harness = harness(vault_registry(), "goerli");

    harness.run_all(&TaskRunOptions::default()).await?;

    let all = harness.all_tasks();
    let ledger = harness.context.ledger();

    ledger.save(&all, &harness.network)?;

    let before = all[0].output(OutputOptions::default())?;

    // Wipe the recorded output by hand and redeploy.
    ledger.write_output(all[0].id(), &harness.network, &BTreeMap::new())?;

    harness
        .run_all(&TaskRunOptions {
            force: true,
            from: None,
        })
        .await?;

    let after = all[0].output(OutputOptions::default())?;

    assert_ne!(before, after);

    // The pre-rerun snapshot no longer matches.
    assert!(!ledger.check(&all, &harness.network)?);

    Ok(())
}

#[tokio::test]
async fn full_built_in_run_is_idempotent_and_deprecates_superseded_tasks(
) -> eyre::Result<()> {
    let harness = harness(tasks::registry()?, "goerli");

    harness.run_all(&TaskRunOptions::default()).await?;

    // Authorizer, Vault, BalancerHelpers, two factories and the relayer
    // library.
    assert_eq!(harness.backend.deploy_count(), 6);

    // Everything is recorded, a second pass deploys nothing.
    harness.run_all(&TaskRunOptions::default()).await?;
    assert_eq!(harness.backend.deploy_count(), 6);

    let all = harness.all_tasks();
    let entries = harness.context.ledger().build_entries(&all)?;

    let v1: deployments::types::TaskId =
        "20210418-weighted-pool-factory".parse()?;
    let v4: deployments::types::TaskId =
        "20230320-weighted-pool-factory-v4".parse()?;

    assert_eq!(entries[&v1].status, TaskStatus::Deprecated);
    assert_eq!(entries[&v4].status, TaskStatus::Active);

    // Every deploy also submitted the source for verification.
    assert_eq!(harness.backend.verifications().len(), 6);

    Ok(())
}
