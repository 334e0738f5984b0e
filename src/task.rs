//! The deployment unit and its status/mode state machine.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use ethers::types::Address;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use strum::Display;
use tracing::{info, instrument, warn};

use crate::backend::{ContractSpec, Library};
use crate::cli::PrivateKey;
use crate::context::DeploymentContext;
use crate::error::Error;
use crate::registry::TaskRegistry;
use crate::types::{ContractName, Network, TaskId};

pub mod input;

pub use input::{Input, InputSpec, Inputs};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskMode {
    /// Only consumes recorded outputs, never deploys.
    ReadOnly,
    /// Deploys and persists results to the ledgers.
    Live,
    /// Deploys against an ephemeral fork, results are discarded with the
    /// storage the run was given.
    Test,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// No recorded output for the network.
    Pending,
    /// Deployed and current.
    Active,
    /// Deployed, but a superseding task has since been deployed.
    Deprecated,
}

#[derive(Debug, Clone, Default)]
pub struct TaskRunOptions {
    pub force: bool,
    pub from: Option<PrivateKey>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OutputOptions {
    pub ensure: bool,
}

/// A deployment script. Implementations receive the task handle and perform
/// the actual deployments through it.
#[async_trait]
pub trait DeploymentScript: Send + Sync {
    async fn run(&self, task: &Task, options: &TaskRunOptions) -> eyre::Result<()>;
}

/// Declaration of one deployment unit: identity, inputs, the tasks it
/// supersedes and the script that executes it. Constructing a definition has
/// no side effects.
pub struct TaskDefinition {
    id: TaskId,
    inputs: Inputs,
    supersedes: Vec<TaskId>,
    script: Arc<dyn DeploymentScript>,
}

impl TaskDefinition {
    pub fn new(id: TaskId, script: impl DeploymentScript + 'static) -> Self {
        Self {
            id,
            inputs: Inputs::new(),
            supersedes: vec![],
            script: Arc::new(script),
        }
    }

    pub fn with_inputs(mut self, inputs: Inputs) -> Self {
        self.inputs = inputs;
        self
    }

    /// Declares that this task replaces an earlier one. Once this task has
    /// recorded output on a network, the superseded task reports
    /// `DEPRECATED` there.
    pub fn supersedes(mut self, id: TaskId) -> Self {
        self.supersedes.push(id);
        self
    }

    pub fn id(&self) -> &TaskId {
        &self.id
    }

    pub fn superseded_ids(&self) -> &[TaskId] {
        &self.supersedes
    }

    /// Every other task this definition points at, through inputs or
    /// supersedes edges.
    pub fn references(&self) -> Vec<TaskId> {
        let mut references = self.inputs.references();
        references.extend(self.supersedes.iter().cloned());
        references
    }
}

impl fmt::Debug for TaskDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskDefinition")
            .field("id", &self.id)
            .field("inputs", &self.inputs)
            .field("supersedes", &self.supersedes)
            .finish_non_exhaustive()
    }
}

/// Handle to a deployed contract. Does not touch the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractInstance {
    pub name: ContractName,
    pub address: Address,
}

/// One deployment unit bound to a mode and a target network.
#[derive(Clone)]
pub struct Task {
    definition: Arc<TaskDefinition>,
    mode: TaskMode,
    registry: Arc<TaskRegistry>,
    context: Arc<DeploymentContext>,
}

impl Task {
    pub(crate) fn new(
        definition: Arc<TaskDefinition>,
        mode: TaskMode,
        registry: Arc<TaskRegistry>,
        context: Arc<DeploymentContext>,
    ) -> Self {
        Self {
            definition,
            mode,
            registry,
            context,
        }
    }

    pub fn id(&self) -> &TaskId {
        self.definition.id()
    }

    pub fn mode(&self) -> TaskMode {
        self.mode
    }

    pub fn network(&self) -> &Network {
        self.context.network()
    }

    /// Resolved configuration for the current network. Referenced task
    /// outputs are read from the ledger, so every dependency must already
    /// have been deployed.
    pub fn input(&self) -> eyre::Result<Value> {
        let network = self.network();

        let mut resolved = serde_json::Map::new();

        for (name, spec) in self.definition.inputs.iter() {
            let input = spec.for_network(network).ok_or_else(|| {
                Error::MissingInput {
                    task: self.id().clone(),
                    field: name.clone(),
                    network: network.clone(),
                }
            })?;

            resolved.insert(name.clone(), self.resolve(input)?);
        }

        Ok(Value::Object(resolved))
    }

    /// Resolved configuration deserialized into the task's input struct.
    pub fn typed_input<T: DeserializeOwned>(&self) -> eyre::Result<T> {
        let value = self.input()?;

        serde_json::from_value(value).map_err(|source| {
            Error::InvalidInput {
                task: self.id().clone(),
                source,
            }
            .into()
        })
    }

    fn resolve(&self, input: &Input) -> eyre::Result<Value> {
        match input {
            Input::Value(value) => Ok(value.clone()),
            Input::Address(address) => Ok(json!(address)),
            Input::Output { task, contract } => {
                let dependency = self.registry.task(
                    task,
                    TaskMode::ReadOnly,
                    self.context.clone(),
                )?;

                let outputs = dependency.output(OutputOptions { ensure: true })?;

                let address = outputs.get(contract).ok_or_else(|| {
                    Error::NotDeployed {
                        task: task.clone(),
                        network: self.network().clone(),
                    }
                })?;

                Ok(json!(address))
            }
        }
    }

    /// Previously recorded deployment addresses for the current network.
    pub fn output(
        &self,
        options: OutputOptions,
    ) -> eyre::Result<BTreeMap<ContractName, Address>> {
        let outputs = self
            .context
            .ledger()
            .read_output(self.id(), self.network())?;

        if outputs.is_empty() && options.ensure {
            return Err(Error::NotDeployed {
                task: self.id().clone(),
                network: self.network().clone(),
            }
            .into());
        }

        Ok(outputs)
    }

    /// Derived purely from recorded ledger state and the declared supersedes
    /// edges, no network calls.
    pub fn status(&self) -> eyre::Result<TaskStatus> {
        if self.output(OutputOptions::default())?.is_empty() {
            return Ok(TaskStatus::Pending);
        }

        for successor in self.registry.superseding(self.id()) {
            let outputs = self
                .context
                .ledger()
                .read_output(&successor, self.network())?;

            if !outputs.is_empty() {
                return Ok(TaskStatus::Deprecated);
            }
        }

        Ok(TaskStatus::Active)
    }

    /// Executes the task's deployment script unless it is already active on
    /// the network. Repeated runs without `force` are safe no-ops.
    #[instrument(skip_all, fields(task = %self.id(), network = %self.network()))]
    pub async fn run(&self, options: &TaskRunOptions) -> eyre::Result<()> {
        if self.mode == TaskMode::ReadOnly {
            return Err(Error::ReadOnly {
                task: self.id().clone(),
            }
            .into());
        }

        if self.status()? == TaskStatus::Active && !options.force {
            info!("Already deployed, skipping");
            return Ok(());
        }

        self.definition.script.run(self, options).await
    }

    /// Deploys a named contract unless an address is already recorded for
    /// it, in which case the recorded instance is reused.
    pub async fn deploy(
        &self,
        name: impl Into<ContractName>,
        args: &[Value],
        options: &TaskRunOptions,
    ) -> eyre::Result<ContractInstance> {
        self.deploy_with_libraries(name, args, &[], options).await
    }

    #[instrument(skip_all, fields(task = %self.id()))]
    pub async fn deploy_with_libraries(
        &self,
        name: impl Into<ContractName>,
        args: &[Value],
        libraries: &[Library],
        options: &TaskRunOptions,
    ) -> eyre::Result<ContractInstance> {
        let name = name.into();

        let recorded = self.output(OutputOptions::default())?;

        if let Some(address) = recorded.get(&name) {
            if !options.force {
                info!("Already deployed at {address:?}, reusing");
                return Ok(self.instance_at(name, *address));
            }
        }

        let deployment = self
            .context
            .backend()?
            .deploy(
                &ContractSpec::name(name.as_str()),
                args,
                options.from.as_ref(),
                libraries,
            )
            .await?;

        info!(
            "Deployed {name} at {:?} in {:?}",
            deployment.address, deployment.transaction_hash
        );

        self.record(&name, deployment.address)?;
        self.context.ledger().save_tx_hash(
            self.network(),
            deployment.address,
            deployment.transaction_hash,
        )?;

        Ok(ContractInstance {
            name,
            address: deployment.address,
        })
    }

    /// Deploys and then submits the source for explorer verification. A
    /// contract that is already recorded is reused without re-verifying.
    /// Verification does not affect on-chain state, failures are reported
    /// and swallowed.
    pub async fn deploy_and_verify(
        &self,
        name: impl Into<ContractName>,
        args: &[Value],
        options: &TaskRunOptions,
    ) -> eyre::Result<ContractInstance> {
        let name = name.into();

        let recorded = self.output(OutputOptions::default())?;

        if let Some(address) = recorded.get(&name) {
            if !options.force {
                info!("{name} already deployed at {address:?}, reusing");
                return Ok(self.instance_at(name, *address));
            }
        }

        let instance = self.deploy(name, args, options).await?;

        if let Err(err) = self.verify(&instance.name, instance.address, args).await
        {
            warn!("Verification of {} failed: {err:#}", instance.name);
        }

        Ok(instance)
    }

    /// Submits a deployed contract's source to the network's explorer.
    pub async fn verify(
        &self,
        name: &ContractName,
        address: Address,
        args: &[Value],
    ) -> eyre::Result<()> {
        self.context
            .backend()?
            .verify(&ContractSpec::name(name.as_str()), address, args)
            .await
    }

    /// Handle to an already-deployed contract.
    pub fn instance_at(
        &self,
        name: impl Into<ContractName>,
        address: Address,
    ) -> ContractInstance {
        ContractInstance {
            name: name.into(),
            address,
        }
    }

    /// Records addresses obtained without going through `deploy`, e.g.
    /// contracts created as a side effect of another deployment.
    pub fn save_output(
        &self,
        entries: &BTreeMap<ContractName, Address>,
        force: bool,
    ) -> eyre::Result<()> {
        let recorded = self.output(OutputOptions::default())?;

        for (name, address) in entries {
            match recorded.get(name) {
                Some(existing) if existing != address && !force => {
                    eyre::bail!(
                        "{name} is already recorded at {existing:?} for task `{}`, \
                         overwriting requires force",
                        self.id()
                    );
                }
                _ => self.record(name, *address)?,
            }
        }

        Ok(())
    }

    fn record(&self, name: &ContractName, address: Address) -> eyre::Result<()> {
        let mut outputs = self
            .context
            .ledger()
            .read_output(self.id(), self.network())?;

        outputs.insert(name.clone(), address);

        self.context
            .ledger()
            .write_output(self.id(), self.network(), &outputs)
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", self.id())
            .field("mode", &self.mode)
            .field("network", self.network())
            .finish_non_exhaustive()
    }
}
