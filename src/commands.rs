use std::sync::Arc;

use ethers::providers::{Middleware, Provider};
use ethers::signers::{Signer, Wallet};
use eyre::ContextCompat;
use reqwest::Url;
use serde_json::Value;
use tracing::info;

use crate::backend::ContractBackend;
use crate::cli::{Args, Command, PrivateKey};
use crate::config::Config;
use crate::context::DeploymentContext;
use crate::forge::ForgeBackend;
use crate::fork::AnvilFork;
use crate::storage::{FsStorage, MemStorage};
use crate::task::{OutputOptions, TaskMode, TaskRunOptions};
use crate::types::{ContractName, Network, TaskId};
use crate::{ledger, runner, serde_utils, tasks};

pub async fn run(args: Args) -> eyre::Result<()> {
    let config: Config = serde_utils::read_deserialize(&args.config).await?;
    let registry = Arc::new(tasks::registry()?);

    match args.command {
        Command::Run {
            network,
            id,
            force,
            private_key,
        } => {
            let network = Network::from(network);
            let backend = live_backend(&config, &network, Some(private_key)).await?;

            let context = Arc::new(DeploymentContext::new(
                network,
                Arc::new(FsStorage::new(&config.ledger_dir)),
                Some(Arc::new(backend) as Arc<dyn ContractBackend>),
            ));

            let options = TaskRunOptions { force, from: None };

            match id {
                Some(id) => {
                    runner::run_one(
                        &registry,
                        context,
                        TaskMode::Live,
                        &id.parse()?,
                        &options,
                    )
                    .await
                }
                None => {
                    runner::run_all(&registry, context, TaskMode::Live, &options)
                        .await
                }
            }
        }

        Command::Save { network } => {
            let network = Network::from(network);
            let context = offline_context(&config, &network);

            let all = registry.tasks(TaskMode::ReadOnly, context.clone());
            context.ledger().save(&all, &network)?;

            info!("Saved address book for `{network}`");

            Ok(())
        }

        Command::Check { network } => {
            let network = Network::from(network);
            let context = offline_context(&config, &network);

            let all = registry.tasks(TaskMode::ReadOnly, context.clone());

            if context.ledger().check(&all, &network)? {
                info!("Address book for `{network}` is up to date");
                Ok(())
            } else {
                eyre::bail!(
                    "address book for `{network}` does not match the recorded \
                     task outputs, run the save command"
                )
            }
        }

        Command::List { network } => {
            let network = Network::from(network);
            let context = offline_context(&config, &network);

            for task in registry.tasks(TaskMode::ReadOnly, context) {
                println!("{}  {}", task.id(), task.status()?);
            }

            Ok(())
        }

        Command::Verify {
            network,
            id,
            contract,
            args: constructor_args,
        } => {
            let network = Network::from(network);
            let network_config = config.network(&network)?;

            let backend = forge_backend(
                &config,
                network_config.rpc_url()?,
                network_config.etherscan_api_key.clone(),
                None,
            )
            .await?;

            let context = Arc::new(DeploymentContext::new(
                network.clone(),
                Arc::new(FsStorage::new(&config.ledger_dir)),
                Some(Arc::new(backend) as Arc<dyn ContractBackend>),
            ));

            let id: TaskId = id.parse()?;
            let task = registry.task(&id, TaskMode::ReadOnly, context.clone())?;

            let name = ContractName::from(contract);
            let outputs = task.output(OutputOptions { ensure: true })?;
            let address = *outputs.get(&name).with_context(|| {
                format!("Task `{id}` has no contract named `{name}`")
            })?;

            let transaction_hash = context.ledger().tx_hash(&network, address)?;

            info!("Verifying {name} at {address:?}, deployed in {transaction_hash:?}");

            let args: Vec<Value> =
                constructor_args.into_iter().map(Value::String).collect();

            task.verify(&name, address, &args).await
        }

        Command::Test {
            network,
            id,
            private_key,
            port,
        } => {
            let network = Network::from(network);
            let network_config = config.network(&network)?;

            let fork = AnvilFork::spawn(&network_config.rpc_url()?, port).await?;

            // Fork runs resolve recorded deployments but never touch the
            // on-disk ledgers.
            let fs = FsStorage::new(&config.ledger_dir);
            let storage = MemStorage::seeded(
                &fs,
                ledger::document_paths(registry.ids(), &network),
            )?;

            let backend =
                forge_backend(&config, fork.url().clone(), None, Some(private_key))
                    .await?;

            let context = Arc::new(DeploymentContext::new(
                network,
                Arc::new(storage),
                Some(Arc::new(backend) as Arc<dyn ContractBackend>),
            ));

            // Forced, the point is to exercise the deployment itself.
            let options = TaskRunOptions {
                force: true,
                from: None,
            };

            match id {
                Some(id) => {
                    runner::run_one(
                        &registry,
                        context,
                        TaskMode::Test,
                        &id.parse()?,
                        &options,
                    )
                    .await?
                }
                None => {
                    runner::run_all(&registry, context, TaskMode::Test, &options)
                        .await?
                }
            }

            info!("Fork run complete, discarding state");

            Ok(())
        }
    }
}

fn offline_context(config: &Config, network: &Network) -> Arc<DeploymentContext> {
    Arc::new(DeploymentContext::new(
        network.clone(),
        Arc::new(FsStorage::new(&config.ledger_dir)),
        None,
    ))
}

async fn live_backend(
    config: &Config,
    network: &Network,
    private_key: Option<PrivateKey>,
) -> eyre::Result<ForgeBackend> {
    let network_config = config.network(network)?;

    forge_backend(
        config,
        network_config.rpc_url()?,
        network_config.etherscan_api_key.clone(),
        private_key,
    )
    .await
}

async fn forge_backend(
    config: &Config,
    rpc_url: Url,
    etherscan_api_key: Option<String>,
    private_key: Option<PrivateKey>,
) -> eyre::Result<ForgeBackend> {
    let provider = Provider::try_from(rpc_url.as_str())?;
    let chain_id = provider.get_chainid().await?;

    let starting_nonce = match &private_key {
        Some(private_key) => {
            let wallet = Wallet::from(private_key.key.clone())
                .with_chain_id(chain_id.as_u64());

            provider
                .get_transaction_count(wallet.address(), None)
                .await?
                .as_u64()
        }
        None => 0,
    };

    Ok(ForgeBackend::new(
        &config.contracts.dir,
        rpc_url,
        chain_id.as_u64(),
        private_key,
        etherscan_api_key,
        starting_nonce,
    ))
}
