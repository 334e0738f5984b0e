//! Reconciles the logical deployment state of the task set against the
//! per-network JSON ledgers.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ethers::types::{Address, H256};
use eyre::Context;
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::storage::Storage;
use crate::task::{OutputOptions, Task, TaskStatus};
use crate::types::{ContractName, Network, TaskId};

const ADDRESSES_DIR: &str = "addresses";
const DEPLOYMENT_TXS_DIR: &str = "deployment-txs";
const TASKS_DIR: &str = "tasks";

/// One task's row in the address book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskEntry {
    pub contracts: Vec<DeployedContract>,
    pub status: TaskStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployedContract {
    pub name: ContractName,
    pub address: Address,
}

#[derive(Debug, Clone)]
pub struct Ledger {
    storage: Arc<dyn Storage>,
}

impl Ledger {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Recorded contract addresses of one task, empty when it has not been
    /// deployed on the network.
    pub fn read_output(
        &self,
        id: &TaskId,
        network: &Network,
    ) -> eyre::Result<BTreeMap<ContractName, Address>> {
        let path = task_output_path(id, network);

        match self.storage.read(&path)? {
            Some(contents) => serde_json::from_str(&contents)
                .with_context(|| format!("Parsing {}", path.display())),
            None => Ok(BTreeMap::new()),
        }
    }

    pub fn write_output(
        &self,
        id: &TaskId,
        network: &Network,
        outputs: &BTreeMap<ContractName, Address>,
    ) -> eyre::Result<()> {
        self.storage
            .write(&task_output_path(id, network), &stringify(outputs)?)
    }

    /// Maps task ids to their deployment info, skipping tasks with no output
    /// for the network. Output depends only on the underlying storage state,
    /// repeated calls serialize byte-for-byte equal.
    pub fn build_entries(
        &self,
        tasks: &[Task],
    ) -> eyre::Result<BTreeMap<TaskId, TaskEntry>> {
        let mut entries = BTreeMap::new();

        for task in tasks {
            let outputs = task.output(OutputOptions { ensure: false })?;

            // Some tasks do not have outputs for every network.
            if outputs.is_empty() {
                continue;
            }

            let contracts = outputs
                .into_iter()
                .map(|(name, address)| DeployedContract { name, address })
                .collect();

            entries.insert(
                task.id().clone(),
                TaskEntry {
                    contracts,
                    status: task.status()?,
                },
            );
        }

        Ok(entries)
    }

    /// Writes the canonical address book for the network.
    pub fn save(&self, tasks: &[Task], network: &Network) -> eyre::Result<()> {
        if network.is_local() {
            return Ok(());
        }

        let entries = self.build_entries(tasks)?;

        self.storage
            .write(&addresses_path(network), &stringify(&entries)?)
    }

    /// True iff the address book on disk matches the one rebuilt from the
    /// recorded task outputs. Never mutates state.
    pub fn check(&self, tasks: &[Task], network: &Network) -> eyre::Result<bool> {
        let entries = self.build_entries(tasks)?;

        let existing = self
            .storage
            .read(&addresses_path(network))?
            .unwrap_or_default();

        Ok(stringify(&entries)? == existing)
    }

    pub fn save_tx_hash(
        &self,
        network: &Network,
        address: Address,
        transaction_hash: H256,
    ) -> eyre::Result<()> {
        if network.is_local() {
            return Ok(());
        }

        let path = tx_hashes_path(network);

        let mut hashes: BTreeMap<Address, H256> = match self.storage.read(&path)? {
            Some(contents) => serde_json::from_str(&contents)
                .with_context(|| format!("Parsing {}", path.display()))?,
            None => BTreeMap::new(),
        };

        hashes.insert(address, transaction_hash);

        self.storage.write(&path, &stringify(&hashes)?)
    }

    pub fn tx_hash(
        &self,
        network: &Network,
        address: Address,
    ) -> eyre::Result<H256> {
        let path = tx_hashes_path(network);

        let hashes: BTreeMap<Address, H256> = match self.storage.read(&path)? {
            Some(contents) => serde_json::from_str(&contents)
                .with_context(|| format!("Parsing {}", path.display()))?,
            None => BTreeMap::new(),
        };

        hashes.get(&address).copied().ok_or_else(|| {
            Error::UnknownTransaction {
                address,
                network: network.clone(),
            }
            .into()
        })
    }
}

/// All ledger documents relevant to the given tasks on one network. Used to
/// seed the ephemeral storage of fork runs.
pub fn document_paths<'a>(
    ids: impl IntoIterator<Item = &'a TaskId>,
    network: &Network,
) -> Vec<PathBuf> {
    let mut paths: Vec<_> = ids
        .into_iter()
        .map(|id| task_output_path(id, network))
        .collect();

    paths.push(addresses_path(network));
    paths.push(tx_hashes_path(network));

    paths
}

pub fn task_output_path(id: &TaskId, network: &Network) -> PathBuf {
    Path::new(TASKS_DIR)
        .join(id.as_str())
        .join("output")
        .join(format!("{network}.json"))
}

fn addresses_path(network: &Network) -> PathBuf {
    Path::new(ADDRESSES_DIR).join(format!("{network}.json"))
}

fn tx_hashes_path(network: &Network) -> PathBuf {
    Path::new(DEPLOYMENT_TXS_DIR).join(format!("{network}.json"))
}

// 2-space indentation keeps the version-controlled ledgers diffable.
fn stringify<T: Serialize>(value: &T) -> eyre::Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;
    use crate::storage::MemStorage;

    fn ledger() -> Ledger {
        Ledger::new(Arc::new(MemStorage::new()))
    }

    #[test]
    fn records_and_looks_up_tx_hashes() -> eyre::Result<()> {
        let ledger = ledger();
        let network = Network::from("goerli");

        let address = Address::from_low_u64_be(1);
        let hash = H256::from_low_u64_be(2);

        ledger.save_tx_hash(&network, address, hash)?;

        assert_eq!(ledger.tx_hash(&network, address)?, hash);

        Ok(())
    }

    #[test]
    fn missing_tx_hash_is_fatal() {
        let ledger = ledger();
        let network = Network::from("goerli");

        let err = ledger
            .tx_hash(&network, Address::from_low_u64_be(9))
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::UnknownTransaction { .. })
        ));
    }

    #[test]
    fn local_network_is_never_persisted() -> eyre::Result<()> {
        let storage = Arc::new(MemStorage::new());
        let ledger = Ledger::new(storage.clone());
        let network = Network::local();

        ledger.save_tx_hash(
            &network,
            Address::from_low_u64_be(1),
            H256::from_low_u64_be(1),
        )?;

        assert_eq!(storage.read(&tx_hashes_path(&network))?, None);

        Ok(())
    }

    #[test]
    fn task_outputs_round_trip_with_stable_bytes() -> eyre::Result<()> {
        let storage = Arc::new(MemStorage::new());
        let ledger = Ledger::new(storage.clone());

        let id: TaskId = "20210418-vault".parse()?;
        let network = Network::from("goerli");

        let outputs = BTreeMap::from([
            (ContractName::from("Vault"), Address::from_low_u64_be(1)),
            (ContractName::from("BalancerHelpers"), Address::from_low_u64_be(2)),
        ]);

        ledger.write_output(&id, &network, &outputs)?;

        assert_eq!(ledger.read_output(&id, &network)?, outputs);

        let on_disk = storage
            .read(&task_output_path(&id, &network))?
            .expect("output written");

        assert_eq!(
            on_disk,
            indoc! {r#"
                {
                  "BalancerHelpers": "0x0000000000000000000000000000000000000002",
                  "Vault": "0x0000000000000000000000000000000000000001"
                }"#}
        );

        Ok(())
    }
}
