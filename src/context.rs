use std::sync::Arc;

use eyre::ContextCompat;

use crate::backend::ContractBackend;
use crate::ledger::Ledger;
use crate::storage::Storage;
use crate::types::Network;

/// Everything tasks need to execute against one target network.
///
/// Offline commands (building or checking the address book) carry no
/// backend, any attempt to deploy through them fails before a network call
/// is made.
#[derive(Debug)]
pub struct DeploymentContext {
    network: Network,
    ledger: Ledger,
    backend: Option<Arc<dyn ContractBackend>>,
}

impl DeploymentContext {
    pub fn new(
        network: Network,
        storage: Arc<dyn Storage>,
        backend: Option<Arc<dyn ContractBackend>>,
    ) -> Self {
        Self {
            network,
            ledger: Ledger::new(storage),
            backend,
        }
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn backend(&self) -> eyre::Result<&Arc<dyn ContractBackend>> {
        self.backend
            .as_ref()
            .context("This command has no deployment backend")
    }
}
