use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use ethers::types::{Address, H256};
use serde_json::Value;

use crate::cli::PrivateKey;

/// Name of a contract within the external package, optionally qualified by
/// its source path when the name alone is ambiguous.
#[derive(Debug, Clone)]
pub struct ContractSpec {
    pub path: Option<PathBuf>,
    pub name: String,
}

impl ContractSpec {
    pub fn name(name: impl ToString) -> Self {
        Self {
            path: None,
            name: name.to_string(),
        }
    }

    pub fn path_name(path: impl AsRef<Path>, name: impl ToString) -> Self {
        Self {
            path: Some(path.as_ref().to_owned()),
            name: name.to_string(),
        }
    }
}

impl fmt::Display for ContractSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(path) = self.path.as_deref() {
            write!(f, "{}:{}", path.display(), self.name)
        } else {
            write!(f, "{}", self.name)
        }
    }
}

/// An already-deployed library a contract links against.
#[derive(Debug, Clone)]
pub struct Library {
    pub spec: ContractSpec,
    pub address: Address,
}

impl fmt::Display for Library {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{:?}", self.spec, self.address)
    }
}

/// The outcome of one contract creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deployment {
    pub address: Address,
    pub deployer: Address,
    pub transaction_hash: H256,
}

/// Seam to the external contract-deployment toolchain.
///
/// Tasks only talk to the chain and the explorer through this trait, so runs
/// can be driven against a real toolchain or an in-memory double.
// TODO: allow hardware-wallet signers, forge supports --ledger
#[async_trait]
pub trait ContractBackend: Send + Sync + fmt::Debug {
    async fn deploy(
        &self,
        contract: &ContractSpec,
        args: &[Value],
        from: Option<&PrivateKey>,
        libraries: &[Library],
    ) -> eyre::Result<Deployment>;

    async fn verify(
        &self,
        contract: &ContractSpec,
        address: Address,
        args: &[Value],
    ) -> eyre::Result<()>;
}

/// Chain-less backend double. Addresses are handed out from a counter so
/// repeated runs are deterministic, and every call is recorded for
/// inspection.
#[derive(Debug, Default)]
pub struct MockBackend {
    counter: AtomicU64,
    reject_verifications: AtomicBool,
    deploys: Mutex<Vec<MockDeploy>>,
    verifications: Mutex<Vec<(String, Address)>>,
}

#[derive(Debug, Clone)]
pub struct MockDeploy {
    pub contract: String,
    pub args: Vec<Value>,
    pub libraries: Vec<String>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes all subsequent `verify` calls fail, the way an explorer outage
    /// would.
    pub fn reject_verifications(&self) {
        self.reject_verifications.store(true, Ordering::SeqCst);
    }

    pub fn deploy_count(&self) -> usize {
        self.deploys.lock().expect("backend lock poisoned").len()
    }

    pub fn deploys(&self) -> Vec<MockDeploy> {
        self.deploys.lock().expect("backend lock poisoned").clone()
    }

    pub fn verifications(&self) -> Vec<(String, Address)> {
        self.verifications
            .lock()
            .expect("backend lock poisoned")
            .clone()
    }
}

#[async_trait]
impl ContractBackend for MockBackend {
    async fn deploy(
        &self,
        contract: &ContractSpec,
        args: &[Value],
        _from: Option<&PrivateKey>,
        libraries: &[Library],
    ) -> eyre::Result<Deployment> {
        let nth = self.counter.fetch_add(1, Ordering::SeqCst) + 1;

        self.deploys
            .lock()
            .expect("backend lock poisoned")
            .push(MockDeploy {
                contract: contract.to_string(),
                args: args.to_vec(),
                libraries: libraries.iter().map(ToString::to_string).collect(),
            });

        Ok(Deployment {
            address: Address::from_low_u64_be(nth),
            deployer: Address::zero(),
            transaction_hash: H256::from_low_u64_be(nth),
        })
    }

    async fn verify(
        &self,
        contract: &ContractSpec,
        address: Address,
        _args: &[Value],
    ) -> eyre::Result<()> {
        if self.reject_verifications.load(Ordering::SeqCst) {
            eyre::bail!("explorer rejected the submission for {contract}");
        }

        self.verifications
            .lock()
            .expect("backend lock poisoned")
            .push((contract.to_string(), address));

        Ok(())
    }
}
