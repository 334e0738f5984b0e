use std::collections::BTreeMap;

use ethers::types::Address;
use serde_json::Value;

use crate::types::{ContractName, Network, TaskId};

/// One declared input parameter.
#[derive(Debug, Clone)]
pub enum Input {
    /// A literal value, used verbatim.
    Value(Value),

    /// A known on-chain address.
    Address(Address),

    /// The recorded output of another task.
    Output {
        task: TaskId,
        contract: ContractName,
    },
}

impl Input {
    pub fn value(value: impl Into<Value>) -> Self {
        Self::Value(value.into())
    }

    pub fn address(address: Address) -> Self {
        Self::Address(address)
    }

    pub fn output(task: TaskId, contract: impl Into<ContractName>) -> Self {
        Self::Output {
            task,
            contract: contract.into(),
        }
    }
}

/// Declared value of a parameter: shared across networks or keyed by network
/// name.
#[derive(Debug, Clone)]
pub enum InputSpec {
    Common(Input),
    PerNetwork(BTreeMap<Network, Input>),
}

impl InputSpec {
    pub fn for_network(&self, network: &Network) -> Option<&Input> {
        match self {
            Self::Common(input) => Some(input),
            Self::PerNetwork(map) => map.get(network),
        }
    }
}

/// The full input declaration of a task.
#[derive(Debug, Clone, Default)]
pub struct Inputs {
    params: BTreeMap<String, InputSpec>,
}

impl Inputs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a parameter shared by every network.
    pub fn common(mut self, name: &str, input: Input) -> Self {
        self.params.insert(name.to_owned(), InputSpec::Common(input));
        self
    }

    /// Declares a parameter value for one network. Repeated calls with the
    /// same name extend the per-network table.
    pub fn for_network(mut self, name: &str, network: &str, input: Input) -> Self {
        let mut map = match self.params.remove(name) {
            Some(InputSpec::PerNetwork(map)) => map,
            _ => BTreeMap::new(),
        };

        map.insert(Network::from(network), input);

        self.params
            .insert(name.to_owned(), InputSpec::PerNetwork(map));
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &InputSpec)> {
        self.params.iter()
    }

    /// Every task referenced by any parameter on any network.
    pub fn references(&self) -> Vec<TaskId> {
        let mut references = Vec::new();

        for spec in self.params.values() {
            let inputs: Vec<&Input> = match spec {
                InputSpec::Common(input) => vec![input],
                InputSpec::PerNetwork(map) => map.values().collect(),
            };

            for input in inputs {
                if let Input::Output { task, .. } = input {
                    references.push(task.clone());
                }
            }
        }

        references
    }
}
