use ethers::types::Address;

use crate::types::{Network, TaskId};

/// Failure taxonomy of the harness itself.
///
/// Deployment failures coming out of the toolchain are not enumerated here,
/// they propagate unmodified as reports.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("task `{task}` has no input `{field}` for network `{network}`")]
    MissingInput {
        task: TaskId,
        field: String,
        network: Network,
    },

    #[error("task `{task}` input does not match its schema")]
    InvalidInput {
        task: TaskId,
        #[source]
        source: serde_json::Error,
    },

    #[error("task `{task}` has not been deployed on network `{network}`")]
    NotDeployed { task: TaskId, network: Network },

    #[error("no deployment transaction recorded for {address:?} on network `{network}`")]
    UnknownTransaction { address: Address, network: Network },

    #[error("reference to unknown task `{id}`")]
    UnknownTask { id: TaskId },

    #[error("task `{id}` is registered twice")]
    DuplicateTask { id: TaskId },

    #[error("dependency cycle: {path}")]
    DependencyCycle { path: String },

    #[error("task `{task}` is read-only and cannot run deployments")]
    ReadOnly { task: TaskId },

    #[error("invalid task id `{id}`, expected `YYYYMMDD-slug`")]
    InvalidTaskId { id: String },
}
