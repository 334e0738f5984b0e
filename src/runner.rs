//! Sequential task execution. Tasks run strictly one at a time, in the
//! order they were registered, and the first failure aborts the run.
//! Already-active tasks are skipped unless forced, so an aborted run can be
//! resumed by invoking it again.

use std::sync::Arc;

use tracing::info;

use crate::context::DeploymentContext;
use crate::registry::TaskRegistry;
use crate::task::{TaskMode, TaskRunOptions};
use crate::types::TaskId;

pub async fn run_all(
    registry: &Arc<TaskRegistry>,
    context: Arc<DeploymentContext>,
    mode: TaskMode,
    options: &TaskRunOptions,
) -> eyre::Result<()> {
    registry.validate()?;

    for task in registry.tasks(mode, context.clone()) {
        task.run(options).await?;
    }

    info!("All tasks up to date on {}", context.network());

    Ok(())
}

pub async fn run_one(
    registry: &Arc<TaskRegistry>,
    context: Arc<DeploymentContext>,
    mode: TaskMode,
    id: &TaskId,
    options: &TaskRunOptions,
) -> eyre::Result<()> {
    registry.validate()?;

    let task = registry.task(id, mode, context)?;

    task.run(options).await
}
