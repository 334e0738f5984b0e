//! Registered task definitions and the dependency graph they form.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::context::DeploymentContext;
use crate::error::Error;
use crate::task::{Task, TaskDefinition, TaskMode};
use crate::types::TaskId;

/// Ordered collection of task definitions. Registration order is the
/// declared execution order.
#[derive(Debug, Default)]
pub struct TaskRegistry {
    definitions: Vec<Arc<TaskDefinition>>,
    by_id: HashMap<TaskId, usize>,
}

enum Visit {
    InProgress,
    Done,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, definition: TaskDefinition) -> eyre::Result<()> {
        let id = definition.id().clone();

        if self.by_id.contains_key(&id) {
            return Err(Error::DuplicateTask { id }.into());
        }

        self.by_id.insert(id, self.definitions.len());
        self.definitions.push(Arc::new(definition));

        Ok(())
    }

    pub fn get(&self, id: &TaskId) -> eyre::Result<&Arc<TaskDefinition>> {
        self.by_id
            .get(id)
            .map(|index| &self.definitions[*index])
            .ok_or_else(|| Error::UnknownTask { id: id.clone() }.into())
    }

    pub fn ids(&self) -> impl Iterator<Item = &TaskId> {
        self.definitions.iter().map(|definition| definition.id())
    }

    /// Binds one definition to a mode and context. No side effects.
    pub fn task(
        self: &Arc<Self>,
        id: &TaskId,
        mode: TaskMode,
        context: Arc<DeploymentContext>,
    ) -> eyre::Result<Task> {
        let definition = self.get(id)?.clone();

        Ok(Task::new(definition, mode, self.clone(), context))
    }

    /// All tasks in registration order.
    pub fn tasks(
        self: &Arc<Self>,
        mode: TaskMode,
        context: Arc<DeploymentContext>,
    ) -> Vec<Task> {
        self.definitions
            .iter()
            .map(|definition| {
                Task::new(definition.clone(), mode, self.clone(), context.clone())
            })
            .collect()
    }

    /// The transitive set of tasks that supersede the given one.
    pub fn superseding(&self, id: &TaskId) -> Vec<TaskId> {
        let mut found = Vec::new();
        let mut visited = HashSet::new();
        let mut queue = vec![id.clone()];

        while let Some(current) = queue.pop() {
            for definition in &self.definitions {
                if definition.superseded_ids().contains(&current)
                    && visited.insert(definition.id().clone())
                {
                    found.push(definition.id().clone());
                    queue.push(definition.id().clone());
                }
            }
        }

        found
    }

    /// Checks that every input and supersedes reference resolves to a
    /// registered task and that the reference graph is acyclic. Runs before
    /// any execution, so configuration mistakes surface before the first
    /// network call.
    pub fn validate(&self) -> eyre::Result<()> {
        for definition in &self.definitions {
            for reference in definition.references() {
                if !self.by_id.contains_key(&reference) {
                    return Err(Error::UnknownTask { id: reference }.into());
                }
            }
        }

        let mut state = HashMap::new();

        for definition in &self.definitions {
            self.visit(definition.id(), &mut state, &mut Vec::new())?;
        }

        Ok(())
    }

    fn visit(
        &self,
        id: &TaskId,
        state: &mut HashMap<TaskId, Visit>,
        stack: &mut Vec<TaskId>,
    ) -> Result<(), Error> {
        match state.get(id) {
            Some(Visit::Done) => return Ok(()),
            Some(Visit::InProgress) => {
                let start = stack
                    .iter()
                    .position(|other| other == id)
                    .unwrap_or_default();

                let mut path: Vec<String> =
                    stack[start..].iter().map(ToString::to_string).collect();
                path.push(id.to_string());

                return Err(Error::DependencyCycle {
                    path: path.join(" -> "),
                });
            }
            None => {}
        }

        state.insert(id.clone(), Visit::InProgress);
        stack.push(id.clone());

        let index = self.by_id[id];

        for reference in self.definitions[index].references() {
            self.visit(&reference, state, stack)?;
        }

        stack.pop();
        state.insert(id.clone(), Visit::Done);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::task::{DeploymentScript, Input, Inputs, TaskRunOptions};

    struct Noop;

    #[async_trait]
    impl DeploymentScript for Noop {
        async fn run(
            &self,
            _task: &Task,
            _options: &TaskRunOptions,
        ) -> eyre::Result<()> {
            Ok(())
        }
    }

    fn definition(id: &str) -> TaskDefinition {
        TaskDefinition::new(id.parse().unwrap(), Noop)
    }

    #[test]
    fn rejects_duplicate_registration() {
        let mut registry = TaskRegistry::new();

        registry.register(definition("20210418-vault")).unwrap();

        let err = registry.register(definition("20210418-vault")).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::DuplicateTask { .. })
        ));
    }

    #[test]
    fn rejects_references_to_unknown_tasks() {
        let mut registry = TaskRegistry::new();

        let vault = definition("20210418-vault").with_inputs(Inputs::new().common(
            "Authorizer",
            Input::output("20210418-authorizer".parse().unwrap(), "Authorizer"),
        ));

        registry.register(vault).unwrap();

        let err = registry.validate().unwrap_err();

        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::UnknownTask { .. })
        ));
    }

    #[test]
    fn rejects_dependency_cycles() {
        let mut registry = TaskRegistry::new();

        let a = definition("20210418-authorizer").with_inputs(Inputs::new().common(
            "Vault",
            Input::output("20210418-vault".parse().unwrap(), "Vault"),
        ));
        let b = definition("20210418-vault").with_inputs(Inputs::new().common(
            "Authorizer",
            Input::output("20210418-authorizer".parse().unwrap(), "Authorizer"),
        ));

        registry.register(a).unwrap();
        registry.register(b).unwrap();

        let err = registry.validate().unwrap_err();

        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::DependencyCycle { .. })
        ));
    }

    #[test]
    fn supersession_is_transitive() {
        let mut registry = TaskRegistry::new();

        let v1: TaskId = "20210418-weighted-pool-factory".parse().unwrap();
        let v2: TaskId = "20220908-weighted-pool-factory-v2".parse().unwrap();
        let v4: TaskId = "20230320-weighted-pool-factory-v4".parse().unwrap();

        registry.register(definition(v1.as_str())).unwrap();
        registry
            .register(definition(v2.as_str()).supersedes(v1.clone()))
            .unwrap();
        registry
            .register(definition(v4.as_str()).supersedes(v2.clone()))
            .unwrap();

        registry.validate().unwrap();

        let superseding = registry.superseding(&v1);

        assert!(superseding.contains(&v2));
        assert!(superseding.contains(&v4));
        assert!(registry.superseding(&v4).is_empty());
    }
}
