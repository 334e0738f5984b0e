//! Built-in deployment tasks, registered in execution order. Authors list
//! tasks so that anything a task references appears before it.

pub mod authorizer;
pub mod batch_relayer;
pub mod vault;
pub mod weighted_pool_factory;
pub mod weighted_pool_factory_v4;

use crate::registry::TaskRegistry;

pub fn registry() -> eyre::Result<TaskRegistry> {
    let mut registry = TaskRegistry::new();

    registry.register(authorizer::definition()?)?;
    registry.register(vault::definition()?)?;
    registry.register(weighted_pool_factory::definition()?)?;
    registry.register(weighted_pool_factory_v4::definition()?)?;
    registry.register(batch_relayer::definition()?)?;

    registry.validate()?;

    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn built_in_registry_is_valid() {
        registry().unwrap();
    }
}
