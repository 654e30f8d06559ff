use super::{CreateArgs, Hosted};
use crate::{
    errors::HostError,
    framework::{TestFramework, TestFrameworkDiscoverer, TestFrameworkExecutor},
};
use std::{collections::HashMap, sync::Arc};

type Factory = Box<dyn Fn(&CreateArgs<'_>) -> Result<Hosted, HostError> + Send + Sync>;

/// Maps `(module, type name)` to a constructor. This is what a boundary
/// instantiates objects from.
#[derive(Default)]
pub struct Registry {
    factories: HashMap<(String, String), Factory>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(
        &mut self,
        module: impl Into<String>,
        type_name: impl Into<String>,
        factory: F,
    ) -> &mut Self
    where
        F: Fn(&CreateArgs<'_>) -> Result<Hosted, HostError> + Send + Sync + 'static,
    {
        self.factories
            .insert((module.into(), type_name.into()), Box::new(factory));
        self
    }

    pub fn register_framework<F>(
        &mut self,
        module: impl Into<String>,
        type_name: impl Into<String>,
        factory: F,
    ) -> &mut Self
    where
        F: Fn(&CreateArgs<'_>) -> Result<Arc<dyn TestFramework>, HostError>
            + Send
            + Sync
            + 'static,
    {
        self.register(module, type_name, move |args| {
            factory(args).map(Hosted::Framework)
        })
    }

    pub fn register_discoverer<F>(
        &mut self,
        module: impl Into<String>,
        type_name: impl Into<String>,
        factory: F,
    ) -> &mut Self
    where
        F: Fn(&CreateArgs<'_>) -> Result<Arc<dyn TestFrameworkDiscoverer>, HostError>
            + Send
            + Sync
            + 'static,
    {
        self.register(module, type_name, move |args| {
            factory(args).map(Hosted::Discoverer)
        })
    }

    pub fn register_executor<F>(
        &mut self,
        module: impl Into<String>,
        type_name: impl Into<String>,
        factory: F,
    ) -> &mut Self
    where
        F: Fn(&CreateArgs<'_>) -> Result<Arc<dyn TestFrameworkExecutor>, HostError>
            + Send
            + Sync
            + 'static,
    {
        self.register(module, type_name, move |args| {
            factory(args).map(Hosted::Executor)
        })
    }

    pub fn contains(&self, module: &str, type_name: &str) -> bool {
        self.factories
            .contains_key(&(module.to_string(), type_name.to_string()))
    }

    pub(crate) fn instantiate(
        &self,
        module: &str,
        type_name: &str,
        args: &CreateArgs<'_>,
    ) -> Result<Hosted, HostError> {
        let factory = self
            .factories
            .get(&(module.to_string(), type_name.to_string()))
            .ok_or_else(|| {
                HostError::Boundary(format!(
                    "{}: no type named {} is registered",
                    module, type_name
                ))
            })?;
        factory(args)
    }
}
