use std::collections::BTreeMap;

use anyhow::Result;

use super::collector::CollectionModule;
use super::{filesystem, live_system, network, system_logs};
use crate::config::ModuleSettings;
use crate::error::CollectionError;
use crate::models::ModuleInfo;

/// Builds a module instance from its configured settings.
pub type ModuleFactory =
    Box<dyn Fn(&ModuleSettings) -> Result<Box<dyn CollectionModule>> + Send + Sync>;

/// Table of module ids to constructors, filled at registration time.
pub struct ModuleRegistry {
    factories: BTreeMap<String, ModuleFactory>,
}

impl ModuleRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// The modules shipped with the collector.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(live_system::MODULE_ID, |s| {
            Ok(Box::new(live_system::LiveSystemModule::new(s)?))
        });
        registry.register(network::MODULE_ID, |s| Ok(Box::new(network::NetworkModule::new(s)?)));
        registry.register(filesystem::MODULE_ID, |s| {
            Ok(Box::new(filesystem::FilesystemModule::new(s)?))
        });
        registry.register(system_logs::MODULE_ID, |s| {
            Ok(Box::new(system_logs::SystemLogsModule::new(s)?))
        });
        registry
    }

    /// Add or replace the factory for `id`.
    pub fn register<F>(&mut self, id: &str, factory: F)
    where
        F: Fn(&ModuleSettings) -> Result<Box<dyn CollectionModule>> + Send + Sync + 'static,
    {
        self.factories.insert(id.to_string(), Box::new(factory));
    }

    pub fn contains(&self, id: &str) -> bool {
        self.factories.contains_key(id)
    }

    /// Registered ids in sorted order.
    pub fn ids(&self) -> Vec<String> {
        self.factories.keys().cloned().collect()
    }

    /// Build the module registered under `id`.
    pub fn create(
        &self,
        id: &str,
        settings: &ModuleSettings,
    ) -> std::result::Result<Box<dyn CollectionModule>, CollectionError> {
        let factory = self
            .factories
            .get(id)
            .ok_or_else(|| CollectionError::UnknownModule(id.to_string()))?;

        factory(settings).map_err(|e| CollectionError::ModuleConstruction {
            id: id.to_string(),
            reason: format!("{:#}", e),
        })
    }

    /// Module descriptions, built with default settings.
    pub fn describe(&self) -> Vec<ModuleInfo> {
        self.factories
            .iter()
            .filter_map(|(id, factory)| match factory(&ModuleSettings::new()) {
                Ok(module) => Some(module.get_module_info()),
                Err(e) => {
                    log::warn!("Cannot describe module {}: {:#}", id, e);
                    None
                }
            })
            .collect()
    }
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
