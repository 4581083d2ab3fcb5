//! Panel factories
//!
//! `ADD_PANEL` names a factory registered by the host at startup. The
//! factory turns a panel descriptor into the panel's route fragments.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::RegistryError;
use crate::permissions::PermissionSet;
use crate::site::panel::{Panel, PanelDescriptor, RouteFragment};

/// What a factory contributes to a panel
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PanelBlueprint {
    /// Display name, unless the descriptor sets `PANEL_NAME`
    pub name: Option<String>,
    pub routes: Vec<RouteFragment>,
    /// Added to the descriptor's permissions
    pub permissions: PermissionSet,
}

impl PanelBlueprint {
    pub fn new(routes: Vec<RouteFragment>) -> Self {
        Self {
            routes,
            ..Default::default()
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_permissions(mut self, permissions: PermissionSet) -> Self {
        self.permissions = permissions;
        self
    }
}

pub type PanelFactory =
    Arc<dyn Fn(&PanelDescriptor) -> Result<PanelBlueprint, RegistryError> + Send + Sync>;

/// Factory that mounts a single `index` route handled by the factory key
pub fn index_only() -> PanelFactory {
    Arc::new(|descriptor: &PanelDescriptor| -> Result<PanelBlueprint, RegistryError> {
        Ok(PanelBlueprint::new(vec![RouteFragment::named(
            "^$",
            descriptor.class_ref.as_str(),
            "index",
        )?]))
    })
}

/// Factories keyed by `ADD_PANEL` value
#[derive(Clone, Default)]
pub struct PanelFactories {
    factories: HashMap<String, PanelFactory>,
    fallback: Option<PanelFactory>,
}

impl PanelFactories {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory under `key`, replacing any previous one
    pub fn register<F>(&mut self, key: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(&PanelDescriptor) -> Result<PanelBlueprint, RegistryError> + Send + Sync + 'static,
    {
        self.factories.insert(key.into(), Arc::new(factory));
        self
    }

    pub fn with<F>(mut self, key: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&PanelDescriptor) -> Result<PanelBlueprint, RegistryError> + Send + Sync + 'static,
    {
        self.register(key, factory);
        self
    }

    /// Factory used for keys with no registered factory
    pub fn with_fallback(mut self, fallback: PanelFactory) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Build the panel a descriptor asks for
    pub fn build(
        &self,
        descriptor: PanelDescriptor,
        name: Option<String>,
    ) -> Result<Panel, RegistryError> {
        let factory = self
            .factories
            .get(&descriptor.class_ref)
            .or(self.fallback.as_ref())
            .ok_or_else(|| RegistryError::NotFound(format!("panel factory {}", descriptor.class_ref)))?;
        let blueprint = factory(&descriptor)?;

        let name = name
            .or(blueprint.name)
            .unwrap_or_else(|| descriptor.slug.display_name());
        let permissions = descriptor.permissions.union(&blueprint.permissions);
        Panel::new(descriptor.with_permissions(permissions), name, blueprint.routes)
    }
}

impl fmt::Debug for PanelFactories {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<&String> = self.factories.keys().collect();
        keys.sort();
        f.debug_struct("PanelFactories")
            .field("keys", &keys)
            .field("fallback", &self.fallback.is_some())
            .finish()
    }
}
