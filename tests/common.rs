//! Shared helpers for registry integration tests

#![allow(dead_code)]

use dashboard_registry::{
    DashboardDescriptor, DescriptorLoader, LoadReport, Panel, PanelBlueprint, PanelDescriptor,
    PanelFactories, PanelGroup, RegistryError, RouteFragment, Site, Slug,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// A temporary descriptor directory
pub struct DescriptorDir {
    pub temp_dir: TempDir,
}

impl DescriptorDir {
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().unwrap(),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Write a descriptor file and return its path
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    /// Write raw bytes, for files that are not valid UTF-8
    pub fn write_bytes(&self, name: &str, contents: &[u8]) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    /// Load the directory into a fresh site
    pub fn load(&self) -> Result<(Arc<Site>, LoadReport), RegistryError> {
        let site = Arc::new(Site::new());
        let report = DescriptorLoader::new(&site, &test_factories()).load_dir(self.path())?;
        if let Some(default) = &report.default_dashboard {
            site.set_default_dashboard(Some(default.clone()));
        }
        Ok((site, report))
    }
}

/// Factories for every `ADD_PANEL` key the tests use
///
/// `<dashboard>.<panel>` keys get an `index` route handled by the key;
/// `network.routers` also gets a detail route. Unknown keys fall back to
/// an index-only panel.
pub fn test_factories() -> PanelFactories {
    PanelFactories::new()
        .with("network.routers", |d: &PanelDescriptor| {
            Ok(PanelBlueprint::new(vec![
                RouteFragment::named("^$", d.class_ref.as_str(), "index")?,
                RouteFragment::named(r"^create/$", "routers.create", "create")?,
                RouteFragment::named(r"^(?P<router_id>[^/]+)/$", "routers.detail", "detail")?,
            ]))
        })
        .with_fallback(dashboard_registry::index_only())
}

pub fn slug(value: &str) -> Slug {
    Slug::new(value).unwrap()
}

/// A dashboard with a `default` group
pub fn dashboard(name: &str) -> DashboardDescriptor {
    DashboardDescriptor::new(slug(name), name).with_group(PanelGroup::default_group())
}

/// An enabled panel with an `index` route handled by `<dashboard>.<panel>`
pub fn panel(dashboard: &str, name: &str) -> Panel {
    let handler = format!("{}.{}", dashboard, name);
    Panel::new(
        PanelDescriptor::new(slug(name), slug(dashboard), handler.as_str()),
        name,
        vec![RouteFragment::named("^$", handler.as_str(), "index").unwrap()],
    )
    .unwrap()
}

pub fn slugs(values: &[Slug]) -> Vec<&str> {
    values.iter().map(Slug::as_str).collect()
}
