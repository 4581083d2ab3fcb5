//! Dashboard Registry - pluggable dashboards and panels for a web console
//!
//! Plugins describe dashboards, panels and panel groups in small TOML
//! descriptor files. The registry loads them in order, keeps the resulting
//! dashboards and panels in concurrent registries and composes a URL route
//! tree (`/<dashboard>/<panel>/...`) that the host web framework mounts.
//!
//! ## Layout
//!
//! - [`plugin`]: descriptor discovery, parsing and application
//! - [`site`]: dashboard and panel registries behind one [`Site`]
//! - [`router`]: route tree composition, resolution and reversal
//! - [`config`]: site configuration
//!
//! ## Example
//!
//! ```rust,no_run
//! use dashboard_registry::{index_only, DescriptorLoader, PanelFactories, Site, SiteRouter};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! let site = Arc::new(Site::new());
//! let factories = PanelFactories::new().with_fallback(index_only());
//! DescriptorLoader::new(&site, &factories).load_dir(Path::new("enabled"))?;
//!
//! let router = SiteRouter::new(site);
//! let resolved = router.resolve("/project/overview/");
//! # Ok::<(), dashboard_registry::RegistryError>(())
//! ```

pub mod config;
pub mod error;
pub mod permissions;
pub mod plugin;
pub mod router;
pub mod site;
pub mod slug;
pub mod utils;

pub use config::{DashboardPolicy, LoggingConfig, SiteConfig};
pub use error::{RegistryError, RegistryWarning};
pub use permissions::{Permission, PermissionSet};
pub use plugin::{
    index_only, Descriptor, DescriptorLoader, HostContributions, LoadReport, PanelBlueprint,
    PanelFactories,
};
pub use router::{ComposedSite, Pattern, ResolvedRoute, RouteNode, RouteRegistrar, RouteTarget, SiteRouter};
pub use site::{
    Dashboard, DashboardDescriptor, HandlerRef, Panel, PanelChange, PanelDescriptor, PanelGroup,
    RouteFragment, Site,
};
pub use slug::Slug;

use anyhow::Context;
use std::path::Path;
use std::sync::Arc;

/// Load a site from configuration: register every enabled descriptor and
/// choose the default dashboard
///
/// `base` resolves a relative `descriptors_dir`. A descriptor marked
/// `DEFAULT` wins over `default_dashboard` in the configuration.
pub fn load_site(
    config: &SiteConfig,
    base: &Path,
    factories: &PanelFactories,
) -> anyhow::Result<(Arc<Site>, LoadReport)> {
    config.validate()?;
    let site = Arc::new(Site::new());
    let dir = config.descriptors_path(base);
    let report = DescriptorLoader::new(&site, factories)
        .with_policy(config.dashboard_policy())
        .load_dir(&dir)
        .with_context(|| format!("Failed to load descriptors from {}", dir.display()))?;

    let default = match &report.default_dashboard {
        Some(slug) => Some(slug.clone()),
        None => config.default_dashboard_slug()?,
    };
    site.set_default_dashboard(default);
    Ok((site, report))
}
