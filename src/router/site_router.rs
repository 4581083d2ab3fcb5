//! Host-facing router
//!
//! [`SiteRouter`] is what the host framework holds on to: it resolves
//! request paths against the current route tree and hands the tree to a
//! [`RouteRegistrar`] when the host wants to mount it in its own router.

use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use crate::router::node::{ComposedSite, ResolvedRoute, RouteNode};
use crate::site::Site;

/// Receives the composed route tree
pub trait RouteRegistrar {
    fn register_routes(&mut self, root: &RouteNode);
}

impl<F> RouteRegistrar for F
where
    F: FnMut(&RouteNode),
{
    fn register_routes(&mut self, root: &RouteNode) {
        self(root)
    }
}

/// Resolves paths against a [`Site`]
#[derive(Clone)]
pub struct SiteRouter {
    site: Arc<Site>,
}

impl SiteRouter {
    pub fn new(site: Arc<Site>) -> Self {
        Self { site }
    }

    pub fn site(&self) -> &Arc<Site> {
        &self.site
    }

    /// Current route tree; cheap when nothing changed since the last call
    pub fn snapshot(&self) -> Arc<ComposedSite> {
        self.site.route_table()
    }

    /// Resolve a request path; `None` means not found
    pub fn resolve(&self, path: &str) -> Option<ResolvedRoute> {
        let resolved = self.snapshot().resolve(path);
        if resolved.is_none() {
            debug!("No route for {}", path);
        }
        resolved
    }

    /// Absolute path of a named route (`project:overview:index`)
    pub fn reverse(&self, name: &str, kwargs: &BTreeMap<String, String>) -> Option<String> {
        self.snapshot().reverse(name, kwargs)
    }

    /// Hand the current tree to the host; returns the version installed
    pub fn install(&self, registrar: &mut impl RouteRegistrar) -> u64 {
        let snapshot = self.snapshot();
        registrar.register_routes(&snapshot.root);
        debug!("Installed route tree v{}", snapshot.version);
        snapshot.version
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::site::{DashboardDescriptor, Panel, PanelDescriptor, PanelGroup, RouteFragment};
    use crate::slug::Slug;

    #[test]
    fn test_install_passes_current_tree() {
        let site = Arc::new(Site::new());
        site.register_dashboard(
            DashboardDescriptor::new(Slug::new("project").unwrap(), "Project")
                .with_group(PanelGroup::default_group()),
        )
        .unwrap();
        let router = SiteRouter::new(Arc::clone(&site));

        let mut seen = Vec::new();
        let mut registrar = |root: &RouteNode| seen.push(root.children.len());
        let version = router.install(&mut registrar);
        assert_eq!(version, site.version());
        assert_eq!(seen, vec![1]);

        let descriptor = PanelDescriptor::new(
            Slug::new("overview").unwrap(),
            Slug::new("project").unwrap(),
            "overview",
        );
        let routes = vec![RouteFragment::named("^$", "overview.index", "index").unwrap()];
        site.register_panel(Panel::new(descriptor, "Overview", routes).unwrap())
            .unwrap();
        assert_eq!(
            router.reverse("project:overview:index", &BTreeMap::new()).as_deref(),
            Some("/project/overview/")
        );
        assert_eq!(
            router.resolve("/project/").unwrap().redirect_location(),
            Some("/project/overview/")
        );
    }
}
