//! URL composition
//!
//! Builds the route tree from the registries and publishes it through an
//! [`ArcSwap`]. Readers never block: they load the published tree and only
//! rebuild when the registry version has moved past it. Rebuilds are
//! serialized by a mutex so concurrent readers of a stale tree trigger one
//! build between them.

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::RegistryWarning;
use crate::permissions::PermissionSet;
use crate::router::node::{ComposedSite, Route, RouteNode, RouteTarget};
use crate::router::pattern::Pattern;
use crate::site::dashboard_registry::DashboardTable;
use crate::site::panel::{Panel, RouteFragment};
use crate::site::panel_registry::PanelTable;

/// Name of the dashboard index route
pub const INDEX_ROUTE: &str = "index";

/// Compose the route tree for one consistent view of the registries
pub(crate) fn compose(
    version: u64,
    dashboards: &DashboardTable,
    panels: &PanelTable,
    host_routes: &[RouteFragment],
) -> ComposedSite {
    let mut warnings = Vec::new();
    let mut root = RouteNode::new(Pattern::root(), None, PermissionSet::new());

    for dashboard in dashboards.iter() {
        let slug = dashboard.slug();
        let mut node = RouteNode::new(
            Pattern::segment(slug.as_str()),
            Some(slug.to_string()),
            dashboard.required_permissions().clone(),
        );

        for panel_slug in dashboard.enabled_panels() {
            let Some(panel) = panels.get(slug.as_str(), panel_slug.as_str()) else {
                continue;
            };
            node.children.push(panel_node(panel, &node));
        }

        for orphan in dashboard.orphans() {
            warnings.push(RegistryWarning::OrphanPanel {
                dashboard: slug.to_string(),
                panel: orphan.to_string(),
            });
        }

        let (default, missing) = dashboard.effective_default();
        if let Some(warning) = missing {
            warnings.push(warning);
        }
        if let Some(default) = default {
            if let Some(panel) = panels.get(slug.as_str(), default.as_str()) {
                node.routes.push(Route {
                    pattern: Pattern::empty(),
                    name: Some(INDEX_ROUTE.to_string()),
                    target: RouteTarget::Redirect {
                        location: format!("/{}/{}/", slug, panel.mount_prefix()),
                    },
                });
            }
        }

        root.children.push(node);
    }

    root.routes.extend(host_routes.iter().map(handler_route));
    if let Some(default) = &dashboards.default_dashboard {
        if dashboards.contains(default.as_str()) {
            root.routes.push(Route {
                pattern: Pattern::empty(),
                name: None,
                target: RouteTarget::Redirect {
                    location: format!("/{}/", default),
                },
            });
        }
    }

    for warning in &warnings {
        warn!("{}", warning);
    }
    debug!(
        "Composed route tree v{} with {} dashboards",
        version,
        root.children.len()
    );

    ComposedSite {
        version,
        root,
        warnings,
    }
}

fn panel_node(panel: &Panel, dashboard: &RouteNode) -> RouteNode {
    let namespace = dashboard
        .namespace
        .as_ref()
        .map(|ns| format!("{}:{}", ns, panel.slug()));
    let mut node = RouteNode::new(
        Pattern::segment(panel.mount_prefix()),
        namespace,
        dashboard.permissions.union(panel.required_permissions()),
    );
    node.routes = panel.routes().iter().map(handler_route).collect();
    node
}

fn handler_route(fragment: &RouteFragment) -> Route {
    Route {
        pattern: fragment.pattern.clone(),
        name: fragment.name.clone(),
        target: RouteTarget::Handler {
            handler: fragment.handler.clone(),
        },
    }
}

/// Lazily rebuilt, atomically published route tree
#[derive(Debug)]
pub struct UrlComposer {
    published: ArcSwap<ComposedSite>,
    build_lock: Mutex<()>,
}

impl UrlComposer {
    /// Start from an already composed tree
    pub(crate) fn new(initial: ComposedSite) -> Self {
        Self {
            published: ArcSwap::from_pointee(initial),
            build_lock: Mutex::new(()),
        }
    }

    /// Tree for the current registry `version`, rebuilding if stale
    ///
    /// `build` must compose under the registry read locks and stamp the
    /// tree with the version it observed there.
    pub(crate) fn current(
        &self,
        version: impl Fn() -> u64,
        build: impl FnOnce() -> ComposedSite,
    ) -> Arc<ComposedSite> {
        let published = self.published.load_full();
        if published.version == version() {
            return published;
        }

        let _guard = self.build_lock.lock();
        let published = self.published.load_full();
        if published.version == version() {
            return published;
        }
        let composed = Arc::new(build());
        self.published.store(Arc::clone(&composed));
        composed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

    fn empty(version: u64) -> ComposedSite {
        compose(
            version,
            &DashboardTable::default(),
            &PanelTable::default(),
            &[],
        )
    }

    #[test]
    fn test_rebuilds_only_when_stale() {
        let composer = UrlComposer::new(empty(0));
        let version = AtomicU64::new(0);
        let builds = AtomicUsize::new(0);
        let build = || {
            builds.fetch_add(1, Ordering::SeqCst);
            empty(version.load(Ordering::SeqCst))
        };

        let first = composer.current(|| version.load(Ordering::SeqCst), build);
        assert_eq!(first.version, 0);
        assert_eq!(builds.load(Ordering::SeqCst), 0);

        version.store(3, Ordering::SeqCst);
        let second = composer.current(|| version.load(Ordering::SeqCst), build);
        assert_eq!(second.version, 3);
        assert_eq!(builds.load(Ordering::SeqCst), 1);

        let third = composer.current(|| version.load(Ordering::SeqCst), build);
        assert!(Arc::ptr_eq(&second, &third));
        assert_eq!(builds.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_host_routes_precede_default_redirect() {
        let host = vec![RouteFragment::named("^home/$", "user_home", "user_home").unwrap()];
        let composed = compose(1, &DashboardTable::default(), &PanelTable::default(), &host);
        assert_eq!(composed.root.routes.len(), 1);
        assert!(composed.resolve("/").is_none());
        assert!(composed.resolve("/home/").is_some());
    }
}
