//! The site: dashboards, panels and the route tree composed from them
//!
//! All mutation goes through [`Site`]. Locks are always taken in the order
//! dashboards, panels, host routes; every successful mutation bumps the
//! registry version while still holding them, so a composed tree stamped
//! with version `v` reflects exactly the state at `v`.

pub mod dashboard;
pub mod dashboard_registry;
pub mod panel;
pub mod panel_registry;

use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::RegistryError;
use crate::router::composer::{compose, UrlComposer};
use crate::router::node::ComposedSite;
use crate::slug::Slug;

pub use dashboard::{Dashboard, DashboardDescriptor, PanelGroup, DEFAULT_GROUP};
pub use dashboard_registry::DashboardRegistry;
pub use panel::{HandlerRef, Panel, PanelDescriptor, RouteFragment};
pub use panel_registry::PanelRegistry;

use dashboard_registry::DashboardTable;
use panel_registry::PanelTable;

/// Dashboard and panel registries plus the published route tree
#[derive(Debug)]
pub struct Site {
    dashboards: DashboardRegistry,
    panels: PanelRegistry,
    host_routes: RwLock<Vec<RouteFragment>>,
    version: AtomicU64,
    composer: UrlComposer,
}

impl Default for Site {
    fn default() -> Self {
        Self::new()
    }
}

impl Site {
    pub fn new() -> Self {
        Self {
            dashboards: DashboardRegistry::new(),
            panels: PanelRegistry::new(),
            host_routes: RwLock::new(Vec::new()),
            version: AtomicU64::new(0),
            composer: UrlComposer::new(compose(
                0,
                &DashboardTable::default(),
                &PanelTable::default(),
                &[],
            )),
        }
    }

    /// Read-only view of the dashboards
    pub fn dashboards(&self) -> &DashboardRegistry {
        &self.dashboards
    }

    /// Read-only view of the panels
    pub fn panels(&self) -> &PanelRegistry {
        &self.panels
    }

    /// Registry version; bumped by every successful mutation
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// Run `f` under all write locks; bump the version if it succeeds
    ///
    /// `f` must check everything before it mutates.
    fn mutate<R>(
        &self,
        f: impl FnOnce(&mut DashboardTable, &mut PanelTable, &mut Vec<RouteFragment>) -> Result<R, RegistryError>,
    ) -> Result<R, RegistryError> {
        let mut dashboards = self.dashboards.table.write();
        let mut panels = self.panels.table.write();
        let mut host_routes = self.host_routes.write();
        let out = f(&mut dashboards, &mut panels, &mut host_routes)?;
        self.version.fetch_add(1, Ordering::AcqRel);
        Ok(out)
    }

    /// [`Site::mutate`] for changes that cannot fail
    fn update(&self, f: impl FnOnce(&mut DashboardTable, &mut Vec<RouteFragment>)) {
        let mut dashboards = self.dashboards.table.write();
        let _panels = self.panels.table.write();
        let mut host_routes = self.host_routes.write();
        f(&mut dashboards, &mut host_routes);
        self.version.fetch_add(1, Ordering::AcqRel);
    }

    /// Register a dashboard
    pub fn register_dashboard(&self, descriptor: DashboardDescriptor) -> Result<(), RegistryError> {
        descriptor.validate()?;
        self.mutate(|dashboards, panels, _| {
            if let Some(existing) = dashboards.get(descriptor.slug.as_str()) {
                return Err(RegistryError::Duplicate {
                    key: format!("dashboard {}", descriptor.slug),
                    first: existing.descriptor().source.clone(),
                    second: descriptor.source.clone(),
                });
            }
            let slug = descriptor.slug.clone();
            let mut dashboard = Dashboard::new(descriptor);
            dashboard.refresh(panels.panels_of(slug.as_str()));
            dashboards.insert(dashboard);
            info!("Registered dashboard {}", slug);
            Ok(())
        })
    }

    /// Remove a dashboard and every panel registered to it
    ///
    /// Returns `false` if the dashboard was not registered.
    pub fn unregister_dashboard(&self, slug: &str) -> bool {
        let result = self.mutate(|dashboards, panels, _| {
            if dashboards.remove(slug).is_none() {
                return Err(RegistryError::NotFound(format!("dashboard {}", slug)));
            }
            let removed = panels.remove_dashboard(slug);
            if !removed.is_empty() {
                warn!(
                    "Unregistering dashboard {} also removed {} panel(s)",
                    slug,
                    removed.len()
                );
            }
            info!("Unregistered dashboard {}", slug);
            Ok(())
        });
        result.is_ok()
    }

    /// Register a panel under its dashboard
    ///
    /// Fails with `DanglingPanel` if the dashboard is not registered and
    /// with `Duplicate` if the slug or mount prefix is taken.
    pub fn register_panel(&self, panel: Panel) -> Result<Arc<Panel>, RegistryError> {
        let key = format!("panel {}:{}", panel.dashboard(), panel.slug());
        let change = PanelChange::new(panel.dashboard().clone()).add(panel);
        self.apply_panel_change(change)?
            .ok_or(RegistryError::NotFound(key))
    }

    /// Apply a [`PanelChange`] as one mutation
    ///
    /// Every step is checked against the state the previous steps leave
    /// behind before anything is committed, so a failing step leaves the
    /// registries untouched. Returns the added panel, if any.
    pub fn apply_panel_change(&self, change: PanelChange) -> Result<Option<Arc<Panel>>, RegistryError> {
        self.mutate(|dashboards, panels, _| {
            let dashboard_slug = change.dashboard.as_str();
            let Some(entry) = dashboards.get_mut(dashboard_slug) else {
                return Err(match &change.add {
                    Some(panel) => RegistryError::DanglingPanel {
                        dashboard: dashboard_slug.to_string(),
                        panel: panel.slug().to_string(),
                        file: panel.descriptor().source.clone(),
                    },
                    None => RegistryError::NotFound(format!("dashboard {}", dashboard_slug)),
                });
            };

            let removing = change
                .remove
                .as_ref()
                .filter(|slug| panels.get(dashboard_slug, slug.as_str()).is_some());
            if let (Some(slug), None) = (&change.remove, removing) {
                debug!("Panel {}:{} to remove is not registered", dashboard_slug, slug);
            }

            let new_group = match &change.group {
                Some(group) if entry.descriptor().group(group.slug.as_str()).is_none() => {
                    let mut candidate = entry.descriptor().clone();
                    candidate.groups.push(group.clone());
                    candidate.validate()?;
                    Some(group.clone())
                }
                _ => None,
            };

            if let Some(panel) = &change.add {
                check_new_panel(panels, panel, removing)?;
            }

            if let Some(slug) = removing {
                panels.remove(dashboard_slug, slug.as_str());
                if entry.declared_default() == Some(slug) {
                    entry.set_default_panel(None);
                }
                info!("Unregistered panel {}:{}", dashboard_slug, slug);
            }
            if let Some(group) = new_group {
                debug!("Created panel group {}:{}", dashboard_slug, group.slug);
                entry.push_group(group);
            }
            let added = change.add.map(|panel| {
                let panel = Arc::new(panel);
                panels.insert(Arc::clone(&panel));
                info!("Registered panel {}:{}", dashboard_slug, panel.slug());
                panel
            });
            entry.refresh(panels.panels_of(dashboard_slug));
            Ok(added)
        })
    }

    /// Remove a panel; returns `false` if it was not registered
    ///
    /// If the panel was its dashboard's default, the default moves to the
    /// first enabled panel in traversal order.
    pub fn unregister_panel(&self, dashboard: &str, slug: &str) -> bool {
        let result = self.mutate(|dashboards, panels, _| {
            let Some(entry) = dashboards.get_mut(dashboard) else {
                return Err(RegistryError::NotFound(format!("dashboard {}", dashboard)));
            };
            if panels.remove(dashboard, slug).is_none() {
                return Err(RegistryError::NotFound(format!("panel {}:{}", dashboard, slug)));
            }
            if entry.declared_default().map(Slug::as_str) == Some(slug) {
                entry.set_default_panel(None);
            }
            entry.refresh(panels.panels_of(dashboard));
            info!("Unregistered panel {}:{}", dashboard, slug);
            Ok(())
        });
        result.is_ok()
    }

    pub fn get_panel(&self, dashboard: &str, slug: &str) -> Option<Arc<Panel>> {
        self.panels.get(dashboard, slug)
    }

    /// Panel slugs of `dashboard` in traversal order, orphans last
    pub fn enumerate_panels(&self, dashboard: &str) -> Vec<Slug> {
        self.dashboards
            .table
            .read()
            .get(dashboard)
            .map(Dashboard::panel_order)
            .unwrap_or_default()
    }

    /// Enable or disable a registered panel
    pub fn set_panel_enabled(
        &self,
        dashboard: &str,
        slug: &str,
        enabled: bool,
    ) -> Result<(), RegistryError> {
        self.mutate(|dashboards, panels, _| {
            let Some(entry) = dashboards.get_mut(dashboard) else {
                return Err(RegistryError::NotFound(format!("dashboard {}", dashboard)));
            };
            let Some(panel) = panels.get(dashboard, slug) else {
                return Err(RegistryError::NotFound(format!("panel {}:{}", dashboard, slug)));
            };
            let updated = Arc::new(panel.with_enabled(enabled));
            panels.replace(updated);
            entry.refresh(panels.panels_of(dashboard));
            debug!("Panel {}:{} enabled={}", dashboard, slug, enabled);
            Ok(())
        })
    }

    /// Make a registered panel its dashboard's default
    pub fn set_default_panel(&self, dashboard: &str, slug: &str) -> Result<(), RegistryError> {
        self.mutate(|dashboards, panels, _| {
            let Some(entry) = dashboards.get_mut(dashboard) else {
                return Err(RegistryError::NotFound(format!("dashboard {}", dashboard)));
            };
            let Some(panel) = panels.get(dashboard, slug) else {
                return Err(RegistryError::NotFound(format!("panel {}:{}", dashboard, slug)));
            };
            entry.set_default_panel(Some(panel.slug().clone()));
            entry.refresh(panels.panels_of(dashboard));
            debug!("Default panel of {} is now {}", dashboard, slug);
            Ok(())
        })
    }

    /// Append a panel group to a registered dashboard
    pub fn add_panel_group(&self, dashboard: &str, group: PanelGroup) -> Result<(), RegistryError> {
        self.mutate(|dashboards, panels, _| {
            let Some(entry) = dashboards.get_mut(dashboard) else {
                return Err(RegistryError::NotFound(format!("dashboard {}", dashboard)));
            };
            let mut candidate = entry.descriptor().clone();
            candidate.groups.push(group.clone());
            candidate.validate()?;
            debug!("Added panel group {}:{}", dashboard, group.slug);
            entry.push_group(group);
            entry.refresh(panels.panels_of(dashboard));
            Ok(())
        })
    }

    pub fn get_dashboard(&self, slug: &str) -> Option<Dashboard> {
        self.dashboards.get(slug)
    }

    /// Dashboard slugs in registration order
    pub fn enumerate_dashboards(&self) -> Vec<Slug> {
        self.dashboards.enumerate()
    }

    /// Choose the dashboard the site root redirects to
    pub fn set_default_dashboard(&self, slug: Option<Slug>) {
        self.update(|dashboards, _| dashboards.default_dashboard = slug);
    }

    /// Add a host route at the site root, before the default redirect
    pub fn add_host_route(&self, fragment: RouteFragment) {
        self.update(|_, host_routes| host_routes.push(fragment));
    }

    /// Route tree for the current registry state
    pub fn route_table(&self) -> Arc<ComposedSite> {
        self.composer.current(
            || self.version(),
            || {
                let dashboards = self.dashboards.table.read();
                let panels = self.panels.table.read();
                let host_routes = self.host_routes.read();
                compose(self.version(), &dashboards, &panels, &host_routes)
            },
        )
    }
}

/// Panel steps of one descriptor, applied together by
/// [`Site::apply_panel_change`]: remove, then create the group if the
/// dashboard lacks it, then add
#[derive(Debug, Clone)]
pub struct PanelChange {
    pub dashboard: Slug,
    pub remove: Option<Slug>,
    pub group: Option<PanelGroup>,
    pub add: Option<Panel>,
}

impl PanelChange {
    pub fn new(dashboard: Slug) -> Self {
        Self {
            dashboard,
            remove: None,
            group: None,
            add: None,
        }
    }

    pub fn remove(mut self, panel: Slug) -> Self {
        self.remove = Some(panel);
        self
    }

    /// Group to create unless the dashboard already declares it
    pub fn in_group(mut self, group: PanelGroup) -> Self {
        self.group = Some(group);
        self
    }

    pub fn add(mut self, panel: Panel) -> Self {
        self.add = Some(panel);
        self
    }
}

/// Reject a panel whose slug or mount prefix is taken, ignoring the panel
/// being replaced
fn check_new_panel(
    panels: &PanelTable,
    panel: &Panel,
    replacing: Option<&Slug>,
) -> Result<(), RegistryError> {
    let dashboard = panel.dashboard();
    let taken: Vec<&Arc<Panel>> = panels
        .panels_of(dashboard.as_str())
        .iter()
        .filter(|existing| Some(existing.slug()) != replacing)
        .collect();
    if let Some(existing) = taken.iter().find(|p| p.slug() == panel.slug()) {
        return Err(RegistryError::Duplicate {
            key: format!("panel {}:{}", dashboard, panel.slug()),
            first: existing.descriptor().source.clone(),
            second: panel.descriptor().source.clone(),
        });
    }
    if let Some(existing) = taken.iter().find(|p| p.mount_prefix() == panel.mount_prefix()) {
        return Err(RegistryError::Duplicate {
            key: format!(
                "url prefix /{}/{}/ (panels {} and {})",
                dashboard,
                panel.mount_prefix(),
                existing.slug(),
                panel.slug()
            ),
            first: existing.descriptor().source.clone(),
            second: panel.descriptor().source.clone(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slug(s: &str) -> Slug {
        Slug::new(s).unwrap()
    }

    fn panel(dashboard: &str, name: &str) -> Panel {
        let descriptor = PanelDescriptor::new(slug(name), slug(dashboard), name);
        Panel::new(
            descriptor,
            name,
            vec![RouteFragment::named("^$", name, "index").unwrap()],
        )
        .unwrap()
    }

    fn site_with_project() -> Site {
        let site = Site::new();
        site.register_dashboard(
            DashboardDescriptor::new(slug("project"), "Project")
                .with_group(PanelGroup::default_group()),
        )
        .unwrap();
        site
    }

    #[test]
    fn test_register_panel_without_dashboard_is_dangling() {
        let site = Site::new();
        let err = site.register_panel(panel("project", "overview")).unwrap_err();
        assert!(matches!(err, RegistryError::DanglingPanel { .. }));
        assert_eq!(site.version(), 0);
    }

    #[test]
    fn test_duplicate_panel_leaves_state_unchanged() {
        let site = site_with_project();
        site.register_panel(panel("project", "overview")).unwrap();
        let version = site.version();
        let err = site.register_panel(panel("project", "overview")).unwrap_err();
        assert!(matches!(err, RegistryError::Duplicate { .. }));
        assert_eq!(site.version(), version);
        assert_eq!(site.enumerate_panels("project").len(), 1);
    }

    #[test]
    fn test_mount_prefix_collision() {
        let site = site_with_project();
        site.register_panel(panel("project", "home")).unwrap();
        let descriptor = PanelDescriptor::new(slug("overview"), slug("project"), "overview")
            .with_url_prefix("home");
        let clash = Panel::new(descriptor, "Overview", vec![]).unwrap();
        assert!(matches!(
            site.register_panel(clash),
            Err(RegistryError::Duplicate { .. })
        ));
    }

    #[test]
    fn test_default_moves_when_default_unregistered() {
        let site = site_with_project();
        site.register_panel(panel("project", "overview")).unwrap();
        site.register_panel(panel("project", "images")).unwrap();
        let dashboard = site.get_dashboard("project").unwrap();
        assert_eq!(dashboard.default_panel().map(Slug::as_str), Some("overview"));

        assert!(site.unregister_panel("project", "overview"));
        let dashboard = site.get_dashboard("project").unwrap();
        assert_eq!(dashboard.default_panel().map(Slug::as_str), Some("images"));

        assert!(site.unregister_panel("project", "images"));
        assert!(!site.unregister_panel("project", "images"));
        assert_eq!(site.get_dashboard("project").unwrap().default_panel(), None);
    }

    #[test]
    fn test_unregister_dashboard_cascades() {
        let site = site_with_project();
        site.register_panel(panel("project", "overview")).unwrap();
        assert!(site.unregister_dashboard("project"));
        assert!(site.get_panel("project", "overview").is_none());
        assert!(site.panels().is_empty());
        assert!(!site.unregister_dashboard("project"));
    }

    #[test]
    fn test_set_panel_enabled() {
        let site = site_with_project();
        site.register_panel(panel("project", "overview")).unwrap();
        site.set_panel_enabled("project", "overview", false).unwrap();
        assert!(!site.get_panel("project", "overview").unwrap().is_enabled());
        assert!(site.route_table().resolve("/project/overview/").is_none());
        assert!(matches!(
            site.set_panel_enabled("project", "missing", false),
            Err(RegistryError::NotFound(_))
        ));
    }

    #[test]
    fn test_set_default_panel_requires_registration() {
        let site = site_with_project();
        site.register_panel(panel("project", "overview")).unwrap();
        site.register_panel(panel("project", "images")).unwrap();
        site.set_default_panel("project", "images").unwrap();
        assert_eq!(
            site.route_table()
                .resolve("/project/")
                .unwrap()
                .redirect_location(),
            Some("/project/images/")
        );
        assert!(site.set_default_panel("project", "volumes").is_err());
    }

    #[test]
    fn test_add_panel_group_rejects_duplicate() {
        let site = site_with_project();
        site.add_panel_group("project", PanelGroup::new(slug("compute"), "Compute"))
            .unwrap();
        assert!(matches!(
            site.add_panel_group("project", PanelGroup::new(slug("compute"), "Again")),
            Err(RegistryError::Duplicate { .. })
        ));
        assert!(matches!(
            site.add_panel_group("admin", PanelGroup::new(slug("system"), "System")),
            Err(RegistryError::NotFound(_))
        ));
    }

    #[test]
    fn test_route_table_tracks_version() {
        let site = site_with_project();
        let before = site.route_table();
        assert_eq!(before.version, site.version());
        site.register_panel(panel("project", "overview")).unwrap();
        let after = site.route_table();
        assert!(after.version > before.version);
        assert!(after.resolve("/project/overview/").is_some());
        assert!(Arc::ptr_eq(&after, &site.route_table()));
    }

    #[test]
    fn test_root_redirects_to_default_dashboard() {
        let site = site_with_project();
        site.set_default_dashboard(Some(slug("project")));
        let resolved = site.route_table().resolve("/").unwrap();
        assert_eq!(resolved.redirect_location(), Some("/project/"));

        site.set_default_dashboard(Some(slug("admin")));
        assert!(site.route_table().resolve("/").is_none());
    }

    #[test]
    fn test_infallible_updates_bump_version() {
        let site = site_with_project();
        let before = site.route_table();
        site.set_default_dashboard(Some(slug("project")));
        assert_eq!(site.version(), before.version + 1);
        site.add_host_route(RouteFragment::named("^home/$", "user_home", "user_home").unwrap());
        assert_eq!(site.version(), before.version + 2);

        let after = site.route_table();
        assert_eq!(after.version, site.version());
        assert!(after.resolve("/home/").is_some());
    }

    #[test]
    fn test_panel_change_with_failing_add_keeps_state() {
        let site = site_with_project();
        site.register_panel(panel("project", "overview")).unwrap();
        site.register_panel(panel("project", "images")).unwrap();
        site.set_default_panel("project", "overview").unwrap();
        let version = site.version();

        // Removing overview frees its slot, but images is still taken
        let change = PanelChange::new(slug("project"))
            .remove(slug("overview"))
            .in_group(PanelGroup::new(slug("compute"), "Compute"))
            .add(panel("project", "images"));
        assert!(matches!(
            site.apply_panel_change(change),
            Err(RegistryError::Duplicate { .. })
        ));

        assert_eq!(site.version(), version);
        assert!(site.get_panel("project", "overview").is_some());
        let dashboard = site.get_dashboard("project").unwrap();
        assert!(dashboard.descriptor().group("compute").is_none());
        assert_eq!(dashboard.declared_default().map(Slug::as_str), Some("overview"));
    }

    #[test]
    fn test_panel_change_replaces_and_creates_group() {
        let site = site_with_project();
        site.register_panel(panel("project", "overview")).unwrap();

        let replacement = Panel::new(
            PanelDescriptor::new(slug("overview"), slug("project"), "overview")
                .in_group(slug("compute")),
            "Overview",
            vec![RouteFragment::named("^$", "overview", "index").unwrap()],
        )
        .unwrap();
        let change = PanelChange::new(slug("project"))
            .remove(slug("overview"))
            .in_group(PanelGroup::new(slug("compute"), "Compute"))
            .add(replacement);
        let added = site.apply_panel_change(change).unwrap().unwrap();
        assert_eq!(added.group().map(Slug::as_str), Some("compute"));

        let dashboard = site.get_dashboard("project").unwrap();
        let groups: Vec<&str> = dashboard.groups().iter().map(|g| g.slug.as_str()).collect();
        assert_eq!(groups, vec!["default", "compute"]);
        assert_eq!(site.enumerate_panels("project").len(), 1);
    }

    #[test]
    fn test_panel_change_invalid_group_keeps_state() {
        let site = site_with_project();
        let version = site.version();
        // A group listing a panel twice is rejected before the panel is added
        let change = PanelChange::new(slug("project"))
            .in_group(
                PanelGroup::new(slug("compute"), "Compute").with_panels(vec![slug("a"), slug("a")]),
            )
            .add(panel("project", "overview"));
        assert!(site.apply_panel_change(change).is_err());
        assert_eq!(site.version(), version);
        assert!(site.get_panel("project", "overview").is_none());
    }
}
