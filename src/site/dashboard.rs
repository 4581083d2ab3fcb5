//! Dashboards, panel groups and panel traversal order

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::{RegistryError, RegistryWarning};
use crate::permissions::PermissionSet;
use crate::site::panel::Panel;
use crate::slug::Slug;

/// Slug of the group that absorbs panels not placed anywhere else
pub const DEFAULT_GROUP: &str = "default";

/// Ordered sub-grouping of panels within a dashboard
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelGroup {
    pub slug: Slug,
    pub name: String,
    /// Panel slugs declared up front, in display order
    pub panels: Vec<Slug>,
}

impl PanelGroup {
    pub fn new(slug: Slug, name: impl Into<String>) -> Self {
        Self {
            slug,
            name: name.into(),
            panels: Vec::new(),
        }
    }

    pub fn with_panels(mut self, panels: Vec<Slug>) -> Self {
        self.panels = panels;
        self
    }

    /// The `default` group ("Other")
    pub fn default_group() -> Self {
        Self::new(Slug::from_static(DEFAULT_GROUP), "Other")
    }

    pub fn is_default(&self) -> bool {
        self.slug == DEFAULT_GROUP
    }
}

/// Declarative description of a dashboard
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardDescriptor {
    pub slug: Slug,
    pub name: String,
    pub groups: Vec<PanelGroup>,
    pub default_panel: Option<Slug>,
    pub permissions: PermissionSet,
    /// Descriptor file this dashboard was declared in
    pub source: Option<PathBuf>,
}

impl DashboardDescriptor {
    pub fn new(slug: Slug, name: impl Into<String>) -> Self {
        Self {
            slug,
            name: name.into(),
            groups: Vec::new(),
            default_panel: None,
            permissions: PermissionSet::new(),
            source: None,
        }
    }

    pub fn with_group(mut self, group: PanelGroup) -> Self {
        self.groups.push(group);
        self
    }

    pub fn with_default_panel(mut self, panel: Slug) -> Self {
        self.default_panel = Some(panel);
        self
    }

    pub fn with_permissions(mut self, permissions: PermissionSet) -> Self {
        self.permissions = permissions;
        self
    }

    pub fn with_source(mut self, source: impl Into<PathBuf>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn group(&self, slug: &str) -> Option<&PanelGroup> {
        self.groups.iter().find(|g| g.slug == slug)
    }

    /// Group slugs and declared panel slugs must each be unique
    pub fn validate(&self) -> Result<(), RegistryError> {
        let mut groups = HashSet::new();
        let mut panels = HashSet::new();
        for group in &self.groups {
            if !groups.insert(&group.slug) {
                return Err(RegistryError::Duplicate {
                    key: format!("panel group {}:{}", self.slug, group.slug),
                    first: self.source.clone(),
                    second: None,
                });
            }
            for panel in &group.panels {
                if !panels.insert(panel) {
                    return Err(RegistryError::Duplicate {
                        key: format!("panel {}:{} listed in more than one group", self.slug, panel),
                        first: self.source.clone(),
                        second: None,
                    });
                }
            }
        }
        Ok(())
    }
}

/// Traversal of a dashboard's registered panels
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Traversal {
    /// Registered panels placed in a group, group × intra-group order
    pub placed: Vec<Slug>,
    /// Enabled subset of `placed`
    pub enabled: Vec<Slug>,
    /// Registered panels in no group while the dashboard has no default group
    pub orphans: Vec<Slug>,
}

/// Order `panels` (registered to the dashboard, in registration order)
///
/// Within each group, panels declared by the group come first in declared
/// order, followed by panels that name the group themselves in registration
/// order. Panels that end up in no group are appended to the `default`
/// group when the dashboard has one and are orphans otherwise.
pub fn traverse(descriptor: &DashboardDescriptor, panels: &[Arc<Panel>]) -> Traversal {
    let declared: HashSet<&Slug> = descriptor
        .groups
        .iter()
        .flat_map(|g| g.panels.iter())
        .collect();
    let known_group = |slug: &Slug| descriptor.groups.iter().any(|g| &g.slug == slug);

    let leftovers: Vec<&Arc<Panel>> = panels
        .iter()
        .filter(|p| !declared.contains(p.slug()))
        .filter(|p| !p.group().map(known_group).unwrap_or(false))
        .collect();
    let has_default = descriptor.groups.iter().any(PanelGroup::is_default);

    let mut placed: Vec<&Arc<Panel>> = Vec::with_capacity(panels.len());
    for group in &descriptor.groups {
        for slug in &group.panels {
            if let Some(panel) = panels.iter().find(|p| p.slug() == slug) {
                placed.push(panel);
            }
        }
        placed.extend(
            panels
                .iter()
                .filter(|p| !declared.contains(p.slug()) && p.group() == Some(&group.slug)),
        );
        if group.is_default() {
            placed.extend(leftovers.iter().copied());
        }
    }

    Traversal {
        placed: placed.iter().map(|p| p.slug().clone()).collect(),
        enabled: placed
            .iter()
            .filter(|p| p.is_enabled())
            .map(|p| p.slug().clone())
            .collect(),
        orphans: if has_default {
            Vec::new()
        } else {
            leftovers.iter().map(|p| p.slug().clone()).collect()
        },
    }
}

/// A registered dashboard with its cached traversal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dashboard {
    descriptor: DashboardDescriptor,
    traversal: Traversal,
}

impl Dashboard {
    pub(crate) fn new(descriptor: DashboardDescriptor) -> Self {
        Self {
            descriptor,
            traversal: Traversal::default(),
        }
    }

    pub fn descriptor(&self) -> &DashboardDescriptor {
        &self.descriptor
    }

    pub fn slug(&self) -> &Slug {
        &self.descriptor.slug
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn groups(&self) -> &[PanelGroup] {
        &self.descriptor.groups
    }

    pub fn required_permissions(&self) -> &PermissionSet {
        &self.descriptor.permissions
    }

    /// Current default panel: the declared one, else the first enabled
    /// panel in traversal order
    pub fn default_panel(&self) -> Option<&Slug> {
        self.descriptor
            .default_panel
            .as_ref()
            .or_else(|| self.traversal.enabled.first())
    }

    /// Default panel set by the descriptor or `set_default_panel`
    pub fn declared_default(&self) -> Option<&Slug> {
        self.descriptor.default_panel.as_ref()
    }

    /// Enabled, grouped panels in traversal order
    pub fn enabled_panels(&self) -> &[Slug] {
        &self.traversal.enabled
    }

    /// All registered panels in traversal order, orphans last
    pub fn panel_order(&self) -> Vec<Slug> {
        self.traversal
            .placed
            .iter()
            .chain(self.traversal.orphans.iter())
            .cloned()
            .collect()
    }

    pub fn orphans(&self) -> &[Slug] {
        &self.traversal.orphans
    }

    /// Default panel the dashboard index redirects to, if it is routed
    ///
    /// Without a declared default this is the first enabled panel in
    /// traversal order. A declared default that is not registered yields a
    /// `DefaultPanelMissing` warning; one that is registered but disabled
    /// or orphaned is simply not routed.
    pub fn effective_default(&self) -> (Option<&Slug>, Option<RegistryWarning>) {
        let Some(declared) = self.descriptor.default_panel.as_ref() else {
            return (self.traversal.enabled.first(), None);
        };
        if self.traversal.enabled.contains(declared) {
            return (Some(declared), None);
        }
        let registered = self.traversal.placed.contains(declared)
            || self.traversal.orphans.contains(declared);
        if registered {
            (None, None)
        } else {
            (
                None,
                Some(RegistryWarning::DefaultPanelMissing {
                    dashboard: self.slug().to_string(),
                    panel: declared.to_string(),
                }),
            )
        }
    }

    /// Recompute the cached traversal
    pub(crate) fn refresh(&mut self, panels: &[Arc<Panel>]) {
        self.traversal = traverse(&self.descriptor, panels);
    }

    pub(crate) fn set_default_panel(&mut self, panel: Option<Slug>) {
        self.descriptor.default_panel = panel;
    }

    pub(crate) fn push_group(&mut self, group: PanelGroup) {
        self.descriptor.groups.push(group);
    }
}
