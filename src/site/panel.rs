//! Panels: a single feature area mounted under its dashboard
//!
//! A panel is a record, not a trait object: its descriptor, its display
//! name and the route fragments its factory produced. Variation between
//! panels (tables, forms, REST-only) lives entirely in the handlers the
//! host resolves from [`HandlerRef`]s.

use serde::{Serialize, Serializer};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::RegistryError;
use crate::permissions::PermissionSet;
use crate::router::pattern::Pattern;
use crate::slug::Slug;

/// Opaque reference to a host handler (view)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HandlerRef(Arc<str>);

impl HandlerRef {
    pub fn new(key: impl AsRef<str>) -> Self {
        Self(Arc::from(key.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HandlerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for HandlerRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl From<&str> for HandlerRef {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

/// One `(pattern, handler, name)` triple, relative to the panel mount point
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteFragment {
    pub pattern: Pattern,
    pub handler: HandlerRef,
    pub name: Option<String>,
}

impl RouteFragment {
    /// Compile a route fragment
    pub fn new(
        pattern: &str,
        handler: impl Into<HandlerRef>,
        name: Option<&str>,
    ) -> Result<Self, RegistryError> {
        Ok(Self {
            pattern: Pattern::new(pattern)?,
            handler: handler.into(),
            name: name.map(str::to_string),
        })
    }

    /// Named route fragment
    pub fn named(
        pattern: &str,
        handler: impl Into<HandlerRef>,
        name: &str,
    ) -> Result<Self, RegistryError> {
        Self::new(pattern, handler, Some(name))
    }
}

/// Declarative description of a panel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelDescriptor {
    pub slug: Slug,
    pub dashboard: Slug,
    /// Panel group; `None` leaves placement to the dashboard
    pub group: Option<Slug>,
    /// Handler-factory registry key (`ADD_PANEL`)
    pub class_ref: String,
    pub enabled: bool,
    pub permissions: PermissionSet,
    /// Literal mount segment replacing the slug in URLs
    pub url_prefix: Option<String>,
    /// Descriptor file this panel was declared in
    pub source: Option<PathBuf>,
}

impl PanelDescriptor {
    pub fn new(slug: Slug, dashboard: Slug, class_ref: impl Into<String>) -> Self {
        Self {
            slug,
            dashboard,
            group: None,
            class_ref: class_ref.into(),
            enabled: true,
            permissions: PermissionSet::new(),
            url_prefix: None,
            source: None,
        }
    }

    pub fn in_group(mut self, group: Slug) -> Self {
        self.group = Some(group);
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn with_permissions(mut self, permissions: PermissionSet) -> Self {
        self.permissions = permissions;
        self
    }

    pub fn with_url_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.url_prefix = Some(prefix.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<PathBuf>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// Check a `URL_PREFIX` value: one non-empty path segment of URL-safe characters
pub fn validate_url_prefix(prefix: &str) -> Result<(), String> {
    if prefix.is_empty() {
        return Err("url prefix cannot be empty".to_string());
    }
    match prefix
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '~')))
    {
        Some(c) => Err(format!("character {:?} not allowed in url prefix", c)),
        None => Ok(()),
    }
}

/// A registered panel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Panel {
    descriptor: PanelDescriptor,
    name: String,
    routes: Arc<[RouteFragment]>,
}

impl Panel {
    /// Bind a descriptor to the routes its factory produced
    pub fn new(
        descriptor: PanelDescriptor,
        name: impl Into<String>,
        routes: Vec<RouteFragment>,
    ) -> Result<Self, RegistryError> {
        if let Some(prefix) = &descriptor.url_prefix {
            validate_url_prefix(prefix).map_err(|reason| RegistryError::InvalidSlug {
                value: prefix.clone(),
                reason,
            })?;
        }
        Ok(Self {
            descriptor,
            name: name.into(),
            routes: routes.into(),
        })
    }

    pub fn descriptor(&self) -> &PanelDescriptor {
        &self.descriptor
    }

    pub fn slug(&self) -> &Slug {
        &self.descriptor.slug
    }

    pub fn dashboard(&self) -> &Slug {
        &self.descriptor.dashboard
    }

    pub fn group(&self) -> Option<&Slug> {
        self.descriptor.group.as_ref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_enabled(&self) -> bool {
        self.descriptor.enabled
    }

    /// URL segment the panel is mounted under inside its dashboard
    pub fn mount_prefix(&self) -> &str {
        self.descriptor
            .url_prefix
            .as_deref()
            .unwrap_or(self.descriptor.slug.as_str())
    }

    /// Route fragments in panel-supplied order
    pub fn routes(&self) -> &[RouteFragment] {
        &self.routes
    }

    pub fn required_permissions(&self) -> &PermissionSet {
        &self.descriptor.permissions
    }

    /// Copy of this panel with a different enabled flag
    pub(crate) fn with_enabled(&self, enabled: bool) -> Self {
        let mut panel = self.clone();
        panel.descriptor.enabled = enabled;
        panel
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slug(s: &str) -> Slug {
        Slug::new(s).unwrap()
    }

    #[test]
    fn test_mount_prefix_defaults_to_slug() {
        let descriptor = PanelDescriptor::new(slug("overview"), slug("project"), "overview");
        let panel = Panel::new(descriptor.clone(), "Overview", vec![]).unwrap();
        assert_eq!(panel.mount_prefix(), "overview");

        let prefixed = Panel::new(descriptor.with_url_prefix("home"), "Overview", vec![]).unwrap();
        assert_eq!(prefixed.mount_prefix(), "home");
    }

    #[test]
    fn test_url_prefix_must_be_single_segment() {
        assert!(validate_url_prefix("load-balancers").is_ok());
        assert!(validate_url_prefix("a/b").is_err());
        assert!(validate_url_prefix("").is_err());
        assert!(validate_url_prefix("(?P<x>.*)").is_err());
    }
}
