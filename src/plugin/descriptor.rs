//! Descriptor parsing
//!
//! A descriptor is a flat TOML file of upper-case keys. It either declares
//! a dashboard, adds/removes/defaults a panel, or adds a panel group, and
//! may forward opaque asset lists to the host.

use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

use crate::error::RegistryError;
use crate::permissions::PermissionSet;
use crate::plugin::discovery::DescriptorFile;
use crate::plugin::validation::{
    DescriptorShape, DescriptorValidator, ValidationResult, MAX_DESCRIPTOR_SIZE,
};
use crate::site::dashboard::{DashboardDescriptor, PanelGroup};
use crate::slug::Slug;

/// Values forwarded to the host framework untouched
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct HostContributions {
    pub installed_apps: Vec<String>,
    /// Installed apps whose static files the host should auto-discover
    pub static_discovery_apps: Vec<String>,
    pub angular_modules: Vec<String>,
    pub js_files: Vec<String>,
    pub js_spec_files: Vec<String>,
    pub scss_files: Vec<String>,
    /// Exception class names per category (`recoverable`, `not_found`, ...)
    pub exceptions: BTreeMap<String, Vec<String>>,
    /// Host config overrides; later descriptors win per key
    pub horizon_config: BTreeMap<String, serde_json::Value>,
}

impl HostContributions {
    /// Append `other`; JS files already present are not repeated
    pub fn merge(&mut self, other: &HostContributions) {
        self.installed_apps.extend(other.installed_apps.iter().cloned());
        self.static_discovery_apps
            .extend(other.static_discovery_apps.iter().cloned());
        self.angular_modules.extend(other.angular_modules.iter().cloned());
        for file in &other.js_files {
            if !self.js_files.contains(file) {
                self.js_files.push(file.clone());
            }
        }
        self.js_spec_files.extend(other.js_spec_files.iter().cloned());
        self.scss_files.extend(other.scss_files.iter().cloned());
        for (category, names) in &other.exceptions {
            let merged = self.exceptions.entry(category.clone()).or_default();
            for name in names {
                if !merged.contains(name) {
                    merged.push(name.clone());
                }
            }
        }
        for (key, value) in &other.horizon_config {
            self.horizon_config.insert(key.clone(), value.clone());
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &HostContributions::default()
    }
}

/// Dashboard declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardSpec {
    pub slug: Slug,
    pub name: Option<String>,
    pub groups: Vec<PanelGroup>,
    pub default_panel: Option<Slug>,
    /// Site default dashboard
    pub is_default: bool,
    pub permissions: PermissionSet,
}

impl DashboardSpec {
    pub fn to_descriptor(&self, source: &Path) -> DashboardDescriptor {
        DashboardDescriptor {
            slug: self.slug.clone(),
            name: self
                .name
                .clone()
                .unwrap_or_else(|| self.slug.display_name()),
            groups: self.groups.clone(),
            default_panel: self.default_panel.clone(),
            permissions: self.permissions.clone(),
            source: Some(source.to_path_buf()),
        }
    }
}

/// Panel add/remove/default actions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelSpec {
    pub slug: Slug,
    pub dashboard: Slug,
    pub group: Option<Slug>,
    pub name: Option<String>,
    /// Factory key of a panel to add
    pub add: Option<String>,
    pub remove: bool,
    pub default_panel: Option<Slug>,
    pub permissions: PermissionSet,
    pub url_prefix: Option<String>,
}

/// Panel group addition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupSpec {
    pub slug: Slug,
    pub dashboard: Slug,
    pub name: Option<String>,
}

impl GroupSpec {
    pub fn to_group(&self) -> PanelGroup {
        PanelGroup::new(
            self.slug.clone(),
            self.name
                .clone()
                .unwrap_or_else(|| self.slug.display_name()),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DescriptorKind {
    Dashboard(DashboardSpec),
    Panel(PanelSpec),
    PanelGroup(GroupSpec),
}

impl DescriptorKind {
    /// Dashboard the descriptor declares or targets
    pub fn dashboard(&self) -> &Slug {
        match self {
            DescriptorKind::Dashboard(spec) => &spec.slug,
            DescriptorKind::Panel(spec) => &spec.dashboard,
            DescriptorKind::PanelGroup(spec) => &spec.dashboard,
        }
    }

    pub fn is_dashboard(&self) -> bool {
        matches!(self, DescriptorKind::Dashboard(_))
    }
}

/// A parsed descriptor file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    pub file: DescriptorFile,
    pub kind: DescriptorKind,
    /// Failures applying this descriptor are skipped, not fatal
    pub optional: bool,
    /// Dashboards: not registered. Panels: registered disabled.
    pub disabled: bool,
    pub contributions: HostContributions,
    /// Keys that were ignored
    pub unknown_keys: Vec<String>,
}

impl Descriptor {
    /// Parse raw descriptor bytes as read from disk
    pub fn from_bytes(file: DescriptorFile, bytes: &[u8]) -> Result<Self, RegistryError> {
        match std::str::from_utf8(bytes) {
            Ok(contents) => Self::parse(file, contents),
            Err(e) => Err(RegistryError::invalid(
                &file.path,
                format!("descriptor is not valid UTF-8: {}", e),
            )),
        }
    }

    /// Parse descriptor contents
    pub fn parse(file: DescriptorFile, contents: &str) -> Result<Self, RegistryError> {
        if contents.len() > MAX_DESCRIPTOR_SIZE {
            return Err(RegistryError::invalid(
                &file.path,
                format!("descriptor larger than {} bytes", MAX_DESCRIPTOR_SIZE),
            ));
        }
        let table: toml::Table = toml::from_str(contents).map_err(|e| {
            RegistryError::invalid(&file.path, format!("Failed to parse descriptor TOML: {}", e))
        })?;
        let fields = Fields {
            table: &table,
            path: &file.path,
        };

        let (shape, kind) = if table.contains_key("DASHBOARD") {
            if table.contains_key("PANEL") {
                return Err(fields.invalid("DASHBOARD and PANEL are mutually exclusive"));
            }
            (DescriptorShape::Dashboard, DescriptorKind::Dashboard(fields.dashboard()?))
        } else if table.contains_key("PANEL") {
            (DescriptorShape::Panel, DescriptorKind::Panel(fields.panel()?))
        } else if table.contains_key("PANEL_GROUP") {
            (DescriptorShape::PanelGroup, DescriptorKind::PanelGroup(fields.group()?))
        } else {
            return Err(fields.invalid("descriptor declares none of DASHBOARD, PANEL, PANEL_GROUP"));
        };

        let unknown_keys = match DescriptorValidator::new(shape).validate(table.keys()) {
            ValidationResult::Valid => Vec::new(),
            ValidationResult::UnknownKeys(keys) => keys,
        };

        let descriptor = Descriptor {
            optional: fields.flag("OPTIONAL")?,
            disabled: fields.flag("DISABLED")?,
            contributions: fields.contributions()?,
            kind,
            unknown_keys,
            file,
        };
        debug!("Parsed descriptor {:?}", descriptor.file.path);
        Ok(descriptor)
    }

    /// Whether unparseable contents still declare `OPTIONAL = true`
    ///
    /// Used to decide if a parse failure may be skipped.
    pub fn declares_optional(contents: &str) -> bool {
        toml::from_str::<toml::Table>(contents)
            .ok()
            .and_then(|table| truthy(table.get("OPTIONAL")?))
            .unwrap_or(false)
    }

    pub fn path(&self) -> &Path {
        &self.file.path
    }
}

/// Typed access to descriptor keys
struct Fields<'a> {
    table: &'a toml::Table,
    path: &'a Path,
}

impl Fields<'_> {
    fn invalid(&self, reason: impl Into<String>) -> RegistryError {
        RegistryError::invalid(self.path, reason)
    }

    fn string(&self, key: &str) -> Result<Option<String>, RegistryError> {
        match self.table.get(key) {
            None => Ok(None),
            Some(toml::Value::String(s)) => Ok(Some(s.clone())),
            Some(other) => Err(self.invalid(format!(
                "{} must be a string, found {}",
                key,
                other.type_str()
            ))),
        }
    }

    fn slug(&self, key: &str) -> Result<Option<Slug>, RegistryError> {
        self.string(key)?
            .map(|value| Slug::new(value).map_err(|e| e.with_file(self.path)))
            .transpose()
    }

    fn required_slug(&self, key: &str) -> Result<Slug, RegistryError> {
        self.slug(key)?
            .ok_or_else(|| self.invalid(format!("missing required key {}", key)))
    }

    fn flag(&self, key: &str) -> Result<bool, RegistryError> {
        match self.table.get(key) {
            None => Ok(false),
            Some(value) => truthy(value).ok_or_else(|| {
                self.invalid(format!("{} must be a boolean, found {}", key, value))
            }),
        }
    }

    fn strings(&self, key: &str) -> Result<Vec<String>, RegistryError> {
        let Some(value) = self.table.get(key) else {
            return Ok(Vec::new());
        };
        let toml::Value::Array(items) = value else {
            return Err(self.invalid(format!("{} must be a list of strings", key)));
        };
        items
            .iter()
            .map(|item| match item {
                toml::Value::String(s) => Ok(s.clone()),
                other => Err(self.invalid(format!(
                    "{} entries must be strings, found {}",
                    key,
                    other.type_str()
                ))),
            })
            .collect()
    }

    fn sub_table(&self, key: &str) -> Result<Option<&toml::Table>, RegistryError> {
        match self.table.get(key) {
            None => Ok(None),
            Some(toml::Value::Table(table)) => Ok(Some(table)),
            Some(other) => Err(self.invalid(format!(
                "{} must be a table, found {}",
                key,
                other.type_str()
            ))),
        }
    }

    /// `ADD_EXCEPTIONS = { recoverable = ["a.Error"], ... }`
    fn exceptions(&self) -> Result<BTreeMap<String, Vec<String>>, RegistryError> {
        let Some(table) = self.sub_table("ADD_EXCEPTIONS")? else {
            return Ok(BTreeMap::new());
        };
        let mut exceptions = BTreeMap::new();
        for (category, value) in table {
            let toml::Value::Array(items) = value else {
                return Err(self.invalid(format!(
                    "ADD_EXCEPTIONS.{} must be a list of strings",
                    category
                )));
            };
            let mut names: Vec<String> = Vec::with_capacity(items.len());
            for item in items {
                let Some(name) = item.as_str() else {
                    return Err(self.invalid(format!(
                        "ADD_EXCEPTIONS.{} entries must be strings, found {}",
                        category,
                        item.type_str()
                    )));
                };
                if !names.iter().any(|n| n == name) {
                    names.push(name.to_string());
                }
            }
            exceptions.insert(category.clone(), names);
        }
        Ok(exceptions)
    }

    fn horizon_config(&self) -> Result<BTreeMap<String, serde_json::Value>, RegistryError> {
        let Some(table) = self.sub_table("UPDATE_HORIZON_CONFIG")? else {
            return Ok(BTreeMap::new());
        };
        table
            .iter()
            .map(|(key, value)| {
                serde_json::to_value(value)
                    .map(|value| (key.clone(), value))
                    .map_err(|e| self.invalid(format!("UPDATE_HORIZON_CONFIG.{}: {}", key, e)))
            })
            .collect()
    }

    fn permissions(&self) -> Result<PermissionSet, RegistryError> {
        PermissionSet::parse(self.strings("PERMISSIONS")?)
            .map_err(|token| self.invalid(format!("invalid permission token {:?}", token)))
    }

    fn dashboard(&self) -> Result<DashboardSpec, RegistryError> {
        Ok(DashboardSpec {
            slug: self.required_slug("DASHBOARD")?,
            name: self.string("NAME")?,
            groups: self.panel_groups()?,
            default_panel: self.slug("DEFAULT_PANEL")?,
            is_default: self.flag("DEFAULT")?,
            permissions: self.permissions()?,
        })
    }

    /// `PANEL_GROUPS = ["compute", { slug = "network", name = "Network", panels = [...] }]`
    fn panel_groups(&self) -> Result<Vec<PanelGroup>, RegistryError> {
        let Some(value) = self.table.get("PANEL_GROUPS") else {
            return Ok(Vec::new());
        };
        let toml::Value::Array(items) = value else {
            return Err(self.invalid("PANEL_GROUPS must be a list"));
        };
        items
            .iter()
            .map(|item| match item {
                toml::Value::String(slug) => {
                    let slug = Slug::new(slug.as_str()).map_err(|e| e.with_file(self.path))?;
                    let name = slug.display_name();
                    Ok(PanelGroup::new(slug, name))
                }
                toml::Value::Table(table) => {
                    let group = Fields {
                        table,
                        path: self.path,
                    };
                    let slug = group.required_slug("slug")?;
                    let name = group
                        .string("name")?
                        .unwrap_or_else(|| slug.display_name());
                    let panels = group
                        .strings("panels")?
                        .into_iter()
                        .map(|p| Slug::new(p).map_err(|e| e.with_file(self.path)))
                        .collect::<Result<Vec<_>, _>>()?;
                    Ok(PanelGroup::new(slug, name).with_panels(panels))
                }
                other => Err(self.invalid(format!(
                    "PANEL_GROUPS entries must be slugs or tables, found {}",
                    other.type_str()
                ))),
            })
            .collect()
    }

    fn panel(&self) -> Result<PanelSpec, RegistryError> {
        let spec = PanelSpec {
            slug: self.required_slug("PANEL")?,
            dashboard: self.required_slug("PANEL_DASHBOARD")?,
            group: self.slug("PANEL_GROUP")?,
            name: self.string("PANEL_NAME")?,
            add: self.string("ADD_PANEL")?,
            remove: self.flag("REMOVE_PANEL")?,
            default_panel: self.slug("DEFAULT_PANEL")?,
            permissions: self.permissions()?,
            url_prefix: self.string("URL_PREFIX")?,
        };
        if spec.add.as_deref() == Some("") {
            return Err(self.invalid("ADD_PANEL cannot be empty"));
        }
        if spec.add.is_none() && !spec.remove && spec.default_panel.is_none() {
            return Err(self.invalid(
                "panel descriptor needs ADD_PANEL, REMOVE_PANEL or DEFAULT_PANEL",
            ));
        }
        Ok(spec)
    }

    fn group(&self) -> Result<GroupSpec, RegistryError> {
        Ok(GroupSpec {
            slug: self.required_slug("PANEL_GROUP")?,
            dashboard: self.required_slug("PANEL_GROUP_DASHBOARD")?,
            name: self.string("PANEL_GROUP_NAME")?,
        })
    }

    fn contributions(&self) -> Result<HostContributions, RegistryError> {
        let installed_apps = self.strings("ADD_INSTALLED_APPS")?;
        let static_discovery_apps = if self.flag("AUTO_DISCOVER_STATIC_FILES")? {
            installed_apps.clone()
        } else {
            Vec::new()
        };
        let mut contributions = HostContributions {
            installed_apps,
            static_discovery_apps,
            angular_modules: self.strings("ADD_ANGULAR_MODULES")?,
            js_files: Vec::new(),
            js_spec_files: self.strings("ADD_JS_SPEC_FILES")?,
            scss_files: self.strings("ADD_SCSS_FILES")?,
            exceptions: self.exceptions()?,
            horizon_config: self.horizon_config()?,
        };
        for file in self.strings("ADD_JS_FILES")? {
            if !contributions.js_files.contains(&file) {
                contributions.js_files.push(file);
            }
        }
        Ok(contributions)
    }
}

/// Booleans, `0`/`1` and the usual yes/no strings
fn truthy(value: &toml::Value) -> Option<bool> {
    match value {
        toml::Value::Boolean(b) => Some(*b),
        toml::Value::Integer(i) => Some(*i != 0),
        toml::Value::String(s) => match s.to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Some(true),
            "false" | "no" | "off" | "0" | "" => Some(false),
            _ => None,
        },
        _ => None,
    }
}
