//! Configuration management for the dashboard registry
//!
//! Handles loading the site configuration from TOML or JSON, validating it,
//! and deriving the dashboard enablement policy.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::slug::Slug;

/// Logging configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log filter (e.g. "info", "dashboard_registry=debug"); RUST_LOG wins
    #[serde(default)]
    pub filter: Option<String>,

    /// Emit JSON lines (requires the `json-logging` feature)
    #[serde(default)]
    pub json_format: bool,
}

/// Site configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Directory holding `_NNNN_label.toml` descriptors
    #[serde(default = "default_descriptors_dir")]
    pub descriptors_dir: String,

    /// Only these dashboards are enabled (empty = all); overrides `DISABLED`
    #[serde(default)]
    pub allowed_dashboards: Vec<String>,

    /// Dashboards never enabled
    #[serde(default)]
    pub denied_dashboards: Vec<String>,

    /// Dashboard the site root redirects to, unless a descriptor sets `DEFAULT`
    #[serde(default)]
    pub default_dashboard: Option<String>,

    /// Logging configuration
    #[serde(default)]
    pub logging: Option<LoggingConfig>,
}

fn default_descriptors_dir() -> String {
    "enabled".to_string()
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            descriptors_dir: default_descriptors_dir(),
            allowed_dashboards: Vec::new(),
            denied_dashboards: Vec::new(),
            default_dashboard: None,
            logging: None,
        }
    }
}

impl SiteConfig {
    /// Load configuration from JSON file
    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: SiteConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        Ok(config)
    }

    /// Load configuration from TOML file
    pub fn from_toml_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: SiteConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        Ok(config)
    }

    /// Load by extension (`.json`, anything else as TOML) and validate
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let config = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_file(path)?,
            _ => Self::from_toml_file(path)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to JSON file
    pub fn to_json_file(&self, path: &Path) -> anyhow::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.descriptors_dir.is_empty() {
            return Err(anyhow::anyhow!("descriptors_dir cannot be empty"));
        }

        let lists = [
            ("allowed_dashboards", &self.allowed_dashboards),
            ("denied_dashboards", &self.denied_dashboards),
        ];
        for (field, list) in lists {
            for slug in list {
                Slug::new(slug.as_str()).with_context(|| format!("Invalid entry in {}", field))?;
            }
        }
        if let Some(default) = &self.default_dashboard {
            Slug::new(default.as_str()).context("Invalid default_dashboard")?;
        }

        let allowed: BTreeSet<&String> = self.allowed_dashboards.iter().collect();
        let both: Vec<&String> = self
            .denied_dashboards
            .iter()
            .filter(|slug| allowed.contains(slug))
            .collect();
        if !both.is_empty() {
            return Err(anyhow::anyhow!(
                "Dashboards both allowed and denied: {:?}",
                both
            ));
        }

        Ok(())
    }

    /// Descriptor directory, relative paths resolved against `base`
    pub fn descriptors_path(&self, base: &Path) -> PathBuf {
        let dir = Path::new(&self.descriptors_dir);
        if dir.is_absolute() {
            dir.to_path_buf()
        } else {
            base.join(dir)
        }
    }

    /// Default dashboard from configuration
    pub fn default_dashboard_slug(&self) -> anyhow::Result<Option<Slug>> {
        self.default_dashboard
            .as_deref()
            .map(Slug::new)
            .transpose()
            .context("Invalid default_dashboard")
    }

    pub fn dashboard_policy(&self) -> DashboardPolicy {
        DashboardPolicy {
            allowed: self.allowed_dashboards.iter().cloned().collect(),
            denied: self.denied_dashboards.iter().cloned().collect(),
        }
    }
}

/// Which dashboards the loader registers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DashboardPolicy {
    pub allowed: BTreeSet<String>,
    pub denied: BTreeSet<String>,
}

impl DashboardPolicy {
    /// Deny list first, then allow list, then the descriptor's `DISABLED`
    pub fn is_enabled(&self, slug: &str, disabled: bool) -> bool {
        if self.denied.contains(slug) {
            return false;
        }
        if self.allowed.contains(slug) {
            return true;
        }
        if !self.allowed.is_empty() {
            return false;
        }
        !disabled
    }
}
