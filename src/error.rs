//! Registry errors and warnings
//!
//! Errors abort the operation that raised them and leave the registries
//! untouched. Warnings never abort; they are logged where they are detected
//! and collected into load and composition reports.

use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Registry system errors
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Invalid descriptor {}: {reason}", .file.display())]
    DescriptorInvalid { file: PathBuf, reason: String },

    #[error(
        "Panel {dashboard}:{panel} references dashboard {dashboard} which is not registered{}",
        describe_file(.file.as_deref())
    )]
    DanglingPanel {
        dashboard: String,
        panel: String,
        file: Option<PathBuf>,
    },

    #[error(
        "Duplicate registration of {key}{}{}",
        describe_origin("first declared in", .first.as_deref()),
        describe_origin("declared again in", .second.as_deref())
    )]
    Duplicate {
        key: String,
        first: Option<PathBuf>,
        second: Option<PathBuf>,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid slug {value:?}: {reason}")]
    InvalidSlug { value: String, reason: String },

    #[error("Invalid route pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl RegistryError {
    /// Build a `DescriptorInvalid` for `file`
    pub fn invalid(file: impl AsRef<Path>, reason: impl Into<String>) -> Self {
        RegistryError::DescriptorInvalid {
            file: file.as_ref().to_path_buf(),
            reason: reason.into(),
        }
    }

    /// Attach the descriptor file responsible for this error
    ///
    /// Errors raised by the registries carry no file information; the loader
    /// uses this to name the offending descriptor.
    pub fn with_file(self, file: &Path) -> Self {
        match self {
            RegistryError::DanglingPanel {
                dashboard,
                panel,
                file: None,
            } => RegistryError::DanglingPanel {
                dashboard,
                panel,
                file: Some(file.to_path_buf()),
            },
            RegistryError::Duplicate {
                key,
                first,
                second: None,
            } => RegistryError::Duplicate {
                key,
                first,
                second: Some(file.to_path_buf()),
            },
            RegistryError::InvalidSlug { value, reason } => RegistryError::DescriptorInvalid {
                file: file.to_path_buf(),
                reason: format!("invalid slug {:?}: {}", value, reason),
            },
            RegistryError::InvalidPattern { pattern, reason } => {
                RegistryError::DescriptorInvalid {
                    file: file.to_path_buf(),
                    reason: format!("invalid route pattern {:?}: {}", pattern, reason),
                }
            }
            RegistryError::NotFound(what) => RegistryError::DescriptorInvalid {
                file: file.to_path_buf(),
                reason: format!("{} is not registered", what),
            },
            other => other,
        }
    }
}

fn describe_file(file: Option<&Path>) -> String {
    file.map(|f| format!(" (descriptor {})", f.display()))
        .unwrap_or_default()
}

fn describe_origin(label: &str, file: Option<&Path>) -> String {
    file.map(|f| format!(", {} {}", label, f.display()))
        .unwrap_or_default()
}

/// Non-fatal conditions detected while loading or composing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryWarning {
    /// Panel registered to a dashboard but not listed in any of its groups,
    /// and the dashboard has no `default` group to absorb it
    OrphanPanel { dashboard: String, panel: String },
    /// Dashboard default panel does not resolve to a registered panel
    DefaultPanelMissing { dashboard: String, panel: String },
    /// Descriptor declares a key the loader does not recognise
    UnknownField { file: PathBuf, key: String },
    /// Descriptor was not applied (optional descriptor failed, or its
    /// dashboard is disabled)
    SkippedDescriptor { file: PathBuf, reason: String },
}

impl fmt::Display for RegistryWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryWarning::OrphanPanel { dashboard, panel } => write!(
                f,
                "panel {}:{} is not listed in any panel group and dashboard {} has no default group; it is not routed",
                dashboard, panel, dashboard
            ),
            RegistryWarning::DefaultPanelMissing { dashboard, panel } => write!(
                f,
                "default panel {} of dashboard {} is not registered; dashboard index is not routed",
                panel, dashboard
            ),
            RegistryWarning::UnknownField { file, key } => {
                write!(f, "unknown key {} in {} ignored", key, file.display())
            }
            RegistryWarning::SkippedDescriptor { file, reason } => {
                write!(f, "descriptor {} skipped: {}", file.display(), reason)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_names_both_files() {
        let err = RegistryError::Duplicate {
            key: "project:overview".to_string(),
            first: Some(PathBuf::from("_1100_overview.toml")),
            second: None,
        }
        .with_file(Path::new("_1200_overview_again.toml"));

        let message = err.to_string();
        assert!(message.contains("_1100_overview.toml"));
        assert!(message.contains("_1200_overview_again.toml"));
    }

    #[test]
    fn test_not_found_becomes_descriptor_invalid() {
        let err = RegistryError::NotFound("panel project:missing".to_string())
            .with_file(Path::new("_9000_default.toml"));
        assert!(matches!(err, RegistryError::DescriptorInvalid { .. }));
        assert!(err.to_string().contains("_9000_default.toml"));
    }
}
