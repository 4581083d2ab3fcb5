//! Descriptor key validation
//!
//! Unknown keys never fail a load; they are reported so typos in plugin
//! descriptors do not pass silently.

use tracing::{debug, warn};

/// Maximum descriptor size (bytes)
pub const MAX_DESCRIPTOR_SIZE: usize = 64 * 1024;

/// Keys shared by every descriptor kind
const COMMON_KEYS: &[&str] = &[
    "DISABLED",
    "OPTIONAL",
    "ADD_INSTALLED_APPS",
    "AUTO_DISCOVER_STATIC_FILES",
    "ADD_ANGULAR_MODULES",
    "ADD_JS_FILES",
    "ADD_JS_SPEC_FILES",
    "ADD_SCSS_FILES",
    "ADD_EXCEPTIONS",
    "UPDATE_HORIZON_CONFIG",
];

const DASHBOARD_KEYS: &[&str] = &[
    "DASHBOARD",
    "NAME",
    "PANEL_GROUPS",
    "DEFAULT_PANEL",
    "DEFAULT",
    "PERMISSIONS",
];

const PANEL_KEYS: &[&str] = &[
    "PANEL",
    "PANEL_DASHBOARD",
    "PANEL_GROUP",
    "PANEL_NAME",
    "ADD_PANEL",
    "REMOVE_PANEL",
    "DEFAULT_PANEL",
    "PERMISSIONS",
    "URL_PREFIX",
];

const PANEL_GROUP_KEYS: &[&str] = &["PANEL_GROUP", "PANEL_GROUP_NAME", "PANEL_GROUP_DASHBOARD"];

/// Which key set applies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorShape {
    Dashboard,
    Panel,
    PanelGroup,
}

/// Validation result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    /// Every key is recognised for the descriptor's kind
    Valid,
    /// Keys that will be ignored
    UnknownKeys(Vec<String>),
}

/// Descriptor key validator
pub struct DescriptorValidator {
    shape: DescriptorShape,
}

impl DescriptorValidator {
    pub fn new(shape: DescriptorShape) -> Self {
        Self { shape }
    }

    fn kind_keys(&self) -> &'static [&'static str] {
        match self.shape {
            DescriptorShape::Dashboard => DASHBOARD_KEYS,
            DescriptorShape::Panel => PANEL_KEYS,
            DescriptorShape::PanelGroup => PANEL_GROUP_KEYS,
        }
    }

    /// Is `key` meaningful for this kind of descriptor
    #[inline]
    pub fn is_known(&self, key: &str) -> bool {
        COMMON_KEYS.contains(&key) || self.kind_keys().contains(&key)
    }

    /// Check the keys of a parsed descriptor table
    pub fn validate<'a>(&self, keys: impl IntoIterator<Item = &'a String>) -> ValidationResult {
        let unknown: Vec<String> = keys
            .into_iter()
            .filter(|key| !self.is_known(key))
            .cloned()
            .collect();
        if unknown.is_empty() {
            debug!("Descriptor keys valid for {:?}", self.shape);
            ValidationResult::Valid
        } else {
            warn!("Keys not used by {:?} descriptors: {:?}", self.shape, unknown);
            ValidationResult::UnknownKeys(unknown)
        }
    }
}
