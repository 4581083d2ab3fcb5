//! Descriptor discovery
//!
//! Scans a directory for descriptor files named `_<NNNN>_<label>.toml`.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::RegistryError;

/// Extension of descriptor files
pub const DESCRIPTOR_EXTENSION: &str = "toml";

/// A descriptor file whose name matched `_<NNNN>_<label>.<ext>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptorFile {
    pub path: PathBuf,
    /// The four-digit ordering prefix
    pub order: u16,
    pub label: String,
}

impl DescriptorFile {
    /// Parse a descriptor file name; `None` if it does not follow the pattern
    pub fn from_path(path: impl Into<PathBuf>) -> Option<Self> {
        let path = path.into();
        let name = path.file_name()?.to_str()?;
        let (order, label) = parse_file_name(name)?;
        Some(Self {
            path,
            order,
            label,
        })
    }

    pub fn file_name(&self) -> &str {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
    }
}

/// Split `_<NNNN>_<label>.<ext>` into its order and label
fn parse_file_name(name: &str) -> Option<(u16, String)> {
    let rest = name.strip_prefix('_')?;
    let digits = rest.get(..4)?;
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let rest = rest[4..].strip_prefix('_')?;
    let (label, ext) = rest.rsplit_once('.')?;
    if label.is_empty() || ext.is_empty() {
        return None;
    }
    Some((digits.parse().ok()?, label.to_string()))
}

/// Descriptor directory scanner
pub struct DescriptorDiscovery {
    /// Directory holding descriptor files
    descriptors_dir: PathBuf,
}

impl DescriptorDiscovery {
    /// Create a new descriptor scanner
    pub fn new<P: AsRef<Path>>(descriptors_dir: P) -> Self {
        Self {
            descriptors_dir: descriptors_dir.as_ref().to_path_buf(),
        }
    }

    /// Discover descriptor files, sorted by order then file name
    pub fn discover(&self) -> Result<Vec<DescriptorFile>, RegistryError> {
        info!("Discovering descriptors in {:?}", self.descriptors_dir);
        let io_error = |source| RegistryError::Io {
            path: self.descriptors_dir.clone(),
            source,
        };

        let mut files = Vec::new();
        for entry in fs::read_dir(&self.descriptors_dir).map_err(io_error)? {
            let path = entry.map_err(io_error)?.path();
            if !path.is_file() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !name.starts_with('_') {
                continue;
            }
            if path.extension().and_then(|e| e.to_str()) != Some(DESCRIPTOR_EXTENSION) {
                debug!("Ignoring {:?}: not a .{} file", path, DESCRIPTOR_EXTENSION);
                continue;
            }
            match DescriptorFile::from_path(&path) {
                Some(file) => files.push(file),
                None => debug!("Ignoring {:?}: name is not _NNNN_label.{}", path, DESCRIPTOR_EXTENSION),
            }
        }

        files.sort_by(|a, b| {
            a.order
                .cmp(&b.order)
                .then_with(|| a.file_name().cmp(b.file_name()))
        });
        info!("Discovered {} descriptors", files.len());
        Ok(files)
    }
}
