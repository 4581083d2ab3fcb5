//! Descriptor-driven registration
//!
//! Discovers `_NNNN_label.toml` descriptors, parses them and applies them to
//! a [`crate::site::Site`] in order.

pub mod descriptor;
pub mod discovery;
pub mod factory;
pub mod loader;
pub mod validation;

pub use descriptor::{Descriptor, DescriptorKind, HostContributions};
pub use discovery::{DescriptorDiscovery, DescriptorFile};
pub use factory::{index_only, PanelBlueprint, PanelFactories, PanelFactory};
pub use loader::{DescriptorLoader, LoadReport};
pub use validation::{DescriptorValidator, ValidationResult};
