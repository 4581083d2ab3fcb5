//! Permission tokens carried through the registry
//!
//! The registry never checks permissions. Dashboards and panels declare the
//! tokens a user must hold; the composer unions them onto route nodes and the
//! host framework enforces them before dispatching.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Helper function to validate a permission token string
///
/// Tokens are opaque to the registry (e.g. `openstack.roles.admin`,
/// `openstack.services.compute`) but must be non-empty and free of
/// whitespace.
pub fn parse_permission_string(perm_str: &str) -> Option<Permission> {
    if perm_str.is_empty() || perm_str.chars().any(char::is_whitespace) {
        return None;
    }
    Some(Permission(perm_str.to_string()))
}

/// A single required permission token
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(String);

impl Permission {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Ordered set of required permission tokens
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionSet {
    permissions: BTreeSet<Permission>,
}

impl PermissionSet {
    /// Create a new empty permission set
    pub fn new() -> Self {
        Self {
            permissions: BTreeSet::new(),
        }
    }

    /// Parse a list of token strings, returning the first invalid token on failure
    pub fn parse<I, S>(tokens: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::new();
        for token in tokens {
            let token = token.as_ref();
            match parse_permission_string(token) {
                Some(permission) => set.add(permission),
                None => return Err(token.to_string()),
            }
        }
        Ok(set)
    }

    /// Add a permission
    pub fn add(&mut self, permission: Permission) {
        self.permissions.insert(permission);
    }

    /// Union of two sets
    pub fn union(&self, other: &PermissionSet) -> PermissionSet {
        Self {
            permissions: self
                .permissions
                .union(&other.permissions)
                .cloned()
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.permissions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.permissions.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Permission> {
        self.permissions.iter()
    }
}
