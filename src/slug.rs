//! Slugs: short identifiers used in URLs and as registry keys

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;

use crate::error::RegistryError;

/// Maximum slug length in bytes
pub const MAX_SLUG_LEN: usize = 64;

/// Lowercase ASCII letters, digits and underscores; never empty.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Slug(String);

impl Slug {
    /// Validate and wrap a slug
    pub fn new(value: impl Into<String>) -> Result<Self, RegistryError> {
        let value = value.into();
        if let Some(reason) = Self::check(&value) {
            return Err(RegistryError::InvalidSlug { value, reason });
        }
        Ok(Slug(value))
    }

    /// Check a candidate slug, returning the reason it is rejected
    #[inline]
    fn check(value: &str) -> Option<String> {
        if value.is_empty() {
            return Some("slug cannot be empty".to_string());
        }
        if value.len() > MAX_SLUG_LEN {
            return Some(format!("slug longer than {} bytes", MAX_SLUG_LEN));
        }
        value
            .chars()
            .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '_'))
            .map(|c| format!("character {:?} not allowed (lowercase ASCII, digits, '_')", c))
    }

    /// Wrap a compile-time constant known to pass [`Slug::new`]
    pub(crate) fn from_static(value: &'static str) -> Self {
        debug_assert!(Self::check(value).is_none());
        Slug(value.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Human-readable title: `access_and_security` -> `Access And Security`
    pub fn display_name(&self) -> String {
        self.0
            .split('_')
            .filter(|word| !word.is_empty())
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for Slug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Slug {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Slug {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl FromStr for Slug {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Slug::new(s)
    }
}

impl TryFrom<String> for Slug {
    type Error = RegistryError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Slug::new(value)
    }
}

impl TryFrom<&str> for Slug {
    type Error = RegistryError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Slug::new(value)
    }
}

impl From<Slug> for String {
    fn from(slug: Slug) -> Self {
        slug.0
    }
}

impl PartialEq<str> for Slug {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for Slug {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}
