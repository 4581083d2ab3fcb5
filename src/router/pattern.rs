//! Compiled route patterns
//!
//! Patterns are regular expressions matched against the remainder of the
//! request path after the parent node's prefix has been consumed. A pattern
//! only matches at the start of the remainder; `$` is needed to demand a
//! full match.

use regex::Regex;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::RegistryError;

/// Route pattern source plus its compiled form
#[derive(Clone)]
pub struct Pattern {
    source: String,
    regex: Regex,
}

/// Result of matching a pattern against a path remainder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternMatch {
    /// Bytes of the remainder consumed by the match
    pub consumed: usize,
    /// Named captures
    pub kwargs: BTreeMap<String, String>,
}

impl Pattern {
    /// Compile a pattern
    pub fn new(source: impl Into<String>) -> Result<Self, RegistryError> {
        let source = source.into();
        let anchored = if source.starts_with('^') {
            source.clone()
        } else {
            format!("^(?:{})", source)
        };
        let regex = Regex::new(&anchored).map_err(|e| RegistryError::InvalidPattern {
            pattern: source.clone(),
            reason: e.to_string(),
        })?;
        Ok(Self { source, regex })
    }

    /// Pattern matching a literal path segment followed by `/`
    pub fn segment(segment: &str) -> Self {
        let source = format!("^{}/", regex::escape(segment));
        let regex = Regex::new(&source).expect("escaped literal is a valid pattern");
        Self { source, regex }
    }

    /// Pattern matching only the empty remainder
    pub fn empty() -> Self {
        Self::segment_free("^$")
    }

    /// Pattern matching any remainder without consuming it
    pub fn root() -> Self {
        Self::segment_free("^")
    }

    fn segment_free(source: &str) -> Self {
        let regex = Regex::new(source).expect("static pattern is valid");
        Self {
            source: source.to_string(),
            regex,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Match at the start of `remainder`
    pub fn match_prefix(&self, remainder: &str) -> Option<PatternMatch> {
        let captures = self.regex.captures(remainder)?;
        let whole = captures.get(0)?;
        if whole.start() != 0 {
            return None;
        }
        let kwargs = self
            .regex
            .capture_names()
            .flatten()
            .filter_map(|name| {
                captures
                    .name(name)
                    .map(|m| (name.to_string(), m.as_str().to_string()))
            })
            .collect();
        Some(PatternMatch {
            consumed: whole.end(),
            kwargs,
        })
    }

    /// Rebuild the path fragment this pattern matches, substituting named
    /// groups from `kwargs`
    ///
    /// Only patterns made of literals and named groups can be reversed;
    /// anything else (classes, repetition, alternation, unnamed groups)
    /// yields `None`.
    pub fn reverse(&self, kwargs: &BTreeMap<String, String>) -> Option<String> {
        let mut out = String::new();
        let chars: Vec<char> = self.source.chars().collect();
        let mut i = 0;
        if chars.first() == Some(&'^') {
            i = 1;
        }
        while i < chars.len() {
            let c = chars[i];
            match c {
                '$' if i + 1 == chars.len() => break,
                '\\' => {
                    let next = *chars.get(i + 1)?;
                    if next.is_ascii_alphanumeric() {
                        // \d, \w, \b ... are classes, not literals
                        return None;
                    }
                    out.push(next);
                    i += 2;
                    continue;
                }
                '(' => {
                    let rest: String = chars[i..].iter().take(4).collect();
                    if !rest.starts_with("(?P<") {
                        return None;
                    }
                    let name_start = i + 4;
                    let name_end = name_start + chars[name_start..].iter().position(|&c| c == '>')?;
                    let name: String = chars[name_start..name_end].iter().collect();
                    i = skip_group(&chars, i)?;
                    out.push_str(kwargs.get(&name)?);
                    continue;
                }
                '.' | '*' | '+' | '?' | '[' | ']' | '|' | '{' | '}' | ')' | '^' | '$' => {
                    return None
                }
                _ => out.push(c),
            }
            i += 1;
        }
        match self.match_prefix(&out) {
            Some(m) if m.consumed == out.len() => Some(out),
            _ => None,
        }
    }
}

/// Index just past the group opened at `open`
fn skip_group(chars: &[char], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut i = open;
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 1,
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Pattern").field(&self.source).finish()
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for Pattern {}

impl Serialize for Pattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.source)
    }
}
