//! Hierarchical group paths.
//!
//! Groups are path-addressed (`/usa/colorado`), with `/` as the root. The
//! path encodes the hierarchy: ancestry and descendant-prefix queries are
//! pure string operations, no tree service round-trip required.

use serde::{Deserialize, Serialize};

use crate::errors::ConfigurationError;

/// A canonical group path: leading `/`, no trailing `/` (except root itself),
/// lowercase segments, no empty segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupPath(String);

impl GroupPath {
    /// Parse and canonicalize a group path.
    pub fn new(path: &str) -> Result<Self, ConfigurationError> {
        if !path.starts_with('/') {
            return Err(ConfigurationError::InvalidGroupPath {
                path: path.to_string(),
                reason: "must start with '/'".to_string(),
            });
        }
        if path == "/" {
            return Ok(Self("/".to_string()));
        }
        let trimmed = path.trim_end_matches('/');
        if trimmed.split('/').skip(1).any(|seg| seg.is_empty()) {
            return Err(ConfigurationError::InvalidGroupPath {
                path: path.to_string(),
                reason: "empty path segment".to_string(),
            });
        }
        Ok(Self(trimmed.to_lowercase()))
    }

    /// The root group.
    pub fn root() -> Self {
        Self("/".to_string())
    }

    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Immediate parent, or `None` for the root.
    pub fn parent(&self) -> Option<GroupPath> {
        if self.is_root() {
            return None;
        }
        match self.0.rfind('/') {
            Some(0) => Some(GroupPath::root()),
            Some(idx) => Some(GroupPath(self.0[..idx].to_string())),
            None => None,
        }
    }

    /// The path from this group up to the root, leaf first.
    ///
    /// `/usa/colorado/denver` yields `[/usa/colorado/denver, /usa/colorado,
    /// /usa, /]` — the bottom-up processing order for aggregation.
    pub fn ancestry(&self) -> Vec<GroupPath> {
        let mut chain = vec![self.clone()];
        let mut current = self.clone();
        while let Some(parent) = current.parent() {
            chain.push(parent.clone());
            current = parent;
        }
        chain
    }

    /// Number of segments below the root. Root has depth 0.
    pub fn depth(&self) -> usize {
        if self.is_root() {
            0
        } else {
            self.0.matches('/').count()
        }
    }

    /// Prefix matching this group's strict descendants.
    ///
    /// Root is a bare separator already, so no extra `/` is appended there.
    pub fn scan_prefix(&self) -> String {
        if self.is_root() {
            "/".to_string()
        } else {
            format!("{}/", self.0)
        }
    }

    /// Whether `other` is this group or one of its descendants.
    pub fn contains(&self, other: &GroupPath) -> bool {
        other == self || other.0.starts_with(&self.scan_prefix())
    }
}

impl std::fmt::Display for GroupPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
