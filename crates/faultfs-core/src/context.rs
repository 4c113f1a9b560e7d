//! Per-call context threaded from a pre-hook into its post-hook.

use std::fmt;

/// Identity of one in-flight filesystem call.
///
/// Created by every pre-hook and moved, unchanged, into the matching
/// post-hook.  Paths are relative to the mount root, so the root directory
/// itself is the empty path.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OpContext {
    path: String,
}

impl OpContext {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Whether this call targets the mount root.
    pub fn is_root(&self) -> bool {
        self.path.is_empty()
    }
}

impl fmt::Display for OpContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            f.write_str("<root>")
        } else {
            f.write_str(&self.path)
        }
    }
}
