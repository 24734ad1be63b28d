//! Identifier types used throughout forkproc.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Human-readable name of a launched unit of work.
///
/// Only used as logging and error context; it never reaches the kernel.
///
/// # Example
/// ```
/// use forkproc_common::ProcessName;
///
/// let name = ProcessName::from("resize-images");
/// assert_eq!(name.as_str(), "resize-images");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProcessName(String);

impl ProcessName {
    /// Creates a new ProcessName from a string.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ProcessName {
    fn default() -> Self {
        Self("process".to_string())
    }
}

impl From<&str> for ProcessName {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ProcessName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for ProcessName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
