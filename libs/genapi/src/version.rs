//! Server version metadata, reported on the discovery surface once the
//! configuration has been completed.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Info {
    pub major: String,
    pub minor: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_version: Option<String>,
}

impl Info {
    pub fn new(major: impl Into<String>, minor: impl Into<String>) -> Self {
        Self {
            major: major.into(),
            minor: minor.into(),
            git_version: None,
        }
    }
}

impl std::fmt::Display for Info {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}
