use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CacheError;

/// Cache version used by the deployed site
pub const DEFAULT_GENERATION: &str = "llm-explorer-v1";

/// Version tag naming one complete set of cached resources.
///
/// Tags double as directory names for the disk backend, so only ASCII
/// letters, digits, `.`, `-` and `_` are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CacheGeneration(String);

impl CacheGeneration {
    pub fn new(tag: impl Into<String>) -> Result<Self, CacheError> {
        let tag = tag.into();
        if Self::is_valid(&tag) {
            Ok(Self(tag))
        } else {
            Err(CacheError::InvalidGeneration(tag))
        }
    }

    pub fn is_valid(tag: &str) -> bool {
        !tag.is_empty()
            && tag != "."
            && tag != ".."
            && tag
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CacheGeneration {
    fn default() -> Self {
        Self(DEFAULT_GENERATION.to_string())
    }
}

impl fmt::Display for CacheGeneration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for CacheGeneration {
    type Error = CacheError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CacheGeneration> for String {
    fn from(value: CacheGeneration) -> Self {
        value.0
    }
}
