use thiserror::Error;

use crate::cache::WorkerState;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("Corrupt cache entry: {0}")]
    CorruptEntry(#[from] serde_json::Error),

    #[error("Invalid cache generation tag: {0:?}")]
    InvalidGeneration(String),

    #[error("Failed to precache {path}: {reason}")]
    ManifestFetch { path: String, reason: String },

    #[error("Cannot {operation} while {state}")]
    InvalidTransition {
        operation: &'static str,
        state: WorkerState,
    },

    #[error("Invalid resource path {path}: {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("Cache worker is no longer running")]
    WorkerGone,
}

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Network unavailable for {url}")]
    Unavailable { url: String },

    #[error("Cache worker is no longer running")]
    WorkerGone,
}

/// The platform's install prompt rejected or could not be shown.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Install prompt failed: {0}")]
pub struct PromptError(pub String);

/// Maximum length for failure reasons embedded in error messages
const MAX_REASON_LENGTH: usize = 200;

impl CacheError {
    pub fn manifest_fetch(path: &str, reason: impl ToString) -> Self {
        let mut reason = reason.to_string();
        if reason.len() > MAX_REASON_LENGTH {
            let cut = (0..=MAX_REASON_LENGTH)
                .rev()
                .find(|&i| reason.is_char_boundary(i))
                .unwrap_or(0);
            reason.truncate(cut);
            reason.push_str("...");
        }
        CacheError::ManifestFetch {
            path: path.to_string(),
            reason,
        }
    }
}
