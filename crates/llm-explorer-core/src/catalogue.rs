//! The model catalogue shown by the learning pages.
//!
//! The catalogue is a static JSON array shipped with the site and read
//! through the offline cache like any other resource.

use serde::{Deserialize, Serialize};

/// Site path of the catalogue data file
pub const CATALOGUE_PATH: &str = "/data/llm-data.json";

/// Audio path the catalogue uses for "no narration recorded"
pub const NO_NARRATION: &str = "/placeholder.mp3";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelRecord {
    pub id: String,
    pub name: String,
    pub creator: String,
    pub release_date: String,
    pub description: String,
    #[serde(default)]
    pub key_features: Vec<String>,
    #[serde(default)]
    pub use_cases: Vec<String>,
    #[serde(default)]
    pub limitations: Vec<String>,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub audio: String,
}

impl ModelRecord {
    /// Narration audio path, or `None` when there is nothing to play
    pub fn narration(&self) -> Option<&str> {
        let audio = self.audio.trim();
        if audio.is_empty() || audio == NO_NARRATION {
            None
        } else {
            Some(audio)
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Catalogue {
    models: Vec<ModelRecord>,
}

impl Catalogue {
    pub fn from_json(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }

    pub fn models(&self) -> &[ModelRecord] {
        &self.models
    }

    pub fn find(&self, id: &str) -> Option<&ModelRecord> {
        self.models.iter().find(|m| m.id.eq_ignore_ascii_case(id))
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}
