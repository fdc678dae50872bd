//! Web application manifest served at `<base>/manifest.json`.

use serde::Serialize;

use crate::site::with_base_path;

const APP_NAME: &str = "LLM Explorer";
const APP_DESCRIPTION: &str = "Learn about different LLM models interactively";
const BRAND_COLOR: &str = "#4a73e8";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManifestIcon {
    pub src: String,
    pub sizes: String,
    #[serde(rename = "type")]
    pub mime_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManifestScreenshot {
    pub src: String,
    pub sizes: String,
    #[serde(rename = "type")]
    pub mime_type: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebAppManifest {
    pub name: String,
    pub short_name: String,
    pub description: String,
    pub start_url: String,
    pub id: String,
    pub scope: String,
    pub display: String,
    pub background_color: String,
    pub theme_color: String,
    pub orientation: String,
    pub categories: Vec<String>,
    pub icons: Vec<ManifestIcon>,
    pub screenshots: Vec<ManifestScreenshot>,
}

impl WebAppManifest {
    /// The site's manifest with every URL under `base_path`
    pub fn for_base_path(base_path: &str) -> Self {
        let url = |path: &str| with_base_path(base_path, path);
        let icon = |src: &str, sizes: &str, mime_type: &str, purpose: Option<&str>| ManifestIcon {
            src: url(src),
            sizes: sizes.to_string(),
            mime_type: mime_type.to_string(),
            purpose: purpose.map(str::to_string),
        };
        let screenshot = |src: &str, label: &str| ManifestScreenshot {
            src: url(src),
            sizes: "1280x720".to_string(),
            mime_type: "image/png".to_string(),
            label: label.to_string(),
        };

        Self {
            name: APP_NAME.to_string(),
            short_name: APP_NAME.to_string(),
            description: APP_DESCRIPTION.to_string(),
            start_url: url("/"),
            id: url("/"),
            scope: url("/"),
            display: "standalone".to_string(),
            background_color: BRAND_COLOR.to_string(),
            theme_color: BRAND_COLOR.to_string(),
            orientation: "portrait-primary".to_string(),
            categories: ["education", "productivity", "utilities"]
                .iter()
                .map(|c| c.to_string())
                .collect(),
            icons: vec![
                icon("/llm-explorer-logo.jpeg", "512x512", "image/jpeg", Some("any maskable")),
                icon("/icon-192x192.png", "192x192", "image/png", None),
                icon("/icon-512x512.png", "512x512", "image/png", None),
                icon("/favicon.ico", "48x48", "image/x-icon", None),
            ],
            screenshots: vec![
                screenshot("/llm-explorer-home.png", "LLM Explorer Home Screen"),
                screenshot("/llm-explorer-details.png", "LLM Explorer Model Details"),
            ],
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
