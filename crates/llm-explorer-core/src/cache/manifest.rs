use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::error::CacheError;
use crate::site::SiteLocation;

/// Paths the site needs offline: the four pages, the install icons, the
/// web manifest and the catalogue.
pub const DEFAULT_RESOURCES: &[&str] = &[
    "/",
    "/learn",
    "/about",
    "/promo",
    "/icon-192x192.png",
    "/icon-512x512.png",
    "/manifest.json",
    "/data/llm-data.json",
];

/// Ordered set of site paths that must be cached before a generation is
/// ready. Paths are site-absolute and relative to the base path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct ResourceManifest {
    paths: Vec<String>,
}

impl ResourceManifest {
    pub fn new<I, S>(paths: I) -> Result<Self, CacheError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for path in paths {
            let path = path.into();
            if !path.starts_with('/') {
                return Err(CacheError::InvalidPath {
                    path,
                    reason: "resource paths must start with '/'".to_string(),
                });
            }
            if !unique.contains(&path) {
                unique.push(path);
            }
        }
        Ok(Self { paths: unique })
    }

    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Absolute URLs for every path, in manifest order
    pub fn resolve(&self, site: &SiteLocation) -> Result<Vec<(String, Url)>, CacheError> {
        self.paths
            .iter()
            .map(|path| {
                site.url_for(path)
                    .map(|url| (path.clone(), url))
                    .map_err(|e| CacheError::InvalidPath {
                        path: path.clone(),
                        reason: e.to_string(),
                    })
            })
            .collect()
    }
}

impl Default for ResourceManifest {
    fn default() -> Self {
        Self {
            paths: DEFAULT_RESOURCES.iter().map(|p| p.to_string()).collect(),
        }
    }
}

impl TryFrom<Vec<String>> for ResourceManifest {
    type Error = CacheError;

    fn try_from(value: Vec<String>) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ResourceManifest> for Vec<String> {
    fn from(value: ResourceManifest) -> Self {
        value.paths
    }
}
