//! Application configuration management.
//!
//! This module handles loading the site configuration: where the site is
//! served from, which cache version is current and which resources are
//! precached.
//!
//! Configuration is read from `~/.config/llm-explorer/config.json` when it
//! exists, then overridden by environment variables.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::cache::{CacheGeneration, ResourceManifest};
use crate::site::{normalize_base_path, SiteLocation};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "llm-explorer";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Where the public site is deployed
pub const DEFAULT_ORIGIN: &str = "https://llm-explorer.vercel.app";

pub const ENV_ORIGIN: &str = "LLM_EXPLORER_ORIGIN";
pub const ENV_BASE_PATH: &str = "LLM_EXPLORER_BASE_PATH";
pub const ENV_CACHE_VERSION: &str = "LLM_EXPLORER_CACHE_VERSION";
pub const ENV_STORAGE_DIR: &str = "LLM_EXPLORER_STORAGE_DIR";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub origin: String,
    pub base_path: String,
    pub cache_version: CacheGeneration,
    pub resources: ResourceManifest,
    pub storage_dir: Option<PathBuf>,
    /// Off by default: fetches either complete or fail
    pub request_timeout_secs: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            origin: DEFAULT_ORIGIN.to_string(),
            base_path: String::new(),
            cache_version: CacheGeneration::default(),
            resources: ResourceManifest::default(),
            storage_dir: None,
            request_timeout_secs: None,
        }
    }
}

impl Config {
    /// Load the config file (if any) and apply environment overrides
    pub fn load() -> Result<Self> {
        let mut config = match Self::config_path() {
            Ok(path) => Self::load_from(&path)?,
            Err(_) => Self::default(),
        };
        config.apply_overrides(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let mut config: Config = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.base_path = normalize_base_path(&config.base_path);
        Ok(config)
    }

    /// Apply overrides from a variable lookup (the process environment in
    /// production).
    ///
    /// When built by GitHub Actions the site lives under `/<repo>`, so
    /// `GITHUB_REPOSITORY` supplies the base path unless one is given.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(origin) = lookup(ENV_ORIGIN) {
            self.origin = origin;
        }

        if let Some(base_path) = lookup(ENV_BASE_PATH) {
            self.base_path = normalize_base_path(&base_path);
        } else if lookup("GITHUB_ACTIONS").is_some() {
            if let Some(repository) = lookup("GITHUB_REPOSITORY") {
                let repo = repository.rsplit('/').next().unwrap_or(&repository);
                self.base_path = normalize_base_path(repo);
            }
        }

        if let Some(version) = lookup(ENV_CACHE_VERSION) {
            self.cache_version = CacheGeneration::new(version)
                .with_context(|| format!("Invalid {}", ENV_CACHE_VERSION))?;
        }

        if let Some(dir) = lookup(ENV_STORAGE_DIR) {
            self.storage_dir = Some(PathBuf::from(dir));
        }

        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Root directory for cache generations
    pub fn storage_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.storage_dir {
            return Ok(dir.clone());
        }
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    pub fn site(&self) -> Result<SiteLocation> {
        SiteLocation::new(&self.origin, &self.base_path)
            .with_context(|| format!("Invalid site origin: {}", self.origin))
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.cache_version.as_str(), "llm-explorer-v1");
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"origin": "http://localhost:3000", "base_path": "docs/", "resources": ["/", "/learn"]}"#,
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.origin, "http://localhost:3000");
        assert_eq!(config.base_path, "/docs");
        assert_eq!(config.resources.paths(), ["/", "/learn"]);
        assert_eq!(config.cache_version, CacheGeneration::default());
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"resources": ["relative"]}"#).unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config
            .apply_overrides(lookup(&[
                (ENV_ORIGIN, "https://example.org"),
                (ENV_BASE_PATH, "/site/"),
                (ENV_CACHE_VERSION, "llm-explorer-v2"),
                (ENV_STORAGE_DIR, "/tmp/llm-cache"),
            ]))
            .unwrap();
        assert_eq!(config.origin, "https://example.org");
        assert_eq!(config.base_path, "/site");
        assert_eq!(config.cache_version.as_str(), "llm-explorer-v2");
        assert_eq!(config.storage_dir().unwrap(), PathBuf::from("/tmp/llm-cache"));
    }

    #[test]
    fn test_github_actions_base_path() {
        let mut config = Config::default();
        config
            .apply_overrides(lookup(&[
                ("GITHUB_ACTIONS", "true"),
                ("GITHUB_REPOSITORY", "someone/llm-explorer"),
            ]))
            .unwrap();
        assert_eq!(config.base_path, "/llm-explorer");

        // An explicit base path wins
        let mut config = Config::default();
        config
            .apply_overrides(lookup(&[
                ("GITHUB_ACTIONS", "true"),
                ("GITHUB_REPOSITORY", "someone/llm-explorer"),
                (ENV_BASE_PATH, ""),
            ]))
            .unwrap();
        assert_eq!(config.base_path, "");
    }

    #[test]
    fn test_invalid_cache_version_override() {
        let mut config = Config::default();
        assert!(config
            .apply_overrides(lookup(&[(ENV_CACHE_VERSION, "../escape")]))
            .is_err());
    }
}
