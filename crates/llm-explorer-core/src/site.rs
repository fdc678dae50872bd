//! Where the site lives: origin plus the deployment base path.

use reqwest::Url;

use crate::error::FetchError;

/// Normalize a base path to `""` or `/segment[/segment...]` with no
/// trailing slash.
pub fn normalize_base_path(base_path: &str) -> String {
    let trimmed = base_path.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{}", trimmed)
    }
}

/// Prefix a site-absolute path with the base path
pub fn with_base_path(base_path: &str, path: &str) -> String {
    let path = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    };
    format!("{}{}", normalize_base_path(base_path), path)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteLocation {
    origin: Url,
    base_path: String,
}

impl SiteLocation {
    pub fn new(origin: &str, base_path: &str) -> Result<Self, FetchError> {
        let mut origin = Url::parse(origin).map_err(|e| FetchError::InvalidUrl {
            url: origin.to_string(),
            reason: e.to_string(),
        })?;
        if origin.cannot_be_a_base() {
            return Err(FetchError::InvalidUrl {
                url: origin.to_string(),
                reason: "origin cannot be a base URL".to_string(),
            });
        }
        origin.set_path("/");
        origin.set_query(None);
        origin.set_fragment(None);

        Ok(Self {
            origin,
            base_path: normalize_base_path(base_path),
        })
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    /// Absolute URL for a site path such as `/learn`
    pub fn url_for(&self, path: &str) -> Result<Url, FetchError> {
        let full = with_base_path(&self.base_path, path);
        self.origin.join(&full).map_err(|e| FetchError::InvalidUrl {
            url: full,
            reason: e.to_string(),
        })
    }
}
