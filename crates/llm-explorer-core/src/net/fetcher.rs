//! Network access behind a trait so the cache worker can be tested offline.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use tracing::debug;

use super::{Request, Response, ResponseKind, ResponseSource};
use crate::error::FetchError;

/// Performs a network fetch for a request.
///
/// Non-success statuses are not errors: they come back as a `Response` and
/// the caller decides what to do with them. Only transport failures are
/// reported as `Err`.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: &Request) -> Result<Response, FetchError>;
}

/// reqwest-backed fetcher for a site served from `origin`.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
    origin: Url,
}

impl HttpFetcher {
    pub fn new(origin: Url, timeout: Option<Duration>) -> Result<Self, FetchError> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
            origin,
        })
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    fn classify(&self, final_url: &Url) -> ResponseKind {
        if final_url.origin() == self.origin.origin() {
            ResponseKind::Basic
        } else {
            ResponseKind::Cors
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &Request) -> Result<Response, FetchError> {
        debug!(method = %request.method(), url = %request.url(), "Network fetch");

        let response = self
            .client
            .request(request.method().clone(), request.url().clone())
            .send()
            .await?;

        let url = response.url().clone();
        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.bytes().await?;

        Ok(Response {
            kind: self.classify(&url),
            url,
            status,
            headers,
            body,
            source: ResponseSource::Network,
        })
    }
}

/// Fetcher with no network at all, for browsing strictly from the cache.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineFetcher;

#[async_trait]
impl Fetcher for OfflineFetcher {
    async fn fetch(&self, request: &Request) -> Result<Response, FetchError> {
        Err(FetchError::Unavailable {
            url: request.url().to_string(),
        })
    }
}
