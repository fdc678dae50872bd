//! Page session: the single owner of everything the UI layer may touch.
//!
//! A session holds the handle to the background cache worker, a direct
//! network fetcher used when no worker is available, and the install
//! tracker. The UI never reaches the cache storage itself.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::cache::{self, CacheStorage, OfflineCache, WorkerHandle, WorkerStatus};
use crate::catalogue::{Catalogue, CATALOGUE_PATH};
use crate::config::Config;
use crate::error::FetchError;
use crate::install::{BrowserEnvironment, InstallTracker};
use crate::net::{Fetcher, HttpFetcher, OfflineFetcher, Request, Response};
use crate::site::SiteLocation;

pub struct PageSession {
    site: SiteLocation,
    worker: Option<WorkerHandle>,
    network: Arc<dyn Fetcher>,
    install: InstallTracker,
}

impl PageSession {
    /// Open a session from configuration, backed by the disk cache.
    ///
    /// With `offline` set no network request is ever made; everything must
    /// come from the cache.
    pub async fn open(
        config: &Config,
        environment: Option<BrowserEnvironment>,
        offline: bool,
    ) -> Result<Self> {
        let site = config.site()?;
        let network: Arc<dyn Fetcher> = if offline {
            Arc::new(OfflineFetcher)
        } else {
            Arc::new(
                HttpFetcher::new(site.origin().clone(), config.request_timeout())
                    .context("Failed to create HTTP client")?,
            )
        };

        let storage = config
            .storage_dir()
            .and_then(|dir| CacheStorage::disk(dir).map_err(Into::into));
        let offline_cache = match storage {
            Ok(storage) => Some(OfflineCache::new(
                storage,
                config.cache_version.clone(),
                config.resources.clone(),
                site.clone(),
                network.clone(),
            )),
            Err(e) => {
                warn!(error = %e, "Cache storage unavailable, using the network directly");
                None
            }
        };

        Ok(Self::register(site, offline_cache, network, environment).await)
    }

    /// Start the worker for `offline_cache` (if any) and bring it to active.
    ///
    /// Registration problems are logged and otherwise ignored: the worker
    /// still answers fetches from whatever generation controls it, or from
    /// the network.
    pub async fn register(
        site: SiteLocation,
        offline_cache: Option<OfflineCache>,
        network: Arc<dyn Fetcher>,
        environment: Option<BrowserEnvironment>,
    ) -> Self {
        let worker = offline_cache.map(cache::spawn);
        if let Some(ref worker) = worker {
            match worker.register().await {
                Ok(status) => info!(
                    generation = %status.generation,
                    state = %status.state,
                    "Cache worker registered"
                ),
                Err(e) => warn!(error = %e, "Cache worker registration failed"),
            }
        }

        Self {
            site,
            worker,
            network,
            install: InstallTracker::new(environment),
        }
    }

    pub fn site(&self) -> &SiteLocation {
        &self.site
    }

    pub fn install(&self) -> &InstallTracker {
        &self.install
    }

    pub fn install_mut(&mut self) -> &mut InstallTracker {
        &mut self.install
    }

    pub async fn worker_status(&self) -> Option<WorkerStatus> {
        match self.worker {
            Some(ref worker) => worker.status().await.ok(),
            None => None,
        }
    }

    /// Fetch a site path, e.g. `/learn`
    pub async fn fetch(&self, path: &str) -> Result<Response, FetchError> {
        let url = self.site.url_for(path)?;
        self.fetch_request(Request::get(url)).await
    }

    pub async fn fetch_request(&self, request: Request) -> Result<Response, FetchError> {
        let Some(ref worker) = self.worker else {
            return self.network.fetch(&request).await;
        };

        match worker.fetch(request.clone()).await {
            Err(FetchError::WorkerGone) => {
                warn!(url = %request.url(), "Cache worker gone, fetching directly");
                self.network.fetch(&request).await
            }
            result => result,
        }
    }

    pub async fn catalogue(&self) -> Result<Catalogue> {
        let response = self
            .fetch(CATALOGUE_PATH)
            .await
            .context("Failed to fetch the model catalogue")?;
        if !response.status.is_success() {
            anyhow::bail!("Model catalogue request returned {}", response.status);
        }
        Catalogue::from_json(&response.body).context("Failed to parse the model catalogue")
    }
}
