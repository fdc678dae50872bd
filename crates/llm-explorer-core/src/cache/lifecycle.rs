//! Cache generation lifecycle and fetch interception.
//!
//! One [`OfflineCache`] exists per deployed cache version. It moves through
//! Installing -> Waiting -> Active (or Redundant when the precache fails):
//!
//! - install: fetch every manifest path; store them only if all succeeded
//! - activate: delete every generation except the current one
//! - intercept: cache first, network on miss, store plain same-origin 200s

use std::fmt;
use std::sync::Arc;

use futures::future::try_join_all;
use tracing::{debug, info, warn};

use super::{Cache, CacheGeneration, CacheStorage, ResourceManifest};
use crate::error::{CacheError, FetchError};
use crate::net::{Fetcher, Request, Response};
use crate::site::SiteLocation;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Installing,
    Waiting,
    Active,
    /// Install failed; the previous generation keeps serving
    Redundant,
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkerState::Installing => "installing",
            WorkerState::Waiting => "waiting",
            WorkerState::Active => "active",
            WorkerState::Redundant => "redundant",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    pub generation: CacheGeneration,
    pub cached: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationReport {
    pub generation: CacheGeneration,
    pub deleted: Vec<String>,
}

// ============================================================================
// Precache
// ============================================================================

/// Everything needed to populate a generation from the resource manifest.
/// Clone is cheap so the job can run on its own task.
#[derive(Clone)]
pub struct Precache {
    storage: CacheStorage,
    generation: CacheGeneration,
    manifest: ResourceManifest,
    site: SiteLocation,
    fetcher: Arc<dyn Fetcher>,
}

impl Precache {
    /// Fetch all manifest paths concurrently, then store all of them and
    /// mark the generation complete.
    ///
    /// Nothing is stored unless every fetch returned a success status. On
    /// failure the generation is removed again unless it was already
    /// complete before this run, which also sweeps the leftovers of an
    /// earlier interrupted install.
    pub async fn run(&self) -> Result<InstallReport, CacheError> {
        let (cache, created) = self.storage.open(&self.generation)?;
        let was_complete = !created && self.storage.is_complete(self.generation.as_str())?;

        let result = self.fetch_and_store(&cache).await;
        if result.is_err() && !was_complete {
            if let Err(e) = self.storage.delete(self.generation.as_str()) {
                warn!(
                    generation = %self.generation,
                    error = %e,
                    "Failed to remove incomplete generation"
                );
            }
        }
        result
    }

    async fn fetch_and_store(&self, cache: &Cache) -> Result<InstallReport, CacheError> {
        let targets = self.manifest.resolve(&self.site)?;

        let fetcher = &self.fetcher;
        let fetches = targets.into_iter().map(|(path, url)| async move {
            let request = Request::get(url);
            let response = fetcher
                .fetch(&request)
                .await
                .map_err(|e| CacheError::manifest_fetch(&path, e))?;
            if !response.status.is_success() {
                return Err(CacheError::manifest_fetch(
                    &path,
                    format!("status {}", response.status),
                ));
            }
            debug!(path = %path, bytes = response.body.len(), "Precached resource");
            Ok((request, response))
        });
        let fetched = try_join_all(fetches).await?;

        for (request, response) in &fetched {
            cache.put(request, response)?;
        }
        self.storage.mark_complete(&self.generation)?;

        Ok(InstallReport {
            generation: self.generation.clone(),
            cached: fetched.len(),
        })
    }

    /// True if the generation finished a precache and still holds every
    /// manifest path
    fn is_complete(&self) -> bool {
        if !matches!(self.storage.is_complete(self.generation.as_str()), Ok(true)) {
            return false;
        }
        let Ok(targets) = self.manifest.resolve(&self.site) else {
            return false;
        };
        let cache = self.storage.handle(self.generation.clone());
        targets
            .into_iter()
            .all(|(_, url)| matches!(cache.match_request(&Request::get(url)), Ok(Some(_))))
    }
}

// ============================================================================
// Interception
// ============================================================================

/// Cache-first fetch handler bound to the controlling generation.
/// With no controlling generation every request goes to the network.
#[derive(Clone)]
pub struct Interceptor {
    cache: Option<Cache>,
    fetcher: Arc<dyn Fetcher>,
}

impl Interceptor {
    pub fn new(cache: Option<Cache>, fetcher: Arc<dyn Fetcher>) -> Self {
        Self { cache, fetcher }
    }

    pub async fn handle(&self, request: Request) -> Result<Response, FetchError> {
        let Some(cache) = &self.cache else {
            return self.fetcher.fetch(&request).await;
        };

        match cache.match_request(&request) {
            Ok(Some(hit)) => {
                debug!(url = %request.url(), generation = %cache.generation(), "Cache hit");
                return Ok(hit);
            }
            Ok(None) => {}
            Err(e) => {
                warn!(url = %request.url(), error = %e, "Cache lookup failed, treating as miss");
            }
        }

        let response = self.fetcher.fetch(&request).await?;

        if !request.is_get() || !response.is_cacheable() {
            debug!(
                url = %request.url(),
                status = %response.status,
                kind = ?response.kind,
                "Not caching response"
            );
            return Ok(response);
        }

        // The snapshot shares the body bytes; the caller's copy is untouched
        if let Err(e) = cache.put(&request, &response) {
            warn!(url = %request.url(), error = %e, "Failed to store response");
        }
        Ok(response)
    }
}

// ============================================================================
// Lifecycle
// ============================================================================

/// Lifecycle state machine for one cache version.
pub struct OfflineCache {
    precache: Precache,
    state: WorkerState,
    install_in_flight: bool,
    /// Generation currently answering fetches
    controller: Option<CacheGeneration>,
}

impl OfflineCache {
    /// Build the lifecycle for `generation`, adopting the newest complete
    /// generation in storage as the controller. Generations left behind by
    /// an interrupted install are never adopted.
    ///
    /// A version whose generation is already complete skips installing: it
    /// starts Active, or Waiting if stale generations still need cleanup.
    pub fn new(
        storage: CacheStorage,
        generation: CacheGeneration,
        manifest: ResourceManifest,
        site: SiteLocation,
        fetcher: Arc<dyn Fetcher>,
    ) -> Self {
        let existing = storage.keys().unwrap_or_else(|e| {
            warn!(error = %e, "Failed to enumerate cache generations");
            Vec::new()
        });

        let precache = Precache {
            storage,
            generation,
            manifest,
            site,
            fetcher,
        };

        let current = precache.generation.as_str();
        let (state, controller) = if precache.is_complete() {
            let state = if existing.iter().any(|g| g != current) {
                WorkerState::Waiting
            } else {
                WorkerState::Active
            };
            (state, Some(precache.generation.clone()))
        } else {
            let previous = existing
                .iter()
                .rev()
                .filter(|g| g.as_str() != current)
                .find(|g| match precache.storage.is_complete(g) {
                    Ok(complete) => complete,
                    Err(e) => {
                        warn!(generation = %g, error = %e, "Failed to read cache generation");
                        false
                    }
                })
                .and_then(|g| CacheGeneration::new(g.clone()).ok());
            (WorkerState::Installing, previous)
        };

        debug!(
            generation = %precache.generation,
            state = %state,
            controller = ?controller.as_ref().map(|g| g.as_str()),
            "Offline cache created"
        );

        Self {
            precache,
            state,
            install_in_flight: false,
            controller,
        }
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    pub fn generation(&self) -> &CacheGeneration {
        &self.precache.generation
    }

    pub fn controller(&self) -> Option<&CacheGeneration> {
        self.controller.as_ref()
    }

    pub fn storage(&self) -> &CacheStorage {
        &self.precache.storage
    }

    pub fn needs_install(&self) -> bool {
        matches!(self.state, WorkerState::Installing | WorkerState::Redundant)
    }

    pub fn interceptor(&self) -> Interceptor {
        let cache = self
            .controller
            .as_ref()
            .map(|g| self.precache.storage.handle(g.clone()));
        Interceptor::new(cache, self.precache.fetcher.clone())
    }

    /// Claim the install step. The returned job runs without borrowing
    /// the lifecycle so fetches can still be served meanwhile.
    pub fn begin_install(&mut self) -> Result<Precache, CacheError> {
        if !self.needs_install() || self.install_in_flight {
            return Err(CacheError::InvalidTransition {
                operation: "install",
                state: self.state,
            });
        }
        self.state = WorkerState::Installing;
        self.install_in_flight = true;
        Ok(self.precache.clone())
    }

    pub fn finish_install(&mut self, result: &Result<InstallReport, CacheError>) {
        self.install_in_flight = false;
        match result {
            Ok(report) => {
                info!(
                    generation = %report.generation,
                    cached = report.cached,
                    "Cache generation installed"
                );
                self.state = WorkerState::Waiting;
            }
            Err(e) => {
                warn!(
                    generation = %self.precache.generation,
                    error = %e,
                    "Cache generation install failed"
                );
                self.state = WorkerState::Redundant;
            }
        }
    }

    pub async fn install(&mut self) -> Result<InstallReport, CacheError> {
        let job = self.begin_install()?;
        let result = job.run().await;
        self.finish_install(&result);
        result
    }

    /// Delete every other generation and take over interception.
    /// Activating an already active generation just repeats the sweep.
    pub fn activate(&mut self) -> Result<ActivationReport, CacheError> {
        if !matches!(self.state, WorkerState::Waiting | WorkerState::Active) {
            return Err(CacheError::InvalidTransition {
                operation: "activate",
                state: self.state,
            });
        }

        let storage = &self.precache.storage;
        let current = self.precache.generation.as_str();
        let mut deleted = Vec::new();
        for name in storage.keys()? {
            if name != current && storage.delete(&name)? {
                debug!(generation = %name, "Deleted stale cache generation");
                deleted.push(name);
            }
        }

        self.state = WorkerState::Active;
        self.controller = Some(self.precache.generation.clone());
        info!(generation = %current, deleted = deleted.len(), "Cache generation active");

        Ok(ActivationReport {
            generation: self.precache.generation.clone(),
            deleted,
        })
    }
}
