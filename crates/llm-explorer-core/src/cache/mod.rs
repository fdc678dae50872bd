//! Offline response cache.
//!
//! This module provides the versioned cache that keeps the site usable
//! without a network connection:
//! - `CacheStorage` / `Cache`: generations of stored response snapshots
//! - `ResourceManifest`: the paths precached for every generation
//! - `OfflineCache`: the Installing -> Waiting -> Active lifecycle
//! - `WorkerHandle`: message-passing front door to the background worker
//!
//! Only one generation is current; activation deletes all others.

pub mod generation;
pub mod lifecycle;
pub mod manifest;
pub mod storage;
pub mod worker;

pub use generation::{CacheGeneration, DEFAULT_GENERATION};
pub use lifecycle::{
    ActivationReport, InstallReport, Interceptor, OfflineCache, Precache, WorkerState,
};
pub use manifest::{ResourceManifest, DEFAULT_RESOURCES};
pub use storage::{
    Cache, CacheStorage, DiskBackend, MemoryBackend, StorageBackend, StoredResponse,
};
pub use worker::{spawn, WorkerHandle, WorkerStatus};
