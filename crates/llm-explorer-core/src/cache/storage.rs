//! Named, versioned response storage.
//!
//! A [`CacheStorage`] holds any number of cache generations, each a map
//! from [`RequestKey`] to a [`StoredResponse`]. Two backends are provided:
//! [`MemoryBackend`] for tests and throwaway runs, and [`DiskBackend`] which
//! keeps one directory per generation under a root directory.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use super::CacheGeneration;
use crate::error::CacheError;
use crate::net::{Request, RequestKey, Response, ResponseKind, ResponseSource};

// ============================================================================
// Stored entries
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryMeta {
    pub key: String,
    pub url: String,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub stored_at: DateTime<Utc>,
}

/// Immutable snapshot of a response as it was when stored.
#[derive(Debug, Clone)]
pub struct StoredResponse {
    pub meta: EntryMeta,
    pub body: Bytes,
}

impl StoredResponse {
    pub fn snapshot(key: &RequestKey, response: &Response) -> Self {
        Self {
            meta: EntryMeta {
                key: key.as_str().to_string(),
                url: response.url.to_string(),
                status: response.status.as_u16(),
                headers: response.headers.clone(),
                stored_at: Utc::now(),
            },
            body: response.body.clone(),
        }
    }

    pub fn to_response(&self) -> Result<Response, CacheError> {
        let corrupt = |reason: String| {
            CacheError::Storage(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("entry {}: {}", self.meta.key, reason),
            ))
        };
        let url = Url::parse(&self.meta.url).map_err(|e| corrupt(e.to_string()))?;
        let status = StatusCode::from_u16(self.meta.status).map_err(|e| corrupt(e.to_string()))?;

        Ok(Response {
            url,
            status,
            headers: self.meta.headers.clone(),
            body: self.body.clone(),
            kind: ResponseKind::Basic,
            source: ResponseSource::Cache,
        })
    }

    pub fn age_minutes(&self) -> i64 {
        (Utc::now() - self.meta.stored_at).num_minutes()
    }
}

// ============================================================================
// Backends
// ============================================================================

/// Storage primitive shared by all page instances of one origin.
///
/// `put` replaces a whole entry atomically and fails with `NotFound` if the
/// generation does not exist; a generation is only created by `open`. A
/// generation counts as complete only once `mark_complete` has been called
/// after its precache finished.
pub trait StorageBackend: Send + Sync {
    /// Existing generation tags, oldest first
    fn generations(&self) -> Result<Vec<String>, CacheError>;

    /// Open a generation, creating it if needed. Returns true if created.
    fn open(&self, generation: &str) -> Result<bool, CacheError>;

    /// Delete a generation and all its entries. Returns true if it existed.
    fn delete(&self, generation: &str) -> Result<bool, CacheError>;

    fn mark_complete(&self, generation: &str) -> Result<(), CacheError>;

    /// False for missing generations
    fn is_complete(&self, generation: &str) -> Result<bool, CacheError>;

    fn get(
        &self,
        generation: &str,
        key: &RequestKey,
    ) -> Result<Option<StoredResponse>, CacheError>;

    fn put(
        &self,
        generation: &str,
        key: &RequestKey,
        entry: &StoredResponse,
    ) -> Result<(), CacheError>;

    fn entry_count(&self, generation: &str) -> Result<usize, CacheError>;
}

fn missing_generation(generation: &str) -> CacheError {
    CacheError::Storage(io::Error::new(
        io::ErrorKind::NotFound,
        format!("cache generation {} does not exist", generation),
    ))
}

#[derive(Default)]
struct MemoryGeneration {
    name: String,
    complete: bool,
    entries: HashMap<RequestKey, StoredResponse>,
}

/// In-process backend; generations keep their creation order.
#[derive(Default)]
pub struct MemoryBackend {
    generations: Mutex<Vec<MemoryGeneration>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<MemoryGeneration>> {
        self.generations.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl StorageBackend for MemoryBackend {
    fn generations(&self) -> Result<Vec<String>, CacheError> {
        Ok(self.lock().iter().map(|g| g.name.clone()).collect())
    }

    fn open(&self, generation: &str) -> Result<bool, CacheError> {
        let mut generations = self.lock();
        if generations.iter().any(|g| g.name == generation) {
            return Ok(false);
        }
        generations.push(MemoryGeneration {
            name: generation.to_string(),
            ..Default::default()
        });
        Ok(true)
    }

    fn delete(&self, generation: &str) -> Result<bool, CacheError> {
        let mut generations = self.lock();
        let before = generations.len();
        generations.retain(|g| g.name != generation);
        Ok(generations.len() != before)
    }

    fn mark_complete(&self, generation: &str) -> Result<(), CacheError> {
        let mut generations = self.lock();
        let found = generations
            .iter_mut()
            .find(|g| g.name == generation)
            .ok_or_else(|| missing_generation(generation))?;
        found.complete = true;
        Ok(())
    }

    fn is_complete(&self, generation: &str) -> Result<bool, CacheError> {
        Ok(self
            .lock()
            .iter()
            .any(|g| g.name == generation && g.complete))
    }

    fn get(
        &self,
        generation: &str,
        key: &RequestKey,
    ) -> Result<Option<StoredResponse>, CacheError> {
        Ok(self
            .lock()
            .iter()
            .find(|g| g.name == generation)
            .and_then(|g| g.entries.get(key).cloned()))
    }

    fn put(
        &self,
        generation: &str,
        key: &RequestKey,
        entry: &StoredResponse,
    ) -> Result<(), CacheError> {
        let mut generations = self.lock();
        let found = generations
            .iter_mut()
            .find(|g| g.name == generation)
            .ok_or_else(|| missing_generation(generation))?;
        found.entries.insert(key.clone(), entry.clone());
        Ok(())
    }

    fn entry_count(&self, generation: &str) -> Result<usize, CacheError> {
        Ok(self
            .lock()
            .iter()
            .find(|g| g.name == generation)
            .map(|g| g.entries.len())
            .unwrap_or(0))
    }
}

/// Marker file that makes a directory a cache generation
const GENERATION_MARKER: &str = "generation.json";

/// Extension for entry files
const ENTRY_EXT: &str = "entry";

#[derive(Debug, Serialize, Deserialize)]
struct GenerationMarker {
    created_at: DateTime<Utc>,
    /// Markers written before the precache finished lack this field
    #[serde(default)]
    complete: bool,
}

/// Filesystem backend.
///
/// Layout: `<root>/<generation>/generation.json` plus one
/// `<sha256(key)>.entry` file per entry. An entry file is the compact JSON
/// metadata on the first line followed by the raw body, written to a
/// temporary file and renamed into place.
///
/// The marker is what publishes a generation: entries of a directory
/// without one are never read or written.
pub struct DiskBackend {
    root: PathBuf,
    tmp_counter: AtomicU64,
}

impl DiskBackend {
    pub fn new(root: PathBuf) -> Result<Self, CacheError> {
        std::fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            tmp_counter: AtomicU64::new(0),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn generation_dir(&self, generation: &str) -> PathBuf {
        self.root.join(generation)
    }

    fn entry_path(&self, generation: &str, key: &RequestKey) -> PathBuf {
        let digest = Sha256::digest(key.as_str().as_bytes());
        self.generation_dir(generation)
            .join(format!("{}.{}", hex::encode(digest), ENTRY_EXT))
    }

    fn read_marker(dir: &Path) -> Option<GenerationMarker> {
        let contents = std::fs::read_to_string(dir.join(GENERATION_MARKER)).ok()?;
        serde_json::from_str(&contents).ok()
    }

    fn write_marker(&self, dir: &Path, marker: &GenerationMarker) -> Result<(), CacheError> {
        let contents = serde_json::to_vec(marker).map_err(|e| {
            CacheError::Storage(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("failed to encode generation marker: {}", e),
            ))
        })?;
        self.write_atomic(&dir.join(GENERATION_MARKER), &contents)
    }

    fn write_atomic(&self, path: &Path, contents: &[u8]) -> Result<(), CacheError> {
        let n = self.tmp_counter.fetch_add(1, Ordering::Relaxed);
        let tmp = path.with_extension(format!("tmp.{}.{}", std::process::id(), n));
        std::fs::write(&tmp, contents)?;
        if let Err(e) = std::fs::rename(&tmp, path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(())
    }
}

impl StorageBackend for DiskBackend {
    fn generations(&self) -> Result<Vec<String>, CacheError> {
        let mut found = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let path = entry?.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !path.is_dir() || !CacheGeneration::is_valid(name) {
                continue;
            }
            match Self::read_marker(&path) {
                Some(marker) => found.push((marker.created_at, name.to_string())),
                None => debug!(
                    dir = %path.display(),
                    "Skipping directory without generation marker"
                ),
            }
        }
        found.sort();
        Ok(found.into_iter().map(|(_, name)| name).collect())
    }

    fn open(&self, generation: &str) -> Result<bool, CacheError> {
        let dir = self.generation_dir(generation);
        if Self::read_marker(&dir).is_some() {
            return Ok(false);
        }
        std::fs::create_dir_all(&dir)?;
        let marker = GenerationMarker {
            created_at: Utc::now(),
            complete: false,
        };
        self.write_marker(&dir, &marker)?;
        Ok(true)
    }

    fn delete(&self, generation: &str) -> Result<bool, CacheError> {
        let dir = self.generation_dir(generation);

        // Unpublish first: puts and gets stop at the missing marker
        let existed = match std::fs::remove_file(dir.join(GENERATION_MARKER)) {
            Ok(()) => true,
            Err(e) if e.kind() == io::ErrorKind::NotFound => false,
            Err(e) => return Err(e.into()),
        };

        // A put that checked the marker just before it went can still land
        // one entry while the directory is being emptied, so retry once.
        let mut result = std::fs::remove_dir_all(&dir);
        if let Err(ref e) = result {
            if e.kind() != io::ErrorKind::NotFound {
                debug!(generation, error = %e, "Retrying generation delete");
                result = std::fs::remove_dir_all(&dir);
            }
        }

        match result {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(existed),
            Err(e) => Err(e.into()),
        }
    }

    fn mark_complete(&self, generation: &str) -> Result<(), CacheError> {
        let dir = self.generation_dir(generation);
        let mut marker = Self::read_marker(&dir).ok_or_else(|| missing_generation(generation))?;
        marker.complete = true;
        self.write_marker(&dir, &marker)
    }

    fn is_complete(&self, generation: &str) -> Result<bool, CacheError> {
        Ok(Self::read_marker(&self.generation_dir(generation))
            .map(|marker| marker.complete)
            .unwrap_or(false))
    }

    fn get(
        &self,
        generation: &str,
        key: &RequestKey,
    ) -> Result<Option<StoredResponse>, CacheError> {
        if !self.generation_dir(generation).join(GENERATION_MARKER).is_file() {
            return Ok(None);
        }

        let path = self.entry_path(generation, key);
        let contents = match std::fs::read(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let split = contents
            .iter()
            .position(|&b| b == b'\n')
            .ok_or_else(|| {
                CacheError::Storage(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("entry file {} has no header line", path.display()),
                ))
            })?;
        let meta: EntryMeta = serde_json::from_slice(&contents[..split])?;
        if meta.key != key.as_str() {
            // Digest collision or a hand-edited file; either way not our entry
            debug!(expected = %key, found = %meta.key, "Entry key mismatch");
            return Ok(None);
        }

        let body = Bytes::copy_from_slice(&contents[split + 1..]);
        Ok(Some(StoredResponse { meta, body }))
    }

    fn put(
        &self,
        generation: &str,
        key: &RequestKey,
        entry: &StoredResponse,
    ) -> Result<(), CacheError> {
        if Self::read_marker(&self.generation_dir(generation)).is_none() {
            return Err(missing_generation(generation));
        }

        let mut contents = serde_json::to_vec(&entry.meta)?;
        contents.push(b'\n');
        contents.extend_from_slice(&entry.body);
        self.write_atomic(&self.entry_path(generation, key), &contents)
    }

    fn entry_count(&self, generation: &str) -> Result<usize, CacheError> {
        let dir = self.generation_dir(generation);
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };
        let mut count = 0;
        for entry in entries {
            if entry?.path().extension().and_then(|e| e.to_str()) == Some(ENTRY_EXT) {
                count += 1;
            }
        }
        Ok(count)
    }
}

// ============================================================================
// Storage handles
// ============================================================================

/// Handle to the origin's cache storage.
/// Clone is cheap - all clones share one backend.
#[derive(Clone)]
pub struct CacheStorage {
    backend: Arc<dyn StorageBackend>,
}

impl CacheStorage {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self { backend }
    }

    pub fn memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()))
    }

    pub fn disk(root: PathBuf) -> Result<Self, CacheError> {
        Ok(Self::new(Arc::new(DiskBackend::new(root)?)))
    }

    /// Open (or create) a generation. The flag is true if it was created.
    pub fn open(&self, generation: &CacheGeneration) -> Result<(Cache, bool), CacheError> {
        let created = self.backend.open(generation.as_str())?;
        Ok((self.handle(generation.clone()), created))
    }

    /// Handle to a generation without creating it
    pub fn handle(&self, generation: CacheGeneration) -> Cache {
        Cache {
            backend: self.backend.clone(),
            generation,
        }
    }

    /// Existing generation tags, oldest first
    pub fn keys(&self) -> Result<Vec<String>, CacheError> {
        self.backend.generations()
    }

    pub fn has(&self, generation: &str) -> Result<bool, CacheError> {
        Ok(self.keys()?.iter().any(|g| g == generation))
    }

    pub fn delete(&self, generation: &str) -> Result<bool, CacheError> {
        self.backend.delete(generation)
    }

    /// Record that every precached entry of `generation` has been stored
    pub fn mark_complete(&self, generation: &CacheGeneration) -> Result<(), CacheError> {
        self.backend.mark_complete(generation.as_str())
    }

    pub fn is_complete(&self, generation: &str) -> Result<bool, CacheError> {
        self.backend.is_complete(generation)
    }

    pub fn entry_count(&self, generation: &str) -> Result<usize, CacheError> {
        self.backend.entry_count(generation)
    }
}

/// Handle to one cache generation.
#[derive(Clone)]
pub struct Cache {
    backend: Arc<dyn StorageBackend>,
    generation: CacheGeneration,
}

impl Cache {
    pub fn generation(&self) -> &CacheGeneration {
        &self.generation
    }

    /// Look up a stored response. Only GET requests can match.
    pub fn match_request(&self, request: &Request) -> Result<Option<Response>, CacheError> {
        self.entry(request)?
            .map(|stored| stored.to_response())
            .transpose()
    }

    /// The raw stored entry for `request`, with its metadata.
    pub fn entry(&self, request: &Request) -> Result<Option<StoredResponse>, CacheError> {
        if !request.is_get() {
            return Ok(None);
        }
        self.backend.get(self.generation.as_str(), &request.key())
    }

    /// Store a snapshot of `response` under the request's identity.
    pub fn put(&self, request: &Request, response: &Response) -> Result<(), CacheError> {
        if !request.is_get() {
            return Err(CacheError::Storage(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("refusing to cache {} request", request.method()),
            )));
        }
        let key = request.key();
        let entry = StoredResponse::snapshot(&key, response);
        self.backend.put(self.generation.as_str(), &key, &entry)
    }

    pub fn len(&self) -> Result<usize, CacheError> {
        self.backend.entry_count(self.generation.as_str())
    }

    pub fn is_empty(&self) -> Result<bool, CacheError> {
        Ok(self.len()? == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::Method;
    use tempfile::TempDir;

    fn request(path: &str) -> Request {
        Request::parse_get(&format!("https://llm-explorer.example{}", path)).unwrap()
    }

    fn response(path: &str, body: &'static str) -> Response {
        Response {
            url: Url::parse(&format!("https://llm-explorer.example{}", path)).unwrap(),
            status: StatusCode::OK,
            headers: vec![("content-type".to_string(), "text/html".to_string())],
            body: Bytes::from_static(body.as_bytes()),
            kind: ResponseKind::Basic,
            source: ResponseSource::Network,
        }
    }

    fn generation(tag: &str) -> CacheGeneration {
        CacheGeneration::new(tag).unwrap()
    }

    fn exercise_backend(storage: CacheStorage) {
        let (cache, created) = storage.open(&generation("v1")).unwrap();
        assert!(created);
        assert!(cache.is_empty().unwrap());

        // Reopening does not recreate
        let (_, created) = storage.open(&generation("v1")).unwrap();
        assert!(!created);

        assert!(!storage.is_complete("v1").unwrap());
        storage.mark_complete(&generation("v1")).unwrap();
        assert!(storage.is_complete("v1").unwrap());
        assert!(!storage.is_complete("missing").unwrap());
        assert!(storage.mark_complete(&generation("missing")).is_err());

        cache.put(&request("/learn"), &response("/learn", "learn")).unwrap();
        let hit = cache.match_request(&request("/learn")).unwrap().unwrap();
        assert_eq!(hit.text(), "learn");
        assert_eq!(hit.source, ResponseSource::Cache);
        assert_eq!(hit.header("Content-Type"), Some("text/html"));
        assert!(cache.match_request(&request("/about")).unwrap().is_none());

        // Replace, never mutate: the new snapshot wins
        cache.put(&request("/learn"), &response("/learn", "learn v2")).unwrap();
        let replaced = cache.match_request(&request("/learn")).unwrap().unwrap();
        assert_eq!(replaced.text(), "learn v2");
        assert_eq!(cache.len().unwrap(), 1);

        storage.open(&generation("v2")).unwrap();
        assert_eq!(storage.keys().unwrap(), vec!["v1".to_string(), "v2".to_string()]);

        assert!(storage.delete("v1").unwrap());
        assert!(!storage.delete("v1").unwrap());
        assert!(!storage.is_complete("v1").unwrap());
        assert_eq!(storage.keys().unwrap(), vec!["v2".to_string()]);
        assert!(cache.match_request(&request("/learn")).unwrap().is_none());

        // Writes into a deleted generation do not resurrect it
        assert!(cache.put(&request("/learn"), &response("/learn", "late")).is_err());
        assert!(!storage.has("v1").unwrap());
    }

    #[test]
    fn test_memory_backend() {
        exercise_backend(CacheStorage::memory());
    }

    #[test]
    fn test_disk_backend() {
        let dir = TempDir::new().unwrap();
        exercise_backend(CacheStorage::disk(dir.path().join("cache")).unwrap());
    }

    #[test]
    fn test_disk_entries_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().to_path_buf();
        {
            let storage = CacheStorage::disk(root.clone()).unwrap();
            let (cache, _) = storage.open(&generation("llm-explorer-v1")).unwrap();
            cache
                .put(&request("/data/llm-data.json"), &response("/data/llm-data.json", "[]\n{}"))
                .unwrap();
        }

        let storage = CacheStorage::disk(root).unwrap();
        assert_eq!(storage.keys().unwrap(), vec!["llm-explorer-v1".to_string()]);
        let cache = storage.handle(generation("llm-explorer-v1"));
        let hit = cache
            .match_request(&request("/data/llm-data.json"))
            .unwrap()
            .unwrap();
        // Body bytes after the header line are kept verbatim, newlines included
        assert_eq!(hit.text(), "[]\n{}");
    }

    #[test]
    fn test_disk_ignores_foreign_directories() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("not-a-generation")).unwrap();
        let storage = CacheStorage::disk(dir.path().to_path_buf()).unwrap();
        assert!(storage.keys().unwrap().is_empty());
    }

    #[test]
    fn test_non_get_requests_never_match_or_store() {
        let storage = CacheStorage::memory();
        let (cache, _) = storage.open(&generation("v1")).unwrap();
        let url = Url::parse("https://llm-explorer.example/learn").unwrap();
        let post = Request::new(Method::POST, url);

        assert!(cache.put(&post, &response("/learn", "x")).is_err());
        assert!(cache.match_request(&post).unwrap().is_none());
        assert!(cache.is_empty().unwrap());
    }

    #[test]
    fn test_disk_completion_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().to_path_buf();
        {
            let storage = CacheStorage::disk(root.clone()).unwrap();
            storage.open(&generation("v1")).unwrap();
            storage.open(&generation("v2")).unwrap();
            storage.mark_complete(&generation("v1")).unwrap();
        }

        let storage = CacheStorage::disk(root).unwrap();
        assert!(storage.is_complete("v1").unwrap());
        assert!(!storage.is_complete("v2").unwrap());
    }

    #[test]
    fn test_disk_marker_without_completion_flag_is_incomplete() {
        let dir = TempDir::new().unwrap();
        let gen_dir = dir.path().join("v1");
        std::fs::create_dir_all(&gen_dir).unwrap();
        std::fs::write(
            gen_dir.join(GENERATION_MARKER),
            r#"{"created_at":"2024-05-01T12:00:00Z"}"#,
        )
        .unwrap();

        let storage = CacheStorage::disk(dir.path().to_path_buf()).unwrap();
        assert_eq!(storage.keys().unwrap(), vec!["v1".to_string()]);
        assert!(!storage.is_complete("v1").unwrap());
    }

    #[test]
    fn test_disk_directory_without_marker_is_unpublished() {
        let dir = TempDir::new().unwrap();
        let storage = CacheStorage::disk(dir.path().to_path_buf()).unwrap();
        let (cache, _) = storage.open(&generation("v1")).unwrap();
        cache.put(&request("/learn"), &response("/learn", "learn")).unwrap();

        // State left behind by a delete that lost the marker but not the entries
        std::fs::remove_file(dir.path().join("v1").join(GENERATION_MARKER)).unwrap();

        assert!(cache.match_request(&request("/learn")).unwrap().is_none());
        assert!(cache.put(&request("/about"), &response("/about", "about")).is_err());
        assert!(storage.keys().unwrap().is_empty());

        // The leftover directory is still swept
        assert!(storage.delete("v1").unwrap());
        assert!(!dir.path().join("v1").exists());
    }
}
