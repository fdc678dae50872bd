//! Test doubles shared by the unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{StatusCode, Url};

use crate::error::FetchError;
use crate::net::{Fetcher, Request, Response, ResponseKind, ResponseSource};

/// Serves canned responses by path and counts every network call.
/// Unknown paths answer 404.
pub struct MockFetcher {
    origin: Url,
    routes: Mutex<HashMap<String, (u16, ResponseKind, String)>>,
    calls: AtomicUsize,
    offline: AtomicBool,
}

impl MockFetcher {
    pub fn new(origin: &str) -> Self {
        Self {
            origin: Url::parse(origin).unwrap(),
            routes: Mutex::new(HashMap::new()),
            calls: AtomicUsize::new(0),
            offline: AtomicBool::new(false),
        }
    }

    pub fn page(&self, path: &str, body: &str) {
        self.respond(path, 200, ResponseKind::Basic, body);
    }

    pub fn respond(&self, path: &str, status: u16, kind: ResponseKind, body: &str) {
        self.routes
            .lock()
            .unwrap()
            .insert(path.to_string(), (status, kind, body.to_string()));
    }

    pub fn go_offline(&self) {
        self.offline.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(&self, request: &Request) -> Result<Response, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            return Err(FetchError::Unavailable {
                url: request.url().to_string(),
            });
        }

        let route = self.routes.lock().unwrap().get(request.url().path()).cloned();
        let (status, kind, body) = route.unwrap_or((404, ResponseKind::Basic, String::new()));
        let kind = if request.url().origin() == self.origin.origin() {
            kind
        } else {
            ResponseKind::Cors
        };

        Ok(Response {
            url: request.url().clone(),
            status: StatusCode::from_u16(status).unwrap(),
            headers: vec![("content-type".to_string(), "text/html".to_string())],
            body: Bytes::from(body),
            kind,
            source: ResponseSource::Network,
        })
    }
}
