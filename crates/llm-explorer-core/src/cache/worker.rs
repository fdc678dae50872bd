//! Background cache worker.
//!
//! The worker owns an [`OfflineCache`] on its own tokio task. The page side
//! holds a [`WorkerHandle`] and talks to it only through messages carrying
//! a oneshot reply; no state is shared between the two.
//!
//! Lifecycle messages are handled in order. The precache fetches and each
//! intercepted fetch run on spawned tasks so the loop keeps answering.

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use super::{ActivationReport, CacheGeneration, InstallReport, OfflineCache, WorkerState};
use crate::error::{CacheError, FetchError};
use crate::net::{Request, Response};

/// Buffer size for the worker message channel.
/// Page fetches are awaited one by one, so 32 leaves plenty of headroom.
const CHANNEL_BUFFER_SIZE: usize = 32;

enum WorkerMessage {
    Install(oneshot::Sender<Result<InstallReport, CacheError>>),
    Activate(oneshot::Sender<Result<ActivationReport, CacheError>>),
    Fetch(Request, oneshot::Sender<Result<Response, FetchError>>),
    Status(oneshot::Sender<WorkerStatus>),
}

type InstallDone = (
    Result<InstallReport, CacheError>,
    oneshot::Sender<Result<InstallReport, CacheError>>,
);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerStatus {
    pub state: WorkerState,
    pub generation: CacheGeneration,
    pub controller: Option<CacheGeneration>,
}

/// Page-side handle to the cache worker.
/// Clone is cheap - all clones feed the same worker.
#[derive(Clone)]
pub struct WorkerHandle {
    tx: mpsc::Sender<WorkerMessage>,
}

/// Spawn the worker task for `cache`. It stops once every handle is dropped.
pub fn spawn(cache: OfflineCache) -> WorkerHandle {
    let (tx, rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);
    tokio::spawn(run(cache, rx));
    WorkerHandle { tx }
}

async fn run(mut cache: OfflineCache, mut rx: mpsc::Receiver<WorkerMessage>) {
    let (done_tx, mut done_rx) = mpsc::channel::<InstallDone>(1);

    loop {
        tokio::select! {
            message = rx.recv() => {
                let Some(message) = message else { break };
                match message {
                    WorkerMessage::Install(reply) => match cache.begin_install() {
                        Ok(job) => {
                            let done_tx = done_tx.clone();
                            tokio::spawn(async move {
                                let result = job.run().await;
                                let _ = done_tx.send((result, reply)).await;
                            });
                        }
                        Err(e) => {
                            let _ = reply.send(Err(e));
                        }
                    },
                    WorkerMessage::Activate(reply) => {
                        let _ = reply.send(cache.activate());
                    }
                    WorkerMessage::Fetch(request, reply) => {
                        let interceptor = cache.interceptor();
                        tokio::spawn(async move {
                            let _ = reply.send(interceptor.handle(request).await);
                        });
                    }
                    WorkerMessage::Status(reply) => {
                        let _ = reply.send(WorkerStatus {
                            state: cache.state(),
                            generation: cache.generation().clone(),
                            controller: cache.controller().cloned(),
                        });
                    }
                }
            }
            Some((result, reply)) = done_rx.recv() => {
                cache.finish_install(&result);
                let _ = reply.send(result);
            }
        }
    }

    debug!(generation = %cache.generation(), "Cache worker stopped");
}

impl WorkerHandle {
    async fn call<T>(
        &self,
        message: impl FnOnce(oneshot::Sender<T>) -> WorkerMessage,
    ) -> Option<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx.send(message(reply_tx)).await.ok()?;
        reply_rx.await.ok()
    }

    pub async fn install(&self) -> Result<InstallReport, CacheError> {
        self.call(WorkerMessage::Install)
            .await
            .unwrap_or(Err(CacheError::WorkerGone))
    }

    pub async fn activate(&self) -> Result<ActivationReport, CacheError> {
        self.call(WorkerMessage::Activate)
            .await
            .unwrap_or(Err(CacheError::WorkerGone))
    }

    pub async fn fetch(&self, request: Request) -> Result<Response, FetchError> {
        self.call(|reply| WorkerMessage::Fetch(request, reply))
            .await
            .unwrap_or(Err(FetchError::WorkerGone))
    }

    pub async fn status(&self) -> Result<WorkerStatus, CacheError> {
        self.call(WorkerMessage::Status)
            .await
            .ok_or(CacheError::WorkerGone)
    }

    /// Bring the worker to Active: install if this version is new, then
    /// activate. A failed install leaves the previous generation serving.
    pub async fn register(&self) -> Result<WorkerStatus, CacheError> {
        let status = self.status().await?;
        if matches!(status.state, WorkerState::Installing | WorkerState::Redundant) {
            self.install().await?;
        }

        let status = self.status().await?;
        if status.state == WorkerState::Waiting {
            let report = self.activate().await?;
            if !report.deleted.is_empty() {
                info!(deleted = ?report.deleted, "Removed stale cache generations");
            }
        }

        let status = self.status().await?;
        if status.state != WorkerState::Active {
            warn!(state = %status.state, "Cache worker did not reach active state");
        }
        Ok(status)
    }
}
