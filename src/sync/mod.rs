//! The pull-then-reconcile unit and the background worker that runs it.
//!
//! # Serialization
//!
//! [`SyncOperation::run`] holds one lock across both steps, so a second
//! trigger can never start pulling while an earlier reconciliation is still
//! reading the tree. The lock guard moves into the blocking task, which means
//! it is released only when the git and filesystem work has finished, even if
//! the awaiting future is dropped.
//!
//! # Scheduling
//!
//! Webhook deliveries do not run syncs themselves. They call
//! [`SyncHandle::request`], which fills a single-slot channel read by the
//! [`SyncWorker`]:
//!
//! ```text
//!  request() ──► [ slot ] ──► worker: snapshot generation ─► pull ─► reconcile ─► publish report
//!     │             ▲
//!     └─ slot full ─┘  (a pending run will cover this request)
//! ```
//!
//! Each request gets a ticket. Before a run starts, the worker snapshots the
//! number of requests seen so far as the run's generation, so a published
//! report with `generation >= ticket` began after that request was made and
//! observed a tree at least as new. Failures are logged and recorded in the
//! report; nothing is retried.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::content::{ReconcileError, ReconcileSummary, reconcile};
use crate::git::{GitError, RepoSyncer};
use crate::registry::PageRegistry;

/// Errors from a sync run.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Clone or pull failed.
    #[error("repository update failed: {0}")]
    Transport(#[from] GitError),

    /// The content tree could not be walked.
    #[error("reconciliation failed: {0}")]
    Reconcile(#[from] ReconcileError),

    /// The blocking task panicked.
    #[error("sync task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Pull-then-reconcile against one working copy, serialized by a lock.
#[derive(Clone)]
pub struct SyncOperation {
    inner: Arc<SyncInner>,
}

struct SyncInner {
    syncer: RepoSyncer,
    registry: Arc<PageRegistry>,
    lock: Arc<Mutex<()>>,
}

impl SyncOperation {
    pub fn new(syncer: RepoSyncer, registry: Arc<PageRegistry>) -> Self {
        SyncOperation {
            inner: Arc::new(SyncInner {
                syncer,
                registry,
                lock: Arc::new(Mutex::new(())),
            }),
        }
    }

    /// Returns the content root (the working copy).
    pub fn content_root(&self) -> &Path {
        self.inner.syncer.working_copy()
    }

    /// Brings the working copy up to date, then reconciles it into the registry.
    ///
    /// Clones when the working copy is absent, pulls otherwise. Reconciliation
    /// is skipped when the update fails.
    pub async fn run(&self) -> Result<ReconcileSummary, SyncError> {
        let guard = Arc::clone(&self.inner.lock).lock_owned().await;
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || {
            let _guard = guard;
            inner.run_locked()
        })
        .await?
    }
}

impl SyncInner {
    fn run_locked(&self) -> Result<ReconcileSummary, SyncError> {
        let kind = self.syncer.update()?;
        debug!(?kind, "Working copy updated");
        Ok(reconcile(self.syncer.working_copy(), self.registry.as_ref())?)
    }
}

/// How a sync run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SyncOutcome {
    Succeeded { summary: ReconcileSummary },
    Failed { error: String },
}

/// Published by the worker after every run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Number of requests this run covers.
    pub generation: u64,
    pub outcome: SyncOutcome,
    pub completed_at: DateTime<Utc>,
}

impl SyncReport {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, SyncOutcome::Succeeded { .. })
    }
}

/// Client side of the sync worker. Cheap to clone.
#[derive(Clone)]
pub struct SyncHandle {
    trigger: mpsc::Sender<()>,
    requested: Arc<AtomicU64>,
    reports: watch::Receiver<Option<SyncReport>>,
}

impl SyncHandle {
    /// Asks for a sync and returns immediately with a ticket.
    ///
    /// If a run is already pending the request is folded into it. If the
    /// worker has stopped the request is dropped with a warning.
    pub fn request(&self) -> u64 {
        let ticket = self.requested.fetch_add(1, Ordering::SeqCst) + 1;
        match self.trigger.try_send(()) {
            Ok(()) => debug!(ticket, "Sync scheduled"),
            Err(TrySendError::Full(())) => debug!(ticket, "Sync already pending, request folded in"),
            Err(TrySendError::Closed(())) => warn!(ticket, "Sync worker stopped, request dropped"),
        }
        ticket
    }

    /// Returns the number of requests made so far.
    #[cfg(test)]
    pub(crate) fn requested(&self) -> u64 {
        self.requested.load(Ordering::SeqCst)
    }

    /// Returns the most recent report, if any run has finished.
    pub fn latest_report(&self) -> Option<SyncReport> {
        self.reports.borrow().clone()
    }

    /// Waits until a run covering `ticket` has finished.
    ///
    /// Returns `None` if the worker stops first.
    pub async fn wait_for(&self, ticket: u64) -> Option<SyncReport> {
        let mut reports = self.reports.clone();
        let report = reports
            .wait_for(|r| r.as_ref().is_some_and(|r| r.generation >= ticket))
            .await
            .ok()?;
        (*report).clone()
    }
}

/// Background task that runs one sync per trigger.
pub struct SyncWorker {
    operation: SyncOperation,
    trigger: mpsc::Receiver<()>,
    requested: Arc<AtomicU64>,
    reports: watch::Sender<Option<SyncReport>>,
}

impl SyncWorker {
    /// Creates a worker and the handle used to drive it.
    pub fn new(operation: SyncOperation) -> (SyncWorker, SyncHandle) {
        let (trigger_tx, trigger_rx) = mpsc::channel(1);
        let (reports_tx, reports_rx) = watch::channel(None);
        let requested = Arc::new(AtomicU64::new(0));

        let worker = SyncWorker {
            operation,
            trigger: trigger_rx,
            requested: Arc::clone(&requested),
            reports: reports_tx,
        };
        let handle = SyncHandle {
            trigger: trigger_tx,
            requested,
            reports: reports_rx,
        };
        (worker, handle)
    }

    /// Creates a worker and spawns it on the current runtime.
    pub fn spawn(operation: SyncOperation, shutdown: CancellationToken) -> (SyncHandle, JoinHandle<()>) {
        let (worker, handle) = SyncWorker::new(operation);
        let task = tokio::spawn(worker.run(shutdown));
        (handle, task)
    }

    /// Runs until `shutdown` is cancelled or every handle is dropped.
    #[instrument(skip_all, fields(root = %self.operation.content_root().display()))]
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!("Sync worker started");
        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    info!("Shutdown signal received, stopping sync worker");
                    break;
                }

                msg = self.trigger.recv() => {
                    if msg.is_none() {
                        info!("All sync handles dropped");
                        break;
                    }
                    self.run_once().await;
                }
            }
        }
        info!("Sync worker stopped");
    }

    async fn run_once(&self) {
        let generation = self.requested.load(Ordering::SeqCst);
        debug!(generation, "Starting sync");

        let outcome = match self.operation.run().await {
            Ok(summary) => {
                info!(
                    generation,
                    discovered = summary.discovered,
                    created = summary.created,
                    failed = summary.failed,
                    "Sync complete"
                );
                SyncOutcome::Succeeded { summary }
            }
            Err(e) => {
                error!(generation, error = %e, "Sync failed, reconciliation dropped");
                SyncOutcome::Failed {
                    error: e.to_string(),
                }
            }
        };

        self.reports.send_replace(Some(SyncReport {
            generation,
            outcome,
            completed_at: Utc::now(),
        }));
    }
}
