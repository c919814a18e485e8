use std::sync::Arc;

use thiserror::Error;
use tokio::{
    sync::{Mutex, broadcast, mpsc, oneshot},
    time::Duration,
};
use tracing::{info, warn};

use crate::{
    access::{Caller, RateLimiter, authorize},
    cache::CacheInvalidator,
    config::ReconcilerConfig,
    core::{reconciler::RollReconciler, report::ReconcileReport},
    error::ReconcileError,
    op::ChangeRequest,
    persist::ObjectStore,
    roll::Roll,
    types::ObjectKey,
};

use super::events::ReconcileEvent;

/// Failure of a request sent through a [`ReconcilerHandle`].
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The request itself was refused or failed.
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),
    /// The command loop has stopped.
    #[error("reconciler runtime is no longer running")]
    ChannelClosed,
    /// The blocking storage task panicked or was cancelled.
    #[error("blocking task failed: {0}")]
    Join(String),
}

type SharedStore = Arc<Mutex<Box<dyn ObjectStore>>>;
type SharedCache = Arc<Mutex<Box<dyn CacheInvalidator>>>;

/// Cloneable sender side of the command loop.
pub struct ReconcilerHandle {
    cmd_tx: mpsc::Sender<Command>,
    events_tx: broadcast::Sender<ReconcileEvent>,
}

impl Clone for ReconcilerHandle {
    fn clone(&self) -> Self {
        Self {
            cmd_tx: self.cmd_tx.clone(),
            events_tx: self.events_tx.clone(),
        }
    }
}

enum Command {
    Reconcile {
        caller: Option<Caller>,
        request: ChangeRequest,
        resp: oneshot::Sender<Result<ReconcileReport, RuntimeError>>,
    },
    RollsForOc {
        oc: String,
        resp: oneshot::Sender<Result<Option<(ObjectKey, Vec<Roll>)>, RuntimeError>>,
    },
    Shutdown {
        resp: oneshot::Sender<()>,
    },
}

struct LoopState {
    reconciler: Arc<RollReconciler>,
    store: SharedStore,
    cache: SharedCache,
    limiter: RateLimiter,
}

/// Starts the command loop. Requests are executed one at a time, so two
/// requests routed through the same handle never interleave their
/// read-modify-write of a document.
pub fn spawn_reconciler(
    store: Box<dyn ObjectStore>,
    cache: Box<dyn CacheInvalidator>,
    config: ReconcilerConfig,
) -> ReconcilerHandle {
    let (cmd_tx, mut cmd_rx) = mpsc::channel::<Command>(config.command_queue_bound.max(1));
    let (events_tx, _) = broadcast::channel::<ReconcileEvent>(config.event_queue_bound.max(1));

    let mut state = LoopState {
        limiter: RateLimiter::new(
            config.rate_limit_max_requests,
            Duration::from_millis(config.rate_limit_window_ms),
        ),
        reconciler: Arc::new(RollReconciler::new(config)),
        store: Arc::new(Mutex::new(store)),
        cache: Arc::new(Mutex::new(cache)),
    };

    let events_tx_loop = events_tx.clone();

    tokio::spawn(async move {
        while let Some(cmd) = cmd_rx.recv().await {
            let done = handle_command(cmd, &mut state, &events_tx_loop).await;
            if done {
                break;
            }
        }
    });

    ReconcilerHandle { cmd_tx, events_tx }
}

impl ReconcilerHandle {
    /// Receives events published after each request.
    pub fn subscribe(&self) -> broadcast::Receiver<ReconcileEvent> {
        self.events_tx.subscribe()
    }

    /// Gates, validates, and applies one request on behalf of `caller`.
    pub async fn reconcile(
        &self,
        caller: Option<Caller>,
        request: ChangeRequest,
    ) -> Result<ReconcileReport, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Reconcile {
                caller,
                request,
                resp: tx,
            })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)?
    }

    /// Current rolls of the document holding `oc`.
    pub async fn rolls_for_oc(
        &self,
        oc: impl Into<String>,
    ) -> Result<Option<(ObjectKey, Vec<Roll>)>, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::RollsForOc {
                oc: oc.into(),
                resp: tx,
            })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)?
    }

    /// Stops the command loop once queued commands have run.
    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Shutdown { resp: tx })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)
    }
}

async fn handle_command(
    cmd: Command,
    state: &mut LoopState,
    events_tx: &broadcast::Sender<ReconcileEvent>,
) -> bool {
    match cmd {
        Command::Reconcile {
            caller,
            request,
            resp,
        } => {
            let res = run_reconcile(state, caller, request).await;
            if let Ok(report) = &res {
                publish_report(report, state.reconciler.config(), events_tx);
            }
            let _ = resp.send(res);
        }
        Command::RollsForOc { oc, resp } => {
            let reconciler = Arc::clone(&state.reconciler);
            let store = Arc::clone(&state.store);
            let res = tokio::task::spawn_blocking(move || {
                let mut store = store.blocking_lock();
                reconciler.rolls_for_oc(&mut **store, &oc)
            })
            .await
            .map_err(|e| RuntimeError::Join(e.to_string()))
            .and_then(|r| r.map_err(RuntimeError::from));
            let _ = resp.send(res);
        }
        Command::Shutdown { resp } => {
            info!("reconciler runtime shutting down");
            let _ = resp.send(());
            return true;
        }
    }

    false
}

async fn run_reconcile(
    state: &mut LoopState,
    caller: Option<Caller>,
    request: ChangeRequest,
) -> Result<ReconcileReport, RuntimeError> {
    let bucket = caller.as_ref().map_or("anonymous", |c| c.user.as_str());
    if let Err(err) = state.limiter.check(bucket) {
        warn!(user = bucket, "request rate limited");
        return Err(ReconcileError::from(err).into());
    }

    let actor = authorize(caller.as_ref())
        .map_err(ReconcileError::from)?
        .user
        .clone();

    let reconciler = Arc::clone(&state.reconciler);
    let store = Arc::clone(&state.store);
    let cache = Arc::clone(&state.cache);

    tokio::task::spawn_blocking(move || {
        let mut store = store.blocking_lock();
        let mut cache = cache.blocking_lock();
        reconciler.reconcile(&mut **store, &mut **cache, request, &actor)
    })
    .await
    .map_err(|e| RuntimeError::Join(e.to_string()))?
    .map_err(RuntimeError::from)
}

fn publish_report(
    report: &ReconcileReport,
    config: &ReconcilerConfig,
    events_tx: &broadcast::Sender<ReconcileEvent>,
) {
    let mut any_written = false;
    for file in report.per_file_results.iter().filter(|f| f.written()) {
        any_written = true;
        if let Some(key) = &file.backup_reference {
            let _ = events_tx.send(ReconcileEvent::BackupWritten { key: key.clone() });
        }
        let _ = events_tx.send(ReconcileEvent::DocumentWritten {
            key: file.key.clone(),
            oc: file.oc.clone(),
            changes_applied: file.changes_applied,
        });
    }
    if any_written {
        let _ = events_tx.send(ReconcileEvent::CachesInvalidated {
            patterns: config.invalidate_patterns.clone(),
        });
    }
    let _ = events_tx.send(ReconcileEvent::BatchCompleted {
        changes_requested: report.changes_requested,
        changes_applied: report.changes_applied,
    });
}
