//! # Dispatch Module
//!
//! Bounded worker pool between the webhook and the conversation engine.
//!
//! The webhook hands every decoded update to [`DispatchHandle::submit`], which
//! never waits: the update either lands in a bounded queue or is rejected
//! right away. A supervisor task drains the queue and runs at most
//! `workers` handlers at once, so a burst of slow completions cannot grow the
//! number of in-flight tasks without bound.
//!
//! Updates for different chats run in parallel. Updates for the same chat run
//! one at a time in arrival order: while a chat has a handler in flight, its
//! later updates wait in a per-chat backlog. The backlogs share the
//! `queue_capacity` allowance, and once it is used up the supervisor stops
//! pulling from the queue so that [`DispatchHandle::submit`] starts rejecting.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use teloxide::types::{ChatId, Update};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot, Semaphore};
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use crate::config::DispatchConfig;
use crate::errors::DispatchError;

/// Something that can process one update
#[async_trait]
pub trait UpdateHandler: Send + Sync + 'static {
    async fn handle(&self, update: Update) -> Result<()>;
}

/// Counters shared by the handle and the supervisor
#[derive(Debug, Default)]
pub struct DispatchStats {
    accepted: AtomicU64,
    rejected: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    panicked: AtomicU64,
}

/// Point-in-time copy of [`DispatchStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSnapshot {
    pub accepted: u64,
    pub rejected: u64,
    pub completed: u64,
    pub failed: u64,
    pub panicked: u64,
}

impl DispatchStats {
    pub fn snapshot(&self) -> DispatchSnapshot {
        DispatchSnapshot {
            accepted: self.accepted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            panicked: self.panicked.load(Ordering::Relaxed),
        }
    }

    fn record_outcome(&self, outcome: std::result::Result<Result<()>, JoinError>) {
        match outcome {
            Ok(Ok(())) => {
                self.completed.fetch_add(1, Ordering::Relaxed);
            }
            Ok(Err(e)) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                error!(error = %e, "Update handler failed");
            }
            Err(e) if e.is_panic() => {
                self.panicked.fetch_add(1, Ordering::Relaxed);
                error!(error = %e, "Update handler panicked");
            }
            Err(e) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, "Update handler was cancelled");
            }
        }
    }
}

/// Cheap, cloneable entry point used by the webhook
#[derive(Debug, Clone)]
pub struct DispatchHandle {
    sender: mpsc::Sender<Update>,
    stats: Arc<DispatchStats>,
}

impl DispatchHandle {
    /// Queue an update without waiting.
    ///
    /// # Errors
    ///
    /// - [`DispatchError::QueueFull`] when the queue is at capacity
    /// - [`DispatchError::Closed`] once the pool is shutting down
    pub fn submit(&self, update: Update) -> Result<(), DispatchError> {
        let update_id = update.id.0;
        match self.sender.try_send(update) {
            Ok(()) => {
                self.stats.accepted.fetch_add(1, Ordering::Relaxed);
                debug!(update_id, "Update queued");
                Ok(())
            }
            Err(TrySendError::Full(_)) => {
                self.stats.rejected.fetch_add(1, Ordering::Relaxed);
                warn!(update_id, "Update queue is full, rejecting update");
                Err(DispatchError::QueueFull)
            }
            Err(TrySendError::Closed(_)) => {
                self.stats.rejected.fetch_add(1, Ordering::Relaxed);
                warn!(update_id, "Update queue is closed, rejecting update");
                Err(DispatchError::Closed)
            }
        }
    }

    pub fn stats(&self) -> DispatchSnapshot {
        self.stats.snapshot()
    }
}

/// Owner of the supervisor task
pub struct UpdateWorkerPool {
    handle: DispatchHandle,
    shutdown: oneshot::Sender<()>,
    supervisor: JoinHandle<()>,
}

impl UpdateWorkerPool {
    /// Spawn the supervisor on the current runtime
    pub fn start(handler: Arc<dyn UpdateHandler>, config: &DispatchConfig) -> Self {
        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        let (shutdown, shutdown_rx) = oneshot::channel();
        let stats = Arc::new(DispatchStats::default());
        let workers = config.workers.max(1);

        info!(workers, queue_capacity = config.queue_capacity, "Starting update worker pool");
        let supervisor = tokio::spawn(supervise(
            receiver,
            shutdown_rx,
            handler,
            workers,
            config.queue_capacity.max(1),
            Arc::clone(&stats),
        ));

        Self {
            handle: DispatchHandle { sender, stats },
            shutdown,
            supervisor,
        }
    }

    pub fn handle(&self) -> DispatchHandle {
        self.handle.clone()
    }

    /// Stop accepting updates, finish everything already queued, and
    /// return the final counters
    pub async fn shutdown(self) -> DispatchSnapshot {
        let UpdateWorkerPool {
            handle,
            shutdown,
            supervisor,
        } = self;

        // The supervisor may already be gone if every sender was dropped
        let _ = shutdown.send(());
        if let Err(e) = supervisor.await {
            error!(error = %e, "Update supervisor terminated abnormally");
        }

        let snapshot = handle.stats();
        info!(
            accepted = snapshot.accepted,
            rejected = snapshot.rejected,
            completed = snapshot.completed,
            failed = snapshot.failed,
            panicked = snapshot.panicked,
            "Update worker pool stopped"
        );
        snapshot
    }
}

/// Per-chat backlogs of updates waiting behind an in-flight handler
#[derive(Debug, Default)]
struct ChatQueues {
    busy: HashMap<ChatId, VecDeque<Update>>,
    waiting: usize,
}

impl ChatQueues {
    /// Returns the update if it may run now, otherwise parks it behind its chat
    fn admit(&mut self, update: Update) -> Option<Update> {
        let Some(chat_id) = update.chat().map(|chat| chat.id) else {
            return Some(update);
        };
        match self.busy.entry(chat_id) {
            Entry::Occupied(mut backlog) => {
                debug!(update_id = update.id.0, user_id = %chat_id, "Update waits for its chat");
                backlog.get_mut().push_back(update);
                self.waiting += 1;
                None
            }
            Entry::Vacant(slot) => {
                slot.insert(VecDeque::new());
                Some(update)
            }
        }
    }

    /// Release the chat of a finished handler and return its next update
    fn finish(&mut self, chat_id: Option<ChatId>) -> Option<Update> {
        let Entry::Occupied(mut backlog) = self.busy.entry(chat_id?) else {
            return None;
        };
        match backlog.get_mut().pop_front() {
            Some(next) => {
                self.waiting -= 1;
                Some(next)
            }
            None => {
                backlog.remove();
                None
            }
        }
    }
}

type HandlerOutcome = (Option<ChatId>, std::result::Result<Result<()>, JoinError>);

async fn spawn_handler(
    tasks: &mut JoinSet<HandlerOutcome>,
    permits: &Arc<Semaphore>,
    handler: &Arc<dyn UpdateHandler>,
    update: Update,
) -> bool {
    let Ok(permit) = Arc::clone(permits).acquire_owned().await else {
        return false;
    };
    let handler = Arc::clone(handler);
    let chat_id = update.chat().map(|chat| chat.id);
    tasks.spawn(async move {
        let _permit = permit;
        // Inner task so a panic still reports which chat to release
        let outcome = tokio::spawn(async move { handler.handle(update).await }).await;
        (chat_id, outcome)
    });
    true
}

async fn supervise(
    mut receiver: mpsc::Receiver<Update>,
    mut shutdown: oneshot::Receiver<()>,
    handler: Arc<dyn UpdateHandler>,
    workers: usize,
    backlog_capacity: usize,
    stats: Arc<DispatchStats>,
) {
    let permits = Arc::new(Semaphore::new(workers));
    let mut tasks = JoinSet::new();
    let mut chats = ChatQueues::default();
    let mut closing = false;
    let mut receiving = true;

    loop {
        tokio::select! {
            _ = &mut shutdown, if !closing => {
                debug!("Closing update queue");
                closing = true;
                // Buffered updates are still delivered by recv()
                receiver.close();
            }
            Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                let (chat_id, outcome) = match joined {
                    Ok(finished) => finished,
                    Err(e) => {
                        error!(error = %e, "Update task was lost");
                        continue;
                    }
                };
                stats.record_outcome(outcome);
                if let Some(next) = chats.finish(chat_id) {
                    if !spawn_handler(&mut tasks, &permits, &handler, next).await {
                        break;
                    }
                }
            }
            update = receiver.recv(), if receiving && chats.waiting < backlog_capacity => {
                let Some(update) = update else {
                    receiving = false;
                    continue;
                };
                if let Some(ready) = chats.admit(update) {
                    if !spawn_handler(&mut tasks, &permits, &handler, ready).await {
                        break;
                    }
                }
            }
            else => break,
        }
    }

    while let Some(joined) = tasks.join_next().await {
        if let Ok((_, outcome)) = joined {
            stats.record_outcome(outcome);
        }
    }
}
