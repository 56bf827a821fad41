//! Revisit Scheduler
//!
//! Coarse timer service for per-item revisits. Tickets sit in a min-heap
//! ordered by due time; a dispatch loop polls the heap once per clock tick
//! and hands every ticket due within the next tick to a bounded job channel
//! drained by a fixed pool of workers.
//!
//! Tickets are never removed when an item is replaced or deleted. Instead a
//! worker checks, at dispatch time, that the item still carries the ticket's
//! due time and silently drops the ticket otherwise.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace};

use crate::cache::{Item, Store};
use crate::config::MIN_REVISIT_CLOCK;
use crate::error::ConfigError;

/// Callback invoked for every live ticket.
///
/// It receives the store, not the engine, so it can read or delete items but
/// can't reach the scheduler or the janitor. It runs on a worker task and
/// should return promptly; a panic kills the worker that ran it.
pub type RevisitFn<V> = Arc<dyn Fn(&Store<V>, &str, &Item<V>) + Send + Sync>;

// == Expire ==
/// Pre-built revisit policy: deletes the item when its revisit fires.
pub fn expire<V>(store: &Store<V>, key: &str, _item: &Item<V>) {
    store.del(key);
}

// == Ticket ==
/// A pending revisit: the key and the due time it was scheduled with.
///
/// Ordered by due time, then key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Ticket {
    pub due: DateTime<Utc>,
    pub key: String,
}

impl Ticket {
    pub fn new(key: impl Into<String>, due: DateTime<Utc>) -> Self {
        Self {
            due,
            key: key.into(),
        }
    }
}

// == Revisit Queue ==
/// Binary min-heap of tickets keyed by due time.
#[derive(Debug, Default)]
pub struct RevisitQueue {
    heap: BinaryHeap<Reverse<Ticket>>,
}

impl RevisitQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, ticket: Ticket) {
        self.heap.push(Reverse(ticket));
    }

    /// Removes and returns the earliest ticket.
    pub fn pop(&mut self) -> Option<Ticket> {
        self.heap.pop().map(|Reverse(ticket)| ticket)
    }

    pub fn peek(&self) -> Option<&Ticket> {
        self.heap.peek().map(|Reverse(ticket)| ticket)
    }

    /// Pops the earliest ticket if it is due before `horizon`.
    pub fn pop_due(&mut self, horizon: DateTime<Utc>) -> Option<Ticket> {
        match self.peek() {
            Some(ticket) if ticket.due < horizon => self.pop(),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

// == Scheduler ==
/// Handle used by the engine to enqueue tickets.
#[derive(Debug, Clone)]
pub struct Scheduler {
    queue: Arc<Mutex<RevisitQueue>>,
}

impl Scheduler {
    /// Spawns the dispatch loop and `workers` worker tasks on `runtime`.
    ///
    /// `clock` is floored at one second. All spawned tasks stop once
    /// `shutdown` flips to `true` (or its sender is dropped); the returned
    /// handles let the caller wait for that.
    pub fn spawn<V>(
        runtime: &Handle,
        store: Arc<Store<V>>,
        clock: Duration,
        workers: usize,
        revisit: RevisitFn<V>,
        shutdown: watch::Receiver<bool>,
    ) -> Result<(Self, Vec<JoinHandle<()>>), ConfigError>
    where
        V: Send + Sync + 'static,
    {
        let clock = clock.max(MIN_REVISIT_CLOCK);
        let horizon = TimeDelta::from_std(clock)
            .map_err(|e| ConfigError::DurationOutOfRange(e.to_string()))?;

        let queue = Arc::new(Mutex::new(RevisitQueue::new()));
        let (jobs_tx, jobs_rx) = mpsc::channel(workers.max(1));
        let jobs_rx = Arc::new(tokio::sync::Mutex::new(jobs_rx));

        let mut handles = Vec::with_capacity(workers + 1);
        for id in 0..workers {
            handles.push(runtime.spawn(worker_loop(
                id,
                Arc::clone(&jobs_rx),
                Arc::clone(&store),
                Arc::clone(&revisit),
            )));
        }
        handles.push(runtime.spawn(dispatch_loop(
            Arc::clone(&queue),
            jobs_tx,
            clock,
            horizon,
            shutdown,
        )));

        info!(
            workers,
            clock_ms = clock.as_millis() as u64,
            "revisit scheduler started"
        );

        Ok((Self { queue }, handles))
    }

    // == Schedule ==
    /// Enqueues a ticket for dispatch.
    pub fn schedule(&self, ticket: Ticket) {
        trace!(key = %ticket.key, due = %ticket.due, "revisit ticket scheduled");
        self.queue.lock().push(ticket);
    }

    /// Number of tickets waiting in the heap, stale ones included.
    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }
}

// == Dispatch Loop ==
async fn dispatch_loop(
    queue: Arc<Mutex<RevisitQueue>>,
    jobs: mpsc::Sender<Ticket>,
    clock: Duration,
    horizon: TimeDelta,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        if *shutdown.borrow() {
            break;
        }

        let next = {
            let deadline = Utc::now() + horizon;
            queue.lock().pop_due(deadline)
        };

        match next {
            Some(ticket) => {
                trace!(key = %ticket.key, due = %ticket.due, "dispatching revisit ticket");
                // Blocks while all workers are busy
                tokio::select! {
                    sent = jobs.send(ticket) => {
                        if sent.is_err() {
                            break;
                        }
                    }
                    _ = shutdown.changed() => break,
                }
            }
            None => {
                tokio::select! {
                    _ = tokio::time::sleep(clock) => {}
                    _ = shutdown.changed() => break,
                }
            }
        }
    }

    info!("revisit dispatch loop stopped");
}

// == Worker Loop ==
async fn worker_loop<V>(
    id: usize,
    jobs: Arc<tokio::sync::Mutex<mpsc::Receiver<Ticket>>>,
    store: Arc<Store<V>>,
    revisit: RevisitFn<V>,
) {
    loop {
        let ticket = jobs.lock().await.recv().await;
        let Some(ticket) = ticket else {
            break;
        };
        revisit_ticket(&store, &revisit, &ticket);
    }

    debug!(worker = id, "revisit worker stopped");
}

// == Revisit Ticket ==
/// Runs the staleness check for `ticket` and invokes `revisit` if it is live.
///
/// Returns whether the callback ran.
pub(crate) fn revisit_ticket<V>(store: &Store<V>, revisit: &RevisitFn<V>, ticket: &Ticket) -> bool {
    match store.item(&ticket.key) {
        Some(item) if item.revisit_time() == Some(ticket.due) => {
            revisit(store, &ticket.key, &item);
            store.counters().record_revisit();
            true
        }
        _ => {
            trace!(key = %ticket.key, due = %ticket.due, "stale revisit ticket dropped");
            store.counters().record_stale_ticket();
            false
        }
    }
}
