//! Bounded multi-queue — four FIFO lanes behind one lock and one condvar.
//!
//! Producers (the host's callback thread) append with [`EventQueues::push_*`].
//! When a lane is over its soft capacity the producer is throttled with an
//! adaptive sleep, then appends anyway: capacity is advisory and nothing is
//! ever dropped here.
//!
//! The single consumer swaps every lane out at once with
//! [`EventQueues::drain_all`] / [`EventQueues::wait_for_batch`], so the lock
//! is only ever held for an append or a pointer swap.

use std::collections::VecDeque;
use std::mem;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::{Condvar, Mutex, MutexGuard};
use tracing::debug;

use crate::config::BackpressureConfig;
use crate::metrics::RelayMetrics;
use crate::types::{BlockState, EventKind, TransactionMetadata, TransactionTraceRecord};

// ─── Backoff ──────────────────────────────────────────────────────────────────

/// Adaptive producer sleep for one lane.
///
/// Grows by `step` while the lane keeps growing between throttle checks and
/// shrinks by `step` otherwise. Never drops below `step`. Stops growing at
/// `max` (`max-ms`), so a lane that grows without pause sleeps at most `max`
/// per push.
#[derive(Debug, Clone)]
pub(crate) struct Backoff {
    step: Duration,
    max: Duration,
    sleep: Duration,
    last_len: usize,
}

impl Backoff {
    pub(crate) fn new(config: BackpressureConfig) -> Self {
        Self {
            step: config.step(),
            max: config.max(),
            sleep: config.step(),
            last_len: 0,
        }
    }

    /// Sleep duration for a throttled enqueue that observed `len` items.
    pub(crate) fn next(&mut self, len: usize) -> Duration {
        if len > self.last_len {
            self.sleep = (self.sleep + self.step).min(self.max);
        } else if self.sleep <= self.step {
            self.sleep = self.step;
        } else {
            self.sleep -= self.step;
        }
        self.last_len = len;
        self.sleep
    }
}

// ─── Lanes ────────────────────────────────────────────────────────────────────

struct Lane<T> {
    items: VecDeque<T>,
    backoff: Backoff,
}

impl<T> Lane<T> {
    fn new(config: BackpressureConfig) -> Self {
        Self {
            items: VecDeque::new(),
            backoff: Backoff::new(config),
        }
    }
}

struct Lanes {
    accepted_transactions: Lane<Arc<TransactionMetadata>>,
    applied_transactions: Lane<TransactionTraceRecord>,
    accepted_blocks: Lane<Arc<BlockState>>,
    irreversible_blocks: Lane<Arc<BlockState>>,
    done: bool,
}

impl Lanes {
    fn is_empty(&self) -> bool {
        self.accepted_transactions.items.is_empty()
            && self.applied_transactions.items.is_empty()
            && self.accepted_blocks.items.is_empty()
            && self.irreversible_blocks.items.is_empty()
    }

    fn len(&self, kind: EventKind) -> usize {
        match kind {
            EventKind::AcceptedTransaction => self.accepted_transactions.items.len(),
            EventKind::AppliedTransaction => self.applied_transactions.items.len(),
            EventKind::AcceptedBlock => self.accepted_blocks.items.len(),
            EventKind::IrreversibleBlock => self.irreversible_blocks.items.len(),
        }
    }

    fn take_batch(&mut self) -> Batch {
        Batch {
            accepted_transactions: mem::take(&mut self.accepted_transactions.items),
            applied_transactions: mem::take(&mut self.applied_transactions.items),
            accepted_blocks: mem::take(&mut self.accepted_blocks.items),
            irreversible_blocks: mem::take(&mut self.irreversible_blocks.items),
        }
    }
}

// ─── Batch ────────────────────────────────────────────────────────────────────

/// Everything that was queued at the moment of a drain, lane by lane.
#[derive(Debug, Default)]
pub struct Batch {
    pub accepted_transactions: VecDeque<Arc<TransactionMetadata>>,
    pub applied_transactions: VecDeque<TransactionTraceRecord>,
    pub accepted_blocks: VecDeque<Arc<BlockState>>,
    pub irreversible_blocks: VecDeque<Arc<BlockState>>,
}

impl Batch {
    /// Per-lane sizes, indexed by [`EventKind::index`].
    pub fn sizes(&self) -> [usize; 4] {
        [
            self.accepted_transactions.len(),
            self.applied_transactions.len(),
            self.accepted_blocks.len(),
            self.irreversible_blocks.len(),
        ]
    }

    pub fn len(&self) -> usize {
        self.sizes().iter().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ─── EventQueues ──────────────────────────────────────────────────────────────

/// The shared queue set. Cheap to share as `Arc<EventQueues>`.
pub struct EventQueues {
    state: Mutex<Lanes>,
    available: Condvar,
    capacity: usize,
    metrics: Arc<RelayMetrics>,
}

impl EventQueues {
    pub fn new(capacity: usize, backpressure: BackpressureConfig, metrics: Arc<RelayMetrics>) -> Self {
        Self {
            state: Mutex::new(Lanes {
                accepted_transactions: Lane::new(backpressure),
                applied_transactions: Lane::new(backpressure),
                accepted_blocks: Lane::new(backpressure),
                irreversible_blocks: Lane::new(backpressure),
                done: false,
            }),
            available: Condvar::new(),
            capacity,
            metrics,
        }
    }

    /// Soft capacity of each lane.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn push_accepted_transaction(&self, trx: Arc<TransactionMetadata>) {
        self.enqueue(EventKind::AcceptedTransaction, trx, |l| &mut l.accepted_transactions);
    }

    pub fn push_applied_transaction(&self, record: TransactionTraceRecord) {
        self.enqueue(EventKind::AppliedTransaction, record, |l| &mut l.applied_transactions);
    }

    pub fn push_accepted_block(&self, block: Arc<BlockState>) {
        self.enqueue(EventKind::AcceptedBlock, block, |l| &mut l.accepted_blocks);
    }

    pub fn push_irreversible_block(&self, block: Arc<BlockState>) {
        self.enqueue(EventKind::IrreversibleBlock, block, |l| &mut l.irreversible_blocks);
    }

    fn enqueue<T>(&self, kind: EventKind, item: T, lane: fn(&mut Lanes) -> &mut Lane<T>) {
        let mut guard = self.state.lock();
        let len = lane(&mut *guard).items.len();
        if len > self.capacity {
            let sleep = lane(&mut *guard).backoff.next(len);
            self.metrics.record_throttled();
            debug!(kind = %kind, len, sleep_ms = sleep.as_millis() as u64, "queue over capacity, throttling producer");
            self.available.notify_one();
            MutexGuard::unlocked(&mut guard, || thread::sleep(sleep));
        }
        lane(&mut *guard).items.push_back(item);
        drop(guard);
        self.metrics.record_enqueued(kind);
        self.available.notify_one();
    }

    /// Atomically move the contents of all four lanes into a [`Batch`].
    pub fn drain_all(&self) -> Batch {
        self.state.lock().take_batch()
    }

    /// Block until there is work or shutdown was requested, then drain.
    ///
    /// Returns `None` once shutdown has been requested and every lane is
    /// empty; any items still queued at that point are returned first.
    pub fn wait_for_batch(&self) -> Option<Batch> {
        let mut guard = self.state.lock();
        while guard.is_empty() && !guard.done {
            self.available.wait(&mut guard);
        }
        let batch = guard.take_batch();
        let done = guard.done;
        drop(guard);

        if batch.is_empty() && done {
            None
        } else {
            Some(batch)
        }
    }

    /// Flag shutdown and wake the consumer. Monotonic.
    pub fn request_shutdown(&self) {
        self.state.lock().done = true;
        self.available.notify_one();
    }

    pub fn is_shutdown(&self) -> bool {
        self.state.lock().done
    }

    pub fn len(&self, kind: EventKind) -> usize {
        self.state.lock().len(kind)
    }

    pub fn total_len(&self) -> usize {
        let guard = self.state.lock();
        EventKind::ALL.iter().map(|k| guard.len(*k)).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().is_empty()
    }
}
