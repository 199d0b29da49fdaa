//! Pipeline counters.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::types::EventKind;

/// Live counters shared by the producers and the consumer thread.
#[derive(Debug, Default)]
pub struct RelayMetrics {
    enqueued: [AtomicU64; 4],
    throttled: AtomicU64,
    intake_dropped: AtomicU64,
    batches: AtomicU64,
    processed: AtomicU64,
    forwarded: AtomicU64,
    gated: AtomicU64,
    disabled: AtomicU64,
    sink_failures: AtomicU64,
    processing_errors: AtomicU64,
    start_block_reached: AtomicBool,
}

/// Point-in-time copy of [`RelayMetrics`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub enqueued_accepted_transactions: u64,
    pub enqueued_applied_transactions: u64,
    pub enqueued_accepted_blocks: u64,
    pub enqueued_irreversible_blocks: u64,
    /// Enqueue calls that hit the soft capacity and slept.
    pub throttled: u64,
    /// Events lost before reaching a queue (e.g. no pending block).
    pub intake_dropped: u64,
    pub batches: u64,
    pub processed: u64,
    pub forwarded: u64,
    pub gated: u64,
    pub disabled: u64,
    pub sink_failures: u64,
    pub processing_errors: u64,
    pub start_block_reached: bool,
}

impl MetricsSnapshot {
    pub fn enqueued_total(&self) -> u64 {
        self.enqueued_accepted_transactions
            + self.enqueued_applied_transactions
            + self.enqueued_accepted_blocks
            + self.enqueued_irreversible_blocks
    }
}

impl RelayMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_enqueued(&self, kind: EventKind) {
        self.enqueued[kind.index()].fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_throttled(&self) {
        self.throttled.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_intake_dropped(&self) {
        self.intake_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_batch(&self) {
        self.batches.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_processed(&self) {
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_forwarded(&self) {
        self.forwarded.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_gated(&self) {
        self.gated.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_disabled(&self) {
        self.disabled.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_sink_failure(&self) {
        self.sink_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_processing_error(&self) {
        self.processing_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn set_start_block_reached(&self) {
        self.start_block_reached.store(true, Ordering::Release);
    }

    /// Returns a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        MetricsSnapshot {
            enqueued_accepted_transactions: load(&self.enqueued[0]),
            enqueued_applied_transactions: load(&self.enqueued[1]),
            enqueued_accepted_blocks: load(&self.enqueued[2]),
            enqueued_irreversible_blocks: load(&self.enqueued[3]),
            throttled: load(&self.throttled),
            intake_dropped: load(&self.intake_dropped),
            batches: load(&self.batches),
            processed: load(&self.processed),
            forwarded: load(&self.forwarded),
            gated: load(&self.gated),
            disabled: load(&self.disabled),
            sink_failures: load(&self.sink_failures),
            processing_errors: load(&self.processing_errors),
            start_block_reached: self.start_block_reached.load(Ordering::Acquire),
        }
    }
}
