//! Event intake: the four entry points the host calls on its own thread.
//!
//! Each call does a (possibly throttled) enqueue and nothing else; no error
//! ever propagates back into the host.

use std::sync::{Arc, Weak};

use tracing::error;

use crate::error::RelayError;
use crate::host::{ChainHost, Subscription};
use crate::metrics::RelayMetrics;
use crate::queue::EventQueues;
use crate::types::{
    BlockState, EventKind, PendingBlock, TransactionMetadata, TransactionTrace,
    TransactionTraceRecord,
};

/// Producer-side handle. Cheap to clone into host callbacks.
#[derive(Clone)]
pub struct EventIntake {
    queues: Arc<EventQueues>,
    host: Weak<dyn ChainHost>,
    metrics: Arc<RelayMetrics>,
}

impl EventIntake {
    /// The host is held weakly: the callbacks live inside the host, so a
    /// strong reference would form a cycle.
    pub fn new(queues: Arc<EventQueues>, host: &Arc<dyn ChainHost>, metrics: Arc<RelayMetrics>) -> Self {
        Self {
            queues,
            host: Arc::downgrade(host),
            metrics,
        }
    }

    pub fn on_accepted_transaction(&self, trx: &Arc<TransactionMetadata>) {
        self.queues.push_accepted_transaction(Arc::clone(trx));
    }

    /// Stamps the trace with the host's pending block before queueing it.
    pub fn on_applied_transaction(&self, trace: &Arc<TransactionTrace>) {
        match self.pending_block() {
            Ok(pending) => {
                let record = TransactionTraceRecord::new(pending, Arc::clone(trace));
                self.queues.push_applied_transaction(record);
            }
            Err(e) => {
                self.metrics.record_intake_dropped();
                error!(
                    kind = %EventKind::AppliedTransaction,
                    trx = %trace.id,
                    error = %e,
                    "dropping applied transaction at intake"
                );
            }
        }
    }

    pub fn on_accepted_block(&self, block: &Arc<BlockState>) {
        self.queues.push_accepted_block(Arc::clone(block));
    }

    pub fn on_irreversible_block(&self, block: &Arc<BlockState>) {
        self.queues.push_irreversible_block(Arc::clone(block));
    }

    fn pending_block(&self) -> Result<PendingBlock, RelayError> {
        let host = self.host.upgrade().ok_or(RelayError::HostUnavailable)?;
        host.pending_block().ok_or(RelayError::NoPendingBlock)
    }

    /// Connect all four entry points to `host`.
    ///
    /// Returned in the order accepted-block, irreversible-block,
    /// accepted-transaction, applied-transaction.
    pub fn subscribe(&self, host: &dyn ChainHost) -> Vec<Subscription> {
        let accepted_block = {
            let intake = self.clone();
            host.subscribe_accepted_block(Arc::new(move |b: &Arc<BlockState>| intake.on_accepted_block(b)))
        };
        let irreversible_block = {
            let intake = self.clone();
            host.subscribe_irreversible_block(Arc::new(move |b: &Arc<BlockState>| {
                intake.on_irreversible_block(b)
            }))
        };
        let accepted_transaction = {
            let intake = self.clone();
            host.subscribe_accepted_transaction(Arc::new(move |t: &Arc<TransactionMetadata>| {
                intake.on_accepted_transaction(t)
            }))
        };
        let applied_transaction = {
            let intake = self.clone();
            host.subscribe_applied_transaction(Arc::new(move |t: &Arc<TransactionTrace>| {
                intake.on_applied_transaction(t)
            }))
        };
        vec![accepted_block, irreversible_block, accepted_transaction, applied_transaction]
    }
}
