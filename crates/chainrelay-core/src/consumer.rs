//! The consumer loop. One dedicated thread draining [`EventQueues`].
//!
//! # States
//! - WAIT: park on the condvar while every lane is empty and shutdown is not requested
//! - DRAIN: swap all four lanes out, release the lock
//! - PROCESS: accepted trxs → applied traces → accepted blocks → irreversible blocks
//! - CHECK: an empty drain after shutdown terminates, anything else loops
//!
//! Items enqueued before shutdown was requested are always processed before
//! the thread exits.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;
use tracing::{info, warn};

use crate::dispatch::Dispatcher;
use crate::error::RelayError;
use crate::queue::EventQueues;

pub const CONSUMER_THREAD_NAME: &str = "chainrelay-consumer";

/// Run the loop on the current thread until shutdown has drained the queues.
///
/// Returns the dispatcher so the caller can shut its sink down.
pub fn run(queues: &EventQueues, mut dispatcher: Dispatcher) -> Dispatcher {
    // 75% of capacity without overflowing for huge capacities
    let warn_threshold = queues.capacity() - queues.capacity() / 4;

    while let Some(batch) = queues.wait_for_batch() {
        let [accepted_trx, applied_trx, accepted_blocks, irreversible_blocks] = batch.sizes();
        if batch.sizes().iter().any(|&n| n > warn_threshold) {
            warn!(
                accepted_trx,
                applied_trx,
                accepted_blocks,
                irreversible_blocks,
                capacity = queues.capacity(),
                "queue backlog above 75% of capacity"
            );
        } else if queues.is_shutdown() {
            info!(remaining = batch.len(), "draining queue");
        }

        dispatcher.process_batch(batch);
    }

    info!("consumer thread shut down gracefully");
    dispatcher
}

/// A consumer thread that could not be started. Carries the dispatcher back
/// so its sink can still be shut down.
pub struct SpawnFailure {
    pub error: RelayError,
    pub dispatcher: Option<Dispatcher>,
}

impl std::fmt::Debug for SpawnFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpawnFailure")
            .field("error", &self.error)
            .field("dispatcher_recovered", &self.dispatcher.is_some())
            .finish()
    }
}

/// Spawn [`run`] on a thread from `builder`, named [`CONSUMER_THREAD_NAME`].
///
/// The thread yields `None` only if it found no dispatcher to run, which
/// cannot happen once the spawn succeeded.
pub fn spawn(
    builder: thread::Builder,
    queues: Arc<EventQueues>,
    dispatcher: Dispatcher,
) -> Result<JoinHandle<Option<Dispatcher>>, SpawnFailure> {
    // Handed over through a slot so a failed spawn does not swallow it.
    let slot = Arc::new(Mutex::new(Some(dispatcher)));
    let handoff = Arc::clone(&slot);

    builder
        .name(CONSUMER_THREAD_NAME.to_string())
        .spawn(move || {
            let dispatcher = handoff.lock().take();
            dispatcher.map(|d| run(&queues, d))
        })
        .map_err(|e| SpawnFailure {
            error: RelayError::WorkerSpawn(e.to_string()),
            dispatcher: slot.lock().take(),
        })
}
