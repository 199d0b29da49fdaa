//! The chain-engine seam: four typed signals plus pending-block state.
//!
//! The relay only depends on [`ChainHost`]; an engine adapter implements it
//! on top of whatever observer mechanism the engine has. [`MemoryHost`] is an
//! in-process implementation for tests and simulation.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::types::{BlockState, PendingBlock, TransactionMetadata, TransactionTrace};

/// A registered callback. Invoked synchronously on the engine's thread.
pub type Callback<T> = Arc<dyn Fn(&Arc<T>) + Send + Sync>;

/// Interface the relay needs from the chain engine.
pub trait ChainHost: Send + Sync {
    /// Chain identifier (logged at initialisation).
    fn chain_id(&self) -> String;

    /// The block currently being built, if any.
    fn pending_block(&self) -> Option<PendingBlock>;

    fn subscribe_accepted_transaction(&self, callback: Callback<TransactionMetadata>) -> Subscription;

    fn subscribe_applied_transaction(&self, callback: Callback<TransactionTrace>) -> Subscription;

    fn subscribe_accepted_block(&self, callback: Callback<BlockState>) -> Subscription;

    fn subscribe_irreversible_block(&self, callback: Callback<BlockState>) -> Subscription;
}

// ─── Subscription ─────────────────────────────────────────────────────────────

/// Scoped connection to a host signal. Disconnects when dropped.
#[must_use = "dropping a Subscription disconnects the callback"]
pub struct Subscription {
    disconnect: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(disconnect: impl FnOnce() + Send + 'static) -> Self {
        Self {
            disconnect: Some(Box::new(disconnect)),
        }
    }

    pub fn disconnect(mut self) {
        if let Some(f) = self.disconnect.take() {
            f();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(f) = self.disconnect.take() {
            f();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("connected", &self.disconnect.is_some())
            .finish()
    }
}

// ─── In-memory host ───────────────────────────────────────────────────────────

struct Signal<T> {
    next_id: u64,
    slots: Vec<(u64, Callback<T>)>,
}

impl<T> Default for Signal<T> {
    fn default() -> Self {
        Self {
            next_id: 0,
            slots: Vec::new(),
        }
    }
}

impl<T> Signal<T> {
    fn connect(&mut self, callback: Callback<T>) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.slots.push((id, callback));
        id
    }

    fn disconnect(&mut self, id: u64) {
        self.slots.retain(|(slot, _)| *slot != id);
    }
}

#[derive(Default)]
struct MemoryHostInner {
    chain_id: String,
    pending: Mutex<Option<PendingBlock>>,
    accepted_transaction: Mutex<Signal<TransactionMetadata>>,
    applied_transaction: Mutex<Signal<TransactionTrace>>,
    accepted_block: Mutex<Signal<BlockState>>,
    irreversible_block: Mutex<Signal<BlockState>>,
}

/// In-process [`ChainHost`]. Clones share the same signals.
#[derive(Clone, Default)]
pub struct MemoryHost {
    inner: Arc<MemoryHostInner>,
}

impl MemoryHost {
    pub fn new(chain_id: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(MemoryHostInner {
                chain_id: chain_id.into(),
                ..Default::default()
            }),
        }
    }

    pub fn set_pending_block(&self, pending: Option<PendingBlock>) {
        *self.inner.pending.lock() = pending;
    }

    pub fn emit_accepted_transaction(&self, trx: Arc<TransactionMetadata>) {
        emit(&self.inner.accepted_transaction, &trx);
    }

    pub fn emit_applied_transaction(&self, trace: Arc<TransactionTrace>) {
        emit(&self.inner.applied_transaction, &trace);
    }

    pub fn emit_accepted_block(&self, block: Arc<BlockState>) {
        emit(&self.inner.accepted_block, &block);
    }

    pub fn emit_irreversible_block(&self, block: Arc<BlockState>) {
        emit(&self.inner.irreversible_block, &block);
    }

    /// Total callbacks connected across all four signals.
    pub fn subscriber_count(&self) -> usize {
        self.inner.accepted_transaction.lock().slots.len()
            + self.inner.applied_transaction.lock().slots.len()
            + self.inner.accepted_block.lock().slots.len()
            + self.inner.irreversible_block.lock().slots.len()
    }

    fn connect<T: 'static>(
        &self,
        select: fn(&MemoryHostInner) -> &Mutex<Signal<T>>,
        callback: Callback<T>,
    ) -> Subscription {
        let id = select(&self.inner).lock().connect(callback);
        let weak: Weak<MemoryHostInner> = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                select(&inner).lock().disconnect(id);
            }
        })
    }
}

/// Snapshot the slots so callbacks run without the signal lock held.
fn emit<T>(signal: &Mutex<Signal<T>>, value: &Arc<T>) {
    let slots: Vec<Callback<T>> = signal.lock().slots.iter().map(|(_, cb)| Arc::clone(cb)).collect();
    for callback in slots {
        callback(value);
    }
}

impl ChainHost for MemoryHost {
    fn chain_id(&self) -> String {
        self.inner.chain_id.clone()
    }

    fn pending_block(&self) -> Option<PendingBlock> {
        *self.inner.pending.lock()
    }

    fn subscribe_accepted_transaction(&self, callback: Callback<TransactionMetadata>) -> Subscription {
        self.connect(|i| &i.accepted_transaction, callback)
    }

    fn subscribe_applied_transaction(&self, callback: Callback<TransactionTrace>) -> Subscription {
        self.connect(|i| &i.applied_transaction, callback)
    }

    fn subscribe_accepted_block(&self, callback: Callback<BlockState>) -> Subscription {
        self.connect(|i| &i.accepted_block, callback)
    }

    fn subscribe_irreversible_block(&self, callback: Callback<BlockState>) -> Subscription {
        self.connect(|i| &i.irreversible_block, callback)
    }
}
