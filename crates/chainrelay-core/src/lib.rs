//! chainrelay-core — the decoupling pipeline between a chain engine and a stream sink.
//!
//! # Architecture
//!
//! ```text
//! ChainHost callbacks (host thread)
//!       │
//!       ▼
//! EventIntake ──► EventQueues   (4 lanes, 1 mutex + 1 condvar, soft capacity)
//!                      │
//!                      ▼  drain_all (swap, O(1) under the lock)
//!                 consumer thread
//!                      │
//!                      ▼
//!                 Dispatcher    (StartBlockGate → ForwardPolicy → payload)
//!                      │
//!                      ▼
//!                 StreamSink    (Kinesis / memory)
//! ```
//!
//! [`Relay`] owns the lifecycle (start / graceful stop) and
//! [`RelayPlugin`] wires a relay to a [`ChainHost`] the way the host's
//! plugin system expects.

pub mod builder;
pub mod config;
pub mod consumer;
pub mod dispatch;
pub mod error;
pub mod gate;
pub mod host;
pub mod intake;
pub mod metrics;
pub mod payload;
pub mod plugin;
pub mod queue;
pub mod relay;
pub mod sink;
pub mod types;

pub use builder::RelayBuilder;
pub use config::{BackpressureConfig, ForwardPolicy, RelayConfig};
pub use dispatch::{Dispatcher, Disposition};
pub use error::{RelayError, SinkError};
pub use gate::StartBlockGate;
pub use host::{ChainHost, MemoryHost, Subscription};
pub use intake::EventIntake;
pub use metrics::{MetricsSnapshot, RelayMetrics};
pub use plugin::RelayPlugin;
pub use queue::{Batch, EventQueues};
pub use relay::{Relay, RelayState};
pub use sink::{MemorySink, SentRecord, StreamSink};
pub use types::{
    BlockState, EventKind, PendingBlock, RecordType, TransactionMetadata, TransactionTrace,
    TransactionTraceRecord,
};
