//! Where forwarded payloads leave the relay.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::SinkError;
use crate::types::RecordType;

/// An append-only event stream (Kinesis, a log, an in-memory buffer, ...).
///
/// The sink is owned by the consumer thread while the relay runs and handed
/// back to the relay for `shutdown` once that thread has joined, so
/// implementations only need to be `Send`.
pub trait StreamSink: Send {
    /// One-time setup, called before the relay starts.
    fn init(&mut self, stream_name: &str, region: &str) -> Result<(), SinkError>;

    /// Deliver one payload. Failures are logged and dropped by the caller.
    fn send(&mut self, record_type: RecordType, payload: &[u8]) -> Result<(), SinkError>;

    /// Release client resources. Called once, after the consumer has drained.
    fn shutdown(&mut self) -> Result<(), SinkError>;
}

// ─── In-memory sink (for testing) ─────────────────────────────────────────────

/// A payload captured by [`MemorySink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentRecord {
    pub record_type: RecordType,
    pub payload: Vec<u8>,
}

impl SentRecord {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.payload).unwrap_or(serde_json::Value::Null)
    }
}

#[derive(Debug, Default)]
struct MemorySinkState {
    stream_name: Option<String>,
    region: Option<String>,
    records: Vec<SentRecord>,
    fail_sends: bool,
    fail_init: bool,
    shut_down: bool,
}

/// In-memory sink for tests and dry runs.
///
/// Clones share the same buffer, so a test can keep a handle while the relay
/// owns the sink.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    state: Arc<Mutex<MemorySinkState>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `send` fail.
    pub fn fail_sends(&self, fail: bool) {
        self.state.lock().fail_sends = fail;
    }

    /// Make the next `init` fail.
    pub fn fail_init(&self, fail: bool) {
        self.state.lock().fail_init = fail;
    }

    pub fn records(&self) -> Vec<SentRecord> {
        self.state.lock().records.clone()
    }

    pub fn len(&self) -> usize {
        self.state.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_initialized(&self) -> bool {
        self.state.lock().stream_name.is_some()
    }

    pub fn is_shut_down(&self) -> bool {
        self.state.lock().shut_down
    }

    pub fn stream_name(&self) -> Option<String> {
        self.state.lock().stream_name.clone()
    }

    pub fn region(&self) -> Option<String> {
        self.state.lock().region.clone()
    }
}

impl StreamSink for MemorySink {
    fn init(&mut self, stream_name: &str, region: &str) -> Result<(), SinkError> {
        let mut state = self.state.lock();
        if state.fail_init {
            return Err(SinkError::Init(format!("refusing to open '{stream_name}'")));
        }
        state.stream_name = Some(stream_name.to_string());
        state.region = Some(region.to_string());
        Ok(())
    }

    fn send(&mut self, record_type: RecordType, payload: &[u8]) -> Result<(), SinkError> {
        let mut state = self.state.lock();
        let Some(stream) = state.stream_name.clone() else {
            return Err(SinkError::NotInitialized);
        };
        if state.fail_sends {
            return Err(SinkError::Send {
                stream,
                reason: "injected failure".into(),
            });
        }
        state.records.push(SentRecord {
            record_type,
            payload: payload.to_vec(),
        });
        Ok(())
    }

    fn shutdown(&mut self) -> Result<(), SinkError> {
        self.state.lock().shut_down = true;
        Ok(())
    }
}
