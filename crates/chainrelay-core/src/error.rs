//! Error types for the relay pipeline.

use thiserror::Error;

/// Errors raised by the relay, its lifecycle and its host wiring.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// The chain engine could not be located at plugin initialisation.
    #[error("Chain host not available: the relay requires a chain engine")]
    MissingHost,

    #[error("Chain host has no pending block")]
    NoPendingBlock,

    /// The host was dropped while a subscription was still firing.
    #[error("Chain host has been dropped")]
    HostUnavailable,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),

    #[error("Relay already started")]
    AlreadyStarted,

    #[error("Relay is not running")]
    NotRunning,

    #[error("Failed to spawn consumer thread: {0}")]
    WorkerSpawn(String),

    #[error("Consumer thread panicked")]
    WorkerPanicked,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors reported by a [`StreamSink`](crate::sink::StreamSink).
#[derive(Debug, Error)]
pub enum SinkError {
    /// `send` was called before a successful `init` (degraded mode).
    #[error("Sink not initialised")]
    NotInitialized,

    #[error("Sink init failed: {0}")]
    Init(String),

    #[error("Send to stream '{stream}' failed: {reason}")]
    Send { stream: String, reason: String },
}

impl SinkError {
    /// Returns `true` if a later attempt could plausibly succeed.
    ///
    /// The relay itself never retries; this is for sinks and callers that do.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Send { .. })
    }
}
