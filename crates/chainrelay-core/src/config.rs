//! Relay configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::RelayError;
use crate::types::EventKind;

/// Top-level relay configuration.
///
/// Keys are kebab-case. The host's plugin option names (`aws-region-name`,
/// `aws-stream-name`, `kinesis-block-start`) are accepted as aliases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RelayConfig {
    /// AWS region of the target stream.
    #[serde(default = "default_region", alias = "aws-region-name")]
    pub region: String,
    /// Name of the target stream.
    #[serde(default = "default_stream_name", alias = "aws-stream-name")]
    pub stream_name: String,
    /// Forwarding is suppressed until an accepted block reaches this height.
    /// `0` opens the gate at startup.
    #[serde(default = "default_start_block", alias = "kinesis-block-start")]
    pub start_block: u32,
    /// Soft capacity per queue lane. Exceeding it throttles producers.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default)]
    pub backpressure: BackpressureConfig,
    #[serde(default)]
    pub forward: ForwardPolicy,
    /// Abort plugin initialisation when the sink cannot be initialised.
    #[serde(default)]
    pub fail_fast_on_sink_init: bool,
}

fn default_region() -> String { "ap-northeast-1".into() }
fn default_stream_name() -> String { "chain-events".into() }
fn default_start_block() -> u32 { 256 }
fn default_queue_capacity() -> usize { 10_000 }

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            region: default_region(),
            stream_name: default_stream_name(),
            start_block: default_start_block(),
            queue_capacity: default_queue_capacity(),
            backpressure: BackpressureConfig::default(),
            forward: ForwardPolicy::default(),
            fail_fast_on_sink_init: false,
        }
    }
}

impl RelayConfig {
    /// Parse a JSON config; missing keys take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, RelayError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, RelayError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<(), RelayError> {
        if self.stream_name.trim().is_empty() {
            return Err(RelayError::Config("stream-name must not be empty".into()));
        }
        if self.region.trim().is_empty() {
            return Err(RelayError::Config("region must not be empty".into()));
        }
        if self.queue_capacity == 0 {
            return Err(RelayError::Config("queue-capacity must be positive".into()));
        }
        self.backpressure.validate()
    }
}

// ─── BackpressureConfig ───────────────────────────────────────────────────────

/// Producer throttling once a lane is over its soft capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BackpressureConfig {
    /// Initial sleep and the amount it grows or shrinks by, in milliseconds.
    #[serde(default = "default_step_ms")]
    pub step_ms: u64,
    /// Upper bound on a single throttle sleep, in milliseconds.
    #[serde(default = "default_max_ms")]
    pub max_ms: u64,
}

fn default_step_ms() -> u64 { 100 }
fn default_max_ms() -> u64 { 1_000 }

impl Default for BackpressureConfig {
    fn default() -> Self {
        Self {
            step_ms: default_step_ms(),
            max_ms: default_max_ms(),
        }
    }
}

impl BackpressureConfig {
    pub fn step(&self) -> Duration {
        Duration::from_millis(self.step_ms)
    }

    pub fn max(&self) -> Duration {
        Duration::from_millis(self.max_ms)
    }

    fn validate(&self) -> Result<(), RelayError> {
        if self.step_ms == 0 {
            return Err(RelayError::Config("backpressure.step-ms must be positive".into()));
        }
        if self.max_ms < self.step_ms {
            return Err(RelayError::Config(
                "backpressure.max-ms must be >= backpressure.step-ms".into(),
            ));
        }
        Ok(())
    }
}

// ─── ForwardPolicy ────────────────────────────────────────────────────────────

/// Which event kinds are forwarded once the start-block gate is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ForwardPolicy {
    #[serde(default)]
    pub accepted_transactions: bool,
    #[serde(default = "bool_true")]
    pub applied_transactions: bool,
    #[serde(default)]
    pub accepted_blocks: bool,
    #[serde(default)]
    pub irreversible_blocks: bool,
}

fn bool_true() -> bool { true }

impl Default for ForwardPolicy {
    fn default() -> Self {
        Self {
            accepted_transactions: false,
            applied_transactions: true,
            accepted_blocks: false,
            irreversible_blocks: false,
        }
    }
}

impl ForwardPolicy {
    /// Forward every event kind.
    pub fn all() -> Self {
        Self {
            accepted_transactions: true,
            applied_transactions: true,
            accepted_blocks: true,
            irreversible_blocks: true,
        }
    }

    pub fn forwards(&self, kind: EventKind) -> bool {
        match kind {
            EventKind::AcceptedTransaction => self.accepted_transactions,
            EventKind::AppliedTransaction => self.applied_transactions,
            EventKind::AcceptedBlock => self.accepted_blocks,
            EventKind::IrreversibleBlock => self.irreversible_blocks,
        }
    }
}
