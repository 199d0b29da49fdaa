//! Fluent builder API for relay configuration.
//!
//! # Example
//!
//! ```rust
//! use chainrelay_core::{ForwardPolicy, RelayBuilder};
//!
//! let config = RelayBuilder::new()
//!     .stream_name("mainnet-traces")
//!     .region("us-east-1")
//!     .start_block(1_000)
//!     .queue_capacity(5_000)
//!     .forward(ForwardPolicy::all())
//!     .build_config()
//!     .unwrap();
//! assert_eq!(config.start_block, 1_000);
//! ```

use crate::config::{ForwardPolicy, RelayConfig};
use crate::error::RelayError;

/// Fluent builder for [`RelayConfig`].
#[derive(Default)]
pub struct RelayBuilder {
    config: RelayConfig,
}

impl RelayBuilder {
    pub fn new() -> Self {
        Self {
            config: RelayConfig::default(),
        }
    }

    /// Start from an existing config (e.g. loaded from a file).
    pub fn from_config(config: RelayConfig) -> Self {
        Self { config }
    }

    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.config.region = region.into();
        self
    }

    pub fn stream_name(mut self, name: impl Into<String>) -> Self {
        self.config.stream_name = name.into();
        self
    }

    /// Set the start-block gate height (`0` = forward from the first event).
    pub fn start_block(mut self, block: u32) -> Self {
        self.config.start_block = block;
        self
    }

    /// Set the soft capacity of each queue lane.
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue_capacity = capacity;
        self
    }

    /// Set the backpressure step and cap, in milliseconds.
    pub fn backpressure_ms(mut self, step_ms: u64, max_ms: u64) -> Self {
        self.config.backpressure.step_ms = step_ms;
        self.config.backpressure.max_ms = max_ms;
        self
    }

    pub fn forward(mut self, policy: ForwardPolicy) -> Self {
        self.config.forward = policy;
        self
    }

    pub fn fail_fast_on_sink_init(mut self, fail_fast: bool) -> Self {
        self.config.fail_fast_on_sink_init = fail_fast;
        self
    }

    /// Validate and return the `RelayConfig`.
    pub fn build_config(self) -> Result<RelayConfig, RelayError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults() {
        let cfg = RelayBuilder::new().build_config().unwrap();
        assert_eq!(cfg, RelayConfig::default());
    }

    #[test]
    fn builder_custom() {
        let cfg = RelayBuilder::new()
            .region("eu-west-1")
            .stream_name("testnet")
            .start_block(0)
            .queue_capacity(64)
            .backpressure_ms(5, 20)
            .fail_fast_on_sink_init(true)
            .build_config()
            .unwrap();

        assert_eq!(cfg.region, "eu-west-1");
        assert_eq!(cfg.stream_name, "testnet");
        assert_eq!(cfg.start_block, 0);
        assert_eq!(cfg.queue_capacity, 64);
        assert_eq!(cfg.backpressure.step_ms, 5);
        assert_eq!(cfg.backpressure.max_ms, 20);
        assert!(cfg.fail_fast_on_sink_init);
    }

    #[test]
    fn builder_validates() {
        assert!(RelayBuilder::new().queue_capacity(0).build_config().is_err());
    }
}
