//! Host-facing entry point.
//!
//! Mirrors the host plugin contract: everything happens in `initialize`,
//! `startup` has nothing left to do and `shutdown` disconnects the host
//! signals before draining the relay.

use std::sync::Arc;

use tracing::{info, warn};

use crate::config::RelayConfig;
use crate::error::RelayError;
use crate::host::{ChainHost, Subscription};
use crate::metrics::RelayMetrics;
use crate::relay::Relay;
use crate::sink::StreamSink;

pub struct RelayPlugin {
    // Declared first so host signals disconnect before the relay drains on drop.
    subscriptions: Vec<Subscription>,
    relay: Relay,
    // Callbacks registered on the host only hold it weakly.
    _host: Arc<dyn ChainHost>,
    chain_id: String,
}

impl RelayPlugin {
    /// Check for a host, initialise the sink, connect to the host and start
    /// the consumer.
    ///
    /// A sink that fails to initialise is logged and the relay carries on in
    /// degraded mode (every send fails and is counted) unless
    /// `fail_fast_on_sink_init` is set. A missing host is always fatal.
    pub fn initialize(
        config: RelayConfig,
        host: Option<Arc<dyn ChainHost>>,
        mut sink: Box<dyn StreamSink>,
    ) -> Result<Self, RelayError> {
        config.validate()?;
        let host = host.ok_or(RelayError::MissingHost)?;

        if let Err(e) = sink.init(&config.stream_name, &config.region) {
            if config.fail_fast_on_sink_init {
                return Err(e.into());
            }
            warn!(
                stream = %config.stream_name,
                region = %config.region,
                error = %e,
                "sink init failed, continuing without a working sink"
            );
        }

        let chain_id = host.chain_id();
        info!(chain_id = %chain_id, "connected to chain host");

        let mut relay = Relay::new(config, sink)?;
        let subscriptions = relay.intake(&host).subscribe(host.as_ref());
        relay.start()?;

        Ok(Self {
            subscriptions,
            relay,
            _host: host,
            chain_id,
        })
    }

    pub fn startup(&self) {}

    /// Stop receiving host events, then drain and stop the relay.
    pub fn shutdown(mut self) -> Result<(), RelayError> {
        self.subscriptions.clear();
        self.relay.stop()
    }

    pub fn chain_id(&self) -> &str {
        &self.chain_id
    }

    pub fn relay(&self) -> &Relay {
        &self.relay
    }

    pub fn metrics(&self) -> &Arc<RelayMetrics> {
        self.relay.metrics()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemoryHost;
    use crate::sink::MemorySink;

    #[test]
    fn missing_host_is_fatal() {
        let sink = MemorySink::new();
        let err = RelayPlugin::initialize(RelayConfig::default(), None, Box::new(sink.clone()))
            .err()
            .unwrap();
        assert!(matches!(err, RelayError::MissingHost));
        // rejected before the sink was touched
        assert!(!sink.is_initialized());
        assert!(!sink.is_shut_down());
    }

    #[test]
    fn sink_init_failure_is_fatal_only_when_asked() {
        let host: Arc<dyn ChainHost> = Arc::new(MemoryHost::new("c"));

        let sink = MemorySink::new();
        sink.fail_init(true);
        let plugin =
            RelayPlugin::initialize(RelayConfig::default(), Some(Arc::clone(&host)), Box::new(sink))
                .unwrap();
        plugin.shutdown().unwrap();

        let sink = MemorySink::new();
        sink.fail_init(true);
        let config = RelayConfig {
            fail_fast_on_sink_init: true,
            ..RelayConfig::default()
        };
        let err = RelayPlugin::initialize(config, Some(host), Box::new(sink)).err().unwrap();
        assert!(matches!(err, RelayError::Sink(_)));
    }

    #[test]
    fn shutdown_disconnects_host() {
        let memory = MemoryHost::new("chain-x");
        let host: Arc<dyn ChainHost> = Arc::new(memory.clone());
        let sink = MemorySink::new();

        let plugin =
            RelayPlugin::initialize(RelayConfig::default(), Some(host), Box::new(sink.clone()))
                .unwrap();
        plugin.startup();
        assert_eq!(plugin.chain_id(), "chain-x");
        assert_eq!(memory.subscriber_count(), 4);
        assert_eq!(sink.stream_name().as_deref(), Some("chain-events"));
        assert_eq!(sink.region().as_deref(), Some(RelayConfig::default().region.as_str()));

        plugin.shutdown().unwrap();
        assert_eq!(memory.subscriber_count(), 0);
        assert!(sink.is_shut_down());
    }
}
