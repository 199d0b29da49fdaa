//! Relay lifecycle. Owns the queues and the consumer thread.
//!
//! # Lifecycle
//! `Idle` → `start()` → `Running` → `stop()` → `Stopped`
//!
//! `stop()` requests shutdown, waits for the consumer to drain every lane
//! and then shuts the sink down. A relay dropped while running is stopped
//! the same way.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{error, info, warn};

use crate::config::RelayConfig;
use crate::consumer;
use crate::dispatch::Dispatcher;
use crate::error::RelayError;
use crate::host::ChainHost;
use crate::intake::EventIntake;
use crate::metrics::RelayMetrics;
use crate::queue::EventQueues;
use crate::sink::StreamSink;

/// Where the relay is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    /// Constructed, consumer not yet started.
    Idle,
    /// Consumer thread is running.
    Running,
    /// Drained and shut down.
    Stopped,
}

impl std::fmt::Display for RelayState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Running => write!(f, "running"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

enum Worker {
    Idle(Dispatcher),
    Running(JoinHandle<Option<Dispatcher>>),
    Stopped,
}

pub struct Relay {
    config: RelayConfig,
    queues: Arc<EventQueues>,
    metrics: Arc<RelayMetrics>,
    worker: Worker,
}

impl Relay {
    /// Build a relay around an already-initialised sink.
    pub fn new(config: RelayConfig, sink: Box<dyn StreamSink>) -> Result<Self, RelayError> {
        config.validate()?;
        let metrics = Arc::new(RelayMetrics::new());
        let queues = Arc::new(EventQueues::new(
            config.queue_capacity,
            config.backpressure,
            Arc::clone(&metrics),
        ));
        let dispatcher = Dispatcher::new(&config, sink, Arc::clone(&metrics));
        Ok(Self {
            config,
            queues,
            metrics,
            worker: Worker::Idle(dispatcher),
        })
    }

    /// Spawn the consumer thread.
    ///
    /// If the thread cannot be spawned the sink is shut down and the relay
    /// ends up stopped.
    pub fn start(&mut self) -> Result<(), RelayError> {
        self.launch(thread::Builder::new())
    }

    fn launch(&mut self, builder: thread::Builder) -> Result<(), RelayError> {
        let dispatcher = match std::mem::replace(&mut self.worker, Worker::Stopped) {
            Worker::Idle(dispatcher) => dispatcher,
            other => {
                self.worker = other;
                return Err(RelayError::AlreadyStarted);
            }
        };

        let handle = match consumer::spawn(builder, Arc::clone(&self.queues), dispatcher) {
            Ok(handle) => handle,
            Err(failure) => {
                error!(error = %failure.error, "failed to spawn consumer thread");
                if let Some(dispatcher) = failure.dispatcher {
                    if let Err(e) = dispatcher.into_sink().shutdown() {
                        warn!(error = %e, "sink shutdown after failed start");
                    }
                }
                return Err(failure.error);
            }
        };
        self.worker = Worker::Running(handle);

        info!(
            stream = %self.config.stream_name,
            region = %self.config.region,
            start_block = self.config.start_block,
            capacity = self.config.queue_capacity,
            "relay started"
        );
        Ok(())
    }

    /// Drain every queued event, join the consumer and shut the sink down.
    pub fn stop(&mut self) -> Result<(), RelayError> {
        let handle = match std::mem::replace(&mut self.worker, Worker::Stopped) {
            Worker::Running(handle) => handle,
            other => {
                self.worker = other;
                return Err(RelayError::NotRunning);
            }
        };

        info!(pending = self.queues.total_len(), "graceful drain start");
        self.queues.request_shutdown();

        let dispatcher = handle.join().ok().flatten().ok_or_else(|| {
            error!("consumer thread panicked");
            RelayError::WorkerPanicked
        })?;

        let mut sink = dispatcher.into_sink();
        sink.shutdown()?;

        let snapshot = self.metrics.snapshot();
        info!(
            processed = snapshot.processed,
            forwarded = snapshot.forwarded,
            sink_failures = snapshot.sink_failures,
            "relay stopped"
        );
        Ok(())
    }

    /// Producer handle bound to `host`.
    pub fn intake(&self, host: &Arc<dyn ChainHost>) -> EventIntake {
        EventIntake::new(Arc::clone(&self.queues), host, Arc::clone(&self.metrics))
    }

    pub fn queues(&self) -> &Arc<EventQueues> {
        &self.queues
    }

    pub fn metrics(&self) -> &Arc<RelayMetrics> {
        &self.metrics
    }

    pub fn state(&self) -> RelayState {
        match self.worker {
            Worker::Idle(_) => RelayState::Idle,
            Worker::Running(_) => RelayState::Running,
            Worker::Stopped => RelayState::Stopped,
        }
    }
}

impl Drop for Relay {
    fn drop(&mut self) {
        if self.state() == RelayState::Running {
            warn!("relay dropped while running, stopping");
            if let Err(e) = self.stop() {
                error!(error = %e, "stop on drop failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;
    use crate::types::{PendingBlock, TransactionTrace, TransactionTraceRecord};
    use chrono::Utc;

    fn relay(start_block: u32) -> (Relay, MemorySink) {
        let sink = MemorySink::new();
        let mut boxed: Box<dyn StreamSink> = Box::new(sink.clone());
        boxed.init("s", "r").unwrap();
        let config = RelayConfig {
            start_block,
            ..RelayConfig::default()
        };
        (Relay::new(config, boxed).unwrap(), sink)
    }

    fn record(n: u32) -> TransactionTraceRecord {
        TransactionTraceRecord::new(
            PendingBlock {
                block_num: n,
                block_time: Utc::now(),
            },
            Arc::new(TransactionTrace {
                id: format!("t{n}"),
                status: "executed".into(),
                elapsed_us: 0,
                net_usage: 0,
                scheduled: false,
                action_traces: vec![],
                except: None,
            }),
        )
    }

    #[test]
    fn lifecycle_transitions() {
        let (mut relay, sink) = relay(0);
        assert_eq!(relay.state(), RelayState::Idle);
        assert!(matches!(relay.stop(), Err(RelayError::NotRunning)));

        relay.start().unwrap();
        assert_eq!(relay.state(), RelayState::Running);
        assert!(matches!(relay.start(), Err(RelayError::AlreadyStarted)));

        relay.stop().unwrap();
        assert_eq!(relay.state(), RelayState::Stopped);
        assert!(sink.is_shut_down());
        assert!(matches!(relay.stop(), Err(RelayError::NotRunning)));
        assert!(matches!(relay.start(), Err(RelayError::AlreadyStarted)));
    }

    #[test]
    fn stop_drains_pending_items() {
        let (mut relay, sink) = relay(0);
        for n in 0..100 {
            relay.queues().push_applied_transaction(record(n));
        }
        relay.start().unwrap();
        relay.stop().unwrap();

        assert_eq!(sink.len(), 100);
        assert!(relay.queues().is_empty());
        assert_eq!(relay.metrics().snapshot().forwarded, 100);
    }

    #[test]
    fn drop_stops_running_relay() {
        let (mut relay, sink) = relay(0);
        relay.start().unwrap();
        relay.queues().push_applied_transaction(record(1));
        drop(relay);
        assert_eq!(sink.len(), 1);
        assert!(sink.is_shut_down());
    }

    #[test]
    fn failed_start_shuts_the_sink_down() {
        let (mut relay, sink) = relay(0);
        relay.queues().push_applied_transaction(record(1));

        let err = relay.launch(thread::Builder::new().stack_size(usize::MAX / 2));
        assert!(matches!(err, Err(RelayError::WorkerSpawn(_))));
        assert_eq!(relay.state(), RelayState::Stopped);
        assert!(sink.is_shut_down());
        assert!(matches!(relay.stop(), Err(RelayError::NotRunning)));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = RelayConfig {
            stream_name: String::new(),
            ..RelayConfig::default()
        };
        let err = Relay::new(config, Box::new(MemorySink::new())).err().unwrap();
        assert!(matches!(err, RelayError::Config(_)));
    }

    #[test]
    fn state_display() {
        assert_eq!(RelayState::Running.to_string(), "running");
        assert_eq!(RelayState::Stopped.to_string(), "stopped");
    }
}
