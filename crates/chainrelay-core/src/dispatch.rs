//! Filter and dispatch: decides per event whether it leaves the relay.
//!
//! Every item of a drained [`Batch`] is processed on its own: an error or a
//! panic while filtering, formatting or sending one item is logged and
//! counted, and the next item is processed as usual.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{error, info, trace, warn};

use crate::config::{ForwardPolicy, RelayConfig};
use crate::error::RelayError;
use crate::gate::StartBlockGate;
use crate::metrics::RelayMetrics;
use crate::payload;
use crate::queue::Batch;
use crate::sink::StreamSink;
use crate::types::{BlockState, EventKind, TransactionMetadata, TransactionTraceRecord};

/// What happened to one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Handed to the sink successfully.
    Forwarded,
    /// Suppressed because the start block has not been reached.
    Gated,
    /// Forwarding for this kind is switched off.
    Disabled,
    /// The sink rejected the payload; it is not retried.
    Dropped,
}

/// Owns the gate and the sink. Lives on the consumer thread.
pub struct Dispatcher {
    gate: StartBlockGate,
    policy: ForwardPolicy,
    sink: Box<dyn StreamSink>,
    metrics: Arc<RelayMetrics>,
}

impl Dispatcher {
    pub fn new(config: &RelayConfig, sink: Box<dyn StreamSink>, metrics: Arc<RelayMetrics>) -> Self {
        let gate = StartBlockGate::new(config.start_block);
        if gate.is_reached() {
            metrics.set_start_block_reached();
        }
        Self {
            gate,
            policy: config.forward,
            sink,
            metrics,
        }
    }

    pub fn gate(&self) -> &StartBlockGate {
        &self.gate
    }

    /// Give the sink back (for `shutdown`) once the consumer is done.
    pub fn into_sink(self) -> Box<dyn StreamSink> {
        self.sink
    }

    /// Process a drained batch lane by lane, FIFO within each lane.
    pub fn process_batch(&mut self, batch: Batch) {
        self.metrics.record_batch();
        let Batch {
            accepted_transactions,
            applied_transactions,
            accepted_blocks,
            irreversible_blocks,
        } = batch;

        for trx in accepted_transactions {
            self.guarded(EventKind::AcceptedTransaction, |d| d.accepted_transaction(&trx));
        }
        for record in applied_transactions {
            self.guarded(EventKind::AppliedTransaction, |d| d.applied_transaction(&record));
        }
        for block in accepted_blocks {
            self.guarded(EventKind::AcceptedBlock, |d| d.accepted_block(&block));
        }
        for block in irreversible_blocks {
            self.guarded(EventKind::IrreversibleBlock, |d| d.irreversible_block(&block));
        }
    }

    fn guarded<F>(&mut self, kind: EventKind, f: F)
    where
        F: FnOnce(&mut Self) -> Result<Disposition, RelayError>,
    {
        self.metrics.record_processed();
        match panic::catch_unwind(AssertUnwindSafe(|| f(self))) {
            Ok(Ok(disposition)) => self.record(disposition),
            Ok(Err(e)) => {
                self.metrics.record_processing_error();
                error!(kind = %kind, error = %e, "failed to process event");
            }
            Err(cause) => {
                self.metrics.record_processing_error();
                error!(kind = %kind, panic = %panic_message(cause.as_ref()), "panic while processing event");
            }
        }
    }

    fn record(&self, disposition: Disposition) {
        match disposition {
            Disposition::Forwarded => self.metrics.record_forwarded(),
            Disposition::Gated => self.metrics.record_gated(),
            Disposition::Disabled => self.metrics.record_disabled(),
            // counted as a sink failure in `forward`
            Disposition::Dropped => {}
        }
    }

    // ─── Per-kind policy ──────────────────────────────────────────────────────

    /// Always processed; forwarded only when enabled and past the gate.
    pub fn accepted_transaction(
        &mut self,
        trx: &TransactionMetadata,
    ) -> Result<Disposition, RelayError> {
        trace!(trx = %trx.id, implicit = trx.implicit, "accepted transaction");
        if let Some(held) = self.hold(EventKind::AcceptedTransaction) {
            return Ok(held);
        }
        let bytes = payload::accepted_transaction(trx)?;
        Ok(self.forward(EventKind::AcceptedTransaction, &bytes))
    }

    pub fn applied_transaction(
        &mut self,
        record: &TransactionTraceRecord,
    ) -> Result<Disposition, RelayError> {
        if let Some(held) = self.hold(EventKind::AppliedTransaction) {
            return Ok(held);
        }
        let bytes = payload::applied_transaction(record)?;
        Ok(self.forward(EventKind::AppliedTransaction, &bytes))
    }

    /// Moves the gate first, so the block that opens it is itself eligible.
    pub fn accepted_block(&mut self, block: &BlockState) -> Result<Disposition, RelayError> {
        if self.gate.observe(block.block_num) {
            self.metrics.set_start_block_reached();
            info!(
                block = block.block_num,
                start_block = self.gate.start_block_num(),
                "start block reached, forwarding enabled"
            );
        }
        if let Some(held) = self.hold(EventKind::AcceptedBlock) {
            return Ok(held);
        }
        let bytes = payload::block(block, false)?;
        Ok(self.forward(EventKind::AcceptedBlock, &bytes))
    }

    pub fn irreversible_block(&mut self, block: &BlockState) -> Result<Disposition, RelayError> {
        if let Some(held) = self.hold(EventKind::IrreversibleBlock) {
            return Ok(held);
        }
        let bytes = payload::block(block, true)?;
        Ok(self.forward(EventKind::IrreversibleBlock, &bytes))
    }

    /// `Some` when `kind` must not leave the relay yet (gate closed) or at all
    /// (switched off). The gate is checked first.
    fn hold(&self, kind: EventKind) -> Option<Disposition> {
        if !self.gate.is_reached() {
            Some(Disposition::Gated)
        } else if !self.policy.forwards(kind) {
            Some(Disposition::Disabled)
        } else {
            None
        }
    }

    fn forward(&mut self, kind: EventKind, bytes: &[u8]) -> Disposition {
        let record_type = kind.record_type();
        match self.sink.send(record_type, bytes) {
            Ok(()) => Disposition::Forwarded,
            Err(e) => {
                self.metrics.record_sink_failure();
                warn!(record_type = %record_type, error = %e, "sink rejected payload, dropping");
                Disposition::Dropped
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SinkError;
    use crate::sink::MemorySink;
    use crate::types::{PendingBlock, RecordType, TransactionTrace};
    use chrono::Utc;

    fn config(start_block: u32, forward: ForwardPolicy) -> RelayConfig {
        RelayConfig {
            start_block,
            forward,
            ..RelayConfig::default()
        }
    }

    fn dispatcher(start_block: u32, forward: ForwardPolicy) -> (Dispatcher, MemorySink, Arc<RelayMetrics>) {
        let sink = MemorySink::new();
        let mut boxed: Box<dyn StreamSink> = Box::new(sink.clone());
        boxed.init("test-stream", "ap-northeast-1").unwrap();
        let metrics = Arc::new(RelayMetrics::new());
        let d = Dispatcher::new(&config(start_block, forward), boxed, Arc::clone(&metrics));
        (d, sink, metrics)
    }

    fn block(n: u32) -> Arc<BlockState> {
        Arc::new(BlockState {
            block_num: n,
            id: format!("{n:08x}"),
            previous: format!("{:08x}", n.saturating_sub(1)),
            timestamp: Utc::now(),
            producer: "bp".into(),
            tx_count: 1,
        })
    }

    fn trace_record(block_num: u32, id: &str) -> TransactionTraceRecord {
        TransactionTraceRecord::new(
            PendingBlock {
                block_num,
                block_time: Utc::now(),
            },
            Arc::new(TransactionTrace {
                id: id.into(),
                status: "executed".into(),
                elapsed_us: 1,
                net_usage: 0,
                scheduled: false,
                action_traces: vec![],
                except: None,
            }),
        )
    }

    fn trx(id: &str) -> Arc<TransactionMetadata> {
        Arc::new(TransactionMetadata {
            id: id.into(),
            accepted: true,
            implicit: false,
            scheduled: false,
            packed_trx: serde_json::json!({}),
        })
    }

    #[test]
    fn traces_are_gated_until_start_block() {
        let (mut d, sink, _) = dispatcher(11, ForwardPolicy::default());

        assert_eq!(d.applied_transaction(&trace_record(10, "a")).unwrap(), Disposition::Gated);
        assert_eq!(d.accepted_block(&block(10)).unwrap(), Disposition::Gated);
        assert!(!d.gate().is_reached());

        // opening block is itself eligible; blocks are disabled by default
        assert_eq!(d.accepted_block(&block(11)).unwrap(), Disposition::Disabled);
        assert!(d.gate().is_reached());
        assert_eq!(
            d.applied_transaction(&trace_record(11, "b")).unwrap(),
            Disposition::Forwarded
        );
        assert_eq!(sink.len(), 1);
        assert_eq!(sink.records()[0].record_type, RecordType::AppliedTransaction);
    }

    #[test]
    fn opening_block_is_forwarded_when_enabled() {
        let (mut d, sink, metrics) = dispatcher(5, ForwardPolicy::all());
        assert_eq!(d.accepted_block(&block(4)).unwrap(), Disposition::Gated);
        assert_eq!(d.accepted_block(&block(5)).unwrap(), Disposition::Forwarded);
        assert_eq!(sink.records()[0].json()["block_num"], 5);
        assert!(metrics.snapshot().start_block_reached);
    }

    #[test]
    fn start_block_zero_opens_immediately() {
        let (mut d, sink, metrics) = dispatcher(0, ForwardPolicy::default());
        assert!(d.gate().is_reached());
        assert!(metrics.snapshot().start_block_reached);
        assert_eq!(
            d.applied_transaction(&trace_record(1, "a")).unwrap(),
            Disposition::Forwarded
        );
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn default_policy_forwards_only_traces() {
        let (mut d, sink, _) = dispatcher(0, ForwardPolicy::default());
        assert_eq!(d.accepted_transaction(&trx("t")).unwrap(), Disposition::Disabled);
        assert_eq!(d.accepted_block(&block(3)).unwrap(), Disposition::Disabled);
        assert_eq!(d.irreversible_block(&block(3)).unwrap(), Disposition::Disabled);
        assert!(sink.is_empty());
    }

    #[test]
    fn extension_points_forward_when_enabled() {
        let (mut d, sink, _) = dispatcher(0, ForwardPolicy::all());
        d.accepted_transaction(&trx("t")).unwrap();
        d.irreversible_block(&block(3)).unwrap();

        let records = sink.records();
        assert_eq!(records[0].record_type, RecordType::AcceptedTransaction);
        assert_eq!(records[0].json()["trx"]["id"], "t");
        assert_eq!(records[1].record_type, RecordType::IrreversibleBlock);
        assert_eq!(records[1].json()["irreversible"], true);
    }

    #[test]
    fn sink_failure_drops_and_continues() {
        let (mut d, sink, metrics) = dispatcher(0, ForwardPolicy::default());
        sink.fail_sends(true);

        let mut batch = Batch::default();
        batch.applied_transactions.push_back(trace_record(1, "a"));
        batch.applied_transactions.push_back(trace_record(1, "b"));
        d.process_batch(batch);

        let s = metrics.snapshot();
        assert_eq!(s.processed, 2);
        assert_eq!(s.sink_failures, 2);
        assert_eq!(s.forwarded, 0);
        assert!(sink.is_empty());
    }

    struct PanickyOnce {
        inner: MemorySink,
        panicked: bool,
    }

    impl StreamSink for PanickyOnce {
        fn init(&mut self, stream_name: &str, region: &str) -> Result<(), SinkError> {
            self.inner.init(stream_name, region)
        }

        fn send(&mut self, record_type: RecordType, payload: &[u8]) -> Result<(), SinkError> {
            if !self.panicked {
                self.panicked = true;
                panic!("client blew up");
            }
            self.inner.send(record_type, payload)
        }

        fn shutdown(&mut self) -> Result<(), SinkError> {
            self.inner.shutdown()
        }
    }

    #[test]
    fn panic_in_one_item_does_not_abort_batch() {
        let handle = MemorySink::new();
        let mut sink = PanickyOnce {
            inner: handle.clone(),
            panicked: false,
        };
        sink.init("s", "r").unwrap();
        let metrics = Arc::new(RelayMetrics::new());
        let mut d = Dispatcher::new(
            &config(0, ForwardPolicy::default()),
            Box::new(sink),
            Arc::clone(&metrics),
        );

        let mut batch = Batch::default();
        for id in ["a", "b", "c"] {
            batch.applied_transactions.push_back(trace_record(1, id));
        }
        d.process_batch(batch);

        let ids: Vec<String> = handle
            .records()
            .iter()
            .map(|r| r.json()["trace"]["id"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(ids, vec!["b", "c"]);
        assert_eq!(metrics.snapshot().processing_errors, 1);
        assert_eq!(metrics.snapshot().forwarded, 2);
    }

    #[test]
    fn batch_lanes_processed_in_fixed_order() {
        // the accepted block opens the gate only after the trace lane ran
        let (mut d, sink, _) = dispatcher(1, ForwardPolicy::default());
        let mut batch = Batch::default();
        batch.accepted_blocks.push_back(block(1));
        batch.applied_transactions.push_back(trace_record(1, "early"));
        d.process_batch(batch);

        assert!(d.gate().is_reached());
        assert!(sink.is_empty());
    }
}
