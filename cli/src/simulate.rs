//! `chainrelay simulate` — feed a synthetic chain through the relay.

use std::sync::Arc;

use anyhow::{Context, Result};
use chainrelay_core::{
    BlockState, ChainHost, MemoryHost, MetricsSnapshot, PendingBlock, RelayConfig, RelayPlugin,
    StreamSink, TransactionMetadata, TransactionTrace,
};
use chrono::{DateTime, Duration, Utc};
use tracing::info;

/// Blocks trail the head by this many before they turn irreversible.
const IRREVERSIBLE_LAG: u32 = 2;

/// Half-second block interval.
const BLOCK_INTERVAL_MS: i64 = 500;

pub struct Simulation {
    pub blocks: u32,
    pub txs_per_block: u32,
}

impl Simulation {
    pub fn run(&self, config: RelayConfig, sink: Box<dyn StreamSink>) -> Result<MetricsSnapshot> {
        let memory = MemoryHost::new("cf057bbfb72640471fd910bcb67639c22df9f92470936cddc1ade0e2f2e7dc4f");
        let host: Arc<dyn ChainHost> = Arc::new(memory.clone());

        let plugin = RelayPlugin::initialize(config, Some(host), sink)
            .context("failed to initialise relay plugin")?;
        plugin.startup();

        let genesis = Utc::now();
        info!(blocks = self.blocks, txs_per_block = self.txs_per_block, "simulation start");

        for n in 1..=self.blocks {
            let time = genesis + Duration::milliseconds(i64::from(n) * BLOCK_INTERVAL_MS);
            memory.set_pending_block(Some(PendingBlock {
                block_num: n,
                block_time: time,
            }));

            for i in 0..self.txs_per_block {
                let id = transaction_id(n, i);
                memory.emit_accepted_transaction(Arc::new(metadata(&id)));
                memory.emit_applied_transaction(Arc::new(trace(&id, i)));
            }

            memory.emit_accepted_block(Arc::new(block(n, time, self.txs_per_block)));
            if n > IRREVERSIBLE_LAG {
                let lib = n - IRREVERSIBLE_LAG;
                let lib_time = genesis + Duration::milliseconds(i64::from(lib) * BLOCK_INTERVAL_MS);
                memory.emit_irreversible_block(Arc::new(block(lib, lib_time, self.txs_per_block)));
            }
        }
        memory.set_pending_block(None);

        let metrics = Arc::clone(plugin.metrics());
        plugin.shutdown().context("relay shutdown failed")?;
        Ok(metrics.snapshot())
    }
}

fn transaction_id(block: u32, index: u32) -> String {
    format!("{block:08x}{index:056x}")
}

fn block_id(n: u32) -> String {
    format!("{n:08x}{:056x}", u64::from(n).wrapping_mul(0x9e37_79b9))
}

fn metadata(id: &str) -> TransactionMetadata {
    TransactionMetadata {
        id: id.to_string(),
        accepted: true,
        implicit: false,
        scheduled: false,
        packed_trx: serde_json::json!({
            "compression": "none",
            "packed_trx": id,
        }),
    }
}

fn trace(id: &str, index: u32) -> TransactionTrace {
    TransactionTrace {
        id: id.to_string(),
        status: "executed".into(),
        elapsed_us: 150 + i64::from(index) * 10,
        net_usage: 128,
        scheduled: false,
        action_traces: vec![serde_json::json!({
            "receiver": "eosio.token",
            "act": {
                "account": "eosio.token",
                "name": "transfer",
                "data": { "from": "alice", "to": "bob", "quantity": format!("{}.0000 EOS", index + 1) }
            }
        })],
        except: None,
    }
}

fn block(n: u32, time: DateTime<Utc>, tx_count: u32) -> BlockState {
    BlockState {
        block_num: n,
        id: block_id(n),
        previous: block_id(n.saturating_sub(1)),
        timestamp: time,
        producer: "eosio".into(),
        tx_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainrelay_core::{ForwardPolicy, MemorySink};

    #[test]
    fn simulation_forwards_every_trace_when_ungated() {
        let sink = MemorySink::new();
        let config = RelayConfig {
            start_block: 0,
            ..RelayConfig::default()
        };
        let sim = Simulation {
            blocks: 5,
            txs_per_block: 3,
        };

        let snapshot = sim.run(config, Box::new(sink.clone())).unwrap();

        assert_eq!(snapshot.enqueued_applied_transactions, 15);
        assert_eq!(snapshot.enqueued_accepted_blocks, 5);
        // blocks 1..=3 become irreversible
        assert_eq!(snapshot.enqueued_irreversible_blocks, 3);
        assert_eq!(snapshot.forwarded, 15);
        assert_eq!(sink.len(), 15);
    }

    #[test]
    fn simulation_with_all_kinds_enabled() {
        let sink = MemorySink::new();
        let config = RelayConfig {
            start_block: 0,
            forward: ForwardPolicy::all(),
            ..RelayConfig::default()
        };
        let sim = Simulation {
            blocks: 4,
            txs_per_block: 2,
        };

        let snapshot = sim.run(config, Box::new(sink.clone())).unwrap();
        // 8 accepted + 8 applied + 4 accepted blocks + 2 irreversible
        assert_eq!(snapshot.forwarded, 22);
        assert_eq!(sink.len(), 22);
        assert!(sink.is_shut_down());
    }

    #[test]
    fn ids_are_fixed_width() {
        assert_eq!(transaction_id(7, 1).len(), 64);
        assert_eq!(block_id(123).len(), 64);
    }
}
