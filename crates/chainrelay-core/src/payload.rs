//! JSON payloads handed to the stream sink.
//!
//! `block_time` is always microseconds since the Unix epoch.

use serde::Serialize;

use crate::error::RelayError;
use crate::types::{BlockState, TransactionMetadata, TransactionTrace, TransactionTraceRecord};

#[derive(Serialize)]
struct AppliedTransactionPayload<'a> {
    block_number: u64,
    block_time: i64,
    trace: &'a TransactionTrace,
}

#[derive(Serialize)]
struct AcceptedTransactionPayload<'a> {
    trx: &'a TransactionMetadata,
}

#[derive(Serialize)]
struct BlockPayload<'a> {
    block_num: u32,
    block_id: &'a str,
    previous: &'a str,
    block_time: i64,
    producer: &'a str,
    tx_count: u32,
    irreversible: bool,
}

/// `{"block_number":N,"block_time":µs,"trace":{...}}`
pub fn applied_transaction(record: &TransactionTraceRecord) -> Result<Vec<u8>, RelayError> {
    let payload = AppliedTransactionPayload {
        block_number: record.block_number,
        block_time: record.block_time.timestamp_micros(),
        trace: &record.trace,
    };
    Ok(serde_json::to_vec(&payload)?)
}

pub fn accepted_transaction(trx: &TransactionMetadata) -> Result<Vec<u8>, RelayError> {
    Ok(serde_json::to_vec(&AcceptedTransactionPayload { trx })?)
}

pub fn block(block: &BlockState, irreversible: bool) -> Result<Vec<u8>, RelayError> {
    let payload = BlockPayload {
        block_num: block.block_num,
        block_id: &block.id,
        previous: &block.previous,
        block_time: block.timestamp.timestamp_micros(),
        producer: &block.producer,
        tx_count: block.tx_count,
        irreversible,
    };
    Ok(serde_json::to_vec(&payload)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::sync::Arc;

    #[test]
    fn applied_transaction_shape() {
        let record = TransactionTraceRecord {
            block_number: 11,
            block_time: Utc.timestamp_opt(1_600_000_000, 500_000_000).unwrap(),
            trace: Arc::new(TransactionTrace {
                id: "ab12".into(),
                status: "executed".into(),
                elapsed_us: 321,
                net_usage: 128,
                scheduled: false,
                action_traces: vec![serde_json::json!({"act": "transfer"})],
                except: None,
            }),
        };

        let bytes = applied_transaction(&record).unwrap();
        let v: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(v["block_number"], 11);
        assert_eq!(v["block_time"], 1_600_000_000_500_000i64);
        assert_eq!(v["trace"]["id"], "ab12");
        assert_eq!(v["trace"]["action_traces"][0]["act"], "transfer");
        assert!(v["trace"].get("except").is_none());
        // field order is part of the wire format
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.starts_with(r#"{"block_number":11,"block_time":"#));
    }

    #[test]
    fn block_payload_carries_finality() {
        let b = BlockState {
            block_num: 7,
            id: "07".into(),
            previous: "06".into(),
            timestamp: Utc.timestamp_opt(10, 0).unwrap(),
            producer: "bp".into(),
            tx_count: 3,
        };
        let v: serde_json::Value = serde_json::from_slice(&block(&b, true).unwrap()).unwrap();
        assert_eq!(v["block_num"], 7);
        assert_eq!(v["block_time"], 10_000_000);
        assert_eq!(v["irreversible"], true);
    }
}
