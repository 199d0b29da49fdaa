//! Shared types for the relay pipeline.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ─── Host-owned handles ───────────────────────────────────────────────────────

/// A transaction as accepted by the chain engine, before execution.
///
/// Handed to the relay as `Arc<TransactionMetadata>`; the host keeps its own
/// reference and the queue never copies the transaction body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionMetadata {
    /// Transaction id (hex).
    pub id: String,
    /// Whether the engine accepted the transaction into the pending block.
    pub accepted: bool,
    /// Engine-generated (onblock-style) transaction.
    pub implicit: bool,
    /// Deferred / scheduled transaction.
    pub scheduled: bool,
    /// The packed transaction, opaque to the relay.
    pub packed_trx: serde_json::Value,
}

/// Execution trace of an applied transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionTrace {
    /// Transaction id (hex).
    pub id: String,
    /// Receipt status (`"executed"`, `"soft_fail"`, ...).
    pub status: String,
    pub elapsed_us: i64,
    pub net_usage: u64,
    pub scheduled: bool,
    /// Action traces, opaque to the relay.
    pub action_traces: Vec<serde_json::Value>,
    /// Exception text if execution failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub except: Option<String>,
}

/// A candidate or irreversible block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockState {
    pub block_num: u32,
    /// Block id (hex).
    pub id: String,
    /// Parent block id (hex).
    pub previous: String,
    pub timestamp: DateTime<Utc>,
    pub producer: String,
    pub tx_count: u32,
}

/// The block the engine is currently building.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingBlock {
    pub block_num: u32,
    pub block_time: DateTime<Utc>,
}

// ─── TransactionTraceRecord ───────────────────────────────────────────────────

/// An applied-transaction trace, stamped with the pending block it ran in.
///
/// Built at intake time, so `block_number` / `block_time` describe a block
/// that is not yet final.
#[derive(Debug, Clone)]
pub struct TransactionTraceRecord {
    pub block_number: u64,
    pub block_time: DateTime<Utc>,
    pub trace: Arc<TransactionTrace>,
}

impl TransactionTraceRecord {
    pub fn new(pending: PendingBlock, trace: Arc<TransactionTrace>) -> Self {
        Self {
            block_number: u64::from(pending.block_num),
            block_time: pending.block_time,
            trace,
        }
    }
}

// ─── EventKind ────────────────────────────────────────────────────────────────

/// The four event kinds, one queue lane each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    AcceptedTransaction,
    AppliedTransaction,
    AcceptedBlock,
    IrreversibleBlock,
}

impl EventKind {
    /// All kinds, in consumer processing order.
    pub const ALL: [EventKind; 4] = [
        Self::AcceptedTransaction,
        Self::AppliedTransaction,
        Self::AcceptedBlock,
        Self::IrreversibleBlock,
    ];

    /// Lane index (matches processing order).
    pub fn index(self) -> usize {
        match self {
            Self::AcceptedTransaction => 0,
            Self::AppliedTransaction => 1,
            Self::AcceptedBlock => 2,
            Self::IrreversibleBlock => 3,
        }
    }

    /// The record type used when an event of this kind is forwarded.
    pub fn record_type(self) -> RecordType {
        match self {
            Self::AcceptedTransaction => RecordType::AcceptedTransaction,
            Self::AppliedTransaction => RecordType::AppliedTransaction,
            Self::AcceptedBlock => RecordType::AcceptedBlock,
            Self::IrreversibleBlock => RecordType::IrreversibleBlock,
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AcceptedTransaction => write!(f, "accepted_transaction"),
            Self::AppliedTransaction => write!(f, "applied_transaction"),
            Self::AcceptedBlock => write!(f, "accepted_block"),
            Self::IrreversibleBlock => write!(f, "irreversible_block"),
        }
    }
}

// ─── RecordType ───────────────────────────────────────────────────────────────

/// Type code attached to every payload handed to the stream sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum RecordType {
    AppliedTransaction = 1,
    AcceptedTransaction = 2,
    AcceptedBlock = 3,
    IrreversibleBlock = 4,
}

impl RecordType {
    /// Wire code.
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(Self::AppliedTransaction),
            2 => Some(Self::AcceptedTransaction),
            3 => Some(Self::AcceptedBlock),
            4 => Some(Self::IrreversibleBlock),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::AppliedTransaction => "applied_transaction",
            Self::AcceptedTransaction => "accepted_transaction",
            Self::AcceptedBlock => "accepted_block",
            Self::IrreversibleBlock => "irreversible_block",
        }
    }
}

impl std::fmt::Display for RecordType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
