//! chainrelay-kinesis — [`StreamSink`] backed by AWS Kinesis Data Streams.
//!
//! The relay's consumer is a plain OS thread, so the sink owns a
//! current-thread tokio runtime and blocks on each `PutRecord` call.
//! Credentials come from the standard AWS provider chain.
//!
//! # Example
//! ```no_run
//! use chainrelay_core::StreamSink;
//! use chainrelay_kinesis::KinesisSink;
//!
//! let mut sink = KinesisSink::new();
//! sink.init("chain-events", "ap-northeast-1").unwrap();
//! ```
//!
//! `init`, `send` and `shutdown` must not be called from inside an async
//! runtime.

use aws_config::{BehaviorVersion, Region};
use aws_sdk_kinesis::error::DisplayErrorContext;
use aws_sdk_kinesis::primitives::Blob;
use aws_sdk_kinesis::Client;
use tokio::runtime::Runtime;
use tracing::{debug, info};

use chainrelay_core::{RecordType, SinkError, StreamSink};

struct Connection {
    runtime: Runtime,
    client: Client,
    stream_name: String,
}

/// Kinesis sink. Records are keyed by [`RecordType::as_str`] so each event
/// kind stays ordered within one shard.
#[derive(Default)]
pub struct KinesisSink {
    connection: Option<Connection>,
}

impl KinesisSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_initialized(&self) -> bool {
        self.connection.is_some()
    }
}

impl StreamSink for KinesisSink {
    fn init(&mut self, stream_name: &str, region: &str) -> Result<(), SinkError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| SinkError::Init(format!("tokio runtime: {e}")))?;

        let config = runtime.block_on(
            aws_config::defaults(BehaviorVersion::latest())
                .region(Region::new(region.to_string()))
                .load(),
        );
        let client = Client::new(&config);

        info!(stream = stream_name, region, "kinesis client ready");
        self.connection = Some(Connection {
            runtime,
            client,
            stream_name: stream_name.to_string(),
        });
        Ok(())
    }

    fn send(&mut self, record_type: RecordType, payload: &[u8]) -> Result<(), SinkError> {
        let conn = self.connection.as_ref().ok_or(SinkError::NotInitialized)?;

        let request = conn
            .client
            .put_record()
            .stream_name(&conn.stream_name)
            .partition_key(record_type.as_str())
            .data(Blob::new(payload))
            .send();

        let output = conn.runtime.block_on(request).map_err(|e| SinkError::Send {
            stream: conn.stream_name.clone(),
            reason: DisplayErrorContext(&e).to_string(),
        })?;

        debug!(
            record_type = %record_type,
            shard = output.shard_id(),
            sequence = output.sequence_number(),
            bytes = payload.len(),
            "put record"
        );
        Ok(())
    }

    fn shutdown(&mut self) -> Result<(), SinkError> {
        if let Some(conn) = self.connection.take() {
            let Connection {
                runtime,
                client,
                stream_name,
            } = conn;
            drop(client);
            // does not block
            runtime.shutdown_background();
            info!(stream = %stream_name, "kinesis client released");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_before_init_is_rejected() {
        let mut sink = KinesisSink::new();
        let err = sink.send(RecordType::AppliedTransaction, b"{}").unwrap_err();
        assert!(matches!(err, SinkError::NotInitialized));
    }

    #[test]
    fn shutdown_without_init_is_a_no_op() {
        let mut sink = KinesisSink::new();
        sink.shutdown().unwrap();
        sink.shutdown().unwrap();
        assert!(!sink.is_initialized());
    }

    #[test]
    fn partition_keys_are_distinct_per_record_type() {
        let keys: std::collections::HashSet<&str> = (1..=4)
            .filter_map(RecordType::from_code)
            .map(RecordType::as_str)
            .collect();
        assert_eq!(keys.len(), 4);
        // Kinesis limit
        assert!(keys.iter().all(|k| !k.is_empty() && k.len() <= 256));
    }
}
