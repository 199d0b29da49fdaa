//! A sink that writes every payload to the log. Used for dry runs.

use chainrelay_core::{RecordType, SinkError, StreamSink};
use tracing::info;

#[derive(Debug, Default)]
pub struct LogSink {
    stream_name: Option<String>,
    sent: u64,
}

impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StreamSink for LogSink {
    fn init(&mut self, stream_name: &str, region: &str) -> Result<(), SinkError> {
        info!(stream = stream_name, region, "log sink ready");
        self.stream_name = Some(stream_name.to_string());
        Ok(())
    }

    fn send(&mut self, record_type: RecordType, payload: &[u8]) -> Result<(), SinkError> {
        let stream = self.stream_name.as_deref().ok_or(SinkError::NotInitialized)?;
        self.sent += 1;
        info!(
            target: "chainrelay::records",
            stream,
            record_type = %record_type,
            code = record_type.code(),
            payload = %String::from_utf8_lossy(payload),
            "record"
        );
        Ok(())
    }

    fn shutdown(&mut self) -> Result<(), SinkError> {
        info!(sent = self.sent, "log sink closed");
        Ok(())
    }
}
