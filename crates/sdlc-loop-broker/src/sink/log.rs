// crates/sdlc-loop-broker/src/sink/log.rs
// ============================================================================
// Module: SDLC Loop Log Sink
// Description: Log-only sink for audit-grade dispatch records.
// Purpose: Record each dispatch without delivering it to an external
// surface; useful for dry runs and for loops whose caller has not wired a
// real publication backend.
// Dependencies: serde_json, std
// ============================================================================

//! ## Overview
//! `LogSink` writes one JSON record per dispatch to any `Write` and returns
//! the receipt. It never fails on the content of the payload itself, only
//! on the underlying writer.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::sync::Mutex;

use sdlc_loop_core::core::time::Timestamp;
use serde_json::json;

use crate::payload::OutboxDispatchPayload;
use crate::sink::ReceiptFactory;
use crate::sink::Sink;
use crate::sink::SinkError;
use crate::sink::SinkReceipt;

// ============================================================================
// SECTION: Log Sink
// ============================================================================

/// Log-only dispatch sink.
pub struct LogSink<W: Write + Send> {
    /// Output writer for dispatch records.
    writer: Mutex<W>,
    /// Receipt factory for deterministic dispatch IDs.
    receipts: ReceiptFactory,
}

impl<W: Write + Send> LogSink<W> {
    /// Creates a log sink with the default dispatcher name.
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
            receipts: ReceiptFactory::new("log"),
        }
    }

    /// Creates a log sink with a custom dispatcher name.
    pub fn with_dispatcher(writer: W, dispatcher: impl Into<String>) -> Self {
        Self {
            writer: Mutex::new(writer),
            receipts: ReceiptFactory::new(dispatcher),
        }
    }
}

impl<W: Write + Send> Sink for LogSink<W> {
    fn deliver(&self, payload: &OutboxDispatchPayload, now: Timestamp) -> Result<SinkReceipt, SinkError> {
        let receipt = self.receipts.next(payload, now);
        let record = json!({
            "dispatch_id": receipt.dispatch_id,
            "loop_id": payload.loop_id.as_str(),
            "outbox_id": payload.outbox_id.as_str(),
            "action_type": receipt.action_type,
            "body": format!("{:?}", payload.body),
            "dispatched_at": receipt.dispatched_at,
        });
        let mut guard = self
            .writer
            .lock()
            .map_err(|_| SinkError::LogWriteFailed("log writer mutex poisoned".to_string()))?;
        serde_json::to_writer(&mut *guard, &record).map_err(|err| SinkError::LogWriteFailed(err.to_string()))?;
        guard.write_all(b"\n").map_err(|err| SinkError::LogWriteFailed(err.to_string()))?;
        drop(guard);
        Ok(receipt)
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "test assertions")]

    use std::sync::Arc;
    use std::sync::Mutex;

    use sdlc_loop_core::core::identifiers::LoopId;
    use sdlc_loop_core::core::identifiers::OutboxId;
    use sdlc_loop_core::core::outbox::ActionType;
    use serde_json::from_slice;

    use super::*;
    use crate::payload::DispatchBody;

    fn sample_payload() -> OutboxDispatchPayload {
        OutboxDispatchPayload {
            outbox_id: OutboxId::new("outbox-1"),
            loop_id: LoopId::new("loop-1"),
            action_type: ActionType::EmitTelemetry,
            body: DispatchBody::Telemetry {
                event_name: "loop.transitioned".to_string(),
                attributes: serde_json::Value::Null,
            },
        }
    }

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().map_err(|_| std::io::Error::other("poisoned"))?.write(buf)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn writes_one_json_record_per_dispatch() {
        let buffer = SharedBuffer::default();
        let sink = LogSink::with_dispatcher(buffer.clone(), "test-dispatcher");
        let receipt = sink.deliver(&sample_payload(), Timestamp::from_unix_millis(42)).unwrap();
        assert_eq!(receipt.action_type, ActionType::EmitTelemetry);

        let written = buffer.0.lock().unwrap().clone();
        assert_eq!(written.iter().filter(|&&b| b == b'\n').count(), 1);
        let parsed: serde_json::Value = from_slice(&written[..written.len() - 1]).unwrap();
        assert_eq!(parsed["action_type"], "emit_telemetry");
        assert_eq!(parsed["loop_id"], "loop-1");
    }

    #[test]
    fn dispatch_ids_are_unique_and_sequential() {
        let sink = LogSink::new(Vec::<u8>::new());
        let first = sink.deliver(&sample_payload(), Timestamp::from_unix_millis(0)).unwrap();
        let second = sink.deliver(&sample_payload(), Timestamp::from_unix_millis(1)).unwrap();
        assert_ne!(first.dispatch_id, second.dispatch_id);
    }
}
