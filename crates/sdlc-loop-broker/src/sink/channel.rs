// crates/sdlc-loop-broker/src/sink/channel.rs
// ============================================================================
// Module: SDLC Loop Channel Sink
// Description: Channel-based sink for decoupled, asynchronous delivery.
// Purpose: Hand a resolved dispatch payload to a `std::sync::mpsc` receiver
// running on a separate worker thread.
// Dependencies: sdlc-loop-core, std
// ============================================================================

//! ## Overview
//! [`ChannelSink`] delivers payloads by sending [`DispatchMessage`] values
//! into a bounded-or-unbounded `std::sync::mpsc::Sender`. This lets a
//! caller's outbox worker stay synchronous while fanning delivery out to a
//! separate publication thread, the way the rest of this workspace avoids a
//! hard dependency on an async runtime.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::mpsc::SendError;
use std::sync::mpsc::Sender;

use sdlc_loop_core::core::time::Timestamp;

use crate::payload::OutboxDispatchPayload;
use crate::sink::ReceiptFactory;
use crate::sink::Sink;
use crate::sink::SinkError;
use crate::sink::SinkReceipt;

// ============================================================================
// SECTION: Dispatch Message
// ============================================================================

/// Message handed to a channel receiver for one delivered dispatch.
///
/// # Invariants
/// - `receipt` corresponds to `payload`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchMessage {
    /// Resolved dispatch payload.
    pub payload: OutboxDispatchPayload,
    /// Receipt issued for this delivery.
    pub receipt: SinkReceipt,
}

// ============================================================================
// SECTION: Channel Sink
// ============================================================================

/// Channel-based dispatch sink.
///
/// # Invariants
/// - Each successful delivery sends exactly one [`DispatchMessage`].
pub struct ChannelSink {
    /// Sender used to hand off dispatch messages.
    sender: Sender<DispatchMessage>,
    /// Receipt factory for deterministic dispatch IDs.
    receipts: ReceiptFactory,
}

impl ChannelSink {
    /// Creates a channel sink with the default dispatcher name.
    #[must_use]
    pub fn new(sender: Sender<DispatchMessage>) -> Self {
        Self {
            sender,
            receipts: ReceiptFactory::new("channel"),
        }
    }

    /// Creates a channel sink with a custom dispatcher name.
    #[must_use]
    pub fn with_dispatcher(sender: Sender<DispatchMessage>, dispatcher: impl Into<String>) -> Self {
        Self {
            sender,
            receipts: ReceiptFactory::new(dispatcher),
        }
    }
}

impl Sink for ChannelSink {
    fn deliver(&self, payload: &OutboxDispatchPayload, now: Timestamp) -> Result<SinkReceipt, SinkError> {
        let receipt = self.receipts.next(payload, now);
        let message = DispatchMessage {
            payload: payload.clone(),
            receipt: receipt.clone(),
        };
        self.sender
            .send(message)
            .map_err(|SendError(message)| SinkError::DeliveryFailed(format!("receiver dropped: {:?}", message.receipt)))?;
        Ok(receipt)
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "test assertions")]

    use std::sync::mpsc::channel;

    use sdlc_loop_core::core::identifiers::LoopId;
    use sdlc_loop_core::core::identifiers::OutboxId;
    use sdlc_loop_core::core::outbox::ActionType;

    use super::*;
    use crate::payload::DispatchBody;

    fn sample_payload() -> OutboxDispatchPayload {
        OutboxDispatchPayload {
            outbox_id: OutboxId::new("outbox-1"),
            loop_id: LoopId::new("loop-1"),
            action_type: ActionType::PublishStatusComment,
            body: DispatchBody::StatusPublication {
                body_markdown: "## status".to_string(),
                existing_external_id: None,
            },
        }
    }

    #[test]
    fn delivers_exactly_one_message() {
        let (tx, rx) = channel();
        let sink = ChannelSink::new(tx);
        let receipt = sink.deliver(&sample_payload(), Timestamp::from_unix_millis(0)).unwrap();
        let received = rx.try_recv().unwrap();
        assert_eq!(received.receipt, receipt);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn dropped_receiver_fails_delivery() {
        let (tx, rx) = channel();
        drop(rx);
        let sink = ChannelSink::with_dispatcher(tx, "test");
        let err = sink.deliver(&sample_payload(), Timestamp::from_unix_millis(0)).unwrap_err();
        assert!(matches!(err, SinkError::DeliveryFailed(_)));
    }
}
