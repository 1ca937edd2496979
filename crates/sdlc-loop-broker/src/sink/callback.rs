// crates/sdlc-loop-broker/src/sink/callback.rs
// ============================================================================
// Module: SDLC Loop Callback Sink
// Description: Callback-based sink for synchronous, caller-supplied
// delivery.
// Purpose: Let a binary wire a concrete GitHub/Linear/telemetry client in
// without this crate depending on any of them directly.
// Dependencies: sdlc-loop-core, std
// ============================================================================

//! ## Overview
//! [`CallbackSink`] invokes a user-supplied closure and returns whatever
//! receipt it produces. This is the seam a caller uses to wire a real
//! GitHub/Linear/object-store client without this crate taking a direct
//! dependency on any of them, matching the "narrow interface" posture
//! `spec.md` requires of every concrete integration.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use sdlc_loop_core::core::time::Timestamp;

use crate::payload::OutboxDispatchPayload;
use crate::sink::Sink;
use crate::sink::SinkError;
use crate::sink::SinkReceipt;

// ============================================================================
// SECTION: Callback Sink
// ============================================================================

/// Handler signature a [`CallbackSink`] invokes per dispatch.
type CallbackHandler = dyn Fn(&OutboxDispatchPayload, Timestamp) -> Result<SinkReceipt, SinkError> + Send + Sync;

/// Callback-based dispatch sink.
#[derive(Clone)]
pub struct CallbackSink {
    /// Handler invoked with the resolved payload.
    handler: Arc<CallbackHandler>,
}

impl CallbackSink {
    /// Creates a callback sink from a handler closure.
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&OutboxDispatchPayload, Timestamp) -> Result<SinkReceipt, SinkError> + Send + Sync + 'static,
    {
        Self {
            handler: Arc::new(handler),
        }
    }
}

impl Sink for CallbackSink {
    fn deliver(&self, payload: &OutboxDispatchPayload, now: Timestamp) -> Result<SinkReceipt, SinkError> {
        (self.handler)(payload, now)
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "test assertions")]

    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering;

    use sdlc_loop_core::core::identifiers::LoopId;
    use sdlc_loop_core::core::identifiers::OutboxId;
    use sdlc_loop_core::core::outbox::ActionType;

    use super::*;
    use crate::payload::DispatchBody;

    fn sample_payload() -> OutboxDispatchPayload {
        OutboxDispatchPayload {
            outbox_id: OutboxId::new("outbox-1"),
            loop_id: LoopId::new("loop-1"),
            action_type: ActionType::EnqueueFixTask,
            body: DispatchBody::FixTask { description: "retry the failing check".to_string() },
        }
    }

    #[test]
    fn invokes_handler_once_per_delivery() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&calls);
        let sink = CallbackSink::new(move |payload, now| {
            counted.fetch_add(1, Ordering::SeqCst);
            Ok(SinkReceipt { dispatch_id: "cb-1".to_string(), action_type: payload.action_type, dispatched_at: now })
        });
        let receipt = sink.deliver(&sample_payload(), Timestamp::from_unix_millis(7)).unwrap();
        assert_eq!(receipt.dispatch_id, "cb-1");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn propagates_handler_failure() {
        let sink = CallbackSink::new(|_, _| Err(SinkError::DeliveryFailed("boom".to_string())));
        let err = sink.deliver(&sample_payload(), Timestamp::from_unix_millis(0)).unwrap_err();
        assert!(matches!(err, SinkError::DeliveryFailed(message) if message == "boom"));
    }
}
