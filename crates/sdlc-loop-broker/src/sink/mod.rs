// crates/sdlc-loop-broker/src/sink/mod.rs
// ============================================================================
// Module: SDLC Loop Broker Sinks
// Description: Sink trait and reference implementations for outbox action
// delivery.
// Purpose: Deliver a resolved outbox dispatch payload to one concrete
// external surface and return a receipt for the outbox worker to record.
// Dependencies: sdlc-loop-core, thiserror, std
// ============================================================================

//! ## Overview
//! A [`Sink`] delivers one resolved [`crate::payload::OutboxDispatchPayload`]
//! and returns a [`SinkReceipt`] on success. Implementations must fail
//! closed: a delivery that did not observably succeed must return
//! [`SinkError`] rather than a receipt, since the outbox's retry/backoff
//! policy depends on being told the truth about what happened.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use sdlc_loop_core::core::outbox::ActionType;
use sdlc_loop_core::core::time::Timestamp;
use thiserror::Error;

use crate::payload::OutboxDispatchPayload;

// ============================================================================
// SECTION: Sink Errors
// ============================================================================

/// Errors emitted by broker sinks.
///
/// # Invariants
/// - Variants are stable for programmatic handling; callers classify
///   [`SinkError::DeliveryFailed`] against the outbox's `retriable` flag
///   themselves (this crate does not decide retriability).
#[derive(Debug, Error)]
pub enum SinkError {
    /// Delivery to the external surface failed.
    #[error("sink delivery failed: {0}")]
    DeliveryFailed(String),
    /// A log-backed sink failed to write its record.
    #[error("log write failed: {0}")]
    LogWriteFailed(String),
}

// ============================================================================
// SECTION: Sink Trait
// ============================================================================

/// Delivers one resolved outbox dispatch payload.
pub trait Sink: Send + Sync {
    /// Delivers `payload`, returning a receipt the outbox worker records
    /// alongside the claimed row.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] when delivery does not observably succeed.
    fn deliver(&self, payload: &OutboxDispatchPayload, now: Timestamp) -> Result<SinkReceipt, SinkError>;
}

// ============================================================================
// SECTION: Receipt
// ============================================================================

/// Receipt confirming a sink accepted a dispatch payload for delivery.
///
/// # Invariants
/// - `dispatch_id` is unique per [`ReceiptFactory`] instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkReceipt {
    /// Deterministic, sink-scoped dispatch identifier.
    pub dispatch_id: String,
    /// Action type the receipt corresponds to.
    pub action_type: ActionType,
    /// Time the sink accepted the dispatch.
    pub dispatched_at: Timestamp,
}

/// Builds deterministic dispatch receipts for one sink instance.
#[derive(Debug)]
pub(crate) struct ReceiptFactory {
    /// Dispatcher identifier embedded in receipt IDs.
    dispatcher: String,
    /// Monotonic counter used for deterministic IDs.
    counter: AtomicU64,
}

impl ReceiptFactory {
    /// Creates a receipt factory with the provided dispatcher name.
    pub(crate) fn new(dispatcher: impl Into<String>) -> Self {
        Self {
            dispatcher: dispatcher.into(),
            counter: AtomicU64::new(0),
        }
    }

    /// Returns the next receipt for `payload`.
    pub(crate) fn next(&self, payload: &OutboxDispatchPayload, now: Timestamp) -> SinkReceipt {
        let seq = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        SinkReceipt {
            dispatch_id: format!("{}-{}-{seq}", self.dispatcher, payload.outbox_id),
            action_type: payload.action_type,
            dispatched_at: now,
        }
    }
}

// ============================================================================
// SECTION: Implementations
// ============================================================================

pub mod callback;
pub mod channel;
pub mod http;
pub mod log;

pub use callback::CallbackSink;
pub use channel::ChannelSink;
pub use channel::DispatchMessage;
pub use http::HttpSink;
pub use http::HttpSinkConfig;
pub use log::LogSink;
