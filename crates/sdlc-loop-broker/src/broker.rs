// crates/sdlc-loop-broker/src/broker.rs
// ============================================================================
// Module: SDLC Loop Composite Broker
// Description: Composite dispatcher routing outbox actions to sinks.
// Purpose: Resolve one claimed outbox row into a typed payload and deliver
// it through the sink registered for its action type.
// Dependencies: sdlc-loop-core, std
// ============================================================================

//! ## Overview
//! [`CompositeBroker`] is the seam between the outbox worker and concrete
//! publication backends. It resolves a claimed [`OutboxRow`] with
//! [`resolve_dispatch_payload`], looks up the [`Sink`] registered for the
//! row's [`ActionType`], and returns the sink's receipt. Routing is
//! action-type-keyed rather than URI-scheme-keyed: every outbox row already
//! carries its action type, so there is no content reference to resolve a
//! scheme from.
//!
//! Invariants:
//! - `dispatch` never delivers a row whose payload fails schema validation.
//! - Every configured action type routes to exactly one sink.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use sdlc_loop_core::core::outbox::ActionType;
use sdlc_loop_core::core::outbox::OutboxRow;
use sdlc_loop_core::core::time::Timestamp;
use thiserror::Error;

use crate::payload::OutboxDispatchPayload;
use crate::payload::PayloadError;
use crate::payload::resolve_dispatch_payload;
use crate::sink::Sink;
use crate::sink::SinkError;
use crate::sink::SinkReceipt;

// ============================================================================
// SECTION: Broker Errors
// ============================================================================

/// Errors returned by the composite broker.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// No sink is registered for the row's action type.
    #[error("no sink configured for action type {0:?}")]
    MissingSink(ActionType),
    /// The outbox row's payload column failed schema validation.
    #[error("payload resolution failed: {0}")]
    Payload(#[from] PayloadError),
    /// The resolved sink failed to deliver the payload.
    #[error("sink delivery failed: {0}")]
    Sink(#[from] SinkError),
}

// ============================================================================
// SECTION: Composite Broker
// ============================================================================

/// Builder for a composite broker.
///
/// # Invariants
/// - Later registrations for the same action type overwrite earlier ones.
#[derive(Default)]
pub struct CompositeBrokerBuilder {
    /// Sink registry keyed by action type. A `Vec` suffices: `ActionType`
    /// has a handful of variants and is registered against at most once
    /// each during setup, never on a hot path.
    sinks: Vec<(ActionType, Arc<dyn Sink>)>,
}

impl CompositeBrokerBuilder {
    /// Registers the sink used to deliver `action_type` dispatches.
    #[must_use]
    pub fn sink(mut self, action_type: ActionType, sink: impl Sink + 'static) -> Self {
        self.sinks.retain(|(existing, _)| *existing != action_type);
        self.sinks.push((action_type, Arc::new(sink)));
        self
    }

    /// Registers one sink for every action type in `action_types`.
    #[must_use]
    pub fn sink_for_all(mut self, action_types: &[ActionType], sink: Arc<dyn Sink>) -> Self {
        for action_type in action_types {
            self.sinks.retain(|(existing, _)| existing != action_type);
            self.sinks.push((*action_type, Arc::clone(&sink)));
        }
        self
    }

    /// Builds the composite broker.
    #[must_use]
    pub fn build(self) -> CompositeBroker {
        CompositeBroker { sinks: self.sinks }
    }
}

/// Composite dispatcher routing outbox rows to action-type-keyed sinks.
///
/// # Invariants
/// - Sink registrations are keyed by [`ActionType`]; a row with no matching
///   sink fails closed with [`BrokerError::MissingSink`] rather than
///   silently dropping the dispatch.
pub struct CompositeBroker {
    /// Sink registry keyed by action type.
    sinks: Vec<(ActionType, Arc<dyn Sink>)>,
}

impl CompositeBroker {
    /// Returns a builder for the composite broker.
    #[must_use]
    pub fn builder() -> CompositeBrokerBuilder {
        CompositeBrokerBuilder::default()
    }

    /// Resolves `row` into a typed payload and delivers it through the sink
    /// registered for `row.action_type`.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::Payload`] when the row's payload column fails
    /// schema validation, [`BrokerError::MissingSink`] when no sink is
    /// registered for the row's action type, or [`BrokerError::Sink`] when
    /// the registered sink fails to deliver.
    pub fn dispatch(&self, row: &OutboxRow, now: Timestamp) -> Result<SinkReceipt, BrokerError> {
        let payload = resolve_dispatch_payload(row)?;
        let sink = self
            .sinks
            .iter()
            .find(|(action_type, _)| *action_type == row.action_type)
            .map(|(_, sink)| sink)
            .ok_or(BrokerError::MissingSink(row.action_type))?;
        let receipt = sink.deliver(&payload, now)?;
        Ok(receipt)
    }

    /// Resolves `row`'s payload without delivering it.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::Payload`] when the row's payload column fails
    /// schema validation.
    pub fn resolve(&self, row: &OutboxRow) -> Result<OutboxDispatchPayload, BrokerError> {
        Ok(resolve_dispatch_payload(row)?)
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "test assertions")]

    use sdlc_loop_core::core::identifiers::ActionKey;
    use sdlc_loop_core::core::identifiers::LoopId;
    use sdlc_loop_core::core::identifiers::OutboxId;
    use sdlc_loop_core::core::outbox::OutboxStatus;
    use sdlc_loop_core::core::outbox::SupersessionGroup;
    use serde_json::json;

    use super::*;
    use crate::sink::LogSink;

    fn base_row(action_type: ActionType, payload: serde_json::Value) -> OutboxRow {
        OutboxRow {
            outbox_id: OutboxId::new("outbox-1"),
            loop_id: LoopId::new("loop-1"),
            transition_seq: 1,
            action_type,
            supersession_group: action_type.supersession_group(),
            action_key: ActionKey::new("key-1"),
            payload,
            status: OutboxStatus::Pending,
            attempt_count: 0,
            next_retry_at: None,
            claimed_by: None,
            claimed_at: None,
            completed_at: None,
            last_error_class: None,
            last_error_code: None,
            last_error_message: None,
            superseded_by_outbox_id: None,
            canceled_reason: None,
            created_at: Timestamp::from_unix_millis(0),
        }
    }

    #[test]
    fn dispatches_to_the_registered_sink() {
        let broker = CompositeBroker::builder()
            .sink(ActionType::PublishStatusComment, LogSink::new(Vec::<u8>::new()))
            .build();
        let row = base_row(ActionType::PublishStatusComment, json!({"bodyMarkdown": "## ok"}));
        let receipt = broker.dispatch(&row, Timestamp::from_unix_millis(0)).unwrap();
        assert_eq!(receipt.action_type, ActionType::PublishStatusComment);
    }

    #[test]
    fn missing_sink_fails_closed() {
        let broker = CompositeBroker::builder().build();
        let row = base_row(ActionType::EmitTelemetry, json!({"eventName": "x"}));
        let err = broker.dispatch(&row, Timestamp::from_unix_millis(0)).unwrap_err();
        assert!(matches!(err, BrokerError::MissingSink(ActionType::EmitTelemetry)));
    }

    #[test]
    fn malformed_payload_fails_before_reaching_the_sink() {
        let broker = CompositeBroker::builder()
            .sink(ActionType::PublishVideoLink, LogSink::new(Vec::<u8>::new()))
            .build();
        let row = base_row(ActionType::PublishVideoLink, json!({"caption": "missing key"}));
        let err = broker.dispatch(&row, Timestamp::from_unix_millis(0)).unwrap_err();
        assert!(matches!(err, BrokerError::Payload(PayloadError::MissingField { field: "artifactKey", .. })));
    }

    #[test]
    fn sink_for_all_shares_one_sink_across_action_types() {
        let shared: Arc<dyn Sink> = Arc::new(LogSink::new(Vec::<u8>::new()));
        let broker = CompositeBroker::builder()
            .sink_for_all(&[ActionType::PublishStatusComment, ActionType::PublishCheckSummary], shared)
            .build();
        let comment = base_row(ActionType::PublishStatusComment, json!({"bodyMarkdown": "a"}));
        let summary = base_row(ActionType::PublishCheckSummary, json!({"bodyMarkdown": "b"}));
        assert!(broker.dispatch(&comment, Timestamp::from_unix_millis(0)).is_ok());
        assert!(broker.dispatch(&summary, Timestamp::from_unix_millis(0)).is_ok());
    }
}
