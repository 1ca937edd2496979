// crates/sdlc-loop-broker/src/lib.rs
// ============================================================================
// Module: SDLC Loop Broker Library
// Description: Reference outbox sinks and composite dispatcher for the SDLC
// Loop Controller.
// Purpose: Resolve a claimed outbox row into a typed dispatch payload and
// deliver it through the sink registered for its action type.
// Dependencies: sdlc-loop-core, reqwest, serde_json, thiserror, url
// ============================================================================

//! ## Overview
//! `sdlc-loop-broker` provides ready-made [`Sink`] implementations plus the
//! [`CompositeBroker`] dispatcher that wires them to outbox action types.
//!
//! Invariants:
//! - A dispatch payload is resolved and schema-validated before any sink
//!   sees it.
//! - Sinks return receipts only on observably successful delivery.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod broker;
pub mod follow_up;
pub mod payload;
pub mod sink;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use broker::BrokerError;
pub use broker::CompositeBroker;
pub use broker::CompositeBrokerBuilder;
pub use follow_up::CallbackFollowUpRouter;
pub use follow_up::ChannelFollowUpRouter;
pub use follow_up::FollowUpMessage;
pub use payload::DispatchBody;
pub use payload::OutboxDispatchPayload;
pub use payload::PayloadError;
pub use sink::CallbackSink;
pub use sink::ChannelSink;
pub use sink::DispatchMessage;
pub use sink::HttpSink;
pub use sink::HttpSinkConfig;
pub use sink::LogSink;
pub use sink::Sink;
pub use sink::SinkError;
pub use sink::SinkReceipt;
