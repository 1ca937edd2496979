// crates/sdlc-loop-core/src/core/webhook.rs
// ============================================================================
// Module: SDLC Loop Webhook Claim Ledger
// Description: Webhook delivery row shape.
// Purpose: Model exactly-once admission bookkeeping for inbound deliveries.
// Dependencies: crate::core::time, serde
// ============================================================================

//! ## Overview
//! Every external delivery is admitted exactly once through a claim row with
//! a fixed TTL. See [`crate::runtime::webhook_claim`] for the claim/complete/
//! release algorithm.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::DeliveryId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Webhook Delivery Row
// ============================================================================

/// Persisted claim row for one inbound webhook/daemon delivery.
///
/// # Invariants
/// - `delivery_id` is unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookDeliveryRow {
    /// Delivery identifier assigned by the sending platform.
    pub delivery_id: DeliveryId,
    /// Token identifying the worker holding the current claim.
    pub claimant_token: String,
    /// Expiry of the current claim.
    pub claim_expires_at: Timestamp,
    /// Timestamp the delivery was marked complete, if complete.
    pub completed_at: Option<Timestamp>,
    /// The webhook/daemon event type delivered.
    pub event_type: String,
    /// Timestamp this row was first created.
    pub created_at: Timestamp,
}
