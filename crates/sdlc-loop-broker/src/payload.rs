// crates/sdlc-loop-broker/src/payload.rs
// ============================================================================
// Module: SDLC Loop Broker Payload
// Description: Typed dispatch payloads resolved from outbox row JSON.
// Purpose: Carry the shape a sink needs for one outbox action, validated
// against the action type's fixed schema before any sink sees it.
// Dependencies: sdlc-loop-core, serde_json
// ============================================================================

//! ## Overview
//! An outbox row carries an opaque `payload` JSON column; this module
//! resolves that column, per [`ActionType`], into a typed [`DispatchBody`]
//! a sink can render without re-deriving the field shape at every call site.
//! Fields the JSON omits fail closed rather than silently defaulting, since
//! a malformed payload otherwise surfaces as a confusing sink-level error.

// ============================================================================
// SECTION: Imports
// ============================================================================

use sdlc_loop_core::core::identifiers::LoopId;
use sdlc_loop_core::core::identifiers::OutboxId;
use sdlc_loop_core::core::outbox::ActionType;
use sdlc_loop_core::core::outbox::OutboxRow;
use serde_json::Value;
use thiserror::Error;

// ============================================================================
// SECTION: Payload Errors
// ============================================================================

/// Errors resolving an outbox row's payload column into a typed dispatch
/// body.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum PayloadError {
    /// The payload JSON was missing a field the action type's schema
    /// requires.
    #[error("outbox payload for {action_type:?} missing required field {field}")]
    MissingField {
        /// Action type whose schema was violated.
        action_type: ActionType,
        /// Name of the missing field.
        field: &'static str,
    },
}

// ============================================================================
// SECTION: Dispatch Body
// ============================================================================

/// Rendered content a sink delivers for one outbox action.
///
/// # Invariants
/// - Each variant corresponds to exactly one [`ActionType`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchBody {
    /// A status comment or check-summary publication.
    ///
    /// Both [`ActionType::PublishStatusComment`] and
    /// [`ActionType::PublishCheckSummary`] share this shape; they differ
    /// only in which external surface the sink renders to.
    StatusPublication {
        /// Markdown body to publish.
        body_markdown: String,
        /// External identifier of a comment/check-run to update in place,
        /// if one already exists.
        existing_external_id: Option<String>,
    },
    /// A follow-up fix task to enqueue for the agent.
    FixTask {
        /// Plain-text task description (already escaped, if derived from
        /// untrusted external content).
        description: String,
    },
    /// A link to a captured UI-testing video.
    VideoLink {
        /// Object-store key of the captured artifact.
        artifact_key: String,
        /// Human-readable caption to accompany the link.
        caption: Option<String>,
    },
    /// A telemetry event.
    Telemetry {
        /// Event name.
        event_name: String,
        /// Arbitrary structured attributes.
        attributes: Value,
    },
}

/// Resolved dispatch payload for one outbox row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboxDispatchPayload {
    /// Owning outbox row.
    pub outbox_id: OutboxId,
    /// Owning loop.
    pub loop_id: LoopId,
    /// Kind of side effect this payload carries.
    pub action_type: ActionType,
    /// Rendered content.
    pub body: DispatchBody,
}

// ============================================================================
// SECTION: Resolution
// ============================================================================

/// Resolves `row.payload` into a typed [`OutboxDispatchPayload`] for
/// `row.action_type`.
///
/// # Errors
///
/// Returns [`PayloadError::MissingField`] when the payload JSON omits a
/// field the action type's fixed schema requires. Unknown extra fields are
/// tolerated and ignored, per the JSON-column shape policy.
pub fn resolve_dispatch_payload(row: &OutboxRow) -> Result<OutboxDispatchPayload, PayloadError> {
    let body = match row.action_type {
        ActionType::PublishStatusComment | ActionType::PublishCheckSummary => {
            resolve_status_publication(row.action_type, &row.payload)?
        }
        ActionType::EnqueueFixTask => resolve_fix_task(&row.payload)?,
        ActionType::PublishVideoLink => resolve_video_link(&row.payload)?,
        ActionType::EmitTelemetry => resolve_telemetry(&row.payload)?,
    };
    Ok(OutboxDispatchPayload {
        outbox_id: row.outbox_id.clone(),
        loop_id: row.loop_id.clone(),
        action_type: row.action_type,
        body,
    })
}

fn required_str(
    payload: &Value,
    action_type: ActionType,
    field: &'static str,
) -> Result<String, PayloadError> {
    payload
        .get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or(PayloadError::MissingField { action_type, field })
}

fn optional_str(payload: &Value, field: &str) -> Option<String> {
    payload.get(field).and_then(Value::as_str).map(str::to_string)
}

fn resolve_status_publication(action_type: ActionType, payload: &Value) -> Result<DispatchBody, PayloadError> {
    Ok(DispatchBody::StatusPublication {
        body_markdown: required_str(payload, action_type, "bodyMarkdown")?,
        existing_external_id: optional_str(payload, "existingExternalId"),
    })
}

fn resolve_fix_task(payload: &Value) -> Result<DispatchBody, PayloadError> {
    Ok(DispatchBody::FixTask {
        description: required_str(payload, ActionType::EnqueueFixTask, "description")?,
    })
}

fn resolve_video_link(payload: &Value) -> Result<DispatchBody, PayloadError> {
    Ok(DispatchBody::VideoLink {
        artifact_key: required_str(payload, ActionType::PublishVideoLink, "artifactKey")?,
        caption: optional_str(payload, "caption"),
    })
}

fn resolve_telemetry(payload: &Value) -> Result<DispatchBody, PayloadError> {
    Ok(DispatchBody::Telemetry {
        event_name: required_str(payload, ActionType::EmitTelemetry, "eventName")?,
        attributes: payload.get("attributes").cloned().unwrap_or(Value::Null),
    })
}

// ============================================================================
// SECTION: Tests
// ============================================================================
