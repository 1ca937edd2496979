// crates/sdlc-loop-core/src/runtime/cause.rs
// ============================================================================
// Module: SDLC Loop Canonical Cause Construction
// Description: Deterministic cause-identifier derivation from external
// signal input.
// Purpose: Give every external event instance a stable, collision-free
// identity before it enters the signal inbox.
// Dependencies: crate::core::{identifiers, signal}
// ============================================================================

//! ## Overview
//! Exhaustiveness over the cause set is enforced at construction time: a
//! caller must build a [`SignalInput`] variant, and [`CanonicalCause::from_signal`]
//! matches it exhaustively, so there is no runtime "unknown cause" branch to
//! fail loudly from — the compiler rejects an unmatched variant instead.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::core::identifiers::CanonicalCauseId;
use crate::core::identifiers::HeadSha;
use crate::core::signal::CAUSE_IDENTITY_VERSION;
use crate::core::signal::CauseType;

// ============================================================================
// SECTION: Signal Input
// ============================================================================

/// One external event instance, carrying exactly the fields its cause
/// encoding needs.
///
/// # Invariants
/// - One variant per row of the canonical-cause encoding table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalInput {
    /// A sandbox daemon terminal event.
    DaemonTerminal {
        /// Daemon-assigned event identifier.
        event_id: String,
    },
    /// A GitHub `check_run.completed` webhook.
    CheckRunCompleted {
        /// Webhook delivery identifier.
        delivery_id: String,
        /// GitHub check-run identifier.
        check_run_id: String,
    },
    /// A GitHub `check_suite.completed` webhook.
    CheckSuiteCompleted {
        /// Webhook delivery identifier.
        delivery_id: String,
        /// GitHub check-suite identifier.
        check_suite_id: String,
    },
    /// A GitHub `pull_request.synchronize` webhook.
    PullRequestSynchronize {
        /// Webhook delivery identifier.
        delivery_id: String,
        /// GitHub pull request identifier.
        pull_request_id: String,
        /// New head SHA after the push.
        head_sha: String,
    },
    /// A GitHub `pull_request.closed` webhook.
    PullRequestClosed {
        /// Webhook delivery identifier.
        delivery_id: String,
        /// GitHub pull request identifier.
        pull_request_id: String,
        /// Whether the PR was merged when closed.
        merged: bool,
    },
    /// A GitHub `pull_request.reopened` webhook.
    PullRequestReopened {
        /// Webhook delivery identifier.
        delivery_id: String,
        /// GitHub pull request identifier.
        pull_request_id: String,
    },
    /// A GitHub `pull_request.edited` webhook.
    PullRequestEdited {
        /// Webhook delivery identifier.
        delivery_id: String,
        /// GitHub pull request identifier.
        pull_request_id: String,
    },
    /// A GitHub `pull_request_review` webhook.
    PullRequestReview {
        /// Webhook delivery identifier.
        delivery_id: String,
        /// GitHub review identifier.
        review_id: String,
        /// Review state (e.g. `"approved"`, `"changes_requested"`).
        review_state: String,
    },
    /// A GitHub `pull_request_review_comment` webhook.
    PullRequestReviewComment {
        /// Webhook delivery identifier.
        delivery_id: String,
        /// GitHub comment identifier.
        comment_id: String,
    },
    /// A synthetic signal produced by polling for unresolved review threads.
    ReviewThreadPollSynthetic {
        /// Owning loop identifier.
        loop_id: String,
        /// Poll window start, RFC 3339.
        poll_window_start_iso: String,
        /// Poll window end, RFC 3339.
        poll_window_end_iso: String,
        /// Sequence number of this poll within the loop.
        poll_sequence: u64,
    },
}

impl SignalInput {
    /// Returns the cause type this input derives.
    #[must_use]
    pub const fn cause_type(&self) -> CauseType {
        match self {
            Self::DaemonTerminal { .. } => CauseType::DaemonTerminal,
            Self::CheckRunCompleted { .. } => CauseType::CheckRunCompleted,
            Self::CheckSuiteCompleted { .. } => CauseType::CheckSuiteCompleted,
            Self::PullRequestSynchronize { .. } => CauseType::PullRequestSynchronize,
            Self::PullRequestClosed { .. } => CauseType::PullRequestClosed,
            Self::PullRequestReopened { .. } => CauseType::PullRequestReopened,
            Self::PullRequestEdited { .. } => CauseType::PullRequestEdited,
            Self::PullRequestReview { .. } => CauseType::PullRequestReview,
            Self::PullRequestReviewComment { .. } => CauseType::PullRequestReviewComment,
            Self::ReviewThreadPollSynthetic { .. } => CauseType::ReviewThreadPollSynthetic,
        }
    }
}

// ============================================================================
// SECTION: Canonical Cause
// ============================================================================

/// A deterministic `(causeType, canonicalCauseId)` pair identifying one
/// external event instance.
///
/// # Invariants
/// - `canonical_cause_id` is collision-free across the cause set for
///   distinct `SignalInput` values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalCause {
    /// The external event kind this cause derives from.
    pub cause_type: CauseType,
    /// Deterministic, collision-free identifier for this event instance.
    pub canonical_cause_id: CanonicalCauseId,
    /// Head SHA carried by the signal, when the signal establishes one.
    pub signal_head_sha: Option<HeadSha>,
    /// Version of the cause-identity derivation that produced this value.
    pub cause_identity_version: u32,
}

impl CanonicalCause {
    /// Derives the canonical cause for a signal input.
    #[must_use]
    pub fn from_signal(input: &SignalInput) -> Self {
        let cause_type = input.cause_type();
        let (canonical_cause_id, signal_head_sha) = match input {
            SignalInput::DaemonTerminal { event_id } => (event_id.clone(), None),
            SignalInput::CheckRunCompleted {
                delivery_id,
                check_run_id,
            } => (format!("{delivery_id}:{check_run_id}"), None),
            SignalInput::CheckSuiteCompleted {
                delivery_id,
                check_suite_id,
            } => (format!("{delivery_id}:{check_suite_id}"), None),
            SignalInput::PullRequestSynchronize {
                delivery_id,
                pull_request_id,
                head_sha,
            } => (
                format!("{delivery_id}:{pull_request_id}:{head_sha}"),
                Some(HeadSha::new(head_sha.clone())),
            ),
            SignalInput::PullRequestClosed {
                delivery_id,
                pull_request_id,
                merged,
            } => {
                let merged_tag = if *merged { "merged" } else { "unmerged" };
                (
                    format!("{delivery_id}:{pull_request_id}:closed:{merged_tag}"),
                    None,
                )
            }
            SignalInput::PullRequestReopened {
                delivery_id,
                pull_request_id,
            } => (format!("{delivery_id}:{pull_request_id}:reopened"), None),
            SignalInput::PullRequestEdited {
                delivery_id,
                pull_request_id,
            } => (format!("{delivery_id}:{pull_request_id}:edited"), None),
            SignalInput::PullRequestReview {
                delivery_id,
                review_id,
                review_state,
            } => (format!("{delivery_id}:{review_id}:{review_state}"), None),
            SignalInput::PullRequestReviewComment {
                delivery_id,
                comment_id,
            } => (format!("{delivery_id}:{comment_id}"), None),
            SignalInput::ReviewThreadPollSynthetic {
                loop_id,
                poll_window_start_iso,
                poll_window_end_iso,
                poll_sequence,
            } => (
                format!(
                    "{loop_id}:{poll_window_start_iso}:{poll_window_end_iso}:{poll_sequence}"
                ),
                None,
            ),
        };

        Self {
            cause_type,
            canonical_cause_id: CanonicalCauseId::new(canonical_cause_id),
            signal_head_sha,
            cause_identity_version: CAUSE_IDENTITY_VERSION,
        }
    }
}
