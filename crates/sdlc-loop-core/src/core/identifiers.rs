// crates/sdlc-loop-core/src/core/identifiers.rs
// ============================================================================
// Module: SDLC Loop Identifiers
// Description: Canonical opaque identifiers for loops, users, threads, and
// the external entities a loop coordinates.
// Purpose: Provide strongly typed, serializable identifiers with stable wire
// forms.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! This module defines the canonical identifiers used throughout the SDLC
//! Loop Controller. Identifiers are opaque and serialize as plain strings on
//! the wire; no normalization is applied by these types beyond what the
//! constructor documents.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Macro: opaque string identifier
// ============================================================================

/// Declares an opaque, string-backed identifier newtype with the standard
/// constructor/accessor/`Display`/`From` surface shared by every identifier
/// in this module.
macro_rules! opaque_string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier from any owned-or-borrowed string.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self::new(value)
            }
        }
    };
}

opaque_string_id! {
    /// Loop identifier scoped to a single PR coordination lifecycle.
    ///
    /// # Invariants
    /// - Opaque UTF-8 string; a new [`LoopId`] is minted per enrollment, never
    ///   reused once the owning loop reaches a terminal state.
    LoopId
}

opaque_string_id! {
    /// Owning-user identifier for a loop.
    ///
    /// # Invariants
    /// - Opaque UTF-8 string; authorization is the caller's responsibility.
    UserId
}

opaque_string_id! {
    /// Thread identifier a loop is attached to.
    ///
    /// # Invariants
    /// - Opaque UTF-8 string; unique within a user's thread namespace.
    ThreadId
}

opaque_string_id! {
    /// Repository full name in `owner/name` form.
    ///
    /// # Invariants
    /// - Opaque UTF-8 string; no validation of the `owner/name` shape is
    ///   performed by this type.
    RepoFullName
}

opaque_string_id! {
    /// Webhook delivery identifier assigned by the sending platform.
    ///
    /// # Invariants
    /// - Opaque UTF-8 string; unique per delivered webhook envelope.
    DeliveryId
}

opaque_string_id! {
    /// Claimant token identifying the worker holding a webhook claim.
    ///
    /// # Invariants
    /// - Opaque UTF-8 string.
    ClaimantToken
}

opaque_string_id! {
    /// Lease owner token identifying the worker holding a loop lease.
    ///
    /// # Invariants
    /// - Opaque UTF-8 string.
    LeaseOwner
}

opaque_string_id! {
    /// Commit SHA at the tip of the PR branch under evaluation.
    ///
    /// # Invariants
    /// - Opaque UTF-8 string; no hex-format validation is performed.
    HeadSha
}

opaque_string_id! {
    /// Canonical cause identifier, deterministic per external event instance.
    ///
    /// # Invariants
    /// - Opaque UTF-8 string produced only by [`crate::cause::CanonicalCause`].
    CanonicalCauseId
}

opaque_string_id! {
    /// Signal inbox row identifier.
    ///
    /// # Invariants
    /// - Opaque UTF-8 string, unique per (loop, canonical cause).
    SignalId
}

opaque_string_id! {
    /// Outbox row identifier.
    ///
    /// # Invariants
    /// - Opaque UTF-8 string, unique per outbox row.
    OutboxId
}

opaque_string_id! {
    /// Outbox action key, unique within a loop.
    ///
    /// # Invariants
    /// - Opaque UTF-8 string; re-use within a loop upserts the existing row.
    ActionKey
}

opaque_string_id! {
    /// Phase artifact identifier.
    ///
    /// # Invariants
    /// - Opaque UTF-8 string, unique per artifact row.
    ArtifactId
}

opaque_string_id! {
    /// Caller- or content-hash-derived stable finding identifier.
    ///
    /// # Invariants
    /// - Opaque UTF-8 string; stable across re-evaluations of the same head
    ///   SHA so resolution tokens remain portable.
    StableFindingId
}

opaque_string_id! {
    /// Plan-task identifier, stable within its owning artifact.
    ///
    /// # Invariants
    /// - Opaque UTF-8 string, unique per (artifact, task).
    StableTaskId
}
