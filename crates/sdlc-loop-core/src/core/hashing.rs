// crates/sdlc-loop-core/src/core/hashing.rs
// ============================================================================
// Module: SDLC Loop Content Hashing
// Description: SHA-256 hex digests for stable finding identifiers.
// Purpose: Provide deterministic, cross-implementation-portable content hashes.
// Dependencies: sha2
// ============================================================================

//! ## Overview
//! Finding identifiers must be byte-identical across reimplementations so
//! resolution tokens stay portable. This module hashes the fixed
//! `title|severity|category|detail` tuple with SHA-256 and truncates to the
//! first 24 hex characters.

// ============================================================================
// SECTION: Imports
// ============================================================================

use sha2::Digest;
use sha2::Sha256;

// ============================================================================
// SECTION: Stable Finding Hash
// ============================================================================

/// Number of hex characters kept from the SHA-256 digest.
const STABLE_FINDING_HASH_LEN: usize = 24;

/// Derives the content-hash component of a stable finding identifier.
///
/// Hashes `lowercased(title)|severity|category|detail` and returns the first
/// [`STABLE_FINDING_HASH_LEN`] hex characters of the SHA-256 digest.
#[must_use]
pub fn stable_finding_hash(title: &str, severity: &str, category: &str, detail: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(title.to_lowercase().as_bytes());
    hasher.update(b"|");
    hasher.update(severity.as_bytes());
    hasher.update(b"|");
    hasher.update(category.as_bytes());
    hasher.update(b"|");
    hasher.update(detail.as_bytes());
    let digest = hasher.finalize();
    hex_encode(&digest)[..STABLE_FINDING_HASH_LEN].to_string()
}

/// Builds the full `${gateKind}_${hash}` stable finding identifier.
#[must_use]
pub fn derive_stable_finding_id(
    gate_kind: &str,
    title: &str,
    severity: &str,
    category: &str,
    detail: &str,
) -> String {
    format!(
        "{gate_kind}_{}",
        stable_finding_hash(title, severity, category, detail)
    )
}

/// Encodes bytes as a lowercase hex string.
fn hex_encode(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push(HEX[(byte >> 4) as usize] as char);
        out.push(HEX[(byte & 0x0f) as usize] as char);
    }
    out
}
