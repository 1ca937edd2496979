// crates/sdlc-loop-store-sqlite/src/lib.rs
// ============================================================================
// Module: SDLC Loop SQLite Store
// Description: Durable persistence for every sdlc-loop-core store trait,
// backed by a single SQLite database under a writer mutex.
// Purpose: Give the loop controller a durable backend without requiring any
// caller to reimplement the CAS/guard semantics the core traits document.
// Dependencies: rusqlite, sdlc-loop-core, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! [`SqliteStore`] implements every trait in `sdlc_loop_core::interfaces`
//! against one SQLite connection guarded by a single writer mutex, the way
//! a single-writer embedded store avoids SQLite's `SQLITE_BUSY` contention
//! without needing a connection pool. Each row's canonical shape is stored as
//! a JSON snapshot alongside the handful of indexed columns its queries
//! actually need, matching the canonical-JSON-snapshot pattern already used
//! for versioned records in this codebase.

// ============================================================================
// SECTION: Modules
// ============================================================================

/// Pragma setup, schema migration, and the store handle itself.
pub mod connection;
/// Row <-> JSON-column codec helpers shared by every trait impl.
mod codec;
/// `SQLite`-specific configuration.
pub mod config;
/// `SQLite` store error type.
pub mod error;

mod artifact_store;
mod gate_store;
mod lease_store;
mod loop_store;
mod outbox_store;
mod parity_store;
mod signal_store;
mod webhook_store;

pub use config::SqliteJournalMode;
pub use config::SqliteStoreConfig;
pub use config::SqliteSyncMode;
pub use connection::SqliteStore;
pub use error::SqliteStoreError;
