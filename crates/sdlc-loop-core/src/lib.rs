// crates/sdlc-loop-core/src/lib.rs
// ============================================================================
// Module: SDLC Loop Core Library
// Description: Domain types, store trait interfaces, and pure decision logic
// for the SDLC Loop Controller.
// Purpose: Keep every invariant the loop's state machine, gates, outbox, and
// webhook admission enforce expressible and testable without any I/O.
// Dependencies: serde, serde_json, sha2, thiserror, time
// ============================================================================

//! ## Overview
//! `sdlc-loop-core` has no I/O of its own. [`core`] defines the persisted row
//! shapes and value types; [`interfaces`] defines the store traits a backend
//! implements against them; [`runtime`] holds every pure decision function
//! (transition resolution, gate evaluation, lease/claim arbitration,
//! guardrails, outbox backoff, parity); [`controller`] composes decision plus
//! persistence into the control-plane operations a binary calls directly.
//! [`observability`] carries structured events a caller logs however it logs.

// ============================================================================
// SECTION: Modules
// ============================================================================

/// Control-plane operations composed over the store traits.
pub mod controller;
/// Pure data types persisted by the store traits.
pub mod core;
/// Backend-agnostic persistence traits for every loop subsystem.
pub mod interfaces;
/// Structured observability events emitted by skip paths.
pub mod observability;
/// Pure, store-independent decision logic over the core data model.
pub mod runtime;
