// crates/sdlc-loop-broker/src/follow_up.rs
// ============================================================================
// Module: SDLC Loop Follow-up Routers
// Description: Reference implementations of the follow-up delivery seam.
// Purpose: Let a binary wire a concrete agent-prompt delivery mechanism
// without sdlc-loop-core depending on it directly.
// Dependencies: sdlc-loop-core, std
// ============================================================================

//! ## Overview
//! [`crate::sink::Sink`] covers outbox dispatch; [`FollowUpRouter`] is the
//! parallel seam for the signal-inbox tick's "enqueue a follow-up prompt for
//! the agent" step. Both reference implementations here mirror their
//! `Sink` counterparts: [`CallbackFollowUpRouter`] invokes a caller-supplied
//! closure synchronously, [`ChannelFollowUpRouter`] hands the message to an
//! `mpsc::Sender` for delivery on a separate thread.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::mpsc::SendError;
use std::sync::mpsc::Sender;

use sdlc_loop_core::core::identifiers::LoopId;
use sdlc_loop_core::runtime::signal_inbox::FollowUpRouter;

// ============================================================================
// SECTION: Callback Follow-up Router
// ============================================================================

/// Handler signature a [`CallbackFollowUpRouter`] invokes per follow-up.
type FollowUpHandler = dyn Fn(&LoopId, &str) -> Result<(), String> + Send + Sync;

/// Callback-based follow-up router.
#[derive(Clone)]
pub struct CallbackFollowUpRouter {
    /// Handler invoked with the owning loop and the wrapped message.
    handler: Arc<FollowUpHandler>,
}

impl CallbackFollowUpRouter {
    /// Creates a follow-up router from a handler closure.
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&LoopId, &str) -> Result<(), String> + Send + Sync + 'static,
    {
        Self {
            handler: Arc::new(handler),
        }
    }
}

impl FollowUpRouter for CallbackFollowUpRouter {
    fn enqueue_follow_up(&self, loop_id: &LoopId, message: &str) -> Result<(), String> {
        (self.handler)(loop_id, message)
    }
}

// ============================================================================
// SECTION: Channel Follow-up Router
// ============================================================================

/// Message handed to a channel receiver for one routed follow-up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FollowUpMessage {
    /// Owning loop the follow-up is addressed to.
    pub loop_id: LoopId,
    /// The wrapped, untrusted-content-escaped follow-up text.
    pub message: String,
}

/// Channel-based follow-up router.
///
/// # Invariants
/// - Each routed follow-up sends exactly one [`FollowUpMessage`].
pub struct ChannelFollowUpRouter {
    /// Sender used to hand off follow-up messages.
    sender: Sender<FollowUpMessage>,
}

impl ChannelFollowUpRouter {
    /// Creates a channel-based follow-up router.
    #[must_use]
    pub fn new(sender: Sender<FollowUpMessage>) -> Self {
        Self { sender }
    }
}

impl FollowUpRouter for ChannelFollowUpRouter {
    fn enqueue_follow_up(&self, loop_id: &LoopId, message: &str) -> Result<(), String> {
        self.sender
            .send(FollowUpMessage {
                loop_id: loop_id.clone(),
                message: message.to_string(),
            })
            .map_err(|SendError(message)| format!("receiver dropped: {}", message.loop_id))
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
