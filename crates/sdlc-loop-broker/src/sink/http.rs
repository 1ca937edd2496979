// crates/sdlc-loop-broker/src/sink/http.rs
// ============================================================================
// Module: SDLC Loop HTTP Sink
// Description: Webhook-style sink posting resolved dispatch payloads as JSON.
// Purpose: Deliver a dispatch to an operator-configured HTTP endpoint
// (status-comment relay, fix-task queue, telemetry collector) over a plain
// blocking POST.
// Dependencies: sdlc-loop-core, reqwest (blocking), serde_json, thiserror
// ============================================================================

//! ## Overview
//! `HttpSink` posts a JSON envelope of the resolved
//! [`crate::payload::OutboxDispatchPayload`] to a single configured URL. The
//! target is operator-supplied configuration, not externally-controlled
//! content, so this sink does not need the private-network / redirect
//! guardrails a content-reference fetcher would — it trusts the URL it was
//! given the way any outbound webhook caller does.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::HeaderMap;
use reqwest::header::HeaderName;
use reqwest::header::HeaderValue;
use sdlc_loop_core::core::time::Timestamp;
use serde_json::json;

use crate::payload::OutboxDispatchPayload;
use crate::sink::ReceiptFactory;
use crate::sink::Sink;
use crate::sink::SinkError;
use crate::sink::SinkReceipt;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Configuration for an [`HttpSink`].
///
/// # Invariants
/// - `endpoint` is a fully-qualified URL the sink posts to verbatim.
#[derive(Debug, Clone)]
pub struct HttpSinkConfig {
    /// Destination URL for the POST request.
    pub endpoint: String,
    /// Optional bearer token sent as `Authorization: Bearer <token>`.
    pub bearer_token: Option<String>,
    /// Request timeout.
    pub timeout: Duration,
}

impl HttpSinkConfig {
    /// Creates a configuration with the default 30-second timeout and no
    /// authentication.
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self { endpoint: endpoint.into(), bearer_token: None, timeout: Duration::from_secs(30) }
    }

    /// Sets a bearer token to send with every request.
    #[must_use]
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    /// Overrides the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

// ============================================================================
// SECTION: HTTP Sink
// ============================================================================

/// HTTP-backed dispatch sink.
pub struct HttpSink {
    /// Blocking HTTP client used for delivery.
    client: Client,
    /// Sink configuration.
    config: HttpSinkConfig,
    /// Receipt factory for deterministic dispatch IDs.
    receipts: ReceiptFactory,
}

impl HttpSink {
    /// Builds an HTTP sink from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::DeliveryFailed`] when the underlying HTTP client
    /// cannot be constructed.
    pub fn new(config: HttpSinkConfig) -> Result<Self, SinkError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| SinkError::DeliveryFailed(format!("failed to build http client: {err}")))?;
        Ok(Self { client, config, receipts: ReceiptFactory::new("http") })
    }

    fn auth_header(&self) -> Result<Option<(HeaderName, HeaderValue)>, SinkError> {
        let Some(token) = &self.config.bearer_token else {
            return Ok(None);
        };
        let value = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|err| SinkError::DeliveryFailed(format!("invalid bearer token: {err}")))?;
        Ok(Some((reqwest::header::AUTHORIZATION, value)))
    }
}

impl Sink for HttpSink {
    fn deliver(&self, payload: &OutboxDispatchPayload, now: Timestamp) -> Result<SinkReceipt, SinkError> {
        let receipt = self.receipts.next(payload, now);
        let envelope = json!({
            "dispatch_id": receipt.dispatch_id,
            "loop_id": payload.loop_id.as_str(),
            "outbox_id": payload.outbox_id.as_str(),
            "action_type": receipt.action_type,
            "body": format!("{:?}", payload.body),
            "dispatched_at": receipt.dispatched_at,
        });

        let mut headers = HeaderMap::new();
        if let Some((name, value)) = self.auth_header()? {
            headers.insert(name, value);
        }

        let response = self
            .client
            .post(&self.config.endpoint)
            .headers(headers)
            .json(&envelope)
            .send()
            .map_err(|err| SinkError::DeliveryFailed(format!("http request failed: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SinkError::DeliveryFailed(format!("endpoint returned status {status}")));
        }
        Ok(receipt)
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
