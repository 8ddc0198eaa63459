//! Inbound webhook verification and dispatch.
//!
//! The provider POSTs `{ "type": "...", "data": <payment> }` to the
//! merchant's webhook endpoint with an HMAC-SHA256 signature of the raw
//! body. The host passes both to [`WebhookProcessor::process`]; nothing is
//! dispatched unless the signature verifies.

use serde_json::Value;

use crate::events::{EventSink, PaymentEvent};
use crate::mapper;
use crate::signing;
use crate::tracker::{ApplyOutcome, PaymentLifecycleTracker};

/// Webhook event types the provider sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookEventType {
    Created,
    Updated,
    Completed,
    Cancelled,
    Expired,
}

impl WebhookEventType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "payment.created" => Some(Self::Created),
            "payment.updated" => Some(Self::Updated),
            "payment.completed" => Some(Self::Completed),
            "payment.cancelled" => Some(Self::Cancelled),
            "payment.expired" => Some(Self::Expired),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Expired)
    }
}

/// Verifies webhooks and turns them into [`PaymentEvent`]s.
#[derive(Clone)]
pub struct WebhookProcessor {
    secret: Option<String>,
    tracker: PaymentLifecycleTracker,
    events: EventSink,
}

impl WebhookProcessor {
    pub(crate) fn new(
        secret: Option<String>,
        tracker: PaymentLifecycleTracker,
        events: EventSink,
    ) -> Self {
        Self {
            secret: secret.filter(|s| !s.is_empty()),
            tracker,
            events,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.secret.is_some()
    }

    /// Check `signature` against the raw body. False when no secret is configured.
    pub fn verify_signature(&self, signature: &str, raw_body: &str) -> bool {
        match &self.secret {
            Some(secret) => signing::verify(signature, raw_body, secret),
            None => false,
        }
    }

    /// Verify and dispatch one webhook delivery.
    ///
    /// Returns false, dispatching nothing, when no secret is configured, the
    /// signature does not verify or the body is not JSON. Unknown event
    /// types are acknowledged (true) without dispatch, and so are status
    /// webhooks for a payment that already settled.
    pub fn process(&self, raw_body: &str, signature: &str) -> bool {
        if self.secret.is_none() {
            tracing::warn!("webhook rejected: no webhook secret configured");
            return false;
        }
        if !self.verify_signature(signature, raw_body) {
            tracing::warn!("webhook rejected: invalid signature");
            return false;
        }

        let event: Value = match serde_json::from_str(raw_body) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(error = %e, "webhook rejected: body is not valid JSON");
                return false;
            }
        };

        let type_name = event.get("type").and_then(Value::as_str).unwrap_or_default();
        let Some(event_type) = WebhookEventType::parse(type_name) else {
            tracing::debug!(event_type = type_name, "ignoring unknown webhook type");
            return true;
        };
        let Some(data) = event.get("data").filter(|d| d.is_object()) else {
            tracing::debug!(event_type = type_name, "webhook without payment data");
            return true;
        };

        let payment = mapper::payment_from_wire(data);
        tracing::info!(
            event_type = type_name,
            payment_id = %payment.id,
            status = %payment.status,
            "webhook received"
        );

        if event_type == WebhookEventType::Created {
            self.events.emit(PaymentEvent::PaymentCreated(payment));
            return true;
        }

        let outcome = self.tracker.apply(&payment);
        if event_type.is_terminal() {
            self.tracker.stop(&payment.id);
        }
        match outcome {
            ApplyOutcome::AlreadySettled | ApplyOutcome::Rejected => {
                tracing::debug!(
                    event_type = type_name,
                    payment_id = %payment.id,
                    "webhook for a settled payment, not dispatched"
                );
            }
            _ => self.events.emit(PaymentEvent::PaymentStatusUpdated(payment)),
        }
        true
    }
}

impl std::fmt::Debug for WebhookProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookProcessor")
            .field("configured", &self.is_configured())
            .finish()
    }
}
