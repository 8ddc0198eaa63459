//! Verify-webhook command - check and dispatch a saved webhook delivery

use anyhow::{Context, Result};
use kioskpay_lib::{ClientConfig, PaymentClient, PaymentEvent};
use std::path::Path;

use crate::ui;

pub fn run(config: ClientConfig, body_file: &Path, signature: &str, verbose: bool) -> Result<()> {
    let raw = std::fs::read_to_string(body_file)
        .with_context(|| format!("Failed to read {}", body_file.display()))?;

    if config.webhook_secret().is_none() {
        ui::error("No webhook secret configured");
        ui::info("Set webhook.secret in the config file or KIOSKPAY_WEBHOOK_SECRET");
        return Ok(());
    }

    let (client, mut events) = PaymentClient::connect(config)?;

    if !client.verify_webhook_signature(signature, &raw) {
        ui::error("Signature does not match the webhook body");
        return Ok(());
    }
    ui::success("Signature verified");

    if !client.process_webhook_event(&raw, signature) {
        ui::error("Webhook body is not valid JSON");
        return Ok(());
    }

    let dispatched = events.drain();
    if dispatched.is_empty() {
        ui::info("Webhook acknowledged; no event for this type");
    }
    for event in dispatched {
        match event {
            PaymentEvent::PaymentCreated(p) => {
                ui::info("payment.created");
                super::print_payment(&p);
            }
            PaymentEvent::PaymentStatusUpdated(p) => {
                ui::info(&format!("Status update: {}", ui::status(p.status.as_str())));
                super::print_payment(&p);
            }
            other if verbose => tracing::debug!(kind = other.kind(), "event"),
            _ => {}
        }
    }

    Ok(())
}
