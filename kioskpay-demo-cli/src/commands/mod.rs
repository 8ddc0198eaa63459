//! CLI command implementations

pub mod check;
pub mod create;
pub mod jurisdictions;
pub mod payments;
pub mod qr;
pub mod rates;
pub mod sign;
pub mod webhook;

use anyhow::{Context, Result};
use kioskpay_lib::{
    Amount, ClientConfig, Payment, PaymentClient, PaymentDetails, PaymentEvent, PaymentEvents,
};

use crate::ui;
use crate::PaymentArgs;

/// Build a client talking to the configured provider.
pub fn connect(config: ClientConfig) -> Result<(PaymentClient, PaymentEvents)> {
    if config.test_mode {
        ui::warning("Test mode: payments go to the provider sandbox");
    }
    PaymentClient::connect(config).context("Failed to initialize payment client")
}

/// Turn `--amount`/`--crypto`/... into payment details. The currency
/// defaults to the jurisdiction's own.
pub fn payment_details(config: &ClientConfig, args: &PaymentArgs) -> Result<PaymentDetails> {
    let amount: Amount = args
        .amount
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid amount '{}': {}", args.amount, e))?;

    let rule = config.jurisdiction.rule();
    let currency = args
        .currency
        .clone()
        .unwrap_or_else(|| rule.currency.to_string());

    let mut builder =
        PaymentDetails::builder(amount, currency.to_uppercase(), args.crypto.to_uppercase());
    if let Some(description) = &args.description {
        builder = builder.description(description);
    }
    if let Some(order_id) = &args.order_id {
        builder = builder.order_id(order_id);
    }
    if let Some(name) = &args.name {
        builder = builder.customer_name(name);
    }
    if let Some(email) = &args.email {
        builder = builder.customer_email(email);
    }
    Ok(builder.build()?)
}

/// Print the interesting fields of a payment.
pub fn print_payment(payment: &Payment) {
    ui::key_value("ID", &payment.id);
    ui::key_value("Status", &ui::status(payment.status.as_str()));
    ui::key_value(
        "Amount",
        &format!("{} {}", payment.amount, payment.currency),
    );
    if payment.crypto_amount.is_positive() {
        ui::key_value(
            "Pay",
            &format!("{} {}", payment.crypto_amount, payment.crypto_currency),
        );
    }
    if !payment.address.is_empty() {
        ui::key_value("Address", &payment.address);
    }
    if !payment.qr_code_url.is_empty() {
        ui::key_value("QR code", &payment.qr_code_url);
    }
    if let Some(expires_at) = payment.expires_at {
        ui::key_value("Expires", &expires_at.format("%Y-%m-%d %H:%M:%S UTC").to_string());
    }
}

/// Print events that queued up while a command ran. Only interesting in verbose mode.
pub fn print_pending_events(events: &mut PaymentEvents) {
    for event in events.drain() {
        match event {
            PaymentEvent::Error { code, message } => {
                tracing::debug!(code, %message, "error event");
            }
            other => tracing::debug!(kind = other.kind(), "event"),
        }
    }
}
