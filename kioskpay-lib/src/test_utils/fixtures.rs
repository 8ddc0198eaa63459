//! Canned provider payloads.

use serde_json::{json, Value};

use crate::models::{Payment, PaymentStatus};

/// Provider JSON for a payment with `id` and wire `status`.
pub fn payment_value(id: &str, status: &str) -> Value {
    json!({
        "id": id,
        "merchant_id": "merchant-test",
        "amount": "1234.56789012",
        "currency": "SGD",
        "crypto_amount": "0.01873422",
        "crypto_currency": "BTC",
        "description": "Kiosk order",
        "address": "bc1qtestaddress0000000000000000000000000",
        "qr_code_url": format!("https://cdn.example.com/qr/{}.png", id),
        "status": status,
        "created_at": "2024-05-01T10:00:00Z",
        "updated_at": "2024-05-01T10:00:05Z",
        "expires_at": "2024-05-01T10:15:00Z"
    })
}

/// [`payment_value`] serialized.
pub fn payment_json(id: &str, status: &str) -> String {
    payment_value(id, status).to_string()
}

/// Mapped [`Payment`] for `id` in `status`.
pub fn payment(id: &str, status: PaymentStatus) -> Payment {
    Payment::from_wire(&payment_value(id, status.as_str()))
}

/// Webhook body `{ type, data }` for a payment.
pub fn webhook_body(event_type: &str, id: &str, status: &str) -> String {
    json!({
        "type": event_type,
        "data": payment_value(id, status)
    })
    .to_string()
}

/// `GET /exchange-rates` reply.
pub fn exchange_rates_json(base: &str) -> String {
    json!({
        "base_currency": base,
        "rates": {
            "BTC": "291234.55",
            "ETH": "15012.10",
            "USDT": "4.71"
        }
    })
    .to_string()
}
