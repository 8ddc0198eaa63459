//! Mapping between provider JSON and domain types.
//!
//! Inbound mapping is lenient: missing or malformed fields fall back to
//! empty values instead of failing, unknown statuses become `Created` and
//! unparseable timestamps become `None`. Only a reply that is not a JSON
//! object at all is a protocol error, see [`parse_object`].

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::str::FromStr;

use crate::amount::Amount;
use crate::models::{ExchangeRates, Payment, PaymentList, PaymentStatus};
use crate::{KioskPayError, Result};

/// Parse a reply body that must be a JSON object.
pub fn parse_object(body: &[u8]) -> Result<Map<String, Value>> {
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) | Err(_) => Err(KioskPayError::Protocol("Invalid JSON response".to_string())),
    }
}

fn str_field(obj: &Value, key: &str) -> String {
    match obj.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn amount_field(obj: &Value, key: &str) -> Amount {
    match obj.get(key) {
        Some(Value::String(s)) => Amount::parse_lenient(s),
        Some(Value::Number(n)) => Amount::parse_lenient(&n.to_string()),
        _ => Amount::ZERO,
    }
}

fn timestamp_field(obj: &Value, key: &str) -> Option<DateTime<Utc>> {
    let raw = obj.get(key)?.as_str()?.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    // Offset-less ISO-8601 is taken as UTC.
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

fn count_field(obj: &Value, key: &str) -> Option<u64> {
    match obj.get(key)? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Map a provider payment object. Never fails.
pub fn payment_from_wire(obj: &Value) -> Payment {
    Payment {
        id: str_field(obj, "id"),
        merchant_id: str_field(obj, "merchant_id"),
        amount: amount_field(obj, "amount"),
        currency: str_field(obj, "currency"),
        crypto_amount: amount_field(obj, "crypto_amount"),
        crypto_currency: str_field(obj, "crypto_currency"),
        description: str_field(obj, "description"),
        order_id: str_field(obj, "order_id"),
        customer_email: str_field(obj, "customer_email"),
        customer_name: str_field(obj, "customer_name"),
        address: str_field(obj, "address"),
        qr_code_url: str_field(obj, "qr_code_url"),
        status: PaymentStatus::parse_lenient(&str_field(obj, "status")),
        created_at: timestamp_field(obj, "created_at"),
        updated_at: timestamp_field(obj, "updated_at"),
        expires_at: timestamp_field(obj, "expires_at"),
        metadata: obj
            .get("metadata")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default(),
    }
}

/// Inverse of [`payment_from_wire`].
pub fn payment_to_wire(payment: &Payment) -> Value {
    let ts = |t: &Option<DateTime<Utc>>| {
        t.map(|t| Value::String(t.to_rfc3339_opts(SecondsFormat::AutoSi, true)))
            .unwrap_or(Value::Null)
    };

    let mut obj = Map::new();
    obj.insert("id".into(), payment.id.clone().into());
    obj.insert("merchant_id".into(), payment.merchant_id.clone().into());
    obj.insert("amount".into(), payment.amount.to_wire().into());
    obj.insert("currency".into(), payment.currency.clone().into());
    obj.insert("crypto_amount".into(), payment.crypto_amount.to_wire().into());
    obj.insert("crypto_currency".into(), payment.crypto_currency.clone().into());
    obj.insert("description".into(), payment.description.clone().into());
    obj.insert("order_id".into(), payment.order_id.clone().into());
    obj.insert("customer_email".into(), payment.customer_email.clone().into());
    obj.insert("customer_name".into(), payment.customer_name.clone().into());
    obj.insert("address".into(), payment.address.clone().into());
    obj.insert("qr_code_url".into(), payment.qr_code_url.clone().into());
    obj.insert("status".into(), payment.status.as_str().into());
    obj.insert("created_at".into(), ts(&payment.created_at));
    obj.insert("updated_at".into(), ts(&payment.updated_at));
    obj.insert("expires_at".into(), ts(&payment.expires_at));
    obj.insert("metadata".into(), Value::Object(payment.metadata.clone()));
    Value::Object(obj)
}

/// Map a `GET /payments` reply: `{ total, payments: [...] }`.
///
/// A missing `total` falls back to the number of payments returned.
pub fn payment_list_from_wire(obj: &Value) -> PaymentList {
    let payments: Vec<Payment> = obj
        .get("payments")
        .and_then(Value::as_array)
        .map(|items| items.iter().map(payment_from_wire).collect())
        .unwrap_or_default();
    let total = count_field(obj, "total").unwrap_or(payments.len() as u64);
    PaymentList { total, payments }
}

/// Map a `GET /exchange-rates` reply: `{ base_currency, rates: { SYM: "1.23" } }`.
///
/// Rates that do not parse are dropped.
pub fn exchange_rates_from_wire(obj: &Value) -> ExchangeRates {
    let mut rates = BTreeMap::new();
    if let Some(map) = obj.get("rates").and_then(Value::as_object) {
        for (symbol, value) in map {
            let parsed = match value {
                Value::String(s) => Decimal::from_str(s.trim()).ok(),
                Value::Number(n) => Decimal::from_str(&n.to_string()).ok(),
                _ => None,
            };
            match parsed {
                Some(rate) => {
                    rates.insert(symbol.clone(), rate);
                }
                None => tracing::debug!(symbol = %symbol, "dropping unparseable exchange rate"),
            }
        }
    }
    ExchangeRates {
        base_currency: str_field(obj, "base_currency"),
        rates,
    }
}
