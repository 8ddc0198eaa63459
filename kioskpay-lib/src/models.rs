//! Domain types exchanged with the payment provider.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::amount::Amount;
use crate::{KioskPayError, Result};

/// Free-form merchant metadata attached to a payment.
pub type Metadata = Map<String, Value>;

/// Payment lifecycle status as reported by the provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum PaymentStatus {
    #[default]
    Created,
    Pending,
    Completed,
    Cancelled,
    Expired,
}

impl PaymentStatus {
    /// Wire spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Expired => "expired",
        }
    }

    /// Parse the wire spelling; anything unknown is treated as `Created`.
    pub fn parse_lenient(s: &str) -> Self {
        s.parse().unwrap_or_default()
    }

    /// Completed, cancelled and expired payments never change again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Expired)
    }

    /// Whether a payment in this status may be moved to `next`.
    ///
    /// Non-terminal statuses accept anything; a terminal status only
    /// accepts itself.
    pub fn can_transition_to(&self, next: PaymentStatus) -> bool {
        !self.is_terminal() || *self == next
    }
}

impl FromStr for PaymentStatus {
    type Err = KioskPayError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "created" => Ok(Self::Created),
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "cancelled" | "canceled" => Ok(Self::Cancelled),
            "expired" => Ok(Self::Expired),
            other => Err(KioskPayError::validation(format!(
                "Unknown payment status: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the merchant wants to charge. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentDetails {
    pub amount: Amount,
    pub currency: String,
    pub crypto_currency: String,
    pub description: String,
    pub order_id: Option<String>,
    pub customer_email: Option<String>,
    pub customer_name: Option<String>,
    pub callback_url: Option<String>,
    pub success_url: Option<String>,
    pub cancel_url: Option<String>,
    pub metadata: Metadata,
}

impl PaymentDetails {
    /// Start building payment details for `amount` in fiat `currency`, paid in `crypto_currency`.
    ///
    /// ```rust
    /// use kioskpay_lib::{Amount, PaymentDetails};
    ///
    /// let details = PaymentDetails::builder(Amount::from_units(25), "SGD", "USDT")
    ///     .description("Kiosk top-up")
    ///     .customer_name("Tan")
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(details.currency, "SGD");
    /// ```
    pub fn builder(
        amount: Amount,
        currency: impl Into<String>,
        crypto_currency: impl Into<String>,
    ) -> PaymentDetailsBuilder {
        PaymentDetailsBuilder {
            details: PaymentDetails {
                amount,
                currency: currency.into(),
                crypto_currency: crypto_currency.into(),
                description: String::new(),
                order_id: None,
                customer_email: None,
                customer_name: None,
                callback_url: None,
                success_url: None,
                cancel_url: None,
                metadata: Metadata::new(),
            },
        }
    }

    /// Structural checks shared by the builder and the request builder.
    pub fn validate(&self) -> Result<()> {
        if !self.amount.is_positive() {
            return Err(KioskPayError::validation(
                "Payment amount must be greater than zero",
            ));
        }
        if self.currency.trim().is_empty() {
            return Err(KioskPayError::validation("Currency is required"));
        }
        if self.crypto_currency.trim().is_empty() {
            return Err(KioskPayError::validation("Cryptocurrency is required"));
        }
        Ok(())
    }

    /// Customer name, if present and not blank.
    pub fn customer_name(&self) -> Option<&str> {
        non_blank(self.customer_name.as_deref())
    }

    /// Customer email, if present and not blank.
    pub fn customer_email(&self) -> Option<&str> {
        non_blank(self.customer_email.as_deref())
    }

    /// Wire object for `POST /payments`, without the merchant envelope.
    ///
    /// Optional fields are omitted when empty.
    pub fn to_wire(&self) -> Map<String, Value> {
        let mut obj = Map::new();
        obj.insert("amount".into(), Value::String(self.amount.to_wire()));
        obj.insert("currency".into(), Value::String(self.currency.clone()));
        obj.insert(
            "crypto_currency".into(),
            Value::String(self.crypto_currency.clone()),
        );
        obj.insert(
            "description".into(),
            Value::String(self.description.clone()),
        );

        let optional = [
            ("order_id", &self.order_id),
            ("customer_email", &self.customer_email),
            ("customer_name", &self.customer_name),
            ("callback_url", &self.callback_url),
            ("success_url", &self.success_url),
            ("cancel_url", &self.cancel_url),
        ];
        for (key, value) in optional {
            if let Some(v) = non_blank(value.as_deref()) {
                obj.insert(key.into(), Value::String(v.to_string()));
            }
        }
        if !self.metadata.is_empty() {
            obj.insert("metadata".into(), Value::Object(self.metadata.clone()));
        }
        obj
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Builder for [`PaymentDetails`].
#[derive(Debug, Clone)]
pub struct PaymentDetailsBuilder {
    details: PaymentDetails,
}

impl PaymentDetailsBuilder {
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.details.description = description.into();
        self
    }

    pub fn order_id(mut self, order_id: impl Into<String>) -> Self {
        self.details.order_id = Some(order_id.into());
        self
    }

    pub fn customer_name(mut self, name: impl Into<String>) -> Self {
        self.details.customer_name = Some(name.into());
        self
    }

    pub fn customer_email(mut self, email: impl Into<String>) -> Self {
        self.details.customer_email = Some(email.into());
        self
    }

    pub fn callback_url(mut self, url: impl Into<String>) -> Self {
        self.details.callback_url = Some(url.into());
        self
    }

    pub fn success_url(mut self, url: impl Into<String>) -> Self {
        self.details.success_url = Some(url.into());
        self
    }

    pub fn cancel_url(mut self, url: impl Into<String>) -> Self {
        self.details.cancel_url = Some(url.into());
        self
    }

    /// Attach a scalar metadata value.
    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.metadata.insert(key.into(), value.into());
        self
    }

    /// Finish, enforcing amount > 0 and non-empty currencies.
    pub fn build(self) -> Result<PaymentDetails> {
        self.details.validate()?;
        Ok(self.details)
    }
}

/// A payment as known to the provider. The id is always server-assigned.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Payment {
    pub id: String,
    pub merchant_id: String,
    pub amount: Amount,
    pub currency: String,
    pub crypto_amount: Amount,
    pub crypto_currency: String,
    pub description: String,
    pub order_id: String,
    pub customer_email: String,
    pub customer_name: String,
    pub address: String,
    pub qr_code_url: String,
    pub status: PaymentStatus,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub metadata: Metadata,
}

impl Payment {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn is_completed(&self) -> bool {
        self.status == PaymentStatus::Completed
    }

    pub fn is_pending(&self) -> bool {
        self.status == PaymentStatus::Pending
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == PaymentStatus::Cancelled
    }

    pub fn is_expired(&self) -> bool {
        self.status == PaymentStatus::Expired
    }

    /// Parse a provider payment object. Never fails; see [`crate::mapper`].
    pub fn from_wire(value: &Value) -> Self {
        crate::mapper::payment_from_wire(value)
    }

    /// Provider wire form of this payment.
    pub fn to_wire(&self) -> Value {
        crate::mapper::payment_to_wire(self)
    }
}

/// Query filters for `GET /payments`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentFilters {
    pub status: Option<PaymentStatus>,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
    pub limit: u32,
    pub offset: u32,
}

impl Default for PaymentFilters {
    fn default() -> Self {
        Self {
            status: None,
            from_date: None,
            to_date: None,
            limit: 20,
            offset: 0,
        }
    }
}

impl PaymentFilters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_status(mut self, status: PaymentStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_date_range(mut self, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        self.from_date = from;
        self.to_date = to;
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_offset(mut self, offset: u32) -> Self {
        self.offset = offset;
        self
    }

    /// Query string without the leading `?`. Empty when nothing applies.
    pub fn query_string(&self) -> String {
        let mut params: Vec<String> = Vec::new();
        if let Some(status) = self.status {
            params.push(format!("status={}", status.as_str()));
        }
        if let Some(from) = self.from_date {
            params.push(format!("from_date={}", from.format("%Y-%m-%d")));
        }
        if let Some(to) = self.to_date {
            params.push(format!("to_date={}", to.format("%Y-%m-%d")));
        }
        if self.limit > 0 {
            params.push(format!("limit={}", self.limit));
        }
        if self.offset > 0 {
            params.push(format!("offset={}", self.offset));
        }
        params.join("&")
    }
}

/// One page of payments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PaymentList {
    pub total: u64,
    pub payments: Vec<Payment>,
}

/// Crypto prices quoted in a fiat base currency.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExchangeRates {
    pub base_currency: String,
    pub rates: BTreeMap<String, Decimal>,
}

impl ExchangeRates {
    pub fn rate(&self, symbol: &str) -> Option<Decimal> {
        self.rates.get(symbol).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn details() -> PaymentDetailsBuilder {
        PaymentDetails::builder(Amount::new(dec!(12.5)), "MYR", "BTC")
    }

    #[test]
    fn test_builder_rejects_non_positive_amount() {
        let err = PaymentDetails::builder(Amount::ZERO, "MYR", "BTC")
            .build()
            .unwrap_err();
        assert_eq!(err.message(), "Payment amount must be greater than zero");
    }

    #[test]
    fn test_builder_rejects_missing_currencies() {
        let err = PaymentDetails::builder(Amount::from_units(1), "", "BTC")
            .build()
            .unwrap_err();
        assert_eq!(err.message(), "Currency is required");

        let err = PaymentDetails::builder(Amount::from_units(1), "MYR", " ")
            .build()
            .unwrap_err();
        assert_eq!(err.message(), "Cryptocurrency is required");
    }

    #[test]
    fn test_wire_omits_empty_optionals() {
        let wire = details()
            .description("Coffee")
            .customer_email("")
            .order_id("ORD-1")
            .build()
            .unwrap()
            .to_wire();

        assert_eq!(wire["amount"], "12.50000000");
        assert_eq!(wire["description"], "Coffee");
        assert_eq!(wire["order_id"], "ORD-1");
        assert!(!wire.contains_key("customer_email"));
        assert!(!wire.contains_key("customer_name"));
        assert!(!wire.contains_key("metadata"));
    }

    #[test]
    fn test_wire_includes_metadata() {
        let wire = details()
            .metadata("kiosk", "KL-07")
            .metadata("lane", 3)
            .build()
            .unwrap()
            .to_wire();
        assert_eq!(wire["metadata"]["kiosk"], "KL-07");
        assert_eq!(wire["metadata"]["lane"], 3);
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!(PaymentStatus::parse_lenient("PENDING"), PaymentStatus::Pending);
        assert_eq!(PaymentStatus::parse_lenient("refunded"), PaymentStatus::Created);
        assert!(PaymentStatus::Expired.is_terminal());
        assert!(!PaymentStatus::Pending.is_terminal());
    }

    #[test]
    fn test_terminal_status_never_reverts() {
        assert!(PaymentStatus::Pending.can_transition_to(PaymentStatus::Completed));
        assert!(PaymentStatus::Pending.can_transition_to(PaymentStatus::Created));
        assert!(!PaymentStatus::Completed.can_transition_to(PaymentStatus::Pending));
        assert!(!PaymentStatus::Cancelled.can_transition_to(PaymentStatus::Completed));
        assert!(PaymentStatus::Expired.can_transition_to(PaymentStatus::Expired));
    }

    #[test]
    fn test_filters_query_string() {
        assert_eq!(PaymentFilters::default().query_string(), "limit=20");

        let filters = PaymentFilters::new()
            .with_status(PaymentStatus::Completed)
            .with_date_range(
                NaiveDate::from_ymd_opt(2024, 3, 1),
                NaiveDate::from_ymd_opt(2024, 3, 31),
            )
            .with_limit(50)
            .with_offset(100);
        assert_eq!(
            filters.query_string(),
            "status=completed&from_date=2024-03-01&to_date=2024-03-31&limit=50&offset=100"
        );

        assert_eq!(PaymentFilters::new().with_limit(0).query_string(), "");
    }
}
