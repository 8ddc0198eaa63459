//! Prelude module for convenient imports.
//!
//! ```rust,ignore
//! use kioskpay_lib::prelude::*;
//! ```

// Client
pub use crate::client::PaymentClient;
pub use crate::config::{ClientConfig, WebhookConfig};

// Error handling
pub use crate::errors::{KioskPayError, KioskPayErrorCode};
pub use crate::Result;

// Payments
pub use crate::amount::Amount;
pub use crate::models::{
    ExchangeRates, Payment, PaymentDetails, PaymentFilters, PaymentList, PaymentStatus,
};

// Compliance
pub use crate::compliance::{ComplianceRule, Jurisdiction};

// Notifications
pub use crate::events::{PaymentEvent, PaymentEvents};

// Transport
pub use crate::transport::{ApiResponse, HttpTransport};
