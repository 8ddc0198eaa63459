//! KioskPay library.
//!
//! Merchant SDK for accepting cryptocurrency payments at self-service
//! kiosks in eight Southeast Asian jurisdictions. The crate validates
//! payments locally against the jurisdiction's KYC rules, signs requests
//! with HMAC-SHA256, talks to the payment provider's REST API and tracks
//! each payment until it settles.
//!
//! # Features
//!
//! - **Compliance**: per-country KYC thresholds checked before any network call
//! - **Signing**: deterministic request signatures and constant-time webhook verification
//! - **Lifecycle tracking**: background polling until a payment completes, expires or is cancelled
//! - **Webhooks**: verified push updates that short-circuit polling
//! - **Transport abstraction**: [`HttpTransport`] with a reqwest implementation behind `http-executor`
//!
//! # Example
//!
//! ```ignore
//! use kioskpay_lib::prelude::*;
//!
//! let config = ClientConfig::from_env()?;
//! let (client, mut events) = PaymentClient::connect(config)?;
//!
//! let details = PaymentDetails::builder(Amount::from_units(50), "THB", "USDT").build()?;
//! let payment = client.create_payment(&details).await?;
//!
//! while let Some(event) = events.recv().await {
//!     if let PaymentEvent::PaymentStatusUpdated(p) = event {
//!         if p.id == payment.id && p.is_terminal() {
//!             break;
//!         }
//!     }
//! }
//! ```

pub mod amount;
pub mod client;
pub mod compliance;
pub mod config;
pub mod errors;
pub mod events;
mod gateway;
pub mod mapper;
pub mod models;
pub mod prelude;
pub mod request;
pub mod signing;
pub mod tracker;
pub mod transport;
pub mod webhook;

/// Test utilities for exercising the client without a network.
///
/// This module is only available with the `test-utils` feature or in test builds.
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use amount::Amount;
pub use client::PaymentClient;
pub use compliance::{ComplianceOutcome, ComplianceRule, Jurisdiction, KycField};
pub use config::{ClientConfig, ConfigError, WebhookConfig};
pub use errors::{KioskPayError, KioskPayErrorCode, Result};
pub use events::{EventSink, PaymentEvent, PaymentEvents};
pub use models::{
    ExchangeRates, Metadata, Payment, PaymentDetails, PaymentDetailsBuilder, PaymentFilters,
    PaymentList, PaymentStatus,
};
pub use request::{ApiRequest, HttpMethod, PaymentRequestBuilder, SignedRequest};
pub use signing::SignatureService;
pub use tracker::{ApplyOutcome, PaymentLifecycleTracker, PollHandle};
pub use transport::{ApiResponse, HttpTransport, ReqwestTransport};
pub use webhook::{WebhookEventType, WebhookProcessor};
