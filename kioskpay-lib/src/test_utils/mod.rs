//! Test utilities for KioskPay.
//!
//! - [`MockTransport`]: scripted [`HttpTransport`](crate::HttpTransport) that
//!   records every request it receives
//! - [`fixtures`]: canned provider payloads
//!
//! ## Usage
//!
//! ```rust,ignore
//! use kioskpay_lib::test_utils::{fixtures, MockReply, MockTransport};
//! use kioskpay_lib::HttpMethod;
//!
//! let mock = Arc::new(MockTransport::new());
//! mock.on(
//!     HttpMethod::Post,
//!     "payments",
//!     MockReply::json(201, fixtures::payment_json("pay_1", "created")),
//! );
//! let (client, mut events) = PaymentClient::new(config, mock.clone())?;
//! ```

pub mod fixtures;
mod mock_transport;

pub use mock_transport::{MockReply, MockTransport};
