//! Outbound request construction.
//!
//! [`PaymentRequestBuilder`] turns merchant input into [`ApiRequest`]s the
//! transport can send. Creation requests go through structural validation,
//! the jurisdiction's compliance rule and signing; body-less requests carry
//! the merchant headers only.

use serde_json::Value;
use urlencoding::encode;

use crate::compliance::{self, ComplianceOutcome, Jurisdiction};
use crate::config::ClientConfig;
use crate::models::{PaymentDetails, PaymentFilters};
use crate::signing::SignatureService;
use crate::{KioskPayError, Result};

pub const HEADER_CONTENT_TYPE: &str = "Content-Type";
pub const HEADER_MERCHANT_ID: &str = "X-Merchant-ID";
pub const HEADER_TIMESTAMP: &str = "X-Timestamp";
pub const HEADER_TEST_MODE: &str = "X-Test-Mode";
pub const HEADER_USER_AGENT: &str = "User-Agent";
pub const HEADER_SIGNATURE: &str = "X-Signature";

/// HTTP methods the provider API uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }
}

/// A request ready for the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: HttpMethod,
    /// Path relative to the API endpoint (with query), or an absolute URL.
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl ApiRequest {
    /// Header value by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// True when `path` is a full URL rather than an API-relative path.
    pub fn is_absolute(&self) -> bool {
        self.path.starts_with("http://") || self.path.starts_with("https://")
    }
}

/// A signed payment creation request plus what compliance concluded.
#[derive(Debug, Clone, PartialEq)]
pub struct SignedRequest {
    pub request: ApiRequest,
    pub timestamp: String,
    pub signature: String,
    pub compliance: ComplianceOutcome,
}

/// Builds validated, signed requests for one merchant.
#[derive(Debug, Clone)]
pub struct PaymentRequestBuilder {
    merchant_id: String,
    jurisdiction: Jurisdiction,
    test_mode: bool,
    supported_cryptocurrencies: Vec<String>,
    user_agent: String,
    signer: SignatureService,
}

impl PaymentRequestBuilder {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            merchant_id: config.merchant_id.clone(),
            jurisdiction: config.jurisdiction,
            test_mode: config.test_mode,
            supported_cryptocurrencies: config.supported_cryptocurrencies.clone(),
            user_agent: config.user_agent.clone(),
            signer: SignatureService::new(config.api_key.clone()),
        }
    }

    pub fn jurisdiction(&self) -> Jurisdiction {
        self.jurisdiction
    }

    pub fn supported_cryptocurrencies(&self) -> &[String] {
        &self.supported_cryptocurrencies
    }

    /// Structural and compliance checks, no network and no signing.
    ///
    /// Order: amount, currency, cryptocurrency, supported set, compliance rule.
    pub fn check(&self, details: &PaymentDetails) -> Result<ComplianceOutcome> {
        details.validate()?;

        if !self
            .supported_cryptocurrencies
            .iter()
            .any(|c| c == &details.crypto_currency)
        {
            return Err(KioskPayError::validation(format!(
                "Unsupported cryptocurrency. Must be one of: {}",
                self.supported_cryptocurrencies.join(", ")
            )));
        }

        compliance::validate(details, &self.jurisdiction.rule())
    }

    /// Build a signed `POST /payments` request stamped with the current time.
    pub fn build(&self, details: &PaymentDetails) -> Result<SignedRequest> {
        self.build_at(details, chrono::Utc::now().timestamp_millis())
    }

    /// Build a signed `POST /payments` request stamped with `timestamp_ms`.
    pub fn build_at(&self, details: &PaymentDetails, timestamp_ms: i64) -> Result<SignedRequest> {
        let compliance = self.check(details)?;

        let mut body = details.to_wire();
        body.insert("merchant_id".into(), self.merchant_id.clone().into());
        body.insert("country_code".into(), self.jurisdiction.code().into());
        body.insert("test_mode".into(), Value::Bool(self.test_mode));
        let body = serde_json::to_string(&Value::Object(body))
            .map_err(|e| KioskPayError::Internal(format!("Failed to encode payment: {}", e)))?;

        let timestamp = timestamp_ms.to_string();
        let signature = self.signer.sign(&body, &timestamp);

        let mut headers = self.base_headers(&timestamp);
        headers.push((HEADER_SIGNATURE.to_string(), signature.clone()));

        Ok(SignedRequest {
            request: ApiRequest {
                method: HttpMethod::Post,
                path: "payments".to_string(),
                headers,
                body: Some(body),
            },
            timestamp,
            signature,
            compliance,
        })
    }

    /// `GET /payments/{id}`.
    pub fn get_payment(&self, payment_id: &str) -> Result<ApiRequest> {
        let id = require_payment_id(payment_id)?;
        Ok(self.bodyless(HttpMethod::Get, format!("payments/{}", encode(id))))
    }

    /// `GET /payments?...`.
    pub fn list_payments(&self, filters: &PaymentFilters) -> ApiRequest {
        let query = filters.query_string();
        let path = if query.is_empty() {
            "payments".to_string()
        } else {
            format!("payments?{}", query)
        };
        self.bodyless(HttpMethod::Get, path)
    }

    /// `POST /payments/{id}/cancel`, sent without a body.
    pub fn cancel_payment(&self, payment_id: &str) -> Result<ApiRequest> {
        let id = require_payment_id(payment_id)?;
        Ok(self.bodyless(
            HttpMethod::Post,
            format!("payments/{}/cancel", encode(id)),
        ))
    }

    /// `GET /exchange-rates`. An empty currency list means the supported set.
    pub fn exchange_rates(&self, base_currency: &str, currencies: &[String]) -> Result<ApiRequest> {
        let base = base_currency.trim();
        if base.is_empty() {
            return Err(KioskPayError::validation("Base currency is required"));
        }
        let symbols: &[String] = if currencies.is_empty() {
            &self.supported_cryptocurrencies
        } else {
            currencies
        };
        let symbols: Vec<String> = symbols
            .iter()
            .map(|s| encode(s.trim()).into_owned())
            .collect();
        Ok(self.bodyless(
            HttpMethod::Get,
            format!(
                "exchange-rates?base_currency={}&currencies={}",
                encode(base),
                symbols.join(",")
            ),
        ))
    }

    /// `GET <url>` for a QR code image hosted by the provider.
    ///
    /// The URL may point at a third-party host, so no merchant headers are sent.
    pub fn qr_code(&self, url: &str) -> Result<ApiRequest> {
        let url = url.trim();
        if url.is_empty() {
            return Err(KioskPayError::validation("QR code URL is required"));
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(KioskPayError::validation(format!(
                "QR code URL must be absolute: {}",
                url
            )));
        }
        Ok(ApiRequest {
            method: HttpMethod::Get,
            path: url.to_string(),
            headers: vec![(HEADER_USER_AGENT.to_string(), self.user_agent.clone())],
            body: None,
        })
    }

    fn bodyless(&self, method: HttpMethod, path: String) -> ApiRequest {
        let timestamp = chrono::Utc::now().timestamp_millis().to_string();
        ApiRequest {
            method,
            path,
            headers: self.base_headers(&timestamp),
            body: None,
        }
    }

    fn base_headers(&self, timestamp: &str) -> Vec<(String, String)> {
        vec![
            (
                HEADER_CONTENT_TYPE.to_string(),
                "application/json".to_string(),
            ),
            (HEADER_MERCHANT_ID.to_string(), self.merchant_id.clone()),
            (HEADER_TIMESTAMP.to_string(), timestamp.to_string()),
            (HEADER_TEST_MODE.to_string(), self.test_mode.to_string()),
            (HEADER_USER_AGENT.to_string(), self.user_agent.clone()),
        ]
    }
}

fn require_payment_id(payment_id: &str) -> Result<&str> {
    let id = payment_id.trim();
    if id.is_empty() {
        return Err(KioskPayError::validation("Payment ID is required"));
    }
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amount::Amount;
    use crate::signing;
    use rust_decimal_macros::dec;

    fn builder(jurisdiction: Jurisdiction) -> PaymentRequestBuilder {
        PaymentRequestBuilder::new(
            &ClientConfig::new("sk_test", "merchant-7", jurisdiction).with_test_mode(true),
        )
    }

    #[test]
    fn test_build_signs_canonical_body() {
        let details = PaymentDetails::builder(Amount::new(dec!(1234.56789012)), "SGD", "BTC")
            .description("Kiosk")
            .customer_name("Tan")
            .customer_email("a@b.com")
            .build()
            .unwrap();
        let signed = builder(Jurisdiction::Singapore)
            .build_at(&details, 1_700_000_000_000)
            .unwrap();

        let body = signed.request.body.as_deref().unwrap();
        assert_eq!(
            body,
            r#"{"amount":"1234.56789012","country_code":"SG","crypto_currency":"BTC","currency":"SGD","customer_email":"a@b.com","customer_name":"Tan","description":"Kiosk","merchant_id":"merchant-7","test_mode":true}"#
        );
        assert_eq!(signed.timestamp, "1700000000000");
        assert_eq!(signed.signature, signing::sign(body, "1700000000000", "sk_test"));
        assert_eq!(
            signed.request.header("x-signature"),
            Some(signed.signature.as_str())
        );
        assert_eq!(signed.request.header(HEADER_TEST_MODE), Some("true"));
        assert_eq!(signed.request.header(HEADER_MERCHANT_ID), Some("merchant-7"));
        assert_eq!(signed.request.method, HttpMethod::Post);
        assert!(signed.compliance.travel_rule_applies);
    }

    #[test]
    fn test_unsupported_crypto_lists_supported_set() {
        let details = PaymentDetails::builder(Amount::from_units(10), "MYR", "DOGE")
            .build()
            .unwrap();
        let err = builder(Jurisdiction::Malaysia).build(&details).unwrap_err();
        assert_eq!(
            err.message(),
            "Unsupported cryptocurrency. Must be one of: BTC, ETH, USDT, USDC, BNB"
        );
    }

    #[test]
    fn test_compliance_runs_after_structural_checks() {
        let details = PaymentDetails::builder(Amount::from_units(5_000), "MYR", "ETH")
            .build()
            .unwrap();
        let err = builder(Jurisdiction::Malaysia).build(&details).unwrap_err();
        assert!(matches!(err, KioskPayError::Compliance(_)));
    }

    #[test]
    fn test_bodyless_requests_are_unsigned() {
        let b = builder(Jurisdiction::Thailand);
        let get = b.get_payment("pay_1").unwrap();
        assert_eq!(get.path, "payments/pay_1");
        assert!(get.body.is_none());
        assert!(get.header(HEADER_SIGNATURE).is_none());
        assert!(get.header(HEADER_TIMESTAMP).is_some());

        let cancel = b.cancel_payment("pay_1").unwrap();
        assert_eq!(cancel.method, HttpMethod::Post);
        assert_eq!(cancel.path, "payments/pay_1/cancel");
        assert!(cancel.header(HEADER_SIGNATURE).is_none());
    }

    #[test]
    fn test_empty_ids_rejected() {
        let b = builder(Jurisdiction::Brunei);
        assert_eq!(
            b.get_payment(" ").unwrap_err().message(),
            "Payment ID is required"
        );
        assert!(b.cancel_payment("").is_err());
        assert_eq!(
            b.exchange_rates("", &[]).unwrap_err().message(),
            "Base currency is required"
        );
        assert_eq!(b.qr_code("").unwrap_err().message(), "QR code URL is required");
    }

    #[test]
    fn test_exchange_rates_defaults_to_supported() {
        let b = builder(Jurisdiction::Indonesia);
        assert_eq!(
            b.exchange_rates("IDR", &[]).unwrap().path,
            "exchange-rates?base_currency=IDR&currencies=BTC,ETH,USDT,USDC,BNB"
        );
        assert_eq!(
            b.exchange_rates("IDR", &["BTC".to_string()]).unwrap().path,
            "exchange-rates?base_currency=IDR&currencies=BTC"
        );
    }

    #[test]
    fn test_reserved_characters_are_encoded() {
        let b = builder(Jurisdiction::Malaysia);
        assert_eq!(b.get_payment("p1/cancel").unwrap().path, "payments/p1%2Fcancel");
        assert_eq!(
            b.get_payment("p1?x=1").unwrap().path,
            "payments/p1%3Fx%3D1"
        );
        assert_eq!(
            b.cancel_payment("../p2").unwrap().path,
            "payments/..%2Fp2/cancel"
        );
        assert_eq!(
            b.exchange_rates("MYR&currencies=DOGE", &[]).unwrap().path,
            "exchange-rates?base_currency=MYR%26currencies%3DDOGE&currencies=BTC,ETH,USDT,USDC,BNB"
        );
        assert_eq!(
            b.exchange_rates("MYR", &["BTC&x=1".to_string(), "ETH".to_string()])
                .unwrap()
                .path,
            "exchange-rates?base_currency=MYR&currencies=BTC%26x%3D1,ETH"
        );
    }

    #[test]
    fn test_qr_code_request_carries_no_merchant_headers() {
        let qr = builder(Jurisdiction::Laos)
            .qr_code(" https://cdn.example.com/qr/p1.png ")
            .unwrap();
        assert_eq!(qr.method, HttpMethod::Get);
        assert_eq!(qr.path, "https://cdn.example.com/qr/p1.png");
        assert!(qr.header(HEADER_MERCHANT_ID).is_none());
        assert!(qr.header(HEADER_TEST_MODE).is_none());
        assert!(qr.header(HEADER_TIMESTAMP).is_none());
        assert!(qr.header(HEADER_USER_AGENT).is_some());
        assert!(qr.body.is_none());

        assert!(builder(Jurisdiction::Laos).qr_code("/qr/p1.png").is_err());
    }

    #[test]
    fn test_list_path() {
        let b = builder(Jurisdiction::Cambodia);
        assert_eq!(
            b.list_payments(&PaymentFilters::default()).path,
            "payments?limit=20"
        );
        assert_eq!(
            b.list_payments(&PaymentFilters::new().with_limit(0)).path,
            "payments"
        );
    }
}
