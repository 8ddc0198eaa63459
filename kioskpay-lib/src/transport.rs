//! HTTP transport abstraction and the reqwest-backed implementation.
//!
//! # Feature Flags
//!
//! [`ReqwestTransport`] needs the `http-executor` feature (enabled by
//! default) to perform real HTTP requests. Without it every send returns a
//! `Configuration` error and hosts are expected to plug in their own
//! [`HttpTransport`].
//!
//! ```toml
//! [dependencies]
//! kioskpay-lib = { version = "1.0", default-features = false }
//! ```

use async_trait::async_trait;
#[cfg(feature = "http-executor")]
use std::time::Duration;

use crate::config::ClientConfig;
use crate::request::ApiRequest;
#[cfg(feature = "http-executor")]
use crate::request::HttpMethod;
use crate::{KioskPayError, Result};

/// Raw reply from the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl ApiResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// 2xx status.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body as text, lossy.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Sends [`ApiRequest`]s to the payment provider.
///
/// Implementations return `Ok` for every reply the server produced,
/// whatever its status; `Err` is reserved for failures in transit.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse>;
}

/// [`HttpTransport`] over `reqwest`.
pub struct ReqwestTransport {
    base_url: String,
    timeout_secs: u64,
    #[cfg(feature = "http-executor")]
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Create a transport for `base_url` with a per-request timeout.
    #[cfg(feature = "http-executor")]
    pub fn new(base_url: impl Into<String>, timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| KioskPayError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.into(),
            timeout_secs,
            client,
        })
    }

    /// Create a transport (stub when feature disabled).
    #[cfg(not(feature = "http-executor"))]
    pub fn new(base_url: impl Into<String>, timeout_secs: u64) -> Result<Self> {
        Ok(Self {
            base_url: base_url.into(),
            timeout_secs,
        })
    }

    /// Transport for the configured endpoint and timeout.
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        Self::new(config.api_endpoint.clone(), config.timeout_secs)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout_secs(&self) -> u64 {
        self.timeout_secs
    }

    /// Full URL for a request path. Absolute URLs pass through.
    #[cfg(any(feature = "http-executor", test))]
    fn url(&self, request: &ApiRequest) -> String {
        if request.is_absolute() {
            request.path.clone()
        } else {
            format!(
                "{}/{}",
                self.base_url.trim_end_matches('/'),
                request.path.trim_start_matches('/')
            )
        }
    }

    /// Map reqwest errors to KioskPayError.
    #[cfg(feature = "http-executor")]
    fn map_reqwest_error(&self, url: &str, e: reqwest::Error) -> KioskPayError {
        if e.is_timeout() {
            KioskPayError::ConnectionTimeout {
                operation: format!("request to {}", url),
                timeout_ms: self.timeout_secs * 1000,
            }
        } else if e.is_connect() {
            KioskPayError::ConnectionFailed {
                target: url.to_string(),
                reason: e.to_string(),
            }
        } else {
            KioskPayError::transport(502, format!("request to {} failed: {}", url, e))
        }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    #[cfg(feature = "http-executor")]
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        let url = self.url(&request);
        tracing::debug!(method = request.method.as_str(), url = %url, "sending request");

        let mut builder = match request.method {
            HttpMethod::Get => self.client.get(&url),
            HttpMethod::Post => self.client.post(&url),
        };
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| self.map_reqwest_error(&url, e))?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| self.map_reqwest_error(&url, e))?;

        Ok(ApiResponse::new(status, body.to_vec()))
    }

    #[cfg(not(feature = "http-executor"))]
    async fn send(&self, _request: ApiRequest) -> Result<ApiResponse> {
        Err(KioskPayError::configuration(
            "transport",
            "HTTP client not compiled - enable the 'http-executor' feature",
        ))
    }
}
