//! Client configuration.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::compliance::Jurisdiction;
use crate::{KioskPayError, Result};

/// Production API endpoint.
pub const DEFAULT_API_ENDPOINT: &str = "https://api.asiancryptopay.com/v1";

/// Cryptocurrencies accepted unless the merchant overrides the set.
pub const DEFAULT_SUPPORTED_CRYPTOCURRENCIES: [&str; 5] = ["BTC", "ETH", "USDT", "USDC", "BNB"];

/// User agent sent with every request.
pub const DEFAULT_USER_AGENT: &str = concat!("KioskPay-Rust/", env!("CARGO_PKG_VERSION"));

/// Webhook receiving settings.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WebhookConfig {
    /// URL the provider delivers webhooks to.
    #[serde(default)]
    pub endpoint: String,
    /// Shared secret used to verify webhook signatures.
    pub secret: String,
}

impl WebhookConfig {
    pub fn new(endpoint: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            secret: secret.into(),
        }
    }
}

impl fmt::Debug for WebhookConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebhookConfig")
            .field("endpoint", &self.endpoint)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Configuration for [`PaymentClient`](crate::PaymentClient).
#[derive(Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Merchant API key; also the request signing secret.
    pub api_key: String,

    /// Merchant identifier.
    pub merchant_id: String,

    /// Country whose KYC rule applies.
    #[serde(alias = "country")]
    pub jurisdiction: Jurisdiction,

    /// API base URL.
    #[serde(default = "default_api_endpoint")]
    pub api_endpoint: String,

    /// Route payments to the provider's sandbox.
    #[serde(default)]
    pub test_mode: bool,

    /// Cryptocurrencies accepted for payment.
    #[serde(default = "default_supported_cryptocurrencies")]
    pub supported_cryptocurrencies: Vec<String>,

    /// Webhook settings; without them every webhook is rejected.
    #[serde(default)]
    pub webhook: Option<WebhookConfig>,

    /// Seconds between status polls of a tracked payment.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// HTTP request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// User-Agent header value.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_api_endpoint() -> String {
    DEFAULT_API_ENDPOINT.to_string()
}

fn default_supported_cryptocurrencies() -> Vec<String> {
    DEFAULT_SUPPORTED_CRYPTOCURRENCIES
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_poll_interval() -> u64 {
    10
}

fn default_timeout() -> u64 {
    30
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

impl ClientConfig {
    /// Create a configuration with defaults for everything but the credentials.
    pub fn new(
        api_key: impl Into<String>,
        merchant_id: impl Into<String>,
        jurisdiction: Jurisdiction,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            merchant_id: merchant_id.into(),
            jurisdiction,
            api_endpoint: default_api_endpoint(),
            test_mode: false,
            supported_cryptocurrencies: default_supported_cryptocurrencies(),
            webhook: None,
            poll_interval_secs: default_poll_interval(),
            timeout_secs: default_timeout(),
            user_agent: default_user_agent(),
        }
    }

    pub fn with_api_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.api_endpoint = endpoint.into();
        self
    }

    pub fn with_test_mode(mut self, test_mode: bool) -> Self {
        self.test_mode = test_mode;
        self
    }

    /// Replace the accepted cryptocurrency set.
    pub fn with_supported_cryptocurrencies<I, S>(mut self, cryptos: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.supported_cryptocurrencies = cryptos.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_webhook(mut self, webhook: WebhookConfig) -> Self {
        self.webhook = Some(webhook);
        self
    }

    pub fn with_poll_interval(mut self, secs: u64) -> Self {
        self.poll_interval_secs = secs;
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Poll interval as a `Duration`.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Webhook secret, if configured and non-empty.
    pub fn webhook_secret(&self) -> Option<&str> {
        self.webhook
            .as_ref()
            .map(|w| w.secret.as_str())
            .filter(|s| !s.is_empty())
    }

    /// Check the configuration before a client is built from it.
    pub fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(KioskPayError::configuration("api_key", "must not be empty"));
        }
        if self.merchant_id.trim().is_empty() {
            return Err(KioskPayError::configuration(
                "merchant_id",
                "must not be empty",
            ));
        }
        if !(self.api_endpoint.starts_with("http://") || self.api_endpoint.starts_with("https://"))
        {
            return Err(KioskPayError::configuration(
                "api_endpoint",
                format!("'{}' is not an http(s) URL", self.api_endpoint),
            ));
        }
        if self.supported_cryptocurrencies.is_empty() {
            return Err(KioskPayError::configuration(
                "supported_cryptocurrencies",
                "at least one cryptocurrency is required",
            ));
        }
        if self.poll_interval_secs == 0 {
            return Err(KioskPayError::configuration(
                "poll_interval_secs",
                "must be greater than zero",
            ));
        }
        if self.timeout_secs == 0 {
            return Err(KioskPayError::configuration(
                "timeout_secs",
                "must be greater than zero",
            ));
        }
        Ok(())
    }

    /// Load configuration from `KIOSKPAY_*` environment variables.
    ///
    /// Variables:
    /// - `KIOSKPAY_API_KEY` - merchant API key (required)
    /// - `KIOSKPAY_MERCHANT_ID` - merchant id (required)
    /// - `KIOSKPAY_COUNTRY` - country code or name (required)
    /// - `KIOSKPAY_API_URL` - API base URL
    /// - `KIOSKPAY_TEST_MODE` - `true`/`1` for sandbox
    /// - `KIOSKPAY_WEBHOOK_SECRET` - webhook secret
    /// - `KIOSKPAY_WEBHOOK_URL` - webhook endpoint
    /// - `KIOSKPAY_POLL_INTERVAL` - poll interval in seconds
    /// - `KIOSKPAY_TIMEOUT` - request timeout in seconds
    ///
    /// # Example
    ///
    /// ```bash
    /// export KIOSKPAY_API_KEY=sk_test_123
    /// export KIOSKPAY_MERCHANT_ID=merchant_42
    /// export KIOSKPAY_COUNTRY=SG
    /// ```
    pub fn from_env() -> std::result::Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> std::result::Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &'static str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::Missing(key))
        };

        let api_key = required("KIOSKPAY_API_KEY")?;
        let merchant_id = required("KIOSKPAY_MERCHANT_ID")?;
        let country = required("KIOSKPAY_COUNTRY")?;
        let jurisdiction = country
            .parse::<Jurisdiction>()
            .map_err(|e| ConfigError::Invalid {
                var: "KIOSKPAY_COUNTRY",
                reason: e.to_string(),
            })?;

        let mut config = ClientConfig::new(api_key, merchant_id, jurisdiction);

        if let Some(url) = lookup("KIOSKPAY_API_URL") {
            config = config.with_api_endpoint(url);
        }

        if let Some(test_mode) = lookup("KIOSKPAY_TEST_MODE") {
            config = config.with_test_mode(parse_flag("KIOSKPAY_TEST_MODE", &test_mode)?);
        }

        if let Some(secret) = lookup("KIOSKPAY_WEBHOOK_SECRET") {
            let endpoint = lookup("KIOSKPAY_WEBHOOK_URL").unwrap_or_default();
            config = config.with_webhook(WebhookConfig::new(endpoint, secret));
        }

        if let Some(interval) = lookup("KIOSKPAY_POLL_INTERVAL") {
            config = config.with_poll_interval(parse_secs("KIOSKPAY_POLL_INTERVAL", &interval)?);
        }

        if let Some(timeout) = lookup("KIOSKPAY_TIMEOUT") {
            config = config.with_timeout(parse_secs("KIOSKPAY_TIMEOUT", &timeout)?);
        }

        Ok(config)
    }
}

fn parse_flag(var: &'static str, value: &str) -> std::result::Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(ConfigError::Invalid {
            var,
            reason: format!("'{}' is not a boolean", other),
        }),
    }
}

fn parse_secs(var: &'static str, value: &str) -> std::result::Result<u64, ConfigError> {
    value.trim().parse::<u64>().map_err(|e| ConfigError::Invalid {
        var,
        reason: e.to_string(),
    })
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_key", &"<redacted>")
            .field("merchant_id", &self.merchant_id)
            .field("jurisdiction", &self.jurisdiction)
            .field("api_endpoint", &self.api_endpoint)
            .field("test_mode", &self.test_mode)
            .field("supported_cryptocurrencies", &self.supported_cryptocurrencies)
            .field("webhook", &self.webhook)
            .field("poll_interval_secs", &self.poll_interval_secs)
            .field("timeout_secs", &self.timeout_secs)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

/// Errors loading configuration from the environment.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("environment variable {0} is not set")]
    Missing(&'static str),
    #[error("environment variable {var} is invalid: {reason}")]
    Invalid { var: &'static str, reason: String },
}

impl From<ConfigError> for KioskPayError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Missing(var) => KioskPayError::configuration(var, "not set"),
            ConfigError::Invalid { var, reason } => KioskPayError::configuration(var, reason),
        }
    }
}
