//! Error types for KioskPay operations.
//!
//! Every failure the SDK can surface is a [`KioskPayError`]. Hosts that
//! consume the event stream instead of awaiting results see the same errors
//! flattened to [`PaymentEvent::Error`](crate::PaymentEvent::Error) through
//! [`KioskPayError::status_code`] and [`KioskPayError::message`].

use std::fmt;

/// Stable error codes for host integrations and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum KioskPayErrorCode {
    /// Payment details failed structural validation
    Validation = 1000,
    /// Payment details failed jurisdiction KYC rules
    Compliance = 1001,
    /// Provider answered with a non-success status, or the request failed in transit
    Transport = 2000,
    /// Connection failed
    ConnectionFailed = 2001,
    /// Connection timeout
    ConnectionTimeout = 2002,
    /// Provider response could not be understood
    Protocol = 3000,
    /// Signature missing or invalid
    Signature = 4000,
    /// Client configuration is invalid
    Configuration = 5000,
    /// Internal/unexpected error
    Internal = 9999,
}

/// Comprehensive error type for KioskPay operations.
#[derive(Debug, Clone, PartialEq)]
pub enum KioskPayError {
    /// Payment details are structurally invalid (amount, currency, crypto).
    Validation(String),

    /// Payment details violate the jurisdiction's KYC rules.
    Compliance(String),

    /// The provider answered with a non-success HTTP status.
    Transport {
        /// HTTP status reported by the provider
        status: u16,
        /// Provider message or status text
        message: String,
    },

    /// Connection failed.
    ConnectionFailed {
        /// Target endpoint
        target: String,
        /// Underlying error message
        reason: String,
    },

    /// Connection timeout.
    ConnectionTimeout {
        /// Operation that timed out
        operation: String,
        /// Timeout duration in milliseconds
        timeout_ms: u64,
    },

    /// The provider reply was not the JSON shape expected.
    Protocol(String),

    /// Signature missing, malformed or not matching.
    Signature(String),

    /// Invalid client configuration.
    Configuration {
        /// Offending setting
        field: String,
        /// Reason for invalidity
        reason: String,
    },

    /// Internal/unexpected error.
    Internal(String),
}

/// Convenient result alias.
pub type Result<T> = std::result::Result<T, KioskPayError>;

impl KioskPayError {
    /// Get the stable error code.
    pub fn code(&self) -> KioskPayErrorCode {
        match self {
            Self::Validation(_) => KioskPayErrorCode::Validation,
            Self::Compliance(_) => KioskPayErrorCode::Compliance,
            Self::Transport { .. } => KioskPayErrorCode::Transport,
            Self::ConnectionFailed { .. } => KioskPayErrorCode::ConnectionFailed,
            Self::ConnectionTimeout { .. } => KioskPayErrorCode::ConnectionTimeout,
            Self::Protocol(_) => KioskPayErrorCode::Protocol,
            Self::Signature(_) => KioskPayErrorCode::Signature,
            Self::Configuration { .. } => KioskPayErrorCode::Configuration,
            Self::Internal(_) => KioskPayErrorCode::Internal,
        }
    }

    /// HTTP-style status reported to hosts in error events.
    ///
    /// Provider failures keep the provider's own status; locally detected
    /// failures map onto the closest HTTP meaning.
    pub fn status_code(&self) -> i32 {
        match self {
            Self::Validation(_) | Self::Compliance(_) | Self::Configuration { .. } => 400,
            Self::Transport { status, .. } => i32::from(*status),
            Self::Signature(_) => 401,
            Self::ConnectionFailed { .. } => 503,
            Self::ConnectionTimeout { .. } => 504,
            Self::Protocol(_) | Self::Internal(_) => 500,
        }
    }

    /// Get the error message as an owned String.
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// Returns true if this error is potentially recoverable by retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ConnectionFailed { .. } | Self::ConnectionTimeout { .. } => true,
            Self::Transport { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Returns a suggested retry delay in milliseconds, if applicable.
    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            Self::ConnectionTimeout { .. } => Some(1000),
            Self::ConnectionFailed { .. } => Some(2000),
            Self::Transport { status: 429, .. } => Some(5000),
            Self::Transport { status, .. } if *status >= 500 => Some(1000),
            _ => None,
        }
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a transport error for a provider status.
    pub fn transport(status: u16, message: impl Into<String>) -> Self {
        Self::Transport {
            status,
            message: message.into(),
        }
    }

    /// Create a configuration error.
    pub fn configuration(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Configuration {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for KioskPayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation(msg) | Self::Compliance(msg) => f.write_str(msg),
            Self::Transport { status, message } => {
                write!(f, "request failed ({}): {}", status, message)
            }
            Self::ConnectionFailed { target, reason } => {
                write!(f, "connection to {} failed: {}", target, reason)
            }
            Self::ConnectionTimeout {
                operation,
                timeout_ms,
            } => {
                write!(f, "{} timed out after {}ms", operation, timeout_ms)
            }
            Self::Protocol(msg) => write!(f, "{}", msg),
            Self::Signature(msg) => write!(f, "signature error: {}", msg),
            Self::Configuration { field, reason } => {
                write!(f, "invalid configuration {}: {}", field, reason)
            }
            Self::Internal(msg) => write!(f, "internal error: {}", msg),
        }
    }
}

impl std::error::Error for KioskPayError {}

impl From<serde_json::Error> for KioskPayError {
    fn from(err: serde_json::Error) -> Self {
        Self::Protocol(format!("Invalid JSON response: {}", err))
    }
}
