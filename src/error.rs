//! Error types for the OmniKassa client

use thiserror::Error;

/// Result type alias for OmniKassa operations
pub type Result<T> = std::result::Result<T, OmniKassaError>;

/// Main error type for OmniKassa operations
#[derive(Error, Debug)]
pub enum OmniKassaError {
    /// The gateway rejected the bearer token
    #[error("Invalid access token")]
    InvalidAccessToken,

    /// A response or notification signature did not match its contents
    #[error("Signature mismatch: {message}")]
    SignatureMismatch { message: String },

    /// Structured error envelope returned by the gateway
    #[error("Remote API error {code}: {message}")]
    RemoteApi { code: String, message: String },

    /// Network, timeout or connection failure
    #[error("Transport failure: {message}")]
    TransportFailure { message: String },

    /// Non-success HTTP status without an error envelope
    #[error("Unexpected HTTP status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    /// No access token has been established and none can be obtained
    #[error("No access token available")]
    NoTokenAvailable,

    /// The operation was cancelled or its deadline elapsed
    #[error("Operation cancelled")]
    Cancelled,

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Base64 encoding/decoding error
    #[error("Base64 error: {0}")]
    Base64(#[from] base64::DecodeError),

    /// URL could not be built from the configured base URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for OmniKassaError {
    fn from(err: reqwest::Error) -> Self {
        let message = if err.is_timeout() {
            format!("request timed out: {}", err)
        } else if err.is_connect() {
            format!("connection failed: {}", err)
        } else {
            err.to_string()
        };
        Self::TransportFailure { message }
    }
}

impl OmniKassaError {
    /// Create a signature mismatch error
    pub fn signature_mismatch(message: impl Into<String>) -> Self {
        Self::SignatureMismatch {
            message: message.into(),
        }
    }

    /// Create a remote API error
    pub fn remote_api(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RemoteApi {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Create a transport failure
    pub fn transport(message: impl Into<String>) -> Self {
        Self::TransportFailure {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Whether this error means the bearer token was rejected
    pub fn is_invalid_access_token(&self) -> bool {
        matches!(self, Self::InvalidAccessToken)
    }

    /// Whether this error originated below the API layer
    pub fn is_transport_failure(&self) -> bool {
        matches!(
            self,
            Self::TransportFailure { .. } | Self::UnexpectedStatus { .. }
        )
    }
}
