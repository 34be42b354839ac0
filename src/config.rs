//! Client configuration

use crate::signature::SigningKey;
use crate::token::DEFAULT_EXPIRY_MARGIN_SECS;
use crate::{OmniKassaError, Result};
use serde::{Deserialize, Deserializer};
use std::time::Duration;

/// Production base URL
pub const PRODUCTION_BASE_URL: &str = "https://betalen.rabobank.nl/omnikassa-api/";

/// Sandbox base URL
pub const SANDBOX_BASE_URL: &str = "https://betalen.rabobank.nl/omnikassa-api-sandbox/";

/// Default request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Largest accepted token expiry margin; access tokens live for hours
pub const MAX_TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(3600);

/// Gateway environment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Production,
    Sandbox,
}

impl Environment {
    /// Base URL of the environment
    pub fn base_url(&self) -> &'static str {
        match self {
            Environment::Production => PRODUCTION_BASE_URL,
            Environment::Sandbox => SANDBOX_BASE_URL,
        }
    }
}

impl std::str::FromStr for Environment {
    type Err = OmniKassaError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "production" => Ok(Environment::Production),
            "sandbox" => Ok(Environment::Sandbox),
            other => Err(OmniKassaError::config(format!(
                "Unknown environment: {}",
                other
            ))),
        }
    }
}

impl<'de> Deserialize<'de> for Environment {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Settings consumed by the client at construction time
#[derive(Clone)]
pub struct GatewayConfig {
    /// Base URL all API paths are resolved against
    pub base_url: String,
    /// Key for response and notification signatures
    pub signing_key: SigningKey,
    /// Long-lived token used to obtain access tokens
    pub refresh_token: String,
    /// Passed through in `X-Api-User-Agent`
    pub user_agent: Option<String>,
    /// Passed through in `X-Api-Partner-Reference`
    pub partner_reference: Option<String>,
    /// Request timeout
    pub timeout: Option<Duration>,
    /// Time before expiry at which a token is no longer used
    pub token_expiry_margin: Duration,
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("base_url", &self.base_url)
            .field("signing_key", &self.signing_key)
            .field("refresh_token", &"<redacted>")
            .field("user_agent", &self.user_agent)
            .field("partner_reference", &self.partner_reference)
            .field("timeout", &self.timeout)
            .field("token_expiry_margin", &self.token_expiry_margin)
            .finish()
    }
}

impl GatewayConfig {
    /// Create a new gateway config
    pub fn new(
        base_url: impl Into<String>,
        signing_key: impl Into<SigningKey>,
        refresh_token: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            signing_key: signing_key.into(),
            refresh_token: refresh_token.into(),
            user_agent: None,
            partner_reference: None,
            timeout: Some(DEFAULT_TIMEOUT),
            token_expiry_margin: Duration::from_secs(DEFAULT_EXPIRY_MARGIN_SECS as u64),
        }
    }

    /// Create a config for one of the well-known environments
    pub fn for_environment(
        environment: Environment,
        signing_key: impl Into<SigningKey>,
        refresh_token: impl Into<String>,
    ) -> Self {
        Self::new(environment.base_url(), signing_key, refresh_token)
    }

    /// Set the user agent
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Set the partner reference
    pub fn with_partner_reference(mut self, partner_reference: impl Into<String>) -> Self {
        self.partner_reference = Some(partner_reference.into());
        self
    }

    /// Set the request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the token expiry safety margin
    pub fn with_token_expiry_margin(mut self, margin: Duration) -> Self {
        self.token_expiry_margin = margin;
        self
    }

    /// Validate the gateway configuration
    pub fn validate(&self) -> Result<()> {
        if self.base_url.is_empty() {
            return Err(OmniKassaError::config("Base URL cannot be empty"));
        }

        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(OmniKassaError::config(
                "Base URL must start with http:// or https://",
            ));
        }

        if self.signing_key.is_empty() {
            return Err(OmniKassaError::config("Signing key cannot be empty"));
        }

        if self.refresh_token.trim().is_empty() {
            return Err(OmniKassaError::config("Refresh token cannot be empty"));
        }

        if self.token_expiry_margin > MAX_TOKEN_EXPIRY_MARGIN {
            return Err(OmniKassaError::config(format!(
                "Token expiry margin cannot exceed {} seconds",
                MAX_TOKEN_EXPIRY_MARGIN.as_secs()
            )));
        }

        Ok(())
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let base_url = match std::env::var("OMNIKASSA_BASE_URL") {
            Ok(url) => url,
            Err(_) => match std::env::var("OMNIKASSA_ENVIRONMENT") {
                Ok(env) => env.parse::<Environment>()?.base_url().to_string(),
                Err(_) => SANDBOX_BASE_URL.to_string(),
            },
        };

        let signing_key = std::env::var("OMNIKASSA_SIGNING_KEY")
            .map_err(|_| OmniKassaError::config("OMNIKASSA_SIGNING_KEY must be set"))?;
        let refresh_token = std::env::var("OMNIKASSA_REFRESH_TOKEN")
            .map_err(|_| OmniKassaError::config("OMNIKASSA_REFRESH_TOKEN must be set"))?;

        let mut config = Self::new(base_url, SigningKey::from_base64(&signing_key)?, refresh_token);

        if let Ok(user_agent) = std::env::var("OMNIKASSA_USER_AGENT") {
            config.user_agent = Some(user_agent);
        }

        if let Ok(partner_reference) = std::env::var("OMNIKASSA_PARTNER_REFERENCE") {
            config.partner_reference = Some(partner_reference);
        }

        if let Ok(timeout) = std::env::var("OMNIKASSA_TIMEOUT_SECS") {
            let secs: u64 = timeout
                .parse()
                .map_err(|e| OmniKassaError::config(format!("Invalid OMNIKASSA_TIMEOUT_SECS: {}", e)))?;
            config.timeout = Some(Duration::from_secs(secs));
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a JSON file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;

        let file: ConfigFile = serde_json::from_str(&content)
            .map_err(|e| OmniKassaError::config(format!("Failed to parse config file: {}", e)))?;

        let base_url = match (file.base_url, file.environment) {
            (Some(url), _) => url,
            (None, Some(environment)) => environment.base_url().to_string(),
            (None, None) => SANDBOX_BASE_URL.to_string(),
        };

        let mut config = Self::new(
            base_url,
            SigningKey::from_base64(&file.signing_key)?,
            file.refresh_token,
        );
        config.user_agent = file.user_agent;
        config.partner_reference = file.partner_reference;
        if let Some(secs) = file.timeout_secs {
            config.timeout = Some(Duration::from_secs(secs));
        }
        if let Some(secs) = file.token_expiry_margin_secs {
            config.token_expiry_margin = Duration::from_secs(secs);
        }

        config.validate()?;
        Ok(config)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    base_url: Option<String>,
    environment: Option<Environment>,
    signing_key: String,
    refresh_token: String,
    user_agent: Option<String>,
    partner_reference: Option<String>,
    timeout_secs: Option<u64>,
    token_expiry_margin_secs: Option<u64>,
}
