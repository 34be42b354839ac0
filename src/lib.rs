//! # omnikassa - client for the OmniKassa payment gateway
//!
//! Announces orders, pulls order status results behind webhook
//! notifications, manages refunds and stored cards. Every authenticated call
//! keeps the access token fresh on its own: it refreshes before the call when
//! the held token is expired and refreshes and retries once when the gateway
//! rejects a token it believed valid. Signed responses and notifications
//! are checked with the merchant's signing key.
//!
//! ```no_run
//! use omnikassa::{GatewayClient, GatewayConfig, Money, Currency, MerchantOrder};
//!
//! # async fn run() -> omnikassa::Result<()> {
//! let config = GatewayConfig::from_env()?;
//! let client = GatewayClient::new(config)?;
//!
//! let order = MerchantOrder::new(
//!     "ORDER-1",
//!     Money::new(Currency::EUR, 4999),
//!     "https://shop.example/return",
//! );
//! let response = client.announce_order(&order).await?;
//! println!("redirect shopper to {}", response.redirect_url);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod notification;
pub mod poller;
pub mod signature;
pub mod token;
pub mod transport;
pub mod types;

// Re-exports for convenience
pub use client::{cancellable, with_deadline, GatewayClient};
pub use config::{Environment, GatewayConfig};
pub use error::{OmniKassaError, Result};
pub use notification::{
    ApiNotification, MerchantOrderResult, MerchantOrderStatusResponse, OrderStatusPage,
};
pub use poller::{DrainOutcome, NotificationPoller, PollState};
pub use signature::{compute_signature, verify, SignatureVerifier, SignedPayload, SigningKey};
pub use token::{AccessToken, InMemoryTokenProvider, TokenProvider};
pub use transport::{HttpTransport, Transport};
pub use types::*;

/// Current version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
