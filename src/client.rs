//! Gateway client: every authenticated call goes through the same protocol
//!
//! 1. If the provider holds no usable token, refresh first.
//! 2. Call the transport with the held token.
//! 3. If the gateway rejects that token, refresh once and repeat the call
//!    once. A second rejection is returned as is.
//!
//! Every other failure is returned on first occurrence. A refresh failure is
//! returned unchanged and the refresh itself is never retried.
//!
//! Refreshes are serialized. A caller that finds a refresh already done by
//! someone else while it waited for the lock reuses that token instead of
//! issuing another refresh.

use crate::config::GatewayConfig;
use crate::notification::{ApiNotification, MerchantOrderStatusResponse};
use crate::poller::{DrainOutcome, NotificationPoller};
use crate::signature::{SignatureVerifier, SigningKey};
use crate::token::{InMemoryTokenProvider, TokenProvider};
use crate::transport::{HttpTransport, Transport};
use crate::types::*;
use crate::{OmniKassaError, Result};
use std::future::Future;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Client for the gateway API
pub struct GatewayClient<T: Transport, P: TokenProvider> {
    transport: T,
    token_provider: P,
    verifier: SignatureVerifier,
    refresh_lock: Mutex<()>,
}

impl<T: Transport, P: TokenProvider> std::fmt::Debug for GatewayClient<T, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayClient")
            .field("verifier", &self.verifier)
            .finish_non_exhaustive()
    }
}

impl GatewayClient<HttpTransport, InMemoryTokenProvider> {
    /// Create a client talking HTTP to the configured gateway
    pub fn new(config: GatewayConfig) -> Result<Self> {
        config.validate()?;

        let transport = HttpTransport::new(&config)?;
        let token_provider = InMemoryTokenProvider::new(config.refresh_token.clone())
            .with_expiry_margin(config.token_expiry_margin);

        Ok(Self::with_parts(transport, token_provider, config.signing_key))
    }
}

impl<T: Transport, P: TokenProvider> GatewayClient<T, P> {
    /// Assemble a client from its collaborators
    pub fn with_parts(transport: T, token_provider: P, signing_key: impl Into<SigningKey>) -> Self {
        Self {
            transport,
            token_provider,
            verifier: SignatureVerifier::new(signing_key),
            refresh_lock: Mutex::new(()),
        }
    }

    /// Token provider holding the current access token
    pub fn token_provider(&self) -> &P {
        &self.token_provider
    }

    /// Transport the client sends requests through
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Announce an order; the response holds the payment page URL
    pub async fn announce_order(&self, order: &MerchantOrder) -> Result<MerchantOrderResponse> {
        let transport = &self.transport;
        self.authenticated("announce_order", move |token| async move {
            transport.announce_order(order, &token).await
        })
        .await
    }

    /// Fetch one page of order results for a notification
    pub async fn get_order_status_data(
        &self,
        notification: &ApiNotification,
    ) -> Result<MerchantOrderStatusResponse> {
        let transport = &self.transport;
        self.authenticated("get_order_status_data", move |token| async move {
            transport.get_order_status_data(notification, &token).await
        })
        .await
    }

    /// Verify the notification, then fetch its first page of results
    pub async fn retrieve_announcement(
        &self,
        notification: &ApiNotification,
    ) -> Result<MerchantOrderStatusResponse> {
        self.verify_notification(notification)?;
        self.get_order_status_data(notification).await
    }

    /// Verify the notification, then fetch every page of results
    pub async fn process_notification(&self, notification: &ApiNotification) -> Result<DrainOutcome> {
        self.verify_notification(notification)?;
        Ok(NotificationPoller::new(self).drain(notification).await)
    }

    /// Look up an order by its gateway order id
    pub async fn get_order_by_id(&self, order_id: &str) -> Result<OrderStatusResponse> {
        let transport = &self.transport;
        self.authenticated("get_order_by_id", move |token| async move {
            transport.get_order_by_id(order_id, &token).await
        })
        .await
    }

    /// Initiate a refund; `request_id` makes the request idempotent
    pub async fn post_refund(
        &self,
        request: &InitiateRefundRequest,
        transaction_id: Uuid,
        request_id: Uuid,
    ) -> Result<RefundDetailsResponse> {
        let transport = &self.transport;
        self.authenticated("post_refund", move |token| async move {
            transport
                .post_refund(request, transaction_id, request_id, &token)
                .await
        })
        .await
    }

    /// Fetch the details of one refund of a transaction
    pub async fn get_refund(
        &self,
        transaction_id: Uuid,
        refund_id: Uuid,
    ) -> Result<RefundDetailsResponse> {
        let transport = &self.transport;
        self.authenticated("get_refund", move |token| async move {
            transport.get_refund(transaction_id, refund_id, &token).await
        })
        .await
    }

    /// Fetch how much of a transaction can still be refunded
    pub async fn get_refundable_details(
        &self,
        transaction_id: Uuid,
    ) -> Result<TransactionRefundableDetailsResponse> {
        let transport = &self.transport;
        self.authenticated("get_refundable_details", move |token| async move {
            transport.get_refundable_details(transaction_id, &token).await
        })
        .await
    }

    /// List the payment brands and whether they are active
    pub async fn retrieve_payment_brands(&self) -> Result<PaymentBrandsResponse> {
        let transport = &self.transport;
        self.authenticated("retrieve_payment_brands", move |token| async move {
            transport.retrieve_payment_brands(&token).await
        })
        .await
    }

    /// List the banks available for iDEAL payments
    pub async fn retrieve_ideal_issuers(&self) -> Result<IdealIssuersResponse> {
        let transport = &self.transport;
        self.authenticated("retrieve_ideal_issuers", move |token| async move {
            transport.retrieve_ideal_issuers(&token).await
        })
        .await
    }

    /// List the cards stored for a shopper
    pub async fn get_shopper_payment_details(
        &self,
        shopper_ref: &str,
    ) -> Result<ShopperPaymentDetailsResponse> {
        let transport = &self.transport;
        self.authenticated("get_shopper_payment_details", move |token| async move {
            transport.get_shopper_payment_details(shopper_ref, &token).await
        })
        .await
    }

    /// Remove a stored card of a shopper
    pub async fn delete_shopper_payment_detail(&self, id: &str, shopper_ref: &str) -> Result<()> {
        let transport = &self.transport;
        self.authenticated("delete_shopper_payment_detail", move |token| async move {
            transport
                .delete_shopper_payment_detail(id, shopper_ref, &token)
                .await
        })
        .await
    }

    /// Obtain a new access token now, regardless of the held one
    pub async fn refresh_access_token(&self) -> Result<()> {
        let _guard = self.refresh_lock.lock().await;
        self.retrieve_new_token().await
    }

    /// Check an inbound notification against the signing key
    pub fn verify_notification(&self, notification: &ApiNotification) -> Result<()> {
        self.verifier.verify(notification)
    }

    async fn authenticated<R, F, Fut>(&self, operation: &'static str, call: F) -> Result<R>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<R>>,
    {
        self.validate_access_token().await?;

        let token = self.token_provider.access_token()?;
        match call(token.clone()).await {
            Err(OmniKassaError::InvalidAccessToken) => {
                // The token was believed valid; refresh once and try again
                warn!(operation, "access token rejected, refreshing and retrying once");
                self.refresh_after_rejection(&token).await?;

                let token = self.token_provider.access_token()?;
                call(token).await
            }
            result => result,
        }
    }

    async fn validate_access_token(&self) -> Result<()> {
        if !self.token_provider.has_no_valid_access_token() {
            return Ok(());
        }

        let _guard = self.refresh_lock.lock().await;
        if self.token_provider.has_no_valid_access_token() {
            self.retrieve_new_token().await
        } else {
            debug!("access token refreshed while waiting");
            Ok(())
        }
    }

    async fn refresh_after_rejection(&self, rejected: &str) -> Result<()> {
        let _guard = self.refresh_lock.lock().await;
        match self.token_provider.access_token() {
            Ok(current) if current != rejected => {
                debug!("rejected access token already replaced");
                Ok(())
            }
            _ => self.retrieve_new_token().await,
        }
    }

    /// Caller holds `refresh_lock`
    async fn retrieve_new_token(&self) -> Result<()> {
        let refresh_token = self.token_provider.refresh_token();
        if refresh_token.is_empty() {
            return Err(OmniKassaError::NoTokenAvailable);
        }

        debug!("refreshing access token");
        match self.transport.refresh_access_token(&refresh_token).await {
            Ok(token) => {
                info!(valid_until = %token.valid_until(), "access token refreshed");
                self.token_provider.set_access_token(token);
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "access token refresh failed");
                Err(e)
            }
        }
    }
}

/// Run `operation` unless `signal` completes first.
///
/// Dropping the operation aborts its in-flight request; no retry follows.
pub async fn cancellable<F, S, R>(signal: S, operation: F) -> Result<R>
where
    F: Future<Output = Result<R>>,
    S: Future<Output = ()>,
{
    tokio::select! {
        result = operation => result,
        _ = signal => {
            debug!("operation cancelled");
            Err(OmniKassaError::Cancelled)
        }
    }
}

/// Run `operation` with an overall deadline
pub async fn with_deadline<F, R>(deadline: Duration, operation: F) -> Result<R>
where
    F: Future<Output = Result<R>>,
{
    cancellable(tokio::time::sleep(deadline), operation).await
}
