//! Shared fixtures: a scripted in-memory transport

#![allow(dead_code)]

use async_trait::async_trait;
use omnikassa::{
    AccessToken, ApiNotification, Currency, GatewayClient, IdealIssuersResponse,
    InMemoryTokenProvider, InitiateRefundRequest, MerchantOrder, MerchantOrderResponse,
    MerchantOrderResult, MerchantOrderStatusResponse, Money, OmniKassaError, OrderStatusResponse,
    OrderStatusResult, PaymentBrandsResponse, PaymentStatus, RefundDetailsResponse, RefundStatus,
    Result, ShopperPaymentDetailsResponse, TransactionRefundableDetailsResponse, Transport,
};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use uuid::Uuid;

pub const SIGNING_KEY: &[u8] = b"secret-signing-key";
pub const REFRESH_TOKEN: &str = "rt-1";

pub type TestClient = GatewayClient<MockTransport, InMemoryTokenProvider>;

/// Transport answering from a script and recording every call
#[derive(Default)]
pub struct MockTransport {
    calls: Mutex<HashMap<&'static str, usize>>,
    tokens_seen: Mutex<Vec<(&'static str, String)>>,
    rejections: Mutex<HashMap<&'static str, usize>>,
    rejected_tokens: Mutex<HashSet<String>>,
    failures: Mutex<HashMap<&'static str, fn() -> OmniKassaError>>,
    pages: Mutex<VecDeque<Result<MerchantOrderStatusResponse>>>,
    refreshes: AtomicUsize,
    refresh_tokens_seen: Mutex<Vec<String>>,
    refresh_failure: Mutex<Option<fn() -> OmniKassaError>>,
    refresh_delay: Mutex<Option<Duration>>,
    call_delay: Mutex<Option<Duration>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject the next `times` calls of `operation` with an invalid token
    pub fn reject(self, operation: &'static str, times: usize) -> Self {
        self.rejections.lock().unwrap().insert(operation, times);
        self
    }

    /// Reject every call made with `token`
    pub fn reject_token(self, token: &str) -> Self {
        self.rejected_tokens.lock().unwrap().insert(token.to_string());
        self
    }

    /// Fail every call of `operation` with the given error
    pub fn fail(self, operation: &'static str, error: fn() -> OmniKassaError) -> Self {
        self.failures.lock().unwrap().insert(operation, error);
        self
    }

    pub fn fail_refresh(self, error: fn() -> OmniKassaError) -> Self {
        *self.refresh_failure.lock().unwrap() = Some(error);
        self
    }

    pub fn with_refresh_delay(self, delay: Duration) -> Self {
        *self.refresh_delay.lock().unwrap() = Some(delay);
        self
    }

    pub fn with_call_delay(self, delay: Duration) -> Self {
        *self.call_delay.lock().unwrap() = Some(delay);
        self
    }

    /// Queue the answer of the next status page call
    pub fn push_page(self, page: Result<MerchantOrderStatusResponse>) -> Self {
        self.pages.lock().unwrap().push_back(page);
        self
    }

    pub fn calls(&self, operation: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .get(operation)
            .copied()
            .unwrap_or_default()
    }

    pub fn refreshes(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }

    /// Bearer tokens presented to `operation`, in call order
    pub fn tokens_seen(&self, operation: &str) -> Vec<String> {
        self.tokens_seen
            .lock()
            .unwrap()
            .iter()
            .filter(|(op, _)| *op == operation)
            .map(|(_, token)| token.clone())
            .collect()
    }

    pub fn refresh_tokens_seen(&self) -> Vec<String> {
        self.refresh_tokens_seen.lock().unwrap().clone()
    }

    async fn enter(&self, operation: &'static str, access_token: &str) -> Result<()> {
        *self.calls.lock().unwrap().entry(operation).or_default() += 1;
        self.tokens_seen
            .lock()
            .unwrap()
            .push((operation, access_token.to_string()));

        let delay = *self.call_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.rejected_tokens.lock().unwrap().contains(access_token) {
            return Err(OmniKassaError::InvalidAccessToken);
        }

        if let Some(remaining) = self.rejections.lock().unwrap().get_mut(operation) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(OmniKassaError::InvalidAccessToken);
            }
        }

        if let Some(error) = self.failures.lock().unwrap().get(operation) {
            return Err(error());
        }

        Ok(())
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn announce_order(
        &self,
        order: &MerchantOrder,
        access_token: &str,
    ) -> Result<MerchantOrderResponse> {
        self.enter("announce_order", access_token).await?;
        Ok(MerchantOrderResponse {
            redirect_url: format!("https://pay.example/{}", order.merchant_order_id),
            omnikassa_order_id: "OK-42".to_string(),
        })
    }

    async fn get_order_status_data(
        &self,
        _notification: &ApiNotification,
        access_token: &str,
    ) -> Result<MerchantOrderStatusResponse> {
        self.enter("get_order_status_data", access_token).await?;
        let next = self.pages.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(page(false, Vec::new())))
    }

    async fn get_order_by_id(
        &self,
        order_id: &str,
        access_token: &str,
    ) -> Result<OrderStatusResponse> {
        self.enter("get_order_by_id", access_token).await?;
        Ok(OrderStatusResponse {
            order: OrderStatusResult {
                id: order_id.to_string(),
                merchant_order_id: "ORDER-1".to_string(),
                status: PaymentStatus::Completed,
                total_amount: Money::new(Currency::EUR, 4999),
                transactions: Vec::new(),
            },
        })
    }

    async fn post_refund(
        &self,
        request: &InitiateRefundRequest,
        transaction_id: Uuid,
        request_id: Uuid,
        access_token: &str,
    ) -> Result<RefundDetailsResponse> {
        self.enter("post_refund", access_token).await?;
        Ok(refund(request_id, transaction_id, request.money))
    }

    async fn get_refund(
        &self,
        transaction_id: Uuid,
        refund_id: Uuid,
        access_token: &str,
    ) -> Result<RefundDetailsResponse> {
        self.enter("get_refund", access_token).await?;
        Ok(refund(refund_id, transaction_id, Money::new(Currency::EUR, 100)))
    }

    async fn get_refundable_details(
        &self,
        transaction_id: Uuid,
        access_token: &str,
    ) -> Result<TransactionRefundableDetailsResponse> {
        self.enter("get_refundable_details", access_token).await?;
        Ok(TransactionRefundableDetailsResponse {
            transaction_id,
            refundable_money: Money::new(Currency::EUR, 4999),
            expiry_datetime: "2026-12-31T23:59:59.000+01:00".to_string(),
        })
    }

    async fn retrieve_payment_brands(&self, access_token: &str) -> Result<PaymentBrandsResponse> {
        self.enter("retrieve_payment_brands", access_token).await?;
        Ok(PaymentBrandsResponse::default())
    }

    async fn retrieve_ideal_issuers(&self, access_token: &str) -> Result<IdealIssuersResponse> {
        self.enter("retrieve_ideal_issuers", access_token).await?;
        Ok(IdealIssuersResponse::default())
    }

    async fn get_shopper_payment_details(
        &self,
        _shopper_ref: &str,
        access_token: &str,
    ) -> Result<ShopperPaymentDetailsResponse> {
        self.enter("get_shopper_payment_details", access_token).await?;
        Ok(ShopperPaymentDetailsResponse::default())
    }

    async fn delete_shopper_payment_detail(
        &self,
        _id: &str,
        _shopper_ref: &str,
        access_token: &str,
    ) -> Result<()> {
        self.enter("delete_shopper_payment_detail", access_token).await
    }

    async fn refresh_access_token(&self, refresh_token: &str) -> Result<AccessToken> {
        let n = self.refreshes.fetch_add(1, Ordering::SeqCst) + 1;
        self.refresh_tokens_seen
            .lock()
            .unwrap()
            .push(refresh_token.to_string());

        let delay = *self.refresh_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(error) = *self.refresh_failure.lock().unwrap() {
            return Err(error());
        }

        // First refresh yields at-2 so a test can seed at-1 as the rejected token
        Ok(AccessToken::issued_now(format!("at-{}", n + 1), 3600))
    }
}

fn refund(refund_id: Uuid, transaction_id: Uuid, money: Money) -> RefundDetailsResponse {
    RefundDetailsResponse {
        refund_id,
        refund_transaction_id: None,
        created_at: "2026-10-14T10:00:00.000+02:00".to_string(),
        updated_at: None,
        refund_money: money,
        vat_category: None,
        payment_brand: None,
        status: RefundStatus::Pending,
        description: None,
        transaction_id,
    }
}

/// Client with an empty token provider
pub fn client(transport: MockTransport) -> TestClient {
    GatewayClient::with_parts(
        transport,
        InMemoryTokenProvider::new(REFRESH_TOKEN),
        SIGNING_KEY.to_vec(),
    )
}

/// Client already holding a token valid for an hour
pub fn client_with_token(transport: MockTransport, token: &str) -> TestClient {
    GatewayClient::with_parts(
        transport,
        InMemoryTokenProvider::new(REFRESH_TOKEN)
            .with_access_token(AccessToken::issued_now(token, 3600)),
        SIGNING_KEY.to_vec(),
    )
}

pub fn order() -> MerchantOrder {
    MerchantOrder::new(
        "ORDER-1",
        Money::new(Currency::EUR, 4999),
        "https://shop.example/return",
    )
}

pub fn order_result(merchant_order_id: &str) -> MerchantOrderResult {
    MerchantOrderResult {
        poi_id: 2004,
        merchant_order_id: merchant_order_id.to_string(),
        omnikassa_order_id: format!("ok-{}", merchant_order_id),
        order_status: "COMPLETED".to_string(),
        order_status_date_time: "2026-10-14T10:00:00.000+02:00".to_string(),
        error_code: None,
        paid_amount: Money::new(Currency::EUR, 4999),
        total_amount: Money::new(Currency::EUR, 4999),
        transactions: Vec::new(),
    }
}

/// Unsigned page; the mock transport performs no verification
pub fn page(more: bool, results: Vec<MerchantOrderResult>) -> MerchantOrderStatusResponse {
    MerchantOrderStatusResponse {
        more_order_results_available: more,
        order_results: results,
        signature: String::new(),
    }
}

/// Notification signed with [`SIGNING_KEY`]
pub fn signed_notification() -> ApiNotification {
    let mut notification = ApiNotification {
        authentication: "notification-token".to_string(),
        expiry: "2099-01-01T00:00:00.000+01:00".to_string(),
        event_name: omnikassa::notification::EVENT_MERCHANT_ORDER_STATUS_CHANGED.to_string(),
        poi_id: 2004,
        signature: String::new(),
    };
    notification.signature = omnikassa::SignatureVerifier::new(SIGNING_KEY.to_vec())
        .sign(&omnikassa::SignedPayload::signature_data(&notification))
        .unwrap();
    notification
}

pub fn transport_failure() -> OmniKassaError {
    OmniKassaError::transport("connection reset")
}

pub fn remote_error() -> OmniKassaError {
    OmniKassaError::remote_api("5017", "merchantOrderId is required")
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}
