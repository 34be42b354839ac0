//! Network exchanges with the gateway
//!
//! One HTTP request per operation. Authentication failures surface as
//! [`OmniKassaError::InvalidAccessToken`] so the client can tell them apart
//! from every other failure; signed responses are verified before they are
//! returned.

use crate::config::GatewayConfig;
use crate::notification::{ApiNotification, MerchantOrderStatusResponse};
use crate::signature::SignatureVerifier;
use crate::token::AccessToken;
use crate::types::*;
use crate::{OmniKassaError, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, TimeZone};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;
use uuid::Uuid;

pub const PATH_ANNOUNCE_ORDER: &str = "order/server/api/v2/order";
pub const PATH_GET_ORDER_STATUS: &str = "order/server/api/v2/events/results/";
pub const PATH_GET_ORDER_BY_ID: &str = "order/server/api/v2/orders/";
pub const PATH_GET_PAYMENT_BRANDS: &str = "order/server/api/payment-brands";
pub const PATH_GET_IDEAL_ISSUERS: &str = "ideal/server/api/v2/issuers";
pub const PATH_GET_ACCESS_TOKEN: &str = "gatekeeper/refresh";
pub const PATH_REFUND_TRANSACTIONS: &str = "order/server/api/v2/refund/transactions/";
pub const PATH_SHOPPERS: &str = "order/server/api/v2/shoppers/";

pub const HEADER_REFUND_REQUEST_ID: &str = "request-id";
pub const HEADER_USER_AGENT: &str = "X-Api-User-Agent";
pub const HEADER_PARTNER_REFERENCE: &str = "X-Api-Partner-Reference";

/// Field whose presence marks a response body as an error envelope
pub const ERROR_CODE_FIELD_NAME: &str = "errorCode";

/// Envelope code the gateway uses for a rejected or expired access token
pub const ERROR_CODE_INVALID_ACCESS_TOKEN: &str = "5001";

/// Characters escaped inside a single path segment
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// One call per remote operation, each taking the bearer token to use
#[async_trait]
pub trait Transport: Send + Sync {
    /// Announce an order and obtain the payment page URL
    async fn announce_order(
        &self,
        order: &MerchantOrder,
        access_token: &str,
    ) -> Result<MerchantOrderResponse>;

    /// Fetch one page of results for a notification.
    ///
    /// The events endpoint is authorized with the notification's own
    /// `authentication` token; `access_token` is what the client currently
    /// holds, for transports that authenticate the call differently.
    async fn get_order_status_data(
        &self,
        notification: &ApiNotification,
        access_token: &str,
    ) -> Result<MerchantOrderStatusResponse>;

    /// Look up an order by its gateway order id
    async fn get_order_by_id(&self, order_id: &str, access_token: &str)
        -> Result<OrderStatusResponse>;

    /// Initiate a refund, sending `request_id` as the idempotency key
    async fn post_refund(
        &self,
        request: &InitiateRefundRequest,
        transaction_id: Uuid,
        request_id: Uuid,
        access_token: &str,
    ) -> Result<RefundDetailsResponse>;

    /// Fetch the details of one refund
    async fn get_refund(
        &self,
        transaction_id: Uuid,
        refund_id: Uuid,
        access_token: &str,
    ) -> Result<RefundDetailsResponse>;

    /// Fetch the refundable amount of a transaction
    async fn get_refundable_details(
        &self,
        transaction_id: Uuid,
        access_token: &str,
    ) -> Result<TransactionRefundableDetailsResponse>;

    /// List the payment brands
    async fn retrieve_payment_brands(&self, access_token: &str) -> Result<PaymentBrandsResponse>;

    /// List the iDEAL issuers
    async fn retrieve_ideal_issuers(&self, access_token: &str) -> Result<IdealIssuersResponse>;

    /// List the stored cards of a shopper
    async fn get_shopper_payment_details(
        &self,
        shopper_ref: &str,
        access_token: &str,
    ) -> Result<ShopperPaymentDetailsResponse>;

    /// Delete a stored card of a shopper
    async fn delete_shopper_payment_detail(
        &self,
        id: &str,
        shopper_ref: &str,
        access_token: &str,
    ) -> Result<()>;

    /// Exchange the refresh token for a new access token
    async fn refresh_access_token(&self, refresh_token: &str) -> Result<AccessToken>;
}

/// Order body as sent: the order plus the moment it was sent
#[derive(Serialize)]
struct AnnounceRequest<'a> {
    #[serde(flatten)]
    order: &'a MerchantOrder,
    timestamp: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

/// Transport backed by reqwest
#[derive(Debug, Clone)]
pub struct HttpTransport {
    base_url: Url,
    client: Client,
    verifier: SignatureVerifier,
    user_agent: Option<String>,
    partner_reference: Option<String>,
}

impl HttpTransport {
    /// Create a transport from the gateway configuration
    pub fn new(config: &GatewayConfig) -> Result<Self> {
        let mut client_builder = Client::builder();

        if let Some(timeout) = config.timeout {
            client_builder = client_builder.timeout(timeout);
        }

        let client = client_builder
            .build()
            .map_err(|e| OmniKassaError::config(format!("Failed to create HTTP client: {}", e)))?;

        Self::with_client(config, client)
    }

    /// Create a transport reusing a caller-provided reqwest client
    pub fn with_client(config: &GatewayConfig, client: Client) -> Result<Self> {
        let mut base_url = config.base_url.clone();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }

        Ok(Self {
            base_url: Url::parse(&base_url)?,
            client,
            verifier: SignatureVerifier::new(config.signing_key.clone()),
            user_agent: config.user_agent.clone(),
            partner_reference: config.partner_reference.clone(),
        })
    }

    /// Base URL all paths are joined to
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path)?)
    }

    fn request(&self, method: reqwest::Method, url: Url, bearer: &str) -> RequestBuilder {
        let mut builder = self
            .client
            .request(method, url)
            .header(ACCEPT, "application/json")
            .header(AUTHORIZATION, format!("Bearer {}", bearer));

        if let Some(user_agent) = &self.user_agent {
            builder = builder.header(HEADER_USER_AGENT, user_agent);
        }
        if let Some(partner_reference) = &self.partner_reference {
            builder = builder.header(HEADER_PARTNER_REFERENCE, partner_reference);
        }

        builder
    }

    /// Send and return the body once it is known not to be an error
    async fn send_raw(&self, operation: &'static str, builder: RequestBuilder) -> Result<String> {
        debug!(operation, "sending request");

        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if let Err(e) = check_response(status, &body) {
            warn!(operation, status = status.as_u16(), error = %e, "request failed");
            return Err(e);
        }

        debug!(operation, status = status.as_u16(), "request succeeded");
        Ok(body)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        builder: RequestBuilder,
    ) -> Result<T> {
        let body = self.send_raw(operation, builder).await?;
        Ok(serde_json::from_str(&body)?)
    }
}

/// Classify a response before any attempt to read it as a success value
pub fn check_response(status: StatusCode, body: &str) -> Result<()> {
    if status == StatusCode::UNAUTHORIZED {
        return Err(OmniKassaError::InvalidAccessToken);
    }

    if let Ok(Value::Object(fields)) = serde_json::from_str::<Value>(body) {
        if let Some(code) = fields.get(ERROR_CODE_FIELD_NAME) {
            let code = match code {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            if code == ERROR_CODE_INVALID_ACCESS_TOKEN {
                return Err(OmniKassaError::InvalidAccessToken);
            }
            let message = ["errorMessage", "consumerMessage"]
                .iter()
                .find_map(|key| fields.get(*key).and_then(Value::as_str))
                .unwrap_or_default();
            return Err(OmniKassaError::remote_api(code, message));
        }
    }

    if !status.is_success() {
        return Err(OmniKassaError::UnexpectedStatus {
            status: status.as_u16(),
            body: body.to_string(),
        });
    }

    Ok(())
}

/// Send time of an order, with millisecond precision and a numeric offset
fn order_timestamp<Tz: TimeZone>(now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    now.to_rfc3339_opts(SecondsFormat::Millis, false)
}

fn segment(value: &str) -> String {
    utf8_percent_encode(value, PATH_SEGMENT).to_string()
}

#[async_trait]
impl Transport for HttpTransport {
    async fn announce_order(
        &self,
        order: &MerchantOrder,
        access_token: &str,
    ) -> Result<MerchantOrderResponse> {
        let body = AnnounceRequest {
            order,
            timestamp: order_timestamp(&chrono::Local::now()),
        };
        let builder = self
            .request(reqwest::Method::POST, self.url(PATH_ANNOUNCE_ORDER)?, access_token)
            .json(&body);
        self.send("announce_order", builder).await
    }

    async fn get_order_status_data(
        &self,
        notification: &ApiNotification,
        _access_token: &str,
    ) -> Result<MerchantOrderStatusResponse> {
        let url = self.url(&format!(
            "{}{}",
            PATH_GET_ORDER_STATUS,
            segment(&notification.event_name)
        ))?;
        let builder = self.request(reqwest::Method::GET, url, &notification.authentication);
        let page: MerchantOrderStatusResponse = self.send("get_order_status_data", builder).await?;
        self.verifier.verify(&page)?;
        Ok(page)
    }

    async fn get_order_by_id(
        &self,
        order_id: &str,
        access_token: &str,
    ) -> Result<OrderStatusResponse> {
        let url = self.url(&format!("{}{}", PATH_GET_ORDER_BY_ID, segment(order_id)))?;
        let builder = self.request(reqwest::Method::GET, url, access_token);
        self.send("get_order_by_id", builder).await
    }

    async fn post_refund(
        &self,
        request: &InitiateRefundRequest,
        transaction_id: Uuid,
        request_id: Uuid,
        access_token: &str,
    ) -> Result<RefundDetailsResponse> {
        let url = self.url(&format!(
            "{}{}/refunds",
            PATH_REFUND_TRANSACTIONS, transaction_id
        ))?;
        let builder = self
            .request(reqwest::Method::POST, url, access_token)
            .header(HEADER_REFUND_REQUEST_ID, request_id.to_string())
            .json(request);
        self.send("post_refund", builder).await
    }

    async fn get_refund(
        &self,
        transaction_id: Uuid,
        refund_id: Uuid,
        access_token: &str,
    ) -> Result<RefundDetailsResponse> {
        let url = self.url(&format!(
            "{}{}/refunds/{}",
            PATH_REFUND_TRANSACTIONS, transaction_id, refund_id
        ))?;
        let builder = self.request(reqwest::Method::GET, url, access_token);
        self.send("get_refund", builder).await
    }

    async fn get_refundable_details(
        &self,
        transaction_id: Uuid,
        access_token: &str,
    ) -> Result<TransactionRefundableDetailsResponse> {
        let url = self.url(&format!(
            "{}{}/refundable-details",
            PATH_REFUND_TRANSACTIONS, transaction_id
        ))?;
        let builder = self.request(reqwest::Method::GET, url, access_token);
        self.send("get_refundable_details", builder).await
    }

    async fn retrieve_payment_brands(&self, access_token: &str) -> Result<PaymentBrandsResponse> {
        let builder = self.request(
            reqwest::Method::GET,
            self.url(PATH_GET_PAYMENT_BRANDS)?,
            access_token,
        );
        self.send("retrieve_payment_brands", builder).await
    }

    async fn retrieve_ideal_issuers(&self, access_token: &str) -> Result<IdealIssuersResponse> {
        let builder = self.request(
            reqwest::Method::GET,
            self.url(PATH_GET_IDEAL_ISSUERS)?,
            access_token,
        );
        self.send("retrieve_ideal_issuers", builder).await
    }

    async fn get_shopper_payment_details(
        &self,
        shopper_ref: &str,
        access_token: &str,
    ) -> Result<ShopperPaymentDetailsResponse> {
        let url = self.url(&format!(
            "{}{}/payment-details",
            PATH_SHOPPERS,
            segment(shopper_ref)
        ))?;
        let builder = self.request(reqwest::Method::GET, url, access_token);
        self.send("get_shopper_payment_details", builder).await
    }

    async fn delete_shopper_payment_detail(
        &self,
        id: &str,
        shopper_ref: &str,
        access_token: &str,
    ) -> Result<()> {
        let url = self.url(&format!(
            "{}{}/payment-details/{}",
            PATH_SHOPPERS,
            segment(shopper_ref),
            segment(id)
        ))?;
        let builder = self.request(reqwest::Method::DELETE, url, access_token);
        self.send_raw("delete_shopper_payment_detail", builder).await?;
        Ok(())
    }

    async fn refresh_access_token(&self, refresh_token: &str) -> Result<AccessToken> {
        // The refresh token travels in the body, never as a bearer header
        let builder = self
            .client
            .post(self.url(PATH_GET_ACCESS_TOKEN)?)
            .header(ACCEPT, "application/json")
            .json(&RefreshRequest { refresh_token });
        self.send("refresh_access_token", builder).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_wins_over_success_status() {
        let err = check_response(
            StatusCode::OK,
            r#"{"errorCode":5017,"errorMessage":"merchantOrderId is required"}"#,
        )
        .unwrap_err();
        match err {
            OmniKassaError::RemoteApi { code, message } => {
                assert_eq!(code, "5017");
                assert_eq!(message, "merchantOrderId is required");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_invalid_token_detection() {
        assert!(matches!(
            check_response(StatusCode::UNAUTHORIZED, ""),
            Err(OmniKassaError::InvalidAccessToken)
        ));
        assert!(matches!(
            check_response(StatusCode::OK, r#"{"errorCode":5001,"errorMessage":"expired"}"#),
            Err(OmniKassaError::InvalidAccessToken)
        ));
    }

    #[test]
    fn test_consumer_message_fallback() {
        let err = check_response(
            StatusCode::BAD_REQUEST,
            r#"{"errorCode":"5002","consumerMessage":"Try again later"}"#,
        )
        .unwrap_err();
        assert!(matches!(err, OmniKassaError::RemoteApi { ref message, .. } if message == "Try again later"));
    }

    #[test]
    fn test_status_without_envelope() {
        assert!(matches!(
            check_response(StatusCode::BAD_GATEWAY, "<html>bad gateway</html>"),
            Err(OmniKassaError::UnexpectedStatus { status: 502, .. })
        ));
        assert!(check_response(StatusCode::NO_CONTENT, "").is_ok());
        assert!(check_response(StatusCode::OK, r#"{"issuers":[]}"#).is_ok());
    }

    #[test]
    fn test_order_timestamp_has_millisecond_precision() {
        let offset = chrono::FixedOffset::east_opt(2 * 3600).unwrap();
        let sent = offset
            .with_ymd_and_hms(2017, 8, 7, 16, 28, 51)
            .unwrap()
            + chrono::Duration::nanoseconds(504_123_456);
        assert_eq!(order_timestamp(&sent), "2017-08-07T16:28:51.504+02:00");

        let utc = chrono::Utc.with_ymd_and_hms(2026, 10, 14, 8, 0, 0).unwrap();
        assert_eq!(order_timestamp(&utc), "2026-10-14T08:00:00.000+00:00");
    }

    #[test]
    fn test_path_segments_are_escaped() {
        assert_eq!(segment("shopper 7/a"), "shopper%207%2Fa");
        assert_eq!(segment("merchant.order.status.changed"), "merchant.order.status.changed");
    }

    #[test]
    fn test_base_url_gets_trailing_slash() {
        let config = GatewayConfig::new("https://example/omnikassa-api", b"k".to_vec(), "rt");
        let transport = HttpTransport::new(&config).unwrap();
        assert_eq!(
            transport.url(PATH_ANNOUNCE_ORDER).unwrap().as_str(),
            "https://example/omnikassa-api/order/server/api/v2/order"
        );
    }
}
