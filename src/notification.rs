//! Signed payloads: inbound webhook notifications and order status pages

use crate::signature::SignedPayload;
use crate::types::{Money, PaymentStatus, TransactionInfo};
use crate::Result;
use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

/// Event name announcing new order status results
pub const EVENT_MERCHANT_ORDER_STATUS_CHANGED: &str = "merchant.order.status.changed";

/// Notification pushed to the merchant's webhook.
///
/// It carries no results itself; it authorizes pulling them from the
/// events endpoint until no more are available.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiNotification {
    /// Token authorizing retrieval of the results
    pub authentication: String,
    /// Expiry of `authentication`, as received
    pub expiry: String,
    pub event_name: String,
    pub poi_id: i64,
    pub signature: String,
}

impl ApiNotification {
    /// Parse a raw webhook body
    pub fn from_json(body: &str) -> Result<Self> {
        Ok(serde_json::from_str(body)?)
    }

    /// Parsed expiry, if the raw string is a valid timestamp
    pub fn expiry_date_time(&self) -> Option<DateTime<Utc>> {
        parse_wire_date_time(&self.expiry)
    }

    /// Whether the authentication token has passed its expiry
    pub fn is_expired(&self) -> bool {
        self.expiry_date_time()
            .map(|expiry| expiry <= Utc::now())
            .unwrap_or(false)
    }
}

impl SignedPayload for ApiNotification {
    fn signature_data(&self) -> Vec<String> {
        vec![
            self.authentication.clone(),
            self.expiry.clone(),
            self.event_name.clone(),
            self.poi_id.to_string(),
        ]
    }

    fn signature(&self) -> &str {
        &self.signature
    }
}

/// Result and state of one order, as delivered on the events endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MerchantOrderResult {
    /// Webshop id, relevant when several shops share a webhook
    pub poi_id: i64,
    pub merchant_order_id: String,
    pub omnikassa_order_id: String,
    /// Raw status string
    pub order_status: String,
    /// Raw status timestamp
    pub order_status_date_time: String,
    #[serde(default)]
    pub error_code: Option<String>,
    pub paid_amount: Money,
    pub total_amount: Money,
    #[serde(default)]
    pub transactions: Vec<TransactionInfo>,
}

impl MerchantOrderResult {
    /// Typed order status; `None` for unknown values
    pub fn status(&self) -> Option<PaymentStatus> {
        PaymentStatus::from_wire(&self.order_status)
    }

    /// Parsed status timestamp
    pub fn status_date_time(&self) -> Option<DateTime<Utc>> {
        parse_wire_date_time(&self.order_status_date_time)
    }

    /// Canonical field order of an order result
    pub fn signature_data(&self) -> Vec<String> {
        let mut data = vec![
            self.merchant_order_id.clone(),
            self.omnikassa_order_id.clone(),
            self.poi_id.to_string(),
            self.order_status.clone(),
            self.order_status_date_time.clone(),
            self.error_code.clone().unwrap_or_default(),
            self.paid_amount.currency.as_str().to_string(),
            self.paid_amount.amount.to_string(),
            self.total_amount.currency.as_str().to_string(),
            self.total_amount.amount.to_string(),
        ];
        for transaction in &self.transactions {
            data.extend(transaction.signature_data());
        }
        data
    }
}

/// One page of order status results for a notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MerchantOrderStatusResponse {
    /// True when the same notification should be polled again
    pub more_order_results_available: bool,
    #[serde(default)]
    pub order_results: Vec<MerchantOrderResult>,
    pub signature: String,
}

impl SignedPayload for MerchantOrderStatusResponse {
    fn signature_data(&self) -> Vec<String> {
        let mut data = vec![self.more_order_results_available.to_string()];
        for result in &self.order_results {
            data.extend(result.signature_data());
        }
        data
    }

    fn signature(&self) -> &str {
        &self.signature
    }
}

/// Page of results as the poller sees it
pub type OrderStatusPage = MerchantOrderStatusResponse;

fn parse_wire_date_time(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::<FixedOffset>::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f%z"))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
