//! Request and response values exchanged with the gateway

use crate::{OmniKassaError, Result};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// ISO 4217 currencies accepted by the gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Currency {
    EUR,
    USD,
    GBP,
    CHF,
    DKK,
    NOK,
    SEK,
    PLN,
    AUD,
    CAD,
    JPY,
}

impl Currency {
    /// Wire representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::EUR => "EUR",
            Currency::USD => "USD",
            Currency::GBP => "GBP",
            Currency::CHF => "CHF",
            Currency::DKK => "DKK",
            Currency::NOK => "NOK",
            Currency::SEK => "SEK",
            Currency::PLN => "PLN",
            Currency::AUD => "AUD",
            Currency::CAD => "CAD",
            Currency::JPY => "JPY",
        }
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Amount in minor units (cents)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    pub currency: Currency,
    pub amount: i64,
}

impl Money {
    /// Amount in minor units
    pub fn new(currency: Currency, amount: i64) -> Self {
        Self { currency, amount }
    }

    /// Convert a major-unit amount such as `10.99` to cents
    pub fn from_decimal(currency: Currency, value: Decimal) -> Result<Self> {
        let cents = value * Decimal::from(100);
        if !cents.fract().is_zero() {
            return Err(OmniKassaError::config(format!(
                "Amount {} has more than two decimals",
                value
            )));
        }
        let amount = cents
            .to_i64()
            .ok_or_else(|| OmniKassaError::config(format!("Amount {} out of range", value)))?;
        Ok(Self { currency, amount })
    }

    /// Major-unit value of this amount
    pub fn to_decimal(&self) -> Decimal {
        Decimal::new(self.amount, 2)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Language {
    NL,
    EN,
    FR,
    DE,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentBrand {
    Ideal,
    Afterpay,
    Paypal,
    Mastercard,
    Visa,
    Bancontact,
    Maestro,
    VPay,
    Cards,
    ApplePay,
    Sofort,
}

/// Whether the shopper may choose another brand than the one requested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentBrandForce {
    ForceOnce,
    ForceAlways,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequiredCheckoutField {
    CustomerInformation,
    BillingAddress,
    ShippingAddress,
}

/// VAT category; the gateway encodes these as numeric strings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VatCategory {
    #[serde(rename = "1")]
    High,
    #[serde(rename = "2")]
    Low,
    #[serde(rename = "3")]
    Zero,
    #[serde(rename = "4")]
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemCategory {
    Physical,
    Digital,
}

/// Final state of an order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Completed,
    Cancelled,
    Expired,
    InProgress,
    #[serde(other)]
    Unknown,
}

impl PaymentStatus {
    /// Parse the wire string; `None` for values this client does not know
    pub fn from_wire(raw: &str) -> Option<Self> {
        match raw {
            "COMPLETED" => Some(Self::Completed),
            "CANCELLED" => Some(Self::Cancelled),
            "EXPIRED" => Some(Self::Expired),
            "IN_PROGRESS" => Some(Self::InProgress),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Success,
    Cancelled,
    Expired,
    Failure,
    Open,
    New,
    Accepted,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Payment,
    Refund,
    Authorize,
    Capture,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RefundStatus {
    Pending,
    Succeeded,
    Failed,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CardStatus {
    Active,
    Inactive,
    Deleted,
    Suspended,
    #[serde(other)]
    Unknown,
}

/// Line item of an order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub quantity: u32,
    pub amount: Money,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tax: Option<Money>,
    pub category: ItemCategory,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vat_category: Option<VatCategory>,
}

impl OrderItem {
    /// Line item without optional fields
    pub fn new(name: impl Into<String>, quantity: u32, amount: Money, category: ItemCategory) -> Self {
        Self {
            id: None,
            name: name.into(),
            description: None,
            quantity,
            amount,
            tax: None,
            category,
            vat_category: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub first_name: Option<String>,
    pub middle_name: Option<String>,
    pub last_name: String,
    pub street: String,
    pub house_number: Option<String>,
    pub house_number_addition: Option<String>,
    pub postal_code: String,
    pub city: String,
    pub country_code: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerInformation {
    pub email_address: Option<String>,
    /// `dd-MM-yyyy`
    pub date_of_birth: Option<String>,
    /// `M` or `F`
    pub gender: Option<String>,
    pub initials: Option<String>,
    pub telephone_number: Option<String>,
    pub full_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FastCheckout {
    pub required_checkout_fields: Vec<RequiredCheckoutField>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentBrandMetaData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fast_checkout: Option<FastCheckout>,
}

/// Order announced to the gateway before redirecting the shopper
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MerchantOrder {
    pub merchant_order_id: String,
    pub amount: Money,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<Language>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "merchantReturnURL")]
    pub merchant_return_url: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub order_items: Vec<OrderItem>,
    #[serde(rename = "shippingDetail", skip_serializing_if = "Option::is_none")]
    pub shipping_details: Option<Address>,
    #[serde(rename = "billingDetail", skip_serializing_if = "Option::is_none")]
    pub billing_details: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_information: Option<CustomerInformation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_brand: Option<PaymentBrand>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_brand_force: Option<PaymentBrandForce>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_brand_meta_data: Option<PaymentBrandMetaData>,
    #[serde(rename = "shopperRef", skip_serializing_if = "Option::is_none")]
    pub shopper_reference: Option<String>,
    #[serde(default)]
    pub skip_hpp_result_page: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipping_cost: Option<Money>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initiating_party: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shopper_bankstatement_reference: Option<String>,
}

impl MerchantOrder {
    /// Order with the required fields; everything else can be set directly
    pub fn new(
        merchant_order_id: impl Into<String>,
        amount: Money,
        merchant_return_url: impl Into<String>,
    ) -> Self {
        Self {
            merchant_order_id: merchant_order_id.into(),
            amount,
            language: None,
            description: None,
            merchant_return_url: merchant_return_url.into(),
            order_items: Vec::new(),
            shipping_details: None,
            billing_details: None,
            customer_information: None,
            payment_brand: None,
            payment_brand_force: None,
            payment_brand_meta_data: None,
            shopper_reference: None,
            skip_hpp_result_page: false,
            shipping_cost: None,
            initiating_party: None,
            shopper_bankstatement_reference: None,
        }
    }
}

/// Result of announcing an order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MerchantOrderResponse {
    /// Hosted payment page to redirect the shopper to
    #[serde(default)]
    pub redirect_url: String,
    pub omnikassa_order_id: String,
}

/// Transaction attached to an order.
///
/// Status, type and timestamps are kept as received because they are part
/// of the signed field list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionInfo {
    pub id: String,
    #[serde(default)]
    pub payment_brand: Option<String>,
    #[serde(rename = "type")]
    pub transaction_type: String,
    pub status: String,
    pub amount: Money,
    #[serde(default)]
    pub confirmed_amount: Option<Money>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub last_update_time: Option<String>,
}

impl TransactionInfo {
    /// Typed transaction status
    pub fn transaction_status(&self) -> TransactionStatus {
        serde_json::from_value(serde_json::Value::String(self.status.clone()))
            .unwrap_or(TransactionStatus::Unknown)
    }

    /// Typed transaction type
    pub fn kind(&self) -> TransactionType {
        serde_json::from_value(serde_json::Value::String(self.transaction_type.clone()))
            .unwrap_or(TransactionType::Unknown)
    }

    /// Canonical field order of a transaction inside an order result
    pub fn signature_data(&self) -> Vec<String> {
        let (confirmed_currency, confirmed_amount) = match &self.confirmed_amount {
            Some(money) => (money.currency.as_str().to_string(), money.amount.to_string()),
            None => (String::new(), String::new()),
        };
        vec![
            self.id.clone(),
            self.payment_brand.clone().unwrap_or_default(),
            self.transaction_type.clone(),
            self.status.clone(),
            self.amount.currency.as_str().to_string(),
            self.amount.amount.to_string(),
            confirmed_currency,
            confirmed_amount,
            self.start_time.clone().unwrap_or_default(),
            self.last_update_time.clone().unwrap_or_default(),
        ]
    }
}

/// Order looked up by its gateway id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderStatusResult {
    pub id: String,
    pub merchant_order_id: String,
    pub status: PaymentStatus,
    pub total_amount: Money,
    #[serde(default)]
    pub transactions: Vec<TransactionInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderStatusResponse {
    pub order: OrderStatusResult,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiateRefundRequest {
    pub money: Money,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vat_category: Option<VatCategory>,
}

impl InitiateRefundRequest {
    /// Refund of `money` without description or VAT category
    pub fn new(money: Money) -> Self {
        Self {
            money,
            description: None,
            vat_category: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundDetailsResponse {
    pub refund_id: Uuid,
    #[serde(default)]
    pub refund_transaction_id: Option<Uuid>,
    pub created_at: String,
    #[serde(default)]
    pub updated_at: Option<String>,
    pub refund_money: Money,
    #[serde(default)]
    pub vat_category: Option<VatCategory>,
    #[serde(default)]
    pub payment_brand: Option<String>,
    pub status: RefundStatus,
    #[serde(default)]
    pub description: Option<String>,
    pub transaction_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRefundableDetailsResponse {
    pub transaction_id: Uuid,
    pub refundable_money: Money,
    pub expiry_datetime: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentBrandInfo {
    pub name: String,
    pub status: String,
}

impl PaymentBrandInfo {
    /// Whether the brand can currently be used
    pub fn is_active(&self) -> bool {
        self.status.eq_ignore_ascii_case("active")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentBrandsResponse {
    #[serde(default)]
    pub payment_brands: Vec<PaymentBrandInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdealIssuerLogo {
    pub url: String,
    pub mime_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdealIssuer {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub logos: Vec<IdealIssuerLogo>,
    #[serde(default)]
    pub country_names: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdealIssuersResponse {
    #[serde(default)]
    pub issuers: Vec<IdealIssuer>,
}

/// Stored card token of a shopper
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardOnFile {
    pub id: String,
    pub last4_digits: String,
    pub brand: String,
    /// `yyyy-MM`
    pub card_expiry: String,
    /// `yyyy-MM`
    pub token_expiry: String,
    pub status: CardStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShopperPaymentDetailsResponse {
    #[serde(default)]
    pub card_on_file_list: Vec<CardOnFile>,
}
