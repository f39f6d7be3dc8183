//! Order, reconciliation and issuance error taxonomy.
//!
//! One enum covers every business failure the order subsystem can
//! surface. Each variant belongs to an [`ErrorKind`] that decides how
//! callers react (retry, treat as success, alert an operator).
//!
//! # HTTP Status Mapping
//!
//! | Error | HTTP Status |
//! |-------|-------------|
//! | OrderNotFound, OrderItemNotFound | 404 |
//! | OrderNotPaid, InvalidOrderNoItems, UnsupportedCredType | 400 |
//! | InvalidOrderRequest, InvalidOrderMetadataType | 400 |
//! | InvalidMobileProduct, InvalidVendor, InvalidUrl | 400 |
//! | NoStripeCheckoutSessionId, RadomProductIdNotFound | 400 |
//! | InvalidNCredsSingleUse, InvalidNCredsTlv2 | 400 |
//! | Notification payload errors (NoInvoiceLines, ...) | 400 |
//! | CredsAlreadySubmitted | 200 |
//! | CredsAlreadySubmittedMismatch, CredsAlreadyExist | 403 |
//! | NoMatchOrderReceipt, OrderExistsForReceipt | 409 |
//! | WebhookAuth | 401 |
//! | Vendor | 502 |
//! | Stored-state integrity errors, Repository | 500 |

use crate::domain::foundation::{DomainError, ErrorCode, OrderId};
use crate::domain::vendor::VendorError;

/// How a caller should treat an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Order, item or subscription absent.
    NotFound,
    /// Order in the wrong state, or a request that can never succeed.
    StateConflict,
    /// Vendor outage or throttling; vendor redelivery will retry.
    VendorTransient,
    /// Missing or malformed data needed for a computation.
    DataIntegrity,
    /// Issuance guard rejection.
    Quota,
    /// Webhook authentication failed.
    Unauthenticated,
    /// Storage or other infrastructure failure.
    Infrastructure,
}

/// Errors from order lifecycle, reconciliation, checkout and issuance.
#[derive(Debug, Clone, PartialEq)]
pub enum OrderError {
    // ── not found ──
    OrderNotFound,
    OrderItemNotFound,

    // ── state conflict / bad request ──
    OrderNotPaid,
    InvalidOrderNoItems,
    UnsupportedCredType,
    InvalidOrderRequest(String),
    InvalidOrderMetadataType { key: String },
    InvalidMobileProduct { product_id: String },
    InvalidVendor(String),
    NoStripeCheckoutSessionId,
    InvalidUrl(String),
    InvalidNCredsSingleUse,
    InvalidNCredsTlv2,
    RadomProductIdNotFound,

    // ── notification payload ──
    MalformedNotification(String),
    NoInvoiceLines,
    NoInvoiceSub,
    OrderIdMissing,
    InvalidSubPeriod,
    UmaSubIdMissing,
    UmaOrderIdMissing,
    UmaCouponIdMissing,
    UnknownAction(String),

    // ── quota / duplicate ──
    CredsAlreadySubmitted,
    CredsAlreadySubmittedMismatch,
    CredsAlreadyExist,

    // ── receipts ──
    NoMatchOrderReceipt,
    OrderExistsForReceipt(OrderId),

    // ── stored or fetched state integrity ──
    NumPerIntervalNotSet,
    InvalidNumPerInterval,
    NumIntervalsNotSet,
    InvalidNumIntervals,
    RadomInvalidNumAssocSubs(usize),
    RadomSubNotActive(String),
    InvalidVendorData(String),
    NoRowsChanged(String),

    // ── boundary ──
    WebhookAuth(String),
    Vendor(VendorError),
    Repository(String),
}

impl OrderError {
    pub fn invalid_order_request(reason: impl Into<String>) -> Self {
        OrderError::InvalidOrderRequest(reason.into())
    }

    pub fn invalid_metadata_type(key: impl Into<String>) -> Self {
        OrderError::InvalidOrderMetadataType { key: key.into() }
    }

    pub fn invalid_mobile_product(product_id: impl Into<String>) -> Self {
        OrderError::InvalidMobileProduct {
            product_id: product_id.into(),
        }
    }

    pub fn malformed(reason: impl Into<String>) -> Self {
        OrderError::MalformedNotification(reason.into())
    }

    pub fn invalid_vendor_data(reason: impl Into<String>) -> Self {
        OrderError::InvalidVendorData(reason.into())
    }

    pub fn webhook_auth(reason: impl Into<String>) -> Self {
        OrderError::WebhookAuth(reason.into())
    }

    pub fn repository(message: impl Into<String>) -> Self {
        OrderError::Repository(message.into())
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            OrderError::OrderNotFound => "ORDER_NOT_FOUND",
            OrderError::OrderItemNotFound => "ORDER_ITEM_NOT_FOUND",
            OrderError::OrderNotPaid => "ORDER_NOT_PAID",
            OrderError::InvalidOrderNoItems => "INVALID_ORDER_NO_ITEMS",
            OrderError::UnsupportedCredType => "UNSUPPORTED_CRED_TYPE",
            OrderError::InvalidOrderRequest(_) => "INVALID_ORDER_REQUEST",
            OrderError::InvalidOrderMetadataType { .. } => "INVALID_ORDER_METADATA_TYPE",
            OrderError::InvalidMobileProduct { .. } => "INVALID_MOBILE_PRODUCT",
            OrderError::InvalidVendor(_) => "INVALID_VENDOR",
            OrderError::NoStripeCheckoutSessionId => "NO_STRIPE_CHECKOUT_SESSION_ID",
            OrderError::InvalidUrl(_) => "INVALID_URL",
            OrderError::InvalidNCredsSingleUse => "INVALID_N_CREDS_SINGLE_USE",
            OrderError::InvalidNCredsTlv2 => "INVALID_N_CREDS_TLV2",
            OrderError::RadomProductIdNotFound => "RADOM_PRODUCT_ID_NOT_FOUND",
            OrderError::MalformedNotification(_) => "MALFORMED_NOTIFICATION",
            OrderError::NoInvoiceLines => "NO_INVOICE_LINES",
            OrderError::NoInvoiceSub => "NO_INVOICE_SUB",
            OrderError::OrderIdMissing => "ORDER_ID_MISSING",
            OrderError::InvalidSubPeriod => "INVALID_SUB_PERIOD",
            OrderError::UmaSubIdMissing => "UMA_SUB_ID_MISSING",
            OrderError::UmaOrderIdMissing => "UMA_ORDER_ID_MISSING",
            OrderError::UmaCouponIdMissing => "UMA_COUPON_ID_MISSING",
            OrderError::UnknownAction(_) => "UNKNOWN_ACTION",
            OrderError::CredsAlreadySubmitted => "CREDS_ALREADY_SUBMITTED",
            OrderError::CredsAlreadySubmittedMismatch => "CREDS_ALREADY_SUBMITTED_MISMATCH",
            OrderError::CredsAlreadyExist => "CREDS_ALREADY_EXIST",
            OrderError::NoMatchOrderReceipt => "NO_MATCH_ORDER_RECEIPT",
            OrderError::OrderExistsForReceipt(_) => "ORDER_EXISTS_FOR_RECEIPT",
            OrderError::NumPerIntervalNotSet => "NUM_PER_INTERVAL_NOT_SET",
            OrderError::InvalidNumPerInterval => "INVALID_NUM_PER_INTERVAL",
            OrderError::NumIntervalsNotSet => "NUM_INTERVALS_NOT_SET",
            OrderError::InvalidNumIntervals => "INVALID_NUM_INTERVALS",
            OrderError::RadomInvalidNumAssocSubs(_) => "RADOM_INVALID_NUM_ASSOC_SUBS",
            OrderError::RadomSubNotActive(_) => "RADOM_SUB_NOT_ACTIVE",
            OrderError::InvalidVendorData(_) => "INVALID_VENDOR_DATA",
            OrderError::NoRowsChanged(_) => "NO_ROWS_CHANGED",
            OrderError::WebhookAuth(_) => "WEBHOOK_AUTH",
            OrderError::Vendor(_) => "VENDOR",
            OrderError::Repository(_) => "REPOSITORY",
        }
    }

    /// Returns a message safe to show to API callers.
    pub fn message(&self) -> String {
        match self {
            OrderError::OrderNotFound => "Order not found".to_string(),
            OrderError::OrderItemNotFound => "Order item not found".to_string(),
            OrderError::OrderNotPaid => "Order is not paid".to_string(),
            OrderError::InvalidOrderNoItems => "Order has no items".to_string(),
            OrderError::UnsupportedCredType => {
                "Credential type is not supported for this operation".to_string()
            }
            OrderError::InvalidOrderRequest(reason) => format!("Invalid order request: {}", reason),
            OrderError::InvalidOrderMetadataType { key } => {
                format!("Unsupported metadata value type for key '{}'", key)
            }
            OrderError::InvalidMobileProduct { product_id } => {
                format!("Unknown mobile product '{}'", product_id)
            }
            OrderError::InvalidVendor(vendor) => format!("Invalid vendor '{}'", vendor),
            OrderError::NoStripeCheckoutSessionId => {
                "Order has no Stripe checkout session".to_string()
            }
            OrderError::InvalidUrl(reason) => format!("Invalid url: {}", reason),
            OrderError::InvalidNCredsSingleUse => {
                "Too many credentials requested for single-use item".to_string()
            }
            OrderError::InvalidNCredsTlv2 => {
                "Too many credentials requested for time-limited-v2 item".to_string()
            }
            OrderError::RadomProductIdNotFound => {
                "Order item has no Radom product id".to_string()
            }
            OrderError::MalformedNotification(reason) => {
                format!("Malformed notification: {}", reason)
            }
            OrderError::NoInvoiceLines => "Invoice has no lines".to_string(),
            OrderError::NoInvoiceSub => "Invoice has no subscription".to_string(),
            OrderError::OrderIdMissing => "Order id missing from vendor metadata".to_string(),
            OrderError::InvalidSubPeriod => "Invalid subscription period".to_string(),
            OrderError::UmaSubIdMissing => "Linked subscription id missing".to_string(),
            OrderError::UmaOrderIdMissing => "Linked order id missing".to_string(),
            OrderError::UmaCouponIdMissing => "Linked coupon id missing".to_string(),
            OrderError::UnknownAction(action) => format!("Unknown notification action '{}'", action),
            OrderError::CredsAlreadySubmitted => "Credentials already submitted".to_string(),
            OrderError::CredsAlreadySubmittedMismatch => {
                "Credentials already submitted under a different request".to_string()
            }
            OrderError::CredsAlreadyExist => {
                "Credential batch limit reached for this interval".to_string()
            }
            OrderError::NoMatchOrderReceipt => "Receipt belongs to a different order".to_string(),
            OrderError::OrderExistsForReceipt(id) => {
                format!("An order already exists for this receipt: {}", id)
            }
            OrderError::NumPerIntervalNotSet => "numPerInterval is not set".to_string(),
            OrderError::InvalidNumPerInterval => "numPerInterval is invalid".to_string(),
            OrderError::NumIntervalsNotSet => "numIntervals is not set".to_string(),
            OrderError::InvalidNumIntervals => "numIntervals is invalid".to_string(),
            OrderError::RadomInvalidNumAssocSubs(n) => {
                format!("Expected one Radom subscription for session, found {}", n)
            }
            OrderError::RadomSubNotActive(status) => {
                format!("Radom subscription is not active: {}", status)
            }
            OrderError::InvalidVendorData(reason) => format!("Invalid vendor data: {}", reason),
            OrderError::NoRowsChanged(what) => format!("No rows changed: {}", what),
            OrderError::WebhookAuth(reason) => format!("Webhook authentication failed: {}", reason),
            OrderError::Vendor(err) => format!("Vendor error: {}", err),
            OrderError::Repository(_) => "Internal storage error".to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            OrderError::OrderNotFound | OrderError::OrderItemNotFound => ErrorKind::NotFound,

            OrderError::OrderNotPaid
            | OrderError::InvalidOrderNoItems
            | OrderError::UnsupportedCredType
            | OrderError::InvalidOrderRequest(_)
            | OrderError::InvalidOrderMetadataType { .. }
            | OrderError::InvalidMobileProduct { .. }
            | OrderError::InvalidVendor(_)
            | OrderError::NoStripeCheckoutSessionId
            | OrderError::InvalidUrl(_)
            | OrderError::RadomProductIdNotFound
            | OrderError::NoMatchOrderReceipt
            | OrderError::OrderExistsForReceipt(_) => ErrorKind::StateConflict,

            OrderError::InvalidNCredsSingleUse
            | OrderError::InvalidNCredsTlv2
            | OrderError::CredsAlreadySubmitted
            | OrderError::CredsAlreadySubmittedMismatch
            | OrderError::CredsAlreadyExist => ErrorKind::Quota,

            OrderError::MalformedNotification(_)
            | OrderError::NoInvoiceLines
            | OrderError::NoInvoiceSub
            | OrderError::OrderIdMissing
            | OrderError::InvalidSubPeriod
            | OrderError::UmaSubIdMissing
            | OrderError::UmaOrderIdMissing
            | OrderError::UmaCouponIdMissing
            | OrderError::UnknownAction(_)
            | OrderError::NumPerIntervalNotSet
            | OrderError::InvalidNumPerInterval
            | OrderError::NumIntervalsNotSet
            | OrderError::InvalidNumIntervals
            | OrderError::RadomInvalidNumAssocSubs(_)
            | OrderError::RadomSubNotActive(_)
            | OrderError::InvalidVendorData(_)
            | OrderError::NoRowsChanged(_) => ErrorKind::DataIntegrity,

            OrderError::WebhookAuth(_) => ErrorKind::Unauthenticated,
            OrderError::Vendor(err) if err.is_retryable() => ErrorKind::VendorTransient,
            OrderError::Vendor(_) => ErrorKind::Infrastructure,
            OrderError::Repository(_) => ErrorKind::Infrastructure,
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            OrderError::OrderNotFound | OrderError::OrderItemNotFound => 404,
            OrderError::CredsAlreadySubmitted => 200,
            OrderError::CredsAlreadySubmittedMismatch | OrderError::CredsAlreadyExist => 403,
            OrderError::NoMatchOrderReceipt | OrderError::OrderExistsForReceipt(_) => 409,
            OrderError::WebhookAuth(_) => 401,
            OrderError::Vendor(_) => 502,
            OrderError::NumPerIntervalNotSet
            | OrderError::InvalidNumPerInterval
            | OrderError::NumIntervalsNotSet
            | OrderError::InvalidNumIntervals
            | OrderError::RadomInvalidNumAssocSubs(_)
            | OrderError::RadomSubNotActive(_)
            | OrderError::InvalidVendorData(_)
            | OrderError::NoRowsChanged(_)
            | OrderError::Repository(_) => 500,
            _ => 400,
        }
    }

    /// Returns true if redelivering the same input may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            OrderError::Vendor(err) => err.is_retryable(),
            OrderError::Repository(_) => true,
            _ => false,
        }
    }

    /// Duplicate submission under the same request id; the caller already has what it asked for.
    pub fn is_already_satisfied(&self) -> bool {
        matches!(self, OrderError::CredsAlreadySubmitted)
    }
}

impl std::fmt::Display for OrderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderError::Repository(msg) => write!(f, "{}: {}", self.code(), msg),
            _ => write!(f, "{}: {}", self.code(), self.message()),
        }
    }
}

impl std::error::Error for OrderError {}

impl From<DomainError> for OrderError {
    fn from(err: DomainError) -> Self {
        match err.code {
            ErrorCode::OrderNotFound => OrderError::OrderNotFound,
            ErrorCode::OrderItemNotFound => OrderError::OrderItemNotFound,
            ErrorCode::NoRowsChanged => OrderError::NoRowsChanged(err.message),
            _ => OrderError::Repository(err.to_string()),
        }
    }
}

impl From<VendorError> for OrderError {
    fn from(err: VendorError) -> Self {
        OrderError::Vendor(err)
    }
}

impl From<OrderError> for DomainError {
    fn from(err: OrderError) -> Self {
        let code = match err.kind() {
            ErrorKind::NotFound => ErrorCode::OrderNotFound,
            ErrorKind::StateConflict => ErrorCode::ValidationFailed,
            ErrorKind::Quota => ErrorCode::Forbidden,
            ErrorKind::Unauthenticated => ErrorCode::Unauthorized,
            ErrorKind::VendorTransient => ErrorCode::VendorError,
            ErrorKind::DataIntegrity | ErrorKind::Infrastructure => ErrorCode::InternalError,
        };
        DomainError::new(code, err.message()).with_detail("code", err.code())
    }
}
