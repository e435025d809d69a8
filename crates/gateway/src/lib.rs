//! VNPay payment gateway adapter.
//!
//! Builds signed redirect URLs for outbound payments and verifies the
//! signature of inbound return/IPN callbacks. Nothing here touches
//! persistence; reconciliation happens in the domain crate.

pub mod config;
pub mod error;
pub mod ipn;
pub mod reference;
pub mod signing;
pub mod vnpay;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use common::Money;

pub use config::VnpayConfig;
pub use error::{GatewayError, Result};
pub use ipn::IpnResponse;
pub use reference::TxnRef;
pub use vnpay::VnpayGateway;

/// Raw callback parameters as received on the query string.
pub type CallbackParams = BTreeMap<String, String>;

/// An outbound payment to be redirected to the gateway.
#[derive(Debug, Clone)]
pub struct PaymentRequest {
    pub reference: TxnRef,
    pub amount: Money,
    pub order_info: String,
    pub client_ip: String,
    pub bank_code: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Outcome of a callback whose signature checked out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedCallback {
    pub reference: TxnRef,
    /// True only when the gateway reported response code `00`.
    pub success: bool,
    pub response_code: String,
    pub amount: Option<Money>,
    pub transaction_no: Option<String>,
}

/// Seam between the engines and a concrete payment provider.
pub trait PaymentGateway: Send + Sync {
    /// Returns the URL the customer should be redirected to.
    fn build_payment_url(&self, request: &PaymentRequest) -> Result<String>;

    /// Verifies a callback signature and decodes its reference.
    ///
    /// Returns `InvalidSignature` when the hash does not match and
    /// `UnrecognizedReference` when the reference cannot be decoded.
    fn verify_callback(&self, params: &CallbackParams) -> Result<VerifiedCallback>;
}
