use serde::{Deserialize, Serialize};

/// Default sandbox payment page.
pub const SANDBOX_PAY_URL: &str = "https://sandbox.vnpayment.vn/paymentv2/vpcpay.html";

/// Merchant settings for the VNPay adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VnpayConfig {
    /// Merchant terminal code (`vnp_TmnCode`).
    pub tmn_code: String,
    /// Shared HMAC secret.
    #[serde(skip_serializing)]
    pub hash_secret: String,
    /// Gateway payment page.
    pub pay_url: String,
    /// Where the gateway sends the customer back to.
    pub return_url: String,
}

impl VnpayConfig {
    pub fn new(
        tmn_code: impl Into<String>,
        hash_secret: impl Into<String>,
        return_url: impl Into<String>,
    ) -> Self {
        Self {
            tmn_code: tmn_code.into(),
            hash_secret: hash_secret.into(),
            pay_url: SANDBOX_PAY_URL.to_string(),
            return_url: return_url.into(),
        }
    }

    pub fn with_pay_url(mut self, pay_url: impl Into<String>) -> Self {
        self.pay_url = pay_url.into();
        self
    }

    /// Returns true when both merchant credentials are present.
    pub fn is_configured(&self) -> bool {
        !self.tmn_code.is_empty() && !self.hash_secret.is_empty()
    }
}
