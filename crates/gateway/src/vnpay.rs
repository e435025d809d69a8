use chrono::{DateTime, Duration, Utc};
use common::Money;

use crate::{
    CallbackParams, GatewayError, PaymentGateway, PaymentRequest, Result, TxnRef, VerifiedCallback,
    VnpayConfig,
    signing::{self, SECURE_HASH},
};

const VERSION: &str = "2.1.0";
const COMMAND: &str = "pay";
const CURRENCY: &str = "VND";
const LOCALE: &str = "vn";
const ORDER_TYPE: &str = "other";
const SUCCESS_CODE: &str = "00";

/// VNPay amounts are sent as VND x 100.
const AMOUNT_SCALE: i64 = 100;

/// Gateway timestamps are Vietnam local time (UTC+7).
const LOCAL_OFFSET_HOURS: i64 = 7;

/// VNPay implementation of [`PaymentGateway`].
#[derive(Debug, Clone)]
pub struct VnpayGateway {
    config: VnpayConfig,
}

impl VnpayGateway {
    pub fn new(config: VnpayConfig) -> Self {
        if !config.is_configured() {
            tracing::warn!("VNPay merchant credentials are not set; payment links will be rejected");
        }
        Self { config }
    }

    pub fn config(&self) -> &VnpayConfig {
        &self.config
    }

    /// Signs a parameter set the way the gateway does and stores the hash
    /// under `vnp_SecureHash`.
    pub fn sign_params(&self, params: &mut CallbackParams) -> Result<()> {
        let query = signing::canonical_query(params.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        let hash = signing::sign(&self.config.hash_secret, &query)?;
        params.insert(SECURE_HASH.to_string(), hash);
        Ok(())
    }
}

/// Formats a timestamp as `yyyyMMddHHmmss` in gateway local time.
pub fn format_gateway_time(at: DateTime<Utc>) -> String {
    (at + Duration::hours(LOCAL_OFFSET_HOURS))
        .format("%Y%m%d%H%M%S")
        .to_string()
}

/// Maps loopback and IPv4-mapped IPv6 addresses to plain IPv4.
pub fn normalize_client_ip(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "::1" {
        return "127.0.0.1".to_string();
    }
    trimmed
        .strip_prefix("::ffff:")
        .unwrap_or(trimmed)
        .to_string()
}

impl PaymentGateway for VnpayGateway {
    fn build_payment_url(&self, request: &PaymentRequest) -> Result<String> {
        let amount = request.amount.amount();
        if amount <= 0 {
            return Err(GatewayError::InvalidAmount(amount));
        }

        let mut params: Vec<(&str, String)> = vec![
            ("vnp_Version", VERSION.to_string()),
            ("vnp_Command", COMMAND.to_string()),
            ("vnp_TmnCode", self.config.tmn_code.clone()),
            ("vnp_Amount", (amount * AMOUNT_SCALE).to_string()),
            ("vnp_CreateDate", format_gateway_time(request.created_at)),
            ("vnp_CurrCode", CURRENCY.to_string()),
            ("vnp_IpAddr", normalize_client_ip(&request.client_ip)),
            ("vnp_Locale", LOCALE.to_string()),
            ("vnp_OrderInfo", request.order_info.clone()),
            ("vnp_OrderType", ORDER_TYPE.to_string()),
            ("vnp_ReturnUrl", self.config.return_url.clone()),
            ("vnp_TxnRef", request.reference.to_string()),
        ];
        if let Some(bank_code) = &request.bank_code {
            params.push(("vnp_BankCode", bank_code.clone()));
        }

        let query = signing::canonical_query(params.iter().map(|(k, v)| (*k, v.as_str())));
        let hash = signing::sign(&self.config.hash_secret, &query)?;

        tracing::debug!(reference = %request.reference, amount, "built payment url");
        Ok(format!(
            "{}?{}&{}={}",
            self.config.pay_url, query, SECURE_HASH, hash
        ))
    }

    fn verify_callback(&self, params: &CallbackParams) -> Result<VerifiedCallback> {
        let signature = params
            .get(SECURE_HASH)
            .filter(|s| !s.is_empty())
            .ok_or(GatewayError::InvalidSignature)?;

        let query = signing::canonical_query(params.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        signing::verify(&self.config.hash_secret, &query, signature)?;

        let raw_reference = params
            .get("vnp_TxnRef")
            .ok_or(GatewayError::MissingField("vnp_TxnRef"))?;
        let reference: TxnRef = raw_reference.parse()?;

        let response_code = params.get("vnp_ResponseCode").cloned().unwrap_or_default();
        let amount = params
            .get("vnp_Amount")
            .and_then(|raw| raw.parse::<i64>().ok())
            .map(|scaled| Money::vnd(scaled / AMOUNT_SCALE));
        let transaction_no = params
            .get("vnp_TransactionNo")
            .filter(|s| !s.is_empty())
            .cloned();

        Ok(VerifiedCallback {
            reference,
            success: response_code == SUCCESS_CODE,
            response_code,
            amount,
            transaction_no,
        })
    }
}
