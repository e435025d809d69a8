//! Acknowledgement bodies returned to the gateway's server-to-server
//! notification (IPN) endpoint.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IpnResponse {
    #[serde(rename = "RspCode")]
    pub rsp_code: &'static str,
    #[serde(rename = "Message")]
    pub message: &'static str,
}

impl IpnResponse {
    /// The notification was applied, or had already been applied.
    pub const fn confirmed() -> Self {
        Self {
            rsp_code: "00",
            message: "Confirm Success",
        }
    }

    /// The reference does not match any order or reservation.
    pub const fn not_found() -> Self {
        Self {
            rsp_code: "01",
            message: "Order not found",
        }
    }

    /// Processing failed; the gateway should retry later.
    pub const fn unhandled() -> Self {
        Self {
            rsp_code: "02",
            message: "Unhandled",
        }
    }

    /// The signature did not verify. Nothing was changed.
    pub const fn invalid_signature() -> Self {
        Self {
            rsp_code: "97",
            message: "Invalid signature",
        }
    }

    pub fn is_confirmed(&self) -> bool {
        self.rsp_code == "00"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_gateway_field_names() {
        let json = serde_json::to_value(IpnResponse::invalid_signature()).unwrap();
        assert_eq!(json, serde_json::json!({"RspCode": "97", "Message": "Invalid signature"}));
    }

    #[test]
    fn only_confirmed_is_success() {
        assert!(IpnResponse::confirmed().is_confirmed());
        assert!(!IpnResponse::not_found().is_confirmed());
        assert!(!IpnResponse::unhandled().is_confirmed());
    }
}
