//! Application configuration loaded from environment variables.

use gateway::VnpayConfig;
use gateway::config::SANDBOX_PAY_URL;

const DEFAULT_CLIENT_URL: &str = "http://localhost:3000";

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `DATABASE_URL`: PostgreSQL connection string; unset runs on the in-memory store
/// - `CLIENT_URL`: front-end origin payment redirects land on
/// - `VNP_TMN_CODE`, `VNP_HASH_SECRET`, `VNP_URL`, `VNP_RETURN_URL`: gateway block
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub database_url: Option<String>,
    pub client_url: String,
    pub vnpay: VnpayConfig,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let client_url = var("CLIENT_URL").unwrap_or_else(|| DEFAULT_CLIENT_URL.to_string());
        let return_url = var("VNP_RETURN_URL").unwrap_or_else(|| {
            format!(
                "{}/api/payments/vnpay/return",
                client_url.trim_end_matches('/')
            )
        });
        let vnpay = VnpayConfig::new(
            var("VNP_TMN_CODE").unwrap_or_default(),
            var("VNP_HASH_SECRET").unwrap_or_default(),
            return_url,
        )
        .with_pay_url(var("VNP_URL").unwrap_or_else(|| SANDBOX_PAY_URL.to_string()));

        Self {
            host: var("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: var("PORT").and_then(|p| p.parse().ok()).unwrap_or(3000),
            log_level: var("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            database_url: var("DATABASE_URL"),
            client_url,
            vnpay,
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.database_url, None);
        assert_eq!(config.client_url, "http://localhost:3000");
        assert_eq!(config.vnpay.pay_url, SANDBOX_PAY_URL);
        assert_eq!(
            config.vnpay.return_url,
            "http://localhost:3000/api/payments/vnpay/return"
        );
        assert!(!config.vnpay.is_configured());
    }

    #[test]
    fn test_addr_formatting() {
        let config = Config::from_lookup(lookup(&[("HOST", "127.0.0.1"), ("PORT", "8080")]));
        assert_eq!(config.addr(), "127.0.0.1:8080");
    }

    #[test]
    fn test_unparseable_port_falls_back() {
        let config = Config::from_lookup(lookup(&[("PORT", "eighty")]));
        assert_eq!(config.port, 3000);
    }

    #[test]
    fn test_gateway_block() {
        let config = Config::from_lookup(lookup(&[
            ("CLIENT_URL", "https://dine.example/"),
            ("VNP_TMN_CODE", "TMN01"),
            ("VNP_HASH_SECRET", "s3cret"),
            ("DATABASE_URL", "postgres://localhost/restaurant"),
        ]));
        assert!(config.vnpay.is_configured());
        assert_eq!(config.vnpay.tmn_code, "TMN01");
        assert_eq!(
            config.vnpay.return_url,
            "https://dine.example/api/payments/vnpay/return"
        );
        assert_eq!(
            config.database_url.as_deref(),
            Some("postgres://localhost/restaurant")
        );
    }
}
