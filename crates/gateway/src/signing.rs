//! Canonical query construction and HMAC-SHA512 signing.

use hmac::{Hmac, Mac};
use sha2::Sha512;

use crate::{GatewayError, Result};

pub const SECURE_HASH: &str = "vnp_SecureHash";
pub const SECURE_HASH_TYPE: &str = "vnp_SecureHashType";

type HmacSha512 = Hmac<Sha512>;

/// Percent-encodes a key or value, writing spaces as `+`.
pub fn encode_component(raw: &str) -> String {
    urlencoding::encode(raw).replace("%20", "+")
}

/// Builds the string that gets signed.
///
/// Keys and values are encoded, sorted by encoded key and joined as a
/// query string. Empty values and the hash fields themselves are skipped.
pub fn canonical_query<'a, I>(params: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut pairs: Vec<(String, String)> = params
        .into_iter()
        .filter(|(key, value)| !value.is_empty() && *key != SECURE_HASH && *key != SECURE_HASH_TYPE)
        .map(|(key, value)| (encode_component(key), encode_component(value)))
        .collect();
    pairs.sort();
    pairs
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("&")
}

fn mac(secret: &str) -> Result<HmacSha512> {
    if secret.is_empty() {
        return Err(GatewayError::MissingSecret);
    }
    HmacSha512::new_from_slice(secret.as_bytes()).map_err(|_| GatewayError::MissingSecret)
}

/// Returns the lowercase hex HMAC-SHA512 of `data`.
pub fn sign(secret: &str, data: &str) -> Result<String> {
    let mut mac = mac(secret)?;
    mac.update(data.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Checks a hex signature in constant time. Hex case is ignored.
pub fn verify(secret: &str, data: &str, signature: &str) -> Result<()> {
    let mut mac = mac(secret)?;
    mac.update(data.as_bytes());
    let expected = hex::decode(signature).map_err(|_| GatewayError::InvalidSignature)?;
    mac.verify_slice(&expected)
        .map_err(|_| GatewayError::InvalidSignature)
}
