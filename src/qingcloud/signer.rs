//! Request signing for the IaaS API (HMAC-SHA256 over the canonical query).

use std::collections::BTreeMap;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Percent-encodes `value`, keeping RFC 3986 unreserved characters.
pub(super) fn percent_encode(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

/// Joins parameters sorted by key as `key=value` pairs.
pub(super) fn canonical_query(params: &BTreeMap<String, String>) -> String {
    params
        .iter()
        .map(|(key, value)| format!("{}={}", percent_encode(key), percent_encode(value)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Signs `GET\n{uri}/\n{canonical}` with `secret`.
pub(super) fn sign(
    secret: &str,
    uri: &str,
    canonical: &str,
) -> Result<String, hmac::digest::InvalidLength> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())?;
    mac.update(format!("GET\n{uri}/\n{canonical}").as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}
