//! Request canonicalization and HMAC signing.

use crate::error::ClientError;
use crate::types::Params;
use base64::{engine::general_purpose::STANDARD, Engine};
use hmac::{Hmac, Mac};
use reqwest::Method;
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha512;
use urlencoding::encode;

type HmacSha512 = Hmac<Sha512>;

/// Date format expected in the `Date` header (RFC 2822).
pub const DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S %z";

/// Encode parameters in sorted order, RFC 3986 style (`%20`, never `+`).
pub fn canonical_params(params: &Params) -> String {
    params
        .iter()
        .map(|(key, value)| format!("{}={}", encode(key), encode(value)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Build the newline-joined string that gets signed.
pub fn canonicalize(
    date: &str,
    method: &Method,
    host: &str,
    path: &str,
    params: &Params,
) -> String {
    [
        date.to_string(),
        method.as_str().to_uppercase(),
        host.to_lowercase(),
        path.to_string(),
        canonical_params(params),
    ]
    .join("\n")
}

/// Produce the `Authorization` header value for a canonical request.
pub fn sign(ikey: &str, skey: &SecretString, canonical: &str) -> Result<String, ClientError> {
    let mut mac = HmacSha512::new_from_slice(skey.expose_secret().as_bytes())
        .map_err(|e| ClientError::Signing(e.to_string()))?;
    mac.update(canonical.as_bytes());
    let signature = hex::encode(mac.finalize().into_bytes());

    Ok(format!(
        "Basic {}",
        STANDARD.encode(format!("{}:{}", ikey, signature))
    ))
}
