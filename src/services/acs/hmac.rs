//! HMAC-SHA256 request signing for the ACS REST API (access-key auth).
//!
//! string-to-sign: `"{METHOD}\n{path?query}\n{x-ms-date};{host};{x-ms-content-sha256}"`

use base64::Engine as _;
use chrono::{DateTime, Utc};
use ::hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use url::Url;

type HmacSha256 = Hmac<Sha256>;

/// Headers to attach to a signed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedHeaders {
    pub date: String,
    pub content_hash: String,
    pub authorization: String,
}

/// Keyed MAC prepared once from the decoded access key.
#[derive(Clone)]
pub struct HmacSigner {
    mac: HmacSha256,
}

impl std::fmt::Debug for HmacSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // key material is not printable
        f.write_str("HmacSigner(..)")
    }
}

impl HmacSigner {
    pub fn new(key: &[u8]) -> Option<Self> {
        HmacSha256::new_from_slice(key)
            .ok()
            .map(|mac| Self { mac })
    }

    pub fn sign(&self, method: &str, url: &Url, date: DateTime<Utc>, body: &[u8]) -> SignedHeaders {
        let engine = base64::engine::general_purpose::STANDARD;

        let date = http_date(date);
        let content_hash = engine.encode(Sha256::digest(body));

        let path_and_query = match url.query() {
            Some(q) => format!("{}?{}", url.path(), q),
            None => url.path().to_string(),
        };

        let string_to_sign = format!(
            "{}\n{}\n{};{};{}",
            method.to_ascii_uppercase(),
            path_and_query,
            date,
            host_header(url),
            content_hash
        );

        let mut mac = self.mac.clone();
        mac.update(string_to_sign.as_bytes());
        let signature = engine.encode(mac.finalize().into_bytes());

        SignedHeaders {
            authorization: format!(
                "HMAC-SHA256 SignedHeaders=x-ms-date;host;x-ms-content-sha256&Signature={}",
                signature
            ),
            date,
            content_hash,
        }
    }
}

/// RFC 1123 date as used by `x-ms-date`.
pub fn http_date(at: DateTime<Utc>) -> String {
    at.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

// Same value the HTTP client puts in `Host` (port only when non-default).
fn host_header(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    }
}
