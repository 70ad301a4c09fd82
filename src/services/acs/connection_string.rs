//! `endpoint=https://<resource>.communication.azure.com/;accesskey=<base64>`
use base64::Engine as _;
use thiserror::Error;
use url::Url;

use crate::services::acs::hmac::HmacSigner;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConnectionStringError {
    #[error("malformed connection string segment")]
    Malformed,
    #[error("missing endpoint")]
    MissingEndpoint,
    #[error("missing accesskey")]
    MissingAccessKey,
    #[error("endpoint is not an http(s) url")]
    InvalidEndpoint,
    #[error("accesskey is not valid base64")]
    InvalidAccessKey,
}

#[derive(Clone, Debug)]
pub struct ConnectionString {
    pub endpoint: Url,
    pub signer: HmacSigner,
}

impl ConnectionString {
    /// Keys are case-insensitive; empty segments (trailing `;`) are ignored.
    pub fn parse(raw: &str) -> Result<Self, ConnectionStringError> {
        let mut endpoint = None;
        let mut access_key = None;

        for segment in raw.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            // accesskey の base64 padding に '=' が含まれるので最初の '=' だけで分割
            let (key, value) = segment
                .split_once('=')
                .ok_or(ConnectionStringError::Malformed)?;

            match key.trim().to_ascii_lowercase().as_str() {
                "endpoint" => endpoint = Some(value.trim()),
                "accesskey" => access_key = Some(value.trim()),
                _ => {}
            }
        }

        let endpoint = endpoint
            .filter(|v| !v.is_empty())
            .ok_or(ConnectionStringError::MissingEndpoint)?;
        let access_key = access_key
            .filter(|v| !v.is_empty())
            .ok_or(ConnectionStringError::MissingAccessKey)?;

        let endpoint = Url::parse(endpoint).map_err(|_| ConnectionStringError::InvalidEndpoint)?;
        if !matches!(endpoint.scheme(), "http" | "https") || endpoint.cannot_be_a_base() {
            return Err(ConnectionStringError::InvalidEndpoint);
        }

        let key = base64::engine::general_purpose::STANDARD
            .decode(access_key)
            .map_err(|_| ConnectionStringError::InvalidAccessKey)?;
        let signer = HmacSigner::new(&key).ok_or(ConnectionStringError::InvalidAccessKey)?;

        Ok(Self { endpoint, signer })
    }
}
