//! Signing keys of the identity provider (JWKS), keyed by `kid`.
//!
//! Keys are fetched lazily and re-fetched when a token names an unknown `kid`
//! (key rollover). Re-fetching is rate limited so random `kid`s cannot turn
//! every request into a JWKS download.
//!
//! The download happens outside the key-set lock: lookups of known keys never
//! wait on the network. Concurrent refreshes are collapsed behind `refresh`.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use jsonwebtoken::DecodingKey;
use jsonwebtoken::jwk::Jwk;
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum JwksError {
    #[error("unknown signing key: {0}")]
    UnknownKid(String),
    #[error("jwks fetch timed out")]
    Timeout,
    #[error("jwks fetch failed: {0}")]
    Fetch(String),
}

impl JwksError {
    fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else {
            Self::Fetch(e.to_string())
        }
    }
}

#[derive(Deserialize)]
struct JwksDocument {
    #[serde(default)]
    keys: Vec<serde_json::Value>,
}

#[derive(Default)]
struct KeySet {
    keys: HashMap<String, DecodingKey>,
    fetched_at: Option<Instant>,
}

pub struct JwksCache {
    http: reqwest::Client,
    // None: static key set (no refresh)
    jwks_uri: Option<String>,
    state: RwLock<KeySet>,
    refresh: Mutex<()>,
}

impl std::fmt::Debug for JwksCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwksCache")
            .field("jwks_uri", &self.jwks_uri)
            .finish()
    }
}

impl JwksCache {
    pub fn remote(http: reqwest::Client, jwks_uri: impl Into<String>) -> Self {
        Self {
            http,
            jwks_uri: Some(jwks_uri.into()),
            state: RwLock::new(KeySet::default()),
            refresh: Mutex::new(()),
        }
    }

    /// Fixed key set parsed from a JWKS document; never refreshed.
    #[cfg(test)]
    pub(crate) fn from_document(document: &serde_json::Value) -> Self {
        let keys = serde_json::from_value::<JwksDocument>(document.clone())
            .map(parse_keys)
            .unwrap_or_default();

        Self {
            http: reqwest::Client::new(),
            jwks_uri: None,
            state: RwLock::new(KeySet {
                keys,
                fetched_at: None,
            }),
            refresh: Mutex::new(()),
        }
    }

    pub async fn get(&self, kid: &str) -> Result<DecodingKey, JwksError> {
        if let Some(key) = self.state.read().await.keys.get(kid) {
            return Ok(key.clone());
        }

        let Some(uri) = self.jwks_uri.as_deref() else {
            return Err(JwksError::UnknownKid(kid.to_string()));
        };

        // One refresher at a time; others wait here and then see its result.
        let _refresh = self.refresh.lock().await;

        {
            let state = self.state.read().await;
            if let Some(key) = state.keys.get(kid) {
                return Ok(key.clone());
            }
            if state
                .fetched_at
                .is_some_and(|at| at.elapsed() < MIN_REFRESH_INTERVAL)
            {
                return Err(JwksError::UnknownKid(kid.to_string()));
            }
        }

        let keys = self.fetch(uri).await?;
        info!(keys = keys.len(), "jwks refreshed");

        let key = keys.get(kid).cloned();
        {
            let mut state = self.state.write().await;
            state.keys = keys;
            state.fetched_at = Some(Instant::now());
        }

        key.ok_or_else(|| JwksError::UnknownKid(kid.to_string()))
    }

    async fn fetch(&self, uri: &str) -> Result<HashMap<String, DecodingKey>, JwksError> {
        let document: JwksDocument = self
            .http
            .get(uri)
            .send()
            .await
            .and_then(|res| res.error_for_status())
            .map_err(JwksError::from_reqwest)?
            .json()
            .await
            .map_err(JwksError::from_reqwest)?;

        Ok(parse_keys(document))
    }
}

// Keys that are not usable JWKs (or carry no kid) are skipped.
fn parse_keys(document: JwksDocument) -> HashMap<String, DecodingKey> {
    document
        .keys
        .into_iter()
        .filter_map(|raw| {
            let jwk: Jwk = match serde_json::from_value(raw) {
                Ok(jwk) => jwk,
                Err(e) => {
                    warn!(error = %e, "skipping unparsable jwk");
                    return None;
                }
            };
            let kid = jwk.common.key_id.clone()?;
            match DecodingKey::from_jwk(&jwk) {
                Ok(key) => Some((kid, key)),
                Err(e) => {
                    warn!(kid = %kid, error = %e, "skipping unsupported jwk");
                    None
                }
            }
        })
        .collect()
}
