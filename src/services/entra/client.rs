//! Entra ID (Azure AD) token endpoint client.
//!
//! - On-Behalf-Of: caller の token を別 resource 向けの token に交換する
//! - client credentials: ACS を endpoint + app 認証で使う場合の app token
//!
//! Token values never leave this module as plain `String`s.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::AzureAdConfig;

pub const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

#[derive(Debug, thiserror::Error)]
pub enum EntraError {
    /// The identity provider answered with an OAuth error (invalid_grant, interaction_required, ...)
    #[error("token request rejected: {code}")]
    Rejected {
        code: String,
        description: Option<String>,
    },
    #[error("token endpoint timed out")]
    Timeout,
    #[error("token endpoint transport error: {0}")]
    Transport(String),
    #[error("invalid token endpoint response: {0}")]
    InvalidResponse(String),
}

impl EntraError {
    fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else {
            Self::Transport(e.to_string())
        }
    }
}

#[derive(Debug, Clone)]
pub struct EntraToken {
    pub access_token: SecretString,
    pub expires_in: Option<u64>,
}

/// OBO exchange seam (the exchange service only needs this).
#[async_trait]
pub trait OnBehalfOf: Send + Sync {
    async fn acquire_token_on_behalf_of(
        &self,
        user_assertion: &SecretString,
        scope: &str,
    ) -> Result<EntraToken, EntraError>;
}

#[derive(Deserialize)]
struct TokenSuccessBody {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Deserialize)]
struct TokenErrorBody {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    error_codes: Vec<u64>,
}

#[derive(Clone)]
pub struct EntraClient {
    http: reqwest::Client,
    token_endpoint: String,
    client_id: String,
    client_secret: SecretString,
}

impl std::fmt::Debug for EntraClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Do not print the client secret
        f.debug_struct("EntraClient")
            .field("token_endpoint", &self.token_endpoint)
            .field("client_id", &self.client_id)
            .finish()
    }
}

impl EntraClient {
    pub fn new(http: reqwest::Client, config: &AzureAdConfig) -> Self {
        Self {
            http,
            token_endpoint: config.token_endpoint(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
        }
    }

    /// Client-credentials grant for this application.
    pub async fn acquire_app_token(&self, scope: &str) -> Result<EntraToken, EntraError> {
        self.request_token(&[
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.expose_secret().as_str()),
            ("scope", scope),
        ])
        .await
    }

    async fn request_token(&self, form: &[(&str, &str)]) -> Result<EntraToken, EntraError> {
        let res = self
            .http
            .post(&self.token_endpoint)
            .form(form)
            .send()
            .await
            .map_err(EntraError::from_reqwest)?;

        let status = res.status();
        let bytes = res.bytes().await.map_err(EntraError::from_reqwest)?;

        if status.is_success() {
            let body: TokenSuccessBody = serde_json::from_slice(&bytes)
                .map_err(|e| EntraError::InvalidResponse(e.to_string()))?;
            debug!(expires_in = ?body.expires_in, "token endpoint issued token");
            return Ok(EntraToken {
                access_token: SecretString::new(body.access_token),
                expires_in: body.expires_in,
            });
        }

        match serde_json::from_slice::<TokenErrorBody>(&bytes) {
            Ok(body) if status.is_client_error() => {
                warn!(
                    status = status.as_u16(),
                    error_code = %body.error,
                    aadsts = ?body.error_codes,
                    "token request rejected by identity provider"
                );
                Err(EntraError::Rejected {
                    code: body.error,
                    description: body.error_description,
                })
            }
            _ => Err(EntraError::Transport(format!(
                "unexpected token endpoint status {}",
                status.as_u16()
            ))),
        }
    }
}

#[async_trait]
impl OnBehalfOf for EntraClient {
    async fn acquire_token_on_behalf_of(
        &self,
        user_assertion: &SecretString,
        scope: &str,
    ) -> Result<EntraToken, EntraError> {
        self.request_token(&[
            ("grant_type", JWT_BEARER_GRANT),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.expose_secret().as_str()),
            ("assertion", user_assertion.expose_secret().as_str()),
            ("scope", scope),
            ("requested_token_use", "on_behalf_of"),
        ])
        .await
    }
}
