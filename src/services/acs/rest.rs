//! ACS Identity REST client (api-version 2023-10-01).
//!
//! - POST /identities                           -> create user
//! - POST /identities/{id}/:issueAccessToken    -> token for an existing user
//! - POST /teamsUser/:exchangeAccessToken       -> token for a Teams user
//!
//! 認証は 2 通り:
//! - connection string の access key による HMAC-SHA256 署名
//! - endpoint のみ設定時は Entra app token (client credentials) を Bearer で付与 (期限の少し前まで再利用)

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::http::header;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use url::Url;
use uuid::Uuid;

use crate::services::acs::client::{
    AcsError, CommunicationIdentity, CommunicationToken, CommunicationUser, TokenScope,
};
use crate::services::acs::connection_string::ConnectionString;
use crate::services::acs::hmac::HmacSigner;
use crate::services::entra::{EntraClient, EntraError};

pub const ACS_API_VERSION: &str = "2023-10-01";

/// Scope for app-only access to the ACS resource.
pub const ACS_APP_SCOPE: &str = "https://communication.azure.com/.default";

// App tokens are reused until this close to expiry.
const APP_TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(300);

enum AcsAuth {
    AccessKey(HmacSigner),
    Entra(AppTokenSource),
}

struct CachedAppToken {
    token: SecretString,
    refresh_at: Instant,
}

/// Client-credentials token for ACS, cached across requests.
struct AppTokenSource {
    entra: Arc<EntraClient>,
    // Mutex: concurrent callers share one token request
    cached: Mutex<Option<CachedAppToken>>,
}

impl AppTokenSource {
    async fn token(&self) -> Result<SecretString, EntraError> {
        let mut cached = self.cached.lock().await;

        if let Some(c) = cached.as_ref()
            && Instant::now() < c.refresh_at
        {
            return Ok(c.token.clone());
        }

        let fresh = self.entra.acquire_app_token(ACS_APP_SCOPE).await?;
        let lifetime = Duration::from_secs(fresh.expires_in.unwrap_or_default());
        *cached = lifetime
            .checked_sub(APP_TOKEN_REFRESH_MARGIN)
            .map(|usable| CachedAppToken {
                token: fresh.access_token.clone(),
                refresh_at: Instant::now() + usable,
            });

        Ok(fresh.access_token)
    }
}

pub struct AcsRestClient {
    http: reqwest::Client,
    endpoint: Url,
    auth: AcsAuth,
}

impl std::fmt::Debug for AcsRestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let auth = match self.auth {
            AcsAuth::AccessKey(_) => "access_key",
            AcsAuth::Entra(_) => "entra",
        };
        f.debug_struct("AcsRestClient")
            .field("endpoint", &self.endpoint.as_str())
            .field("auth", &auth)
            .finish()
    }
}

#[derive(Deserialize)]
struct CreateUserBody {
    identity: IdentityBody,
}

#[derive(Deserialize)]
struct IdentityBody {
    id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccessTokenBody {
    token: String,
    expires_on: DateTime<Utc>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    code: String,
    #[serde(default)]
    message: Option<String>,
}

impl From<AccessTokenBody> for CommunicationToken {
    fn from(body: AccessTokenBody) -> Self {
        Self {
            token: SecretString::new(body.token),
            expires_on: body.expires_on,
        }
    }
}

impl AcsRestClient {
    pub fn with_access_key(http: reqwest::Client, connection_string: &ConnectionString) -> Self {
        Self {
            http,
            endpoint: connection_string.endpoint.clone(),
            auth: AcsAuth::AccessKey(connection_string.signer.clone()),
        }
    }

    pub fn with_entra(http: reqwest::Client, endpoint: Url, entra: Arc<EntraClient>) -> Self {
        Self {
            http,
            endpoint,
            auth: AcsAuth::Entra(AppTokenSource {
                entra,
                cached: Mutex::new(None),
            }),
        }
    }

    fn url(&self, segments: &[&str]) -> Result<Url, AcsError> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| AcsError::Transport("endpoint cannot be a base url".to_string()))?
            .pop_if_empty()
            .extend(segments);
        url.query_pairs_mut()
            .clear()
            .append_pair("api-version", ACS_API_VERSION);
        Ok(url)
    }

    async fn post<R: DeserializeOwned>(
        &self,
        url: Url,
        body: serde_json::Value,
    ) -> Result<R, AcsError> {
        let body = body.to_string().into_bytes();

        let mut req = self
            .http
            .post(url.clone())
            .header(header::CONTENT_TYPE, "application/json")
            .header("x-ms-client-request-id", Uuid::new_v4().to_string());

        req = match &self.auth {
            AcsAuth::AccessKey(signer) => {
                let signed = signer.sign("POST", &url, Utc::now(), &body);
                req.header("x-ms-date", signed.date)
                    .header("x-ms-content-sha256", signed.content_hash)
                    .header(header::AUTHORIZATION, signed.authorization)
            }
            AcsAuth::Entra(source) => {
                let token = source.token().await.map_err(AcsError::Credential)?;
                req.bearer_auth(token.expose_secret())
            }
        };

        let res = req.body(body).send().await.map_err(AcsError::from_reqwest)?;
        let status = res.status();
        let bytes = res.bytes().await.map_err(AcsError::from_reqwest)?;

        if !status.is_success() {
            let detail = serde_json::from_slice::<ErrorEnvelope>(&bytes)
                .ok()
                .map(|e| e.error);
            warn!(
                status = status.as_u16(),
                error_code = ?detail.as_ref().map(|d| d.code.as_str()),
                error_message = ?detail.as_ref().and_then(|d| d.message.as_deref()),
                path = %url.path(),
                "acs request failed"
            );
            return Err(AcsError::Status {
                status: status.as_u16(),
                code: detail.map(|d| d.code),
            });
        }

        serde_json::from_slice(&bytes).map_err(|e| AcsError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl CommunicationIdentity for AcsRestClient {
    async fn create_user(&self) -> Result<CommunicationUser, AcsError> {
        let url = self.url(&["identities"])?;
        let body: CreateUserBody = self.post(url, json!({})).await?;

        debug!(acs_user_id = %body.identity.id, "acs identity created");
        Ok(CommunicationUser::new(body.identity.id))
    }

    async fn issue_token(
        &self,
        user: &CommunicationUser,
        scopes: &[TokenScope],
    ) -> Result<CommunicationToken, AcsError> {
        let url = self.url(&["identities", user.id.as_str(), ":issueAccessToken"])?;
        let body: AccessTokenBody = self.post(url, json!({ "scopes": scopes })).await?;

        Ok(body.into())
    }

    async fn exchange_teams_user_token(
        &self,
        aad_token: &SecretString,
        app_id: &str,
        user_object_id: &str,
    ) -> Result<CommunicationToken, AcsError> {
        let url = self.url(&["teamsUser", ":exchangeAccessToken"])?;
        let body: AccessTokenBody = self
            .post(
                url,
                json!({
                    "token": aad_token.expose_secret(),
                    "appId": app_id,
                    "userId": user_object_id,
                }),
            )
            .await?;

        Ok(body.into())
    }
}
