//! Communication identity interface used by the token exchange service.
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::Serialize;
use thiserror::Error;

use crate::services::entra::EntraError;

/// Capabilities an ACS access token can be scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TokenScope {
    #[serde(rename = "chat")]
    Chat,
    #[serde(rename = "chat.join")]
    ChatJoin,
    #[serde(rename = "chat.join.limited")]
    ChatJoinLimited,
    #[serde(rename = "voip")]
    VoIP,
    #[serde(rename = "voip.join")]
    VoIPJoin,
}

/// ACS user identity, e.g. `8:acs:<resource-id>_<guid>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommunicationUser {
    pub id: String,
}

impl CommunicationUser {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

#[derive(Debug, Clone)]
pub struct CommunicationToken {
    pub token: SecretString,
    pub expires_on: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum AcsError {
    #[error("acs returned status {status} (code: {code:?})")]
    Status { status: u16, code: Option<String> },
    #[error("acs request timed out")]
    Timeout,
    #[error("acs transport error: {0}")]
    Transport(String),
    #[error("invalid acs response: {0}")]
    InvalidResponse(String),
    #[error("failed to acquire app token for acs: {0}")]
    Credential(#[source] EntraError),
}

impl AcsError {
    pub(crate) fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else {
            Self::Transport(e.to_string())
        }
    }
}

/// Identity operations of the communication service.
///
/// Implementations must be shareable across requests (`Arc<dyn CommunicationIdentity>`).
#[async_trait]
pub trait CommunicationIdentity: Send + Sync {
    async fn create_user(&self) -> Result<CommunicationUser, AcsError>;

    async fn issue_token(
        &self,
        user: &CommunicationUser,
        scopes: &[TokenScope],
    ) -> Result<CommunicationToken, AcsError>;

    /// Exchange an Entra token of a Teams user for an ACS token bound to that Teams identity.
    async fn exchange_teams_user_token(
        &self,
        aad_token: &SecretString,
        app_id: &str,
        user_object_id: &str,
    ) -> Result<CommunicationToken, AcsError>;
}
