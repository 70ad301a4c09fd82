/*
 * Responsibility
 * - /Identity 系の request/response DTO
 * - JSON のフィールド名は既存の front-end との契約 (camelCase / PascalCase が混在)
 */
use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};

use crate::services::acs::CommunicationToken;
use crate::services::token_exchange::ExchangedTokens;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AcsTokenResponse {
    pub new_user_token: String,
    pub new_user_id: String,
    /// Teams-user ACS token
    pub c_token: String,
}

impl From<ExchangedTokens> for AcsTokenResponse {
    fn from(tokens: ExchangedTokens) -> Self {
        Self {
            new_user_token: tokens.user_token.token.expose_secret().clone(),
            new_user_id: tokens.user.id,
            c_token: tokens.teams_token.token.expose_secret().clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RefreshTokenRequest {
    #[serde(rename = "AcsUserId", alias = "acsUserId", default)]
    pub acs_user_id: String,
}

impl RefreshTokenRequest {
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.acs_user_id.trim().is_empty() {
            return Err("ACS User ID is required");
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct AcsTokenRefreshResponse {
    pub token: String,
    pub expires_on: DateTime<Utc>,
}

impl From<CommunicationToken> for AcsTokenRefreshResponse {
    fn from(token: CommunicationToken) -> Self {
        Self {
            token: token.token.expose_secret().clone(),
            expires_on: token.expires_on,
        }
    }
}
