/*
 * Responsibility
 * - caller の token → OBO → ACS identity / token 発行 の一連の流れ
 * - 各 step は順番に await し、失敗したらそこで打ち切る (部分的なレスポンスは返さない)
 * - token 値は log に出さない (error class / code だけ)
 */
use std::sync::Arc;

use secrecy::SecretString;
use tracing::{info, warn};

use crate::error::AppError;
use crate::services::acs::{CommunicationIdentity, CommunicationToken, CommunicationUser, TokenScope};
use crate::services::entra::OnBehalfOf;

/// Resource the caller's token is exchanged for (ACS Teams-user token exchange).
pub const ACS_OBO_SCOPE: &str = "https://auth.msft.communication.azure.com/.default";

const USER_TOKEN_SCOPES: [TokenScope; 2] = [TokenScope::Chat, TokenScope::VoIP];

/// Result of a full exchange.
#[derive(Debug, Clone)]
pub struct ExchangedTokens {
    pub user: CommunicationUser,
    pub user_token: CommunicationToken,
    pub teams_token: CommunicationToken,
}

pub struct TokenExchangeService {
    obo: Arc<dyn OnBehalfOf>,
    // None: ACS not configured (development only)
    acs: Option<Arc<dyn CommunicationIdentity>>,
    client_id: String,
}

impl std::fmt::Debug for TokenExchangeService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenExchangeService")
            .field("acs_configured", &self.acs.is_some())
            .field("client_id", &self.client_id)
            .finish()
    }
}

impl TokenExchangeService {
    pub fn new(
        obo: Arc<dyn OnBehalfOf>,
        acs: Option<Arc<dyn CommunicationIdentity>>,
        client_id: impl Into<String>,
    ) -> Self {
        Self {
            obo,
            acs,
            client_id: client_id.into(),
        }
    }

    /// Exchange the caller's token for a new ACS identity, its token and a Teams-user token.
    pub async fn exchange(
        &self,
        assertion: &SecretString,
        object_id: Option<&str>,
    ) -> Result<ExchangedTokens, AppError> {
        let Some(object_id) = object_id.filter(|s| !s.trim().is_empty()) else {
            warn!("caller token has no object id claim");
            return Err(AppError::invalid_request("User identity not found"));
        };

        let obo = self
            .obo
            .acquire_token_on_behalf_of(assertion, ACS_OBO_SCOPE)
            .await
            .inspect_err(|e| warn!(error = %e, "on-behalf-of exchange failed"))?;

        let acs = self.acs()?;

        let user = acs
            .create_user()
            .await
            .inspect_err(|e| warn!(error = %e, "acs identity creation failed"))?;

        let user_token = acs
            .issue_token(&user, &USER_TOKEN_SCOPES)
            .await
            .inspect_err(|e| warn!(error = %e, "acs token issuance failed"))?;

        let teams_token = acs
            .exchange_teams_user_token(&obo.access_token, &self.client_id, object_id)
            .await
            .inspect_err(|e| warn!(error = %e, "teams user token exchange failed"))?;

        info!(acs_user_id = %user.id, "token exchange completed");

        Ok(ExchangedTokens {
            user,
            user_token,
            teams_token,
        })
    }

    /// Issue a fresh ACS token for an existing identity.
    ///
    /// The OBO exchange only gates the call; its token is discarded. The identity is
    /// not checked against the caller.
    pub async fn refresh(
        &self,
        assertion: &SecretString,
        acs_user_id: &str,
    ) -> Result<CommunicationToken, AppError> {
        let acs_user_id = acs_user_id.trim();
        if acs_user_id.is_empty() {
            return Err(AppError::invalid_request("ACS User ID is required"));
        }

        self.obo
            .acquire_token_on_behalf_of(assertion, ACS_OBO_SCOPE)
            .await
            .inspect_err(|e| warn!(error = %e, "on-behalf-of exchange failed"))?;

        let acs = self.acs()?;

        let token = acs
            .issue_token(&CommunicationUser::new(acs_user_id), &USER_TOKEN_SCOPES)
            .await
            .inspect_err(|e| warn!(error = %e, "acs token refresh failed"))?;

        info!(acs_user_id = %acs_user_id, expires_on = %token.expires_on, "acs token refreshed");
        Ok(token)
    }

    fn acs(&self) -> Result<&Arc<dyn CommunicationIdentity>, AppError> {
        self.acs.as_ref().ok_or_else(|| {
            warn!("acs client requested but not configured");
            AppError::ConfigurationMissing
        })
    }
}
