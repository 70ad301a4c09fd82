use jsonwebtoken::{Algorithm, Validation};
use serde::Deserialize;
use std::{error::Error as StdError, fmt};

use crate::services::auth::jwks::{JwksCache, JwksError};

// Errors returned by access-token verification.
#[derive(Debug)]
pub enum AccessJwtError {
    Jwt(jsonwebtoken::errors::Error),
    MissingKid,
    Keys(JwksError),
}

impl fmt::Display for AccessJwtError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Jwt(e) => write!(f, "jwt verification failed: {}", e),
            Self::MissingKid => write!(f, "missing 'kid' header"),
            Self::Keys(e) => write!(f, "signing key unavailable: {}", e),
        }
    }
}

impl StdError for AccessJwtError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Jwt(e) => Some(e),
            Self::Keys(e) => Some(e),
            Self::MissingKid => None,
        }
    }
}

impl From<jsonwebtoken::errors::Error> for AccessJwtError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        Self::Jwt(e)
    }
}

impl From<JwksError> for AccessJwtError {
    fn from(e: JwksError) -> Self {
        Self::Keys(e)
    }
}

/// Entra ID access token claims (the subset this service reads).
///
/// NOTE:
/// - `iss` / `aud` / `exp` / `nbf` are validated by `jsonwebtoken::Validation`.
/// - The object id arrives as `oid` (v2) or under the long claim URI (v1 / WS-Fed mapping).
#[derive(Debug, Clone, Deserialize)]
pub struct AccessTokenClaims {
    #[serde(default)]
    pub oid: Option<String>,
    #[serde(default, rename = "http://schemas.microsoft.com/identity/claims/objectidentifier")]
    pub oid_uri: Option<String>,
    #[serde(default)]
    pub tid: Option<String>,
    #[serde(default)]
    pub scp: Option<String>,
}

/// AuthService が返す「検証済み・アプリ側で使う型」
///
/// - `object_id` は欠落し得る (欠落時の扱いは token exchange 側で 400 にする)
#[derive(Debug, Clone)]
pub struct VerifiedAccessToken {
    pub object_id: Option<String>,
    pub tenant_id: Option<String>,
    pub scopes: Vec<String>,
}

impl From<AccessTokenClaims> for VerifiedAccessToken {
    fn from(claims: AccessTokenClaims) -> Self {
        let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());

        Self {
            object_id: non_empty(claims.oid).or_else(|| non_empty(claims.oid_uri)),
            tenant_id: claims.tid,
            scopes: claims
                .scp
                .unwrap_or_default()
                .split_whitespace()
                .map(str::to_string)
                .collect(),
        }
    }
}

/// RS256 access-token verifier backed by the tenant's JWKS.
#[derive(Debug)]
pub struct AuthService {
    keys: JwksCache,
    validation: Validation,
    required_scopes: Vec<String>,
}

impl AuthService {
    pub fn new(
        keys: JwksCache,
        issuers: &[String],
        audiences: &[String],
        leeway_seconds: u64,
        required_scopes: Vec<String>,
    ) -> Self {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(issuers);
        validation.set_audience(audiences);
        validation.leeway = leeway_seconds;
        validation.validate_nbf = true;

        Self {
            keys,
            validation,
            required_scopes,
        }
    }

    /// Verify signature + iss/aud/exp/nbf, then convert claims into an application-friendly type.
    pub async fn verify(&self, token: &str) -> Result<VerifiedAccessToken, AccessJwtError> {
        let header = jsonwebtoken::decode_header(token)?;
        let kid = header.kid.ok_or(AccessJwtError::MissingKid)?;
        let key = self.keys.get(&kid).await?;

        let data = jsonwebtoken::decode::<AccessTokenClaims>(token, &key, &self.validation)?;

        Ok(data.claims.into())
    }

    /// Any-of check against the configured scopes; nothing configured means no restriction.
    pub fn has_required_scope(&self, scopes: &[String]) -> bool {
        self.required_scopes.is_empty()
            || self
                .required_scopes
                .iter()
                .any(|required| scopes.iter().any(|s| s == required))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OBJECT_ID_CLAIM_URI: &str = "http://schemas.microsoft.com/identity/claims/objectidentifier";

    fn service(required_scopes: &[&str]) -> AuthService {
        AuthService::new(
            JwksCache::from_document(&serde_json::json!({ "keys": [] })),
            &["https://sts.windows.net/tenant-1/".to_string()],
            &["client-1".to_string()],
            0,
            required_scopes.iter().map(|s| s.to_string()).collect(),
        )
    }

    #[test]
    fn object_id_falls_back_to_claim_uri() {
        let claims: AccessTokenClaims = serde_json::from_value(serde_json::json!({
            "oid": "",
            (OBJECT_ID_CLAIM_URI): "abc-123",
            "scp": "access_as_user  Calls.Join",
        }))
        .unwrap();

        let verified = VerifiedAccessToken::from(claims);

        assert_eq!(verified.object_id.as_deref(), Some("abc-123"));
        assert_eq!(verified.scopes, vec!["access_as_user", "Calls.Join"]);
    }

    #[test]
    fn empty_required_scopes_allow_everything() {
        assert!(service(&[]).has_required_scope(&[]));
    }

    #[test]
    fn required_scopes_are_any_of() {
        let service = service(&["access_as_user", "admin"]);

        assert!(service.has_required_scope(&["admin".to_string()]));
        assert!(!service.has_required_scope(&["User.Read".to_string()]));
        assert!(!service.has_required_scope(&[]));
    }

    #[tokio::test]
    async fn token_without_kid_is_rejected() {
        // header {"alg":"RS256"} / payload {} / bogus signature
        let token = "eyJhbGciOiJSUzI1NiJ9.e30.c2ln";

        let err = service(&[]).verify(token).await.unwrap_err();
        assert!(matches!(err, AccessJwtError::MissingKid));
    }
}
