/// Factory: build `AuthService` from application `Config`.
use std::sync::Arc;

use crate::config::Config;
use crate::services::auth::{AuthService, JwksCache};

pub fn build_auth_service(config: &Config, http: reqwest::Client) -> Arc<AuthService> {
    let ad = &config.azure_ad;

    let auth = AuthService::new(
        JwksCache::remote(http, ad.jwks_uri()),
        &ad.issuers(),
        &ad.audiences,
        config.access_token_leeway_seconds,
        ad.required_scopes.clone(),
    );

    Arc::new(auth)
}
