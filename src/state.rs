/*
 * Responsibility
 * - Router に紐づける共有コンテキスト (AppState)
 *   - auth: Bearer token 検証 (JWKS cache を内包)
 *   - exchange: OBO + ACS の token exchange
 * - Clone 前提で持つ (内部は Arc)
 */
use std::sync::Arc;

use crate::services::{auth::AuthService, token_exchange::TokenExchangeService};

#[derive(Clone, Debug)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub exchange: Arc<TokenExchangeService>,
}

impl AppState {
    pub fn new(auth: Arc<AuthService>, exchange: Arc<TokenExchangeService>) -> Self {
        Self { auth, exchange }
    }
}
