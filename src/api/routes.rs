/*
 * Responsibility
 * - URL 構造を定義
 * - /health は公開、それ以外は Bearer 必須 (route_layer で適用)
 */
use axum::{
    Router,
    routing::{get, post},
};

use crate::api::handlers::{
    health::health,
    identity::{exchange_token, refresh_acs_token},
};
use crate::middleware;
use crate::state::AppState;

pub fn routes(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        .route("/Identity/exchange-token", post(exchange_token))
        .route("/Identity/refresh-acs-token", post(refresh_acs_token))
        // Azure Function 互換の path
        .route("/api/exchangeToken", get(exchange_token).post(exchange_token));

    let protected = middleware::auth::access::apply(protected, state);

    Router::new().route("/health", get(health)).merge(protected)
}
