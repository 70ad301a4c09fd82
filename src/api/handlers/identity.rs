/*
 * Responsibility
 * - POST /Identity/exchange-token (+ GET/POST /api/exchangeToken)
 * - POST /Identity/refresh-acs-token
 * - AuthCtx を受け取り TokenExchangeService に委譲、結果を DTO に詰める
 */
use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};

use crate::{
    api::{
        dto::identity::{AcsTokenRefreshResponse, AcsTokenResponse, RefreshTokenRequest},
        extractors::AuthCtxExtractor,
    },
    error::AppError,
    state::AppState,
};

#[tracing::instrument(skip_all, fields(object_id = ?ctx.object_id, tenant_id = ?ctx.tenant_id))]
pub async fn exchange_token(
    State(state): State<AppState>,
    AuthCtxExtractor(ctx): AuthCtxExtractor,
) -> Result<Json<AcsTokenResponse>, AppError> {
    let tokens = state
        .exchange
        .exchange(&ctx.token, ctx.object_id.as_deref())
        .await?;

    Ok(Json(tokens.into()))
}

#[tracing::instrument(skip_all, fields(object_id = ?ctx.object_id))]
pub async fn refresh_acs_token(
    State(state): State<AppState>,
    AuthCtxExtractor(ctx): AuthCtxExtractor,
    body: Result<Json<RefreshTokenRequest>, JsonRejection>,
) -> Result<Json<AcsTokenRefreshResponse>, AppError> {
    let Json(req) = body.map_err(|e| {
        tracing::warn!(error = %e, "invalid refresh request body");
        AppError::invalid_request("Invalid request body")
    })?;
    req.validate().map_err(AppError::invalid_request)?;

    let token = state.exchange.refresh(&ctx.token, &req.acs_user_id).await?;

    Ok(Json(token.into()))
}
