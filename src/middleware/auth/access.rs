//! Bearer access token (Entra ID JWT) 検証 → AuthCtx を extensions に入れる
//!
//! - header なし / Bearer 以外: 400 "User identity not found" (downstream は呼ばない)
//! - 署名 / iss / aud / exp / nbf 不正: 401
//! - 署名鍵 (JWKS) の取得失敗: 504 (timeout) / 500
//! - required scope を 1 つも持たない: 403

use axum::{
    Router,
    body::Body,
    extract::State,
    http::{Request, header},
    middleware::{self, Next},
    response::Response,
};
use secrecy::SecretString;

use crate::api::extractors::AuthCtx;
use crate::error::AppError;
use crate::state::AppState;

/// 保護対象の routes に認証を掛ける。
///
/// `route_layer` なので、未定義 path は 401 ではなく 404 のまま。
pub fn apply(router: Router<AppState>, state: AppState) -> Router<AppState> {
    // axum 0.8 の from_fn は State extractor を受け取れないため、`from_fn_with_state` で明示的に state を渡す
    router.route_layer(middleware::from_fn_with_state(state, access_middleware))
}

async fn access_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let Some(token) = bearer_token(&req) else {
        tracing::warn!("request without bearer token");
        return Err(AppError::invalid_request("User identity not found"));
    };
    let token = token.to_string();

    let verified = match state.auth.verify(&token).await {
        Ok(verified) => verified,
        Err(err) => {
            tracing::warn!(error = %err, "access token verification failed");
            // key download failures map to 5xx, everything else to 401
            return Err(err.into());
        }
    };

    if !state.auth.has_required_scope(&verified.scopes) {
        tracing::warn!(scopes = ?verified.scopes, "access token lacks required scope");
        return Err(AppError::Forbidden);
    }

    tracing::debug!(
        object_id = ?verified.object_id,
        tenant_id = ?verified.tenant_id,
        "access token verified"
    );

    // middleware → extractor への受け渡し
    req.extensions_mut()
        .insert(AuthCtx::new(verified, SecretString::new(token)));

    Ok(next.run(req).await)
}

fn bearer_token(req: &Request<Body>) -> Option<&str> {
    let value = req
        .headers()
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .trim();

    // scheme は大文字小文字を区別しない
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();

    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}
