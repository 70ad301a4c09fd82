/*
 * Responsibility
 * - Handler から見える「認証済みコンテキスト」の型
 * - middleware が検証して request extensions に格納し、handler はこの型だけを受け取る
 */
use secrecy::SecretString;

use crate::services::auth::VerifiedAccessToken;

/// 検証済みの caller
///
/// - `object_id` は欠落し得る (exchange では 400 "User identity not found")
/// - `token` は OBO の assertion としてそのまま転送する
#[derive(Debug, Clone)]
pub struct AuthCtx {
    pub object_id: Option<String>,
    pub tenant_id: Option<String>,
    pub scopes: Vec<String>,
    pub token: SecretString,
}

impl AuthCtx {
    pub fn new(verified: VerifiedAccessToken, token: SecretString) -> Self {
        Self {
            object_id: verified.object_id,
            tenant_id: verified.tenant_id,
            scopes: verified.scopes,
            token,
        }
    }
}
