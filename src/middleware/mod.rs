/*
 * Responsibility
 * - middleware の公開インターフェース
 *   - auth: Bearer token 検証 → AuthCtx
 *   - http / cors / security_headers: 横断的な transport の関心事
 */
pub mod auth;
pub mod cors;
pub mod http;
pub mod security_headers;
