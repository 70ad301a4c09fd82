/*
 * Responsibility
 * - 外部サービスのクライアント (Entra ID / ACS) と、それらを束ねる token exchange
 * - handler からは TokenExchangeService / AuthService だけを見る
 */
pub mod acs;
pub mod auth;
pub mod entra;
pub mod token_exchange;
