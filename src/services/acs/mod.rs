/*
 * Responsibility
 * - Azure Communication Services Identity API の境界
 *   - client: trait (CommunicationIdentity) と型
 *   - rest: REST 実装 (HMAC 署名 or Entra app token)
 *   - connection_string / hmac: 認証情報
 */
pub mod client;
pub mod connection_string;
pub mod hmac;
pub mod rest;

pub use client::{
    AcsError, CommunicationIdentity, CommunicationToken, CommunicationUser, TokenScope,
};
pub use connection_string::{ConnectionString, ConnectionStringError};
pub use rest::AcsRestClient;
