pub mod access_jwt;
pub mod factory;
pub mod jwks;

pub use access_jwt::{AuthService, VerifiedAccessToken};
pub use factory::build_auth_service;
pub use jwks::JwksCache;
