/*
 * Responsibility
 * - アプリ共通の AppError 定義 (閉じた集合)
 * - IntoResponse 実装 (HTTP status / JSON error body) はここの一か所だけ
 * - EntraError / AcsError / AccessJwtError を統一的に変換
 */
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::services::acs::AcsError;
use crate::services::auth::access_jwt::AccessJwtError;
use crate::services::auth::jwks::JwksError;
use crate::services::entra::EntraError;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    InvalidRequest(String),
    #[error("unauthorized")]
    Unauthorized,
    #[error("forbidden")]
    Forbidden,
    #[error("Token acquisition failed: {code}")]
    AuthExchangeFailed { code: String },
    #[error("ACS not configured")]
    ConfigurationMissing,
    #[error("upstream service error")]
    UpstreamService,
    #[error("upstream service timed out")]
    UpstreamTimeout,
    #[error("request timed out")]
    RequestTimeout,
    #[error("internal server error")]
    Internal,
}

impl AppError {
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::UpstreamTimeout => StatusCode::GATEWAY_TIMEOUT,
            AppError::RequestTimeout => StatusCode::REQUEST_TIMEOUT,
            AppError::AuthExchangeFailed { .. }
            | AppError::ConfigurationMissing
            | AppError::UpstreamService
            | AppError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::InvalidRequest(_) => "INVALID_REQUEST",
            AppError::Unauthorized => "UNAUTHORIZED",
            AppError::Forbidden => "FORBIDDEN",
            AppError::AuthExchangeFailed { .. } => "AUTH_EXCHANGE_FAILED",
            AppError::ConfigurationMissing => "CONFIGURATION_MISSING",
            AppError::UpstreamService => "UPSTREAM_SERVICE_ERROR",
            AppError::UpstreamTimeout => "UPSTREAM_TIMEOUT",
            AppError::RequestTimeout => "REQUEST_TIMEOUT",
            AppError::Internal => "INTERNAL",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.code(),
                message: self.to_string(),
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<EntraError> for AppError {
    fn from(e: EntraError) -> Self {
        match e {
            // IdP が拒否した (期限切れ / consent 不足 / audience 違い)
            EntraError::Rejected { code, .. } => AppError::AuthExchangeFailed { code },
            EntraError::Timeout => AppError::UpstreamTimeout,
            EntraError::Transport(_) | EntraError::InvalidResponse(_) => AppError::UpstreamService,
        }
    }
}

impl From<AcsError> for AppError {
    fn from(e: AcsError) -> Self {
        match e {
            AcsError::Timeout => AppError::UpstreamTimeout,
            // app token for ACS could not be acquired: same class as other upstream failures
            AcsError::Credential(inner) => match inner {
                EntraError::Timeout => AppError::UpstreamTimeout,
                _ => AppError::UpstreamService,
            },
            AcsError::Status { .. } | AcsError::Transport(_) | AcsError::InvalidResponse(_) => {
                AppError::UpstreamService
            }
        }
    }
}

impl From<AccessJwtError> for AppError {
    fn from(e: AccessJwtError) -> Self {
        match e {
            // signing keys could not be loaded: not the caller's fault
            AccessJwtError::Keys(JwksError::Timeout) => AppError::UpstreamTimeout,
            AccessJwtError::Keys(JwksError::Fetch(_)) => AppError::UpstreamService,
            AccessJwtError::Keys(JwksError::UnknownKid(_))
            | AccessJwtError::MissingKid
            | AccessJwtError::Jwt(_) => AppError::Unauthorized,
        }
    }
}
