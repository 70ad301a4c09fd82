/*
 * Responsibility
 * - 環境変数や設定の読み込み (Azure AD / ACS / CORS / timeout など)
 * - 設定値のバリデーション (不足なら起動失敗、不足キーはまとめて報告)
 * - 読み込み元は lookup 関数に閉じ込める (テストで process env を触らない)
 */
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use crate::services::acs::ConnectionString;

pub const DEFAULT_AUTHORITY_HOST: &str = "https://login.microsoftonline.com";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.unwrap_or("development").to_ascii_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum ConfigError {
    Missing(Vec<&'static str>),
    Invalid(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(keys) => {
                write!(f, "missing required configuration: {}", keys.join(", "))
            }
            ConfigError::Invalid(key) => write!(f, "invalid configuration: {}", key),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Entra ID (Azure AD) application settings.
///
/// `client_secret` is only exposed at the token endpoint call site.
#[derive(Debug, Clone)]
pub struct AzureAdConfig {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: SecretString,
    /// Without trailing slash, e.g. `https://login.microsoftonline.com`
    pub authority_host: String,
    pub audiences: Vec<String>,
    /// Any-of: the caller's `scp` must contain at least one of these (empty = no check)
    pub required_scopes: Vec<String>,
}

impl AzureAdConfig {
    pub fn authority(&self) -> String {
        format!("{}/{}", self.authority_host, self.tenant_id)
    }

    pub fn token_endpoint(&self) -> String {
        format!("{}/oauth2/v2.0/token", self.authority())
    }

    pub fn jwks_uri(&self) -> String {
        format!("{}/discovery/v2.0/keys", self.authority())
    }

    /// v2 issuer first, then the v1 (sts.windows.net) form Teams SSO tokens may carry.
    pub fn issuers(&self) -> Vec<String> {
        vec![
            format!("{}/v2.0", self.authority()),
            format!("https://sts.windows.net/{}/", self.tenant_id),
        ]
    }
}

/// How the service reaches Azure Communication Services.
#[derive(Debug, Clone)]
pub enum AcsConfig {
    /// `endpoint=...;accesskey=...` (HMAC-SHA256 signed requests)
    ConnectionString(ConnectionString),
    /// Endpoint only; requests carry an Entra app token (client credentials)
    Endpoint(Url),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub app_env: AppEnv,
    pub cors_allowed_origins: Vec<String>,

    pub azure_ad: AzureAdConfig,
    pub access_token_leeway_seconds: u64,

    // None is only tolerated outside production
    pub acs: Option<AcsConfig>,

    pub upstream_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // 空文字は未設定として扱う
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let port: u16 = get("PORT").and_then(|s| s.parse().ok()).unwrap_or(3000);

        let addr: SocketAddr = SocketAddr::from_str(&format!("0.0.0.0:{}", port))
            .map_err(|_| ConfigError::Invalid("PORT"))?;

        let app_env = AppEnv::parse(get("APP_ENV").as_deref());

        let cors_allowed_origins = get("CORS_ALLOWED_ORIGINS")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>();

        let tenant_id = get("AZURE_AD_TENANT_ID");
        let client_id = get("AZURE_AD_CLIENT_ID");
        let client_secret = get("AZURE_AD_CLIENT_SECRET");
        let acs_connection_string = get("ACS_CONNECTION_STRING");
        let acs_endpoint = get("ACS_ENDPOINT");

        let mut missing = Vec::new();
        if tenant_id.is_none() {
            missing.push("AZURE_AD_TENANT_ID");
        }
        if client_id.is_none() {
            missing.push("AZURE_AD_CLIENT_ID");
        }
        if client_secret.is_none() {
            missing.push("AZURE_AD_CLIENT_SECRET");
        }
        if app_env.is_production() && acs_connection_string.is_none() && acs_endpoint.is_none() {
            missing.push("ACS_CONNECTION_STRING");
        }

        let (Some(tenant_id), Some(client_id), Some(client_secret)) =
            (tenant_id, client_id, client_secret)
        else {
            return Err(ConfigError::Missing(missing));
        };
        if !missing.is_empty() {
            return Err(ConfigError::Missing(missing));
        }

        let authority_host = get("AZURE_AD_AUTHORITY_HOST")
            .unwrap_or_else(|| DEFAULT_AUTHORITY_HOST.to_string())
            .trim_end_matches('/')
            .to_string();
        Url::parse(&authority_host).map_err(|_| ConfigError::Invalid("AZURE_AD_AUTHORITY_HOST"))?;

        let audiences = match get("AZURE_AD_AUDIENCE") {
            Some(raw) => raw
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            None => vec![client_id.clone(), format!("api://{}", client_id)],
        };

        let required_scopes = get("AZURE_AD_SCOPES")
            .unwrap_or_default()
            .split([' ', ','])
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>();

        let access_token_leeway_seconds = get("ACCESS_TOKEN_LEEWAY_SECONDS")
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(60);

        let acs = match (acs_connection_string, acs_endpoint) {
            (Some(raw), _) => Some(AcsConfig::ConnectionString(
                ConnectionString::parse(&raw)
                    .map_err(|_| ConfigError::Invalid("ACS_CONNECTION_STRING"))?,
            )),
            (None, Some(raw)) => Some(AcsConfig::Endpoint(
                Url::parse(&raw)
                    .ok()
                    .filter(|u| matches!(u.scheme(), "http" | "https") && !u.cannot_be_a_base())
                    .ok_or(ConfigError::Invalid("ACS_ENDPOINT"))?,
            )),
            (None, None) => None,
        };

        let upstream_timeout = get("UPSTREAM_TIMEOUT_SECONDS")
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|v| *v > 0)
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(10));

        Ok(Self {
            addr,
            app_env,
            cors_allowed_origins,
            azure_ad: AzureAdConfig {
                tenant_id,
                client_id,
                client_secret: SecretString::new(client_secret),
                authority_host,
                audiences,
                required_scopes,
            },
            access_token_leeway_seconds,
            acs,
            upstream_timeout,
        })
    }
}
