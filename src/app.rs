/*
 * Responsibility
 * - Config読み込み → 依存生成 (HTTP client / Entra / ACS / AuthService) → Router 組み立て
 * - Middleware の適用 (http / security headers / CORS、Bearer は api::routes 側)
 * - axum::serve() で起動
 */
use std::{panic, process, sync::Arc};

use anyhow::{Context, Result};
use axum::Router;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{AcsConfig, Config};
use crate::services::acs::{AcsRestClient, CommunicationIdentity};
use crate::services::auth::build_auth_service;
use crate::services::entra::EntraClient;
use crate::services::token_exchange::TokenExchangeService;
use crate::state::AppState;
use crate::{api, middleware};

fn init_tracing() {
    // Prefer RUST_LOG if set; otherwise use a sensible default.
    // Ex:
    // RUST_LOG=info,acs_token_exchange=debug,tower_http=debug cargo run
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn init_panic_hook(abort_on_panic: bool) {
    // Keep the default hook as a fallback (prints to stderr with location/payload).
    let default_hook = panic::take_hook();

    panic::set_hook(Box::new(move |info| {
        tracing::error!(?info, "panic");

        // development: fail fast
        if abort_on_panic {
            process::abort();
        } else {
            default_hook(info);
        }
    }))
}

pub async fn run() -> Result<()> {
    init_tracing();
    let config = Config::from_env().context("failed to load configuration")?;

    init_panic_hook(!config.app_env.is_production());

    tracing::info!(
        "starting API in {:?} mode on {}",
        config.app_env,
        config.addr
    );

    let state = build_state(&config)?;
    let app = build_router(state, &config);

    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("failed to bind {}", config.addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Build process-level clients once and inject them into the shared application state.
pub fn build_state(config: &Config) -> Result<AppState> {
    // One pooled client for Entra ID, JWKS and ACS; every outbound call is bounded.
    let http = reqwest::Client::builder()
        .timeout(config.upstream_timeout)
        .build()
        .context("failed to build http client")?;

    let entra = Arc::new(EntraClient::new(http.clone(), &config.azure_ad));
    let auth = build_auth_service(config, http.clone());

    let acs: Option<Arc<dyn CommunicationIdentity>> = match &config.acs {
        Some(AcsConfig::ConnectionString(cs)) => {
            tracing::info!(endpoint = %cs.endpoint, "acs: access key auth");
            Some(Arc::new(AcsRestClient::with_access_key(http, cs)))
        }
        Some(AcsConfig::Endpoint(endpoint)) => {
            tracing::info!(endpoint = %endpoint, "acs: entra application auth");
            Some(Arc::new(AcsRestClient::with_entra(
                http,
                endpoint.clone(),
                entra.clone(),
            )))
        }
        None => {
            tracing::warn!("ACS is not configured; token exchange requests will fail");
            None
        }
    };

    let exchange = Arc::new(TokenExchangeService::new(
        entra,
        acs,
        config.azure_ad.client_id.clone(),
    ));

    Ok(AppState::new(auth, exchange))
}

pub fn build_router(state: AppState, config: &Config) -> Router {
    let router = api::routes(state.clone()).with_state(state);

    let router = middleware::security_headers::apply(router);
    let router = middleware::cors::apply(router, config);
    middleware::http::apply(
        router,
        middleware::http::request_timeout(config.upstream_timeout),
    )
}
