use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use serde::Deserialize;

/// Bootstrap a communication session the way the Teams tab does, from the command line.
///
/// - POST /Identity/exchange-token with the caller's Entra ID token
/// - Optionally POST /Identity/refresh-acs-token for the identity just created
/// - Tokens are printed as lengths only unless `--show-tokens` is given
#[derive(Parser, Debug)]
#[command(name = "session-probe", version, about)]
struct Args {
    /// Base URL of the token exchange service
    #[arg(long, default_value = "http://localhost:3000")]
    base_url: String,

    /// Entra ID access token of the signed-in user (audience: this API)
    #[arg(long, env = "SESSION_PROBE_TOKEN", hide_env_values = true)]
    token: String,

    /// Also refresh the ACS token of the new identity
    #[arg(long, default_value_t = false)]
    refresh: bool,

    /// Print full tokens instead of their lengths
    #[arg(long, default_value_t = false)]
    show_tokens: bool,

    /// Request timeout in seconds
    #[arg(long, default_value_t = 30)]
    timeout: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExchangeResponse {
    new_user_token: String,
    new_user_id: String,
    c_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RefreshResponse {
    token: String,
    expires_on: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: String,
    message: String,
}

fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path.trim_start_matches('/'))
}

fn describe(token: &str, show: bool) -> String {
    if show {
        token.to_string()
    } else {
        format!("<{} chars>", token.len())
    }
}

async fn read_json<T: for<'de> Deserialize<'de>>(res: reqwest::Response) -> Result<T> {
    let status = res.status();
    let bytes = res.bytes().await.context("failed to read response body")?;

    if !status.is_success() {
        match serde_json::from_slice::<ErrorResponse>(&bytes) {
            Ok(body) => bail!(
                "{} {}: {}",
                status.as_u16(),
                body.error.code,
                body.error.message
            ),
            Err(_) => bail!("{} (no error body)", status.as_u16()),
        }
    }

    serde_json::from_slice(&bytes).context("unexpected response body")
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(args.timeout))
        .build()?;

    let res = http
        .post(endpoint(&args.base_url, "/Identity/exchange-token"))
        .bearer_auth(&args.token)
        .send()
        .await
        .context("exchange-token request failed")?;
    let exchanged: ExchangeResponse = read_json(res).await?;

    println!("acs user id:  {}", exchanged.new_user_id);
    println!(
        "user token:   {}",
        describe(&exchanged.new_user_token, args.show_tokens)
    );
    println!("teams token:  {}", describe(&exchanged.c_token, args.show_tokens));

    if !args.refresh {
        return Ok(());
    }

    let res = http
        .post(endpoint(&args.base_url, "/Identity/refresh-acs-token"))
        .bearer_auth(&args.token)
        .json(&serde_json::json!({ "AcsUserId": exchanged.new_user_id }))
        .send()
        .await
        .context("refresh-acs-token request failed")?;
    let refreshed: RefreshResponse = read_json(res).await?;

    println!("refreshed:    {}", describe(&refreshed.token, args.show_tokens));
    println!("expires on:   {}", refreshed.expires_on);

    Ok(())
}
