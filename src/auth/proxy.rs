//! Confidential token-exchange proxy.
//!
//! The one deployable unit that holds the provider client secret. Public
//! clients POST `{code, code_verifier, redirect_uri}`; the proxy performs
//! the Basic-authenticated code grant and the profile fetch, then relays
//! both results verbatim. Stateless; nothing is persisted here.

use crate::config::ProxyConfig;
use crate::scrub::{sanitize_api_error, sanitized_failure};
use anyhow::Context;
use axum::{
    Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::{get, post},
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use zeroize::Zeroizing;

/// Exchange bodies are tiny; anything bigger is abuse.
pub const MAX_BODY_SIZE: usize = 16_384;
/// Request timeout, bounding both upstream legs together.
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Shared state for proxy handlers.
#[derive(Clone)]
pub struct ProxyState {
    http: Client,
    token_url: Arc<str>,
    profile_url: Arc<str>,
    /// Pre-computed `Basic <base64(client_id:client_secret)>` header value,
    /// wiped when the last clone drops.
    basic_auth: Arc<Zeroizing<String>>,
    access_key: Option<Arc<str>>,
}

#[derive(Debug, Deserialize)]
pub struct ExchangeBody {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub code_verifier: String,
    #[serde(default)]
    pub redirect_uri: String,
}

#[derive(Debug, Deserialize)]
struct ProfileEnvelope {
    data: Value,
}

impl ProxyState {
    pub fn new(proxy: &ProxyConfig, client_id: &str, client_secret: &Zeroizing<String>) -> Self {
        let credential = Zeroizing::new(format!("{client_id}:{}", client_secret.as_str()));
        let basic_auth = Arc::new(Zeroizing::new(format!(
            "Basic {}",
            BASE64_STANDARD.encode(credential.as_bytes())
        )));

        Self {
            http: Client::builder()
                .timeout(Duration::from_secs(10))
                .connect_timeout(Duration::from_secs(5))
                .build()
                .unwrap_or_else(|_| Client::new()),
            token_url: Arc::from(proxy.token_url.as_str()),
            profile_url: Arc::from(proxy.profile_url.as_str()),
            basic_auth,
            access_key: proxy.access_key.as_deref().map(Arc::from),
        }
    }

    fn access_key_ok(&self, headers: &HeaderMap) -> bool {
        let Some(expected) = &self.access_key else {
            return true;
        };
        headers
            .get("x-access-key")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|presented| constant_time_eq(presented, expected))
    }
}

/// Constant-time equality comparison for secret strings.
fn constant_time_eq(a: &str, b: &str) -> bool {
    use subtle::ConstantTimeEq;
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Read the confidential client secret from the environment.
pub fn secret_from_env() -> anyhow::Result<Zeroizing<String>> {
    let secret = Zeroizing::new(
        std::env::var("ECHOQUILL_CLIENT_SECRET")
            .context("ECHOQUILL_CLIENT_SECRET is not set; the proxy cannot start without it")?,
    );
    if secret.trim().is_empty() {
        anyhow::bail!("ECHOQUILL_CLIENT_SECRET is empty");
    }
    Ok(secret)
}

/// GET /health. Liveness only, nothing sensitive.
async fn handle_health() -> Json<Value> {
    Json(json!({ "status": "ok", "service": "echoquill-exchange" }))
}

/// POST /oauth/exchange, the whole reason this service exists.
async fn handle_exchange(
    State(state): State<ProxyState>,
    headers: HeaderMap,
    body: Result<Json<ExchangeBody>, axum::extract::rejection::JsonRejection>,
) -> (StatusCode, Json<Value>) {
    if !state.access_key_ok(&headers) {
        tracing::warn!("exchange request with missing or wrong access key");
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "invalid access key" })),
        );
    }

    let Json(body) = match body {
        Ok(b) => b,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": format!("invalid JSON body: {e}") })),
            );
        }
    };

    if body.code.is_empty() || body.code_verifier.is_empty() || body.redirect_uri.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "code, code_verifier and redirect_uri are required" })),
        );
    }

    // Leg 1: authorization-code grant, Basic-authenticated.
    let form = [
        ("grant_type", "authorization_code"),
        ("code", body.code.as_str()),
        ("redirect_uri", body.redirect_uri.as_str()),
        ("code_verifier", body.code_verifier.as_str()),
    ];
    let token_response = match state
        .http
        .post(state.token_url.as_ref())
        .header("Authorization", state.basic_auth.as_str())
        .form(&form)
        .send()
        .await
    {
        Ok(response) => response,
        Err(e) => return upstream_unreachable("Token exchange failed", &e),
    };

    if !token_response.status().is_success() {
        return relay_failure("Token exchange failed", token_response).await;
    }

    let tokens: Value = match token_response.json().await {
        Ok(v) => v,
        Err(e) => {
            return (
                StatusCode::BAD_GATEWAY,
                Json(json!({
                    "error": "Token exchange failed",
                    "details": format!("token endpoint sent undecodable JSON: {e}"),
                })),
            );
        }
    };

    let Some(access_token) = tokens.get("access_token").and_then(Value::as_str) else {
        return (
            StatusCode::BAD_GATEWAY,
            Json(json!({
                "error": "Token exchange failed",
                "details": "token endpoint returned no access_token",
            })),
        );
    };

    // Leg 2: who did we just link?
    let profile_response = match state
        .http
        .get(state.profile_url.as_ref())
        .query(&[("user.fields", "profile_image_url,verified")])
        .bearer_auth(access_token)
        .send()
        .await
    {
        Ok(response) => response,
        Err(e) => return upstream_unreachable("Profile fetch failed", &e),
    };

    if !profile_response.status().is_success() {
        return relay_failure("Profile fetch failed", profile_response).await;
    }

    let profile: ProfileEnvelope = match profile_response.json().await {
        Ok(p) => p,
        Err(e) => {
            return (
                StatusCode::BAD_GATEWAY,
                Json(json!({
                    "error": "Profile fetch failed",
                    "details": format!("profile endpoint sent undecodable JSON: {e}"),
                })),
            );
        }
    };

    tracing::info!("token exchange completed");
    (
        StatusCode::OK,
        Json(json!({ "tokens": tokens, "user": profile.data })),
    )
}

/// Relay an upstream failure with its original status and a scrubbed body.
async fn relay_failure(stage: &'static str, response: reqwest::Response) -> (StatusCode, Json<Value>) {
    let (status, details) = sanitized_failure(response).await;
    tracing::warn!(stage, status, "upstream call failed");
    (
        StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY),
        Json(json!({ "error": stage, "details": details })),
    )
}

fn upstream_unreachable(stage: &'static str, err: &reqwest::Error) -> (StatusCode, Json<Value>) {
    tracing::warn!(stage, error = %err, "upstream unreachable");
    (
        StatusCode::BAD_GATEWAY,
        Json(json!({ "error": stage, "details": sanitize_api_error(&err.to_string()) })),
    )
}

pub fn router(state: ProxyState) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route("/oauth/exchange", post(handle_exchange))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(RequestBodyLimitLayer::new(MAX_BODY_SIZE))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(REQUEST_TIMEOUT_SECS),
        ))
}

/// Run the exchange proxy on the configured bind address.
pub async fn run_proxy(host: &str, port: u16, state: ProxyState) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{host}:{port}").parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    run_proxy_with_listener(listener, state).await
}

/// Run the exchange proxy from a pre-bound listener.
pub async fn run_proxy_with_listener(
    listener: tokio::net::TcpListener,
    state: ProxyState,
) -> anyhow::Result<()> {
    let addr = listener.local_addr()?;
    println!("◆ exchange proxy listening on {addr}");
    println!("  POST /oauth/exchange");
    println!("  GET  /health");
    println!("  Press Ctrl+C to stop\n");

    axum::serve(listener, router(state)).await?;
    Ok(())
}
