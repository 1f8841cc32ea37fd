//! Typed client for the token exchange proxy.
//!
//! The public client never holds provider credentials; it hands the
//! authorization code and PKCE verifier to the proxy and gets back tokens
//! plus the linked profile in one round trip.

use crate::config::ProxyConfig;
use crate::error::ExchangeError;
use crate::scrub::{sanitize_api_error, sanitized_failure};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tokens minted by the identity provider, relayed verbatim by the proxy.
/// Opaque to this crate; only stored and replayed.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenBundle {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
}

/// Profile fields the provider reports for the newly linked account.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderProfile {
    pub id: String,
    pub username: String,
    pub name: String,
    #[serde(default)]
    pub profile_image_url: Option<String>,
    #[serde(default)]
    pub verified: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct ExchangeSuccess {
    pub tokens: TokenBundle,
    pub user: ProviderProfile,
}

#[derive(Debug, Serialize)]
struct ExchangeRequest<'a> {
    code: &'a str,
    code_verifier: &'a str,
    redirect_uri: &'a str,
}

#[derive(Debug, Deserialize)]
struct ProxyErrorBody {
    error: String,
}

pub struct ExchangeClient {
    client: Client,
    exchange_url: String,
    access_key: Option<String>,
}

impl ExchangeClient {
    pub fn new(proxy: &ProxyConfig) -> Self {
        Self::with_base_url(&proxy.base_url, proxy.access_key.clone())
    }

    pub fn with_base_url(base_url: &str, access_key: Option<String>) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(30))
                .connect_timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_else(|_| Client::new()),
            exchange_url: format!("{}/oauth/exchange", base_url.trim_end_matches('/')),
            access_key,
        }
    }

    /// Trade `{code, verifier, redirect_uri}` for tokens and the profile.
    pub async fn exchange(
        &self,
        code: &str,
        code_verifier: &str,
        redirect_uri: &str,
    ) -> Result<ExchangeSuccess, ExchangeError> {
        let request = ExchangeRequest {
            code,
            code_verifier,
            redirect_uri,
        };

        let mut builder = self.client.post(&self.exchange_url).json(&request);
        if let Some(key) = &self.access_key {
            builder = builder.header("X-Access-Key", key);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                ExchangeError::Transport("proxy request timed out".into())
            } else {
                ExchangeError::Transport(sanitize_api_error(&e.to_string()))
            }
        })?;

        if !response.status().is_success() {
            return Err(Self::map_failure(response).await);
        }

        response
            .json()
            .await
            .map_err(|e| ExchangeError::Transport(format!("exchange response decode failed: {e}")))
    }

    /// Classify a non-success proxy response.
    ///
    /// The proxy relays upstream failures with their original status and a
    /// `{error, details}` body whose `error` names the failed stage; anything
    /// else is the proxy rejecting the request itself.
    async fn map_failure(response: reqwest::Response) -> ExchangeError {
        let (status, body) = sanitized_failure(response).await;

        match serde_json::from_str::<ProxyErrorBody>(&body) {
            Ok(parsed) if parsed.error.contains("Profile fetch") => {
                ExchangeError::UpstreamProfile { status, body }
            }
            Ok(parsed) if parsed.error.contains("Token exchange") => {
                ExchangeError::UpstreamToken { status, body }
            }
            Ok(parsed) => ExchangeError::BadRequest(parsed.error),
            Err(_) => ExchangeError::UpstreamToken { status, body },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn success_body() -> serde_json::Value {
        serde_json::json!({
            "tokens": {
                "access_token": "at-123",
                "refresh_token": "rt-456",
                "expires_in": 7200,
                "token_type": "bearer"
            },
            "user": {
                "id": "42",
                "username": "alice",
                "name": "Alice",
                "profile_image_url": "https://img.example/a.png",
                "verified": true
            }
        })
    }

    #[tokio::test]
    async fn exchange_returns_tokens_and_profile() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/exchange"))
            .and(body_partial_json(serde_json::json!({
                "code": "code-abc",
                "redirect_uri": "http://127.0.0.1:3000/callback"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(success_body()))
            .mount(&server)
            .await;

        let client = ExchangeClient::with_base_url(&server.uri(), None);
        let success = client
            .exchange("code-abc", "verifier-xyz", "http://127.0.0.1:3000/callback")
            .await
            .unwrap();

        assert_eq!(success.user.id, "42");
        assert_eq!(success.user.username, "alice");
        assert_eq!(success.tokens.access_token, "at-123");
        assert_eq!(success.tokens.refresh_token.as_deref(), Some("rt-456"));
    }

    #[tokio::test]
    async fn access_key_header_is_sent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/exchange"))
            .and(header("X-Access-Key", "shared-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(success_body()))
            .expect(1)
            .mount(&server)
            .await;

        let client = ExchangeClient::with_base_url(&server.uri(), Some("shared-key".into()));
        client
            .exchange("c", "v", "http://127.0.0.1:3000/callback")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn missing_field_rejection_maps_to_bad_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/exchange"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "code, code_verifier and redirect_uri are required"
            })))
            .mount(&server)
            .await;

        let client = ExchangeClient::with_base_url(&server.uri(), None);
        let err = client.exchange("", "v", "uri").await.unwrap_err();
        assert!(matches!(err, ExchangeError::BadRequest(_)));
    }

    #[tokio::test]
    async fn relayed_token_failure_keeps_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/exchange"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "error": "Token exchange failed",
                "details": "invalid_client"
            })))
            .mount(&server)
            .await;

        let client = ExchangeClient::with_base_url(&server.uri(), None);
        let err = client.exchange("c", "v", "uri").await.unwrap_err();
        match err {
            ExchangeError::UpstreamToken { status, body } => {
                assert_eq!(status, 401);
                assert!(body.contains("invalid_client"));
            }
            other => panic!("expected UpstreamToken, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn relayed_profile_failure_is_distinguished() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/exchange"))
            .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
                "error": "Profile fetch failed",
                "details": "forbidden"
            })))
            .mount(&server)
            .await;

        let client = ExchangeClient::with_base_url(&server.uri(), None);
        let err = client.exchange("c", "v", "uri").await.unwrap_err();
        assert!(matches!(
            err,
            ExchangeError::UpstreamProfile { status: 403, .. }
        ));
    }

    #[tokio::test]
    async fn undecodable_success_body_is_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/exchange"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let client = ExchangeClient::with_base_url(&server.uri(), None);
        let err = client.exchange("c", "v", "uri").await.unwrap_err();
        assert!(matches!(err, ExchangeError::Transport(_)));
    }
}
