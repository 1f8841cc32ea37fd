//! OAuth session controller: authorization URL construction, the single-slot
//! PKCE handshake, and callback completion through the exchange proxy.

use crate::auth::exchange::{ExchangeClient, ExchangeSuccess};
use crate::auth::pkce;
use crate::config::OAuthConfig;
use crate::error::AuthError;
use anyhow::Context;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};
use url::Url;

/// A begun handshake is honored for this long before the callback arrives.
const HANDSHAKE_TTL: Duration = Duration::from_secs(600);

/// Verifier and state for the one in-flight authorization attempt.
/// Consumed exactly once; a new `begin_authorization` replaces it.
struct Handshake {
    verifier: String,
    state: String,
    started_at: Instant,
}

pub struct AuthorizationRequest {
    /// Full authorization URL to open in a browser.
    pub url: String,
    /// The anti-forgery nonce embedded in that URL.
    pub state: String,
}

pub struct OAuthController {
    client_id: String,
    redirect_uri: String,
    scopes: String,
    authorize_url: Url,
    exchange: ExchangeClient,
    handshake: Mutex<Option<Handshake>>,
    ttl: Duration,
}

impl OAuthController {
    pub fn new(oauth: &OAuthConfig, exchange: ExchangeClient) -> anyhow::Result<Self> {
        Self::with_ttl(oauth, exchange, HANDSHAKE_TTL)
    }

    fn with_ttl(
        oauth: &OAuthConfig,
        exchange: ExchangeClient,
        ttl: Duration,
    ) -> anyhow::Result<Self> {
        if oauth.client_id.is_empty() {
            anyhow::bail!(
                "oauth.client_id is not configured. Set it in config.toml or ECHOQUILL_CLIENT_ID."
            );
        }
        let authorize_url =
            Url::parse(&oauth.authorize_url).context("oauth.authorize_url is not a valid URL")?;

        Ok(Self {
            client_id: oauth.client_id.clone(),
            redirect_uri: oauth.redirect_uri.clone(),
            scopes: oauth.scopes.clone(),
            authorize_url,
            exchange,
            handshake: Mutex::new(None),
            ttl,
        })
    }

    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    /// Start a fresh handshake and build the authorization URL.
    ///
    /// Any prior pending handshake is overwritten; its state can no longer
    /// complete.
    pub fn begin_authorization(&self) -> AuthorizationRequest {
        let verifier = pkce::new_verifier();
        let challenge = pkce::challenge(&verifier);
        let state = pkce::new_state();

        let mut url = self.authorize_url.clone();
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("scope", &self.scopes)
            .append_pair("state", &state)
            .append_pair("code_challenge", &challenge)
            .append_pair("code_challenge_method", "S256");

        let mut slot = self
            .handshake
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *slot = Some(Handshake {
            verifier,
            state: state.clone(),
            started_at: Instant::now(),
        });

        AuthorizationRequest {
            url: url.to_string(),
            state,
        }
    }

    /// Finish the handshake with the callback's `code` and `state`.
    ///
    /// The slot is consumed up front, so a failed exchange also burns the
    /// attempt; authorization codes are single-use upstream anyway. Nothing
    /// is persisted here.
    pub async fn complete_authorization(
        &self,
        code: &str,
        state: &str,
    ) -> Result<ExchangeSuccess, AuthError> {
        let handshake = self
            .handshake
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        let Some(handshake) = handshake else {
            return Err(AuthError::InvalidState);
        };
        if handshake.started_at.elapsed() > self.ttl {
            return Err(AuthError::InvalidState);
        }
        if handshake.state != state {
            return Err(AuthError::InvalidState);
        }
        if code.is_empty() {
            return Err(AuthError::MissingCode);
        }

        let success = self
            .exchange
            .exchange(code, &handshake.verifier, &self.redirect_uri)
            .await?;
        Ok(success)
    }
}

/// Query parameters carried back on the redirect URI.
#[derive(Debug)]
pub struct CallbackParams {
    pub code: String,
    pub state: String,
}

/// Pull `code`/`state` out of a pasted callback URL.
///
/// A provider `error` parameter (user denied, bad scope) fails here with the
/// provider's reason rather than producing a doomed exchange attempt.
pub fn parse_callback_url(raw: &str) -> anyhow::Result<CallbackParams> {
    let url = Url::parse(raw.trim()).context("callback URL did not parse")?;

    let mut code = None;
    let mut state = None;
    let mut error = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            _ => {}
        }
    }

    if let Some(reason) = error {
        anyhow::bail!("provider denied authorization: {reason}");
    }

    Ok(CallbackParams {
        code: code.unwrap_or_default(),
        state: state.unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_oauth_config() -> OAuthConfig {
        OAuthConfig {
            client_id: "client-123".into(),
            redirect_uri: "http://127.0.0.1:3000/callback".into(),
            scopes: "post.read users.read".into(),
            authorize_url: "https://id.example/oauth2/authorize".into(),
        }
    }

    fn offline_exchange() -> ExchangeClient {
        ExchangeClient::with_base_url("http://127.0.0.1:9", None)
    }

    fn controller() -> OAuthController {
        OAuthController::new(&test_oauth_config(), offline_exchange()).unwrap()
    }

    #[test]
    fn rejects_missing_client_id() {
        let mut cfg = test_oauth_config();
        cfg.client_id.clear();
        assert!(OAuthController::new(&cfg, offline_exchange()).is_err());
    }

    #[test]
    fn authorization_url_carries_pkce_params() {
        let ctrl = controller();
        let request = ctrl.begin_authorization();
        let url = Url::parse(&request.url).unwrap();

        let pairs: std::collections::HashMap<_, _> = url.query_pairs().collect();
        assert_eq!(pairs["response_type"], "code");
        assert_eq!(pairs["client_id"], "client-123");
        assert_eq!(pairs["code_challenge_method"], "S256");
        assert_eq!(pairs["state"], request.state.as_str());
        assert_eq!(pairs["code_challenge"].len(), 43);
        // The verifier never appears in the URL.
        assert!(!request.url.contains("code_verifier"));
    }

    #[tokio::test]
    async fn complete_without_begin_is_invalid_state() {
        let ctrl = controller();
        let err = ctrl.complete_authorization("code", "state").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidState));
    }

    #[tokio::test]
    async fn mismatched_state_is_rejected() {
        let ctrl = controller();
        ctrl.begin_authorization();
        let err = ctrl
            .complete_authorization("code", "not-the-state")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidState));
    }

    #[tokio::test]
    async fn empty_code_is_missing_code() {
        let ctrl = controller();
        let request = ctrl.begin_authorization();
        let err = ctrl
            .complete_authorization("", &request.state)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::MissingCode));
    }

    #[tokio::test]
    async fn second_begin_invalidates_first_state() {
        let ctrl = controller();
        let first = ctrl.begin_authorization();
        let _second = ctrl.begin_authorization();
        let err = ctrl
            .complete_authorization("code", &first.state)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidState));
    }

    #[tokio::test]
    async fn expired_handshake_is_invalid_state() {
        let ctrl =
            OAuthController::with_ttl(&test_oauth_config(), offline_exchange(), Duration::ZERO)
                .unwrap();
        let request = ctrl.begin_authorization();
        tokio::time::sleep(Duration::from_millis(5)).await;
        let err = ctrl
            .complete_authorization("code", &request.state)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidState));
    }

    #[tokio::test]
    async fn happy_path_consumes_slot_exactly_once() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/exchange"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "tokens": { "access_token": "at-1" },
                "user": { "id": "42", "username": "alice", "name": "Alice" }
            })))
            .mount(&server)
            .await;

        let exchange = ExchangeClient::with_base_url(&server.uri(), None);
        let ctrl = OAuthController::new(&test_oauth_config(), exchange).unwrap();

        let request = ctrl.begin_authorization();
        let success = ctrl
            .complete_authorization("code-abc", &request.state)
            .await
            .unwrap();
        assert_eq!(success.user.id, "42");

        // Replaying the same callback finds no handshake.
        let err = ctrl
            .complete_authorization("code-abc", &request.state)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidState));
    }

    #[test]
    fn callback_url_parses_code_and_state() {
        let params =
            parse_callback_url("http://127.0.0.1:3000/callback?code=abc&state=xyz").unwrap();
        assert_eq!(params.code, "abc");
        assert_eq!(params.state, "xyz");
    }

    #[test]
    fn callback_error_param_fails_fast() {
        let err = parse_callback_url("http://127.0.0.1:3000/callback?error=access_denied")
            .unwrap_err();
        assert!(err.to_string().contains("access_denied"));
    }

    #[test]
    fn callback_without_params_yields_empty_fields() {
        let params = parse_callback_url("http://127.0.0.1:3000/callback").unwrap();
        assert!(params.code.is_empty());
        assert!(params.state.is_empty());
    }
}
