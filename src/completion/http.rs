use crate::completion::CompletionClient;
use crate::config::CompletionConfig;
use crate::error::CompletionError;
use crate::scrub::{sanitize_api_error, sanitized_failure};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// OpenAI-compatible chat completion client pinned to one configured
/// model. Temperature is the only per-call knob.
pub struct HttpCompletionClient {
    /// Pre-computed `"Bearer <key>"` header value (avoids `format!` per request).
    cached_auth_header: String,
    chat_url: String,
    model: String,
    client: Client,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    temperature: f64,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

impl HttpCompletionClient {
    pub fn new(config: &CompletionConfig, api_key: &str) -> Self {
        Self::with_base_url(&config.base_url, &config.model, api_key)
    }

    pub fn with_base_url(base_url: &str, model: &str, api_key: &str) -> Self {
        Self {
            cached_auth_header: format!("Bearer {api_key}"),
            chat_url: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            model: model.to_string(),
            client: Client::builder()
                .timeout(Duration::from_secs(120))
                .connect_timeout(Duration::from_secs(10))
                .pool_max_idle_per_host(10)
                .pool_idle_timeout(Duration::from_secs(90))
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }

    fn build_request(model: &str, prompt: &str, temperature: f64) -> ChatRequest {
        ChatRequest {
            model: model.to_string(),
            messages: vec![Message {
                role: "user",
                content: prompt.to_string(),
            }],
            temperature,
        }
    }

    fn extract_text(chat_response: ChatResponse) -> Result<String, CompletionError> {
        let content = chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();

        if content.trim().is_empty() {
            return Err(CompletionError::NoCompletion);
        }
        Ok(content)
    }
}

#[async_trait]
impl CompletionClient for HttpCompletionClient {
    async fn complete(&self, prompt: &str, temperature: f64) -> Result<String, CompletionError> {
        let request = Self::build_request(&self.model, prompt, temperature);

        let response = self
            .client
            .post(&self.chat_url)
            .header("Authorization", &self.cached_auth_header)
            .json(&request)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    CompletionError::Timeout
                } else {
                    CompletionError::Transport(sanitize_api_error(&err.to_string()))
                }
            })?;

        if !response.status().is_success() {
            let (status, body) = sanitized_failure(response).await;
            return Err(CompletionError::Api { status, body });
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|_| CompletionError::NoCompletion)?;
        Self::extract_text(chat_response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(base_url: &str) -> HttpCompletionClient {
        HttpCompletionClient::with_base_url(base_url, "test-model", "or-key-1")
    }

    #[test]
    fn request_serializes_single_user_message() {
        let request = HttpCompletionClient::build_request("test-model", "say hi", 0.3);
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["model"], "test-model");
        assert_eq!(json["temperature"], 0.3);
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][0]["content"], "say hi");
    }

    #[test]
    fn empty_choices_is_no_completion() {
        let response: ChatResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(matches!(
            HttpCompletionClient::extract_text(response),
            Err(CompletionError::NoCompletion)
        ));
    }

    #[test]
    fn whitespace_content_is_no_completion() {
        let response: ChatResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"content":"  \n "}}]}"#).unwrap();
        assert!(matches!(
            HttpCompletionClient::extract_text(response),
            Err(CompletionError::NoCompletion)
        ));
    }

    #[tokio::test]
    async fn complete_posts_bearer_auth_and_returns_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("Authorization", "Bearer or-key-1"))
            .and(body_partial_json(serde_json::json!({
                "model": "test-model",
                "temperature": 0.7,
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"content": "drafted text"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let text = client(&server.uri()).complete("draft me", 0.7).await.unwrap();
        assert_eq!(text, "drafted text");
    }

    #[tokio::test]
    async fn non_success_maps_to_api_error_with_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(429).set_body_string(r#"{"error":"rate limited"}"#),
            )
            .mount(&server)
            .await;

        let err = client(&server.uri()).complete("draft", 0.7).await.unwrap_err();
        match err {
            CompletionError::Api { status, body } => {
                assert_eq!(status, 429);
                assert!(body.contains("rate limited"));
            }
            other => panic!("expected Api error, got {other}"),
        }
    }

    #[tokio::test]
    async fn unreachable_host_is_transport_error() {
        let client = HttpCompletionClient::with_base_url(
            "http://127.0.0.1:9",
            "test-model",
            "or-key-1",
        );
        let err = client.complete("draft", 0.7).await.unwrap_err();
        assert!(matches!(
            err,
            CompletionError::Transport(_) | CompletionError::Timeout
        ));
    }
}
