//! Suggestion pipeline: turn a persona into search queries, search
//! queries into candidate posts, and candidates into drafted replies
//! waiting for review.

use crate::completion::{CompletionClient, extract};
use crate::content::{Candidate, ContentFetcher, ContentSource};
use crate::error::{CompletionError, StoreError};
use crate::store::{NewSuggestion, Persona, Store, Suggestion};
use serde::Deserialize;
use tracing::{info, warn};

/// High temperature diversifies the queries across runs.
pub const QUERY_TEMPERATURE: f64 = 0.8;
/// Middle ground for drafting: in-voice but not word-for-word.
pub const REPLY_TEMPERATURE: f64 = 0.7;

const QUERY_COUNT: usize = 5;
const REPLY_CHAR_BUDGET: usize = 280;

/// A drafted reply with the model's own confidence and a one-line
/// rationale, parsed straight from the completion.
#[derive(Debug, Clone, Deserialize)]
pub struct ReplyDraft {
    pub reply: String,
    pub confidence: i64,
    pub reasoning: String,
}

/// Outcome counts for one full sweep.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub queries: usize,
    pub fallback_queries: usize,
    pub candidates_seen: usize,
    pub recorded: usize,
    pub failed: usize,
}

pub struct SuggestionPipeline<'a> {
    completion: &'a dyn CompletionClient,
    fetcher: &'a ContentFetcher,
    store: &'a Store,
}

fn queries_prompt(persona: &Persona) -> String {
    format!(
        "This account's voice profile:\n\
         tone: {tone}\n\
         topics: {topics}\n\
         interaction style: {style}\n\n\
         Produce short search queries that would surface public posts this \
         account would genuinely want to reply to.\n\
         Respond with ONLY a JSON array of exactly {QUERY_COUNT} query strings.",
        tone = persona.tone,
        topics = persona.topics.join(", "),
        style = persona.interaction_style,
    )
}

fn reply_prompt(persona: &Persona, target_text: &str, target_author: &str) -> String {
    format!(
        "You draft replies in the voice of a specific account.\n\
         Voice profile:\n\
         tone: {tone}\n\
         topics: {topics}\n\
         interaction style: {style}\n\
         identity: {identity}\n\n\
         Target post by @{target_author}:\n\
         {target_text}\n\n\
         Write a reply under {REPLY_CHAR_BUDGET} characters that sounds like \
         the account and adds something to the conversation.\n\
         Respond with ONLY a JSON object:\n\
         {{\"reply\": \"the reply text\", \"confidence\": 1, \"reasoning\": \"one sentence\"}}\n\
         confidence is an integer from 1 to 100.",
        tone = persona.tone,
        topics = persona.topics.join(", "),
        style = persona.interaction_style,
        identity = persona.identity_blurb,
    )
}

fn parse_queries(text: &str) -> Result<Vec<String>, CompletionError> {
    let span = extract::first_array(text).ok_or_else(|| {
        CompletionError::MalformedQueryList("no JSON array in completion".to_string())
    })?;
    serde_json::from_str(span).map_err(|err| CompletionError::MalformedQueryList(err.to_string()))
}

fn parse_reply(text: &str) -> Result<ReplyDraft, CompletionError> {
    let span = extract::first_object(text).ok_or_else(|| {
        CompletionError::MalformedReply("no JSON object in completion".to_string())
    })?;
    let mut draft: ReplyDraft =
        serde_json::from_str(span).map_err(|err| CompletionError::MalformedReply(err.to_string()))?;
    draft.confidence = draft.confidence.clamp(0, 100);
    Ok(draft)
}

impl<'a> SuggestionPipeline<'a> {
    pub fn new(
        completion: &'a dyn CompletionClient,
        fetcher: &'a ContentFetcher,
        store: &'a Store,
    ) -> Self {
        Self {
            completion,
            fetcher,
            store,
        }
    }

    /// Search queries tuned to the persona's topics.
    pub async fn generate_search_queries(
        &self,
        persona: &Persona,
    ) -> Result<Vec<String>, CompletionError> {
        let response = self
            .completion
            .complete(&queries_prompt(persona), QUERY_TEMPERATURE)
            .await?;
        parse_queries(&response)
    }

    /// Draft one in-voice reply to a target post.
    pub async fn draft_reply(
        &self,
        persona: &Persona,
        target_text: &str,
        target_author: &str,
    ) -> Result<ReplyDraft, CompletionError> {
        let response = self
            .completion
            .complete(
                &reply_prompt(persona, target_text, target_author),
                REPLY_TEMPERATURE,
            )
            .await?;
        parse_reply(&response)
    }

    /// Persist a draft as a pending suggestion. `topic` is the search
    /// query that surfaced the candidate.
    pub async fn record_suggestion(
        &self,
        identity_id: &str,
        candidate: &Candidate,
        draft: &ReplyDraft,
        topic: &str,
    ) -> Result<Suggestion, StoreError> {
        self.store
            .record_suggestion(NewSuggestion {
                identity_id: identity_id.to_string(),
                target_content_id: candidate.platform_content_id.clone(),
                target_author: candidate.author.clone(),
                target_text: candidate.text.clone(),
                reply_text: draft.reply.clone(),
                confidence: draft.confidence,
                topic: topic.to_string(),
                engagement_count: candidate.engagement_count,
            })
            .await
    }

    /// The full sweep: queries, then per-query search, then per-candidate
    /// drafting. A draft failure skips that candidate and keeps going;
    /// everything recorded before a hard failure stands.
    pub async fn run(
        &self,
        persona: &Persona,
        access_token: &str,
        per_query: u8,
    ) -> crate::error::Result<RunSummary> {
        let queries = self.generate_search_queries(persona).await?;
        let mut summary = RunSummary {
            queries: queries.len(),
            ..RunSummary::default()
        };

        for query in &queries {
            let (candidates, source) = self
                .fetcher
                .search_recent(access_token, query, per_query)
                .await;
            if source == ContentSource::Fallback {
                summary.fallback_queries += 1;
            }
            summary.candidates_seen += candidates.len();

            for candidate in &candidates {
                match self
                    .draft_reply(persona, &candidate.text, &candidate.author)
                    .await
                {
                    Ok(draft) => {
                        self.record_suggestion(&persona.identity_id, candidate, &draft, query)
                            .await?;
                        summary.recorded += 1;
                    }
                    Err(err) => {
                        warn!(
                            target_id = %candidate.platform_content_id,
                            "skipping candidate, draft failed: {err}"
                        );
                        summary.failed += 1;
                    }
                }
            }
        }

        info!(
            queries = summary.queries,
            recorded = summary.recorded,
            failed = summary.failed,
            "suggestion sweep finished"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{ProviderProfile, TokenBundle};
    use crate::store::SuggestionStatus;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct Scripted {
        responses: Mutex<VecDeque<String>>,
        temperatures: Mutex<Vec<f64>>,
    }

    impl Scripted {
        fn new(responses: &[&str]) -> Self {
            Self {
                responses: Mutex::new(responses.iter().map(|s| (*s).to_string()).collect()),
                temperatures: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl CompletionClient for Scripted {
        async fn complete(
            &self,
            _prompt: &str,
            temperature: f64,
        ) -> Result<String, CompletionError> {
            self.temperatures.lock().unwrap().push(temperature);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .ok_or(CompletionError::NoCompletion)
        }
    }

    fn persona_for(identity_id: &str) -> Persona {
        Persona {
            identity_id: identity_id.to_string(),
            tone: "wry".into(),
            topics: vec!["rust".into(), "databases".into(), "coffee".into()],
            interaction_style: "short and direct".into(),
            identity_blurb: "a systems programmer".into(),
            confidence: 80,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    async fn logged_in_store() -> (Store, String) {
        let store = Store::in_memory().await.unwrap();
        let identity = store
            .persist_login(
                &ProviderProfile {
                    id: "42".into(),
                    username: "alice".into(),
                    name: "Alice".into(),
                    profile_image_url: None,
                    verified: None,
                },
                &TokenBundle {
                    access_token: "token-abc".into(),
                    refresh_token: None,
                    expires_in: None,
                    scope: None,
                    token_type: None,
                },
            )
            .await
            .unwrap();
        (store, identity.id)
    }

    #[test]
    fn parses_query_list_wrapped_in_prose() {
        let text = "Here you go:\n[\"rust async\", \"sqlite tuning\", \"espresso\", \"tokio\", \"cli ux\"]";
        let queries = parse_queries(text).unwrap();
        assert_eq!(queries.len(), 5);
        assert_eq!(queries[0], "rust async");
    }

    #[test]
    fn missing_array_is_malformed_query_list() {
        assert!(matches!(
            parse_queries("no list today"),
            Err(CompletionError::MalformedQueryList(_))
        ));
        assert!(matches!(
            parse_queries("[1, 2, 3]"),
            Err(CompletionError::MalformedQueryList(_))
        ));
    }

    #[test]
    fn parses_reply_draft_and_clamps_confidence() {
        let text = r#"{"reply": "nice take", "confidence": 300, "reasoning": "on topic"}"#;
        let draft = parse_reply(text).unwrap();
        assert_eq!(draft.reply, "nice take");
        assert_eq!(draft.confidence, 100);
    }

    #[test]
    fn reply_without_fields_is_malformed() {
        assert!(matches!(
            parse_reply(r#"{"reply": "text only"}"#),
            Err(CompletionError::MalformedReply(_))
        ));
        assert!(matches!(
            parse_reply("prose with no object at all"),
            Err(CompletionError::MalformedReply(_))
        ));
    }

    #[tokio::test]
    async fn temperatures_differ_per_stage() {
        let (store, _) = logged_in_store().await;
        let fetcher = ContentFetcher::with_base_url("http://127.0.0.1:9", 50);
        let scripted = Scripted::new(&[
            r#"["q1"]"#,
            r#"{"reply": "r", "confidence": 50, "reasoning": "x"}"#,
        ]);
        let pipeline = SuggestionPipeline::new(&scripted, &fetcher, &store);

        let persona = persona_for("uuid-1");
        pipeline.generate_search_queries(&persona).await.unwrap();
        pipeline
            .draft_reply(&persona, "some post", "bob")
            .await
            .unwrap();

        assert_eq!(
            *scripted.temperatures.lock().unwrap(),
            vec![QUERY_TEMPERATURE, REPLY_TEMPERATURE]
        );
    }

    #[tokio::test]
    async fn run_records_suggestions_and_isolates_draft_failures() {
        let (store, identity_id) = logged_in_store().await;

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/posts/search/recent"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        let fetcher = ContentFetcher::with_base_url(&server.uri(), 50);

        // One query, two fallback candidates: first draft valid, second malformed.
        let scripted = Scripted::new(&[
            r#"["rust async"]"#,
            r#"{"reply": "good point", "confidence": 70, "reasoning": "relevant"}"#,
            "sorry, I cannot help with that",
        ]);
        let pipeline = SuggestionPipeline::new(&scripted, &fetcher, &store);

        let summary = pipeline
            .run(&persona_for(&identity_id), "token-abc", 2)
            .await
            .unwrap();

        assert_eq!(summary.queries, 1);
        assert_eq!(summary.fallback_queries, 1);
        assert_eq!(summary.candidates_seen, 2);
        assert_eq!(summary.recorded, 1);
        assert_eq!(summary.failed, 1);

        let stored = store.list_suggestions(&identity_id, None).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].status, SuggestionStatus::Pending);
        assert_eq!(stored[0].topic, "rust async");
        assert_eq!(stored[0].reply_text, "good point");
    }

    #[tokio::test]
    async fn run_fails_outright_when_query_generation_fails() {
        let (store, identity_id) = logged_in_store().await;
        let fetcher = ContentFetcher::with_base_url("http://127.0.0.1:9", 50);
        let scripted = Scripted::new(&["no list in this response"]);
        let pipeline = SuggestionPipeline::new(&scripted, &fetcher, &store);

        let err = pipeline
            .run(&persona_for(&identity_id), "token-abc", 2)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("query list"));

        let stored = store.list_suggestions(&identity_id, None).await.unwrap();
        assert!(stored.is_empty());
    }

    #[tokio::test]
    async fn recorded_suggestion_starts_pending_with_candidate_fields() {
        let (store, identity_id) = logged_in_store().await;
        let fetcher = ContentFetcher::with_base_url("http://127.0.0.1:9", 50);
        let scripted = Scripted::new(&[]);
        let pipeline = SuggestionPipeline::new(&scripted, &fetcher, &store);

        let candidate = Candidate {
            platform_content_id: "c1".into(),
            author: "bob".into(),
            text: "target".into(),
            engagement_count: 3,
        };
        let draft = ReplyDraft {
            reply: "a reply".into(),
            confidence: 60,
            reasoning: "fits".into(),
        };

        let recorded = pipeline
            .record_suggestion(&identity_id, &candidate, &draft, "rust")
            .await
            .unwrap();
        assert_eq!(recorded.status, SuggestionStatus::Pending);
        assert_eq!(recorded.target_author, "bob");
        assert_eq!(recorded.engagement_count, 3);
        assert_eq!(recorded.topic, "rust");
    }
}
