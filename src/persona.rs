//! Persona analysis: distill an account's recent writing into a voice
//! profile the reply drafter can imitate.

use crate::completion::{CompletionClient, extract};
use crate::error::CompletionError;
use crate::store::{ContentItem, Persona};
use serde::Deserialize;

/// Low temperature keeps profile extraction close to the source text.
pub const PERSONA_TEMPERATURE: f64 = 0.3;

/// Shape the model is asked to return. `identity` is its name for the
/// one-line self description; we store it as `identity_blurb`.
#[derive(Debug, Deserialize)]
struct RawPersona {
    tone: String,
    topics: Vec<String>,
    interaction_style: String,
    identity: String,
    confidence: i64,
}

/// Posts first, then replies, one item per paragraph. Replies carry their
/// conversational register, so they stay distinct from the post section.
pub fn build_corpus(posts: &[ContentItem], replies: &[ContentItem]) -> String {
    posts
        .iter()
        .chain(replies.iter())
        .map(|item| item.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn persona_prompt(corpus: &str) -> String {
    format!(
        "You are analyzing a social media account's writing to build a voice profile.\n\
         Below is the account's recent writing, posts first, then replies:\n\n\
         {corpus}\n\n\
         Respond with ONLY a JSON object with exactly these fields:\n\
         {{\n\
           \"tone\": \"overall tone of the writing\",\n\
           \"topics\": [\"at least 3 recurring topics\"],\n\
           \"interaction_style\": \"how the account engages with other people\",\n\
           \"identity\": \"one sentence describing who this account is\",\n\
           \"confidence\": 1\n\
         }}\n\
         confidence is an integer from 1 to 100 reflecting how well the \
         writing supports this profile."
    )
}

/// Pull the first JSON object out of the completion text and validate it
/// into a [`Persona`]. Confidence is clamped to 0..=100; anything else
/// about the shape must match or the whole analysis is rejected.
fn parse_persona(identity_id: &str, text: &str) -> Result<Persona, CompletionError> {
    let span = extract::first_object(text).ok_or_else(|| {
        CompletionError::MalformedPersona("no JSON object in completion".to_string())
    })?;

    let raw: RawPersona = serde_json::from_str(span)
        .map_err(|err| CompletionError::MalformedPersona(err.to_string()))?;

    Ok(Persona {
        identity_id: identity_id.to_string(),
        tone: raw.tone,
        topics: raw.topics,
        interaction_style: raw.interaction_style,
        identity_blurb: raw.identity,
        confidence: raw.confidence.clamp(0, 100),
        created_at: String::new(),
        updated_at: String::new(),
    })
}

/// One analysis round trip. No retry: a malformed completion surfaces to
/// the caller, and nothing is persisted here.
pub async fn analyze(
    completion: &dyn CompletionClient,
    identity_id: &str,
    posts: &[ContentItem],
    replies: &[ContentItem],
) -> crate::error::Result<Persona> {
    let corpus = build_corpus(posts, replies);
    if corpus.trim().is_empty() {
        return Err(anyhow::anyhow!("no content available to analyze").into());
    }

    let response = completion
        .complete(&persona_prompt(&corpus), PERSONA_TEMPERATURE)
        .await?;
    Ok(parse_persona(identity_id, &response)?)
}
