//! Content acquisition: live platform fetches with a deterministic
//! fallback so the rest of the pipeline keeps working when the API is
//! down or the account has no usable history.

pub mod fallback;
mod platform;

pub use platform::PlatformClient;

use crate::config::PlatformConfig;
use crate::error::StoreError;
use crate::store::{ContentItem, Identity, Store};
use tracing::warn;

/// Where a batch of content actually came from. Consumers surface this so
/// a persona built from synthetic posts is never mistaken for the real
/// thing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum ContentSource {
    Live,
    Fallback,
}

#[derive(Debug)]
pub struct FetchOutcome {
    pub items: Vec<ContentItem>,
    pub source: ContentSource,
}

/// A public post someone else wrote, surfaced by search as a reply
/// candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub platform_content_id: String,
    pub author: String,
    pub text: String,
    pub engagement_count: i64,
}

pub struct ContentFetcher {
    platform: PlatformClient,
    fetch_limit: u8,
}

impl ContentFetcher {
    pub fn new(config: &PlatformConfig) -> Self {
        Self {
            platform: PlatformClient::new(config),
            fetch_limit: config.fetch_limit,
        }
    }

    #[cfg(test)]
    pub(crate) fn with_base_url(api_base: &str, fetch_limit: u8) -> Self {
        Self {
            platform: PlatformClient::with_base_url(api_base, fetch_limit),
            fetch_limit,
        }
    }

    /// Fetch the identity's posts, falling back to synthetic content on
    /// any live failure. Items are upserted before returning; only a
    /// storage failure is an error.
    pub async fn fetch_posts(
        &self,
        store: &Store,
        identity: &Identity,
        access_token: &str,
    ) -> Result<FetchOutcome, StoreError> {
        let (items, source) = match self
            .platform
            .user_posts(access_token, &identity.id, &identity.platform_id)
            .await
        {
            Ok(items) => (items, ContentSource::Live),
            Err(err) => {
                warn!("live post fetch failed, switching to fallback content: {err:#}");
                (
                    fallback::posts(&identity.id, &identity.platform_id, self.fallback_count()),
                    ContentSource::Fallback,
                )
            }
        };

        store.upsert_content(&items).await?;
        Ok(FetchOutcome { items, source })
    }

    /// Same policy as [`fetch_posts`], for the identity's replies.
    ///
    /// [`fetch_posts`]: ContentFetcher::fetch_posts
    pub async fn fetch_replies(
        &self,
        store: &Store,
        identity: &Identity,
        access_token: &str,
    ) -> Result<FetchOutcome, StoreError> {
        let (items, source) = match self
            .platform
            .user_replies(access_token, &identity.id, &identity.platform_id)
            .await
        {
            Ok(items) => (items, ContentSource::Live),
            Err(err) => {
                warn!("live reply fetch failed, switching to fallback content: {err:#}");
                (
                    fallback::replies(&identity.id, &identity.platform_id, self.fallback_count()),
                    ContentSource::Fallback,
                )
            }
        };

        store.upsert_content(&items).await?;
        Ok(FetchOutcome { items, source })
    }

    /// Search for candidate posts. An empty live result is a real answer
    /// and stays `Live`; only a failed request switches to fallback.
    pub async fn search_recent(
        &self,
        access_token: &str,
        query: &str,
        limit: u8,
    ) -> (Vec<Candidate>, ContentSource) {
        match self.platform.search_recent(access_token, query, limit).await {
            Ok(candidates) => (candidates, ContentSource::Live),
            Err(err) => {
                warn!(
                    query,
                    "live search failed, switching to fallback candidates: {err:#}"
                );
                (
                    fallback::candidates(query, usize::from(limit)),
                    ContentSource::Fallback,
                )
            }
        }
    }

    fn fallback_count(&self) -> usize {
        usize::from(self.fetch_limit.min(10))
    }
}
