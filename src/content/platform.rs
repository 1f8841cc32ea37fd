use crate::config::PlatformConfig;
use crate::content::Candidate;
use crate::store::ContentItem;
use anyhow::Context;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

/// Bearer-authenticated client for the platform's content API.
pub struct PlatformClient {
    client: Client,
    api_base: String,
    fetch_limit: u8,
}

#[derive(Debug, Deserialize)]
struct PostsEnvelope {
    #[serde(default)]
    data: Vec<ApiPost>,
}

#[derive(Debug, Deserialize)]
struct ApiPost {
    id: String,
    text: String,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    public_metrics: Option<PublicMetrics>,
    #[serde(default)]
    in_reply_to_id: Option<String>,
    #[serde(default)]
    author_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct PublicMetrics {
    #[serde(default)]
    like_count: i64,
    #[serde(default)]
    repost_count: i64,
    #[serde(default)]
    reply_count: i64,
}

fn to_item(identity_id: &str, post: ApiPost) -> ContentItem {
    let metrics = post.public_metrics.unwrap_or_default();
    ContentItem {
        identity_id: identity_id.to_string(),
        platform_content_id: post.id,
        text: post.text,
        posted_at: post.created_at.unwrap_or_default(),
        like_count: metrics.like_count,
        repost_count: metrics.repost_count,
        reply_count: metrics.reply_count,
        is_reply: post.in_reply_to_id.is_some(),
        parent_id: post.in_reply_to_id,
    }
}

fn to_candidate(post: ApiPost) -> Candidate {
    let metrics = post.public_metrics.as_ref();
    let engagement_count = metrics.map_or(0, |m| m.like_count + m.repost_count + m.reply_count);
    Candidate {
        platform_content_id: post.id,
        author: post.author_id.unwrap_or_else(|| "unknown".to_string()),
        text: post.text,
        engagement_count,
    }
}

impl PlatformClient {
    pub fn new(config: &PlatformConfig) -> Self {
        Self::with_base_url(&config.api_base, config.fetch_limit)
    }

    pub fn with_base_url(api_base: &str, fetch_limit: u8) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(30))
                .connect_timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_else(|_| Client::new()),
            api_base: api_base.trim_end_matches('/').to_string(),
            fetch_limit,
        }
    }

    async fn get_posts(
        &self,
        access_token: &str,
        url: &str,
        query: &[(&str, String)],
    ) -> anyhow::Result<Vec<ApiPost>> {
        let response = self
            .client
            .get(url)
            .bearer_auth(access_token)
            .query(query)
            .send()
            .await
            .context("platform request failed")?;

        let status = response.status();
        anyhow::ensure!(status.is_success(), "platform returned {status}");

        let envelope: PostsEnvelope = response
            .json()
            .await
            .context("platform payload decode failed")?;
        Ok(envelope.data)
    }

    /// The identity's own posts, replies excluded upstream.
    pub async fn user_posts(
        &self,
        access_token: &str,
        identity_id: &str,
        platform_user_id: &str,
    ) -> anyhow::Result<Vec<ContentItem>> {
        let url = format!("{}/users/{platform_user_id}/posts", self.api_base);
        let posts = self
            .get_posts(
                access_token,
                &url,
                &[
                    ("max_results", self.fetch_limit.to_string()),
                    ("exclude", "replies".to_string()),
                    ("post.fields", "created_at,public_metrics".to_string()),
                ],
            )
            .await?;

        Ok(posts
            .into_iter()
            .map(|post| to_item(identity_id, post))
            .collect())
    }

    /// The identity's replies: the unfiltered timeline, kept only where a
    /// parent post is referenced.
    pub async fn user_replies(
        &self,
        access_token: &str,
        identity_id: &str,
        platform_user_id: &str,
    ) -> anyhow::Result<Vec<ContentItem>> {
        let url = format!("{}/users/{platform_user_id}/posts", self.api_base);
        let posts = self
            .get_posts(
                access_token,
                &url,
                &[
                    ("max_results", self.fetch_limit.to_string()),
                    (
                        "post.fields",
                        "created_at,public_metrics,in_reply_to_id".to_string(),
                    ),
                ],
            )
            .await?;

        Ok(posts
            .into_iter()
            .filter(|post| post.in_reply_to_id.is_some())
            .map(|post| to_item(identity_id, post))
            .collect())
    }

    /// Recent public posts matching `query`, for candidate discovery.
    pub async fn search_recent(
        &self,
        access_token: &str,
        query: &str,
        limit: u8,
    ) -> anyhow::Result<Vec<Candidate>> {
        let url = format!("{}/posts/search/recent", self.api_base);
        let posts = self
            .get_posts(
                access_token,
                &url,
                &[
                    ("query", query.to_string()),
                    ("max_results", limit.to_string()),
                    ("post.fields", "public_metrics,author_id".to_string()),
                ],
            )
            .await?;

        Ok(posts.into_iter().map(to_candidate).collect())
    }
}
