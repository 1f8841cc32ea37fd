//! Persona-build orchestration.
//!
//! Runs the fixed stage order posts, replies, analysis, persist. Progress
//! is reported over a watch channel as each stage completes; cancellation
//! is checked between stages and raced against the analysis call. A run
//! abandoned at any point leaves no persona row behind.

use crate::completion::CompletionClient;
use crate::content::ContentFetcher;
use crate::error::EchoquillError;
use crate::persona;
use crate::store::{Identity, Persona, Store};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Last completed stage of a persona build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum BuildStage {
    Starting,
    PostsFetched,
    RepliesFetched,
    PersonaAnalyzed,
    PersonaPersisted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildProgress {
    pub percent: u8,
    pub stage: BuildStage,
}

impl Default for BuildProgress {
    fn default() -> Self {
        Self {
            percent: 0,
            stage: BuildStage::Starting,
        }
    }
}

pub struct PersonaWorkflow<'a> {
    completion: &'a dyn CompletionClient,
    fetcher: &'a ContentFetcher,
    store: &'a Store,
}

impl<'a> PersonaWorkflow<'a> {
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

    /// Build and persist a persona for the identity.
    ///
    /// Progress lands on `progress` at 25/50/75/100 as stages complete.
    /// Cancellation returns [`EchoquillError::Cancelled`]; the persona row
    /// is only written after a fully validated analysis, so a cancelled
    /// run changes nothing except already-upserted content items.
    pub async fn build_persona(
        &self,
        identity: &Identity,
        access_token: &str,
        progress: &tokio::sync::watch::Sender<BuildProgress>,
        cancel: &CancellationToken,
    ) -> crate::error::Result<Persona> {
        if cancel.is_cancelled() {
            return Err(EchoquillError::Cancelled);
        }

        let posts = self
            .fetcher
            .fetch_posts(self.store, identity, access_token)
            .await?;
        let _ = progress.send(BuildProgress {
            percent: 25,
            stage: BuildStage::PostsFetched,
        });
        if cancel.is_cancelled() {
            return Err(EchoquillError::Cancelled);
        }

        let replies = self
            .fetcher
            .fetch_replies(self.store, identity, access_token)
            .await?;
        let _ = progress.send(BuildProgress {
            percent: 50,
            stage: BuildStage::RepliesFetched,
        });
        if cancel.is_cancelled() {
            return Err(EchoquillError::Cancelled);
        }

        let analyzed = tokio::select! {
            () = cancel.cancelled() => return Err(EchoquillError::Cancelled),
            result = persona::analyze(
                self.completion,
                &identity.id,
                &posts.items,
                &replies.items,
            ) => result?,
        };
        let _ = progress.send(BuildProgress {
            percent: 75,
            stage: BuildStage::PersonaAnalyzed,
        });
        if cancel.is_cancelled() {
            return Err(EchoquillError::Cancelled);
        }

        self.store.upsert_persona(&analyzed).await?;
        let _ = progress.send(BuildProgress {
            percent: 100,
            stage: BuildStage::PersonaPersisted,
        });

        info!(
            identity = %identity.id,
            posts = posts.items.len(),
            replies = replies.items.len(),
            confidence = analyzed.confidence,
            "persona built"
        );
        // Hand back the stored row so timestamps are the canonical ones.
        let stored = self.store.persona(&identity.id).await?;
        Ok(stored.unwrap_or(analyzed))
    }
}
