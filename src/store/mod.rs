//! SQLite-backed persistence for identities, sessions, fetched content,
//! personas and reply suggestions.
//!
//! One [`Store`] owns the pool; entity modules hold the row types and the
//! queries. Login state restoration is inherent: whatever the file holds
//! on startup is the state. Unreadable session state degrades to
//! logged-out with a warning, never a panic.

pub mod content;
pub mod identities;
pub mod personas;
mod schema;
pub mod sessions;
pub mod suggestions;

pub use content::ContentItem;
pub use identities::Identity;
pub use personas::Persona;
pub use sessions::StoredSession;
pub use suggestions::{NewSuggestion, Suggestion, SuggestionStatus};

use crate::auth::{ProviderProfile, TokenBundle};
use crate::error::StoreError;
use sqlx::SqlitePool;
use std::path::Path;
use tracing::warn;

pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Open (or create) the database file at `path` and ensure the schema.
    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .map_err(|err| StoreError::Open(format!("create {}: {err}", parent.display())))?;
        }

        let url = format!("sqlite:{}?mode=rwc", path.display());
        let pool = SqlitePool::connect(&url)
            .await
            .map_err(|err| StoreError::Open(format!("open {}: {err}", path.display())))?;

        schema::init_schema(&pool).await?;
        Ok(Self { pool })
    }

    /// In-memory database for unit tests. Single connection so every
    /// query sees the same database.
    #[cfg(test)]
    pub async fn in_memory() -> Result<Self, StoreError> {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|err| StoreError::Open(format!("open in-memory SQLite: {err}")))?;
        schema::init_schema(&pool).await?;
        Ok(Self { pool })
    }

    /// Access the underlying pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // ── Login state ─────────────────────────────────────────────────────

    /// Upsert the identity and replace its session in one transaction, so
    /// a failure partway leaves the previous login intact.
    pub async fn persist_login(
        &self,
        profile: &ProviderProfile,
        tokens: &TokenBundle,
    ) -> Result<Identity, StoreError> {
        let mut tx = self.pool.begin().await?;

        let identity = identities::upsert(
            &mut tx,
            &profile.id,
            &profile.username,
            &profile.name,
            profile.profile_image_url.as_deref(),
            profile.verified.unwrap_or(false),
        )
        .await?;
        sessions::replace(&mut tx, &identity.id, tokens).await?;

        tx.commit().await?;
        Ok(identity)
    }

    /// Identity behind the most recent session, or `None` when logged out.
    /// Corrupt or dangling session state degrades to `None` with a warning.
    pub async fn current_identity(&self) -> Result<Option<Identity>, StoreError> {
        let session = match sessions::current(&self.pool).await {
            Ok(session) => session,
            Err(err) => {
                warn!("session lookup failed, treating as logged out: {err}");
                return Ok(None);
            }
        };
        let Some(session) = session else {
            return Ok(None);
        };

        match identities::find_by_id(&self.pool, &session.identity_id).await {
            Ok(Some(identity)) => Ok(Some(identity)),
            Ok(None) => {
                warn!(
                    identity_id = %session.identity_id,
                    "session references a missing identity, treating as logged out"
                );
                Ok(None)
            }
            Err(err) => {
                warn!("identity lookup failed, treating as logged out: {err}");
                Ok(None)
            }
        }
    }

    pub async fn is_logged_in(&self) -> bool {
        matches!(self.current_identity().await, Ok(Some(_)))
    }

    /// Stored tokens for the current login, if any.
    pub async fn current_session(&self) -> Result<Option<StoredSession>, StoreError> {
        sessions::current(&self.pool).await
    }

    /// Drop local session state. Remote token revocation is not attempted;
    /// stored tokens simply stop being used. Returns false when there was
    /// nothing to clear.
    pub async fn logout(&self) -> Result<bool, StoreError> {
        sessions::clear(&self.pool).await
    }

    // ── Content ─────────────────────────────────────────────────────────

    pub async fn upsert_content(&self, items: &[ContentItem]) -> Result<usize, StoreError> {
        content::upsert_many(&self.pool, items).await
    }

    pub async fn list_posts(&self, identity_id: &str) -> Result<Vec<ContentItem>, StoreError> {
        content::list(&self.pool, identity_id, false).await
    }

    pub async fn list_replies(&self, identity_id: &str) -> Result<Vec<ContentItem>, StoreError> {
        content::list(&self.pool, identity_id, true).await
    }

    // ── Persona ─────────────────────────────────────────────────────────

    pub async fn upsert_persona(&self, persona: &Persona) -> Result<(), StoreError> {
        personas::upsert(&self.pool, persona).await
    }

    pub async fn persona(&self, identity_id: &str) -> Result<Option<Persona>, StoreError> {
        personas::get(&self.pool, identity_id).await
    }

    // ── Suggestions ─────────────────────────────────────────────────────

    pub async fn record_suggestion(&self, draft: NewSuggestion) -> Result<Suggestion, StoreError> {
        suggestions::insert(&self.pool, draft).await
    }

    pub async fn suggestion(&self, id: &str) -> Result<Option<Suggestion>, StoreError> {
        suggestions::get(&self.pool, id).await
    }

    pub async fn list_suggestions(
        &self,
        identity_id: &str,
        status: Option<SuggestionStatus>,
    ) -> Result<Vec<Suggestion>, StoreError> {
        suggestions::list(&self.pool, identity_id, status).await
    }

    /// One-way transition out of `pending`. Terminal suggestions and
    /// unknown ids are rejected with typed errors.
    pub async fn update_suggestion_status(
        &self,
        id: &str,
        new_status: SuggestionStatus,
    ) -> crate::error::Result<Suggestion> {
        suggestions::update_status(&self.pool, id, new_status).await
    }
}
