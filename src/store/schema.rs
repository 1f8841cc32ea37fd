use crate::error::StoreError;
use sqlx::SqlitePool;

/// Create all tables and indexes if they do not exist yet. Runs on every
/// open; existing rows are untouched.
pub(super) async fn init_schema(pool: &SqlitePool) -> Result<(), StoreError> {
    sqlx::query("PRAGMA foreign_keys = ON;").execute(pool).await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS identities (
             id           TEXT PRIMARY KEY,
             platform_id  TEXT NOT NULL UNIQUE,
             username     TEXT NOT NULL,
             display_name TEXT NOT NULL,
             avatar_url   TEXT,
             verified     INTEGER NOT NULL DEFAULT 0,
             created_at   TEXT NOT NULL,
             updated_at   TEXT NOT NULL
         )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS sessions (
             identity_id   TEXT PRIMARY KEY REFERENCES identities(id) ON DELETE CASCADE,
             access_token  TEXT NOT NULL,
             refresh_token TEXT,
             expires_at    TEXT,
             created_at    TEXT NOT NULL,
             updated_at    TEXT NOT NULL
         )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS content_items (
             identity_id         TEXT NOT NULL REFERENCES identities(id) ON DELETE CASCADE,
             platform_content_id TEXT NOT NULL,
             text                TEXT NOT NULL,
             posted_at           TEXT NOT NULL,
             like_count          INTEGER NOT NULL DEFAULT 0,
             repost_count        INTEGER NOT NULL DEFAULT 0,
             reply_count         INTEGER NOT NULL DEFAULT 0,
             is_reply            INTEGER NOT NULL DEFAULT 0,
             parent_id           TEXT,
             UNIQUE(identity_id, platform_content_id)
         )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_content_items_identity
             ON content_items(identity_id, is_reply, posted_at)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS personas (
             identity_id       TEXT PRIMARY KEY REFERENCES identities(id) ON DELETE CASCADE,
             tone              TEXT NOT NULL,
             topics            TEXT NOT NULL,
             interaction_style TEXT NOT NULL,
             identity_blurb    TEXT NOT NULL,
             confidence        INTEGER NOT NULL,
             created_at        TEXT NOT NULL,
             updated_at        TEXT NOT NULL
         )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS suggestions (
             id                TEXT PRIMARY KEY,
             identity_id       TEXT NOT NULL REFERENCES identities(id) ON DELETE CASCADE,
             target_content_id TEXT NOT NULL,
             target_author     TEXT NOT NULL,
             target_text       TEXT NOT NULL,
             reply_text        TEXT NOT NULL,
             confidence        INTEGER NOT NULL,
             topic             TEXT NOT NULL,
             engagement_count  INTEGER NOT NULL DEFAULT 0,
             status            TEXT NOT NULL DEFAULT 'pending',
             created_at        TEXT NOT NULL,
             updated_at        TEXT NOT NULL
         )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_suggestions_identity
             ON suggestions(identity_id, status, created_at)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
