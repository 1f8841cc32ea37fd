use crate::auth::TokenBundle;
use crate::error::StoreError;
use chrono::{Duration, Utc};
use sqlx::Row;
use sqlx::sqlite::{SqliteConnection, SqlitePool, SqliteRow};

/// Persisted token set for a linked identity. One row per identity,
/// replaced wholesale on re-login. Tokens are opaque strings.
#[derive(Debug, Clone)]
pub struct StoredSession {
    pub identity_id: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

fn map_session_row(row: &SqliteRow) -> Result<StoredSession, StoreError> {
    Ok(StoredSession {
        identity_id: row.try_get("identity_id")?,
        access_token: row.try_get("access_token")?,
        refresh_token: row.try_get("refresh_token")?,
        expires_at: row.try_get("expires_at")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// Store the token set for `identity_id`. A prior session for the same
/// identity is overwritten; `created_at` of the original row survives.
pub(super) async fn replace(
    conn: &mut SqliteConnection,
    identity_id: &str,
    tokens: &TokenBundle,
) -> Result<(), StoreError> {
    let timestamp = Utc::now().to_rfc3339();
    let expires_at = tokens
        .expires_in
        .map(|secs| (Utc::now() + Duration::seconds(secs)).to_rfc3339());

    sqlx::query(
        "INSERT INTO sessions (identity_id, access_token, refresh_token, expires_at, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $5)
         ON CONFLICT(identity_id) DO UPDATE SET
             access_token  = excluded.access_token,
             refresh_token = excluded.refresh_token,
             expires_at    = excluded.expires_at,
             updated_at    = excluded.updated_at",
    )
    .bind(identity_id)
    .bind(&tokens.access_token)
    .bind(tokens.refresh_token.as_deref())
    .bind(expires_at)
    .bind(&timestamp)
    .execute(conn)
    .await?;

    Ok(())
}

/// Most recently refreshed session, if any.
pub(super) async fn current(pool: &SqlitePool) -> Result<Option<StoredSession>, StoreError> {
    let row = sqlx::query(
        "SELECT identity_id, access_token, refresh_token, expires_at, created_at, updated_at
         FROM sessions
         ORDER BY updated_at DESC
         LIMIT 1",
    )
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(map_session_row).transpose()
}

pub(super) async fn get(
    pool: &SqlitePool,
    identity_id: &str,
) -> Result<Option<StoredSession>, StoreError> {
    let row = sqlx::query(
        "SELECT identity_id, access_token, refresh_token, expires_at, created_at, updated_at
         FROM sessions
         WHERE identity_id = $1",
    )
    .bind(identity_id)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(map_session_row).transpose()
}

/// Drop all sessions. Returns true if anything was deleted.
pub(super) async fn clear(pool: &SqlitePool) -> Result<bool, StoreError> {
    let result = sqlx::query("DELETE FROM sessions").execute(pool).await?;
    Ok(result.rows_affected() > 0)
}
