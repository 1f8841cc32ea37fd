use crate::error::StoreError;
use chrono::Utc;
use sqlx::Row;
use sqlx::sqlite::{SqliteConnection, SqlitePool, SqliteRow};
use uuid::Uuid;

/// A linked provider account. One row per `platform_id`; profile fields
/// track the provider, `id` and `created_at` are assigned once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: String,
    pub platform_id: String,
    pub username: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub verified: bool,
    pub created_at: String,
    pub updated_at: String,
}

pub(super) fn map_identity_row(row: &SqliteRow) -> Result<Identity, StoreError> {
    let verified: i64 = row.try_get("verified")?;
    Ok(Identity {
        id: row.try_get("id")?,
        platform_id: row.try_get("platform_id")?,
        username: row.try_get("username")?,
        display_name: row.try_get("display_name")?,
        avatar_url: row.try_get("avatar_url")?,
        verified: verified != 0,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// Insert or refresh the identity keyed by `platform_id`. Repeated logins
/// update the mutable profile fields and `updated_at`; the row id and
/// `created_at` survive. Returns the canonical stored row.
///
/// Takes a connection so the login path can run it inside the same
/// transaction as the session replace.
pub(super) async fn upsert(
    conn: &mut SqliteConnection,
    platform_id: &str,
    username: &str,
    display_name: &str,
    avatar_url: Option<&str>,
    verified: bool,
) -> Result<Identity, StoreError> {
    let timestamp = Utc::now().to_rfc3339();

    sqlx::query(
        "INSERT INTO identities (id, platform_id, username, display_name, avatar_url, verified, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
         ON CONFLICT(platform_id) DO UPDATE SET
             username     = excluded.username,
             display_name = excluded.display_name,
             avatar_url   = excluded.avatar_url,
             verified     = excluded.verified,
             updated_at   = excluded.updated_at",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(platform_id)
    .bind(username)
    .bind(display_name)
    .bind(avatar_url)
    .bind(i64::from(verified))
    .bind(&timestamp)
    .execute(&mut *conn)
    .await?;

    let row = sqlx::query(
        "SELECT id, platform_id, username, display_name, avatar_url, verified, created_at, updated_at
         FROM identities
         WHERE platform_id = $1",
    )
    .bind(platform_id)
    .fetch_one(&mut *conn)
    .await?;

    map_identity_row(&row)
}

pub(super) async fn find_by_id(
    pool: &SqlitePool,
    id: &str,
) -> Result<Option<Identity>, StoreError> {
    let row = sqlx::query(
        "SELECT id, platform_id, username, display_name, avatar_url, verified, created_at, updated_at
         FROM identities
         WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(map_identity_row).transpose()
}
