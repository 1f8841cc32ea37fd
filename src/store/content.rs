use crate::error::StoreError;
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqliteRow};

/// A fetched post or reply, deduplicated per identity by the provider's
/// content id so repeated fetches refresh counts instead of piling up rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentItem {
    pub identity_id: String,
    pub platform_content_id: String,
    pub text: String,
    pub posted_at: String,
    pub like_count: i64,
    pub repost_count: i64,
    pub reply_count: i64,
    pub is_reply: bool,
    pub parent_id: Option<String>,
}

fn map_content_row(row: &SqliteRow) -> Result<ContentItem, StoreError> {
    let is_reply: i64 = row.try_get("is_reply")?;
    Ok(ContentItem {
        identity_id: row.try_get("identity_id")?,
        platform_content_id: row.try_get("platform_content_id")?,
        text: row.try_get("text")?,
        posted_at: row.try_get("posted_at")?,
        like_count: row.try_get("like_count")?,
        repost_count: row.try_get("repost_count")?,
        reply_count: row.try_get("reply_count")?,
        is_reply: is_reply != 0,
        parent_id: row.try_get("parent_id")?,
    })
}

/// Upsert a batch of items. Engagement counts and text refresh on
/// conflict; returns how many rows were written.
pub(super) async fn upsert_many(
    pool: &SqlitePool,
    items: &[ContentItem],
) -> Result<usize, StoreError> {
    for item in items {
        sqlx::query(
            "INSERT INTO content_items (identity_id, platform_content_id, text, posted_at,
                                        like_count, repost_count, reply_count, is_reply, parent_id)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             ON CONFLICT(identity_id, platform_content_id) DO UPDATE SET
                 text         = excluded.text,
                 like_count   = excluded.like_count,
                 repost_count = excluded.repost_count,
                 reply_count  = excluded.reply_count",
        )
        .bind(&item.identity_id)
        .bind(&item.platform_content_id)
        .bind(&item.text)
        .bind(&item.posted_at)
        .bind(item.like_count)
        .bind(item.repost_count)
        .bind(item.reply_count)
        .bind(i64::from(item.is_reply))
        .bind(item.parent_id.as_deref())
        .execute(pool)
        .await?;
    }

    Ok(items.len())
}

/// Items for one identity, newest first, filtered to posts or replies.
pub(super) async fn list(
    pool: &SqlitePool,
    identity_id: &str,
    replies: bool,
) -> Result<Vec<ContentItem>, StoreError> {
    let rows = sqlx::query(
        "SELECT identity_id, platform_content_id, text, posted_at,
                like_count, repost_count, reply_count, is_reply, parent_id
         FROM content_items
         WHERE identity_id = $1 AND is_reply = $2
         ORDER BY posted_at DESC",
    )
    .bind(identity_id)
    .bind(i64::from(replies))
    .fetch_all(pool)
    .await?;

    rows.iter().map(map_content_row).collect()
}
