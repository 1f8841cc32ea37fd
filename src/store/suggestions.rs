use crate::error::{PipelineError, StoreError};
use chrono::Utc;
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use uuid::Uuid;

/// Lifecycle of a drafted reply. Every suggestion starts `pending` and
/// moves exactly once to a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum SuggestionStatus {
    Pending,
    Approved,
    Rejected,
    Posted,
}

/// A drafted reply waiting for review, tied to the candidate post it
/// answers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suggestion {
    pub id: String,
    pub identity_id: String,
    pub target_content_id: String,
    pub target_author: String,
    pub target_text: String,
    pub reply_text: String,
    pub confidence: i64,
    pub topic: String,
    pub engagement_count: i64,
    pub status: SuggestionStatus,
    pub created_at: String,
    pub updated_at: String,
}

/// Fields the pipeline supplies when recording a fresh draft. Id, status
/// and timestamps are assigned at insert.
#[derive(Debug, Clone)]
pub struct NewSuggestion {
    pub identity_id: String,
    pub target_content_id: String,
    pub target_author: String,
    pub target_text: String,
    pub reply_text: String,
    pub confidence: i64,
    pub topic: String,
    pub engagement_count: i64,
}

fn parse_status(value: &str) -> Result<SuggestionStatus, StoreError> {
    match value {
        "pending" => Ok(SuggestionStatus::Pending),
        "approved" => Ok(SuggestionStatus::Approved),
        "rejected" => Ok(SuggestionStatus::Rejected),
        "posted" => Ok(SuggestionStatus::Posted),
        other => Err(StoreError::Query(format!(
            "unknown suggestion status: {other}"
        ))),
    }
}

fn map_suggestion_row(row: &SqliteRow) -> Result<Suggestion, StoreError> {
    let status_raw: String = row.try_get("status")?;
    Ok(Suggestion {
        id: row.try_get("id")?,
        identity_id: row.try_get("identity_id")?,
        target_content_id: row.try_get("target_content_id")?,
        target_author: row.try_get("target_author")?,
        target_text: row.try_get("target_text")?,
        reply_text: row.try_get("reply_text")?,
        confidence: row.try_get("confidence")?,
        topic: row.try_get("topic")?,
        engagement_count: row.try_get("engagement_count")?,
        status: parse_status(&status_raw)?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

const SELECT_COLUMNS: &str = "id, identity_id, target_content_id, target_author, target_text,
                              reply_text, confidence, topic, engagement_count, status,
                              created_at, updated_at";

/// Record a fresh draft as `pending`.
pub(super) async fn insert(
    pool: &SqlitePool,
    draft: NewSuggestion,
) -> Result<Suggestion, StoreError> {
    let id = Uuid::new_v4().to_string();
    let timestamp = Utc::now().to_rfc3339();

    sqlx::query(
        "INSERT INTO suggestions (id, identity_id, target_content_id, target_author, target_text,
                                  reply_text, confidence, topic, engagement_count, status,
                                  created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 'pending', $10, $10)",
    )
    .bind(&id)
    .bind(&draft.identity_id)
    .bind(&draft.target_content_id)
    .bind(&draft.target_author)
    .bind(&draft.target_text)
    .bind(&draft.reply_text)
    .bind(draft.confidence)
    .bind(&draft.topic)
    .bind(draft.engagement_count)
    .bind(&timestamp)
    .execute(pool)
    .await?;

    Ok(Suggestion {
        id,
        identity_id: draft.identity_id,
        target_content_id: draft.target_content_id,
        target_author: draft.target_author,
        target_text: draft.target_text,
        reply_text: draft.reply_text,
        confidence: draft.confidence,
        topic: draft.topic,
        engagement_count: draft.engagement_count,
        status: SuggestionStatus::Pending,
        created_at: timestamp.clone(),
        updated_at: timestamp,
    })
}

pub(super) async fn get(pool: &SqlitePool, id: &str) -> Result<Option<Suggestion>, StoreError> {
    let row = sqlx::query(&format!(
        "SELECT {SELECT_COLUMNS} FROM suggestions WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(map_suggestion_row).transpose()
}

/// Suggestions for one identity, newest first, optionally filtered by
/// status.
pub(super) async fn list(
    pool: &SqlitePool,
    identity_id: &str,
    status: Option<SuggestionStatus>,
) -> Result<Vec<Suggestion>, StoreError> {
    let rows = if let Some(status) = status {
        sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM suggestions
             WHERE identity_id = $1 AND status = $2
             ORDER BY created_at DESC"
        ))
        .bind(identity_id)
        .bind(status.to_string())
        .fetch_all(pool)
        .await?
    } else {
        sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM suggestions
             WHERE identity_id = $1
             ORDER BY created_at DESC"
        ))
        .bind(identity_id)
        .fetch_all(pool)
        .await?
    };

    rows.iter().map(map_suggestion_row).collect()
}

/// Move a suggestion out of `pending`. The guarded UPDATE only matches
/// pending rows, so a terminal suggestion (or a second decision racing
/// the first) falls through to the error path below.
pub(super) async fn update_status(
    pool: &SqlitePool,
    id: &str,
    new_status: SuggestionStatus,
) -> crate::error::Result<Suggestion> {
    if new_status != SuggestionStatus::Pending {
        let timestamp = Utc::now().to_rfc3339();
        let result = sqlx::query(
            "UPDATE suggestions SET status = $1, updated_at = $2
             WHERE id = $3 AND status = 'pending'",
        )
        .bind(new_status.to_string())
        .bind(&timestamp)
        .bind(id)
        .execute(pool)
        .await
        .map_err(StoreError::from)?;

        if result.rows_affected() == 1 {
            return get(pool, id)
                .await?
                .ok_or_else(|| PipelineError::NotFound(id.to_string()).into());
        }
    }

    match get(pool, id).await? {
        None => Err(PipelineError::NotFound(id.to_string()).into()),
        Some(existing) => Err(PipelineError::IllegalTransition {
            id: id.to_string(),
            from: existing.status.to_string(),
            to: new_status.to_string(),
        }
        .into()),
    }
}
