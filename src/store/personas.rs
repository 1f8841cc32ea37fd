use crate::error::StoreError;
use chrono::Utc;
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqliteRow};

/// Distilled writing-voice profile for one identity. Topics are stored as
/// a JSON array in a TEXT column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Persona {
    pub identity_id: String,
    pub tone: String,
    pub topics: Vec<String>,
    pub interaction_style: String,
    pub identity_blurb: String,
    pub confidence: i64,
    pub created_at: String,
    pub updated_at: String,
}

fn map_persona_row(row: &SqliteRow) -> Result<Persona, StoreError> {
    let topics_raw: String = row.try_get("topics")?;
    let topics: Vec<String> = serde_json::from_str(&topics_raw)
        .map_err(|err| StoreError::Query(format!("decode persona topics: {err}")))?;

    Ok(Persona {
        identity_id: row.try_get("identity_id")?,
        tone: row.try_get("tone")?,
        topics,
        interaction_style: row.try_get("interaction_style")?,
        identity_blurb: row.try_get("identity_blurb")?,
        confidence: row.try_get("confidence")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// Replace the persona for an identity. Every analysis overwrites all
/// profile fields; `created_at` of the first analysis survives.
pub(super) async fn upsert(pool: &SqlitePool, persona: &Persona) -> Result<(), StoreError> {
    let timestamp = Utc::now().to_rfc3339();
    let topics = serde_json::to_string(&persona.topics)
        .map_err(|err| StoreError::Query(format!("encode persona topics: {err}")))?;

    sqlx::query(
        "INSERT INTO personas (identity_id, tone, topics, interaction_style, identity_blurb,
                               confidence, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
         ON CONFLICT(identity_id) DO UPDATE SET
             tone              = excluded.tone,
             topics            = excluded.topics,
             interaction_style = excluded.interaction_style,
             identity_blurb    = excluded.identity_blurb,
             confidence        = excluded.confidence,
             updated_at        = excluded.updated_at",
    )
    .bind(&persona.identity_id)
    .bind(&persona.tone)
    .bind(&topics)
    .bind(&persona.interaction_style)
    .bind(&persona.identity_blurb)
    .bind(persona.confidence)
    .bind(&timestamp)
    .execute(pool)
    .await?;

    Ok(())
}

pub(super) async fn get(
    pool: &SqlitePool,
    identity_id: &str,
) -> Result<Option<Persona>, StoreError> {
    let row = sqlx::query(
        "SELECT identity_id, tone, topics, interaction_style, identity_blurb,
                confidence, created_at, updated_at
         FROM personas
         WHERE identity_id = $1",
    )
    .bind(identity_id)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(map_persona_row).transpose()
}
