use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use time::OffsetDateTime;
use utoipa::ToSchema;

use crate::{error::ApiResult, utils::now};

/// Append one audit row. Called from inside the mutating transaction so a
/// rolled-back action leaves no trace.
pub async fn log(
    conn: &mut SqliteConnection,
    user_id: i64,
    organisation_id: i64,
    action: &str,
    metadata: serde_json::Value,
    display_metadata: serde_json::Value,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO activity_logs
            (user_id, organisation_id, action, metadata, display_metadata, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(user_id)
    .bind(organisation_id)
    .bind(action)
    .bind(metadata.to_string())
    .bind(display_metadata.to_string())
    .bind(now())
    .execute(conn)
    .await?;
    Ok(())
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ActivityEntry {
    pub id: i64,
    pub user_id: i64,
    pub action: String,
    /// Human-readable key/value pairs recorded with the action.
    pub metadata: serde_json::Value,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

pub async fn list(
    db: &SqlitePool,
    organisation_id: i64,
    user_id: i64,
) -> ApiResult<Vec<ActivityEntry>> {
    let rows: Vec<(i64, i64, String, String, OffsetDateTime)> = sqlx::query_as(
        r#"
        SELECT id, user_id, action, display_metadata, created_at
        FROM activity_logs
        WHERE organisation_id = ? AND user_id = ?
        ORDER BY created_at DESC
        LIMIT 100
        "#,
    )
    .bind(organisation_id)
    .bind(user_id)
    .fetch_all(db)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(id, user_id, action, display, created_at)| ActivityEntry {
            id,
            user_id,
            action,
            metadata: serde_json::from_str(&display).unwrap_or_default(),
            created_at,
        })
        .collect())
}
