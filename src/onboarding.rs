use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use utoipa::ToSchema;

use crate::error::{ApiError, ApiResult};

#[derive(Debug, Serialize, sqlx::FromRow, ToSchema)]
pub struct QuestionOption {
    pub id: i64,
    pub question_id: i64,
    pub option_text: String,
    pub tag_id: Option<i64>,
    pub tag_name: Option<String>,
    pub skill_id: Option<i64>,
    pub skill_name: Option<String>,
    pub channel_id: Option<i64>,
    pub channel_name: Option<String>,
    pub level_id: Option<i64>,
    pub level_name: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Question {
    pub id: i64,
    pub question_text: String,
    pub position: i64,
    pub options: Vec<QuestionOption>,
}

pub async fn list_questions(db: &SqlitePool, organisation_id: i64) -> ApiResult<Vec<Question>> {
    let questions: Vec<(i64, String, i64)> = sqlx::query_as(
        r#"
        SELECT id, question_text, position
        FROM onboarding_questions
        WHERE organisation_id = ?
        ORDER BY position ASC, id ASC
        "#,
    )
    .bind(organisation_id)
    .fetch_all(db)
    .await?;

    let options: Vec<QuestionOption> = sqlx::query_as(
        r#"
        SELECT oqo.id, oqo.question_id, oqo.option_text,
               oqo.tag_id, t.name AS tag_name,
               oqo.skill_id, s.name AS skill_name,
               oqo.channel_id, ch.name AS channel_name,
               oqo.level_id, l.name AS level_name
        FROM onboarding_question_options oqo
        JOIN onboarding_questions oq ON oq.id = oqo.question_id
        LEFT JOIN tags t ON t.id = oqo.tag_id
        LEFT JOIN skills s ON s.id = oqo.skill_id
        LEFT JOIN channels ch ON ch.id = oqo.channel_id
        LEFT JOIN levels l ON l.id = oqo.level_id
        WHERE oq.organisation_id = ?
        ORDER BY oqo.id ASC
        "#,
    )
    .bind(organisation_id)
    .fetch_all(db)
    .await?;

    let mut result: Vec<Question> = questions
        .into_iter()
        .map(|(id, question_text, position)| Question {
            id,
            question_text,
            position,
            options: Vec::new(),
        })
        .collect();
    for option in options {
        if let Some(question) = result.iter_mut().find(|q| q.id == option.question_id) {
            question.options.push(option);
        }
    }
    Ok(result)
}

pub async fn create_question(
    db: &SqlitePool,
    organisation_id: i64,
    question_text: &str,
    position: i64,
) -> ApiResult<i64> {
    if question_text.trim().is_empty() {
        return Err(ApiError::validation("question_text is required"));
    }
    let id = sqlx::query(
        "INSERT INTO onboarding_questions (organisation_id, question_text, position) VALUES (?, ?, ?)",
    )
    .bind(organisation_id)
    .bind(question_text)
    .bind(position)
    .execute(db)
    .await?
    .last_insert_rowid();
    Ok(id)
}

pub async fn delete_question(
    db: &SqlitePool,
    organisation_id: i64,
    question_id: i64,
) -> ApiResult<()> {
    let deleted =
        sqlx::query("DELETE FROM onboarding_questions WHERE id = ? AND organisation_id = ?")
            .bind(question_id)
            .bind(organisation_id)
            .execute(db)
            .await?
            .rows_affected();
    if deleted == 0 {
        return Err(ApiError::NotFound("Question"));
    }
    Ok(())
}

/// Optional taxonomy references an option can carry. Each one feeds a
/// different preference dimension of the recommender.
#[derive(Debug, Clone, Copy, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OptionRefs {
    pub tag_id: Option<i64>,
    pub skill_id: Option<i64>,
    pub channel_id: Option<i64>,
    pub level_id: Option<i64>,
}

pub async fn create_option(
    db: &SqlitePool,
    organisation_id: i64,
    question_id: i64,
    option_text: &str,
    refs: OptionRefs,
) -> ApiResult<i64> {
    if option_text.trim().is_empty() {
        return Err(ApiError::validation("option_text is required"));
    }

    let mut tx = db.begin().await?;

    let question: Option<i64> =
        sqlx::query_scalar("SELECT id FROM onboarding_questions WHERE id = ? AND organisation_id = ?")
            .bind(question_id)
            .bind(organisation_id)
            .fetch_optional(&mut *tx)
            .await?;
    if question.is_none() {
        return Err(ApiError::NotFound("Question"));
    }

    // every referenced taxonomy row must exist in this organisation
    for (table, label, id) in [
        ("tags", "Tag", refs.tag_id),
        ("skills", "Skill", refs.skill_id),
        ("channels", "Channel", refs.channel_id),
        ("levels", "Level", refs.level_id),
    ] {
        if let Some(id) = id {
            let found: Option<i64> = sqlx::query_scalar(&format!(
                "SELECT id FROM {table} WHERE id = ? AND organisation_id = ?"
            ))
            .bind(id)
            .bind(organisation_id)
            .fetch_optional(&mut *tx)
            .await?;
            if found.is_none() {
                return Err(ApiError::NotFound(label));
            }
        }
    }

    let id = sqlx::query(
        r#"
        INSERT INTO onboarding_question_options
            (question_id, option_text, tag_id, skill_id, channel_id, level_id)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(question_id)
    .bind(option_text)
    .bind(refs.tag_id)
    .bind(refs.skill_id)
    .bind(refs.channel_id)
    .bind(refs.level_id)
    .execute(&mut *tx)
    .await?
    .last_insert_rowid();

    tx.commit().await?;
    Ok(id)
}

/// Replace the user's whole response set and mark onboarding done.
pub async fn submit_responses(db: &SqlitePool, user_id: i64, option_ids: &[i64]) -> ApiResult<()> {
    if option_ids.is_empty() {
        return Err(ApiError::validation("option_ids array is required"));
    }

    let mut tx = db.begin().await?;

    sqlx::query("DELETE FROM onboarding_responses WHERE user_id = ?")
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

    for option_id in option_ids {
        sqlx::query(
            r#"
            INSERT INTO onboarding_responses (user_id, option_id) VALUES (?, ?)
            ON CONFLICT (user_id, option_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(option_id)
        .execute(&mut *tx)
        .await?;
    }

    sqlx::query("UPDATE users SET has_completed_onboarding = 1 WHERE id = ?")
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(())
}

#[derive(Debug, Serialize, sqlx::FromRow, ToSchema)]
pub struct Response {
    pub option_id: i64,
    pub option_text: String,
    pub tag_id: Option<i64>,
    pub tag_name: Option<String>,
    pub question_id: i64,
    pub question_text: String,
}

pub async fn list_responses(db: &SqlitePool, user_id: i64) -> ApiResult<Vec<Response>> {
    Ok(sqlx::query_as(
        r#"
        SELECT resp.option_id, oqo.option_text,
               oqo.tag_id, t.name AS tag_name,
               oq.id AS question_id, oq.question_text
        FROM onboarding_responses resp
        JOIN onboarding_question_options oqo ON oqo.id = resp.option_id
        JOIN onboarding_questions oq ON oq.id = oqo.question_id
        LEFT JOIN tags t ON t.id = oqo.tag_id
        WHERE resp.user_id = ?
        ORDER BY oq.position ASC
        "#,
    )
    .bind(user_id)
    .fetch_all(db)
    .await?)
}
