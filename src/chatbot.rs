//! Course-scoped chat assistant. One synchronous completion call per
//! question; the exchange is persisted verbatim to chat_logs.

use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
};
use serde::Serialize;
use serde_json::json;
use sqlx::SqlitePool;
use time::OffsetDateTime;
use utoipa::ToSchema;

use crate::{
    config::AiConfig,
    error::{ApiError, ApiResult},
    utils::now,
};

const SYSTEM_PROMPT: &str = "\
You are a technical course assistant for an online learning platform. \
Use the course, module and skill context provided to answer the learner's \
question as the instructor of that module would. Answer directly, without \
referring to the context document or to missing material. If you are \
unsure, give your best expert answer based on the module metadata. Keep \
answers concise and focused on the question. If the question is unrelated \
to the course or module, politely redirect the learner to support.";

const HISTORY_TURNS: i64 = 10;

#[derive(Clone)]
pub struct AiClient {
    client: Client<OpenAIConfig>,
    model: String,
}

impl AiClient {
    pub fn new(config: &AiConfig) -> Self {
        let openai_config = OpenAIConfig::default()
            .with_api_base(&config.base_url)
            .with_api_key(&config.api_key);
        Self {
            client: Client::with_config(openai_config),
            model: config.model.clone(),
        }
    }

    /// One completion round-trip. No retry, no timeout wrapper: a slow
    /// upstream keeps the requesting connection waiting.
    async fn answer(
        &self,
        context: &serde_json::Value,
        history: &[(String, String)],
        question: &str,
    ) -> anyhow::Result<String> {
        let mut messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(SYSTEM_PROMPT)
                .build()?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(serde_json::to_string_pretty(context)?)
                .build()?
                .into(),
        ];
        for (past_question, past_answer) in history {
            messages.push(
                ChatCompletionRequestUserMessageArgs::default()
                    .content(past_question.as_str())
                    .build()?
                    .into(),
            );
            messages.push(
                ChatCompletionRequestAssistantMessageArgs::default()
                    .content(past_answer.as_str())
                    .build()?
                    .into(),
            );
        }
        messages.push(
            ChatCompletionRequestUserMessageArgs::default()
                .content(question)
                .build()?
                .into(),
        );

        let request = CreateChatCompletionRequestArgs::default()
            .model(self.model.as_str())
            .messages(messages)
            .temperature(0.3)
            .max_completion_tokens(512u32)
            .build()?;
        let response = self.client.chat().create(request).await?;
        let answer = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| anyhow::anyhow!("no completion returned"))?;
        Ok(answer)
    }
}

pub async fn ask(
    db: &SqlitePool,
    ai: &AiClient,
    user_id: i64,
    organisation_id: i64,
    course_id: i64,
    module_id: i64,
    question: &str,
) -> ApiResult<String> {
    let question = question.trim();
    if question.is_empty() {
        return Err(ApiError::validation("Question is required"));
    }

    let course: Option<(String, String)> =
        sqlx::query_as("SELECT name, description FROM courses WHERE id = ?")
            .bind(course_id)
            .fetch_optional(db)
            .await?;
    let Some((course_name, course_description)) = course else {
        return Err(ApiError::NotFound("Course"));
    };

    let module: Option<(String, String)> =
        sqlx::query_as("SELECT title, description FROM modules WHERE id = ?")
            .bind(module_id)
            .fetch_optional(db)
            .await?;
    let Some((module_name, module_description)) = module else {
        return Err(ApiError::NotFound("Module"));
    };

    let skills: Vec<(i64, String, String)> = sqlx::query_as(
        r#"
        SELECT s.id, s.name, s.description
        FROM module_skills ms
        JOIN skills s ON s.id = ms.skill_id
        WHERE ms.module_id = ?
        "#,
    )
    .bind(module_id)
    .fetch_all(db)
    .await?;

    let channel: Option<(i64, String, String)> = sqlx::query_as(
        r#"
        SELECT ch.id, ch.name, ch.description
        FROM course_channels cc
        JOIN channels ch ON ch.id = cc.channel_id
        WHERE cc.course_id = ?
        "#,
    )
    .bind(course_id)
    .fetch_optional(db)
    .await?;

    let level: Option<(i64, String, String, i64)> = sqlx::query_as(
        r#"
        SELECT l.id, l.name, l.description, l.sort_order
        FROM course_channels cc
        JOIN levels l ON l.id = cc.level_id
        WHERE cc.course_id = ?
        "#,
    )
    .bind(course_id)
    .fetch_optional(db)
    .await?;

    let context = json!({
        "course_name": course_name,
        "course_description": course_description,
        "module_name": module_name,
        "module_description": module_description,
        "channel": channel
            .map(|(id, name, description)| json!({
                "id": id, "name": name, "description": description,
            }))
            .unwrap_or(json!({ "id": null, "name": "No channel", "description": "" })),
        "level": level
            .map(|(id, name, description, sort_order)| json!({
                "id": id, "name": name, "description": description, "sort_order": sort_order,
            }))
            .unwrap_or(json!({ "id": null, "name": "No level", "description": "", "sort_order": 0 })),
        "skill_tags": skills
            .iter()
            .map(|(id, name, description)| json!({
                "id": id, "name": name, "description": description,
            }))
            .collect::<Vec<_>>(),
        "question": question,
    });

    // prior exchanges for this module, oldest first
    let mut history: Vec<(String, String)> = sqlx::query_as(
        r#"
        SELECT question, answer FROM chat_logs
        WHERE user_id = ? AND organisation_id = ? AND course_id = ? AND module_id = ?
        ORDER BY created_at DESC
        LIMIT ?
        "#,
    )
    .bind(user_id)
    .bind(organisation_id)
    .bind(course_id)
    .bind(module_id)
    .bind(HISTORY_TURNS)
    .fetch_all(db)
    .await?;
    history.reverse();

    let answer = ai.answer(&context, &history, question).await?;

    sqlx::query(
        r#"
        INSERT INTO chat_logs
            (user_id, organisation_id, course_id, module_id, question, answer, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(user_id)
    .bind(organisation_id)
    .bind(course_id)
    .bind(module_id)
    .bind(question)
    .bind(&answer)
    .bind(now())
    .execute(db)
    .await?;

    Ok(answer)
}

#[derive(Debug, Serialize, sqlx::FromRow, ToSchema)]
pub struct ChatExchange {
    pub question: String,
    pub answer: String,
}

pub async fn logs(
    db: &SqlitePool,
    user_id: i64,
    organisation_id: i64,
    course_id: i64,
    module_id: i64,
) -> ApiResult<Vec<ChatExchange>> {
    Ok(sqlx::query_as(
        r#"
        SELECT question, answer FROM chat_logs
        WHERE user_id = ? AND organisation_id = ? AND course_id = ? AND module_id = ?
        ORDER BY created_at DESC
        "#,
    )
    .bind(user_id)
    .bind(organisation_id)
    .bind(course_id)
    .bind(module_id)
    .fetch_all(db)
    .await?)
}

#[derive(Debug, Serialize, sqlx::FromRow, ToSchema)]
pub struct ChatHistoryEntry {
    pub id: i64,
    pub course_name: String,
    pub module_title: String,
    pub question: String,
    pub answer: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

pub async fn history(
    db: &SqlitePool,
    user_id: i64,
    organisation_id: i64,
) -> ApiResult<Vec<ChatHistoryEntry>> {
    Ok(sqlx::query_as(
        r#"
        SELECT cl.id, c.name AS course_name, m.title AS module_title,
               cl.question, cl.answer, cl.created_at
        FROM chat_logs cl
        JOIN courses c ON c.id = cl.course_id
        JOIN modules m ON m.id = cl.module_id
        WHERE cl.user_id = ? AND cl.organisation_id = ?
        ORDER BY cl.created_at DESC
        "#,
    )
    .bind(user_id)
    .bind(organisation_id)
    .fetch_all(db)
    .await?)
}
