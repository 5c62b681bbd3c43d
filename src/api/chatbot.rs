use axum::{
    Json, Router,
    extract::State,
    response::IntoResponse,
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::json;
use utoipa::ToSchema;

use super::AppState;
use crate::{
    chatbot,
    error::{ApiError, ApiResult},
    session::SessionUser,
};

fn require_ai(session: &SessionUser) -> Result<i64, ApiError> {
    let org = session.org()?;
    if !org.ai_enabled {
        return Err(ApiError::Forbidden);
    }
    Ok(org.id)
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AskRequest {
    pub course_id: i64,
    pub module_id: i64,
    pub question: String,
}

#[utoipa::path(post, path = "/api/chatbot/ask", request_body = AskRequest,
    responses((status = 200, description = "Assistant answer, persisted to the chat log"),
              (status = 403, description = "AI disabled for this organization")))]
pub async fn ask(
    State(state): State<AppState>,
    session: SessionUser,
    Json(req): Json<AskRequest>,
) -> ApiResult<impl IntoResponse> {
    let org_id = require_ai(&session)?;
    let Some(ai) = &state.ai else {
        return Err(anyhow::anyhow!("AI endpoint is not configured").into());
    };
    let answer = chatbot::ask(
        &state.db,
        ai,
        session.user_id,
        org_id,
        req.course_id,
        req.module_id,
        &req.question,
    )
    .await?;
    Ok(Json(json!({ "answer": answer })))
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LogsRequest {
    pub course_id: i64,
    pub module_id: i64,
}

#[utoipa::path(post, path = "/api/chatbot/logs", request_body = LogsRequest,
    responses((status = 200, description = "Prior exchanges for a module")))]
pub async fn logs(
    State(state): State<AppState>,
    session: SessionUser,
    Json(req): Json<LogsRequest>,
) -> ApiResult<impl IntoResponse> {
    let org_id = require_ai(&session)?;
    let logs = chatbot::logs(
        &state.db,
        session.user_id,
        org_id,
        req.course_id,
        req.module_id,
    )
    .await?;
    Ok(Json(logs))
}

#[utoipa::path(get, path = "/api/chatbot/history",
    responses((status = 200, description = "All of the caller's exchanges with names")))]
pub async fn history(
    State(state): State<AppState>,
    session: SessionUser,
) -> ApiResult<impl IntoResponse> {
    let org_id = require_ai(&session)?;
    Ok(Json(
        chatbot::history(&state.db, session.user_id, org_id).await?,
    ))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/ask", post(ask))
        .route("/logs", post(logs))
        .route("/history", get(history))
}
