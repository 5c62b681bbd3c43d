use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::json;
use utoipa::ToSchema;

use super::AppState;
use crate::{
    error::ApiResult,
    quiz::{self, AnswerInput},
    session::SessionUser,
};

#[derive(Deserialize, ToSchema)]
pub struct SubmitRequest {
    pub answers: Vec<AnswerInput>,
}

#[utoipa::path(post, path = "/api/quizzes/{id}/submit", request_body = SubmitRequest,
    responses((status = 201, description = "Response recorded, module completed"),
              (status = 404, description = "Quiz or enrollment not found")))]
pub async fn submit(
    State(state): State<AppState>,
    session: SessionUser,
    Path(quiz_id): Path<i64>,
    Json(req): Json<SubmitRequest>,
) -> ApiResult<impl IntoResponse> {
    session.org()?;
    let response_id = quiz::submit(&state.db, session.user_id, quiz_id, &req.answers).await?;
    Ok((StatusCode::CREATED, Json(json!({ "responseId": response_id }))))
}

#[utoipa::path(get, path = "/api/quizzes/responses/{id}",
    responses((status = 200, description = "Graded response, recomputed from raw answers"),
              (status = 404, description = "Response not found")))]
pub async fn grade(
    State(state): State<AppState>,
    session: SessionUser,
    Path(response_id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    session.org()?;
    Ok(Json(quiz::grade(&state.db, response_id).await?))
}

#[utoipa::path(get, path = "/api/quizzes/{id}/latest",
    responses((status = 200, description = "The caller's latest graded attempt"),
              (status = 404, description = "No response yet")))]
pub async fn latest(
    State(state): State<AppState>,
    session: SessionUser,
    Path(quiz_id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    session.org()?;
    Ok(Json(
        quiz::latest_graded(&state.db, session.user_id, quiz_id).await?,
    ))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/{id}/submit", post(submit))
        .route("/{id}/latest", get(latest))
        .route("/responses/{id}", get(grade))
}
