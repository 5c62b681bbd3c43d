use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::json;
use tower_cookies::Cookies;
use utoipa::ToSchema;

use super::AppState;
use crate::{
    error::ApiResult,
    onboarding::{self, OptionRefs},
    session::SessionUser,
};

#[utoipa::path(get, path = "/api/onboarding/questions",
    responses((status = 200, description = "Questionnaire with options and taxonomy names")))]
pub async fn list_questions(
    State(state): State<AppState>,
    session: SessionUser,
) -> ApiResult<impl IntoResponse> {
    let org_id = session.org()?.id;
    Ok(Json(onboarding::list_questions(&state.db, org_id).await?))
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateQuestionRequest {
    pub question_text: String,
    #[serde(default)]
    pub position: i64,
}

#[utoipa::path(post, path = "/api/onboarding/questions", request_body = CreateQuestionRequest,
    responses((status = 201, description = "Question created"),
              (status = 403, description = "Admin access required")))]
pub async fn create_question(
    State(state): State<AppState>,
    session: SessionUser,
    Json(req): Json<CreateQuestionRequest>,
) -> ApiResult<impl IntoResponse> {
    let org_id = session.require_admin()?.id;
    let id =
        onboarding::create_question(&state.db, org_id, &req.question_text, req.position).await?;
    Ok((StatusCode::CREATED, Json(json!({ "id": id }))))
}

#[utoipa::path(delete, path = "/api/onboarding/questions/{id}",
    responses((status = 200, description = "Question deleted"),
              (status = 404, description = "Question not found")))]
pub async fn delete_question(
    State(state): State<AppState>,
    session: SessionUser,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let org_id = session.require_admin()?.id;
    onboarding::delete_question(&state.db, org_id, id).await?;
    Ok(Json(json!({ "message": "Question deleted successfully" })))
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateOptionRequest {
    pub option_text: String,
    #[serde(flatten)]
    pub refs: OptionRefs,
}

#[utoipa::path(post, path = "/api/onboarding/questions/{id}/options",
    request_body = CreateOptionRequest,
    responses((status = 201, description = "Option created"),
              (status = 404, description = "Question or referenced taxonomy entry not found")))]
pub async fn create_option(
    State(state): State<AppState>,
    session: SessionUser,
    Path(question_id): Path<i64>,
    Json(req): Json<CreateOptionRequest>,
) -> ApiResult<impl IntoResponse> {
    let org_id = session.require_admin()?.id;
    let id =
        onboarding::create_option(&state.db, org_id, question_id, &req.option_text, req.refs)
            .await?;
    Ok((StatusCode::CREATED, Json(json!({ "id": id }))))
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponsesRequest {
    pub option_ids: Vec<i64>,
}

#[utoipa::path(post, path = "/api/onboarding/responses", request_body = SubmitResponsesRequest,
    responses((status = 200, description = "Responses replaced, onboarding marked complete"),
              (status = 400, description = "Empty selection")))]
pub async fn submit_responses(
    State(state): State<AppState>,
    cookies: Cookies,
    mut session: SessionUser,
    Json(req): Json<SubmitResponsesRequest>,
) -> ApiResult<impl IntoResponse> {
    session.org()?;
    onboarding::submit_responses(&state.db, session.user_id, &req.option_ids).await?;

    // the onboarding flag lives in the cookie snapshot: reissue it
    session.has_completed_onboarding = true;
    session.issue(&cookies);

    Ok(Json(json!({ "message": "Onboarding completed successfully" })))
}

#[utoipa::path(get, path = "/api/onboarding/responses",
    responses((status = 200, description = "The caller's selections with question text")))]
pub async fn list_responses(
    State(state): State<AppState>,
    session: SessionUser,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(
        onboarding::list_responses(&state.db, session.user_id).await?,
    ))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/questions", get(list_questions).post(create_question))
        .route("/questions/{id}", axum::routing::delete(delete_question))
        .route("/questions/{id}/options", post(create_option))
        .route("/responses", get(list_responses).post(submit_responses))
}
