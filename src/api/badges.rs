use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
};
use serde::Deserialize;
use serde_json::json;
use utoipa::ToSchema;

use super::AppState;
use crate::{badges, error::ApiResult, session::SessionUser};

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FrequentBadgeRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub num_courses_completed: i64,
}

#[utoipa::path(post, path = "/api/badges/create-frequent", request_body = FrequentBadgeRequest,
    responses((status = 201, description = "Threshold badge created"),
              (status = 400, description = "Threshold must be positive")))]
pub async fn create_frequent(
    State(state): State<AppState>,
    session: SessionUser,
    Json(req): Json<FrequentBadgeRequest>,
) -> ApiResult<impl IntoResponse> {
    let org_id = session.require_admin()?.id;
    let id = badges::create_frequent_badge(
        &state.db,
        org_id,
        session.user_id,
        &req.name,
        &req.description,
        req.num_courses_completed,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(json!({ "id": id }))))
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CourseBadgeRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub course_id: i64,
}

#[utoipa::path(post, path = "/api/badges/create-specific-course",
    request_body = CourseBadgeRequest,
    responses((status = 201, description = "Course badge created"),
              (status = 404, description = "Course not found")))]
pub async fn create_course_badge(
    State(state): State<AppState>,
    session: SessionUser,
    Json(req): Json<CourseBadgeRequest>,
) -> ApiResult<impl IntoResponse> {
    let org_id = session.require_admin()?.id;
    let id = badges::create_course_badge(
        &state.db,
        org_id,
        session.user_id,
        &req.name,
        &req.description,
        req.course_id,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(json!({ "id": id }))))
}

#[utoipa::path(get, path = "/api/badges/created-badges",
    responses((status = 200, description = "Both badge kinds defined in the org")))]
pub async fn created_badges(
    State(state): State<AppState>,
    session: SessionUser,
) -> ApiResult<impl IntoResponse> {
    let org_id = session.org()?.id;
    Ok(Json(badges::catalog(&state.db, org_id).await?))
}

#[utoipa::path(get, path = "/api/badges/user-badges",
    responses((status = 200, description = "Badges awarded to the caller")))]
pub async fn user_badges(
    State(state): State<AppState>,
    session: SessionUser,
) -> ApiResult<impl IntoResponse> {
    let org_id = session.org()?.id;
    Ok(Json(
        badges::user_badges(&state.db, org_id, session.user_id).await?,
    ))
}

#[utoipa::path(delete, path = "/api/badges/{id}",
    responses((status = 200, description = "Badge deleted"),
              (status = 404, description = "Badge not found")))]
pub async fn delete_badge(
    State(state): State<AppState>,
    session: SessionUser,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let org_id = session.require_admin()?.id;
    badges::delete_badge(&state.db, org_id, session.user_id, id).await?;
    Ok(Json(json!({ "message": "Badge deleted successfully" })))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/create-frequent", post(create_frequent))
        .route("/create-specific-course", post(create_course_badge))
        .route("/created-badges", get(created_badges))
        .route("/user-badges", get(user_badges))
        .route("/{id}", delete(delete_badge))
}
