use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get},
};
use serde::Deserialize;
use serde_json::json;
use utoipa::ToSchema;

use super::AppState;
use crate::{error::ApiResult, session::SessionUser, taxonomy};

#[derive(Deserialize, ToSchema)]
pub struct CreateEntryRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub sort_order: i64,
}

#[utoipa::path(get, path = "/api/taxonomy/skills",
    responses((status = 200, description = "Skills of the caller's organization")))]
pub async fn list_skills(
    State(state): State<AppState>,
    session: SessionUser,
) -> ApiResult<impl IntoResponse> {
    let org_id = session.org()?.id;
    Ok(Json(taxonomy::list_skills(&state.db, org_id).await?))
}

#[utoipa::path(post, path = "/api/taxonomy/skills", request_body = CreateEntryRequest,
    responses((status = 201, description = "Skill created"),
              (status = 403, description = "Admin access required")))]
pub async fn create_skill(
    State(state): State<AppState>,
    session: SessionUser,
    Json(req): Json<CreateEntryRequest>,
) -> ApiResult<impl IntoResponse> {
    let org_id = session.require_admin()?.id;
    let id = taxonomy::create_skill(&state.db, org_id, &req.name, &req.description).await?;
    Ok((StatusCode::CREATED, Json(json!({ "id": id }))))
}

#[utoipa::path(delete, path = "/api/taxonomy/skills/{id}",
    responses((status = 200, description = "Skill deleted"),
              (status = 404, description = "Skill not found")))]
pub async fn delete_skill(
    State(state): State<AppState>,
    session: SessionUser,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let org_id = session.require_admin()?.id;
    taxonomy::delete_skill(&state.db, org_id, id).await?;
    Ok(Json(json!({ "message": "Skill deleted successfully" })))
}

#[utoipa::path(get, path = "/api/taxonomy/channels",
    responses((status = 200, description = "Channels of the caller's organization")))]
pub async fn list_channels(
    State(state): State<AppState>,
    session: SessionUser,
) -> ApiResult<impl IntoResponse> {
    let org_id = session.org()?.id;
    Ok(Json(taxonomy::list_channels(&state.db, org_id).await?))
}

#[utoipa::path(post, path = "/api/taxonomy/channels", request_body = CreateEntryRequest,
    responses((status = 201, description = "Channel created"),
              (status = 403, description = "Admin access required")))]
pub async fn create_channel(
    State(state): State<AppState>,
    session: SessionUser,
    Json(req): Json<CreateEntryRequest>,
) -> ApiResult<impl IntoResponse> {
    let org_id = session.require_admin()?.id;
    let id = taxonomy::create_channel(&state.db, org_id, &req.name, &req.description).await?;
    Ok((StatusCode::CREATED, Json(json!({ "id": id }))))
}

#[utoipa::path(delete, path = "/api/taxonomy/channels/{id}",
    responses((status = 200, description = "Channel deleted"),
              (status = 404, description = "Channel not found")))]
pub async fn delete_channel(
    State(state): State<AppState>,
    session: SessionUser,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let org_id = session.require_admin()?.id;
    taxonomy::delete_channel(&state.db, org_id, id).await?;
    Ok(Json(json!({ "message": "Channel deleted successfully" })))
}

#[utoipa::path(get, path = "/api/taxonomy/levels",
    responses((status = 200, description = "Levels of the caller's organization")))]
pub async fn list_levels(
    State(state): State<AppState>,
    session: SessionUser,
) -> ApiResult<impl IntoResponse> {
    let org_id = session.org()?.id;
    Ok(Json(taxonomy::list_levels(&state.db, org_id).await?))
}

#[utoipa::path(post, path = "/api/taxonomy/levels", request_body = CreateEntryRequest,
    responses((status = 201, description = "Level created"),
              (status = 403, description = "Admin access required")))]
pub async fn create_level(
    State(state): State<AppState>,
    session: SessionUser,
    Json(req): Json<CreateEntryRequest>,
) -> ApiResult<impl IntoResponse> {
    let org_id = session.require_admin()?.id;
    let id =
        taxonomy::create_level(&state.db, org_id, &req.name, &req.description, req.sort_order)
            .await?;
    Ok((StatusCode::CREATED, Json(json!({ "id": id }))))
}

#[utoipa::path(delete, path = "/api/taxonomy/levels/{id}",
    responses((status = 200, description = "Level deleted"),
              (status = 404, description = "Level not found")))]
pub async fn delete_level(
    State(state): State<AppState>,
    session: SessionUser,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let org_id = session.require_admin()?.id;
    taxonomy::delete_level(&state.db, org_id, id).await?;
    Ok(Json(json!({ "message": "Level deleted successfully" })))
}

#[utoipa::path(get, path = "/api/taxonomy/tags",
    responses((status = 200, description = "Tags of the caller's organization")))]
pub async fn list_tags(
    State(state): State<AppState>,
    session: SessionUser,
) -> ApiResult<impl IntoResponse> {
    let org_id = session.org()?.id;
    Ok(Json(taxonomy::list_tags(&state.db, org_id).await?))
}

#[utoipa::path(post, path = "/api/taxonomy/tags", request_body = CreateEntryRequest,
    responses((status = 201, description = "Tag created"),
              (status = 403, description = "Admin access required")))]
pub async fn create_tag(
    State(state): State<AppState>,
    session: SessionUser,
    Json(req): Json<CreateEntryRequest>,
) -> ApiResult<impl IntoResponse> {
    let org_id = session.require_admin()?.id;
    let id = taxonomy::create_tag(&state.db, org_id, &req.name).await?;
    Ok((StatusCode::CREATED, Json(json!({ "id": id }))))
}

#[utoipa::path(delete, path = "/api/taxonomy/tags/{id}",
    responses((status = 200, description = "Tag deleted"),
              (status = 404, description = "Tag not found")))]
pub async fn delete_tag(
    State(state): State<AppState>,
    session: SessionUser,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let org_id = session.require_admin()?.id;
    taxonomy::delete_tag(&state.db, org_id, id).await?;
    Ok(Json(json!({ "message": "Tag deleted successfully" })))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/skills", get(list_skills).post(create_skill))
        .route("/skills/{id}", delete(delete_skill))
        .route("/channels", get(list_channels).post(create_channel))
        .route("/channels/{id}", delete(delete_channel))
        .route("/levels", get(list_levels).post(create_level))
        .route("/levels/{id}", delete(delete_level))
        .route("/tags", get(list_tags).post(create_tag))
        .route("/tags/{id}", delete(delete_tag))
}
