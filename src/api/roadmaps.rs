use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
};
use serde::Deserialize;
use serde_json::json;
use utoipa::ToSchema;

use super::AppState;
use crate::{error::ApiResult, roadmap, session::SessionUser};

#[utoipa::path(get, path = "/api/roadmaps",
    responses((status = 200, description = "The caller's roadmaps, newest first")))]
pub async fn list(
    State(state): State<AppState>,
    session: SessionUser,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(roadmap::list_roadmaps(&state.db, session.user_id).await?))
}

#[derive(Deserialize, ToSchema)]
pub struct RoadmapNameRequest {
    pub name: String,
}

#[utoipa::path(post, path = "/api/roadmaps", request_body = RoadmapNameRequest,
    responses((status = 201, description = "Roadmap created"),
              (status = 400, description = "Name is required")))]
pub async fn create(
    State(state): State<AppState>,
    session: SessionUser,
    Json(req): Json<RoadmapNameRequest>,
) -> ApiResult<impl IntoResponse> {
    let created = roadmap::create_roadmap(&state.db, session.user_id, &req.name).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[utoipa::path(put, path = "/api/roadmaps/{id}", request_body = RoadmapNameRequest,
    responses((status = 200, description = "Roadmap renamed"),
              (status = 404, description = "Roadmap not found")))]
pub async fn rename(
    State(state): State<AppState>,
    session: SessionUser,
    Path(id): Path<i64>,
    Json(req): Json<RoadmapNameRequest>,
) -> ApiResult<impl IntoResponse> {
    roadmap::rename_roadmap(&state.db, session.user_id, id, &req.name).await?;
    Ok(Json(json!({ "message": "Roadmap updated successfully" })))
}

#[utoipa::path(delete, path = "/api/roadmaps/{id}",
    responses((status = 200, description = "Roadmap deleted"),
              (status = 404, description = "Roadmap not found")))]
pub async fn delete(
    State(state): State<AppState>,
    session: SessionUser,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    roadmap::delete_roadmap(&state.db, session.user_id, id).await?;
    Ok(Json(json!({ "message": "Roadmap deleted successfully" })))
}

#[utoipa::path(get, path = "/api/roadmaps/{id}/items",
    responses((status = 200, description = "Items with enrollment and module status"),
              (status = 404, description = "Roadmap not found")))]
pub async fn list_items(
    State(state): State<AppState>,
    session: SessionUser,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(
        roadmap::list_items(&state.db, session.user_id, id).await?,
    ))
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddItemRequest {
    pub module_id: i64,
}

#[utoipa::path(post, path = "/api/roadmaps/{id}/items", request_body = AddItemRequest,
    responses((status = 201, description = "Item appended, course enrolled"),
              (status = 400, description = "Module already in roadmap")))]
pub async fn add_item(
    State(state): State<AppState>,
    session: SessionUser,
    Path(id): Path<i64>,
    Json(req): Json<AddItemRequest>,
) -> ApiResult<impl IntoResponse> {
    let position = roadmap::add_item(&state.db, session.user_id, id, req.module_id).await?;
    Ok((StatusCode::CREATED, Json(json!({ "position": position }))))
}

#[derive(Deserialize, ToSchema)]
pub struct MoveItemRequest {
    pub position: i64,
}

#[utoipa::path(put, path = "/api/roadmaps/{id}/items/{module_id}",
    request_body = MoveItemRequest,
    responses((status = 200, description = "Item repositioned"),
              (status = 404, description = "Roadmap item not found")))]
pub async fn move_item(
    State(state): State<AppState>,
    session: SessionUser,
    Path((id, module_id)): Path<(i64, i64)>,
    Json(req): Json<MoveItemRequest>,
) -> ApiResult<impl IntoResponse> {
    roadmap::move_item(&state.db, session.user_id, id, module_id, req.position).await?;
    Ok(Json(json!({ "message": "Roadmap item updated successfully" })))
}

#[utoipa::path(delete, path = "/api/roadmaps/{id}/items/{module_id}",
    responses((status = 200, description = "Item removed, enrollment untouched"),
              (status = 404, description = "Roadmap item not found")))]
pub async fn remove_item(
    State(state): State<AppState>,
    session: SessionUser,
    Path((id, module_id)): Path<(i64, i64)>,
) -> ApiResult<impl IntoResponse> {
    roadmap::remove_item(&state.db, session.user_id, id, module_id).await?;
    Ok(Json(json!({ "message": "Roadmap item removed successfully" })))
}

#[utoipa::path(post, path = "/api/roadmaps/generate", request_body = RoadmapNameRequest,
    responses((status = 201, description = "Roadmap generated and courses enrolled"),
              (status = 400, description = "A roadmap with the same modules already exists")))]
pub async fn generate(
    State(state): State<AppState>,
    session: SessionUser,
    Json(req): Json<RoadmapNameRequest>,
) -> ApiResult<impl IntoResponse> {
    let org_id = session.org()?.id;
    let generated = roadmap::generate(&state.db, session.user_id, org_id, &req.name).await?;
    Ok((StatusCode::CREATED, Json(generated)))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/generate", post(generate))
        .route("/{id}", put(rename).delete(delete))
        .route("/{id}/items", get(list_items).post(add_item))
        .route(
            "/{id}/items/{module_id}",
            put(move_item).delete(remove_item),
        )
}
