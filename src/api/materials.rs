use axum::{
    Json, Router,
    extract::{Query, State},
    response::IntoResponse,
    routing::get,
};
use serde::Deserialize;
use serde_json::json;
use utoipa::IntoParams;

use super::AppState;
use crate::{catalog, error::ApiResult, session::SessionUser};

#[derive(Deserialize, IntoParams)]
pub struct MaterialsQuery {
    /// Comma-separated tag ids to narrow the listing.
    pub tags: Option<String>,
}

#[utoipa::path(get, path = "/api/materials", params(MaterialsQuery),
    responses((status = 200, description = "Org-wide module listing")))]
pub async fn list(
    State(state): State<AppState>,
    session: SessionUser,
    Query(query): Query<MaterialsQuery>,
) -> ApiResult<impl IntoResponse> {
    let org_id = session.org()?.id;
    let tag_ids: Vec<i64> = query
        .tags
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .filter_map(|part| part.trim().parse().ok())
        .collect();
    let materials = catalog::materials(&state.db, org_id, &tag_ids).await?;
    Ok(Json(materials))
}

#[utoipa::path(get, path = "/api/materials/by-user-tags",
    responses((status = 200, description = "Modules ranked by onboarding-tag overlap")))]
pub async fn by_user_tags(
    State(state): State<AppState>,
    session: SessionUser,
) -> ApiResult<impl IntoResponse> {
    let org_id = session.org()?.id;
    let (materials, user_tags) =
        catalog::materials_by_user_tags(&state.db, org_id, session.user_id).await?;
    Ok(Json(json!({ "materials": materials, "userTagIds": user_tags })))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list))
        .route("/by-user-tags", get(by_user_tags))
}
