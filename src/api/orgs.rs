use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
};
use serde::Deserialize;
use serde_json::json;
use tower_cookies::Cookies;
use utoipa::ToSchema;

use super::AppState;
use crate::{
    error::ApiResult,
    org,
    session::{OrgSession, Role, SessionUser},
};

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrgRequest {
    pub organisation_name: String,
}

#[utoipa::path(post, path = "/api/orgs", request_body = CreateOrgRequest,
    responses((status = 201, description = "Organization created"),
              (status = 400, description = "Name already taken")))]
pub async fn create_org(
    State(state): State<AppState>,
    cookies: Cookies,
    mut session: SessionUser,
    Json(req): Json<CreateOrgRequest>,
) -> ApiResult<impl IntoResponse> {
    let organisation =
        org::create_organisation(&state.db, session.user_id, &req.organisation_name).await?;

    // the creator's role just changed: reissue the snapshot
    session.organisation = Some(OrgSession {
        id: organisation.id,
        role: Role::Admin,
        ai_enabled: organisation.ai_enabled,
    });
    session.issue(&cookies);

    Ok((StatusCode::CREATED, Json(json!({ "organisation": organisation }))))
}

#[utoipa::path(get, path = "/api/orgs/my",
    responses((status = 200, description = "The caller's organization, if any")))]
pub async fn my_org(
    State(state): State<AppState>,
    session: SessionUser,
) -> ApiResult<impl IntoResponse> {
    let membership = org::my_organisation(&state.db, session.user_id).await?;
    Ok(Json(json!({ "organisation": membership })))
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSettingsRequest {
    pub ai_enabled: bool,
}

#[utoipa::path(put, path = "/api/orgs/settings", request_body = UpdateSettingsRequest,
    responses((status = 200, description = "Settings updated"),
              (status = 403, description = "Admin access required")))]
pub async fn update_settings(
    State(state): State<AppState>,
    cookies: Cookies,
    mut session: SessionUser,
    Json(req): Json<UpdateSettingsRequest>,
) -> ApiResult<impl IntoResponse> {
    let org_id = session.require_admin()?.id;
    org::update_settings(&state.db, org_id, req.ai_enabled).await?;

    if let Some(organisation) = session.organisation.as_mut() {
        organisation.ai_enabled = req.ai_enabled;
    }
    session.issue(&cookies);

    Ok(Json(json!({ "success": true })))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_org))
        .route("/my", get(my_org))
        .route("/settings", put(update_settings))
}
