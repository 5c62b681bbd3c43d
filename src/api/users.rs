use axum::{
    Json, Router,
    extract::State,
    response::IntoResponse,
    routing::{get, put},
};
use serde::Deserialize;
use serde_json::json;
use tower_cookies::Cookies;
use utoipa::ToSchema;

use super::AppState;
use crate::{
    account,
    error::ApiResult,
    org,
    session::{Role, SessionUser},
};

#[utoipa::path(get, path = "/api/users",
    responses((status = 200, description = "Members of the caller's organization"),
              (status = 403, description = "Admin access required")))]
pub async fn list_users(
    State(state): State<AppState>,
    session: SessionUser,
) -> ApiResult<impl IntoResponse> {
    let org_id = session.require_admin()?.id;
    let users = account::list_org_users(&state.db, org_id).await?;
    Ok(Json(users))
}

#[derive(Deserialize, ToSchema)]
pub struct AddUserRequest {
    pub email: String,
    #[serde(default = "default_member_role")]
    pub role: Role,
}

fn default_member_role() -> Role {
    Role::Employee
}

#[utoipa::path(post, path = "/api/users", request_body = AddUserRequest,
    responses((status = 201, description = "User added to the organization"),
              (status = 404, description = "No account with that email")))]
pub async fn add_user(
    State(state): State<AppState>,
    session: SessionUser,
    Json(req): Json<AddUserRequest>,
) -> ApiResult<impl IntoResponse> {
    let org_id = session.require_admin()?.id;
    let user_id = org::add_member(&state.db, org_id, &req.email, req.role).await?;
    Ok((
        axum::http::StatusCode::CREATED,
        Json(json!({ "userId": user_id })),
    ))
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeleteUserRequest {
    pub user_id: i64,
}

#[utoipa::path(delete, path = "/api/users", request_body = DeleteUserRequest,
    responses((status = 200, description = "User deleted"),
              (status = 404, description = "User not found")))]
pub async fn delete_user(
    State(state): State<AppState>,
    session: SessionUser,
    Json(req): Json<DeleteUserRequest>,
) -> ApiResult<impl IntoResponse> {
    session.require_admin()?;
    account::delete_user(&state.db, req.user_id).await?;
    Ok(Json(json!({ "message": "User deleted successfully" })))
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateProfileRequest {
    pub firstname: String,
    pub lastname: String,
    pub email: String,
}

#[utoipa::path(put, path = "/api/users/profile", request_body = UpdateProfileRequest,
    responses((status = 200, description = "Profile updated"),
              (status = 400, description = "Email already in use")))]
pub async fn update_profile(
    State(state): State<AppState>,
    cookies: Cookies,
    mut session: SessionUser,
    Json(req): Json<UpdateProfileRequest>,
) -> ApiResult<impl IntoResponse> {
    account::update_profile(
        &state.db,
        session.user_id,
        &req.firstname,
        &req.lastname,
        &req.email,
    )
    .await?;

    session.firstname = req.firstname;
    session.lastname = req.lastname;
    session.email = req.email;
    session.issue(&cookies);

    Ok(Json(json!({
        "message": "Profile updated successfully",
        "user": session,
    })))
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[utoipa::path(put, path = "/api/users/password", request_body = ChangePasswordRequest,
    responses((status = 200, description = "Password updated"),
              (status = 400, description = "Current password is incorrect")))]
pub async fn change_password(
    State(state): State<AppState>,
    session: SessionUser,
    Json(req): Json<ChangePasswordRequest>,
) -> ApiResult<impl IntoResponse> {
    account::change_password(
        &state.db,
        session.user_id,
        &req.current_password,
        &req.new_password,
    )
    .await?;
    Ok(Json(json!({ "message": "Password updated successfully" })))
}

#[utoipa::path(get, path = "/api/users/skills",
    responses((status = 200, description = "Own skills plus the org catalog")))]
pub async fn skills(
    State(state): State<AppState>,
    session: SessionUser,
) -> ApiResult<impl IntoResponse> {
    let org_id = session.org()?.id;
    let overview = account::skill_overview(&state.db, session.user_id, org_id).await?;
    Ok(Json(overview))
}

#[derive(Deserialize, ToSchema)]
pub struct SkillRequest {
    pub skill_id: i64,
    pub level: String,
}

#[utoipa::path(post, path = "/api/users/skills", request_body = SkillRequest,
    responses((status = 200, description = "Skill added"),
              (status = 400, description = "Invalid level or duplicate skill")))]
pub async fn add_skill(
    State(state): State<AppState>,
    session: SessionUser,
    Json(req): Json<SkillRequest>,
) -> ApiResult<impl IntoResponse> {
    account::add_user_skill(&state.db, session.user_id, req.skill_id, &req.level).await?;
    Ok(Json(json!({ "message": "Skill added successfully" })))
}

#[utoipa::path(put, path = "/api/users/skills", request_body = SkillRequest,
    responses((status = 200, description = "Skill level updated"),
              (status = 404, description = "Skill not found")))]
pub async fn update_skill(
    State(state): State<AppState>,
    session: SessionUser,
    Json(req): Json<SkillRequest>,
) -> ApiResult<impl IntoResponse> {
    account::update_user_skill(&state.db, session.user_id, req.skill_id, &req.level).await?;
    Ok(Json(json!({ "message": "Skill level updated successfully" })))
}

#[derive(Deserialize, ToSchema)]
pub struct RemoveSkillRequest {
    pub skill_id: i64,
}

#[utoipa::path(delete, path = "/api/users/skills", request_body = RemoveSkillRequest,
    responses((status = 200, description = "Skill removed"),
              (status = 404, description = "Skill not found")))]
pub async fn remove_skill(
    State(state): State<AppState>,
    session: SessionUser,
    Json(req): Json<RemoveSkillRequest>,
) -> ApiResult<impl IntoResponse> {
    account::remove_user_skill(&state.db, session.user_id, req.skill_id).await?;
    Ok(Json(json!({ "message": "Skill removed successfully" })))
}

#[utoipa::path(get, path = "/api/users/preferences",
    responses((status = 200, description = "Ranked channel and level preferences")))]
pub async fn preferences(
    State(state): State<AppState>,
    session: SessionUser,
) -> ApiResult<impl IntoResponse> {
    let prefs = account::preferences(&state.db, session.user_id).await?;
    Ok(Json(prefs))
}

#[utoipa::path(put, path = "/api/users/preferences", request_body = account::Preferences,
    responses((status = 200, description = "Preferences replaced")))]
pub async fn set_preferences(
    State(state): State<AppState>,
    session: SessionUser,
    Json(req): Json<account::Preferences>,
) -> ApiResult<impl IntoResponse> {
    account::set_preferences(&state.db, session.user_id, &req).await?;
    Ok(Json(json!({ "message": "Preferences updated successfully" })))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_users).post(add_user).delete(delete_user))
        .route("/profile", put(update_profile))
        .route("/password", put(change_password))
        .route(
            "/skills",
            get(skills).post(add_skill).put(update_skill).delete(remove_skill),
        )
        .route("/preferences", get(preferences).put(set_preferences))
}
