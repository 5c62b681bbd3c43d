use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::json;
use tower_cookies::Cookies;
use utoipa::ToSchema;

use super::AppState;
use crate::{account, error::ApiResult, session::SessionUser};

#[derive(Deserialize, ToSchema)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub firstname: String,
    #[serde(default)]
    pub lastname: String,
}

#[utoipa::path(post, path = "/api/signup", request_body = SignupRequest,
    responses((status = 201, description = "Account created"),
              (status = 400, description = "Email already registered")))]
pub async fn signup(
    State(state): State<AppState>,
    cookies: Cookies,
    Json(req): Json<SignupRequest>,
) -> ApiResult<impl IntoResponse> {
    let user_id = account::create_user(
        &state.db,
        &req.email,
        &req.password,
        &req.firstname,
        &req.lastname,
    )
    .await?;

    let session = SessionUser {
        user_id,
        email: req.email.trim().to_string(),
        firstname: req.firstname,
        lastname: req.lastname,
        is_logged_in: true,
        has_completed_onboarding: false,
        organisation: None,
    };
    session.issue(&cookies);

    Ok((StatusCode::CREATED, Json(json!({ "success": true }))))
}

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[utoipa::path(post, path = "/api/login", request_body = LoginRequest,
    responses((status = 200, description = "Login successful"),
              (status = 401, description = "Invalid credentials")))]
pub async fn login(
    State(state): State<AppState>,
    cookies: Cookies,
    Json(req): Json<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    let session = account::login(&state.db, &req.email, &req.password).await?;
    session.issue(&cookies);
    Ok(Json(json!({ "success": true })))
}

#[utoipa::path(post, path = "/api/logout",
    responses((status = 200, description = "Logout successful")))]
pub async fn logout(cookies: Cookies) -> impl IntoResponse {
    SessionUser::clear(&cookies);
    Json(json!({ "success": true }))
}

#[utoipa::path(get, path = "/api/me",
    responses((status = 200, description = "Current session snapshot")))]
pub async fn me(cookies: Cookies) -> impl IntoResponse {
    match SessionUser::from_cookies(&cookies) {
        Ok(session) => Json(serde_json::to_value(&session).unwrap_or_default()),
        Err(_) => Json(json!({ "isLoggedIn": false })),
    }
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/me", get(me))
}
