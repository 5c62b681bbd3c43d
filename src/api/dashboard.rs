use axum::{Json, Router, extract::State, response::IntoResponse, routing::get};

use super::AppState;
use crate::{error::ApiResult, reports, session::SessionUser};

#[utoipa::path(get, path = "/api/dashboard/user-dashboard",
    responses((status = 200, description = "Current course, module and roadmap progress")))]
pub async fn user_dashboard(
    State(state): State<AppState>,
    session: SessionUser,
) -> ApiResult<impl IntoResponse> {
    session.org()?;
    let dashboard =
        reports::user_dashboard(&state.db, session.user_id, &session.firstname).await?;
    Ok(Json(dashboard))
}

#[utoipa::path(get, path = "/api/dashboard/admin-dashboard",
    responses((status = 200, description = "Per-employee and per-course counts"),
              (status = 403, description = "Admin access required")))]
pub async fn admin_dashboard(
    State(state): State<AppState>,
    session: SessionUser,
) -> ApiResult<impl IntoResponse> {
    let org_id = session.require_admin()?.id;
    let dashboard = reports::admin_dashboard(&state.db, org_id, &session.firstname).await?;
    Ok(Json(dashboard))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/user-dashboard", get(user_dashboard))
        .route("/admin-dashboard", get(admin_dashboard))
}
