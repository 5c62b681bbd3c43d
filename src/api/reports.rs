use axum::{Json, Router, extract::State, response::IntoResponse, routing::get};

use super::AppState;
use crate::{error::ApiResult, reports, session::SessionUser};

#[utoipa::path(get, path = "/api/reports/progress",
    responses((status = 200, description = "The caller's progress report")))]
pub async fn progress(
    State(state): State<AppState>,
    session: SessionUser,
) -> ApiResult<impl IntoResponse> {
    session.org()?;
    Ok(Json(reports::progress(&state.db, session.user_id).await?))
}

#[utoipa::path(get, path = "/api/reports/overview",
    responses((status = 200, description = "Org-wide rollup plus per-employee progress"),
              (status = 403, description = "Admin access required")))]
pub async fn overview(
    State(state): State<AppState>,
    session: SessionUser,
) -> ApiResult<impl IntoResponse> {
    let org_id = session.require_admin()?.id;
    Ok(Json(reports::overview(&state.db, org_id).await?))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/progress", get(progress))
        .route("/overview", get(overview))
}
