use axum::{Json, Router, extract::State, response::IntoResponse, routing::get};

use super::AppState;
use crate::{activity, error::ApiResult, session::SessionUser};

#[utoipa::path(get, path = "/api/activity",
    responses((status = 200, description = "The caller's last 100 actions in the org")))]
pub async fn list(
    State(state): State<AppState>,
    session: SessionUser,
) -> ApiResult<impl IntoResponse> {
    let org_id = session.org()?.id;
    Ok(Json(
        activity::list(&state.db, org_id, session.user_id).await?,
    ))
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/", get(list))
}
