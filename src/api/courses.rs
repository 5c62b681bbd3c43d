use axum::{
    Json, Router,
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::json;
use utoipa::ToSchema;

use super::AppState;
use crate::{
    catalog::{self, ModuleContent},
    enrollment,
    error::{ApiError, ApiResult},
    session::SessionUser,
    utils::now,
};

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CourseRequest {
    pub course_name: String,
    #[serde(default)]
    pub description: String,
    pub channel_id: Option<i64>,
    pub level_id: Option<i64>,
}

#[utoipa::path(post, path = "/api/courses", request_body = CourseRequest,
    responses((status = 201, description = "Course created"),
              (status = 400, description = "Name already taken")))]
pub async fn create_course(
    State(state): State<AppState>,
    session: SessionUser,
    Json(req): Json<CourseRequest>,
) -> ApiResult<impl IntoResponse> {
    let org_id = session.require_admin()?.id;
    let id = catalog::create_course(
        &state.db,
        org_id,
        session.user_id,
        &req.course_name,
        &req.description,
        req.channel_id,
        req.level_id,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(json!({ "id": id }))))
}

#[utoipa::path(get, path = "/api/courses",
    responses((status = 200, description = "Courses authored by the caller"),
              (status = 403, description = "Admin access required")))]
pub async fn list_courses(
    State(state): State<AppState>,
    session: SessionUser,
) -> ApiResult<impl IntoResponse> {
    let org_id = session.require_admin()?.id;
    let courses = catalog::list_courses(&state.db, org_id, session.user_id).await?;
    Ok(Json(courses))
}

#[utoipa::path(get, path = "/api/courses/{id}",
    responses((status = 200, description = "Course detail"),
              (status = 404, description = "Course not found")))]
pub async fn get_course(
    State(state): State<AppState>,
    session: SessionUser,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    session.org()?;
    let course = catalog::get_course(&state.db, id).await?;
    Ok(Json(course))
}

#[utoipa::path(put, path = "/api/courses/{id}", request_body = CourseRequest,
    responses((status = 200, description = "Course updated"),
              (status = 404, description = "Course not found")))]
pub async fn update_course(
    State(state): State<AppState>,
    session: SessionUser,
    Path(id): Path<i64>,
    Json(req): Json<CourseRequest>,
) -> ApiResult<impl IntoResponse> {
    let org_id = session.require_admin()?.id;
    catalog::update_course(
        &state.db,
        org_id,
        session.user_id,
        id,
        &req.course_name,
        &req.description,
        req.channel_id,
        req.level_id,
    )
    .await?;
    Ok(Json(json!({ "message": "Course updated successfully" })))
}

#[utoipa::path(delete, path = "/api/courses/{id}",
    responses((status = 200, description = "Course deleted"),
              (status = 404, description = "Course not found")))]
pub async fn delete_course(
    State(state): State<AppState>,
    session: SessionUser,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let org_id = session.require_admin()?.id;
    catalog::delete_course(&state.db, org_id, session.user_id, id).await?;
    Ok(Json(json!({ "message": "Course deleted successfully" })))
}

#[derive(Deserialize, ToSchema)]
pub struct ModuleRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Typed content; absent on update means metadata-only edit.
    pub content: Option<ModuleContent>,
    #[serde(default)]
    pub skill_ids: Vec<i64>,
    #[serde(default)]
    pub tag_ids: Vec<i64>,
}

#[utoipa::path(post, path = "/api/courses/{id}/modules", request_body = ModuleRequest,
    responses((status = 201, description = "Module created"),
              (status = 404, description = "Course not found")))]
pub async fn create_module(
    State(state): State<AppState>,
    session: SessionUser,
    Path(course_id): Path<i64>,
    Json(req): Json<ModuleRequest>,
) -> ApiResult<impl IntoResponse> {
    session.require_admin()?;
    let Some(content) = &req.content else {
        return Err(ApiError::validation("module content is required"));
    };
    let id = catalog::create_module(
        &state.db,
        course_id,
        &req.title,
        &req.description,
        content,
        &req.skill_ids,
        &req.tag_ids,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(json!({ "id": id }))))
}

#[utoipa::path(get, path = "/api/courses/{id}/modules",
    responses((status = 200, description = "Modules of a course, in position order")))]
pub async fn list_modules(
    State(state): State<AppState>,
    session: SessionUser,
    Path(course_id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    session.org()?;
    Ok(Json(catalog::list_modules(&state.db, course_id).await?))
}

#[utoipa::path(get, path = "/api/courses/{course_id}/modules/{module_id}",
    responses((status = 200, description = "Module with quiz content when applicable"),
              (status = 404, description = "Module not found")))]
pub async fn get_module(
    State(state): State<AppState>,
    session: SessionUser,
    Path((_course_id, module_id)): Path<(i64, i64)>,
) -> ApiResult<impl IntoResponse> {
    session.org()?;
    Ok(Json(catalog::get_module(&state.db, module_id).await?))
}

#[utoipa::path(put, path = "/api/courses/{course_id}/modules/{module_id}",
    request_body = ModuleRequest,
    responses((status = 200, description = "Module updated, progress reset on content change"),
              (status = 404, description = "Module not found")))]
pub async fn update_module(
    State(state): State<AppState>,
    session: SessionUser,
    Path((_course_id, module_id)): Path<(i64, i64)>,
    Json(req): Json<ModuleRequest>,
) -> ApiResult<impl IntoResponse> {
    session.require_admin()?;
    catalog::update_module(
        &state.db,
        module_id,
        &req.title,
        &req.description,
        req.content.as_ref(),
        &req.skill_ids,
        &req.tag_ids,
    )
    .await?;
    Ok(Json(json!({ "message": "Module updated successfully" })))
}

#[utoipa::path(delete, path = "/api/courses/{course_id}/modules/{module_id}",
    responses((status = 200, description = "Module deleted"),
              (status = 404, description = "Module not found")))]
pub async fn delete_module(
    State(state): State<AppState>,
    session: SessionUser,
    Path((_course_id, module_id)): Path<(i64, i64)>,
) -> ApiResult<impl IntoResponse> {
    session.require_admin()?;
    catalog::delete_module(&state.db, module_id).await?;
    Ok(Json(json!({ "message": "Module deleted successfully" })))
}

/// Store an uploaded module attachment under the configured upload
/// directory and hand back the path to use as file_url.
#[utoipa::path(post, path = "/api/courses/upload",
    responses((status = 201, description = "File stored"),
              (status = 400, description = "No file field in the form")))]
pub async fn upload_file(
    State(state): State<AppState>,
    session: SessionUser,
    mut multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    session.require_admin()?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::validation(format!("invalid multipart payload: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let original = field.file_name().unwrap_or("upload").to_string();
        let safe: String = original
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        let stored = format!("{}_{safe}", now().unix_timestamp());
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::validation(format!("invalid multipart payload: {e}")))?;

        tokio::fs::create_dir_all(&state.upload_dir)
            .await
            .map_err(|e| anyhow::anyhow!("creating upload dir: {e}"))?;
        let path = state.upload_dir.join(&stored);
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|e| anyhow::anyhow!("writing upload: {e}"))?;

        return Ok((
            StatusCode::CREATED,
            Json(json!({ "fileUrl": format!("/uploads/{stored}") })),
        ));
    }

    Err(ApiError::validation("file field is required"))
}

#[utoipa::path(post, path = "/api/courses/{id}/enroll",
    responses((status = 201, description = "Enrolled, statuses seeded"),
              (status = 400, description = "Already enrolled")))]
pub async fn enroll(
    State(state): State<AppState>,
    session: SessionUser,
    Path(course_id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    session.org()?;
    let id = enrollment::enroll(&state.db, session.user_id, course_id).await?;
    Ok((StatusCode::CREATED, Json(json!({ "enrollmentId": id }))))
}

#[utoipa::path(post, path = "/api/courses/{id}/unenroll",
    responses((status = 200, description = "Enrollment and progress removed"),
              (status = 404, description = "Enrollment not found")))]
pub async fn unenroll(
    State(state): State<AppState>,
    session: SessionUser,
    Path(course_id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    session.org()?;
    enrollment::unenroll(&state.db, session.user_id, course_id).await?;
    Ok(Json(json!({ "message": "Unenrolled successfully" })))
}

#[utoipa::path(get, path = "/api/courses/{id}/progress",
    responses((status = 200, description = "Per-module status for the caller"),
              (status = 404, description = "Enrollment not found")))]
pub async fn progress(
    State(state): State<AppState>,
    session: SessionUser,
    Path(course_id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    session.org()?;
    let progress = enrollment::course_progress(&state.db, session.user_id, course_id).await?;
    Ok(Json(progress))
}

#[utoipa::path(post, path = "/api/courses/{id}/complete",
    responses((status = 200, description = "Course completed"),
              (status = 400, description = "Not all modules completed")))]
pub async fn complete_course(
    State(state): State<AppState>,
    session: SessionUser,
    Path(course_id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    session.org()?;
    enrollment::complete_course(&state.db, session.user_id, course_id).await?;
    Ok(Json(json!({ "message": "Course completed successfully" })))
}

#[utoipa::path(post, path = "/api/courses/{id}/uncomplete",
    responses((status = 200, description = "Course reopened"),
              (status = 404, description = "Enrollment not found")))]
pub async fn uncomplete_course(
    State(state): State<AppState>,
    session: SessionUser,
    Path(course_id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    session.org()?;
    enrollment::uncomplete_course(&state.db, session.user_id, course_id).await?;
    Ok(Json(json!({ "message": "Course marked as incomplete" })))
}

#[utoipa::path(post, path = "/api/courses/{course_id}/modules/{module_id}/start",
    responses((status = 200, description = "Module in progress"),
              (status = 404, description = "Enrollment not found")))]
pub async fn start_module(
    State(state): State<AppState>,
    session: SessionUser,
    Path((_course_id, module_id)): Path<(i64, i64)>,
) -> ApiResult<impl IntoResponse> {
    session.org()?;
    enrollment::start_module(&state.db, session.user_id, module_id).await?;
    Ok(Json(json!({ "message": "Module started" })))
}

#[utoipa::path(post, path = "/api/courses/{course_id}/modules/{module_id}/complete",
    responses((status = 200, description = "Module completed"),
              (status = 400, description = "Module must be in_progress before completing")))]
pub async fn complete_module(
    State(state): State<AppState>,
    session: SessionUser,
    Path((_course_id, module_id)): Path<(i64, i64)>,
) -> ApiResult<impl IntoResponse> {
    session.org()?;
    enrollment::complete_module(&state.db, session.user_id, module_id).await?;
    Ok(Json(json!({ "message": "Module completed" })))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_courses).post(create_course))
        .route("/upload", post(upload_file))
        .route(
            "/{id}",
            get(get_course).put(update_course).delete(delete_course),
        )
        .route("/{id}/modules", get(list_modules).post(create_module))
        .route(
            "/{course_id}/modules/{module_id}",
            get(get_module).put(update_module).delete(delete_module),
        )
        .route("/{course_id}/modules/{module_id}/start", post(start_module))
        .route(
            "/{course_id}/modules/{module_id}/complete",
            post(complete_module),
        )
        .route("/{id}/enroll", post(enroll))
        .route("/{id}/unenroll", post(unenroll))
        .route("/{id}/progress", get(progress))
        .route("/{id}/complete", post(complete_course))
        .route("/{id}/uncomplete", post(uncomplete_course))
}
