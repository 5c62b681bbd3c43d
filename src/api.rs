pub mod activity;
pub mod auth;
pub mod badges;
pub mod chatbot;
pub mod courses;
pub mod dashboard;
pub mod materials;
pub mod onboarding;
pub mod orgs;
pub mod quizzes;
pub mod reports;
pub mod roadmaps;
pub mod taxonomy;
pub mod users;

use std::path::PathBuf;

use axum::{Router, http::HeaderValue};
use sqlx::SqlitePool;
use tower_cookies::CookieManagerLayer;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;

use crate::chatbot::AiClient;

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub ai: Option<AiClient>,
    pub upload_dir: PathBuf,
}

pub fn build_router(state: AppState, cors_origin: &str) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::exact(
            cors_origin.parse::<HeaderValue>().expect("valid CORS origin"),
        ))
        .allow_credentials(true)
        .allow_headers([axum::http::header::CONTENT_TYPE])
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::PUT,
            axum::http::Method::DELETE,
        ]);

    Router::new()
        .nest(
            "/api",
            Router::new()
                .merge(auth::routes())
                .nest("/orgs", orgs::routes())
                .nest("/users", users::routes())
                .nest("/taxonomy", taxonomy::routes())
                .nest("/courses", courses::routes())
                .nest("/quizzes", quizzes::routes())
                .nest("/materials", materials::routes())
                .nest("/onboarding", onboarding::routes())
                .nest("/roadmaps", roadmaps::routes())
                .nest("/reports", reports::routes())
                .nest("/dashboard", dashboard::routes())
                .nest("/badges", badges::routes())
                .nest("/activity", activity::routes())
                .nest("/chatbot", chatbot::routes()),
        )
        .layer(CookieManagerLayer::new())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(OpenApi)]
#[openapi(paths(
    auth::signup,
    auth::login,
    auth::logout,
    auth::me,
    orgs::create_org,
    orgs::my_org,
    orgs::update_settings,
    users::list_users,
    users::add_user,
    users::delete_user,
    users::update_profile,
    users::change_password,
    users::skills,
    users::add_skill,
    users::update_skill,
    users::remove_skill,
    users::preferences,
    users::set_preferences,
    taxonomy::list_skills,
    taxonomy::create_skill,
    taxonomy::delete_skill,
    taxonomy::list_channels,
    taxonomy::create_channel,
    taxonomy::delete_channel,
    taxonomy::list_levels,
    taxonomy::create_level,
    taxonomy::delete_level,
    taxonomy::list_tags,
    taxonomy::create_tag,
    taxonomy::delete_tag,
    courses::create_course,
    courses::list_courses,
    courses::get_course,
    courses::update_course,
    courses::delete_course,
    courses::create_module,
    courses::list_modules,
    courses::get_module,
    courses::update_module,
    courses::delete_module,
    courses::upload_file,
    courses::enroll,
    courses::unenroll,
    courses::progress,
    courses::complete_course,
    courses::uncomplete_course,
    courses::start_module,
    courses::complete_module,
    quizzes::submit,
    quizzes::grade,
    quizzes::latest,
    materials::list,
    materials::by_user_tags,
    onboarding::list_questions,
    onboarding::create_question,
    onboarding::delete_question,
    onboarding::create_option,
    onboarding::submit_responses,
    onboarding::list_responses,
    roadmaps::list,
    roadmaps::create,
    roadmaps::rename,
    roadmaps::delete,
    roadmaps::list_items,
    roadmaps::add_item,
    roadmaps::move_item,
    roadmaps::remove_item,
    roadmaps::generate,
    reports::progress,
    reports::overview,
    dashboard::user_dashboard,
    dashboard::admin_dashboard,
    badges::create_frequent,
    badges::create_course_badge,
    badges::created_badges,
    badges::user_badges,
    badges::delete_badge,
    activity::list,
    chatbot::ask,
    chatbot::logs,
    chatbot::history,
))]
pub struct ApiDoc;
