//! Integration tests driving the full router through `oneshot`.
//!
//! Covers the cookie session flow (signup/login/me, 401 on missing or
//! garbage cookies), role gating, and the end-to-end learner path:
//! enroll -> start -> quiz submit -> module completed -> course completed.

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
    response::Response,
};
use serde_json::{Value, json};
use tower::util::ServiceExt;

use skillbase::{
    api::{AppState, build_router},
    db::connect_memory,
};

async fn setup_app() -> (Router, tempfile::TempDir) {
    let db = connect_memory().await.unwrap();
    let uploads = tempfile::tempdir().unwrap();
    let state = AppState {
        db,
        ai: None,
        upload_dir: uploads.path().to_path_buf(),
    };
    (build_router(state, "http://localhost:3000"), uploads)
}

fn request(method: &str, uri: &str, cookie: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body reads");
    serde_json::from_slice(&bytes).expect("body is JSON")
}

/// The `auth=...` pair from the Set-Cookie header, usable as a Cookie value.
fn auth_cookie(response: &Response) -> String {
    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .expect("set-cookie header")
        .to_str()
        .unwrap();
    set_cookie.split(';').next().unwrap().to_string()
}

async fn send(app: &Router, req: Request<Body>) -> Response {
    app.clone().oneshot(req).await.unwrap()
}

async fn signup(app: &Router, email: &str, firstname: &str) -> String {
    let response = send(
        app,
        request(
            "POST",
            "/api/signup",
            None,
            Some(json!({
                "email": email,
                "password": "secret-password",
                "firstname": firstname,
                "lastname": "Tester",
            })),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    auth_cookie(&response)
}

async fn login(app: &Router, email: &str) -> String {
    let response = send(
        app,
        request(
            "POST",
            "/api/login",
            None,
            Some(json!({ "email": email, "password": "secret-password" })),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    auth_cookie(&response)
}

/// Admin signup plus org creation; returns the reissued admin cookie.
async fn setup_admin(app: &Router) -> String {
    let cookie = signup(app, "admin@example.com", "Ada").await;
    let response = send(
        app,
        request(
            "POST",
            "/api/orgs",
            Some(&cookie),
            Some(json!({ "organisationName": "Acme" })),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    auth_cookie(&response)
}

/// Employee signup, admin adds them to the org, fresh login for the
/// membership-bearing cookie.
async fn setup_employee(app: &Router, admin_cookie: &str, email: &str) -> String {
    signup(app, email, "Amy").await;
    let response = send(
        app,
        request(
            "POST",
            "/api/users",
            Some(admin_cookie),
            Some(json!({ "email": email })),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    login(app, email).await
}

async fn create_course(app: &Router, admin_cookie: &str, name: &str) -> i64 {
    let response = send(
        app,
        request(
            "POST",
            "/api/courses",
            Some(admin_cookie),
            Some(json!({ "courseName": name, "description": "" })),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    json_body(response).await["id"].as_i64().unwrap()
}

async fn create_module(app: &Router, admin_cookie: &str, course_id: i64, body: Value) -> i64 {
    let response = send(
        app,
        request(
            "POST",
            &format!("/api/courses/{course_id}/modules"),
            Some(admin_cookie),
            Some(body),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    json_body(response).await["id"].as_i64().unwrap()
}

#[tokio::test]
async fn protected_routes_reject_missing_or_garbage_cookies() {
    let (app, _uploads) = setup_app().await;

    let response = send(&app, request("GET", "/api/reports/progress", None, None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = send(
        &app,
        request("GET", "/api/reports/progress", Some("auth=not-json"), None),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn signup_me_logout_flow() {
    let (app, _uploads) = setup_app().await;
    let cookie = signup(&app, "amy@example.com", "Amy").await;

    let response = send(&app, request("GET", "/api/me", Some(&cookie), None)).await;
    let body = json_body(response).await;
    assert_eq!(body["email"], "amy@example.com");
    assert_eq!(body["isLoggedIn"], true);
    assert!(body["organisation"].is_null());

    // without a cookie the snapshot degrades to logged-out
    let response = send(&app, request("GET", "/api/me", None, None)).await;
    let body = json_body(response).await;
    assert_eq!(body["isLoggedIn"], false);

    // logout clears the cookie
    let response = send(&app, request("POST", "/api/logout", Some(&cookie), None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(auth_cookie(&response), "auth=");
}

#[tokio::test]
async fn org_creation_reissues_admin_cookie() {
    let (app, _uploads) = setup_app().await;
    let admin_cookie = setup_admin(&app).await;

    let response = send(&app, request("GET", "/api/me", Some(&admin_cookie), None)).await;
    let body = json_body(response).await;
    assert_eq!(body["organisation"]["role"], "admin");

    let response = send(&app, request("GET", "/api/orgs/my", Some(&admin_cookie), None)).await;
    let body = json_body(response).await;
    assert_eq!(body["organisation"]["name"], "Acme");
}

#[tokio::test]
async fn admin_routes_reject_employees_and_orgless_users() {
    let (app, _uploads) = setup_app().await;
    let admin_cookie = setup_admin(&app).await;

    // no organisation at all
    let orgless = signup(&app, "drifter@example.com", "Dee").await;
    let response = send(
        &app,
        request(
            "POST",
            "/api/courses",
            Some(&orgless),
            Some(json!({ "courseName": "X" })),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // employee role in the org
    let employee = setup_employee(&app, &admin_cookie, "amy@example.com").await;
    let response = send(
        &app,
        request(
            "POST",
            "/api/courses",
            Some(&employee),
            Some(json!({ "courseName": "X" })),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let response = send(&app, request("GET", "/api/users", Some(&employee), None)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn quiz_course_end_to_end() {
    let (app, _uploads) = setup_app().await;
    let admin_cookie = setup_admin(&app).await;
    let course = create_course(&app, &admin_cookie, "Rust 101").await;
    let module = create_module(
        &app,
        &admin_cookie,
        course,
        json!({
            "title": "Checkpoint",
            "content": {
                "module_type": "quiz",
                "quiz": {
                    "title": "Checkpoint",
                    "questions": [
                        {
                            "question_text": "Pick both borrow kinds",
                            "options": [
                                { "option_text": "shared", "is_correct": true },
                                { "option_text": "mutable", "is_correct": true },
                                { "option_text": "garbage-collected" },
                            ],
                        },
                        {
                            "question_text": "How are errors propagated?",
                            "options": [
                                { "option_text": "the ? operator", "is_correct": true },
                                { "option_text": "unchecked exceptions" },
                            ],
                        },
                    ],
                },
            },
        }),
    )
    .await;

    let employee = setup_employee(&app, &admin_cookie, "amy@example.com").await;

    let response = send(
        &app,
        request(
            "POST",
            &format!("/api/courses/{course}/enroll"),
            Some(&employee),
            None,
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = send(
        &app,
        request(
            "GET",
            &format!("/api/courses/{course}/progress"),
            Some(&employee),
            None,
        ),
    )
    .await;
    let body = json_body(response).await;
    assert_eq!(body["enrollment_status"], "enrolled");
    assert_eq!(body["modules"][0]["status"], "not_started");

    // completing before starting is rejected and leaves the status alone
    let response = send(
        &app,
        request(
            "POST",
            &format!("/api/courses/{course}/modules/{module}/complete"),
            Some(&employee),
            None,
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert!(body["message"].as_str().unwrap().contains("in_progress"));

    let response = send(
        &app,
        request(
            "POST",
            &format!("/api/courses/{course}/modules/{module}/start"),
            Some(&employee),
            None,
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    // read the quiz back to learn question/option ids
    let response = send(
        &app,
        request(
            "GET",
            &format!("/api/courses/{course}/modules/{module}"),
            Some(&employee),
            None,
        ),
    )
    .await;
    let detail = json_body(response).await;
    let quiz_id = detail["quiz"]["id"].as_i64().unwrap();
    let answers: Vec<Value> = detail["quiz"]["questions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|question| {
            let correct: Vec<i64> = question["options"]
                .as_array()
                .unwrap()
                .iter()
                .filter(|option| option["is_correct"] == true)
                .map(|option| option["id"].as_i64().unwrap())
                .collect();
            json!({
                "questionId": question["id"],
                "selectedOptionIds": correct,
            })
        })
        .collect();

    let response = send(
        &app,
        request(
            "POST",
            &format!("/api/quizzes/{quiz_id}/submit"),
            Some(&employee),
            Some(json!({ "answers": answers })),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    // submission forces the module to completed
    let response = send(
        &app,
        request(
            "GET",
            &format!("/api/courses/{course}/progress"),
            Some(&employee),
            None,
        ),
    )
    .await;
    let body = json_body(response).await;
    assert_eq!(body["modules"][0]["status"], "completed");

    let response = send(
        &app,
        request(
            "GET",
            &format!("/api/quizzes/{quiz_id}/latest"),
            Some(&employee),
            None,
        ),
    )
    .await;
    let graded = json_body(response).await;
    assert_eq!(graded["correct_questions"], 2);
    assert!(
        graded["questions"]
            .as_array()
            .unwrap()
            .iter()
            .all(|question| question["is_correct"] == true)
    );

    let response = send(
        &app,
        request(
            "POST",
            &format!("/api/courses/{course}/complete"),
            Some(&employee),
            None,
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let response = send(
        &app,
        request(
            "GET",
            &format!("/api/courses/{course}/progress"),
            Some(&employee),
            None,
        ),
    )
    .await;
    let body = json_body(response).await;
    assert_eq!(body["enrollment_status"], "completed");
}

#[tokio::test]
async fn roadmap_generation_caps_and_guards_duplicates() {
    let (app, _uploads) = setup_app().await;
    let admin_cookie = setup_admin(&app).await;
    let course = create_course(&app, &admin_cookie, "Rust 101").await;
    for i in 0..3 {
        create_module(
            &app,
            &admin_cookie,
            course,
            json!({
                "title": format!("Video {i}"),
                "content": {
                    "module_type": "video",
                    "file_url": format!("{i}.mp4"),
                },
            }),
        )
        .await;
    }

    let employee = setup_employee(&app, &admin_cookie, "amy@example.com").await;

    let response = send(
        &app,
        request(
            "POST",
            "/api/roadmaps/generate",
            Some(&employee),
            Some(json!({ "name": "My path" })),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = json_body(response).await;
    assert_eq!(body["modules_added"], 3);
    assert_eq!(body["enrolled_courses"], 1);
    let roadmap_id = body["roadmap"]["id"].as_i64().unwrap();

    let response = send(
        &app,
        request(
            "GET",
            &format!("/api/roadmaps/{roadmap_id}/items"),
            Some(&employee),
            None,
        ),
    )
    .await;
    let items = json_body(response).await;
    assert_eq!(items.as_array().unwrap().len(), 3);

    // identical module set: the whole generation aborts
    let response = send(
        &app,
        request(
            "POST",
            "/api/roadmaps/generate",
            Some(&employee),
            Some(json!({ "name": "Again" })),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn module_upload_stores_file() {
    let (app, uploads) = setup_app().await;
    let admin_cookie = setup_admin(&app).await;

    let boundary = "test-boundary";
    let body = format!(
        "--{boundary}\r\n\
         Content-Disposition: form-data; name=\"file\"; filename=\"notes.pdf\"\r\n\
         Content-Type: application/pdf\r\n\r\n\
         not a real pdf\r\n\
         --{boundary}--\r\n"
    );
    let req = Request::builder()
        .method("POST")
        .uri("/api/courses/upload")
        .header(header::COOKIE, &admin_cookie)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .unwrap();
    let response = send(&app, req).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = json_body(response).await;
    let file_url = body["fileUrl"].as_str().unwrap();
    let stored = file_url.strip_prefix("/uploads/").unwrap();
    assert!(stored.ends_with("notes.pdf"));
    assert!(uploads.path().join(stored).exists());
}
