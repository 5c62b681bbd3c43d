//! Read-only rollups: per-learner progress, the admin overview, and the
//! two dashboards. Quiz accuracy always comes from the latest response
//! per quiz; earlier attempts are ignored.

use serde::Serialize;
use sqlx::SqlitePool;
use time::OffsetDateTime;
use utoipa::ToSchema;

use crate::error::ApiResult;

const STRENGTH_THRESHOLD_PCT: f64 = 80.0;

#[derive(Debug, Serialize, sqlx::FromRow, ToSchema)]
pub struct CompletedCourse {
    pub id: i64,
    pub name: String,
    #[serde(with = "time::serde::rfc3339::option")]
    pub completed_at: Option<OffsetDateTime>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct QuizResult {
    pub quiz_id: i64,
    pub title: String,
    pub correct: i64,
    pub total: i64,
    pub score_pct: f64,
    #[serde(with = "time::serde::rfc3339")]
    pub taken_at: OffsetDateTime,
}

/// Accuracy bucket for one taxonomy entry (a tag or a skill), aggregated
/// over every answered option whose module carries that entry.
#[derive(Debug, Serialize, ToSchema)]
pub struct TopicAccuracy {
    pub name: String,
    pub dimension: String,
    pub correct: i64,
    pub total: i64,
    pub pct: f64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProgressReport {
    pub courses_done: Vec<CompletedCourse>,
    pub modules_done: i64,
    pub quiz_results: Vec<QuizResult>,
    pub strengths: Vec<TopicAccuracy>,
    pub weaknesses: Vec<TopicAccuracy>,
}

fn pct(correct: i64, total: i64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (correct as f64 * 1000.0 / total as f64).round() / 10.0
}

/// Subquery selecting the newest response id per quiz for one user.
const LATEST_RESPONSES: &str =
    "SELECT MAX(id) FROM quiz_responses WHERE user_id = ?1 GROUP BY quiz_id";

pub async fn progress(db: &SqlitePool, user_id: i64) -> ApiResult<ProgressReport> {
    let courses_done: Vec<CompletedCourse> = sqlx::query_as(
        r#"
        SELECT c.id, c.name, e.completed_at
        FROM enrollments e
        JOIN courses c ON c.id = e.course_id
        WHERE e.user_id = ?1 AND e.status = 'completed'
        "#,
    )
    .bind(user_id)
    .fetch_all(db)
    .await?;

    let modules_done: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*)
        FROM module_status ms
        JOIN enrollments e ON e.id = ms.enrollment_id
        WHERE e.user_id = ?1 AND ms.status = 'completed'
        "#,
    )
    .bind(user_id)
    .fetch_one(db)
    .await?;

    let quiz_rows: Vec<(i64, String, i64, i64, OffsetDateTime)> = sqlx::query_as(&format!(
        r#"
        SELECT qr.quiz_id, qz.title,
               COALESCE(SUM(CASE WHEN qo.is_correct THEN 1 ELSE 0 END), 0) AS correct,
               COUNT(*) AS total,
               qr.submitted_at
        FROM quiz_responses qr
        JOIN quiz_answers qa ON qa.response_id = qr.id
        JOIN question_options qo ON qo.id = qa.selected_option_id
        JOIN quizzes qz ON qz.id = qr.quiz_id
        WHERE qr.id IN ({LATEST_RESPONSES})
        GROUP BY qr.quiz_id, qz.title, qr.submitted_at
        "#
    ))
    .bind(user_id)
    .fetch_all(db)
    .await?;
    let quiz_results = quiz_rows
        .into_iter()
        .map(|(quiz_id, title, correct, total, taken_at)| QuizResult {
            quiz_id,
            title,
            correct,
            total,
            score_pct: pct(correct, total),
            taken_at,
        })
        .collect();

    let mut topics = topic_accuracy(db, user_id, "module_tags", "tag_id", "tags", "tag").await?;
    topics
        .extend(topic_accuracy(db, user_id, "module_skills", "skill_id", "skills", "skill").await?);

    let (strengths, weaknesses) = topics
        .into_iter()
        .partition(|t| t.pct >= STRENGTH_THRESHOLD_PCT);

    Ok(ProgressReport {
        courses_done,
        modules_done,
        quiz_results,
        strengths,
        weaknesses,
    })
}

/// Per-tag or per-skill accuracy over the latest responses, attributing
/// each answered option to every entry the backing module carries.
async fn topic_accuracy(
    db: &SqlitePool,
    user_id: i64,
    link_table: &str,
    link_column: &str,
    name_table: &str,
    dimension: &str,
) -> ApiResult<Vec<TopicAccuracy>> {
    let sql = format!(
        r#"
        SELECT n.name,
               COALESCE(SUM(CASE WHEN qo.is_correct THEN 1 ELSE 0 END), 0) AS correct,
               COUNT(*) AS total
        FROM quiz_responses qr
        JOIN quiz_answers qa ON qa.response_id = qr.id
        JOIN question_options qo ON qo.id = qa.selected_option_id
        JOIN quizzes qz ON qz.id = qr.quiz_id
        JOIN revisions r ON r.id = qz.revision_id
        JOIN {link_table} link ON link.module_id = r.module_id
        JOIN {name_table} n ON n.id = link.{link_column}
        WHERE qr.id IN ({LATEST_RESPONSES})
        GROUP BY n.name
        "#
    );
    let rows: Vec<(String, i64, i64)> = sqlx::query_as(&sql).bind(user_id).fetch_all(db).await?;
    Ok(rows
        .into_iter()
        .map(|(name, correct, total)| TopicAccuracy {
            name,
            dimension: dimension.to_string(),
            correct,
            total,
            pct: pct(correct, total),
        })
        .collect())
}

#[derive(Debug, Serialize, sqlx::FromRow, ToSchema)]
pub struct CourseRollup {
    pub id: i64,
    pub name: String,
    pub total_enrolled: i64,
    pub total_completed: i64,
    pub videos: i64,
    pub quizzes: i64,
    pub pdfs: i64,
    pub slides: i64,
    pub others: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct EmployeeReport {
    pub id: i64,
    pub firstname: String,
    pub lastname: String,
    #[serde(flatten)]
    pub progress: ProgressReport,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Overview {
    pub courses: Vec<CourseRollup>,
    pub employee_total: i64,
    pub employees: Vec<EmployeeReport>,
}

pub async fn overview(db: &SqlitePool, organisation_id: i64) -> ApiResult<Overview> {
    let courses: Vec<CourseRollup> = sqlx::query_as(
        r#"
        SELECT c.id, c.name,
            (SELECT COUNT(*) FROM enrollments e WHERE e.course_id = c.id) AS total_enrolled,
            (SELECT COUNT(*) FROM enrollments e
              WHERE e.course_id = c.id AND e.status = 'completed') AS total_completed,
            (SELECT COUNT(*) FROM modules m
              WHERE m.course_id = c.id AND m.module_type = 'video') AS videos,
            (SELECT COUNT(*) FROM modules m
              WHERE m.course_id = c.id AND m.module_type = 'quiz') AS quizzes,
            (SELECT COUNT(*) FROM modules m
              WHERE m.course_id = c.id AND m.module_type = 'pdf') AS pdfs,
            (SELECT COUNT(*) FROM modules m
              WHERE m.course_id = c.id AND m.module_type = 'slide') AS slides,
            (SELECT COUNT(*) FROM modules m
              WHERE m.course_id = c.id
                AND m.module_type NOT IN ('video', 'quiz', 'pdf', 'slide')) AS others
        FROM courses c
        WHERE c.organisation_id = ?
        ORDER BY c.name
        "#,
    )
    .bind(organisation_id)
    .fetch_all(db)
    .await?;

    let employee_rows: Vec<(i64, String, String)> = sqlx::query_as(
        r#"
        SELECT u.id, u.firstname, u.lastname
        FROM users u
        JOIN organisation_users ou ON ou.user_id = u.id
        WHERE ou.organisation_id = ? AND ou.role != 'admin'
        ORDER BY u.lastname, u.firstname
        "#,
    )
    .bind(organisation_id)
    .fetch_all(db)
    .await?;

    let mut employees = Vec::with_capacity(employee_rows.len());
    for (id, firstname, lastname) in employee_rows {
        employees.push(EmployeeReport {
            id,
            firstname,
            lastname,
            progress: progress(db, id).await?,
        });
    }

    Ok(Overview {
        employee_total: employees.len() as i64,
        courses,
        employees,
    })
}

#[derive(Debug, Serialize, sqlx::FromRow, ToSchema)]
pub struct ProgressCounts {
    pub completed: i64,
    pub total: i64,
}

#[derive(Debug, Serialize, sqlx::FromRow, ToSchema)]
pub struct CourseRef {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Serialize, sqlx::FromRow, ToSchema)]
pub struct ModuleRef {
    pub id: i64,
    pub title: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserDashboard {
    pub welcome: String,
    pub current_course: Option<CourseRef>,
    pub current_module: Option<ModuleRef>,
    pub roadmap_progress: ProgressCounts,
    pub course_progress: ProgressCounts,
}

pub async fn user_dashboard(
    db: &SqlitePool,
    user_id: i64,
    firstname: &str,
) -> ApiResult<UserDashboard> {
    let current_course: Option<CourseRef> = sqlx::query_as(
        r#"
        SELECT c.id, c.name
        FROM enrollments e
        JOIN courses c ON c.id = e.course_id
        WHERE e.user_id = ? AND e.status = 'enrolled'
        ORDER BY e.started_at DESC
        LIMIT 1
        "#,
    )
    .bind(user_id)
    .fetch_optional(db)
    .await?;

    let mut current_module = None;
    let mut course_progress = ProgressCounts {
        completed: 0,
        total: 0,
    };
    if let Some(course) = &current_course {
        current_module = sqlx::query_as(
            r#"
            SELECT m.id, m.title
            FROM module_status ms
            JOIN modules m ON m.id = ms.module_id
            JOIN enrollments e ON e.id = ms.enrollment_id
            WHERE e.user_id = ?1 AND e.course_id = ?2 AND ms.status = 'in_progress'
            ORDER BY ms.started_at DESC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .bind(course.id)
        .fetch_optional(db)
        .await?;

        course_progress = sqlx::query_as(
            r#"
            SELECT COALESCE(SUM(CASE WHEN ms.status = 'completed' THEN 1 ELSE 0 END), 0)
                       AS completed,
                   COUNT(m.id) AS total
            FROM modules m
            LEFT JOIN enrollments e ON e.course_id = m.course_id AND e.user_id = ?1
            LEFT JOIN module_status ms ON ms.module_id = m.id AND ms.enrollment_id = e.id
            WHERE m.course_id = ?2
            "#,
        )
        .bind(user_id)
        .bind(course.id)
        .fetch_one(db)
        .await?;
    }

    let latest_roadmap: Option<i64> =
        sqlx::query_scalar("SELECT id FROM roadmaps WHERE user_id = ? ORDER BY id DESC LIMIT 1")
            .bind(user_id)
            .fetch_optional(db)
            .await?;
    let roadmap_progress = match latest_roadmap {
        Some(roadmap_id) => {
            sqlx::query_as(
                r#"
                SELECT COALESCE(SUM(CASE WHEN ms.status = 'completed' THEN 1 ELSE 0 END), 0)
                           AS completed,
                       COUNT(ri.module_id) AS total
                FROM roadmap_items ri
                LEFT JOIN modules m ON m.id = ri.module_id
                LEFT JOIN enrollments e ON e.course_id = m.course_id AND e.user_id = ?1
                LEFT JOIN module_status ms
                       ON ms.module_id = ri.module_id AND ms.enrollment_id = e.id
                WHERE ri.roadmap_id = ?2
                "#,
            )
            .bind(user_id)
            .bind(roadmap_id)
            .fetch_one(db)
            .await?
        }
        None => ProgressCounts {
            completed: 0,
            total: 0,
        },
    };

    Ok(UserDashboard {
        welcome: format!("Welcome, {firstname}!"),
        current_course,
        current_module,
        roadmap_progress,
        course_progress,
    })
}

#[derive(Debug, Serialize, sqlx::FromRow, ToSchema)]
pub struct EmployeeCounts {
    pub id: i64,
    pub firstname: String,
    pub lastname: String,
    pub total_courses: i64,
    pub completed_courses: i64,
}

#[derive(Debug, Serialize, sqlx::FromRow, ToSchema)]
pub struct CourseEnrollmentCount {
    pub course_name: String,
    pub enrolled_count: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AdminDashboard {
    pub welcome: String,
    pub employees: Vec<EmployeeCounts>,
    pub enrollments: Vec<CourseEnrollmentCount>,
}

pub async fn admin_dashboard(
    db: &SqlitePool,
    organisation_id: i64,
    firstname: &str,
) -> ApiResult<AdminDashboard> {
    let employees: Vec<EmployeeCounts> = sqlx::query_as(
        r#"
        SELECT u.id, u.firstname, u.lastname,
            (SELECT COUNT(*) FROM enrollments e WHERE e.user_id = u.id) AS total_courses,
            (SELECT COUNT(*) FROM enrollments e
              WHERE e.user_id = u.id AND e.status = 'completed') AS completed_courses
        FROM users u
        JOIN organisation_users ou ON ou.user_id = u.id
        WHERE ou.organisation_id = ? AND ou.role = 'employee'
        ORDER BY u.lastname, u.firstname
        "#,
    )
    .bind(organisation_id)
    .fetch_all(db)
    .await?;

    let enrollments: Vec<CourseEnrollmentCount> = sqlx::query_as(
        r#"
        SELECT c.name AS course_name, COUNT(e.id) AS enrolled_count
        FROM courses c
        LEFT JOIN enrollments e ON e.course_id = c.id
        WHERE c.organisation_id = ?
        GROUP BY c.id, c.name
        ORDER BY enrolled_count DESC
        "#,
    )
    .bind(organisation_id)
    .fetch_all(db)
    .await?;

    Ok(AdminDashboard {
        welcome: format!("Welcome, Admin {firstname}!"),
        employees,
        enrollments,
    })
}
