//! Per-learner progress: the enrollment record and the per-module status
//! rows that move through not_started -> in_progress -> completed.

use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use time::OffsetDateTime;
use utoipa::ToSchema;

use crate::{
    error::{ApiError, ApiResult, is_unique_violation},
    utils::now,
};

/// Enroll a user: one Enrollment row plus a not_started status row per
/// existing module, all in one transaction.
pub async fn enroll(db: &SqlitePool, user_id: i64, course_id: i64) -> ApiResult<i64> {
    let mut tx = db.begin().await?;

    let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM courses WHERE id = ?")
        .bind(course_id)
        .fetch_optional(&mut *tx)
        .await?;
    if exists.is_none() {
        return Err(ApiError::NotFound("Course"));
    }

    let enrollment_id = sqlx::query(
        "INSERT INTO enrollments (user_id, course_id, status, started_at) VALUES (?, ?, 'enrolled', ?)",
    )
    .bind(user_id)
    .bind(course_id)
    .bind(now())
    .execute(&mut *tx)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            ApiError::validation("Already enrolled in this course")
        } else {
            e.into()
        }
    })?
    .last_insert_rowid();

    seed_module_statuses(&mut tx, enrollment_id, course_id).await?;

    tx.commit().await?;
    Ok(enrollment_id)
}

pub(crate) async fn seed_module_statuses(
    conn: &mut SqliteConnection,
    enrollment_id: i64,
    course_id: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO module_status (enrollment_id, module_id, status)
        SELECT ?, id, 'not_started' FROM modules WHERE course_id = ?
        ON CONFLICT (enrollment_id, module_id) DO NOTHING
        "#,
    )
    .bind(enrollment_id)
    .bind(course_id)
    .execute(conn)
    .await?;
    Ok(())
}

/// Idempotent course-granular enrollment, used by the roadmap flows: skip
/// courses the user is already in, seed status rows for the rest. Returns
/// how many enrollments were newly created.
pub(crate) async fn ensure_enrolled_in_courses(
    conn: &mut SqliteConnection,
    user_id: i64,
    course_ids: &[i64],
) -> Result<u64, sqlx::Error> {
    let mut newly_enrolled = 0;
    for &course_id in course_ids {
        let inserted = sqlx::query(
            r#"
            INSERT INTO enrollments (user_id, course_id, status, started_at)
            VALUES (?, ?, 'enrolled', ?)
            ON CONFLICT (user_id, course_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(course_id)
        .bind(now())
        .execute(&mut *conn)
        .await?
        .rows_affected();
        newly_enrolled += inserted;

        let enrollment_id: i64 =
            sqlx::query_scalar("SELECT id FROM enrollments WHERE user_id = ? AND course_id = ?")
                .bind(user_id)
                .bind(course_id)
                .fetch_one(&mut *conn)
                .await?;
        seed_module_statuses(&mut *conn, enrollment_id, course_id).await?;
    }
    Ok(newly_enrolled)
}

/// Drop the enrollment and everything recorded under it: status rows by
/// cascade, plus the user's quiz responses for quizzes under the course.
pub async fn unenroll(db: &SqlitePool, user_id: i64, course_id: i64) -> ApiResult<()> {
    let mut tx = db.begin().await?;

    let enrollment_id: Option<i64> =
        sqlx::query_scalar("SELECT id FROM enrollments WHERE user_id = ? AND course_id = ?")
            .bind(user_id)
            .bind(course_id)
            .fetch_optional(&mut *tx)
            .await?;
    let Some(enrollment_id) = enrollment_id else {
        return Err(ApiError::NotFound("Enrollment"));
    };

    sqlx::query(
        r#"
        DELETE FROM quiz_responses
        WHERE user_id = ? AND quiz_id IN (
            SELECT q.id FROM quizzes q
            JOIN revisions r ON r.id = q.revision_id
            JOIN modules m ON m.id = r.module_id
            WHERE m.course_id = ?
        )
        "#,
    )
    .bind(user_id)
    .bind(course_id)
    .execute(&mut *tx)
    .await?;

    sqlx::query("DELETE FROM enrollments WHERE id = ?")
        .bind(enrollment_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(())
}

async fn enrollment_for_module(
    conn: &mut SqliteConnection,
    user_id: i64,
    module_id: i64,
) -> ApiResult<(i64, i64)> {
    let course_id: Option<i64> = sqlx::query_scalar("SELECT course_id FROM modules WHERE id = ?")
        .bind(module_id)
        .fetch_optional(&mut *conn)
        .await?;
    let Some(course_id) = course_id else {
        return Err(ApiError::NotFound("Module"));
    };

    let enrollment_id: Option<i64> =
        sqlx::query_scalar("SELECT id FROM enrollments WHERE user_id = ? AND course_id = ?")
            .bind(user_id)
            .bind(course_id)
            .fetch_optional(&mut *conn)
            .await?;
    let Some(enrollment_id) = enrollment_id else {
        return Err(ApiError::NotFound("Enrollment"));
    };
    Ok((enrollment_id, course_id))
}

/// Move a module to in_progress. No precondition: re-starting is allowed
/// and restamps started_at.
pub async fn start_module(db: &SqlitePool, user_id: i64, module_id: i64) -> ApiResult<()> {
    let mut tx = db.begin().await?;
    let (enrollment_id, _) = enrollment_for_module(&mut tx, user_id, module_id).await?;

    sqlx::query(
        r#"
        INSERT INTO module_status (enrollment_id, module_id, status, started_at)
        VALUES (?, ?, 'in_progress', ?)
        ON CONFLICT (enrollment_id, module_id)
        DO UPDATE SET status = 'in_progress', started_at = excluded.started_at
        "#,
    )
    .bind(enrollment_id)
    .bind(module_id)
    .bind(now())
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}

/// Manual completion is only legal from in_progress.
pub async fn complete_module(db: &SqlitePool, user_id: i64, module_id: i64) -> ApiResult<()> {
    let mut tx = db.begin().await?;
    let (enrollment_id, _) = enrollment_for_module(&mut tx, user_id, module_id).await?;

    let status: Option<String> = sqlx::query_scalar(
        "SELECT status FROM module_status WHERE enrollment_id = ? AND module_id = ?",
    )
    .bind(enrollment_id)
    .bind(module_id)
    .fetch_optional(&mut *tx)
    .await?;

    match status.as_deref() {
        Some("in_progress") => {}
        Some(_) | None => {
            return Err(ApiError::validation(
                "Module must be in_progress before completing",
            ));
        }
    }

    sqlx::query(
        r#"
        UPDATE module_status SET status = 'completed', completed_at = ?
        WHERE enrollment_id = ? AND module_id = ?
        "#,
    )
    .bind(now())
    .bind(enrollment_id)
    .bind(module_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}

/// Quiz submissions complete the backing module unconditionally.
pub(crate) async fn force_complete_module(
    conn: &mut SqliteConnection,
    enrollment_id: i64,
    module_id: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO module_status (enrollment_id, module_id, status, completed_at)
        VALUES (?, ?, 'completed', ?)
        ON CONFLICT (enrollment_id, module_id)
        DO UPDATE SET status = 'completed', completed_at = excluded.completed_at
        "#,
    )
    .bind(enrollment_id)
    .bind(module_id)
    .bind(now())
    .execute(conn)
    .await?;
    Ok(())
}

/// Completing the course requires every module completed. Matching badges
/// are awarded in the same transaction.
pub async fn complete_course(db: &SqlitePool, user_id: i64, course_id: i64) -> ApiResult<()> {
    let mut tx = db.begin().await?;

    let enrollment: Option<(i64, i64)> = sqlx::query_as(
        r#"
        SELECT e.id, c.organisation_id FROM enrollments e
        JOIN courses c ON c.id = e.course_id
        WHERE e.user_id = ? AND e.course_id = ?
        "#,
    )
    .bind(user_id)
    .bind(course_id)
    .fetch_optional(&mut *tx)
    .await?;
    let Some((enrollment_id, organisation_id)) = enrollment else {
        return Err(ApiError::NotFound("Enrollment"));
    };

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM modules WHERE course_id = ?")
        .bind(course_id)
        .fetch_one(&mut *tx)
        .await?;
    let completed: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM module_status WHERE enrollment_id = ? AND status = 'completed'",
    )
    .bind(enrollment_id)
    .fetch_one(&mut *tx)
    .await?;
    if completed != total {
        return Err(ApiError::validation(
            "All modules must be completed before completing the course",
        ));
    }

    sqlx::query("UPDATE enrollments SET status = 'completed', completed_at = ? WHERE id = ?")
        .bind(now())
        .bind(enrollment_id)
        .execute(&mut *tx)
        .await?;

    award_badges(&mut tx, user_id, course_id, organisation_id).await?;

    tx.commit().await?;
    Ok(())
}

/// Award any course-specific badge for this course, and any threshold
/// badge whose completed-course count has been reached.
async fn award_badges(
    conn: &mut SqliteConnection,
    user_id: i64,
    course_id: i64,
    organisation_id: i64,
) -> Result<(), sqlx::Error> {
    let awarded_at = now();

    sqlx::query(
        r#"
        INSERT INTO user_badges (user_id, badge_id, awarded_at)
        SELECT ?, id, ? FROM badges
        WHERE organisation_id = ? AND course_id = ?
        ON CONFLICT (user_id, badge_id) DO NOTHING
        "#,
    )
    .bind(user_id)
    .bind(awarded_at)
    .bind(organisation_id)
    .bind(course_id)
    .execute(&mut *conn)
    .await?;

    let completed_courses: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM enrollments WHERE user_id = ? AND status = 'completed'",
    )
    .bind(user_id)
    .fetch_one(&mut *conn)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO user_badges (user_id, badge_id, awarded_at)
        SELECT ?, id, ? FROM badges
        WHERE organisation_id = ?
          AND num_courses_completed IS NOT NULL
          AND num_courses_completed <= ?
        ON CONFLICT (user_id, badge_id) DO NOTHING
        "#,
    )
    .bind(user_id)
    .bind(awarded_at)
    .bind(organisation_id)
    .bind(completed_courses)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Reopen a completed course. Module statuses are left as they are.
pub async fn uncomplete_course(db: &SqlitePool, user_id: i64, course_id: i64) -> ApiResult<()> {
    let updated = sqlx::query(
        r#"
        UPDATE enrollments SET status = 'enrolled', completed_at = NULL
        WHERE user_id = ? AND course_id = ?
        "#,
    )
    .bind(user_id)
    .bind(course_id)
    .execute(db)
    .await?
    .rows_affected();
    if updated == 0 {
        return Err(ApiError::NotFound("Enrollment"));
    }
    Ok(())
}

#[derive(Debug, Serialize, sqlx::FromRow, ToSchema)]
pub struct ModuleProgress {
    pub module_id: i64,
    pub title: String,
    pub module_type: String,
    pub status: String,
    #[serde(with = "time::serde::rfc3339::option")]
    pub started_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub completed_at: Option<OffsetDateTime>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CourseProgress {
    pub enrollment_status: String,
    pub modules: Vec<ModuleProgress>,
}

pub async fn course_progress(
    db: &SqlitePool,
    user_id: i64,
    course_id: i64,
) -> ApiResult<CourseProgress> {
    let enrollment: Option<(i64, String)> =
        sqlx::query_as("SELECT id, status FROM enrollments WHERE user_id = ? AND course_id = ?")
            .bind(user_id)
            .bind(course_id)
            .fetch_optional(db)
            .await?;
    let Some((enrollment_id, enrollment_status)) = enrollment else {
        return Err(ApiError::NotFound("Enrollment"));
    };

    let modules = sqlx::query_as(
        r#"
        SELECT m.id AS module_id, m.title, m.module_type,
               COALESCE(ms.status, 'not_started') AS status,
               ms.started_at, ms.completed_at
        FROM modules m
        LEFT JOIN module_status ms ON ms.module_id = m.id AND ms.enrollment_id = ?
        WHERE m.course_id = ?
        ORDER BY m.position, m.id
        "#,
    )
    .bind(enrollment_id)
    .bind(course_id)
    .fetch_all(db)
    .await?;

    Ok(CourseProgress {
        enrollment_status,
        modules,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        account,
        catalog::{self, ModuleContent},
        db::connect_memory,
        org,
    };

    async fn setup_course(module_count: usize) -> (SqlitePool, i64, i64, Vec<i64>) {
        let pool = connect_memory().await.unwrap();
        let admin = account::create_user(&pool, "admin@example.com", "secret-pw", "", "")
            .await
            .unwrap();
        let org = org::create_organisation(&pool, admin, "Acme").await.unwrap();
        let course = catalog::create_course(&pool, org.id, admin, "Rust 101", "", None, None)
            .await
            .unwrap();
        let mut modules = Vec::new();
        for i in 0..module_count {
            let id = catalog::create_module(
                &pool,
                course,
                &format!("Module {i}"),
                "",
                &ModuleContent::Video {
                    file_url: format!("{i}.mp4"),
                },
                &[],
                &[],
            )
            .await
            .unwrap();
            modules.push(id);
        }
        let learner = account::create_user(&pool, "amy@example.com", "secret-pw", "", "")
            .await
            .unwrap();
        (pool, learner, course, modules)
    }

    #[tokio::test]
    async fn enroll_seeds_one_not_started_row_per_module() {
        let (pool, learner, course, modules) = setup_course(3).await;
        enroll(&pool, learner, course).await.unwrap();

        let progress = course_progress(&pool, learner, course).await.unwrap();
        assert_eq!(progress.enrollment_status, "enrolled");
        assert_eq!(progress.modules.len(), modules.len());
        assert!(progress.modules.iter().all(|m| m.status == "not_started"));

        let err = enroll(&pool, learner, course).await.unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[tokio::test]
    async fn complete_requires_in_progress() {
        let (pool, learner, course, modules) = setup_course(1).await;
        enroll(&pool, learner, course).await.unwrap();

        let err = complete_module(&pool, learner, modules[0]).await.unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
        let progress = course_progress(&pool, learner, course).await.unwrap();
        assert_eq!(progress.modules[0].status, "not_started");

        start_module(&pool, learner, modules[0]).await.unwrap();
        complete_module(&pool, learner, modules[0]).await.unwrap();
        let progress = course_progress(&pool, learner, course).await.unwrap();
        assert_eq!(progress.modules[0].status, "completed");

        // completed is not a legal source state for manual completion
        let err = complete_module(&pool, learner, modules[0]).await.unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[tokio::test]
    async fn course_completion_gated_on_all_modules() {
        let (pool, learner, course, modules) = setup_course(2).await;
        enroll(&pool, learner, course).await.unwrap();

        start_module(&pool, learner, modules[0]).await.unwrap();
        complete_module(&pool, learner, modules[0]).await.unwrap();

        let err = complete_course(&pool, learner, course).await.unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));

        start_module(&pool, learner, modules[1]).await.unwrap();
        complete_module(&pool, learner, modules[1]).await.unwrap();
        complete_course(&pool, learner, course).await.unwrap();

        let progress = course_progress(&pool, learner, course).await.unwrap();
        assert_eq!(progress.enrollment_status, "completed");

        uncomplete_course(&pool, learner, course).await.unwrap();
        let progress = course_progress(&pool, learner, course).await.unwrap();
        assert_eq!(progress.enrollment_status, "enrolled");
        // module statuses are untouched by uncomplete
        assert!(progress.modules.iter().all(|m| m.status == "completed"));
    }

    #[tokio::test]
    async fn unenroll_then_reenroll_starts_clean() {
        let (pool, learner, course, modules) = setup_course(2).await;
        enroll(&pool, learner, course).await.unwrap();
        start_module(&pool, learner, modules[0]).await.unwrap();

        unenroll(&pool, learner, course).await.unwrap();
        let err = course_progress(&pool, learner, course).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
        let orphaned: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM module_status")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(orphaned, 0);

        enroll(&pool, learner, course).await.unwrap();
        let progress = course_progress(&pool, learner, course).await.unwrap();
        assert!(progress.modules.iter().all(|m| m.status == "not_started"));
    }
}
