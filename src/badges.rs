use serde::Serialize;
use serde_json::json;
use sqlx::SqlitePool;
use time::OffsetDateTime;
use utoipa::ToSchema;

use crate::{
    activity,
    error::{ApiError, ApiResult},
    utils::now,
};

/// Threshold badge: earned once enough courses are completed.
#[derive(Debug, Serialize, sqlx::FromRow, ToSchema)]
pub struct FrequentBadge {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub num_courses_completed: i64,
}

/// Badge tied to completing one specific course.
#[derive(Debug, Serialize, sqlx::FromRow, ToSchema)]
pub struct CourseBadge {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub course_id: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BadgeCatalog {
    pub courses_badges: Vec<FrequentBadge>,
    pub course_badges: Vec<CourseBadge>,
}

pub async fn create_frequent_badge(
    db: &SqlitePool,
    organisation_id: i64,
    user_id: i64,
    name: &str,
    description: &str,
    num_courses_completed: i64,
) -> ApiResult<i64> {
    if name.trim().is_empty() {
        return Err(ApiError::validation("name is required"));
    }
    if num_courses_completed < 1 {
        return Err(ApiError::validation(
            "numCoursesCompleted must be a positive number",
        ));
    }

    let mut tx = db.begin().await?;

    let badge_id = sqlx::query(
        r#"
        INSERT INTO badges (organisation_id, name, description, num_courses_completed, created_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(organisation_id)
    .bind(name)
    .bind(description)
    .bind(num_courses_completed)
    .bind(now())
    .execute(&mut *tx)
    .await?
    .last_insert_rowid();

    activity::log(
        &mut tx,
        user_id,
        organisation_id,
        "create_badge",
        json!({ "badgeId": badge_id, "name": name, "numCoursesCompleted": num_courses_completed }),
        json!({
            "name": name,
            "description": description,
            "Number of courses to be completed": num_courses_completed,
        }),
    )
    .await?;

    tx.commit().await?;
    Ok(badge_id)
}

pub async fn create_course_badge(
    db: &SqlitePool,
    organisation_id: i64,
    user_id: i64,
    name: &str,
    description: &str,
    course_id: i64,
) -> ApiResult<i64> {
    if name.trim().is_empty() {
        return Err(ApiError::validation("name and courseId are required"));
    }

    let mut tx = db.begin().await?;

    let course_name: Option<String> =
        sqlx::query_scalar("SELECT name FROM courses WHERE id = ? AND organisation_id = ?")
            .bind(course_id)
            .bind(organisation_id)
            .fetch_optional(&mut *tx)
            .await?;
    let Some(course_name) = course_name else {
        return Err(ApiError::NotFound("Course"));
    };

    let badge_id = sqlx::query(
        r#"
        INSERT INTO badges (organisation_id, name, description, course_id, created_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(organisation_id)
    .bind(name)
    .bind(description)
    .bind(course_id)
    .bind(now())
    .execute(&mut *tx)
    .await?
    .last_insert_rowid();

    activity::log(
        &mut tx,
        user_id,
        organisation_id,
        "create_badge",
        json!({ "badgeId": badge_id, "name": name, "courseId": course_id }),
        json!({ "Course Name": course_name }),
    )
    .await?;

    tx.commit().await?;
    Ok(badge_id)
}

pub async fn catalog(db: &SqlitePool, organisation_id: i64) -> ApiResult<BadgeCatalog> {
    let courses_badges = sqlx::query_as(
        r#"
        SELECT id, name, description, num_courses_completed
        FROM badges
        WHERE organisation_id = ?
          AND num_courses_completed IS NOT NULL
          AND num_courses_completed > 0
        ORDER BY created_at DESC
        "#,
    )
    .bind(organisation_id)
    .fetch_all(db)
    .await?;

    let course_badges = sqlx::query_as(
        r#"
        SELECT id, name, description, course_id
        FROM badges
        WHERE organisation_id = ? AND course_id IS NOT NULL
        ORDER BY created_at DESC
        "#,
    )
    .bind(organisation_id)
    .fetch_all(db)
    .await?;

    Ok(BadgeCatalog {
        courses_badges,
        course_badges,
    })
}

pub async fn delete_badge(
    db: &SqlitePool,
    organisation_id: i64,
    user_id: i64,
    badge_id: i64,
) -> ApiResult<()> {
    let mut tx = db.begin().await?;

    let name: Option<String> =
        sqlx::query_scalar("SELECT name FROM badges WHERE id = ? AND organisation_id = ?")
            .bind(badge_id)
            .bind(organisation_id)
            .fetch_optional(&mut *tx)
            .await?;
    let Some(name) = name else {
        return Err(ApiError::NotFound("Badge"));
    };

    sqlx::query("DELETE FROM badges WHERE id = ? AND organisation_id = ?")
        .bind(badge_id)
        .bind(organisation_id)
        .execute(&mut *tx)
        .await?;

    activity::log(
        &mut tx,
        user_id,
        organisation_id,
        "delete_badge",
        json!({ "badgeId": badge_id }),
        json!({ "Badge Name": name }),
    )
    .await?;

    tx.commit().await?;
    Ok(())
}

#[derive(Debug, Serialize, sqlx::FromRow, ToSchema)]
pub struct AwardedBadge {
    pub id: i64,
    pub name: String,
    pub description: String,
    #[serde(with = "time::serde::rfc3339")]
    pub awarded_at: OffsetDateTime,
}

pub async fn user_badges(
    db: &SqlitePool,
    organisation_id: i64,
    user_id: i64,
) -> ApiResult<Vec<AwardedBadge>> {
    Ok(sqlx::query_as(
        r#"
        SELECT b.id, b.name, b.description, ub.awarded_at
        FROM badges b
        JOIN user_badges ub ON b.id = ub.badge_id
        WHERE b.organisation_id = ? AND ub.user_id = ?
        ORDER BY ub.awarded_at DESC
        "#,
    )
    .bind(organisation_id)
    .bind(user_id)
    .fetch_all(db)
    .await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        account,
        catalog::{self, ModuleContent},
        db::connect_memory,
        enrollment, org,
    };

    #[tokio::test]
    async fn completing_a_course_awards_matching_badges() {
        let pool = connect_memory().await.unwrap();
        let admin = account::create_user(&pool, "admin@example.com", "secret-pw", "", "")
            .await
            .unwrap();
        let org = org::create_organisation(&pool, admin, "Acme").await.unwrap();
        let course = catalog::create_course(&pool, org.id, admin, "Rust", "", None, None)
            .await
            .unwrap();
        let module = catalog::create_module(
            &pool,
            course,
            "Only",
            "",
            &ModuleContent::Video {
                file_url: "v.mp4".to_string(),
            },
            &[],
            &[],
        )
        .await
        .unwrap();

        create_course_badge(&pool, org.id, admin, "Rust finisher", "", course)
            .await
            .unwrap();
        create_frequent_badge(&pool, org.id, admin, "First steps", "", 1)
            .await
            .unwrap();
        create_frequent_badge(&pool, org.id, admin, "Marathon", "", 5)
            .await
            .unwrap();

        let learner = account::create_user(&pool, "amy@example.com", "secret-pw", "", "")
            .await
            .unwrap();
        enrollment::enroll(&pool, learner, course).await.unwrap();
        enrollment::start_module(&pool, learner, module).await.unwrap();
        enrollment::complete_module(&pool, learner, module).await.unwrap();
        enrollment::complete_course(&pool, learner, course).await.unwrap();

        let awarded = user_badges(&pool, org.id, learner).await.unwrap();
        let names: Vec<&str> = awarded.iter().map(|b| b.name.as_str()).collect();
        assert!(names.contains(&"Rust finisher"));
        assert!(names.contains(&"First steps"));
        assert!(!names.contains(&"Marathon"));
    }

    #[tokio::test]
    async fn frequent_badge_requires_positive_threshold() {
        let pool = connect_memory().await.unwrap();
        let admin = account::create_user(&pool, "admin@example.com", "secret-pw", "", "")
            .await
            .unwrap();
        let org = org::create_organisation(&pool, admin, "Acme").await.unwrap();
        let err = create_frequent_badge(&pool, org.id, admin, "Zero", "", 0)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }
}
