//! Roadmaps: learner-owned ordered module lists, plus the recommender
//! that builds one from declared skills and channel/level preferences.

use std::collections::BTreeSet;

use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use utoipa::ToSchema;

use crate::{
    catalog::id_list,
    enrollment,
    error::{ApiError, ApiResult},
};

const GENERATED_ROADMAP_SIZE: i64 = 10;

#[derive(Debug, Serialize, sqlx::FromRow, ToSchema)]
pub struct Roadmap {
    pub id: i64,
    pub name: String,
    pub user_id: i64,
}

pub async fn list_roadmaps(db: &SqlitePool, user_id: i64) -> ApiResult<Vec<Roadmap>> {
    Ok(
        sqlx::query_as("SELECT id, name, user_id FROM roadmaps WHERE user_id = ? ORDER BY id DESC")
            .bind(user_id)
            .fetch_all(db)
            .await?,
    )
}

fn validated_name(name: &str) -> ApiResult<&str> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ApiError::validation("Roadmap name is required"));
    }
    Ok(name)
}

pub async fn create_roadmap(db: &SqlitePool, user_id: i64, name: &str) -> ApiResult<Roadmap> {
    let name = validated_name(name)?;
    let id = sqlx::query("INSERT INTO roadmaps (user_id, name) VALUES (?, ?)")
        .bind(user_id)
        .bind(name)
        .execute(db)
        .await?
        .last_insert_rowid();
    Ok(Roadmap {
        id,
        name: name.to_string(),
        user_id,
    })
}

pub async fn rename_roadmap(
    db: &SqlitePool,
    user_id: i64,
    roadmap_id: i64,
    name: &str,
) -> ApiResult<()> {
    let name = validated_name(name)?;
    let updated = sqlx::query("UPDATE roadmaps SET name = ? WHERE id = ? AND user_id = ?")
        .bind(name)
        .bind(roadmap_id)
        .bind(user_id)
        .execute(db)
        .await?
        .rows_affected();
    if updated == 0 {
        return Err(ApiError::NotFound("Roadmap"));
    }
    Ok(())
}

pub async fn delete_roadmap(db: &SqlitePool, user_id: i64, roadmap_id: i64) -> ApiResult<()> {
    let deleted = sqlx::query("DELETE FROM roadmaps WHERE id = ? AND user_id = ?")
        .bind(roadmap_id)
        .bind(user_id)
        .execute(db)
        .await?
        .rows_affected();
    if deleted == 0 {
        return Err(ApiError::NotFound("Roadmap"));
    }
    Ok(())
}

async fn assert_owned(
    conn: &mut SqliteConnection,
    user_id: i64,
    roadmap_id: i64,
) -> ApiResult<()> {
    let owned: Option<i64> =
        sqlx::query_scalar("SELECT id FROM roadmaps WHERE id = ? AND user_id = ?")
            .bind(roadmap_id)
            .bind(user_id)
            .fetch_optional(conn)
            .await?;
    if owned.is_none() {
        return Err(ApiError::NotFound("Roadmap"));
    }
    Ok(())
}

#[derive(Debug, Serialize, sqlx::FromRow, ToSchema)]
pub struct RoadmapItem {
    pub position: i64,
    pub module_id: i64,
    pub module_title: String,
    pub description: String,
    pub module_type: String,
    pub file_url: Option<String>,
    pub course_name: String,
    pub course_id: i64,
    pub enrollment_status: String,
    pub module_status: String,
}

pub async fn list_items(
    db: &SqlitePool,
    user_id: i64,
    roadmap_id: i64,
) -> ApiResult<Vec<RoadmapItem>> {
    let mut conn = db.acquire().await?;
    assert_owned(&mut conn, user_id, roadmap_id).await?;

    Ok(sqlx::query_as(
        r#"
        SELECT ri.position,
               ri.module_id,
               m.title AS module_title,
               m.description,
               m.module_type,
               m.file_url,
               c.name AS course_name,
               c.id AS course_id,
               CASE WHEN e.id IS NOT NULL THEN 'enrolled' ELSE 'not_enrolled' END
                   AS enrollment_status,
               COALESCE(ms.status, 'not_started') AS module_status
        FROM roadmap_items ri
        JOIN modules m ON m.id = ri.module_id
        JOIN courses c ON c.id = m.course_id
        LEFT JOIN enrollments e ON e.course_id = c.id AND e.user_id = ?2
        LEFT JOIN module_status ms ON ms.module_id = m.id AND ms.enrollment_id = e.id
        WHERE ri.roadmap_id = ?1
        ORDER BY ri.position ASC
        "#,
    )
    .bind(roadmap_id)
    .bind(user_id)
    .fetch_all(&mut *conn)
    .await?)
}

/// Append a module, enrolling the user in its owning course first.
/// Returns the assigned position.
pub async fn add_item(
    db: &SqlitePool,
    user_id: i64,
    roadmap_id: i64,
    module_id: i64,
) -> ApiResult<i64> {
    let mut tx = db.begin().await?;
    assert_owned(&mut tx, user_id, roadmap_id).await?;

    let course_id: Option<i64> = sqlx::query_scalar("SELECT course_id FROM modules WHERE id = ?")
        .bind(module_id)
        .fetch_optional(&mut *tx)
        .await?;
    let Some(course_id) = course_id else {
        return Err(ApiError::NotFound("Module"));
    };

    let already: Option<i64> = sqlx::query_scalar(
        "SELECT 1 FROM roadmap_items WHERE roadmap_id = ? AND module_id = ?",
    )
    .bind(roadmap_id)
    .bind(module_id)
    .fetch_optional(&mut *tx)
    .await?;
    if already.is_some() {
        return Err(ApiError::validation("Module already in roadmap"));
    }

    let position: i64 = sqlx::query_scalar(
        "SELECT COALESCE(MAX(position), 0) + 1 FROM roadmap_items WHERE roadmap_id = ?",
    )
    .bind(roadmap_id)
    .fetch_one(&mut *tx)
    .await?;

    enrollment::ensure_enrolled_in_courses(&mut tx, user_id, &[course_id]).await?;

    sqlx::query("INSERT INTO roadmap_items (roadmap_id, module_id, position) VALUES (?, ?, ?)")
        .bind(roadmap_id)
        .bind(module_id)
        .bind(position)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(position)
}

pub async fn move_item(
    db: &SqlitePool,
    user_id: i64,
    roadmap_id: i64,
    module_id: i64,
    position: i64,
) -> ApiResult<()> {
    if position < 1 {
        return Err(ApiError::validation("Valid position is required"));
    }
    let mut tx = db.begin().await?;
    assert_owned(&mut tx, user_id, roadmap_id).await?;

    let updated =
        sqlx::query("UPDATE roadmap_items SET position = ? WHERE roadmap_id = ? AND module_id = ?")
            .bind(position)
            .bind(roadmap_id)
            .bind(module_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
    if updated == 0 {
        return Err(ApiError::NotFound("Roadmap item"));
    }

    tx.commit().await?;
    Ok(())
}

/// Remove an item. Never unenrolls: the course may be taken independently.
pub async fn remove_item(
    db: &SqlitePool,
    user_id: i64,
    roadmap_id: i64,
    module_id: i64,
) -> ApiResult<()> {
    let mut tx = db.begin().await?;
    assert_owned(&mut tx, user_id, roadmap_id).await?;

    let deleted =
        sqlx::query("DELETE FROM roadmap_items WHERE roadmap_id = ? AND module_id = ?")
            .bind(roadmap_id)
            .bind(module_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
    if deleted == 0 {
        return Err(ApiError::NotFound("Roadmap item"));
    }

    tx.commit().await?;
    Ok(())
}

/// A learner's preference sets. Explicit (member-set) channels/levels
/// outrank onboarding-derived ones; skills only come from onboarding.
#[derive(Debug, Default)]
struct Preferences {
    skills: Vec<i64>,
    member_channels: Vec<i64>,
    member_levels: Vec<i64>,
    onboarding_channels: Vec<i64>,
    onboarding_levels: Vec<i64>,
}

async fn load_preferences(conn: &mut SqliteConnection, user_id: i64) -> ApiResult<Preferences> {
    let member_channels = sqlx::query_scalar("SELECT channel_id FROM user_channels WHERE user_id = ?")
        .bind(user_id)
        .fetch_all(&mut *conn)
        .await?;
    let member_levels = sqlx::query_scalar("SELECT level_id FROM user_levels WHERE user_id = ?")
        .bind(user_id)
        .fetch_all(&mut *conn)
        .await?;

    let from_onboarding = |column: &str| {
        format!(
            r#"
            SELECT DISTINCT oqo.{column}
            FROM onboarding_responses resp
            JOIN onboarding_question_options oqo ON oqo.id = resp.option_id
            WHERE resp.user_id = ? AND oqo.{column} IS NOT NULL
            "#
        )
    };
    let skills = sqlx::query_scalar(&from_onboarding("skill_id"))
        .bind(user_id)
        .fetch_all(&mut *conn)
        .await?;
    let onboarding_channels = sqlx::query_scalar(&from_onboarding("channel_id"))
        .bind(user_id)
        .fetch_all(&mut *conn)
        .await?;
    let onboarding_levels = sqlx::query_scalar(&from_onboarding("level_id"))
        .bind(user_id)
        .fetch_all(&mut *conn)
        .await?;

    Ok(Preferences {
        skills,
        member_channels,
        member_levels,
        onboarding_channels,
        onboarding_levels,
    })
}

#[derive(Debug, sqlx::FromRow)]
struct Candidate {
    module_id: i64,
    course_id: i64,
    #[allow(dead_code)]
    matching_skills: i64,
}

/// Rank candidate modules. Axes are lexicographic, not a blended score:
/// skill overlap first, then channel affinity (5 explicit preference,
/// 3 onboarding-derived, 1 tagged-but-unmatched, 0 untagged), then level
/// affinity on the same scale, then a random tiebreak. Modules the
/// learner has already completed are out.
async fn score_candidates(
    conn: &mut SqliteConnection,
    user_id: i64,
    organisation_id: i64,
    prefs: &Preferences,
) -> ApiResult<Vec<Candidate>> {
    let sql = format!(
        r#"
        SELECT m.id AS module_id,
               m.course_id AS course_id,
               COUNT(DISTINCT msk.skill_id) AS matching_skills,
               CASE
                   WHEN cc.channel_id IS NULL THEN 0
                   WHEN cc.channel_id IN {member_channels} THEN 5
                   WHEN cc.channel_id IN {onboarding_channels} THEN 3
                   ELSE 1
               END AS channel_match,
               CASE
                   WHEN cc.level_id IS NULL THEN 0
                   WHEN cc.level_id IN {member_levels} THEN 5
                   WHEN cc.level_id IN {onboarding_levels} THEN 3
                   ELSE 1
               END AS level_match
        FROM modules m
        JOIN courses c ON c.id = m.course_id
        LEFT JOIN course_channels cc ON cc.course_id = c.id
        LEFT JOIN module_skills msk
               ON msk.module_id = m.id AND msk.skill_id IN {skills}
        LEFT JOIN enrollments e ON e.course_id = c.id AND e.user_id = ?1
        LEFT JOIN module_status ms
               ON ms.enrollment_id = e.id AND ms.module_id = m.id
        WHERE c.organisation_id = ?2
          AND (ms.status IS NULL OR ms.status != 'completed')
        GROUP BY m.id
        ORDER BY matching_skills DESC, channel_match DESC, level_match DESC, RANDOM()
        LIMIT {limit}
        "#,
        member_channels = id_list(&prefs.member_channels),
        onboarding_channels = id_list(&prefs.onboarding_channels),
        member_levels = id_list(&prefs.member_levels),
        onboarding_levels = id_list(&prefs.onboarding_levels),
        skills = id_list(&prefs.skills),
        limit = GENERATED_ROADMAP_SIZE,
    );

    Ok(sqlx::query_as(&sql)
        .bind(user_id)
        .bind(organisation_id)
        .fetch_all(conn)
        .await?)
}

#[derive(Debug, Serialize, ToSchema)]
pub struct GeneratedRoadmap {
    pub roadmap: Roadmap,
    pub modules_added: i64,
    pub enrolled_courses: i64,
}

/// Build a personalized roadmap: score candidates, guard against an exact
/// duplicate of an existing roadmap, enroll into the owning courses and
/// write the items. One transaction; any failure (including the guard)
/// leaves nothing behind.
pub async fn generate(
    db: &SqlitePool,
    user_id: i64,
    organisation_id: i64,
    name: &str,
) -> ApiResult<GeneratedRoadmap> {
    let name = validated_name(name)?;

    let mut tx = db.begin().await?;

    let prefs = load_preferences(&mut tx, user_id).await?;
    let candidates = score_candidates(&mut tx, user_id, organisation_id, &prefs).await?;
    let candidate_set: BTreeSet<i64> = candidates.iter().map(|c| c.module_id).collect();

    // abort if any existing roadmap already holds this exact module set
    let existing: Vec<(i64, i64)> = sqlx::query_as(
        r#"
        SELECT r.id, ri.module_id
        FROM roadmaps r
        JOIN roadmap_items ri ON ri.roadmap_id = r.id
        WHERE r.user_id = ?
        "#,
    )
    .bind(user_id)
    .fetch_all(&mut *tx)
    .await?;
    let mut by_roadmap: std::collections::HashMap<i64, BTreeSet<i64>> =
        std::collections::HashMap::new();
    for (roadmap_id, module_id) in existing {
        by_roadmap.entry(roadmap_id).or_default().insert(module_id);
    }
    if by_roadmap.values().any(|set| *set == candidate_set) {
        return Err(ApiError::validation(
            "A roadmap with the same modules already exists",
        ));
    }

    let roadmap_id = sqlx::query("INSERT INTO roadmaps (user_id, name) VALUES (?, ?)")
        .bind(user_id)
        .bind(name)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

    let mut course_ids: Vec<i64> = candidates.iter().map(|c| c.course_id).collect();
    course_ids.sort_unstable();
    course_ids.dedup();
    let enrolled_courses =
        enrollment::ensure_enrolled_in_courses(&mut tx, user_id, &course_ids).await?;

    for (index, candidate) in candidates.iter().enumerate() {
        sqlx::query("INSERT INTO roadmap_items (roadmap_id, module_id, position) VALUES (?, ?, ?)")
            .bind(roadmap_id)
            .bind(candidate.module_id)
            .bind(index as i64 + 1)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;

    Ok(GeneratedRoadmap {
        roadmap: Roadmap {
            id: roadmap_id,
            name: name.to_string(),
            user_id,
        },
        modules_added: candidates.len() as i64,
        enrolled_courses: enrolled_courses as i64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        account,
        catalog::{self, ModuleContent},
        db::connect_memory,
        onboarding, org, taxonomy,
    };

    struct Fixture {
        pool: SqlitePool,
        org_id: i64,
        admin: i64,
        learner: i64,
    }

    async fn fixture() -> Fixture {
        let pool = connect_memory().await.unwrap();
        let admin = account::create_user(&pool, "admin@example.com", "secret-pw", "", "")
            .await
            .unwrap();
        let org = org::create_organisation(&pool, admin, "Acme").await.unwrap();
        let learner = account::create_user(&pool, "amy@example.com", "secret-pw", "", "")
            .await
            .unwrap();
        Fixture {
            pool,
            org_id: org.id,
            admin,
            learner,
        }
    }

    fn video(i: usize) -> ModuleContent {
        ModuleContent::Video {
            file_url: format!("{i}.mp4"),
        }
    }

    async fn add_course_with_modules(
        fx: &Fixture,
        name: &str,
        channel_id: Option<i64>,
        level_id: Option<i64>,
        count: usize,
        skill_ids: &[i64],
    ) -> (i64, Vec<i64>) {
        let course = catalog::create_course(
            &fx.pool, fx.org_id, fx.admin, name, "", channel_id, level_id,
        )
        .await
        .unwrap();
        let mut modules = Vec::new();
        for i in 0..count {
            let id = catalog::create_module(
                &fx.pool,
                course,
                &format!("{name} {i}"),
                "",
                &video(i),
                skill_ids,
                &[],
            )
            .await
            .unwrap();
            modules.push(id);
        }
        (course, modules)
    }

    #[tokio::test]
    async fn generation_caps_at_ten_items_and_enrolls() {
        let fx = fixture().await;
        add_course_with_modules(&fx, "Big", None, None, 14, &[]).await;

        let generated = generate(&fx.pool, fx.learner, fx.org_id, "My path")
            .await
            .unwrap();
        assert_eq!(generated.modules_added, 10);
        assert_eq!(generated.enrolled_courses, 1);

        let items = list_items(&fx.pool, fx.learner, generated.roadmap.id)
            .await
            .unwrap();
        assert_eq!(items.len(), 10);
        let positions: Vec<i64> = items.iter().map(|i| i.position).collect();
        assert_eq!(positions, (1..=10).collect::<Vec<i64>>());
        assert!(items.iter().all(|i| i.enrollment_status == "enrolled"));
        assert!(items.iter().all(|i| i.module_status == "not_started"));
    }

    #[tokio::test]
    async fn duplicate_module_set_aborts_generation() {
        let fx = fixture().await;
        add_course_with_modules(&fx, "Small", None, None, 3, &[]).await;

        generate(&fx.pool, fx.learner, fx.org_id, "First").await.unwrap();
        let err = generate(&fx.pool, fx.learner, fx.org_id, "Second")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));

        // the aborted generation must leave no roadmap behind
        let roadmaps = list_roadmaps(&fx.pool, fx.learner).await.unwrap();
        assert_eq!(roadmaps.len(), 1);
    }

    #[tokio::test]
    async fn explicit_channel_preference_outranks_onboarding() {
        let fx = fixture().await;
        let liked = taxonomy::create_channel(&fx.pool, fx.org_id, "Backend", "")
            .await
            .unwrap();
        let onboarded = taxonomy::create_channel(&fx.pool, fx.org_id, "Frontend", "")
            .await
            .unwrap();
        let other = taxonomy::create_channel(&fx.pool, fx.org_id, "Data", "")
            .await
            .unwrap();

        // one single-module course per channel affinity tier
        let (_, explicit_mods) =
            add_course_with_modules(&fx, "Explicit", Some(liked), None, 1, &[]).await;
        let (_, onboarding_mods) =
            add_course_with_modules(&fx, "Onboarded", Some(onboarded), None, 1, &[]).await;
        let (_, unmatched_mods) =
            add_course_with_modules(&fx, "Unmatched", Some(other), None, 1, &[]).await;
        let (_, untagged_mods) = add_course_with_modules(&fx, "Untagged", None, None, 1, &[]).await;

        account::set_preferences(
            &fx.pool,
            fx.learner,
            &account::Preferences {
                channel_ids: vec![liked],
                level_ids: vec![],
            },
        )
        .await
        .unwrap();

        // onboarding response tagging the onboarded channel
        let question =
            onboarding::create_question(&fx.pool, fx.org_id, "Pick your track", 1).await.unwrap();
        let option = onboarding::create_option(
            &fx.pool,
            fx.org_id,
            question,
            "Frontend please",
            onboarding::OptionRefs {
                channel_id: Some(onboarded),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        onboarding::submit_responses(&fx.pool, fx.learner, &[option])
            .await
            .unwrap();

        let generated = generate(&fx.pool, fx.learner, fx.org_id, "Ranked")
            .await
            .unwrap();
        let items = list_items(&fx.pool, fx.learner, generated.roadmap.id)
            .await
            .unwrap();
        let order: Vec<i64> = items.iter().map(|i| i.module_id).collect();
        assert_eq!(
            order,
            vec![
                explicit_mods[0],
                onboarding_mods[0],
                unmatched_mods[0],
                untagged_mods[0]
            ]
        );
    }

    #[tokio::test]
    async fn skill_overlap_is_the_primary_axis() {
        let fx = fixture().await;
        let rust = taxonomy::create_skill(&fx.pool, fx.org_id, "Rust", "").await.unwrap();
        let sql = taxonomy::create_skill(&fx.pool, fx.org_id, "SQL", "").await.unwrap();
        let liked = taxonomy::create_channel(&fx.pool, fx.org_id, "Backend", "")
            .await
            .unwrap();

        // channel affinity must lose to skill overlap
        let (_, no_skill) =
            add_course_with_modules(&fx, "Channel only", Some(liked), None, 1, &[]).await;
        let (_, two_skills) =
            add_course_with_modules(&fx, "Skills", None, None, 1, &[rust, sql]).await;

        account::set_preferences(
            &fx.pool,
            fx.learner,
            &account::Preferences {
                channel_ids: vec![liked],
                level_ids: vec![],
            },
        )
        .await
        .unwrap();
        let question =
            onboarding::create_question(&fx.pool, fx.org_id, "Skills?", 1).await.unwrap();
        let opt_rust = onboarding::create_option(
            &fx.pool,
            fx.org_id,
            question,
            "Rust",
            onboarding::OptionRefs {
                skill_id: Some(rust),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        let opt_sql = onboarding::create_option(
            &fx.pool,
            fx.org_id,
            question,
            "SQL",
            onboarding::OptionRefs {
                skill_id: Some(sql),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        onboarding::submit_responses(&fx.pool, fx.learner, &[opt_rust, opt_sql])
            .await
            .unwrap();

        let generated = generate(&fx.pool, fx.learner, fx.org_id, "Ranked")
            .await
            .unwrap();
        let items = list_items(&fx.pool, fx.learner, generated.roadmap.id)
            .await
            .unwrap();
        assert_eq!(items[0].module_id, two_skills[0]);
        assert_eq!(items[1].module_id, no_skill[0]);
    }

    #[tokio::test]
    async fn add_item_enrolls_and_rejects_duplicates() {
        let fx = fixture().await;
        let (_, modules) = add_course_with_modules(&fx, "Solo", None, None, 2, &[]).await;

        let roadmap = create_roadmap(&fx.pool, fx.learner, "Manual").await.unwrap();
        let position = add_item(&fx.pool, fx.learner, roadmap.id, modules[0])
            .await
            .unwrap();
        assert_eq!(position, 1);

        let err = add_item(&fx.pool, fx.learner, roadmap.id, modules[0])
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));

        let items = list_items(&fx.pool, fx.learner, roadmap.id).await.unwrap();
        assert_eq!(items[0].enrollment_status, "enrolled");
    }

    #[tokio::test]
    async fn roadmaps_are_owner_scoped() {
        let fx = fixture().await;
        let roadmap = create_roadmap(&fx.pool, fx.learner, "Mine").await.unwrap();

        let stranger = account::create_user(&fx.pool, "bo@example.com", "secret-pw", "", "")
            .await
            .unwrap();
        let err = list_items(&fx.pool, stranger, roadmap.id).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
        let err = delete_roadmap(&fx.pool, stranger, roadmap.id).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }
}
