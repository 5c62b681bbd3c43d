use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{SqliteConnection, SqlitePool};
use utoipa::ToSchema;

use crate::{
    activity,
    error::{ApiError, ApiResult, is_unique_violation},
    utils::now,
};

/// Module payload as authored. Non-quiz variants carry a file reference;
/// the quiz variant carries the whole revision aggregate.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(tag = "module_type", rename_all = "snake_case")]
pub enum ModuleContent {
    Video { file_url: String },
    Pdf { file_url: String },
    Slide { file_url: String },
    Quiz { quiz: QuizContent },
}

impl ModuleContent {
    pub fn type_name(&self) -> &'static str {
        match self {
            ModuleContent::Video { .. } => "video",
            ModuleContent::Pdf { .. } => "pdf",
            ModuleContent::Slide { .. } => "slide",
            ModuleContent::Quiz { .. } => "quiz",
        }
    }

    fn file_url(&self) -> Option<&str> {
        match self {
            ModuleContent::Video { file_url }
            | ModuleContent::Pdf { file_url }
            | ModuleContent::Slide { file_url } => Some(file_url),
            ModuleContent::Quiz { .. } => None,
        }
    }

    fn quiz(&self) -> Option<&QuizContent> {
        match self {
            ModuleContent::Quiz { quiz } => Some(quiz),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct QuizContent {
    pub title: String,
    pub questions: Vec<QuestionContent>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct QuestionContent {
    pub question_text: String,
    pub options: Vec<OptionContent>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OptionContent {
    pub option_text: String,
    #[serde(default)]
    pub is_correct: bool,
}

#[derive(Debug, Serialize, sqlx::FromRow, ToSchema)]
pub struct Course {
    pub id: i64,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Serialize, sqlx::FromRow, ToSchema)]
pub struct CourseDetail {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub channel_id: Option<i64>,
    pub level_id: Option<i64>,
}

pub async fn create_course(
    db: &SqlitePool,
    organisation_id: i64,
    created_by: i64,
    name: &str,
    description: &str,
    channel_id: Option<i64>,
    level_id: Option<i64>,
) -> ApiResult<i64> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ApiError::validation("courseName is required"));
    }

    let mut tx = db.begin().await?;

    let course_id = sqlx::query(
        r#"
        INSERT INTO courses (organisation_id, name, description, created_by, created_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(organisation_id)
    .bind(name)
    .bind(description)
    .bind(created_by)
    .bind(now())
    .execute(&mut *tx)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            ApiError::validation("Course name already taken")
        } else {
            e.into()
        }
    })?
    .last_insert_rowid();

    set_course_channel(&mut tx, course_id, channel_id, level_id).await?;

    activity::log(
        &mut tx,
        created_by,
        organisation_id,
        "create_course",
        json!({ "courseId": course_id, "name": name }),
        json!({ "Course Name": name }),
    )
    .await?;

    tx.commit().await?;
    Ok(course_id)
}

async fn set_course_channel(
    conn: &mut SqliteConnection,
    course_id: i64,
    channel_id: Option<i64>,
    level_id: Option<i64>,
) -> ApiResult<()> {
    sqlx::query("DELETE FROM course_channels WHERE course_id = ?")
        .bind(course_id)
        .execute(&mut *conn)
        .await?;
    if let Some(channel_id) = channel_id {
        sqlx::query("INSERT INTO course_channels (course_id, channel_id, level_id) VALUES (?, ?, ?)")
            .bind(course_id)
            .bind(channel_id)
            .bind(level_id)
            .execute(conn)
            .await?;
    }
    Ok(())
}

/// Courses authored by this admin within the organisation.
pub async fn list_courses(
    db: &SqlitePool,
    organisation_id: i64,
    created_by: i64,
) -> ApiResult<Vec<Course>> {
    Ok(sqlx::query_as(
        r#"
        SELECT id, name, description FROM courses
        WHERE organisation_id = ? AND created_by = ?
        ORDER BY name
        "#,
    )
    .bind(organisation_id)
    .bind(created_by)
    .fetch_all(db)
    .await?)
}

pub async fn get_course(db: &SqlitePool, course_id: i64) -> ApiResult<CourseDetail> {
    sqlx::query_as(
        r#"
        SELECT c.id, c.name, c.description, cc.channel_id, cc.level_id
        FROM courses c
        LEFT JOIN course_channels cc ON cc.course_id = c.id
        WHERE c.id = ?
        "#,
    )
    .bind(course_id)
    .fetch_optional(db)
    .await?
    .ok_or(ApiError::NotFound("Course"))
}

pub async fn update_course(
    db: &SqlitePool,
    organisation_id: i64,
    user_id: i64,
    course_id: i64,
    name: &str,
    description: &str,
    channel_id: Option<i64>,
    level_id: Option<i64>,
) -> ApiResult<()> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ApiError::validation("courseName is required"));
    }

    let mut tx = db.begin().await?;

    let updated = sqlx::query(
        "UPDATE courses SET name = ?, description = ? WHERE id = ? AND organisation_id = ?",
    )
    .bind(name)
    .bind(description)
    .bind(course_id)
    .bind(organisation_id)
    .execute(&mut *tx)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            ApiError::validation("Course name already taken")
        } else {
            e.into()
        }
    })?
    .rows_affected();
    if updated == 0 {
        return Err(ApiError::NotFound("Course"));
    }

    set_course_channel(&mut tx, course_id, channel_id, level_id).await?;

    activity::log(
        &mut tx,
        user_id,
        organisation_id,
        "update_course",
        json!({ "courseId": course_id, "name": name }),
        json!({ "Course Name": name }),
    )
    .await?;

    tx.commit().await?;
    Ok(())
}

pub async fn delete_course(
    db: &SqlitePool,
    organisation_id: i64,
    user_id: i64,
    course_id: i64,
) -> ApiResult<()> {
    let mut tx = db.begin().await?;

    let name: Option<String> =
        sqlx::query_scalar("SELECT name FROM courses WHERE id = ? AND organisation_id = ?")
            .bind(course_id)
            .bind(organisation_id)
            .fetch_optional(&mut *tx)
            .await?;
    let Some(name) = name else {
        return Err(ApiError::NotFound("Course"));
    };

    // children (modules, enrollments, revisions, ...) go with it via FK cascade
    sqlx::query("DELETE FROM courses WHERE id = ?")
        .bind(course_id)
        .execute(&mut *tx)
        .await?;

    activity::log(
        &mut tx,
        user_id,
        organisation_id,
        "delete_course",
        json!({ "courseId": course_id }),
        json!({ "Course Name": name }),
    )
    .await?;

    tx.commit().await?;
    Ok(())
}

#[derive(Debug, Serialize, sqlx::FromRow, ToSchema)]
pub struct ModuleSummary {
    pub id: i64,
    pub course_id: i64,
    pub title: String,
    pub description: String,
    pub module_type: String,
    pub position: i64,
    pub file_url: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ModuleDetail {
    #[serde(flatten)]
    pub module: ModuleSummary,
    pub skill_ids: Vec<i64>,
    pub tag_ids: Vec<i64>,
    /// Current revision's quiz for quiz modules.
    pub quiz: Option<QuizView>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct QuizView {
    pub id: i64,
    pub title: String,
    pub questions: Vec<QuestionView>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct QuestionView {
    pub id: i64,
    pub question_text: String,
    pub options: Vec<OptionView>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OptionView {
    pub id: i64,
    pub option_text: String,
    pub is_correct: bool,
}

pub async fn create_module(
    db: &SqlitePool,
    course_id: i64,
    title: &str,
    description: &str,
    content: &ModuleContent,
    skill_ids: &[i64],
    tag_ids: &[i64],
) -> ApiResult<i64> {
    if title.trim().is_empty() {
        return Err(ApiError::validation("title is required"));
    }

    let mut tx = db.begin().await?;

    let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM courses WHERE id = ?")
        .bind(course_id)
        .fetch_optional(&mut *tx)
        .await?;
    if exists.is_none() {
        return Err(ApiError::NotFound("Course"));
    }

    let position: i64 =
        sqlx::query_scalar("SELECT COALESCE(MAX(position), 0) + 1 FROM modules WHERE course_id = ?")
            .bind(course_id)
            .fetch_one(&mut *tx)
            .await?;

    let module_id = sqlx::query(
        r#"
        INSERT INTO modules (course_id, title, description, module_type, position, file_url)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(course_id)
    .bind(title)
    .bind(description)
    .bind(content.type_name())
    .bind(position)
    .bind(content.file_url())
    .execute(&mut *tx)
    .await?
    .last_insert_rowid();

    if let Some(quiz) = content.quiz() {
        insert_revision(&mut tx, module_id, 1, quiz).await?;
    }
    replace_associations(&mut tx, module_id, skill_ids, tag_ids).await?;

    // retroactive fan-out: existing enrollments get a fresh status row
    sqlx::query(
        r#"
        INSERT INTO module_status (enrollment_id, module_id, status)
        SELECT id, ?, 'not_started' FROM enrollments WHERE course_id = ?
        ON CONFLICT (enrollment_id, module_id) DO NOTHING
        "#,
    )
    .bind(module_id)
    .bind(course_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(module_id)
}

async fn insert_revision(
    conn: &mut SqliteConnection,
    module_id: i64,
    version: i64,
    quiz: &QuizContent,
) -> ApiResult<i64> {
    let revision_id = sqlx::query("INSERT INTO revisions (module_id, version) VALUES (?, ?)")
        .bind(module_id)
        .bind(version)
        .execute(&mut *conn)
        .await?
        .last_insert_rowid();

    let quiz_id = sqlx::query("INSERT INTO quizzes (revision_id, title) VALUES (?, ?)")
        .bind(revision_id)
        .bind(&quiz.title)
        .execute(&mut *conn)
        .await?
        .last_insert_rowid();

    for (index, question) in quiz.questions.iter().enumerate() {
        let question_id =
            sqlx::query("INSERT INTO questions (quiz_id, question_text, position) VALUES (?, ?, ?)")
                .bind(quiz_id)
                .bind(&question.question_text)
                .bind(index as i64 + 1)
                .execute(&mut *conn)
                .await?
                .last_insert_rowid();
        for option in &question.options {
            sqlx::query(
                "INSERT INTO question_options (question_id, option_text, is_correct) VALUES (?, ?, ?)",
            )
            .bind(question_id)
            .bind(&option.option_text)
            .bind(option.is_correct)
            .execute(&mut *conn)
            .await?;
        }
    }

    Ok(quiz_id)
}

async fn replace_associations(
    conn: &mut SqliteConnection,
    module_id: i64,
    skill_ids: &[i64],
    tag_ids: &[i64],
) -> ApiResult<()> {
    sqlx::query("DELETE FROM module_skills WHERE module_id = ?")
        .bind(module_id)
        .execute(&mut *conn)
        .await?;
    for skill_id in skill_ids {
        sqlx::query("INSERT INTO module_skills (module_id, skill_id) VALUES (?, ?)")
            .bind(module_id)
            .bind(skill_id)
            .execute(&mut *conn)
            .await?;
    }
    sqlx::query("DELETE FROM module_tags WHERE module_id = ?")
        .bind(module_id)
        .execute(&mut *conn)
        .await?;
    for tag_id in tag_ids {
        sqlx::query("INSERT INTO module_tags (module_id, tag_id) VALUES (?, ?)")
            .bind(module_id)
            .bind(tag_id)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

pub async fn list_modules(db: &SqlitePool, course_id: i64) -> ApiResult<Vec<ModuleSummary>> {
    Ok(sqlx::query_as(
        r#"
        SELECT id, course_id, title, description, module_type, position, file_url
        FROM modules WHERE course_id = ?
        ORDER BY position, id
        "#,
    )
    .bind(course_id)
    .fetch_all(db)
    .await?)
}

pub async fn get_module(db: &SqlitePool, module_id: i64) -> ApiResult<ModuleDetail> {
    let module: Option<ModuleSummary> = sqlx::query_as(
        r#"
        SELECT id, course_id, title, description, module_type, position, file_url
        FROM modules WHERE id = ?
        "#,
    )
    .bind(module_id)
    .fetch_optional(db)
    .await?;
    let Some(module) = module else {
        return Err(ApiError::NotFound("Module"));
    };

    let skill_ids = sqlx::query_scalar("SELECT skill_id FROM module_skills WHERE module_id = ?")
        .bind(module_id)
        .fetch_all(db)
        .await?;
    let tag_ids = sqlx::query_scalar("SELECT tag_id FROM module_tags WHERE module_id = ?")
        .bind(module_id)
        .fetch_all(db)
        .await?;

    let quiz = match current_quiz(db, module_id).await? {
        Some((quiz_id, title)) => {
            let questions: Vec<(i64, String)> = sqlx::query_as(
                "SELECT id, question_text FROM questions WHERE quiz_id = ? ORDER BY position, id",
            )
            .bind(quiz_id)
            .fetch_all(db)
            .await?;
            let mut views = Vec::with_capacity(questions.len());
            for (id, question_text) in questions {
                let options: Vec<(i64, String, bool)> = sqlx::query_as(
                    "SELECT id, option_text, is_correct FROM question_options WHERE question_id = ? ORDER BY id",
                )
                .bind(id)
                .fetch_all(db)
                .await?;
                views.push(QuestionView {
                    id,
                    question_text,
                    options: options
                        .into_iter()
                        .map(|(id, option_text, is_correct)| OptionView {
                            id,
                            option_text,
                            is_correct,
                        })
                        .collect(),
                });
            }
            Some(QuizView {
                id: quiz_id,
                title,
                questions: views,
            })
        }
        None => None,
    };

    Ok(ModuleDetail {
        module,
        skill_ids,
        tag_ids,
        quiz,
    })
}

/// Quiz of the highest (current) revision of a module.
pub async fn current_quiz(db: &SqlitePool, module_id: i64) -> ApiResult<Option<(i64, String)>> {
    Ok(sqlx::query_as(
        r#"
        SELECT q.id, q.title
        FROM quizzes q
        JOIN revisions r ON r.id = q.revision_id
        WHERE r.module_id = ?
        ORDER BY r.version DESC
        LIMIT 1
        "#,
    )
    .bind(module_id)
    .fetch_optional(db)
    .await?)
}

/// Replace a module's content. A content edit invalidates all prior
/// progress: every status row resets to not_started, and for quiz modules
/// old responses are purged before the new revision is written.
pub async fn update_module(
    db: &SqlitePool,
    module_id: i64,
    title: &str,
    description: &str,
    content: Option<&ModuleContent>,
    skill_ids: &[i64],
    tag_ids: &[i64],
) -> ApiResult<()> {
    if title.trim().is_empty() {
        return Err(ApiError::validation("title is required"));
    }

    let mut tx = db.begin().await?;

    let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM modules WHERE id = ?")
        .bind(module_id)
        .fetch_optional(&mut *tx)
        .await?;
    if exists.is_none() {
        return Err(ApiError::NotFound("Module"));
    }

    sqlx::query("UPDATE modules SET title = ?, description = ? WHERE id = ?")
        .bind(title)
        .bind(description)
        .bind(module_id)
        .execute(&mut *tx)
        .await?;

    replace_associations(&mut tx, module_id, skill_ids, tag_ids).await?;

    if let Some(content) = content {
        sqlx::query("UPDATE modules SET module_type = ?, file_url = ? WHERE id = ?")
            .bind(content.type_name())
            .bind(content.file_url())
            .bind(module_id)
            .execute(&mut *tx)
            .await?;

        // purge responses against any revision of this module
        sqlx::query(
            r#"
            DELETE FROM quiz_responses WHERE quiz_id IN (
                SELECT q.id FROM quizzes q
                JOIN revisions r ON r.id = q.revision_id
                WHERE r.module_id = ?
            )
            "#,
        )
        .bind(module_id)
        .execute(&mut *tx)
        .await?;

        match content.quiz() {
            Some(quiz) => {
                let version: i64 = sqlx::query_scalar(
                    "SELECT COALESCE(MAX(version), 0) + 1 FROM revisions WHERE module_id = ?",
                )
                .bind(module_id)
                .fetch_one(&mut *tx)
                .await?;
                insert_revision(&mut tx, module_id, version, quiz).await?;
            }
            None => {
                // no longer a quiz: drop the whole revision chain
                sqlx::query("DELETE FROM revisions WHERE module_id = ?")
                    .bind(module_id)
                    .execute(&mut *tx)
                    .await?;
            }
        }

        sqlx::query(
            r#"
            UPDATE module_status
            SET status = 'not_started', started_at = NULL, completed_at = NULL
            WHERE module_id = ?
            "#,
        )
        .bind(module_id)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

pub async fn delete_module(db: &SqlitePool, module_id: i64) -> ApiResult<()> {
    let deleted = sqlx::query("DELETE FROM modules WHERE id = ?")
        .bind(module_id)
        .execute(db)
        .await?
        .rows_affected();
    if deleted == 0 {
        return Err(ApiError::NotFound("Module"));
    }
    Ok(())
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Material {
    pub id: i64,
    pub module_title: String,
    pub description: String,
    pub module_type: String,
    pub file_url: Option<String>,
    pub course_name: String,
    pub course_id: i64,
    pub tags: Vec<String>,
}

type MaterialRow = (i64, String, String, String, Option<String>, String, i64, Option<String>);

fn material_from_row(row: MaterialRow) -> Material {
    let (id, module_title, description, module_type, file_url, course_name, course_id, tags) = row;
    Material {
        id,
        module_title,
        description,
        module_type,
        file_url,
        course_name,
        course_id,
        tags: tags
            .map(|t| t.split(',').map(str::to_string).collect())
            .unwrap_or_default(),
    }
}

/// Org-wide module listing, optionally narrowed to a set of tags.
pub async fn materials(
    db: &SqlitePool,
    organisation_id: i64,
    tag_ids: &[i64],
) -> ApiResult<Vec<Material>> {
    let mut sql = String::from(
        r#"
        SELECT m.id, m.title, m.description, m.module_type, m.file_url,
               c.name, c.id, GROUP_CONCAT(DISTINCT t.name)
        FROM modules m
        JOIN courses c ON c.id = m.course_id
        LEFT JOIN module_tags mt ON mt.module_id = m.id
        LEFT JOIN tags t ON t.id = mt.tag_id
        WHERE c.organisation_id = ?
        "#,
    );
    if !tag_ids.is_empty() {
        sql.push_str(&format!(" AND mt.tag_id IN {}", id_list(tag_ids)));
    }
    sql.push_str(" GROUP BY m.id ORDER BY c.name, m.title");

    let rows: Vec<MaterialRow> = sqlx::query_as(&sql)
        .bind(organisation_id)
        .fetch_all(db)
        .await?;
    Ok(rows.into_iter().map(material_from_row).collect())
}

/// Modules ranked by overlap with the user's onboarding-derived tags.
pub async fn materials_by_user_tags(
    db: &SqlitePool,
    organisation_id: i64,
    user_id: i64,
) -> ApiResult<(Vec<Material>, Vec<i64>)> {
    let user_tags: Vec<i64> = sqlx::query_scalar(
        r#"
        SELECT DISTINCT oqo.tag_id
        FROM onboarding_responses resp
        JOIN onboarding_question_options oqo ON oqo.id = resp.option_id
        WHERE resp.user_id = ? AND oqo.tag_id IS NOT NULL
        "#,
    )
    .bind(user_id)
    .fetch_all(db)
    .await?;

    if user_tags.is_empty() {
        return Ok((Vec::new(), user_tags));
    }

    let sql = format!(
        r#"
        SELECT m.id, m.title, m.description, m.module_type, m.file_url,
               c.name, c.id, GROUP_CONCAT(DISTINCT t.name)
        FROM modules m
        JOIN courses c ON c.id = m.course_id
        JOIN module_tags mt ON mt.module_id = m.id
        JOIN tags t ON t.id = mt.tag_id
        WHERE c.organisation_id = ? AND mt.tag_id IN {ids}
        GROUP BY m.id
        ORDER BY COUNT(DISTINCT mt.tag_id) DESC, c.name, m.title
        "#,
        ids = id_list(&user_tags)
    );
    let rows: Vec<MaterialRow> = sqlx::query_as(&sql)
        .bind(organisation_id)
        .fetch_all(db)
        .await?;
    Ok((rows.into_iter().map(material_from_row).collect(), user_tags))
}

/// Render ids as a SQL `IN` list. The ids are primary keys we generated,
/// never caller strings. An empty slice yields `(NULL)`, which matches
/// nothing.
pub(crate) fn id_list(ids: &[i64]) -> String {
    if ids.is_empty() {
        return "(NULL)".to_string();
    }
    let mut out = String::from("(");
    for (i, id) in ids.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&id.to_string());
    }
    out.push(')');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{account, db::connect_memory, enrollment, org};

    async fn setup() -> (SqlitePool, i64, i64) {
        let pool = connect_memory().await.unwrap();
        let admin = account::create_user(&pool, "admin@example.com", "secret-pw", "", "")
            .await
            .unwrap();
        let org = org::create_organisation(&pool, admin, "Acme").await.unwrap();
        (pool, admin, org.id)
    }

    fn video(url: &str) -> ModuleContent {
        ModuleContent::Video {
            file_url: url.to_string(),
        }
    }

    #[tokio::test]
    async fn course_name_unique_per_org() {
        let (pool, admin, org_id) = setup().await;
        create_course(&pool, org_id, admin, "Rust 101", "", None, None)
            .await
            .unwrap();
        let err = create_course(&pool, org_id, admin, "Rust 101", "", None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[tokio::test]
    async fn new_module_fans_out_to_existing_enrollments() {
        let (pool, admin, org_id) = setup().await;
        let course = create_course(&pool, org_id, admin, "Rust 101", "", None, None)
            .await
            .unwrap();
        create_module(&pool, course, "Intro", "", &video("a.mp4"), &[], &[])
            .await
            .unwrap();

        let learner = account::create_user(&pool, "amy@example.com", "secret-pw", "", "")
            .await
            .unwrap();
        enrollment::enroll(&pool, learner, course).await.unwrap();

        let late_module = create_module(&pool, course, "Late", "", &video("b.mp4"), &[], &[])
            .await
            .unwrap();

        let status: String = sqlx::query_scalar(
            r#"
            SELECT ms.status FROM module_status ms
            JOIN enrollments e ON e.id = ms.enrollment_id
            WHERE e.user_id = ? AND ms.module_id = ?
            "#,
        )
        .bind(learner)
        .bind(late_module)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(status, "not_started");
    }

    #[tokio::test]
    async fn content_edit_resets_progress_and_bumps_revision() {
        let (pool, admin, org_id) = setup().await;
        let course = create_course(&pool, org_id, admin, "Rust 101", "", None, None)
            .await
            .unwrap();
        let quiz_content = QuizContent {
            title: "Checkpoint".to_string(),
            questions: vec![QuestionContent {
                question_text: "2 + 2?".to_string(),
                options: vec![
                    OptionContent {
                        option_text: "4".to_string(),
                        is_correct: true,
                    },
                    OptionContent {
                        option_text: "5".to_string(),
                        is_correct: false,
                    },
                ],
            }],
        };
        let module = create_module(
            &pool,
            course,
            "Quiz",
            "",
            &ModuleContent::Quiz {
                quiz: quiz_content.clone(),
            },
            &[],
            &[],
        )
        .await
        .unwrap();

        let learner = account::create_user(&pool, "amy@example.com", "secret-pw", "", "")
            .await
            .unwrap();
        enrollment::enroll(&pool, learner, course).await.unwrap();
        enrollment::start_module(&pool, learner, module).await.unwrap();

        update_module(
            &pool,
            module,
            "Quiz",
            "",
            Some(&ModuleContent::Quiz { quiz: quiz_content }),
            &[],
            &[],
        )
        .await
        .unwrap();

        let status: String =
            sqlx::query_scalar("SELECT status FROM module_status WHERE module_id = ?")
                .bind(module)
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(status, "not_started");

        let version: i64 =
            sqlx::query_scalar("SELECT MAX(version) FROM revisions WHERE module_id = ?")
                .bind(module)
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(version, 2);
    }

    #[test]
    fn id_list_renders_safe_sql() {
        assert_eq!(id_list(&[]), "(NULL)");
        assert_eq!(id_list(&[1, 2, 3]), "(1,2,3)");
    }
}
