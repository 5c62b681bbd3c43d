//! Quiz responses and grading. A response is immutable raw data; grading
//! is recomputed from answers and options on every read.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use time::OffsetDateTime;
use utoipa::ToSchema;

use crate::{
    enrollment,
    error::{ApiError, ApiResult},
    utils::now,
};

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnswerInput {
    pub question_id: i64,
    pub selected_option_ids: Vec<i64>,
}

/// Persist one response with one answer row per (question, option) pair,
/// then force the backing module to completed. One transaction.
pub async fn submit(
    db: &SqlitePool,
    user_id: i64,
    quiz_id: i64,
    answers: &[AnswerInput],
) -> ApiResult<i64> {
    let mut tx = db.begin().await?;

    let chain: Option<(i64, i64)> = sqlx::query_as(
        r#"
        SELECT r.module_id, m.course_id
        FROM quizzes q
        JOIN revisions r ON r.id = q.revision_id
        JOIN modules m ON m.id = r.module_id
        WHERE q.id = ?
        "#,
    )
    .bind(quiz_id)
    .fetch_optional(&mut *tx)
    .await?;
    let Some((module_id, course_id)) = chain else {
        return Err(ApiError::NotFound("Quiz"));
    };

    let enrollment_id: Option<i64> =
        sqlx::query_scalar("SELECT id FROM enrollments WHERE user_id = ? AND course_id = ?")
            .bind(user_id)
            .bind(course_id)
            .fetch_optional(&mut *tx)
            .await?;
    let Some(enrollment_id) = enrollment_id else {
        return Err(ApiError::NotFound("Enrollment"));
    };

    let response_id =
        sqlx::query("INSERT INTO quiz_responses (user_id, quiz_id, submitted_at) VALUES (?, ?, ?)")
            .bind(user_id)
            .bind(quiz_id)
            .bind(now())
            .execute(&mut *tx)
            .await?
            .last_insert_rowid();

    for answer in answers {
        for option_id in &answer.selected_option_ids {
            sqlx::query(
                "INSERT INTO quiz_answers (response_id, question_id, selected_option_id) VALUES (?, ?, ?)",
            )
            .bind(response_id)
            .bind(answer.question_id)
            .bind(option_id)
            .execute(&mut *tx)
            .await?;
        }
    }

    // submission implies completion, whatever the prior state
    enrollment::force_complete_module(&mut tx, enrollment_id, module_id).await?;

    tx.commit().await?;
    Ok(response_id)
}

#[derive(Debug, Serialize, ToSchema)]
pub struct GradedOption {
    pub id: i64,
    pub option_text: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct GradedQuestion {
    pub question_id: i64,
    pub question_text: String,
    pub correct_options: Vec<GradedOption>,
    pub selected_options: Vec<GradedOption>,
    pub is_correct: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct GradedResponse {
    pub response_id: i64,
    pub quiz_id: i64,
    pub user_id: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub submitted_at: OffsetDateTime,
    pub questions: Vec<GradedQuestion>,
    pub correct_questions: i64,
    pub total_questions: i64,
}

/// Grade a stored response. Every question of the quiz is graded, whether
/// answered or not: correctness is exact set equality between the options
/// flagged correct and the options selected. Both sets empty counts as
/// correct; that falls out of the rule and is deliberately not
/// special-cased.
pub async fn grade(db: &SqlitePool, response_id: i64) -> ApiResult<GradedResponse> {
    let response: Option<(i64, i64, OffsetDateTime)> =
        sqlx::query_as("SELECT quiz_id, user_id, submitted_at FROM quiz_responses WHERE id = ?")
            .bind(response_id)
            .fetch_optional(db)
            .await?;
    let Some((quiz_id, user_id, submitted_at)) = response else {
        return Err(ApiError::NotFound("Quiz response"));
    };

    let questions: Vec<(i64, String)> = sqlx::query_as(
        "SELECT id, question_text FROM questions WHERE quiz_id = ? ORDER BY position, id",
    )
    .bind(quiz_id)
    .fetch_all(db)
    .await?;

    let options: Vec<(i64, i64, String, bool)> = sqlx::query_as(
        r#"
        SELECT o.id, o.question_id, o.option_text, o.is_correct
        FROM question_options o
        JOIN questions qs ON qs.id = o.question_id
        WHERE qs.quiz_id = ?
        ORDER BY o.id
        "#,
    )
    .bind(quiz_id)
    .fetch_all(db)
    .await?;
    let mut option_text: HashMap<i64, String> = HashMap::new();
    let mut correct_by_question: HashMap<i64, BTreeSet<i64>> = HashMap::new();
    for (id, question_id, text, is_correct) in options {
        option_text.insert(id, text);
        if is_correct {
            correct_by_question.entry(question_id).or_default().insert(id);
        }
    }

    let answers: Vec<(i64, i64)> =
        sqlx::query_as("SELECT question_id, selected_option_id FROM quiz_answers WHERE response_id = ?")
            .bind(response_id)
            .fetch_all(db)
            .await?;
    let mut selected_by_question: HashMap<i64, BTreeSet<i64>> = HashMap::new();
    for (question_id, option_id) in answers {
        selected_by_question
            .entry(question_id)
            .or_default()
            .insert(option_id);
    }

    let to_options = |ids: &BTreeSet<i64>| -> Vec<GradedOption> {
        ids.iter()
            .map(|id| GradedOption {
                id: *id,
                option_text: option_text.get(id).cloned().unwrap_or_default(),
            })
            .collect()
    };

    let mut graded = Vec::with_capacity(questions.len());
    let mut correct_questions = 0;
    for (question_id, question_text) in &questions {
        let correct = correct_by_question.remove(question_id).unwrap_or_default();
        let selected = selected_by_question.remove(question_id).unwrap_or_default();
        let is_correct = correct == selected;
        if is_correct {
            correct_questions += 1;
        }
        graded.push(GradedQuestion {
            question_id: *question_id,
            question_text: question_text.clone(),
            correct_options: to_options(&correct),
            selected_options: to_options(&selected),
            is_correct,
        });
    }

    Ok(GradedResponse {
        response_id,
        quiz_id,
        user_id,
        submitted_at,
        total_questions: questions.len() as i64,
        correct_questions,
        questions: graded,
    })
}

/// The user's most recent response to a quiz, if any.
pub async fn latest_response_id(
    db: &SqlitePool,
    user_id: i64,
    quiz_id: i64,
) -> ApiResult<Option<i64>> {
    Ok(sqlx::query_scalar(
        "SELECT MAX(id) FROM quiz_responses WHERE user_id = ? AND quiz_id = ?",
    )
    .bind(user_id)
    .bind(quiz_id)
    .fetch_one(db)
    .await?)
}

pub async fn latest_graded(db: &SqlitePool, user_id: i64, quiz_id: i64) -> ApiResult<GradedResponse> {
    let Some(response_id) = latest_response_id(db, user_id, quiz_id).await? else {
        return Err(ApiError::NotFound("Quiz response"));
    };
    grade(db, response_id).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        account,
        catalog::{self, ModuleContent, OptionContent, QuestionContent, QuizContent},
        db::connect_memory,
        enrollment, org,
    };

    struct Fixture {
        pool: SqlitePool,
        learner: i64,
        course: i64,
        module: i64,
        quiz: i64,
        questions: Vec<(i64, Vec<(i64, bool)>)>,
    }

    /// One course, one quiz module with two questions:
    /// q0 has correct options {A, B} of {A, B, C}; q1 has no correct option.
    async fn fixture() -> Fixture {
        let pool = connect_memory().await.unwrap();
        let admin = account::create_user(&pool, "admin@example.com", "secret-pw", "", "")
            .await
            .unwrap();
        let org = org::create_organisation(&pool, admin, "Acme").await.unwrap();
        let course = catalog::create_course(&pool, org.id, admin, "Rust 101", "", None, None)
            .await
            .unwrap();
        let module = catalog::create_module(
            &pool,
            course,
            "Checkpoint",
            "",
            &ModuleContent::Quiz {
                quiz: QuizContent {
                    title: "Checkpoint".to_string(),
                    questions: vec![
                        QuestionContent {
                            question_text: "Pick both borrow kinds".to_string(),
                            options: vec![
                                OptionContent {
                                    option_text: "shared".to_string(),
                                    is_correct: true,
                                },
                                OptionContent {
                                    option_text: "mutable".to_string(),
                                    is_correct: true,
                                },
                                OptionContent {
                                    option_text: "garbage-collected".to_string(),
                                    is_correct: false,
                                },
                            ],
                        },
                        QuestionContent {
                            question_text: "Survey: favourite crate?".to_string(),
                            options: vec![],
                        },
                    ],
                },
            },
            &[],
            &[],
        )
        .await
        .unwrap();

        let detail = catalog::get_module(&pool, module).await.unwrap();
        let quiz_view = detail.quiz.unwrap();
        let questions = quiz_view
            .questions
            .iter()
            .map(|q| {
                (
                    q.id,
                    q.options.iter().map(|o| (o.id, o.is_correct)).collect(),
                )
            })
            .collect();

        let learner = account::create_user(&pool, "amy@example.com", "secret-pw", "", "")
            .await
            .unwrap();
        enrollment::enroll(&pool, learner, course).await.unwrap();

        Fixture {
            pool,
            learner,
            course,
            module,
            quiz: quiz_view.id,
            questions,
        }
    }

    fn correct_ids(options: &[(i64, bool)]) -> Vec<i64> {
        options.iter().filter(|(_, c)| *c).map(|(id, _)| *id).collect()
    }

    #[tokio::test]
    async fn exact_set_equality_grades_correct() {
        let fx = fixture().await;
        let (q0, ref opts) = fx.questions[0];
        let response = submit(
            &fx.pool,
            fx.learner,
            fx.quiz,
            &[AnswerInput {
                question_id: q0,
                selected_option_ids: correct_ids(opts),
            }],
        )
        .await
        .unwrap();

        let graded = grade(&fx.pool, response).await.unwrap();
        assert_eq!(graded.total_questions, 2);
        assert!(graded.questions[0].is_correct);
        // q1: zero correct options, zero selections, vacuously correct
        assert!(graded.questions[1].is_correct);
        assert_eq!(graded.correct_questions, 2);
    }

    #[tokio::test]
    async fn subset_and_superset_grade_incorrect() {
        let fx = fixture().await;
        let (q0, ref opts) = fx.questions[0];
        let correct = correct_ids(opts);
        let all: Vec<i64> = opts.iter().map(|(id, _)| *id).collect();

        let subset = submit(
            &fx.pool,
            fx.learner,
            fx.quiz,
            &[AnswerInput {
                question_id: q0,
                selected_option_ids: vec![correct[0]],
            }],
        )
        .await
        .unwrap();
        assert!(!grade(&fx.pool, subset).await.unwrap().questions[0].is_correct);

        let superset = submit(
            &fx.pool,
            fx.learner,
            fx.quiz,
            &[AnswerInput {
                question_id: q0,
                selected_option_ids: all,
            }],
        )
        .await
        .unwrap();
        assert!(!grade(&fx.pool, superset).await.unwrap().questions[0].is_correct);
    }

    #[tokio::test]
    async fn submission_forces_module_completed() {
        let fx = fixture().await;
        let (q0, _) = fx.questions[0];
        // never started: submission still completes the module
        submit(
            &fx.pool,
            fx.learner,
            fx.quiz,
            &[AnswerInput {
                question_id: q0,
                selected_option_ids: vec![],
            }],
        )
        .await
        .unwrap();

        let progress = enrollment::course_progress(&fx.pool, fx.learner, fx.course)
            .await
            .unwrap();
        let status = progress
            .modules
            .iter()
            .find(|m| m.module_id == fx.module)
            .unwrap();
        assert_eq!(status.status, "completed");
    }

    #[tokio::test]
    async fn latest_response_wins() {
        let fx = fixture().await;
        let (q0, ref opts) = fx.questions[0];

        submit(
            &fx.pool,
            fx.learner,
            fx.quiz,
            &[AnswerInput {
                question_id: q0,
                selected_option_ids: vec![],
            }],
        )
        .await
        .unwrap();
        let second = submit(
            &fx.pool,
            fx.learner,
            fx.quiz,
            &[AnswerInput {
                question_id: q0,
                selected_option_ids: correct_ids(opts),
            }],
        )
        .await
        .unwrap();

        let latest = latest_graded(&fx.pool, fx.learner, fx.quiz).await.unwrap();
        assert_eq!(latest.response_id, second);
        assert!(latest.questions[0].is_correct);
    }

    #[tokio::test]
    async fn submit_requires_enrollment() {
        let fx = fixture().await;
        let outsider = account::create_user(&fx.pool, "bo@example.com", "secret-pw", "", "")
            .await
            .unwrap();
        let err = submit(&fx.pool, outsider, fx.quiz, &[]).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound("Enrollment")));
    }
}
