use argon2::{
    Argon2, PasswordVerifier,
    password_hash::{PasswordHash, PasswordHasher, SaltString, rand_core::OsRng},
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use utoipa::ToSchema;

use crate::{
    error::{ApiError, ApiResult, is_unique_violation},
    org,
    session::{OrgSession, Role, SessionUser},
    utils::now,
};

const VALID_SKILL_LEVELS: [&str; 4] = ["beginner", "intermediate", "advanced", "expert"];

fn hash_password(password: &str) -> ApiResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("failed to hash password: {e}"))?
        .to_string();
    Ok(hash)
}

fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

pub async fn create_user(
    db: &SqlitePool,
    email: &str,
    password: &str,
    firstname: &str,
    lastname: &str,
) -> ApiResult<i64> {
    if email.trim().is_empty() || password.is_empty() {
        return Err(ApiError::validation("email and password are required"));
    }
    let password_hash = hash_password(password)?;
    let id = sqlx::query(
        r#"
        INSERT INTO users (email, password_hash, firstname, lastname, created_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(email.trim())
    .bind(password_hash)
    .bind(firstname)
    .bind(lastname)
    .bind(now())
    .execute(db)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            ApiError::validation("Email already registered")
        } else {
            e.into()
        }
    })?
    .last_insert_rowid();
    Ok(id)
}

/// Verify credentials and assemble the full session snapshot, including
/// the organisation membership if one exists.
pub async fn login(db: &SqlitePool, email: &str, password: &str) -> ApiResult<SessionUser> {
    let row: Option<(i64, String, String, String, bool)> = sqlx::query_as(
        r#"
        SELECT id, password_hash, firstname, lastname, has_completed_onboarding
        FROM users WHERE email = ?
        "#,
    )
    .bind(email)
    .fetch_optional(db)
    .await?;

    let Some((user_id, password_hash, firstname, lastname, has_completed_onboarding)) = row else {
        return Err(ApiError::Unauthorized);
    };
    if !verify_password(password, &password_hash) {
        return Err(ApiError::Unauthorized);
    }

    let organisation = org::my_organisation(db, user_id).await?.map(|m| OrgSession {
        id: m.id,
        role: if m.role == "admin" {
            Role::Admin
        } else {
            Role::Employee
        },
        ai_enabled: m.ai_enabled,
    });

    Ok(SessionUser {
        user_id,
        email: email.to_string(),
        firstname,
        lastname,
        is_logged_in: true,
        has_completed_onboarding,
        organisation,
    })
}

#[derive(Debug, Serialize, sqlx::FromRow, ToSchema)]
pub struct OrgUser {
    pub id: i64,
    pub firstname: String,
    pub lastname: String,
    pub email: String,
    pub role: String,
}

pub async fn list_org_users(db: &SqlitePool, organisation_id: i64) -> ApiResult<Vec<OrgUser>> {
    Ok(sqlx::query_as(
        r#"
        SELECT u.id, u.firstname, u.lastname, u.email, ou.role
        FROM users u
        JOIN organisation_users ou ON u.id = ou.user_id
        WHERE ou.organisation_id = ?
        ORDER BY u.lastname, u.firstname
        "#,
    )
    .bind(organisation_id)
    .fetch_all(db)
    .await?)
}

pub async fn delete_user(db: &SqlitePool, user_id: i64) -> ApiResult<()> {
    let deleted = sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(user_id)
        .execute(db)
        .await?
        .rows_affected();
    if deleted == 0 {
        return Err(ApiError::NotFound("User"));
    }
    Ok(())
}

/// Update names/email. Returns the refreshed fields for cookie reissue.
pub async fn update_profile(
    db: &SqlitePool,
    user_id: i64,
    firstname: &str,
    lastname: &str,
    email: &str,
) -> ApiResult<()> {
    if firstname.is_empty() || lastname.is_empty() || email.is_empty() {
        return Err(ApiError::validation("Missing required fields"));
    }

    let mut tx = db.begin().await?;

    let in_use: Option<i64> = sqlx::query_scalar("SELECT id FROM users WHERE email = ? AND id != ?")
        .bind(email)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;
    if in_use.is_some() {
        return Err(ApiError::validation("Email already in use"));
    }

    let updated =
        sqlx::query("UPDATE users SET firstname = ?, lastname = ?, email = ? WHERE id = ?")
            .bind(firstname)
            .bind(lastname)
            .bind(email)
            .bind(user_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
    if updated == 0 {
        return Err(ApiError::NotFound("User"));
    }

    tx.commit().await?;
    Ok(())
}

pub async fn change_password(
    db: &SqlitePool,
    user_id: i64,
    current_password: &str,
    new_password: &str,
) -> ApiResult<()> {
    if current_password.is_empty() || new_password.is_empty() {
        return Err(ApiError::validation("Missing required fields"));
    }
    if new_password.len() < 8 {
        return Err(ApiError::validation(
            "New password must be at least 8 characters long",
        ));
    }

    let current_hash: Option<String> =
        sqlx::query_scalar("SELECT password_hash FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(db)
            .await?;
    let Some(current_hash) = current_hash else {
        return Err(ApiError::NotFound("User"));
    };
    if !verify_password(current_password, &current_hash) {
        return Err(ApiError::validation("Current password is incorrect"));
    }

    let new_hash = hash_password(new_password)?;
    sqlx::query("UPDATE users SET password_hash = ? WHERE id = ?")
        .bind(new_hash)
        .bind(user_id)
        .execute(db)
        .await?;
    Ok(())
}

#[derive(Debug, Serialize, sqlx::FromRow, ToSchema)]
pub struct UserSkill {
    pub skill_id: i64,
    pub skill_name: String,
    pub level: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SkillOverview {
    pub user_skills: Vec<UserSkill>,
    pub available_skills: Vec<crate::taxonomy::Skill>,
}

pub async fn skill_overview(
    db: &SqlitePool,
    user_id: i64,
    organisation_id: i64,
) -> ApiResult<SkillOverview> {
    let user_skills = sqlx::query_as(
        r#"
        SELECT us.skill_id, s.name AS skill_name, us.level
        FROM user_skills us
        JOIN skills s ON us.skill_id = s.id
        WHERE us.user_id = ?
        ORDER BY s.name
        "#,
    )
    .bind(user_id)
    .fetch_all(db)
    .await?;
    let available_skills = crate::taxonomy::list_skills(db, organisation_id).await?;
    Ok(SkillOverview {
        user_skills,
        available_skills,
    })
}

fn validate_skill_level(level: &str) -> ApiResult<()> {
    if !VALID_SKILL_LEVELS.contains(&level) {
        return Err(ApiError::validation("Invalid skill level"));
    }
    Ok(())
}

pub async fn add_user_skill(
    db: &SqlitePool,
    user_id: i64,
    skill_id: i64,
    level: &str,
) -> ApiResult<()> {
    validate_skill_level(level)?;

    let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM skills WHERE id = ?")
        .bind(skill_id)
        .fetch_optional(db)
        .await?;
    if exists.is_none() {
        return Err(ApiError::NotFound("Skill"));
    }

    sqlx::query("INSERT INTO user_skills (user_id, skill_id, level, updated_at) VALUES (?, ?, ?, ?)")
        .bind(user_id)
        .bind(skill_id)
        .bind(level)
        .bind(now())
        .execute(db)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                ApiError::validation("Skill already added")
            } else {
                e.into()
            }
        })?;
    Ok(())
}

pub async fn update_user_skill(
    db: &SqlitePool,
    user_id: i64,
    skill_id: i64,
    level: &str,
) -> ApiResult<()> {
    validate_skill_level(level)?;
    let updated = sqlx::query(
        "UPDATE user_skills SET level = ?, updated_at = ? WHERE user_id = ? AND skill_id = ?",
    )
    .bind(level)
    .bind(now())
    .bind(user_id)
    .bind(skill_id)
    .execute(db)
    .await?
    .rows_affected();
    if updated == 0 {
        return Err(ApiError::NotFound("Skill"));
    }
    Ok(())
}

pub async fn remove_user_skill(db: &SqlitePool, user_id: i64, skill_id: i64) -> ApiResult<()> {
    let deleted = sqlx::query("DELETE FROM user_skills WHERE user_id = ? AND skill_id = ?")
        .bind(user_id)
        .bind(skill_id)
        .execute(db)
        .await?
        .rows_affected();
    if deleted == 0 {
        return Err(ApiError::NotFound("Skill"));
    }
    Ok(())
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Preferences {
    /// Channel ids in preference order, most preferred first.
    pub channel_ids: Vec<i64>,
    /// Level ids in preference order.
    pub level_ids: Vec<i64>,
}

pub async fn preferences(db: &SqlitePool, user_id: i64) -> ApiResult<Preferences> {
    let channel_ids =
        sqlx::query_scalar("SELECT channel_id FROM user_channels WHERE user_id = ? ORDER BY position")
            .bind(user_id)
            .fetch_all(db)
            .await?;
    let level_ids =
        sqlx::query_scalar("SELECT level_id FROM user_levels WHERE user_id = ? ORDER BY position")
            .bind(user_id)
            .fetch_all(db)
            .await?;
    Ok(Preferences {
        channel_ids,
        level_ids,
    })
}

/// Replace both preference lists wholesale. These explicit preferences
/// outrank onboarding-derived ones in roadmap scoring.
pub async fn set_preferences(db: &SqlitePool, user_id: i64, prefs: &Preferences) -> ApiResult<()> {
    let mut tx = db.begin().await?;

    sqlx::query("DELETE FROM user_channels WHERE user_id = ?")
        .bind(user_id)
        .execute(&mut *tx)
        .await?;
    for (position, channel_id) in prefs.channel_ids.iter().enumerate() {
        sqlx::query("INSERT INTO user_channels (user_id, channel_id, position) VALUES (?, ?, ?)")
            .bind(user_id)
            .bind(channel_id)
            .bind(position as i64)
            .execute(&mut *tx)
            .await?;
    }

    sqlx::query("DELETE FROM user_levels WHERE user_id = ?")
        .bind(user_id)
        .execute(&mut *tx)
        .await?;
    for (position, level_id) in prefs.level_ids.iter().enumerate() {
        sqlx::query("INSERT INTO user_levels (user_id, level_id, position) VALUES (?, ?, ?)")
            .bind(user_id)
            .bind(level_id)
            .bind(position as i64)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connect_memory;

    #[tokio::test]
    async fn signup_and_login_round_trip() {
        let pool = connect_memory().await.unwrap();
        let id = create_user(&pool, "amy@example.com", "hunter2hunter2", "Amy", "Ng")
            .await
            .unwrap();

        let session = login(&pool, "amy@example.com", "hunter2hunter2")
            .await
            .unwrap();
        assert_eq!(session.user_id, id);
        assert!(session.is_logged_in);
        assert!(session.organisation.is_none());

        let err = login(&pool, "amy@example.com", "wrong").await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized));
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let pool = connect_memory().await.unwrap();
        create_user(&pool, "amy@example.com", "hunter2hunter2", "", "")
            .await
            .unwrap();
        let err = create_user(&pool, "amy@example.com", "other-password", "", "")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[tokio::test]
    async fn password_change_requires_current_password() {
        let pool = connect_memory().await.unwrap();
        let id = create_user(&pool, "amy@example.com", "hunter2hunter2", "", "")
            .await
            .unwrap();

        let err = change_password(&pool, id, "nope", "new-password-1").await.unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));

        let err = change_password(&pool, id, "hunter2hunter2", "short").await.unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));

        change_password(&pool, id, "hunter2hunter2", "new-password-1")
            .await
            .unwrap();
        login(&pool, "amy@example.com", "new-password-1").await.unwrap();
    }

    #[tokio::test]
    async fn preference_lists_replace_wholesale() {
        let pool = connect_memory().await.unwrap();
        let user = create_user(&pool, "amy@example.com", "hunter2hunter2", "", "")
            .await
            .unwrap();
        let org = crate::org::create_organisation(&pool, user, "Acme").await.unwrap();
        let ch_a = crate::taxonomy::create_channel(&pool, org.id, "Backend", "").await.unwrap();
        let ch_b = crate::taxonomy::create_channel(&pool, org.id, "Frontend", "").await.unwrap();

        set_preferences(
            &pool,
            user,
            &Preferences {
                channel_ids: vec![ch_a, ch_b],
                level_ids: vec![],
            },
        )
        .await
        .unwrap();
        set_preferences(
            &pool,
            user,
            &Preferences {
                channel_ids: vec![ch_b],
                level_ids: vec![],
            },
        )
        .await
        .unwrap();

        let prefs = preferences(&pool, user).await.unwrap();
        assert_eq!(prefs.channel_ids, vec![ch_b]);
    }
}
