use serde::Serialize;
use serde_json::json;
use sqlx::SqlitePool;
use utoipa::ToSchema;

use crate::{
    activity,
    error::{ApiError, ApiResult, is_unique_violation},
    session::Role,
    utils::now,
};

#[derive(Debug, Serialize, ToSchema)]
pub struct Organisation {
    pub id: i64,
    pub name: String,
    pub ai_enabled: bool,
    pub role: Role,
}

/// Create an organisation and make the creator its admin. One transaction:
/// a user already belonging to an organisation, or a taken name, rolls the
/// whole thing back.
pub async fn create_organisation(
    db: &SqlitePool,
    user_id: i64,
    name: &str,
) -> ApiResult<Organisation> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ApiError::validation("organisationName is required"));
    }

    let mut tx = db.begin().await?;

    let org_id = sqlx::query("INSERT INTO organisations (name, ai_enabled, created_at) VALUES (?, 1, ?)")
        .bind(name)
        .bind(now())
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                ApiError::validation("Organization name already taken")
            } else {
                e.into()
            }
        })?
        .last_insert_rowid();

    sqlx::query("INSERT INTO organisation_users (user_id, organisation_id, role) VALUES (?, ?, 'admin')")
        .bind(user_id)
        .bind(org_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                ApiError::validation("User already belongs to an organization")
            } else {
                e.into()
            }
        })?;

    activity::log(
        &mut tx,
        user_id,
        org_id,
        "create_organisation",
        json!({ "organisationId": org_id, "name": name }),
        json!({ "Organization Name": name }),
    )
    .await?;

    tx.commit().await?;

    Ok(Organisation {
        id: org_id,
        name: name.to_string(),
        ai_enabled: true,
        role: Role::Admin,
    })
}

#[derive(Debug, Serialize, sqlx::FromRow, ToSchema)]
pub struct Membership {
    pub id: i64,
    pub name: String,
    pub role: String,
    pub ai_enabled: bool,
}

/// The single organisation (and role) of a user, if any.
pub async fn my_organisation(db: &SqlitePool, user_id: i64) -> ApiResult<Option<Membership>> {
    let membership = sqlx::query_as::<_, Membership>(
        r#"
        SELECT o.id, o.name, ou.role, o.ai_enabled
        FROM organisation_users ou
        JOIN organisations o ON o.id = ou.organisation_id
        WHERE ou.user_id = ?
        "#,
    )
    .bind(user_id)
    .fetch_optional(db)
    .await?;
    Ok(membership)
}

/// Attach an existing user to the organisation. The member's own session
/// cookie keeps its old snapshot until they log in again.
pub async fn add_member(
    db: &SqlitePool,
    organisation_id: i64,
    email: &str,
    role: Role,
) -> ApiResult<i64> {
    let user_id: Option<i64> = sqlx::query_scalar("SELECT id FROM users WHERE email = ?")
        .bind(email)
        .fetch_optional(db)
        .await?;
    let Some(user_id) = user_id else {
        return Err(ApiError::NotFound("User"));
    };

    sqlx::query("INSERT INTO organisation_users (user_id, organisation_id, role) VALUES (?, ?, ?)")
        .bind(user_id)
        .bind(organisation_id)
        .bind(role.as_str())
        .execute(db)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                ApiError::validation("User already belongs to an organization")
            } else {
                e.into()
            }
        })?;
    Ok(user_id)
}

pub async fn update_settings(db: &SqlitePool, organisation_id: i64, ai_enabled: bool) -> ApiResult<()> {
    let updated = sqlx::query("UPDATE organisations SET ai_enabled = ? WHERE id = ?")
        .bind(ai_enabled)
        .bind(organisation_id)
        .execute(db)
        .await?
        .rows_affected();
    if updated == 0 {
        return Err(ApiError::NotFound("Organization"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{account, db::connect_memory};

    #[tokio::test]
    async fn create_org_links_creator_as_admin() {
        let pool = connect_memory().await.unwrap();
        let user_id = account::create_user(&pool, "kay@example.com", "secret-pw", "Kay", "Li")
            .await
            .unwrap();

        let org = create_organisation(&pool, user_id, "Acme").await.unwrap();
        assert_eq!(org.role, Role::Admin);

        let membership = my_organisation(&pool, user_id).await.unwrap().unwrap();
        assert_eq!(membership.name, "Acme");
        assert_eq!(membership.role, "admin");
        assert!(membership.ai_enabled);
    }

    #[tokio::test]
    async fn members_join_as_employees_once() {
        let pool = connect_memory().await.unwrap();
        let admin = account::create_user(&pool, "kay@example.com", "secret-pw", "", "")
            .await
            .unwrap();
        let org = create_organisation(&pool, admin, "Acme").await.unwrap();
        let learner = account::create_user(&pool, "amy@example.com", "secret-pw", "", "")
            .await
            .unwrap();

        let added = add_member(&pool, org.id, "amy@example.com", Role::Employee)
            .await
            .unwrap();
        assert_eq!(added, learner);
        let membership = my_organisation(&pool, learner).await.unwrap().unwrap();
        assert_eq!(membership.role, "employee");

        let err = add_member(&pool, org.id, "amy@example.com", Role::Employee)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
        let err = add_member(&pool, org.id, "ghost@example.com", Role::Employee)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn duplicate_org_name_is_rejected() {
        let pool = connect_memory().await.unwrap();
        let a = account::create_user(&pool, "a@example.com", "secret-pw", "", "")
            .await
            .unwrap();
        let b = account::create_user(&pool, "b@example.com", "secret-pw", "", "")
            .await
            .unwrap();

        create_organisation(&pool, a, "Acme").await.unwrap();
        let err = create_organisation(&pool, b, "Acme").await.unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
        // rollback: second user must not have been linked anywhere
        assert!(my_organisation(&pool, b).await.unwrap().is_none());
    }
}
