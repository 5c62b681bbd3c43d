//! Organisation-scoped reference tables: skills, channels, levels, tags.
//! Flat CRUD, admin-gated at the handler layer.

use serde::Serialize;
use sqlx::SqlitePool;
use utoipa::ToSchema;

use crate::error::{ApiError, ApiResult};

#[derive(Debug, Serialize, sqlx::FromRow, ToSchema)]
pub struct Skill {
    pub id: i64,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Serialize, sqlx::FromRow, ToSchema)]
pub struct Channel {
    pub id: i64,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Serialize, sqlx::FromRow, ToSchema)]
pub struct Level {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub sort_order: i64,
}

#[derive(Debug, Serialize, sqlx::FromRow, ToSchema)]
pub struct Tag {
    pub id: i64,
    pub name: String,
}

fn require_name(name: &str) -> ApiResult<&str> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ApiError::validation("name is required"));
    }
    Ok(name)
}

pub async fn list_skills(db: &SqlitePool, organisation_id: i64) -> ApiResult<Vec<Skill>> {
    Ok(sqlx::query_as(
        "SELECT id, name, description FROM skills WHERE organisation_id = ? ORDER BY name",
    )
    .bind(organisation_id)
    .fetch_all(db)
    .await?)
}

pub async fn create_skill(
    db: &SqlitePool,
    organisation_id: i64,
    name: &str,
    description: &str,
) -> ApiResult<i64> {
    let name = require_name(name)?;
    let id = sqlx::query("INSERT INTO skills (organisation_id, name, description) VALUES (?, ?, ?)")
        .bind(organisation_id)
        .bind(name)
        .bind(description)
        .execute(db)
        .await?
        .last_insert_rowid();
    Ok(id)
}

pub async fn delete_skill(db: &SqlitePool, organisation_id: i64, id: i64) -> ApiResult<()> {
    let deleted = sqlx::query("DELETE FROM skills WHERE id = ? AND organisation_id = ?")
        .bind(id)
        .bind(organisation_id)
        .execute(db)
        .await?
        .rows_affected();
    if deleted == 0 {
        return Err(ApiError::NotFound("Skill"));
    }
    Ok(())
}

pub async fn list_channels(db: &SqlitePool, organisation_id: i64) -> ApiResult<Vec<Channel>> {
    Ok(sqlx::query_as(
        "SELECT id, name, description FROM channels WHERE organisation_id = ? ORDER BY name",
    )
    .bind(organisation_id)
    .fetch_all(db)
    .await?)
}

pub async fn create_channel(
    db: &SqlitePool,
    organisation_id: i64,
    name: &str,
    description: &str,
) -> ApiResult<i64> {
    let name = require_name(name)?;
    let id =
        sqlx::query("INSERT INTO channels (organisation_id, name, description) VALUES (?, ?, ?)")
            .bind(organisation_id)
            .bind(name)
            .bind(description)
            .execute(db)
            .await?
            .last_insert_rowid();
    Ok(id)
}

pub async fn delete_channel(db: &SqlitePool, organisation_id: i64, id: i64) -> ApiResult<()> {
    let deleted = sqlx::query("DELETE FROM channels WHERE id = ? AND organisation_id = ?")
        .bind(id)
        .bind(organisation_id)
        .execute(db)
        .await?
        .rows_affected();
    if deleted == 0 {
        return Err(ApiError::NotFound("Channel"));
    }
    Ok(())
}

pub async fn list_levels(db: &SqlitePool, organisation_id: i64) -> ApiResult<Vec<Level>> {
    Ok(sqlx::query_as(
        "SELECT id, name, description, sort_order FROM levels WHERE organisation_id = ? ORDER BY sort_order, name",
    )
    .bind(organisation_id)
    .fetch_all(db)
    .await?)
}

pub async fn create_level(
    db: &SqlitePool,
    organisation_id: i64,
    name: &str,
    description: &str,
    sort_order: i64,
) -> ApiResult<i64> {
    let name = require_name(name)?;
    let id = sqlx::query(
        "INSERT INTO levels (organisation_id, name, description, sort_order) VALUES (?, ?, ?, ?)",
    )
    .bind(organisation_id)
    .bind(name)
    .bind(description)
    .bind(sort_order)
    .execute(db)
    .await?
    .last_insert_rowid();
    Ok(id)
}

pub async fn delete_level(db: &SqlitePool, organisation_id: i64, id: i64) -> ApiResult<()> {
    let deleted = sqlx::query("DELETE FROM levels WHERE id = ? AND organisation_id = ?")
        .bind(id)
        .bind(organisation_id)
        .execute(db)
        .await?
        .rows_affected();
    if deleted == 0 {
        return Err(ApiError::NotFound("Level"));
    }
    Ok(())
}

pub async fn list_tags(db: &SqlitePool, organisation_id: i64) -> ApiResult<Vec<Tag>> {
    Ok(
        sqlx::query_as("SELECT id, name FROM tags WHERE organisation_id = ? ORDER BY name")
            .bind(organisation_id)
            .fetch_all(db)
            .await?,
    )
}

pub async fn create_tag(db: &SqlitePool, organisation_id: i64, name: &str) -> ApiResult<i64> {
    let name = require_name(name)?;
    let id = sqlx::query("INSERT INTO tags (organisation_id, name) VALUES (?, ?)")
        .bind(organisation_id)
        .bind(name)
        .execute(db)
        .await?
        .last_insert_rowid();
    Ok(id)
}

pub async fn delete_tag(db: &SqlitePool, organisation_id: i64, id: i64) -> ApiResult<()> {
    let deleted = sqlx::query("DELETE FROM tags WHERE id = ? AND organisation_id = ?")
        .bind(id)
        .bind(organisation_id)
        .execute(db)
        .await?
        .rows_affected();
    if deleted == 0 {
        return Err(ApiError::NotFound("Tag"));
    }
    Ok(())
}
