// src/services/school_service.rs
use crate::{
    error::{AppError, AppResult},
    models::school::{School, SchoolForm},
};
use sqlx::SqlitePool;

pub async fn list_schools(db_pool: &SqlitePool) -> AppResult<Vec<School>> {
    let schools = sqlx::query_as::<_, School>(
        "SELECT id, name, city, state, logo_url, created_at FROM schools ORDER BY name ASC",
    )
    .fetch_all(db_pool)
    .await?;
    Ok(schools)
}

pub async fn find_school(db_pool: &SqlitePool, school_id: i64) -> AppResult<Option<School>> {
    let school = sqlx::query_as::<_, School>(
        "SELECT id, name, city, state, logo_url, created_at FROM schools WHERE id = ?1",
    )
    .bind(school_id)
    .fetch_optional(db_pool)
    .await?;
    Ok(school)
}

pub async fn create_school(db_pool: &SqlitePool, form: &SchoolForm) -> AppResult<i64> {
    if form.name.trim().is_empty() {
        return Err(AppError::Validation("School name is required.".into()));
    }
    let result = sqlx::query("INSERT INTO schools (name, city, state, logo_url) VALUES (?1, ?2, ?3, ?4)")
        .bind(form.name.trim())
        .bind(form.city.trim())
        .bind(form.state.trim())
        .bind(form.logo())
        .execute(db_pool)
        .await;

    match result {
        Ok(done) => {
            tracing::info!("🏫 School '{}' created.", form.name.trim());
            Ok(done.last_insert_rowid())
        }
        Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
            Err(AppError::Validation("A school with this name already exists.".into()))
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn update_school(db_pool: &SqlitePool, school_id: i64, form: &SchoolForm) -> AppResult<()> {
    if form.name.trim().is_empty() {
        return Err(AppError::Validation("School name is required.".into()));
    }
    let result = sqlx::query("UPDATE schools SET name = ?1, city = ?2, state = ?3, logo_url = ?4 WHERE id = ?5")
        .bind(form.name.trim())
        .bind(form.city.trim())
        .bind(form.state.trim())
        .bind(form.logo())
        .bind(school_id)
        .execute(db_pool)
        .await;

    match result {
        Ok(done) if done.rows_affected() == 0 => Err(AppError::NotFound("School".into())),
        Ok(_) => Ok(()),
        Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
            Err(AppError::Validation("A school with this name already exists.".into()))
        }
        Err(e) => Err(e.into()),
    }
}
