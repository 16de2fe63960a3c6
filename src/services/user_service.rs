// src/services/user_service.rs
use crate::{
    error::{AppError, AppResult},
    models::user::{NewUser, Role, User, UserSummary},
    services::auth_service,
};
use sqlx::SqlitePool;

/// Constraint failures on user writes that the form can correct.
fn user_write_error(err: sqlx::Error) -> AppError {
    match err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            AppError::Validation("An account with this email already exists.".into())
        }
        sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
            AppError::Validation("Unknown school.".into())
        }
        other => other.into(),
    }
}

const USER_COLUMNS: &str = "id, name, email, password_hash, role, school_id, profile_picture, \
                            is_active, created_at, updated_at";

pub async fn find_user_by_id(db_pool: &SqlitePool, user_id: i64) -> AppResult<Option<User>> {
    tracing::debug!("Looking up user by id: {}", user_id);
    let user = sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS))
        .bind(user_id)
        .fetch_optional(db_pool)
        .await?;

    if user.is_none() {
        tracing::debug!("User {} not found.", user_id);
    }
    Ok(user)
}

pub async fn find_user_by_email(db_pool: &SqlitePool, email: &str) -> AppResult<Option<User>> {
    tracing::debug!("Looking up user by email: {}", email);
    // email column is COLLATE NOCASE
    let user = sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE email = ?1", USER_COLUMNS))
        .bind(email.trim())
        .fetch_optional(db_pool)
        .await?;
    Ok(user)
}

/// Every user with school name, derived point total and badge count.
pub async fn find_all_users(db_pool: &SqlitePool) -> AppResult<Vec<UserSummary>> {
    tracing::debug!("Loading all users...");
    let users = sqlx::query_as::<_, UserSummary>(
        r#"
        SELECT
            u.id,
            u.name,
            u.email,
            u.role,
            u.school_id,
            s.name AS school_name,
            u.is_active,
            COALESCE((SELECT SUM(e.points) FROM eco_points e WHERE e.user_id = u.id), 0) AS total_points,
            (SELECT COUNT(*) FROM user_badges ub WHERE ub.user_id = u.id) AS badge_count,
            u.created_at
        FROM users u
        LEFT JOIN schools s ON s.id = u.school_id
        ORDER BY u.role ASC, u.name ASC, u.id ASC
        "#,
    )
    .fetch_all(db_pool)
    .await?;
    tracing::debug!("Found {} users.", users.len());
    Ok(users)
}

/// Students only, used by the admin "award badge / points" pickers.
pub async fn find_students(db_pool: &SqlitePool) -> AppResult<Vec<UserSummary>> {
    let users = find_all_users(db_pool).await?;
    Ok(users.into_iter().filter(|u| u.role == Role::Student).collect())
}

/// Inserts a new user and returns its id. Duplicate emails become a validation error.
pub async fn create_user(db_pool: &SqlitePool, new_user: &NewUser) -> AppResult<i64> {
    tracing::info!("Creating user {} ({})", new_user.email, new_user.role);
    let password_hash = auth_service::hash_password(&new_user.password).await?;

    let result = sqlx::query(
        r#"
        INSERT INTO users (name, email, password_hash, role, school_id)
        VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
    )
    .bind(new_user.name.trim())
    .bind(new_user.email.trim())
    .bind(&password_hash)
    .bind(new_user.role)
    .bind(new_user.school_id)
    .execute(db_pool)
    .await;

    match result {
        Ok(done) => {
            let id = done.last_insert_rowid();
            tracing::info!("✅ User {} created with id {}.", new_user.email, id);
            Ok(id)
        }
        Err(e) => {
            let err = user_write_error(e);
            if matches!(err, AppError::Validation(_)) {
                tracing::warn!("User creation for {} refused: {}", new_user.email, err);
            }
            Err(err)
        }
    }
}

pub async fn update_user_password(db_pool: &SqlitePool, user_id: i64, new_raw_password: &str) -> AppResult<()> {
    tracing::info!("Changing password for user {}", user_id);
    let new_password_hash = auth_service::hash_password(new_raw_password).await?;

    let rows_affected = sqlx::query("UPDATE users SET password_hash = ?1 WHERE id = ?2")
        .bind(&new_password_hash)
        .bind(user_id)
        .execute(db_pool)
        .await?
        .rows_affected();

    if rows_affected == 0 {
        tracing::warn!("Password change failed: user {} not found.", user_id);
        return Err(AppError::NotFound("User".into()));
    }
    tracing::info!("✅ Password changed for user {}", user_id);
    Ok(())
}

/// Admin edit of account data.
pub async fn update_user(
    db_pool: &SqlitePool,
    user_id: i64,
    name: &str,
    email: &str,
    role: Role,
    school_id: Option<i64>,
) -> AppResult<()> {
    tracing::info!("Updating user {}", user_id);

    let result = sqlx::query(
        r#"
        UPDATE users
        SET name = ?1, email = ?2, role = ?3, school_id = ?4
        WHERE id = ?5
        "#,
    )
    .bind(name.trim())
    .bind(email.trim())
    .bind(role)
    .bind(school_id)
    .bind(user_id)
    .execute(db_pool)
    .await;

    let rows_affected = match result {
        Ok(done) => done.rows_affected(),
        Err(e) => return Err(user_write_error(e)),
    };

    if rows_affected == 0 {
        tracing::warn!("Update failed: user {} not found.", user_id);
        return Err(AppError::NotFound("User".into()));
    }
    tracing::info!("✅ User {} updated.", user_id);
    Ok(())
}

/// Soft enable/disable. Disabled users keep their ledger rows and badges.
pub async fn set_user_active(db_pool: &SqlitePool, user_id: i64, active: bool) -> AppResult<()> {
    let rows_affected = sqlx::query("UPDATE users SET is_active = ?1 WHERE id = ?2")
        .bind(active)
        .bind(user_id)
        .execute(db_pool)
        .await?
        .rows_affected();
    if rows_affected == 0 {
        return Err(AppError::NotFound("User".into()));
    }
    tracing::info!("User {} is now {}", user_id, if active { "active" } else { "disabled" });
    Ok(())
}

/// Self-service profile edit.
pub async fn update_profile(
    db_pool: &SqlitePool,
    user_id: i64,
    name: &str,
    school_id: Option<i64>,
    profile_picture: Option<&str>,
) -> AppResult<()> {
    if name.trim().is_empty() {
        return Err(AppError::Validation("Name is required.".into()));
    }
    // COALESCE keeps the old picture when no new one was uploaded
    sqlx::query(
        r#"
        UPDATE users
        SET name = ?1, school_id = ?2, profile_picture = COALESCE(?3, profile_picture)
        WHERE id = ?4
        "#,
    )
    .bind(name.trim())
    .bind(school_id)
    .bind(profile_picture)
    .bind(user_id)
    .execute(db_pool)
    .await
    .map_err(user_write_error)?;
    tracing::info!("✅ Profile updated for user {}", user_id);
    Ok(())
}

pub async fn count_by_role(db_pool: &SqlitePool) -> AppResult<Vec<(Role, i64)>> {
    let rows: Vec<(Role, i64)> = sqlx::query_as("SELECT role, COUNT(*) FROM users GROUP BY role ORDER BY role")
        .fetch_all(db_pool)
        .await?;
    Ok(rows)
}

/// Creates the first admin account from configuration when none exists yet.
pub async fn ensure_bootstrap_admin(db_pool: &SqlitePool, email: &str, password: &str) -> AppResult<bool> {
    let admins: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role = 'admin'")
        .fetch_one(db_pool)
        .await?;
    if admins > 0 {
        return Ok(false);
    }

    let admin = NewUser {
        name: "Administrator".into(),
        email: email.to_string(),
        password: password.to_string(),
        role: Role::Admin,
        school_id: None,
    };
    admin.validate().map_err(AppError::Config)?;
    create_user(db_pool, &admin).await?;
    tracing::info!("👤 Bootstrap admin {} created.", email);
    Ok(true)
}
