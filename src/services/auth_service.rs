// src/services/auth_service.rs
use crate::{
    error::{AppError, AppResult},
    models::user::{NewUser, User},
    services::user_service,
};
use sqlx::SqlitePool;

/// Checks the given password against the stored bcrypt hash.
pub async fn verify_password(password: &str, stored_hash: &str) -> AppResult<bool> {
    let password = password.to_string();
    let stored_hash = stored_hash.to_string();
    tokio::task::spawn_blocking(move || {
        tracing::debug!("Verifying bcrypt hash...");
        bcrypt::verify(&password, &stored_hash)
    })
    .await
    .map_err(|e| {
        tracing::error!("spawn_blocking task failed (verify_password): {:?}", e);
        AppError::InternalServerError
    })?
    .map_err(|e| {
        tracing::error!("bcrypt error while verifying password: {:?}", e);
        AppError::PasswordHashingError
    })
}

/// Produces a bcrypt hash for a password.
pub async fn hash_password(password: &str) -> AppResult<String> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || {
        tracing::debug!("Generating bcrypt hash...");
        bcrypt::hash(&password, bcrypt::DEFAULT_COST)
    })
    .await
    .map_err(|e| {
        tracing::error!("spawn_blocking task failed (hash_password): {:?}", e);
        AppError::InternalServerError
    })?
    .map_err(|e| {
        tracing::error!("bcrypt error while hashing password: {:?}", e);
        AppError::PasswordHashingError
    })
}

/// Email + password login. Unknown email, wrong password and disabled
/// accounts all come back as `InvalidCredentials`.
pub async fn authenticate(db_pool: &SqlitePool, email: &str, password: &str) -> AppResult<User> {
    let user = match user_service::find_user_by_email(db_pool, email).await? {
        Some(user) => user,
        None => {
            tracing::warn!("Login failed: unknown email {}", email);
            return Err(AppError::InvalidCredentials);
        }
    };

    if !verify_password(password, &user.password_hash).await? {
        tracing::warn!("Login failed: wrong password for user {}", user.id);
        return Err(AppError::InvalidCredentials);
    }

    if !user.is_active {
        tracing::warn!("Login refused: account {} is disabled", user.id);
        return Err(AppError::InvalidCredentials);
    }

    Ok(user)
}

/// Public sign-up. Only self-registrable roles are accepted.
pub async fn register(db_pool: &SqlitePool, new_user: NewUser) -> AppResult<i64> {
    if !new_user.role.self_registrable() {
        return Err(AppError::Validation("That account type cannot be created here.".into()));
    }
    new_user.validate().map_err(AppError::Validation)?;
    user_service::create_user(db_pool, &new_user).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{db::test_support::test_pool, models::user::Role};

    fn new_user(email: &str, role: Role) -> NewUser {
        NewUser {
            name: "Ana Lima".into(),
            email: email.into(),
            password: "correct horse".into(),
            role,
            school_id: None,
        }
    }

    #[tokio::test]
    async fn register_then_authenticate() {
        let pool = test_pool().await;
        let id = register(&pool, new_user("ana@example.org", Role::Student)).await.unwrap();

        let user = authenticate(&pool, "ANA@example.org", "correct horse").await.unwrap();
        assert_eq!(user.id, id);
        assert_eq!(user.role, Role::Student);

        let wrong = authenticate(&pool, "ana@example.org", "battery staple").await;
        assert!(matches!(wrong, Err(AppError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn register_rejects_privileged_roles_and_duplicates() {
        let pool = test_pool().await;
        let admin = register(&pool, new_user("boss@example.org", Role::Admin)).await;
        assert!(matches!(admin, Err(AppError::Validation(_))));

        register(&pool, new_user("dup@example.org", Role::Student)).await.unwrap();
        let dup = register(&pool, new_user("dup@example.org", Role::Teacher)).await;
        assert!(matches!(dup, Err(AppError::Validation(msg)) if msg.contains("already exists")));
    }

    #[tokio::test]
    async fn disabled_accounts_cannot_log_in() {
        let pool = test_pool().await;
        let id = register(&pool, new_user("off@example.org", Role::Student)).await.unwrap();
        user_service::set_user_active(&pool, id, false).await.unwrap();

        let result = authenticate(&pool, "off@example.org", "correct horse").await;
        assert!(matches!(result, Err(AppError::InvalidCredentials)));
    }
}
