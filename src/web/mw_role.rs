// src/web/mw_role.rs
//! Role guards. They run after `require_auth`, which puts `CurrentUser` in
//! the request extensions.
use crate::{
    error::AppError,
    models::user::{CurrentUser, Role},
};
use axum::{extract::Request, middleware::Next, response::Response, Extension};

fn check(user: &CurrentUser, allowed: bool, area: &str) -> Result<(), AppError> {
    if allowed {
        Ok(())
    } else {
        tracing::warn!("Role MW: {} ({}) denied access to {}", user.id, user.role, area);
        Err(AppError::Forbidden)
    }
}

pub async fn require_student(
    Extension(user): Extension<CurrentUser>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    check(&user, user.role == Role::Student, "student pages")?;
    Ok(next.run(request).await)
}

pub async fn require_teacher(
    Extension(user): Extension<CurrentUser>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    check(&user, user.role.can_author_lessons(), "lesson authoring")?;
    Ok(next.run(request).await)
}

pub async fn require_ngo(
    Extension(user): Extension<CurrentUser>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    check(&user, user.role.can_manage_challenges(), "challenge management")?;
    Ok(next.run(request).await)
}

pub async fn require_admin(
    Extension(user): Extension<CurrentUser>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    check(&user, user.role.is_admin(), "administration")?;
    Ok(next.run(request).await)
}
