// src/web/mw_auth.rs
use crate::{
    error::{AppError, AppResult},
    models::user::CurrentUser,
    services::user_service,
    state::AppState,
    web::api_handlers::ApiError,
};
use axum::{
    extract::{OriginalUri, Request, State},
    http::Method,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;

pub const SESSION_USER_ID: &str = "user_id";

/// Resolves the session to an active user. A session pointing at a deleted or
/// disabled account is flushed.
pub async fn current_user(state: &AppState, session: &Session) -> AppResult<Option<CurrentUser>> {
    let user_id = session
        .get::<i64>(SESSION_USER_ID)
        .await
        .map_err(|e| AppError::SessionError(format!("Could not read session: {}", e)))?;
    let Some(user_id) = user_id else {
        return Ok(None);
    };

    match user_service::find_user_by_id(&state.db_pool, user_id).await? {
        Some(user) if user.is_active => Ok(Some(CurrentUser::from(&user))),
        _ => {
            tracing::warn!("Session for user {} is no longer valid, clearing it", user_id);
            session
                .flush()
                .await
                .map_err(|e| AppError::SessionError(format!("Could not clear session: {}", e)))?;
            Ok(None)
        }
    }
}

/// Login guard for HTML pages: anonymous visitors go to `/login?next=<page>`.
pub async fn require_auth(
    State(state): State<AppState>,
    session: Session,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    match current_user(&state, &session).await? {
        Some(user) => {
            tracing::debug!("Auth MW: user {} ({}) authenticated", user.id, user.role);
            request.extensions_mut().insert(user);
            Ok(next.run(request).await)
        }
        None => {
            let target = if request.method() == Method::GET {
                // Nested routers see a stripped URI; the original keeps the full path
                let uri = request.extensions().get::<OriginalUri>().map(|o| &o.0).unwrap_or(request.uri());
                let path = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
                format!("/login?next={}", urlencoding::encode(path))
            } else {
                "/login".to_string()
            };
            tracing::debug!("Auth MW: not authenticated, redirecting to {}", target);
            Ok(Redirect::to(&target).into_response())
        }
    }
}

/// Login guard for the JSON API: answers 401 in the envelope format.
pub async fn require_api_auth(
    State(state): State<AppState>,
    session: Session,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    match current_user(&state, &session).await? {
        Some(user) => {
            request.extensions_mut().insert(user);
            Ok(next.run(request).await)
        }
        None => Err(ApiError(AppError::Unauthorized)),
    }
}
