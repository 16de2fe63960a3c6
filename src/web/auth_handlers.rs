// src/web/auth_handlers.rs
use crate::{
    error::{AppError, AppResult},
    models::user::{parse_optional_id, LoginForm, NewUser, RegisterForm, Role},
    services::{auth_service, school_service},
    state::AppState,
    templates::{school_options, FeedbackParams, LoginPage, PageContext, RegisterPage},
    web::{
        captcha,
        feedback::{self, render},
        mw_auth::{self, SESSION_USER_ID},
    },
};
use axum::{
    extract::{Form, Query, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;

const CAPTCHA_FAILED: &str = "Please answer the security question correctly.";

#[derive(Debug, Default, Deserialize)]
pub struct NextParam {
    pub next: Option<String>,
}

/// Only same-site paths are accepted as post-login targets.
fn safe_next(next: Option<&str>) -> Option<&str> {
    next.map(str::trim)
        .filter(|n| n.starts_with('/') && !n.starts_with("//") && !n.contains("://"))
}

/// GET /
pub async fn home(State(state): State<AppState>, session: Session) -> AppResult<Redirect> {
    Ok(match mw_auth::current_user(&state, &session).await? {
        Some(user) => Redirect::to(user.role.home_path()),
        None => Redirect::to("/login"),
    })
}

/// GET /login
pub async fn show_login_form(
    State(state): State<AppState>,
    session: Session,
    Query(feedback): Query<FeedbackParams>,
    Query(params): Query<NextParam>,
) -> AppResult<Response> {
    if let Some(user) = mw_auth::current_user(&state, &session).await? {
        tracing::debug!("GET /login: user {} already logged in", user.id);
        return Ok(Redirect::to(user.role.home_path()).into_response());
    }

    let template = LoginPage {
        page: PageContext::new(None, feedback),
        email: String::new(),
        next: safe_next(params.next.as_deref()).unwrap_or_default().to_string(),
        captcha_question: captcha::question_for_form(&state, &session).await?,
    };
    Ok(render(&template)?.into_response())
}

/// POST /login
pub async fn handle_login(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> AppResult<Response> {
    tracing::info!("Login attempt for {}", form.email);

    if !captcha::verify(&state, &session, &form.captcha).await? {
        return render_login_error(&state, &session, form, CAPTCHA_FAILED.into()).await;
    }

    match auth_service::authenticate(&state.db_pool, &form.email, &form.password).await {
        Ok(user) => {
            session
                .cycle_id()
                .await
                .map_err(|e| AppError::SessionError(format!("Failed to cycle session id: {}", e)))?;
            session
                .insert(SESSION_USER_ID, user.id)
                .await
                .map_err(|e| AppError::SessionError(format!("Failed to write session: {}", e)))?;

            tracing::info!("✅ Login successful for user {}", user.id);
            let target = safe_next(form.next.as_deref()).unwrap_or(user.role.home_path());
            Ok(Redirect::to(target).into_response())
        }
        Err(AppError::InvalidCredentials) => {
            render_login_error(&state, &session, form, AppError::InvalidCredentials.user_message()).await
        }
        Err(e) => Err(e),
    }
}

// Re-shows the form with the typed email kept and a new question
async fn render_login_error(state: &AppState, session: &Session, form: LoginForm, message: String) -> AppResult<Response> {
    let template = LoginPage {
        page: PageContext::default().with_error(message),
        next: safe_next(form.next.as_deref()).unwrap_or_default().to_string(),
        email: form.email,
        captcha_question: captcha::question_for_form(state, session).await?,
    };
    Ok(render(&template)?.into_response())
}

/// GET /register
pub async fn show_register_form(
    State(state): State<AppState>,
    session: Session,
    Query(feedback): Query<FeedbackParams>,
) -> AppResult<impl IntoResponse> {
    let schools = school_service::list_schools(&state.db_pool).await?;
    render(&RegisterPage {
        page: PageContext::new(None, feedback),
        schools: school_options(&schools, None),
        captcha_question: captcha::question_for_form(&state, &session).await?,
    })
}

/// POST /register
pub async fn handle_register(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<RegisterForm>,
) -> AppResult<Redirect> {
    if !captcha::verify(&state, &session, &form.captcha).await? {
        return Ok(feedback::error("/register", CAPTCHA_FAILED));
    }
    if form.password != form.confirm_password {
        return Ok(feedback::error("/register", "The passwords do not match."));
    }
    let role: Role = match form.role.parse() {
        Ok(role) => role,
        Err(_) => return Ok(feedback::error("/register", "Please choose an account type.")),
    };

    let new_user = NewUser {
        name: form.name.trim().to_string(),
        email: form.email.trim().to_string(),
        password: form.password,
        role,
        school_id: parse_optional_id(form.school_id.as_deref()),
    };
    let email = new_user.email.clone();

    match auth_service::register(&state.db_pool, new_user).await {
        Ok(id) => {
            tracing::info!("👤 New {} account {} registered", role, id);
            Ok(Redirect::to(&format!(
                "/login?success={}",
                urlencoding::encode(&format!("Welcome! You can now log in as {}.", email))
            )))
        }
        Err(e) => feedback::redirect_on_error("/register", e),
    }
}

/// GET /logout
pub async fn handle_logout(session: Session) -> AppResult<Redirect> {
    let user_id: Option<i64> = session.get(SESSION_USER_ID).await.ok().flatten();

    session
        .delete()
        .await
        .map_err(|e| AppError::SessionError(format!("Failed to delete session: {}", e)))?;

    match user_id {
        Some(id) => tracing::info!("🚪 User {} logged out.", id),
        None => tracing::info!("🚪 Anonymous session closed."),
    }
    Ok(Redirect::to("/login"))
}

#[cfg(test)]
mod tests {
    use super::safe_next;

    #[test]
    fn only_local_redirect_targets() {
        assert_eq!(safe_next(Some("/student/challenges/4")), Some("/student/challenges/4"));
        assert_eq!(safe_next(Some("//evil.example")), None);
        assert_eq!(safe_next(Some("https://evil.example")), None);
        assert_eq!(safe_next(Some("/x?u=http://a")), None);
        assert_eq!(safe_next(None), None);
    }
}
