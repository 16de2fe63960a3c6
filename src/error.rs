// src/error.rs
use crate::models::challenge::ChallengeError;
use askama::Template;
use axum::{http::StatusCode, response::Html, response::IntoResponse};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Database migration error: {0}")]
    SqlxMigrateError(#[from] sqlx::migrate::MigrateError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to process password")]
    PasswordHashingError,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Session error: {0}")]
    SessionError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Upload(String),

    #[error(transparent)]
    Challenge(#[from] ChallengeError),

    #[error("Template error: {0}")]
    Template(#[from] askama::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Forbidden")]
    Forbidden,

    #[error("Unexpected internal error")]
    InternalServerError,

    #[error("Unauthorized")]
    Unauthorized,
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidCredentials | AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) | AppError::Upload(_) => StatusCode::BAD_REQUEST,
            AppError::Challenge(_) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show to the user. Internal details stay in the logs.
    pub fn user_message(&self) -> String {
        match self {
            AppError::SqlxError(_) | AppError::SqlxMigrateError(_) => "Could not access the data.".into(),
            AppError::Config(_) => "Configuration error.".into(),
            AppError::PasswordHashingError => "Could not process credentials.".into(),
            AppError::InvalidCredentials => "Invalid email or password.".into(),
            AppError::SessionError(_) => "There was a problem with your session.".into(),
            AppError::NotFound(what) => format!("{} not found.", what),
            AppError::Validation(msg) | AppError::Upload(msg) => msg.clone(),
            AppError::Challenge(e) => e.to_string(),
            AppError::Forbidden => "You do not have access to this page.".into(),
            AppError::Unauthorized => "Please log in to continue.".into(),
            _ => "An unexpected error occurred.".into(),
        }
    }
}

// Standalone page: base.html needs a logged-in PageContext
#[derive(Template)]
#[template(path = "error.html")]
struct ErrorPage {
    status_code: u16,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        tracing::error!("Handled error: {:?}", self);

        let status = self.status_code();
        let page = ErrorPage {
            status_code: status.as_u16(),
            message: self.user_message(),
        };
        match page.render() {
            Ok(html) => (status, Html(html)).into_response(),
            Err(e) => {
                tracing::error!("Failed to render error page: {}", e);
                (status, page.message).into_response()
            }
        }
    }
}

pub type AppResult<T = ()> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_errors_do_not_leak_details() {
        let err = AppError::Config("SESSION_SECRET=abc".into());
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.user_message().contains("abc"));
    }

    #[test]
    fn challenge_errors_surface_their_message() {
        let err = AppError::from(ChallengeError::Expired);
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert!(err.user_message().contains("expired"));
    }

    #[tokio::test]
    async fn error_page_escapes_markup() {
        let response = AppError::Validation("<b>\"x\" & y</b>".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let html = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(html.contains("Error 400"));
        assert!(html.contains("x"));
        assert!(!html.contains("<b>"));
    }
}
