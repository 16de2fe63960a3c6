// src/web/feedback.rs
//! Post/Redirect/Get helpers: messages travel in the redirect's query string.
use crate::error::{AppError, AppResult};
use askama::Template;
use axum::response::{Html, Redirect};

fn redirect_with(path: &str, key: &str, message: &str) -> Redirect {
    let separator = if path.contains('?') { '&' } else { '?' };
    Redirect::to(&format!("{}{}{}={}", path, separator, key, urlencoding::encode(message)))
}

pub fn success(path: &str, message: &str) -> Redirect {
    redirect_with(path, "success", message)
}

pub fn error(path: &str, message: &str) -> Redirect {
    redirect_with(path, "error", message)
}

/// Turns user-correctable failures into a redirect back to the form;
/// anything else keeps propagating as an error page.
pub fn redirect_on_error(path: &str, err: AppError) -> AppResult<Redirect> {
    match err {
        AppError::Validation(_) | AppError::Upload(_) | AppError::Challenge(_) | AppError::NotFound(_) => {
            tracing::warn!("Request to {} refused: {}", path, err);
            Ok(error(path, &err.user_message()))
        }
        other => Err(other),
    }
}

pub fn render<T: Template>(template: &T) -> AppResult<Html<String>> {
    match template.render() {
        Ok(html) => Ok(Html(html)),
        Err(e) => {
            tracing::error!("Failed to render template: {}", e);
            Err(e.into())
        }
    }
}
