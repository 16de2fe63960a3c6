// src/web/api_handlers.rs
//! JSON endpoints. Every response uses the same envelope:
//! `{"success": true, "data": ...}` or `{"success": false, "message": "..."}`.
use crate::{
    error::AppError,
    models::{
        badge::{Badge, EarnedBadge},
        challenge::Challenge,
        eco_points::{ActivityType, EcoPointEntry},
        leaderboard::Period,
        lesson::Lesson,
        user::{CurrentUser, Role},
    },
    services::{badge_service, challenge_service, eco_points_service, leaderboard_service, lesson_service, user_service},
    state::AppState,
    web::captcha,
};
use axum::{
    extract::{Path, State},
    response::{IntoResponse, Response},
    Extension, Json,
};
use chrono::Utc;
use serde::Serialize;
use tower_sessions::Session;

#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

pub fn ok<T: Serialize>(data: T) -> Json<Envelope<T>> {
    Json(Envelope { success: true, data: Some(data), message: None })
}

/// `AppError` rendered as a failure envelope instead of an HTML page.
#[derive(Debug)]
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.0.status_code();
        if status.is_server_error() {
            tracing::error!("API error: {:?}", self.0);
        } else {
            tracing::debug!("API request refused: {}", self.0);
        }
        let body: Envelope<()> = Envelope { success: false, data: None, message: Some(self.0.user_message()) };
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<Json<Envelope<T>>, ApiError>;

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ContentItem {
    Lesson(Lesson),
    Challenge(Challenge),
    Badge(Badge),
}

/// GET /api/content/{kind}/{id}
pub async fn get_content(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path((kind, id)): Path<(String, i64)>,
) -> ApiResult<ContentItem> {
    let item = match kind.as_str() {
        "lesson" => lesson_service::find_lesson(&state.db_pool, id)
            .await?
            // drafts are only visible to the people who can edit lessons
            .filter(|l| l.is_published || user.role.can_author_lessons())
            .map(ContentItem::Lesson),
        "challenge" => challenge_service::find_challenge(&state.db_pool, id)
            .await?
            .filter(|c| c.is_active || user.role.can_manage_challenges())
            .map(ContentItem::Challenge),
        "badge" => badge_service::find_badge(&state.db_pool, id).await?.map(ContentItem::Badge),
        other => {
            return Err(AppError::Validation(format!("Unknown content type '{}'.", other)).into());
        }
    };
    item.map(ok).ok_or_else(|| AppError::NotFound("Content".into()).into())
}

#[derive(Debug, Serialize)]
pub struct UserDetail {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub school_id: Option<i64>,
    pub is_active: bool,
    pub total_points: i64,
    pub badges: Vec<EarnedBadge>,
}

/// GET /api/users/{id} (admins only)
pub async fn get_user(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(user_id): Path<i64>,
) -> ApiResult<UserDetail> {
    if !current.role.is_admin() {
        return Err(AppError::Forbidden.into());
    }
    let user = user_service::find_user_by_id(&state.db_pool, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User".into()))?;

    Ok(ok(UserDetail {
        total_points: eco_points_service::total_points(&state.db_pool, user.id).await?,
        badges: badge_service::badges_for_user(&state.db_pool, user.id).await?,
        id: user.id,
        name: user.name,
        email: user.email,
        role: user.role,
        school_id: user.school_id,
        is_active: user.is_active,
    }))
}

#[derive(Debug, Serialize)]
pub struct MyPoints {
    pub total_points: i64,
    pub rank: Option<usize>,
    pub breakdown: Vec<(ActivityType, i64)>,
    pub recent: Vec<EcoPointEntry>,
}

/// GET /api/me/points
pub async fn my_points(State(state): State<AppState>, Extension(user): Extension<CurrentUser>) -> ApiResult<MyPoints> {
    let today = Utc::now().date_naive();
    Ok(ok(MyPoints {
        total_points: eco_points_service::total_points(&state.db_pool, user.id).await?,
        rank: leaderboard_service::user_rank(&state.db_pool, user.id, Period::AllTime, today).await?,
        breakdown: eco_points_service::totals_by_activity(&state.db_pool, user.id).await?,
        recent: eco_points_service::history(&state.db_pool, user.id, 20).await?,
    }))
}

#[derive(Debug, Serialize)]
pub struct CaptchaQuestion {
    pub question: String,
}

/// GET /api/captcha/refresh (no login required). Replaces the session's captcha.
pub async fn refresh_captcha(State(state): State<AppState>, session: Session) -> ApiResult<CaptchaQuestion> {
    if !state.config.captcha_enabled {
        return Err(AppError::NotFound("Captcha".into()).into());
    }
    let question = captcha::issue(&session).await?;
    Ok(ok(CaptchaQuestion { question }))
}
