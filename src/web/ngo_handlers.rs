// src/web/ngo_handlers.rs
//! Challenge management and proof review. NGOs see their own challenges;
//! admins see everything.
use crate::{
    error::{AppError, AppResult},
    models::{
        challenge::{ChallengeForm, ChallengeStatus, ReviewForm},
        user::CurrentUser,
    },
    services::challenge_service,
    state::AppState,
    templates::{FeedbackParams, NgoChallengeEditPage, NgoChallengesPage, NgoSubmissionsPage, PageContext, TabLink},
    web::feedback::{self, render},
};
use axum::{
    extract::{Form, Path, Query, State},
    response::{IntoResponse, Redirect},
    Extension,
};
use chrono::Utc;
use serde::Deserialize;

const CHALLENGES_PATH: &str = "/ngo/challenges";
const SUBMISSIONS_PATH: &str = "/ngo/submissions";

// Admins are not restricted to their own challenges
fn owner_filter(user: &CurrentUser) -> Option<i64> {
    if user.role.is_admin() {
        None
    } else {
        Some(user.id)
    }
}

/// GET /ngo/challenges
pub async fn list_challenges(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(feedback): Query<FeedbackParams>,
) -> AppResult<impl IntoResponse> {
    let challenges = challenge_service::list_challenges(&state.db_pool, owner_filter(&user)).await?;
    let pending_count = challenge_service::count_pending(&state.db_pool, owner_filter(&user)).await?;

    render(&NgoChallengesPage {
        page: PageContext::for_user(&user, feedback),
        challenges,
        pending_count,
        today: Utc::now().date_naive().format("%Y-%m-%d").to_string(),
    })
}

/// POST /ngo/challenges
pub async fn create_challenge(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Form(form): Form<ChallengeForm>,
) -> AppResult<Redirect> {
    let input = match form.into_input() {
        Ok(input) => input,
        Err(msg) => return Ok(feedback::error(CHALLENGES_PATH, &msg)),
    };
    let id = challenge_service::create_challenge(&state.db_pool, &input, user.id).await?;
    tracing::info!("Challenge {} created by {}", id, user.id);
    Ok(feedback::success(CHALLENGES_PATH, &format!("Challenge '{}' created.", input.title)))
}

/// GET /ngo/challenges/{id}/edit
pub async fn show_edit_challenge(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(challenge_id): Path<i64>,
    Query(feedback): Query<FeedbackParams>,
) -> AppResult<impl IntoResponse> {
    let challenge = challenge_service::find_challenge(&state.db_pool, challenge_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Challenge".into()))?;
    if !user.role.is_admin() && challenge.created_by != Some(user.id) {
        return Err(AppError::Forbidden);
    }

    render(&NgoChallengeEditPage {
        page: PageContext::for_user(&user, feedback),
        challenge,
    })
}

/// POST /ngo/challenges/{id}/edit
pub async fn update_challenge(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(challenge_id): Path<i64>,
    Form(form): Form<ChallengeForm>,
) -> AppResult<Redirect> {
    let edit_path = format!("/ngo/challenges/{}/edit", challenge_id);
    let input = match form.into_input() {
        Ok(input) => input,
        Err(msg) => return Ok(feedback::error(&edit_path, &msg)),
    };
    match challenge_service::update_challenge(&state.db_pool, challenge_id, &input, &user).await {
        Ok(()) => Ok(feedback::success(CHALLENGES_PATH, "Challenge updated.")),
        Err(e) => feedback::redirect_on_error(&edit_path, e),
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct StatusParam {
    pub status: Option<String>,
}

fn filter_tabs(current: &str) -> Vec<TabLink> {
    [("pending", "Pending"), ("verified", "Verified"), ("rejected", "Rejected"), ("all", "All")]
        .into_iter()
        .map(|(value, label)| TabLink {
            href: format!("{}?status={}", SUBMISSIONS_PATH, value),
            label: label.to_string(),
            active: value == current,
        })
        .collect()
}

/// GET /ngo/submissions?status=pending|verified|rejected|all
pub async fn list_submissions(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(feedback): Query<FeedbackParams>,
    Query(params): Query<StatusParam>,
) -> AppResult<impl IntoResponse> {
    let raw = params.status.as_deref().unwrap_or("pending");
    // Unknown values fall back to the pending queue
    let (current, status) = match raw {
        "all" => ("all", None),
        other => match ChallengeStatus::parse_filter(other) {
            Some(status) => (status.as_str(), Some(status)),
            None => ("pending", Some(ChallengeStatus::Pending)),
        },
    };
    let submissions = challenge_service::list_submissions(&state.db_pool, status, owner_filter(&user)).await?;

    render(&NgoSubmissionsPage {
        page: PageContext::for_user(&user, feedback),
        filter_tabs: filter_tabs(current),
        submissions,
    })
}

/// POST /ngo/submissions/{id}/verify
pub async fn verify_submission(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(user_challenge_id): Path<i64>,
    Form(form): Form<ReviewForm>,
) -> AppResult<Redirect> {
    let note = Some(form.feedback.trim()).filter(|f| !f.is_empty());
    match challenge_service::verify_submission(&state.db_pool, user_challenge_id, &user, note).await {
        Ok(outcome) => {
            let mut message = format!("Submission verified. {} eco-points awarded.", outcome.points);
            if !outcome.new_badges.is_empty() {
                let names: Vec<&str> = outcome.new_badges.iter().map(|b| b.name.as_str()).collect();
                message.push_str(&format!(" New badges: {}.", names.join(", ")));
            }
            Ok(feedback::success(SUBMISSIONS_PATH, &message))
        }
        Err(e) => feedback::redirect_on_error(SUBMISSIONS_PATH, e),
    }
}

/// POST /ngo/submissions/{id}/reject
pub async fn reject_submission(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(user_challenge_id): Path<i64>,
    Form(form): Form<ReviewForm>,
) -> AppResult<Redirect> {
    match challenge_service::reject_submission(&state.db_pool, user_challenge_id, &user, &form.feedback).await {
        Ok(()) => Ok(feedback::success(SUBMISSIONS_PATH, "Submission rejected. The student can resubmit.")),
        Err(e) => feedback::redirect_on_error(SUBMISSIONS_PATH, e),
    }
}
