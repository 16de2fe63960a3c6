// src/web/challenge_handlers.rs
//! Student side of challenges: browsing and handing in proof.
use crate::{
    error::{AppError, AppResult},
    models::user::CurrentUser,
    services::{
        challenge_service::{self, ProofSubmission},
        upload_service::UploadTarget,
    },
    state::AppState,
    templates::{ChallengeCard, FeedbackParams, PageContext, StudentChallengePage, StudentChallengesPage},
    web::{
        feedback::{self, render},
        multipart::MultipartForm,
    },
};
use axum::{
    extract::{Multipart, Path, Query, State},
    response::{IntoResponse, Redirect},
    Extension,
};
use chrono::Utc;

const MIB: usize = 1024 * 1024;

/// GET /student/challenges
pub async fn list_challenges(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(feedback): Query<FeedbackParams>,
) -> AppResult<impl IntoResponse> {
    let today = Utc::now().date_naive();
    let cards = challenge_service::list_for_student(&state.db_pool, user.id)
        .await?
        .into_iter()
        .map(|row| ChallengeCard::new(row, today))
        .collect();

    render(&StudentChallengesPage {
        page: PageContext::for_user(&user, feedback),
        cards,
    })
}

/// GET /student/challenges/{id}
pub async fn show_challenge(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(challenge_id): Path<i64>,
    Query(feedback): Query<FeedbackParams>,
) -> AppResult<impl IntoResponse> {
    let row = challenge_service::challenge_for_student(&state.db_pool, user.id, challenge_id)
        .await?
        .filter(|row| row.challenge.is_active)
        .ok_or_else(|| AppError::NotFound("Challenge".into()))?;

    render(&StudentChallengePage {
        page: PageContext::for_user(&user, feedback),
        card: ChallengeCard::new(row, Utc::now().date_naive()),
        max_upload_mb: state.config.max_proof_bytes.div_ceil(MIB),
    })
}

/// POST /student/challenges/{id}/submit (multipart: `description`, `proof`)
pub async fn submit_proof(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(challenge_id): Path<i64>,
    multipart: Multipart,
) -> AppResult<Redirect> {
    let back = format!("/student/challenges/{}", challenge_id);
    let mut form = match MultipartForm::read(multipart).await {
        Ok(form) => form,
        Err(e) => return feedback::redirect_on_error(&back, e),
    };
    let submission = ProofSubmission {
        description: form.text("description").to_string(),
        file: form.take_file("proof"),
    };

    let target = UploadTarget::proofs(&state.config);
    let today = Utc::now().date_naive();
    match challenge_service::submit_proof(&state.db_pool, &target, user.id, challenge_id, submission, today).await {
        Ok(user_challenge_id) => {
            tracing::info!("📸 User {} submitted proof {} for challenge {}", user.id, user_challenge_id, challenge_id);
            Ok(feedback::success(
                &back,
                "Proof submitted! A reviewer will check it soon.",
            ))
        }
        Err(e) => feedback::redirect_on_error(&back, e),
    }
}
