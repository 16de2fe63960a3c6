// src/web/leaderboard_handlers.rs
use crate::{
    error::AppResult,
    models::{
        leaderboard::{LeaderboardParams, Period, Scope},
        user::parse_optional_id,
    },
    services::leaderboard_service,
    state::AppState,
    templates::{FeedbackParams, LeaderboardPage, PageContext},
    web::{feedback::render, mw_auth},
};
use axum::{
    extract::{Query, State},
    response::IntoResponse,
};
use chrono::Utc;
use tower_sessions::Session;

const BOARD_SIZE: usize = 50;

/// GET /leaderboard?period=&scope=&school_id=
pub async fn show_leaderboard(
    State(state): State<AppState>,
    session: Session,
    Query(feedback): Query<FeedbackParams>,
    Query(params): Query<LeaderboardParams>,
) -> AppResult<impl IntoResponse> {
    let period = Period::parse(params.period.as_deref());
    let scope = Scope::parse(params.scope.as_deref());
    let today = Utc::now().date_naive();

    let entries = match scope {
        Scope::Users => {
            let school_id = parse_optional_id(params.school_id.as_deref());
            leaderboard_service::user_leaderboard(&state.db_pool, period, school_id, BOARD_SIZE, today).await?
        }
        Scope::Schools => leaderboard_service::school_leaderboard(&state.db_pool, period, BOARD_SIZE, today).await?,
    };

    let current_user = mw_auth::current_user(&state, &session).await?;
    let (period_tabs, scope_tabs) = LeaderboardPage::tabs(period, scope);
    render(&LeaderboardPage {
        page: PageContext::new(current_user, feedback),
        period_label: period.label(),
        is_school_board: scope == Scope::Schools,
        period_tabs,
        scope_tabs,
        entries,
    })
}
