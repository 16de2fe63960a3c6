// src/web/student_handlers.rs
use crate::{
    error::{AppError, AppResult},
    models::{leaderboard::Period, quiz::parse_answers, user::CurrentUser},
    services::{badge_service, challenge_service, eco_points_service, leaderboard_service, lesson_service, quiz_service},
    state::AppState,
    templates::{
        FeedbackParams, PageContext, StudentBadgesPage, StudentDashboardPage, StudentLessonPage, StudentLessonsPage,
        StudentPointsPage, StudentQuizPage, TabLink,
    },
    web::feedback::{self, render},
};
use axum::{
    extract::{Form, Path, Query, State},
    response::{IntoResponse, Redirect},
    Extension,
};
use chrono::Utc;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};

const RECENT_ACTIVITY: i64 = 5;
const OPEN_CHALLENGES_SHOWN: usize = 5;
const HISTORY_SIZE: i64 = 100;

/// GET /student
pub async fn dashboard(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(feedback): Query<FeedbackParams>,
) -> AppResult<impl IntoResponse> {
    let today = Utc::now().date_naive();
    let pool = &state.db_pool;

    let total_points = eco_points_service::total_points(pool, user.id).await?;
    let rank = leaderboard_service::user_rank(pool, user.id, Period::AllTime, today).await?;
    let lessons_completed = lesson_service::completed_count(pool, user.id).await?;
    let badges = badge_service::badges_for_user(pool, user.id).await?;
    let recent = eco_points_service::history(pool, user.id, RECENT_ACTIVITY).await?;
    let mut open_challenges = challenge_service::list_open_challenges(pool, today).await?;
    open_challenges.truncate(OPEN_CHALLENGES_SHOWN);

    render(&StudentDashboardPage {
        page: PageContext::for_user(&user, feedback),
        total_points,
        rank,
        lessons_completed,
        badges,
        recent,
        open_challenges,
    })
}

#[derive(Debug, Default, Deserialize)]
pub struct CategoryParam {
    pub category: Option<String>,
}

/// GET /student/lessons?category=
pub async fn list_lessons(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(feedback): Query<FeedbackParams>,
    Query(params): Query<CategoryParam>,
) -> AppResult<impl IntoResponse> {
    let category = params.category.as_deref().map(str::trim).filter(|c| !c.is_empty());
    let lessons = lesson_service::list_for_student(&state.db_pool, user.id, category).await?;

    let mut categories = vec![TabLink {
        href: "/student/lessons".into(),
        label: "All".into(),
        active: category.is_none(),
    }];
    for name in lesson_service::list_categories(&state.db_pool).await? {
        categories.push(TabLink {
            href: format!("/student/lessons?category={}", urlencoding::encode(&name)),
            active: category == Some(name.as_str()),
            label: name,
        });
    }

    render(&StudentLessonsPage {
        page: PageContext::for_user(&user, feedback),
        lessons,
        categories,
    })
}

/// GET /student/lessons/{id}
pub async fn show_lesson(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(lesson_id): Path<i64>,
    Query(feedback): Query<FeedbackParams>,
) -> AppResult<impl IntoResponse> {
    let lesson = lesson_service::lesson_for_student(&state.db_pool, user.id, lesson_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Lesson".into()))?;
    let quizzes = quiz_service::quizzes_for_lesson(&state.db_pool, lesson_id).await?;

    render(&StudentLessonPage {
        page: PageContext::for_user(&user, feedback),
        lesson,
        quizzes,
    })
}

/// POST /student/lessons/{id}/complete
pub async fn complete_lesson(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(lesson_id): Path<i64>,
) -> AppResult<Redirect> {
    let back = format!("/student/lessons/{}", lesson_id);
    match lesson_service::complete_lesson(&state.db_pool, user.id, lesson_id).await {
        Ok(true) => Ok(feedback::success(&back, "Lesson completed. Well done!")),
        Ok(false) => Ok(feedback::success(&back, "You have already completed this lesson.")),
        Err(e) => feedback::redirect_on_error("/student/lessons", e),
    }
}

/// Quizzes of unpublished lessons are not reachable by students.
async fn ensure_quiz_visible(state: &AppState, lesson_id: i64) -> AppResult<()> {
    match lesson_service::find_lesson(&state.db_pool, lesson_id).await? {
        Some(lesson) if lesson.is_published => Ok(()),
        _ => Err(AppError::NotFound("Quiz".into())),
    }
}

/// GET /student/quizzes/{id}
pub async fn show_quiz(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(quiz_id): Path<i64>,
    Query(feedback): Query<FeedbackParams>,
) -> AppResult<impl IntoResponse> {
    let detail = quiz_service::load_quiz(&state.db_pool, quiz_id).await?;
    ensure_quiz_visible(&state, detail.quiz.lesson_id).await?;
    let attempts = quiz_service::attempts_for_user(&state.db_pool, user.id, quiz_id).await?;
    let already_passed = attempts.iter().any(|a| a.passed);

    render(&StudentQuizPage {
        page: PageContext::for_user(&user, feedback),
        quiz: detail.quiz,
        questions: detail.questions,
        attempts,
        already_passed,
    })
}

/// POST /student/quizzes/{id}
pub async fn submit_quiz(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(quiz_id): Path<i64>,
    Form(fields): Form<HashMap<String, String>>,
) -> AppResult<Redirect> {
    let back = format!("/student/quizzes/{}", quiz_id);
    let quiz = match quiz_service::find_quiz(&state.db_pool, quiz_id).await? {
        Some(quiz) => quiz,
        None => return Err(AppError::NotFound("Quiz".into())),
    };
    ensure_quiz_visible(&state, quiz.lesson_id).await?;

    let answers = parse_answers(&fields);
    let outcome = quiz_service::submit_attempt(&state.db_pool, user.id, quiz_id, &answers).await?;
    let grade = &outcome.grade;
    let summary = format!("You scored {}/{} ({}%).", grade.score, grade.total_marks, grade.percentage());

    Ok(if !grade.passed {
        feedback::error(&back, &format!("{} Not quite there yet, try again!", summary))
    } else if outcome.points_awarded > 0 {
        feedback::success(&back, &format!("{} Passed! +{} eco-points.", summary, outcome.points_awarded))
    } else {
        feedback::success(&back, &format!("{} Passed!", summary))
    })
}

/// GET /student/badges
pub async fn show_badges(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(feedback): Query<FeedbackParams>,
) -> AppResult<impl IntoResponse> {
    let earned = badge_service::badges_for_user(&state.db_pool, user.id).await?;
    let earned_ids: HashSet<i64> = earned.iter().map(|b| b.badge_id).collect();
    let locked = badge_service::list_badges(&state.db_pool)
        .await?
        .into_iter()
        .filter(|b| !earned_ids.contains(&b.id))
        .collect();

    render(&StudentBadgesPage {
        page: PageContext::for_user(&user, feedback),
        earned,
        locked,
    })
}

/// GET /student/points
pub async fn show_points(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(feedback): Query<FeedbackParams>,
) -> AppResult<impl IntoResponse> {
    let total_points = eco_points_service::total_points(&state.db_pool, user.id).await?;
    let breakdown = eco_points_service::totals_by_activity(&state.db_pool, user.id).await?;
    let entries = eco_points_service::history(&state.db_pool, user.id, HISTORY_SIZE).await?;

    render(&StudentPointsPage {
        page: PageContext::for_user(&user, feedback),
        total_points,
        breakdown,
        entries,
    })
}
