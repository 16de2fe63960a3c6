// src/web/teacher_handlers.rs
use crate::{
    error::{AppError, AppResult},
    models::{
        lesson::{Lesson, LessonForm},
        quiz::parse_quiz_form,
        user::CurrentUser,
    },
    services::{lesson_service, quiz_service},
    state::AppState,
    templates::{FeedbackParams, PageContext, QuizBuilderPage, TeacherLessonEditPage, TeacherLessonsPage},
    web::feedback::{self, render},
};
use axum::{
    extract::{Form, Path, Query, State},
    response::{IntoResponse, Redirect},
    Extension,
};
use std::collections::HashMap;

const LESSONS_PATH: &str = "/teacher/lessons";

/// Loads a lesson the user may change: its author, or any admin.
async fn editable_lesson(state: &AppState, lesson_id: i64, user: &CurrentUser) -> AppResult<Lesson> {
    let lesson = lesson_service::find_lesson(&state.db_pool, lesson_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Lesson".into()))?;
    if user.role.is_admin() || lesson.created_by == Some(user.id) {
        Ok(lesson)
    } else {
        tracing::warn!("User {} tried to edit lesson {} they do not own", user.id, lesson_id);
        Err(AppError::Forbidden)
    }
}

/// GET /teacher/lessons
pub async fn list_lessons(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(feedback): Query<FeedbackParams>,
) -> AppResult<impl IntoResponse> {
    let created_by = if user.role.is_admin() { None } else { Some(user.id) };
    let lessons = lesson_service::list_lessons(&state.db_pool, created_by).await?;
    render(&TeacherLessonsPage {
        page: PageContext::for_user(&user, feedback),
        lessons,
    })
}

/// POST /teacher/lessons
pub async fn create_lesson(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Form(form): Form<LessonForm>,
) -> AppResult<Redirect> {
    let input = match form.into_input() {
        Ok(input) => input,
        Err(msg) => return Ok(feedback::error(LESSONS_PATH, &msg)),
    };
    let id = lesson_service::create_lesson(&state.db_pool, &input, user.id).await?;
    Ok(feedback::success(
        &format!("/teacher/lessons/{}/edit", id),
        "Lesson created. You can now add a quiz.",
    ))
}

/// GET /teacher/lessons/{id}/edit
pub async fn show_edit_lesson(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(lesson_id): Path<i64>,
    Query(feedback): Query<FeedbackParams>,
) -> AppResult<impl IntoResponse> {
    let lesson = editable_lesson(&state, lesson_id, &user).await?;
    let quizzes = quiz_service::quizzes_for_lesson(&state.db_pool, lesson_id).await?;
    render(&TeacherLessonEditPage {
        page: PageContext::for_user(&user, feedback),
        lesson,
        quizzes,
    })
}

/// POST /teacher/lessons/{id}/edit
pub async fn update_lesson(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(lesson_id): Path<i64>,
    Form(form): Form<LessonForm>,
) -> AppResult<Redirect> {
    let edit_path = format!("/teacher/lessons/{}/edit", lesson_id);
    let input = match form.into_input() {
        Ok(input) => input,
        Err(msg) => return Ok(feedback::error(&edit_path, &msg)),
    };
    match lesson_service::update_lesson(&state.db_pool, lesson_id, &input, &user).await {
        Ok(()) => Ok(feedback::success(&edit_path, "Lesson saved.")),
        Err(e) => feedback::redirect_on_error(LESSONS_PATH, e),
    }
}

/// POST /teacher/lessons/{id}/delete
pub async fn delete_lesson(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(lesson_id): Path<i64>,
) -> AppResult<Redirect> {
    match lesson_service::delete_lesson(&state.db_pool, lesson_id, &user).await {
        Ok(()) => Ok(feedback::success(LESSONS_PATH, "Lesson deleted.")),
        Err(e) => feedback::redirect_on_error(LESSONS_PATH, e),
    }
}

/// GET /teacher/lessons/{id}/quiz
pub async fn show_quiz_builder(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(lesson_id): Path<i64>,
    Query(feedback): Query<FeedbackParams>,
) -> AppResult<impl IntoResponse> {
    let lesson = editable_lesson(&state, lesson_id, &user).await?;
    render(&QuizBuilderPage::new(PageContext::for_user(&user, feedback), lesson))
}

/// POST /teacher/lessons/{id}/quiz
pub async fn create_quiz(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(lesson_id): Path<i64>,
    Form(fields): Form<HashMap<String, String>>,
) -> AppResult<Redirect> {
    let lesson = editable_lesson(&state, lesson_id, &user).await?;
    let builder_path = format!("/teacher/lessons/{}/quiz", lesson.id);

    let new_quiz = match parse_quiz_form(&fields) {
        Ok(quiz) => quiz,
        Err(msg) => return Ok(feedback::error(&builder_path, &msg)),
    };
    quiz_service::create_quiz(&state.db_pool, lesson.id, &new_quiz).await?;
    Ok(feedback::success(
        &format!("/teacher/lessons/{}/edit", lesson.id),
        &format!("Quiz '{}' added with {} questions.", new_quiz.title, new_quiz.questions.len()),
    ))
}
