// src/web/admin_handlers.rs
use crate::{
    error::{AppError, AppResult},
    models::{
        badge::{AwardBadgeForm, BadgeForm},
        eco_points::{ActivityType, ManualAwardForm, PointAward},
        school::SchoolForm,
        user::{looks_like_email, parse_optional_id, CurrentUser, NewUser, Role, MIN_PASSWORD_LEN},
    },
    services::{badge_service, challenge_service, eco_points_service, school_service, user_service},
    state::AppState,
    templates::{
        activity_options, role_options, school_options, AdminBadgesPage, AdminDashboardPage, AdminEditBadgePage,
        AdminEditSchoolPage, AdminEditUserPage, AdminPointsPage, AdminSchoolsPage, AdminUsersPage, FeedbackParams,
        PageContext,
    },
    web::feedback::{self, render},
};
use axum::{
    extract::{Form, Path, Query, State},
    response::{IntoResponse, Redirect},
    Extension,
};
use serde::Deserialize;

const USERS_PATH: &str = "/admin/users";
const BADGES_PATH: &str = "/admin/badges";
const SCHOOLS_PATH: &str = "/admin/schools";
const POINTS_PATH: &str = "/admin/points";

// --- Forms ---

#[derive(Deserialize, Debug)]
pub struct CreateUserForm {
    name: String,
    email: String,
    password: String,
    role: String,
    #[serde(default)]
    school_id: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct EditUserForm {
    name: String,
    email: String,
    role: String,
    #[serde(default)]
    school_id: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct ChangePasswordForm {
    new_password: String,
}

// --- Dashboard ---

/// GET /admin
pub async fn dashboard(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(feedback): Query<FeedbackParams>,
) -> AppResult<impl IntoResponse> {
    let role_counts = user_service::count_by_role(&state.db_pool).await?;
    let pending_count = challenge_service::count_pending(&state.db_pool, None).await?;
    let challenges = challenge_service::list_challenges(&state.db_pool, None).await?;

    render(&AdminDashboardPage {
        page: PageContext::for_user(&user, feedback),
        role_counts,
        pending_count,
        challenges,
    })
}

/// POST /admin/challenges/{id}/toggle
pub async fn toggle_challenge(State(state): State<AppState>, Path(challenge_id): Path<i64>) -> AppResult<Redirect> {
    let challenge = challenge_service::find_challenge(&state.db_pool, challenge_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Challenge".into()))?;
    challenge_service::set_challenge_active(&state.db_pool, challenge_id, !challenge.is_active).await?;

    let message = if challenge.is_active {
        format!("Challenge '{}' is now hidden from students.", challenge.title)
    } else {
        format!("Challenge '{}' is visible again.", challenge.title)
    };
    Ok(feedback::success("/admin", &message))
}

// --- Users ---

/// GET /admin/users
pub async fn show_users(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(feedback): Query<FeedbackParams>,
) -> AppResult<impl IntoResponse> {
    tracing::debug!("GET /admin/users: loading user list");
    let users = user_service::find_all_users(&state.db_pool).await?;
    let schools = school_service::list_schools(&state.db_pool).await?;

    render(&AdminUsersPage {
        page: PageContext::for_user(&user, feedback),
        users,
        roles: role_options(Some(Role::Student)),
        schools: school_options(&schools, None),
    })
}

/// POST /admin/users/create
pub async fn create_user(State(state): State<AppState>, Form(form): Form<CreateUserForm>) -> AppResult<Redirect> {
    let role: Role = match form.role.parse() {
        Ok(role) => role,
        Err(msg) => return Ok(feedback::error(USERS_PATH, &msg)),
    };
    let new_user = NewUser {
        name: form.name.trim().to_string(),
        email: form.email.trim().to_string(),
        password: form.password,
        role,
        school_id: parse_optional_id(form.school_id.as_deref()),
    };
    if let Err(msg) = new_user.validate() {
        return Ok(feedback::error(USERS_PATH, &msg));
    }

    match user_service::create_user(&state.db_pool, &new_user).await {
        Ok(id) => {
            tracing::info!("Admin created {} account {}", role, id);
            Ok(feedback::success(USERS_PATH, &format!("Account for '{}' created.", new_user.email)))
        }
        Err(e) => feedback::redirect_on_error(USERS_PATH, e),
    }
}

/// GET /admin/users/{id}/edit
pub async fn show_edit_user(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(user_id): Path<i64>,
    Query(feedback): Query<FeedbackParams>,
) -> AppResult<impl IntoResponse> {
    let user = user_service::find_user_by_id(&state.db_pool, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User".into()))?;
    let schools = school_service::list_schools(&state.db_pool).await?;

    render(&AdminEditUserPage {
        page: PageContext::for_user(&current, feedback),
        roles: role_options(Some(user.role)),
        schools: school_options(&schools, user.school_id),
        user,
    })
}

/// POST /admin/users/{id}/edit
pub async fn update_user(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(user_id): Path<i64>,
    Form(form): Form<EditUserForm>,
) -> AppResult<Redirect> {
    let edit_path = format!("/admin/users/{}/edit", user_id);
    let role: Role = match form.role.parse() {
        Ok(role) => role,
        Err(msg) => return Ok(feedback::error(&edit_path, &msg)),
    };
    if form.name.trim().is_empty() {
        return Ok(feedback::error(&edit_path, "Name is required."));
    }
    if !looks_like_email(&form.email) {
        return Ok(feedback::error(&edit_path, "Please enter a valid email address."));
    }
    if user_id == current.id && role != Role::Admin {
        return Ok(feedback::error(&edit_path, "You cannot remove your own admin role."));
    }

    let school_id = parse_optional_id(form.school_id.as_deref());
    match user_service::update_user(&state.db_pool, user_id, &form.name, &form.email, role, school_id).await {
        Ok(()) => Ok(feedback::success(USERS_PATH, &format!("User '{}' updated.", form.name.trim()))),
        Err(e) => feedback::redirect_on_error(&edit_path, e),
    }
}

/// POST /admin/users/{id}/password
pub async fn change_password(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Form(form): Form<ChangePasswordForm>,
) -> AppResult<Redirect> {
    let edit_path = format!("/admin/users/{}/edit", user_id);
    if form.new_password.chars().count() < MIN_PASSWORD_LEN {
        return Ok(feedback::error(
            &edit_path,
            &format!("Password must have at least {} characters.", MIN_PASSWORD_LEN),
        ));
    }
    match user_service::update_user_password(&state.db_pool, user_id, &form.new_password).await {
        Ok(()) => Ok(feedback::success(&edit_path, "Password changed.")),
        Err(e) => feedback::redirect_on_error(USERS_PATH, e),
    }
}

/// POST /admin/users/{id}/toggle
pub async fn toggle_user(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(user_id): Path<i64>,
) -> AppResult<Redirect> {
    if user_id == current.id {
        return Ok(feedback::error(USERS_PATH, "You cannot disable your own account."));
    }
    let user = user_service::find_user_by_id(&state.db_pool, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User".into()))?;
    user_service::set_user_active(&state.db_pool, user_id, !user.is_active).await?;

    let message = if user.is_active {
        format!("'{}' has been disabled.", user.name)
    } else {
        format!("'{}' has been enabled.", user.name)
    };
    Ok(feedback::success(USERS_PATH, &message))
}

// --- Badges ---

/// GET /admin/badges
pub async fn show_badges(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(feedback): Query<FeedbackParams>,
) -> AppResult<impl IntoResponse> {
    let badges = badge_service::list_badges(&state.db_pool).await?;
    let students = user_service::find_students(&state.db_pool).await?;
    render(&AdminBadgesPage {
        page: PageContext::for_user(&user, feedback),
        badges,
        students,
        activities: activity_options(None),
    })
}

/// POST /admin/badges/create
pub async fn create_badge(State(state): State<AppState>, Form(form): Form<BadgeForm>) -> AppResult<Redirect> {
    let input = match form.into_input() {
        Ok(input) => input,
        Err(msg) => return Ok(feedback::error(BADGES_PATH, &msg)),
    };
    match badge_service::create_badge(&state.db_pool, &input).await {
        Ok(_) => Ok(feedback::success(BADGES_PATH, &format!("Badge '{}' created.", input.name))),
        Err(e) => feedback::redirect_on_error(BADGES_PATH, e),
    }
}

/// GET /admin/badges/{id}/edit
pub async fn show_edit_badge(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(badge_id): Path<i64>,
    Query(feedback): Query<FeedbackParams>,
) -> AppResult<impl IntoResponse> {
    let badge = badge_service::find_badge(&state.db_pool, badge_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Badge".into()))?;
    render(&AdminEditBadgePage {
        page: PageContext::for_user(&user, feedback),
        activities: activity_options(badge.activity_type),
        badge,
    })
}

/// POST /admin/badges/{id}/edit
pub async fn update_badge(
    State(state): State<AppState>,
    Path(badge_id): Path<i64>,
    Form(form): Form<BadgeForm>,
) -> AppResult<Redirect> {
    let edit_path = format!("/admin/badges/{}/edit", badge_id);
    let input = match form.into_input() {
        Ok(input) => input,
        Err(msg) => return Ok(feedback::error(&edit_path, &msg)),
    };
    match badge_service::update_badge(&state.db_pool, badge_id, &input).await {
        Ok(()) => Ok(feedback::success(BADGES_PATH, &format!("Badge '{}' updated.", input.name))),
        Err(e) => feedback::redirect_on_error(&edit_path, e),
    }
}

/// POST /admin/badges/{id}/delete
pub async fn delete_badge(State(state): State<AppState>, Path(badge_id): Path<i64>) -> AppResult<Redirect> {
    match badge_service::delete_badge(&state.db_pool, badge_id).await {
        Ok(()) => Ok(feedback::success(BADGES_PATH, "Badge deleted.")),
        Err(e) => feedback::redirect_on_error(BADGES_PATH, e),
    }
}

/// POST /admin/badges/award
pub async fn award_badge(
    State(state): State<AppState>,
    Extension(admin): Extension<CurrentUser>,
    Form(form): Form<AwardBadgeForm>,
) -> AppResult<Redirect> {
    match badge_service::award_badge(&state.db_pool, form.user_id, form.badge_id, Some(admin.id)).await {
        Ok(true) => Ok(feedback::success(BADGES_PATH, "Badge awarded.")),
        Ok(false) => Ok(feedback::error(BADGES_PATH, "The student already has this badge.")),
        Err(e) => feedback::redirect_on_error(BADGES_PATH, e),
    }
}

/// POST /admin/badges/revoke
pub async fn revoke_badge(State(state): State<AppState>, Form(form): Form<AwardBadgeForm>) -> AppResult<Redirect> {
    if badge_service::revoke_badge(&state.db_pool, form.user_id, form.badge_id).await? {
        Ok(feedback::success(BADGES_PATH, "Badge revoked."))
    } else {
        Ok(feedback::error(BADGES_PATH, "The student does not have this badge."))
    }
}

// --- Schools ---

/// GET /admin/schools
pub async fn show_schools(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(feedback): Query<FeedbackParams>,
) -> AppResult<impl IntoResponse> {
    let schools = school_service::list_schools(&state.db_pool).await?;
    render(&AdminSchoolsPage {
        page: PageContext::for_user(&user, feedback),
        schools,
    })
}

/// POST /admin/schools/create
pub async fn create_school(State(state): State<AppState>, Form(form): Form<SchoolForm>) -> AppResult<Redirect> {
    match school_service::create_school(&state.db_pool, &form).await {
        Ok(_) => Ok(feedback::success(SCHOOLS_PATH, &format!("School '{}' added.", form.name.trim()))),
        Err(e) => feedback::redirect_on_error(SCHOOLS_PATH, e),
    }
}

/// GET /admin/schools/{id}/edit
pub async fn show_edit_school(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(school_id): Path<i64>,
    Query(feedback): Query<FeedbackParams>,
) -> AppResult<impl IntoResponse> {
    let school = school_service::find_school(&state.db_pool, school_id)
        .await?
        .ok_or_else(|| AppError::NotFound("School".into()))?;
    render(&AdminEditSchoolPage {
        page: PageContext::for_user(&user, feedback),
        school,
    })
}

/// POST /admin/schools/{id}/edit
pub async fn update_school(
    State(state): State<AppState>,
    Path(school_id): Path<i64>,
    Form(form): Form<SchoolForm>,
) -> AppResult<Redirect> {
    let edit_path = format!("/admin/schools/{}/edit", school_id);
    match school_service::update_school(&state.db_pool, school_id, &form).await {
        Ok(()) => Ok(feedback::success(SCHOOLS_PATH, "School updated.")),
        Err(e) => feedback::redirect_on_error(&edit_path, e),
    }
}

// --- Eco-points ---

/// GET /admin/points
pub async fn show_points(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(feedback): Query<FeedbackParams>,
) -> AppResult<impl IntoResponse> {
    let students = user_service::find_students(&state.db_pool).await?;
    render(&AdminPointsPage {
        page: PageContext::for_user(&user, feedback),
        students,
    })
}

/// POST /admin/points
/// Negative amounts are penalties; they go into the ledger like any other row.
pub async fn award_points(
    State(state): State<AppState>,
    Extension(admin): Extension<CurrentUser>,
    Form(form): Form<ManualAwardForm>,
) -> AppResult<Redirect> {
    let description = form.description.trim();
    let reason = Some(form.reason.trim()).filter(|r| !r.is_empty());
    if form.points == 0 {
        return Ok(feedback::error(POINTS_PATH, "Enter a non-zero number of points."));
    }
    if description.is_empty() {
        return Ok(feedback::error(POINTS_PATH, "Please describe the adjustment."));
    }
    match user_service::find_user_by_id(&state.db_pool, form.user_id).await? {
        Some(user) if user.role == Role::Student => {}
        _ => return Ok(feedback::error(POINTS_PATH, "Choose a student.")),
    }

    let outcome = eco_points_service::award(
        &state.db_pool,
        &PointAward {
            user_id: form.user_id,
            points: form.points,
            activity_type: ActivityType::Manual,
            activity_id: None,
            description,
            reason,
        },
    )
    .await?;
    tracing::info!(
        "Admin {} adjusted user {} by {} points (entry {})",
        admin.id,
        form.user_id,
        form.points,
        outcome.entry_id
    );

    let mut message = format!("{:+} eco-points recorded.", form.points);
    if !outcome.new_badges.is_empty() {
        let names: Vec<&str> = outcome.new_badges.iter().map(|b| b.name.as_str()).collect();
        message.push_str(&format!(" New badges: {}.", names.join(", ")));
    }
    Ok(feedback::success(POINTS_PATH, &message))
}
