// src/web/profile_handlers.rs
use crate::{
    error::{AppError, AppResult},
    models::user::{parse_optional_id, CurrentUser},
    services::{
        badge_service, eco_points_service, school_service,
        upload_service::{self, UploadTarget},
        user_service,
    },
    state::AppState,
    templates::{school_options, FeedbackParams, PageContext, ProfilePage},
    web::{
        feedback::{self, render},
        multipart::MultipartForm,
    },
};
use axum::{
    extract::{Multipart, Query, State},
    response::{IntoResponse, Redirect},
    Extension,
};

const PROFILE_PATH: &str = "/profile";

/// GET /profile
pub async fn show_profile(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Query(feedback): Query<FeedbackParams>,
) -> AppResult<impl IntoResponse> {
    let user = user_service::find_user_by_id(&state.db_pool, current.id)
        .await?
        .ok_or_else(|| AppError::NotFound("User".into()))?;
    let schools = school_service::list_schools(&state.db_pool).await?;
    let total_points = eco_points_service::total_points(&state.db_pool, user.id).await?;
    let badge_count = badge_service::badges_for_user(&state.db_pool, user.id).await?.len();

    render(&ProfilePage {
        page: PageContext::for_user(&current, feedback),
        schools: school_options(&schools, user.school_id),
        user,
        total_points,
        badge_count,
        max_upload_mb: state.config.max_avatar_bytes.div_ceil(1024 * 1024),
    })
}

/// POST /profile (multipart: `name`, `school_id`, `profile_picture`)
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    multipart: Multipart,
) -> AppResult<Redirect> {
    let mut form = match MultipartForm::read(multipart).await {
        Ok(form) => form,
        Err(e) => return feedback::redirect_on_error(PROFILE_PATH, e),
    };
    let name = form.text("name").to_string();
    let school_id = parse_optional_id(Some(form.text("school_id")));

    let target = UploadTarget::avatars(&state.config);
    let new_picture = match form.take_file("profile_picture") {
        Some(file) => {
            let kind = match upload_service::validate_image(&file, target.max_bytes) {
                Ok(kind) => kind,
                Err(e) => return feedback::redirect_on_error(PROFILE_PATH, e),
            };
            Some(upload_service::store_image(&target, &file, kind).await?)
        }
        None => None,
    };

    let old_picture = match new_picture {
        Some(_) => user_service::find_user_by_id(&state.db_pool, current.id)
            .await?
            .and_then(|u| u.profile_picture),
        None => None,
    };

    if let Err(e) =
        user_service::update_profile(&state.db_pool, current.id, &name, school_id, new_picture.as_deref()).await
    {
        if let Some(url) = &new_picture {
            upload_service::remove_stored(&target, url).await;
        }
        return feedback::redirect_on_error(PROFILE_PATH, e);
    }

    if let Some(url) = old_picture {
        upload_service::remove_stored(&target, &url).await;
    }
    Ok(feedback::success(PROFILE_PATH, "Profile updated."))
}
