// src/services/badge_service.rs
use crate::{
    error::{AppError, AppResult},
    models::{
        badge::{Badge, BadgeInput, EarnedBadge},
        eco_points::ActivityType,
    },
    services::eco_points_service,
};
use sqlx::SqlitePool;
use std::collections::{HashMap, HashSet};

const BADGE_COLUMNS: &str = "id, name, description, image_url, category, points_required, \
                             activity_type, activity_count_required, created_at";

pub async fn list_badges(db_pool: &SqlitePool) -> AppResult<Vec<Badge>> {
    let badges = sqlx::query_as::<_, Badge>(&format!(
        "SELECT {} FROM badges ORDER BY category ASC, COALESCE(points_required, 0) ASC, name ASC",
        BADGE_COLUMNS
    ))
    .fetch_all(db_pool)
    .await?;
    Ok(badges)
}

pub async fn find_badge(db_pool: &SqlitePool, badge_id: i64) -> AppResult<Option<Badge>> {
    let badge = sqlx::query_as::<_, Badge>(&format!("SELECT {} FROM badges WHERE id = ?1", BADGE_COLUMNS))
        .bind(badge_id)
        .fetch_optional(db_pool)
        .await?;
    Ok(badge)
}

pub async fn create_badge(db_pool: &SqlitePool, input: &BadgeInput) -> AppResult<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO badges (name, description, image_url, category, points_required, activity_type, activity_count_required)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
    )
    .bind(&input.name)
    .bind(&input.description)
    .bind(&input.image_url)
    .bind(&input.category)
    .bind(input.points_required)
    .bind(input.activity_type)
    .bind(input.activity_count_required)
    .execute(db_pool)
    .await;

    match result {
        Ok(done) => {
            tracing::info!("🏅 Badge '{}' created.", input.name);
            Ok(done.last_insert_rowid())
        }
        Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
            Err(AppError::Validation("A badge with this name already exists.".into()))
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn update_badge(db_pool: &SqlitePool, badge_id: i64, input: &BadgeInput) -> AppResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE badges
        SET name = ?1, description = ?2, image_url = ?3, category = ?4,
            points_required = ?5, activity_type = ?6, activity_count_required = ?7
        WHERE id = ?8
        "#,
    )
    .bind(&input.name)
    .bind(&input.description)
    .bind(&input.image_url)
    .bind(&input.category)
    .bind(input.points_required)
    .bind(input.activity_type)
    .bind(input.activity_count_required)
    .bind(badge_id)
    .execute(db_pool)
    .await;

    match result {
        Ok(done) if done.rows_affected() == 0 => Err(AppError::NotFound("Badge".into())),
        Ok(_) => Ok(()),
        Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
            Err(AppError::Validation("A badge with this name already exists.".into()))
        }
        Err(e) => Err(e.into()),
    }
}

/// Deleting a badge also removes it from everyone who held it.
pub async fn delete_badge(db_pool: &SqlitePool, badge_id: i64) -> AppResult<()> {
    let rows = sqlx::query("DELETE FROM badges WHERE id = ?1")
        .bind(badge_id)
        .execute(db_pool)
        .await?
        .rows_affected();
    if rows == 0 {
        return Err(AppError::NotFound("Badge".into()));
    }
    tracing::info!("Badge {} deleted.", badge_id);
    Ok(())
}

pub async fn badges_for_user(db_pool: &SqlitePool, user_id: i64) -> AppResult<Vec<EarnedBadge>> {
    let badges = sqlx::query_as::<_, EarnedBadge>(
        r#"
        SELECT b.id AS badge_id, b.name, b.description, b.image_url, b.category, ub.awarded_at
        FROM user_badges ub
        JOIN badges b ON b.id = ub.badge_id
        WHERE ub.user_id = ?1
        ORDER BY ub.awarded_at DESC, b.name ASC
        "#,
    )
    .bind(user_id)
    .fetch_all(db_pool)
    .await?;
    Ok(badges)
}

/// Inserts the (user, badge) pair unless it already exists.
/// Returns whether a row was actually written.
async fn insert_user_badge(
    db_pool: &SqlitePool,
    user_id: i64,
    badge_id: i64,
    awarded_by: Option<i64>,
) -> AppResult<bool> {
    let rows = sqlx::query(
        r#"
        INSERT INTO user_badges (user_id, badge_id, awarded_by)
        VALUES (?1, ?2, ?3)
        ON CONFLICT(user_id, badge_id) DO NOTHING
        "#,
    )
    .bind(user_id)
    .bind(badge_id)
    .bind(awarded_by)
    .execute(db_pool)
    .await?
    .rows_affected();
    Ok(rows == 1)
}

/// Awards every automatic badge the user now qualifies for and does not hold yet.
/// Safe to call any number of times; concurrent calls cannot double-award
/// because of the UNIQUE (user_id, badge_id) constraint.
pub async fn check_for_badges(db_pool: &SqlitePool, user_id: i64) -> AppResult<Vec<Badge>> {
    let total = eco_points_service::total_points(db_pool, user_id).await?;

    let held: HashSet<i64> = sqlx::query_scalar::<_, i64>("SELECT badge_id FROM user_badges WHERE user_id = ?1")
        .bind(user_id)
        .fetch_all(db_pool)
        .await?
        .into_iter()
        .collect();

    let candidates: Vec<Badge> = list_badges(db_pool)
        .await?
        .into_iter()
        .filter(|b| !held.contains(&b.id) && !b.is_manual_only())
        .collect();

    let mut counts: HashMap<ActivityType, i64> = HashMap::new();
    let mut awarded = Vec::new();

    for badge in candidates {
        let activity_count = match badge.activity_criterion() {
            Some((kind, _)) => match counts.get(&kind) {
                Some(count) => *count,
                None => {
                    let count = eco_points_service::activity_count(db_pool, user_id, kind).await?;
                    counts.insert(kind, count);
                    count
                }
            },
            None => 0,
        };

        if !badge.qualifies(total, activity_count) {
            continue;
        }

        if insert_user_badge(db_pool, user_id, badge.id, None).await? {
            tracing::info!("🏅 User {} earned badge '{}'", user_id, badge.name);
            awarded.push(badge);
        } else {
            tracing::debug!("User {} may already have badge '{}'", user_id, badge.name);
        }
    }

    Ok(awarded)
}

/// Badge pass run after points were already committed. A failing check is
/// logged and reported as no new badges; the committed award stands.
pub async fn badges_after_award(db_pool: &SqlitePool, user_id: i64) -> Vec<Badge> {
    match check_for_badges(db_pool, user_id).await {
        Ok(badges) => badges,
        Err(e) => {
            tracing::error!("Badge check for user {} failed after award: {}", user_id, e);
            Vec::new()
        }
    }
}

/// Manual award by an admin. `false` means the user already had the badge.
pub async fn award_badge(
    db_pool: &SqlitePool,
    user_id: i64,
    badge_id: i64,
    awarded_by: Option<i64>,
) -> AppResult<bool> {
    if find_badge(db_pool, badge_id).await?.is_none() {
        return Err(AppError::NotFound("Badge".into()));
    }
    let user_exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = ?1)")
        .bind(user_id)
        .fetch_one(db_pool)
        .await?;
    if !user_exists {
        return Err(AppError::NotFound("User".into()));
    }

    let awarded = insert_user_badge(db_pool, user_id, badge_id, awarded_by).await?;
    if awarded {
        tracing::info!("🏅 Badge {} awarded to user {} by {:?}", badge_id, user_id, awarded_by);
    } else {
        tracing::warn!("Badge {} not awarded: user {} may already have this badge", badge_id, user_id);
    }
    Ok(awarded)
}

pub async fn revoke_badge(db_pool: &SqlitePool, user_id: i64, badge_id: i64) -> AppResult<bool> {
    let rows = sqlx::query("DELETE FROM user_badges WHERE user_id = ?1 AND badge_id = ?2")
        .bind(user_id)
        .bind(badge_id)
        .execute(db_pool)
        .await?
        .rows_affected();
    if rows > 0 {
        tracing::info!("Badge {} revoked from user {}", badge_id, user_id);
    }
    Ok(rows > 0)
}
