// src/services/leaderboard_service.rs
//! Leaderboards are computed on every request from the ledger. SQL does the
//! aggregation; ordering and rank numbering happen in `assign_ranks`.
use crate::{
    error::AppResult,
    models::leaderboard::{assign_ranks, LeaderboardRow, Period, RankedEntry},
};
use chrono::NaiveDate;
use sqlx::SqlitePool;

async fn user_rows(db_pool: &SqlitePool, period: Period, school_id: Option<i64>, today: NaiveDate) -> AppResult<Vec<LeaderboardRow>> {
    let rows = sqlx::query_as::<_, LeaderboardRow>(
        r#"
        SELECT u.id,
               u.name,
               s.name AS subtitle,
               COALESCE(SUM(e.points), 0) AS total_points,
               (SELECT COUNT(*) FROM user_badges ub WHERE ub.user_id = u.id) AS extra_count
        FROM users u
        LEFT JOIN schools s ON s.id = u.school_id
        LEFT JOIN eco_points e ON e.user_id = u.id AND (?1 IS NULL OR e.awarded_at >= ?1)
        WHERE u.role = 'student' AND u.is_active = 1 AND (?2 IS NULL OR u.school_id = ?2)
        GROUP BY u.id, u.name, s.name
        HAVING ?1 IS NULL OR COUNT(e.id) > 0
        "#,
    )
    .bind(period.since(today))
    .bind(school_id)
    .fetch_all(db_pool)
    .await?;
    Ok(rows)
}

/// Ranked students for the period, optionally within one school.
pub async fn user_leaderboard(
    db_pool: &SqlitePool,
    period: Period,
    school_id: Option<i64>,
    limit: usize,
    today: NaiveDate,
) -> AppResult<Vec<RankedEntry>> {
    tracing::debug!("User leaderboard: period={} school={:?}", period.as_str(), school_id);
    let mut ranked = assign_ranks(user_rows(db_pool, period, school_id, today).await?);
    ranked.truncate(limit);
    Ok(ranked)
}

/// Ranked schools: the sum of their active students' points and the member count.
pub async fn school_leaderboard(
    db_pool: &SqlitePool,
    period: Period,
    limit: usize,
    today: NaiveDate,
) -> AppResult<Vec<RankedEntry>> {
    tracing::debug!("School leaderboard: period={}", period.as_str());
    let rows = sqlx::query_as::<_, LeaderboardRow>(
        r#"
        SELECT s.id,
               s.name,
               s.city AS subtitle,
               COALESCE(SUM(e.points), 0) AS total_points,
               COUNT(DISTINCT u.id) AS extra_count
        FROM schools s
        LEFT JOIN users u ON u.school_id = s.id AND u.role = 'student' AND u.is_active = 1
        LEFT JOIN eco_points e ON e.user_id = u.id AND (?1 IS NULL OR e.awarded_at >= ?1)
        GROUP BY s.id, s.name, s.city
        HAVING ?1 IS NULL OR COUNT(e.id) > 0
        "#,
    )
    .bind(period.since(today))
    .fetch_all(db_pool)
    .await?;

    let mut ranked = assign_ranks(rows);
    ranked.truncate(limit);
    Ok(ranked)
}

/// The student's place on the full board, `None` if they are not on it.
pub async fn user_rank(db_pool: &SqlitePool, user_id: i64, period: Period, today: NaiveDate) -> AppResult<Option<usize>> {
    let rank = assign_ranks(user_rows(db_pool, period, None, today).await?)
        .into_iter()
        .find(|entry| entry.id == user_id)
        .map(|entry| entry.rank);
    Ok(rank)
}
