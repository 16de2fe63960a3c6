// src/services/eco_points_service.rs
//! The eco-points ledger. Rows are only ever inserted; a user's total is the
//! sum of their rows and is recomputed by every reader.
use crate::{
    error::AppResult,
    models::{
        badge::Badge,
        eco_points::{ActivityType, EcoPointEntry, PointAward},
    },
    services::badge_service,
};
use chrono::{NaiveDateTime, Utc};
use sqlx::{Sqlite, SqlitePool};

/// What an award produced: the ledger row and any badge it unlocked.
#[derive(Debug)]
pub struct AwardOutcome {
    pub entry_id: i64,
    pub new_badges: Vec<Badge>,
}

/// Inserts one ledger row, then runs the badge evaluator for the user.
pub async fn award(db_pool: &SqlitePool, award: &PointAward<'_>) -> AppResult<AwardOutcome> {
    let entry_id = record(db_pool, award).await?;
    let new_badges = badge_service::badges_after_award(db_pool, award.user_id).await;
    Ok(AwardOutcome { entry_id, new_badges })
}

/// Bare insert, usable inside a transaction. Does not evaluate badges:
/// callers run `badge_service::badges_after_award` after committing.
pub async fn record<'e, E>(executor: E, award: &PointAward<'_>) -> AppResult<i64>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    record_at(executor, award, Utc::now().naive_utc()).await
}

pub async fn record_at<'e, E>(executor: E, award: &PointAward<'_>, awarded_at: NaiveDateTime) -> AppResult<i64>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let entry_id = sqlx::query(
        r#"
        INSERT INTO eco_points (user_id, points, activity_type, activity_id, description, reason, awarded_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
    )
    .bind(award.user_id)
    .bind(award.points)
    .bind(award.activity_type)
    .bind(award.activity_id)
    .bind(award.description)
    .bind(award.reason)
    .bind(awarded_at)
    .execute(executor)
    .await?
    .last_insert_rowid();

    tracing::info!(
        "🌱 {} eco-points to user {} ({} {:?}): {}",
        award.points,
        award.user_id,
        award.activity_type,
        award.activity_id,
        award.description
    );
    Ok(entry_id)
}

pub async fn total_points(db_pool: &SqlitePool, user_id: i64) -> AppResult<i64> {
    let total: i64 = sqlx::query_scalar("SELECT COALESCE(SUM(points), 0) FROM eco_points WHERE user_id = ?1")
        .bind(user_id)
        .fetch_one(db_pool)
        .await?;
    Ok(total)
}

/// Most recent ledger rows first.
pub async fn history(db_pool: &SqlitePool, user_id: i64, limit: i64) -> AppResult<Vec<EcoPointEntry>> {
    let entries = sqlx::query_as::<_, EcoPointEntry>(
        r#"
        SELECT id, user_id, points, activity_type, activity_id, description, reason, awarded_at
        FROM eco_points
        WHERE user_id = ?1
        ORDER BY awarded_at DESC, id DESC
        LIMIT ?2
        "#,
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(db_pool)
    .await?;
    Ok(entries)
}

/// How many positive awards of one kind the user has received.
pub async fn activity_count(db_pool: &SqlitePool, user_id: i64, activity_type: ActivityType) -> AppResult<i64> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM eco_points WHERE user_id = ?1 AND activity_type = ?2 AND points > 0",
    )
    .bind(user_id)
    .bind(activity_type)
    .fetch_one(db_pool)
    .await?;
    Ok(count)
}

/// Points per activity type, for the student's breakdown chart.
pub async fn totals_by_activity(db_pool: &SqlitePool, user_id: i64) -> AppResult<Vec<(ActivityType, i64)>> {
    let rows: Vec<(ActivityType, i64)> = sqlx::query_as(
        r#"
        SELECT activity_type, SUM(points)
        FROM eco_points
        WHERE user_id = ?1
        GROUP BY activity_type
        ORDER BY SUM(points) DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(db_pool)
    .await?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::{insert_user, test_pool_without_badges};

    fn manual(user_id: i64, points: i64) -> PointAward<'static> {
        PointAward {
            user_id,
            points,
            activity_type: ActivityType::Manual,
            activity_id: None,
            description: "test",
            reason: None,
        }
    }

    #[tokio::test]
    async fn total_is_the_sum_of_entries() {
        let pool = test_pool_without_badges().await;
        let user = insert_user(&pool, "Ana", "student", None).await;

        assert_eq!(total_points(&pool, user).await.unwrap(), 0);
        for points in [10, 20, 15] {
            award(&pool, &manual(user, points)).await.unwrap();
        }
        assert_eq!(total_points(&pool, user).await.unwrap(), 45);

        // penalties are just negative rows
        award(&pool, &manual(user, -5)).await.unwrap();
        assert_eq!(total_points(&pool, user).await.unwrap(), 40);

        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM eco_points WHERE user_id = ?1")
            .bind(user)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(rows, 4);
    }

    #[tokio::test]
    async fn reason_is_kept_with_the_entry() {
        let pool = test_pool_without_badges().await;
        let user = insert_user(&pool, "Davi", "student", None).await;
        let penalty = PointAward { points: -10, reason: Some("Left litter at the site"), ..manual(user, 0) };
        award(&pool, &penalty).await.unwrap();
        award(&pool, &manual(user, 5)).await.unwrap();

        let entries = history(&pool, user, 10).await.unwrap();
        let reasons: Vec<Option<&str>> = entries.iter().map(|e| e.reason.as_deref()).collect();
        assert!(reasons.contains(&Some("Left litter at the site")));
        assert!(reasons.contains(&None));
    }

    #[tokio::test]
    async fn failed_badge_check_keeps_the_award() {
        let pool = test_pool_without_badges().await;
        let user = insert_user(&pool, "Caio", "student", None).await;
        sqlx::query("DROP TABLE user_badges").execute(&pool).await.unwrap();

        let outcome = award(&pool, &manual(user, 30)).await.unwrap();
        assert!(outcome.new_badges.is_empty());
        assert_eq!(total_points(&pool, user).await.unwrap(), 30);
    }

    #[tokio::test]
    async fn history_is_newest_first_and_limited() {
        let pool = test_pool_without_badges().await;
        let user = insert_user(&pool, "Bia", "student", None).await;
        let base = NaiveDateTime::parse_from_str("2025-01-01 10:00:00", "%Y-%m-%d %H:%M:%S").unwrap();
        for (i, points) in [5, 6, 7].into_iter().enumerate() {
            record_at(&pool, &manual(user, points), base + chrono::Duration::hours(i as i64)).await.unwrap();
        }

        let entries = history(&pool, user, 2).await.unwrap();
        let points: Vec<i64> = entries.iter().map(|e| e.points).collect();
        assert_eq!(points, vec![7, 6]);
    }

    #[tokio::test]
    async fn activity_count_ignores_penalties_and_other_kinds() {
        let pool = test_pool_without_badges().await;
        let user = insert_user(&pool, "Caio", "student", None).await;
        let lesson = PointAward { activity_type: ActivityType::Lesson, activity_id: Some(1), ..manual(user, 10) };
        record(&pool, &lesson).await.unwrap();
        record(&pool, &PointAward { activity_id: Some(2), ..lesson.clone() }).await.unwrap();
        record(&pool, &PointAward { points: -3, ..lesson.clone() }).await.unwrap();
        record(&pool, &manual(user, 50)).await.unwrap();

        assert_eq!(activity_count(&pool, user, ActivityType::Lesson).await.unwrap(), 2);
        assert_eq!(activity_count(&pool, user, ActivityType::Quiz).await.unwrap(), 0);

        let breakdown = totals_by_activity(&pool, user).await.unwrap();
        assert_eq!(breakdown, vec![(ActivityType::Manual, 50), (ActivityType::Lesson, 17)]);
    }
}
