// src/models/leaderboard.rs
use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Period {
    Daily,
    Weekly,
    Monthly,
    #[default]
    AllTime,
}

impl Period {
    pub const ALL: [Period; 4] = [Period::Daily, Period::Weekly, Period::Monthly, Period::AllTime];

    pub fn as_str(&self) -> &'static str {
        match self {
            Period::Daily => "daily",
            Period::Weekly => "weekly",
            Period::Monthly => "monthly",
            Period::AllTime => "all_time",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Period::Daily => "Today",
            Period::Weekly => "This week",
            Period::Monthly => "This month",
            Period::AllTime => "All time",
        }
    }

    /// Unknown values fall back to all-time, like a missing query parameter.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some("daily") => Period::Daily,
            Some("weekly") => Period::Weekly,
            Some("monthly") => Period::Monthly,
            _ => Period::AllTime,
        }
    }

    /// Lower bound (inclusive) on `awarded_at`; `None` means no filter.
    /// Weekly and monthly are rolling windows that include today.
    pub fn since(&self, today: NaiveDate) -> Option<NaiveDateTime> {
        let start = match self {
            Period::Daily => today,
            Period::Weekly => today - Duration::days(6),
            Period::Monthly => today - Duration::days(29),
            Period::AllTime => return None,
        };
        start.and_hms_opt(0, 0, 0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    #[default]
    Users,
    Schools,
}

impl Scope {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some("schools") => Scope::Schools,
            _ => Scope::Users,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Users => "users",
            Scope::Schools => "schools",
        }
    }
}

/// Aggregated, not yet ranked, leaderboard line (a user or a school).
#[derive(Debug, Clone, FromRow, Serialize, PartialEq)]
pub struct LeaderboardRow {
    pub id: i64,
    pub name: String,
    pub subtitle: Option<String>,
    pub total_points: i64,
    // badges for users, members for schools
    pub extra_count: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RankedEntry {
    pub rank: usize,
    pub id: i64,
    pub name: String,
    pub subtitle: Option<String>,
    pub total_points: i64,
    pub extra_count: i64,
}

/// Sort by total descending, then name, then id, and number the result from 1.
/// Ties get distinct consecutive ranks so the sequence is always 1..=n.
pub fn assign_ranks(mut rows: Vec<LeaderboardRow>) -> Vec<RankedEntry> {
    rows.sort_by(|a, b| {
        b.total_points
            .cmp(&a.total_points)
            .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
            .then_with(|| a.id.cmp(&b.id))
    });
    rows.into_iter()
        .enumerate()
        .map(|(i, row)| RankedEntry {
            rank: i + 1,
            id: row.id,
            name: row.name,
            subtitle: row.subtitle,
            total_points: row.total_points,
            extra_count: row.extra_count,
        })
        .collect()
}

#[derive(Debug, Deserialize, Default)]
pub struct LeaderboardParams {
    pub period: Option<String>,
    pub scope: Option<String>,
    pub school_id: Option<String>,
}
