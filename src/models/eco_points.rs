// src/models/eco_points.rs
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;

/// What produced a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum ActivityType {
    Lesson,
    Quiz,
    Challenge,
    Manual,
}

impl ActivityType {
    pub const ALL: [ActivityType; 4] = [
        ActivityType::Lesson,
        ActivityType::Quiz,
        ActivityType::Challenge,
        ActivityType::Manual,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityType::Lesson => "lesson",
            ActivityType::Quiz => "quiz",
            ActivityType::Challenge => "challenge",
            ActivityType::Manual => "manual",
        }
    }
}

impl fmt::Display for ActivityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActivityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ActivityType::ALL
            .into_iter()
            .find(|a| a.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("Unknown activity type '{}'", s))
    }
}

/// One immutable row of the `eco_points` ledger.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct EcoPointEntry {
    pub id: i64,
    pub user_id: i64,
    pub points: i64,
    pub activity_type: ActivityType,
    pub activity_id: Option<i64>,
    pub description: String,
    pub reason: Option<String>,
    pub awarded_at: NaiveDateTime,
}

/// Input for a ledger insert.
#[derive(Debug, Clone)]
pub struct PointAward<'a> {
    pub user_id: i64,
    pub points: i64,
    pub activity_type: ActivityType,
    pub activity_id: Option<i64>,
    pub description: &'a str,
    pub reason: Option<&'a str>,
}

/// Admin form for manual awards and penalties (negative points).
#[derive(Debug, Deserialize)]
pub struct ManualAwardForm {
    pub user_id: i64,
    pub points: i64,
    pub description: String,
    #[serde(default)]
    pub reason: String,
}
