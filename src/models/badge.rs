// src/models/badge.rs
use crate::models::eco_points::ActivityType;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Badge {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub image_url: Option<String>,
    pub category: String,
    pub points_required: Option<i64>,
    pub activity_type: Option<ActivityType>,
    pub activity_count_required: Option<i64>,
    pub created_at: NaiveDateTime,
}

impl Badge {
    /// Badges without any criterion are only ever handed out by an admin.
    pub fn is_manual_only(&self) -> bool {
        self.points_required.is_none() && self.activity_criterion().is_none()
    }

    pub fn activity_criterion(&self) -> Option<(ActivityType, i64)> {
        match (self.activity_type, self.activity_count_required) {
            (Some(kind), Some(count)) => Some((kind, count)),
            _ => None,
        }
    }

    /// Every criterion the badge declares must hold. `activity_count` is the
    /// user's count for the badge's activity type (ignored when it has none).
    pub fn qualifies(&self, total_points: i64, activity_count: i64) -> bool {
        if self.is_manual_only() {
            return false;
        }
        let points_ok = self.points_required.map_or(true, |required| total_points >= required);
        let activity_ok = self
            .activity_criterion()
            .map_or(true, |(_, required)| activity_count >= required);
        points_ok && activity_ok
    }

    pub fn criteria_text(&self) -> String {
        let mut parts = Vec::new();
        if let Some(points) = self.points_required {
            parts.push(format!("{} eco-points", points));
        }
        if let Some((kind, count)) = self.activity_criterion() {
            parts.push(format!("{} × {}", count, kind));
        }
        if parts.is_empty() {
            "Awarded by an administrator".to_string()
        } else {
            parts.join(" and ")
        }
    }
}

/// A badge held by a user.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct EarnedBadge {
    pub badge_id: i64,
    pub name: String,
    pub description: String,
    pub image_url: Option<String>,
    pub category: String,
    pub awarded_at: NaiveDateTime,
}

/// Create/edit form. Numeric fields come in as text so that blank means "no criterion".
#[derive(Debug, Deserialize)]
pub struct BadgeForm {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub points_required: Option<String>,
    #[serde(default)]
    pub activity_type: Option<String>,
    #[serde(default)]
    pub activity_count_required: Option<String>,
}

/// Validated badge data ready for insert/update.
#[derive(Debug, Clone, PartialEq)]
pub struct BadgeInput {
    pub name: String,
    pub description: String,
    pub image_url: Option<String>,
    pub category: String,
    pub points_required: Option<i64>,
    pub activity_type: Option<ActivityType>,
    pub activity_count_required: Option<i64>,
}

impl BadgeForm {
    pub fn into_input(self) -> Result<BadgeInput, String> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err("Badge name is required.".into());
        }

        let points_required = parse_positive(self.points_required.as_deref(), "Points required")?;
        let activity_count_required =
            parse_positive(self.activity_count_required.as_deref(), "Activity count")?;
        let activity_type = match self.activity_type.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(raw.parse::<ActivityType>()?),
        };
        if activity_type.is_some() != activity_count_required.is_some() {
            return Err("Activity type and activity count must be set together.".into());
        }

        let category = match self.category.trim() {
            "" => "general".to_string(),
            other => other.to_string(),
        };

        Ok(BadgeInput {
            name,
            description: self.description.trim().to_string(),
            image_url: self.image_url.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()),
            category,
            points_required,
            activity_type,
            activity_count_required,
        })
    }
}

fn parse_positive(raw: Option<&str>, field: &str) -> Result<Option<i64>, String> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => match s.parse::<i64>() {
            Ok(n) if n > 0 => Ok(Some(n)),
            _ => Err(format!("{} must be a positive whole number.", field)),
        },
    }
}

#[derive(Debug, Deserialize)]
pub struct AwardBadgeForm {
    pub user_id: i64,
    pub badge_id: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn badge(points: Option<i64>, activity: Option<(ActivityType, i64)>) -> Badge {
        Badge {
            id: 1,
            name: "Test".into(),
            description: String::new(),
            image_url: None,
            category: "general".into(),
            points_required: points,
            activity_type: activity.map(|a| a.0),
            activity_count_required: activity.map(|a| a.1),
            created_at: NaiveDateTime::default(),
        }
    }

    #[test]
    fn points_threshold_is_inclusive() {
        let b = badge(Some(40), None);
        assert!(!b.qualifies(39, 0));
        assert!(b.qualifies(40, 0));
        assert!(b.qualifies(45, 0));
    }

    #[test]
    fn manual_badges_never_qualify() {
        let b = badge(None, None);
        assert!(b.is_manual_only());
        assert!(!b.qualifies(1_000_000, 1_000));
    }

    #[test]
    fn combined_criteria_need_both() {
        let b = badge(Some(100), Some((ActivityType::Challenge, 3)));
        assert!(!b.qualifies(150, 2));
        assert!(!b.qualifies(90, 5));
        assert!(b.qualifies(100, 3));
    }

    #[test]
    fn criteria_text_describes_rules() {
        assert_eq!(badge(None, None).criteria_text(), "Awarded by an administrator");
        assert_eq!(badge(Some(10), None).criteria_text(), "10 eco-points");
        assert_eq!(
            badge(Some(10), Some((ActivityType::Lesson, 5))).criteria_text(),
            "10 eco-points and 5 × lesson"
        );
    }

    #[test]
    fn form_blank_numbers_mean_no_criterion() {
        let form = BadgeForm {
            name: " Helper ".into(),
            description: "".into(),
            image_url: Some("  ".into()),
            category: "".into(),
            points_required: Some("".into()),
            activity_type: Some("".into()),
            activity_count_required: None,
        };
        let input = form.into_input().unwrap();
        assert_eq!(input.name, "Helper");
        assert_eq!(input.category, "general");
        assert_eq!(input.image_url, None);
        assert_eq!(input.points_required, None);
        assert_eq!(input.activity_type, None);
    }

    #[test]
    fn form_rejects_half_an_activity_rule() {
        let form = BadgeForm {
            name: "Reader".into(),
            description: "".into(),
            image_url: None,
            category: "learning".into(),
            points_required: None,
            activity_type: Some("lesson".into()),
            activity_count_required: None,
        };
        assert!(form.into_input().is_err());
    }

    #[test]
    fn form_rejects_non_positive_threshold() {
        let form = BadgeForm {
            name: "Zero".into(),
            description: "".into(),
            image_url: None,
            category: "".into(),
            points_required: Some("0".into()),
            activity_type: None,
            activity_count_required: None,
        };
        assert!(form.into_input().unwrap_err().contains("positive"));
    }
}
