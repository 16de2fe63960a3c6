// src/models/challenge.rs
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use thiserror::Error;

/// Where a student stands on one challenge. `NotStarted` is never stored:
/// it is the absence of a `user_challenges` row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum ChallengeStatus {
    #[default]
    NotStarted,
    Pending,
    Verified,
    Rejected,
}

impl ChallengeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChallengeStatus::NotStarted => "not_started",
            ChallengeStatus::Pending => "pending",
            ChallengeStatus::Verified => "verified",
            ChallengeStatus::Rejected => "rejected",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ChallengeStatus::NotStarted => "Not started",
            ChallengeStatus::Pending => "Awaiting review",
            ChallengeStatus::Verified => "Completed",
            ChallengeStatus::Rejected => "Rejected",
        }
    }

    /// Bootstrap badge colour used by the templates.
    pub fn css_class(&self) -> &'static str {
        match self {
            ChallengeStatus::NotStarted => "secondary",
            ChallengeStatus::Pending => "warning",
            ChallengeStatus::Verified => "success",
            ChallengeStatus::Rejected => "danger",
        }
    }

    pub fn from_stored(stored: Option<ChallengeStatus>) -> Self {
        stored.unwrap_or_default()
    }

    /// not_started -> pending and rejected -> pending are the only ways in.
    pub fn check_submit(self) -> Result<(), ChallengeError> {
        match self {
            ChallengeStatus::NotStarted | ChallengeStatus::Rejected => Ok(()),
            ChallengeStatus::Pending => Err(ChallengeError::AlreadyPending),
            ChallengeStatus::Verified => Err(ChallengeError::AlreadyCompleted),
        }
    }

    /// Verification and rejection both start from pending.
    pub fn check_review(self) -> Result<(), ChallengeError> {
        match self {
            ChallengeStatus::Pending => Ok(()),
            _ => Err(ChallengeError::NotPending),
        }
    }

    pub fn can_submit(self) -> bool {
        self.check_submit().is_ok()
    }

    pub fn parse_filter(raw: &str) -> Option<Self> {
        match raw.trim() {
            "pending" => Some(ChallengeStatus::Pending),
            "verified" => Some(ChallengeStatus::Verified),
            "rejected" => Some(ChallengeStatus::Rejected),
            _ => None,
        }
    }
}

/// Rule violations in the challenge lifecycle. The Display text is what the student sees.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChallengeError {
    #[error("Please describe what you did.")]
    MissingDescription,
    #[error("Please attach a photo as proof.")]
    MissingProof,
    #[error("This challenge has not started yet.")]
    NotStarted,
    #[error("This challenge has expired.")]
    Expired,
    #[error("This challenge is no longer available.")]
    Inactive,
    #[error("Your submission is already awaiting review.")]
    AlreadyPending,
    #[error("You have already completed this challenge.")]
    AlreadyCompleted,
    #[error("This submission has already been reviewed.")]
    NotPending,
    #[error("Please tell the student why the submission was rejected.")]
    FeedbackRequired,
}

/// Inclusive calendar-date window in which submissions are accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChallengeWindow {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl ChallengeWindow {
    pub fn check(&self, today: NaiveDate) -> Result<(), ChallengeError> {
        if today < self.start_date {
            Err(ChallengeError::NotStarted)
        } else if today > self.end_date {
            Err(ChallengeError::Expired)
        } else {
            Ok(())
        }
    }

    pub fn is_open(&self, today: NaiveDate) -> bool {
        self.check(today).is_ok()
    }

    pub fn days_left(&self, today: NaiveDate) -> i64 {
        (self.end_date - today).num_days().max(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum VerificationType {
    Photo,
    Description,
}

impl VerificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationType::Photo => "photo",
            VerificationType::Description => "description",
        }
    }

    pub fn requires_photo(&self) -> bool {
        *self == VerificationType::Photo
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Challenge {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub requirements: String,
    pub points: i64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub created_by: Option<i64>,
    pub verification_type: VerificationType,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
}

impl Challenge {
    pub fn window(&self) -> ChallengeWindow {
        ChallengeWindow {
            start_date: self.start_date,
            end_date: self.end_date,
        }
    }
}

/// A challenge as one student sees it: the challenge plus their own progress.
#[derive(Debug, Clone, FromRow)]
pub struct StudentChallenge {
    #[sqlx(flatten)]
    pub challenge: Challenge,
    pub status: Option<ChallengeStatus>,
    pub submitted_at: Option<NaiveDateTime>,
    pub completed_at: Option<NaiveDateTime>,
    pub proof_url: Option<String>,
    pub verdict: Option<String>,
    pub feedback: Option<String>,
}

impl StudentChallenge {
    pub fn status(&self) -> ChallengeStatus {
        ChallengeStatus::from_stored(self.status)
    }
}

/// One submission in the review queue.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SubmissionRow {
    pub user_challenge_id: i64,
    pub user_id: i64,
    pub student_name: String,
    pub school_name: Option<String>,
    pub challenge_id: i64,
    pub challenge_title: String,
    pub points: i64,
    pub status: ChallengeStatus,
    pub submitted_at: NaiveDateTime,
    pub proof_url: Option<String>,
    pub metadata: Option<String>,
    pub verdict: Option<String>,
    pub feedback: Option<String>,
}

impl SubmissionRow {
    pub fn description(&self) -> String {
        self.metadata
            .as_deref()
            .and_then(|raw| serde_json::from_str::<ProofMetadata>(raw).ok())
            .map(|m| m.description)
            .unwrap_or_default()
    }

    pub fn has_image(&self) -> bool {
        self.proof_url.as_deref().is_some_and(|url| !url.is_empty())
    }
}

/// JSON blob stored in `challenge_proofs.metadata`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProofMetadata {
    pub description: String,
    #[serde(default)]
    pub original_filename: Option<String>,
    #[serde(default)]
    pub size_bytes: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct ChallengeForm {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub requirements: String,
    pub points: i64,
    pub start_date: String,
    pub end_date: String,
    #[serde(default)]
    pub verification_type: Option<String>,
}

/// Validated challenge data.
#[derive(Debug, Clone, PartialEq)]
pub struct ChallengeInput {
    pub title: String,
    pub description: String,
    pub requirements: String,
    pub points: i64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub verification_type: VerificationType,
}

impl ChallengeForm {
    pub fn into_input(self) -> Result<ChallengeInput, String> {
        let title = self.title.trim().to_string();
        if title.is_empty() {
            return Err("Title is required.".into());
        }
        if self.points < 0 {
            return Err("Points cannot be negative.".into());
        }
        let start_date = parse_date(&self.start_date, "Start date")?;
        let end_date = parse_date(&self.end_date, "End date")?;
        if end_date < start_date {
            return Err("End date must not be before the start date.".into());
        }
        let verification_type = match self.verification_type.as_deref().map(str::trim) {
            Some("description") => VerificationType::Description,
            _ => VerificationType::Photo,
        };
        Ok(ChallengeInput {
            title,
            description: self.description.trim().to_string(),
            requirements: self.requirements.trim().to_string(),
            points: self.points,
            start_date,
            end_date,
            verification_type,
        })
    }
}

fn parse_date(raw: &str, field: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| format!("{} must be a valid date.", field))
}

#[derive(Debug, Deserialize)]
pub struct ReviewForm {
    #[serde(default)]
    pub feedback: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn submit_transitions() {
        assert_eq!(ChallengeStatus::NotStarted.check_submit(), Ok(()));
        assert_eq!(ChallengeStatus::Rejected.check_submit(), Ok(()));
        assert_eq!(ChallengeStatus::Pending.check_submit(), Err(ChallengeError::AlreadyPending));
        assert_eq!(ChallengeStatus::Verified.check_submit(), Err(ChallengeError::AlreadyCompleted));
    }

    #[test]
    fn review_only_from_pending() {
        assert!(ChallengeStatus::Pending.check_review().is_ok());
        for status in [ChallengeStatus::NotStarted, ChallengeStatus::Verified, ChallengeStatus::Rejected] {
            assert_eq!(status.check_review(), Err(ChallengeError::NotPending));
        }
    }

    #[test]
    fn missing_row_means_not_started() {
        assert_eq!(ChallengeStatus::from_stored(None), ChallengeStatus::NotStarted);
        assert_eq!(
            ChallengeStatus::from_stored(Some(ChallengeStatus::Rejected)),
            ChallengeStatus::Rejected
        );
    }

    #[test]
    fn window_bounds_are_inclusive() {
        let window = ChallengeWindow { start_date: d("2025-03-01"), end_date: d("2025-03-31") };
        assert_eq!(window.check(d("2025-02-28")), Err(ChallengeError::NotStarted));
        assert!(window.check(d("2025-03-01")).is_ok());
        assert!(window.check(d("2025-03-31")).is_ok());
        assert_eq!(window.check(d("2025-04-01")), Err(ChallengeError::Expired));
        assert_eq!(window.days_left(d("2025-03-29")), 2);
        assert_eq!(window.days_left(d("2025-05-01")), 0);
    }

    #[test]
    fn expired_message_mentions_expired() {
        assert!(ChallengeError::Expired.to_string().contains("expired"));
    }

    #[test]
    fn form_validation() {
        let form = ChallengeForm {
            title: "Plant a tree".into(),
            description: "".into(),
            requirements: "".into(),
            points: 50,
            start_date: "2025-04-10".into(),
            end_date: "2025-04-01".into(),
            verification_type: None,
        };
        assert!(form.into_input().unwrap_err().contains("End date"));

        let form = ChallengeForm {
            title: "Plant a tree".into(),
            description: " Go outside ".into(),
            requirements: "".into(),
            points: 50,
            start_date: "2025-04-01".into(),
            end_date: "2025-04-01".into(),
            verification_type: Some("description".into()),
        };
        let input = form.into_input().unwrap();
        assert_eq!(input.description, "Go outside");
        assert_eq!(input.verification_type, VerificationType::Description);
    }

    #[test]
    fn submission_description_comes_from_metadata() {
        let meta = ProofMetadata {
            description: "Collected 3 bags of litter".into(),
            original_filename: Some("beach.jpg".into()),
            size_bytes: Some(1024),
        };
        let row = SubmissionRow {
            user_challenge_id: 1,
            user_id: 1,
            student_name: "Ana".into(),
            school_name: None,
            challenge_id: 1,
            challenge_title: "Beach clean-up".into(),
            points: 20,
            status: ChallengeStatus::Pending,
            submitted_at: NaiveDateTime::default(),
            proof_url: Some(String::new()),
            metadata: Some(serde_json::to_string(&meta).unwrap()),
            verdict: None,
            feedback: None,
        };
        assert_eq!(row.description(), "Collected 3 bags of litter");
        assert!(!row.has_image());
    }
}
