// src/services/challenge_service.rs
use crate::{
    error::{AppError, AppResult},
    models::{
        badge::Badge,
        challenge::{
            Challenge, ChallengeError, ChallengeInput, ChallengeStatus, ProofMetadata, StudentChallenge,
            SubmissionRow,
        },
        eco_points::{ActivityType, PointAward},
        user::CurrentUser,
    },
    services::{
        badge_service, eco_points_service,
        upload_service::{self, UploadTarget, UploadedFile},
    },
};
use chrono::{NaiveDate, Utc};
use sqlx::SqlitePool;

const CHALLENGE_COLUMNS: &str = "c.id, c.title, c.description, c.requirements, c.points, c.start_date, \
                                 c.end_date, c.created_by, c.verification_type, c.is_active, c.created_at";

/// What a student sent from the challenge page.
#[derive(Debug, Clone)]
pub struct ProofSubmission {
    pub description: String,
    pub file: Option<UploadedFile>,
}

/// Result of verifying a submission.
#[derive(Debug)]
pub struct VerificationOutcome {
    pub student_id: i64,
    pub points: i64,
    pub new_badges: Vec<Badge>,
}

pub async fn find_challenge(db_pool: &SqlitePool, challenge_id: i64) -> AppResult<Option<Challenge>> {
    let challenge = sqlx::query_as::<_, Challenge>(&format!(
        "SELECT {} FROM challenges c WHERE c.id = ?1",
        CHALLENGE_COLUMNS
    ))
    .bind(challenge_id)
    .fetch_optional(db_pool)
    .await?;
    Ok(challenge)
}

/// All challenges, or only those created by `created_by` (NGO view).
pub async fn list_challenges(db_pool: &SqlitePool, created_by: Option<i64>) -> AppResult<Vec<Challenge>> {
    let challenges = sqlx::query_as::<_, Challenge>(&format!(
        r#"
        SELECT {}
        FROM challenges c
        WHERE (?1 IS NULL OR c.created_by = ?1)
        ORDER BY c.end_date DESC, c.id DESC
        "#,
        CHALLENGE_COLUMNS
    ))
    .bind(created_by)
    .fetch_all(db_pool)
    .await?;
    Ok(challenges)
}

/// Active challenges whose window contains `today`.
pub async fn list_open_challenges(db_pool: &SqlitePool, today: NaiveDate) -> AppResult<Vec<Challenge>> {
    let challenges = sqlx::query_as::<_, Challenge>(&format!(
        r#"
        SELECT {}
        FROM challenges c
        WHERE c.is_active = 1 AND c.start_date <= ?1 AND c.end_date >= ?1
        ORDER BY c.end_date ASC, c.id ASC
        "#,
        CHALLENGE_COLUMNS
    ))
    .bind(today)
    .fetch_all(db_pool)
    .await?;
    Ok(challenges)
}

fn student_challenge_query(filter: &str) -> String {
    format!(
        r#"
        SELECT {},
               uc.status, uc.submitted_at, uc.completed_at,
               cp.proof_url, cp.verdict, cp.feedback
        FROM challenges c
        LEFT JOIN user_challenges uc ON uc.challenge_id = c.id AND uc.user_id = ?1
        LEFT JOIN challenge_proofs cp ON cp.user_challenge_id = uc.id
        WHERE {}
        "#,
        CHALLENGE_COLUMNS, filter
    )
}

/// Every active challenge with the student's own progress, open ones first.
pub async fn list_for_student(db_pool: &SqlitePool, user_id: i64) -> AppResult<Vec<StudentChallenge>> {
    let sql = format!("{} ORDER BY c.end_date DESC, c.id DESC", student_challenge_query("c.is_active = 1"));
    let rows = sqlx::query_as::<_, StudentChallenge>(&sql)
        .bind(user_id)
        .fetch_all(db_pool)
        .await?;
    Ok(rows)
}

pub async fn challenge_for_student(
    db_pool: &SqlitePool,
    user_id: i64,
    challenge_id: i64,
) -> AppResult<Option<StudentChallenge>> {
    let row = sqlx::query_as::<_, StudentChallenge>(&student_challenge_query("c.id = ?2"))
        .bind(user_id)
        .bind(challenge_id)
        .fetch_optional(db_pool)
        .await?;
    Ok(row)
}

async fn current_status(db_pool: &SqlitePool, user_id: i64, challenge_id: i64) -> AppResult<ChallengeStatus> {
    let stored: Option<ChallengeStatus> =
        sqlx::query_scalar("SELECT status FROM user_challenges WHERE user_id = ?1 AND challenge_id = ?2")
            .bind(user_id)
            .bind(challenge_id)
            .fetch_optional(db_pool)
            .await?;
    Ok(ChallengeStatus::from_stored(stored))
}

/// not_started/rejected -> pending. Every rule is checked before anything is
/// written; the two rows are then upserted together so a resubmission reuses them.
pub async fn submit_proof(
    db_pool: &SqlitePool,
    target: &UploadTarget,
    user_id: i64,
    challenge_id: i64,
    submission: ProofSubmission,
    today: NaiveDate,
) -> AppResult<i64> {
    tracing::info!("Challenge {}: proof submission from user {}", challenge_id, user_id);

    let challenge = find_challenge(db_pool, challenge_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Challenge".into()))?;

    let description = submission.description.trim().to_string();
    if description.is_empty() {
        return Err(ChallengeError::MissingDescription.into());
    }

    // an empty file input still arrives as a part with no bytes
    let file = submission.file.filter(|f| !f.is_empty());
    let image = match &file {
        Some(f) => Some((f, upload_service::validate_image(f, target.max_bytes)?)),
        None if challenge.verification_type.requires_photo() => {
            return Err(ChallengeError::MissingProof.into());
        }
        None => None,
    };

    if !challenge.is_active {
        return Err(ChallengeError::Inactive.into());
    }
    challenge.window().check(today)?;
    current_status(db_pool, user_id, challenge_id).await?.check_submit()?;

    let previous_url: Option<String> = sqlx::query_scalar(
        r#"
        SELECT cp.proof_url FROM challenge_proofs cp
        JOIN user_challenges uc ON uc.id = cp.user_challenge_id
        WHERE uc.user_id = ?1 AND uc.challenge_id = ?2
        "#,
    )
    .bind(user_id)
    .bind(challenge_id)
    .fetch_optional(db_pool)
    .await?;

    let proof_url = match image {
        Some((f, kind)) => upload_service::store_image(target, f, kind).await?,
        None => String::new(),
    };

    let metadata = serde_json::to_string(&ProofMetadata {
        description,
        original_filename: file.as_ref().and_then(|f| f.file_name.clone()),
        size_bytes: file.as_ref().map(|f| f.len()),
    })
    .map_err(|e| {
        tracing::error!("Could not serialise proof metadata: {:?}", e);
        AppError::InternalServerError
    })?;

    match write_submission(db_pool, user_id, challenge_id, &proof_url, &metadata).await {
        Ok(user_challenge_id) => {
            if let Some(old) = previous_url.filter(|old| !old.is_empty() && *old != proof_url) {
                upload_service::remove_stored(target, &old).await;
            }
            tracing::info!("✅ Challenge {}: user {} submission pending review", challenge_id, user_id);
            Ok(user_challenge_id)
        }
        Err(e) => {
            if !proof_url.is_empty() {
                upload_service::remove_stored(target, &proof_url).await;
            }
            Err(e)
        }
    }
}

async fn write_submission(
    db_pool: &SqlitePool,
    user_id: i64,
    challenge_id: i64,
    proof_url: &str,
    metadata: &str,
) -> AppResult<i64> {
    let now = Utc::now().naive_utc();
    let mut tx = db_pool.begin().await?;

    // The WHERE on the update side repeats the transition rule, so a racing
    // second submission cannot overwrite a pending or verified row.
    let user_challenge_id: Option<i64> = sqlx::query_scalar(
        r#"
        INSERT INTO user_challenges (user_id, challenge_id, status, submitted_at, completed_at)
        VALUES (?1, ?2, 'pending', ?3, NULL)
        ON CONFLICT(user_id, challenge_id) DO UPDATE SET
            status = 'pending',
            submitted_at = excluded.submitted_at,
            completed_at = NULL
        WHERE user_challenges.status = 'rejected'
        RETURNING id
        "#,
    )
    .bind(user_id)
    .bind(challenge_id)
    .bind(now)
    .fetch_optional(&mut *tx)
    .await?;

    let Some(user_challenge_id) = user_challenge_id else {
        tx.rollback().await?;
        let status = current_status(db_pool, user_id, challenge_id).await?;
        return Err(status.check_submit().err().unwrap_or(ChallengeError::AlreadyPending).into());
    };

    sqlx::query(
        r#"
        INSERT INTO challenge_proofs (user_challenge_id, proof_url, metadata, submitted_at)
        VALUES (?1, ?2, ?3, ?4)
        ON CONFLICT(user_challenge_id) DO UPDATE SET
            proof_url = excluded.proof_url,
            metadata = excluded.metadata,
            submitted_at = excluded.submitted_at,
            verdict = NULL,
            feedback = NULL,
            reviewed_by = NULL,
            reviewed_at = NULL
        "#,
    )
    .bind(user_challenge_id)
    .bind(proof_url)
    .bind(metadata)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(user_challenge_id)
}

const SUBMISSION_SELECT: &str = r#"
    SELECT uc.id AS user_challenge_id,
           uc.user_id,
           u.name AS student_name,
           s.name AS school_name,
           c.id AS challenge_id,
           c.title AS challenge_title,
           c.points,
           uc.status,
           uc.submitted_at,
           cp.proof_url,
           cp.metadata,
           cp.verdict,
           cp.feedback
    FROM user_challenges uc
    JOIN users u ON u.id = uc.user_id
    JOIN challenges c ON c.id = uc.challenge_id
    LEFT JOIN schools s ON s.id = u.school_id
    LEFT JOIN challenge_proofs cp ON cp.user_challenge_id = uc.id
"#;

/// Review queue, optionally filtered by status and by challenge author.
pub async fn list_submissions(
    db_pool: &SqlitePool,
    status: Option<ChallengeStatus>,
    created_by: Option<i64>,
) -> AppResult<Vec<SubmissionRow>> {
    let sql = format!(
        "{} WHERE (?1 IS NULL OR uc.status = ?1) AND (?2 IS NULL OR c.created_by = ?2) \
         ORDER BY uc.submitted_at ASC, uc.id ASC",
        SUBMISSION_SELECT
    );
    let rows = sqlx::query_as::<_, SubmissionRow>(&sql)
        .bind(status)
        .bind(created_by)
        .fetch_all(db_pool)
        .await?;
    Ok(rows)
}

pub async fn find_submission(db_pool: &SqlitePool, user_challenge_id: i64) -> AppResult<Option<SubmissionRow>> {
    let sql = format!("{} WHERE uc.id = ?1", SUBMISSION_SELECT);
    let row = sqlx::query_as::<_, SubmissionRow>(&sql)
        .bind(user_challenge_id)
        .fetch_optional(db_pool)
        .await?;
    Ok(row)
}

/// Admins review anything; NGOs only submissions to their own challenges.
async fn load_for_review(
    db_pool: &SqlitePool,
    user_challenge_id: i64,
    reviewer: &CurrentUser,
) -> AppResult<(SubmissionRow, Challenge)> {
    let submission = find_submission(db_pool, user_challenge_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Submission".into()))?;
    let challenge = find_challenge(db_pool, submission.challenge_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Challenge".into()))?;

    if !reviewer.role.is_admin() && challenge.created_by != Some(reviewer.id) {
        tracing::warn!(
            "User {} tried to review submission {} of someone else's challenge",
            reviewer.id,
            user_challenge_id
        );
        return Err(AppError::Forbidden);
    }
    submission.status.check_review()?;
    Ok((submission, challenge))
}

/// pending -> verified, plus the ledger award, in one transaction.
pub async fn verify_submission(
    db_pool: &SqlitePool,
    user_challenge_id: i64,
    reviewer: &CurrentUser,
    feedback: Option<&str>,
) -> AppResult<VerificationOutcome> {
    let (submission, challenge) = load_for_review(db_pool, user_challenge_id, reviewer).await?;
    let now = Utc::now().naive_utc();
    let feedback = feedback.map(str::trim).filter(|f| !f.is_empty());

    let mut tx = db_pool.begin().await?;

    let updated = sqlx::query(
        "UPDATE user_challenges SET status = 'verified', completed_at = ?1 WHERE id = ?2 AND status = 'pending'",
    )
    .bind(now)
    .bind(user_challenge_id)
    .execute(&mut *tx)
    .await?
    .rows_affected();
    if updated == 0 {
        tx.rollback().await?;
        return Err(ChallengeError::NotPending.into());
    }

    sqlx::query(
        r#"
        UPDATE challenge_proofs
        SET verdict = 'approved', feedback = ?1, reviewed_by = ?2, reviewed_at = ?3
        WHERE user_challenge_id = ?4
        "#,
    )
    .bind(feedback)
    .bind(reviewer.id)
    .bind(now)
    .bind(user_challenge_id)
    .execute(&mut *tx)
    .await?;

    let description = format!("Completed challenge: {}", challenge.title);
    let reason = format!("Verified by {}", reviewer.name);
    eco_points_service::record(
        &mut *tx,
        &PointAward {
            user_id: submission.user_id,
            points: challenge.points,
            activity_type: ActivityType::Challenge,
            activity_id: Some(challenge.id),
            description: &description,
            reason: Some(&reason),
        },
    )
    .await?;

    tx.commit().await?;
    tracing::info!(
        "✅ Submission {} verified by {}: {} points to user {}",
        user_challenge_id,
        reviewer.id,
        challenge.points,
        submission.user_id
    );

    let new_badges = badge_service::badges_after_award(db_pool, submission.user_id).await;
    Ok(VerificationOutcome {
        student_id: submission.user_id,
        points: challenge.points,
        new_badges,
    })
}

/// pending -> rejected. The feedback is shown to the student.
pub async fn reject_submission(
    db_pool: &SqlitePool,
    user_challenge_id: i64,
    reviewer: &CurrentUser,
    feedback: &str,
) -> AppResult<()> {
    let feedback = feedback.trim();
    if feedback.is_empty() {
        return Err(ChallengeError::FeedbackRequired.into());
    }
    load_for_review(db_pool, user_challenge_id, reviewer).await?;
    let now = Utc::now().naive_utc();

    let mut tx = db_pool.begin().await?;
    let updated = sqlx::query("UPDATE user_challenges SET status = 'rejected' WHERE id = ?1 AND status = 'pending'")
        .bind(user_challenge_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();
    if updated == 0 {
        tx.rollback().await?;
        return Err(ChallengeError::NotPending.into());
    }

    sqlx::query(
        r#"
        UPDATE challenge_proofs
        SET verdict = 'rejected', feedback = ?1, reviewed_by = ?2, reviewed_at = ?3
        WHERE user_challenge_id = ?4
        "#,
    )
    .bind(feedback)
    .bind(reviewer.id)
    .bind(now)
    .bind(user_challenge_id)
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;

    tracing::info!("Submission {} rejected by {}", user_challenge_id, reviewer.id);
    Ok(())
}

pub async fn create_challenge(db_pool: &SqlitePool, input: &ChallengeInput, created_by: i64) -> AppResult<i64> {
    let id = sqlx::query(
        r#"
        INSERT INTO challenges (title, description, requirements, points, start_date, end_date, created_by, verification_type)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )
    .bind(&input.title)
    .bind(&input.description)
    .bind(&input.requirements)
    .bind(input.points)
    .bind(input.start_date)
    .bind(input.end_date)
    .bind(created_by)
    .bind(input.verification_type)
    .execute(db_pool)
    .await?
    .last_insert_rowid();
    tracing::info!("🌍 Challenge '{}' created by {}", input.title, created_by);
    Ok(id)
}

/// Only the author or an admin may edit a challenge.
pub async fn update_challenge(
    db_pool: &SqlitePool,
    challenge_id: i64,
    input: &ChallengeInput,
    editor: &CurrentUser,
) -> AppResult<()> {
    let challenge = find_challenge(db_pool, challenge_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Challenge".into()))?;
    if !editor.role.is_admin() && challenge.created_by != Some(editor.id) {
        return Err(AppError::Forbidden);
    }

    sqlx::query(
        r#"
        UPDATE challenges
        SET title = ?1, description = ?2, requirements = ?3, points = ?4,
            start_date = ?5, end_date = ?6, verification_type = ?7
        WHERE id = ?8
        "#,
    )
    .bind(&input.title)
    .bind(&input.description)
    .bind(&input.requirements)
    .bind(input.points)
    .bind(input.start_date)
    .bind(input.end_date)
    .bind(input.verification_type)
    .bind(challenge_id)
    .execute(db_pool)
    .await?;
    tracing::info!("Challenge {} updated by {}", challenge_id, editor.id);
    Ok(())
}

/// Admin moderation: hide or re-show a challenge.
pub async fn set_challenge_active(db_pool: &SqlitePool, challenge_id: i64, active: bool) -> AppResult<()> {
    let rows = sqlx::query("UPDATE challenges SET is_active = ?1 WHERE id = ?2")
        .bind(active)
        .bind(challenge_id)
        .execute(db_pool)
        .await?
        .rows_affected();
    if rows == 0 {
        return Err(AppError::NotFound("Challenge".into()));
    }
    tracing::info!("Challenge {} active = {}", challenge_id, active);
    Ok(())
}

pub async fn count_pending(db_pool: &SqlitePool, created_by: Option<i64>) -> AppResult<i64> {
    let count: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM user_challenges uc
        JOIN challenges c ON c.id = uc.challenge_id
        WHERE uc.status = 'pending' AND (?1 IS NULL OR c.created_by = ?1)
        "#,
    )
    .bind(created_by)
    .fetch_one(db_pool)
    .await?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::test_support::{insert_user, test_pool_without_badges},
        models::{challenge::VerificationType, user::Role},
        services::upload_service::test_support::{png, temp_target},
    };
    use chrono::Duration;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 5, 20).unwrap()
    }

    fn input(start: NaiveDate, end: NaiveDate) -> ChallengeInput {
        ChallengeInput {
            title: "Beach clean-up".into(),
            description: "Pick up litter".into(),
            requirements: "Photo of collected bags".into(),
            points: 30,
            start_date: start,
            end_date: end,
            verification_type: VerificationType::Photo,
        }
    }

    fn proof() -> ProofSubmission {
        ProofSubmission { description: "Filled two bags".into(), file: Some(png(64)) }
    }

    fn reviewer(id: i64, role: Role) -> CurrentUser {
        CurrentUser { id, name: "Reviewer".into(), role }
    }

    async fn row_count(pool: &SqlitePool, table: &str) -> i64 {
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(pool)
            .await
            .unwrap()
    }

    struct Fixture {
        pool: SqlitePool,
        target: UploadTarget,
        ngo: i64,
        student: i64,
        challenge: i64,
    }

    async fn fixture() -> Fixture {
        let pool = test_pool_without_badges().await;
        let ngo = insert_user(&pool, "Ocean NGO", "ngo", None).await;
        let student = insert_user(&pool, "Ana", "student", None).await;
        let challenge = create_challenge(
            &pool,
            &input(today() - Duration::days(5), today() + Duration::days(5)),
            ngo,
        )
        .await
        .unwrap();
        Fixture { pool, target: temp_target(), ngo, student, challenge }
    }

    #[tokio::test]
    async fn expired_challenge_writes_nothing() {
        let f = fixture().await;
        let expired = create_challenge(
            &f.pool,
            &input(today() - Duration::days(10), today() - Duration::days(1)),
            f.ngo,
        )
        .await
        .unwrap();

        let result = submit_proof(&f.pool, &f.target, f.student, expired, proof(), today()).await;
        match result {
            Err(AppError::Challenge(ChallengeError::Expired)) => {}
            other => panic!("expected expired error, got {:?}", other),
        }
        assert_eq!(row_count(&f.pool, "user_challenges").await, 0);
        assert_eq!(row_count(&f.pool, "challenge_proofs").await, 0);
        assert!(!f.target.dir.exists());
    }

    #[tokio::test]
    async fn future_challenge_is_not_started() {
        let f = fixture().await;
        let upcoming = create_challenge(
            &f.pool,
            &input(today() + Duration::days(1), today() + Duration::days(9)),
            f.ngo,
        )
        .await
        .unwrap();
        let result = submit_proof(&f.pool, &f.target, f.student, upcoming, proof(), today()).await;
        assert!(matches!(result, Err(AppError::Challenge(ChallengeError::NotStarted))));
        assert_eq!(row_count(&f.pool, "user_challenges").await, 0);
    }

    #[tokio::test]
    async fn validation_failures_write_nothing() {
        let f = fixture().await;

        let blank = ProofSubmission { description: "   ".into(), file: Some(png(64)) };
        let result = submit_proof(&f.pool, &f.target, f.student, f.challenge, blank, today()).await;
        assert!(matches!(result, Err(AppError::Challenge(ChallengeError::MissingDescription))));

        let no_photo = ProofSubmission { description: "Did it".into(), file: None };
        let result = submit_proof(&f.pool, &f.target, f.student, f.challenge, no_photo, today()).await;
        assert!(matches!(result, Err(AppError::Challenge(ChallengeError::MissingProof))));

        let huge = ProofSubmission { description: "Did it".into(), file: Some(png(4096)) };
        let result = submit_proof(&f.pool, &f.target, f.student, f.challenge, huge, today()).await;
        assert!(matches!(result, Err(AppError::Upload(_))));

        assert_eq!(row_count(&f.pool, "user_challenges").await, 0);
    }

    #[tokio::test]
    async fn duplicate_submission_is_refused() {
        let f = fixture().await;
        submit_proof(&f.pool, &f.target, f.student, f.challenge, proof(), today()).await.unwrap();

        let again = submit_proof(&f.pool, &f.target, f.student, f.challenge, proof(), today()).await;
        assert!(matches!(again, Err(AppError::Challenge(ChallengeError::AlreadyPending))));
        assert_eq!(row_count(&f.pool, "user_challenges").await, 1);
        let _ = std::fs::remove_dir_all(&f.target.dir);
    }

    #[tokio::test]
    async fn verify_awards_points_once() {
        let f = fixture().await;
        let uc = submit_proof(&f.pool, &f.target, f.student, f.challenge, proof(), today()).await.unwrap();

        let ngo = reviewer(f.ngo, Role::Ngo);
        let outcome = verify_submission(&f.pool, uc, &ngo, Some("Great job")).await.unwrap();
        assert_eq!(outcome.points, 30);
        assert_eq!(outcome.student_id, f.student);
        assert_eq!(eco_points_service::total_points(&f.pool, f.student).await.unwrap(), 30);

        let twice = verify_submission(&f.pool, uc, &ngo, None).await;
        assert!(matches!(twice, Err(AppError::Challenge(ChallengeError::NotPending))));
        assert_eq!(eco_points_service::total_points(&f.pool, f.student).await.unwrap(), 30);

        let student_view = challenge_for_student(&f.pool, f.student, f.challenge).await.unwrap().unwrap();
        assert_eq!(student_view.status(), ChallengeStatus::Verified);
        assert!(student_view.completed_at.is_some());
        assert_eq!(student_view.verdict.as_deref(), Some("approved"));

        let resubmit = submit_proof(&f.pool, &f.target, f.student, f.challenge, proof(), today()).await;
        assert!(matches!(resubmit, Err(AppError::Challenge(ChallengeError::AlreadyCompleted))));
        let _ = std::fs::remove_dir_all(&f.target.dir);
    }

    #[tokio::test]
    async fn rejected_submission_can_be_resubmitted_in_place() {
        let f = fixture().await;
        let first = submit_proof(&f.pool, &f.target, f.student, f.challenge, proof(), today()).await.unwrap();

        let ngo = reviewer(f.ngo, Role::Ngo);
        let no_reason = reject_submission(&f.pool, first, &ngo, "  ").await;
        assert!(matches!(no_reason, Err(AppError::Challenge(ChallengeError::FeedbackRequired))));

        reject_submission(&f.pool, first, &ngo, "Photo is blurry").await.unwrap();
        let view = challenge_for_student(&f.pool, f.student, f.challenge).await.unwrap().unwrap();
        assert_eq!(view.status(), ChallengeStatus::Rejected);
        assert_eq!(view.feedback.as_deref(), Some("Photo is blurry"));

        let second = submit_proof(&f.pool, &f.target, f.student, f.challenge, proof(), today()).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(row_count(&f.pool, "user_challenges").await, 1);
        assert_eq!(row_count(&f.pool, "challenge_proofs").await, 1);

        let view = challenge_for_student(&f.pool, f.student, f.challenge).await.unwrap().unwrap();
        assert_eq!(view.status(), ChallengeStatus::Pending);
        assert_eq!(view.verdict, None);
        assert_eq!(eco_points_service::total_points(&f.pool, f.student).await.unwrap(), 0);

        // only the replacement image is left on disk
        let files = std::fs::read_dir(&f.target.dir).unwrap().count();
        assert_eq!(files, 1);
        let _ = std::fs::remove_dir_all(&f.target.dir);
    }

    #[tokio::test]
    async fn other_ngos_cannot_review() {
        let f = fixture().await;
        let uc = submit_proof(&f.pool, &f.target, f.student, f.challenge, proof(), today()).await.unwrap();
        let other = insert_user(&f.pool, "Forest NGO", "ngo", None).await;

        let result = verify_submission(&f.pool, uc, &reviewer(other, Role::Ngo), None).await;
        assert!(matches!(result, Err(AppError::Forbidden)));

        let admin = insert_user(&f.pool, "Admin", "admin", None).await;
        verify_submission(&f.pool, uc, &reviewer(admin, Role::Admin), None).await.unwrap();
        let _ = std::fs::remove_dir_all(&f.target.dir);
    }

    #[tokio::test]
    async fn review_queue_filters() {
        let f = fixture().await;
        let uc = submit_proof(&f.pool, &f.target, f.student, f.challenge, proof(), today()).await.unwrap();

        let pending = list_submissions(&f.pool, Some(ChallengeStatus::Pending), Some(f.ngo)).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].user_challenge_id, uc);
        assert_eq!(pending[0].description(), "Filled two bags");
        assert!(pending[0].has_image());
        assert_eq!(count_pending(&f.pool, None).await.unwrap(), 1);

        let other = insert_user(&f.pool, "Forest NGO", "ngo", None).await;
        assert!(list_submissions(&f.pool, None, Some(other)).await.unwrap().is_empty());
        assert!(list_submissions(&f.pool, Some(ChallengeStatus::Verified), None).await.unwrap().is_empty());
        let _ = std::fs::remove_dir_all(&f.target.dir);
    }

    #[tokio::test]
    async fn description_only_challenges_accept_no_photo() {
        let f = fixture().await;
        let id = create_challenge(
            &f.pool,
            &ChallengeInput {
                verification_type: VerificationType::Description,
                ..input(today(), today())
            },
            f.ngo,
        )
        .await
        .unwrap();

        let submission = ProofSubmission { description: "Walked to school all week".into(), file: None };
        submit_proof(&f.pool, &f.target, f.student, id, submission, today()).await.unwrap();
        let rows = list_submissions(&f.pool, None, None).await.unwrap();
        assert!(!rows[0].has_image());
    }

    #[tokio::test]
    async fn hidden_and_open_challenges() {
        let f = fixture().await;
        assert_eq!(list_open_challenges(&f.pool, today()).await.unwrap().len(), 1);

        set_challenge_active(&f.pool, f.challenge, false).await.unwrap();
        assert!(list_open_challenges(&f.pool, today()).await.unwrap().is_empty());
        assert!(list_for_student(&f.pool, f.student).await.unwrap().is_empty());

        let result = submit_proof(&f.pool, &f.target, f.student, f.challenge, proof(), today()).await;
        assert!(matches!(result, Err(AppError::Challenge(ChallengeError::Inactive))));
    }

    #[tokio::test]
    async fn only_author_or_admin_edits() {
        let f = fixture().await;
        let other = insert_user(&f.pool, "Forest NGO", "ngo", None).await;
        let mut changed = input(today(), today() + Duration::days(30));
        changed.title = "Bigger clean-up".into();

        let result = update_challenge(&f.pool, f.challenge, &changed, &reviewer(other, Role::Ngo)).await;
        assert!(matches!(result, Err(AppError::Forbidden)));

        update_challenge(&f.pool, f.challenge, &changed, &reviewer(f.ngo, Role::Ngo)).await.unwrap();
        let challenge = find_challenge(&f.pool, f.challenge).await.unwrap().unwrap();
        assert_eq!(challenge.title, "Bigger clean-up");
        assert_eq!(list_challenges(&f.pool, Some(f.ngo)).await.unwrap().len(), 1);
        assert!(list_challenges(&f.pool, Some(other)).await.unwrap().is_empty());
    }
}
