// src/services/quiz_service.rs
use crate::{
    error::{AppError, AppResult},
    models::{
        eco_points::{ActivityType, PointAward},
        quiz::{grade_attempt, Grade, NewQuiz, Question, QuestionWithOptions, Quiz, QuizAttempt, QuizOption},
    },
    services::{badge_service, eco_points_service},
};
use sqlx::SqlitePool;
use std::collections::HashMap;

/// A quiz with its questions, ready to render or grade.
#[derive(Debug, Clone)]
pub struct QuizDetail {
    pub quiz: Quiz,
    pub questions: Vec<QuestionWithOptions>,
}

/// What happened when a student handed in answers.
#[derive(Debug, Clone)]
pub struct AttemptOutcome {
    pub attempt_id: i64,
    pub grade: Grade,
    pub points_awarded: i64,
}

/// Inserts the quiz, its questions and their options in one transaction.
pub async fn create_quiz(db_pool: &SqlitePool, lesson_id: i64, new_quiz: &NewQuiz) -> AppResult<i64> {
    let mut tx = db_pool.begin().await?;

    let quiz_id = sqlx::query("INSERT INTO quizzes (lesson_id, title, pass_percentage, points) VALUES (?1, ?2, ?3, ?4)")
        .bind(lesson_id)
        .bind(&new_quiz.title)
        .bind(new_quiz.pass_percentage)
        .bind(new_quiz.points)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

    for (position, question) in new_quiz.questions.iter().enumerate() {
        let question_id = sqlx::query("INSERT INTO questions (quiz_id, text, marks, position) VALUES (?1, ?2, ?3, ?4)")
            .bind(quiz_id)
            .bind(&question.text)
            .bind(question.marks)
            .bind(position as i64)
            .execute(&mut *tx)
            .await?
            .last_insert_rowid();

        for (index, option) in question.options.iter().enumerate() {
            sqlx::query("INSERT INTO options (question_id, text, is_correct) VALUES (?1, ?2, ?3)")
                .bind(question_id)
                .bind(option)
                .bind(index == question.correct)
                .execute(&mut *tx)
                .await?;
        }
    }

    tx.commit().await?;
    tracing::info!(
        "📝 Quiz '{}' with {} questions added to lesson {}",
        new_quiz.title,
        new_quiz.questions.len(),
        lesson_id
    );
    Ok(quiz_id)
}

pub async fn find_quiz(db_pool: &SqlitePool, quiz_id: i64) -> AppResult<Option<Quiz>> {
    let quiz = sqlx::query_as::<_, Quiz>(
        "SELECT id, lesson_id, title, pass_percentage, points, created_at FROM quizzes WHERE id = ?1",
    )
    .bind(quiz_id)
    .fetch_optional(db_pool)
    .await?;
    Ok(quiz)
}

pub async fn quizzes_for_lesson(db_pool: &SqlitePool, lesson_id: i64) -> AppResult<Vec<Quiz>> {
    let quizzes = sqlx::query_as::<_, Quiz>(
        "SELECT id, lesson_id, title, pass_percentage, points, created_at FROM quizzes WHERE lesson_id = ?1 ORDER BY id",
    )
    .bind(lesson_id)
    .fetch_all(db_pool)
    .await?;
    Ok(quizzes)
}

pub async fn load_quiz(db_pool: &SqlitePool, quiz_id: i64) -> AppResult<QuizDetail> {
    let quiz = find_quiz(db_pool, quiz_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Quiz".into()))?;

    let questions = sqlx::query_as::<_, Question>(
        "SELECT id, quiz_id, text, marks, position FROM questions WHERE quiz_id = ?1 ORDER BY position, id",
    )
    .bind(quiz_id)
    .fetch_all(db_pool)
    .await?;

    let options = sqlx::query_as::<_, QuizOption>(
        r#"
        SELECT o.id, o.question_id, o.text, o.is_correct
        FROM options o
        JOIN questions q ON q.id = o.question_id
        WHERE q.quiz_id = ?1
        ORDER BY o.id
        "#,
    )
    .bind(quiz_id)
    .fetch_all(db_pool)
    .await?;

    let mut by_question: HashMap<i64, Vec<QuizOption>> = HashMap::new();
    for option in options {
        by_question.entry(option.question_id).or_default().push(option);
    }

    let questions = questions
        .into_iter()
        .map(|question| QuestionWithOptions {
            options: by_question.remove(&question.id).unwrap_or_default(),
            question,
        })
        .collect();

    Ok(QuizDetail { quiz, questions })
}

/// Grades and stores the attempt. Points go to the ledger only for the first
/// passing attempt; retakes are recorded but never pay out again.
pub async fn submit_attempt(
    db_pool: &SqlitePool,
    user_id: i64,
    quiz_id: i64,
    answers: &HashMap<i64, i64>,
) -> AppResult<AttemptOutcome> {
    let detail = load_quiz(db_pool, quiz_id).await?;
    let grade = grade_attempt(&detail.questions, answers, detail.quiz.pass_percentage);

    let mut tx = db_pool.begin().await?;

    let already_passed: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM quiz_attempts WHERE quiz_id = ?1 AND user_id = ?2 AND passed = 1)",
    )
    .bind(quiz_id)
    .bind(user_id)
    .fetch_one(&mut *tx)
    .await?;

    let attempt_id = sqlx::query(
        "INSERT INTO quiz_attempts (quiz_id, user_id, score, total_marks, passed) VALUES (?1, ?2, ?3, ?4, ?5)",
    )
    .bind(quiz_id)
    .bind(user_id)
    .bind(grade.score)
    .bind(grade.total_marks)
    .bind(grade.passed)
    .execute(&mut *tx)
    .await?
    .last_insert_rowid();

    let points_awarded = if grade.passed && !already_passed && detail.quiz.points > 0 {
        let description = format!("Passed quiz: {}", detail.quiz.title);
        let reason = format!("First pass with {}/{}", grade.score, grade.total_marks);
        eco_points_service::record(
            &mut *tx,
            &PointAward {
                user_id,
                points: detail.quiz.points,
                activity_type: ActivityType::Quiz,
                activity_id: Some(quiz_id),
                description: &description,
                reason: Some(&reason),
            },
        )
        .await?;
        detail.quiz.points
    } else {
        0
    };

    tx.commit().await?;
    tracing::info!(
        "Quiz {}: user {} scored {}/{} (passed: {})",
        quiz_id,
        user_id,
        grade.score,
        grade.total_marks,
        grade.passed
    );

    if points_awarded > 0 {
        badge_service::badges_after_award(db_pool, user_id).await;
    }
    Ok(AttemptOutcome { attempt_id, grade, points_awarded })
}

/// The student's attempts at one quiz, newest first.
pub async fn attempts_for_user(db_pool: &SqlitePool, user_id: i64, quiz_id: i64) -> AppResult<Vec<QuizAttempt>> {
    let attempts = sqlx::query_as::<_, QuizAttempt>(
        r#"
        SELECT id, quiz_id, user_id, score, total_marks, passed, attempted_at
        FROM quiz_attempts
        WHERE user_id = ?1 AND quiz_id = ?2
        ORDER BY attempted_at DESC, id DESC
        "#,
    )
    .bind(user_id)
    .bind(quiz_id)
    .fetch_all(db_pool)
    .await?;
    Ok(attempts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::test_support::{insert_user, test_pool_without_badges},
        models::{lesson::LessonInput, quiz::NewQuestion},
        services::lesson_service,
    };

    async fn setup() -> (SqlitePool, i64, i64) {
        let pool = test_pool_without_badges().await;
        let teacher = insert_user(&pool, "Teacher", "teacher", None).await;
        let student = insert_user(&pool, "Ana", "student", None).await;
        let lesson = lesson_service::create_lesson(
            &pool,
            &LessonInput {
                title: "Recycling".into(),
                summary: "".into(),
                content: "Sort your waste".into(),
                category: "waste".into(),
                points: 0,
                is_published: true,
            },
            teacher,
        )
        .await
        .unwrap();

        let quiz = create_quiz(
            &pool,
            lesson,
            &NewQuiz {
                title: "Recycling basics".into(),
                pass_percentage: 50,
                points: 20,
                questions: vec![
                    NewQuestion {
                        text: "Glass goes in?".into(),
                        marks: 1,
                        options: vec!["Green bin".into(), "Blue bin".into()],
                        correct: 0,
                    },
                    NewQuestion {
                        text: "Paper goes in?".into(),
                        marks: 1,
                        options: vec!["Green bin".into(), "Blue bin".into()],
                        correct: 1,
                    },
                ],
            },
        )
        .await
        .unwrap();
        (pool, student, quiz)
    }

    fn answers(detail: &QuizDetail, pick_correct: bool) -> HashMap<i64, i64> {
        detail
            .questions
            .iter()
            .map(|q| {
                let option = q.options.iter().find(|o| o.is_correct == pick_correct).unwrap();
                (q.question.id, option.id)
            })
            .collect()
    }

    #[tokio::test]
    async fn quiz_loads_with_ordered_questions() {
        let (pool, _, quiz) = setup().await;
        let detail = load_quiz(&pool, quiz).await.unwrap();
        assert_eq!(detail.questions.len(), 2);
        assert_eq!(detail.questions[0].question.text, "Glass goes in?");
        assert!(detail.questions.iter().all(|q| q.options.len() == 2));
        assert!(matches!(load_quiz(&pool, 999).await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn points_only_for_first_pass() {
        let (pool, student, quiz) = setup().await;
        let detail = load_quiz(&pool, quiz).await.unwrap();

        let failed = submit_attempt(&pool, student, quiz, &answers(&detail, false)).await.unwrap();
        assert!(!failed.grade.passed);
        assert_eq!(failed.points_awarded, 0);

        let passed = submit_attempt(&pool, student, quiz, &answers(&detail, true)).await.unwrap();
        assert!(passed.grade.passed);
        assert_eq!(passed.points_awarded, 20);

        let retake = submit_attempt(&pool, student, quiz, &answers(&detail, true)).await.unwrap();
        assert!(retake.grade.passed);
        assert_eq!(retake.points_awarded, 0);

        assert_eq!(eco_points_service::total_points(&pool, student).await.unwrap(), 20);
        assert_eq!(attempts_for_user(&pool, student, quiz).await.unwrap().len(), 3);
        assert_eq!(
            eco_points_service::activity_count(&pool, student, ActivityType::Quiz).await.unwrap(),
            1
        );
    }
}
