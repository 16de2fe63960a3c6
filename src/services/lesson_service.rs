// src/services/lesson_service.rs
use crate::{
    error::{AppError, AppResult},
    models::{
        eco_points::{ActivityType, PointAward},
        lesson::{Lesson, LessonInput, StudentLesson},
        user::CurrentUser,
    },
    services::{badge_service, eco_points_service},
};
use sqlx::SqlitePool;

const LESSON_COLUMNS: &str =
    "l.id, l.title, l.summary, l.content, l.category, l.points, l.created_by, l.is_published, l.created_at";

/// Every lesson (teacher/admin view), newest first.
pub async fn list_lessons(db_pool: &SqlitePool, created_by: Option<i64>) -> AppResult<Vec<Lesson>> {
    let lessons = sqlx::query_as::<_, Lesson>(&format!(
        "SELECT {} FROM lessons l WHERE (?1 IS NULL OR l.created_by = ?1) ORDER BY l.created_at DESC, l.id DESC",
        LESSON_COLUMNS
    ))
    .bind(created_by)
    .fetch_all(db_pool)
    .await?;
    Ok(lessons)
}

pub async fn find_lesson(db_pool: &SqlitePool, lesson_id: i64) -> AppResult<Option<Lesson>> {
    let lesson = sqlx::query_as::<_, Lesson>(&format!("SELECT {} FROM lessons l WHERE l.id = ?1", LESSON_COLUMNS))
        .bind(lesson_id)
        .fetch_optional(db_pool)
        .await?;
    Ok(lesson)
}

fn student_lesson_query(filter: &str) -> String {
    format!(
        r#"
        SELECT {},
               lc.completed_at,
               (SELECT q.id FROM quizzes q WHERE q.lesson_id = l.id ORDER BY q.id LIMIT 1) AS quiz_id
        FROM lessons l
        LEFT JOIN lesson_completions lc ON lc.lesson_id = l.id AND lc.user_id = ?1
        WHERE l.is_published = 1 AND {}
        "#,
        LESSON_COLUMNS, filter
    )
}

/// Published lessons with the student's completion state, optionally by category.
pub async fn list_for_student(
    db_pool: &SqlitePool,
    user_id: i64,
    category: Option<&str>,
) -> AppResult<Vec<StudentLesson>> {
    let sql = format!(
        "{} ORDER BY l.category ASC, l.created_at ASC, l.id ASC",
        student_lesson_query("(?2 IS NULL OR l.category = ?2)")
    );
    let lessons = sqlx::query_as::<_, StudentLesson>(&sql)
        .bind(user_id)
        .bind(category)
        .fetch_all(db_pool)
        .await?;
    Ok(lessons)
}

pub async fn lesson_for_student(
    db_pool: &SqlitePool,
    user_id: i64,
    lesson_id: i64,
) -> AppResult<Option<StudentLesson>> {
    let lesson = sqlx::query_as::<_, StudentLesson>(&student_lesson_query("l.id = ?2"))
        .bind(user_id)
        .bind(lesson_id)
        .fetch_optional(db_pool)
        .await?;
    Ok(lesson)
}

pub async fn list_categories(db_pool: &SqlitePool) -> AppResult<Vec<String>> {
    let categories = sqlx::query_scalar("SELECT DISTINCT category FROM lessons WHERE is_published = 1 ORDER BY category")
        .fetch_all(db_pool)
        .await?;
    Ok(categories)
}

pub async fn create_lesson(db_pool: &SqlitePool, input: &LessonInput, created_by: i64) -> AppResult<i64> {
    let id = sqlx::query(
        r#"
        INSERT INTO lessons (title, summary, content, category, points, created_by, is_published)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
    )
    .bind(&input.title)
    .bind(&input.summary)
    .bind(&input.content)
    .bind(&input.category)
    .bind(input.points)
    .bind(created_by)
    .bind(input.is_published)
    .execute(db_pool)
    .await?
    .last_insert_rowid();
    tracing::info!("📘 Lesson '{}' created by {}", input.title, created_by);
    Ok(id)
}

fn ensure_can_edit(lesson: &Lesson, editor: &CurrentUser) -> AppResult<()> {
    if editor.role.is_admin() || lesson.created_by == Some(editor.id) {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}

pub async fn update_lesson(
    db_pool: &SqlitePool,
    lesson_id: i64,
    input: &LessonInput,
    editor: &CurrentUser,
) -> AppResult<()> {
    let lesson = find_lesson(db_pool, lesson_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Lesson".into()))?;
    ensure_can_edit(&lesson, editor)?;

    sqlx::query(
        r#"
        UPDATE lessons
        SET title = ?1, summary = ?2, content = ?3, category = ?4, points = ?5, is_published = ?6
        WHERE id = ?7
        "#,
    )
    .bind(&input.title)
    .bind(&input.summary)
    .bind(&input.content)
    .bind(&input.category)
    .bind(input.points)
    .bind(input.is_published)
    .bind(lesson_id)
    .execute(db_pool)
    .await?;
    Ok(())
}

/// Removes the lesson with its quizzes and completions. Ledger rows stay.
pub async fn delete_lesson(db_pool: &SqlitePool, lesson_id: i64, editor: &CurrentUser) -> AppResult<()> {
    let lesson = find_lesson(db_pool, lesson_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Lesson".into()))?;
    ensure_can_edit(&lesson, editor)?;

    sqlx::query("DELETE FROM lessons WHERE id = ?1")
        .bind(lesson_id)
        .execute(db_pool)
        .await?;
    tracing::info!("Lesson {} deleted by {}", lesson_id, editor.id);
    Ok(())
}

/// Marks a lesson as read. Points are awarded on the first completion only;
/// returns `false` when the student had already completed it.
pub async fn complete_lesson(db_pool: &SqlitePool, user_id: i64, lesson_id: i64) -> AppResult<bool> {
    let lesson = find_lesson(db_pool, lesson_id)
        .await?
        .filter(|l| l.is_published)
        .ok_or_else(|| AppError::NotFound("Lesson".into()))?;

    let mut tx = db_pool.begin().await?;
    let inserted = sqlx::query(
        "INSERT INTO lesson_completions (user_id, lesson_id) VALUES (?1, ?2) ON CONFLICT(user_id, lesson_id) DO NOTHING",
    )
    .bind(user_id)
    .bind(lesson_id)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    if inserted == 0 {
        tx.rollback().await?;
        tracing::debug!("User {} already completed lesson {}", user_id, lesson_id);
        return Ok(false);
    }

    if lesson.points > 0 {
        let description = format!("Completed lesson: {}", lesson.title);
        eco_points_service::record(
            &mut *tx,
            &PointAward {
                user_id,
                points: lesson.points,
                activity_type: ActivityType::Lesson,
                activity_id: Some(lesson.id),
                description: &description,
                reason: None,
            },
        )
        .await?;
    }
    tx.commit().await?;

    badge_service::badges_after_award(db_pool, user_id).await;
    Ok(true)
}

pub async fn completed_count(db_pool: &SqlitePool, user_id: i64) -> AppResult<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM lesson_completions WHERE user_id = ?1")
        .bind(user_id)
        .fetch_one(db_pool)
        .await?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::test_support::{insert_user, test_pool_without_badges},
        models::user::Role,
    };

    fn input(title: &str, published: bool) -> LessonInput {
        LessonInput {
            title: title.into(),
            summary: "".into(),
            content: "Body".into(),
            category: "water".into(),
            points: 10,
            is_published: published,
        }
    }

    #[tokio::test]
    async fn completion_awards_points_once() {
        let pool = test_pool_without_badges().await;
        let teacher = insert_user(&pool, "Teacher", "teacher", None).await;
        let student = insert_user(&pool, "Ana", "student", None).await;
        let lesson = create_lesson(&pool, &input("Water cycle", true), teacher).await.unwrap();

        assert!(complete_lesson(&pool, student, lesson).await.unwrap());
        assert!(!complete_lesson(&pool, student, lesson).await.unwrap());

        assert_eq!(eco_points_service::total_points(&pool, student).await.unwrap(), 10);
        assert_eq!(completed_count(&pool, student).await.unwrap(), 1);

        let view = lesson_for_student(&pool, student, lesson).await.unwrap().unwrap();
        assert!(view.is_completed());
        assert_eq!(view.quiz_id, None);
    }

    #[tokio::test]
    async fn drafts_are_hidden_from_students() {
        let pool = test_pool_without_badges().await;
        let teacher = insert_user(&pool, "Teacher", "teacher", None).await;
        let student = insert_user(&pool, "Ana", "student", None).await;
        create_lesson(&pool, &input("Published", true), teacher).await.unwrap();
        let draft = create_lesson(&pool, &input("Draft", false), teacher).await.unwrap();

        let visible = list_for_student(&pool, student, None).await.unwrap();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].lesson.title, "Published");
        assert!(list_for_student(&pool, student, Some("energy")).await.unwrap().is_empty());

        assert!(matches!(complete_lesson(&pool, student, draft).await, Err(AppError::NotFound(_))));
        assert_eq!(list_lessons(&pool, Some(teacher)).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn only_author_or_admin_edits() {
        let pool = test_pool_without_badges().await;
        let author = insert_user(&pool, "Author", "teacher", None).await;
        let other = insert_user(&pool, "Other", "teacher", None).await;
        let lesson = create_lesson(&pool, &input("Soil", true), author).await.unwrap();

        let intruder = CurrentUser { id: other, name: "Other".into(), role: Role::Teacher };
        assert!(matches!(
            update_lesson(&pool, lesson, &input("Hacked", true), &intruder).await,
            Err(AppError::Forbidden)
        ));

        let owner = CurrentUser { id: author, name: "Author".into(), role: Role::Teacher };
        update_lesson(&pool, lesson, &input("Healthy soil", true), &owner).await.unwrap();
        assert_eq!(find_lesson(&pool, lesson).await.unwrap().unwrap().title, "Healthy soil");

        delete_lesson(&pool, lesson, &owner).await.unwrap();
        assert!(find_lesson(&pool, lesson).await.unwrap().is_none());
    }
}
