// src/models/lesson.rs
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Lesson {
    pub id: i64,
    pub title: String,
    pub summary: String,
    pub content: String,
    pub category: String,
    pub points: i64,
    pub created_by: Option<i64>,
    pub is_published: bool,
    pub created_at: NaiveDateTime,
}

/// Lesson plus the current student's progress.
#[derive(Debug, Clone, FromRow)]
pub struct StudentLesson {
    #[sqlx(flatten)]
    pub lesson: Lesson,
    pub completed_at: Option<NaiveDateTime>,
    pub quiz_id: Option<i64>,
}

impl StudentLesson {
    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }
}

#[derive(Debug, Deserialize)]
pub struct LessonForm {
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub points: i64,
    // HTML checkbox: present ("on") when ticked, absent otherwise
    #[serde(default)]
    pub is_published: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LessonInput {
    pub title: String,
    pub summary: String,
    pub content: String,
    pub category: String,
    pub points: i64,
    pub is_published: bool,
}

impl LessonForm {
    pub fn into_input(self) -> Result<LessonInput, String> {
        let title = self.title.trim().to_string();
        if title.is_empty() {
            return Err("Lesson title is required.".into());
        }
        if self.content.trim().is_empty() {
            return Err("Lesson content is required.".into());
        }
        if self.points < 0 {
            return Err("Points cannot be negative.".into());
        }
        let category = match self.category.trim() {
            "" => "general".to_string(),
            c => c.to_string(),
        };
        Ok(LessonInput {
            title,
            summary: self.summary.trim().to_string(),
            content: self.content,
            category,
            points: self.points,
            is_published: self.is_published.is_some(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkbox_controls_publication() {
        let form = LessonForm {
            title: "Water cycle".into(),
            summary: "".into(),
            content: "Evaporation, condensation...".into(),
            category: "".into(),
            points: 10,
            is_published: None,
        };
        let input = form.into_input().unwrap();
        assert!(!input.is_published);
        assert_eq!(input.category, "general");
    }

    #[test]
    fn content_is_required() {
        let form = LessonForm {
            title: "Empty".into(),
            summary: "".into(),
            content: "   ".into(),
            category: "".into(),
            points: 0,
            is_published: Some("on".into()),
        };
        assert!(form.into_input().is_err());
    }
}
