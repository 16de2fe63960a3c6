// src/models/quiz.rs
use chrono::NaiveDateTime;
use serde::Serialize;
use sqlx::FromRow;
use std::collections::HashMap;

pub const MAX_QUESTIONS: usize = 10;
pub const MAX_OPTIONS: usize = 4;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Quiz {
    pub id: i64,
    pub lesson_id: i64,
    pub title: String,
    pub pass_percentage: i64,
    pub points: i64,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Question {
    pub id: i64,
    pub quiz_id: i64,
    pub text: String,
    pub marks: i64,
    pub position: i64,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct QuizOption {
    pub id: i64,
    pub question_id: i64,
    pub text: String,
    // never sent to students
    #[serde(skip)]
    pub is_correct: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuestionWithOptions {
    pub question: Question,
    pub options: Vec<QuizOption>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct QuizAttempt {
    pub id: i64,
    pub quiz_id: i64,
    pub user_id: i64,
    pub score: i64,
    pub total_marks: i64,
    pub passed: bool,
    pub attempted_at: NaiveDateTime,
}

impl QuizAttempt {
    pub fn percentage(&self) -> i64 {
        percentage(self.score, self.total_marks)
    }
}

/// Result of grading one set of answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grade {
    pub score: i64,
    pub total_marks: i64,
    pub passed: bool,
}

impl Grade {
    pub fn percentage(&self) -> i64 {
        percentage(self.score, self.total_marks)
    }
}

fn percentage(score: i64, total: i64) -> i64 {
    if total <= 0 {
        0
    } else {
        score * 100 / total
    }
}

/// Sum the marks of every question whose chosen option is a correct one.
/// Unanswered questions and options from another question score nothing.
pub fn grade_attempt(
    questions: &[QuestionWithOptions],
    answers: &HashMap<i64, i64>,
    pass_percentage: i64,
) -> Grade {
    let total_marks: i64 = questions.iter().map(|q| q.question.marks).sum();
    let score: i64 = questions
        .iter()
        .filter(|q| {
            answers.get(&q.question.id).is_some_and(|chosen| {
                q.options.iter().any(|o| o.id == *chosen && o.is_correct)
            })
        })
        .map(|q| q.question.marks)
        .sum();
    let passed = total_marks > 0 && score * 100 >= pass_percentage * total_marks;
    Grade { score, total_marks, passed }
}

/// Answers arrive as `q_<question id>=<option id>`; anything else is ignored.
pub fn parse_answers(fields: &HashMap<String, String>) -> HashMap<i64, i64> {
    fields
        .iter()
        .filter_map(|(key, value)| {
            let question_id = key.strip_prefix("q_")?.parse().ok()?;
            let option_id = value.trim().parse().ok()?;
            Some((question_id, option_id))
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewQuestion {
    pub text: String,
    pub marks: i64,
    pub options: Vec<String>,
    // index into `options`
    pub correct: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewQuiz {
    pub title: String,
    pub pass_percentage: i64,
    pub points: i64,
    pub questions: Vec<NewQuestion>,
}

/// Reads the quiz builder form: `title`, `pass_percentage`, `points`, then for
/// each question n (1-based) `question_n`, `marks_n`, `option_n_k` and `correct_n = k`.
/// Blank question slots are skipped.
pub fn parse_quiz_form(fields: &HashMap<String, String>) -> Result<NewQuiz, String> {
    let get = |key: &str| fields.get(key).map(|v| v.trim()).unwrap_or("");

    let title = get("title").to_string();
    if title.is_empty() {
        return Err("Quiz title is required.".into());
    }
    let pass_percentage: i64 = match get("pass_percentage") {
        "" => 60,
        raw => raw.parse().map_err(|_| "Pass mark must be a number.".to_string())?,
    };
    if !(0..=100).contains(&pass_percentage) {
        return Err("Pass mark must be between 0 and 100.".into());
    }
    let points: i64 = match get("points") {
        "" => 0,
        raw => raw.parse().map_err(|_| "Points must be a number.".to_string())?,
    };
    if points < 0 {
        return Err("Points cannot be negative.".into());
    }

    let mut questions = Vec::new();
    for n in 1..=MAX_QUESTIONS {
        let text = get(&format!("question_{}", n));
        if text.is_empty() {
            continue;
        }
        let marks: i64 = match get(&format!("marks_{}", n)) {
            "" => 1,
            raw => raw
                .parse()
                .ok()
                .filter(|m| *m > 0)
                .ok_or_else(|| format!("Question {}: marks must be a positive number.", n))?,
        };

        let mut options = Vec::new();
        let mut correct = None;
        let correct_slot: Option<usize> = get(&format!("correct_{}", n)).parse().ok();
        for k in 1..=MAX_OPTIONS {
            let option = get(&format!("option_{}_{}", n, k));
            if option.is_empty() {
                continue;
            }
            if correct_slot == Some(k) {
                correct = Some(options.len());
            }
            options.push(option.to_string());
        }
        if options.len() < 2 {
            return Err(format!("Question {} needs at least two options.", n));
        }
        let correct = correct.ok_or_else(|| format!("Question {}: pick the correct option.", n))?;

        questions.push(NewQuestion { text: text.to_string(), marks, options, correct });
    }

    if questions.is_empty() {
        return Err("Add at least one question.".into());
    }

    Ok(NewQuiz { title, pass_percentage, points, questions })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(id: i64, marks: i64, correct_option: i64) -> QuestionWithOptions {
        QuestionWithOptions {
            question: Question { id, quiz_id: 1, text: format!("Q{}", id), marks, position: id },
            options: (1..=3)
                .map(|k| {
                    let option_id = id * 10 + k;
                    QuizOption {
                        id: option_id,
                        question_id: id,
                        text: format!("opt {}", k),
                        is_correct: option_id == correct_option,
                    }
                })
                .collect(),
        }
    }

    #[test]
    fn grading_sums_marks_of_correct_answers() {
        let questions = vec![question(1, 2, 11), question(2, 3, 22), question(3, 5, 33)];
        let answers = HashMap::from([(1, 11), (2, 21), (3, 33)]);
        let grade = grade_attempt(&questions, &answers, 60);
        assert_eq!(grade, Grade { score: 7, total_marks: 10, passed: true });
        assert_eq!(grade.percentage(), 70);
    }

    #[test]
    fn pass_mark_is_inclusive_and_foreign_options_do_not_count() {
        let questions = vec![question(1, 1, 11), question(2, 1, 22)];
        // option 22 belongs to question 2, not question 1
        let answers = HashMap::from([(1, 22), (2, 22)]);
        let grade = grade_attempt(&questions, &answers, 50);
        assert_eq!(grade.score, 1);
        assert!(grade.passed);

        let grade = grade_attempt(&questions, &answers, 51);
        assert!(!grade.passed);
    }

    #[test]
    fn empty_quiz_never_passes() {
        let grade = grade_attempt(&[], &HashMap::new(), 0);
        assert!(!grade.passed);
        assert_eq!(grade.percentage(), 0);
    }

    #[test]
    fn answers_parse_from_form_fields() {
        let fields = HashMap::from([
            ("q_4".to_string(), "41".to_string()),
            ("q_x".to_string(), "1".to_string()),
            ("other".to_string(), "2".to_string()),
        ]);
        assert_eq!(parse_answers(&fields), HashMap::from([(4, 41)]));
    }

    #[test]
    fn quiz_builder_form() {
        let fields: HashMap<String, String> = [
            ("title", "Recycling basics"),
            ("pass_percentage", "50"),
            ("points", "15"),
            ("question_1", "Which bin takes glass?"),
            ("marks_1", "2"),
            ("option_1_1", "Green"),
            ("option_1_2", ""),
            ("option_1_3", "Blue"),
            ("correct_1", "3"),
            ("question_2", ""),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let quiz = parse_quiz_form(&fields).unwrap();
        assert_eq!(quiz.pass_percentage, 50);
        assert_eq!(quiz.questions.len(), 1);
        assert_eq!(quiz.questions[0].options, vec!["Green".to_string(), "Blue".to_string()]);
        assert_eq!(quiz.questions[0].correct, 1);
        assert_eq!(quiz.questions[0].marks, 2);
    }

    #[test]
    fn quiz_builder_requires_a_correct_option() {
        let fields: HashMap<String, String> = [
            ("title", "T"),
            ("question_1", "Q"),
            ("option_1_1", "A"),
            ("option_1_2", "B"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        assert!(parse_quiz_form(&fields).unwrap_err().contains("correct"));
    }
}
