// src/templates.rs
use crate::models::{
    badge::{Badge, EarnedBadge},
    challenge::{Challenge, ChallengeStatus, StudentChallenge, SubmissionRow},
    eco_points::{ActivityType, EcoPointEntry},
    leaderboard::{Period, RankedEntry, Scope},
    lesson::{Lesson, StudentLesson},
    quiz::{QuestionWithOptions, Quiz, QuizAttempt, MAX_OPTIONS, MAX_QUESTIONS},
    school::School,
    user::{CurrentUser, Role, User, UserSummary},
};
use askama::Template;
use chrono::NaiveDate;
use serde::Deserialize;

/// `?success=` / `?error=` left by a redirect (Post/Redirect/Get).
#[derive(Debug, Default, Deserialize)]
pub struct FeedbackParams {
    pub success: Option<String>,
    pub error: Option<String>,
}

/// What every page shares: the navigation user and the feedback banner.
#[derive(Debug, Default)]
pub struct PageContext {
    pub current_user: Option<CurrentUser>,
    pub success: Option<String>,
    pub error: Option<String>,
}

impl PageContext {
    pub fn new(current_user: Option<CurrentUser>, feedback: FeedbackParams) -> Self {
        PageContext {
            current_user,
            success: feedback.success.filter(|s| !s.trim().is_empty()),
            error: feedback.error.filter(|s| !s.trim().is_empty()),
        }
    }

    pub fn for_user(user: &CurrentUser, feedback: FeedbackParams) -> Self {
        Self::new(Some(user.clone()), feedback)
    }

    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error = Some(message.into());
        self
    }
}

/// `<option>` for a select; selection is worked out here, not in the template.
#[derive(Debug, Clone)]
pub struct SelectOption {
    pub value: String,
    pub label: String,
    pub selected: bool,
}

pub fn school_options(schools: &[School], selected: Option<i64>) -> Vec<SelectOption> {
    schools
        .iter()
        .map(|s| SelectOption {
            value: s.id.to_string(),
            label: s.name.clone(),
            selected: Some(s.id) == selected,
        })
        .collect()
}

pub fn role_options(selected: Option<Role>) -> Vec<SelectOption> {
    Role::ALL
        .iter()
        .map(|r| SelectOption {
            value: r.as_str().to_string(),
            label: r.label().to_string(),
            selected: Some(*r) == selected,
        })
        .collect()
}

pub fn activity_options(selected: Option<ActivityType>) -> Vec<SelectOption> {
    ActivityType::ALL
        .iter()
        .map(|a| SelectOption {
            value: a.as_str().to_string(),
            label: a.as_str().to_string(),
            selected: Some(*a) == selected,
        })
        .collect()
}

// --- Public ---

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginPage {
    pub page: PageContext,
    pub email: String,
    pub next: String,
    pub captcha_question: Option<String>,
}

#[derive(Template)]
#[template(path = "register.html")]
pub struct RegisterPage {
    pub page: PageContext,
    pub schools: Vec<SelectOption>,
    pub captcha_question: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TabLink {
    pub href: String,
    pub label: String,
    pub active: bool,
}

#[derive(Template)]
#[template(path = "leaderboard.html")]
pub struct LeaderboardPage {
    pub page: PageContext,
    pub period_label: &'static str,
    pub is_school_board: bool,
    pub period_tabs: Vec<TabLink>,
    pub scope_tabs: Vec<TabLink>,
    pub entries: Vec<RankedEntry>,
}

impl LeaderboardPage {
    pub fn tabs(period: Period, scope: Scope) -> (Vec<TabLink>, Vec<TabLink>) {
        let period_tabs = Period::ALL
            .iter()
            .map(|p| TabLink {
                href: format!("/leaderboard?period={}&scope={}", p.as_str(), scope.as_str()),
                label: p.label().to_string(),
                active: *p == period,
            })
            .collect();
        let scope_tabs = [(Scope::Users, "Students"), (Scope::Schools, "Schools")]
            .into_iter()
            .map(|(s, label)| TabLink {
                href: format!("/leaderboard?period={}&scope={}", period.as_str(), s.as_str()),
                label: label.to_string(),
                active: s == scope,
            })
            .collect();
        (period_tabs, scope_tabs)
    }
}

// --- Student ---

/// A challenge as shown on the student pages.
#[derive(Debug, Clone)]
pub struct ChallengeCard {
    pub challenge: Challenge,
    pub status: ChallengeStatus,
    pub is_open: bool,
    pub can_submit: bool,
    pub days_left: i64,
    pub proof_url: Option<String>,
    pub feedback: Option<String>,
}

impl ChallengeCard {
    pub fn new(row: StudentChallenge, today: NaiveDate) -> Self {
        let status = row.status();
        let window = row.challenge.window();
        let is_open = window.is_open(today);
        ChallengeCard {
            is_open,
            can_submit: is_open && status.can_submit(),
            days_left: window.days_left(today),
            status,
            proof_url: row.proof_url.filter(|url| !url.is_empty()),
            feedback: row.feedback,
            challenge: row.challenge,
        }
    }
}

#[derive(Template)]
#[template(path = "student/dashboard.html")]
pub struct StudentDashboardPage {
    pub page: PageContext,
    pub total_points: i64,
    pub rank: Option<usize>,
    pub lessons_completed: i64,
    pub badges: Vec<EarnedBadge>,
    pub recent: Vec<EcoPointEntry>,
    pub open_challenges: Vec<Challenge>,
}

#[derive(Template)]
#[template(path = "student/lessons.html")]
pub struct StudentLessonsPage {
    pub page: PageContext,
    pub lessons: Vec<StudentLesson>,
    pub categories: Vec<TabLink>,
}

#[derive(Template)]
#[template(path = "student/lesson.html")]
pub struct StudentLessonPage {
    pub page: PageContext,
    pub lesson: StudentLesson,
    pub quizzes: Vec<Quiz>,
}

#[derive(Template)]
#[template(path = "student/quiz.html")]
pub struct StudentQuizPage {
    pub page: PageContext,
    pub quiz: Quiz,
    pub questions: Vec<QuestionWithOptions>,
    pub attempts: Vec<QuizAttempt>,
    pub already_passed: bool,
}

#[derive(Template)]
#[template(path = "student/challenges.html")]
pub struct StudentChallengesPage {
    pub page: PageContext,
    pub cards: Vec<ChallengeCard>,
}

#[derive(Template)]
#[template(path = "student/challenge.html")]
pub struct StudentChallengePage {
    pub page: PageContext,
    pub card: ChallengeCard,
    pub max_upload_mb: usize,
}

#[derive(Template)]
#[template(path = "student/badges.html")]
pub struct StudentBadgesPage {
    pub page: PageContext,
    pub earned: Vec<EarnedBadge>,
    pub locked: Vec<Badge>,
}

#[derive(Template)]
#[template(path = "student/points.html")]
pub struct StudentPointsPage {
    pub page: PageContext,
    pub total_points: i64,
    pub breakdown: Vec<(ActivityType, i64)>,
    pub entries: Vec<EcoPointEntry>,
}

#[derive(Template)]
#[template(path = "profile.html")]
pub struct ProfilePage {
    pub page: PageContext,
    pub user: User,
    pub schools: Vec<SelectOption>,
    pub total_points: i64,
    pub badge_count: usize,
    pub max_upload_mb: usize,
}

// --- NGO ---

#[derive(Template)]
#[template(path = "ngo/challenges.html")]
pub struct NgoChallengesPage {
    pub page: PageContext,
    pub challenges: Vec<Challenge>,
    pub pending_count: i64,
    pub today: String,
}

#[derive(Template)]
#[template(path = "ngo/challenge_edit.html")]
pub struct NgoChallengeEditPage {
    pub page: PageContext,
    pub challenge: Challenge,
}

#[derive(Template)]
#[template(path = "ngo/submissions.html")]
pub struct NgoSubmissionsPage {
    pub page: PageContext,
    pub filter_tabs: Vec<TabLink>,
    pub submissions: Vec<SubmissionRow>,
}

// --- Teacher ---

#[derive(Template)]
#[template(path = "teacher/lessons.html")]
pub struct TeacherLessonsPage {
    pub page: PageContext,
    pub lessons: Vec<Lesson>,
}

#[derive(Template)]
#[template(path = "teacher/lesson_edit.html")]
pub struct TeacherLessonEditPage {
    pub page: PageContext,
    pub lesson: Lesson,
    pub quizzes: Vec<Quiz>,
}

#[derive(Template)]
#[template(path = "teacher/quiz_builder.html")]
pub struct QuizBuilderPage {
    pub page: PageContext,
    pub lesson: Lesson,
    pub question_slots: Vec<usize>,
    pub option_slots: Vec<usize>,
}

impl QuizBuilderPage {
    pub fn new(page: PageContext, lesson: Lesson) -> Self {
        QuizBuilderPage {
            page,
            lesson,
            question_slots: (1..=MAX_QUESTIONS).collect(),
            option_slots: (1..=MAX_OPTIONS).collect(),
        }
    }
}

// --- Admin ---

#[derive(Template)]
#[template(path = "admin/dashboard.html")]
pub struct AdminDashboardPage {
    pub page: PageContext,
    pub role_counts: Vec<(Role, i64)>,
    pub pending_count: i64,
    pub challenges: Vec<Challenge>,
}

#[derive(Template)]
#[template(path = "admin/users.html")]
pub struct AdminUsersPage {
    pub page: PageContext,
    pub users: Vec<UserSummary>,
    pub roles: Vec<SelectOption>,
    pub schools: Vec<SelectOption>,
}

#[derive(Template)]
#[template(path = "admin/user_edit.html")]
pub struct AdminEditUserPage {
    pub page: PageContext,
    pub user: User,
    pub roles: Vec<SelectOption>,
    pub schools: Vec<SelectOption>,
}

#[derive(Template)]
#[template(path = "admin/badges.html")]
pub struct AdminBadgesPage {
    pub page: PageContext,
    pub badges: Vec<Badge>,
    pub students: Vec<UserSummary>,
    pub activities: Vec<SelectOption>,
}

#[derive(Template)]
#[template(path = "admin/badge_edit.html")]
pub struct AdminEditBadgePage {
    pub page: PageContext,
    pub badge: Badge,
    pub activities: Vec<SelectOption>,
}

#[derive(Template)]
#[template(path = "admin/schools.html")]
pub struct AdminSchoolsPage {
    pub page: PageContext,
    pub schools: Vec<School>,
}

#[derive(Template)]
#[template(path = "admin/school_edit.html")]
pub struct AdminEditSchoolPage {
    pub page: PageContext,
    pub school: School,
}

#[derive(Template)]
#[template(path = "admin/points.html")]
pub struct AdminPointsPage {
    pub page: PageContext,
    pub students: Vec<UserSummary>,
}
