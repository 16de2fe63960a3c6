// src/models/user.rs
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Role {
    Student,
    Teacher,
    Ngo,
    Admin,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Student, Role::Teacher, Role::Ngo, Role::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Teacher => "teacher",
            Role::Ngo => "ngo",
            Role::Admin => "admin",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Role::Student => "Student",
            Role::Teacher => "Teacher",
            Role::Ngo => "NGO",
            Role::Admin => "Administrator",
        }
    }

    /// Roles anyone may pick on the public registration form.
    pub fn self_registrable(&self) -> bool {
        matches!(self, Role::Student | Role::Teacher)
    }

    /// Where the user lands after logging in.
    pub fn home_path(&self) -> &'static str {
        match self {
            Role::Student => "/student",
            Role::Teacher => "/teacher/lessons",
            Role::Ngo => "/ngo/challenges",
            Role::Admin => "/admin",
        }
    }

    pub fn is_admin(&self) -> bool {
        *self == Role::Admin
    }

    pub fn can_author_lessons(&self) -> bool {
        matches!(self, Role::Teacher | Role::Admin)
    }

    pub fn can_manage_challenges(&self) -> bool {
        matches!(self, Role::Ngo | Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|r| r.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("Unknown role '{}'", s))
    }
}

// A row of the `users` table
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub school_id: Option<i64>,
    pub profile_picture: Option<String>,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// User row joined with school name and derived point total, for admin listings.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct UserSummary {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub school_id: Option<i64>,
    pub school_name: Option<String>,
    pub is_active: bool,
    pub total_points: i64,
    pub badge_count: i64,
    pub created_at: NaiveDateTime,
}

/// Identity of the logged-in user, put in the request extensions by the auth middleware.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: i64,
    pub name: String,
    pub role: Role,
}

impl From<&User> for CurrentUser {
    fn from(user: &User) -> Self {
        CurrentUser {
            id: user.id,
            name: user.name.clone(),
            role: user.role,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub captcha: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    pub name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub role: String,
    #[serde(default)]
    pub school_id: Option<String>,
    #[serde(default)]
    pub captcha: String,
}

/// New account data after validation, shared by registration and admin creation.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
    pub school_id: Option<i64>,
}

pub const MIN_PASSWORD_LEN: usize = 8;

impl NewUser {
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Name is required.".into());
        }
        if !looks_like_email(&self.email) {
            return Err("Please enter a valid email address.".into());
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(format!("Password must have at least {} characters.", MIN_PASSWORD_LEN));
        }
        Ok(())
    }
}

pub fn looks_like_email(email: &str) -> bool {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
                && !email.contains(char::is_whitespace)
        }
        None => false,
    }
}

/// Empty select values come through as "" from HTML forms.
pub fn parse_optional_id(raw: Option<&str>) -> Option<i64> {
    raw.map(str::trim).filter(|s| !s.is_empty()).and_then(|s| s.parse().ok())
}
