// src/models/school.rs
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct School {
    pub id: i64,
    pub name: String,
    pub city: String,
    pub state: String,
    pub logo_url: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Deserialize)]
pub struct SchoolForm {
    pub name: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub logo_url: Option<String>,
}

impl SchoolForm {
    pub fn logo(&self) -> Option<&str> {
        self.logo_url.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }
}
