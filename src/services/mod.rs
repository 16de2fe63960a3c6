// src/services/mod.rs
pub mod auth_service;
pub mod badge_service;
pub mod challenge_service;
pub mod eco_points_service;
pub mod leaderboard_service;
pub mod lesson_service;
pub mod quiz_service;
pub mod school_service;
pub mod upload_service;
pub mod user_service;
