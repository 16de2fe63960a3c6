// src/web/mod.rs
pub mod admin_handlers;
pub mod api_handlers;
pub mod auth_handlers;
pub mod captcha;
pub mod challenge_handlers;
pub mod feedback;
pub mod leaderboard_handlers;
pub mod multipart;
pub mod mw_auth;
pub mod mw_role;
pub mod ngo_handlers;
pub mod profile_handlers;
pub mod routes;
pub mod student_handlers;
pub mod teacher_handlers;
