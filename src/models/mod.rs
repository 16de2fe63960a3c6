// src/models/mod.rs
pub mod badge;
pub mod challenge;
pub mod eco_points;
pub mod leaderboard;
pub mod lesson;
pub mod quiz;
pub mod school;
pub mod user;
