// src/config.rs
use crate::error::{AppError, AppResult};
use std::{env, net::SocketAddr, path::PathBuf, str::FromStr};

pub const DEFAULT_MAX_PROOF_BYTES: usize = 5 * 1024 * 1024;
pub const DEFAULT_MAX_AVATAR_BYTES: usize = 2 * 1024 * 1024;

/// Runtime configuration, read once at start-up from the environment (and `.env`).
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub session_secret: String,
    pub bind_addr: SocketAddr,
    pub upload_dir: PathBuf,
    pub max_proof_bytes: usize,
    pub max_avatar_bytes: usize,
    pub secure_cookies: bool,
    pub captcha_enabled: bool,
    // Optional first admin account, created only if no admin exists yet
    pub bootstrap_admin: Option<(String, String)>,
}

impl Config {
    pub fn from_env() -> AppResult<Self> {
        dotenvy::dotenv().ok();

        let bootstrap_admin = match (env::var("ADMIN_EMAIL").ok(), env::var("ADMIN_PASSWORD").ok()) {
            (Some(email), Some(password)) if !email.trim().is_empty() => Some((email, password)),
            _ => None,
        };

        Ok(Self {
            database_url: get_env("DATABASE_URL")?,
            session_secret: get_env("SESSION_SECRET")?,
            bind_addr: get_env_parse_or("BIND_ADDR", SocketAddr::from(([0, 0, 0, 0], 3000)))?,
            upload_dir: PathBuf::from(env::var("UPLOAD_DIR").unwrap_or_else(|_| "./uploads".into())),
            max_proof_bytes: get_env_parse_or("MAX_PROOF_BYTES", DEFAULT_MAX_PROOF_BYTES)?,
            max_avatar_bytes: get_env_parse_or("MAX_AVATAR_BYTES", DEFAULT_MAX_AVATAR_BYTES)?,
            secure_cookies: get_env_parse_or("SECURE_COOKIES", false)?,
            captcha_enabled: get_env_parse_or("CAPTCHA_ENABLED", true)?,
            bootstrap_admin,
        })
    }

    pub fn proofs_dir(&self) -> PathBuf {
        self.upload_dir.join("proofs")
    }

    pub fn avatars_dir(&self) -> PathBuf {
        self.upload_dir.join("avatars")
    }
}

fn get_env(name: &str) -> AppResult<String> {
    env::var(name).map_err(|_| AppError::Config(format!("Missing environment variable: {}", name)))
}

fn get_env_parse_or<T>(name: &str, default: T) -> AppResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e| AppError::Config(format!("Invalid value for {}: {}", name, e))),
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_or_falls_back_to_default_when_unset() {
        let value: usize = get_env_parse_or("GREENQUEST_TEST_UNSET_VAR", 42).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn parse_or_rejects_garbage() {
        env::set_var("GREENQUEST_TEST_BAD_NUMBER", "lots");
        let result: AppResult<usize> = get_env_parse_or("GREENQUEST_TEST_BAD_NUMBER", 1);
        assert!(matches!(result, Err(AppError::Config(_))));
    }
}
