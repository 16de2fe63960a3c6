// src/web/captcha.rs
//! Arithmetic question on the login and sign-up forms. The expected answer
//! lives in the session and is consumed by the first check.
use crate::{
    error::{AppError, AppResult},
    state::AppState,
};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tower_sessions::Session;

pub const SESSION_CAPTCHA: &str = "captcha";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Captcha {
    left: u8,
    right: u8,
}

impl Captcha {
    pub fn random() -> Self {
        let mut rng = rand::thread_rng();
        Captcha {
            left: rng.gen_range(1..=9),
            right: rng.gen_range(1..=9),
        }
    }

    pub fn question(&self) -> String {
        format!("What is {} + {}?", self.left, self.right)
    }

    pub fn accepts(&self, answer: &str) -> bool {
        answer.trim().parse::<u16>().ok() == Some(u16::from(self.left) + u16::from(self.right))
    }
}

/// Stores a fresh captcha in the session and returns its question.
pub async fn issue(session: &Session) -> AppResult<String> {
    let captcha = Captcha::random();
    session
        .insert(SESSION_CAPTCHA, captcha)
        .await
        .map_err(|e| AppError::SessionError(format!("Failed to store captcha: {}", e)))?;
    Ok(captcha.question())
}

/// Question for a form, or `None` when captchas are switched off.
pub async fn question_for_form(state: &AppState, session: &Session) -> AppResult<Option<String>> {
    if !state.config.captcha_enabled {
        return Ok(None);
    }
    issue(session).await.map(Some)
}

/// Checks a submitted answer. Missing or already used captchas fail.
pub async fn verify(state: &AppState, session: &Session, answer: &str) -> AppResult<bool> {
    if !state.config.captcha_enabled {
        return Ok(true);
    }
    let stored: Option<Captcha> = session
        .remove(SESSION_CAPTCHA)
        .await
        .map_err(|e| AppError::SessionError(format!("Failed to read captcha: {}", e)))?;
    let passed = stored.is_some_and(|captcha| captcha.accepts(answer));
    if !passed {
        tracing::warn!("Captcha check failed");
    }
    Ok(passed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_the_sum_is_accepted() {
        let captcha = Captcha { left: 4, right: 7 };
        assert_eq!(captcha.question(), "What is 4 + 7?");
        assert!(captcha.accepts("11"));
        assert!(captcha.accepts(" 11 "));
        assert!(!captcha.accepts("12"));
        assert!(!captcha.accepts("eleven"));
        assert!(!captcha.accepts(""));
    }

    #[test]
    fn random_operands_stay_single_digit() {
        for _ in 0..50 {
            let captcha = Captcha::random();
            assert!((1..=9).contains(&captcha.left));
            assert!((1..=9).contains(&captcha.right));
        }
    }
}
