use std::collections::HashMap;
use std::sync::Arc;

use rand::Rng;
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::users::repo_types::Role;

/// Codes are valid for ten minutes from issuance.
const CODE_TTL: Duration = Duration::minutes(10);

/// Time source for the registry. Injected so tests can drive expiry.
pub trait Clock: Send + Sync {
    fn now(&self) -> OffsetDateTime;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// User-creation data held while a signup waits for email verification.
/// The password is hashed before it ever enters the registry.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingSignup {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OtpPayload {
    PendingSignup(PendingSignup),
    PasswordReset { user_id: Uuid },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum OtpError {
    #[error("no matching code was issued")]
    InvalidCode,
    #[error("the code has expired")]
    Expired,
}

struct OtpEntry {
    code: String,
    expires_at: OffsetDateTime,
    payload: OtpPayload,
}

/// Process-wide map of pending one-time codes, keyed by email address.
/// At most one live entry per key; issuing again overwrites. Entries are
/// removed on consumption or when expiry is detected at consume time;
/// there is no background sweep. A restart loses all pending codes, which
/// is acceptable for a ten-minute credential.
pub struct OtpRegistry {
    clock: Arc<dyn Clock>,
    entries: Mutex<HashMap<String, OtpEntry>>,
}

impl OtpRegistry {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Issue a fresh 6-digit code for `key`, replacing any previous entry.
    /// Returns the code for out-of-band delivery.
    pub async fn issue(&self, key: &str, payload: OtpPayload) -> String {
        let code = format!("{:06}", rand::thread_rng().gen_range(0..1_000_000));
        let entry = OtpEntry {
            code: code.clone(),
            expires_at: self.clock.now() + CODE_TTL,
            payload,
        };
        self.entries.lock().await.insert(key.to_string(), entry);
        code
    }

    /// Exchange a code for its payload, at most once. A mismatched code
    /// leaves the entry in place; a matched-but-expired code removes it.
    pub async fn consume(&self, key: &str, supplied_code: &str) -> Result<OtpPayload, OtpError> {
        let mut entries = self.entries.lock().await;

        match entries.get(key) {
            Some(entry) if entry.code == supplied_code => {}
            Some(_) | None => return Err(OtpError::InvalidCode),
        }

        let Some(entry) = entries.remove(key) else {
            return Err(OtpError::InvalidCode);
        };
        if self.clock.now() > entry.expires_at {
            return Err(OtpError::Expired);
        }
        Ok(entry.payload)
    }
}

impl Default for OtpRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    struct ManualClock(std::sync::Mutex<OffsetDateTime>);

    impl ManualClock {
        fn starting_at(at: OffsetDateTime) -> Arc<Self> {
            Arc::new(Self(std::sync::Mutex::new(at)))
        }

        fn advance(&self, by: Duration) {
            *self.0.lock().unwrap() += by;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> OffsetDateTime {
            *self.0.lock().unwrap()
        }
    }

    fn reset_payload() -> OtpPayload {
        OtpPayload::PasswordReset {
            user_id: Uuid::new_v4(),
        }
    }

    #[tokio::test]
    async fn code_is_six_ascii_digits() {
        let registry = OtpRegistry::new();
        let code = registry.issue("a@example.com", reset_payload()).await;
        assert_eq!(code.len(), 6);
        assert!(code.chars().all(|c| c.is_ascii_digit()));
    }

    #[tokio::test]
    async fn consume_returns_payload_exactly_once() {
        let registry = OtpRegistry::new();
        let payload = reset_payload();
        let code = registry.issue("a@example.com", payload.clone()).await;

        assert_eq!(registry.consume("a@example.com", &code).await, Ok(payload));
        assert_eq!(
            registry.consume("a@example.com", &code).await,
            Err(OtpError::InvalidCode)
        );
    }

    #[tokio::test]
    async fn mismatched_code_is_rejected_and_entry_survives() {
        let registry = OtpRegistry::new();
        let code = registry.issue("a@example.com", reset_payload()).await;
        let wrong = if code == "000000" { "000001" } else { "000000" };

        assert_eq!(
            registry.consume("a@example.com", wrong).await,
            Err(OtpError::InvalidCode)
        );
        assert!(registry.consume("a@example.com", &code).await.is_ok());
    }

    #[tokio::test]
    async fn reissue_invalidates_previous_code() {
        let registry = OtpRegistry::new();
        let first = registry.issue("a@example.com", reset_payload()).await;
        let second = registry.issue("a@example.com", reset_payload()).await;

        if first != second {
            assert_eq!(
                registry.consume("a@example.com", &first).await,
                Err(OtpError::InvalidCode)
            );
        }
        assert!(registry.consume("a@example.com", &second).await.is_ok());
    }

    #[tokio::test]
    async fn expired_code_fails_and_entry_is_removed() {
        let clock = ManualClock::starting_at(datetime!(2024-06-01 12:00 UTC));
        let registry = OtpRegistry::with_clock(clock.clone());
        let code = registry.issue("a@example.com", reset_payload()).await;

        clock.advance(Duration::minutes(11));
        assert_eq!(
            registry.consume("a@example.com", &code).await,
            Err(OtpError::Expired)
        );
        // The entry was removed on the expiry path, so even the right code
        // now reports InvalidCode.
        assert_eq!(
            registry.consume("a@example.com", &code).await,
            Err(OtpError::InvalidCode)
        );
    }

    #[tokio::test]
    async fn code_still_valid_just_inside_the_window() {
        let clock = ManualClock::starting_at(datetime!(2024-06-01 12:00 UTC));
        let registry = OtpRegistry::with_clock(clock.clone());
        let code = registry.issue("a@example.com", reset_payload()).await;

        clock.advance(Duration::minutes(10));
        assert!(registry.consume("a@example.com", &code).await.is_ok());
    }

    #[tokio::test]
    async fn keys_do_not_interfere() {
        let registry = OtpRegistry::new();
        let code_a = registry.issue("a@example.com", reset_payload()).await;
        let code_b = registry.issue("b@example.com", reset_payload()).await;

        assert!(registry.consume("a@example.com", &code_a).await.is_ok());
        assert!(registry.consume("b@example.com", &code_b).await.is_ok());
    }

    #[tokio::test]
    async fn unknown_key_reports_invalid_code() {
        let registry = OtpRegistry::new();
        assert_eq!(
            registry.consume("nobody@example.com", "123456").await,
            Err(OtpError::InvalidCode)
        );
    }
}
