use chrono::{DateTime, Duration, Utc};
use rand::Rng;

pub const OTP_LENGTH: usize = 6;

/// How long an issued code stays valid and how many wrong guesses it survives.
#[derive(Debug, Clone, Copy)]
pub struct OtpPolicy {
    pub ttl: Duration,
    pub max_attempts: i32,
}

impl Default for OtpPolicy {
    fn default() -> Self {
        Self {
            ttl: Duration::seconds(300),
            max_attempts: 5,
        }
    }
}

impl OtpPolicy {
    pub fn expires_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + self.ttl
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpCheck {
    Valid,
    Mismatch,
    Expired,
    TooManyAttempts,
}

/// Returns a zero-padded six digit code.
pub fn generate_otp() -> String {
    let code: u32 = rand::rng().random_range(0..1_000_000);
    format!("{code:06}")
}

/// Checks a submitted code against the stored one.
///
/// Attempts are checked first: once exhausted, even the right code is refused.
pub fn verify(
    stored: Option<&str>,
    expires_at: Option<DateTime<Utc>>,
    attempts: i32,
    submitted: &str,
    policy: &OtpPolicy,
    now: DateTime<Utc>,
) -> OtpCheck {
    if attempts >= policy.max_attempts {
        return OtpCheck::TooManyAttempts;
    }
    let (Some(stored), Some(expires_at)) = (stored, expires_at) else {
        return OtpCheck::Expired;
    };
    if now > expires_at {
        return OtpCheck::Expired;
    }
    if constant_time_eq(stored.as_bytes(), submitted.trim().as_bytes()) {
        OtpCheck::Valid
    } else {
        OtpCheck::Mismatch
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_otp_shape() {
        for _ in 0..200 {
            let otp = generate_otp();
            assert_eq!(otp.len(), OTP_LENGTH);
            assert!(otp.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_verify_outcomes() {
        let policy = OtpPolicy::default();
        let now = Utc::now();
        let expires = Some(policy.expires_at(now));

        assert_eq!(
            verify(Some("123456"), expires, 0, "123456", &policy, now),
            OtpCheck::Valid
        );
        assert_eq!(
            verify(Some("123456"), expires, 0, " 123456 ", &policy, now),
            OtpCheck::Valid
        );
        assert_eq!(
            verify(Some("123456"), expires, 0, "654321", &policy, now),
            OtpCheck::Mismatch
        );
        assert_eq!(
            verify(Some("123456"), expires, 0, "12345", &policy, now),
            OtpCheck::Mismatch
        );
        assert_eq!(
            verify(
                Some("123456"),
                expires,
                0,
                "123456",
                &policy,
                now + Duration::seconds(301)
            ),
            OtpCheck::Expired
        );
        assert_eq!(
            verify(None, None, 0, "123456", &policy, now),
            OtpCheck::Expired
        );
        assert_eq!(
            verify(Some("123456"), expires, 5, "123456", &policy, now),
            OtpCheck::TooManyAttempts
        );
    }
}
