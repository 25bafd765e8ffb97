//! Two-factor email codes
//!
//! A code is six decimal digits, lives for ten minutes and can be consumed once.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const CODE_LENGTH: usize = 6;
pub const CODE_TTL_MINUTES: i64 = 10;

/// What a code unlocks
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TokenPurpose {
    #[default]
    Login,
    Signup,
}

impl TokenPurpose {
    /// Value stored in `two_factor_tokens.token_type`
    pub fn token_type(&self) -> &'static str {
        match self {
            Self::Login => "login_2fa",
            Self::Signup => "signup_2fa",
        }
    }

    pub fn email_subject(&self) -> &'static str {
        match self {
            Self::Login => "Login Verification Code",
            Self::Signup => "Verify Your Account",
        }
    }

    pub fn email_message(&self, code: &str) -> String {
        match self {
            Self::Login => format!(
                "Your login verification code is: {}. This code will expire in {} minutes.",
                code, CODE_TTL_MINUTES
            ),
            Self::Signup => format!(
                "Your verification code is: {}. This code will expire in {} minutes.",
                code, CODE_TTL_MINUTES
            ),
        }
    }
}

/// A freshly issued code, before it is persisted
#[derive(Debug, Clone)]
pub struct IssuedCode {
    pub user_id: Uuid,
    pub code: String,
    pub purpose: TokenPurpose,
    pub expires_at: DateTime<Utc>,
}

impl IssuedCode {
    pub fn new<R: Rng + ?Sized>(rng: &mut R, user_id: Uuid, purpose: TokenPurpose, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            code: generate_code(rng),
            purpose,
            expires_at: now + Duration::minutes(CODE_TTL_MINUTES),
        }
    }
}

/// Stored token state, as read back for verification
#[derive(Debug, Clone)]
pub struct StoredToken {
    pub id: Uuid,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
}

impl StoredToken {
    /// Whether `code` unlocks this token at `now`.
    pub fn accepts(&self, code: &str, now: DateTime<Utc>) -> bool {
        self.used_at.is_none() && self.expires_at > now && self.token == code
    }
}

/// Uniform code in 100000..=999999, so it never has a leading zero.
pub fn generate_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    rng.gen_range(100_000..=999_999u32).to_string()
}

/// Cheap shape check before touching the database.
pub fn is_well_formed(code: &str) -> bool {
    code.len() == CODE_LENGTH && code.bytes().all(|b| b.is_ascii_digit())
}

/// Response once a code has been sent
#[derive(Debug, Clone, Serialize)]
pub struct TwoFactorChallenge {
    pub two_factor_required: bool,
    pub user_id: Uuid,
    pub purpose: TokenPurpose,
    pub expires_at: DateTime<Utc>,
    pub email_sent: bool,
}

/// Request DTO for re-sending a code to the signed-in user
#[derive(Debug, Clone, Deserialize, Default)]
pub struct SendCodeRequest {
    #[serde(default)]
    pub purpose: TokenPurpose,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn codes_are_six_digits() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..1000 {
            let code = generate_code(&mut rng);
            assert!(is_well_formed(&code), "{code}");
            assert_ne!(code.as_bytes()[0], b'0');
        }
    }

    #[test]
    fn shape_check_rejects_junk() {
        assert!(is_well_formed("123456"));
        assert!(!is_well_formed("12345"));
        assert!(!is_well_formed("1234567"));
        assert!(!is_well_formed("12a456"));
        assert!(!is_well_formed(""));
    }

    #[test]
    fn issued_codes_expire_after_ten_minutes() {
        let mut rng = StdRng::seed_from_u64(1);
        let now = Utc::now();
        let issued = IssuedCode::new(&mut rng, Uuid::new_v4(), TokenPurpose::Login, now);
        assert_eq!(issued.expires_at - now, Duration::minutes(10));

        let stored = StoredToken {
            id: Uuid::new_v4(),
            token: issued.code.clone(),
            expires_at: issued.expires_at,
            used_at: None,
        };
        assert!(stored.accepts(&issued.code, now + Duration::minutes(9)));
        assert!(!stored.accepts(&issued.code, now + Duration::minutes(10)));
        assert!(!stored.accepts("000000", now));
    }

    #[test]
    fn used_tokens_are_rejected() {
        let now = Utc::now();
        let stored = StoredToken {
            id: Uuid::new_v4(),
            token: "654321".to_string(),
            expires_at: now + Duration::minutes(5),
            used_at: Some(now),
        };
        assert!(!stored.accepts("654321", now));
    }

    #[test]
    fn purposes_map_to_token_types_and_copy() {
        assert_eq!(TokenPurpose::Login.token_type(), "login_2fa");
        assert_eq!(TokenPurpose::Signup.token_type(), "signup_2fa");
        assert_eq!(TokenPurpose::Signup.email_subject(), "Verify Your Account");
        assert!(TokenPurpose::Login
            .email_message("123456")
            .contains("expire in 10 minutes"));
    }
}
