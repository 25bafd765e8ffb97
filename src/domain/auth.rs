//! Authentication domain types
//!
//! Requests and responses for the auth proxy in front of Supabase Auth, plus
//! the Supabase wire formats.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::profiles::Role;
use super::two_factor::TokenPurpose;

/// Sign up request; new accounts are always customers
#[derive(Debug, Clone, Deserialize)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

impl SignUpRequest {
    /// Trimmed, lower-cased email after basic shape checks.
    pub fn normalized_email(&self) -> Result<String, String> {
        normalize_email(&self.email)
    }

    pub fn validate(&self) -> Result<(), String> {
        self.normalized_email()?;
        if self.password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LENGTH
            ));
        }
        Ok(())
    }
}

pub const MIN_PASSWORD_LENGTH: usize = 6;

pub fn normalize_email(raw: &str) -> Result<String, String> {
    let email = raw.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(email),
        _ => Err("A valid email address is required".to_string()),
    }
}

/// Sign in request; `role` is the portal the user is signing in to
#[derive(Debug, Clone, Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub role: Role,
}

/// Second step of sign in / sign up: credentials plus the emailed code
#[derive(Debug, Clone, Deserialize)]
pub struct VerifyRequest {
    pub email: String,
    pub password: String,
    pub code: String,
    #[serde(default)]
    pub purpose: TokenPurpose,
}

/// Token refresh request
#[derive(Debug, Clone, Deserialize)]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

/// User info from Supabase
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

/// Auth response with tokens, released only after the code is verified
#[derive(Debug, Clone, Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    pub user: User,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}

impl AuthResponse {
    pub fn from_supabase(resp: SupabaseAuthResponse, role: Option<Role>) -> Self {
        Self {
            access_token: resp.access_token,
            refresh_token: resp.refresh_token,
            expires_in: resp.expires_in,
            user: resp.user.into(),
            role,
        }
    }
}

// Supabase Auth API response types

/// Response when a password grant or auto-confirmed signup returns tokens
#[derive(Debug, Clone, Deserialize)]
pub struct SupabaseAuthResponse {
    pub access_token: String,
    pub expires_in: i64,
    pub refresh_token: String,
    pub user: SupabaseUser,
}

/// Response when signup requires email confirmation; just the user object
#[derive(Debug, Clone, Deserialize)]
pub struct SupabaseSignupResponse {
    pub id: String,
    pub email: Option<String>,
    pub confirmation_sent_at: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SupabaseUser {
    pub id: String,
    pub email: Option<String>,
    pub created_at: Option<String>,
}

/// Supabase error body; both the current and legacy shapes are accepted
#[derive(Debug, Clone, Deserialize, Default)]
pub struct SupabaseErrorResponse {
    pub error_code: Option<String>,
    pub msg: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
    pub message: Option<String>,
}

impl SupabaseErrorResponse {
    pub fn with_error(error: &str) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Default::default()
        }
    }

    pub fn get_message(&self) -> String {
        self.message
            .clone()
            .or_else(|| self.msg.clone())
            .or_else(|| self.error_description.clone())
            .or_else(|| self.error.clone())
            .unwrap_or_else(|| "Unknown authentication error".to_string())
    }
}

impl From<SupabaseUser> for User {
    fn from(su: SupabaseUser) -> Self {
        Self {
            id: su.id,
            email: su.email,
            created_at: su.created_at.and_then(|s| s.parse().ok()),
        }
    }
}

/// Either shape Supabase may answer a signup with
#[derive(Debug, Clone)]
pub enum SignupOutcome {
    Session(SupabaseAuthResponse),
    PendingConfirmation(SupabaseSignupResponse),
}

impl SignupOutcome {
    pub fn user_id(&self) -> &str {
        match self {
            Self::Session(s) => &s.user.id,
            Self::PendingConfirmation(p) => &p.id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_message_prefers_newest_field() {
        let err: SupabaseErrorResponse = serde_json::from_str(
            r#"{"code":400,"error_code":"invalid_credentials","msg":"Invalid login credentials"}"#,
        )
        .unwrap();
        assert_eq!(err.get_message(), "Invalid login credentials");

        let legacy: SupabaseErrorResponse = serde_json::from_str(
            r#"{"error":"invalid_grant","error_description":"Invalid Refresh Token"}"#,
        )
        .unwrap();
        assert_eq!(legacy.get_message(), "Invalid Refresh Token");
        assert_eq!(
            SupabaseErrorResponse::default().get_message(),
            "Unknown authentication error"
        );
    }

    #[test]
    fn signup_checks_email_and_password() {
        let mut req = SignUpRequest {
            email: "  Ana@Example.COM ".to_string(),
            password: "hunter22".to_string(),
            full_name: None,
            phone: None,
        };
        assert!(req.validate().is_ok());
        assert_eq!(req.normalized_email().unwrap(), "ana@example.com");

        req.password = "short".to_string();
        assert!(req.validate().is_err());

        assert!(normalize_email("no-at-sign").is_err());
        assert!(normalize_email("@example.com").is_err());
        assert!(normalize_email("ana@localhost").is_err());
    }

    #[test]
    fn sign_in_role_defaults_to_customer() {
        let req: SignInRequest =
            serde_json::from_str(r#"{"email":"a@b.co","password":"pw"}"#).unwrap();
        assert_eq!(req.role, Role::Customer);
    }
}
