use serde::{Deserialize, Serialize};

/// Claims carried by Supabase access tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Auth user id; also the `profiles.id` of the caller
    pub sub: String,
    pub aud: String,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
    #[serde(default)]
    pub nbf: Option<i64>,
    #[serde(default)]
    pub email: Option<String>,
    /// Supabase session role, e.g. `authenticated`
    #[serde(default)]
    pub role: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optional_claims_default_to_none() {
        let claims: Claims = serde_json::from_value(serde_json::json!({
            "sub": "8d0f3c8e-8f57-4a43-9a43-2c1f0c1e9b11",
            "aud": "authenticated",
            "iss": "https://example.supabase.co/auth/v1",
            "iat": 1_700_000_000,
            "exp": 1_700_003_600,
            "user_metadata": { "full_name": "Jane Doe" }
        }))
        .unwrap();
        assert_eq!(claims.email, None);
        assert_eq!(claims.nbf, None);
        assert_eq!(claims.exp - claims.iat, 3600);
    }
}
