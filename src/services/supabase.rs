//! Supabase Auth REST client.
//!
//! Session tokens are minted by Supabase; this service only proxies the
//! password, signup, refresh and logout calls.

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, error};

use crate::config::Settings;
use crate::domain::auth::{
    SignupOutcome, SupabaseAuthResponse, SupabaseErrorResponse, SupabaseSignupResponse,
};
use crate::error::ApiError;

/// Which sessions a logout revokes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogoutScope {
    /// Only the session behind the presented token
    Local,
    /// Every session the user holds
    Global,
}

impl LogoutScope {
    fn as_str(self) -> &'static str {
        match self {
            LogoutScope::Local => "local",
            LogoutScope::Global => "global",
        }
    }
}

#[derive(Clone)]
pub struct AuthProvider {
    client: Client,
    base_url: String,
    anon_key: String,
}

impl AuthProvider {
    pub fn new(client: Client, settings: &Settings) -> Self {
        Self {
            client,
            base_url: settings.supabase_url.trim_end_matches('/').to_string(),
            anon_key: settings.supabase_anon_key.clone(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/auth/v1{}", self.base_url, path)
    }

    /// Register a user; `data` lands in the user's metadata.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        full_name: Option<&str>,
    ) -> Result<SignupOutcome, ApiError> {
        let body = json!({
            "email": email,
            "password": password,
            "data": { "full_name": full_name, "role": "customer" },
        });
        let text = self
            .send(self.url("/signup"), &body, |m| ApiError::bad_request(m))
            .await?;

        // Tokens come back only when email confirmation is disabled
        if let Ok(session) = serde_json::from_str::<SupabaseAuthResponse>(&text) {
            return Ok(SignupOutcome::Session(session));
        }
        if let Ok(pending) = serde_json::from_str::<SupabaseSignupResponse>(&text) {
            return Ok(SignupOutcome::PendingConfirmation(pending));
        }
        error!("Unexpected signup response shape from auth service");
        Err(ApiError::internal("Failed to parse auth response: unexpected format"))
    }

    /// Check credentials with the password grant.
    pub async fn password_grant(
        &self,
        email: &str,
        password: &str,
    ) -> Result<SupabaseAuthResponse, ApiError> {
        let body = json!({ "email": email, "password": password });
        self.send_json(self.url("/token?grant_type=password"), &body, |m| ApiError::unauthorized(m))
            .await
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<SupabaseAuthResponse, ApiError> {
        let body = json!({ "refresh_token": refresh_token });
        self.send_json(
            self.url("/token?grant_type=refresh_token"),
            &body,
            |m| ApiError::unauthorized(m),
        )
        .await
    }

    fn logout_url(&self, scope: LogoutScope) -> String {
        self.url(&format!("/logout?scope={}", scope.as_str()))
    }

    /// Revoke sessions for the user behind `access_token`; failures are only logged.
    pub async fn logout(&self, access_token: &str, scope: LogoutScope) {
        let result = self
            .client
            .post(self.logout_url(scope))
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .send()
            .await;

        match result {
            Ok(resp) if resp.status().is_success() => {
                debug!(scope = scope.as_str(), "Supabase session revoked")
            }
            Ok(resp) => tracing::warn!(status = %resp.status(), "Supabase logout rejected"),
            Err(e) => tracing::warn!(error = %e, "Supabase logout failed"),
        }
    }

    async fn send_json<R: DeserializeOwned>(
        &self,
        url: String,
        body: &serde_json::Value,
        on_reject: fn(String) -> ApiError,
    ) -> Result<R, ApiError> {
        let text = self.send(url, body, on_reject).await?;
        serde_json::from_str(&text)
            .map_err(|e| ApiError::internal(format!("Failed to parse auth response: {}", e)))
    }

    /// POST `body`; a non-2xx answer becomes `on_reject(message)`.
    async fn send(
        &self,
        url: String,
        body: &serde_json::Value,
        on_reject: fn(String) -> ApiError,
    ) -> Result<String, ApiError> {
        let response = self
            .client
            .post(&url)
            .header("apikey", &self.anon_key)
            .json(body)
            .send()
            .await
            .map_err(|e| ApiError::internal(format!("Failed to connect to auth service: {}", e)))?;

        if !response.status().is_success() {
            let error: SupabaseErrorResponse = response
                .json()
                .await
                .unwrap_or_else(|_| SupabaseErrorResponse::with_error("Authentication failed"));
            return Err(on_reject(error.get_message()));
        }

        response
            .text()
            .await
            .map_err(|e| ApiError::internal(format!("Failed to read auth response: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logout_scope_is_explicit_in_the_url() {
        let mut settings = Settings::for_tests();
        settings.supabase_url = "https://example.supabase.co/".to_string();
        let provider = AuthProvider::new(Client::new(), &settings);

        assert_eq!(
            provider.logout_url(LogoutScope::Local),
            "https://example.supabase.co/auth/v1/logout?scope=local"
        );
        assert_eq!(
            provider.logout_url(LogoutScope::Global),
            "https://example.supabase.co/auth/v1/logout?scope=global"
        );
    }
}
