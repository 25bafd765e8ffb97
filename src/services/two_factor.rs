//! Issuing and consuming emailed two-factor codes.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use super::email::Mailer;
use crate::domain::two_factor::{is_well_formed, IssuedCode, StoredToken, TokenPurpose};

#[derive(Debug, sqlx::FromRow)]
struct TokenRow {
    id: Uuid,
    token: String,
    expires_at: DateTime<Utc>,
    used_at: Option<DateTime<Utc>>,
}

impl From<TokenRow> for StoredToken {
    fn from(row: TokenRow) -> Self {
        Self {
            id: row.id,
            token: row.token,
            expires_at: row.expires_at,
            used_at: row.used_at,
        }
    }
}

/// Replace any outstanding code of this purpose with a fresh one and email it.
///
/// Returns the issued code and whether the email went out.
pub async fn issue(
    db: &PgPool,
    mailer: &Mailer,
    user_id: Uuid,
    email: &str,
    purpose: TokenPurpose,
) -> Result<(IssuedCode, bool), sqlx::Error> {
    let issued = IssuedCode::new(&mut rand::thread_rng(), user_id, purpose, Utc::now());

    sqlx::query(
        "DELETE FROM two_factor_tokens WHERE user_id = $1 AND token_type = $2 AND used_at IS NULL",
    )
    .bind(user_id)
    .bind(purpose.token_type())
    .execute(db)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO two_factor_tokens (user_id, token, token_type, expires_at)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(user_id)
    .bind(&issued.code)
    .bind(purpose.token_type())
    .bind(issued.expires_at)
    .execute(db)
    .await?;

    let email_sent = mailer.send_two_factor_code(email, &issued.code, purpose).await;
    if !email_sent {
        warn!(user_id = %user_id, token_type = purpose.token_type(), "Two-factor code stored but not emailed");
    }

    info!(user_id = %user_id, token_type = purpose.token_type(), "Two-factor code issued");
    Ok((issued, email_sent))
}

/// Check `code` and consume it. A code verifies at most once.
pub async fn verify(
    db: &PgPool,
    user_id: Uuid,
    code: &str,
    purpose: TokenPurpose,
) -> Result<bool, sqlx::Error> {
    let code = code.trim();
    if !is_well_formed(code) {
        return Ok(false);
    }

    let candidate = sqlx::query_as::<_, TokenRow>(
        r#"
        SELECT id, token, expires_at, used_at
        FROM two_factor_tokens
        WHERE user_id = $1 AND token_type = $2 AND token = $3 AND used_at IS NULL
        ORDER BY created_at DESC
        LIMIT 1
        "#,
    )
    .bind(user_id)
    .bind(purpose.token_type())
    .bind(code)
    .fetch_optional(db)
    .await?
    .map(StoredToken::from);

    let Some(token) = candidate.filter(|t| t.accepts(code, Utc::now())) else {
        warn!(user_id = %user_id, token_type = purpose.token_type(), "Two-factor code rejected");
        return Ok(false);
    };

    // Losing a race with a concurrent verification leaves zero rows
    let consumed = sqlx::query_scalar::<_, Uuid>(
        r#"
        UPDATE two_factor_tokens
        SET used_at = NOW()
        WHERE id = $1 AND used_at IS NULL AND expires_at > NOW()
        RETURNING id
        "#,
    )
    .bind(token.id)
    .fetch_optional(db)
    .await?;

    Ok(consumed.is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::db::fixtures;

    fn mailer() -> Mailer {
        Mailer::new(reqwest::Client::new(), &Settings::for_tests())
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn a_code_verifies_exactly_once(pool: PgPool) {
        let user = fixtures::profile(&pool, "customer").await;
        let (issued, email_sent) =
            issue(&pool, &mailer(), user, "ana@example.com", TokenPurpose::Login)
                .await
                .unwrap();
        assert!(!email_sent);

        assert!(verify(&pool, user, &issued.code, TokenPurpose::Login).await.unwrap());
        assert!(!verify(&pool, user, &issued.code, TokenPurpose::Login).await.unwrap());
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn concurrent_verifications_consume_once(pool: PgPool) {
        let user = fixtures::profile(&pool, "customer").await;
        let (issued, _) = issue(&pool, &mailer(), user, "ana@example.com", TokenPurpose::Signup)
            .await
            .unwrap();

        let (a, b) = tokio::join!(
            verify(&pool, user, &issued.code, TokenPurpose::Signup),
            verify(&pool, user, &issued.code, TokenPurpose::Signup),
        );
        assert_eq!([a.unwrap(), b.unwrap()].iter().filter(|ok| **ok).count(), 1);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn reissue_and_purpose_mismatch_reject_the_code(pool: PgPool) {
        let user = fixtures::profile(&pool, "customer").await;
        let (first, _) = issue(&pool, &mailer(), user, "ana@example.com", TokenPurpose::Login)
            .await
            .unwrap();
        let (second, _) = issue(&pool, &mailer(), user, "ana@example.com", TokenPurpose::Login)
            .await
            .unwrap();

        if first.code != second.code {
            assert!(!verify(&pool, user, &first.code, TokenPurpose::Login).await.unwrap());
        }
        assert!(!verify(&pool, user, &second.code, TokenPurpose::Signup).await.unwrap());
        assert!(verify(&pool, user, &second.code, TokenPurpose::Login).await.unwrap());
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn expired_codes_are_rejected(pool: PgPool) {
        let user = fixtures::profile(&pool, "customer").await;
        let (issued, _) = issue(&pool, &mailer(), user, "ana@example.com", TokenPurpose::Login)
            .await
            .unwrap();
        sqlx::query("UPDATE two_factor_tokens SET expires_at = NOW() - INTERVAL '1 minute' WHERE user_id = $1")
            .bind(user)
            .execute(&pool)
            .await
            .unwrap();

        assert!(!verify(&pool, user, &issued.code, TokenPurpose::Login).await.unwrap());
    }
}
