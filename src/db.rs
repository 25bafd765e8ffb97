//! Database connection pool management

use anyhow::{Context, Result};
use sqlx::{
    postgres::{PgConnectOptions, PgPoolOptions},
    PgPool,
};
use std::str::FromStr;
use std::time::Duration;

use crate::config::Settings;

/// Create a PostgreSQL connection pool
pub async fn create_pool(settings: &Settings) -> Result<PgPool> {
    let pool = pool_options(settings)
        .connect_with(connect_options(settings)?)
        .await
        .context("Failed to connect to PostgreSQL")?;

    tracing::info!(
        max_connections = settings.database_max_connections,
        "Database connection pool established"
    );

    Ok(pool)
}

/// Create a pool that only dials the database on first use.
#[cfg(test)]
pub fn create_lazy_pool(settings: &Settings) -> Result<PgPool> {
    Ok(pool_options(settings).connect_lazy_with(connect_options(settings)?))
}

/// Apply embedded migrations from `migrations/`
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("Failed to run database migrations")?;

    tracing::info!("Database migrations applied");
    Ok(())
}

/// Lightweight health check for database connectivity
pub async fn health_check(pool: &PgPool) -> bool {
    sqlx::query("SELECT 1").fetch_one(pool).await.is_ok()
}

fn connect_options(settings: &Settings) -> Result<PgConnectOptions> {
    Ok(PgConnectOptions::from_str(&settings.database_url)
        .context("Invalid DATABASE_URL")?
        .application_name("serenity-scheduler"))
}

fn pool_options(settings: &Settings) -> PgPoolOptions {
    PgPoolOptions::new()
        .max_connections(settings.database_max_connections)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(5))
        .idle_timeout(Duration::from_secs(300))
        .max_lifetime(Duration::from_secs(1800))
}

/// Rows the database-backed tests build on.
#[cfg(test)]
pub mod fixtures {
    use rust_decimal::Decimal;
    use sqlx::PgPool;
    use uuid::Uuid;

    pub async fn profile(pool: &PgPool, role: &str) -> Uuid {
        let id = Uuid::new_v4();
        sqlx::query("INSERT INTO profiles (id, email, full_name, role) VALUES ($1, $2, $3, $4)")
            .bind(id)
            .bind(format!("{}-{}@example.com", role, id.simple()))
            .bind(format!("Test {}", role))
            .bind(role)
            .execute(pool)
            .await
            .unwrap();
        id
    }

    pub async fn service(pool: &PgPool, name: &str, duration_minutes: i32) -> Uuid {
        sqlx::query_scalar::<_, Uuid>(
            "INSERT INTO services (name, description, duration_minutes, price) VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(name)
        .bind(format!("{} session", name))
        .bind(duration_minutes)
        .bind(Decimal::new(8000, 2))
        .fetch_one(pool)
        .await
        .unwrap()
    }
}
