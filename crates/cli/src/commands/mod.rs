//! CLI command implementations.

pub mod migrate;
pub mod seed;
pub mod user;

use secrecy::SecretString;
use sqlx::PgPool;

/// Missing database configuration.
#[derive(Debug, thiserror::Error)]
#[error("Missing environment variable: SALON_DATABASE_URL (or DATABASE_URL)")]
pub struct MissingDatabaseUrl;

/// Connection string from `SALON_DATABASE_URL`, falling back to
/// `DATABASE_URL`.
///
/// # Errors
///
/// Returns `MissingDatabaseUrl` if neither is set.
pub fn database_url() -> Result<SecretString, MissingDatabaseUrl> {
    dotenvy::dotenv().ok();
    std::env::var("SALON_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| MissingDatabaseUrl)
}

/// Connect with the server's pool settings.
///
/// # Errors
///
/// Returns an error if the URL is missing or the database is unreachable.
pub async fn connect() -> Result<PgPool, Box<dyn std::error::Error>> {
    let url = database_url()?;
    tracing::info!("Connecting to database...");
    Ok(salonhub_admin::db::create_pool(&url).await?)
}
