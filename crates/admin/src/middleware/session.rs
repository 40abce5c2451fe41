//! Session middleware configuration.
//!
//! Sets up `PostgreSQL`-backed sessions using tower-sessions with
//! SameSite=Strict cookies and a 12 hour inactivity expiry.

use sqlx::PgPool;
use tower_sessions::{Expiry, SessionManagerLayer, SessionStore};
use tower_sessions_sqlx_store::PostgresStore;

use crate::config::SalonConfig;

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "salonhub_session";

/// Session expiry time in seconds (12 hours of inactivity).
const SESSION_EXPIRY_SECONDS: i64 = 12 * 60 * 60;

/// Create the `PostgreSQL` session store in the `salon` schema.
///
/// # Errors
///
/// Returns an error if the schema or table name is rejected by the store.
pub fn create_session_store(pool: &PgPool) -> Result<PostgresStore, sqlx::Error> {
    // The session table is created by migration in the salon schema
    PostgresStore::new(pool.clone())
        .with_schema_name("salon")
        .map_err(|e| sqlx::Error::Configuration(e.into()))?
        .with_table_name("session")
        .map_err(|e| sqlx::Error::Configuration(e.into()))
}

/// Wrap `store` in the session layer used by the dashboard.
#[must_use]
pub fn create_session_layer<S: SessionStore + Clone>(
    store: S,
    config: &SalonConfig,
) -> SessionManagerLayer<S> {
    SessionManagerLayer::new(store)
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(
            tower_sessions::cookie::time::Duration::seconds(SESSION_EXPIRY_SECONDS),
        ))
        .with_secure(config.is_https())
        .with_same_site(tower_sessions::cookie::SameSite::Strict)
        .with_http_only(true)
        .with_path("/")
}
