//! Database migration command.
//!
//! Migrations live in `crates/admin/migrations/` and are embedded at build
//! time. The server never migrates on startup.

/// Errors that can occur while migrating.
#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Apply pending migrations.
///
/// # Errors
///
/// Returns an error if the database is unreachable or a migration fails.
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let pool = super::connect().await?;

    tracing::info!("Running migrations...");
    sqlx::migrate!("../admin/migrations")
        .run(&pool)
        .await
        .map_err(MigrationError::from)?;

    tracing::info!("Migrations complete!");
    Ok(())
}
