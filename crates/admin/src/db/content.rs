//! CMS document repository.
//!
//! Documents are stored whole as JSONB in `salon.site_content`, keyed
//! `homepage` or `branch:{id}`.

use sqlx::PgPool;
use sqlx::types::Json;

use salonhub_core::content::{BranchContent, HomepageContent};
use salonhub_core::{BranchId, UserId};

use super::RepositoryError;

const HOMEPAGE_KEY: &str = "homepage";

fn branch_key(branch_id: BranchId) -> String {
    format!("branch:{branch_id}")
}

/// Repository for homepage and branch page documents.
pub struct ContentRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ContentRepository<'a> {
    /// Create a new content repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Load the homepage, or an empty document if none was saved.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::DataCorruption` if the stored document does
    /// not deserialize.
    pub async fn homepage(&self) -> Result<HomepageContent, RepositoryError> {
        Ok(self.load(HOMEPAGE_KEY).await?.unwrap_or_default())
    }

    /// Replace the homepage document.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the write fails.
    pub async fn save_homepage(
        &self,
        content: &HomepageContent,
        updated_by: UserId,
    ) -> Result<(), RepositoryError> {
        self.store(HOMEPAGE_KEY, Json(content), updated_by).await
    }

    /// Load a branch page, or an empty one if none was saved.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::DataCorruption` if the stored document does
    /// not deserialize.
    pub async fn branch_content(
        &self,
        branch_id: BranchId,
    ) -> Result<BranchContent, RepositoryError> {
        let content: Option<BranchContent> = self.load(&branch_key(branch_id)).await?;
        Ok(content.unwrap_or_else(|| BranchContent::empty(branch_id)))
    }

    /// Replace a branch page document.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the write fails.
    pub async fn save_branch_content(
        &self,
        content: &BranchContent,
        updated_by: UserId,
    ) -> Result<(), RepositoryError> {
        self.store(&branch_key(content.branch_id), Json(content), updated_by)
            .await
    }

    async fn load<T>(&self, key: &str) -> Result<Option<T>, RepositoryError>
    where
        T: serde::de::DeserializeOwned,
    {
        let document: Option<serde_json::Value> =
            sqlx::query_scalar("SELECT document FROM salon.site_content WHERE key = $1")
                .bind(key)
                .fetch_optional(self.pool)
                .await?;

        document
            .map(|value| {
                serde_json::from_value(value).map_err(|e| {
                    RepositoryError::DataCorruption(format!("invalid {key} document: {e}"))
                })
            })
            .transpose()
    }

    async fn store<T>(
        &self,
        key: &str,
        document: Json<&T>,
        updated_by: UserId,
    ) -> Result<(), RepositoryError>
    where
        T: serde::Serialize + Sync,
    {
        sqlx::query(
            r"
            INSERT INTO salon.site_content (key, document, updated_by)
            VALUES ($1, $2, $3)
            ON CONFLICT (key)
            DO UPDATE SET document = EXCLUDED.document,
                          updated_by = EXCLUDED.updated_by,
                          updated_at = NOW()
            ",
        )
        .bind(key)
        .bind(document)
        .bind(updated_by)
        .execute(self.pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_branch_key() {
        assert_eq!(branch_key(BranchId::new(4)), "branch:4");
    }
}
