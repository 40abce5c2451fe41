//! Cached access to the homepage and branch page documents.
//!
//! Public pages read these on every request, so documents are kept in a
//! `moka` cache and dropped from it whenever they are saved.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use sqlx::PgPool;
use thiserror::Error;
use tracing::{debug, instrument};

use salonhub_core::content::{BranchContent, ContentError, HomepageContent};
use salonhub_core::{BranchId, UserId};

use crate::db::{ContentRepository, RepositoryError};

const HOMEPAGE_CACHE_KEY: &str = "homepage";

/// Errors from reading or saving content.
#[derive(Debug, Error)]
pub enum ContentServiceError {
    /// The document failed validation.
    #[error(transparent)]
    Invalid(#[from] ContentError),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Cached value types.
#[derive(Debug, Clone)]
enum CachedContent {
    Homepage(Arc<HomepageContent>),
    Branch(Arc<BranchContent>),
}

/// Content service with a read-through cache.
#[derive(Clone)]
pub struct ContentService {
    pool: PgPool,
    cache: Cache<String, CachedContent>,
}

impl ContentService {
    /// Create a content service whose entries expire after `ttl`.
    #[must_use]
    pub fn new(pool: PgPool, ttl: Duration) -> Self {
        let cache = Cache::builder().max_capacity(256).time_to_live(ttl).build();
        Self { pool, cache }
    }

    /// The homepage document.
    ///
    /// # Errors
    ///
    /// Returns `ContentServiceError::Repository` if loading fails.
    #[instrument(skip(self))]
    pub async fn homepage(&self) -> Result<Arc<HomepageContent>, ContentServiceError> {
        if let Some(CachedContent::Homepage(content)) = self.cache.get(HOMEPAGE_CACHE_KEY).await {
            debug!("Cache hit for homepage");
            return Ok(content);
        }

        let content = Arc::new(ContentRepository::new(&self.pool).homepage().await?);
        self.cache
            .insert(
                HOMEPAGE_CACHE_KEY.to_string(),
                CachedContent::Homepage(Arc::clone(&content)),
            )
            .await;
        Ok(content)
    }

    /// A branch page document.
    ///
    /// # Errors
    ///
    /// Returns `ContentServiceError::Repository` if loading fails.
    #[instrument(skip(self))]
    pub async fn branch_content(
        &self,
        branch_id: BranchId,
    ) -> Result<Arc<BranchContent>, ContentServiceError> {
        let key = branch_cache_key(branch_id);
        if let Some(CachedContent::Branch(content)) = self.cache.get(&key).await {
            debug!("Cache hit for branch content");
            return Ok(content);
        }

        let content = Arc::new(
            ContentRepository::new(&self.pool)
                .branch_content(branch_id)
                .await?,
        );
        self.cache
            .insert(key, CachedContent::Branch(Arc::clone(&content)))
            .await;
        Ok(content)
    }

    /// Validate and store the homepage.
    ///
    /// # Errors
    ///
    /// Returns `ContentServiceError::Invalid` if the document is invalid.
    #[instrument(skip(self, content))]
    pub async fn save_homepage(
        &self,
        content: &HomepageContent,
        updated_by: UserId,
    ) -> Result<(), ContentServiceError> {
        content.validate()?;
        ContentRepository::new(&self.pool)
            .save_homepage(content, updated_by)
            .await?;
        self.cache.invalidate(HOMEPAGE_CACHE_KEY).await;
        tracing::info!(%updated_by, "Homepage content saved");
        Ok(())
    }

    /// Validate and store a branch page.
    ///
    /// # Errors
    ///
    /// Returns `ContentServiceError::Invalid` if the document is invalid.
    #[instrument(skip(self, content), fields(branch_id = %content.branch_id))]
    pub async fn save_branch_content(
        &self,
        content: &BranchContent,
        updated_by: UserId,
    ) -> Result<(), ContentServiceError> {
        content.validate()?;
        ContentRepository::new(&self.pool)
            .save_branch_content(content, updated_by)
            .await?;
        self.cache
            .invalidate(&branch_cache_key(content.branch_id))
            .await;
        tracing::info!(%updated_by, "Branch content saved");
        Ok(())
    }

    /// Drop every cached document.
    pub async fn invalidate_all(&self) {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
    }
}

fn branch_cache_key(branch_id: BranchId) -> String {
    format!("branch:{branch_id}")
}

impl std::fmt::Debug for ContentService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentService")
            .field("cached_entries", &self.cache.entry_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use sqlx::postgres::PgPoolOptions;

    fn service() -> ContentService {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/salonhub_test")
            .unwrap();
        ContentService::new(pool, Duration::from_secs(60))
    }

    #[tokio::test]
    async fn test_cached_homepage_served_without_database() {
        let service = service();
        let mut content = HomepageContent::default();
        content.hero.title = "Welcome".to_string();
        service
            .cache
            .insert(
                HOMEPAGE_CACHE_KEY.to_string(),
                CachedContent::Homepage(Arc::new(content)),
            )
            .await;

        let homepage = service.homepage().await.unwrap();
        assert_eq!(homepage.hero.title, "Welcome");
    }

    #[tokio::test]
    async fn test_invalid_homepage_rejected_before_write() {
        let service = service();
        let err = service
            .save_homepage(&HomepageContent::default(), UserId::new(1))
            .await
            .unwrap_err();
        assert!(matches!(err, ContentServiceError::Invalid(_)));
    }

    #[tokio::test]
    async fn test_invalidate_all_clears_cache() {
        let service = service();
        service
            .cache
            .insert(
                branch_cache_key(BranchId::new(1)),
                CachedContent::Branch(Arc::new(BranchContent::empty(BranchId::new(1)))),
            )
            .await;
        service.invalidate_all().await;
        assert!(service.cache.get(&branch_cache_key(BranchId::new(1))).await.is_none());
    }
}
