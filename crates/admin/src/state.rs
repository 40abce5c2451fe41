//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use salonhub_core::loyalty::LoyaltyPolicy;

use crate::config::SalonConfig;
use crate::services::{
    CloudinaryClient, CloudinaryError, ContentService, ImageGenerationClient,
    ImageGenerationError,
};

/// Error building the application state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("cloudinary client: {0}")]
    Cloudinary(#[from] CloudinaryError),
    #[error("image generation client: {0}")]
    ImageGeneration(#[from] ImageGenerationError),
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: SalonConfig,
    pool: PgPool,
    content: ContentService,
    cloudinary: Option<CloudinaryClient>,
    image_generation: Option<ImageGenerationClient>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// Cloudinary and image generation clients are only built when their
    /// configuration is present.
    ///
    /// # Errors
    ///
    /// Returns an error if an HTTP client cannot be built.
    pub fn new(config: SalonConfig, pool: PgPool) -> Result<Self, StateError> {
        let content = ContentService::new(pool.clone(), config.content_cache_ttl);
        let cloudinary = config
            .cloudinary
            .as_ref()
            .map(CloudinaryClient::new)
            .transpose()?;
        let image_generation = config
            .image_generation
            .as_ref()
            .map(ImageGenerationClient::new)
            .transpose()?;

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                content,
                cloudinary,
                image_generation,
            }),
        })
    }

    /// Get a reference to the configuration.
    #[must_use]
    pub fn config(&self) -> &SalonConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Get the cached content service.
    #[must_use]
    pub fn content(&self) -> &ContentService {
        &self.inner.content
    }

    /// Get the Cloudinary client, if configured.
    #[must_use]
    pub fn cloudinary(&self) -> Option<&CloudinaryClient> {
        self.inner.cloudinary.as_ref()
    }

    /// Get the image generation client, if configured.
    #[must_use]
    pub fn image_generation(&self) -> Option<&ImageGenerationClient> {
        self.inner.image_generation.as_ref()
    }

    /// Loyalty earn and redeem rates.
    #[must_use]
    pub fn loyalty_policy(&self) -> LoyaltyPolicy {
        self.inner.config.loyalty
    }
}
