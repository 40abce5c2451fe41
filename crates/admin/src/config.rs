//! Server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `SALON_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `SALON_BASE_URL` - Public URL of the dashboard
//! - `SALON_SESSION_SECRET` - Session signing secret (min 32 chars, high entropy)
//!
//! ## Optional
//! - `SALON_HOST` - Bind address (default: 127.0.0.1)
//! - `SALON_PORT` - Listen port (default: 3001)
//! - `SALON_LOG_JSON` - Emit JSON logs when set
//! - `LOYALTY_SPEND_PER_POINT` - Amount spent per point earned (default: 100)
//! - `LOYALTY_POINT_VALUE` - Discount one point is worth (default: 1)
//! - `CONTENT_CACHE_TTL_SECS` - CMS read cache lifetime (default: 300)
//! - `SENTRY_DSN`, `SENTRY_ENVIRONMENT`, `SENTRY_SAMPLE_RATE`, `SENTRY_TRACES_SAMPLE_RATE`
//!
//! ## Optional (Cloudinary - enables image uploads, all or none)
//! - `CLOUDINARY_CLOUD_NAME`
//! - `CLOUDINARY_API_KEY`
//! - `CLOUDINARY_API_SECRET`
//! - `CLOUDINARY_FOLDER` - Upload folder (default: salonhub)
//!
//! ## Optional (image generation proxy, both or none)
//! - `IMAGE_GENERATION_URL`
//! - `IMAGE_GENERATION_TOKEN`

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

use salonhub_core::loyalty::LoyaltyPolicy;

const MIN_SESSION_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;
const DEFAULT_CLOUDINARY_FOLDER: &str = "salonhub";
const DEFAULT_CONTENT_CACHE_TTL_SECS: u64 = 300;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct SalonConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the dashboard
    pub base_url: String,
    /// Session signing secret
    pub session_secret: SecretString,
    /// Emit JSON-formatted logs
    pub log_json: bool,
    /// Loyalty earn and burn rates
    pub loyalty: LoyaltyPolicy,
    /// How long CMS documents stay cached
    pub content_cache_ttl: Duration,
    /// Cloudinary credentials (optional - disables uploads when absent)
    pub cloudinary: Option<CloudinaryConfig>,
    /// Image generation proxy (optional)
    pub image_generation: Option<ImageGenerationConfig>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "development", "production")
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate (0.0 to 1.0)
    pub sentry_sample_rate: f32,
    /// Sentry traces sample rate for performance monitoring (0.0 to 1.0)
    pub sentry_traces_sample_rate: f32,
}

/// Cloudinary upload credentials.
///
/// Implements `Debug` manually to redact the API secret.
#[derive(Clone)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: SecretString,
    /// Folder new uploads are placed in
    pub folder: String,
}

impl std::fmt::Debug for CloudinaryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudinaryConfig")
            .field("cloud_name", &self.cloud_name)
            .field("api_key", &self.api_key)
            .field("api_secret", &"[REDACTED]")
            .field("folder", &self.folder)
            .finish()
    }
}

impl CloudinaryConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let cloud_name = get_optional_env("CLOUDINARY_CLOUD_NAME");
        let api_key = get_optional_env("CLOUDINARY_API_KEY");
        let api_secret = get_optional_env("CLOUDINARY_API_SECRET");

        match (cloud_name, api_key, api_secret) {
            (Some(cloud_name), Some(api_key), Some(api_secret)) => {
                validate_secret_strength(&api_secret, "CLOUDINARY_API_SECRET")?;
                Ok(Some(Self {
                    cloud_name,
                    api_key,
                    api_secret: SecretString::from(api_secret),
                    folder: get_env_or_default("CLOUDINARY_FOLDER", DEFAULT_CLOUDINARY_FOLDER),
                }))
            }
            (None, None, None) => Ok(None),
            _ => Err(ConfigError::InvalidEnvVar(
                "CLOUDINARY_*".to_string(),
                "CLOUDINARY_CLOUD_NAME, CLOUDINARY_API_KEY and CLOUDINARY_API_SECRET must be set together"
                    .to_string(),
            )),
        }
    }
}

/// Image generation proxy endpoint.
///
/// Implements `Debug` manually to redact the token.
#[derive(Clone)]
pub struct ImageGenerationConfig {
    pub endpoint: url::Url,
    pub token: SecretString,
}

impl std::fmt::Debug for ImageGenerationConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageGenerationConfig")
            .field("endpoint", &self.endpoint.as_str())
            .field("token", &"[REDACTED]")
            .finish()
    }
}

impl ImageGenerationConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let endpoint = get_optional_env("IMAGE_GENERATION_URL");
        let token = get_optional_env("IMAGE_GENERATION_TOKEN");

        match (endpoint, token) {
            (Some(endpoint), Some(token)) => {
                let endpoint = url::Url::parse(&endpoint).map_err(|e| {
                    ConfigError::InvalidEnvVar("IMAGE_GENERATION_URL".to_string(), e.to_string())
                })?;
                validate_secret_strength(&token, "IMAGE_GENERATION_TOKEN")?;
                Ok(Some(Self {
                    endpoint,
                    token: SecretString::from(token),
                }))
            }
            (None, None) => Ok(None),
            _ => Err(ConfigError::InvalidEnvVar(
                "IMAGE_GENERATION_*".to_string(),
                "Both IMAGE_GENERATION_URL and IMAGE_GENERATION_TOKEN must be set together"
                    .to_string(),
            )),
        }
    }
}

impl SalonConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("SALON_DATABASE_URL")?;
        let host = get_env_or_default("SALON_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("SALON_HOST".to_string(), e.to_string()))?;
        let port = get_env_or_default("SALON_PORT", "3001")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("SALON_PORT".to_string(), e.to_string()))?;
        let base_url = get_required_env("SALON_BASE_URL")?;
        let session_secret = get_validated_secret("SALON_SESSION_SECRET")?;
        validate_session_secret(&session_secret, "SALON_SESSION_SECRET")?;

        let defaults = LoyaltyPolicy::default();
        let loyalty = LoyaltyPolicy {
            spend_per_point: get_positive_decimal(
                "LOYALTY_SPEND_PER_POINT",
                defaults.spend_per_point,
            )?,
            point_value: get_positive_decimal("LOYALTY_POINT_VALUE", defaults.point_value)?,
        };

        let content_cache_ttl = get_env_or_default(
            "CONTENT_CACHE_TTL_SECS",
            &DEFAULT_CONTENT_CACHE_TTL_SECS.to_string(),
        )
        .parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|e| {
            ConfigError::InvalidEnvVar("CONTENT_CACHE_TTL_SECS".to_string(), e.to_string())
        })?;

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            session_secret,
            log_json: get_optional_env("SALON_LOG_JSON").is_some(),
            loyalty,
            content_cache_ttl,
            cloudinary: CloudinaryConfig::from_env()?,
            image_generation: ImageGenerationConfig::from_env()?,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
            sentry_sample_rate: get_optional_env("SENTRY_SAMPLE_RATE")
                .and_then(|s| s.parse().ok())
                .unwrap_or(1.0),
            sentry_traces_sample_rate: get_optional_env("SENTRY_TRACES_SAMPLE_RATE")
                .and_then(|s| s.parse().ok())
                .unwrap_or(1.0),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether cookies should carry the `Secure` flag.
    #[must_use]
    pub fn is_https(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable, treating empty values as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

/// Parse a strictly positive decimal, falling back to `default` when unset.
fn get_positive_decimal(key: &str, default: Decimal) -> Result<Decimal, ConfigError> {
    let Some(raw) = get_optional_env(key) else {
        return Ok(default);
    };
    let value = raw
        .trim()
        .parse::<Decimal>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if value <= Decimal::ZERO {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "must be greater than zero".to_string(),
        ));
    }
    Ok(value)
}

/// Validate that a session secret meets minimum length requirements.
fn validate_session_secret(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_SESSION_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_SESSION_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)]
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn test_config() -> SalonConfig {
        SalonConfig {
            database_url: SecretString::from("postgres://localhost/salon_test"),
            host: "127.0.0.1".parse().unwrap(),
            port: 3001,
            base_url: "http://localhost:3001".to_string(),
            session_secret: SecretString::from("x".repeat(32)),
            log_json: false,
            loyalty: LoyaltyPolicy::default(),
            content_cache_ttl: Duration::from_secs(DEFAULT_CONTENT_CACHE_TTL_SECS),
            cloudinary: None,
            image_generation: None,
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 1.0,
        }
    }

    #[test]
    fn test_shannon_entropy() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
        assert!((shannon_entropy("aaaaaaa") - 0.0).abs() < f64::EPSILON);
        assert!((shannon_entropy("ab") - 1.0).abs() < 0.01);
        assert!(shannon_entropy("aB3$xY9!mK2@nL5#") > 3.3);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let err = validate_secret_strength("your-api-key-here", "TEST_VAR").unwrap_err();
        assert!(matches!(err, ConfigError::InsecureSecret(_, _)));
        assert!(validate_secret_strength("changeme123", "TEST_VAR").is_err());
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let err = validate_secret_strength(&"a".repeat(33), "TEST_VAR").unwrap_err();
        assert!(matches!(err, ConfigError::InsecureSecret(_, _)));
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        assert!(validate_secret_strength("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6", "TEST_VAR").is_ok());
    }

    #[test]
    fn test_validate_session_secret_length() {
        assert!(validate_session_secret(&SecretString::from("short"), "S").is_err());
        assert!(validate_session_secret(&SecretString::from("a".repeat(32)), "S").is_ok());
    }

    #[test]
    fn test_socket_addr_and_https() {
        let mut config = test_config();
        let addr = config.socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 3001);
        assert!(!config.is_https());

        config.base_url = "https://salon.example.com".to_string();
        assert!(config.is_https());
    }

    #[test]
    fn test_cloudinary_config_debug_redacts_secret() {
        let config = CloudinaryConfig {
            cloud_name: "salon-cloud".to_string(),
            api_key: "123456789".to_string(),
            api_secret: SecretString::from("very_private_cloudinary_value"),
            folder: DEFAULT_CLOUDINARY_FOLDER.to_string(),
        };

        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("salon-cloud"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("very_private_cloudinary_value"));
    }

    #[test]
    fn test_image_generation_config_debug_redacts_token() {
        let config = ImageGenerationConfig {
            endpoint: url::Url::parse("https://images.internal/generate").unwrap(),
            token: SecretString::from("hf_private_token_value"),
        };

        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("images.internal"));
        assert!(!debug_output.contains("hf_private_token_value"));
    }
}
