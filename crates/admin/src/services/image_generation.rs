//! Client for the text-to-image proxy.
//!
//! The proxy accepts `POST {endpoint}` with a JSON body
//! `{"prompt": "...", "options": {...}}` and a bearer token, and answers
//! with the raw image bytes. Generated images are returned to the editor,
//! which can then upload the one it keeps through Cloudinary.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::instrument;

use crate::config::ImageGenerationConfig;

/// Longest accepted prompt, in characters.
pub const MAX_PROMPT_CHARS: usize = 1000;

/// Generation can be slow on a cold model.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Errors that can occur when generating an image.
#[derive(Debug, Error)]
pub enum ImageGenerationError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Proxy returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Prompt is empty or too long.
    #[error("invalid prompt: {0}")]
    InvalidPrompt(String),

    /// Response was not an image.
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Optional generation parameters, forwarded as-is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub negative_prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

/// A generated image.
#[derive(Debug, Clone)]
pub struct GeneratedImage {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    prompt: &'a str,
    options: &'a GenerationOptions,
}

/// Image generation proxy client.
#[derive(Clone)]
pub struct ImageGenerationClient {
    inner: Arc<ImageGenerationClientInner>,
}

struct ImageGenerationClientInner {
    client: reqwest::Client,
    endpoint: url::Url,
    token: SecretString,
}

impl ImageGenerationClient {
    /// Create a new client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &ImageGenerationConfig) -> Result<Self, ImageGenerationError> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self {
            inner: Arc::new(ImageGenerationClientInner {
                client,
                endpoint: config.endpoint.clone(),
                token: config.token.clone(),
            }),
        })
    }

    /// Generate an image from a prompt.
    ///
    /// # Errors
    ///
    /// Returns `ImageGenerationError::InvalidPrompt` before any request is
    /// made if the prompt is blank or too long, and
    /// `ImageGenerationError::Api` if the proxy answers with a non-2xx status.
    #[instrument(skip(self, options), fields(prompt_chars = prompt.chars().count()))]
    pub async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<GeneratedImage, ImageGenerationError> {
        let prompt = validate_prompt(prompt)?;

        let response = self
            .inner
            .client
            .post(self.inner.endpoint.clone())
            .bearer_auth(self.inner.token.expose_secret())
            .json(&GenerateRequest { prompt, options })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ImageGenerationError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();

        if !content_type.starts_with("image/") {
            return Err(ImageGenerationError::Parse(format!(
                "expected an image, got {content_type}"
            )));
        }

        let bytes = response.bytes().await?.to_vec();
        tracing::info!(size = bytes.len(), %content_type, "Image generated");

        Ok(GeneratedImage {
            content_type,
            bytes,
        })
    }
}

/// Trim a prompt and check its length.
fn validate_prompt(prompt: &str) -> Result<&str, ImageGenerationError> {
    let prompt = prompt.trim();
    if prompt.is_empty() {
        return Err(ImageGenerationError::InvalidPrompt(
            "prompt cannot be empty".to_string(),
        ));
    }
    if prompt.chars().count() > MAX_PROMPT_CHARS {
        return Err(ImageGenerationError::InvalidPrompt(format!(
            "prompt is longer than {MAX_PROMPT_CHARS} characters"
        )));
    }
    Ok(prompt)
}

impl std::fmt::Debug for ImageGenerationClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageGenerationClient")
            .field("endpoint", &self.inner.endpoint.as_str())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_prompt() {
        assert_eq!(validate_prompt("  a salon interior  ").unwrap(), "a salon interior");
        assert!(validate_prompt("   ").is_err());
        assert!(validate_prompt(&"x".repeat(MAX_PROMPT_CHARS)).is_ok());
        assert!(validate_prompt(&"x".repeat(MAX_PROMPT_CHARS + 1)).is_err());
    }

    #[test]
    fn test_options_skip_unset_fields() {
        let body = serde_json::to_value(GenerateRequest {
            prompt: "p",
            options: &GenerationOptions {
                width: Some(512),
                ..GenerationOptions::default()
            },
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({"prompt": "p", "options": {"width": 512}}));
    }

    #[tokio::test]
    async fn test_blank_prompt_fails_without_request() {
        let client = ImageGenerationClient::new(&ImageGenerationConfig {
            endpoint: url::Url::parse("http://127.0.0.1:9/generate").unwrap(),
            token: SecretString::from("token"),
        })
        .unwrap();

        let err = client
            .generate(" ", &GenerationOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ImageGenerationError::InvalidPrompt(_)));
    }
}
