//! Cloudinary client for CMS image hosting.
//!
//! # API Reference
//!
//! - Upload: `POST https://api.cloudinary.com/v1_1/<cloud>/image/upload`
//! - Destroy: `POST https://api.cloudinary.com/v1_1/<cloud>/image/destroy`
//! - Delivery: `https://res.cloudinary.com/<cloud>/image/upload/<transform>/<public_id>`
//!
//! Requests are signed: the request parameters (excluding `file`,
//! `api_key` and `signature`) are sorted by name, joined as `k=v&k=v`, the
//! API secret is appended, and the SHA-256 hex digest is sent as
//! `signature`.

use std::collections::BTreeMap;
use std::sync::Arc;

use reqwest::multipart::{Form, Part};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::instrument;

use crate::config::CloudinaryConfig;

/// Cloudinary API base URL.
const API_BASE: &str = "https://api.cloudinary.com/v1_1";

/// Cloudinary delivery base URL.
const DELIVERY_BASE: &str = "https://res.cloudinary.com";

/// Largest accepted upload (10 MiB, the free-plan image limit).
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Errors that can occur when interacting with Cloudinary.
#[derive(Debug, Error)]
pub enum CloudinaryError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Failed to parse response.
    #[error("Parse error: {0}")]
    Parse(String),

    /// The upload was rejected before sending.
    #[error("invalid upload: {0}")]
    InvalidUpload(String),

    /// The asset to delete does not exist.
    #[error("image not found: {0}")]
    NotFound(String),
}

/// An image stored on Cloudinary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedImage {
    pub public_id: String,
    pub secure_url: String,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub bytes: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct DestroyResponse {
    result: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorMessage,
}

#[derive(Debug, Deserialize)]
struct ErrorMessage {
    message: String,
}

/// Crop modes accepted by [`CloudinaryClient::transformed_url`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Crop {
    #[default]
    Fill,
    Fit,
    Limit,
    Thumb,
}

impl Crop {
    const fn as_param(self) -> &'static str {
        match self {
            Self::Fill => "c_fill",
            Self::Fit => "c_fit",
            Self::Limit => "c_limit",
            Self::Thumb => "c_thumb",
        }
    }
}

/// Cloudinary API client.
#[derive(Clone)]
pub struct CloudinaryClient {
    inner: Arc<CloudinaryClientInner>,
}

struct CloudinaryClientInner {
    client: reqwest::Client,
    cloud_name: String,
    api_key: String,
    api_secret: SecretString,
    folder: String,
}

impl CloudinaryClient {
    /// Create a new Cloudinary client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &CloudinaryConfig) -> Result<Self, CloudinaryError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()?;

        Ok(Self {
            inner: Arc::new(CloudinaryClientInner {
                client,
                cloud_name: config.cloud_name.clone(),
                api_key: config.api_key.clone(),
                api_secret: config.api_secret.clone(),
                folder: config.folder.clone(),
            }),
        })
    }

    /// Default folder for uploads.
    #[must_use]
    pub fn folder(&self) -> &str {
        &self.inner.folder
    }

    /// Upload an image.
    ///
    /// `folder` is placed under the configured root folder, e.g. `branches/3`
    /// becomes `salonhub/branches/3`.
    ///
    /// # Errors
    ///
    /// Returns `CloudinaryError::InvalidUpload` for empty or oversized files
    /// and `CloudinaryError::Api` if Cloudinary rejects the upload.
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    pub async fn upload(
        &self,
        bytes: Vec<u8>,
        filename: &str,
        folder: Option<&str>,
    ) -> Result<UploadedImage, CloudinaryError> {
        if bytes.is_empty() {
            return Err(CloudinaryError::InvalidUpload("file is empty".to_string()));
        }
        if bytes.len() > MAX_UPLOAD_BYTES {
            return Err(CloudinaryError::InvalidUpload(format!(
                "file is larger than {} MiB",
                MAX_UPLOAD_BYTES / 1024 / 1024
            )));
        }

        let folder = match folder.map(|f| f.trim_matches('/')).filter(|f| !f.is_empty()) {
            Some(sub) => format!("{}/{sub}", self.inner.folder),
            None => self.inner.folder.clone(),
        };
        let timestamp = chrono::Utc::now().timestamp().to_string();

        let mut params = BTreeMap::new();
        params.insert("folder", folder.clone());
        params.insert("timestamp", timestamp.clone());
        let signature = self.sign(&params);

        let form = Form::new()
            .part("file", Part::bytes(bytes).file_name(filename.to_string()))
            .text("api_key", self.inner.api_key.clone())
            .text("folder", folder)
            .text("timestamp", timestamp)
            .text("signature", signature);

        let url = format!("{API_BASE}/{}/image/upload", self.inner.cloud_name);
        let response = self.inner.client.post(&url).multipart(form).send().await?;
        let image: UploadedImage = self.handle_response(response).await?;

        tracing::info!(public_id = %image.public_id, "Image uploaded");
        Ok(image)
    }

    /// Delete an image.
    ///
    /// # Errors
    ///
    /// Returns `CloudinaryError::NotFound` if the asset does not exist.
    #[instrument(skip(self))]
    pub async fn destroy(&self, public_id: &str) -> Result<(), CloudinaryError> {
        let timestamp = chrono::Utc::now().timestamp().to_string();

        let mut params = BTreeMap::new();
        params.insert("public_id", public_id.to_string());
        params.insert("timestamp", timestamp.clone());
        let signature = self.sign(&params);

        let form = [
            ("public_id", public_id.to_string()),
            ("timestamp", timestamp),
            ("api_key", self.inner.api_key.clone()),
            ("signature", signature),
        ];

        let url = format!("{API_BASE}/{}/image/destroy", self.inner.cloud_name);
        let response = self.inner.client.post(&url).form(&form).send().await?;
        let body: DestroyResponse = self.handle_response(response).await?;

        match body.result.as_str() {
            "ok" => {
                tracing::info!(public_id, "Image deleted");
                Ok(())
            }
            "not found" => Err(CloudinaryError::NotFound(public_id.to_string())),
            other => Err(CloudinaryError::Parse(format!(
                "unexpected destroy result: {other}"
            ))),
        }
    }

    /// Delivery URL for a resized version of an image.
    #[must_use]
    pub fn transformed_url(
        &self,
        public_id: &str,
        width: Option<u32>,
        height: Option<u32>,
        crop: Crop,
    ) -> String {
        let mut transform = Vec::new();
        if let Some(w) = width {
            transform.push(format!("w_{w}"));
        }
        if let Some(h) = height {
            transform.push(format!("h_{h}"));
        }
        if !transform.is_empty() {
            transform.push(crop.as_param().to_string());
        }
        transform.push("f_auto".to_string());
        transform.push("q_auto".to_string());

        format!(
            "{DELIVERY_BASE}/{}/image/upload/{}/{public_id}",
            self.inner.cloud_name,
            transform.join(",")
        )
    }

    /// Sign request parameters.
    #[must_use]
    pub fn sign(&self, params: &BTreeMap<&str, String>) -> String {
        signature(params, self.inner.api_secret.expose_secret())
    }

    /// Handle API response and parse JSON.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, CloudinaryError> {
        let status = response.status();

        if status.is_success() {
            return response
                .json()
                .await
                .map_err(|e| CloudinaryError::Parse(format!("Failed to parse response: {e}")));
        }

        Err(Self::parse_error(response).await)
    }

    /// Parse error response from Cloudinary.
    async fn parse_error(response: reqwest::Response) -> CloudinaryError {
        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());

        let message = serde_json::from_str::<ErrorBody>(&text)
            .map(|body| body.error.message)
            .unwrap_or(text);

        CloudinaryError::Api { status, message }
    }
}

/// SHA-256 signature over sorted `k=v` pairs followed by the secret.
fn signature(params: &BTreeMap<&str, String>, secret: &str) -> String {
    let to_sign = params
        .iter()
        .filter(|(_, v)| !v.is_empty())
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha256::new();
    hasher.update(to_sign.as_bytes());
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

impl std::fmt::Debug for CloudinaryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudinaryClient")
            .field("cloud_name", &self.inner.cloud_name)
            .field("folder", &self.inner.folder)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn client() -> CloudinaryClient {
        CloudinaryClient::new(&CloudinaryConfig {
            cloud_name: "demo".to_string(),
            api_key: "1234".to_string(),
            api_secret: SecretString::from("abcd"),
            folder: "salonhub".to_string(),
        })
        .unwrap()
    }

    #[test]
    fn test_signature_sorts_params() {
        let mut params = BTreeMap::new();
        params.insert("timestamp", "1315060510".to_string());
        params.insert("public_id", "sample_image".to_string());

        let mut hasher = Sha256::new();
        hasher.update(b"public_id=sample_image&timestamp=1315060510abcd");
        let expected = hex::encode(hasher.finalize());

        assert_eq!(signature(&params, "abcd"), expected);
        assert_eq!(client().sign(&params), expected);
    }

    #[test]
    fn test_signature_skips_empty_values() {
        let mut with_empty = BTreeMap::new();
        with_empty.insert("folder", String::new());
        with_empty.insert("timestamp", "1".to_string());

        let mut without = BTreeMap::new();
        without.insert("timestamp", "1".to_string());

        assert_eq!(signature(&with_empty, "s"), signature(&without, "s"));
    }

    #[test]
    fn test_transformed_url() {
        let url = client().transformed_url("salonhub/hero", Some(800), Some(400), Crop::Fill);
        assert_eq!(
            url,
            "https://res.cloudinary.com/demo/image/upload/w_800,h_400,c_fill,f_auto,q_auto/salonhub/hero"
        );
    }

    #[test]
    fn test_transformed_url_without_size() {
        let url = client().transformed_url("a", None, None, Crop::Fit);
        assert_eq!(url, "https://res.cloudinary.com/demo/image/upload/f_auto,q_auto/a");
    }

    #[test]
    fn test_debug_hides_secret() {
        let debug = format!("{:?}", client());
        assert!(!debug.contains("abcd"));
    }

    #[tokio::test]
    async fn test_empty_upload_rejected() {
        let err = client().upload(Vec::new(), "x.png", None).await.unwrap_err();
        assert!(matches!(err, CloudinaryError::InvalidUpload(_)));
    }
}
