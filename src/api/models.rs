use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use super::client::{ApiError, Result};

/// Environment variable overriding the service base URL
pub const API_URL_ENV: &str = "PDF_CONVERTER_API_URL";

const DEFAULT_BASE_URL: &str = "http://localhost:8000/";

/// Response from the /upload/ endpoint
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UploadResponse {
    pub filename: String,
    #[serde(default)]
    pub message: Option<String>,
}

/// Response from the /convert/ endpoint
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConvertResponse {
    #[serde(default)]
    pub message: Option<String>,
    pub output_file: String,
}

/// Pulls a usable message out of a parsed error body.
///
/// Returns `None` when `detail` is missing, null or an empty string, so the
/// caller can fall back to the status reason phrase.
pub fn error_detail(body: &Value) -> Option<String> {
    match body.get("detail")? {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Configuration for the API client
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub base_url: Url,
}

impl ApiConfig {
    /// Parses a base URL, forcing a trailing slash so endpoint joins keep any
    /// path prefix (`http://host/api` -> `http://host/api/upload/`).
    pub fn from_base_url(raw: &str) -> Result<Self> {
        let mut base_url = Url::parse(raw.trim())?;
        if base_url.cannot_be_a_base() || !matches!(base_url.scheme(), "http" | "https") {
            return Err(ApiError::UnsupportedBaseUrl(raw.to_string()));
        }
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self { base_url })
    }

    /// Reads `PDF_CONVERTER_API_URL`, falling back to the default when unset
    /// or invalid.
    pub fn from_env() -> Self {
        match std::env::var(API_URL_ENV) {
            Ok(raw) => match Self::from_base_url(&raw) {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!(value = %raw, error = %e, "ignoring {}", API_URL_ENV);
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse(DEFAULT_BASE_URL).expect("default base URL is valid"),
        }
    }
}
