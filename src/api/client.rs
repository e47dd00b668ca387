use std::fmt;

use futures::Stream;
use futures::TryStreamExt;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde_json::Value;
use thiserror::Error;
use url::Url;

use super::models::{error_detail, ApiConfig, ConvertResponse, UploadResponse};
use crate::domain::{OutputFormat, SelectedFile};

const PDF_MIME: &str = "application/pdf";

/// Which service call was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Upload,
    Conversion,
}

impl Stage {
    /// Used when a rejection body cannot be parsed at all
    fn fallback_detail(self) -> &'static str {
        match self {
            Stage::Upload => "Upload failed with no specific error message.",
            Stage::Conversion => "Conversion failed with no specific error message.",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Upload => f.write_str("Upload"),
            Stage::Conversion => f.write_str("Conversion"),
        }
    }
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("{stage} failed: {status} {detail}")]
    Rejected {
        stage: Stage,
        status: u16,
        detail: String,
    },

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    #[error("Invalid service URL: {0}")]
    InvalidBaseUrl(#[from] url::ParseError),

    #[error("Service URL must be an http(s) base URL: {0}")]
    UnsupportedBaseUrl(String),
}

pub type Result<T> = std::result::Result<T, ApiError>;

#[derive(Clone)]
pub struct ApiClient {
    config: ApiConfig,
    http: Client,
}

impl ApiClient {
    pub fn new(config: ApiConfig) -> Self {
        Self {
            config,
            http: Client::new(),
        }
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.config.base_url.join(path)?)
    }

    /// Turns a non-2xx response into an error carrying the server's detail.
    async fn rejection(stage: Stage, response: Response) -> ApiError {
        let status = response.status();
        let detail = match response.json::<Value>().await {
            Ok(body) => error_detail(&body)
                .unwrap_or_else(|| status.canonical_reason().unwrap_or_default().to_string()),
            Err(_) => stage.fallback_detail().to_string(),
        };

        ApiError::Rejected {
            stage,
            status: status.as_u16(),
            detail,
        }
    }

    /// Step 1: send the PDF as multipart form data
    /// Returns the server-assigned filename
    pub async fn upload(&self, file: &SelectedFile) -> Result<UploadResponse> {
        let url = self.endpoint("upload/")?;
        tracing::debug!(%url, file = %file.name, size = file.contents.len(), "uploading");

        let part = Part::bytes(file.contents.to_vec())
            .file_name(file.name.clone())
            .mime_str(PDF_MIME)?;
        let form = Form::new().part("file", part);

        let response = self.http.post(url).multipart(form).send().await?;
        if !response.status().is_success() {
            return Err(Self::rejection(Stage::Upload, response).await);
        }

        response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(format!("JSON decode error: {}", e)))
    }

    /// Step 2: ask the service to convert a previously uploaded file
    pub async fn convert(&self, filename: &str, format: OutputFormat) -> Result<ConvertResponse> {
        let url = self.endpoint("convert/")?;
        tracing::debug!(%url, filename, format = %format, "requesting conversion");

        let response = self
            .http
            .post(url)
            .query(&[("filename", filename), ("output_format", format.as_str())])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Self::rejection(Stage::Conversion, response).await);
        }

        response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(format!("JSON decode error: {}", e)))
    }

    /// Step 3: where the converted file can be fetched from
    pub fn download_url(&self, output_file: &str) -> Result<Url> {
        let mut url = self.endpoint("download/")?;
        url.path_segments_mut()
            .map_err(|_| ApiError::UnsupportedBaseUrl(self.config.base_url.to_string()))?
            .pop_if_empty()
            .push(output_file);
        Ok(url)
    }

    /// Download file with progress stream
    /// Returns (total_size, stream)
    pub async fn download_file_stream(
        &self,
        download_url: &Url,
    ) -> Result<(Option<u64>, impl Stream<Item = Result<bytes::Bytes>>)> {
        let response = self
            .http
            .get(download_url.clone())
            .send()
            .await?
            .error_for_status()?;

        let total_size = response.content_length();
        let stream = response.bytes_stream().map_err(ApiError::RequestError);

        Ok((total_size, stream))
    }
}
