//! Template API client.
//!
//! Thin HTTP wrapper over the template CRUD endpoints and the asset upload
//! endpoint. Also serves as the [`AssetSource`] and [`AssetUploader`] an
//! editing session fetches and uploads through. Response parsing is kept in
//! pure functions for testability.

#[cfg(test)]
#[path = "api_test.rs"]
mod api_test;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::assets::{AssetError, AssetSource, AssetUploader, UploadedAsset};
use crate::config::EditorConfig;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("failed to build HTTP client: {0}")]
    HttpClientBuild(String),
    #[error("request failed: {0}")]
    ApiRequest(String),
    #[error("API returned {status}: {body}")]
    ApiResponse { status: u16, body: String },
    #[error("failed to parse API response: {0}")]
    ApiParse(String),
}

// =============================================================================
// CLIENT
// =============================================================================

pub struct TemplateClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl TemplateClient {
    /// Build a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::HttpClientBuild`] if the TLS backend fails to initialize.
    pub fn new(config: &EditorConfig) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| ApiError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, base_url: config.api_base_url.trim_end_matches('/').to_string(), token: config.api_token.clone() })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch a stored template's design document.
    ///
    /// # Errors
    ///
    /// Transport failures, non-2xx statuses, and unparseable bodies.
    pub async fn fetch_template(&self, id: &str) -> Result<Value, ApiError> {
        let url = format!("{}/templates/{id}", self.base_url);
        let text = self.send(self.http.get(&url)).await?;
        parse_template_response(&text)
    }

    /// Store a new template. Returns the id the server assigned.
    ///
    /// # Errors
    ///
    /// Transport failures, non-2xx statuses, and responses without an id.
    pub async fn create_template(&self, document: &Value) -> Result<String, ApiError> {
        let url = format!("{}/templates", self.base_url);
        let text = self.send(self.http.post(&url).json(document)).await?;
        let id = parse_template_id(&text)?;
        info!(template_id = %id, "template created");
        Ok(id)
    }

    /// Overwrite an existing template.
    ///
    /// # Errors
    ///
    /// Transport failures and non-2xx statuses.
    pub async fn update_template(&self, id: &str, document: &Value) -> Result<(), ApiError> {
        let url = format!("{}/templates/{id}", self.base_url);
        self.send(self.http.put(&url).json(document)).await?;
        info!(template_id = %id, "template updated");
        Ok(())
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<String, ApiError> {
        let request = match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };
        let response = request.send().await.map_err(|e| ApiError::ApiRequest(e.to_string()))?;

        let status = response.status().as_u16();
        let text = response.text().await.map_err(|e| ApiError::ApiRequest(e.to_string()))?;

        if !(200..300).contains(&status) {
            warn!(status, "template API error");
            return Err(ApiError::ApiResponse { status, body: text });
        }
        Ok(text)
    }
}

#[async_trait]
impl AssetSource for TemplateClient {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, AssetError> {
        let fetch_err = |e: reqwest::Error| AssetError::Fetch { url: url.to_string(), reason: e.to_string() };
        let response = self.http.get(url).send().await.map_err(fetch_err)?;
        let status = response.status();
        if !status.is_success() {
            return Err(AssetError::Status { url: url.to_string(), status: status.as_u16() });
        }
        let bytes = response.bytes().await.map_err(fetch_err)?;
        debug!(%url, len = bytes.len(), "asset fetched");
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl AssetUploader for TemplateClient {
    async fn upload_asset(&self, filename: &str, bytes: Vec<u8>) -> Result<UploadedAsset, AssetError> {
        let url = format!("{}/assets", self.base_url);
        let form = Form::new().part("file", Part::bytes(bytes).file_name(filename.to_string()));
        let text = self
            .send(self.http.post(&url).multipart(form))
            .await
            .map_err(|e| AssetError::Upload(e.to_string()))?;
        let uploaded = parse_upload_response(&text).map_err(|e| AssetError::Upload(e.to_string()))?;
        info!(%filename, url = %uploaded.url, "asset uploaded");
        Ok(uploaded)
    }
}

// =============================================================================
// PARSING
// =============================================================================

/// A template body: either the document itself or `{ "template": document }`.
///
/// # Errors
///
/// Non-JSON bodies and bodies that are not objects.
pub fn parse_template_response(json: &str) -> Result<Value, ApiError> {
    let mut value: Value = serde_json::from_str(json).map_err(|e| ApiError::ApiParse(e.to_string()))?;
    if let Some(inner) = value.get_mut("template").filter(|v| v.is_object()).map(Value::take) {
        return Ok(inner);
    }
    if value.is_object() { Ok(value) } else { Err(ApiError::ApiParse("template body is not an object".into())) }
}

/// The `id` of a created template, numeric or string.
///
/// # Errors
///
/// Non-JSON bodies and bodies without a usable `id`.
pub fn parse_template_id(json: &str) -> Result<String, ApiError> {
    let value: Value = serde_json::from_str(json).map_err(|e| ApiError::ApiParse(e.to_string()))?;
    let id = value.get("id").or_else(|| value.get("template").and_then(|t| t.get("id")));
    match id {
        Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => Err(ApiError::ApiParse("response has no template id".into())),
    }
}

/// The `{ "url": … }` body of an asset upload.
///
/// # Errors
///
/// Non-JSON bodies and bodies with a missing or empty `url`.
pub fn parse_upload_response(json: &str) -> Result<UploadedAsset, ApiError> {
    let uploaded: UploadedAsset = serde_json::from_str(json).map_err(|e| ApiError::ApiParse(e.to_string()))?;
    if uploaded.url.trim().is_empty() {
        return Err(ApiError::ApiParse("upload response has an empty url".into()));
    }
    Ok(uploaded)
}
