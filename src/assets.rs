//! Asset seams: path-to-URL resolution, byte fetching, uploads, and local preview URLs.
//!
//! The core never talks HTTP directly. It consumes an [`AssetUrls`] resolver,
//! an [`AssetSource`] for bytes, and an [`AssetUploader`] callback;
//! [`crate::api::TemplateClient`] implements all three against the template API.

#[cfg(test)]
#[path = "assets_test.rs"]
mod assets_test;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

/// Scheme prefix of transient preview URLs created for user-supplied files.
pub const LOCAL_URL_SCHEME: &str = "local://";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AssetError {
    #[error("fetch failed for {url}: {reason}")]
    Fetch { url: String, reason: String },
    #[error("fetch failed for {url}: HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("upload failed: {0}")]
    Upload(String),
    #[error("local preview revoked or unknown: {0}")]
    UnknownLocal(String),
}

/// Resolves asset paths as stored in documents into absolute URLs.
pub trait AssetUrls: Send + Sync {
    fn asset_path_to_url(&self, path: &str) -> String;
}

/// Fetches the raw bytes behind an absolute asset URL.
#[async_trait]
pub trait AssetSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, AssetError>;
}

/// Result of a successful upload.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct UploadedAsset {
    pub url: String,
}

/// Uploads a user-supplied file to the asset library.
#[async_trait]
pub trait AssetUploader: Send + Sync {
    async fn upload_asset(&self, filename: &str, bytes: Vec<u8>) -> Result<UploadedAsset, AssetError>;
}

/// Whether a path already carries a scheme (`https://`, `data:`, `local://`, …).
#[must_use]
pub fn is_absolute_url(path: &str) -> bool {
    path.contains("://") || path.starts_with("data:") || path.starts_with("blob:")
}

/// Resolves relative upload paths against a fixed base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseUrlResolver {
    base: String,
}

impl BaseUrlResolver {
    #[must_use]
    pub fn new(base: &str) -> Self {
        Self { base: base.trim_end_matches('/').to_string() }
    }
}

impl AssetUrls for BaseUrlResolver {
    fn asset_path_to_url(&self, path: &str) -> String {
        if path.is_empty() || is_absolute_url(path) {
            return path.to_string();
        }
        format!("{}/{}", self.base, path.trim_start_matches('/'))
    }
}

/// Registry of transient `local://` URLs backed by in-memory file bytes.
///
/// Owned by one editing session. Entries must be revoked when replaced and
/// when the session closes.
#[derive(Debug, Default)]
pub struct LocalUrls {
    entries: HashMap<String, Arc<[u8]>>,
}

impl LocalUrls {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register file bytes and return a fresh preview URL for them.
    pub fn create(&mut self, bytes: Vec<u8>) -> String {
        let url = format!("{LOCAL_URL_SCHEME}{}", Uuid::new_v4().simple());
        self.entries.insert(url.clone(), Arc::from(bytes));
        debug!(%url, "local preview url created");
        url
    }

    #[must_use]
    pub fn get(&self, url: &str) -> Option<Arc<[u8]>> {
        self.entries.get(url).cloned()
    }

    /// Release one URL. Returns whether it was registered.
    pub fn revoke(&mut self, url: &str) -> bool {
        let removed = self.entries.remove(url).is_some();
        if removed {
            debug!(%url, "local preview url revoked");
        }
        removed
    }

    /// Release every URL; returns how many were live.
    pub fn revoke_all(&mut self) -> usize {
        let n = self.entries.len();
        self.entries.clear();
        n
    }

    #[must_use]
    pub fn is_local(url: &str) -> bool {
        url.starts_with(LOCAL_URL_SCHEME)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
