//! Web font loading seam.
//!
//! Text elements may name any font family. Before the first paint with a new
//! family, the session asks a [`FontLoader`] to make it available and redraws
//! once the load settles. A load that never settles is cut off after the
//! configured timeout; text then renders with the fallback face.

#[cfg(test)]
#[path = "fonts_test.rs"]
mod fonts_test;

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

/// Families every backend is expected to provide without loading.
pub const BUILTIN_FAMILIES: &[&str] = &[
    "Arial",
    "Helvetica",
    "Times New Roman",
    "Times",
    "Courier New",
    "Courier",
    "Georgia",
    "Verdana",
    "serif",
    "sans-serif",
    "monospace",
];

/// Final state of a font load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontStatus {
    /// The family is usable.
    Active,
    /// The loader gave up; the fallback face will be used.
    Inactive,
    /// No answer within the timeout.
    TimedOut,
}

#[async_trait]
pub trait FontLoader: Send + Sync {
    async fn load(&self, family: &str) -> FontStatus;
}

/// Loader for hosts that rasterize with system fonts only.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemFonts;

#[async_trait]
impl FontLoader for SystemFonts {
    async fn load(&self, family: &str) -> FontStatus {
        debug!(family, "using system font");
        FontStatus::Active
    }
}

/// Whether `family` needs no load.
#[must_use]
pub fn is_builtin(family: &str) -> bool {
    let family = family.trim().trim_matches(|c| c == '"' || c == '\'');
    family.is_empty() || BUILTIN_FAMILIES.iter().any(|b| b.eq_ignore_ascii_case(family))
}

/// Run one load with a deadline.
pub async fn load_with_timeout(loader: &dyn FontLoader, family: &str, timeout: Duration) -> FontStatus {
    if let Ok(status) = tokio::time::timeout(timeout, loader.load(family)).await {
        debug!(family, ?status, "font load settled");
        status
    } else {
        warn!(family, timeout_ms = timeout.as_millis(), "font load timed out");
        FontStatus::TimedOut
    }
}
