//! Design document serialization.
//!
//! Two persisted shapes exist. A single-page template is written in the legacy
//! flat form `{ name, width, height, design: { objects, background } }`;
//! anything else is `{ name, pages: [{ width, height, elements, background }] }`.
//! Loading accepts both, fills missing optional fields with defaults, and
//! reports (rather than fails on) elements it cannot use.

#[cfg(test)]
#[path = "template_test.rs"]
mod template_test;

use std::collections::HashSet;
use std::fmt;

use serde_json::{Map, Value, json};
use tracing::warn;

use crate::assets::{AssetUrls, LocalUrls};
use crate::consts::{DEFAULT_PAGE_HEIGHT, DEFAULT_PAGE_WIDTH};
use crate::element::{DecodeError, ElementId, ElementKind, decode_element};
use crate::pages::Page;

#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("design document is not a JSON object")]
    NotAnObject,
    #[error("design document has neither `pages` nor `design`")]
    MissingContent,
    #[error("malformed design document: {0}")]
    Malformed(&'static str),
    #[error("a template needs at least one page")]
    NoPages,
    /// A background or image still points at an unsaved local preview.
    #[error("page {}: {what} is an unsaved local preview; upload it first", page + 1)]
    LocalAsset { page: usize, what: String },
}

/// Something a load had to repair or skip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadWarning {
    DroppedElement { page: usize, index: usize, reason: DecodeError },
    DroppedPage { page: usize },
    DuplicateId { page: usize, old: ElementId, new: ElementId },
    EmptyPages,
}

impl fmt::Display for LoadWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DroppedElement { page, index, reason } => {
                write!(f, "page {}: element #{index} dropped ({reason})", page + 1)
            }
            Self::DroppedPage { page } => write!(f, "page {} is not an object and was dropped", page + 1),
            Self::DuplicateId { page, old, new } => {
                write!(f, "page {}: duplicate id {old} re-issued as {new}", page + 1)
            }
            Self::EmptyPages => f.write_str("template had no pages; a blank page was added"),
        }
    }
}

/// A decoded template plus the repairs made while loading it.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedTemplate {
    pub name: String,
    pub pages: Vec<Page>,
    pub warnings: Vec<LoadWarning>,
}

// =============================================================
// Save
// =============================================================

/// Serialize pages into a design document.
///
/// # Errors
///
/// `NoPages` for an empty page list; `LocalAsset` if a background or image
/// still references a `local://` preview; `Json` if an element fails to
/// serialize.
pub fn to_document(pages: &[Page], name: &str) -> Result<Value, DocumentError> {
    for (index, page) in pages.iter().enumerate() {
        check_saved_assets(index, page)?;
    }
    match pages {
        [] => Err(DocumentError::NoPages),
        [page] => Ok(json!({
            "name": name,
            "width": page.width,
            "height": page.height,
            "design": {
                "objects": serde_json::to_value(&page.elements)?,
                "background": page.background,
            },
        })),
        _ => Ok(json!({ "name": name, "pages": serde_json::to_value(pages)? })),
    }
}

fn check_saved_assets(index: usize, page: &Page) -> Result<(), DocumentError> {
    if page.background.as_deref().is_some_and(LocalUrls::is_local) {
        warn!(page = index, "background is an unsaved local preview");
        return Err(DocumentError::LocalAsset { page: index, what: "background".into() });
    }
    for element in &page.elements {
        if let ElementKind::Image(image) = &element.kind {
            if LocalUrls::is_local(&image.src) {
                warn!(page = index, element_id = %element.id, "image is an unsaved local preview");
                return Err(DocumentError::LocalAsset { page: index, what: format!("image {}", element.id) });
            }
        }
    }
    Ok(())
}

// =============================================================
// Load
// =============================================================

/// Parse and decode a design document from text.
///
/// # Errors
///
/// See [`from_document`]; also `Json` for unparseable text.
pub fn from_str(text: &str, urls: &dyn AssetUrls) -> Result<LoadedTemplate, DocumentError> {
    let value: Value = serde_json::from_str(text)?;
    from_document(&value, urls)
}

/// Decode a design document in either persisted shape.
///
/// Relative background paths are resolved through `urls`.
///
/// # Errors
///
/// Only structural problems are errors: a non-object document, one with
/// neither `pages` nor `design`, or a `pages`/`design` of the wrong JSON type.
pub fn from_document(value: &Value, urls: &dyn AssetUrls) -> Result<LoadedTemplate, DocumentError> {
    let doc = value.as_object().ok_or(DocumentError::NotAnObject)?;
    let name = doc.get("name").and_then(Value::as_str).unwrap_or_default().to_string();
    let mut warnings = Vec::new();

    let mut pages = if let Some(raw) = doc.get("pages") {
        let list = raw.as_array().ok_or(DocumentError::Malformed("`pages` is not an array"))?;
        let mut pages = Vec::with_capacity(list.len());
        for (index, raw_page) in list.iter().enumerate() {
            let Some(map) = raw_page.as_object() else {
                warn!(page = index, "page is not an object; dropped");
                warnings.push(LoadWarning::DroppedPage { page: index });
                continue;
            };
            let elements = map.get("elements").unwrap_or(&Value::Null);
            let background = map.get("background").unwrap_or(&Value::Null);
            pages.push(decode_page(index, map, elements, background, urls, &mut warnings));
        }
        pages
    } else if let Some(raw) = doc.get("design") {
        let parsed;
        let design = match raw {
            Value::String(text) => {
                parsed = serde_json::from_str::<Value>(text)?;
                &parsed
            }
            other => other,
        };
        let design = design.as_object().ok_or(DocumentError::Malformed("`design` is not an object"))?;
        let elements = design.get("objects").unwrap_or(&Value::Null);
        let background = design.get("background").unwrap_or(&Value::Null);
        vec![decode_page(0, doc, elements, background, urls, &mut warnings)]
    } else {
        return Err(DocumentError::MissingContent);
    };

    if pages.is_empty() {
        warn!("template has no pages; adding a blank page");
        warnings.push(LoadWarning::EmptyPages);
        pages.push(Page::default());
    }

    Ok(LoadedTemplate { name, pages, warnings })
}

/// Decode one page. `sized` is the object carrying `width`/`height`.
fn decode_page(
    index: usize,
    sized: &Map<String, Value>,
    elements: &Value,
    background: &Value,
    urls: &dyn AssetUrls,
    warnings: &mut Vec<LoadWarning>,
) -> Page {
    let mut page = Page::blank(
        positive(sized, "width").unwrap_or(DEFAULT_PAGE_WIDTH),
        positive(sized, "height").unwrap_or(DEFAULT_PAGE_HEIGHT),
    );

    page.background = background
        .as_str()
        .filter(|s| !s.trim().is_empty())
        .map(|s| urls.asset_path_to_url(s));

    let mut seen = HashSet::new();
    for (i, raw) in elements.as_array().map(Vec::as_slice).unwrap_or_default().iter().enumerate() {
        let mut element = match decode_element(raw) {
            Ok(element) => element,
            Err(reason) => {
                warn!(page = index, element = i, %reason, "element dropped");
                warnings.push(LoadWarning::DroppedElement { page: index, index: i, reason });
                continue;
            }
        };
        if !seen.insert(element.id.clone()) {
            let fresh = ElementId::generate(element.element_type());
            warn!(page = index, old = %element.id, new = %fresh, "duplicate element id re-issued");
            warnings.push(LoadWarning::DuplicateId { page: index, old: element.id.clone(), new: fresh.clone() });
            element.id = fresh.clone();
            seen.insert(fresh);
        }
        page.elements.push(element);
    }
    page
}

fn positive(map: &Map<String, Value>, key: &str) -> Option<f64> {
    map.get(key).and_then(Value::as_f64).filter(|v| v.is_finite() && *v > 0.0)
}
