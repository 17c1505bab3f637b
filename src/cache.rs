//! Image cache: decoded bitmaps for backgrounds, images, and QR previews.
//!
//! The cache itself is synchronous bookkeeping. Each slot is keyed by
//! [`CacheKey`] and remembers the [`Source`] signature it was built from plus a
//! generation number. [`ImageCache::ensure`] hands back a [`ResolveRequest`]
//! when a slot is new or its source changed; the caller runs [`resolve`] on a
//! task and feeds the outcome to [`ImageCache::complete`], which accepts it
//! only if the slot still expects that generation. Results for released or
//! superseded slots are dropped, so each load triggers at most one redraw.

#[cfg(test)]
#[path = "cache_test.rs"]
mod cache_test;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use image::{Rgba, RgbaImage};
use qrcode::QrCode;
use tracing::{debug, warn};

use crate::assets::{AssetError, AssetSource};
use crate::color::to_rgba;
use crate::element::{ElementId, QrProps};

/// Smallest QR preview edge in pixels.
pub const MIN_QR_PIXELS: u32 = 64;

/// Largest QR preview edge in pixels.
pub const MAX_QR_PIXELS: u32 = 2048;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error(transparent)]
    Asset(#[from] AssetError),
    #[error("image decode failed: {0}")]
    Decode(String),
    #[error("qr generation failed: {0}")]
    Qr(String),
    #[error("resolve task failed: {0}")]
    Task(String),
}

/// A decoded RGBA bitmap. Cheap to clone.
#[derive(Clone, PartialEq)]
pub struct Bitmap(Arc<RgbaImage>);

impl Bitmap {
    #[must_use]
    pub fn new(image: RgbaImage) -> Self {
        Self(Arc::new(image))
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.0.width()
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.0.height()
    }

    #[must_use]
    pub fn image(&self) -> &RgbaImage {
        &self.0
    }
}

impl fmt::Debug for Bitmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bitmap({}x{})", self.width(), self.height())
    }
}

/// Cache slot identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// The active page's background.
    Background,
    /// An image or QR element.
    Element(ElementId),
}

/// Visual inputs of a QR preview. Any change produces a new signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QrStyle {
    pub data: String,
    /// Minimum edge of the generated bitmap in pixels.
    pub size: u32,
    pub foreground: String,
    pub background: String,
    pub transparent: bool,
}

impl QrStyle {
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn from_props(props: &QrProps) -> Self {
        let edge = props.width.max(props.height);
        let size = if edge.is_finite() {
            edge.round().clamp(f64::from(MIN_QR_PIXELS), f64::from(MAX_QR_PIXELS)) as u32
        } else {
            MIN_QR_PIXELS
        };
        Self {
            data: props.data.clone(),
            size,
            foreground: props.foreground_color.clone(),
            background: props.background_color.clone(),
            transparent: props.transparent_background,
        }
    }
}

/// Where a slot's bitmap comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// Absolute URL (remote or `local://` preview).
    Url(String),
    /// Generated locally from QR settings.
    Qr(QrStyle),
}

impl Source {
    /// Stable fingerprint; a slot reloads only when this changes.
    #[must_use]
    pub fn signature(&self) -> String {
        match self {
            Self::Url(url) => format!("url:{url}"),
            Self::Qr(s) => format!("qr:{}|{}|{}|{}|{}", s.size, s.foreground, s.background, s.transparent, s.data),
        }
    }
}

/// Observable state of one slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotStatus {
    Pending,
    Ready,
    Failed,
}

#[derive(Debug)]
enum SlotState {
    Pending,
    Ready(Bitmap),
    Failed,
}

#[derive(Debug)]
struct Slot {
    signature: String,
    generation: u64,
    state: SlotState,
}

/// Work order produced by [`ImageCache::ensure`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveRequest {
    pub key: CacheKey,
    pub generation: u64,
    pub source: Source,
}

/// Outcome of a resolve task, fed back through [`ImageCache::complete`].
#[derive(Debug)]
pub struct Resolved {
    pub key: CacheKey,
    pub generation: u64,
    pub result: Result<Bitmap, CacheError>,
}

#[derive(Debug, Default)]
pub struct ImageCache {
    slots: HashMap<CacheKey, Slot>,
    next_generation: u64,
}

impl ImageCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make sure `key` tracks `source`.
    ///
    /// Returns a request when the slot is new or its source signature changed.
    /// An unchanged signature is a no-op, including for failed slots.
    pub fn ensure(&mut self, key: CacheKey, source: Source) -> Option<ResolveRequest> {
        let signature = source.signature();
        if self.slots.get(&key).is_some_and(|s| s.signature == signature) {
            return None;
        }
        self.next_generation += 1;
        let generation = self.next_generation;
        debug!(?key, generation, "cache slot invalidated");
        self.slots.insert(key.clone(), Slot { signature, generation, state: SlotState::Pending });
        Some(ResolveRequest { key, generation, source })
    }

    /// Store the outcome of a resolve. Returns whether the slot changed (and a
    /// redraw is due).
    pub fn complete(&mut self, resolved: Resolved) -> bool {
        let Some(slot) = self.slots.get_mut(&resolved.key) else {
            debug!(key = ?resolved.key, "dropping result for released slot");
            return false;
        };
        if slot.generation != resolved.generation || !matches!(slot.state, SlotState::Pending) {
            debug!(key = ?resolved.key, generation = resolved.generation, "dropping stale result");
            return false;
        }
        slot.state = match resolved.result {
            Ok(bitmap) => SlotState::Ready(bitmap),
            Err(e) => {
                warn!(key = ?resolved.key, error = %e, "image load failed");
                SlotState::Failed
            }
        };
        true
    }

    /// Ready bitmap for `key`.
    #[must_use]
    pub fn bitmap(&self, key: &CacheKey) -> Option<&Bitmap> {
        match &self.slots.get(key)?.state {
            SlotState::Ready(b) => Some(b),
            SlotState::Pending | SlotState::Failed => None,
        }
    }

    #[must_use]
    pub fn status(&self, key: &CacheKey) -> Option<SlotStatus> {
        self.slots.get(key).map(|s| match s.state {
            SlotState::Pending => SlotStatus::Pending,
            SlotState::Ready(_) => SlotStatus::Ready,
            SlotState::Failed => SlotStatus::Failed,
        })
    }

    /// Drop a slot. Any in-flight result for it will be ignored.
    pub fn release(&mut self, key: &CacheKey) -> bool {
        self.slots.remove(key).is_some()
    }

    /// Keep only slots for which `keep` returns true; returns the released keys.
    pub fn retain(&mut self, mut keep: impl FnMut(&CacheKey) -> bool) -> Vec<CacheKey> {
        let gone: Vec<CacheKey> = self.slots.keys().filter(|k| !keep(k)).cloned().collect();
        for key in &gone {
            self.slots.remove(key);
        }
        gone
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

// =============================================================
// Resolution
// =============================================================

/// Bytes for a resolve, already chosen by the session. Ignored for QR sources.
pub enum Fetch {
    /// Fetch through the asset source.
    Remote(Arc<dyn AssetSource>),
    /// In-memory bytes behind a `local://` URL; `None` once revoked.
    Local(Option<Arc<[u8]>>),
}

/// Produce the bitmap for one request.
pub async fn resolve(request: ResolveRequest, fetch: Fetch) -> Resolved {
    let ResolveRequest { key, generation, source } = request;
    let result = match source {
        Source::Qr(style) => blocking(move || render_qr(&style)).await,
        Source::Url(url) => load_url(&url, fetch).await,
    };
    Resolved { key, generation, result }
}

async fn blocking<F>(f: F) -> Result<Bitmap, CacheError>
where
    F: FnOnce() -> Result<Bitmap, CacheError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| CacheError::Task(e.to_string()))?
}

async fn load_url(url: &str, fetch: Fetch) -> Result<Bitmap, CacheError> {
    let bytes: Arc<[u8]> = match fetch {
        Fetch::Remote(source) => Arc::from(source.fetch(url).await?),
        Fetch::Local(Some(bytes)) => bytes,
        Fetch::Local(None) => return Err(AssetError::UnknownLocal(url.to_string()).into()),
    };
    blocking(move || decode_bitmap(&bytes)).await
}

/// Decode PNG/JPEG/WebP/GIF bytes into a bitmap.
///
/// # Errors
///
/// Returns [`CacheError::Decode`] for unsupported or corrupt data.
pub fn decode_bitmap(bytes: &[u8]) -> Result<Bitmap, CacheError> {
    let img = image::load_from_memory(bytes).map_err(|e| CacheError::Decode(e.to_string()))?;
    Ok(Bitmap::new(img.to_rgba8()))
}

/// Generate a QR preview bitmap.
///
/// A transparent background renders light modules (and the quiet zone) with
/// zero alpha.
///
/// # Errors
///
/// Returns [`CacheError::Qr`] when the payload does not fit in a QR code.
pub fn render_qr(style: &QrStyle) -> Result<Bitmap, CacheError> {
    let code = QrCode::new(style.data.as_bytes()).map_err(|e| CacheError::Qr(e.to_string()))?;
    let dark = Rgba(to_rgba(&style.foreground, [0, 0, 0, 255]));
    let light = if style.transparent { Rgba([0, 0, 0, 0]) } else { Rgba(to_rgba(&style.background, [255, 255, 255, 255])) };
    let image = code
        .render::<Rgba<u8>>()
        .dark_color(dark)
        .light_color(light)
        .quiet_zone(true)
        .min_dimensions(style.size, style.size)
        .build();
    Ok(Bitmap::new(image))
}
