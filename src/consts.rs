//! Shared numeric constants for the editor core.

// ── Page ────────────────────────────────────────────────────────

/// Default canvas width in px (A4 landscape at 72 dpi).
pub const DEFAULT_PAGE_WIDTH: f64 = 842.0;

/// Default canvas height in px (A4 landscape at 72 dpi).
pub const DEFAULT_PAGE_HEIGHT: f64 = 595.0;

// ── Size floors ─────────────────────────────────────────────────

/// Minimum wrap width for text elements after a resize commit.
pub const MIN_TEXT_WIDTH: f64 = 50.0;

/// Minimum side of any proposed transform box; smaller boxes are rejected.
pub const MIN_BOX_SIZE: f64 = 10.0;

/// Minimum width/height for image, shape, and QR elements after a resize commit.
pub const MIN_ELEMENT_SIZE: f64 = 5.0;

/// Smallest font size a resize commit may produce.
pub const MIN_FONT_SIZE: f64 = 6.0;

// ── Text metrics ────────────────────────────────────────────────

/// Average glyph advance as a fraction of the font size, used to estimate wrapping.
pub const AVG_GLYPH_WIDTH_RATIO: f64 = 0.55;

// ── Hit-testing ─────────────────────────────────────────────────

/// Screen-space hit slop in pixels for transform handles.
pub const HANDLE_RADIUS_PX: f64 = 8.0;

/// Distance from the bounding box top edge to the rotate handle, in screen pixels.
pub const ROTATE_HANDLE_OFFSET_PX: f64 = 24.0;

/// Pointer travel (page units) below which a press/release pair counts as a click.
pub const CLICK_SLOP: f64 = 0.5;

// ── Gestures ────────────────────────────────────────────────────

/// Rotation snap increment in degrees while shift is held.
pub const ROTATION_SNAP_DEG: f64 = 15.0;

/// Arrow-key nudge distance in page px.
pub const NUDGE_STEP: f64 = 1.0;

/// Arrow-key nudge distance in page px while shift is held.
pub const NUDGE_STEP_LARGE: f64 = 10.0;

/// Offset applied to each successive element added from the toolbar so they do not stack exactly.
pub const NEW_ELEMENT_CASCADE: f64 = 20.0;
