//! Element model: the typed objects placed on a certificate page.
//!
//! This module defines what a page is made of (`Element`, `ElementKind` and the
//! per-kind property structs), the defaults used when a toolbar action creates
//! a new element, a lenient decoder that turns arbitrary design-document JSON
//! into typed elements, and a sparse-update type for property edits
//! (`ElementPatch`).
//!
//! Elements are pure data. Nothing here references the render layer; live
//! transform state for an element lives in [`crate::render::NodeArena`],
//! keyed by [`ElementId`].

#[cfg(test)]
#[path = "element_test.rs"]
mod element_test;

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::consts::{AVG_GLYPH_WIDTH_RATIO, MIN_ELEMENT_SIZE, MIN_TEXT_WIDTH};

/// Payload encoded in a freshly created QR element. The PDF service substitutes
/// the participant's verification link for the placeholder.
pub const DEFAULT_QR_DATA: &str = "{certificateUrl}";

// =============================================================
// Identifiers and discriminants
// =============================================================

/// Identifier of an element, unique within its page.
///
/// Stored as a string so documents produced by other editors (numeric or
/// prefixed ids) load unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementId(String);

impl ElementId {
    /// Wrap an existing identifier.
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Generate a fresh identifier for a new element of the given type.
    #[must_use]
    pub fn generate(ty: ElementType) -> Self {
        Self(format!("{}-{}", ty.as_str(), Uuid::new_v4().simple()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ElementId {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

/// The `type` discriminant of an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementType {
    Text,
    Image,
    Shape,
    Qrcode,
}

impl ElementType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
            Self::Shape => "shape",
            Self::Qrcode => "qrcode",
        }
    }

    /// Parse a wire discriminant. Returns `None` for anything unrecognized.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "text" => Some(Self::Text),
            "image" => Some(Self::Image),
            "shape" => Some(Self::Shape),
            "qrcode" => Some(Self::Qrcode),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontWeight {
    #[default]
    Normal,
    Bold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontStyle {
    #[default]
    Normal,
    Italic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeType {
    #[default]
    Rectangle,
    Circle,
    Triangle,
}

// =============================================================
// Shared property groups
// =============================================================

/// Drop shadow settings shared by every element type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Shadow {
    #[serde(rename = "shadowColor")]
    pub color: String,
    #[serde(rename = "shadowBlur")]
    pub blur: f64,
    #[serde(rename = "shadowOffsetX")]
    pub offset_x: f64,
    #[serde(rename = "shadowOffsetY")]
    pub offset_y: f64,
    #[serde(rename = "shadowOpacity")]
    pub opacity: f64,
}

impl Default for Shadow {
    fn default() -> Self {
        Self { color: "#000000".into(), blur: 0.0, offset_x: 0.0, offset_y: 0.0, opacity: 0.5 }
    }
}

impl Shadow {
    /// Whether the shadow produces any visible output.
    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.opacity > 0.0 && (self.blur > 0.0 || self.offset_x != 0.0 || self.offset_y != 0.0)
    }
}

/// Outline settings for boxed elements.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Border {
    pub border_color: String,
    pub border_width: f64,
    pub border_radius: f64,
}

impl Default for Border {
    fn default() -> Self {
        Self { border_color: "#000000".into(), border_width: 0.0, border_radius: 0.0 }
    }
}

// =============================================================
// Per-kind properties
// =============================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TextProps {
    /// Content; may contain `{fieldName}` placeholders resolved by the PDF service.
    pub text: String,
    pub font_size: f64,
    pub font_family: String,
    pub fill: String,
    pub font_weight: FontWeight,
    pub font_style: FontStyle,
    /// CSS-style decoration list (`""`, `"underline"`, `"line-through"`, …).
    pub text_decoration: String,
    pub letter_spacing: f64,
    pub align: TextAlign,
    /// Wrap width.
    pub width: f64,
    pub line_height: f64,
    pub word_wrap: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bg_color: Option<String>,
    pub bg_padding: f64,
    pub bg_radius: f64,
    pub is_dynamic: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_name: Option<String>,
}

impl Default for TextProps {
    fn default() -> Self {
        Self {
            text: "New text".into(),
            font_size: 24.0,
            font_family: "Arial".into(),
            fill: "#000000".into(),
            font_weight: FontWeight::Normal,
            font_style: FontStyle::Normal,
            text_decoration: String::new(),
            letter_spacing: 0.0,
            align: TextAlign::Left,
            width: 200.0,
            line_height: 1.2,
            word_wrap: true,
            bg_color: None,
            bg_padding: 4.0,
            bg_radius: 0.0,
            is_dynamic: false,
            field_name: None,
        }
    }
}

impl TextProps {
    /// Estimated rendered height from the line count, font size, and line height.
    ///
    /// Wrapping is approximated from an average glyph advance; the real metrics
    /// come from the rendering backend, but hit-testing and handle placement only
    /// need a stable box.
    #[must_use]
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn estimated_height(&self) -> f64 {
        let advance = (self.font_size * AVG_GLYPH_WIDTH_RATIO + self.letter_spacing).max(1.0);
        let per_line = if self.word_wrap { (self.width / advance).floor().max(1.0) as usize } else { usize::MAX };

        let lines: usize = self
            .text
            .split('\n')
            .map(|line| line.chars().count().div_ceil(per_line).max(1))
            .sum();

        let mut height = lines.max(1) as f64 * self.font_size * self.line_height;
        if self.bg_color.is_some() {
            height += self.bg_padding * 2.0;
        }
        height
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageProps {
    /// Asset reference: absolute URL, relative upload path, or a local preview URL.
    pub src: String,
    pub width: f64,
    pub height: f64,
    /// Keep the width/height ratio while resizing.
    pub lock_ratio: bool,
    #[serde(flatten)]
    pub border: Border,
}

impl Default for ImageProps {
    fn default() -> Self {
        Self { src: String::new(), width: 200.0, height: 150.0, lock_ratio: true, border: Border::default() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShapeProps {
    pub shape_type: ShapeType,
    pub width: f64,
    pub height: f64,
    pub fill: String,
    /// `border_radius` only applies to rectangles.
    #[serde(flatten)]
    pub border: Border,
}

impl Default for ShapeProps {
    fn default() -> Self {
        Self::new(ShapeType::Rectangle)
    }
}

impl ShapeProps {
    /// Defaults for a given shape type. Circles start square.
    #[must_use]
    pub fn new(shape_type: ShapeType) -> Self {
        let (width, height) = match shape_type {
            ShapeType::Rectangle => (150.0, 100.0),
            ShapeType::Circle | ShapeType::Triangle => (100.0, 100.0),
        };
        Self { shape_type, width, height, fill: "#3b82f6".into(), border: Border::default() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QrProps {
    /// Payload encoded into the preview bitmap.
    pub data: String,
    pub width: f64,
    pub height: f64,
    pub foreground_color: String,
    pub background_color: String,
    pub transparent_background: bool,
    #[serde(flatten)]
    pub border: Border,
}

impl Default for QrProps {
    fn default() -> Self {
        Self {
            data: DEFAULT_QR_DATA.into(),
            width: 120.0,
            height: 120.0,
            foreground_color: "#000000".into(),
            background_color: "#ffffff".into(),
            transparent_background: false,
            border: Border::default(),
        }
    }
}

/// Type-specific payload. Serialized inline with a `type` discriminant.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ElementKind {
    Text(TextProps),
    Image(ImageProps),
    Shape(ShapeProps),
    Qrcode(QrProps),
}

impl ElementKind {
    #[must_use]
    pub fn element_type(&self) -> ElementType {
        match self {
            Self::Text(_) => ElementType::Text,
            Self::Image(_) => ElementType::Image,
            Self::Shape(_) => ElementType::Shape,
            Self::Qrcode(_) => ElementType::Qrcode,
        }
    }
}

/// Type-specific defaults used when creating a new element.
#[must_use]
pub fn default_for(ty: ElementType) -> ElementKind {
    match ty {
        ElementType::Text => ElementKind::Text(TextProps::default()),
        ElementType::Image => ElementKind::Image(ImageProps::default()),
        ElementType::Shape => ElementKind::Shape(ShapeProps::default()),
        ElementType::Qrcode => ElementKind::Qrcode(QrProps::default()),
    }
}

/// Clamp an opacity into `[0, 1]`, treating non-finite values as fully opaque.
#[must_use]
pub fn clamp_opacity(v: f64) -> f64 {
    if v.is_finite() { v.clamp(0.0, 1.0) } else { 1.0 }
}

// =============================================================
// Element
// =============================================================

/// One placed object on a page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Element {
    pub id: ElementId,
    /// Left edge in page coordinates.
    pub x: f64,
    /// Top edge in page coordinates.
    pub y: f64,
    /// Clockwise rotation in degrees around the top-left corner.
    pub rotation: f64,
    pub opacity: f64,
    pub draggable: bool,
    #[serde(flatten)]
    pub shadow: Shadow,
    #[serde(flatten)]
    pub kind: ElementKind,
}

impl Element {
    /// Create a new element with a generated id at the given position.
    #[must_use]
    pub fn new(kind: ElementKind, x: f64, y: f64) -> Self {
        Self {
            id: ElementId::generate(kind.element_type()),
            x,
            y,
            rotation: 0.0,
            opacity: 1.0,
            draggable: true,
            shadow: Shadow::default(),
            kind,
        }
    }

    #[must_use]
    pub fn element_type(&self) -> ElementType {
        self.kind.element_type()
    }

    /// Model dimensions. Text height is estimated from its content.
    #[must_use]
    pub fn size(&self) -> (f64, f64) {
        match &self.kind {
            ElementKind::Text(t) => (t.width, t.estimated_height()),
            ElementKind::Image(i) => (i.width, i.height),
            ElementKind::Shape(s) => (s.width, s.height),
            ElementKind::Qrcode(q) => (q.width, q.height),
        }
    }

    /// Set model dimensions. Text ignores `height` (it follows the content).
    pub fn set_size(&mut self, width: f64, height: f64) {
        match &mut self.kind {
            ElementKind::Text(t) => t.width = width,
            ElementKind::Image(i) => {
                i.width = width;
                i.height = height;
            }
            ElementKind::Shape(s) => {
                s.width = width;
                s.height = height;
            }
            ElementKind::Qrcode(q) => {
                q.width = width;
                q.height = height;
            }
        }
    }

    /// Effective opacity, clamped regardless of what was stored.
    #[must_use]
    pub fn effective_opacity(&self) -> f64 {
        clamp_opacity(self.opacity)
    }

    /// Font family of a text element.
    #[must_use]
    pub fn font_family(&self) -> Option<&str> {
        match &self.kind {
            ElementKind::Text(t) => Some(&t.font_family),
            _ => None,
        }
    }

    /// Apply a sparse update. Returns `false` if the patch could not be applied.
    ///
    /// Common fields are written directly; `props` keys are merged into the
    /// element's wire form (a `null` value removes the key so it falls back to
    /// the type default) and the result is decoded again, so a patch can never
    /// change `id` or `type`. Non-finite numbers and non-positive sizes reject
    /// the whole patch; positive sizes are raised to the type's floor.
    pub fn apply_patch(&mut self, patch: &ElementPatch) -> bool {
        let finite = [patch.x, patch.y, patch.rotation, patch.opacity].into_iter().flatten().all(f64::is_finite);
        let sized = [patch.width, patch.height].into_iter().flatten().all(|v| v.is_finite() && v > 0.0);
        if !finite || !sized {
            return false;
        }
        if let Some(ref props) = patch.props {
            let Some(incoming) = props.as_object() else {
                return false;
            };
            let Ok(Value::Object(mut wire)) = serde_json::to_value(&*self) else {
                return false;
            };
            for (k, v) in incoming {
                if k == "id" || k == "type" {
                    continue;
                }
                if v.is_null() {
                    wire.remove(k);
                } else {
                    wire.insert(k.clone(), v.clone());
                }
            }
            match decode_element(&Value::Object(wire)) {
                Ok(decoded) => {
                    self.shadow = decoded.shadow;
                    self.kind = decoded.kind;
                    self.x = decoded.x;
                    self.y = decoded.y;
                    self.rotation = decoded.rotation;
                    self.opacity = decoded.opacity;
                    self.draggable = decoded.draggable;
                }
                Err(_) => return false,
            }
        }

        if let Some(x) = patch.x {
            self.x = x;
        }
        if let Some(y) = patch.y {
            self.y = y;
        }
        if let Some(r) = patch.rotation {
            self.rotation = r;
        }
        if let Some(o) = patch.opacity {
            self.opacity = clamp_opacity(o);
        }
        if let Some(d) = patch.draggable {
            self.draggable = d;
        }
        if patch.width.is_some() || patch.height.is_some() {
            let (w, h) = self.size();
            let floor = if matches!(self.kind, ElementKind::Text(_)) { MIN_TEXT_WIDTH } else { MIN_ELEMENT_SIZE };
            self.set_size(patch.width.unwrap_or(w).max(floor), patch.height.unwrap_or(h).max(MIN_ELEMENT_SIZE));
        }
        true
    }
}

/// Sparse update for an element. Only present fields are applied.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ElementPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotation: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub draggable: Option<bool>,
    /// Wire-named keys to merge or remove (null values delete keys).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub props: Option<Value>,
}

impl ElementPatch {
    /// Patch that only merges wire-named properties.
    #[must_use]
    pub fn props(props: Value) -> Self {
        Self { props: Some(props), ..Default::default() }
    }

    /// The font family this patch sets, if any.
    #[must_use]
    pub fn font_family(&self) -> Option<&str> {
        self.props.as_ref()?.get("fontFamily")?.as_str()
    }
}

// =============================================================
// Lenient decoding
// =============================================================

/// Why a JSON value could not be turned into an element.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("element is not a JSON object")]
    NotAnObject,
    #[error("element has no `type` discriminant")]
    MissingType,
    #[error("unknown element type `{0}`")]
    UnknownType(String),
}

/// Typed, defaulting access to the fields of one element's JSON object.
struct Fields<'a> {
    map: &'a Map<String, Value>,
}

impl<'a> Fields<'a> {
    fn new(map: &'a Map<String, Value>) -> Self {
        Self { map }
    }

    /// Finite number at `key`, or `default`.
    fn num(&self, key: &str, default: f64) -> f64 {
        self.map
            .get(key)
            .and_then(Value::as_f64)
            .filter(|v| v.is_finite())
            .unwrap_or(default)
    }

    /// Strictly positive finite number at `key`, or `default`.
    fn size(&self, key: &str, default: f64) -> f64 {
        let v = self.num(key, default);
        if v > 0.0 { v } else { default }
    }

    fn string(&self, key: &str, default: &str) -> String {
        self.opt_string(key).unwrap_or_else(|| default.to_string())
    }

    fn opt_string(&self, key: &str) -> Option<String> {
        self.map.get(key).and_then(Value::as_str).map(str::to_string)
    }

    fn flag(&self, key: &str, default: bool) -> bool {
        self.map.get(key).and_then(Value::as_bool).unwrap_or(default)
    }

    fn keyword<T: Copy>(&self, key: &str, table: &[(&str, T)], default: T) -> T {
        let Some(raw) = self.map.get(key).and_then(Value::as_str) else {
            return default;
        };
        table
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(raw.trim()))
            .map_or(default, |(_, v)| *v)
    }

    /// Element ids may arrive as strings or numbers.
    fn id(&self) -> Option<ElementId> {
        match self.map.get("id")? {
            Value::String(s) if !s.is_empty() => Some(ElementId::new(s.clone())),
            Value::Number(n) => Some(ElementId::new(n.to_string())),
            _ => None,
        }
    }

    fn border(&self, defaults: &Border) -> Border {
        Border {
            border_color: self.string("borderColor", &defaults.border_color),
            border_width: self.num("borderWidth", defaults.border_width).max(0.0),
            border_radius: self.num("borderRadius", defaults.border_radius).max(0.0),
        }
    }

    fn shadow(&self) -> Shadow {
        let d = Shadow::default();
        Shadow {
            color: self.string("shadowColor", &d.color),
            blur: self.num("shadowBlur", d.blur).max(0.0),
            offset_x: self.num("shadowOffsetX", d.offset_x),
            offset_y: self.num("shadowOffsetY", d.offset_y),
            opacity: clamp_opacity(self.num("shadowOpacity", d.opacity)),
        }
    }
}

/// Decode one element from design-document JSON.
///
/// Missing or ill-typed optional fields fall back to the type's defaults. Only
/// a missing or unrecognized `type` is an error. A missing id is replaced by a
/// freshly generated one.
///
/// # Errors
///
/// Returns [`DecodeError`] when the value is not an object or its `type` is
/// missing or unknown.
pub fn decode_element(value: &Value) -> Result<Element, DecodeError> {
    let map = value.as_object().ok_or(DecodeError::NotAnObject)?;
    let f = Fields::new(map);

    let raw_type = map
        .get("type")
        .and_then(Value::as_str)
        .ok_or(DecodeError::MissingType)?;
    let ty = ElementType::parse(raw_type).ok_or_else(|| DecodeError::UnknownType(raw_type.to_string()))?;

    let kind = match ty {
        ElementType::Text => ElementKind::Text(decode_text(&f)),
        ElementType::Image => {
            let d = ImageProps::default();
            ElementKind::Image(ImageProps {
                src: f.string("src", &d.src),
                width: f.size("width", d.width),
                height: f.size("height", d.height),
                lock_ratio: f.flag("lockRatio", d.lock_ratio),
                border: f.border(&d.border),
            })
        }
        ElementType::Shape => {
            let shape_type = f.keyword(
                "shapeType",
                &[("rectangle", ShapeType::Rectangle), ("circle", ShapeType::Circle), ("triangle", ShapeType::Triangle)],
                ShapeType::Rectangle,
            );
            let d = ShapeProps::new(shape_type);
            ElementKind::Shape(ShapeProps {
                shape_type,
                width: f.size("width", d.width),
                height: f.size("height", d.height),
                fill: f.string("fill", &d.fill),
                border: f.border(&d.border),
            })
        }
        ElementType::Qrcode => {
            let d = QrProps::default();
            ElementKind::Qrcode(QrProps {
                data: f.string("data", &d.data),
                width: f.size("width", d.width),
                height: f.size("height", d.height),
                foreground_color: f.string("foregroundColor", &d.foreground_color),
                background_color: f.string("backgroundColor", &d.background_color),
                transparent_background: f.flag("transparentBackground", d.transparent_background),
                border: f.border(&d.border),
            })
        }
    };

    Ok(Element {
        id: f.id().unwrap_or_else(|| ElementId::generate(ty)),
        x: f.num("x", 0.0),
        y: f.num("y", 0.0),
        rotation: f.num("rotation", 0.0),
        opacity: clamp_opacity(f.num("opacity", 1.0)),
        draggable: f.flag("draggable", true),
        shadow: f.shadow(),
        kind,
    })
}

fn decode_text(f: &Fields<'_>) -> TextProps {
    let d = TextProps::default();
    TextProps {
        text: f.string("text", &d.text),
        font_size: f.size("fontSize", d.font_size),
        font_family: f.string("fontFamily", &d.font_family),
        fill: f.string("fill", &d.fill),
        font_weight: f.keyword(
            "fontWeight",
            &[("normal", FontWeight::Normal), ("bold", FontWeight::Bold), ("700", FontWeight::Bold)],
            d.font_weight,
        ),
        font_style: f.keyword(
            "fontStyle",
            &[("normal", FontStyle::Normal), ("italic", FontStyle::Italic)],
            d.font_style,
        ),
        text_decoration: f.string("textDecoration", &d.text_decoration),
        letter_spacing: f.num("letterSpacing", d.letter_spacing),
        align: f.keyword(
            "align",
            &[("left", TextAlign::Left), ("center", TextAlign::Center), ("right", TextAlign::Right)],
            d.align,
        ),
        width: f.size("width", d.width),
        line_height: f.size("lineHeight", d.line_height),
        word_wrap: f.flag("wordWrap", d.word_wrap),
        bg_color: f.opt_string("bgColor").filter(|c| !c.is_empty()),
        bg_padding: f.num("bgPadding", d.bg_padding).max(0.0),
        bg_radius: f.num("bgRadius", d.bg_radius).max(0.0),
        is_dynamic: f.flag("isDynamic", d.is_dynamic),
        field_name: f.opt_string("fieldName").filter(|n| !n.is_empty()),
    }
}
