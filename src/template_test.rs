#![allow(clippy::float_cmp)]

use serde_json::json;

use super::*;
use crate::assets::BaseUrlResolver;
use crate::element::{
    Element, ElementKind, ElementType, FontWeight, ImageProps, QrProps, ShapeProps, ShapeType, TextProps,
};

fn urls() -> BaseUrlResolver {
    BaseUrlResolver::new("https://assets.test")
}

fn sample_page(background: Option<&str>) -> Page {
    let mut page = Page::blank(842.0, 595.0);
    page.background = background.map(str::to_string);
    let mut text = Element::new(
        ElementKind::Text(TextProps {
            text: "Awarded to {participantName}".into(),
            font_weight: FontWeight::Bold,
            bg_color: Some("#ffee00".into()),
            is_dynamic: true,
            field_name: Some("participantName".into()),
            ..TextProps::default()
        }),
        120.0,
        80.0,
    );
    text.rotation = 15.0;
    text.shadow.blur = 4.0;
    page.elements.push(text);
    page.elements.push(Element::new(
        ElementKind::Image(ImageProps { src: "https://assets.test/uploads/logo.png".into(), ..ImageProps::default() }),
        10.0,
        10.0,
    ));
    page.elements.push(Element::new(ElementKind::Shape(ShapeProps::new(ShapeType::Circle)), 300.0, 200.0));
    page.elements.push(Element::new(
        ElementKind::Qrcode(QrProps { transparent_background: true, ..QrProps::default() }),
        700.0,
        450.0,
    ));
    page
}

// =============================================================
// Save
// =============================================================

#[test]
fn single_page_uses_legacy_shape() {
    let doc = to_document(&[sample_page(None)], "Diploma").unwrap();
    assert_eq!(doc["name"], "Diploma");
    assert_eq!(doc["width"], 842.0);
    assert_eq!(doc["height"], 595.0);
    assert_eq!(doc["design"]["objects"].as_array().map(Vec::len), Some(4));
    assert!(doc["design"]["background"].is_null());
    assert!(doc.get("pages").is_none());
}

#[test]
fn multi_page_uses_pages_shape() {
    let doc = to_document(&[sample_page(None), Page::blank(600.0, 800.0)], "Two").unwrap();
    let pages = doc["pages"].as_array().unwrap();
    assert_eq!(pages.len(), 2);
    assert_eq!(pages[1]["width"], 600.0);
    assert_eq!(pages[1]["elements"], json!([]));
    assert!(doc.get("design").is_none());
}

#[test]
fn elements_serialize_with_wire_names() {
    let doc = to_document(&[sample_page(None)], "x").unwrap();
    let text = &doc["design"]["objects"][0];
    assert_eq!(text["type"], "text");
    assert_eq!(text["fontWeight"], "bold");
    assert_eq!(text["fieldName"], "participantName");
    assert_eq!(text["shadowBlur"], 4.0);
    let qr = &doc["design"]["objects"][3];
    assert_eq!(qr["type"], "qrcode");
    assert_eq!(qr["transparentBackground"], true);
}

#[test]
fn saving_no_pages_is_an_error() {
    assert!(matches!(to_document(&[], "x"), Err(DocumentError::NoPages)));
}

#[test]
fn unsaved_local_previews_block_saving() {
    let page = sample_page(Some("local://bg"));
    let err = to_document(&[page], "x").unwrap_err();
    assert!(matches!(err, DocumentError::LocalAsset { page: 0, ref what } if what == "background"));

    let mut page = sample_page(None);
    page.elements.push(Element::new(
        ElementKind::Image(ImageProps { src: "local://seal".into(), ..ImageProps::default() }),
        0.0,
        0.0,
    ));
    let err = to_document(&[Page::default(), page], "x").unwrap_err();
    assert!(matches!(err, DocumentError::LocalAsset { page: 1, ref what } if what.starts_with("image ")));
    assert!(err.to_string().starts_with("page 2: image "));
}

// =============================================================
// Round trip
// =============================================================

#[test]
fn single_page_round_trip() {
    let pages = vec![sample_page(Some("https://assets.test/uploads/bg.png"))];
    let loaded = from_document(&to_document(&pages, "Diploma").unwrap(), &urls()).unwrap();
    assert_eq!(loaded.name, "Diploma");
    assert_eq!(loaded.pages, pages);
    assert!(loaded.warnings.is_empty());
}

#[test]
fn multi_page_round_trip() {
    let pages = vec![sample_page(None), sample_page(Some("https://cdn.test/bg.jpg")), Page::blank(600.0, 800.0)];
    let loaded = from_document(&to_document(&pages, "Set").unwrap(), &urls()).unwrap();
    assert_eq!(loaded.pages, pages);
}

#[test]
fn round_trip_through_text() {
    let pages = vec![Page::default(), Page::default()];
    let text = serde_json::to_string(&to_document(&pages, "t").unwrap()).unwrap();
    let loaded = from_str(&text, &urls()).unwrap();
    assert_eq!(loaded.pages, pages);
}

// =============================================================
// Lenient load
// =============================================================

#[test]
fn legacy_design_may_be_a_string() {
    let doc = json!({
        "name": "Old",
        "width": 1000,
        "height": 700,
        "design": "{\"objects\":[{\"type\":\"shape\",\"id\":\"s1\"}],\"background\":null}",
    });
    let loaded = from_document(&doc, &urls()).unwrap();
    assert_eq!(loaded.pages.len(), 1);
    assert_eq!(loaded.pages[0].width, 1000.0);
    assert_eq!(loaded.pages[0].elements[0].id.as_str(), "s1");
}

#[test]
fn missing_fields_get_defaults() {
    let doc = json!({ "pages": [{ "elements": [{ "type": "text", "id": 7 }] }] });
    let loaded = from_document(&doc, &urls()).unwrap();
    let page = &loaded.pages[0];
    assert_eq!((page.width, page.height), (DEFAULT_PAGE_WIDTH, DEFAULT_PAGE_HEIGHT));
    assert!(page.background.is_none());
    let el = &page.elements[0];
    assert_eq!(el.id.as_str(), "7");
    assert_eq!(el.element_type(), ElementType::Text);
    assert_eq!(el.font_family(), Some("Arial"));
    assert_eq!(loaded.name, "");
}

#[test]
fn invalid_page_size_falls_back() {
    let doc = json!({ "pages": [{ "width": -5, "height": "tall", "elements": [] }] });
    let page = &from_document(&doc, &urls()).unwrap().pages[0];
    assert_eq!((page.width, page.height), (DEFAULT_PAGE_WIDTH, DEFAULT_PAGE_HEIGHT));
}

#[test]
fn unknown_and_missing_types_are_dropped_with_warnings() {
    let doc = json!({ "pages": [{ "elements": [
        { "type": "video", "id": "v" },
        { "id": "no-type" },
        { "type": "shape", "id": "ok" },
    ] }] });
    let loaded = from_document(&doc, &urls()).unwrap();
    assert_eq!(loaded.pages[0].elements.len(), 1);
    assert_eq!(
        loaded.warnings,
        vec![
            LoadWarning::DroppedElement { page: 0, index: 0, reason: DecodeError::UnknownType("video".into()) },
            LoadWarning::DroppedElement { page: 0, index: 1, reason: DecodeError::MissingType },
        ]
    );
}

#[test]
fn duplicate_ids_are_reissued() {
    let doc = json!({ "pages": [{ "elements": [
        { "type": "shape", "id": "dup" },
        { "type": "shape", "id": "dup" },
    ] }] });
    let loaded = from_document(&doc, &urls()).unwrap();
    let ids: Vec<&str> = loaded.pages[0].elements.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids[0], "dup");
    assert_ne!(ids[1], "dup");
    assert!(matches!(&loaded.warnings[..], [LoadWarning::DuplicateId { page: 0, .. }]));
}

#[test]
fn empty_pages_yield_default_page() {
    let loaded = from_document(&json!({ "name": "n", "pages": [] }), &urls()).unwrap();
    assert_eq!(loaded.pages, vec![Page::default()]);
    assert_eq!(loaded.warnings, vec![LoadWarning::EmptyPages]);
}

#[test]
fn non_object_pages_are_dropped() {
    let loaded = from_document(&json!({ "pages": [42, { "elements": [] }] }), &urls()).unwrap();
    assert_eq!(loaded.pages.len(), 1);
    assert_eq!(loaded.warnings, vec![LoadWarning::DroppedPage { page: 0 }]);
}

#[test]
fn relative_background_is_resolved() {
    let doc = json!({ "pages": [
        { "background": "/uploads/bg.png" },
        { "background": "https://cdn.test/x.png" },
        { "background": "" },
    ] });
    let loaded = from_document(&doc, &urls()).unwrap();
    assert_eq!(loaded.pages[0].background.as_deref(), Some("https://assets.test/uploads/bg.png"));
    assert_eq!(loaded.pages[1].background.as_deref(), Some("https://cdn.test/x.png"));
    assert!(loaded.pages[2].background.is_none());
}

#[test]
fn structural_errors() {
    assert!(matches!(from_document(&json!([1, 2]), &urls()), Err(DocumentError::NotAnObject)));
    assert!(matches!(from_document(&json!({ "name": "x" }), &urls()), Err(DocumentError::MissingContent)));
    assert!(matches!(from_document(&json!({ "pages": {} }), &urls()), Err(DocumentError::Malformed(_))));
    assert!(matches!(from_document(&json!({ "design": 3 }), &urls()), Err(DocumentError::Malformed(_))));
    assert!(matches!(from_str("{nope", &urls()), Err(DocumentError::Json(_))));
}

#[test]
fn warnings_render_for_users() {
    let w = LoadWarning::DroppedElement { page: 1, index: 3, reason: DecodeError::UnknownType("video".into()) };
    assert_eq!(w.to_string(), "page 2: element #3 dropped (unknown element type `video`)");
}
