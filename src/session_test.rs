use super::*;
use std::io::Cursor;
use std::sync::Mutex;

use async_trait::async_trait;
use image::{ImageFormat, Rgba, RgbaImage};

use crate::assets::{BaseUrlResolver, UploadedAsset};
use crate::cache::SlotStatus;
use crate::element::{Element, ImageProps, QrProps, TextProps};
use crate::render::DrawOp;

fn png_bytes() -> Vec<u8> {
    let img = RgbaImage::from_pixel(4, 3, Rgba([200, 10, 10, 255]));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png).unwrap();
    buf.into_inner()
}

struct FakeSource {
    calls: Mutex<Vec<String>>,
}

#[async_trait]
impl AssetSource for FakeSource {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, AssetError> {
        self.calls.lock().unwrap().push(url.to_string());
        if url.contains("missing") {
            return Err(AssetError::Status { url: url.to_string(), status: 404 });
        }
        Ok(png_bytes())
    }
}

struct FakeUploader {
    fail: bool,
}

#[async_trait]
impl AssetUploader for FakeUploader {
    async fn upload_asset(&self, filename: &str, _bytes: Vec<u8>) -> Result<UploadedAsset, AssetError> {
        if self.fail {
            return Err(AssetError::Upload("quota exceeded".into()));
        }
        Ok(UploadedAsset { url: format!("https://assets.test/uploads/{filename}") })
    }
}

struct FakeFonts;

#[async_trait]
impl FontLoader for FakeFonts {
    async fn load(&self, family: &str) -> FontStatus {
        if family == "Nope" { FontStatus::Inactive } else { FontStatus::Active }
    }
}

struct Harness {
    session: EditorSession,
    source: Arc<FakeSource>,
}

fn harness(fail_uploads: bool) -> Harness {
    let source = Arc::new(FakeSource { calls: Mutex::new(Vec::new()) });
    let deps = SessionDeps {
        urls: Arc::new(BaseUrlResolver::new("https://assets.test")),
        source: source.clone(),
        uploader: Arc::new(FakeUploader { fail: fail_uploads }),
        fonts: Arc::new(FakeFonts),
        font_timeout: Duration::from_secs(3),
    };
    Harness { session: EditorSession::new(EngineCore::new(842.0, 595.0), deps), source }
}

fn image_element(src: &str) -> Element {
    Element::new(ElementKind::Image(ImageProps { src: src.into(), ..ImageProps::default() }), 10.0, 10.0)
}

fn insert(session: &mut EditorSession, element: Element) -> ElementId {
    let id = element.id.clone();
    session.apply(|e| e.insert_element(element));
    id
}

fn key(id: &ElementId) -> CacheKey {
    CacheKey::Element(id.clone())
}

fn image_src(session: &EditorSession, id: &ElementId) -> String {
    match &session.engine().element(id).unwrap().kind {
        ElementKind::Image(i) => i.src.clone(),
        other => panic!("not an image: {other:?}"),
    }
}

// =============================================================
// Image slots
// =============================================================

#[tokio::test]
async fn image_loads_through_resolved_url_and_draws() {
    let mut h = harness(false);
    let id = insert(&mut h.session, image_element("/uploads/logo.png"));
    assert_eq!(h.session.cache().status(&key(&id)), Some(SlotStatus::Pending));
    assert!(matches!(h.session.scene().ops[1], DrawOp::Placeholder { .. }));

    assert_eq!(h.session.next_event().await, Some(SessionEvent::ImageReady(key(&id))));
    assert_eq!(*h.source.calls.lock().unwrap(), vec!["https://assets.test/uploads/logo.png".to_string()]);
    assert!(matches!(h.session.scene().ops[1], DrawOp::Image { .. }));
    // Model keeps the stored path.
    assert_eq!(image_src(&h.session, &id), "/uploads/logo.png");
}

#[tokio::test]
async fn poll_events_applies_queued_completions_without_waiting() {
    let mut h = harness(false);
    assert!(h.session.poll_events().is_empty());

    let id = insert(&mut h.session, image_element("/uploads/logo.png"));
    assert!(h.session.poll_events().is_empty());

    let mut events = Vec::new();
    for _ in 0..200 {
        tokio::time::sleep(Duration::from_millis(5)).await;
        events.extend(h.session.poll_events());
        if !events.is_empty() {
            break;
        }
    }
    assert_eq!(events, vec![SessionEvent::ImageReady(key(&id))]);
    assert_eq!(h.session.cache().status(&key(&id)), Some(SlotStatus::Ready));
    assert!(!h.session.has_pending());
}

#[tokio::test]
async fn failed_fetch_keeps_placeholder() {
    let mut h = harness(false);
    let id = insert(&mut h.session, image_element("https://cdn.test/missing.png"));
    assert_eq!(h.session.next_event().await, Some(SessionEvent::ImageFailed(key(&id))));
    assert_eq!(h.session.cache().status(&key(&id)), Some(SlotStatus::Failed));
    assert!(matches!(h.session.scene().ops[1], DrawOp::Placeholder { .. }));
}

#[tokio::test]
async fn empty_src_has_no_slot() {
    let mut h = harness(false);
    insert(&mut h.session, image_element(""));
    assert!(h.session.cache().is_empty());
    assert!(!h.session.has_pending());
    assert_eq!(h.session.next_event().await, None);
}

#[tokio::test]
async fn deleting_element_releases_slot() {
    let mut h = harness(false);
    let id = insert(&mut h.session, image_element("/a.png"));
    h.session.next_event().await;
    h.session.apply(|e| e.delete_element(&id));
    assert_eq!(h.session.cache().status(&key(&id)), None);
}

#[tokio::test]
async fn deleting_before_load_drops_the_result() {
    let mut h = harness(false);
    let id = insert(&mut h.session, image_element("/a.png"));
    h.session.apply(|e| e.delete_element(&id));
    assert!(!h.session.has_pending());
    assert_eq!(h.session.next_event().await, None);
    assert!(h.session.cache().is_empty());
}

#[tokio::test]
async fn page_switch_swaps_slots() {
    let mut h = harness(false);
    let id = insert(&mut h.session, image_element("/a.png"));
    h.session.next_event().await;
    h.session.apply(EngineCore::add_page);
    assert_eq!(h.session.cache().status(&key(&id)), None);
    h.session.apply(|e| e.goto(0));
    assert_eq!(h.session.cache().status(&key(&id)), Some(SlotStatus::Pending));
}

#[tokio::test]
async fn background_loads_into_its_slot() {
    let mut h = harness(false);
    h.session.apply(|e| e.set_background(Some("https://cdn.test/bg.png".into())));
    assert_eq!(h.session.next_event().await, Some(SessionEvent::ImageReady(CacheKey::Background)));
    assert!(matches!(h.session.scene().ops[0], DrawOp::Background { .. }));
}

// =============================================================
// QR previews
// =============================================================

#[tokio::test]
async fn qr_transparency_toggle_regenerates_bitmap() {
    let mut h = harness(false);
    let qr = Element::new(ElementKind::Qrcode(QrProps::default()), 100.0, 100.0);
    let id = insert(&mut h.session, qr);
    assert_eq!(h.session.next_event().await, Some(SessionEvent::ImageReady(key(&id))));
    let opaque = h.session.cache().bitmap(&key(&id)).unwrap().image().get_pixel(0, 0)[3];
    assert_eq!(opaque, 255);

    h.session.apply(|e| e.apply_patch(&id, &ElementPatch::props(json!({ "transparentBackground": true }))));
    assert_eq!(h.session.cache().status(&key(&id)), Some(SlotStatus::Pending));
    assert_eq!(h.session.next_event().await, Some(SessionEvent::ImageReady(key(&id))));
    let clear = h.session.cache().bitmap(&key(&id)).unwrap().image().get_pixel(0, 0)[3];
    assert_eq!(clear, 0);
    assert!(h.source.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn moving_qr_does_not_regenerate() {
    let mut h = harness(false);
    let id = insert(&mut h.session, Element::new(ElementKind::Qrcode(QrProps::default()), 0.0, 0.0));
    h.session.next_event().await;
    let patch = ElementPatch { x: Some(50.0), ..ElementPatch::default() };
    h.session.apply(|e| e.apply_patch(&id, &patch));
    assert_eq!(h.session.cache().status(&key(&id)), Some(SlotStatus::Ready));
    assert!(!h.session.has_pending());
}

// =============================================================
// Fonts
// =============================================================

#[tokio::test]
async fn custom_font_is_loaded_once() {
    let mut h = harness(false);
    let text = Element::new(ElementKind::Text(TextProps::default()), 0.0, 0.0);
    let id = insert(&mut h.session, text);
    assert!(!h.session.has_pending());

    let patch = ElementPatch::props(json!({ "fontFamily": "Great Vibes" }));
    h.session.apply(|e| e.apply_patch(&id, &patch));
    assert_eq!(
        h.session.next_event().await,
        Some(SessionEvent::FontSettled { family: "Great Vibes".into(), status: FontStatus::Active })
    );
    assert!(h.session.loaded_fonts().contains("Great Vibes"));

    h.session.apply(|e| e.apply_patch(&id, &patch));
    assert!(!h.session.has_pending());
}

#[tokio::test]
async fn inactive_font_still_settles() {
    let mut h = harness(false);
    let text = Element::new(ElementKind::Text(TextProps::default()), 0.0, 0.0);
    let id = insert(&mut h.session, text);
    h.session.apply(|e| e.apply_patch(&id, &ElementPatch::props(json!({ "fontFamily": "Nope" }))));
    assert_eq!(
        h.session.next_event().await,
        Some(SessionEvent::FontSettled { family: "Nope".into(), status: FontStatus::Inactive })
    );
}

// =============================================================
// Local previews and uploads
// =============================================================

#[tokio::test]
async fn local_preview_draws_and_replaces_previous() {
    let mut h = harness(false);
    let id = insert(&mut h.session, image_element(""));
    h.session.preview_local_image(&id, png_bytes()).unwrap();
    let first = image_src(&h.session, &id);
    assert!(LocalUrls::is_local(&first));
    assert_eq!(h.session.next_event().await, Some(SessionEvent::ImageReady(key(&id))));
    assert!(h.source.calls.lock().unwrap().is_empty());

    h.session.preview_local_image(&id, png_bytes()).unwrap();
    assert_eq!(h.session.local.len(), 1);
    assert!(h.session.local.get(&first).is_none());
}

#[tokio::test]
async fn upload_points_element_at_stored_asset() {
    let mut h = harness(false);
    let id = insert(&mut h.session, image_element(""));
    h.session.preview_local_image(&id, png_bytes()).unwrap();

    let actions = h.session.upload_image(&id, "seal.png", png_bytes()).await.unwrap();
    assert!(actions.contains(&Action::ElementUpdated(id.clone())));
    assert_eq!(image_src(&h.session, &id), "https://assets.test/uploads/seal.png");
    assert!(h.session.local.is_empty());
}

#[tokio::test]
async fn upload_failure_leaves_model_unchanged() {
    let mut h = harness(true);
    let id = insert(&mut h.session, image_element("/old.png"));
    let err = h.session.upload_image(&id, "new.png", png_bytes()).await.unwrap_err();
    assert!(matches!(err, SessionError::Asset(AssetError::Upload(_))));
    assert_eq!(image_src(&h.session, &id), "/old.png");
}

#[tokio::test]
async fn upload_to_non_image_is_rejected() {
    let mut h = harness(false);
    let id = insert(&mut h.session, Element::new(ElementKind::Text(TextProps::default()), 0.0, 0.0));
    let err = h.session.upload_image(&id, "x.png", png_bytes()).await.unwrap_err();
    assert!(matches!(err, SessionError::ElementNotFound(_)));
}

#[tokio::test]
async fn background_upload_sets_page_background() {
    let mut h = harness(false);
    h.session.upload_background("bg.png", png_bytes()).await.unwrap();
    assert_eq!(
        h.session.engine().active_page().background.as_deref(),
        Some("https://assets.test/uploads/bg.png")
    );
}

// =============================================================
// Documents
// =============================================================

#[tokio::test]
async fn load_document_replaces_content() {
    let mut h = harness(false);
    insert(&mut h.session, image_element("/a.png"));
    let doc = json!({
        "name": "Diploma",
        "pages": [
            { "width": 600, "height": 400, "elements": [{ "type": "video" }, { "type": "shape", "id": "s" }] },
            { "elements": [] },
        ],
    });
    let warnings = h.session.load_document(&doc).unwrap();
    assert_eq!(warnings.len(), 1);
    assert_eq!(h.session.name(), "Diploma");
    assert_eq!(h.session.engine().pages().len(), 2);
    assert!(h.session.cache().is_empty());

    let saved = h.session.document().unwrap();
    assert_eq!(saved["name"], "Diploma");
    assert_eq!(saved["pages"].as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn rejected_document_keeps_current_content() {
    let mut h = harness(false);
    let id = insert(&mut h.session, image_element("/a.png"));
    assert!(h.session.load_document(&json!({ "name": "x" })).is_err());
    assert!(h.session.engine().element(&id).is_some());
}

// =============================================================
// Teardown
// =============================================================

#[tokio::test]
async fn close_aborts_revokes_and_clears() {
    let mut h = harness(false);
    let id = insert(&mut h.session, image_element(""));
    h.session.preview_local_image(&id, png_bytes()).unwrap();
    let qr = insert(&mut h.session, Element::new(ElementKind::Qrcode(QrProps::default()), 0.0, 0.0));
    assert!(h.session.has_pending());

    h.session.close();
    assert!(h.session.is_closed());
    assert!(!h.session.has_pending());
    assert!(h.session.local.is_empty());
    assert!(h.session.cache().is_empty());
    assert!(h.session.engine().selection().is_empty());
    assert!(h.session.engine().nodes().is_empty());
    assert_eq!(h.session.next_event().await, None);
    assert_eq!(h.session.cache().status(&key(&qr)), None);

    assert!(h.session.key_down(&Key::new("Delete"), Modifiers::default()).is_empty());
    assert!(matches!(h.session.preview_local_image(&id, png_bytes()), Err(SessionError::Closed)));
    assert!(matches!(h.session.upload_image(&id, "x.png", png_bytes()).await, Err(SessionError::Closed)));
}

#[test]
fn without_runtime_slots_fail_instead_of_hanging() {
    let mut h = harness(false);
    let id = insert(&mut h.session, image_element("/a.png"));
    assert_eq!(h.session.cache().status(&key(&id)), Some(SlotStatus::Failed));
    assert!(!h.session.has_pending());
}
