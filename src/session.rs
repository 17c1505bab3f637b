//! One editing session: the engine plus everything asynchronous around it.
//!
//! The session owns the [`EngineCore`], the [`ImageCache`], the local preview
//! URLs, and every in-flight image or font task. Handlers run synchronously
//! through [`EditorSession::apply`]; afterwards the session re-syncs cache
//! slots with the active page and spawns whatever loads are missing. Task
//! results come back over one channel and are applied one at a time by
//! [`EditorSession::next_event`], so the cache is only ever written from the
//! session's own thread of control.
//!
//! [`EditorSession::close`] aborts in-flight work, revokes local URLs and
//! drops interaction state. Nothing a task produces after that point can
//! reach the model.

#[cfg(test)]
#[path = "session_test.rs"]
mod session_test;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::assets::{AssetError, AssetSource, AssetUploader, AssetUrls, LocalUrls};
use crate::cache::{self, CacheError, CacheKey, Fetch, ImageCache, QrStyle, ResolveRequest, Resolved, Source};
use crate::camera::Point;
use crate::element::{ElementId, ElementKind, ElementPatch};
use crate::engine::{Action, EngineCore};
use crate::fonts::{self, FontLoader, FontStatus};
use crate::input::{Button, Key, Modifiers};
use crate::render::{Scene, build_scene};
use crate::template::{self, DocumentError, LoadWarning};

/// Completions buffered between tasks and the session.
const COMPLETION_QUEUE_CAPACITY: usize = 64;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session is closed")]
    Closed,
    #[error(transparent)]
    Asset(#[from] AssetError),
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error("element not found: {0}")]
    ElementNotFound(ElementId),
}

/// Something the host should redraw for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    ImageReady(CacheKey),
    /// The slot will render as a placeholder.
    ImageFailed(CacheKey),
    FontSettled { family: String, status: FontStatus },
}

/// External collaborators of a session.
pub struct SessionDeps {
    pub urls: Arc<dyn AssetUrls>,
    pub source: Arc<dyn AssetSource>,
    pub uploader: Arc<dyn AssetUploader>,
    pub fonts: Arc<dyn FontLoader>,
    pub font_timeout: Duration,
}

enum Completion {
    Image(Resolved),
    Font { family: String, status: FontStatus },
}

struct ImageTask {
    generation: u64,
    handle: JoinHandle<()>,
}

pub struct EditorSession {
    name: String,
    engine: EngineCore,
    cache: ImageCache,
    local: LocalUrls,
    deps: SessionDeps,
    image_tasks: HashMap<CacheKey, ImageTask>,
    font_tasks: HashMap<String, JoinHandle<()>>,
    loaded_fonts: HashSet<String>,
    tx: mpsc::Sender<Completion>,
    rx: mpsc::Receiver<Completion>,
    closed: bool,
}

impl EditorSession {
    #[must_use]
    pub fn new(engine: EngineCore, deps: SessionDeps) -> Self {
        let (tx, rx) = mpsc::channel(COMPLETION_QUEUE_CAPACITY);
        let mut session = Self {
            name: String::new(),
            engine,
            cache: ImageCache::new(),
            local: LocalUrls::new(),
            deps,
            image_tasks: HashMap::new(),
            font_tasks: HashMap::new(),
            loaded_fonts: HashSet::new(),
            tx,
            rx,
            closed: false,
        };
        session.sync();
        session
    }

    // --- Queries ---

    #[must_use]
    pub fn engine(&self) -> &EngineCore {
        &self.engine
    }

    #[must_use]
    pub fn cache(&self) -> &ImageCache {
        &self.cache
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Whether any image or font task is still outstanding.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.image_tasks.is_empty() || !self.font_tasks.is_empty()
    }

    /// Families whose load has settled.
    #[must_use]
    pub fn loaded_fonts(&self) -> &HashSet<String> {
        &self.loaded_fonts
    }

    /// Current display list for the active page.
    #[must_use]
    pub fn scene(&self) -> Scene {
        build_scene(self.engine.active_page(), self.engine.nodes(), &self.cache, self.engine.ui())
    }

    // --- Edits ---

    /// Run an engine operation, then load whatever the result needs.
    pub fn apply<F>(&mut self, f: F) -> Vec<Action>
    where
        F: FnOnce(&mut EngineCore) -> Vec<Action>,
    {
        if self.closed {
            debug!("edit ignored on closed session");
            return Vec::new();
        }
        let actions = f(&mut self.engine);
        let mut dirty = false;
        for action in &actions {
            match action {
                Action::FontRequested(family) => self.request_font(family),
                Action::ElementCreated(_)
                | Action::ElementUpdated(_)
                | Action::ElementDeleted(_)
                | Action::PageChanged(_)
                | Action::RenderNeeded => dirty = true,
                Action::SelectionChanged | Action::Rejected(_) | Action::SetCursor(_) => {}
            }
        }
        if dirty {
            self.sync();
        }
        actions
    }

    pub fn pointer_down(&mut self, pt: Point, button: Button, modifiers: Modifiers) -> Vec<Action> {
        self.apply(|e| e.on_pointer_down(pt, button, modifiers))
    }

    pub fn pointer_move(&mut self, pt: Point, modifiers: Modifiers) -> Vec<Action> {
        self.apply(|e| e.on_pointer_move(pt, modifiers))
    }

    pub fn pointer_up(&mut self, pt: Point, button: Button, modifiers: Modifiers) -> Vec<Action> {
        self.apply(|e| e.on_pointer_up(pt, button, modifiers))
    }

    pub fn key_down(&mut self, key: &Key, modifiers: Modifiers) -> Vec<Action> {
        self.apply(|e| e.on_key_down(key, modifiers))
    }

    // --- Cache sync ---

    /// Align cache slots with the active page: ensure one slot per background,
    /// image, and QR element, and release (aborting any load) everything else.
    pub fn sync(&mut self) {
        if self.closed {
            return;
        }
        let wanted = self.wanted_sources();
        let keys: HashSet<&CacheKey> = wanted.iter().map(|(k, _)| k).collect();
        let released = self.cache.retain(|k| keys.contains(k));
        for key in released {
            if let Some(task) = self.image_tasks.remove(&key) {
                task.handle.abort();
            }
            debug!(?key, "cache slot released");
        }
        for (key, source) in wanted {
            if let Some(request) = self.cache.ensure(key, source) {
                self.spawn_resolve(request);
            }
        }
    }

    fn wanted_sources(&self) -> Vec<(CacheKey, Source)> {
        let page = self.engine.active_page();
        let mut wanted = Vec::with_capacity(page.elements.len() + 1);
        if let Some(bg) = &page.background {
            wanted.push((CacheKey::Background, Source::Url(self.deps.urls.asset_path_to_url(bg))));
        }
        for element in &page.elements {
            let key = CacheKey::Element(element.id.clone());
            match &element.kind {
                ElementKind::Image(i) if !i.src.is_empty() => {
                    wanted.push((key, Source::Url(self.deps.urls.asset_path_to_url(&i.src))));
                }
                ElementKind::Qrcode(q) => wanted.push((key, Source::Qr(QrStyle::from_props(q)))),
                ElementKind::Image(_) | ElementKind::Text(_) | ElementKind::Shape(_) => {}
            }
        }
        wanted
    }

    fn spawn_resolve(&mut self, request: ResolveRequest) {
        let fetch = match &request.source {
            Source::Url(url) if LocalUrls::is_local(url) => Fetch::Local(self.local.get(url)),
            Source::Url(_) | Source::Qr(_) => Fetch::Remote(Arc::clone(&self.deps.source)),
        };
        let key = request.key.clone();
        let generation = request.generation;

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(?key, "no async runtime; image slot marked failed");
            self.cache.complete(Resolved {
                key,
                generation,
                result: Err(CacheError::Task("no async runtime".into())),
            });
            return;
        };

        let tx = self.tx.clone();
        let handle = runtime.spawn(async move {
            let resolved = cache::resolve(request, fetch).await;
            if tx.send(Completion::Image(resolved)).await.is_err() {
                debug!("session gone before image resolved");
            }
        });
        if let Some(previous) = self.image_tasks.insert(key, ImageTask { generation, handle }) {
            previous.handle.abort();
        }
    }

    fn request_font(&mut self, family: &str) {
        if fonts::is_builtin(family) || self.loaded_fonts.contains(family) || self.font_tasks.contains_key(family) {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(family, "no async runtime; font load skipped");
            return;
        };
        let loader = Arc::clone(&self.deps.fonts);
        let timeout = self.deps.font_timeout;
        let tx = self.tx.clone();
        let name = family.to_string();
        let handle = runtime.spawn(async move {
            let status = fonts::load_with_timeout(loader.as_ref(), &name, timeout).await;
            if tx.send(Completion::Font { family: name, status }).await.is_err() {
                debug!("session gone before font settled");
            }
        });
        self.font_tasks.insert(family.to_string(), handle);
    }

    // --- Completions ---

    /// Wait for the next completion that changes what is drawn.
    ///
    /// Returns `None` once nothing is outstanding (or the session is closed).
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        while !self.closed && self.has_pending() {
            let completion = self.rx.recv().await?;
            if let Some(event) = self.handle_completion(completion) {
                return Some(event);
            }
        }
        None
    }

    /// Apply every completion already queued, without waiting.
    pub fn poll_events(&mut self) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        while !self.closed {
            let Ok(completion) = self.rx.try_recv() else {
                break;
            };
            events.extend(self.handle_completion(completion));
        }
        events
    }

    fn handle_completion(&mut self, completion: Completion) -> Option<SessionEvent> {
        match completion {
            Completion::Image(resolved) => {
                if self.image_tasks.get(&resolved.key).is_some_and(|t| t.generation == resolved.generation) {
                    self.image_tasks.remove(&resolved.key);
                }
                let key = resolved.key.clone();
                let failed = resolved.result.is_err();
                if !self.cache.complete(resolved) {
                    return None;
                }
                Some(if failed { SessionEvent::ImageFailed(key) } else { SessionEvent::ImageReady(key) })
            }
            Completion::Font { family, status } => {
                self.font_tasks.remove(&family);
                self.loaded_fonts.insert(family.clone());
                Some(SessionEvent::FontSettled { family, status })
            }
        }
    }

    // --- Assets ---

    /// Show a user-picked file in an image element before it is uploaded.
    ///
    /// # Errors
    ///
    /// `Closed` after [`close`](Self::close); `ElementNotFound` for a bad id.
    pub fn preview_local_image(&mut self, id: &ElementId, bytes: Vec<u8>) -> Result<Vec<Action>, SessionError> {
        if self.closed {
            return Err(SessionError::Closed);
        }
        let previous = self.image_src(id)?;
        let url = self.local.create(bytes);
        let actions = self.apply(|e| e.apply_patch(id, &ElementPatch::props(json!({ "src": url }))));
        if actions.iter().any(|a| matches!(a, Action::Rejected(_))) {
            self.local.revoke(&url);
        } else {
            self.revoke_if_local(&previous);
        }
        Ok(actions)
    }

    /// Show a user-picked file as the active page's background before upload.
    ///
    /// # Errors
    ///
    /// `Closed` after [`close`](Self::close).
    pub fn preview_local_background(&mut self, bytes: Vec<u8>) -> Result<Vec<Action>, SessionError> {
        if self.closed {
            return Err(SessionError::Closed);
        }
        let previous = self.engine.active_page().background.clone();
        let url = self.local.create(bytes);
        let actions = self.apply(|e| e.set_background(Some(url)));
        if let Some(previous) = previous {
            self.revoke_if_local(&previous);
        }
        Ok(actions)
    }

    /// Upload a file and point an image element at the stored asset.
    ///
    /// # Errors
    ///
    /// Upload failures are returned unchanged and leave the model untouched.
    pub async fn upload_image(&mut self, id: &ElementId, filename: &str, bytes: Vec<u8>) -> Result<Vec<Action>, SessionError> {
        if self.closed {
            return Err(SessionError::Closed);
        }
        self.image_src(id)?;
        let uploader = Arc::clone(&self.deps.uploader);
        let uploaded = uploader.upload_asset(filename, bytes).await.inspect_err(|e| {
            warn!(element_id = %id, error = %e, "image upload failed");
        })?;
        if self.closed {
            return Err(SessionError::Closed);
        }
        // The element may have been edited or deleted while the upload ran.
        let previous = self.image_src(id)?;
        info!(element_id = %id, url = %uploaded.url, "image uploaded");
        let actions = self.apply(|e| e.apply_patch(id, &ElementPatch::props(json!({ "src": uploaded.url }))));
        self.revoke_if_local(&previous);
        Ok(actions)
    }

    /// Upload a file and use it as the active page's background.
    ///
    /// # Errors
    ///
    /// Upload failures are returned unchanged and leave the model untouched.
    pub async fn upload_background(&mut self, filename: &str, bytes: Vec<u8>) -> Result<Vec<Action>, SessionError> {
        if self.closed {
            return Err(SessionError::Closed);
        }
        let uploader = Arc::clone(&self.deps.uploader);
        let uploaded = uploader.upload_asset(filename, bytes).await.inspect_err(|e| {
            warn!(error = %e, "background upload failed");
        })?;
        if self.closed {
            return Err(SessionError::Closed);
        }
        let previous = self.engine.active_page().background.clone();
        info!(url = %uploaded.url, "background uploaded");
        let actions = self.apply(|e| e.set_background(Some(uploaded.url)));
        if let Some(previous) = previous {
            self.revoke_if_local(&previous);
        }
        Ok(actions)
    }

    fn image_src(&self, id: &ElementId) -> Result<String, SessionError> {
        match self.engine.element(id).map(|el| &el.kind) {
            Some(ElementKind::Image(i)) => Ok(i.src.clone()),
            _ => Err(SessionError::ElementNotFound(id.clone())),
        }
    }

    fn revoke_if_local(&mut self, url: &str) {
        if LocalUrls::is_local(url) {
            self.local.revoke(url);
        }
    }

    // --- Documents ---

    /// Replace the session's content with a design document.
    ///
    /// # Errors
    ///
    /// `Closed`, or the [`DocumentError`] that made the document unusable.
    pub fn load_document(&mut self, value: &Value) -> Result<Vec<LoadWarning>, SessionError> {
        if self.closed {
            return Err(SessionError::Closed);
        }
        let loaded = template::from_document(value, self.deps.urls.as_ref())?;
        self.abort_tasks();
        self.cache.clear();
        self.local.revoke_all();
        self.name = loaded.name;
        info!(name = %self.name, pages = loaded.pages.len(), warnings = loaded.warnings.len(), "template loaded");
        self.apply(|e| e.load_pages(loaded.pages));
        Ok(loaded.warnings)
    }

    /// Serialize the current pages.
    ///
    /// # Errors
    ///
    /// See [`template::to_document`].
    pub fn document(&self) -> Result<Value, DocumentError> {
        template::to_document(self.engine.pages().pages(), &self.name)
    }

    // --- Teardown ---

    /// End the session: abort loads, revoke local URLs, drop selection,
    /// gesture, render nodes, and cached bitmaps.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.abort_tasks();
        let revoked = self.local.revoke_all();
        self.engine.reset_interaction();
        self.cache.clear();
        while self.rx.try_recv().is_ok() {}
        info!(revoked, "editor session closed");
    }

    fn abort_tasks(&mut self) {
        for (_, task) in self.image_tasks.drain() {
            task.handle.abort();
        }
        for (_, handle) in self.font_tasks.drain() {
            handle.abort();
        }
    }
}

impl Drop for EditorSession {
    fn drop(&mut self) {
        self.abort_tasks();
    }
}
