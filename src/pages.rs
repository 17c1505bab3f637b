//! Page store: the ordered pages of a template and the only mutation path into them.
//!
//! Every change to a page's element list goes through [`PageStore`], which
//! enforces the template invariants: at least one page always exists, element
//! ids are unique within a page, and an id that has been deleted is never
//! handed out again. Callers get shared references to pages; there is no
//! `&mut Page` escape hatch.

#[cfg(test)]
#[path = "pages_test.rs"]
mod pages_test;

use std::collections::HashSet;

use serde::Serialize;
use tracing::{debug, warn};

use crate::consts::{DEFAULT_PAGE_HEIGHT, DEFAULT_PAGE_WIDTH};
use crate::element::{Element, ElementId};

/// A fixed-size canvas holding an ordered element list and an optional background.
///
/// Z-order equals array order: later elements draw on top.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page {
    pub width: f64,
    pub height: f64,
    pub elements: Vec<Element>,
    pub background: Option<String>,
}

impl Default for Page {
    fn default() -> Self {
        Self::blank(DEFAULT_PAGE_WIDTH, DEFAULT_PAGE_HEIGHT)
    }
}

impl Page {
    /// An empty page of the given size with no background.
    #[must_use]
    pub fn blank(width: f64, height: f64) -> Self {
        Self { width, height, elements: Vec::new(), background: None }
    }

    #[must_use]
    pub fn element(&self, id: &ElementId) -> Option<&Element> {
        self.elements.iter().find(|e| &e.id == id)
    }

    #[must_use]
    pub fn contains(&self, id: &ElementId) -> bool {
        self.elements.iter().any(|e| &e.id == id)
    }

    fn position(&self, id: &ElementId) -> Option<usize> {
        self.elements.iter().position(|e| &e.id == id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PageError {
    #[error("cannot delete the last remaining page")]
    LastPage,
    #[error("page index {index} out of range ({len} pages)")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("element not found: {0}")]
    ElementNotFound(ElementId),
    #[error("duplicate element id: {0}")]
    DuplicateId(ElementId),
    #[error("element id was already used and deleted: {0}")]
    RetiredId(ElementId),
}

/// Direction for a z-order change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZMove {
    Forward,
    Backward,
    ToFront,
    ToBack,
}

/// Ordered pages plus the active page cursor.
#[derive(Debug, Clone)]
pub struct PageStore {
    pages: Vec<Page>,
    active: usize,
    retired: HashSet<ElementId>,
}

impl Default for PageStore {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_WIDTH, DEFAULT_PAGE_HEIGHT)
    }
}

impl PageStore {
    /// A store holding one blank page of the given size.
    #[must_use]
    pub fn new(width: f64, height: f64) -> Self {
        Self { pages: vec![Page::blank(width, height)], active: 0, retired: HashSet::new() }
    }

    /// Build a store from loaded pages. An empty list becomes one default page,
    /// and duplicate ids within a page are re-issued.
    #[must_use]
    pub fn from_pages(mut pages: Vec<Page>) -> Self {
        if pages.is_empty() {
            warn!("template has no pages; starting with a blank page");
            pages.push(Page::default());
        }
        for (index, page) in pages.iter_mut().enumerate() {
            dedupe_ids(index, page);
        }
        Self { pages, active: 0, retired: HashSet::new() }
    }

    // --- Queries ---

    #[must_use]
    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    /// Always `false`; a store never holds zero pages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    #[must_use]
    pub fn active_index(&self) -> usize {
        self.active
    }

    #[must_use]
    pub fn active_page(&self) -> &Page {
        &self.pages[self.active]
    }

    #[must_use]
    pub fn page(&self, index: usize) -> Option<&Page> {
        self.pages.get(index)
    }

    /// Look up an element on the active page.
    #[must_use]
    pub fn element(&self, id: &ElementId) -> Option<&Element> {
        self.active_page().element(id)
    }

    #[must_use]
    pub fn can_go_prev(&self) -> bool {
        self.active > 0
    }

    #[must_use]
    pub fn can_go_next(&self) -> bool {
        self.active + 1 < self.pages.len()
    }

    // --- Page lifecycle ---

    /// Append an empty page with the active page's size and make it active.
    /// Returns the new page's index.
    pub fn add_page(&mut self) -> usize {
        let current = self.active_page();
        let page = Page::blank(current.width, current.height);
        self.pages.push(page);
        self.active = self.pages.len() - 1;
        debug!(page = self.active, "page added");
        self.active
    }

    /// Remove a page. The last remaining page can never be removed.
    ///
    /// # Errors
    ///
    /// `LastPage` when only one page exists; `IndexOutOfRange` for a bad index.
    pub fn delete_page(&mut self, index: usize) -> Result<(), PageError> {
        if index >= self.pages.len() {
            return Err(PageError::IndexOutOfRange { index, len: self.pages.len() });
        }
        if self.pages.len() == 1 {
            warn!(page = index, "rejected deletion of the last page");
            return Err(PageError::LastPage);
        }
        let removed = self.pages.remove(index);
        self.retired.extend(removed.elements.into_iter().map(|e| e.id));
        if self.active > index || self.active >= self.pages.len() {
            self.active = self.active.saturating_sub(1).min(self.pages.len() - 1);
        }
        debug!(page = index, active = self.active, "page deleted");
        Ok(())
    }

    /// Make `index` the active page. Returns whether the active page changed.
    ///
    /// # Errors
    ///
    /// `IndexOutOfRange` for a bad index.
    pub fn goto(&mut self, index: usize) -> Result<bool, PageError> {
        if index >= self.pages.len() {
            return Err(PageError::IndexOutOfRange { index, len: self.pages.len() });
        }
        let changed = index != self.active;
        self.active = index;
        Ok(changed)
    }

    /// Step back one page, clamping at the first. Returns whether it moved.
    pub fn goto_prev(&mut self) -> bool {
        if !self.can_go_prev() {
            return false;
        }
        self.active -= 1;
        true
    }

    /// Step forward one page, clamping at the last. Returns whether it moved.
    pub fn goto_next(&mut self) -> bool {
        if !self.can_go_next() {
            return false;
        }
        self.active += 1;
        true
    }

    /// Set or clear the active page's background.
    pub fn set_background(&mut self, background: Option<String>) {
        let page = &mut self.pages[self.active];
        page.background = background.filter(|b| !b.is_empty());
    }

    /// Resize the active page's canvas. Non-positive sizes are ignored.
    pub fn set_canvas_size(&mut self, width: f64, height: f64) -> bool {
        if !(width > 0.0 && height > 0.0) {
            return false;
        }
        let page = &mut self.pages[self.active];
        page.width = width;
        page.height = height;
        true
    }

    // --- Element mutation (active page) ---

    /// Append an element on top of the active page.
    ///
    /// # Errors
    ///
    /// `DuplicateId` if the id exists on the page; `RetiredId` if it was deleted before.
    pub fn insert_element(&mut self, element: Element) -> Result<ElementId, PageError> {
        if self.retired.contains(&element.id) {
            return Err(PageError::RetiredId(element.id));
        }
        let page = &mut self.pages[self.active];
        if page.contains(&element.id) {
            return Err(PageError::DuplicateId(element.id));
        }
        let id = element.id.clone();
        page.elements.push(element);
        Ok(id)
    }

    /// Mutate an element in place. The id cannot be changed by `f`.
    ///
    /// # Errors
    ///
    /// `ElementNotFound` if no such element is on the active page.
    pub fn update_element<F>(&mut self, id: &ElementId, f: F) -> Result<(), PageError>
    where
        F: FnOnce(&mut Element),
    {
        let page = &mut self.pages[self.active];
        let index = page.position(id).ok_or_else(|| PageError::ElementNotFound(id.clone()))?;
        let element = &mut page.elements[index];
        f(element);
        element.id = id.clone();
        Ok(())
    }

    /// Replace an element wholesale, keeping its z-position.
    ///
    /// # Errors
    ///
    /// `ElementNotFound` if no element with `element.id` is on the active page.
    pub fn replace_element(&mut self, element: Element) -> Result<(), PageError> {
        let page = &mut self.pages[self.active];
        let index = page
            .position(&element.id)
            .ok_or_else(|| PageError::ElementNotFound(element.id.clone()))?;
        page.elements[index] = element;
        Ok(())
    }

    /// Remove an element from the active page and retire its id.
    ///
    /// # Errors
    ///
    /// `ElementNotFound` if no such element is on the active page.
    pub fn remove_element(&mut self, id: &ElementId) -> Result<Element, PageError> {
        let page = &mut self.pages[self.active];
        let index = page.position(id).ok_or_else(|| PageError::ElementNotFound(id.clone()))?;
        let removed = page.elements.remove(index);
        self.retired.insert(removed.id.clone());
        Ok(removed)
    }

    /// Change an element's stacking position. Returns whether the order changed.
    ///
    /// # Errors
    ///
    /// `ElementNotFound` if no such element is on the active page.
    pub fn move_element(&mut self, id: &ElementId, to: ZMove) -> Result<bool, PageError> {
        let page = &mut self.pages[self.active];
        let from = page.position(id).ok_or_else(|| PageError::ElementNotFound(id.clone()))?;
        let last = page.elements.len() - 1;
        let target = match to {
            ZMove::Forward => (from + 1).min(last),
            ZMove::Backward => from.saturating_sub(1),
            ZMove::ToFront => last,
            ZMove::ToBack => 0,
        };
        if target == from {
            return Ok(false);
        }
        let element = page.elements.remove(from);
        page.elements.insert(target, element);
        Ok(true)
    }

    /// Whether an id has been deleted from this template during the session.
    #[must_use]
    pub fn is_retired(&self, id: &ElementId) -> bool {
        self.retired.contains(id)
    }
}

fn dedupe_ids(index: usize, page: &mut Page) {
    let mut seen = HashSet::new();
    for element in &mut page.elements {
        if !seen.insert(element.id.clone()) {
            let fresh = ElementId::generate(element.element_type());
            warn!(page = index, old = %element.id, new = %fresh, "duplicate element id re-issued");
            element.id = fresh.clone();
            seen.insert(fresh);
        }
    }
}
