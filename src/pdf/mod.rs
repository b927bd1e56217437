// src/pdf/mod.rs
//! Thin PDF layer over `lopdf`: positioned page text, internal link
//! annotations, and page-range surgery (extract / merge).

pub mod links;
pub mod split;
pub mod text;

#[cfg(test)]
pub(crate) mod testing;

use crate::utils::error::PdfError;
use lopdf::{Document, Object, ObjectId};
use std::collections::HashMap;

pub use links::PageLink;
pub use split::{extract_range, merge};
pub use text::PageText;

/// Axis-aligned rectangle in PDF user space (origin bottom-left).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl Rect {
    /// Builds a rect from two arbitrary corners, normalizing the order.
    pub fn from_corners(ax: f64, ay: f64, bx: f64, by: f64) -> Self {
        Self {
            x0: ax.min(bx),
            y0: ay.min(by),
            x1: ax.max(bx),
            y1: ay.max(by),
        }
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.x0 && x <= self.x1 && y >= self.y0 && y <= self.y1
    }
}

/// A loaded source document. Owns the parsed object graph; dropping it
/// releases everything.
pub struct PdfDocument {
    doc: Document,
    page_ids: Vec<ObjectId>,
    page_index_by_id: HashMap<ObjectId, usize>,
}

impl std::fmt::Debug for PdfDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfDocument")
            .field("page_count", &self.page_ids.len())
            .finish()
    }
}

impl PdfDocument {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PdfError> {
        let doc = Document::load_mem(bytes).map_err(|e| PdfError::Load(e.to_string()))?;
        let page_ids: Vec<ObjectId> = doc.get_pages().into_values().collect();
        let page_index_by_id = page_ids
            .iter()
            .enumerate()
            .map(|(index, id)| (*id, index))
            .collect();

        tracing::debug!("Loaded PDF with {} pages", page_ids.len());
        Ok(Self {
            doc,
            page_ids,
            page_index_by_id,
        })
    }

    pub fn page_count(&self) -> usize {
        self.page_ids.len()
    }

    /// Positioned text of the page at `index` (0-based).
    pub fn page_text(&self, index: usize) -> Result<PageText, PdfError> {
        self.page_id(index)?;
        text::decode_page(&self.doc, index as u32 + 1)
    }

    /// Internal navigation links on the page at `index` (0-based).
    /// External URI links are not returned.
    pub fn page_links(&self, index: usize) -> Result<Vec<PageLink>, PdfError> {
        let page_id = self.page_id(index)?;
        links::internal_links(&self.doc, page_id, index, &self.page_index_by_id)
    }

    fn page_id(&self, index: usize) -> Result<ObjectId, PdfError> {
        self.page_ids
            .get(index)
            .copied()
            .ok_or(PdfError::PageOutOfBounds(index))
    }
}

/// Follows a single level of indirection.
pub(crate) fn deref<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Object> {
    match obj {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

pub(crate) fn dict_get<'a>(
    doc: &'a Document,
    dict: &'a lopdf::Dictionary,
    key: &[u8],
) -> Option<&'a Object> {
    dict.get(key).ok().and_then(|obj| deref(doc, obj))
}

pub(crate) fn number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(f) => Some(f64::from(*f)),
        _ => None,
    }
}

/// Looks up `key` on the page, walking `/Parent` links when the page
/// inherits it from the page tree.
pub(crate) fn resolve_inherited<'a>(
    doc: &'a Document,
    page_id: ObjectId,
    key: &[u8],
) -> Option<&'a Object> {
    let mut current = page_id;
    // Page trees are shallow; the bound only guards against cycles.
    for _ in 0..64 {
        let dict = doc.get_object(current).and_then(Object::as_dict).ok()?;
        if let Ok(value) = dict.get(key) {
            return deref(doc, value);
        }
        current = dict.get(b"Parent").and_then(Object::as_reference).ok()?;
    }
    None
}
