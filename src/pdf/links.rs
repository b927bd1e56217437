// src/pdf/links.rs
//! Internal navigation links from `/Annots`.

use super::{deref, dict_get, number, Rect};
use crate::utils::error::PdfError;
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::collections::HashMap;

/// Name-tree recursion bound.
const MAX_NAME_TREE_DEPTH: usize = 32;

/// A link that jumps somewhere inside the same document.
#[derive(Debug, Clone, PartialEq)]
pub struct PageLink {
    pub rect: Rect,
    /// 0-based destination page; `None` when the destination could not be
    /// resolved to a page of this document.
    pub target_page: Option<usize>,
}

fn decode_pdf_string(bytes: &[u8]) -> String {
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let units: Vec<u16> = bytes[2..]
            .chunks(2)
            .filter_map(|c| match c {
                [hi, lo] => Some(u16::from_be_bytes([*hi, *lo])),
                _ => None,
            })
            .collect();
        String::from_utf16_lossy(&units)
    } else {
        match std::str::from_utf8(bytes) {
            Ok(s) => s.to_string(),
            Err(_) => bytes.iter().map(|&b| b as char).collect(),
        }
    }
}

fn rect_of(doc: &Document, annot: &Dictionary) -> Option<Rect> {
    let arr = dict_get(doc, annot, b"Rect")?.as_array().ok()?;
    if arr.len() != 4 {
        return None;
    }
    let coords: Vec<f64> = arr
        .iter()
        .filter_map(|obj| deref(doc, obj).and_then(number))
        .collect();
    match coords.as_slice() {
        [x0, y0, x1, y1] => Some(Rect::from_corners(*x0, *y0, *x1, *y1)),
        _ => None,
    }
}

struct DestResolver<'a> {
    doc: &'a Document,
    page_index_by_id: &'a HashMap<ObjectId, usize>,
    page_count: usize,
}

impl<'a> DestResolver<'a> {
    /// Explicit array `[page /Fit ...]`, a named destination (string or
    /// name), or a `<< /D ... >>` wrapper.
    fn resolve(&self, dest: &Object, depth: usize) -> Option<usize> {
        if depth > MAX_NAME_TREE_DEPTH {
            return None;
        }
        match deref(self.doc, dest)? {
            Object::Array(arr) => match arr.first()? {
                Object::Reference(page_ref) => self.page_index_by_id.get(page_ref).copied(),
                // Integer page numbers show up in GoTo dests written by some tools.
                Object::Integer(n) if *n >= 0 && (*n as usize) < self.page_count => {
                    Some(*n as usize)
                }
                _ => None,
            },
            Object::Dictionary(dict) => self.resolve(dict.get(b"D").ok()?, depth + 1),
            Object::String(bytes, _) => self.resolve_named(&decode_pdf_string(bytes), depth),
            Object::Name(name) => self.resolve_named(&String::from_utf8_lossy(name), depth),
            _ => None,
        }
    }

    fn resolve_named(&self, name: &str, depth: usize) -> Option<usize> {
        let catalog = dict_get(self.doc, &self.doc.trailer, b"Root")?.as_dict().ok()?;

        let from_tree = dict_get(self.doc, catalog, b"Names")
            .and_then(|obj| obj.as_dict().ok())
            .and_then(|names| dict_get(self.doc, names, b"Dests"))
            .and_then(|obj| obj.as_dict().ok())
            .and_then(|tree| self.lookup_name_tree(tree, name, 0));
        if let Some(dest) = from_tree {
            return self.resolve(dest, depth + 1);
        }

        let dests = dict_get(self.doc, catalog, b"Dests")?.as_dict().ok()?;
        let dest = dests.get(name.as_bytes()).ok()?;
        self.resolve(dest, depth + 1)
    }

    fn lookup_name_tree(&self, node: &'a Dictionary, name: &str, depth: usize) -> Option<&'a Object> {
        if depth > MAX_NAME_TREE_DEPTH {
            return None;
        }
        if let Some(names) = dict_get(self.doc, node, b"Names").and_then(|o| o.as_array().ok()) {
            for pair in names.chunks(2) {
                if let [key, value] = pair {
                    if let Some(Object::String(key, _)) = deref(self.doc, key) {
                        if decode_pdf_string(key) == name {
                            return Some(value);
                        }
                    }
                }
            }
        }
        let kids = dict_get(self.doc, node, b"Kids")?.as_array().ok()?;
        kids.iter()
            .filter_map(|kid| deref(self.doc, kid).and_then(|o| o.as_dict().ok()))
            .find_map(|kid| self.lookup_name_tree(kid, name, depth + 1))
    }
}

/// Destination of a link annotation, if it is an internal one.
///
/// `Ok(None)` means "not internal" (URI, launch, remote...). `Ok(Some(None))`
/// means internal but unresolvable.
fn internal_target(
    resolver: &DestResolver,
    annot: &Dictionary,
    current_page: usize,
) -> Option<Option<usize>> {
    if let Ok(dest) = annot.get(b"Dest") {
        return Some(resolver.resolve(dest, 0));
    }

    let action = dict_get(resolver.doc, annot, b"A")?.as_dict().ok()?;
    let kind = match action.get(b"S") {
        Ok(Object::Name(kind)) => kind.as_slice(),
        _ => return None,
    };
    match kind {
        b"GoTo" => Some(
            action
                .get(b"D")
                .ok()
                .and_then(|dest| resolver.resolve(dest, 0)),
        ),
        b"Named" => {
            let last = resolver.page_count.checked_sub(1)?;
            let target = match action.get(b"N") {
                Ok(Object::Name(n)) if n == b"NextPage" => Some((current_page + 1).min(last)),
                Ok(Object::Name(n)) if n == b"PrevPage" => Some(current_page.saturating_sub(1)),
                Ok(Object::Name(n)) if n == b"FirstPage" => Some(0),
                Ok(Object::Name(n)) if n == b"LastPage" => Some(last),
                _ => None,
            };
            Some(target)
        }
        _ => None,
    }
}

/// Collects the internal links on one page, in `/Annots` order.
pub(crate) fn internal_links(
    doc: &Document,
    page_id: ObjectId,
    page_index: usize,
    page_index_by_id: &HashMap<ObjectId, usize>,
) -> Result<Vec<PageLink>, PdfError> {
    let page = doc
        .get_object(page_id)
        .and_then(Object::as_dict)
        .map_err(|e| PdfError::Structure(format!("page dictionary: {}", e)))?;

    let annots = match dict_get(doc, page, b"Annots") {
        Some(obj) => obj
            .as_array()
            .map_err(|e| PdfError::Structure(format!("/Annots is not an array: {}", e)))?,
        None => return Ok(Vec::new()),
    };

    let resolver = DestResolver {
        doc,
        page_index_by_id,
        page_count: page_index_by_id.len(),
    };

    let mut links = Vec::new();
    for entry in annots {
        let Some(annot) = deref(doc, entry).and_then(|o| o.as_dict().ok()) else {
            continue;
        };
        if !matches!(annot.get(b"Subtype"), Ok(Object::Name(subtype)) if subtype == b"Link") {
            continue;
        }
        let Some(target_page) = internal_target(&resolver, annot, page_index) else {
            tracing::trace!("Skipping non-internal link on page {}", page_index + 1);
            continue;
        };
        let Some(rect) = rect_of(doc, annot) else {
            tracing::debug!("Skipping link without usable /Rect on page {}", page_index + 1);
            continue;
        };
        links.push(PageLink { rect, target_page });
    }

    tracing::debug!("Page {}: {} internal links", page_index + 1, links.len());
    Ok(links)
}
