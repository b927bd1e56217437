// src/pdf/split.rs
//! Page-range extraction and document concatenation.

use super::resolve_inherited;
use crate::utils::error::PdfError;
use lopdf::{dictionary, Document, Object, ObjectId};
use std::collections::HashSet;

/// Page attributes a page may inherit from its page-tree ancestors.
const INHERITABLE_KEYS: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

fn load(bytes: &[u8]) -> Result<Document, PdfError> {
    Document::load_mem(bytes).map_err(|e| PdfError::Load(e.to_string()))
}

fn save(doc: &mut Document) -> Result<Vec<u8>, PdfError> {
    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .map_err(|e| PdfError::Save(e.to_string()))?;
    Ok(buffer)
}

/// Copies the inclusive 0-based page span `[start_page, end_page]` into a
/// new document.
///
/// Pages outside the span are deleted from a copy of the source and
/// unreachable objects are pruned, so the output carries only what the
/// kept pages reference.
pub fn extract_range(bytes: &[u8], start_page: usize, end_page: usize) -> Result<Vec<u8>, PdfError> {
    let mut doc = load(bytes)?;
    let page_count = doc.get_pages().len();

    if start_page > end_page || end_page >= page_count {
        return Err(PdfError::Range {
            start: start_page,
            end: end_page,
            page_count,
        });
    }

    // lopdf numbers pages from 1.
    let to_delete: Vec<u32> = (1..=page_count as u32)
        .filter(|&n| {
            let index = (n - 1) as usize;
            index < start_page || index > end_page
        })
        .collect();

    if !to_delete.is_empty() {
        doc.delete_pages(&to_delete);
    }
    doc.prune_objects();
    doc.compress();

    tracing::debug!(
        "Extracted pages {}-{} ({} of {})",
        start_page + 1,
        end_page + 1,
        end_page - start_page + 1,
        page_count
    );
    save(&mut doc)
}

/// Pushes inherited attributes down onto every page so pages survive being
/// re-parented under a different page tree.
fn flatten_inherited(doc: &mut Document, page_ids: &[ObjectId]) {
    for &page_id in page_ids {
        let inherited: Vec<(&[u8], Object)> = INHERITABLE_KEYS
            .iter()
            .filter_map(|key| {
                let own = doc
                    .get_dictionary(page_id)
                    .map(|dict| dict.has(key))
                    .unwrap_or(false);
                if own {
                    return None;
                }
                resolve_inherited(doc, page_id, key).map(|value| (*key, value.clone()))
            })
            .collect();

        if let Ok(page) = doc.get_object_mut(page_id).and_then(Object::as_dict_mut) {
            for (key, value) in inherited {
                page.set(key.to_vec(), value);
            }
        }
    }
}

fn is_tree_node(obj: &Object) -> bool {
    matches!(
        obj.as_dict().and_then(|dict| dict.get(b"Type")),
        Ok(Object::Name(kind)) if kind == b"Catalog" || kind == b"Pages"
    )
}

/// Concatenates the pages of `chunks`, in order, into one document.
///
/// Returns `Ok(None)` for an empty list: merging nothing is not an error.
pub fn merge(chunks: &[Vec<u8>]) -> Result<Option<Vec<u8>>, PdfError> {
    if chunks.is_empty() {
        return Ok(None);
    }

    let mut merged = Document::with_version("1.5");
    let pages_id = merged.new_object_id();
    let mut next_id = merged.max_id + 1;
    let mut kids: Vec<Object> = Vec::new();

    for (position, chunk) in chunks.iter().enumerate() {
        let mut doc = load(chunk)?;
        let page_ids: Vec<ObjectId> = doc.get_pages().into_values().collect();
        flatten_inherited(&mut doc, &page_ids);

        doc.renumber_objects_with(next_id);
        next_id = doc.max_id + 1;

        // Renumbering preserves page order, so re-read the ids.
        let page_ids: Vec<ObjectId> = doc.get_pages().into_values().collect();
        let page_set: HashSet<ObjectId> = page_ids.iter().copied().collect();
        tracing::debug!("Merging chunk {} ({} pages)", position + 1, page_ids.len());

        for (id, mut object) in std::mem::take(&mut doc.objects) {
            if page_set.contains(&id) {
                if let Ok(page) = object.as_dict_mut() {
                    page.set("Parent", pages_id);
                }
            } else if is_tree_node(&object) {
                continue;
            }
            merged.objects.insert(id, object);
        }
        kids.extend(page_ids.into_iter().map(Object::Reference));
    }

    let page_count = kids.len();
    merged.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_count as i64,
        }),
    );
    merged.max_id = next_id;
    let catalog_id = merged.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    merged.trailer.set("Root", catalog_id);

    merged.prune_objects();
    merged.compress();

    tracing::debug!("Merged {} documents into {} pages", chunks.len(), page_count);
    save(&mut merged).map(Some)
}
