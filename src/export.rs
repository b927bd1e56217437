// src/export.rs
//! Turns a selection into page ranges and the documents cut from them.

use crate::extractors::Outline;
use crate::pdf::{extract_range, merge};
use crate::selection::SelectionState;
use crate::utils::error::PdfError;
use serde::Serialize;
use std::collections::HashMap;

/// Labels longer than this are cut when used as file names.
pub const MAX_NAME_CHARS: usize = 50;
pub const MERGED_FILE_NAME: &str = "merged_selected_sections.pdf";

/// One document to cut from the source. Pages are 0-based, inclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedPart {
    pub row: usize,
    pub file_name: String,
    pub start_page: usize,
    pub end_page: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportPlan {
    NothingSelected,
    Ranges(Vec<PlannedPart>),
}

/// A part that was cut successfully.
#[derive(Debug, Clone)]
pub struct ExportedPart {
    pub part: PlannedPart,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct ExportBundle {
    pub parts: Vec<ExportedPart>,
    /// `None` when no part could be cut.
    pub merged: Option<Vec<u8>>,
    pub failed: Vec<(PlannedPart, String)>,
}

/// File stem for a row label: first 50 chars, separators replaced by `_`.
pub fn file_stem(label: &str, start_page: u32) -> String {
    let stem: String = label
        .chars()
        .take(MAX_NAME_CHARS)
        .map(|c| match c {
            ' ' | '/' | '\\' => '_',
            other => other,
        })
        .collect();
    if stem.is_empty() {
        format!("section_{}", start_page)
    } else {
        stem
    }
}

/// Plans one part per selected row, in outline order.
pub fn plan_export(outline: &Outline, selection: &SelectionState) -> ExportPlan {
    let rows = selection.selected_rows();
    if rows.is_empty() {
        return ExportPlan::NothingSelected;
    }

    let mut seen: HashMap<String, usize> = HashMap::new();
    let parts = rows
        .into_iter()
        .filter_map(|row| {
            let entry = outline.get(row)?;
            let (start, end) = entry.page_span();
            let stem = file_stem(&entry.display_label, start);
            let count = seen.entry(stem.clone()).or_insert(0);
            *count += 1;
            let file_name = if *count == 1 {
                format!("{}.pdf", stem)
            } else {
                format!("{}_{}.pdf", stem, count)
            };
            Some(PlannedPart {
                row,
                file_name,
                start_page: start.saturating_sub(1) as usize,
                end_page: end.saturating_sub(1) as usize,
            })
        })
        .collect();
    ExportPlan::Ranges(parts)
}

/// Cuts every planned part from `source` and merges the successful ones in
/// plan order. A part that fails is logged and left out.
pub fn build_bundle(source: &[u8], parts: &[PlannedPart]) -> Result<ExportBundle, PdfError> {
    let mut exported = Vec::with_capacity(parts.len());
    let mut failed = Vec::new();

    for part in parts {
        match extract_range(source, part.start_page, part.end_page) {
            Ok(bytes) => {
                tracing::debug!(
                    "Cut {} (pages {}-{})",
                    part.file_name,
                    part.start_page + 1,
                    part.end_page + 1
                );
                exported.push(ExportedPart {
                    part: part.clone(),
                    bytes,
                });
            }
            Err(e) => {
                tracing::warn!("Skipping {}: {}", part.file_name, e);
                failed.push((part.clone(), e.to_string()));
            }
        }
    }

    let chunks: Vec<Vec<u8>> = exported.iter().map(|p| p.bytes.clone()).collect();
    let merged = merge(&chunks)?;
    tracing::info!(
        "Exported {} of {} parts{}",
        exported.len(),
        parts.len(),
        if merged.is_some() { " plus merged document" } else { "" }
    );

    Ok(ExportBundle {
        parts: exported,
        merged,
        failed,
    })
}
