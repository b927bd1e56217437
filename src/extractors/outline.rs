// src/extractors/outline.rs

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::fmt;

/// Leading dotted numbering such as `1.1` or `2.3.4`.
static DOTTED_NUMBERING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+(?:\.\d+)+)").expect("Failed to compile DOTTED_NUMBERING_RE"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EntryType {
    Section,
    Subject,
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryType::Section => write!(f, "Section"),
            EntryType::Subject => write!(f, "Subject"),
        }
    }
}

/// One row of the reconstructed table of contents. Pages are 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutlineEntry {
    pub entry_type: EntryType,
    pub raw_label: String,
    pub display_label: String,
    pub start_page: u32,
    pub end_page: Option<u32>,
    /// Label of the Section this entry belongs to. A Section owns itself;
    /// Subjects seen before any Section have none.
    pub owning_section: Option<String>,
    pub section_page_range: Option<(u32, u32)>,
}

impl OutlineEntry {
    pub fn is_section(&self) -> bool {
        self.entry_type == EntryType::Section
    }

    /// Inclusive 1-based span of this entry.
    pub fn page_span(&self) -> (u32, u32) {
        (self.start_page, self.end_page.unwrap_or(self.start_page))
    }

    /// Sections sit at level 0; numbered Subjects (`1.2.3`) nest one level
    /// per dot; any other Subject sits at level 1.
    pub fn indent_level(&self) -> usize {
        if self.is_section() {
            return 0;
        }
        DOTTED_NUMBERING_RE
            .captures(&self.display_label)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().matches('.').count())
            .unwrap_or(1)
    }
}

/// Flat row for the outline table consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutlineRow {
    pub entry_type: EntryType,
    pub raw_label: String,
    pub display_label: String,
    pub page_range: String,
    pub owning_section: Option<String>,
    pub section_range: Option<String>,
    pub start_page: u32,
    pub end_page: u32,
}

impl From<&OutlineEntry> for OutlineRow {
    fn from(entry: &OutlineEntry) -> Self {
        let (start, end) = entry.page_span();
        OutlineRow {
            entry_type: entry.entry_type,
            raw_label: entry.raw_label.clone(),
            display_label: entry.display_label.clone(),
            page_range: format!("{} - {}", start, end),
            owning_section: entry.owning_section.clone(),
            section_range: entry
                .section_page_range
                .map(|(s, e)| format!("{}-{}", s, e)),
            start_page: start,
            end_page: end,
        }
    }
}

/// A fully resolved outline. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Outline {
    entries: Vec<OutlineEntry>,
    page_count: u32,
}

impl Outline {
    pub(crate) fn new(entries: Vec<OutlineEntry>, page_count: u32) -> Self {
        Self { entries, page_count }
    }

    pub fn entries(&self) -> &[OutlineEntry] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Option<&OutlineEntry> {
        self.entries.get(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    pub fn rows(&self) -> Vec<OutlineRow> {
        self.entries.iter().map(OutlineRow::from).collect()
    }

    /// Indices of the Subjects that follow the Section at `index`, up to the
    /// next Section. Empty when `index` is not a Section.
    pub fn section_members(&self, index: usize) -> Vec<usize> {
        match self.entries.get(index) {
            Some(entry) if entry.is_section() => self.entries[index + 1..]
                .iter()
                .take_while(|e| !e.is_section())
                .enumerate()
                .map(|(offset, _)| index + 1 + offset)
                .collect(),
            _ => Vec::new(),
        }
    }
}
