// src/extractors/toc.rs

// --- Imports ---
use crate::extractors::outline::{EntryType, Outline, OutlineEntry};
use crate::pdf::PdfDocument;
use crate::utils::error::PdfError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

// --- Constants ---
/// Only the first pages are searched for the contents marker.
pub const TOC_SCAN_PAGES: usize = 6;
/// Case-insensitive; also matches "table of contents".
const CONTENTS_MARKER: &str = "contents";
/// The walk continues onto the next page only if its raw text contains one
/// of these (case-sensitive). `..` is the shortest dot-leader.
pub const CONTINUATION_MARKERS: [&str; 3] = ["SECTION", "..", "INTRODUCTION"];
const SECTION_KEYWORD: &str = "SECTION";

// --- Regex Patterns (Lazy Static) ---
// Dot-leader (2+ dots) and whatever trails it on the same line, typically the page number.
static DOT_LEADER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\.{2,}.*").expect("Failed to compile DOT_LEADER_RE"));

static SECTION_PREFIX_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^SECTION\s*[IVXLCD]+\s*:?").expect("Failed to compile SECTION_PREFIX_RE")
});


// --- Source Abstraction ---
/// A navigational link as found on a TOC page, before cleaning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RawLink {
    /// 0-based page the link sits on.
    pub page_index: usize,
    /// Text under the link's rectangle.
    pub label: String,
    /// 1-based destination page, if it resolved.
    pub target_page: Option<u32>,
}

/// What the extractor needs from a document.
pub trait TocSource {
    fn page_count(&self) -> usize;
    fn page_text(&self, index: usize) -> Result<String, PdfError>;
    /// Internal navigation links on a page, with their labels.
    fn page_links(&self, index: usize) -> Result<Vec<RawLink>, PdfError>;
}

impl TocSource for PdfDocument {
    fn page_count(&self) -> usize {
        PdfDocument::page_count(self)
    }

    fn page_text(&self, index: usize) -> Result<String, PdfError> {
        Ok(PdfDocument::page_text(self, index)?.text())
    }

    fn page_links(&self, index: usize) -> Result<Vec<RawLink>, PdfError> {
        let links = PdfDocument::page_links(self, index)?;
        if links.is_empty() {
            return Ok(Vec::new());
        }
        let text = PdfDocument::page_text(self, index)?;
        Ok(links
            .into_iter()
            .map(|link| RawLink {
                page_index: index,
                label: text.text_in_rect(&link.rect),
                target_page: link.target_page.map(|p| p as u32 + 1),
            })
            .collect())
    }
}

// --- Label Cleaning ---
/// Strips dot-leaders (and what follows them on each line) and trims the
/// ends. Inner whitespace, line breaks included, is kept.
pub fn clean_label(raw: &str) -> String {
    DOT_LEADER_RE.replace_all(raw, "").trim().to_string()
}

pub fn classify(label: &str) -> EntryType {
    if label.to_uppercase().contains(SECTION_KEYWORD) {
        EntryType::Section
    } else {
        EntryType::Subject
    }
}

/// `SECTION IV: RISK FACTORS` -> `RISK FACTORS`.
pub fn strip_section_prefix(label: &str) -> String {
    SECTION_PREFIX_RE.replace(label, "").trim().to_string()
}

// --- Range Resolution ---
#[derive(Debug, Clone)]
struct PendingEntry {
    entry_type: EntryType,
    raw_label: String,
    display_label: String,
    start_page: u32,
}

/// Closes every unresolved entry from `from` onward against the next
/// boundary page (the next Section's start, or one past the last page).
///
/// When `from` is an open Section, the Section row itself gets the whole
/// section span, and every member gets `section_page_range`.
fn close_out(entries: &mut [OutlineEntry], open_section: Option<usize>, next_start: u32) {
    let boundary_end = next_start.saturating_sub(1);
    match open_section {
        Some(section_idx) => {
            let members = &mut entries[section_idx..];
            // No member may end before it starts.
            let latest_start = members.iter().map(|e| e.start_page).max().unwrap_or(0);
            let section_start = members[0].start_page;
            let section_end = boundary_end.max(latest_start);

            members[0].end_page = Some(section_end);
            for entry in members.iter_mut() {
                if entry.end_page.is_none() {
                    entry.end_page = Some(entry.start_page.max(boundary_end));
                }
                entry.section_page_range = Some((section_start, section_end));
            }
        }
        None => {
            for entry in entries.iter_mut().filter(|e| e.end_page.is_none()) {
                entry.end_page = Some(entry.start_page.max(boundary_end));
            }
        }
    }
}

/// Single forward pass assigning `end_page` and `section_page_range`.
fn resolve_ranges(pending: Vec<PendingEntry>, page_count: u32) -> Vec<OutlineEntry> {
    let mut entries: Vec<OutlineEntry> = Vec::with_capacity(pending.len());
    let mut open_section: Option<usize> = None;

    for item in pending {
        match item.entry_type {
            EntryType::Section => {
                close_out(&mut entries, open_section, item.start_page);
                entries.push(OutlineEntry {
                    entry_type: EntryType::Section,
                    owning_section: Some(item.raw_label.clone()),
                    raw_label: item.raw_label,
                    display_label: item.display_label,
                    start_page: item.start_page,
                    end_page: None,
                    section_page_range: None,
                });
                open_section = Some(entries.len() - 1);
            }
            EntryType::Subject => {
                if let Some(prev) = entries.last_mut() {
                    if !prev.is_section() && prev.end_page.is_none() {
                        prev.end_page = Some(prev.start_page.max(item.start_page.saturating_sub(1)));
                    }
                }
                let owning_section = open_section.map(|i| entries[i].raw_label.clone());
                entries.push(OutlineEntry {
                    entry_type: EntryType::Subject,
                    owning_section,
                    raw_label: item.raw_label,
                    display_label: item.display_label,
                    start_page: item.start_page,
                    end_page: None,
                    section_page_range: None,
                });
            }
        }
    }

    close_out(&mut entries, open_section, page_count.saturating_add(1));
    entries
}

// --- Main Extractor Structure ---
#[derive(Debug, Default)]
pub struct TocExtractor;

impl TocExtractor {
    pub fn new() -> Self {
        Self
    }

    /// First page (0-based) within the scan window whose text mentions the
    /// contents marker.
    pub fn find_anchor_page<S: TocSource>(&self, source: &S) -> Option<usize> {
        let window = source.page_count().min(TOC_SCAN_PAGES);
        (0..window).find(|&index| match source.page_text(index) {
            Ok(text) => text.to_lowercase().contains(CONTENTS_MARKER),
            Err(e) => {
                tracing::warn!("Could not read page {} while looking for TOC: {}", index + 1, e);
                false
            }
        })
    }

    /// Walks forward from the anchor collecting navigational links, page by
    /// page, while the following page still looks like TOC content.
    ///
    /// Returns `None` when no anchor page exists in the scan window.
    pub fn collect_links<S: TocSource>(&self, source: &S) -> Option<Vec<RawLink>> {
        let anchor = self.find_anchor_page(source)?;
        tracing::info!("Found contents marker on page {}", anchor + 1);

        let page_count = source.page_count();
        let mut links = Vec::new();
        let mut index = anchor;
        while index < page_count {
            match source.page_links(index) {
                Ok(page_links) => {
                    tracing::debug!("Page {}: {} TOC links", index + 1, page_links.len());
                    links.extend(page_links);
                }
                Err(e) => {
                    tracing::warn!("Stopping TOC walk, failed to read links on page {}: {}", index + 1, e);
                    break;
                }
            }

            index += 1;
            if index >= page_count {
                break;
            }
            match source.page_text(index) {
                Ok(next_text) if CONTINUATION_MARKERS.iter().any(|m| next_text.contains(m)) => {}
                Ok(_) => {
                    tracing::debug!("Page {} does not look like TOC content, stopping", index + 1);
                    break;
                }
                Err(e) => {
                    tracing::warn!("Stopping TOC walk, failed to read page {}: {}", index + 1, e);
                    break;
                }
            }
        }
        Some(links)
    }

    /// Builds the outline from already collected links. Malformed links
    /// (empty label, unresolved target) are dropped.
    pub fn build_outline(&self, links: &[RawLink], page_count: u32) -> Option<Outline> {
        let mut pending: Vec<PendingEntry> = links
            .iter()
            .filter_map(|link| {
                let label = clean_label(&link.label);
                let start_page = match link.target_page {
                    Some(page) if page > 0 => page,
                    _ => {
                        tracing::debug!("Dropping link '{}' with unresolved target", link.label);
                        return None;
                    }
                };
                if label.is_empty() {
                    tracing::debug!("Dropping link to page {} with empty label", start_page);
                    return None;
                }
                let entry_type = classify(&label);
                let display_label = match entry_type {
                    EntryType::Section => strip_section_prefix(&label),
                    EntryType::Subject => label.clone(),
                };
                Some(PendingEntry {
                    entry_type,
                    raw_label: label,
                    display_label,
                    start_page,
                })
            })
            .collect();

        if pending.is_empty() {
            return None;
        }
        // Stable: links sharing a start page keep their TOC order.
        pending.sort_by_key(|p| p.start_page);

        let entries = resolve_ranges(pending, page_count);
        tracing::info!(
            "Built outline: {} entries ({} sections)",
            entries.len(),
            entries.iter().filter(|e| e.is_section()).count()
        );
        Some(Outline::new(entries, page_count))
    }

    /// Locates the TOC and reconstructs the outline. `None` means no
    /// outline is available for this document.
    pub fn extract_outline<S: TocSource>(&self, source: &S) -> Option<Outline> {
        let links = match self.collect_links(source) {
            Some(links) => links,
            None => {
                tracing::info!("No contents marker in the first {} pages", TOC_SCAN_PAGES);
                return None;
            }
        };
        let outline = self.build_outline(&links, source.page_count() as u32);
        if outline.is_none() {
            tracing::info!("Contents page found but no navigational entries collected");
        }
        outline
    }
}

// --- Tests ---
#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::testing::{build_pdf, FixturePage};
    use std::collections::HashMap;

    /// In-memory source: per-page text and links.
    #[derive(Default)]
    struct FakeDoc {
        pages: Vec<String>,
        links: HashMap<usize, Vec<(&'static str, Option<u32>)>>,
        broken_pages: Vec<usize>,
    }

    impl FakeDoc {
        fn with_pages(n: usize) -> Self {
            Self {
                pages: vec!["body text".to_string(); n],
                ..Default::default()
            }
        }

        fn text(mut self, index: usize, text: &str) -> Self {
            self.pages[index] = text.to_string();
            self
        }

        fn links(mut self, index: usize, links: Vec<(&'static str, Option<u32>)>) -> Self {
            self.links.insert(index, links);
            self
        }
    }

    impl TocSource for FakeDoc {
        fn page_count(&self) -> usize {
            self.pages.len()
        }

        fn page_text(&self, index: usize) -> Result<String, PdfError> {
            if self.broken_pages.contains(&index) {
                return Err(PdfError::Structure("broken".to_string()));
            }
            self.pages
                .get(index)
                .cloned()
                .ok_or(PdfError::PageOutOfBounds(index))
        }

        fn page_links(&self, index: usize) -> Result<Vec<RawLink>, PdfError> {
            Ok(self
                .links
                .get(&index)
                .map(|links| {
                    links
                        .iter()
                        .map(|(label, target)| RawLink {
                            page_index: index,
                            label: label.to_string(),
                            target_page: *target,
                        })
                        .collect()
                })
                .unwrap_or_default())
        }
    }

    fn spans(outline: &Outline) -> Vec<(String, u32, u32)> {
        outline
            .entries()
            .iter()
            .map(|e| {
                let (s, end) = e.page_span();
                (e.display_label.clone(), s, end)
            })
            .collect()
    }

    fn scenario_doc() -> FakeDoc {
        FakeDoc::with_pages(20)
            .text(1, "TABLE OF CONTENTS\nSECTION I: GENERAL ..... 5")
            .links(
                1,
                vec![
                    ("SECTION I: GENERAL ........ 5", Some(5)),
                    ("1.1 Overview ........ 5", Some(5)),
                ],
            )
            .text(2, "1.2 Risks ....... 9\nSECTION II: FINANCE ...... 12")
            .links(
                2,
                vec![
                    ("1.2 Risks ....... 9", Some(9)),
                    ("SECTION II: FINANCE ...... 12", Some(12)),
                ],
            )
    }

    #[test]
    fn test_clean_label_strips_dot_leaders() {
        assert_eq!(clean_label("1.1 Overview ........ 5"), "1.1 Overview");
        assert_eq!(clean_label("  Risk Factors..12  "), "Risk Factors");
        assert_eq!(clean_label("Two\nlines .... 7\nmore"), "Two\nlines \nmore");
        assert_eq!(clean_label("Capital  Structure"), "Capital  Structure");
        assert_eq!(clean_label("....."), "");
        // A single dot is not a leader.
        assert_eq!(clean_label("1.1 Scope"), "1.1 Scope");
    }

    #[test]
    fn test_classify_and_prefix() {
        assert_eq!(classify("SECTION IV: RISK FACTORS"), EntryType::Section);
        assert_eq!(classify("Section vii - legal"), EntryType::Section);
        assert_eq!(classify("Objects of the Issue"), EntryType::Subject);
        assert_eq!(strip_section_prefix("SECTION IV: RISK FACTORS"), "RISK FACTORS");
        assert_eq!(strip_section_prefix("section xii legal"), "legal");
        assert_eq!(strip_section_prefix("SUBSECTION"), "SUBSECTION");
    }

    #[test]
    fn test_scenario_ranges() {
        let outline = TocExtractor::new().extract_outline(&scenario_doc()).unwrap();
        assert_eq!(
            spans(&outline),
            vec![
                ("GENERAL".to_string(), 5, 11),
                ("1.1 Overview".to_string(), 5, 8),
                ("1.2 Risks".to_string(), 9, 11),
                ("FINANCE".to_string(), 12, 20),
            ]
        );

        let entries = outline.entries();
        assert_eq!(entries[0].section_page_range, Some((5, 11)));
        assert_eq!(entries[2].section_page_range, Some((5, 11)));
        assert_eq!(entries[3].section_page_range, Some((12, 20)));
        assert_eq!(entries[1].owning_section.as_deref(), Some("SECTION I: GENERAL"));
        assert_eq!(entries[3].owning_section.as_deref(), Some("SECTION II: FINANCE"));
        assert_eq!(entries[0].raw_label, "SECTION I: GENERAL");
    }

    #[test]
    fn test_no_marker_in_scan_window_is_not_found() {
        let doc = FakeDoc::with_pages(12)
            .text(6, "TABLE OF CONTENTS")
            .links(6, vec![("SECTION I", Some(8))]);
        assert!(TocExtractor::new().extract_outline(&doc).is_none());
    }

    #[test]
    fn test_marker_without_links_is_not_found() {
        let doc = FakeDoc::with_pages(4).text(0, "Contents");
        assert!(TocExtractor::new().extract_outline(&doc).is_none());
    }

    #[test]
    fn test_walk_stops_at_page_without_markers() {
        let doc = FakeDoc::with_pages(10)
            .text(0, "Contents")
            .links(0, vec![("Intro", Some(3))])
            // page 1 has no marker, so page 1's links are never read
            .links(1, vec![("Late", Some(6))]);
        let links = TocExtractor::new().collect_links(&doc).unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].label, "Intro");
    }

    #[test]
    fn test_walk_continues_on_dot_leader_pages() {
        let doc = FakeDoc::with_pages(10)
            .text(0, "Contents")
            .links(0, vec![("Intro", Some(3))])
            .text(1, "Glossary .. 7")
            .links(1, vec![("Glossary", Some(7))]);
        let links = TocExtractor::new().collect_links(&doc).unwrap();
        assert_eq!(links.len(), 2);
    }

    #[test]
    fn test_walk_continues_on_introduction_page() {
        let doc = FakeDoc::with_pages(10)
            .text(0, "Contents")
            .links(0, vec![("Intro", Some(3))])
            .text(1, "INTRODUCTION")
            .links(1, vec![("Glossary", Some(7))]);
        let links = TocExtractor::new().collect_links(&doc).unwrap();
        assert_eq!(links.len(), 2);
        assert_eq!(links[1].page_index, 1);
    }

    #[test]
    fn test_walk_continues_on_section_page() {
        let doc = FakeDoc::with_pages(10)
            .text(0, "Contents")
            .links(0, vec![("Intro", Some(3))])
            .text(1, "SECTION")
            .links(1, vec![("SECTION II: FINANCE", Some(7))]);
        let links = TocExtractor::new().collect_links(&doc).unwrap();
        assert_eq!(links.len(), 2);
        assert_eq!(links[1].label, "SECTION II: FINANCE");
    }

    #[test]
    fn test_continuation_markers_are_case_sensitive() {
        let doc = FakeDoc::with_pages(10)
            .text(0, "Contents")
            .links(0, vec![("Intro", Some(3))])
            .text(1, "introduction and section notes")
            .links(1, vec![("Glossary", Some(7))]);
        assert_eq!(TocExtractor::new().collect_links(&doc).unwrap().len(), 1);
    }

    #[test]
    fn test_unreadable_page_is_skipped_during_anchor_scan() {
        let mut doc = FakeDoc::with_pages(8)
            .text(0, "Contents")
            .text(2, "Table of Contents")
            .links(2, vec![("Overview", Some(4))]);
        doc.broken_pages.push(0);
        let outline = TocExtractor::new().extract_outline(&doc).unwrap();
        assert_eq!(outline.len(), 1);
    }

    #[test]
    fn test_malformed_links_are_dropped() {
        let doc = FakeDoc::with_pages(10).text(0, "CONTENTS").links(
            0,
            vec![
                ("....... 4", Some(4)),
                ("   ", Some(5)),
                ("Orphan target", None),
                ("Zero target", Some(0)),
                ("Kept", Some(6)),
            ],
        );
        let outline = TocExtractor::new().extract_outline(&doc).unwrap();
        assert_eq!(spans(&outline), vec![("Kept".to_string(), 6, 10)]);
    }

    #[test]
    fn test_subjects_before_first_section_stay_orphaned() {
        let doc = FakeDoc::with_pages(30).text(0, "Contents").links(
            0,
            vec![
                ("Definitions", Some(2)),
                ("Summary", Some(4)),
                ("SECTION I: INTRO", Some(7)),
                ("1.1 Scope", Some(8)),
            ],
        );
        let outline = TocExtractor::new().extract_outline(&doc).unwrap();
        assert_eq!(
            spans(&outline),
            vec![
                ("Definitions".to_string(), 2, 3),
                ("Summary".to_string(), 4, 6),
                ("INTRO".to_string(), 7, 30),
                ("1.1 Scope".to_string(), 8, 30),
            ]
        );
        let entries = outline.entries();
        assert_eq!(entries[0].owning_section, None);
        assert_eq!(entries[1].section_page_range, None);
        assert_eq!(entries[3].section_page_range, Some((7, 30)));
    }

    #[test]
    fn test_outline_without_sections_ends_at_document_end() {
        let doc = FakeDoc::with_pages(15)
            .text(0, "Contents")
            .links(0, vec![("Alpha", Some(2)), ("Beta", Some(9))]);
        let outline = TocExtractor::new().extract_outline(&doc).unwrap();
        assert_eq!(
            spans(&outline),
            vec![("Alpha".to_string(), 2, 8), ("Beta".to_string(), 9, 15)]
        );
        assert!(outline.entries().iter().all(|e| e.section_page_range.is_none()));
    }

    #[test]
    fn test_shared_start_pages_never_produce_inverted_spans() {
        let doc = FakeDoc::with_pages(20).text(0, "Contents").links(
            0,
            vec![
                ("SECTION I", Some(5)),
                ("A", Some(5)),
                ("B", Some(5)),
                ("SECTION II", Some(5)),
                ("C", Some(6)),
            ],
        );
        let outline = TocExtractor::new().extract_outline(&doc).unwrap();
        for entry in outline.entries() {
            let (start, end) = entry.page_span();
            assert!(end >= start, "{:?}", entry);
            if let Some((_, section_end)) = entry.section_page_range {
                assert!(end <= section_end, "{:?}", entry);
            }
        }
    }

    #[test]
    fn test_consecutive_subjects_are_contiguous() {
        let doc = FakeDoc::with_pages(40).text(0, "Contents").links(
            0,
            vec![
                ("SECTION I", Some(3)),
                ("a", Some(3)),
                ("b", Some(6)),
                ("c", Some(10)),
                ("SECTION II", Some(15)),
                ("d", Some(15)),
                ("e", Some(22)),
            ],
        );
        let outline = TocExtractor::new().extract_outline(&doc).unwrap();
        let entries = outline.entries();
        for pair in entries.windows(2) {
            let (e1, e2) = (&pair[0], &pair[1]);
            if !e1.is_section() && !e2.is_section() {
                assert_eq!(e1.end_page, Some(e2.start_page - 1));
            }
        }
        assert_eq!(entries.last().unwrap().end_page, Some(40));
    }

    #[test]
    fn test_out_of_order_links_are_sorted_by_start_page() {
        let doc = FakeDoc::with_pages(20)
            .text(0, "Contents")
            .links(0, vec![("Later", Some(12)), ("Earlier", Some(4))]);
        let outline = TocExtractor::new().extract_outline(&doc).unwrap();
        assert_eq!(
            spans(&outline),
            vec![("Earlier".to_string(), 4, 11), ("Later".to_string(), 12, 20)]
        );
    }

    #[test]
    fn test_extraction_is_idempotent() {
        let doc = scenario_doc();
        let extractor = TocExtractor::new();
        let first = extractor.extract_outline(&doc).unwrap();
        let second = extractor.extract_outline(&doc).unwrap();
        assert_eq!(first.rows(), second.rows());
    }

    #[test]
    fn test_end_to_end_on_real_pdf() {
        let mut pages = vec![
            FixturePage::text("Cover page"),
            FixturePage::new()
                .line(72, 740, "TABLE OF CONTENTS")
                .toc_line(700, "SECTION I: GENERAL .......... 5", 4)
                .toc_line(680, "1.1 Overview .......... 5", 4),
            FixturePage::new()
                .line(72, 740, "SECTION continued")
                .toc_line(700, "1.2 Risks .......... 9", 8)
                .toc_line(680, "SECTION II: FINANCE .......... 12", 11),
        ];
        for n in 4..=16 {
            pages.push(FixturePage::text(&format!("Body page {}", n)));
        }
        let bytes = build_pdf(&pages);
        let doc = PdfDocument::from_bytes(&bytes).unwrap();

        let outline = TocExtractor::new().extract_outline(&doc).unwrap();
        assert_eq!(outline.page_count(), 16);
        assert_eq!(
            spans(&outline),
            vec![
                ("GENERAL".to_string(), 5, 11),
                ("1.1 Overview".to_string(), 5, 8),
                ("1.2 Risks".to_string(), 9, 11),
                ("FINANCE".to_string(), 12, 16),
            ]
        );
    }
}
