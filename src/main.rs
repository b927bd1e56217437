// src/main.rs
mod export;
mod extractors;
mod fetch;
mod pdf;
mod selection;
mod storage;
mod utils;

use clap::{ArgGroup, Parser};
use export::ExportPlan;
use extractors::{Outline, TocExtractor};
use fetch::Source;
use pdf::PdfDocument;
use selection::SelectionState;
use std::collections::BTreeSet;
use std::path::PathBuf;
use storage::StorageManager;
use utils::AppError;

/// Split an offer document into its TOC sections and subjects
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(group(ArgGroup::new("source").required(true).args(["file", "url"])))]
struct Args {
    /// Local PDF file
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// PDF URL, or a web page embedding the PDF in an iframe
    #[arg(short, long)]
    url: Option<String>,

    /// Output directory for the outline and exported documents
    #[arg(short, long, default_value = "./output")]
    output_dir: String,

    /// Outline rows to export, e.g. "0,3-7" (0-based). A selected Section is
    /// exported as its whole page span and again as one part per subject, so
    /// the merged PDF repeats those pages.
    #[arg(short, long)]
    select: Option<String>,

    /// Outline rows to drop after --select or --all. Dropping a Section drops its subjects.
    #[arg(long)]
    deselect: Option<String>,

    /// Export every outline row
    #[arg(long, conflicts_with = "select")]
    all: bool,

    /// Print the outline table and stop
    #[arg(short, long)]
    list: bool,

    /// Debug mode - save collected TOC links and TOC page text
    #[arg(short, long)]
    debug: bool,
}

impl Args {
    fn source(&self) -> Result<Source, AppError> {
        match (&self.file, &self.url) {
            (Some(path), None) => Ok(Source::File(path.clone())),
            (None, Some(url)) => Ok(Source::Url(url.clone())),
            _ => Err(AppError::Config("Provide exactly one of --file or --url".to_string())),
        }
    }
}

fn print_outline(outline: &Outline) {
    for (index, entry) in outline.entries().iter().enumerate() {
        let (start, end) = entry.page_span();
        println!(
            "{:>4}  {}{}  [{} - {}]",
            index,
            "    ".repeat(entry.indent_level()),
            entry.display_label,
            start,
            end
        );
    }
}

/// Runs the extractor, writing its raw inputs to `debug/` when asked.
fn extract_outline(
    doc: &PdfDocument,
    storage: &StorageManager,
    debug: bool,
) -> Result<Option<Outline>, AppError> {
    let extractor = TocExtractor::new();
    if !debug {
        return Ok(extractor.extract_outline(doc));
    }

    let Some(links) = extractor.collect_links(doc) else {
        return Ok(None);
    };
    let toc_pages: BTreeSet<usize> = links.iter().map(|l| l.page_index).collect();
    let page_texts: Vec<(usize, String)> = toc_pages
        .into_iter()
        .filter_map(|index| match doc.page_text(index) {
            Ok(text) => Some((index, text.text())),
            Err(e) => {
                tracing::warn!("Could not read page {} for debug dump: {}", index + 1, e);
                None
            }
        })
        .collect();
    storage.save_debug_dump(&links, &page_texts)?;

    Ok(extractor.build_outline(&links, doc.page_count() as u32))
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // 1. Setup Logging (reads RUST_LOG env var)
    utils::logging::setup_logging();

    // 2. Parse CLI Arguments
    let args = Args::parse();
    tracing::info!("Starting processing for args: {:?}", args);
    let source = args.source()?;

    // 3. Initialize storage
    let storage = StorageManager::new(&args.output_dir)?;
    tracing::debug!("Writing output to {}", storage.base_dir().display());

    // 4. Load the document
    let loaded = fetch::load_source(&source).await?;
    let doc = PdfDocument::from_bytes(&loaded.bytes)?;
    tracing::info!("Loaded {} ({} pages)", loaded.name, doc.page_count());

    // 5. Reconstruct the outline
    let Some(outline) = extract_outline(&doc, &storage, args.debug)? else {
        tracing::warn!("No TOC found for {}.", loaded.name);
        return Ok(());
    };
    storage.save_outline(&outline)?;

    if args.list {
        print_outline(&outline);
        return Ok(());
    }

    // 6. Selection
    let mut selection = SelectionState::new(&outline);
    if args.all {
        selection.select_all();
    } else if let Some(list) = &args.select {
        for row in selection::parse_row_list(list, outline.len())? {
            selection.select(row);
        }
    }
    if let Some(list) = &args.deselect {
        for row in selection::parse_row_list(list, outline.len())? {
            selection.deselect(row);
        }
    }

    let parts = match export::plan_export(&outline, &selection) {
        ExportPlan::NothingSelected => {
            tracing::info!("No sections selected.");
            return Ok(());
        }
        ExportPlan::Ranges(parts) => parts,
    };

    // 7. Cut, merge and save
    let bundle = export::build_bundle(&loaded.bytes, &parts)?;
    let written = storage.save_bundle(&bundle)?;
    storage.save_export_metadata(&loaded.name, outline.page_count(), &bundle)?;

    tracing::info!(
        "Processing finished. Success: {}, Failures: {}, files written: {}",
        bundle.parts.len(),
        bundle.failed.len(),
        written.len()
    );

    if bundle.parts.is_empty() {
        return Err(AppError::Processing(format!(
            "Failed to extract any of the {} selected ranges",
            parts.len()
        )));
    }

    Ok(())
}
