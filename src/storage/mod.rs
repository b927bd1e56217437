// src/storage/mod.rs
use crate::export::{ExportBundle, MERGED_FILE_NAME};
use crate::extractors::{Outline, RawLink};
use crate::utils::error::StorageError;
use serde::Serialize;
use std::fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

pub const ARCHIVE_FILE_NAME: &str = "selected_sections.zip";
const OUTLINE_FILE_NAME: &str = "outline.json";
const METADATA_FILE_NAME: &str = "export_meta.json";
const DEBUG_DIR_NAME: &str = "debug";

pub struct StorageManager {
    base_dir: PathBuf,
}

/// Writes `bytes` next to `path` under a temporary name, then renames it into
/// place. A failed write removes the temporary file.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp_path = path.with_file_name(format!(".{}.partial", file_name));

    let result = fs::File::create(&tmp_path)
        .and_then(|mut file| {
            file.write_all(bytes)?;
            file.sync_all()
        })
        .and_then(|_| fs::rename(&tmp_path, path));

    if let Err(e) = result {
        let _ = fs::remove_file(&tmp_path);
        return Err(StorageError::IoError(e));
    }
    Ok(())
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, StorageError> {
    serde_json::to_string_pretty(value).map_err(|e| StorageError::SerializationError(e.to_string()))
}

/// Zip archive of every part plus the merged document.
pub fn build_archive(bundle: &ExportBundle) -> Result<Vec<u8>, StorageError> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();

    for exported in &bundle.parts {
        zip.start_file(exported.part.file_name.as_str(), options)?;
        zip.write_all(&exported.bytes)?;
    }
    if let Some(merged) = &bundle.merged {
        zip.start_file(MERGED_FILE_NAME, options)?;
        zip.write_all(merged)?;
    }
    Ok(zip.finish()?.into_inner())
}

impl StorageManager {
    /// Creates a new StorageManager with the specified base directory
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Result<Self, StorageError> {
        let base_path = base_dir.as_ref().to_path_buf();

        if !base_path.exists() {
            fs::create_dir_all(&base_path).map_err(StorageError::IoError)?;
        }

        Ok(Self { base_dir: base_path })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Saves the outline table as JSON rows.
    pub fn save_outline(&self, outline: &Outline) -> Result<PathBuf, StorageError> {
        let file_path = self.base_dir.join(OUTLINE_FILE_NAME);
        write_atomic(&file_path, to_json(&outline.rows())?.as_bytes())?;
        tracing::info!("Saved outline ({} rows) to {}", outline.len(), file_path.display());
        Ok(file_path)
    }

    /// Writes every part, the merged document and the archive. Returns the
    /// paths written, in that order.
    pub fn save_bundle(&self, bundle: &ExportBundle) -> Result<Vec<PathBuf>, StorageError> {
        let mut written = Vec::with_capacity(bundle.parts.len() + 2);

        for exported in &bundle.parts {
            let path = self.base_dir.join(&exported.part.file_name);
            write_atomic(&path, &exported.bytes)?;
            tracing::debug!("Saved part to {}", path.display());
            written.push(path);
        }

        if let Some(merged) = &bundle.merged {
            let path = self.base_dir.join(MERGED_FILE_NAME);
            write_atomic(&path, merged)?;
            tracing::info!("Saved merged document to {}", path.display());
            written.push(path);
        }

        let archive_path = self.base_dir.join(ARCHIVE_FILE_NAME);
        write_atomic(&archive_path, &build_archive(bundle)?)?;
        tracing::info!("Saved archive to {}", archive_path.display());
        written.push(archive_path);

        Ok(written)
    }

    /// Saves metadata about the export in JSON format
    pub fn save_export_metadata(
        &self,
        source_name: &str,
        page_count: u32,
        bundle: &ExportBundle,
    ) -> Result<PathBuf, StorageError> {
        let file_path = self.base_dir.join(METADATA_FILE_NAME);

        let parts: Vec<_> = bundle.parts.iter().map(|p| &p.part).collect();
        let failed: Vec<_> = bundle
            .failed
            .iter()
            .map(|(part, reason)| serde_json::json!({ "part": part, "reason": reason }))
            .collect();
        let metadata = serde_json::json!({
            "source_name": source_name,
            "page_count": page_count,
            "part_count": bundle.parts.len(),
            "parts": parts,
            "failed": failed,
            "merged": bundle.merged.is_some(),
            "export_timestamp": chrono::Utc::now().to_rfc3339(),
        });

        write_atomic(&file_path, to_json(&metadata)?.as_bytes())?;
        tracing::info!("Saved metadata to {}", file_path.display());
        Ok(file_path)
    }

    /// Writes collected TOC links and the text of the pages they came from
    /// under `debug/`.
    pub fn save_debug_dump(
        &self,
        links: &[RawLink],
        page_texts: &[(usize, String)],
    ) -> Result<PathBuf, StorageError> {
        let debug_dir = self.base_dir.join(DEBUG_DIR_NAME);
        fs::create_dir_all(&debug_dir).map_err(StorageError::IoError)?;

        write_atomic(&debug_dir.join("toc_links.json"), to_json(links)?.as_bytes())?;
        for (index, text) in page_texts {
            let path = debug_dir.join(format!("page_{:04}.txt", index + 1));
            write_atomic(&path, text.as_bytes())?;
        }

        tracing::info!(
            "Saved debug dump ({} links, {} pages) to {}",
            links.len(),
            page_texts.len(),
            debug_dir.display()
        );
        Ok(debug_dir)
    }
}
