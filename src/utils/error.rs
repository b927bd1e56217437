// src/utils/error.rs
use thiserror::Error;

/// Failures while acquiring the source document.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Network request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("HTTP error {status} fetching {url}")]
    Http {
        status: reqwest::StatusCode,
        url: String,
    },

    #[error("URL does not point to a PDF file: {0}")]
    NotAPdf(String),

    #[error("Invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum PdfError {
    #[error("Failed to load PDF: {0}")]
    Load(String),

    #[error("Failed to write PDF: {0}")]
    Save(String),

    #[error("Invalid page range {start}-{end} for a document with {page_count} pages")]
    Range {
        start: usize,
        end: usize,
        page_count: usize,
    },

    #[error("Page index {0} is out of bounds")]
    PageOutOfBounds(usize),

    #[error("Malformed PDF structure: {0}")]
    Structure(String),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Archive error: {0}")]
    ZipError(#[from] zip::result::ZipError),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Fetching source failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("PDF processing failed: {0}")]
    Pdf(#[from] PdfError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Data processing failed: {0}")]
    Processing(String),
}
