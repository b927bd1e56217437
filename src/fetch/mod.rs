// src/fetch/mod.rs
pub mod client;

use crate::utils::error::FetchError;
use std::path::{Path, PathBuf};

/// Where the source document comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    File(PathBuf),
    Url(String),
}

/// Raw bytes of the source plus a display name for logs and metadata.
#[derive(Debug, Clone)]
pub struct LoadedSource {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Last path segment of a file path or URL.
fn base_name(location: &str) -> String {
    let trimmed = location.trim().trim_end_matches('/');
    let without_query = trimmed.split(['?', '#']).next().unwrap_or(trimmed);
    Path::new(without_query)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| trimmed.to_string())
}

pub async fn load_source(source: &Source) -> Result<LoadedSource, FetchError> {
    match source {
        Source::File(path) => {
            tracing::info!("Reading {}", path.display());
            let bytes = tokio::fs::read(path).await?;
            Ok(LoadedSource {
                name: base_name(&path.to_string_lossy()),
                bytes,
            })
        }
        Source::Url(url) => {
            let (bytes, _resolved) = client::fetch_pdf(url).await?;
            Ok(LoadedSource {
                name: base_name(url),
                bytes,
            })
        }
    }
}
