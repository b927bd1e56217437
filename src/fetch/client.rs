// src/fetch/client.rs
use crate::utils::error::FetchError;
use once_cell::sync::Lazy;
use reqwest::{header, Url};
use scraper::{Html, Selector};
use std::time::Duration;

const FETCH_USER_AGENT: &str = concat!("drhp_splitter/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT_SECS: u64 = 60;
const PDF_EXTENSION: &str = ".pdf";
/// Query marker used by embedded PDF viewers for the real document URL.
const FILE_PARAM: &str = "file=";

static IFRAME_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("iframe").expect("Failed to compile IFRAME_SELECTOR"));

/// Creates a reqwest client configured for document downloads.
fn build_client() -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .user_agent(FETCH_USER_AGENT)
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .build()
}

/// True when the URL (trimmed, any case) ends in `.pdf`.
pub fn is_pdf_url(url: &str) -> bool {
    url.trim().to_lowercase().ends_with(PDF_EXTENSION)
}

/// The document URL named by the first `<iframe>` on a page: the part after
/// `file=` if present, else the whole `src`.
pub fn frame_target(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let src = document
        .select(&IFRAME_SELECTOR)
        .next()?
        .value()
        .attr("src")
        .unwrap_or_default();
    let target = match src.split_once(FILE_PARAM) {
        Some((_, after)) => after.split(FILE_PARAM).next().unwrap_or(after),
        None => src,
    };
    Some(target.trim().to_string())
}

/// Resolves a frame target against the page it came from.
pub fn resolve_target(page_url: &str, target: &str) -> Result<String, FetchError> {
    if let Ok(absolute) = Url::parse(target) {
        return Ok(absolute.to_string());
    }
    let base = Url::parse(page_url).map_err(|e| FetchError::InvalidUrl {
        url: page_url.to_string(),
        reason: e.to_string(),
    })?;
    base.join(target)
        .map(|u| u.to_string())
        .map_err(|e| FetchError::InvalidUrl {
            url: target.to_string(),
            reason: e.to_string(),
        })
}

async fn get(client: &reqwest::Client, url: &str, accept: &str) -> Result<reqwest::Response, FetchError> {
    tracing::debug!("GET {}", url);
    let response = client
        .get(url)
        .header(header::ACCEPT, accept)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        tracing::error!("HTTP error status: {} for URL: {}", status, url);
        return Err(FetchError::Http {
            status,
            url: url.to_string(),
        });
    }
    Ok(response)
}

async fn download_pdf(client: &reqwest::Client, url: &str) -> Result<Vec<u8>, FetchError> {
    let response = get(client, url, "application/pdf,*/*").await?;
    let bytes = response.bytes().await?;
    tracing::info!("Downloaded {} bytes from {}", bytes.len(), url);
    Ok(bytes.to_vec())
}

/// Downloads the PDF behind `url`, following one level of iframe
/// indirection when the URL is a viewer page. Returns the bytes and the URL
/// they were fetched from.
pub async fn fetch_pdf(url: &str) -> Result<(Vec<u8>, String), FetchError> {
    let client = build_client()?;
    let url = url.trim();

    if is_pdf_url(url) {
        return Ok((download_pdf(&client, url).await?, url.to_string()));
    }

    tracing::info!("Not a direct PDF link, looking for an embedded viewer: {}", url);
    let page = get(&client, url, "text/html,*/*").await?.text().await?;
    let pdf_url = match frame_target(&page) {
        Some(target) if !target.is_empty() => resolve_target(url, &target)?,
        _ => url.to_string(),
    };

    if !is_pdf_url(&pdf_url) {
        return Err(FetchError::NotAPdf(pdf_url));
    }
    tracing::debug!("Resolved viewer page to {}", pdf_url);
    Ok((download_pdf(&client, &pdf_url).await?, pdf_url))
}
