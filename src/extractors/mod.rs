// src/extractors/mod.rs
pub mod outline;
pub mod toc;

// Re-export key extraction types for convenience
pub use outline::Outline;
pub use toc::{RawLink, TocExtractor};
