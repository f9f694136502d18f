//! Source collaborators: raw snapshot shapes and the fetch traits the
//! engine consumes.
//!
//! Fetchers return untrimmed, string-typed rows exactly as scraped; the
//! normalizer owns all cleanup and parsing. Any failure here is fatal to
//! that source only; the engine isolates it from sibling pipelines.

use async_trait::async_trait;
use thiserror::Error;

pub mod bno;
pub mod moh;
pub mod nhc;

pub use bno::BnoFetcher;
pub use moh::MohFetcher;
pub use nhc::NhcFetcher;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("page structure mismatch: {0}")]
    Shape(String),
}

/// One article row as scraped: source-local date format, possibly messy text.
#[derive(Debug, Clone, Default)]
pub struct RawArticle {
    pub title: String,
    pub link: String,
    pub date: String,
}

/// The MOH dashboard snapshot: headline counters plus an article table.
#[derive(Debug, Clone, Default)]
pub struct RawStatus {
    pub confirmed_cases: String,
    pub alert_level: String,
    pub articles: Vec<RawArticle>,
}

/// One row of the BNO per-region case table.
#[derive(Debug, Clone, Default)]
pub struct RawRegionRow {
    pub region: String,
    pub cases: String,
    pub deaths: String,
    pub notes: String,
}

#[async_trait]
pub trait ArticleFetcher: Send + Sync {
    async fn fetch(&self) -> Result<Vec<RawArticle>, FetchError>;
}

#[async_trait]
pub trait StatusFetcher: Send + Sync {
    async fn fetch(&self) -> Result<RawStatus, FetchError>;
}

#[async_trait]
pub trait RegionTableFetcher: Send + Sync {
    async fn fetch(&self) -> Result<Vec<RawRegionRow>, FetchError>;
}
