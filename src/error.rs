//! Error types for fetching, document assembly and edition runs.
//!
//! Three tiers mirror how failures are handled:
//! - [`FetchError`]: anything that goes wrong while producing one page. The
//!   crawler logs it and moves on to the next page.
//! - [`PdfError`]: failures inside the merge or image-embedding collaborators.
//! - [`CrawlError`]: fatal to one edition. Every variant that can happen after
//!   construction names the publication code so a multi-edition invocation
//!   can report each failure distinctly.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failure while fetching or materialising a single page.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid url {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("no document link found on {0}")]
    LinkNotFound(String),
    #[error("no page entries found on {0}")]
    NoPages(String),
    #[error("io error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Pdf(#[from] PdfError),
}

impl FetchError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Failure inside the PDF merge or image-embedding collaborators.
#[derive(Debug, Error)]
pub enum PdfError {
    #[error("failed to load {}: {source}", path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: lopdf::Error,
    },
    #[error("failed to save {}: {source}", path.display())]
    Save {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to encode page content: {0}")]
    Encode(#[source] lopdf::Error),
    #[error("no page tree found in merge inputs")]
    MissingPageTree,
    #[error("no documents to merge")]
    NoInputs,
    #[error("failed to read image {}: {source}", path.display())]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("io error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("document task aborted: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Failure that aborts one edition run.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("invalid date {input:?}, expected YYYY-MM-DD: {source}")]
    InvalidDate {
        input: String,
        #[source]
        source: chrono::ParseError,
    },
    #[error("unknown publication code {0:?}")]
    UnknownPublication(String),
    #[error("[{code}] failed to create directory {}: {source}", path.display())]
    CreateDir {
        code: String,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("[{code}] page count discovery failed: {source}")]
    PageCount {
        code: String,
        #[source]
        source: FetchError,
    },
    #[error("[{code}] no content retrieved")]
    NoContent { code: String },
    #[error("[{code}] failed to remove stale merged file {}: {source}", path.display())]
    StaleOutput {
        code: String,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("[{code}] merge failed: {source}")]
    Merge {
        code: String,
        #[source]
        source: PdfError,
    },
}

impl CrawlError {
    /// Short name of the stage that failed, used as a log field.
    pub fn stage(&self) -> &'static str {
        match self {
            CrawlError::InvalidDate { .. } | CrawlError::UnknownPublication(_) => "construction",
            CrawlError::CreateDir { .. } => "directories",
            CrawlError::PageCount { .. } => "page_count",
            CrawlError::NoContent { .. }
            | CrawlError::StaleOutput { .. }
            | CrawlError::Merge { .. } => "merging",
        }
    }
}

/// Failure loading the YAML configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}
