//! Data models for one edition run.
//!
//! - [`Edition`]: one publication's issue for one day, plus the per-page
//!   artifacts collected while the crawler walks it
//! - [`PageOutcome`]: the result of producing a single page
//! - [`RunReport`]: what a finished run hands back to the caller
//!
//! Dates are always expressed in the publishers' civil timezone (UTC+8),
//! regardless of the host's locale.

use std::path::{Path, PathBuf};

use chrono::{FixedOffset, NaiveDate, Utc};

use crate::error::{CrawlError, FetchError};

/// Offset of the publishers' civil timezone from UTC, in seconds.
const EDITION_UTC_OFFSET_SECS: i32 = 8 * 3600;

/// File extension of every per-page and merged artifact.
pub const ARTIFACT_EXT: &str = "pdf";

/// Resolve the target date of an edition.
///
/// `None` means "today" in the publishers' timezone; otherwise the input
/// must be an ISO calendar date (`YYYY-MM-DD`).
pub fn resolve_date(input: Option<&str>) -> Result<NaiveDate, CrawlError> {
    match input.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(today()),
        Some(raw) => {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|source| CrawlError::InvalidDate {
                input: raw.to_string(),
                source,
            })
        }
    }
}

/// Today's date in the publishers' timezone.
pub fn today() -> NaiveDate {
    let offset = FixedOffset::east_opt(EDITION_UTC_OFFSET_SECS).expect("offset within a day");
    Utc::now().with_timezone(&offset).date_naive()
}

/// Where an invocation writes its artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    /// Per-page artifacts; transient.
    pub pages_dir: PathBuf,
    /// Root of the dated merge directories; durable.
    pub merged_root: PathBuf,
}

/// One publication's issue for one day.
#[derive(Debug, Clone)]
pub struct Edition {
    pub code: String,
    pub date: NaiveDate,
    pub pages_dir: PathBuf,
    pub merged_dir: PathBuf,
    page_count: Option<u32>,
    artifacts: Vec<PathBuf>,
}

impl Edition {
    pub fn new(code: &str, date: NaiveDate, layout: &OutputLayout) -> Self {
        let merged_dir = layout.merged_root.join(date.format("%Y%m%d").to_string());
        Self {
            code: code.to_string(),
            date,
            pages_dir: layout.pages_dir.clone(),
            merged_dir,
            page_count: None,
            artifacts: Vec::new(),
        }
    }

    /// Build an edition from an optional `YYYY-MM-DD` date, defaulting to
    /// today. Nothing touches the filesystem or the network.
    pub fn resolve(
        code: &str,
        date: Option<&str>,
        layout: &OutputLayout,
    ) -> Result<Self, CrawlError> {
        Ok(Self::new(code, resolve_date(date)?, layout))
    }

    /// `YYYYMMDD`, as used in artifact names and directories.
    pub fn compact_date(&self) -> String {
        self.date.format("%Y%m%d").to_string()
    }

    /// `YYYY-MM-DD`, for display.
    pub fn date_string(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }

    /// `{pages_dir}/{code}_{YYYYMMDD}_{page:02}.pdf`
    pub fn page_path(&self, page: u32) -> PathBuf {
        self.pages_dir.join(format!(
            "{}_{}_{:02}.{}",
            self.code,
            self.compact_date(),
            page,
            ARTIFACT_EXT
        ))
    }

    /// `{merged_root}/{YYYYMMDD}/{code}_{YYYYMMDD}.pdf`
    pub fn merged_path(&self) -> PathBuf {
        self.merged_dir.join(format!(
            "{}_{}.{}",
            self.code,
            self.compact_date(),
            ARTIFACT_EXT
        ))
    }

    pub fn page_count(&self) -> Option<u32> {
        self.page_count
    }

    /// Record the discovered page count. The first value wins.
    pub(crate) fn set_page_count(&mut self, count: u32) {
        if self.page_count.is_none() {
            self.page_count = Some(count);
        }
    }

    pub fn artifacts(&self) -> &[PathBuf] {
        &self.artifacts
    }

    pub(crate) fn push_artifact(&mut self, path: PathBuf) {
        self.artifacts.push(path);
    }
}

/// Result of producing one page.
#[derive(Debug)]
pub enum PageOutcome {
    Saved(PathBuf),
    Skipped(FetchError),
}

/// Summary of a successful edition run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub code: String,
    pub date: NaiveDate,
    pub page_count: u32,
    pub saved_pages: Vec<u32>,
    pub skipped_pages: Vec<u32>,
    pub merged_path: PathBuf,
    pub cleanup_failures: usize,
}

/// Marker prefix for a document that already exists on local disk.
pub const LOCAL_FILE_SCHEME: &str = "file://";

/// Reference a local file so the crawler copies it instead of downloading.
pub fn local_file_ref(path: &Path) -> String {
    format!("{}{}", LOCAL_FILE_SCHEME, path.display())
}

/// Inverse of [`local_file_ref`]; `None` for remote locations.
pub fn parse_local_file_ref(location: &str) -> Option<PathBuf> {
    location.strip_prefix(LOCAL_FILE_SCHEME).map(PathBuf::from)
}
