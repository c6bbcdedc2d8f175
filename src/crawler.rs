//! Edition orchestrator.
//!
//! A [`Crawler`] drives one [`PaperFetcher`] through the whole lifecycle of
//! an edition:
//!
//! 1. **Directories**: ensure the per-page and dated merge directories exist
//! 2. **Page count**: ask the fetcher how many pages page 1 advertises
//! 3. **Download**: walk pages `1..=count` in order; a page that fails at any
//!    step is logged and skipped, never retried
//! 4. **Merge**: concatenate the saved pages, in page order, into the dated
//!    merge directory, replacing any stale file from an earlier run
//! 5. **Cleanup**: delete the per-page artifacts; failures are only warnings
//!
//! Pages are processed strictly one after another, so the artifact list is
//! always in ascending page order without any synchronisation.

use std::path::PathBuf;
use std::time::Duration;

use tokio::fs;
use tracing::{error, info, instrument, warn};

use crate::error::{CrawlError, FetchError};
use crate::fetchers::PaperFetcher;
use crate::http::HttpClient;
use crate::models::{Edition, OutputLayout, PageOutcome, RunReport, parse_local_file_ref};
use crate::pdf::{DocumentMerger, PdfMerger};

/// Settings shared by every edition of an invocation.
#[derive(Debug, Clone)]
pub struct CrawlSettings {
    pub layout: OutputLayout,
    /// Pause right before and right after the merge.
    pub settle_delay: Duration,
}

pub struct Crawler<F, M = PdfMerger> {
    edition: Edition,
    fetcher: F,
    http: HttpClient,
    merger: M,
    settle_delay: Duration,
}

impl<F: PaperFetcher> Crawler<F, PdfMerger> {
    pub fn new(edition: Edition, fetcher: F, http: HttpClient, settings: &CrawlSettings) -> Self {
        Self {
            edition,
            fetcher,
            http,
            merger: PdfMerger,
            settle_delay: settings.settle_delay,
        }
    }
}

impl<F: PaperFetcher, M: DocumentMerger> Crawler<F, M> {
    /// Swap the merge collaborator.
    pub fn with_merger<N: DocumentMerger>(self, merger: N) -> Crawler<F, N> {
        Crawler {
            edition: self.edition,
            fetcher: self.fetcher,
            http: self.http,
            merger,
            settle_delay: self.settle_delay,
        }
    }

    pub fn edition(&self) -> &Edition {
        &self.edition
    }

    /// Run the edition end to end.
    #[instrument(level = "info", skip(self), fields(code = %self.edition.code, date = %self.edition.date_string()))]
    pub async fn run(mut self) -> Result<RunReport, CrawlError> {
        info!("Starting edition");
        self.create_directories().await?;

        let first_url = self.fetcher.build_url(1).await;
        let count = self
            .fetcher
            .page_count(&first_url)
            .await
            .map_err(|source| CrawlError::PageCount {
                code: self.edition.code.clone(),
                source,
            })?;
        self.edition.set_page_count(count);
        info!(count, "Discovered page count");

        let mut saved_pages = Vec::new();
        let mut skipped_pages = Vec::new();
        for page in 1..=count {
            match self.fetch_page(page).await {
                PageOutcome::Saved(path) => {
                    info!(page, path = %path.display(), "Saved page");
                    self.edition.push_artifact(path);
                    saved_pages.push(page);
                }
                PageOutcome::Skipped(e) => {
                    warn!(page, error = %e, "Skipping page");
                    skipped_pages.push(page);
                }
            }
        }

        if self.edition.artifacts().is_empty() {
            error!(count, "No page could be retrieved");
            return Err(CrawlError::NoContent {
                code: self.edition.code.clone(),
            });
        }

        let merged_path = self.merge().await?;
        let cleanup_failures = self.cleanup().await;

        Ok(RunReport {
            code: self.edition.code.clone(),
            date: self.edition.date,
            page_count: self.edition.page_count().unwrap_or(count),
            saved_pages,
            skipped_pages,
            merged_path,
            cleanup_failures,
        })
    }

    async fn create_directories(&self) -> Result<(), CrawlError> {
        for dir in [&self.edition.pages_dir, &self.edition.merged_dir] {
            fs::create_dir_all(dir)
                .await
                .map_err(|source| CrawlError::CreateDir {
                    code: self.edition.code.clone(),
                    path: dir.clone(),
                    source,
                })?;
        }
        info!(
            pages_dir = %self.edition.pages_dir.display(),
            merged_dir = %self.edition.merged_dir.display(),
            "Output directories ready"
        );
        Ok(())
    }

    async fn fetch_page(&self, page: u32) -> PageOutcome {
        match self.try_fetch_page(page).await {
            Ok(path) => PageOutcome::Saved(path),
            Err(e) => PageOutcome::Skipped(e),
        }
    }

    #[instrument(level = "debug", skip(self))]
    async fn try_fetch_page(&self, page: u32) -> Result<PathBuf, FetchError> {
        let url = self.fetcher.build_url(page).await;
        let document = self.http.get_document(&url).await?;
        let location = self.fetcher.find_pdf_url(&document, &url).await?;
        info!(page, %location, "Found page document");

        let dest = self.edition.page_path(page);
        match parse_local_file_ref(&location) {
            Some(local) => {
                let copied = fs::copy(&local, &dest).await;
                if let Err(e) = fs::remove_file(&local).await {
                    warn!(path = %local.display(), error = %e, "Failed to remove temporary document");
                }
                copied.map_err(|e| FetchError::io(&local, e))?;
            }
            None => {
                self.http.download_to(&location, &dest).await?;
            }
        }
        Ok(dest)
    }

    async fn merge(&self) -> Result<PathBuf, CrawlError> {
        let output = self.edition.merged_path();
        match fs::remove_file(&output).await {
            Ok(()) => info!(path = %output.display(), "Removed stale merged file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(source) => {
                return Err(CrawlError::StaleOutput {
                    code: self.edition.code.clone(),
                    path: output,
                    source,
                });
            }
        }

        self.settle().await;
        info!(pages = self.edition.artifacts().len(), "Merging pages");
        self.merger
            .merge(self.edition.artifacts(), &output)
            .await
            .map_err(|source| CrawlError::Merge {
                code: self.edition.code.clone(),
                source,
            })?;
        info!(path = %output.display(), "Merged edition written");
        self.settle().await;
        Ok(output)
    }

    /// Delete every per-page artifact, returning how many deletions failed.
    async fn cleanup(&self) -> usize {
        let mut failures = 0;
        for path in self.edition.artifacts() {
            if let Err(e) = fs::remove_file(path).await {
                warn!(path = %path.display(), error = %e, "Failed to delete page artifact");
                failures += 1;
            }
        }
        info!(
            removed = self.edition.artifacts().len() - failures,
            failed = failures,
            "Cleaned up page artifacts"
        );
        failures
    }

    async fn settle(&self) {
        if !self.settle_delay.is_zero() {
            info!(delay = ?self.settle_delay, "Waiting for filesystem to settle");
            tokio::time::sleep(self.settle_delay).await;
        }
    }
}
