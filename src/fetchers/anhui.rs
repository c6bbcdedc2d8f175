//! Anhui daily family fetcher.
//!
//! The papers of the Anhui Daily group share the same layout pages as the
//! People's Daily family but differ per paper in host, path and page-number
//! padding, and in where the PDF link lives on a page.
//!
//! | Code | Paper | Template | Padding | PDF link |
//! |------|-------|----------|---------|----------|
//! | `ahrb` | 安徽日报 | `szb.ahnews.com.cn/ahrb/layout` | 2 | download anchor |
//! | `ncb` | 安徽日报农村版 | `szb.ahnews.com.cn/ncb/layout` | 2 | download anchor |
//! | `fzb` | 安徽法治报 | `szb.ahnews.com.cn/fzb/layout` | 2 | download anchor |
//! | `jhsb` | 江淮时报 | `szb.ahnews.com.cn/jhsb/pc/layout` | none | download anchor |
//! | `pc` | 安徽商报 | `ahsbszb.ahnews.com.cn/pc/layout` | none | text of `#pdfUrl` |

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use tracing::{debug, instrument};

use super::{PaperFetcher, count_layout_pages, generic_pdf_href, last_pdf_href, resolve_url};
use crate::error::FetchError;
use crate::http::HttpClient;

const AHNEWS_ROOT: &str = "https://szb.ahnews.com.cn";
const AHSB_ROOT: &str = "https://ahsbszb.ahnews.com.cn";

static DOWNLOAD_ANCHOR_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(
        "body > div.Newslistbox > div.Newsmain > div.newscon.clearfix > div.newsside > ul > \
         li.oneclick1 > div > div > p:nth-child(1) > a:nth-child(2)",
    )
    .unwrap()
});
static PDF_URL_TEXT_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("#pdfUrl").unwrap());

/// Papers of the Anhui daily family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnhuiPaper {
    Ahrb,
    Ncb,
    Fzb,
    Jhsb,
    Pc,
}

/// Where a page keeps its PDF location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LinkSource {
    DownloadAnchor,
    ElementText,
}

impl AnhuiPaper {
    pub const ALL: [AnhuiPaper; 5] = [
        AnhuiPaper::Ahrb,
        AnhuiPaper::Ncb,
        AnhuiPaper::Fzb,
        AnhuiPaper::Jhsb,
        AnhuiPaper::Pc,
    ];

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.code() == code)
    }

    pub fn code(self) -> &'static str {
        match self {
            AnhuiPaper::Ahrb => "ahrb",
            AnhuiPaper::Ncb => "ncb",
            AnhuiPaper::Fzb => "fzb",
            AnhuiPaper::Jhsb => "jhsb",
            AnhuiPaper::Pc => "pc",
        }
    }

    fn default_root(self) -> &'static str {
        match self {
            AnhuiPaper::Pc => AHSB_ROOT,
            _ => AHNEWS_ROOT,
        }
    }

    fn layout_path(self) -> &'static str {
        match self {
            AnhuiPaper::Ahrb => "ahrb/layout",
            AnhuiPaper::Ncb => "ncb/layout",
            AnhuiPaper::Fzb => "fzb/layout",
            AnhuiPaper::Jhsb => "jhsb/pc/layout",
            AnhuiPaper::Pc => "pc/layout",
        }
    }

    /// Zero-padding width of the page number; 0 means none.
    fn page_width(self) -> usize {
        match self {
            AnhuiPaper::Jhsb | AnhuiPaper::Pc => 0,
            _ => 2,
        }
    }

    fn link_source(self) -> LinkSource {
        match self {
            AnhuiPaper::Pc => LinkSource::ElementText,
            _ => LinkSource::DownloadAnchor,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AnhuiFetcher {
    paper: AnhuiPaper,
    layout_base: String,
    date: NaiveDate,
    http: HttpClient,
}

impl AnhuiFetcher {
    pub fn new(paper: AnhuiPaper, date: NaiveDate, http: HttpClient) -> Self {
        Self::with_base(paper.default_root(), paper, date, http)
    }

    pub fn with_base(root: &str, paper: AnhuiPaper, date: NaiveDate, http: HttpClient) -> Self {
        Self {
            paper,
            layout_base: format!("{}/{}", root.trim_end_matches('/'), paper.layout_path()),
            date,
            http,
        }
    }

    fn specific_href(&self, document: &Html) -> Option<String> {
        match self.paper.link_source() {
            LinkSource::DownloadAnchor => last_pdf_href(document, &DOWNLOAD_ANCHOR_SELECTOR),
            LinkSource::ElementText => document
                .select(&PDF_URL_TEXT_SELECTOR)
                .next()
                .map(|el| el.text().collect::<String>().trim().to_string())
                .filter(|text| !text.is_empty()),
        }
    }
}

impl PaperFetcher for AnhuiFetcher {
    async fn build_url(&self, page: u32) -> String {
        format!(
            "{}/{}/node_{:0width$}.html",
            self.layout_base,
            self.date.format("%Y%m/%d"),
            page,
            width = self.paper.page_width()
        )
    }

    #[instrument(level = "info", skip(self), fields(code = self.paper.code()))]
    async fn page_count(&self, url: &str) -> Result<u32, FetchError> {
        let document = self.http.get_document(url).await?;
        let count = count_layout_pages(&document);
        debug!(count, "Counted layout pages");
        Ok(count)
    }

    async fn find_pdf_url(&self, document: &Html, base_url: &str) -> Result<String, FetchError> {
        let href = self
            .specific_href(document)
            .or_else(|| generic_pdf_href(document))
            .ok_or_else(|| FetchError::LinkNotFound(base_url.to_string()))?;
        resolve_url(base_url, &href)
    }
}
