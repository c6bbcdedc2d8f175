//! Publisher-specific fetchers behind one capability contract.
//!
//! Every publication the crawler knows about is served by one of three
//! variants. They differ only in how they build page URLs, how they discover
//! the page count, and how they find the downloadable document on a page:
//!
//! | Variant | Module | Pages | Notes |
//! |---------|--------|-------|-------|
//! | People's Daily family | [`people`] | PDF links | `node_NN.html`, zero padded |
//! | Anhui daily family | [`anhui`] | PDF links | per-paper template and link selector |
//! | Xin'an Evening News | [`xawb`] | JPEG scans | page URLs come from an index page; images are converted locally |
//!
//! The crawler only ever talks to a [`PaperFetcher`]; it never inspects which
//! variant it holds.
//!
//! # Common Patterns
//!
//! - Page-count discovery degrades to a fixed default instead of failing
//! - PDF link extraction tries a publisher-specific selector first, then a
//!   generic "link to a .pdf labelled PDF" heuristic where the last match wins
//! - Relative locations are resolved against the page URL before returning

pub mod anhui;
pub mod people;
pub mod xawb;

use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use url::Url;

use crate::error::FetchError;

pub use anhui::AnhuiFetcher;
pub use people::PeopleFetcher;
pub use xawb::XawbFetcher;

/// What the crawler needs from a publisher.
///
/// Page numbers are 1-based and contiguous.
pub trait PaperFetcher {
    /// Source URL of `page`.
    async fn build_url(&self, page: u32) -> String;

    /// Fetch `url` and count the edition's pages.
    async fn page_count(&self, url: &str) -> Result<u32, FetchError>;

    /// Location of the page's document, given the already-fetched page.
    ///
    /// Either an absolute remote URL, or a local file reference (see
    /// [`crate::models::local_file_ref`]) when the document was produced
    /// on disk.
    async fn find_pdf_url(&self, document: &Html, base_url: &str) -> Result<String, FetchError>;
}

/// The closed set of fetcher variants, selected once per edition.
#[derive(Debug)]
pub enum Fetcher {
    People(PeopleFetcher),
    Anhui(AnhuiFetcher),
    Xawb(XawbFetcher),
}

impl PaperFetcher for Fetcher {
    async fn build_url(&self, page: u32) -> String {
        match self {
            Fetcher::People(f) => f.build_url(page).await,
            Fetcher::Anhui(f) => f.build_url(page).await,
            Fetcher::Xawb(f) => f.build_url(page).await,
        }
    }

    async fn page_count(&self, url: &str) -> Result<u32, FetchError> {
        match self {
            Fetcher::People(f) => f.page_count(url).await,
            Fetcher::Anhui(f) => f.page_count(url).await,
            Fetcher::Xawb(f) => f.page_count(url).await,
        }
    }

    async fn find_pdf_url(&self, document: &Html, base_url: &str) -> Result<String, FetchError> {
        match self {
            Fetcher::People(f) => f.find_pdf_url(document, base_url).await,
            Fetcher::Anhui(f) => f.find_pdf_url(document, base_url).await,
            Fetcher::Xawb(f) => f.find_pdf_url(document, base_url).await,
        }
    }
}

/// Page count used when neither layout selector matches anything.
pub const DEFAULT_PAGE_COUNT: u32 = 8;

static LAYOUT_PAGE_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("body > div.main.w1000 > div.right.right-main > div.swiper-box > div > div")
        .unwrap()
});
static LAYOUT_PAGE_FALLBACK_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".swiper-slide").unwrap());
static ANCHOR_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a").unwrap());

/// Count pages on a "layout" style front page (People's Daily and Anhui
/// daily families share the markup).
pub(crate) fn count_layout_pages(document: &Html) -> u32 {
    let primary = document.select(&LAYOUT_PAGE_SELECTOR).count();
    if primary > 0 {
        return primary as u32;
    }
    let fallback = document.select(&LAYOUT_PAGE_FALLBACK_SELECTOR).count();
    if fallback > 0 {
        return fallback as u32;
    }
    DEFAULT_PAGE_COUNT
}

/// `href` of the last element matching `selector` whose target contains `.pdf`.
pub(crate) fn last_pdf_href(document: &Html, selector: &Selector) -> Option<String> {
    document
        .select(selector)
        .filter_map(|el| el.value().attr("href"))
        .filter(|href| href.contains(".pdf"))
        .last()
        .map(str::to_string)
}

/// Generic fallback: the last `<a>` whose `href` contains `.pdf` and whose
/// visible text contains `PDF`.
pub(crate) fn generic_pdf_href(document: &Html) -> Option<String> {
    document
        .select(&ANCHOR_SELECTOR)
        .filter(|el| el.text().collect::<String>().contains("PDF"))
        .filter_map(|el| el.value().attr("href"))
        .filter(|href| href.contains(".pdf"))
        .last()
        .map(str::to_string)
}

/// Resolve `location` against `base`. Absolute locations come back unchanged.
pub fn resolve_url(base: &str, location: &str) -> Result<String, FetchError> {
    if Url::parse(location).is_ok() {
        return Ok(location.to_string());
    }
    let base_url = Url::parse(base).map_err(|source| FetchError::InvalidUrl {
        url: base.to_string(),
        source,
    })?;
    base_url
        .join(location)
        .map(|u| u.to_string())
        .map_err(|source| FetchError::InvalidUrl {
            url: location.to_string(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_layout_pages_primary() {
        let html = r#"<html><body><div class="main w1000"><div class="right right-main">
            <div class="swiper-box"><div><div>1</div><div>2</div><div>3</div></div></div>
            </div></div></body></html>"#;
        assert_eq!(count_layout_pages(&Html::parse_document(html)), 3);
    }

    #[test]
    fn test_count_layout_pages_fallback() {
        let html = r#"<div class="swiper-slide"></div><div class="swiper-slide"></div>"#;
        assert_eq!(count_layout_pages(&Html::parse_document(html)), 2);
    }

    #[test]
    fn test_count_layout_pages_default() {
        let html = "<html><body><p>nothing here</p></body></html>";
        assert_eq!(
            count_layout_pages(&Html::parse_document(html)),
            DEFAULT_PAGE_COUNT
        );
    }

    #[test]
    fn test_generic_pdf_href_last_match_wins() {
        let html = r#"
            <a href="/a.pdf">PDF download</a>
            <a href="/ignored.pdf">no marker</a>
            <a href="/b.pdf">get PDF</a>
            <a href="/c.html">PDF page</a>"#;
        assert_eq!(
            generic_pdf_href(&Html::parse_document(html)).as_deref(),
            Some("/b.pdf")
        );
    }

    #[test]
    fn test_generic_pdf_href_none() {
        let html = r#"<a href="/a.html">PDF</a>"#;
        assert_eq!(generic_pdf_href(&Html::parse_document(html)), None);
    }

    #[test]
    fn test_last_pdf_href_filters_extension() {
        let html = r#"<div class="x"><a href="/one.pdf">1</a><a href="/two.html">2</a></div>"#;
        let sel = Selector::parse("div.x a").unwrap();
        assert_eq!(
            last_pdf_href(&Html::parse_document(html), &sel).as_deref(),
            Some("/one.pdf")
        );
    }

    #[test]
    fn test_resolve_url_relative() {
        let resolved = resolve_url(
            "https://paper.people.com.cn/rmrb/pc/layout/202511/09/node_01.html",
            "../../../attachement/202511/09/a.pdf",
        )
        .unwrap();
        assert_eq!(
            resolved,
            "https://paper.people.com.cn/rmrb/pc/attachement/202511/09/a.pdf"
        );
    }

    #[test]
    fn test_resolve_url_absolute_unchanged() {
        let absolute = "https://cdn.example.com/files/a.pdf";
        assert_eq!(
            resolve_url("https://paper.people.com.cn/x.html", absolute).unwrap(),
            absolute
        );
    }

    #[test]
    fn test_resolve_url_bad_base() {
        let err = resolve_url("not a url", "a.pdf").unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl { .. }));
    }
}
