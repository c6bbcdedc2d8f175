//! Xin'an Evening News (新安晚报, `xawb`) fetcher.
//!
//! This paper publishes scanned page images instead of PDFs, and its page
//! URLs are not predictable from the date alone. Both facts change the shape
//! of the fetcher:
//!
//! 1. **Index discovery**: the first `build_url` call fetches the edition's
//!    index page and memoizes the ordered list of page URLs. A failed
//!    discovery is memoized too, so every later call degrades to the index
//!    URL without hitting the network again.
//! 2. **Image conversion**: `find_pdf_url` locates the page scan, downloads it
//!    into the scratch directory, embeds it into a one-page PDF and hands the
//!    crawler a local file reference instead of a remote URL.
//!
//! # URL Pattern
//!
//! Index: `http://epaper.ahwang.cn/xawb/{YYYYMMDD}/html/index.htm`

use std::path::{Path, PathBuf};

use chrono::{NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use tokio::fs;
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument, warn};

use super::{PaperFetcher, resolve_url};
use crate::error::FetchError;
use crate::http::HttpClient;
use crate::models::local_file_ref;
use crate::pdf::embed_image;

pub const XAWB_ROOT: &str = "http://epaper.ahwang.cn/xawb";

static INDEX_ENTRY_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("#breakNewsList1 .bmml_con_div").unwrap());
static INDEX_LINK_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("#breakNewsList1 .bmml_con_div a.bmml_con_div_name").unwrap()
});
static SCAN_CONTAINER_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("#sss > div").unwrap());
static SCAN_IMG_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("#sss img").unwrap());
static BACKGROUND_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"url\(["']?([^"')]+)["']?\)"#).unwrap());

const IMAGE_EXTENSIONS: [&str; 3] = [".jpg", ".jpeg", ".png"];

/// Memoized outcome of index discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
enum PageIndex {
    Resolved(Vec<String>),
    /// Discovery failed; every page maps to the index URL.
    Unavailable,
}

#[derive(Debug)]
pub struct XawbFetcher {
    index_url: String,
    scratch_dir: PathBuf,
    http: HttpClient,
    pages: OnceCell<PageIndex>,
}

impl XawbFetcher {
    pub fn new(date: NaiveDate, scratch_dir: &Path, http: HttpClient) -> Self {
        Self::with_base(XAWB_ROOT, date, scratch_dir, http)
    }

    pub fn with_base(root: &str, date: NaiveDate, scratch_dir: &Path, http: HttpClient) -> Self {
        Self {
            index_url: format!(
                "{}/{}/html/index.htm",
                root.trim_end_matches('/'),
                date.format("%Y%m%d")
            ),
            scratch_dir: scratch_dir.to_path_buf(),
            http,
            pages: OnceCell::new(),
        }
    }

    #[instrument(level = "info", skip(self), fields(index = %self.index_url))]
    async fn discover_pages(&self) -> PageIndex {
        match self.fetch_page_urls().await {
            Ok(urls) => {
                info!(count = urls.len(), "Discovered page URLs");
                PageIndex::Resolved(urls)
            }
            Err(e) => {
                warn!(error = %e, "Index discovery failed; pages fall back to the index URL");
                PageIndex::Unavailable
            }
        }
    }

    async fn fetch_page_urls(&self) -> Result<Vec<String>, FetchError> {
        let document = self.http.get_document(&self.index_url).await?;
        Ok(document
            .select(&INDEX_LINK_SELECTOR)
            .filter_map(|el| el.value().attr("href"))
            .filter(|href| !href.is_empty() && *href != "#")
            .filter_map(|href| resolve_url(&self.index_url, href).ok())
            .collect())
    }

    /// Download the scan at `image_url`, convert it to a one-page PDF in the
    /// scratch directory and return the PDF's path. The image never outlives
    /// this call.
    #[instrument(level = "debug", skip(self))]
    async fn convert_scan(&self, image_url: &str) -> Result<PathBuf, FetchError> {
        let stamp = Utc::now().timestamp_nanos_opt().unwrap_or_default();
        let image_path = self.scratch_dir.join(format!("temp_{stamp}.jpg"));
        let pdf_path = self.scratch_dir.join(format!("temp_{stamp}.pdf"));

        self.http.download_to(image_url, &image_path).await?;
        let converted = embed_image(&image_path, &pdf_path).await;
        if let Err(e) = fs::remove_file(&image_path).await {
            warn!(path = %image_path.display(), error = %e, "Failed to remove scan image");
        }
        if let Err(e) = converted {
            let _ = fs::remove_file(&pdf_path).await;
            return Err(e.into());
        }
        debug!(path = %pdf_path.display(), "Converted scan to PDF");
        Ok(pdf_path)
    }
}

/// Location of the page scan: the last inline `background-image` under
/// `#sss`, or failing that the last `<img>` with an image extension.
fn scan_location(document: &Html) -> Option<String> {
    document
        .select(&SCAN_CONTAINER_SELECTOR)
        .filter_map(|el| el.value().attr("style"))
        .filter_map(|style| BACKGROUND_URL.captures(style))
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
        .last()
        .or_else(|| {
            document
                .select(&SCAN_IMG_SELECTOR)
                .filter_map(|el| el.value().attr("src"))
                .filter(|src| {
                    let lower = src.to_ascii_lowercase();
                    IMAGE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
                })
                .last()
                .map(str::to_string)
        })
}

impl PaperFetcher for XawbFetcher {
    async fn build_url(&self, page: u32) -> String {
        let index = self.pages.get_or_init(|| self.discover_pages()).await;
        match index {
            PageIndex::Resolved(urls) if page >= 1 && (page as usize) <= urls.len() => {
                urls[page as usize - 1].clone()
            }
            _ => self.index_url.clone(),
        }
    }

    /// Counts index entries. The index is authoritative, so an empty index
    /// is an error rather than a default.
    #[instrument(level = "info", skip(self))]
    async fn page_count(&self, url: &str) -> Result<u32, FetchError> {
        let document = self.http.get_document(url).await?;
        let count = document.select(&INDEX_ENTRY_SELECTOR).count();
        if count == 0 {
            return Err(FetchError::NoPages(url.to_string()));
        }
        Ok(count as u32)
    }

    async fn find_pdf_url(&self, document: &Html, base_url: &str) -> Result<String, FetchError> {
        let location =
            scan_location(document).ok_or_else(|| FetchError::LinkNotFound(base_url.to_string()))?;
        let image_url = resolve_url(base_url, &location)?;
        let pdf_path = self.convert_scan(&image_url).await?;
        Ok(local_file_ref(&pdf_path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HttpSettings;
    use crate::models::parse_local_file_ref;
    use crate::pdf::tests::jpeg_bytes;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const DATE_DIR: &str = "/xawb/20251109/html";

    fn fetcher(root: &str, scratch: &Path) -> XawbFetcher {
        let date = NaiveDate::from_ymd_opt(2025, 11, 9).unwrap();
        XawbFetcher::with_base(
            root,
            date,
            scratch,
            HttpClient::new(&HttpSettings::default()).unwrap(),
        )
    }

    fn index_html(pages: &[&str]) -> String {
        let entries: String = pages
            .iter()
            .map(|href| {
                format!(
                    r#"<div class="bmml_con_div"><a class="bmml_con_div_name" href="{href}">page</a></div>"#
                )
            })
            .collect();
        format!(r#"<html><body><div id="breakNewsList1">{entries}</div></body></html>"#)
    }

    #[test]
    fn test_index_url_template() {
        let dir = tempfile::tempdir().unwrap();
        let f = fetcher(XAWB_ROOT, dir.path());
        assert_eq!(
            &f.index_url,
            "http://epaper.ahwang.cn/xawb/20251109/html/index.htm"
        );
    }

    #[test]
    fn test_scan_location_prefers_background() {
        let html = r#"<div id="sss">
            <div style="width:10px; background-image: url('../images/p1.jpg')"></div>
            <div style="background:url(&quot;../images/p2.jpg&quot;) no-repeat"></div>
            <img src="../images/other.jpg">
        </div>"#;
        assert_eq!(
            scan_location(&Html::parse_document(html)).as_deref(),
            Some("../images/p2.jpg")
        );
    }

    #[test]
    fn test_scan_location_img_fallback() {
        let html = r#"<div id="sss"><div style="color:red"></div><img src="a.gif"><img src="b.JPG"></div>"#;
        assert_eq!(
            scan_location(&Html::parse_document(html)).as_deref(),
            Some("b.JPG")
        );
        assert_eq!(scan_location(&Html::parse_document("<div></div>")), None);
    }

    #[tokio::test]
    async fn test_build_url_memoizes_index() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("{DATE_DIR}/index.htm")))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(index_html(&["node_1.htm", "#", "node_2.htm"])),
            )
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let f = fetcher(&format!("{}/xawb", server.uri()), dir.path());
        let first = f.build_url(1).await;
        assert_eq!(first, format!("{}{DATE_DIR}/node_1.htm", server.uri()));
        assert_eq!(f.build_url(2).await, format!("{}{DATE_DIR}/node_2.htm", server.uri()));
        assert_eq!(f.build_url(1).await, first);
        assert_eq!(f.build_url(3).await, f.index_url);
        assert_eq!(f.build_url(0).await, f.index_url);
    }

    #[tokio::test]
    async fn test_build_url_memoizes_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let f = fetcher(&format!("{}/xawb", server.uri()), dir.path());
        for page in 1..=3 {
            assert_eq!(f.build_url(page).await, f.index_url);
        }
    }

    #[tokio::test]
    async fn test_page_count_counts_index_entries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(index_html(&["a.htm", "b.htm", "c.htm"])),
            )
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let f = fetcher(&format!("{}/xawb", server.uri()), dir.path());
        assert_eq!(f.page_count(&f.index_url).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_page_count_empty_index_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let f = fetcher(&format!("{}/xawb", server.uri()), dir.path());
        assert!(matches!(
            f.page_count(&f.index_url).await,
            Err(FetchError::NoPages(_))
        ));
    }

    #[tokio::test]
    async fn test_find_pdf_url_converts_scan_locally() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("{DATE_DIR}/images/p1.jpg")))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(jpeg_bytes(30, 40)))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let f = fetcher(&format!("{}/xawb", server.uri()), dir.path());
        let page_url = format!("{}{DATE_DIR}/node_1.htm", server.uri());
        let html = r#"<div id="sss"><div style="background-image:url(images/p1.jpg)"></div></div>"#;

        let location = f
            .find_pdf_url(&Html::parse_document(html), &page_url)
            .await
            .unwrap();

        let pdf = parse_local_file_ref(&location).expect("local file reference");
        assert!(pdf.exists());
        assert_eq!(lopdf::Document::load(&pdf).unwrap().get_pages().len(), 1);
        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "jpg"))
            .collect();
        assert!(leftovers.is_empty(), "scan image should be removed");
    }

    #[tokio::test]
    async fn test_find_pdf_url_without_scan() {
        let dir = tempfile::tempdir().unwrap();
        let f = fetcher(XAWB_ROOT, dir.path());
        let err = f
            .find_pdf_url(&Html::parse_document("<p></p>"), &f.index_url)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::LinkNotFound(_)));
    }

    #[tokio::test]
    async fn test_unreadable_scan_leaves_no_files() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"not an image".to_vec()))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let f = fetcher(&format!("{}/xawb", server.uri()), dir.path());
        let html = r#"<div id="sss"><img src="p1.jpg"></div>"#;
        let err = f
            .find_pdf_url(
                &Html::parse_document(html),
                &format!("{}{DATE_DIR}/node_1.htm", server.uri()),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Pdf(_)));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
