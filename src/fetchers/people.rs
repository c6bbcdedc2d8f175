//! People's Daily family fetcher.
//!
//! Covers every paper hosted on [paper.people.com.cn](https://paper.people.com.cn):
//! 人民日报 (`rmrb`), 健康时报 (`jksb`), 中国城市报 (`zgcsb`) and 讽刺与幽默 (`fcyym`).
//!
//! # URL Pattern
//!
//! `https://paper.people.com.cn/{code}/pc/layout/{YYYYMM}/{DD}/node_{NN}.html`,
//! with the page number zero padded to two digits. Each page links its PDF
//! from the download button under the page scan.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use tracing::{debug, instrument};

use super::{PaperFetcher, count_layout_pages, generic_pdf_href, last_pdf_href, resolve_url};
use crate::error::FetchError;
use crate::http::HttpClient;

pub const PEOPLE_ROOT: &str = "https://paper.people.com.cn";

static PDF_BUTTON_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("body > div.main.w1000 > div.left.paper-box > div.paper-bot > p.right.btn > a")
        .unwrap()
});

#[derive(Debug, Clone)]
pub struct PeopleFetcher {
    code: String,
    layout_base: String,
    date: NaiveDate,
    http: HttpClient,
}

impl PeopleFetcher {
    pub fn new(code: &str, date: NaiveDate, http: HttpClient) -> Self {
        Self::with_base(PEOPLE_ROOT, code, date, http)
    }

    /// Same as [`PeopleFetcher::new`] but rooted at `root` instead of the
    /// public site.
    pub fn with_base(root: &str, code: &str, date: NaiveDate, http: HttpClient) -> Self {
        Self {
            code: code.to_string(),
            layout_base: format!("{}/{}/pc/layout", root.trim_end_matches('/'), code),
            date,
            http,
        }
    }
}

impl PaperFetcher for PeopleFetcher {
    async fn build_url(&self, page: u32) -> String {
        format!(
            "{}/{}/node_{:02}.html",
            self.layout_base,
            self.date.format("%Y%m/%d"),
            page
        )
    }

    #[instrument(level = "info", skip(self), fields(code = %self.code))]
    async fn page_count(&self, url: &str) -> Result<u32, FetchError> {
        let document = self.http.get_document(url).await?;
        let count = count_layout_pages(&document);
        debug!(count, "Counted layout pages");
        Ok(count)
    }

    async fn find_pdf_url(&self, document: &Html, base_url: &str) -> Result<String, FetchError> {
        let href = last_pdf_href(document, &PDF_BUTTON_SELECTOR)
            .or_else(|| generic_pdf_href(document))
            .ok_or_else(|| FetchError::LinkNotFound(base_url.to_string()))?;
        resolve_url(base_url, &href)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HttpSettings;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher(root: &str) -> PeopleFetcher {
        let date = NaiveDate::from_ymd_opt(2025, 11, 9).unwrap();
        let http = HttpClient::new(&HttpSettings::default()).unwrap();
        PeopleFetcher::with_base(root, "rmrb", date, http)
    }

    #[tokio::test]
    async fn test_build_url_pads_page() {
        let f = PeopleFetcher::new(
            "jksb",
            NaiveDate::from_ymd_opt(2025, 1, 10).unwrap(),
            HttpClient::new(&HttpSettings::default()).unwrap(),
        );
        assert_eq!(
            f.build_url(3).await,
            "https://paper.people.com.cn/jksb/pc/layout/202501/10/node_03.html"
        );
        assert_eq!(
            f.build_url(12).await,
            "https://paper.people.com.cn/jksb/pc/layout/202501/10/node_12.html"
        );
        assert_eq!(f.build_url(3).await, f.build_url(3).await);
    }

    #[tokio::test]
    async fn test_find_pdf_url_from_button() {
        let f = fetcher(PEOPLE_ROOT);
        let html = r#"<html><body><div class="main w1000"><div class="left paper-box">
            <div class="paper-bot"><p class="right btn"><a href="../../../attachement/202511/09/rmrb01.pdf">PDF下载</a></p></div>
            </div></div></body></html>"#;
        let base = f.build_url(1).await;
        let url = f
            .find_pdf_url(&Html::parse_document(html), &base)
            .await
            .unwrap();
        assert_eq!(
            url,
            "https://paper.people.com.cn/rmrb/pc/attachement/202511/09/rmrb01.pdf"
        );
    }

    #[tokio::test]
    async fn test_find_pdf_url_generic_fallback() {
        let f = fetcher(PEOPLE_ROOT);
        let html = r#"<a href="https://cdn.example.com/p1.pdf">PDF</a>"#;
        let url = f
            .find_pdf_url(&Html::parse_document(html), "https://paper.people.com.cn/x.html")
            .await
            .unwrap();
        assert_eq!(url, "https://cdn.example.com/p1.pdf");
    }

    #[tokio::test]
    async fn test_find_pdf_url_not_found() {
        let f = fetcher(PEOPLE_ROOT);
        let err = f
            .find_pdf_url(&Html::parse_document("<p>no links</p>"), "https://x.test/a.html")
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::LinkNotFound(_)));
    }

    #[tokio::test]
    async fn test_page_count_from_server() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rmrb/pc/layout/202511/09/node_01.html"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<div class="swiper-slide"></div><div class="swiper-slide"></div><div class="swiper-slide"></div>"#,
            ))
            .mount(&server)
            .await;

        let f = fetcher(&server.uri());
        let url = f.build_url(1).await;
        assert_eq!(f.page_count(&url).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_page_count_defaults_when_markup_unknown() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .mount(&server)
            .await;

        let f = fetcher(&server.uri());
        let url = f.build_url(1).await;
        assert_eq!(f.page_count(&url).await.unwrap(), 8);
    }

    #[tokio::test]
    async fn test_page_count_fails_on_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let f = fetcher(&server.uri());
        let url = f.build_url(1).await;
        assert!(matches!(
            f.page_count(&url).await,
            Err(FetchError::Status { status: 503, .. })
        ));
    }
}
