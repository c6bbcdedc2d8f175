//! Maps publication codes to fetchers and wires them into crawlers.
//!
//! | Family | Codes |
//! |--------|-------|
//! | `people` | `rmrb`, `jksb`, `zgcsb`, `fcyym` |
//! | `anhui` | `ahrb`, `ncb`, `fzb`, `jhsb`, `pc`, `xawb` |

use chrono::NaiveDate;

use crate::crawler::{CrawlSettings, Crawler};
use crate::error::CrawlError;
use crate::fetchers::anhui::AnhuiPaper;
use crate::fetchers::{AnhuiFetcher, Fetcher, PeopleFetcher, XawbFetcher};
use crate::http::HttpClient;
use crate::models::Edition;

const PEOPLE_CODES: [&str; 4] = ["rmrb", "jksb", "zgcsb", "fcyym"];
const ANHUI_CODES: [&str; 6] = ["ahrb", "ncb", "fzb", "jhsb", "pc", "xawb"];

/// Group of publications that share a publisher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    People,
    Anhui,
}

impl Family {
    /// Every code of the family, in the order editions are run by default.
    pub fn codes(self) -> &'static [&'static str] {
        match self {
            Family::People => &PEOPLE_CODES,
            Family::Anhui => &ANHUI_CODES,
        }
    }
}

/// Human-readable name of a publication; unknown codes are echoed back.
pub fn display_name(code: &str) -> &str {
    match code {
        "rmrb" => "人民日报",
        "jksb" => "健康时报",
        "zgcsb" => "中国城市报",
        "fcyym" => "讽刺与幽默",
        "ahrb" => "安徽日报",
        "ncb" => "安徽日报农村版",
        "fzb" => "安徽法治报",
        "jhsb" => "江淮时报",
        "pc" => "安徽商报",
        "xawb" => "新安晚报",
        other => other,
    }
}

/// Concrete fetcher for `code`, bound to `date`.
pub fn fetcher_for(
    code: &str,
    date: NaiveDate,
    http: &HttpClient,
    settings: &CrawlSettings,
) -> Result<Fetcher, CrawlError> {
    if PEOPLE_CODES.contains(&code) {
        return Ok(Fetcher::People(PeopleFetcher::new(code, date, http.clone())));
    }
    if code == "xawb" {
        return Ok(Fetcher::Xawb(XawbFetcher::new(
            date,
            &settings.layout.pages_dir,
            http.clone(),
        )));
    }
    AnhuiPaper::from_code(code)
        .map(|paper| Fetcher::Anhui(AnhuiFetcher::new(paper, date, http.clone())))
        .ok_or_else(|| CrawlError::UnknownPublication(code.to_string()))
}

/// Resolve the date, pick the fetcher and build the crawler for one edition.
pub fn build_crawler(
    code: &str,
    date: Option<&str>,
    http: &HttpClient,
    settings: &CrawlSettings,
) -> Result<Crawler<Fetcher>, CrawlError> {
    let edition = Edition::resolve(code, date, &settings.layout)?;
    let fetcher = fetcher_for(code, edition.date, http, settings)?;
    Ok(Crawler::new(edition, fetcher, http.clone(), settings))
}
