//! Thin HTTP collaborator shared by every fetcher and the crawler.
//!
//! Wraps one `reqwest::Client` so all requests of an invocation share a
//! connection pool, timeouts and user agent. Only two shapes of request are
//! needed: fetch a markup page and parse it, or stream a binary body to disk.

use std::path::Path;
use std::time::Duration;

use futures::StreamExt;
use reqwest::{Client, Response};
use scraper::Html;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument, warn};

use crate::config::HttpSettings;
use crate::error::FetchError;

#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: Client,
}

impl HttpClient {
    pub fn new(settings: &HttpSettings) -> Result<Self, reqwest::Error> {
        let inner = Client::builder()
            .connect_timeout(Duration::from_secs(settings.connect_timeout_secs))
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .user_agent(settings.user_agent.clone())
            .build()?;
        Ok(Self { inner })
    }

    /// GET `url` and fail on transport errors or non-success status.
    async fn get(&self, url: &str) -> Result<Response, FetchError> {
        let response = self
            .inner
            .get(url)
            .send()
            .await
            .map_err(|source| FetchError::Request {
                url: url.to_string(),
                source,
            })?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response)
    }

    /// Fetch `url` and parse the body as an HTML document.
    #[instrument(level = "debug", skip(self))]
    pub async fn get_document(&self, url: &str) -> Result<Html, FetchError> {
        let body = self
            .get(url)
            .await?
            .text()
            .await
            .map_err(|source| FetchError::Request {
                url: url.to_string(),
                source,
            })?;
        debug!(bytes = body.len(), "Fetched document");
        Ok(Html::parse_document(&body))
    }

    /// Stream the body of `url` into `dest`, returning the number of bytes
    /// written. A partially written file is removed on failure.
    #[instrument(level = "debug", skip(self, dest), fields(dest = %dest.display()))]
    pub async fn download_to(&self, url: &str, dest: &Path) -> Result<u64, FetchError> {
        let response = self.get(url).await?;
        match write_body(response, url, dest).await {
            Ok(written) => {
                debug!(bytes = written, "Downloaded body");
                Ok(written)
            }
            Err(e) => {
                if let Err(rm) = fs::remove_file(dest).await {
                    if rm.kind() != std::io::ErrorKind::NotFound {
                        warn!(path = %dest.display(), error = %rm, "Failed to remove partial download");
                    }
                }
                Err(e)
            }
        }
    }
}

async fn write_body(response: Response, url: &str, dest: &Path) -> Result<u64, FetchError> {
    let mut file = fs::File::create(dest)
        .await
        .map_err(|e| FetchError::io(dest, e))?;
    let mut stream = response.bytes_stream();
    let mut written = 0u64;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|source| FetchError::Request {
            url: url.to_string(),
            source,
        })?;
        file.write_all(&chunk)
            .await
            .map_err(|e| FetchError::io(dest, e))?;
        written += chunk.len() as u64;
    }
    file.flush().await.map_err(|e| FetchError::io(dest, e))?;
    Ok(written)
}
