//! # daily_papers
//!
//! Harvests the daily editions of Chinese newspapers and publishes each one
//! as a single merged PDF.
//!
//! ## Features
//!
//! - People's Daily family (人民日报, 健康时报, 中国城市报, 讽刺与幽默)
//! - Anhui Daily family (安徽日报, 农村版, 法治报, 江淮时报, 安徽商报, 新安晚报)
//! - Image-only pages (新安晚报) are converted to PDF locally
//! - A page that fails is skipped; the rest of the edition still ships
//!
//! ## Usage
//!
//! ```sh
//! daily_papers people
//! daily_papers anhui -d 2025-11-09 -p ahrb,xawb
//! ```
//!
//! ## Architecture
//!
//! Each edition runs through one [`crawler::Crawler`]:
//! 1. **Discovery**: the publication's fetcher reports the page count
//! 2. **Download**: pages are fetched one at a time into the output directory
//! 3. **Merge**: saved pages become `{merged_root}/{YYYYMMDD}/{code}_{YYYYMMDD}.pdf`
//! 4. **Cleanup**: per-page files are removed
//!
//! Editions run sequentially; the process only fails when every requested
//! edition failed.

use std::error::Error;

use clap::Parser;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod config;
mod crawler;
mod dispatch;
mod error;
mod fetchers;
mod http;
mod models;
mod pdf;

use cli::Cli;
use config::Config;
use crawler::CrawlSettings;
use http::HttpClient;
use models::OutputLayout;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("daily_papers starting up");

    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    let config = apply_overrides(Config::load(args.config.as_deref())?, &args);
    let settings = CrawlSettings {
        layout: OutputLayout {
            pages_dir: config.output_dir.clone(),
            merged_root: config.merged_root.clone(),
        },
        settle_delay: config.settle_delay(),
    };
    info!(
        pages_dir = %settings.layout.pages_dir.display(),
        merged_root = %settings.layout.merged_root.display(),
        settle_delay = ?settings.settle_delay,
        "Configuration ready"
    );

    let http = HttpClient::new(&config.http)?;
    let date = args.command.args().date.as_deref();
    let codes = args.command.codes();

    let mut succeeded = 0usize;
    let mut failed = 0usize;
    for code in &codes {
        info!(%code, name = dispatch::display_name(code), "Processing edition");
        let outcome = match dispatch::build_crawler(code, date, &http, &settings) {
            Ok(crawler) => crawler.run().await,
            Err(e) => Err(e),
        };
        match outcome {
            Ok(report) => {
                succeeded += 1;
                info!(
                    %code,
                    date = %report.date,
                    pages = report.page_count,
                    saved = report.saved_pages.len(),
                    skipped = ?report.skipped_pages,
                    cleanup_failures = report.cleanup_failures,
                    path = %report.merged_path.display(),
                    "Edition complete"
                );
            }
            Err(e) => {
                failed += 1;
                error!(%code, stage = e.stage(), error = %e, "Edition failed");
            }
        }
    }

    let elapsed = start_time.elapsed();
    info!(
        total = codes.len(),
        succeeded,
        failed,
        ?elapsed,
        secs = elapsed.as_secs(),
        "Execution complete"
    );

    if succeeded == 0 && failed > 0 {
        return Err(format!("all {failed} editions failed").into());
    }
    Ok(())
}

/// Command-line options win over the config file.
fn apply_overrides(mut config: Config, args: &Cli) -> Config {
    if let Some(dir) = &args.output_dir {
        config.output_dir = dir.clone();
    }
    if let Some(dir) = &args.merged_dir {
        config.merged_root = dir.clone();
    }
    if let Some(secs) = args.settle_delay_secs {
        config.settle_delay_secs = secs;
    }
    config
}
