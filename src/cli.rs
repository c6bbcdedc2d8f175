//! Command-line interface definitions for daily_papers.
//!
//! Every global option can also be provided via an environment variable.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::dispatch::Family;

/// Download and merge today's (or a given day's) newspaper editions.
///
/// # Examples
///
/// ```sh
/// # Every People's Daily paper for today
/// daily_papers people
///
/// # Two Anhui papers for a past date
/// daily_papers anhui -d 2025-11-09 -p ahrb,xawb
///
/// # Custom output locations, no settle delay
/// daily_papers --output-dir /tmp/pages --merged-dir /srv/papers --settle-delay-secs 0 people
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to config.yaml file
    #[arg(short, long, global = true, env = "DAILY_PAPERS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory for per-page artifacts (overrides the config file)
    #[arg(long, global = true, env = "DAILY_PAPERS_OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    /// Root of the dated merge directories (overrides the config file)
    #[arg(long, global = true, env = "DAILY_PAPERS_MERGED_DIR")]
    pub merged_dir: Option<PathBuf>,

    /// Seconds to wait before and after merging (overrides the config file)
    #[arg(long, global = true)]
    pub settle_delay_secs: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// People's Daily papers: rmrb, jksb, zgcsb, fcyym
    People(EditionArgs),
    /// Anhui Daily papers: ahrb, ncb, fzb, jhsb, pc, xawb
    Anhui(EditionArgs),
}

#[derive(Args, Debug)]
pub struct EditionArgs {
    /// Edition date as YYYY-MM-DD; defaults to today (UTC+8)
    #[arg(short, long)]
    pub date: Option<String>,

    /// Comma-separated paper codes; defaults to the whole family
    #[arg(short, long = "paper", value_delimiter = ',')]
    pub papers: Vec<String>,
}

impl Command {
    pub fn family(&self) -> Family {
        match self {
            Command::People(_) => Family::People,
            Command::Anhui(_) => Family::Anhui,
        }
    }

    pub fn args(&self) -> &EditionArgs {
        match self {
            Command::People(args) | Command::Anhui(args) => args,
        }
    }

    /// Codes to run, in order. Blank entries are ignored; when nothing is
    /// left the whole family is selected.
    pub fn codes(&self) -> Vec<String> {
        let picked: Vec<String> = self
            .args()
            .papers
            .iter()
            .map(|code| code.trim().to_string())
            .filter(|code| !code.is_empty())
            .collect();
        if picked.is_empty() {
            self.family()
                .codes()
                .iter()
                .map(|code| code.to_string())
                .collect()
        } else {
            picked
        }
    }
}
