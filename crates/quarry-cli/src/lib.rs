//! Quarry CLI - argument parsing and report formatting for the `quarry` binary.

pub mod summary;

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use quarry_client::DEFAULT_BASE_URL;
use quarry_core::{AppError, HarvestConfig, QuotaConfig, MAX_PAGE_SIZE};

/// Resumable, quota-aware YouTube keyword harvester.
#[derive(Parser, Debug)]
#[command(name = "quarry", version, about)]
pub struct Config {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Harvest every pending term until the list or today's quota runs out
    Harvest(HarvestArgs),
    /// Show checkpoint progress and today's quota usage
    Status(PathArgs),
    /// Summarize the harvested dataset per group
    Stats {
        /// Directory holding all_videos_data.csv
        #[arg(long, env = "QUARRY_DATA_DIR", default_value = "youtube_data")]
        data_dir: PathBuf,
    },
}

/// Locations of the run's input and state files.
#[derive(Args, Debug, Clone)]
pub struct PathArgs {
    /// CSV term list with `keyword` and `group` columns
    #[arg(long, env = "QUARRY_TERMS", default_value = "keywords.csv")]
    pub terms: PathBuf,

    /// Checkpoint document
    #[arg(long, env = "QUARRY_STATE_FILE", default_value = "fetch_state.json")]
    pub state_file: PathBuf,

    /// Directory holding all_videos_data.csv
    #[arg(long, env = "QUARRY_DATA_DIR", default_value = "youtube_data")]
    pub data_dir: PathBuf,

    /// Daily quota budget
    #[arg(long, env = "QUARRY_DAILY_LIMIT", default_value_t = 10_000)]
    pub daily_limit: u64,
}

#[derive(Args, Debug, Clone)]
pub struct HarvestArgs {
    #[command(flatten)]
    pub paths: PathArgs,

    /// YouTube Data API key
    #[arg(long, env = "YOUTUBE_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Videos requested per term
    #[arg(
        long,
        default_value_t = MAX_PAGE_SIZE,
        value_parser = clap::value_parser!(u32).range(1..=MAX_PAGE_SIZE as i64)
    )]
    pub max_results: u32,

    /// Minimum pause between two terms, in milliseconds
    #[arg(long, default_value_t = 1_000)]
    pub pacing_ms: u64,

    /// Start from a full budget instead of today's recorded usage
    #[arg(long)]
    pub no_quota_carry_over: bool,

    /// API endpoint
    #[arg(long, env = "YOUTUBE_API_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub api_base_url: String,
}

impl HarvestArgs {
    /// Returns the API key, failing before any work is done if it is absent.
    pub fn api_key(&self) -> Result<&str, AppError> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or_else(|| {
                AppError::ConfigError(
                    "YouTube API key not found: set YOUTUBE_API_KEY or pass --api-key".to_string(),
                )
            })
    }

    pub fn quota_config(&self) -> QuotaConfig {
        QuotaConfig {
            daily_limit: self.paths.daily_limit,
            carry_over: !self.no_quota_carry_over,
            ..QuotaConfig::default()
        }
    }

    pub fn harvest_config(&self) -> HarvestConfig {
        HarvestConfig::default()
            .with_max_results(self.max_results)
            .with_pacing(Duration::from_millis(self.pacing_ms))
    }
}
