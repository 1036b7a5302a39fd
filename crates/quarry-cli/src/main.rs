use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use dotenvy::dotenv;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use quarry_cli::summary::{group_stats, StatusSummary};
use quarry_cli::{Command, Config, HarvestArgs, PathArgs};
use quarry_client::YouTubeClient;
use quarry_core::progress::TracingReporter;
use quarry_core::traits::{CheckpointStore, DatasetSink, TermSource};
use quarry_core::{HarvestService, HttpConfig, QuotaConfig, QuotaLedger, StopReason};
use quarry_store::{CsvDataset, CsvTermSource, JsonCheckpointStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to install tracing subscriber")?;

    let config = Config::parse();

    match config.command {
        Command::Harvest(args) => harvest(&args).await?,
        Command::Status(paths) => show_status(&paths)?,
        Command::Stats { data_dir } => show_stats(&data_dir)?,
    }

    Ok(())
}

async fn harvest(args: &HarvestArgs) -> anyhow::Result<()> {
    let api_key = args.api_key()?;
    let paths = &args.paths;

    let terms = CsvTermSource::new(&paths.terms)
        .load()
        .with_context(|| format!("Failed to load terms from {}", paths.terms.display()))?;
    info!("Loaded {} term(s) from {}", terms.len(), paths.terms.display());

    let mut checkpoints = JsonCheckpointStore::open(&paths.state_file)
        .context("Failed to open checkpoint")?;
    let checkpoint = checkpoints.load()?;
    info!("Checkpoint holds {} completed term(s)", checkpoint.len());

    let quota = args.quota_config();
    let today = Utc::now().date_naive();
    let mut ledger = if quota.carry_over {
        QuotaLedger::resume(quota.daily_limit, checkpoint.quota_usage(), today)
    } else {
        QuotaLedger::fresh(quota.daily_limit, checkpoint.quota_usage(), today)
    };

    let dataset = CsvDataset::open_in(&paths.data_dir).context("Failed to open dataset")?;
    info!("Dataset holds {} record(s)", dataset.len());

    let client =
        YouTubeClient::with_base_url(&args.api_base_url, api_key, &HttpConfig::default())
            .context("Failed to initialize YouTube client")?;

    let mut service =
        HarvestService::with_config(client, checkpoints, dataset, args.harvest_config(), quota);
    let report = service
        .run_with_progress(&terms, &mut ledger, &TracingReporter)
        .await?;

    info!(
        "Total records harvested this run: {} (dataset now {})",
        report.records_added,
        service.dataset().len()
    );
    if report.stop_reason == StopReason::QuotaStopped {
        info!("Daily quota reached; run again tomorrow to continue");
    }

    Ok(())
}

fn show_status(paths: &PathArgs) -> anyhow::Result<()> {
    let terms = CsvTermSource::new(&paths.terms)
        .load()
        .with_context(|| format!("Failed to load terms from {}", paths.terms.display()))?;
    let store =
        JsonCheckpointStore::open(&paths.state_file).context("Failed to open checkpoint")?;
    let checkpoint = store.checkpoint();

    let today = Utc::now().date_naive();
    let summary = StatusSummary::compute(&terms, checkpoint, paths.daily_limit, today);
    let search_cost = QuotaConfig::default().search_cost;

    println!("\nHarvest Status\n");
    println!("  Terms:                 {}", summary.total_terms);
    println!("  Processed:             {}", summary.processed_terms);
    println!("  Pending:               {}", summary.pending_terms);
    println!("  Empty searches:        {}", summary.empty_terms);
    println!("  Records (checkpoint):  {}", summary.recorded_records);
    if summary.orphaned_entries > 0 {
        println!("  Unlisted entries:      {}", summary.orphaned_entries);
    }
    println!(
        "  Quota today:           {} / {}",
        summary.quota_consumed_today, paths.daily_limit
    );
    println!(
        "  Searches left today:   {}",
        summary.searches_left(search_cost)
    );
    if let Some(last_update) = checkpoint.last_update() {
        println!("  Last update:           {}", last_update);
    }
    println!();

    Ok(())
}

fn show_stats(data_dir: &std::path::Path) -> anyhow::Result<()> {
    let dataset = CsvDataset::open_in(data_dir).context("Failed to open dataset")?;

    if dataset.is_empty() {
        eprintln!("No records found in {}.", dataset.path().display());
        return Ok(());
    }

    println!("\nDataset Statistics\n");
    println!("  Total records:         {}", dataset.len());
    for stats in group_stats(dataset.records()) {
        let engagement = stats
            .mean_engagement_rate
            .map(|rate| format!("{rate:.2}%"))
            .unwrap_or_else(|| "n/a".to_string());
        println!(
            "  {:<22} {} record(s), {} term(s), {} view(s), engagement {}",
            format!("{}:", stats.group),
            stats.records,
            stats.terms,
            stats.total_views,
            engagement
        );
    }
    println!();

    Ok(())
}
