//! photo-harvest command line entry point

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use photo_harvest_lib::application::{CandidateSource, HarvestOrchestrator, RunReport};
use photo_harvest_lib::domain::SiteKind;
use photo_harvest_lib::infrastructure::{AppConfig, HttpClient, RateGovernor, init_logging_with_config};

/// Collect photos and their attribution metadata from a photo-hosting site.
#[derive(Debug, Parser)]
#[command(name = "photo-harvest", version, about)]
struct Cli {
    /// Saved listing page to read candidates from (live search when omitted)
    input: Option<PathBuf>,

    /// Output directory for photos, metadata.json and failed_downloads.json
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Stop once this many photos are on disk (failures do not count)
    #[arg(short = 'n', long)]
    number: Option<usize>,

    /// Configuration file (TOML, JSON or YAML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Site to harvest: flickr or geograph
    #[arg(long)]
    site: Option<SiteKind>,

    /// Free-text search query for live listing
    #[arg(long)]
    query: Option<String>,

    /// Listing pages to walk during live search
    #[arg(long)]
    max_pages: Option<u32>,

    /// Log level: error, warn, info, debug or trace
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    /// Command line flags are the last configuration layer.
    fn apply_to(&self, config: &mut AppConfig) {
        if let Some(output) = &self.output {
            config.output.directory.clone_from(output);
        }
        if let Some(number) = self.number {
            config.output.max_items = Some(number);
        }
        if let Some(site) = self.site {
            config.site = site;
        }
        if let Some(query) = &self.query {
            config.search.query.clone_from(query);
        }
        if let Some(max_pages) = self.max_pages {
            config.search.max_pages = max_pages;
        }
        if let Some(level) = &self.log_level {
            config.logging.level.clone_from(level);
        }
    }

    fn source(&self) -> CandidateSource {
        match &self.input {
            Some(path) => CandidateSource::Document(path.clone()),
            None => CandidateSource::Search,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(report) => {
            print_summary(&report);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("❌ Harvest aborted: {:#}", e);
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<RunReport> {
    let mut config = AppConfig::load(cli.config.as_deref())?;
    cli.apply_to(&mut config);
    config.validate()?;

    init_logging_with_config(&config.logging, &config.log_directory())?;
    match cli.config.clone().or_else(AppConfig::default_config_path).filter(|path| path.exists()) {
        Some(path) => info!("Loaded configuration from: {:?}", path),
        None => info!("No configuration file, using defaults and environment"),
    }
    info!("📋 Site: {}, output: {:?}", config.site, config.output.directory);

    let fetcher = Arc::new(HttpClient::new(config.http.clone())?);
    let governor = Arc::new(RateGovernor::from_config(&config.pacing));
    let mut orchestrator = HarvestOrchestrator::from_config(&config, fetcher, governor)
        .await
        .context("Failed to prepare output directory")?;

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("🛑 Interrupt received, finishing the current photo");
            signal_token.cancel();
        }
    });

    let report = orchestrator.run(&cli.source(), config.output.max_items, cancel).await?;
    Ok(report)
}

fn print_summary(report: &RunReport) {
    let stats = &report.statistics;
    println!();
    println!("Harvest {}", if stats.interrupted { "interrupted" } else { "complete" });
    println!("  Processed:        {}", stats.processed);
    println!("  Downloaded:       {}", stats.downloaded);
    println!("  Already on disk:  {}", stats.skipped);
    println!("  Already recorded: {}", stats.already_recorded);
    println!("  Failed:           {}", stats.failed);
    println!();
    println!("Ledger: {} photos in {}", stats.ledger_size, report.ledger_path.display());
    println!("  with description: {}", stats.with_description);
    println!("  with location:    {}", stats.with_location);
    println!("  with coordinates: {}", stats.with_coordinates);
    println!("    from EXIF:      {}", stats.with_gps_exif);
    println!("  with grid ref:    {}", stats.with_grid_reference);
    println!("  with tags:        {}", stats.with_tags);

    if !report.failed_ids.is_empty() {
        println!();
        println!("{} failed ids listed in {}", report.failed_ids.len(), report.failure_path.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_config() {
        let cli = Cli::parse_from([
            "photo-harvest",
            "listing.html",
            "-o",
            "/tmp/out",
            "-n",
            "3",
            "--site",
            "geograph",
            "--max-pages",
            "2",
        ]);
        let mut config = AppConfig::default();
        cli.apply_to(&mut config);

        assert_eq!(config.output.directory, PathBuf::from("/tmp/out"));
        assert_eq!(config.output.max_items, Some(3));
        assert_eq!(config.site, SiteKind::Geograph);
        assert_eq!(config.search.max_pages, 2);
        assert_eq!(cli.source(), CandidateSource::Document(PathBuf::from("listing.html")));
    }

    #[test]
    fn test_no_input_means_live_search() {
        let cli = Cli::parse_from(["photo-harvest"]);
        assert_eq!(cli.source(), CandidateSource::Search);
    }
}
