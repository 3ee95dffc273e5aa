//! Release Notes CLI - changelog extraction and enrichment pipeline

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use owo_colors::OwoColorize;
use relnotes_lib::config::Config;
use relnotes_lib::enrich::{NvdClient, NvdConfig};
use relnotes_lib::fetch::{fetch_index, fetch_releases, http_client};
use relnotes_lib::pipeline::{
    PipelineError, build_releases, enrich_summary, read_releases, rewrite_summary_links,
    summarize, write_releases,
};
use relnotes_lib::store::{FsDocumentStore, JsonFileStore, StoreError, SummaryStore};
use relnotes_lib::types::ReleaseNotesSummary;
use tracing_subscriber::{filter::EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "relnotes")]
#[command(about = "Extract, classify, and enrich release notes", long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', action = clap::ArgAction::Count, global = true)]
    log_verbosity: u8,

    /// Output logs as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Data directory [default: $RELNOTES_DIR or ~/.relnotes]
    #[arg(long, value_name = "DIR", global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download the release index and every release document
    Fetch {
        /// Re-download documents that are already cached
        #[arg(long)]
        force: bool,
    },

    /// Extract and classify cached documents into releases.json
    Extract,

    /// Aggregate releases.json into release_notes.json
    Summarize,

    /// Attach advisory severity data to security entries
    ///
    /// Progress is saved after every entry; re-running resumes where an
    /// interrupted run stopped.
    Enrich,

    /// Anchor documentation links at each entry's major version
    Links,

    /// Run every stage in order
    Run {
        /// Use the cached documents as they are
        #[arg(long)]
        skip_fetch: bool,

        /// Leave security entries unenriched
        #[arg(long)]
        skip_enrich: bool,
    },

    /// Show counts for the final summary
    Stats,
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Fetch { .. } => "Fetch",
            Commands::Extract => "Extract",
            Commands::Summarize => "Summarize",
            Commands::Enrich => "Enrich",
            Commands::Links => "Links",
            Commands::Run { .. } => "Run",
            Commands::Stats => "Stats",
        }
    }
}

/// Initialize tracing subscriber based on verbosity and output format
fn init_tracing(verbose: u8, json: bool) {
    let base_filter = match std::env::var("RUST_LOG") {
        Ok(filter) => filter,
        Err(_) => match verbose {
            0 => "warn".to_string(),
            1 => "warn,relnotes_lib=info".to_string(),
            2 => "info,relnotes_lib=debug".to_string(),
            _ => "debug,relnotes_lib=trace".to_string(),
        },
    };

    let filter = EnvFilter::try_new(&base_filter).unwrap_or_else(|_| EnvFilter::new("warn"));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_level(true)
                    .with_thread_ids(false)
                    .with_file(verbose >= 3)
                    .with_line_number(verbose >= 3)
                    .with_writer(std::io::stderr)
                    .compact(),
            )
            .init();
    }
}

fn load_summary(store: &JsonFileStore) -> Result<ReleaseNotesSummary, PipelineError> {
    store
        .load()?
        .ok_or_else(|| StoreError::NotFound(store.path().display().to_string()).into())
}

async fn fetch(config: &Config, force: bool) -> Result<(), PipelineError> {
    let client = http_client()?;
    let store = FsDocumentStore::new(config.cache_dir());

    let versions = fetch_index(&client, config, &store).await?;
    let report = fetch_releases(&client, config, &store, &versions, force).await;

    println!(
        "{} {} fetched, {} cached, {} failed",
        "fetch".green().bold(),
        report.fetched.len(),
        report.skipped.len(),
        report.failed.len()
    );
    if !report.failed.is_empty() {
        println!("  {} {}", "failed:".red(), report.failed.join(", "));
    }
    Ok(())
}

fn extract(config: &Config) -> Result<(), PipelineError> {
    let store = FsDocumentStore::new(config.cache_dir());
    let releases = build_releases(&store, config)?;
    write_releases(&config.releases_path(), &releases)?;

    println!(
        "{} {} releases → {}",
        "extract".green().bold(),
        releases.len(),
        config.releases_path().display().dimmed()
    );
    Ok(())
}

fn summarize_releases(config: &Config) -> Result<(), PipelineError> {
    let releases = read_releases(&config.releases_path())?;
    let summary = summarize(&releases);
    JsonFileStore::new(config.summary_path()).save(&summary)?;

    println!(
        "{} {} entries, {} contributors → {}",
        "summarize".green().bold(),
        summary.total_entries(),
        summary.contributors.len(),
        config.summary_path().display().dimmed()
    );
    Ok(())
}

async fn enrich(config: &Config) -> Result<(), PipelineError> {
    let store = JsonFileStore::new(config.summary_path());
    let summary = load_summary(&store)?;
    let client = NvdClient::new(NvdConfig::from_config(config))?;

    let (_, report) = enrich_summary(summary, &client, &store, config.request_delay).await?;

    println!(
        "{} {} queried, {} enriched, {} repaired, {} not found, {} failed",
        "enrich".green().bold(),
        report.queried,
        report.enriched,
        report.repaired,
        report.not_found,
        report.failed
    );
    if report.failed > 0 {
        println!("  {}", "failed lookups are retried on the next run".yellow());
    }
    Ok(())
}

fn links(config: &Config) -> Result<(), PipelineError> {
    let store = JsonFileStore::new(config.summary_path());
    let summary = load_summary(&store)?;
    let rewritten = rewrite_summary_links(&summary, &config.docs_base);
    store.save(&rewritten)?;

    println!(
        "{} rewrote links in {} entries",
        "links".green().bold(),
        rewritten.total_entries()
    );
    Ok(())
}

fn stats(config: &Config) -> Result<(), PipelineError> {
    let summary = load_summary(&JsonFileStore::new(config.summary_path()))?;

    println!("{}", "Release notes".bold());
    println!("  releases     {}", summary.version_dates.len());
    if let Some((first, last)) = summary.date_range() {
        println!("  span         {first} → {last}");
    }
    println!(
        "  security     {} ({} enriched)",
        summary.security.len(),
        summary.enriched_count()
    );
    println!("  performance  {}", summary.performance.len());
    println!("  features     {}", summary.features.len());
    println!("  bugs         {}", summary.bugs.len());
    println!("  contributors {}", summary.contributors.len());
    Ok(())
}

async fn run(config: &Config, skip_fetch: bool, skip_enrich: bool) -> Result<(), PipelineError> {
    if !skip_fetch {
        fetch(config, false).await?;
    }
    extract(config)?;
    summarize_releases(config)?;
    if !skip_enrich {
        enrich(config).await?;
    }
    links(config)?;
    stats(config)
}

#[tokio::main]
async fn main() {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.log_verbosity, cli.json);

    tracing::info!("Release notes CLI starting");

    let config = match Config::from_env_with_data_dir(cli.data_dir) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let name = cli.command.name();
    let result = match cli.command {
        Commands::Fetch { force } => fetch(&config, force).await,
        Commands::Extract => extract(&config),
        Commands::Summarize => summarize_releases(&config),
        Commands::Enrich => enrich(&config).await,
        Commands::Links => links(&config),
        Commands::Run {
            skip_fetch,
            skip_enrich,
        } => run(&config, skip_fetch, skip_enrich).await,
        Commands::Stats => stats(&config),
    };

    if let Err(e) = result {
        eprintln!("{} failed: {}", name, e);
        std::process::exit(1);
    }
}
