mod browser;
mod config;
mod datetime;
mod db;
mod enrich;
mod entities;
mod error;
mod ingest;
mod matching;
mod models;
mod normalize;
mod report;
mod sources;
mod store;
mod tmdb;

use std::{process::ExitCode, sync::Arc, time::Duration};

use clap::{Parser, Subcommand};
use jiff::Zoned;
use tracing::{info, warn};

use crate::{
    config::Config,
    enrich::Enricher,
    error::AppError,
    models::FetchWindow,
    sources::BoxedSource,
    store::Store,
    tmdb::TmdbClient,
};

#[derive(Parser)]
#[command(name = "marquee")]
#[command(about = "Collects repertory screenings from Los Angeles theaters into one database")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch every source and store new screenings (the default)
    Scrape(ScrapeArgs),
    /// Look up catalog metadata for stored movies
    Enrich {
        /// Re-enrich every movie and replace stored values
        #[arg(long)]
        force: bool,
    },
    /// Print database counts and upcoming screenings
    Summary {
        #[arg(long)]
        upcoming: Option<usize>,
    },
}

#[derive(clap::Args, Default)]
struct ScrapeArgs {
    /// Days ahead to fetch, starting today
    #[arg(long)]
    days: Option<u32>,
    /// Only run sources whose name contains this text
    #[arg(long)]
    source: Option<String>,
    /// Skip sources that need a headless browser
    #[arg(long)]
    skip_browser: bool,
    /// Store screenings without catalog lookups
    #[arg(long)]
    no_enrich: bool,
    /// Upcoming screenings to show per theater afterwards
    #[arg(long)]
    upcoming: Option<usize>,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "info,marquee=debug,sqlx=warn".to_string()),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    let http = reqwest::Client::builder()
        .user_agent(sources::BROWSER_USER_AGENT)
        .timeout(Duration::from_secs(config.http_timeout_secs))
        .build()?;

    let db = db::connect_and_migrate(&config.database_url).await?;
    let store = Store::new(db, config.canonical_tz.clone());

    match cli.command.unwrap_or(Command::Scrape(ScrapeArgs::default())) {
        Command::Scrape(args) => scrape(&config, &http, &store, args).await,
        Command::Enrich { force } => {
            let Some(enricher) = enricher(&config, &http) else {
                return Err(AppError::Config("TMDB_API_KEY is required for the enrichment pass".into()).into());
            };
            let stats = ingest::enrich_pending(&store, &enricher, force).await?;
            print!("{}", report::render_enrichment(&stats));
            Ok(ExitCode::SUCCESS)
        },
        Command::Summary { upcoming } => {
            let limit = upcoming.unwrap_or(config.upcoming_limit);
            print!("{}", report::render_summary(&store, limit as u64).await?);
            Ok(ExitCode::SUCCESS)
        },
    }
}

async fn scrape(
    config: &Config,
    http: &reqwest::Client,
    store: &Store,
    args: ScrapeArgs,
) -> anyhow::Result<ExitCode> {
    let enricher = if args.no_enrich { None } else { enricher(config, http) };

    let mut sources: Vec<BoxedSource> = sources::default_sources(config, http, !args.skip_browser);
    if let Some(filter) = &args.source {
        let filter = filter.to_lowercase();
        sources.retain(|s| s.name().to_lowercase().contains(&filter));
        if sources.is_empty() {
            anyhow::bail!("no source matches {filter:?}");
        }
    }

    let now = Zoned::now().with_time_zone(config.canonical_tz.clone());
    let window = FetchWindow::new(now, args.days.unwrap_or(config.fetch_days));
    info!(sources = sources.len(), days = window.days, enrich = enricher.is_some(), "starting run");

    let run = ingest::run(store, enricher.as_ref(), &sources, &window).await;
    print!("{}", report::render_run(&run));

    let limit = args.upcoming.unwrap_or(config.upcoming_limit);
    if limit > 0 {
        println!();
        print!("{}", report::render_summary(store, limit as u64).await?);
    }

    Ok(if run.is_success() { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

/// The catalog is optional: without a key, movies are stored unenriched.
fn enricher(config: &Config, http: &reqwest::Client) -> Option<Enricher> {
    let Some(key) = config.tmdb_api_key.clone() else {
        warn!("TMDB_API_KEY not set, skipping metadata enrichment");
        return None;
    };
    let client = TmdbClient::new(http.clone(), key, config.tmdb_base_url.clone(), config.tmdb_rps);
    Some(Enricher::new(Arc::new(client)))
}
