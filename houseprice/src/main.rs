//! Command-line entry point.
//!
//! `houseprice enrich` geocodes and prices a list of addresses;
//! `houseprice crawl` scrapes per-district averages starting from an index page.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use houseprice::config::AppConfig;
use houseprice::fetch::HttpFetcher;
use houseprice::observability::{init_tracing, LogFormat, PhaseTimer};
use houseprice::pipeline::{crawl_areas, run_enrichment, CrawlContext, EnrichContext, TaskRunner};
use houseprice::sink::write_csv;

#[derive(Parser)]
#[command(name = "houseprice")]
#[command(about = "Fetch, parse and merge housing data from public web sources")]
struct Cli {
    /// JSON config file; missing keys keep their defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Maximum pipelines, and requests, in flight
    #[arg(long, global = true)]
    concurrency: Option<usize>,

    /// Attempts per request before giving up
    #[arg(long, global = true)]
    max_attempts: Option<usize>,

    /// Log rendering: pretty or json
    #[arg(long, global = true, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Geocode and price every address, one per line
    Enrich {
        /// Address file, or `-` for stdin
        #[arg(long)]
        input: String,
        /// Output CSV path
        #[arg(long, default_value = "result.csv")]
        output: PathBuf,
    },

    /// Crawl district average prices from an index page
    Crawl {
        /// Index page listing the city pages
        #[arg(long)]
        seed: Option<String>,
        /// Pattern capturing (relative_url, city) on the index page
        #[arg(long)]
        target_pattern: Option<String>,
        /// Pattern capturing (district, average_price) on a city page
        #[arg(long)]
        district_pattern: Option<String>,
        /// Prefix joined to each captured URL
        #[arg(long)]
        url_prefix: Option<String>,
        /// Output CSV path
        #[arg(long, default_value = "result.csv")]
        output: PathBuf,
    },
}

fn load_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = match &cli.config {
        Some(path) => AppConfig::from_json_file(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?,
        None => AppConfig::default(),
    };
    config.apply_env_overrides()?;

    if let Some(concurrency) = cli.concurrency {
        config.runner.concurrency = concurrency;
    }
    if let Some(attempts) = cli.max_attempts {
        config.retry.max_attempts = attempts;
    }
    config.validate()?;
    Ok(config)
}

fn read_addresses(source: &str) -> Result<Vec<String>> {
    let text = if source == "-" {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read addresses from stdin")?;
        text
    } else {
        std::fs::read_to_string(source)
            .with_context(|| format!("Failed to read addresses from {source}"))?
    };
    Ok(text.lines().map(|line| line.trim().to_string()).collect())
}

async fn enrich(config: AppConfig, input: &str, output: PathBuf) -> Result<()> {
    let addresses = read_addresses(input)?;
    info!(count = addresses.len(), input, "Loaded addresses");

    let ctx = EnrichContext::from_config(&config)?;
    let fetcher = Arc::new(HttpFetcher::new(config.fetch.clone())?);
    let runner = TaskRunner::new(fetcher, config.runner.concurrency);

    let timer = PhaseTimer::start("enrich");
    let (table, summary) = run_enrichment(&runner, ctx, addresses).await;
    timer.finish();

    write_csv(&output, &table, false)?;
    summary.log();

    runner.shutdown(config.runner.shutdown_grace()).await;
    Ok(())
}

async fn crawl(config: AppConfig, output: PathBuf) -> Result<()> {
    let seed = config
        .area
        .seed_url
        .clone()
        .context("A seed URL is required (--seed or area.seed_url)")?;

    let ctx = CrawlContext::from_config(&config)?;
    let fetcher = Arc::new(HttpFetcher::new(config.fetch.clone())?);
    let runner = TaskRunner::new(fetcher, config.runner.concurrency);

    let timer = PhaseTimer::start("crawl");
    let (table, summary) = crawl_areas(&runner, ctx, &seed).await;
    timer.finish();

    write_csv(&output, &table, true)?;
    summary.log();

    runner.shutdown(config.runner.shutdown_grace()).await;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format)?;

    let mut config = load_config(&cli)?;

    match cli.command {
        Commands::Enrich { input, output } => enrich(config, &input, output).await,
        Commands::Crawl {
            seed,
            target_pattern,
            district_pattern,
            url_prefix,
            output,
        } => {
            let area = &mut config.area;
            if seed.is_some() {
                area.seed_url = seed;
            }
            if let Some(pattern) = target_pattern {
                area.target_pattern = pattern;
            }
            if let Some(pattern) = district_pattern {
                area.district_pattern = pattern;
            }
            if let Some(prefix) = url_prefix {
                area.url_prefix = prefix;
            }
            crawl(config, output).await
        }
    }
}
