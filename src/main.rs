use std::path::PathBuf;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

mod config;
mod db;
mod fetch;
mod models;
mod transform;

use config::Config;
use db::LoadSummary;
use fetch::WeatherClient;
use models::{DateRange, RawWeatherResponse, TransformedBundle, UnitGroup};

const DEFAULT_DAYS: i64 = 7;
const MAX_DAYS: i64 = 36_500;

#[derive(Parser)]
#[command(name = "weather-etl")]
#[command(about = "Load Visual Crossing weather timelines into Postgres", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch, transform and store current conditions, hourly readings and alerts
    Run {
        #[command(flatten)]
        fetch: FetchArgs,
    },
    /// Fetch and store current conditions only
    Current {
        #[command(flatten)]
        fetch: FetchArgs,
    },
    /// Fetch and print the timeline JSON without touching the database
    Extract {
        #[command(flatten)]
        fetch: FetchArgs,
        /// Write the JSON to this file instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Transform and store a timeline JSON file saved earlier
    LoadFile {
        #[arg(long)]
        input: PathBuf,
    },
}

#[derive(Args)]
struct FetchArgs {
    /// Place name, defaults to WEATHER_LOCATION or "Hann Münden"
    #[arg(long)]
    location: Option<String>,
    /// Fetch the trailing N days up to today (default 7)
    #[arg(
        long,
        conflicts_with = "start",
        value_parser = clap::value_parser!(i64).range(0..=MAX_DAYS)
    )]
    days: Option<i64>,
    #[arg(long, requires = "end")]
    start: Option<NaiveDate>,
    #[arg(long, requires = "start")]
    end: Option<NaiveDate>,
    #[arg(long, value_enum, default_value_t = UnitGroup::Us)]
    unit_group: UnitGroup,
}

impl FetchArgs {
    fn range(&self) -> anyhow::Result<DateRange> {
        match (self.start, self.end) {
            (Some(start), Some(end)) => Ok(DateRange::new(start, end)?),
            _ => Ok(DateRange::trailing_days(self.days.unwrap_or(DEFAULT_DAYS))?),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();

    match cli.command {
        Commands::Run { fetch } => {
            let raw = fetch_raw(&config, &fetch).await?;
            let bundle = transform::transform(&raw);
            if bundle.is_empty() {
                anyhow::bail!("transformed weather data is empty, exiting ETL process");
            }
            println!(
                "Transformed {} hourly readings and {} alerts.",
                bundle.hourly.len(),
                bundle.alerts.len()
            );
            let summary = store_bundle(&config, &bundle).await?;
            println!("Stored {summary}.");
        }
        Commands::Current { fetch } => {
            let raw = fetch_raw(&config, &fetch).await?;
            let summary = store_current(&config, &raw).await?;
            if summary.current == 0 {
                println!("No current conditions stored.");
            } else {
                println!("Stored {summary}.");
            }
        }
        Commands::Extract { fetch, out } => {
            let raw = fetch_raw(&config, &fetch).await?;
            let json = serde_json::to_string_pretty(&raw)?;
            match out {
                Some(path) => {
                    std::fs::write(&path, json)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    println!("Timeline written to {}.", path.display());
                }
                None => println!("{json}"),
            }
        }
        Commands::LoadFile { input } => {
            let contents = std::fs::read_to_string(&input)
                .with_context(|| format!("failed to read {}", input.display()))?;
            let raw: RawWeatherResponse = serde_json::from_str(&contents)
                .with_context(|| format!("failed to parse {}", input.display()))?;
            let bundle = transform::transform(&raw);
            if bundle.is_empty() {
                anyhow::bail!("{} contains no weather data", input.display());
            }
            let summary = store_bundle(&config, &bundle).await?;
            println!("Stored {summary} from {}.", input.display());
        }
    }

    Ok(())
}

async fn fetch_raw(config: &Config, args: &FetchArgs) -> anyhow::Result<RawWeatherResponse> {
    let range = args.range()?;
    let location = args.location.as_deref().unwrap_or(config.location.as_str());
    let client = WeatherClient::new(config.api_key()?, config.base_url.as_str())
        .with_unit_group(args.unit_group);

    println!(
        "Fetching weather for {location} ({range}, {} units)...",
        args.unit_group
    );
    client
        .fetch(location, &range)
        .await
        .context("failed to fetch weather data, exiting ETL process")
}

async fn store_bundle(config: &Config, bundle: &TransformedBundle) -> anyhow::Result<LoadSummary> {
    let pool = db::connect(config.database_url()?).await?;
    let result = db::load(&pool, bundle).await;
    pool.close().await;
    result
}

async fn store_current(config: &Config, raw: &RawWeatherResponse) -> anyhow::Result<LoadSummary> {
    let pool = db::connect(config.database_url()?).await?;
    let result = db::load_current_only(&pool, raw).await;
    pool.close().await;
    result
}
