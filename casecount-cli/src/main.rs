//! CLI for the casecount aggregation engine.
//!
//! Loads a snapshot file into a store and runs one query against it.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use casecount::dates::normalize_date;
use casecount::{
    Aggregate, CountryAggregate, CountrySeries, CountryStates, DailyStat, EngineConfig,
    QueryParams, RegionSeries, SnapshotInput, Statistics, Store,
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

/// casecount: aggregate cumulative case counts by region, country, and world.
#[derive(Parser)]
#[command(name = "casecount", version, about)]
struct Cli {
    /// Engine configuration file (JSON).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Display the date bounds and size of a snapshot.
    Info {
        /// Path to the snapshot file.
        snapshot: PathBuf,
    },

    /// Per sub-region totals or series.
    States {
        /// Path to the snapshot file.
        snapshot: PathBuf,

        #[command(flatten)]
        query: QueryArgs,

        /// Print per-day series instead of totals.
        #[arg(long)]
        per_day: bool,
    },

    /// Per country totals or series.
    Countries {
        /// Path to the snapshot file.
        snapshot: PathBuf,

        #[command(flatten)]
        query: QueryArgs,

        /// Print per-day series instead of totals.
        #[arg(long)]
        per_day: bool,
    },

    /// World series or totals.
    World {
        /// Path to the snapshot file.
        snapshot: PathBuf,

        /// First day, inclusive (e.g. "1/22/20", "2020-01-22").
        #[arg(long)]
        from: Option<String>,

        /// Last day, inclusive.
        #[arg(long)]
        to: Option<String>,

        /// Print a single total instead of the per-day series.
        #[arg(long)]
        total: bool,

        /// Output format.
        #[arg(long, default_value = "json")]
        format: OutputFormat,
    },
}

/// Arguments shared by the state and country queries.
#[derive(Args)]
struct QueryArgs {
    /// First day, inclusive (e.g. "1/22/20", "2020-01-22").
    #[arg(long)]
    from: Option<String>,

    /// Last day, inclusive.
    #[arg(long)]
    to: Option<String>,

    /// Country name or code to restrict results to.
    #[arg(long)]
    country: Option<String>,

    /// Output format.
    #[arg(long, default_value = "json")]
    format: OutputFormat,
}

/// Output format for query results.
#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Comma-separated values.
    Csv,
    /// Pretty-printed JSON.
    Json,
}

type CliResult = Result<(), Box<dyn std::error::Error>>;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.config.as_deref();

    let result = match cli.command {
        Commands::Info { snapshot } => cmd_info(config, &snapshot),
        Commands::States {
            snapshot,
            query,
            per_day,
        } => cmd_states(config, &snapshot, &query, per_day),
        Commands::Countries {
            snapshot,
            query,
            per_day,
        } => cmd_countries(config, &snapshot, &query, per_day),
        Commands::World {
            snapshot,
            from,
            to,
            total,
            format,
        } => cmd_world(config, &snapshot, from.as_deref(), to.as_deref(), total, format),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

/// Builds a store and loads `snapshot` into it.
fn open_store(config: Option<&Path>, snapshot: &Path) -> Result<Store, Box<dyn std::error::Error>> {
    let config = match config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    let store = Store::new(config)?;
    let input = SnapshotInput::load(snapshot)?;
    let generation = store.refresh(input)?;
    tracing::debug!(path = %snapshot.display(), generation, "loaded snapshot");
    Ok(store)
}

/// Normalizes user dates strictly so typos are reported instead of clamped.
fn query_params(
    from: Option<&str>,
    to: Option<&str>,
    country: Option<&str>,
) -> Result<QueryParams, Box<dyn std::error::Error>> {
    Ok(QueryParams::new(
        normalize_date(from.unwrap_or_default())?,
        normalize_date(to.unwrap_or_default())?,
        country.unwrap_or_default(),
    ))
}

/// Implements `casecount info <snapshot>`.
fn cmd_info(config: Option<&Path>, snapshot_path: &Path) -> CliResult {
    let store = open_store(config, snapshot_path)?;
    let snapshot = store.snapshot()?;
    let bounds = snapshot.bounds();

    println!("Snapshot: {}", snapshot_path.display());
    println!("  First date: {}", bounds.first());
    println!("  Last date: {}", bounds.last());
    println!("  Days: {}", snapshot.day_count());
    println!("  Countries: {}", snapshot.buckets().len());
    println!("  Regions: {}", snapshot.region_count());

    let latest = snapshot
        .world_series()
        .last()
        .map(|day| day.statistics)
        .unwrap_or_default();
    println!();
    println!("World totals as of {}:", bounds.last());
    println!("  Confirmed: {}", latest.confirmed);
    println!("  Deaths: {}", latest.deaths);
    println!("  Recovered: {}", latest.recovered);

    Ok(())
}

/// Implements `casecount states <snapshot>`.
fn cmd_states(config: Option<&Path>, snapshot: &Path, args: &QueryArgs, per_day: bool) -> CliResult {
    let store = open_store(config, snapshot)?;
    let params = query_params(args.from.as_deref(), args.to.as_deref(), args.country.as_deref())?;

    if per_day {
        let result = store.state_series(&params)?;
        match args.format {
            OutputFormat::Json => print_json(&result)?,
            OutputFormat::Csv => print_state_series_csv(&result),
        }
    } else {
        let result = store.state_aggregates(&params)?;
        match args.format {
            OutputFormat::Json => print_json(&result)?,
            OutputFormat::Csv => print_state_aggregates_csv(&result),
        }
    }
    Ok(())
}

/// Implements `casecount countries <snapshot>`.
fn cmd_countries(
    config: Option<&Path>,
    snapshot: &Path,
    args: &QueryArgs,
    per_day: bool,
) -> CliResult {
    let store = open_store(config, snapshot)?;
    let params = query_params(args.from.as_deref(), args.to.as_deref(), args.country.as_deref())?;

    if per_day {
        let result = store.country_series(&params)?;
        match args.format {
            OutputFormat::Json => print_json(&result)?,
            OutputFormat::Csv => print_country_series_csv(&result),
        }
    } else {
        let result = store.country_aggregates(&params)?;
        match args.format {
            OutputFormat::Json => print_json(&result)?,
            OutputFormat::Csv => print_country_aggregates_csv(&result),
        }
    }
    Ok(())
}

/// Implements `casecount world <snapshot>`.
fn cmd_world(
    config: Option<&Path>,
    snapshot: &Path,
    from: Option<&str>,
    to: Option<&str>,
    total: bool,
    format: OutputFormat,
) -> CliResult {
    let store = open_store(config, snapshot)?;
    let params = query_params(from, to, None)?;

    if total {
        let statistics = store.world_aggregate(&params)?;
        match format {
            OutputFormat::Json => print_json(&statistics)?,
            OutputFormat::Csv => {
                println!("confirmed,deaths,recovered");
                println!("{}", statistics_csv(&statistics));
            }
        }
    } else {
        let series = store.world_series(&params)?;
        match format {
            OutputFormat::Json => print_json(&series)?,
            OutputFormat::Csv => {
                println!("date,confirmed,deaths,recovered");
                print_days_csv("", &series);
            }
        }
    }
    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> CliResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_state_aggregates_csv(result: &BTreeMap<String, CountryStates<Aggregate>>) {
    println!("country,state,lat,long,population,confirmed,deaths,recovered");
    for country in result.values() {
        for (state, aggregate) in &country.states {
            let prefix = format!("{},{}", csv_field(&country.name), csv_field(state));
            println!("{prefix},{}", aggregate_csv(aggregate));
        }
    }
}

fn print_state_series_csv(result: &BTreeMap<String, CountryStates<RegionSeries>>) {
    println!("country,state,date,confirmed,deaths,recovered");
    for country in result.values() {
        for (state, series) in &country.states {
            let prefix = format!("{},{},", csv_field(&country.name), csv_field(state));
            print_days_csv(&prefix, &series.counts);
        }
    }
}

fn print_country_aggregates_csv(result: &BTreeMap<String, CountryAggregate>) {
    println!("country,lat,long,population,confirmed,deaths,recovered");
    for country in result.values() {
        println!("{},{}", csv_field(&country.name), aggregate_csv(&country.aggregate));
    }
}

fn print_country_series_csv(result: &BTreeMap<String, CountrySeries>) {
    println!("country,date,confirmed,deaths,recovered");
    for country in result.values() {
        let prefix = format!("{},", csv_field(&country.name));
        print_days_csv(&prefix, &country.series.counts);
    }
}

fn print_days_csv(prefix: &str, days: &[DailyStat]) {
    for day in days {
        println!("{prefix}{},{}", day.date, statistics_csv(&day.statistics));
    }
}

fn aggregate_csv(aggregate: &Aggregate) -> String {
    let (lat, long) = aggregate
        .location
        .map(|location| (location.lat.to_string(), location.long.to_string()))
        .unwrap_or_default();
    format!(
        "{lat},{long},{},{}",
        aggregate.population,
        statistics_csv(&aggregate.statistics)
    )
}

fn statistics_csv(statistics: &Statistics) -> String {
    format!(
        "{},{},{}",
        statistics.confirmed, statistics.deaths, statistics.recovered
    )
}

/// Quotes a field if it contains a separator or quote.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
