//! CLI entry point for the subway delay tools.
//!
//! `clean` turns raw exports into the canonical dataset; the `*-stats`
//! subcommands read that dataset back and emit JSON statistics.

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use subway_delays::{
    audit,
    config::PipelineConfig,
    loader::{load_events, load_sources},
    output,
    pipeline::Pipeline,
    records::DelayEvent,
    registry::{ReferenceRegistry, RegistryPaths},
    stats::{
        self, EventFilter, TimeUnit, all_line_stats, all_station_stats,
        code_specific_station_stats, general_delay_stats, latest_complete_year,
    },
};
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "subway_delays")]
#[command(about = "Clean subway delay records and compute reliability statistics", long_about = None)]
struct Cli {
    /// JSON pipeline config; built-in defaults when omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct StatsArgs {
    /// Cleaned dataset written by `clean` (.csv or .csv.gz)
    #[arg(short, long)]
    events: PathBuf,

    /// First year to include
    #[arg(long)]
    start_year: Option<i32>,

    /// Last year to include
    #[arg(long)]
    end_year: Option<i32>,

    #[arg(short, long, value_enum, default_value_t = TimeUnit::Minutes)]
    unit: TimeUnit,

    /// Write JSON here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
enum RankBy {
    Station,
    Vehicle,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge, validate and normalize raw delay exports
    Clean {
        /// Directory of CSV exports; subdirectories are multi-part sources
        #[arg(value_name = "SOURCE_DIR")]
        source_dir: PathBuf,

        /// Plain list of valid station names
        #[arg(long, default_value = "data/reference/stations.txt")]
        station_list: PathBuf,

        /// `NAME STATION['YU', 'BD']` entries
        #[arg(long, default_value = "data/reference/linecodes.txt")]
        station_lines: PathBuf,

        /// Delay code table (CSV)
        #[arg(long, default_value = "data/reference/delay_codes.csv")]
        delay_codes: PathBuf,

        #[arg(short, long, default_value = "processed")]
        output_dir: PathBuf,

        /// Gzip the cleaned dataset
        #[arg(long, default_value_t = false)]
        gzip: bool,
    },
    /// Poisson buffer statistics per line, bound and rush-hour window
    LineStats {
        #[command(flatten)]
        args: StatsArgs,
    },
    /// Per-station summary for one year
    StationStats {
        #[command(flatten)]
        args: StatsArgs,

        /// Defaults to the latest complete year in the data
        #[arg(long)]
        year: Option<i32>,
    },
    /// Stations consistently in the top N for a set of delay codes
    CodeStats {
        #[command(flatten)]
        args: StatsArgs,

        /// Delay codes, comma separated (e.g. SUDP,SUAP)
        #[arg(long, value_delimiter = ',', required = true)]
        codes: Vec<String>,

        /// Label for the code group
        #[arg(long)]
        name: Option<String>,

        #[arg(long, default_value_t = 5)]
        top_n: usize,
    },
    /// Average, median, spread and rate of delays
    GeneralStats {
        #[command(flatten)]
        args: StatsArgs,

        /// Restrict to one delay code
        #[arg(long)]
        code: Option<String>,
    },
    /// Stations or vehicles in the top N by delay minutes in every recent year
    ConsistentTop {
        #[command(flatten)]
        args: StatsArgs,

        #[arg(long, value_enum, default_value_t = RankBy::Station)]
        by: RankBy,

        #[arg(long, default_value_t = 3)]
        last_n_years: usize,

        #[arg(long, default_value_t = 10)]
        top_n: usize,
    },
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/subway_delays.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("subway_delays.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();
    let config = PipelineConfig::load_or_default(cli.config.as_deref())?;

    match cli.command {
        Commands::Clean {
            source_dir,
            station_list,
            station_lines,
            delay_codes,
            output_dir,
            gzip,
        } => {
            let paths = RegistryPaths {
                station_list,
                station_lines,
                delay_codes,
            };
            clean(&source_dir, &paths, &config, &output_dir, gzip)?;
        }
        Commands::LineStats { args } => {
            let events = load_events(&args.events)?;
            let selected = select(&events, &args);
            let registry = ReferenceRegistry::from_config(&config)?;

            let stats = all_line_stats(&selected, &registry, &config.stats, args.unit);
            emit(&stats, args.output.as_deref())?;
        }
        Commands::StationStats { args, year } => {
            let events = load_events(&args.events)?;
            let selected = select(&events, &args);

            let Some(year) = year.or_else(|| latest_complete_year(&selected)) else {
                warn!("No events selected, nothing to summarize");
                return Ok(());
            };
            info!(year, "Computing station stats");

            let stats =
                all_station_stats(&selected, year, args.unit, config.stats.major_delay_minutes);
            emit(&stats, args.output.as_deref())?;
        }
        Commands::CodeStats {
            args,
            codes,
            name,
            top_n,
        } => {
            let events = load_events(&args.events)?;
            let selected = select(&events, &args);
            let codes: Vec<String> = codes.iter().map(|c| c.trim().to_uppercase()).collect();
            let name = name.unwrap_or_else(|| codes.join("/"));

            let stats = code_specific_station_stats(&selected, &codes, &name, top_n, args.unit);
            emit(&stats, args.output.as_deref())?;
        }
        Commands::GeneralStats { args, code } => {
            let events = load_events(&args.events)?;
            let code = code.map(|c| c.trim().to_uppercase());

            let mut filter = year_filter(&args);
            if let Some(c) = &code {
                filter = filter.with_codes(&[c]);
            }
            let selected = filter.apply(&events);

            let stats = general_delay_stats(&selected, code.as_deref(), args.unit);
            emit(&stats, args.output.as_deref())?;
        }
        Commands::ConsistentTop {
            args,
            by,
            last_n_years,
            top_n,
        } => {
            let events = load_events(&args.events)?;
            let selected = select(&events, &args);

            match by {
                RankBy::Station => {
                    let ranked = stats::consistently_top_stations(
                        &selected,
                        last_n_years,
                        top_n,
                        args.unit,
                    );
                    emit(&ranked, args.output.as_deref())?;
                }
                RankBy::Vehicle => {
                    let ranked = stats::consistently_top_vehicles(
                        &selected,
                        last_n_years,
                        top_n,
                        args.unit,
                    );
                    emit(&ranked, args.output.as_deref())?;
                }
            }
        }
    }

    Ok(())
}

/// Runs the cleaning pipeline and writes the dataset, side files and audit
/// logs under `output_dir`.
#[tracing::instrument(
    skip(paths, config),
    fields(source_dir = %source_dir.display(), output_dir = %output_dir.display())
)]
fn clean(
    source_dir: &Path,
    paths: &RegistryPaths,
    config: &PipelineConfig,
    output_dir: &Path,
    gzip: bool,
) -> Result<()> {
    let registry =
        ReferenceRegistry::load(paths, config).context("failed to load reference data")?;
    let pipeline = Pipeline::new(&registry)?;

    let sources = load_sources(source_dir)?;
    let outcome = pipeline.run(sources);

    let now = Utc::now().naive_utc();
    let events_path = output::timestamped_path(output_dir, "subway_delays_clean", "csv", now);
    output::write_events(&events_path, &outcome.events)?;
    if gzip {
        output::gzip_file(&events_path)?;
    }

    output::write_dropped(&output_dir.join("dropped"), &outcome.dropped)?;
    output::write_unknown_codes(
        &output_dir.join("unknown_delay_codes.csv"),
        &outcome.unknown_codes,
    )?;
    audit::write_audit(&output_dir.join("audit"), &outcome, now)?;

    info!(events = outcome.events.len(), "Clean run finished");
    Ok(())
}

fn year_filter(args: &StatsArgs) -> EventFilter {
    match (args.start_year, args.end_year) {
        (None, None) => EventFilter::new(),
        (start, end) => {
            EventFilter::new().with_years(start.unwrap_or(i32::MIN), end.unwrap_or(i32::MAX))
        }
    }
}

fn select<'e>(events: &'e [DelayEvent], args: &StatsArgs) -> Vec<&'e DelayEvent> {
    let selected = year_filter(args).apply(events);
    info!(loaded = events.len(), selected = selected.len(), "Events selected");
    selected
}

fn emit<T: Serialize>(value: &T, path: Option<&Path>) -> Result<()> {
    match path {
        Some(p) => output::write_json(p, value),
        None => {
            println!("{}", serde_json::to_string_pretty(value)?);
            Ok(())
        }
    }
}
