//! CLI entry point for the micromobility collision cost tool.
//!
//! Provides subcommands for preprocessing accident tables, attributing
//! collision costs to a mode, running scenario ensembles, and composing the
//! total external cost report.

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use micromobility_costs::collisions::{
    CollisionsCalculator, EnsembleRunner, JsonFileCache, NoCache, ScenarioCache, aggregate,
};
use micromobility_costs::config::CostConfig;
use micromobility_costs::costs::ExternalCostsCalculator;
use micromobility_costs::costs::load_static_categories;
use micromobility_costs::dataset::{LoadOptions, load_scenario_dir, load_with_fallback};
use micromobility_costs::mode::{Mode, Policy};
use micromobility_costs::output::{
    ResultRow, append_record, print_json, print_pretty, print_report, write_json, write_processed,
};
use micromobility_costs::record::preprocess;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "micromobility_costs")]
#[command(about = "External collision costs of private and shared micromobility", long_about = None)]
struct Cli {
    /// JSON file overriding the built-in study constants
    #[arg(long, global = true)]
    config: Option<String>,

    /// Field separator of the accident tables
    #[arg(long, global = true, default_value_t = ',')]
    separator: char,

    /// Preamble lines before the header row of each accident table
    #[arg(long, global = true, default_value_t = 0)]
    skip_rows: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Derive energy shares and monetized costs and write the processed table
    Preprocess {
        /// Raw accident table (.csv or .csv.gz)
        #[arg(short, long)]
        input: PathBuf,

        /// CSV file to write the processed table to
        #[arg(short, long)]
        output: String,
    },
    /// Attribute collision costs of one accident table to a mode
    Collisions {
        #[arg(short, long)]
        mode: Mode,

        #[arg(short, long, default_value = "damage_potential")]
        policy: Policy,

        /// Accident table (.csv or .csv.gz)
        #[arg(short, long)]
        accidents: PathBuf,

        /// CSV file to append the result to
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Average collision costs over a directory of scenario accident tables
    Ensemble {
        #[arg(short, long)]
        mode: Mode,

        #[arg(short, long, default_value = "damage_potential")]
        policy: Policy,

        /// Directory with one accident table per scenario
        #[arg(short = 'd', long)]
        scenario_dir: PathBuf,

        /// Directory for cached ensemble results; caching is off without it
        #[arg(long)]
        cache_dir: Option<PathBuf>,

        /// Discard any cached result and recompute
        #[arg(long, default_value_t = false)]
        refresh: bool,

        /// JSON file to write the ensemble result to
        #[arg(long)]
        json: Option<String>,

        /// CSV file to append the mean and per-scenario results to
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Compose collision costs with other categories into a total
    Total {
        #[arg(short, long)]
        mode: Mode,

        #[arg(short, long, default_value = "damage_potential")]
        policy: Policy,

        /// Accident table (.csv or .csv.gz)
        #[arg(short, long)]
        accidents: PathBuf,

        /// JSON map of externally computed categories
        #[arg(long)]
        other_categories: Option<String>,

        /// JSON file to write the report to
        #[arg(long)]
        json: Option<String>,
    },
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let _file_guard = init_tracing()?;

    let cli = Cli::parse();
    let config = CostConfig::resolve(cli.config.as_deref())?;
    let options = load_options(cli.separator, cli.skip_rows)?;

    match cli.command {
        Commands::Preprocess { input, output } => {
            let rows = load_with_fallback(&input, config.fallback_accidents.as_deref(), &options)?;
            let records = preprocess(&rows, &config.tables);
            write_processed(&output, &records)?;
        }
        Commands::Collisions {
            mode,
            policy,
            accidents,
            output,
        } => {
            let profiles = config.mode_profiles()?;
            let rows =
                load_with_fallback(&accidents, config.fallback_accidents.as_deref(), &options)?;
            let records = preprocess(&rows, &config.tables);
            let result = aggregate(&records, profiles.get(mode), policy)?;

            print_report(mode, policy, &result);
            if let Some(output) = output {
                append_record(&output, &ResultRow::new(mode, policy, &result))?;
            }
        }
        Commands::Ensemble {
            mode,
            policy,
            scenario_dir,
            cache_dir,
            refresh,
            json,
            output,
        } => {
            let profiles = config.mode_profiles()?;
            let cache: Box<dyn ScenarioCache> = match cache_dir {
                Some(dir) => Box::new(JsonFileCache::new(dir)),
                None => Box::new(NoCache),
            };
            let runner = EnsembleRunner::new(&config.tables, &profiles, cache.as_ref());
            if refresh {
                runner.invalidate(mode, policy)?;
            }

            let ensemble = runner.run(mode, policy, || load_scenario_dir(&scenario_dir, &options))?;
            print_report(mode, policy, &ensemble.result);
            if let Some(summary) = ensemble.summary() {
                info!(
                    scenarios = summary.count,
                    mean = summary.mean,
                    stddev = summary.stddev,
                    min = summary.min,
                    max = summary.max,
                    "Cost per pkm across scenarios"
                );
            }
            print_pretty(&ensemble.scenario_results);

            if let Some(json) = json {
                write_json(&json, &ensemble)?;
            }
            if let Some(output) = output {
                append_record(&output, &ResultRow::new(mode, policy, &ensemble.result))?;
                for (name, result) in &ensemble.scenario_results {
                    append_record(&output, &ResultRow::new(mode, policy, result).with_scenario(name))?;
                }
            }
        }
        Commands::Total {
            mode,
            policy,
            accidents,
            other_categories,
            json,
        } => {
            let profiles = config.mode_profiles()?;
            let rows =
                load_with_fallback(&accidents, config.fallback_accidents.as_deref(), &options)?;
            let records = preprocess(&rows, &config.tables);

            let mut calculator = ExternalCostsCalculator::new();
            calculator.append(CollisionsCalculator {
                records: &records,
                profile: profiles.get(mode),
                policy,
            });
            if let Some(path) = other_categories {
                for category in load_static_categories(&path)? {
                    calculator.append(category);
                }
            }

            let report = calculator.evaluate()?;
            info!(%mode, %policy, categories = calculator.len(), "Total cost evaluated");
            print_json(&report)?;
            if let Some(json) = json {
                write_json(&json, &report)?;
            }
        }
    }

    Ok(())
}

fn load_options(separator: char, skip_rows: usize) -> Result<LoadOptions> {
    if !separator.is_ascii() {
        bail!("separator must be a single ASCII character, got '{separator}'");
    }
    Ok(LoadOptions {
        delimiter: separator as u8,
        skip_rows,
        ..Default::default()
    })
}

/// Logging setup: colored stderr + JSON rolling log file.
fn init_tracing() -> Result<WorkerGuard> {
    let log_file_path = std::env::var("LOG_FILE_PATH")
        .unwrap_or_else(|_| "logs/micromobility_costs.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("micromobility_costs.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);

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

    Ok(file_guard)
}
