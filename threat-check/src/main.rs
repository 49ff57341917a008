//! Threat Check CLI Application
//!
//! Reads URLs from a CSV file, checks each one against Google Web Risk with a
//! bounded worker pool, writes the verdicts to a results table and renders
//! the verdict distribution as a pie chart.

mod ui;

use clap::builder::styling::{AnsiColor, Effects, Styles};
use clap::Parser;
use std::fs::OpenOptions;
use std::path::Path;
use std::process;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use threat_check_lib::config::{parse_threat_types, parse_timeout};
use threat_check_lib::{load_env_config, ConfigManager, RunConfig};
use threat_check_lib::{
    ChartReport, CsvResultSink, CsvUrlSupplier, RenderOutcome, VerificationPool, WebRiskClient,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const STYLES: Styles = Styles::styled()
    .header(AnsiColor::Yellow.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Yellow.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

/// CLI arguments for threat-check
#[derive(Parser, Debug)]
#[command(name = "threat-check")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Check URLs against Google Web Risk threat lists")]
#[command(
    long_about = "Check a CSV list of URLs against Google Web Risk threat lists.\n\nWrites one verdict per URL to a results table, prints the percentage breakdown and renders it as an SVG pie chart."
)]
#[command(styles = STYLES)]
pub struct Args {
    /// CSV file with a 'Link' column
    #[arg(short = 'i', long = "input", value_name = "FILE", help_heading = "Files")]
    pub input: Option<String>,

    /// Results table to write (URL,Threat Type)
    #[arg(short = 'o', long = "output", value_name = "FILE", help_heading = "Files")]
    pub output: Option<String>,

    /// Chart file to write [default: resources/threat_analysis_chart.svg]
    #[arg(long = "chart", value_name = "FILE", help_heading = "Files")]
    pub chart: Option<String>,

    /// Log file to append to [default: resources/log.txt]
    #[arg(long = "log", value_name = "FILE", help_heading = "Files")]
    pub log: Option<String>,

    /// Threat types to query (comma-separated or multiple -t flags)
    #[arg(short = 't', long = "threat-type", value_name = "TYPE", value_delimiter = ',', action = clap::ArgAction::Append, help_heading = "Lookup")]
    pub threat_types: Option<Vec<String>>,

    /// Web Risk API base URL
    #[arg(long = "endpoint", value_name = "URL", help_heading = "Lookup")]
    pub endpoint: Option<String>,

    /// Per-lookup timeout, e.g. 10s or 1m (default: 10s)
    #[arg(long = "timeout", value_name = "DURATION", help_heading = "Lookup")]
    pub timeout: Option<String>,

    /// Max lookups in flight (default: 5, max: 100)
    #[arg(short = 'c', long = "concurrency", help_heading = "Performance")]
    pub concurrency: Option<usize>,

    /// Worker loops draining the queue (default: same as concurrency)
    #[arg(short = 'w', long = "workers", help_heading = "Performance")]
    pub workers: Option<usize>,

    /// Print the distribution as JSON
    #[arg(short = 'j', long = "json", help_heading = "Output")]
    pub json: bool,

    /// Skip chart rendering
    #[arg(long = "no-chart", help_heading = "Output")]
    pub no_chart: bool,

    /// List the URLs that would be checked and exit
    #[arg(long = "dry-run", help_heading = "Output")]
    pub dry_run: bool,

    /// Use specific config file instead of ./threat-check.toml discovery
    #[arg(long = "config", value_name = "FILE", help_heading = "Configuration")]
    pub config: Option<String>,

    /// Verbose logging
    #[arg(short = 'v', long = "verbose", help_heading = "Configuration")]
    pub verbose: bool,
}

#[tokio::main]
async fn main() {
    // A missing .env is fine
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    if let Err(e) = run_threat_check(args).await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

async fn run_threat_check(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let started = Instant::now();

    let config = build_config(&args)?;
    config.validate(!args.dry_run)?;

    init_tracing(&config.log, args.verbose);

    if !args.json && !args.dry_run {
        println!("Processing your request.....");
    }

    let supplier = CsvUrlSupplier::new(config.input()?);
    let urls = match supplier.list_urls() {
        Ok(urls) => urls,
        Err(e) if !e.is_fatal() => {
            warn!(error = %e, "Input could not be used");
            eprintln!("Warning: {}", e);
            Vec::new()
        }
        Err(e) => return Err(e.into()),
    };

    if urls.is_empty() {
        info!("No URLs to check");
        println!(
            "Nothing to do: no URLs found in {}",
            supplier.path().display()
        );
        return Ok(());
    }

    if args.dry_run {
        if args.json {
            println!("{}", serde_json::to_string_pretty(&urls)?);
        } else {
            for url in &urls {
                println!("{}", url);
            }
        }
        eprintln!("{} URLs would be checked", urls.len());
        return Ok(());
    }

    let api_key = config.api_key.clone().unwrap_or_default();
    let client = WebRiskClient::with_config(api_key, &config.endpoint, config.pool.timeout)?;
    let pool = VerificationPool::with_config(Arc::new(client), config.pool.clone())?;

    if !args.json {
        ui::print_header(urls.len(), &config);
    }
    info!(
        urls = urls.len(),
        concurrency = pool.concurrency(),
        "Starting verification of {} URLs",
        urls.len()
    );

    let spinner = if args.json {
        None
    } else {
        ui::Spinner::start(format!("Checking {} URLs...", urls.len()))
    };
    let outcome = pool.verify_all(urls).await;
    if let Some(spinner) = spinner {
        spinner.stop().await;
    }
    let results = outcome?;

    let sink = CsvResultSink::new(config.results()?);
    sink.persist(&results)?;
    let distribution = sink.compute_distribution()?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&distribution)?);
    } else {
        ui::print_summary(&results, sink.path());
        ui::print_distribution(&distribution);
        println!();
    }

    if !args.no_chart {
        render_chart(&ChartReport::new(&config.chart), &sink, args.json);
    }

    let elapsed = started.elapsed().as_secs_f64();
    info!("Run finished in {:.2} seconds", elapsed);
    if args.json {
        eprintln!("The program took: {:.2} seconds", elapsed);
    } else {
        println!("The program took: {:.2} seconds", elapsed);
    }

    Ok(())
}

/// Render the chart; failures are reported but never fail the run.
fn render_chart(report: &ChartReport, sink: &CsvResultSink, json: bool) {
    match report.render(sink) {
        Ok(RenderOutcome::Rendered(path)) => {
            if !json {
                println!("Chart saved to {}", path.display());
            }
        }
        Ok(RenderOutcome::Skipped) => {
            if !json {
                println!("No results to chart");
            }
        }
        Err(e) => {
            warn!(error = %e, "Chart was not generated");
            eprintln!("Warning: chart was not generated: {}", e);
        }
    }
}

/// Resolve settings: CLI flags over environment over config file over defaults.
fn build_config(args: &Args) -> Result<RunConfig, Box<dyn std::error::Error>> {
    let mut config = RunConfig::default();

    let config_manager = ConfigManager::new(args.verbose);
    let env_config = load_env_config(args.verbose);

    // Step 1: config file (explicit path, TC_CONFIG, or discovery)
    let explicit = args.config.as_ref().or(env_config.config.as_ref());
    let file_config = match explicit {
        Some(path) => config_manager
            .load_file(path)
            .map_err(|e| format!("Failed to load config file '{}': {}", path, e))?,
        None => config_manager.discover_and_load()?,
    };
    config.apply_file(&file_config)?;

    // Step 2: TC_* environment variables
    config.apply_env(&env_config)?;

    // Step 3: CLI arguments (highest precedence)
    apply_cli_args_to_config(&mut config, args)?;

    Ok(config)
}

fn apply_cli_args_to_config(
    config: &mut RunConfig,
    args: &Args,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(input) = &args.input {
        config.input = Some(input.into());
    }
    if let Some(output) = &args.output {
        config.results = Some(output.into());
    }
    if let Some(chart) = &args.chart {
        config.chart = chart.into();
    }
    if let Some(log) = &args.log {
        config.log = log.into();
    }
    if let Some(endpoint) = &args.endpoint {
        config.endpoint = endpoint.clone();
    }
    if let Some(concurrency) = args.concurrency {
        config.pool.concurrency = concurrency;
    }
    if let Some(workers) = args.workers {
        config.pool.workers = Some(workers);
    }
    if let Some(timeout) = &args.timeout {
        config.pool.timeout = parse_timeout(timeout)?;
    }
    if let Some(threat_types) = &args.threat_types {
        config.pool.categories = parse_threat_types(threat_types)?;
    }
    Ok(())
}

/// Send `tracing` events to the log file, or to stderr if it cannot be opened.
///
/// `RUST_LOG` overrides the default filter.
fn init_tracing(log_path: &Path, verbose: bool) {
    let default_filter = if verbose {
        "info,threat_check=debug,threat_check_lib=debug"
    } else {
        "info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_target(false);

    match open_log_file(log_path) {
        Ok(file) => {
            let _ = builder.with_writer(Mutex::new(file)).try_init();
        }
        Err(e) => {
            eprintln!(
                "Warning: cannot open log file {} ({}); logging to stderr",
                log_path.display(),
                e
            );
            let _ = builder.with_writer(std::io::stderr).try_init();
        }
    }
}

fn open_log_file(path: &Path) -> std::io::Result<std::fs::File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}
