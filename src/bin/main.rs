//! Semgate CLI - Inspect query normalization and time handling
//!
//! Usage:
//!   semgate normalize <query.json|->
//!   semgate resolve-date <expression> [--timezone <tz>]
//!   semgate time-series --granularity <g> --from <ts> --to <ts>
//!
//! Examples:
//!   semgate normalize query.json
//!   echo '{"measures":["Orders.count"]}' | semgate normalize -
//!   semgate resolve-date "last 7 days" --timezone America/New_York
//!   semgate time-series --granularity month --from 2021-01-01 --to 2021-12-31

use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process::ExitCode;

use chrono::Utc;
use chrono_tz::Tz;
use clap::{Parser, Subcommand};
use semgate::config::Settings;
use semgate::query::QueryNormalizer;
use semgate::time::{resolve_date_expression, CustomGranularity, Granularity, TimeSeriesGenerator};
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "semgate")]
#[command(about = "Semgate - query normalization and result reshaping for a semantic layer")]
#[command(version)]
struct Cli {
    /// Path to a semgate.toml (searched for when omitted)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Normalize a query and print the executable queries
    Normalize {
        /// Path to a JSON query, or `-` for stdin
        file: PathBuf,

        /// Skip the row limit ceiling
        #[arg(long)]
        persistent: bool,
    },

    /// Resolve a date expression to a [start, end] range
    ResolveDate {
        /// Expression such as "last 7 days" or "from 2 weeks ago to now"
        expression: String,

        /// Timezone used for "now" (defaults to the configured timezone)
        #[arg(short, long)]
        timezone: Option<String>,
    },

    /// Generate the bucket series for a granularity
    TimeSeries {
        #[arg(short, long)]
        granularity: String,

        #[arg(long)]
        from: String,

        #[arg(long)]
        to: String,

        /// Interval of a custom granularity, e.g. "2 months"
        #[arg(long)]
        interval: Option<String>,

        #[arg(long)]
        origin: Option<String>,

        #[arg(long)]
        offset: Option<String>,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("semgate=info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let settings = match &cli.config {
        Some(path) => Settings::from_file(path),
        None => Settings::load(),
    };
    let settings = match settings.and_then(|s| s.validate().map(|_| s)) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Commands::Normalize { file, persistent } => cmd_normalize(&settings, file, persistent),
        Commands::ResolveDate {
            expression,
            timezone,
        } => cmd_resolve_date(&settings, &expression, timezone),
        Commands::TimeSeries {
            granularity,
            from,
            to,
            interval,
            origin,
            offset,
        } => cmd_time_series(&settings, &granularity, [from, to], interval, origin, offset),
    }
}

fn cmd_normalize(settings: &Settings, file: PathBuf, persistent: bool) -> ExitCode {
    let source = if file.as_os_str() == "-" {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf).map(|_| buf)
    } else {
        fs::read_to_string(&file)
    };
    let source = match source {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error reading query '{}': {}", file.display(), e);
            return ExitCode::FAILURE;
        }
    };

    let raw: Value = match serde_json::from_str(&source) {
        Ok(v) => v,
        Err(e) => {
            eprintln!("Query is not valid JSON: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match QueryNormalizer::new(&settings.query).normalize(&raw, persistent) {
        Ok(request) => {
            let query_type = request.query_type();
            let output = json!({
                "queryType": query_type,
                "normalizedQueries": request.queries.as_slice(),
                "pivotQuery": request.pivot_query,
            });
            print_json(&output)
        }
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn cmd_resolve_date(settings: &Settings, expression: &str, timezone: Option<String>) -> ExitCode {
    let name = timezone.unwrap_or_else(|| settings.query.default_timezone.clone());
    let tz: Tz = match name.parse() {
        Ok(tz) => tz,
        Err(_) => {
            eprintln!("Unknown timezone: {}", name);
            return ExitCode::FAILURE;
        }
    };

    match resolve_date_expression(expression, tz, Utc::now()) {
        Ok(range) => print_json(&json!(range)),
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn cmd_time_series(
    settings: &Settings,
    granularity: &str,
    range: [String; 2],
    interval: Option<String>,
    origin: Option<String>,
    offset: Option<String>,
) -> ExitCode {
    let granularity = Granularity::parse(granularity);
    let custom = interval.map(|interval| CustomGranularity {
        interval,
        origin,
        offset,
    });

    let generator = TimeSeriesGenerator::new(&settings.time_series);
    match generator.generate(&granularity, &range, false, custom.as_ref()) {
        Ok(series) => print_json(&json!(series)),
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn print_json(value: &Value) -> ExitCode {
    match serde_json::to_string_pretty(value) {
        Ok(text) => {
            println!("{}", text);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Failed to serialize output: {}", e);
            ExitCode::FAILURE
        }
    }
}
