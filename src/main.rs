//! CLI entry point for the LSOA enrichment tool.
//!
//! Provides subcommands for joining yearly ADI tables onto LSOA boundaries,
//! splitting the merged result per variable, and computing display ranges
//! for rate columns.

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use lsoa_enrich::config::{
    DEFAULT_KEY_FIELD, JoinConfig, JoinMode, MissingFilePolicy, OutputFormat, RangeConfig,
    Retention, SplitConfig, TableSource,
};
use lsoa_enrich::keys::Year;
use lsoa_enrich::output::print_json;
use lsoa_enrich::pipeline::{run_join, run_ranges, run_split};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "lsoa_enrich")]
#[command(about = "Join ADI indicator tables onto LSOA boundaries", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Where the boundary file and yearly tables are read from.
#[derive(Args)]
struct InputArgs {
    /// LSOA boundary GeoJSON file
    #[arg(short, long, default_value = "data/LSOA_WGS84.geojson")]
    geometry: PathBuf,

    /// Directory containing one ADI_<year> folder per year
    #[arg(short, long, default_value = "data/ADI_all-domains")]
    input: PathBuf,

    /// Feature property holding the LSOA code
    #[arg(short, long, default_value = DEFAULT_KEY_FIELD)]
    key_field: String,

    /// Domains to load per year (defaults to claimant_counts, crime, health)
    #[arg(short, long, value_delimiter = ',')]
    domains: Vec<String>,

    /// Gzip compress GeoJSON output
    #[arg(long, default_value_t = false)]
    gzip: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge every year's fields onto the boundaries and write one GeoJSON
    Join {
        #[command(flatten)]
        input: InputArgs,

        /// Output GeoJSON file
        #[arg(short, long, default_value = "output/LSOA.geojson")]
        output: PathBuf,

        /// Which fields to merge
        #[arg(long, value_enum, default_value_t = JoinMode::AllFields)]
        mode: JoinMode,

        /// Which features to keep
        #[arg(long, value_enum, default_value_t = Retention::MatchedOnly)]
        retention: Retention,

        /// What to do when a domain file is missing
        #[arg(long, value_enum, default_value_t = MissingFilePolicy::Fail)]
        on_missing: MissingFilePolicy,
    },
    /// Merge rate fields and write one GeoJSON per variable
    Split {
        #[command(flatten)]
        input: InputArgs,

        /// Directory for per-variable GeoJSON files
        #[arg(short, long, default_value = "output")]
        output_dir: PathBuf,

        /// Which fields to merge
        #[arg(long, value_enum, default_value_t = JoinMode::RateOnly)]
        mode: JoinMode,

        /// Which features to keep
        #[arg(long, value_enum, default_value_t = Retention::All)]
        retention: Retention,

        /// What to do when a domain file is missing
        #[arg(long, value_enum, default_value_t = MissingFilePolicy::Skip)]
        on_missing: MissingFilePolicy,
    },
    /// Compute mean ± 2·std display ranges for every rate column
    Ranges {
        /// Directory containing one ADI_<year> folder per year
        #[arg(short, long, default_value = "data/ADI_all-domains")]
        input: PathBuf,

        /// First year to include
        #[arg(long, default_value = "2013")]
        from: Year,

        /// Last year to include (defaults to the first year)
        #[arg(long)]
        to: Option<Year>,

        /// Report file (defaults to output/<years>_rate_ranges.<ext>)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Report format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,

        /// Domains to load per year (defaults to claimant_counts, crime, health)
        #[arg(short, long, value_delimiter = ',')]
        domains: Vec<String>,

        /// What to do when a domain file is missing
        #[arg(long, value_enum, default_value_t = MissingFilePolicy::Skip)]
        on_missing: MissingFilePolicy,
    },
}

impl InputArgs {
    fn into_join_config(
        self,
        output_path: PathBuf,
        mode: JoinMode,
        retention: Retention,
        on_missing: MissingFilePolicy,
    ) -> JoinConfig {
        JoinConfig {
            geometry_path: self.geometry,
            key_field: self.key_field,
            tables: TableSource::new(self.input, on_missing).with_domains(self.domains),
            mode,
            retention,
            output_path,
            gzip: self.gzip,
        }
    }
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/lsoa_enrich.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("lsoa_enrich.log"));

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

    match cli.command {
        Commands::Join {
            input,
            output,
            mode,
            retention,
            on_missing,
        } => {
            let config = input.into_join_config(output, mode, retention, on_missing);
            let summary = run_join(&config)?;
            print_json(&summary)?;
        }
        Commands::Split {
            input,
            output_dir,
            mode,
            retention,
            on_missing,
        } => {
            let join = input.into_join_config(output_dir.clone(), mode, retention, on_missing);
            let written = run_split(&SplitConfig { join, output_dir })?;
            info!(files = written.len(), "Per-variable files written");
        }
        Commands::Ranges {
            input,
            from,
            to,
            output,
            format,
            domains,
            on_missing,
        } => {
            let to = to.unwrap_or(from);
            anyhow::ensure!(from <= to, "--from {from} is after --to {to}");

            let output_path = output.unwrap_or_else(|| default_report_path(from, to, format));
            let config = RangeConfig {
                tables: TableSource::new(input, on_missing).with_domains(domains),
                from_year: from,
                to_year: to,
                output_path,
                format,
            };
            let aggregate = run_ranges(&config)?;
            info!(columns = aggregate.columns.len(), "Rate ranges computed");
        }
    }

    Ok(())
}

/// `output/2013_rate_ranges.txt` or `output/2013-2019_rate_ranges.json`.
fn default_report_path(from: Year, to: Year, format: OutputFormat) -> PathBuf {
    let years = if from == to {
        from.to_string()
    } else {
        format!("{from}-{to}")
    };
    let ext = match format {
        OutputFormat::Text => "txt",
        OutputFormat::Json => "json",
    };
    PathBuf::from("output").join(format!("{years}_rate_ranges.{ext}"))
}
