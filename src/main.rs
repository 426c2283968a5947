use std::{
    io::{IsTerminal, stderr, stdout},
    path::PathBuf,
    process::ExitCode,
    sync::Arc,
};

use chrono::Utc;
use clap::{Parser, ValueEnum};
use config::Config;
use serde_json::json;
use tracing::{error, info, level_filters::LevelFilter};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{Layer, layer::SubscriberExt, util::SubscriberInitExt};
use usage_stats::{
    LogKind, Unit,
    geo::{self, SystemResolver},
};

mod config;
mod logdir;

#[derive(clap::Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
struct CliOptions {
    /// Directory of daily `YYYY-MM-DD.log` files
    log_dir: PathBuf,

    /// Configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bucket width: week or month
    #[arg(short, long)]
    unit: Option<Unit>,

    /// Log variety: minor or periodic
    #[arg(short, long)]
    kind: Option<LogKind>,

    /// Leave hit counts out of the report rows
    #[arg(long)]
    no_hits: bool,

    /// Also reverse-resolve every client address
    #[arg(long)]
    geo: bool,

    /// Log verbosity
    #[arg(short, long, alias = "log-level", value_enum)]
    verbosity: Option<LevelFilterWrapper>,

    /// File to print logs to in addition to the console
    #[arg(short = 'o', long)]
    log_file: Option<PathBuf>,
}

// This type exists so clap can figure out what variants are available for the verbosity option.
// If we use LevelFilter directly, it uses the Display and FromStr implementations, which means
// there isn't a list of possible variants for clap to use.
#[derive(ValueEnum, Clone, Debug, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum LevelFilterWrapper {
    Off,
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LevelFilterWrapper> for LevelFilter {
    fn from(val: LevelFilterWrapper) -> Self {
        match val {
            LevelFilterWrapper::Off => LevelFilter::OFF,
            LevelFilterWrapper::Trace => LevelFilter::TRACE,
            LevelFilterWrapper::Debug => LevelFilter::DEBUG,
            LevelFilterWrapper::Info => LevelFilter::INFO,
            LevelFilterWrapper::Warn => LevelFilter::WARN,
            LevelFilterWrapper::Error => LevelFilter::ERROR,
        }
    }
}

impl CliOptions {
    /// Overrides values from the configuration file with the ones given on the command line.
    fn apply_to(&self, config: &mut Config) {
        if let Some(unit) = self.unit {
            config.report.unit = unit;
        }
        if let Some(kind) = self.kind {
            config.input.kind = kind;
        }
        if self.no_hits {
            config.report.include_hit_counts = false;
        }
        if let Some(verbosity) = self.verbosity {
            config.logging.verbosity = verbosity.into();
        }
        if let Some(path) = &self.log_file {
            config.logging.log_file = Some(path.clone());
        }
    }
}

/// Installs the global subscriber: console output on stderr plus an optional log file.
///
/// The returned guard flushes the log file when dropped.
fn init_logging(config: &config::LoggingTable) -> eyre::Result<Option<WorkerGuard>> {
    let console = tracing_subscriber::fmt::layer()
        .with_writer(stderr)
        .with_ansi(stderr().is_terminal())
        .with_filter(config.verbosity);

    let (file, guard) = match &config.log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            let (writer, guard) = tracing_appender::non_blocking(file);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_filter(config.verbosity);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file)
        .try_init()?;

    Ok(guard)
}

#[tokio::main]
async fn main() -> ExitCode {
    // Parse CLI options
    let cli = CliOptions::parse();
    let mut config = match &cli.config {
        Some(path) => match Config::parse_from_file(path).await {
            Ok(config) => config,
            Err(err) => {
                eprintln!("Error: {err:#}");
                return ExitCode::FAILURE;
            }
        },
        None => Config::default(),
    };
    cli.apply_to(&mut config);

    // Set up logging
    let _guard = match init_logging(&config.logging) {
        Ok(guard) => guard,
        Err(err) => {
            eprintln!("Error: failed to initialize logger: {err}");
            return ExitCode::FAILURE;
        }
    };

    let days = match logdir::read_log_dir(&cli.log_dir, config.input.kind).await {
        Ok(days) => days,
        Err(err) => {
            error!("{err:#}");
            return ExitCode::FAILURE;
        }
    };

    let report = match usage_stats::run(days, &config.report) {
        Ok(report) => report,
        Err(err) => {
            error!("Failed to aggregate {}: {err}", cli.log_dir.display());
            return ExitCode::FAILURE;
        }
    };

    let hosts = if cli.geo {
        info!("Starting reverse ip lookup. This will take some time...");
        let hosts = geo::resolve_all(
            Arc::new(SystemResolver),
            report.registry.client_ids().map(str::to_owned).collect::<Vec<_>>(),
            config.geo.concurrency,
            config.geo.timeout(),
        )
        .await;
        Some(geo::host_rows(&report.registry, &hosts))
    } else {
        None
    };

    let output = json!({
        "ran_at": Utc::now().to_rfc3339(),
        "log_dir": cli.log_dir,
        "log_kind": config.input.kind,
        "unit": config.report.unit,
        "rows": report.rows(),
        "totals": report.totals,
        "repeat_counts": report.repeat_counts,
        "most_servers": report.most_servers,
        "most_tables": report.most_tables,
        "hosts": hosts,
    });
    if let Err(err) = serde_json::to_writer_pretty(stdout().lock(), &output) {
        error!("Failed to write report: {err}");
        return ExitCode::FAILURE;
    }
    println!();

    ExitCode::SUCCESS
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use tracing::level_filters::LevelFilter;
    use usage_stats::{LogKind, Unit};

    use super::{CliOptions, config::Config};

    #[test]
    fn command_line_overrides_config() {
        let cli = CliOptions::try_parse_from([
            "usage-stats",
            "--unit",
            "month",
            "--kind",
            "periodic",
            "--no-hits",
            "-v",
            "trace",
            "logs",
        ])
        .unwrap();

        let mut config = Config::parse("[report]\nactivity-threshold = 9\n").unwrap();
        cli.apply_to(&mut config);

        assert_eq!(config.report.unit, Unit::Month);
        assert_eq!(config.report.activity_threshold, 9);
        assert!(!config.report.include_hit_counts);
        assert_eq!(config.input.kind, LogKind::Periodic);
        assert_eq!(config.logging.verbosity, LevelFilter::TRACE);
        assert_eq!(cli.log_dir.to_str(), Some("logs"));
    }

    #[test]
    fn unknown_unit_is_rejected() {
        let err = CliOptions::try_parse_from(["usage-stats", "--unit", "geo", "logs"]).unwrap_err();
        assert!(err.to_string().contains("not a recognized interval"));
    }
}
