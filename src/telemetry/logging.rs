//! Logging initialization.
//!
//! RUST_LOG wins when set; otherwise the `[logging]` table of rtadv.toml
//! picks the level for this crate and one of the pretty, compact or json
//! formats.

use crate::config::LoggingConfig;
use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Layer, Registry};

/// Level applied to dependencies when only the crate level is configured.
const DEPENDENCY_LEVEL: Level = Level::WARN;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogFormat {
    Pretty,
    Compact,
    Json,
}

impl LogFormat {
    fn parse(format: &str) -> Self {
        match format {
            "json" => LogFormat::Json,
            "compact" => LogFormat::Compact,
            _ => LogFormat::Pretty,
        }
    }
}

/// Initializes the global tracing subscriber.
///
/// Calling it twice keeps the first subscriber.
pub fn init_logging(config: Option<&LoggingConfig>) {
    let filter = build_filter(config);
    let format = LogFormat::parse(config.map(|c| c.format.as_str()).unwrap_or("pretty"));

    let layer: Box<dyn Layer<Registry> + Send + Sync> = match format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_span_events(FmtSpan::CLOSE)
            .boxed(),
        LogFormat::Compact => tracing_subscriber::fmt::layer().compact().boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer().boxed(),
    };

    let subscriber = tracing_subscriber::registry().with(layer).with(filter);
    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn build_filter(config: Option<&LoggingConfig>) -> EnvFilter {
    if std::env::var("RUST_LOG").is_ok() {
        return EnvFilter::from_default_env();
    }
    let level = config.map(|c| parse_level(&c.level)).unwrap_or(Level::INFO);
    EnvFilter::new(directives(level))
}

fn directives(level: Level) -> String {
    format!(
        "{},{}={}",
        DEPENDENCY_LEVEL.min(level),
        env!("CARGO_CRATE_NAME"),
        level
    )
}

/// Parses a log level string into a Level.
fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "error" => Level::ERROR,
        "warn" => Level::WARN,
        "debug" => Level::DEBUG,
        "trace" => Level::TRACE,
        _ => Level::INFO,
    }
}
