// src/logging.rs

//! Logging setup for `pipewatch` using `tracing` + `tracing-subscriber`.
//!
//! The filter comes from, in order:
//! 1. the `--log-level` flag,
//! 2. the `PIPEWATCH_LOG` environment variable, which takes either a bare
//!    level (`debug`) or full `EnvFilter` directives (`pipewatch=trace,actix_server=info`),
//! 3. `info`.
//!
//! The dev server's own crates are capped at `warn` unless a directive names
//! them. Logs go to stderr; stdout is reserved for the run summary.

use anyhow::{Result, anyhow};
use tracing::Level;
use tracing_subscriber::{EnvFilter, fmt};

use crate::cli::LogLevel;

pub const LOG_ENV_VAR: &str = "PIPEWATCH_LOG";

const QUIET_DEPENDENCIES: &[&str] = &["actix_server", "actix_web", "actix_http", "mio"];

/// Install the global subscriber. Fails if one is already installed.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let env = std::env::var(LOG_ENV_VAR).ok();
    let filter = build_filter(cli_level, env.as_deref())?;

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow!("installing log subscriber: {err}"))
}

fn build_filter(cli_level: Option<LogLevel>, env: Option<&str>) -> Result<EnvFilter> {
    let directives = match (cli_level, env.map(str::trim).filter(|s| !s.is_empty())) {
        (Some(lvl), _) => level_from_log_level(lvl).to_string(),
        (None, Some(raw)) => match parse_level_str(raw) {
            Some(level) => level.to_string(),
            None => raw.to_string(),
        },
        (None, None) => Level::INFO.to_string(),
    };

    let mut filter = EnvFilter::try_new(&directives)
        .map_err(|err| anyhow!("invalid {LOG_ENV_VAR} value {directives:?}: {err}"))?;

    for target in QUIET_DEPENDENCIES {
        if !directives.contains(target) {
            let directive = format!("{target}=warn")
                .parse()
                .map_err(|err| anyhow!("building log directive for {target}: {err}"))?;
            filter = filter.add_directive(directive);
        }
    }

    Ok(filter)
}

fn level_from_log_level(lvl: LogLevel) -> Level {
    match lvl {
        LogLevel::Error => Level::ERROR,
        LogLevel::Warn => Level::WARN,
        LogLevel::Info => Level::INFO,
        LogLevel::Debug => Level::DEBUG,
        LogLevel::Trace => Level::TRACE,
    }
}

fn parse_level_str(s: &str) -> Option<Level> {
    match s.to_lowercase().as_str() {
        "error" => Some(Level::ERROR),
        "warn" | "warning" => Some(Level::WARN),
        "info" => Some(Level::INFO),
        "debug" => Some(Level::DEBUG),
        "trace" => Some(Level::TRACE),
        _ => None,
    }
}
