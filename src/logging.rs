use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::LoggingConfig;
use crate::utils::error::{AppError, Result};

const LOG_FILE_PREFIX: &str = "grocery-prices.log";

/// Builds the filter from `RUST_LOG` when set, otherwise from the configured
/// directive string with noisy dependencies held at `warn`.
pub fn build_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }

    let mut filter = EnvFilter::try_new(&config.filter)
        .map_err(|e| AppError::Internal(format!("invalid log filter {:?}: {}", config.filter, e)))?;

    for directive in ["sqlx=warn", "hyper=warn", "reqwest=warn", "html5ever=warn", "selectors=warn"] {
        let directive = directive
            .parse()
            .map_err(|e| AppError::Internal(format!("invalid log directive {:?}: {}", directive, e)))?;
        filter = filter.add_directive(directive);
    }

    Ok(filter)
}

/// Installs the global subscriber: human-readable output on stderr plus a
/// daily-rolling file when `directory` is configured. The returned guard
/// must be held for the life of the process or buffered file lines are lost.
pub fn init(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = build_filter(config)?;

    let (file_layer, guard) = match config.directory.as_deref() {
        Some(directory) => {
            std::fs::create_dir_all(directory)?;
            let (writer, guard) = non_blocking(rolling::daily(directory, LOG_FILE_PREFIX));
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(file_layer)
        .try_init()
        .map_err(|e| AppError::Internal(format!("failed to install tracing subscriber: {}", e)))?;

    Ok(guard)
}
