use std::result::Result;

use snafu::ResultExt;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::layer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{registry, EnvFilter};

use crate::config::{Config, LogFormat};
use crate::error::{ApplicationError, InitializeLoggerSnafu};

const DEFAULT_FILTER: &str = "lectern=info,tower_http=info";
const LOG_FILE_PREFIX: &str = "lectern.log";

/// Install the global subscriber: console output in the configured format and
/// JSON lines in a daily rolling file under `log_dir`.
///
/// The returned guard flushes the file writer when dropped, keep it alive for
/// the lifetime of the process.
pub fn init(config: &Config) -> Result<WorkerGuard, ApplicationError> {
    let (file_layer, guard) = {
        let file_appender = tracing_appender::rolling::daily(&config.log_dir, LOG_FILE_PREFIX);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        let layer = layer().with_ansi(false).json().with_writer(non_blocking);

        (layer, guard)
    };

    // only one of these is ever set
    let pretty_console = (config.log_format == LogFormat::Pretty).then(|| layer().pretty().with_writer(std::io::stdout));
    let json_console = (config.log_format == LogFormat::Json).then(|| layer().json().with_writer(std::io::stdout));

    let subscriber = registry()
        .with(filter(std::env::var(EnvFilter::DEFAULT_ENV).ok().as_deref()))
        .with(pretty_console)
        .with(json_console)
        .with(file_layer);
    tracing::subscriber::set_global_default(subscriber).context(InitializeLoggerSnafu)?;

    Ok(guard)
}

/// `RUST_LOG` directives, falling back to the crate defaults when they are
/// missing or do not parse.
fn filter(directives: Option<&str>) -> EnvFilter {
    directives
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER))
}
