use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry};

use crate::cli::LogFormat;
use crate::error::CliError;

const DEFAULT_LEVEL: &str = "warn";

/// Install the global subscriber. Logs go to stderr so stdout stays machine-readable.
pub fn init(level: Option<&str>, format: LogFormat) -> Result<(), CliError> {
    let filter = create_env_filter(level)?;

    let layer: Box<dyn Layer<Registry> + Send + Sync> = match format {
        LogFormat::Text => fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_current_span(true)
            .boxed(),
    };

    Registry::default()
        .with(layer)
        .with(filter)
        .try_init()
        .map_err(|error| CliError::Logging(error.to_string()))
}

fn create_env_filter(level: Option<&str>) -> Result<EnvFilter, CliError> {
    match level {
        Some(level) => EnvFilter::try_new(filter_directive(level))
            .map_err(|error| CliError::Logging(error.to_string())),
        None => Ok(EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(filter_directive(DEFAULT_LEVEL)))),
    }
}

/// Our crates at `level`, third-party crates at `warn`.
fn filter_directive(level: &str) -> String {
    format!("warn,solvency_core={level},solvency={level}")
}
