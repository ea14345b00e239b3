//! Tracing subscriber setup.

use tracing_subscriber::EnvFilter;

use pipeflow_errors::{PipeflowError, PipeflowResult};

use crate::config::{LogFormat, LoggingConfig};

/// Install the global tracing subscriber. `RUST_LOG` wins over the
/// configured level so operators can raise verbosity without a config
/// change. Fails if a subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> PipeflowResult<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(config.level.to_string())
            .map_err(|e| PipeflowError::config_error(format!("invalid log filter: {e}")))?,
    };

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let result = match config.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Text => builder.try_init(),
    };
    result.map_err(|e| PipeflowError::config_error(format!("failed to install subscriber: {e}")))
}
