pub mod config;
pub mod logging;

pub use config::{AppConfig, BootstrapConfig, DatabaseConfig, LogFormat, LogLevel, LoggingConfig};
pub use logging::init_logging;
