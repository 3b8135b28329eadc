//! Public API for configuration

pub mod loader;
pub mod model;

// Re-export the main entrypoints:
pub use loader::{default_path, load, log_loaded, parse};
pub use model::{Config, ConfigError, ExporterConfig, LoggingConfig, Mode};
