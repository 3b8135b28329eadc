// src/config/model.rs

use log::LevelFilter;
use serde::Deserialize;
use std::{net::SocketAddr, path::PathBuf, time::Duration};
use thiserror::Error;

/// Top-level runtime config
#[derive(Debug, Clone)]
pub struct Config {
    pub logging:  LoggingConfig,
    pub exporter: ExporterConfig,
}

/// Mirror of the `[logging]` table
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]            pub enable: bool,
    #[serde(default)]            pub file:   Option<String>,
    #[serde(default = "default_level")] pub level: String,
}
fn default_level() -> String { "INFO".into() }

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { enable: false, file: None, level: default_level() }
    }
}

impl LoggingConfig {
    pub fn level_filter(&self) -> Result<LevelFilter, ConfigError> {
        self.level
            .parse()
            .map_err(|_| ConfigError::InvalidLevel(self.level.clone()))
    }
}

/// Raw `[exporter]` table as written in TOML
#[derive(Debug, Deserialize)]
pub struct ExporterStub {
    #[serde(default)]
    pub device:       String,
    #[serde(default = "default_listen")]
    pub listen:       String,
    #[serde(default = "default_interval")]
    pub interval:     String,
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout: String,
    #[serde(default)]
    pub textfile:     Option<String>,
    #[serde(default)]
    pub state_file:   Option<String>,
    #[serde(default = "default_histograms")]
    pub histograms:   bool,
}
fn default_listen() -> String { "0.0.0.0:8090".into() }
fn default_interval() -> String { "30s".into() }
fn default_poll_timeout() -> String { "5s".into() }
fn default_histograms() -> bool { true }

/// Whole file as written in TOML
#[derive(Debug, Deserialize)]
pub struct ConfigStub {
    #[serde(default)]
    pub logging:  LoggingConfig,
    pub exporter: ExporterStub,
}

/// How the agent publishes what it reads
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    /// Poll every `interval` and serve `/metrics` over HTTP.
    Serve { interval: Duration },
    /// Poll once, write the exposition text to `textfile` (stdout if unset).
    /// The previous run's totals live in `state_file` (derived from the
    /// textfile or device when unset).
    OneShot { textfile: Option<PathBuf>, state_file: Option<PathBuf> },
}

/// Fully-typed `[exporter]` section
#[derive(Debug, Clone)]
pub struct ExporterConfig {
    pub device:       PathBuf,
    pub listen:       SocketAddr,
    pub mode:         Mode,
    pub poll_timeout: Duration,
    pub histograms:   bool,
}

/// All the ways config loading can go wrong
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("[exporter].device is required")]
    MissingDevice,

    #[error("invalid log level '{0}'")]
    InvalidLevel(String),

    #[error("invalid duration '{0}': {1}")]
    InvalidDuration(String, #[source] humantime::DurationError),

    #[error("invalid listen address '{0}': {1}")]
    InvalidAddress(String, #[source] std::net::AddrParseError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}
