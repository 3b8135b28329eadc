// src/config/loader.rs

//! # Configuration Loader
//!
//! Reads `ebs-agent.toml`, deserializes the raw tables and converts them
//! into the typed runtime `Config`.

use crate::agent_log;
use crate::config::model::{Config, ConfigError, ConfigStub, ExporterConfig, ExporterStub, Mode};
use log::Level;
use std::{fs, path::{Path, PathBuf}, time::Duration};

pub const DEFAULT_FILE: &str = "ebs-agent.toml";

/// `ebs-agent.toml` next to the executable.
pub fn default_path(exe_dir: &Path) -> PathBuf {
    exe_dir.join(DEFAULT_FILE)
}

/// Load and validate the configuration at `path`.
/// Runs before logging exists, so the caller reports the outcome.
pub fn load(path: &Path) -> Result<Config, ConfigError> {
    let txt = fs::read_to_string(path)?;
    parse(&txt)
}

/// Report a loaded config; call once logging is up.
pub fn log_loaded(path: &Path, cfg: &Config) {
    agent_log!(Level::Info, "config", "Loaded config from {}", path.display());
    agent_log!(Level::Debug, "config", "Exporter: {:?}", cfg.exporter);
}

/// Parse TOML text into a runtime `Config`.
pub fn parse(txt: &str) -> Result<Config, ConfigError> {
    let stub: ConfigStub = toml::from_str(txt)?;
    stub.logging.level_filter()?;
    Ok(Config {
        logging:  stub.logging,
        exporter: convert_exporter(stub.exporter)?,
    })
}

fn parse_duration(raw: &str) -> Result<Duration, ConfigError> {
    humantime::parse_duration(raw).map_err(|e| ConfigError::InvalidDuration(raw.into(), e))
}

fn convert_exporter(stub: ExporterStub) -> Result<ExporterConfig, ConfigError> {
    let device = stub.device.trim();
    if device.is_empty() {
        return Err(ConfigError::MissingDevice);
    }

    let listen = stub
        .listen
        .parse()
        .map_err(|e| ConfigError::InvalidAddress(stub.listen.clone(), e))?;

    let interval = parse_duration(&stub.interval)?;
    let mode = if interval.is_zero() {
        Mode::OneShot {
            textfile:   stub.textfile.map(PathBuf::from),
            state_file: stub.state_file.map(PathBuf::from),
        }
    } else {
        Mode::Serve { interval }
    };

    Ok(ExporterConfig {
        device: PathBuf::from(device),
        listen,
        mode,
        poll_timeout: parse_duration(&stub.poll_timeout)?,
        histograms: stub.histograms,
    })
}
