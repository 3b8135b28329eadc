//! Global logging setup (fern → stdout, optionally a file).

use chrono::Local;
use fern::Dispatch;
use std::{path::Path, process, thread};

use crate::config::{ConfigError, LoggingConfig};

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Init(#[from] fern::InitError),
}

/// Configure global logging as requested in `[logging]`.
/// A relative log file is resolved against `base_dir`.
pub fn setup_logging(base_dir: &Path, cfg: &LoggingConfig) -> Result<(), LoggingError> {
    let level = cfg.level_filter()?;

    let log_path = cfg
        .enable
        .then(|| base_dir.join(cfg.file.as_deref().unwrap_or("ebs-agent.log")));

    let mut dispatch = Dispatch::new()
        .format(|out, msg, record| {
            out.finish(format_args!(
                "[{}][{:5}][{}][pid={}][tid={:?}] {}",
                Local::now().to_rfc3339(),
                record.level(),
                record.target(),
                process::id(),
                thread::current().id(),
                msg
            ))
        })
        .level(level)
        .chain(std::io::stdout());

    if let Some(path) = log_path {
        dispatch = dispatch.chain(fern::log_file(path).map_err(fern::InitError::from)?);
    }

    dispatch.apply().map_err(fern::InitError::from)?;
    Ok(())
}
