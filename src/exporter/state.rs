//! Previous-sample state carried between one-shot runs.
//!
//! A textfile export normally runs from cron, so each run is a fresh
//! process. The exceeded totals and the wall-clock time of the last good
//! read are kept in a small TOML file so the next run can still publish the
//! check and percentage gauges.

use std::{
    ffi::OsString,
    fs, io,
    path::{Path, PathBuf},
    time::Duration,
};

use chrono::Utc;
use log::Level;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::agent_log;
use crate::device::VolumeIdentity;
use crate::exporter::derived::ExceededTotals;
use crate::exporter::write_atomic;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("cannot encode state: {0}")]
    Encode(#[from] toml::ser::Error),

    #[error("cannot decode state: {0}")]
    Decode(#[from] toml::de::Error),
}

/// What one run leaves behind for the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedSample {
    /// Unix time of the read, in milliseconds.
    pub timestamp_ms: i64,
    pub totals: ExceededTotals,
}

impl SavedSample {
    /// Stamp `totals` with the current wall-clock time.
    pub fn now(totals: ExceededTotals) -> Self {
        Self { timestamp_ms: Utc::now().timestamp_millis(), totals }
    }

    /// Time since the sample was taken, or `None` if the clock says it was
    /// taken in the future.
    pub fn age(&self) -> Option<Duration> {
        let ms = Utc::now().timestamp_millis().checked_sub(self.timestamp_ms)?;
        u64::try_from(ms).ok().map(Duration::from_millis)
    }
}

/// `<textfile>.state` when writing a textfile, otherwise a per-device file
/// under the temp directory.
pub fn default_path(identity: &VolumeIdentity, textfile: Option<&Path>) -> PathBuf {
    match textfile {
        Some(path) => {
            let mut name = OsString::from(path.as_os_str());
            name.push(".state");
            PathBuf::from(name)
        }
        None => {
            let device = identity.device_name().replace('/', "_");
            std::env::temp_dir().join(format!("ebs_stats_{device}.toml"))
        }
    }
}

pub fn load(path: &Path) -> Result<SavedSample, StateError> {
    let txt = fs::read_to_string(path)?;
    Ok(toml::from_str(&txt)?)
}

pub fn save(path: &Path, sample: &SavedSample) -> Result<(), StateError> {
    let txt = toml::to_string(sample)?;
    write_atomic(path, &txt)?;
    Ok(())
}

/// Like [`load`], but a missing or unreadable file just means "no previous
/// sample".
pub fn load_or_skip(path: &Path) -> Option<SavedSample> {
    match load(path) {
        Ok(sample) => Some(sample),
        Err(StateError::Io(e)) if e.kind() == io::ErrorKind::NotFound => None,
        Err(e) => {
            agent_log!(Level::Warn, "state", "ignoring {}: {}", path.display(), e);
            None
        }
    }
}
