//! One-shot rendering for the node-exporter textfile collector.

use std::{ffi::OsString, fs, io, path::{Path, PathBuf}};

use log::Level;
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::agent_log;
use crate::comms::AdminChannel;
use crate::device::DeviceError;
use crate::exporter::state::{self, SavedSample};
use crate::exporter::{describe_metrics, Exporter};

/// Poll once against a private recorder and return the exposition text.
/// The process-wide recorder, if any, is left untouched.
pub fn render_once<C: AdminChannel>(exporter: &Exporter<C>) -> Result<String, DeviceError> {
    let recorder = PrometheusBuilder::new().build_recorder();
    let handle = recorder.handle();

    metrics::with_local_recorder(&recorder, || {
        describe_metrics();
        exporter.poll_once()
    })?;

    Ok(handle.render())
}

/// One cron-style run: restore the previous run's totals from `state_path`,
/// poll and render, then leave this run's totals behind for the next one.
///
/// State problems only cost the derived gauges; they never fail the run.
pub fn export_once<C: AdminChannel>(
    exporter: &Exporter<C>,
    state_path: &Path,
) -> Result<String, DeviceError> {
    if let Some(saved) = state::load_or_skip(state_path) {
        match saved.age() {
            Some(age) => exporter.restore(saved.totals, age),
            None => agent_log!(
                Level::Warn,
                "textfile",
                "{} is from the future; ignoring it",
                state_path.display()
            ),
        }
    }

    let body = render_once(exporter)?;

    if let Some(totals) = exporter.last_totals() {
        if let Err(e) = state::save(state_path, &SavedSample::now(totals)) {
            agent_log!(Level::Warn, "textfile", "cannot save {}: {}", state_path.display(), e);
        }
    }
    Ok(body)
}

/// Write `body` next to `path` and rename it into place, so a scraper never
/// sees a half-written file.
pub fn write_atomic(path: &Path, body: &str) -> io::Result<()> {
    let mut tmp = OsString::from(path.as_os_str());
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, body)
        .and_then(|()| fs::rename(&tmp, path))
        .inspect_err(|_| {
            let _ = fs::remove_file(&tmp);
        })
}
