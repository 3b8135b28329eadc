// src/main.rs

//! Agent entry-point: Prometheus endpoint or one-shot textfile export.
//!
//! 1. Parse configuration & set up structured logging
//! 2. Identify the EBS volume behind the configured device (fatal on error)
//! 3. Serve mode: install the recorder, serve it over HTTP and poll on a
//!    fixed interval
//! 4. One-shot mode: poll once against the saved state and write the
//!    exposition text
//! 5. Wait for Ctrl-C, then exit cleanly

// ───── std / 3rd-party imports ──────────────────────────────────────────────
use anyhow::{Context, Result};
use chrono::Local;
use log::Level;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::{
    path::{Path, PathBuf},
    process,
    sync::Arc,
    time::Duration,
};
use tokio::runtime::Runtime;

// ───── local imports ────────────────────────────────────────────────────────
use agent::agent_log;
use agent::comms::NvmeIoctl;
use agent::config::{self, Config, ExporterConfig, Mode};
use agent::device;
use agent::exporter::{self, http::MetricsServer, state, Exporter, Poller};
use agent::logging::setup_logging;

// ───── helpers ──────────────────────────────────────────────────────────────

/// Directory that contains the running executable.
fn exe_dir() -> Result<PathBuf> {
    let exe = std::env::current_exe().context("cannot determine exe path")?;
    exe.parent()
        .map(Path::to_path_buf)
        .context("executable must live in some directory")
}

/// Config path: first CLI argument, else `ebs-agent.toml` next to the binary.
fn config_path(exe_dir: &Path) -> PathBuf {
    std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| config::default_path(exe_dir))
}

// ───── serve mode ───────────────────────────────────────────────────────────

fn serve(exporter: Exporter, cfg: &ExporterConfig, interval: Duration) -> Result<()> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .context("cannot install metrics recorder")?;
    exporter::describe_metrics();

    MetricsServer::bind(cfg.listen)?.spawn(exporter.identity().clone(), handle)?;
    agent_log!(Level::Info, "main", "Metrics available at http://{}/metrics", cfg.listen);

    let rt = Runtime::new().context("tokio runtime creation failed")?;
    let poller = Poller::new(Arc::new(exporter), cfg.poll_timeout);
    rt.block_on(poller.run(interval, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            agent_log!(Level::Error, "main", "cannot listen for Ctrl-C: {}", e);
        }
    }));
    Ok(())
}

// ───── one-shot mode ────────────────────────────────────────────────────────

fn one_shot(exporter: Exporter, textfile: Option<&Path>, state_file: Option<&Path>) -> Result<()> {
    let state_path = state_file
        .map(Path::to_path_buf)
        .unwrap_or_else(|| state::default_path(exporter.identity(), textfile));

    let body = exporter::export_once(&exporter, &state_path).context("statistics query failed")?;
    match textfile {
        Some(path) => {
            exporter::write_atomic(path, &body)
                .with_context(|| format!("cannot write {}", path.display()))?;
            agent_log!(Level::Info, "main", "Wrote metrics to {}", path.display());
        }
        None => print!("{body}"),
    }
    Ok(())
}

// ───── service logic ────────────────────────────────────────────────────────

fn run() -> Result<()> {
    // 1 ─ Context
    let exe_dir = exe_dir()?;
    let cfg_path = config_path(&exe_dir);
    let loaded = config::load(&cfg_path)
        .with_context(|| format!("cannot load {}", cfg_path.display()))?;

    // 2 ─ Logging
    setup_logging(&exe_dir, &loaded.logging).context("logging setup failed")?;
    config::log_loaded(&cfg_path, &loaded);
    let Config { exporter: cfg, .. } = loaded;
    agent_log!(Level::Info, "main", "Monitoring device {}", cfg.device.display());

    // 3 ─ Identity (wrong hardware is not worth retrying)
    let identity = device::identify(&cfg.device)
        .with_context(|| format!("cannot identify {}", cfg.device.display()))?;
    agent_log!(Level::Info, "main", "Volume ID: {}", identity.volume_id);

    let exporter = Exporter::new(NvmeIoctl, identity).with_histograms(cfg.histograms);

    // 4 ─ Publish
    match &cfg.mode {
        Mode::Serve { interval } => serve(exporter, &cfg, *interval),
        Mode::OneShot { textfile, state_file } => {
            one_shot(exporter, textfile.as_deref(), state_file.as_deref())
        }
    }
}

fn main() {
    if let Err(e) = run() {
        eprintln!("[{}][ERROR][main] {:#}", Local::now().to_rfc3339(), e);
        process::exit(1);
    }
}
