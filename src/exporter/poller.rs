//! Interval-driven polling with a bounded wait per admin command.
//!
//! A hung ioctl cannot be cancelled, so a poll that outlives its timeout is
//! abandoned: its task keeps the blocking worker and the poller holds on to
//! the handle, skipping ticks until that task finishes. At most one admin
//! command is therefore ever in flight for the device.

use std::{future::Future, sync::Arc, time::Duration};

use log::Level;
use tokio::{
    task::{self, JoinHandle},
    time::{self, MissedTickBehavior},
};

use crate::agent_log;
use crate::comms::{AdminChannel, NvmeIoctl};
use crate::device::{DeviceError, VolumeStats};
use crate::exporter::Exporter;

type PollTask = JoinHandle<Result<VolumeStats, DeviceError>>;

/// What a single tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Fresh values were published.
    Polled,
    /// The device query failed; nothing was published.
    Failed,
    /// The poll outlived the timeout and was abandoned.
    TimedOut,
    /// An abandoned poll is still blocked; no new command was issued.
    Skipped,
    /// The worker panicked.
    Panicked,
}

pub struct Poller<C = NvmeIoctl> {
    exporter: Arc<Exporter<C>>,
    timeout: Duration,
    stuck: Option<PollTask>,
}

impl<C: AdminChannel + 'static> Poller<C> {
    pub fn new(exporter: Arc<Exporter<C>>, timeout: Duration) -> Self {
        Self { exporter, timeout, stuck: None }
    }

    /// True while an abandoned poll is still running.
    pub fn is_stuck(&self) -> bool {
        self.stuck.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Run one poll on a blocking worker, waiting at most `timeout`.
    pub async fn tick(&mut self) -> Tick {
        if self.is_stuck() {
            agent_log!(Level::Warn, "poller", "previous poll still blocked; skipping");
            return Tick::Skipped;
        }
        self.stuck = None;

        let worker = Arc::clone(&self.exporter);
        let mut pending = task::spawn_blocking(move || worker.poll_once());

        match time::timeout(self.timeout, &mut pending).await {
            Ok(Ok(Ok(_))) => Tick::Polled,
            // logged by the exporter
            Ok(Ok(Err(_))) => Tick::Failed,
            Ok(Err(e)) => {
                agent_log!(Level::Error, "poller", "poll worker panicked: {}", e);
                Tick::Panicked
            }
            Err(_) => {
                agent_log!(Level::Warn, "poller", "poll exceeded {:?}; abandoning it", self.timeout);
                self.stuck = Some(pending);
                Tick::TimedOut
            }
        }
    }

    /// Tick every `interval` (the first tick fires immediately) until
    /// `shutdown` resolves.
    pub async fn run(mut self, interval: Duration, shutdown: impl Future<Output = ()>) {
        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick().await;
                }
                _ = &mut shutdown => {
                    agent_log!(Level::Warn, "poller", "Shutdown initiated");
                    break;
                }
            }
        }
    }
}
