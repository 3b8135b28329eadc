//! Publishes EBS statistics through the `metrics` facade.
//!
//! The exporter is constructed explicitly by the entry point and owns the
//! only mutable state in the agent: the previous sample, used for the
//! "exceeded" check and percentage gauges. The same mutex serialises admin
//! commands so at most one is in flight per device.
//!
//! Key responsibilities:
//! - Poll the statistics reader and skip the cycle on failure.
//! - Map `VolumeStats` fields to named series labelled by device / volume.
//! - Derive interval-based gauges from consecutive samples.

pub mod derived;
pub mod http;
pub mod poller;
pub mod state;
pub mod textfile;

use std::{
    sync::{Mutex, PoisonError},
    time::{Duration, Instant},
};

use log::Level;
use metrics::{counter, describe_counter, describe_gauge, gauge, Unit};

use crate::agent_log;
use crate::comms::{AdminChannel, NvmeIoctl};
use crate::device::{query_stats_with, DeviceError, LatencyHistogram, VolumeIdentity, VolumeStats};
use derived::{exceeded_check, exceeded_percent, ExceededTotals};

pub use poller::{Poller, Tick};
pub use state::{SavedSample, StateError};
pub use textfile::{export_once, render_once, write_atomic};

// ───── series names ─────────────────────────────────────────────────────────

pub const VOLUME_IOPS_EXCEEDED_TOTAL: &str = "ebs_volume_performance_exceeded_iops_total";
pub const VOLUME_TP_EXCEEDED_TOTAL: &str = "ebs_volume_performance_exceeded_throughput_total";
pub const INSTANCE_IOPS_EXCEEDED_TOTAL: &str = "ebs_instance_performance_exceeded_iops_total";
pub const INSTANCE_TP_EXCEEDED_TOTAL: &str = "ebs_instance_performance_exceeded_throughput_total";
pub const READ_OPS_TOTAL: &str = "ebs_total_read_ops_total";
pub const WRITE_OPS_TOTAL: &str = "ebs_total_write_ops_total";
pub const READ_BYTES_TOTAL: &str = "ebs_total_read_bytes_total";
pub const WRITE_BYTES_TOTAL: &str = "ebs_total_write_bytes_total";
pub const READ_TIME_TOTAL: &str = "ebs_total_read_time_microseconds_total";
pub const WRITE_TIME_TOTAL: &str = "ebs_total_write_time_microseconds_total";
pub const VOLUME_QUEUE_LENGTH: &str = "ebs_volume_queue_length";

pub const VOLUME_IOPS_EXCEEDED_CHECK: &str = "ebs_volume_iops_exceeded_check";
pub const VOLUME_TP_EXCEEDED_CHECK: &str = "ebs_volume_throughput_exceeded_check";
pub const VOLUME_IOPS_EXCEEDED_PERCENT: &str = "ebs_volume_performance_exceeded_iops_percent";
pub const VOLUME_TP_EXCEEDED_PERCENT: &str = "ebs_volume_performance_exceeded_throughput_percent";
pub const INSTANCE_IOPS_EXCEEDED_PERCENT: &str = "ebs_instance_performance_exceeded_iops_percent";
pub const INSTANCE_TP_EXCEEDED_PERCENT: &str = "ebs_instance_performance_exceeded_throughput_percent";

pub const READ_LATENCY_BIN_COUNT: &str = "ebs_read_io_latency_bin_count";
pub const WRITE_LATENCY_BIN_COUNT: &str = "ebs_write_io_latency_bin_count";

/// Register help text and units with whatever recorder is installed.
pub fn describe_metrics() {
    describe_counter!(VOLUME_IOPS_EXCEEDED_TOTAL, Unit::Microseconds,
        "Total time in microseconds that the EBS volume IOPS limit was exceeded");
    describe_counter!(VOLUME_TP_EXCEEDED_TOTAL, Unit::Microseconds,
        "Total time in microseconds that the EBS volume throughput limit was exceeded");
    describe_counter!(INSTANCE_IOPS_EXCEEDED_TOTAL, Unit::Microseconds,
        "Total time in microseconds that the EC2 instance EBS IOPS limit was exceeded");
    describe_counter!(INSTANCE_TP_EXCEEDED_TOTAL, Unit::Microseconds,
        "Total time in microseconds that the EC2 instance EBS throughput limit was exceeded");
    describe_counter!(READ_OPS_TOTAL, Unit::Count, "Total number of read operations");
    describe_counter!(WRITE_OPS_TOTAL, Unit::Count, "Total number of write operations");
    describe_counter!(READ_BYTES_TOTAL, Unit::Bytes, "Total bytes read");
    describe_counter!(WRITE_BYTES_TOTAL, Unit::Bytes, "Total bytes written");
    describe_counter!(READ_TIME_TOTAL, Unit::Microseconds, "Total time spent on read operations");
    describe_counter!(WRITE_TIME_TOTAL, Unit::Microseconds, "Total time spent on write operations");
    describe_gauge!(VOLUME_QUEUE_LENGTH, Unit::Count, "Current volume queue length");

    describe_gauge!(VOLUME_IOPS_EXCEEDED_CHECK,
        "Whether the volume IOPS limit was exceeded since the previous sample");
    describe_gauge!(VOLUME_TP_EXCEEDED_CHECK,
        "Whether the volume throughput limit was exceeded since the previous sample");
    describe_gauge!(VOLUME_IOPS_EXCEEDED_PERCENT, Unit::Percent,
        "Percentage of time that the EBS volume IOPS limit was exceeded during the last interval");
    describe_gauge!(VOLUME_TP_EXCEEDED_PERCENT, Unit::Percent,
        "Percentage of time that the EBS volume throughput limit was exceeded during the last interval");
    describe_gauge!(INSTANCE_IOPS_EXCEEDED_PERCENT, Unit::Percent,
        "Percentage of time that the EC2 instance EBS IOPS limit was exceeded during the last interval");
    describe_gauge!(INSTANCE_TP_EXCEEDED_PERCENT, Unit::Percent,
        "Percentage of time that the EC2 instance EBS throughput limit was exceeded during the last interval");

    describe_gauge!(READ_LATENCY_BIN_COUNT, Unit::Count, "Read I/O latency histogram bin count");
    describe_gauge!(WRITE_LATENCY_BIN_COUNT, Unit::Count, "Write I/O latency histogram bin count");
}

// ───── exporter ─────────────────────────────────────────────────────────────

struct Sample {
    taken: Instant,
    totals: ExceededTotals,
}

pub struct Exporter<C = NvmeIoctl> {
    channel: C,
    identity: VolumeIdentity,
    labels: [(&'static str, String); 2],
    histograms: bool,
    last: Mutex<Option<Sample>>,
}

impl<C: AdminChannel> Exporter<C> {
    pub fn new(channel: C, identity: VolumeIdentity) -> Self {
        let labels = [
            ("device", identity.device_name()),
            ("volume_id", identity.volume_id.clone()),
        ];
        Self { channel, identity, labels, histograms: false, last: Mutex::new(None) }
    }

    /// Also publish the populated latency histogram bins.
    pub fn with_histograms(mut self, enabled: bool) -> Self {
        self.histograms = enabled;
        self
    }

    pub fn identity(&self) -> &VolumeIdentity {
        &self.identity
    }

    /// Seed the previous sample with totals read `age` ago, e.g. by an
    /// earlier one-shot run. Ignored if `age` reaches back past the
    /// monotonic clock's origin.
    pub fn restore(&self, totals: ExceededTotals, age: Duration) {
        let Some(taken) = Instant::now().checked_sub(age) else {
            return;
        };
        *self.last.lock().unwrap_or_else(PoisonError::into_inner) = Some(Sample { taken, totals });
    }

    /// Exceeded totals of the last successful poll.
    pub fn last_totals(&self) -> Option<ExceededTotals> {
        self.last.lock().unwrap_or_else(PoisonError::into_inner).as_ref().map(|s| s.totals)
    }

    /// Read one snapshot and publish it. On error nothing is published and
    /// the previous sample is kept for the next interval.
    pub fn poll_once(&self) -> Result<VolumeStats, DeviceError> {
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);

        let stats = match query_stats_with(&self.channel, &self.identity.device_path) {
            Ok(stats) => stats,
            Err(e) => {
                agent_log!(
                    Level::Warn,
                    "exporter",
                    "{} ({}): sample skipped: {}",
                    self.identity.volume_id,
                    self.identity.device_path.display(),
                    e
                );
                return Err(e);
            }
        };

        let now = Instant::now();
        let totals = ExceededTotals::from(&stats);
        let previous = last.as_ref().map(|s| (s.totals, now.duration_since(s.taken)));
        self.publish(&stats, totals, previous);
        *last = Some(Sample { taken: now, totals });

        agent_log!(
            Level::Debug,
            "exporter",
            "{}: read_ops={} write_ops={} queue={}",
            self.identity.volume_id,
            stats.total_read_ops,
            stats.total_write_ops,
            stats.volume_queue_length
        );
        Ok(stats)
    }

    fn publish(
        &self,
        stats: &VolumeStats,
        cur: ExceededTotals,
        previous: Option<(ExceededTotals, Duration)>,
    ) {
        let labels = &self.labels;

        let counters = [
            (VOLUME_IOPS_EXCEEDED_TOTAL, stats.volume_iops_exceeded_us),
            (VOLUME_TP_EXCEEDED_TOTAL, stats.volume_throughput_exceeded_us),
            (INSTANCE_IOPS_EXCEEDED_TOTAL, stats.instance_iops_exceeded_us),
            (INSTANCE_TP_EXCEEDED_TOTAL, stats.instance_throughput_exceeded_us),
            (READ_OPS_TOTAL, stats.total_read_ops),
            (WRITE_OPS_TOTAL, stats.total_write_ops),
            (READ_BYTES_TOTAL, stats.total_read_bytes),
            (WRITE_BYTES_TOTAL, stats.total_write_bytes),
            (READ_TIME_TOTAL, stats.total_read_time_us),
            (WRITE_TIME_TOTAL, stats.total_write_time_us),
        ];
        for (name, value) in counters {
            counter!(name, labels).absolute(value);
        }
        gauge!(VOLUME_QUEUE_LENGTH, labels).set(stats.volume_queue_length as f64);

        // With no previous sample the checks read 0 and percentages stay unset.
        let base = previous.map_or(cur, |(p, _)| p);
        gauge!(VOLUME_IOPS_EXCEEDED_CHECK, labels)
            .set(exceeded_check(base.volume_iops_us, cur.volume_iops_us));
        gauge!(VOLUME_TP_EXCEEDED_CHECK, labels)
            .set(exceeded_check(base.volume_throughput_us, cur.volume_throughput_us));

        if let Some((prev, elapsed)) = previous {
            let percents = [
                (VOLUME_IOPS_EXCEEDED_PERCENT, prev.volume_iops_us, cur.volume_iops_us),
                (VOLUME_TP_EXCEEDED_PERCENT, prev.volume_throughput_us, cur.volume_throughput_us),
                (INSTANCE_IOPS_EXCEEDED_PERCENT, prev.instance_iops_us, cur.instance_iops_us),
                (INSTANCE_TP_EXCEEDED_PERCENT, prev.instance_throughput_us, cur.instance_throughput_us),
            ];
            for (name, before, now) in percents {
                if let Some(pct) = exceeded_percent(before, now, elapsed) {
                    gauge!(name, labels).set(pct);
                }
            }
        }

        if self.histograms {
            self.publish_histogram(READ_LATENCY_BIN_COUNT, &stats.read_latency);
            self.publish_histogram(WRITE_LATENCY_BIN_COUNT, &stats.write_latency);
        }
    }

    fn publish_histogram(&self, name: &'static str, hist: &LatencyHistogram) {
        // bounds are whatever the device reports, so the index keeps
        // bins with identical bounds apart
        for (i, bin) in hist.populated().iter().enumerate() {
            let labels = [
                ("device", self.labels[0].1.clone()),
                ("volume_id", self.labels[1].1.clone()),
                ("bin", i.to_string()),
                ("lower_us", bin.lower_us.to_string()),
                ("upper_us", bin.upper_us.to_string()),
            ];
            gauge!(name, &labels).set(f64::from(bin.count));
        }
    }
}
