//! Values computed from two consecutive samples.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::device::VolumeStats;

/// The four "limit exceeded" counters, which is all a later sample needs
/// from an earlier one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceededTotals {
    pub volume_iops_us: u64,
    pub volume_throughput_us: u64,
    pub instance_iops_us: u64,
    pub instance_throughput_us: u64,
}

impl From<&VolumeStats> for ExceededTotals {
    fn from(stats: &VolumeStats) -> Self {
        Self {
            volume_iops_us: stats.volume_iops_exceeded_us,
            volume_throughput_us: stats.volume_throughput_exceeded_us,
            instance_iops_us: stats.instance_iops_exceeded_us,
            instance_throughput_us: stats.instance_throughput_exceeded_us,
        }
    }
}

/// 1.0 when the counter moved forward since the previous sample.
pub fn exceeded_check(previous: u64, current: u64) -> f64 {
    if current > previous { 1.0 } else { 0.0 }
}

/// Share of `elapsed` (in %) that an "exceeded" microsecond counter grew by,
/// rounded to two decimals. A counter that went backwards counts as 0.
pub fn exceeded_percent(previous: u64, current: u64, elapsed: Duration) -> Option<f64> {
    let elapsed_us = elapsed.as_micros();
    if elapsed_us == 0 {
        return None;
    }
    let delta = current.saturating_sub(previous) as f64;
    let pct = delta / elapsed_us as f64 * 100.0;
    Some((pct * 100.0).round() / 100.0)
}
