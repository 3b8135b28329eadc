//! Driver-facing definitions shared by the agent and its test fakes.
//!
//! Nothing in here performs I/O: the crate only describes the byte layout of
//! the NVMe admin command, the identify-controller page and the Amazon EBS
//! statistics log page, and knows how to move typed values in and out of a
//! raw page.

pub mod constants;
pub mod layout;

pub use layout::{
    AdminCommand, CommandParams, ControllerIdentity, HistogramBin, LatencyHistogram, Page,
    VolumeStats,
};
