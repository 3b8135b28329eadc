//! Amazon EBS NVMe device queries.
//!
//! Two stateless request/response operations built on an [`AdminChannel`]:
//! - [`identify`]: one-shot at startup, proves the node is an EBS volume and
//!   derives its volume id.
//! - [`query_stats`]: once per poll, reads and validates the statistics log
//!   page.
//!
//! Both are plain functions of the device path; nothing is cached between
//! calls.
//!
//! [`AdminChannel`]: crate::comms::AdminChannel

pub mod error;
pub mod identity;
pub mod stats;

pub use error::DeviceError;
pub use identity::{identify, identify_with, normalize_volume_id, VolumeIdentity};
pub use stats::{query_stats, query_stats_with};
pub use shared::layout::{HistogramBin, LatencyHistogram, VolumeStats};
