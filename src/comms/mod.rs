//! Channels to the NVMe driver.

pub mod ioctl;

pub use ioctl::{AdminChannel, NvmeIoctl};
