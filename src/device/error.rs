// src/device/error.rs

use std::{io, path::PathBuf};
use thiserror::Error;

/// Everything that can go wrong talking to an EBS NVMe device.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("cannot open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Negative errno from the kernel, or a positive NVMe completion status.
    #[error("admin ioctl failed with code {0}")]
    IoctlFailed(i32),

    #[error("not an Amazon NVMe device (vendor id {0:#06x})")]
    NotAmazonDevice(u16),

    #[error("not an EBS device (model {0:?})")]
    NotEBSDevice(String),

    #[error("invalid stats magic {0:#010x} (expected {1:#010x})")]
    InvalidMagic(u32, u32),
}

impl DeviceError {
    /// Wrong hardware: retrying on the next poll cannot help.
    pub fn is_fatal(&self) -> bool {
        matches!(self, DeviceError::NotAmazonDevice(_) | DeviceError::NotEBSDevice(_))
    }
}
