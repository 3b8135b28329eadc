// src/device/identity.rs

//! Volume identity resolution (Identify Controller, CNS = 1).

use std::path::{Path, PathBuf};

use log::Level;
use shared::constants::{ADMIN_PAGE_SIZE, AMZN_NVME_EBS_MN, AMZN_NVME_VID, NVME_ADMIN_IDENTIFY};
use shared::layout::{CommandParams, ControllerIdentity};

use crate::agent_log;
use crate::comms::{AdminChannel, NvmeIoctl};
use crate::device::DeviceError;

/// A device node proven to be an EBS volume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeIdentity {
    pub device_path: PathBuf,
    pub volume_id: String,
}

impl VolumeIdentity {
    /// Device label as exported: the path without its `/dev/` prefix.
    pub fn device_name(&self) -> String {
        let path = self.device_path.to_string_lossy();
        path.strip_prefix("/dev/").unwrap_or(&*path).to_owned()
    }
}

/// Identify the EBS volume behind `device` using the kernel driver.
pub fn identify(device: &Path) -> Result<VolumeIdentity, DeviceError> {
    identify_with(&NvmeIoctl, device)
}

pub fn identify_with<C>(channel: &C, device: &Path) -> Result<VolumeIdentity, DeviceError>
where
    C: AdminChannel + ?Sized,
{
    let mut page = [0u8; ADMIN_PAGE_SIZE];
    channel.execute(
        device,
        NVME_ADMIN_IDENTIFY,
        0,
        &mut page,
        CommandParams::identify_controller(),
    )?;

    let ctrl = ControllerIdentity::from_page(&page);
    if ctrl.vendor_id != AMZN_NVME_VID {
        return Err(DeviceError::NotAmazonDevice(ctrl.vendor_id));
    }
    if ctrl.model != AMZN_NVME_EBS_MN {
        return Err(DeviceError::NotEBSDevice(ctrl.model));
    }

    let volume_id = normalize_volume_id(&ctrl.serial);
    agent_log!(
        Level::Info,
        "identity",
        "{} is {} (fw {})",
        device.display(),
        volume_id,
        ctrl.firmware_rev
    );
    Ok(VolumeIdentity { device_path: device.to_path_buf(), volume_id })
}

/// EBS reports the serial as `vol0123…`; the canonical id is `vol-0123…`.
/// Anything else, including a serial that already has the hyphen or is just
/// `vol`, passes through unchanged.
pub fn normalize_volume_id(serial: &str) -> String {
    match serial.strip_prefix("vol") {
        Some(rest) if !rest.is_empty() && !rest.starts_with('-') => format!("vol-{rest}"),
        _ => serial.to_owned(),
    }
}
