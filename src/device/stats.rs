// src/device/stats.rs

//! Statistics reader (Get Log Page 0xD0).

use std::path::Path;

use shared::constants::{
    ADMIN_PAGE_SIZE, AMZN_NVME_STATS_LOGPAGE_ID, AMZN_NVME_STATS_MAGIC, NVME_ADMIN_GET_LOG_PAGE,
    STATS_NAMESPACE_ID,
};
use shared::layout::{read_magic, CommandParams, VolumeStats};

use crate::comms::{AdminChannel, NvmeIoctl};
use crate::device::DeviceError;

/// Fetch a fresh statistics snapshot from `device` via the kernel driver.
pub fn query_stats(device: &Path) -> Result<VolumeStats, DeviceError> {
    query_stats_with(&NvmeIoctl, device)
}

/// Fetch, validate and decode one statistics page.
///
/// Nothing past the magic is decoded unless the magic matches.
pub fn query_stats_with<C>(channel: &C, device: &Path) -> Result<VolumeStats, DeviceError>
where
    C: AdminChannel + ?Sized,
{
    let mut page = [0u8; ADMIN_PAGE_SIZE];
    channel.execute(
        device,
        NVME_ADMIN_GET_LOG_PAGE,
        STATS_NAMESPACE_ID,
        &mut page,
        CommandParams::get_log_page(AMZN_NVME_STATS_LOGPAGE_ID, ADMIN_PAGE_SIZE),
    )?;

    let magic = read_magic(&page);
    if magic != AMZN_NVME_STATS_MAGIC {
        return Err(DeviceError::InvalidMagic(magic, AMZN_NVME_STATS_MAGIC));
    }
    Ok(VolumeStats::from_page(&page))
}
