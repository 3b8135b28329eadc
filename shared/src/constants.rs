//! Numeric contract with the Linux NVMe driver and the EBS controller firmware.

/// Admin opcode: Get Log Page.
pub const NVME_ADMIN_GET_LOG_PAGE: u8 = 0x02;
/// Admin opcode: Identify.
pub const NVME_ADMIN_IDENTIFY: u8 = 0x06;
/// `_IOWR('N', 0x41, struct nvme_admin_cmd)`; the size field (0x48) is the
/// 72-byte `AdminCommand` record.
pub const NVME_IOCTL_ADMIN_CMD: u32 = 0xC048_4E41;

/// CNS value selecting the controller-level identify page.
pub const IDENTIFY_CNS_CONTROLLER: u32 = 1;
/// Namespace the EBS statistics log page is read from.
pub const STATS_NAMESPACE_ID: u32 = 1;

pub const AMZN_NVME_VID: u16 = 0x1D0F;
pub const AMZN_NVME_EBS_MN: &str = "Amazon Elastic Block Store";
pub const AMZN_NVME_STATS_LOGPAGE_ID: u8 = 0xD0;
pub const AMZN_NVME_STATS_MAGIC: u32 = 0x3C23_B510;

/// Both the identify page and the stats log page are exactly one 4 KiB page.
pub const ADMIN_PAGE_SIZE: usize = 4096;
pub const ADMIN_COMMAND_SIZE: usize = 72;
pub const HISTOGRAM_BINS: usize = 64;
