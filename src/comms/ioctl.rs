//! IOCTL communication interface with the NVMe driver.
//!
//! This module wraps the Linux `NVME_IOCTL_ADMIN_CMD` request, providing a
//! safe Rust interface to send one admin command and receive the page the
//! controller writes back.
//!
//! Key responsibilities:
//! - Open the device node for the duration of a single call.
//! - Marshal the caller's buffer into an `AdminCommand`.
//! - Translate errno / NVMe status codes into `DeviceError`.
//!
//! No handle is cached: every call opens and closes the node, so concurrent
//! callers never share a descriptor. Serialising commands per device is the
//! caller's job.

use std::{fs::OpenOptions, io, os::fd::AsRawFd, path::Path, sync::Arc};

use shared::constants::NVME_IOCTL_ADMIN_CMD;
use shared::layout::{AdminCommand, CommandParams};

use crate::device::DeviceError;

/// The one privileged operation the device layer needs.
///
/// Kept narrow so tests can substitute an in-memory page provider.
pub trait AdminChannel: Send + Sync {
    /// Run `opcode` against `device`; on success the controller has filled
    /// `buf` in place.
    fn execute(
        &self,
        device: &Path,
        opcode: u8,
        nsid: u32,
        buf: &mut [u8],
        params: CommandParams,
    ) -> Result<(), DeviceError>;
}

impl<T: AdminChannel + ?Sized> AdminChannel for Arc<T> {
    fn execute(
        &self,
        device: &Path,
        opcode: u8,
        nsid: u32,
        buf: &mut [u8],
        params: CommandParams,
    ) -> Result<(), DeviceError> {
        (**self).execute(device, opcode, nsid, buf, params)
    }
}

/// The real thing: `ioctl(fd, NVME_IOCTL_ADMIN_CMD, &cmd)`.
#[derive(Debug, Default, Clone, Copy)]
pub struct NvmeIoctl;

impl AdminChannel for NvmeIoctl {
    fn execute(
        &self,
        device: &Path,
        opcode: u8,
        nsid: u32,
        buf: &mut [u8],
        params: CommandParams,
    ) -> Result<(), DeviceError> {
        let file = OpenOptions::new()
            .read(true)
            .open(device)
            .map_err(|source| DeviceError::Open { path: device.to_path_buf(), source })?;

        let mut cmd = AdminCommand::new(opcode, nsid, buf, params);
        log::trace!(
            "admin cmd opc={:#04x} nsid={} len={} cdw10={:#010x} on {}",
            cmd.opcode,
            cmd.nsid,
            cmd.data_len,
            cmd.cdw10,
            device.display()
        );

        // SAFETY: `cmd` is a live repr(C) nvme_admin_cmd and `cmd.addr` points
        // into `buf`, which stays mutably borrowed until this call returns.
        let rv = unsafe {
            libc::ioctl(file.as_raw_fd(), NVME_IOCTL_ADMIN_CMD as _, &mut cmd as *mut AdminCommand)
        };

        match rv {
            0 => Ok(()),
            status if status > 0 => Err(DeviceError::IoctlFailed(status)),
            _ => {
                let errno = io::Error::last_os_error().raw_os_error().unwrap_or(libc::EIO);
                Err(DeviceError::IoctlFailed(-errno))
            }
        }
    }
}
