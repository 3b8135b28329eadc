//! In-memory stand-in for the NVMe admin ioctl.
#![allow(dead_code)]

use std::{
    collections::VecDeque,
    path::{Path, PathBuf},
    sync::{mpsc, Mutex},
};

use agent::comms::AdminChannel;
use agent::device::DeviceError;
use shared::constants::{ADMIN_PAGE_SIZE, AMZN_NVME_EBS_MN, AMZN_NVME_VID};
use shared::layout::{CommandParams, ControllerIdentity, Page};

/// What the fake saw for one `execute` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub device: PathBuf,
    pub opcode: u8,
    pub nsid: u32,
    pub len: usize,
    pub params: CommandParams,
}

/// Replays canned replies in order: a page to copy into the caller's
/// buffer, or an ioctl failure code.
#[derive(Default)]
pub struct FakeChannel {
    replies: Mutex<VecDeque<Result<Page, i32>>>,
    calls: Mutex<Vec<Call>>,
}

impl FakeChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(self, page: Page) -> Self {
        self.replies.lock().unwrap().push_back(Ok(page));
        self
    }

    pub fn failure(self, code: i32) -> Self {
        self.replies.lock().unwrap().push_back(Err(code));
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }
}

impl AdminChannel for FakeChannel {
    fn execute(
        &self,
        device: &Path,
        opcode: u8,
        nsid: u32,
        buf: &mut [u8],
        params: CommandParams,
    ) -> Result<(), DeviceError> {
        self.calls.lock().unwrap().push(Call {
            device: device.to_path_buf(),
            opcode,
            nsid,
            len: buf.len(),
            params,
        });
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .expect("FakeChannel ran out of replies");
        match reply {
            Ok(page) => {
                buf.copy_from_slice(&page[..buf.len()]);
                Ok(())
            }
            Err(code) => Err(DeviceError::IoctlFailed(code)),
        }
    }
}

/// Wraps a `FakeChannel` so every command blocks until the test releases
/// it, standing in for a hung ioctl.
pub struct GatedChannel {
    inner: FakeChannel,
    gate: Mutex<mpsc::Receiver<()>>,
}

impl GatedChannel {
    pub fn new(inner: FakeChannel) -> (mpsc::Sender<()>, Self) {
        let (tx, rx) = mpsc::channel();
        (tx, Self { inner, gate: Mutex::new(rx) })
    }
}

impl AdminChannel for GatedChannel {
    fn execute(
        &self,
        device: &Path,
        opcode: u8,
        nsid: u32,
        buf: &mut [u8],
        params: CommandParams,
    ) -> Result<(), DeviceError> {
        self.gate.lock().unwrap().recv().expect("gate closed");
        self.inner.execute(device, opcode, nsid, buf, params)
    }
}

/// Identify page as an EBS controller would return it.
pub fn ebs_identity(serial: &str) -> Page {
    ControllerIdentity {
        vendor_id: AMZN_NVME_VID,
        subsystem_vendor_id: AMZN_NVME_VID,
        serial: serial.into(),
        model: AMZN_NVME_EBS_MN.into(),
        firmware_rev: "1.0".into(),
    }
    .encode()
}

pub fn blank_page() -> Page {
    [0u8; ADMIN_PAGE_SIZE]
}
