//! Fixed-offset records exchanged with the NVMe driver.
//!
//!   ┌──────────── AdminCommand (72 bytes, passed by pointer) ────────────┐
//!   │ opc flg cid nsid │ rsvd │ mptr │ addr │ mlen alen │ cdw10‥15 │ rsvd │
//!   └────────────────────────────────────────────────────────────────────┘
//!
//! The two 4 KiB pages the device writes back (identify controller and the
//! EBS stats log page) are *not* mapped onto Rust structs. They are decoded
//! by explicit offset arithmetic against the field tables below, so the
//! contract stays auditable and independent of compiler layout rules. Every
//! multi-byte value on the wire is little-endian.

use std::mem::{offset_of, size_of};

use crate::constants::{
    ADMIN_COMMAND_SIZE, ADMIN_PAGE_SIZE, AMZN_NVME_STATS_MAGIC, HISTOGRAM_BINS,
    IDENTIFY_CNS_CONTROLLER,
};

/// One raw identify / log page.
pub type Page = [u8; ADMIN_PAGE_SIZE];

// ───── admin command ────────────────────────────────────────────────────────

/// `struct nvme_admin_cmd` as the kernel expects it.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AdminCommand {
    pub opcode: u8,
    pub flags: u8,
    pub command_id: u16,
    pub nsid: u32,
    pub reserved0: u64,
    /// Metadata buffer address (unused, always 0).
    pub metadata: u64,
    /// Data buffer address; must stay valid until the ioctl returns.
    pub addr: u64,
    pub metadata_len: u32,
    pub data_len: u32,
    pub cdw10: u32,
    pub cdw11: u32,
    pub cdw12: u32,
    pub cdw13: u32,
    pub cdw14: u32,
    pub cdw15: u32,
    pub reserved1: u64,
}

const _: () = {
    assert!(size_of::<AdminCommand>() == ADMIN_COMMAND_SIZE);
    assert!(offset_of!(AdminCommand, nsid) == 4);
    assert!(offset_of!(AdminCommand, metadata) == 16);
    assert!(offset_of!(AdminCommand, addr) == 24);
    assert!(offset_of!(AdminCommand, metadata_len) == 32);
    assert!(offset_of!(AdminCommand, data_len) == 36);
    assert!(offset_of!(AdminCommand, cdw10) == 40);
    assert!(offset_of!(AdminCommand, cdw15) == 60);
    assert!(offset_of!(AdminCommand, reserved1) == 64);
};

/// The six opcode-specific command dwords (CDW10..CDW15).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommandParams {
    pub cdw10: u32,
    pub cdw11: u32,
    pub cdw12: u32,
    pub cdw13: u32,
    pub cdw14: u32,
    pub cdw15: u32,
}

impl CommandParams {
    /// Identify with CNS = controller.
    pub const fn identify_controller() -> Self {
        Self { cdw10: IDENTIFY_CNS_CONTROLLER, cdw11: 0, cdw12: 0, cdw13: 0, cdw14: 0, cdw15: 0 }
    }

    /// Log page id in bits 0..8, transfer length in dwords from bit 16.
    pub const fn get_log_page(log_id: u8, len_bytes: usize) -> Self {
        let dwords = (len_bytes / 4) as u32;
        Self { cdw10: log_id as u32 | (dwords << 16), cdw11: 0, cdw12: 0, cdw13: 0, cdw14: 0, cdw15: 0 }
    }
}

impl AdminCommand {
    /// Build a command whose data pointer targets `buf`.
    ///
    /// The returned value holds a raw address into `buf`; it must not outlive
    /// the borrow it was built from.
    pub fn new(opcode: u8, nsid: u32, buf: &mut [u8], params: CommandParams) -> Self {
        Self {
            opcode,
            nsid,
            addr: buf.as_mut_ptr() as u64,
            data_len: buf.len() as u32,
            cdw10: params.cdw10,
            cdw11: params.cdw11,
            cdw12: params.cdw12,
            cdw13: params.cdw13,
            cdw14: params.cdw14,
            cdw15: params.cdw15,
            ..Self::default()
        }
    }

    pub fn params(&self) -> CommandParams {
        CommandParams {
            cdw10: self.cdw10,
            cdw11: self.cdw11,
            cdw12: self.cdw12,
            cdw13: self.cdw13,
            cdw14: self.cdw14,
            cdw15: self.cdw15,
        }
    }
}

// ───── field tables ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    U16,
    U32,
    U64,
    Ascii,
    Histogram,
    Reserved,
}

/// One entry of a page schema: `(name, offset, width, kind)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    pub offset: usize,
    pub width: usize,
    pub kind: FieldKind,
}

const fn field(name: &'static str, offset: usize, width: usize, kind: FieldKind) -> Field {
    Field { name, offset, width, kind }
}

/// True when `fields` tile `0..total` with no gap and no overlap.
pub const fn is_contiguous(fields: &[Field], total: usize) -> bool {
    let mut cursor = 0;
    let mut i = 0;
    while i < fields.len() {
        if fields[i].offset != cursor {
            return false;
        }
        cursor += fields[i].width;
        i += 1;
    }
    cursor == total
}

const IDENT_VID: usize = 0;
const IDENT_SSVID: usize = 2;
const IDENT_SN: usize = 4;
const IDENT_SN_LEN: usize = 20;
const IDENT_MN: usize = 24;
const IDENT_MN_LEN: usize = 40;
const IDENT_FR: usize = 64;
const IDENT_FR_LEN: usize = 8;

/// Identify-controller page, restricted to what the agent reads.
pub const IDENTIFY_FIELDS: &[Field] = &[
    field("vid", IDENT_VID, 2, FieldKind::U16),
    field("ssvid", IDENT_SSVID, 2, FieldKind::U16),
    field("sn", IDENT_SN, IDENT_SN_LEN, FieldKind::Ascii),
    field("mn", IDENT_MN, IDENT_MN_LEN, FieldKind::Ascii),
    field("fr", IDENT_FR, IDENT_FR_LEN, FieldKind::Ascii),
    field("reserved", IDENT_FR + IDENT_FR_LEN, ADMIN_PAGE_SIZE - 72, FieldKind::Reserved),
];

const STATS_MAGIC: usize = 0;
const STATS_READ_OPS: usize = 8;
const STATS_WRITE_OPS: usize = 16;
const STATS_READ_BYTES: usize = 24;
const STATS_WRITE_BYTES: usize = 32;
const STATS_READ_TIME: usize = 40;
const STATS_WRITE_TIME: usize = 48;
const STATS_VOL_IOPS_EXCEEDED: usize = 56;
const STATS_VOL_TP_EXCEEDED: usize = 64;
const STATS_INST_IOPS_EXCEEDED: usize = 72;
const STATS_INST_TP_EXCEEDED: usize = 80;
const STATS_QUEUE_LENGTH: usize = 88;
const STATS_READ_HISTOGRAM: usize = 512;
const STATS_WRITE_HISTOGRAM: usize = STATS_READ_HISTOGRAM + HISTOGRAM_SIZE;

const BIN_SIZE: usize = 24;
/// `num_bins: u64` followed by 64 bins.
pub const HISTOGRAM_SIZE: usize = 8 + HISTOGRAM_BINS * BIN_SIZE;

/// Amazon EBS statistics log page (id 0xD0).
pub const STATS_FIELDS: &[Field] = &[
    field("magic", STATS_MAGIC, 4, FieldKind::U32),
    field("reserved0", 4, 4, FieldKind::Reserved),
    field("total_read_ops", STATS_READ_OPS, 8, FieldKind::U64),
    field("total_write_ops", STATS_WRITE_OPS, 8, FieldKind::U64),
    field("total_read_bytes", STATS_READ_BYTES, 8, FieldKind::U64),
    field("total_write_bytes", STATS_WRITE_BYTES, 8, FieldKind::U64),
    field("total_read_time", STATS_READ_TIME, 8, FieldKind::U64),
    field("total_write_time", STATS_WRITE_TIME, 8, FieldKind::U64),
    field("ebs_volume_performance_exceeded_iops", STATS_VOL_IOPS_EXCEEDED, 8, FieldKind::U64),
    field("ebs_volume_performance_exceeded_tp", STATS_VOL_TP_EXCEEDED, 8, FieldKind::U64),
    field("ebs_instance_performance_exceeded_iops", STATS_INST_IOPS_EXCEEDED, 8, FieldKind::U64),
    field("ebs_instance_performance_exceeded_tp", STATS_INST_TP_EXCEEDED, 8, FieldKind::U64),
    field("volume_queue_length", STATS_QUEUE_LENGTH, 8, FieldKind::U64),
    field("reserved1", 96, 416, FieldKind::Reserved),
    field("read_io_latency_histogram", STATS_READ_HISTOGRAM, HISTOGRAM_SIZE, FieldKind::Histogram),
    field("write_io_latency_histogram", STATS_WRITE_HISTOGRAM, HISTOGRAM_SIZE, FieldKind::Histogram),
    field("reserved2", STATS_WRITE_HISTOGRAM + HISTOGRAM_SIZE, 496, FieldKind::Reserved),
];

const _: () = {
    assert!(HISTOGRAM_SIZE == 1544);
    assert!(is_contiguous(IDENTIFY_FIELDS, ADMIN_PAGE_SIZE));
    assert!(is_contiguous(STATS_FIELDS, ADMIN_PAGE_SIZE));
};

// ───── raw accessors ────────────────────────────────────────────────────────

fn read_u16(buf: &[u8], off: usize) -> u16 {
    u16::from_le_bytes([buf[off], buf[off + 1]])
}

fn read_u32(buf: &[u8], off: usize) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&buf[off..off + 4]);
    u32::from_le_bytes(raw)
}

fn read_u64(buf: &[u8], off: usize) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&buf[off..off + 8]);
    u64::from_le_bytes(raw)
}

fn write_u16(buf: &mut [u8], off: usize, v: u16) {
    buf[off..off + 2].copy_from_slice(&v.to_le_bytes());
}

fn write_u32(buf: &mut [u8], off: usize, v: u32) {
    buf[off..off + 4].copy_from_slice(&v.to_le_bytes());
}

fn write_u64(buf: &mut [u8], off: usize, v: u64) {
    buf[off..off + 8].copy_from_slice(&v.to_le_bytes());
}

/// Space-padded ASCII → `String`, with NULs dropped and whitespace trimmed.
pub fn read_ascii(raw: &[u8]) -> String {
    let bytes: Vec<u8> = raw.iter().copied().filter(|&b| b != 0).collect();
    String::from_utf8_lossy(&bytes).trim().to_owned()
}

/// Inverse of [`read_ascii`]: copy `text` and pad the rest with spaces.
fn write_ascii(buf: &mut [u8], text: &str) {
    let n = text.len().min(buf.len());
    buf[..n].copy_from_slice(&text.as_bytes()[..n]);
    buf[n..].fill(b' ');
}

// ───── identify controller ──────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControllerIdentity {
    pub vendor_id: u16,
    pub subsystem_vendor_id: u16,
    pub serial: String,
    pub model: String,
    pub firmware_rev: String,
}

impl ControllerIdentity {
    pub fn from_page(page: &Page) -> Self {
        Self {
            vendor_id: read_u16(page, IDENT_VID),
            subsystem_vendor_id: read_u16(page, IDENT_SSVID),
            serial: read_ascii(&page[IDENT_SN..IDENT_SN + IDENT_SN_LEN]),
            model: read_ascii(&page[IDENT_MN..IDENT_MN + IDENT_MN_LEN]),
            firmware_rev: read_ascii(&page[IDENT_FR..IDENT_FR + IDENT_FR_LEN]),
        }
    }

    /// Lay the identity out the way the controller does (text fields padded
    /// with spaces, everything else zero).
    pub fn encode(&self) -> Page {
        let mut page = [0u8; ADMIN_PAGE_SIZE];
        write_u16(&mut page, IDENT_VID, self.vendor_id);
        write_u16(&mut page, IDENT_SSVID, self.subsystem_vendor_id);
        write_ascii(&mut page[IDENT_SN..IDENT_SN + IDENT_SN_LEN], &self.serial);
        write_ascii(&mut page[IDENT_MN..IDENT_MN + IDENT_MN_LEN], &self.model);
        write_ascii(&mut page[IDENT_FR..IDENT_FR + IDENT_FR_LEN], &self.firmware_rev);
        page
    }
}

// ───── statistics log page ──────────────────────────────────────────────────

/// One latency bucket. Bounds are in microseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HistogramBin {
    pub lower_us: u64,
    pub upper_us: u64,
    pub count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatencyHistogram {
    /// Number of bins the device claims to have filled in.
    pub num_bins: u64,
    pub bins: [HistogramBin; HISTOGRAM_BINS],
}

impl Default for LatencyHistogram {
    fn default() -> Self {
        Self { num_bins: 0, bins: [HistogramBin::default(); HISTOGRAM_BINS] }
    }
}

impl LatencyHistogram {
    fn read(buf: &[u8], off: usize) -> Self {
        let mut hist = Self { num_bins: read_u64(buf, off), ..Self::default() };
        for (i, bin) in hist.bins.iter_mut().enumerate() {
            let at = off + 8 + i * BIN_SIZE;
            *bin = HistogramBin {
                lower_us: read_u64(buf, at),
                upper_us: read_u64(buf, at + 8),
                count: read_u32(buf, at + 16),
            };
        }
        hist
    }

    fn write(&self, buf: &mut [u8], off: usize) {
        write_u64(buf, off, self.num_bins);
        for (i, bin) in self.bins.iter().enumerate() {
            let at = off + 8 + i * BIN_SIZE;
            write_u64(buf, at, bin.lower_us);
            write_u64(buf, at + 8, bin.upper_us);
            write_u32(buf, at + 16, bin.count);
        }
    }

    /// The bins covered by `num_bins`, capped at the fixed array length.
    pub fn populated(&self) -> &[HistogramBin] {
        let n = usize::try_from(self.num_bins).map_or(HISTOGRAM_BINS, |n| n.min(HISTOGRAM_BINS));
        &self.bins[..n]
    }
}

/// Decoded EBS statistics log page. All times are microseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VolumeStats {
    pub magic: u32,
    pub total_read_ops: u64,
    pub total_write_ops: u64,
    pub total_read_bytes: u64,
    pub total_write_bytes: u64,
    pub total_read_time_us: u64,
    pub total_write_time_us: u64,
    pub volume_iops_exceeded_us: u64,
    pub volume_throughput_exceeded_us: u64,
    pub instance_iops_exceeded_us: u64,
    pub instance_throughput_exceeded_us: u64,
    pub volume_queue_length: u64,
    pub read_latency: LatencyHistogram,
    pub write_latency: LatencyHistogram,
}

/// The magic marker, read without touching any other field.
pub fn read_magic(page: &Page) -> u32 {
    read_u32(page, STATS_MAGIC)
}

impl VolumeStats {
    /// A zeroed snapshot carrying the expected magic.
    pub fn empty() -> Self {
        Self { magic: AMZN_NVME_STATS_MAGIC, ..Self::default() }
    }

    /// Decode every field. The magic is copied, not checked; callers
    /// validate it with [`read_magic`] before trusting the result.
    pub fn from_page(page: &Page) -> Self {
        Self {
            magic: read_u32(page, STATS_MAGIC),
            total_read_ops: read_u64(page, STATS_READ_OPS),
            total_write_ops: read_u64(page, STATS_WRITE_OPS),
            total_read_bytes: read_u64(page, STATS_READ_BYTES),
            total_write_bytes: read_u64(page, STATS_WRITE_BYTES),
            total_read_time_us: read_u64(page, STATS_READ_TIME),
            total_write_time_us: read_u64(page, STATS_WRITE_TIME),
            volume_iops_exceeded_us: read_u64(page, STATS_VOL_IOPS_EXCEEDED),
            volume_throughput_exceeded_us: read_u64(page, STATS_VOL_TP_EXCEEDED),
            instance_iops_exceeded_us: read_u64(page, STATS_INST_IOPS_EXCEEDED),
            instance_throughput_exceeded_us: read_u64(page, STATS_INST_TP_EXCEEDED),
            volume_queue_length: read_u64(page, STATS_QUEUE_LENGTH),
            read_latency: LatencyHistogram::read(page, STATS_READ_HISTOGRAM),
            write_latency: LatencyHistogram::read(page, STATS_WRITE_HISTOGRAM),
        }
    }

    /// Encode into a page; reserved regions are left zero.
    pub fn encode(&self) -> Page {
        let mut page = [0u8; ADMIN_PAGE_SIZE];
        write_u32(&mut page, STATS_MAGIC, self.magic);
        write_u64(&mut page, STATS_READ_OPS, self.total_read_ops);
        write_u64(&mut page, STATS_WRITE_OPS, self.total_write_ops);
        write_u64(&mut page, STATS_READ_BYTES, self.total_read_bytes);
        write_u64(&mut page, STATS_WRITE_BYTES, self.total_write_bytes);
        write_u64(&mut page, STATS_READ_TIME, self.total_read_time_us);
        write_u64(&mut page, STATS_WRITE_TIME, self.total_write_time_us);
        write_u64(&mut page, STATS_VOL_IOPS_EXCEEDED, self.volume_iops_exceeded_us);
        write_u64(&mut page, STATS_VOL_TP_EXCEEDED, self.volume_throughput_exceeded_us);
        write_u64(&mut page, STATS_INST_IOPS_EXCEEDED, self.instance_iops_exceeded_us);
        write_u64(&mut page, STATS_INST_TP_EXCEEDED, self.instance_throughput_exceeded_us);
        write_u64(&mut page, STATS_QUEUE_LENGTH, self.volume_queue_length);
        self.read_latency.write(&mut page, STATS_READ_HISTOGRAM);
        self.write_latency.write(&mut page, STATS_WRITE_HISTOGRAM);
        page
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_fields_drop_nul_and_padding() {
        assert_eq!(read_ascii(b"vol0abc\0\0   "), "vol0abc");
        assert_eq!(read_ascii(b"ab\0cd  "), "abcd");
        assert_eq!(read_ascii(&[0u8; 8]), "");
    }

    #[test]
    fn ascii_writer_truncates_and_pads() {
        let mut buf = [0u8; 4];
        write_ascii(&mut buf, "abcdef");
        assert_eq!(&buf, b"abcd");
        write_ascii(&mut buf, "x");
        assert_eq!(&buf, b"x   ");
    }

    #[test]
    fn gap_in_table_is_detected() {
        let broken = [field("a", 0, 4, FieldKind::U32), field("b", 8, 8, FieldKind::U64)];
        assert!(!is_contiguous(&broken, 16));
        let short = [field("a", 0, 4, FieldKind::U32)];
        assert!(!is_contiguous(&short, 8));
    }
}
