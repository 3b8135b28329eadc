//! Layout regression tests for the driver-facing records.
//!
//! Every offset asserted here is dictated by the NVMe driver ABI or by the
//! EBS controller firmware; a failure means a field moved, not that the
//! test needs updating.

use std::mem::{offset_of, size_of};

use shared::constants::*;
use shared::layout::{
    read_magic, AdminCommand, CommandParams, ControllerIdentity, FieldKind, HistogramBin,
    LatencyHistogram, VolumeStats, HISTOGRAM_SIZE, IDENTIFY_FIELDS, STATS_FIELDS,
};

fn u64_at(page: &[u8], off: usize) -> u64 {
    u64::from_le_bytes(page[off..off + 8].try_into().unwrap())
}

fn u32_at(page: &[u8], off: usize) -> u32 {
    u32::from_le_bytes(page[off..off + 4].try_into().unwrap())
}

#[test]
fn admin_command_matches_driver_abi() {
    assert_eq!(size_of::<AdminCommand>(), 72);
    // ioctl size field must agree with the struct
    assert_eq!(((NVME_IOCTL_ADMIN_CMD >> 16) & 0x3FFF) as usize, size_of::<AdminCommand>());
    assert_eq!(offset_of!(AdminCommand, opcode), 0);
    assert_eq!(offset_of!(AdminCommand, flags), 1);
    assert_eq!(offset_of!(AdminCommand, command_id), 2);
    assert_eq!(offset_of!(AdminCommand, reserved0), 8);
    assert_eq!(offset_of!(AdminCommand, cdw11), 44);
    assert_eq!(offset_of!(AdminCommand, cdw14), 56);
}

#[test]
fn admin_command_points_at_caller_buffer() {
    let mut page = [0u8; ADMIN_PAGE_SIZE];
    let params = CommandParams::get_log_page(AMZN_NVME_STATS_LOGPAGE_ID, page.len());
    let cmd = AdminCommand::new(NVME_ADMIN_GET_LOG_PAGE, STATS_NAMESPACE_ID, &mut page, params);

    assert_eq!(cmd.opcode, 0x02);
    assert_eq!(cmd.nsid, 1);
    assert_eq!(cmd.addr, page.as_ptr() as u64);
    assert_eq!(cmd.data_len, 4096);
    assert_eq!(cmd.metadata, 0);
    assert_eq!(cmd.metadata_len, 0);
    assert_eq!(cmd.params(), params);
}

#[test]
fn log_page_dword_encodes_id_and_length() {
    let params = CommandParams::get_log_page(0xD0, 4096);
    assert_eq!(params.cdw10, 0x0400_00D0);
    assert_eq!(params.cdw10 & 0xFF, 0xD0);
    assert_eq!(params.cdw10 >> 16, 1024);
    assert_eq!(params.cdw11, 0);

    assert_eq!(CommandParams::identify_controller().cdw10, 1);
}

#[test]
fn page_tables_cover_exactly_one_page() {
    for table in [IDENTIFY_FIELDS, STATS_FIELDS] {
        let total: usize = table.iter().map(|f| f.width).sum();
        assert_eq!(total, ADMIN_PAGE_SIZE);
    }
    assert_eq!(HISTOGRAM_SIZE, 8 + 64 * 24);
}

#[test]
fn stats_table_offsets() {
    let offset = |name: &str| {
        STATS_FIELDS
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.offset)
            .unwrap_or_else(|| panic!("no field {name}"))
    };
    assert_eq!(offset("magic"), 0);
    assert_eq!(offset("total_read_ops"), 8);
    assert_eq!(offset("volume_queue_length"), 88);
    assert_eq!(offset("reserved1"), 96);
    assert_eq!(offset("read_io_latency_histogram"), 512);
    assert_eq!(offset("write_io_latency_histogram"), 2056);
    assert_eq!(offset("reserved2"), 3600);

    let counters = STATS_FIELDS.iter().filter(|f| f.kind == FieldKind::U64).count();
    assert_eq!(counters, 11);
}

fn sample_stats() -> VolumeStats {
    let mut read_latency = LatencyHistogram { num_bins: 64, ..LatencyHistogram::default() };
    let mut write_latency = LatencyHistogram { num_bins: 3, ..LatencyHistogram::default() };
    for (i, bin) in read_latency.bins.iter_mut().enumerate() {
        let i = i as u64;
        *bin = HistogramBin { lower_us: i * 100, upper_us: i * 100 + 99, count: 1000 + i as u32 };
    }
    for (i, bin) in write_latency.bins.iter_mut().enumerate().take(3) {
        let i = i as u64;
        // deliberately not monotonic
        *bin = HistogramBin { lower_us: 900 - i, upper_us: 1 << (40 + i), count: u32::MAX - i as u32 };
    }

    VolumeStats {
        magic: AMZN_NVME_STATS_MAGIC,
        total_read_ops: 1,
        total_write_ops: 2,
        total_read_bytes: 3,
        total_write_bytes: 4,
        total_read_time_us: 5,
        total_write_time_us: 6,
        volume_iops_exceeded_us: 7,
        volume_throughput_exceeded_us: 8,
        instance_iops_exceeded_us: 9,
        instance_throughput_exceeded_us: 10,
        volume_queue_length: u64::MAX,
        read_latency,
        write_latency,
    }
}

#[test]
fn stats_page_reproduces_every_field() {
    let stats = sample_stats();
    let page = stats.encode();

    assert_eq!(VolumeStats::from_page(&page), stats);
    assert_eq!(read_magic(&page), AMZN_NVME_STATS_MAGIC);
}

#[test]
fn stats_page_places_values_at_fixed_offsets() {
    let page = sample_stats().encode();

    assert_eq!(u32_at(&page, 0), 0x3C23_B510);
    for (i, off) in (8..96).step_by(8).enumerate() {
        let expected = if off == 88 { u64::MAX } else { i as u64 + 1 };
        assert_eq!(u64_at(&page, off), expected, "counter at offset {off}");
    }
    // read histogram: header then bin 1 at 512 + 8 + 24
    assert_eq!(u64_at(&page, 512), 64);
    assert_eq!(u64_at(&page, 544), 100);
    assert_eq!(u64_at(&page, 552), 199);
    assert_eq!(u32_at(&page, 560), 1001);
    // write histogram header
    assert_eq!(u64_at(&page, 2056), 3);
    // reserved regions stay zero
    assert!(page[4..8].iter().all(|&b| b == 0));
    assert!(page[96..512].iter().all(|&b| b == 0));
    assert!(page[3600..].iter().all(|&b| b == 0));
}

#[test]
fn histogram_order_is_preserved() {
    let stats = sample_stats();
    let decoded = VolumeStats::from_page(&stats.encode());

    let lowers: Vec<u64> = decoded.read_latency.bins.iter().map(|b| b.lower_us).collect();
    let expected: Vec<u64> = (0..64).map(|i| i * 100).collect();
    assert_eq!(lowers, expected);

    assert_eq!(decoded.write_latency.populated().len(), 3);
    assert_eq!(decoded.write_latency.populated()[2].lower_us, 898);
    assert_eq!(decoded.read_latency.populated().len(), 64);
}

#[test]
fn populated_caps_bogus_bin_count() {
    let hist = LatencyHistogram { num_bins: 10_000, ..LatencyHistogram::default() };
    assert_eq!(hist.populated().len(), HISTOGRAM_BINS);
}

#[test]
fn identity_page_is_space_padded() {
    let ident = ControllerIdentity {
        vendor_id: AMZN_NVME_VID,
        subsystem_vendor_id: AMZN_NVME_VID,
        serial: "vol0123456789abcdef0".into(),
        model: AMZN_NVME_EBS_MN.into(),
        firmware_rev: "2.0".into(),
    };
    let page = ident.encode();

    assert_eq!(&page[0..2], &[0x0F, 0x1D]);
    assert_eq!(&page[24..50], AMZN_NVME_EBS_MN.as_bytes());
    assert!(page[50..64].iter().all(|&b| b == b' '));
    assert_eq!(ControllerIdentity::from_page(&page), ident);
}

#[test]
fn identity_strips_embedded_nul() {
    let mut page = [0u8; ADMIN_PAGE_SIZE];
    page[4..12].copy_from_slice(b"vol0abc\0");
    page[24..30].copy_from_slice(b"Amazon");
    let ident = ControllerIdentity::from_page(&page);
    assert_eq!(ident.serial, "vol0abc");
    assert_eq!(ident.model, "Amazon");
    assert_eq!(ident.vendor_id, 0);
}
