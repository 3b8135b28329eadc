//! Integration tests for volume identity resolution.
//!
//! Each test feeds a canned identify-controller page through `FakeChannel`
//! and checks both the outcome and the admin command that was issued.

mod common;

use std::path::Path;

use agent::device::{identify_with, DeviceError, VolumeIdentity};
use common::{blank_page, ebs_identity, FakeChannel};
use shared::constants::{ADMIN_PAGE_SIZE, AMZN_NVME_EBS_MN, NVME_ADMIN_IDENTIFY};
use shared::layout::ControllerIdentity;

const DEV: &str = "/dev/nvme1n1";

#[test]
fn serial_without_hyphen_is_normalized() {
    let chan = FakeChannel::new().page(ebs_identity("vol1234567890abcdef"));

    let id = identify_with(&chan, Path::new(DEV)).unwrap();

    assert_eq!(
        id,
        VolumeIdentity { device_path: DEV.into(), volume_id: "vol-1234567890abcdef".into() }
    );
}

#[test]
fn serial_with_hyphen_is_unchanged() {
    let chan = FakeChannel::new().page(ebs_identity("vol-0abc"));
    let id = identify_with(&chan, Path::new(DEV)).unwrap();
    assert_eq!(id.volume_id, "vol-0abc");
}

#[test]
fn identify_issues_controller_identify() {
    let chan = FakeChannel::new().page(ebs_identity("vol0abc"));
    identify_with(&chan, Path::new(DEV)).unwrap();

    let calls = chan.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].device, Path::new(DEV));
    assert_eq!(calls[0].opcode, NVME_ADMIN_IDENTIFY);
    assert_eq!(calls[0].nsid, 0);
    assert_eq!(calls[0].len, ADMIN_PAGE_SIZE);
    assert_eq!(calls[0].params.cdw10, 1);
}

#[test]
fn foreign_vendor_is_rejected() {
    for vid in [0x0000, 0x144D, 0x8086, 0x1D0E] {
        let page = ControllerIdentity {
            vendor_id: vid,
            model: AMZN_NVME_EBS_MN.into(),
            serial: "vol0abc".into(),
            ..Default::default()
        }
        .encode();
        let chan = FakeChannel::new().page(page);

        let err = identify_with(&chan, Path::new(DEV)).unwrap_err();
        assert!(matches!(err, DeviceError::NotAmazonDevice(v) if v == vid), "{err:?}");
        assert!(err.is_fatal());
    }
}

#[test]
fn blank_page_is_not_amazon() {
    let chan = FakeChannel::new().page(blank_page());
    let err = identify_with(&chan, Path::new(DEV)).unwrap_err();
    assert!(matches!(err, DeviceError::NotAmazonDevice(0)));
}

#[test]
fn amazon_instance_store_is_not_ebs() {
    let page = ControllerIdentity {
        vendor_id: 0x1D0F,
        model: "Amazon EC2 NVMe Instance Storage".into(),
        serial: "AWS1234".into(),
        ..Default::default()
    }
    .encode();
    let chan = FakeChannel::new().page(page);

    match identify_with(&chan, Path::new(DEV)).unwrap_err() {
        DeviceError::NotEBSDevice(model) => assert_eq!(model, "Amazon EC2 NVMe Instance Storage"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn model_match_is_case_sensitive() {
    let page = ControllerIdentity {
        vendor_id: 0x1D0F,
        model: "amazon elastic block store".into(),
        ..Default::default()
    }
    .encode();
    let chan = FakeChannel::new().page(page);
    assert!(matches!(
        identify_with(&chan, Path::new(DEV)),
        Err(DeviceError::NotEBSDevice(_))
    ));
}

#[test]
fn model_padded_with_nul_still_matches() {
    let mut page = ebs_identity("vol0abc");
    // firmware may NUL-fill instead of space-fill
    for b in &mut page[24 + AMZN_NVME_EBS_MN.len()..64] {
        *b = 0;
    }
    let chan = FakeChannel::new().page(page);
    assert_eq!(identify_with(&chan, Path::new(DEV)).unwrap().volume_id, "vol-0abc");
}

#[test]
fn ioctl_failure_propagates() {
    let chan = FakeChannel::new().failure(-13);
    let err = identify_with(&chan, Path::new(DEV)).unwrap_err();
    assert!(matches!(err, DeviceError::IoctlFailed(-13)));
    assert!(!err.is_fatal());
}

#[test]
fn sequential_calls_do_not_leak_state() {
    let chan = FakeChannel::new()
        .page(ebs_identity("vol0aaa"))
        .page(ebs_identity("vol-0bbb"));

    let first = identify_with(&chan, Path::new("/dev/nvme1n1")).unwrap();
    let second = identify_with(&chan, Path::new("/dev/nvme2n1")).unwrap();

    assert_eq!(first.volume_id, "vol-0aaa");
    assert_eq!(first.device_path, Path::new("/dev/nvme1n1"));
    assert_eq!(second.volume_id, "vol-0bbb");
    assert_eq!(second.device_path, Path::new("/dev/nvme2n1"));
}
