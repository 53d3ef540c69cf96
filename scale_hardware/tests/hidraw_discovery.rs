#![cfg(target_os = "linux")]

use rstest::rstest;
use scale_hardware::hidraw::find_hidraw;
use scale_hardware::{HidrawScale, HwError};
use scale_traits::{ReadError, ReportSource};
use std::fs;
use std::path::Path;
use std::time::Duration;

fn fake_node(sysfs: &Path, name: &str, hid_id: &str) {
    let dir = sysfs.join(name).join("device");
    fs::create_dir_all(&dir).unwrap();
    fs::write(
        dir.join("uevent"),
        format!("DRIVER=hid-generic\nHID_ID={hid_id}\nHID_NAME=test\n"),
    )
    .unwrap();
}

#[rstest]
fn finds_matching_vendor_among_others() {
    let tmp = tempfile::tempdir().unwrap();
    fake_node(tmp.path(), "hidraw0", "0003:0000046D:0000C52B");
    fake_node(tmp.path(), "hidraw1", "0003:00000922:00008003");
    fake_node(tmp.path(), "hidraw2", "0003:00000922:00008009");

    assert_eq!(
        find_hidraw(tmp.path(), 0x0922, None).unwrap().as_deref(),
        Some("hidraw1")
    );
    assert_eq!(
        find_hidraw(tmp.path(), 0x0922, Some(0x8009)).unwrap().as_deref(),
        Some("hidraw2")
    );
    assert_eq!(find_hidraw(tmp.path(), 0x1234, None).unwrap(), None);
}

#[rstest]
fn entries_without_uevent_are_skipped() {
    let tmp = tempfile::tempdir().unwrap();
    fs::create_dir_all(tmp.path().join("hidraw0")).unwrap();
    fake_node(tmp.path(), "hidraw1", "0003:00000922:00008003");
    assert_eq!(
        find_hidraw(tmp.path(), 0x0922, None).unwrap().as_deref(),
        Some("hidraw1")
    );
}

#[rstest]
fn undiscoverable_device_reads_as_absent() {
    let tmp = tempfile::tempdir().unwrap();
    let mut scale = HidrawScale::discover_in(tmp.path(), tmp.path(), 0x0922, None);
    assert!(matches!(scale.locate(), Err(HwError::NoDevice { vendor: 0x0922 })));
    assert_eq!(
        scale.read_report(Duration::from_millis(10)),
        Err(ReadError::Absent)
    );
    assert!(!scale.is_open());
}

#[rstest]
fn missing_explicit_path_reads_as_absent() {
    let tmp = tempfile::tempdir().unwrap();
    let mut scale = HidrawScale::at_path(tmp.path().join("hidraw9"));
    assert_eq!(
        scale.read_report(Duration::from_millis(10)),
        Err(ReadError::Absent)
    );
}

#[rstest]
fn regular_file_yields_its_bytes() {
    // A plain file is always readable, which exercises the poll+read path.
    let tmp = tempfile::tempdir().unwrap();
    let node = tmp.path().join("hidraw0");
    fs::write(&node, [3u8, 4, 2, 0, 0xe8, 0x03]).unwrap();
    let mut scale = HidrawScale::at_path(&node);
    assert_eq!(
        scale.read_report(Duration::from_millis(10)).unwrap(),
        vec![3, 4, 2, 0, 0xe8, 0x03]
    );
    assert!(scale.is_open());
    // End of file looks like an unplugged device and drops the handle.
    assert_eq!(
        scale.read_report(Duration::from_millis(10)),
        Err(ReadError::Absent)
    );
    assert!(!scale.is_open());
}
