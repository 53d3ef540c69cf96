//! Linux hidraw reader for USB HID scales.
//!
//! The node is opened non-blocking and every read waits in `poll(2)` for at
//! most the caller's timeout. A missing or vanished node drops the handle and
//! reports `Absent`; the next read tries to open it again.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read};
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use std::time::Duration;

use scale_traits::{RawReport, ReadError, ReportSource};
use tracing::{debug, info, trace, warn};

use crate::error::{HwError, Result, read_error_from_io};

const SYSFS_HIDRAW: &str = "/sys/class/hidraw";
const DEV_ROOT: &str = "/dev";
/// Larger than any report a scale sends; the kernel truncates to this.
const READ_BUF_LEN: usize = 64;

/// Parse the `HID_ID=bus:vendor:product` line of a sysfs `uevent` file.
pub fn parse_hid_id(uevent: &str) -> Option<(u16, u16)> {
    let value = uevent
        .lines()
        .find_map(|line| line.trim().strip_prefix("HID_ID="))?;
    let mut parts = value.split(':');
    let _bus = parts.next()?;
    let vendor = u32::from_str_radix(parts.next()?, 16).ok()?;
    let product = u32::from_str_radix(parts.next()?, 16).ok()?;
    Some((u16::try_from(vendor).ok()?, u16::try_from(product).ok()?))
}

/// First `hidrawN` under `sysfs_root` whose device matches `vendor` (and `product`, if given).
pub fn find_hidraw(sysfs_root: &Path, vendor: u16, product: Option<u16>) -> Result<Option<String>> {
    let entries = match fs::read_dir(sysfs_root) {
        Ok(e) => e,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(HwError::Io(e)),
    };
    let mut names: Vec<String> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|n| n.starts_with("hidraw"))
        .collect();
    names.sort();

    for name in names {
        let uevent = sysfs_root.join(&name).join("device").join("uevent");
        let Ok(text) = fs::read_to_string(&uevent) else {
            continue;
        };
        match parse_hid_id(&text) {
            Some((v, p)) if v == vendor && product.is_none_or(|want| want == p) => {
                return Ok(Some(name));
            }
            Some(_) => {}
            None => trace!(path = %uevent.display(), "uevent without HID_ID"),
        }
    }
    Ok(None)
}

#[derive(Debug, Clone)]
enum Target {
    Path(PathBuf),
    Discover {
        sysfs_root: PathBuf,
        dev_root: PathBuf,
        vendor: u16,
        product: Option<u16>,
    },
}

#[derive(Debug)]
pub struct HidrawScale {
    target: Target,
    file: Option<File>,
    open_path: Option<PathBuf>,
}

impl HidrawScale {
    /// Read from a fixed node such as `/dev/hidraw0`.
    pub fn at_path(path: impl Into<PathBuf>) -> Self {
        Self::with_target(Target::Path(path.into()))
    }

    /// Find the node by USB ids each time the device has to be (re)opened.
    pub fn discover(vendor: u16, product: Option<u16>) -> Self {
        Self::discover_in(SYSFS_HIDRAW, DEV_ROOT, vendor, product)
    }

    /// Like [`discover`](Self::discover) with alternative sysfs and /dev roots.
    pub fn discover_in(
        sysfs_root: impl Into<PathBuf>,
        dev_root: impl Into<PathBuf>,
        vendor: u16,
        product: Option<u16>,
    ) -> Self {
        Self::with_target(Target::Discover {
            sysfs_root: sysfs_root.into(),
            dev_root: dev_root.into(),
            vendor,
            product,
        })
    }

    fn with_target(target: Target) -> Self {
        Self {
            target,
            file: None,
            open_path: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    /// Resolve the device node without opening it.
    pub fn locate(&self) -> Result<PathBuf> {
        match &self.target {
            Target::Path(p) => Ok(p.clone()),
            Target::Discover {
                sysfs_root,
                dev_root,
                vendor,
                product,
            } => find_hidraw(sysfs_root, *vendor, *product)?
                .map(|name| dev_root.join(name))
                .ok_or(HwError::NoDevice { vendor: *vendor }),
        }
    }

    fn ensure_open(&mut self) -> std::result::Result<&File, ReadError> {
        if self.file.is_none() {
            let path = self.locate().map_err(ReadError::from)?;
            let file = OpenOptions::new()
                .read(true)
                .custom_flags(libc::O_NONBLOCK)
                .open(&path)
                .map_err(|e| {
                    let err = read_error_from_io(&e);
                    if matches!(err, ReadError::Io(_)) {
                        warn!(path = %path.display(), error = %e, "cannot open hidraw node");
                    }
                    err
                })?;
            info!(path = %path.display(), "scale device opened");
            self.open_path = Some(path);
            self.file = Some(file);
        }
        self.file.as_ref().ok_or(ReadError::Absent)
    }

    fn close(&mut self, why: &str) {
        if self.file.take().is_some() {
            let path = self.open_path.take().unwrap_or_default();
            info!(path = %path.display(), why, "scale device closed");
        }
    }
}

/// Wait for the descriptor to become readable.
///
/// Returns `(ready, hangup)`; `ready == false` is a timeout.
fn wait_readable(file: &File, timeout: Duration) -> io::Result<(bool, bool)> {
    let timeout_ms = i32::try_from(timeout.as_millis()).unwrap_or(i32::MAX);
    let mut pfd = libc::pollfd {
        fd: file.as_raw_fd(),
        events: libc::POLLIN,
        revents: 0,
    };
    // SAFETY: `pfd` is a valid pollfd for the lifetime of the call and nfds is 1.
    let rc = unsafe { libc::poll(&mut pfd, 1, timeout_ms) };
    if rc < 0 {
        let err = io::Error::last_os_error();
        if err.kind() == io::ErrorKind::Interrupted {
            return Ok((false, false));
        }
        return Err(err);
    }
    let hangup = pfd.revents & (libc::POLLHUP | libc::POLLERR | libc::POLLNVAL) != 0;
    Ok((rc > 0, hangup))
}

impl ReportSource for HidrawScale {
    fn read_report(&mut self, timeout: Duration) -> std::result::Result<RawReport, ReadError> {
        let file = self.ensure_open()?;
        let outcome = match wait_readable(file, timeout) {
            Err(e) => Err(e),
            Ok((false, _)) => return Err(ReadError::Timeout),
            Ok((true, true)) => {
                self.close("hangup");
                return Err(ReadError::Absent);
            }
            Ok((true, false)) => {
                let mut buf = [0u8; READ_BUF_LEN];
                let mut reader = file;
                reader.read(&mut buf).map(|n| buf[..n].to_vec())
            }
        };

        match outcome {
            Ok(report) if report.is_empty() => {
                self.close("end of file");
                Err(ReadError::Absent)
            }
            Ok(report) => {
                trace!(len = report.len(), "hid report");
                Ok(report)
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Err(ReadError::Timeout),
            Err(e) => {
                let err = read_error_from_io(&e);
                debug!(error = %e, "hidraw read failed");
                self.close("read error");
                Err(err)
            }
        }
    }
}
