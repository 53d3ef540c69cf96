use scale_traits::ReadError;
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HwError {
    #[error("gpio error: {0}")]
    Gpio(String),
    #[error("no hidraw device with vendor id {vendor:#06x}")]
    NoDevice { vendor: u16 },
    #[error("io: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, HwError>;

/// Map an OS error from the device node onto the read outcome the core understands.
///
/// A vanished node (unplug) is `Absent`; anything else is `Io`.
pub fn read_error_from_io(err: &io::Error) -> ReadError {
    if err.kind() == io::ErrorKind::NotFound || err.raw_os_error().is_some_and(device_gone) {
        return ReadError::Absent;
    }
    ReadError::Io(err.to_string())
}

#[cfg(target_os = "linux")]
fn device_gone(errno: i32) -> bool {
    matches!(errno, libc::ENODEV | libc::ENXIO | libc::ENOENT)
}

#[cfg(not(target_os = "linux"))]
fn device_gone(_errno: i32) -> bool {
    false
}

impl From<HwError> for ReadError {
    fn from(e: HwError) -> Self {
        match e {
            HwError::NoDevice { .. } => ReadError::Absent,
            HwError::Io(io) => read_error_from_io(&io),
            HwError::Gpio(msg) => ReadError::Io(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_is_absent() {
        let e = io::Error::from(io::ErrorKind::NotFound);
        assert_eq!(read_error_from_io(&e), ReadError::Absent);
    }

    #[test]
    fn permission_denied_is_io() {
        let e = io::Error::from(io::ErrorKind::PermissionDenied);
        assert!(matches!(read_error_from_io(&e), ReadError::Io(_)));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn enodev_is_absent() {
        let e = io::Error::from_raw_os_error(libc::ENODEV);
        assert_eq!(read_error_from_io(&e), ReadError::Absent);
    }
}
