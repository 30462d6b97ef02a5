use crate::reports::FeatureReport;
use crate::{HmdError, Result};
use hidapi::{HidApi, HidDevice};
use std::ffi::CString;
use std::time::Duration;

/// Outcome of waiting for one streamed input report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadEvent {
    /// Nothing arrived within the timeout.
    Timeout,
    /// `n` bytes were read into the buffer.
    Data(usize),
    /// The device went away.
    Hangup,
}

/// Byte-level access to one HID device node.
///
/// Feature report buffers carry the report id in byte 0.
pub trait Transport: Send {
    /// Read a feature report. Returns the number of bytes received.
    fn get_feature_report(&self, buf: &mut [u8]) -> Result<usize>;

    /// Write a feature report.
    fn send_feature_report(&self, buf: &[u8]) -> Result<()>;

    /// Wait up to `timeout` for the next streamed input report.
    fn read_timeout(&self, buf: &mut [u8], timeout: Duration) -> Result<ReadEvent>;
}

/// Read a feature report of kind `R` from the device.
///
/// The returned report must have exactly `R::SIZE` bytes and echo `R::ID`.
pub fn get_feature_report<R: FeatureReport>(transport: &dyn Transport) -> Result<R> {
    let mut buf = vec![0u8; R::SIZE];
    buf[0] = R::ID;
    let len = transport.get_feature_report(&mut buf)?;

    if len != R::SIZE {
        return Err(HmdError::ReportSize {
            id: R::ID,
            expected: R::SIZE,
            got: len,
        });
    }
    if buf[0] != R::ID {
        return Err(HmdError::UnexpectedReportId {
            expected: R::ID,
            got: buf[0],
        });
    }

    R::decode(&buf)
}

/// Write a feature report to the device.
pub fn set_feature_report<R: FeatureReport>(transport: &dyn Transport, report: &R) -> Result<()> {
    transport.send_feature_report(&report.to_bytes())
}

/// hidapi-backed transport for a hidraw device node.
pub struct HidTransport {
    device: HidDevice,
}

impl HidTransport {
    pub fn new(device: HidDevice) -> Self {
        Self { device }
    }

    /// Open the HID device at `devnode`.
    pub fn open(devnode: &str) -> Result<Self> {
        let path = CString::new(devnode)
            .map_err(|e| HmdError::Transport(format!("invalid device path {:?}: {}", devnode, e)))?;
        let api = HidApi::new()?;
        let device = api.open_path(&path)?;
        log::debug!("Opened HID device {}", devnode);
        Ok(Self::new(device))
    }
}

impl Transport for HidTransport {
    fn get_feature_report(&self, buf: &mut [u8]) -> Result<usize> {
        Ok(self.device.get_feature_report(buf)?)
    }

    fn send_feature_report(&self, buf: &[u8]) -> Result<()> {
        Ok(self.device.send_feature_report(buf)?)
    }

    fn read_timeout(&self, buf: &mut [u8], timeout: Duration) -> Result<ReadEvent> {
        match self.device.read_timeout(buf, timeout.as_millis() as i32) {
            Ok(0) => Ok(ReadEvent::Timeout),
            Ok(n) => Ok(ReadEvent::Data(n)),
            Err(e) => {
                let msg = e.to_string().to_ascii_lowercase();
                if msg.contains("disconnected") || msg.contains("no such device") {
                    Ok(ReadEvent::Hangup)
                } else {
                    Err(e.into())
                }
            }
        }
    }
}
