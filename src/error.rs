/// Errors that can occur when talking to a tracked HMD or camera.
#[derive(Debug, thiserror::Error)]
pub enum HmdError {
    #[error("HID error: {0}")]
    Hid(#[from] hidapi::HidError),

    #[error("Failed to open '{devnode}': {source}")]
    Open {
        devnode: String,
        source: std::io::Error,
    },

    #[error("Device handle is not open")]
    NotOpen,

    #[error("Transport failure: {0}")]
    Transport(String),

    #[error("Short report 0x{id:02x}: expected {expected} bytes, got {got}")]
    ReportSize { id: u8, expected: usize, got: usize },

    #[error("Unexpected report id: expected 0x{expected:02x}, got 0x{got:02x}")]
    UnexpectedReportId { expected: u8, got: u8 },

    #[error("Invalid LED pattern 0x{0:x}")]
    InvalidPattern(u32),

    #[error("Unexpected LED pattern length {0}")]
    PatternLength(u8),

    #[error("Table index {index} out of range (num={num})")]
    IndexOutOfRange { index: u16, num: u16 },

    #[error("Device reports {num} entries, at most {max} supported")]
    TooManyEntries { num: u16, max: usize },

    #[error("Device has not been started")]
    NotStarted,

    #[error("Sensor cadence anomaly: {0}")]
    Timing(crate::sensor::TimingAnomaly),
}

/// Coarse classification used to decide whether an error is fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Device absent, closed, or an I/O failure.
    Transport,
    /// Malformed or out-of-range report contents.
    Protocol,
    /// Sample cadence anomaly. Never fatal.
    Timing,
}

impl HmdError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            HmdError::Hid(_)
            | HmdError::Open { .. }
            | HmdError::NotOpen
            | HmdError::Transport(_)
            | HmdError::ReportSize { .. } => ErrorKind::Transport,
            HmdError::UnexpectedReportId { .. }
            | HmdError::InvalidPattern(_)
            | HmdError::PatternLength(_)
            | HmdError::IndexOutOfRange { .. }
            | HmdError::TooManyEntries { .. }
            | HmdError::NotStarted => ErrorKind::Protocol,
            HmdError::Timing(_) => ErrorKind::Timing,
        }
    }
}
