//! Fixed-layout HID feature reports.
//!
//! Every report starts with its report id. All multi-byte fields are
//! little-endian. Unknown flag bits are kept so read-modify-write cycles
//! hand them back to the device untouched.

use crate::protocol::*;
use crate::{HmdError, Result};

/// A feature report with a fixed wire id and size.
pub trait FeatureReport: Sized {
    const ID: u8;
    const SIZE: usize;

    /// Decode from a buffer of exactly `SIZE` bytes. Any other length is a
    /// `ReportSize` error.
    fn decode(buf: &[u8]) -> Result<Self>;

    /// Encode into a buffer of exactly `SIZE` bytes.
    fn encode(&self, buf: &mut [u8]);

    fn to_bytes(&self) -> Vec<u8> {
        let mut buf = vec![0u8; Self::SIZE];
        buf[0] = Self::ID;
        self.encode(&mut buf);
        buf
    }
}

fn check_size<R: FeatureReport>(buf: &[u8]) -> Result<()> {
    if buf.len() != R::SIZE {
        return Err(HmdError::ReportSize {
            id: R::ID,
            expected: R::SIZE,
            got: buf.len(),
        });
    }
    Ok(())
}

bitflags::bitflags! {
    /// Sensor configuration flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ConfigFlags: u8 {
        const USE_CALIBRATION    = 0x04;
        const AUTO_CALIBRATION   = 0x08;
        const SENSOR_COORDINATES = 0x40;
    }
}

bitflags::bitflags! {
    /// IR tracking LED flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct TrackingFlags: u8 {
        const ENABLE         = 0x01;
        const AUTO_INCREMENT = 0x02;
        const USE_CARRIER    = 0x04;
        const SYNC_INPUT     = 0x08;
        const VSYNC_LOCK     = 0x10;
        const CUSTOM_PATTERN = 0x20;
    }
}

bitflags::bitflags! {
    /// Second display flag byte.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct DisplayFlags: u8 {
        const READ_PIXEL     = 0x04;
        const DIRECT_PENTILE = 0x08;
    }
}

/// Sensor sample rate and report interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConfigReport {
    pub echo: u16,
    pub flags: ConfigFlags,
    /// Number of samples between two sensor messages, minus one.
    pub packet_interval: u8,
    pub sample_rate: u16,
}

impl ConfigReport {
    pub fn report_rate(&self) -> u16 {
        self.sample_rate / (self.packet_interval as u16 + 1)
    }
}

impl FeatureReport for ConfigReport {
    const ID: u8 = CONFIG_REPORT_ID;
    const SIZE: usize = CONFIG_REPORT_SIZE;

    fn decode(buf: &[u8]) -> Result<Self> {
        check_size::<Self>(buf)?;
        Ok(Self {
            echo: le_u16(buf, 1),
            flags: ConfigFlags::from_bits_retain(buf[3]),
            packet_interval: buf[4],
            sample_rate: le_u16(buf, 5),
        })
    }

    fn encode(&self, buf: &mut [u8]) {
        put_le_u16(buf, 1, self.echo);
        buf[3] = self.flags.bits();
        buf[4] = self.packet_interval;
        put_le_u16(buf, 5, self.sample_rate);
    }
}

/// One entry of the factory calibrated LED/IMU position table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PositionReport {
    pub echo: u16,
    /// Position in µm.
    pub pos: [i32; 3],
    /// Direction, magnitude in unknown units.
    pub dir: [i16; 3],
    pub index: u16,
    pub num: u16,
    /// 0 = LED, 1 = IMU.
    pub kind: u16,
}

impl PositionReport {
    pub const KIND_LED: u16 = 0;
    pub const KIND_IMU: u16 = 1;
}

impl FeatureReport for PositionReport {
    const ID: u8 = POSITION_REPORT_ID;
    const SIZE: usize = POSITION_REPORT_SIZE;

    fn decode(buf: &[u8]) -> Result<Self> {
        check_size::<Self>(buf)?;
        Ok(Self {
            echo: le_u16(buf, 1),
            pos: [le_i32(buf, 4), le_i32(buf, 8), le_i32(buf, 12)],
            dir: [le_i16(buf, 16), le_i16(buf, 18), le_i16(buf, 20)],
            index: le_u16(buf, 24),
            num: le_u16(buf, 26),
            kind: le_u16(buf, 28),
        })
    }

    fn encode(&self, buf: &mut [u8]) {
        put_le_u16(buf, 1, self.echo);
        for (i, p) in self.pos.iter().enumerate() {
            put_le_u32(buf, 4 + 4 * i, *p as u32);
        }
        for (i, d) in self.dir.iter().enumerate() {
            put_le_u16(buf, 16 + 2 * i, *d as u16);
        }
        put_le_u16(buf, 24, self.index);
        put_le_u16(buf, 26, self.num);
        put_le_u16(buf, 28, self.kind);
    }
}

/// One entry of the LED blink pattern table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LedPatternReport {
    pub echo: u16,
    /// Number of 2-bit symbols in `pattern`.
    pub pattern_length: u8,
    pub pattern: u32,
    pub index: u16,
    pub num: u16,
}

impl FeatureReport for LedPatternReport {
    const ID: u8 = LED_PATTERN_REPORT_ID;
    const SIZE: usize = LED_PATTERN_REPORT_SIZE;

    fn decode(buf: &[u8]) -> Result<Self> {
        check_size::<Self>(buf)?;
        Ok(Self {
            echo: le_u16(buf, 1),
            pattern_length: buf[3],
            pattern: le_u32(buf, 4),
            index: le_u16(buf, 8),
            num: le_u16(buf, 10),
        })
    }

    fn encode(&self, buf: &mut [u8]) {
        put_le_u16(buf, 1, self.echo);
        buf[3] = self.pattern_length;
        put_le_u32(buf, 4, self.pattern);
        put_le_u16(buf, 8, self.index);
        put_le_u16(buf, 10, self.num);
    }
}

/// Keeps sensor streaming alive for `timeout_ms`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeepaliveReport {
    pub echo: u16,
    pub kind: u8,
    pub timeout_ms: u16,
}

impl Default for KeepaliveReport {
    fn default() -> Self {
        Self {
            echo: 0,
            kind: KEEPALIVE_TYPE,
            timeout_ms: KEEPALIVE_TIMEOUT_MS,
        }
    }
}

impl FeatureReport for KeepaliveReport {
    const ID: u8 = KEEPALIVE_REPORT_ID;
    const SIZE: usize = KEEPALIVE_REPORT_SIZE;

    fn decode(buf: &[u8]) -> Result<Self> {
        check_size::<Self>(buf)?;
        Ok(Self {
            echo: le_u16(buf, 1),
            kind: buf[3],
            timeout_ms: le_u16(buf, 4),
        })
    }

    fn encode(&self, buf: &mut [u8]) {
        put_le_u16(buf, 1, self.echo);
        buf[3] = self.kind;
        put_le_u16(buf, 4, self.timeout_ms);
    }
}

/// IR tracking LED setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TrackingReport {
    pub echo: u16,
    pub pattern: u8,
    pub flags: TrackingFlags,
    pub reserved: u8,
    pub exposure_us: u16,
    pub period_us: u16,
    pub vsync_offset: u16,
    pub duty_cycle: u8,
}

impl TrackingReport {
    /// Tracking LEDs enabled, either cycling through their blink patterns
    /// or lit steadily.
    pub fn enabled(blink: bool) -> Self {
        let (pattern, flags) = if blink {
            (
                0,
                TrackingFlags::ENABLE | TrackingFlags::USE_CARRIER | TrackingFlags::AUTO_INCREMENT,
            )
        } else {
            (0xff, TrackingFlags::ENABLE | TrackingFlags::USE_CARRIER)
        };
        Self {
            echo: 0,
            pattern,
            flags,
            reserved: 0,
            exposure_us: TRACKING_EXPOSURE_US,
            period_us: TRACKING_PERIOD_US,
            vsync_offset: TRACKING_VSYNC_OFFSET,
            duty_cycle: TRACKING_DUTY_CYCLE,
        }
    }
}

impl FeatureReport for TrackingReport {
    const ID: u8 = TRACKING_REPORT_ID;
    const SIZE: usize = TRACKING_REPORT_SIZE;

    fn decode(buf: &[u8]) -> Result<Self> {
        check_size::<Self>(buf)?;
        Ok(Self {
            echo: le_u16(buf, 1),
            pattern: buf[3],
            flags: TrackingFlags::from_bits_retain(buf[4]),
            reserved: buf[5],
            exposure_us: le_u16(buf, 6),
            period_us: le_u16(buf, 8),
            vsync_offset: le_u16(buf, 10),
            duty_cycle: buf[12],
        })
    }

    fn encode(&self, buf: &mut [u8]) {
        put_le_u16(buf, 1, self.echo);
        buf[3] = self.pattern;
        buf[4] = self.flags.bits();
        buf[5] = self.reserved;
        put_le_u16(buf, 6, self.exposure_us);
        put_le_u16(buf, 8, self.period_us);
        put_le_u16(buf, 10, self.vsync_offset);
        buf[12] = self.duty_cycle;
    }
}

/// Display persistence and pixel readback setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DisplayReport {
    pub echo: u16,
    pub brightness: u8,
    pub flags1: u8,
    pub flags2: DisplayFlags,
    pub unknown_6: u16,
    /// Number of rows the display stays lit per frame.
    pub persistence: u16,
    pub lighting_offset: u16,
    pub pixel_settle: u16,
    pub total_rows: u16,
}

impl DisplayReport {
    /// Apply persistence and readback settings, keeping everything else.
    pub fn configure(&mut self, low_persistence: bool, pixel_readback: bool) {
        if low_persistence {
            self.brightness = 255;
            self.persistence = (self.total_rows as u32 * 18 / 100) as u16;
        } else {
            self.brightness = 0;
            self.persistence = self.total_rows;
        }
        self.flags2.set(DisplayFlags::READ_PIXEL, pixel_readback);
        self.flags2.remove(DisplayFlags::DIRECT_PENTILE);
    }
}

impl FeatureReport for DisplayReport {
    const ID: u8 = DISPLAY_REPORT_ID;
    const SIZE: usize = DISPLAY_REPORT_SIZE;

    fn decode(buf: &[u8]) -> Result<Self> {
        check_size::<Self>(buf)?;
        Ok(Self {
            echo: le_u16(buf, 1),
            brightness: buf[3],
            flags1: buf[4],
            flags2: DisplayFlags::from_bits_retain(buf[5]),
            unknown_6: le_u16(buf, 6),
            persistence: le_u16(buf, 8),
            lighting_offset: le_u16(buf, 10),
            pixel_settle: le_u16(buf, 12),
            total_rows: le_u16(buf, 14),
        })
    }

    fn encode(&self, buf: &mut [u8]) {
        put_le_u16(buf, 1, self.echo);
        buf[3] = self.brightness;
        buf[4] = self.flags1;
        buf[5] = self.flags2.bits();
        put_le_u16(buf, 6, self.unknown_6);
        put_le_u16(buf, 8, self.persistence);
        put_le_u16(buf, 10, self.lighting_offset);
        put_le_u16(buf, 12, self.pixel_settle);
        put_le_u16(buf, 14, self.total_rows);
    }
}
