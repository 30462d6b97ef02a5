use crate::protocol::MAX_LEDS;
use crate::reports::ConfigFlags;

/// 3-D vector in the device-local frame: +x left, +y up, +z forward.
pub type Vec3 = [f64; 3];

/// Factory calibrated geometry and blink pattern of one IR LED.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Led {
    /// Position in meters.
    pub position: Vec3,
    /// Emission direction, magnitude in unknown units.
    pub direction: Vec3,
    /// 10-bit cyclic blink pattern, bit `i` is frame `i` (1 = bright).
    pub pattern: u16,
}

/// The tracked LED constellation of one HMD.
///
/// Loaded once when the device starts and never modified afterwards. The
/// device owns it; trackers only ever see a `Weak` reference.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LedModel {
    leds: Vec<Led>,
}

impl LedModel {
    pub fn new(leds: Vec<Led>) -> Self {
        debug_assert!(leds.len() <= MAX_LEDS + 1);
        Self { leds }
    }

    /// Number of visible LEDs.
    pub fn len(&self) -> usize {
        self.leds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leds.is_empty()
    }

    pub fn leds(&self) -> &[Led] {
        &self.leds
    }

    pub fn get(&self, index: usize) -> Option<&Led> {
        self.leds.get(index)
    }
}

/// Position of the IMU origin in the device-local frame, in meters.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ImuCalibrationPosition {
    pub position: Vec3,
}

/// One decoded IMU sample.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ImuSample {
    /// Device timestamp in seconds. Wraps together with `timestamp_us`.
    pub time: f64,
    /// Raw device timestamp in microseconds, wraps every ~72 minutes.
    pub timestamp_us: u32,
    /// Acceleration in m/s².
    pub acceleration: Vec3,
    /// Angular velocity in rad/s.
    pub angular_velocity: Vec3,
    /// Magnetic field, 10⁻⁴ scaled wire units (gauss).
    pub magnetic_field: Vec3,
    /// Temperature in °C.
    pub temperature: f64,
}

/// Frame and exposure bookkeeping carried by every sensor message.
///
/// Not interpreted here; passed through to the tracker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SensorMetadata {
    /// Sample count as declared by the device, before clamping.
    pub num_samples: u8,
    pub sample_count: u16,
    /// HDMI input frame count.
    pub frame_count: u16,
    /// HDMI vsync timestamp.
    pub frame_timestamp: u32,
    /// Frame id from pixel readback.
    pub frame_id: u8,
    pub led_pattern_phase: u8,
    pub exposure_count: u16,
    pub exposure_timestamp: u16,
}

/// Negotiated sensor rates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceConfig {
    /// Internal IMU sample rate in Hz.
    pub sample_rate: u16,
    /// Streamed sensor message rate in Hz.
    pub report_rate: u16,
    /// Microseconds between sensor messages.
    pub report_interval_us: u32,
    pub flags: ConfigFlags,
}

impl DeviceConfig {
    pub fn new(sample_rate: u16, report_rate: u16) -> Self {
        let report_rate = report_rate.max(1);
        Self {
            sample_rate,
            report_rate,
            report_interval_us: 1_000_000 / report_rate as u32,
            flags: ConfigFlags::empty(),
        }
    }

    /// Rates of a device that sends one message every `packet_interval + 1`
    /// samples. The interval is exact even when the rate is not a whole
    /// number of Hz.
    pub fn from_packet_interval(sample_rate: u16, packet_interval: u8) -> Self {
        let samples = packet_interval as u32 + 1;
        let mut config = Self::new(sample_rate, (sample_rate as u32 / samples) as u16);
        config.report_interval_us = samples * config.sample_period_us();
        config
    }

    pub fn with_flags(mut self, flags: ConfigFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Microseconds between two IMU samples.
    pub fn sample_period_us(&self) -> u32 {
        1_000_000 / self.sample_rate.max(1) as u32
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self::new(1000, 1000)
    }
}

/// The kind of hardware a driver talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    Hmd,
    Camera,
}

/// Lifecycle of a single device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    Closed,
    Configuring,
    Streaming,
    Stopped,
}
