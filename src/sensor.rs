//! Decoder for the streamed sensor message.
//!
//! Without onboard calibration the accelerometer reports in its own frame
//! (+x forward, +y right, +z down). With calibration enabled the device
//! converts to the device-local frame (+x left, +y up, +z forward). The
//! decoder does not care which one is active.

use crate::protocol::*;
use crate::types::{DeviceConfig, ImuSample, SensorMetadata};
use crate::{HmdError, Result};
use std::fmt;

/// At most two samples are ever carried in one message.
pub const MAX_SAMPLES_PER_MESSAGE: usize = 2;

/// A sensor message whose timing did not match the configured cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingAnomaly {
    /// Microseconds since the previous message.
    pub delta_us: i32,
    /// Sample count as declared by the device.
    pub num_samples: u8,
    pub report_interval_us: u32,
}

impl fmt::Display for TimingAnomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "got {} samples after {} µs (expected interval {} µs)",
            self.num_samples, self.delta_us, self.report_interval_us
        )
    }
}

/// A decoded sensor message.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorMessage {
    /// One or two samples, oldest first.
    pub samples: Vec<ImuSample>,
    pub metadata: SensorMetadata,
    pub timestamp_us: u32,
    pub timing: Option<TimingAnomaly>,
}

fn imu_field(buf: &[u8], offset: usize) -> [u8; 8] {
    let mut field = [0u8; 8];
    field.copy_from_slice(&buf[offset..offset + 8]);
    field
}

/// Check the message spacing against the configured report interval.
///
/// `timestamp` wraps roughly every 72 minutes, so the delta is taken
/// modulo 2³².
pub fn check_timing(
    timestamp: u32,
    prior_timestamp: Option<u32>,
    num_samples: u8,
    config: &DeviceConfig,
) -> Option<TimingAnomaly> {
    let prior = prior_timestamp?;
    let delta_us = timestamp.wrapping_sub(prior) as i32;
    let interval = config.report_interval_us as i64;
    let implied_us = num_samples as i64 * config.sample_period_us() as i64;

    let late_or_early = (delta_us as i64) < interval - 1 || (delta_us as i64) > interval + 1;
    if late_or_early || implied_us != interval {
        Some(TimingAnomaly {
            delta_us,
            num_samples,
            report_interval_us: config.report_interval_us,
        })
    } else {
        None
    }
}

/// Decode one streamed sensor message.
///
/// Timing problems are reported in `SensorMessage::timing` and never cause
/// samples to be dropped.
pub fn decode_sensor_message(
    buf: &[u8],
    prior_timestamp: Option<u32>,
    config: &DeviceConfig,
) -> Result<SensorMessage> {
    if buf.len() < SENSOR_MESSAGE_SIZE {
        log::warn!("Short sensor message: {} bytes", buf.len());
        return Err(HmdError::ReportSize {
            id: buf.first().copied().unwrap_or(0),
            expected: SENSOR_MESSAGE_SIZE,
            got: buf.len(),
        });
    }
    if buf[0] != SENSOR_MESSAGE_ID {
        return Err(HmdError::UnexpectedReportId {
            expected: SENSOR_MESSAGE_ID,
            got: buf[0],
        });
    }

    let num_samples = buf[3];
    let temperature = le_i16(buf, 6) as f64 * TEMPERATURE_SCALE;
    let timestamp_us = le_u32(buf, 8);
    let magnetic_field = [
        le_i16(buf, 44) as f64 * MAG_SCALE,
        le_i16(buf, 46) as f64 * MAG_SCALE,
        le_i16(buf, 48) as f64 * MAG_SCALE,
    ];

    let metadata = SensorMetadata {
        num_samples,
        sample_count: le_u16(buf, 4),
        frame_count: le_u16(buf, 50),
        frame_timestamp: le_u32(buf, 52),
        frame_id: buf[56],
        led_pattern_phase: buf[57],
        exposure_count: le_u16(buf, 58),
        exposure_timestamp: le_u16(buf, 60),
    };

    let timing = check_timing(timestamp_us, prior_timestamp, num_samples, config);
    if let Some(anomaly) = timing {
        log::debug!("{}", HmdError::Timing(anomaly));
    }

    let count = if num_samples as usize > MAX_SAMPLES_PER_MESSAGE {
        log::debug!("Clamping {} declared samples to {}", num_samples, MAX_SAMPLES_PER_MESSAGE);
        MAX_SAMPLES_PER_MESSAGE
    } else {
        (num_samples as usize).max(1)
    };

    let samples = (0..count)
        .map(|i| {
            let offset = 12 + 16 * i;
            ImuSample {
                time: timestamp_us as f64 * 1e-6,
                timestamp_us,
                acceleration: unpack_3x21bit(&imu_field(buf, offset)),
                angular_velocity: unpack_3x21bit(&imu_field(buf, offset + 8)),
                magnetic_field,
                temperature,
            }
        })
        .collect();

    Ok(SensorMessage {
        samples,
        metadata,
        timestamp_us,
        timing,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sensor_message;

    fn config() -> DeviceConfig {
        DeviceConfig::new(1000, 500)
    }

    #[test]
    fn test_decode_two_samples() {
        let buf = sensor_message(2, 1_000_000);
        let msg = decode_sensor_message(&buf, None, &config()).unwrap();

        assert_eq!(msg.samples.len(), 2);
        assert_eq!(msg.timestamp_us, 1_000_000);
        assert!(msg.timing.is_none());

        let s = &msg.samples[1];
        assert!((s.acceleration[0] - 0.0002).abs() < 1e-12);
        assert!((s.acceleration[1] + 0.0002).abs() < 1e-12);
        assert!((s.angular_velocity[2] - 0.0001).abs() < 1e-12);
        assert!((s.temperature - 31.25).abs() < 1e-9);
        assert!((s.magnetic_field[0] + 0.25).abs() < 1e-9);
        assert!((s.time - 1.0).abs() < 1e-12);

        assert_eq!(msg.metadata.sample_count, 7);
        assert_eq!(msg.metadata.frame_count, 42);
        assert_eq!(msg.metadata.frame_id, 9);
        assert_eq!(msg.metadata.led_pattern_phase, 4);
    }

    #[test]
    fn test_decode_clamps_sample_count() {
        let buf = sensor_message(3, 5000);
        let msg = decode_sensor_message(&buf, Some(3000), &config()).unwrap();
        assert_eq!(msg.samples.len(), 2);
        assert_eq!(msg.metadata.num_samples, 3);
    }

    #[test]
    fn test_decode_zero_samples_yields_one() {
        let buf = sensor_message(0, 5000);
        let msg = decode_sensor_message(&buf, None, &config()).unwrap();
        assert_eq!(msg.samples.len(), 1);
    }

    #[test]
    fn test_decode_short_buffer() {
        let buf = sensor_message(2, 5000);
        let err = decode_sensor_message(&buf[..40], None, &config()).unwrap_err();
        assert!(matches!(err, HmdError::ReportSize { expected: 64, got: 40, .. }));
    }

    #[test]
    fn test_decode_wrong_id() {
        let mut buf = sensor_message(2, 5000);
        buf[0] = 0x0c;
        assert!(matches!(
            decode_sensor_message(&buf, None, &config()),
            Err(HmdError::UnexpectedReportId { expected: 0x0b, got: 0x0c })
        ));
    }

    #[test]
    fn test_timing_on_schedule() {
        let buf = sensor_message(2, 12_000);
        let msg = decode_sensor_message(&buf, Some(10_000), &config()).unwrap();
        assert!(msg.timing.is_none());
    }

    #[test]
    fn test_timing_late_keeps_samples() {
        let on_time = decode_sensor_message(&sensor_message(2, 12_000), Some(10_000), &config())
            .unwrap();
        let late = decode_sensor_message(&sensor_message(2, 12_050), Some(10_000), &config())
            .unwrap();

        assert_eq!(
            late.timing,
            Some(TimingAnomaly {
                delta_us: 2050,
                num_samples: 2,
                report_interval_us: 2000,
            })
        );
        assert_eq!(late.samples.len(), 2);
        for (a, b) in late.samples.iter().zip(on_time.samples.iter()) {
            assert_eq!(a.acceleration, b.acceleration);
            assert_eq!(a.angular_velocity, b.angular_velocity);
        }
    }

    #[test]
    fn test_timing_sample_count_mismatch() {
        let msg = decode_sensor_message(&sensor_message(1, 12_000), Some(10_000), &config())
            .unwrap();
        assert!(msg.timing.is_some());
    }

    #[test]
    fn test_timing_wraps() {
        let anomaly = check_timing(1500, Some(u32::MAX - 499), 2, &config());
        assert!(anomaly.is_none());
    }
}
