//! Factory calibration readback.
//!
//! The position and pattern tables are read through a device-side cursor:
//! every read of the report returns the next entry, and after the last
//! entry the cursor wraps to the first one again. The first report tells
//! how many entries there are, so each table is read exactly `num` times.

use crate::hid::{get_feature_report, Transport};
use crate::protocol::{
    decode_led_pattern, unpack_direction, unpack_position, LED_PATTERN_LENGTH, MAX_LEDS,
    MAX_POSITIONS,
};
use crate::reports::{LedPatternReport, PositionReport};
use crate::types::{ImuCalibrationPosition, Led, LedModel, Vec3};
use crate::{HmdError, Result};
use std::collections::BTreeMap;

/// LED geometry and IMU origin as read from the position table.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionTable {
    /// LED positions and directions, indexed like the device table.
    pub leds: Vec<Led>,
    pub imu: ImuCalibrationPosition,
    /// Number of visible LEDs: one table slot holds the IMU.
    pub led_count: usize,
}

fn unpack_vec3_position(raw: [i32; 3]) -> Vec3 {
    raw.map(unpack_position)
}

fn unpack_vec3_direction(raw: [i16; 3]) -> Vec3 {
    raw.map(unpack_direction)
}

/// Read the factory calibrated LED and IMU positions.
pub fn load_positions(transport: &dyn Transport) -> Result<PositionTable> {
    let mut report: PositionReport = get_feature_report(transport)?;

    let num = report.num;
    if num as usize > MAX_POSITIONS {
        return Err(HmdError::TooManyEntries {
            num,
            max: MAX_POSITIONS,
        });
    }

    let mut leds = vec![Led::default(); num as usize];
    let mut imu = ImuCalibrationPosition::default();

    for i in 0..num {
        if i > 0 {
            report = get_feature_report(transport)?;
        }
        if report.index >= num {
            return Err(HmdError::IndexOutOfRange {
                index: report.index,
                num,
            });
        }

        let position = unpack_vec3_position(report.pos);
        match report.kind {
            PositionReport::KIND_LED => {
                let led = &mut leds[report.index as usize];
                led.position = position;
                led.direction = unpack_vec3_direction(report.dir);
            }
            PositionReport::KIND_IMU => imu.position = position,
            other => log::debug!(
                "Ignoring position entry {} of unknown type {}",
                report.index,
                other
            ),
        }
    }

    let led_count = (num as usize).saturating_sub(1);
    leds.truncate(led_count);

    Ok(PositionTable {
        leds,
        imu,
        led_count,
    })
}

/// Read the blink pattern table, keyed by LED index.
pub fn load_led_patterns(transport: &dyn Transport) -> Result<BTreeMap<u16, u16>> {
    let mut report: LedPatternReport = get_feature_report(transport)?;

    let num = report.num;
    if num as usize > MAX_LEDS {
        return Err(HmdError::TooManyEntries { num, max: MAX_LEDS });
    }

    let mut patterns = BTreeMap::new();
    for i in 0..num {
        if i > 0 {
            report = get_feature_report(transport)?;
        }
        if report.index >= num {
            return Err(HmdError::IndexOutOfRange {
                index: report.index,
                num,
            });
        }
        if report.pattern_length != LED_PATTERN_LENGTH {
            log::warn!("Unexpected LED pattern length: {}", report.pattern_length);
            return Err(HmdError::PatternLength(report.pattern_length));
        }

        let pattern = decode_led_pattern(report.pattern).inspect_err(|_| {
            log::warn!("Unexpected LED pattern: 0x{:x}", report.pattern);
        })?;
        patterns.insert(report.index, pattern);
    }

    Ok(patterns)
}

/// Read positions and patterns and combine them into the LED model.
pub fn load_led_model(transport: &dyn Transport) -> Result<(LedModel, ImuCalibrationPosition)> {
    let table = load_positions(transport).inspect_err(|e| {
        log::warn!("Error reading factory calibrated positions: {}", e);
    })?;
    let patterns = load_led_patterns(transport).inspect_err(|e| {
        log::warn!("Error reading IR LED blinking patterns: {}", e);
    })?;

    let mut leds = table.leds;
    for (index, led) in leds.iter_mut().enumerate() {
        if let Some(&pattern) = patterns.get(&(index as u16)) {
            led.pattern = pattern;
        }
    }

    if table.led_count != MAX_LEDS {
        log::info!("Device reports {} IR LEDs", table.led_count);
    }

    Ok((LedModel::new(leds), table.imu))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reports::FeatureReport;
    use crate::testing::MockTransport;

    fn led_entry(index: u16, num: u16) -> Vec<u8> {
        PositionReport {
            pos: [index as i32 * 1000, -20_000, 70_000],
            dir: [0, 0, 1000],
            index,
            num,
            kind: PositionReport::KIND_LED,
            ..Default::default()
        }
        .to_bytes()
    }

    fn imu_entry(index: u16, num: u16) -> Vec<u8> {
        PositionReport {
            pos: [-4_000, 5_000, 6_000],
            index,
            num,
            kind: PositionReport::KIND_IMU,
            ..Default::default()
        }
        .to_bytes()
    }

    fn pattern_entry(index: u16, num: u16, pattern: u32) -> Vec<u8> {
        LedPatternReport {
            pattern_length: 10,
            pattern,
            index,
            num,
            ..Default::default()
        }
        .to_bytes()
    }

    fn script_positions(mock: &MockTransport, num: u16) {
        for i in 0..num - 1 {
            mock.push_feature(led_entry(i, num));
        }
        mock.push_feature(imu_entry(num - 1, num));
        // What the device would return after wrapping around.
        mock.push_feature(led_entry(0, num));
    }

    #[test]
    fn test_load_positions_reads_exactly_num() {
        let mock = MockTransport::new();
        script_positions(&mock, 5);

        let table = load_positions(&mock).unwrap();
        assert_eq!(mock.feature_requests().len(), 5);
        assert_eq!(table.led_count, 4);
        assert_eq!(table.leds.len(), 4);
        assert!((table.leds[3].position[0] - 0.003).abs() < 1e-12);
        assert!((table.leds[0].direction[2] - 0.001).abs() < 1e-12);
        assert!((table.imu.position[0] + 0.004).abs() < 1e-12);
        assert!((table.imu.position[2] - 0.006).abs() < 1e-12);
    }

    #[test]
    fn test_load_positions_index_out_of_range() {
        let mock = MockTransport::new();
        mock.push_feature(led_entry(0, 3));
        mock.push_feature(led_entry(3, 3));
        mock.push_feature(imu_entry(2, 3));

        let err = load_positions(&mock).unwrap_err();
        assert!(matches!(err, HmdError::IndexOutOfRange { index: 3, num: 3 }));
        assert_eq!(mock.feature_requests().len(), 2);
    }

    #[test]
    fn test_load_positions_too_many() {
        let mock = MockTransport::new();
        mock.push_feature(led_entry(0, 42));

        let err = load_positions(&mock).unwrap_err();
        assert!(matches!(err, HmdError::TooManyEntries { num: 42, max: 41 }));
    }

    #[test]
    fn test_load_positions_full_table() {
        let mock = MockTransport::new();
        script_positions(&mock, 41);

        let table = load_positions(&mock).unwrap();
        assert_eq!(table.led_count, 40);
        assert_eq!(mock.feature_requests().len(), 41);
    }

    #[test]
    fn test_load_positions_short_report() {
        let mock = MockTransport::new();
        let mut buf = led_entry(0, 3);
        buf.truncate(20);
        mock.push_feature(buf);

        assert!(matches!(
            load_positions(&mock),
            Err(HmdError::ReportSize { expected: 30, got: 20, .. })
        ));
    }

    #[test]
    fn test_load_led_patterns() {
        let mock = MockTransport::new();
        mock.push_feature(pattern_entry(1, 3, 0xfffff));
        mock.push_feature(pattern_entry(2, 3, 0x55557));
        mock.push_feature(pattern_entry(0, 3, 0x55555));

        let patterns = load_led_patterns(&mock).unwrap();
        assert_eq!(mock.feature_requests().len(), 3);
        assert_eq!(patterns.get(&0), Some(&0x000));
        assert_eq!(patterns.get(&1), Some(&0x3ff));
        assert_eq!(patterns.get(&2), Some(&0x001));
    }

    #[test]
    fn test_load_led_patterns_rejects_length() {
        let mock = MockTransport::new();
        let mut buf = pattern_entry(0, 2, 0x55555);
        buf[3] = 9;
        mock.push_feature(buf);

        assert!(matches!(
            load_led_patterns(&mock),
            Err(HmdError::PatternLength(9))
        ));
    }

    #[test]
    fn test_load_led_patterns_rejects_symbol() {
        let mock = MockTransport::new();
        mock.push_feature(pattern_entry(0, 2, 0x55555));
        mock.push_feature(pattern_entry(1, 2, 0x55554));

        assert!(matches!(
            load_led_patterns(&mock),
            Err(HmdError::InvalidPattern(0x55554))
        ));
    }

    #[test]
    fn test_load_led_model_combines_tables() {
        let mock = MockTransport::new();
        script_positions(&mock, 3);
        mock.push_feature(pattern_entry(0, 2, 0xfffff));
        mock.push_feature(pattern_entry(1, 2, 0x55557));

        let (model, imu) = load_led_model(&mock).unwrap();
        assert_eq!(model.len(), 2);
        assert_eq!(model.get(0).unwrap().pattern, 0x3ff);
        assert_eq!(model.get(1).unwrap().pattern, 0x001);
        assert!((model.get(1).unwrap().position[0] - 0.001).abs() < 1e-12);
        assert!((imu.position[1] - 0.005).abs() < 1e-12);
    }
}
