use crate::{HmdError, Result};

// -- USB identifiers --
pub const VID_OCULUSVR: u16 = 0x2833;
pub const PID_RIFT_DK2: u16 = 0x0021;
pub const PID_CAMERA_DK2: u16 = 0x0201;

// -- Report ids --
pub const CONFIG_REPORT_ID: u8 = 0x02;
pub const SENSOR_MESSAGE_ID: u8 = 0x0b;
pub const TRACKING_REPORT_ID: u8 = 0x0c;
pub const DISPLAY_REPORT_ID: u8 = 0x0d;
pub const POSITION_REPORT_ID: u8 = 0x0f;
pub const LED_PATTERN_REPORT_ID: u8 = 0x10;
pub const KEEPALIVE_REPORT_ID: u8 = 0x11;

// -- Report geometry --
pub const CONFIG_REPORT_SIZE: usize = 7;
pub const POSITION_REPORT_SIZE: usize = 30;
pub const LED_PATTERN_REPORT_SIZE: usize = 12;
pub const KEEPALIVE_REPORT_SIZE: usize = 6;
pub const TRACKING_REPORT_SIZE: usize = 13;
pub const DISPLAY_REPORT_SIZE: usize = 16;
pub const SENSOR_MESSAGE_SIZE: usize = 64;

// -- Keepalive --
pub const KEEPALIVE_TYPE: u8 = 0x0b;
pub const KEEPALIVE_TIMEOUT_MS: u16 = 10000;

// -- Tracking LED timing --
pub const TRACKING_EXPOSURE_US: u16 = 350;
pub const TRACKING_PERIOD_US: u16 = 16666;
pub const TRACKING_VSYNC_OFFSET: u16 = 0;
pub const TRACKING_DUTY_CYCLE: u8 = 0x7f;

// -- Calibration tables --
pub const MAX_LEDS: usize = 40;
/// LED entries plus the single IMU entry.
pub const MAX_POSITIONS: usize = MAX_LEDS + 1;
pub const LED_PATTERN_LENGTH: u8 = 10;

// -- Report rate limits (Hz) --
pub const MIN_REPORT_RATE: u16 = 5;

/// Scale for the packed accelerometer and gyroscope fields: 10⁻⁴ m/s², 10⁻⁴ rad/s.
pub const IMU_SCALE: f64 = 1e-4;
/// Scale for the magnetometer: 10⁻⁴ gauss.
pub const MAG_SCALE: f64 = 1e-4;
/// Scale for the temperature: 10⁻² °C.
pub const TEMPERATURE_SCALE: f64 = 1e-2;
/// Scale for calibrated positions and directions (µm).
pub const POSITION_SCALE: f64 = 1e-6;

/// Read a little-endian u16 at `offset`.
pub(crate) fn le_u16(data: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([data[offset], data[offset + 1]])
}

pub(crate) fn le_i16(data: &[u8], offset: usize) -> i16 {
    i16::from_le_bytes([data[offset], data[offset + 1]])
}

pub(crate) fn le_u32(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}

pub(crate) fn le_i32(data: &[u8], offset: usize) -> i32 {
    le_u32(data, offset) as i32
}

pub(crate) fn put_le_u16(data: &mut [u8], offset: usize, value: u16) {
    data[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
}

pub(crate) fn put_le_u32(data: &mut [u8], offset: usize, value: u32) {
    data[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

/// Unpack three big-endian signed 21-bit values packed into 8 bytes.
///
/// Layout: x in bits 63..43, y in bits 42..22, z in bits 21..1, bit 0 unused.
/// Each field is sign-extended on its own.
pub fn unpack_3x21bit_raw(buf: &[u8; 8]) -> [i32; 3] {
    let xy = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]);
    let yz = u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]);

    let x = (xy as i32) >> 11;
    let y = (((xy << 21) | (yz >> 11)) as i32) >> 11;
    let z = ((yz << 10) as i32) >> 11;
    [x, y, z]
}

/// Unpack three packed 21-bit values and scale them by 10⁻⁴.
pub fn unpack_3x21bit(buf: &[u8; 8]) -> [f64; 3] {
    let [x, y, z] = unpack_3x21bit_raw(buf);
    [
        x as f64 * IMU_SCALE,
        y as f64 * IMU_SCALE,
        z as f64 * IMU_SCALE,
    ]
}

/// Decode a blink pattern of ten 2-bit symbols into a 10-bit value.
///
/// Each symbol must be 1 (dark) or 3 (bright). Symbol `i` occupies bits
/// `2i..2i+1` of the wire field and becomes bit `i` of the result.
pub fn decode_led_pattern(raw: u32) -> Result<u16> {
    if raw >> (2 * LED_PATTERN_LENGTH as u32) != 0 {
        return Err(HmdError::InvalidPattern(raw));
    }

    let mut pattern = 0u16;
    for i in 0..LED_PATTERN_LENGTH as u32 {
        match (raw >> (2 * i)) & 0b11 {
            0b01 => {}
            0b11 => pattern |= 1 << i,
            _ => return Err(HmdError::InvalidPattern(raw)),
        }
    }
    Ok(pattern)
}

/// Calibrated position component, µm on the wire.
pub fn unpack_position(raw: i32) -> f64 {
    raw as f64 * POSITION_SCALE
}

/// Calibrated direction component, magnitude in unknown units.
pub fn unpack_direction(raw: i16) -> f64 {
    raw as f64 * POSITION_SCALE
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::pack_3x21bit;

    #[test]
    fn test_unpack_3x21bit_round_trip() {
        let cases = [
            [0, 0, 0],
            [1, -1, 2],
            [98066, -12, 5],
            [(1 << 20) - 1, -(1 << 20), 0x5a5a],
            [-(1 << 20), (1 << 20) - 1, -1],
        ];
        for v in cases {
            assert_eq!(unpack_3x21bit_raw(&pack_3x21bit(v)), v, "case {:?}", v);
        }
    }

    #[test]
    fn test_unpack_3x21bit_scale() {
        let v = unpack_3x21bit(&pack_3x21bit([98066, -10000, 0]));
        assert!((v[0] - 9.8066).abs() < 1e-9);
        assert!((v[1] + 1.0).abs() < 1e-9);
        assert_eq!(v[2], 0.0);

        // Re-quantising the scaled values recovers the wire fields.
        let back = v.map(|c| (c / IMU_SCALE).round() as i32);
        assert_eq!(back, [98066, -10000, 0]);
    }

    #[test]
    fn test_unpack_3x21bit_ignores_bit_zero() {
        let mut buf = pack_3x21bit([3, -3, 7]);
        buf[7] |= 1;
        assert_eq!(unpack_3x21bit_raw(&buf), [3, -3, 7]);
    }

    #[test]
    fn test_decode_led_pattern_extremes() {
        assert_eq!(decode_led_pattern(0xfffff).unwrap(), 0x3ff);
        assert_eq!(decode_led_pattern(0x55555).unwrap(), 0x000);
    }

    #[test]
    fn test_decode_led_pattern_order() {
        // Only symbol 0 bright.
        assert_eq!(decode_led_pattern(0x55557).unwrap(), 0x001);
        // Only symbol 9 bright.
        assert_eq!(decode_led_pattern(0xd5555).unwrap(), 0x200);
        // Symbols 1, 4 and 8 bright.
        let raw = 0x55555 | (0b10 << 2) | (0b10 << 8) | (0b10 << 16);
        assert_eq!(decode_led_pattern(raw).unwrap(), 0b1_0001_0010);
    }

    #[test]
    fn test_decode_led_pattern_rejects_invalid_symbols() {
        // Symbol 3 is 00.
        assert!(matches!(
            decode_led_pattern(0x55515),
            Err(HmdError::InvalidPattern(0x55515))
        ));
        // Symbol 0 is 10.
        assert!(decode_led_pattern(0x55556).is_err());
        // Bits above the ten symbols.
        assert!(decode_led_pattern(0x155555).is_err());
        assert!(decode_led_pattern(0).is_err());
    }

    #[test]
    fn test_unpack_position_and_direction() {
        assert!((unpack_position(-45_000) + 0.045).abs() < 1e-12);
        assert!((unpack_direction(-1000) + 0.001).abs() < 1e-12);
        assert!((unpack_direction(i16::MAX) - 0.032767).abs() < 1e-12);
    }
}
