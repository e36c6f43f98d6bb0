//! # EX Value Encoding
//!
//! Turns a stored `i32` into the 1-4 value bytes of an EX value entry, and
//! packs GPS coordinates, dates and times into that `i32` beforehand.
//!
//! ## Layout of numeric types
//!
//! The top value byte carries the sign in bit 7 and the precision in bits 5-6.
//! The remaining bits are the two's-complement low bits of the value:
//!
//! ```text
//! Int6:   [s pp vvvvv]
//! Int14:  [v7..v0] [s pp v12..v8]
//! Int22:  [v7..v0] [v15..v8] [s pp v20..v16]
//! Int30:  [v7..v0] [v15..v8] [v23..v16] [s pp v28..v24]
//! ```
//!
//! Date/time values use three plain bytes and GPS values four plain bytes,
//! both little-endian.

use super::protocol::{DataType, Precision};

const SIGN_BIT: u8 = 0x80;
const TOP_VALUE_MASK: i32 = 0x1F;

/// Bit 5 of the third date/time byte marks a date
const DATE_FLAG: u8 = 0x20;

/// GPS flag byte: longitude (set) or latitude (clear)
const GPS_LONGITUDE: u8 = 0x20;

/// GPS flag byte: west / south
const GPS_NEGATIVE: u8 = 0x40;

/// Encode a stored value into its wire bytes
///
/// Only the first `data_type.payload_len()` bytes of the result are used.
///
/// # Examples
///
/// ```
/// use jetiex_uplink::ex::protocol::{DataType, Precision};
/// use jetiex_uplink::ex::value::encode_value;
///
/// let bytes = encode_value(1234, DataType::Int14, Precision::One);
/// assert_eq!(&bytes[..2], &[0xD2, 0x24]);
/// ```
pub fn encode_value(value: i32, data_type: DataType, precision: Precision) -> [u8; 4] {
    let sign = if value < 0 { SIGN_BIT } else { 0 };
    let top = |shift: u32| ((value >> shift) & TOP_VALUE_MASK) as u8 | sign | precision.bits();

    match data_type {
        DataType::Int6 => [top(0), 0, 0, 0],
        DataType::Int14 => [value as u8, top(8), 0, 0],
        DataType::Int22 => [value as u8, (value >> 8) as u8, top(16), 0],
        DataType::DateTime => [value as u8, (value >> 8) as u8, (value >> 16) as u8 | sign, 0],
        DataType::Int30 => [value as u8, (value >> 8) as u8, (value >> 16) as u8, top(24)],
        DataType::Gps => value.to_le_bytes(),
    }
}

/// Decode wire bytes back into the stored value and its precision
///
/// Returns `None` when `bytes` is shorter than the type's payload.
pub fn decode_value(bytes: &[u8], data_type: DataType) -> Option<(i32, Precision)> {
    let len = data_type.payload_len();
    let bytes = bytes.get(..len)?;

    match data_type {
        DataType::Gps => {
            let raw = i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
            Some((raw, Precision::Zero))
        }
        DataType::DateTime => {
            let fill = if bytes[2] & SIGN_BIT != 0 { 0xFF } else { 0x00 };
            let raw = i32::from_le_bytes([bytes[0], bytes[1], bytes[2], fill]);
            Some((raw, Precision::Zero))
        }
        _ => {
            let top = bytes[len - 1];
            let low_bits = 8 * (len as u32 - 1);
            let width = low_bits + 5;

            let mut raw: i32 = 0;
            for (i, &b) in bytes[..len - 1].iter().enumerate() {
                raw |= (b as i32) << (8 * i);
            }
            raw |= ((top as i32) & TOP_VALUE_MASK) << low_bits;

            if top & SIGN_BIT != 0 {
                raw |= !((1i32 << width) - 1);
            }

            Some((raw, Precision::from_bits(top)))
        }
    }
}

/// A value as handed to the telemetry facade
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SensorValue {
    /// Plain integer (scaled by the sensor's precision on the receiver)
    Plain(i32),
    /// Decimal degrees; negative is west / south
    Gps { degrees: f64, longitude: bool },
    /// Calendar date
    Date { day: u8, month: u8, year: u16 },
    /// Time of day
    Time { hour: u8, minute: u8, second: u8 },
}

impl SensorValue {
    /// The `i32` stored in the sensor state
    pub fn to_raw(self) -> i32 {
        match self {
            Self::Plain(value) => value,
            Self::Gps { degrees, longitude } => pack_gps(degrees, longitude),
            Self::Date { day, month, year } => pack_date(day, month, year),
            Self::Time { hour, minute, second } => pack_time(hour, minute, second),
        }
    }
}

impl From<i32> for SensorValue {
    fn from(value: i32) -> Self {
        Self::Plain(value)
    }
}

/// Pack decimal degrees into the EX GPS layout
///
/// `[minute lo, minute hi, degree lo, degree bit 8 | flags]` where minutes are
/// thousandths of an arc minute.
///
/// # Examples
///
/// ```
/// use jetiex_uplink::ex::value::pack_gps;
///
/// // E 11° 33.369'
/// let raw = pack_gps(11.55616, true);
/// assert_eq!(raw.to_le_bytes(), [0x59, 0x82, 0x0B, 0x20]);
/// ```
pub fn pack_gps(degrees: f64, longitude: bool) -> i32 {
    let whole = degrees.trunc();
    let frac = degrees - whole;
    let deg = whole.abs() as u16;
    let minutes = (frac * 0.6 * 100_000.0).abs() as u16;

    let mut flags = ((deg >> 8) & 0x01) as u8;
    if longitude {
        flags |= GPS_LONGITUDE;
    }
    if degrees < 0.0 {
        flags |= GPS_NEGATIVE;
    }

    i32::from_le_bytes([minutes as u8, (minutes >> 8) as u8, deg as u8, flags])
}

/// Pack a date; years from 2000 on are stored as offset, earlier ones as given
pub fn pack_date(day: u8, month: u8, year: u16) -> i32 {
    let year = if year >= 2000 { year - 2000 } else { year };
    i32::from_le_bytes([year as u8, month, (day & 0x1F) | DATE_FLAG, 0])
}

/// Pack a time of day
pub fn pack_time(hour: u8, minute: u8, second: u8) -> i32 {
    i32::from_le_bytes([second, minute, hour & 0x1F, 0])
}

/// Unpacked GPS value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpsCoordinate {
    pub degrees: u16,
    /// Thousandths of an arc minute
    pub minutes: u16,
    pub longitude: bool,
    /// West or south
    pub negative: bool,
}

impl GpsCoordinate {
    pub fn from_raw(raw: i32) -> Self {
        let b = raw.to_le_bytes();
        Self {
            degrees: u16::from(b[2]) | (u16::from(b[3] & 0x01) << 8),
            minutes: u16::from_le_bytes([b[0], b[1]]),
            longitude: b[3] & GPS_LONGITUDE != 0,
            negative: b[3] & GPS_NEGATIVE != 0,
        }
    }

    pub fn to_decimal_degrees(&self) -> f64 {
        let value = f64::from(self.degrees) + f64::from(self.minutes) / 60_000.0;
        if self.negative {
            -value
        } else {
            value
        }
    }
}

/// Unpacked date/time value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateTimeValue {
    Date { day: u8, month: u8, year: u16 },
    Time { hour: u8, minute: u8, second: u8 },
}

impl DateTimeValue {
    pub fn from_raw(raw: i32) -> Self {
        let b = raw.to_le_bytes();
        if b[2] & DATE_FLAG != 0 {
            Self::Date {
                day: b[2] & 0x1F,
                month: b[1],
                year: 2000 + u16::from(b[0]),
            }
        } else {
            Self::Time {
                hour: b[2] & 0x1F,
                minute: b[1],
                second: b[0],
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRECISIONS: [Precision; 3] = [Precision::Zero, Precision::One, Precision::Two];

    fn round_trip(value: i32, data_type: DataType, precision: Precision) {
        let bytes = encode_value(value, data_type, precision);
        let decoded = decode_value(&bytes[..data_type.payload_len()], data_type);
        assert_eq!(
            decoded,
            Some((value, precision)),
            "{:?} {} {:?} -> {:02X?}",
            data_type,
            value,
            precision,
            bytes
        );
    }

    #[test]
    fn test_int6_full_range() {
        for precision in PRECISIONS {
            for value in -32..=31 {
                round_trip(value, DataType::Int6, precision);
            }
        }
    }

    #[test]
    fn test_int14_full_range() {
        for precision in PRECISIONS {
            for value in -8192..=8191 {
                round_trip(value, DataType::Int14, precision);
            }
        }
    }

    #[test]
    fn test_int22_and_int30_limits() {
        for precision in PRECISIONS {
            for value in [-2_097_152, -2_097_151, -65_536, -1, 0, 1, 255, 65_536, 2_097_151] {
                round_trip(value, DataType::Int22, precision);
            }
            for value in [-536_870_912, -536_870_911, -16_777_216, -1, 0, 1, 16_777_216, 536_870_911] {
                round_trip(value, DataType::Int30, precision);
            }
        }
    }

    #[test]
    fn test_int6_bit_layout() {
        assert_eq!(encode_value(5, DataType::Int6, Precision::Zero)[0], 0x05);
        assert_eq!(encode_value(5, DataType::Int6, Precision::Two)[0], 0x45);
        // sign bit plus two's-complement low bits
        assert_eq!(encode_value(-5, DataType::Int6, Precision::Zero)[0], 0x9B);
        assert_eq!(encode_value(-1, DataType::Int6, Precision::One)[0], 0xBF);
    }

    #[test]
    fn test_int14_bit_layout() {
        assert_eq!(encode_value(1234, DataType::Int14, Precision::One)[..2], [0xD2, 0x24]);
        assert_eq!(encode_value(-1234, DataType::Int14, Precision::Zero)[..2], [0x2E, 0x9B]);
    }

    #[test]
    fn test_int30_bit_layout() {
        let bytes = encode_value(0x0123_4567, DataType::Int30, Precision::Two);
        assert_eq!(bytes, [0x67, 0x45, 0x23, 0x41]);
    }

    #[test]
    fn test_datetime_has_no_precision_bits() {
        let raw = pack_date(18, 7, 2021);
        let bytes = encode_value(raw, DataType::DateTime, Precision::Two);
        assert_eq!(bytes[..3], [0x15, 0x07, 0x32]);
        assert_eq!(decode_value(&bytes, DataType::DateTime), Some((raw, Precision::Zero)));
    }

    #[test]
    fn test_gps_is_raw_little_endian() {
        let raw = 0x6012_3456;
        let bytes = encode_value(raw, DataType::Gps, Precision::Two);
        assert_eq!(bytes, [0x56, 0x34, 0x12, 0x60]);
        assert_eq!(decode_value(&bytes, DataType::Gps), Some((raw, Precision::Zero)));
    }

    #[test]
    fn test_decode_value_too_short() {
        assert_eq!(decode_value(&[0x01], DataType::Int14), None);
        assert_eq!(decode_value(&[], DataType::Int6), None);
    }

    #[test]
    fn test_pack_gps_north_east() {
        let raw = pack_gps(11.55616, true);
        assert_eq!(raw.to_le_bytes(), [0x59, 0x82, 0x0B, 0x20]);

        let gps = GpsCoordinate::from_raw(raw);
        assert_eq!(gps.degrees, 11);
        assert_eq!(gps.minutes, 33_369);
        assert!(gps.longitude);
        assert!(!gps.negative);
        assert!((gps.to_decimal_degrees() - 11.55615).abs() < 0.0001);
    }

    #[test]
    fn test_pack_gps_south_west() {
        let raw = pack_gps(-151.2093, true);
        assert_eq!(raw.to_le_bytes(), [0x0E, 0x31, 0x97, 0x60]);

        let raw = pack_gps(-33.8688, false);
        let gps = GpsCoordinate::from_raw(raw);
        assert_eq!(gps.degrees, 33);
        assert!(!gps.longitude);
        assert!(gps.negative);
        assert_eq!(raw.to_le_bytes()[3], 0x40);
    }

    #[test]
    fn test_pack_gps_degree_high_bit() {
        let raw = pack_gps(300.5, true);
        assert_eq!(raw.to_le_bytes(), [0x30, 0x75, 0x2C, 0x21]);
        assert_eq!(GpsCoordinate::from_raw(raw).degrees, 300);
    }

    #[test]
    fn test_pack_date() {
        let raw = pack_date(18, 7, 2021);
        assert_eq!(raw.to_le_bytes()[..3], [0x15, 0x07, 0x32]);
        assert_eq!(
            DateTimeValue::from_raw(raw),
            DateTimeValue::Date { day: 18, month: 7, year: 2021 }
        );
    }

    #[test]
    fn test_pack_date_before_2000_is_kept() {
        let raw = pack_date(1, 1, 21);
        assert_eq!(raw.to_le_bytes()[0], 21);
    }

    #[test]
    fn test_pack_time() {
        let raw = pack_time(13, 45, 30);
        assert_eq!(raw.to_le_bytes()[..3], [30, 45, 13]);
        assert_eq!(
            DateTimeValue::from_raw(raw),
            DateTimeValue::Time { hour: 13, minute: 45, second: 30 }
        );
    }

    #[test]
    fn test_sensor_value_to_raw() {
        assert_eq!(SensorValue::from(42).to_raw(), 42);
        assert_eq!(
            SensorValue::Time { hour: 1, minute: 2, second: 3 }.to_raw(),
            pack_time(1, 2, 3)
        );
        assert_eq!(
            SensorValue::Gps { degrees: 11.55616, longitude: true }.to_raw(),
            pack_gps(11.55616, true)
        );
    }
}
