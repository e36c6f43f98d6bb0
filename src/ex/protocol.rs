//! # EX Protocol Constants and Types
//!
//! Core protocol definitions for Jeti EX telemetry and the Jetibox side channel.

use serde::Serialize;

/// EX frame start byte (sent with the ninth bit clear)
pub const EX_FRAME_START: u8 = 0x7E;

/// EX frame separator (second header byte)
pub const EX_SEPARATOR: u8 = 0x2F;

/// Packet type flag in header byte 2: text (name / dictionary)
pub const EX_PACKET_TEXT: u8 = 0x00;

/// Packet type flag in header byte 2: data (values)
pub const EX_PACKET_DATA: u8 = 0x40;

/// Mask of the length bits in header byte 2
pub const EX_LENGTH_MASK: u8 = 0x3F;

/// Manufacturer id 0xA409 (Jeti range for third-party sensors is 0xA400-0xA41F)
pub const MANUFACTURER_ID: u16 = 0xA409;

/// Default device id, adapt it when several sensor devices share one receiver
pub const DEFAULT_DEVICE_ID: u16 = 0x3276;

/// Header length: start, separator, length/type, manufacturer(2), device(2), reserved
pub const EX_HEADER_LEN: usize = 8;

/// Size of the EX frame buffer, no frame is ever longer
pub const EX_MAX_FRAME_LEN: usize = 32;

/// Value frames carry at most 29 bytes including the CRC
pub const EX_MAX_BYTES_PER_FRAME: usize = 29;

/// Maximum number of sensors in one catalog
pub const MAX_SENSORS: usize = 32;

/// Maximum length of label plus unit in a dictionary entry
pub const MAX_LABEL_LEN: usize = 19;

/// Maximum unit length
pub const MAX_UNIT_LEN: usize = 6;

/// Maximum device name length
pub const MAX_NAME_LEN: usize = 19;

/// Ids above this value need the two byte id form in value frames
pub const MAX_SHORT_ID: u8 = 15;

/// Jetibox text frame start byte
pub const TEXT_FRAME_START: u8 = 0xFE;

/// Jetibox text frame end byte
pub const TEXT_FRAME_END: u8 = 0xFF;

/// Characters per Jetibox display line
pub const TEXT_LINE_LEN: usize = 16;

/// Jetibox text payload size (two lines)
pub const TEXT_PAYLOAD_LEN: usize = 2 * TEXT_LINE_LEN;

/// Complete Jetibox text frame size
pub const TEXT_FRAME_LEN: usize = TEXT_PAYLOAD_LEN + 2;

/// Alarm frame length byte
pub const ALARM_LENGTH: u8 = 0x02;

/// Alarm type byte ("vario" alarm without sound)
pub const ALARM_TYPE: u8 = 0x22;

/// Alarm sound flag, or-ed into the alarm type byte
pub const ALARM_SOUND: u8 = 0x01;

/// Jetibox navigation exit sequence
pub const EXIT_FRAME: [u8; 3] = [EX_FRAME_START, 0x91, 0x31];

/// Transmission priorities (cycle divisors): 1 = every value cycle
pub mod priority {
    /// Sent with every value cycle
    pub const ULTRA_HIGH: u8 = 1;
    /// Every third cycle
    pub const HIGH: u8 = 3;
    /// Every fifth cycle
    pub const STANDARD: u8 = 5;
    /// Every tenth cycle
    pub const LOW: u8 = 10;
    /// Every fifteenth cycle
    pub const ULTRA_LOW: u8 = 15;
}

/// One 9-bit UART word: a data byte and the marker carried in the ninth bit
///
/// Frame start and end bytes go out with the marker clear, all other bytes
/// with the marker set, which lets the receiver resynchronize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Word {
    pub data: u8,
    pub ninth_bit: bool,
}

impl Word {
    pub const fn new(data: u8, ninth_bit: bool) -> Self {
        Self { data, ninth_bit }
    }

    /// Pack into the low 9 bits of a `u16`
    pub const fn to_bits(self) -> u16 {
        self.data as u16 | if self.ninth_bit { 0x100 } else { 0 }
    }

    /// Unpack from the low 9 bits of a `u16`
    pub const fn from_bits(bits: u16) -> Self {
        Self {
            data: (bits & 0xFF) as u8,
            ninth_bit: bits & 0x100 != 0,
        }
    }
}

/// EX numeric encodings with their wire type codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum DataType {
    /// 6 bit signed (-31..31)
    Int6 = 0,
    /// 14 bit signed (-8191..8191)
    Int14 = 1,
    /// 22 bit signed (-2097151..2097151)
    Int22 = 4,
    /// Date or time, pre-packed by the caller
    DateTime = 5,
    /// 30 bit signed (-536870911..536870911)
    Int30 = 8,
    /// GPS coordinate, pre-packed by the caller
    Gps = 9,
}

impl DataType {
    /// Wire type code (low nibble of the entry id byte)
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Look up a type by its wire code
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Int6),
            1 => Some(Self::Int14),
            4 => Some(Self::Int22),
            5 => Some(Self::DateTime),
            8 => Some(Self::Int30),
            9 => Some(Self::Gps),
            _ => None,
        }
    }

    /// Number of value bytes on the wire
    pub const fn payload_len(self) -> usize {
        match self {
            Self::Int6 => 1,
            Self::Int14 => 2,
            Self::Int22 | Self::DateTime => 3,
            Self::Int30 | Self::Gps => 4,
        }
    }

    /// Whether the top value byte carries sign and precision bits
    pub const fn is_numeric(self) -> bool {
        !matches!(self, Self::DateTime | Self::Gps)
    }

    /// Display name used in logs and capture records
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Int6 => "int6",
            Self::Int14 => "int14",
            Self::Int22 => "int22",
            Self::DateTime => "datetime",
            Self::Int30 => "int30",
            Self::Gps => "gps",
        }
    }
}

/// Number of decimal places shown by the receiver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum Precision {
    #[default]
    Zero,
    One,
    Two,
}

impl Precision {
    /// Precision bits (5-6) of the top value byte
    pub const fn bits(self) -> u8 {
        match self {
            Self::Zero => 0x00,
            Self::One => 0x20,
            Self::Two => 0x40,
        }
    }

    /// Decode precision bits; the unused pattern `0x60` reads as two decimals
    pub const fn from_bits(byte: u8) -> Self {
        match byte & 0x60 {
            0x00 => Self::Zero,
            0x20 => Self::One,
            _ => Self::Two,
        }
    }

    /// Decimal places, more than two are clamped
    pub const fn from_decimals(decimals: u8) -> Self {
        match decimals {
            0 => Self::Zero,
            1 => Self::One,
            _ => Self::Two,
        }
    }

    pub const fn decimals(self) -> u8 {
        match self {
            Self::Zero => 0,
            Self::One => 1,
            Self::Two => 2,
        }
    }
}

/// Constant sensor definition, supplied once as a `'static` table
///
/// A table may be terminated by [`SensorDefinition::END`]; scanning stops at
/// the first entry with id 0.
///
/// # Examples
///
/// ```
/// use jetiex_uplink::ex::protocol::{DataType, Precision, SensorDefinition};
///
/// static SENSORS: [SensorDefinition; 2] = [
///     SensorDefinition::new(1, "Voltage", "V", DataType::Int14, Precision::One),
///     SensorDefinition::END,
/// ];
/// assert_eq!(SENSORS[0].id, 1);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorDefinition {
    pub id: u8,
    pub label: &'static str,
    pub unit: &'static str,
    pub data_type: DataType,
    pub precision: Precision,
}

impl SensorDefinition {
    /// End-of-catalog sentinel
    pub const END: Self = Self::new(0, "", "", DataType::Int6, Precision::Zero);

    pub const fn new(
        id: u8,
        label: &'static str,
        unit: &'static str,
        data_type: DataType,
        precision: Precision,
    ) -> Self {
        Self {
            id,
            label,
            unit,
            data_type,
            precision,
        }
    }

    pub const fn is_end(&self) -> bool {
        self.id == 0
    }

    /// Bytes of one value entry, id byte(s) included
    pub const fn entry_len(&self) -> usize {
        let id_len = if self.id > MAX_SHORT_ID { 2 } else { 1 };
        id_len + self.data_type.payload_len()
    }

    /// Label and unit as sent in the dictionary
    ///
    /// The combined text is limited to [`MAX_LABEL_LEN`] bytes; the label is
    /// kept first and the unit gets what is left. Returns the combined bytes
    /// with the label and unit lengths.
    pub fn dictionary_label(&self) -> (heapless::Vec<u8, MAX_LABEL_LEN>, u8, u8) {
        let mut bytes = heapless::Vec::new();
        let mut label_len = 0u8;
        let mut unit_len = 0u8;

        for &b in self.label.as_bytes() {
            if bytes.push(b).is_err() {
                break;
            }
            label_len += 1;
        }
        for &b in self.unit.as_bytes().iter().take(MAX_UNIT_LEN) {
            if bytes.push(b).is_err() {
                break;
            }
            unit_len += 1;
        }

        (bytes, label_len, unit_len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_constants() {
        assert_eq!(EX_FRAME_START, 0x7E);
        assert_eq!(EX_SEPARATOR, 0x2F);
        assert_eq!(MANUFACTURER_ID, 0xA409);
        assert_eq!(DEFAULT_DEVICE_ID, 0x3276);
        assert_eq!(TEXT_FRAME_LEN, 34);
        assert!(EX_MAX_BYTES_PER_FRAME <= EX_MAX_FRAME_LEN);
    }

    #[test]
    fn test_data_type_codes() {
        for dt in [
            DataType::Int6,
            DataType::Int14,
            DataType::Int22,
            DataType::DateTime,
            DataType::Int30,
            DataType::Gps,
        ] {
            assert_eq!(DataType::from_code(dt.code()), Some(dt));
        }
        assert_eq!(DataType::from_code(2), None);
        assert_eq!(DataType::from_code(0x0F), None);
    }

    #[test]
    fn test_payload_lengths() {
        assert_eq!(DataType::Int6.payload_len(), 1);
        assert_eq!(DataType::Int14.payload_len(), 2);
        assert_eq!(DataType::Int22.payload_len(), 3);
        assert_eq!(DataType::DateTime.payload_len(), 3);
        assert_eq!(DataType::Int30.payload_len(), 4);
        assert_eq!(DataType::Gps.payload_len(), 4);
    }

    #[test]
    fn test_precision_bits() {
        assert_eq!(Precision::Zero.bits(), 0x00);
        assert_eq!(Precision::One.bits(), 0x20);
        assert_eq!(Precision::Two.bits(), 0x40);
        assert_eq!(Precision::from_bits(0xA5), Precision::One);
        assert_eq!(Precision::from_decimals(7), Precision::Two);
    }

    #[test]
    fn test_word_bits() {
        let word = Word::new(0xAB, true);
        assert_eq!(word.to_bits(), 0x1AB);
        assert_eq!(Word::from_bits(0x1AB), word);
        assert_eq!(Word::from_bits(0x07E), Word::new(0x7E, false));
    }

    #[test]
    fn test_entry_len_with_extended_id() {
        let short = SensorDefinition::new(15, "A", "", DataType::Int14, Precision::Zero);
        let long = SensorDefinition::new(16, "A", "", DataType::Int14, Precision::Zero);
        assert_eq!(short.entry_len(), 3);
        assert_eq!(long.entry_len(), 4);
    }

    #[test]
    fn test_dictionary_label_truncation() {
        let def = SensorDefinition::new(
            1,
            "A very long label!!",
            "km/h",
            DataType::Int14,
            Precision::Zero,
        );
        let (bytes, label_len, unit_len) = def.dictionary_label();
        assert_eq!(bytes.len(), MAX_LABEL_LEN);
        assert_eq!(label_len, 19);
        assert_eq!(unit_len, 0);

        let def = SensorDefinition::new(2, "Speed", "km/h", DataType::Int14, Precision::Zero);
        let (bytes, label_len, unit_len) = def.dictionary_label();
        assert_eq!(&bytes[..], b"Speedkm/h");
        assert_eq!((label_len, unit_len), (5, 4));
    }

    #[test]
    fn test_end_sentinel() {
        assert!(SensorDefinition::END.is_end());
    }
}
