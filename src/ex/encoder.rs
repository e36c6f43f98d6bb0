//! # EX Frame Encoder
//!
//! Builds name, dictionary and value frames from a [`SensorCatalog`], plus the
//! short alarm and exit sequences.
//!
//! ## EX frame layout
//!
//! ```text
//! 0x7E 0x2F [type|len] 0x09 0xA4 [dev lo] [dev hi] 0x00 [payload...] [crc]
//! ```
//!
//! `len` is the CRC index minus two; the CRC covers bytes 2 up to the CRC index.

use heapless::Vec;

use super::catalog::SensorCatalog;
use super::crc::frame_crc;
use super::protocol::*;
use super::value::encode_value;

/// One assembled EX frame, CRC included
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct ExFrame {
    bytes: [u8; EX_MAX_FRAME_LEN],
    len: usize,
}

impl ExFrame {
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether header byte 2 marks a data (value) frame
    pub fn is_data(&self) -> bool {
        self.bytes[2] & EX_PACKET_DATA != 0
    }

    /// Wire words: the start byte with the ninth bit clear, everything else set
    pub fn words(&self) -> impl Iterator<Item = Word> + '_ {
        self.as_bytes()
            .iter()
            .enumerate()
            .map(|(i, &b)| Word::new(b, i != 0))
    }
}

impl std::fmt::Debug for ExFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ExFrame({:02X?})", self.as_bytes())
    }
}

/// Position of the value round-robin
///
/// `cycle` starts at 1 and advances each time `index` wraps; a sensor with
/// priority `p` is sent in cycles divisible by `p`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValueCursor {
    pub index: usize,
    pub cycle: u32,
}

impl Default for ValueCursor {
    fn default() -> Self {
        Self { index: 0, cycle: 1 }
    }
}

/// Incremental payload writer on top of the fixed frame buffer
struct FrameWriter {
    bytes: [u8; EX_MAX_FRAME_LEN],
    len: usize,
}

impl FrameWriter {
    fn new() -> Self {
        Self {
            bytes: [0; EX_MAX_FRAME_LEN],
            len: EX_HEADER_LEN,
        }
    }

    fn push(&mut self, byte: u8) {
        self.bytes[self.len] = byte;
        self.len += 1;
    }

    fn extend(&mut self, data: &[u8]) {
        self.bytes[self.len..self.len + data.len()].copy_from_slice(data);
        self.len += data.len();
    }

    fn finish(mut self, packet_type: u8, device_id: u16) -> ExFrame {
        let crc_index = self.len;
        let [manufacturer_lo, manufacturer_hi] = MANUFACTURER_ID.to_le_bytes();
        let [device_lo, device_hi] = device_id.to_le_bytes();

        self.bytes[..EX_HEADER_LEN].copy_from_slice(&[
            EX_FRAME_START,
            EX_SEPARATOR,
            packet_type | ((crc_index - 2) as u8 & EX_LENGTH_MASK),
            manufacturer_lo,
            manufacturer_hi,
            device_lo,
            device_hi,
            0x00,
        ]);
        self.bytes[crc_index] = frame_crc(&self.bytes[..crc_index]);

        ExFrame {
            bytes: self.bytes,
            len: crc_index + 1,
        }
    }
}

/// Builds EX frames for one device
#[derive(Debug, Clone)]
pub struct FrameBuilder {
    device_id: u16,
    name: Vec<u8, MAX_NAME_LEN>,
}

impl FrameBuilder {
    /// Create a builder announcing `name`, truncated to [`MAX_NAME_LEN`] bytes
    pub fn new(name: &str) -> Self {
        let name = name.as_bytes().iter().copied().take(MAX_NAME_LEN).collect();
        Self {
            device_id: DEFAULT_DEVICE_ID,
            name,
        }
    }

    pub fn name(&self) -> &[u8] {
        &self.name
    }

    pub fn device_id(&self) -> u16 {
        self.device_id
    }

    pub fn set_device_id(&mut self, device_id: u16) {
        self.device_id = device_id;
    }

    /// Device name frame: `[0x00, name_len << 3, name...]`
    pub fn name_frame(&self) -> ExFrame {
        let mut writer = FrameWriter::new();
        writer.push(0x00);
        writer.push((self.name.len() as u8) << 3);
        writer.extend(&self.name);
        writer.finish(EX_PACKET_TEXT, self.device_id)
    }

    /// Next dictionary entry, starting at `cursor`
    ///
    /// Every inspected sensor advances the cursor (wrapping); the first active
    /// one is announced. Returns `None` when no sensor is active.
    pub fn dictionary_frame(&self, catalog: &SensorCatalog, cursor: &mut usize) -> Option<ExFrame> {
        let count = catalog.len();

        for _ in 0..count {
            let index = *cursor % count;
            *cursor = (index + 1) % count;

            if !catalog.is_index_active(index) {
                continue;
            }
            let def = catalog.definition(index)?;
            let (label, label_len, unit_len) = def.dictionary_label();

            let mut writer = FrameWriter::new();
            writer.push(def.id);
            writer.push((label_len << 3) | unit_len);
            writer.extend(&label);
            return Some(writer.finish(EX_PACKET_TEXT, self.device_id));
        }

        None
    }

    /// Value frame starting at `cursor`
    ///
    /// Visits each catalog entry at most once. Active sensors due in the
    /// current priority cycle are appended until the next entry plus CRC would
    /// exceed [`EX_MAX_BYTES_PER_FRAME`]; the cursor then stays on that sensor
    /// so it leads the next frame. Entries are never split.
    ///
    /// # Examples
    ///
    /// ```
    /// use jetiex_uplink::ex::catalog::SensorCatalog;
    /// use jetiex_uplink::ex::encoder::{FrameBuilder, ValueCursor};
    /// use jetiex_uplink::ex::protocol::{DataType, Precision, SensorDefinition};
    ///
    /// static SENSORS: [SensorDefinition; 2] = [
    ///     SensorDefinition::new(1, "Voltage", "V", DataType::Int14, Precision::One),
    ///     SensorDefinition::END,
    /// ];
    ///
    /// let mut catalog = SensorCatalog::new(&SENSORS);
    /// catalog.set_value(1, 126, 1);
    ///
    /// let builder = FrameBuilder::new("Demo");
    /// let mut cursor = ValueCursor::default();
    /// let frame = builder.value_frame(&catalog, &mut cursor);
    /// assert_eq!(frame.len(), 12);
    /// assert!(frame.is_data());
    /// ```
    pub fn value_frame(&self, catalog: &SensorCatalog, cursor: &mut ValueCursor) -> ExFrame {
        let mut writer = FrameWriter::new();
        let count = catalog.len();

        for _ in 0..count {
            let index = cursor.index % count;

            if let (Some(def), Some(state)) = (catalog.definition(index), catalog.state(index)) {
                let due = cursor.cycle % u32::from(state.priority.max(1)) == 0;

                if catalog.is_index_active(index) && due {
                    if writer.len + def.entry_len() + 1 > EX_MAX_BYTES_PER_FRAME {
                        break;
                    }
                    let type_code = def.data_type.code() & 0x0F;
                    if def.id > MAX_SHORT_ID {
                        writer.push(type_code);
                        writer.push(def.id);
                    } else {
                        writer.push((def.id << 4) | type_code);
                    }
                    let value = encode_value(state.value, def.data_type, def.precision);
                    writer.extend(&value[..def.data_type.payload_len()]);
                }
            }

            cursor.index = index + 1;
            if cursor.index >= count {
                cursor.index = 0;
                cursor.cycle = cursor.cycle.wrapping_add(1);
            }
        }

        writer.finish(EX_PACKET_DATA, self.device_id)
    }
}

/// Alarm sequence; an upper case code sounds, a lower case code is silent
/// and sent upper cased
pub fn alarm_words(code: u8) -> [Word; 4] {
    let sound = if code.is_ascii_lowercase() { 0 } else { ALARM_SOUND };
    [
        Word::new(EX_FRAME_START, false),
        Word::new(ALARM_LENGTH, true),
        Word::new(ALARM_TYPE | sound, true),
        Word::new(code.to_ascii_uppercase(), true),
    ]
}

/// Jetibox navigation exit sequence
pub fn exit_words() -> [Word; 3] {
    [
        Word::new(EXIT_FRAME[0], false),
        Word::new(EXIT_FRAME[1], true),
        Word::new(EXIT_FRAME[2], true),
    ]
}
