//! # EX Stream Decoder
//!
//! Receiver-side view of the uplink: reassembles the 9-bit word stream into
//! packets and decodes EX frames back into names, dictionary entries and
//! values. Used by the frame capture and by tests.

use serde::Serialize;

use super::crc::frame_crc;
use super::protocol::*;
use super::value::decode_value;
use crate::error::{JetiExError, Result};

/// Decoded EX frame
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExPacket {
    pub manufacturer_id: u16,
    pub device_id: u16,
    #[serde(flatten)]
    pub body: ExBody,
}

/// Contents of an EX frame
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "frame", rename_all = "snake_case")]
pub enum ExBody {
    /// Device name (dictionary entry with id 0)
    Name { name: String },
    /// Label and unit of one sensor
    Dictionary { id: u8, label: String, unit: String },
    /// Sensor values
    Values { entries: Vec<ValueEntry> },
}

/// One value entry of a data frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ValueEntry {
    pub id: u8,
    pub data_type: DataType,
    pub value: i32,
    /// Decimal places
    pub precision: u8,
}

/// Any packet seen on the wire
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Packet {
    Ex(ExPacket),
    Text { line1: String, line2: String },
    Alarm { code: char, sound: bool },
    Exit,
}

/// Expected length of the packet started in `buf`, once it is known
fn expected_len(buf: &[Word]) -> Result<Option<usize>> {
    let first = buf[0].data;
    if first == TEXT_FRAME_START {
        return Ok(Some(TEXT_FRAME_LEN));
    }

    let Some(second) = buf.get(1) else {
        return Ok(None);
    };
    match second.data {
        EX_SEPARATOR => match buf.get(2) {
            Some(len) => {
                let total = (len.data & EX_LENGTH_MASK) as usize + 3;
                if !(EX_HEADER_LEN + 1..=EX_MAX_FRAME_LEN).contains(&total) {
                    return Err(JetiExError::Protocol(format!(
                        "Invalid EX frame length: {} bytes",
                        total
                    )));
                }
                Ok(Some(total))
            }
            None => Ok(None),
        },
        b if b == EXIT_FRAME[1] => Ok(Some(EXIT_FRAME.len())),
        ALARM_LENGTH => Ok(Some(4)),
        other => Err(JetiExError::Protocol(format!(
            "Unknown packet after 0x7E: 0x{:02X}",
            other
        ))),
    }
}

/// Reassembles packets from a word stream
///
/// Packets start at an unmarked `0x7E` or `0xFE`. Marked words outside a
/// packet are skipped.
///
/// # Examples
///
/// ```
/// use jetiex_uplink::ex::decoder::{Packet, PacketAssembler};
/// use jetiex_uplink::ex::encoder::exit_words;
///
/// let mut assembler = PacketAssembler::new();
/// let packets: Vec<_> = exit_words()
///     .iter()
///     .filter_map(|&w| assembler.push(w))
///     .collect();
/// assert_eq!(packets.len(), 1);
/// assert_eq!(packets[0].as_ref().unwrap(), &Packet::Exit);
/// ```
#[derive(Debug, Default)]
pub struct PacketAssembler {
    buf: Vec<Word>,
}

impl PacketAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one word; returns a packet (or the reason it is unusable) when one completes
    pub fn push(&mut self, word: Word) -> Option<Result<Packet>> {
        let is_start =
            !word.ninth_bit && (word.data == EX_FRAME_START || word.data == TEXT_FRAME_START);

        if self.buf.is_empty() {
            if !is_start {
                return None;
            }
            self.buf.push(word);
            return None;
        }

        // text frames may legitimately contain 0x7E / 0xFE, but only marked
        if is_start {
            let dropped = self.buf.len();
            self.buf.clear();
            self.buf.push(word);
            return Some(Err(JetiExError::Protocol(format!(
                "Truncated packet: {} words before next start",
                dropped
            ))));
        }

        self.buf.push(word);
        match expected_len(&self.buf) {
            Ok(Some(len)) if self.buf.len() >= len => {
                let packet = decode_packet(&self.buf);
                self.buf.clear();
                Some(packet)
            }
            Ok(_) => None,
            Err(e) => {
                self.buf.clear();
                Some(Err(e))
            }
        }
    }

    /// Whether a packet is partially assembled
    pub fn is_pending(&self) -> bool {
        !self.buf.is_empty()
    }
}

/// Decode every complete packet in a word stream
pub fn decode_stream(words: &[Word]) -> Vec<Result<Packet>> {
    let mut assembler = PacketAssembler::new();
    words.iter().filter_map(|&w| assembler.push(w)).collect()
}

/// Decode one complete packet
///
/// # Errors
///
/// Returns error if:
/// - The start byte is neither `0x7E` nor `0xFE`
/// - The packet is shorter than its kind requires
/// - An EX frame fails its CRC or layout checks
pub fn decode_packet(words: &[Word]) -> Result<Packet> {
    let bytes: Vec<u8> = words.iter().map(|w| w.data).collect();

    match bytes.first() {
        Some(&TEXT_FRAME_START) => decode_text(&bytes),
        Some(&EX_FRAME_START) => match bytes.get(1) {
            Some(&EX_SEPARATOR) => decode_ex_frame(&bytes).map(Packet::Ex),
            Some(_) if bytes.as_slice() == EXIT_FRAME => Ok(Packet::Exit),
            Some(&ALARM_LENGTH) if bytes.len() == 4 => Ok(Packet::Alarm {
                code: bytes[3] as char,
                sound: bytes[2] & ALARM_SOUND != 0,
            }),
            _ => Err(JetiExError::Protocol(format!(
                "Unknown packet: {:02X?}",
                bytes
            ))),
        },
        _ => Err(JetiExError::Protocol("Missing start byte".to_string())),
    }
}

fn decode_text(bytes: &[u8]) -> Result<Packet> {
    if bytes.len() != TEXT_FRAME_LEN || bytes[TEXT_FRAME_LEN - 1] != TEXT_FRAME_END {
        return Err(JetiExError::Protocol(format!(
            "Invalid text frame: {} bytes",
            bytes.len()
        )));
    }

    let line = |range: std::ops::Range<usize>| {
        String::from_utf8_lossy(&bytes[range])
            .trim_end_matches([' ', '\0'])
            .to_string()
    };

    Ok(Packet::Text {
        line1: line(1..1 + TEXT_LINE_LEN),
        line2: line(1 + TEXT_LINE_LEN..1 + TEXT_PAYLOAD_LEN),
    })
}

/// Decode a complete EX frame (header, payload and CRC)
///
/// # Errors
///
/// Returns error if the frame is too short, the separator or length byte does
/// not match, the CRC check fails or an entry is malformed.
pub fn decode_ex_frame(frame: &[u8]) -> Result<ExPacket> {
    // header(8) + crc(1)
    if frame.len() < EX_HEADER_LEN + 1 {
        return Err(JetiExError::Protocol("EX frame too short".to_string()));
    }

    if frame[0] != EX_FRAME_START || frame[1] != EX_SEPARATOR {
        return Err(JetiExError::Protocol(format!(
            "Invalid EX header: 0x{:02X} 0x{:02X}",
            frame[0], frame[1]
        )));
    }

    let crc_index = (frame[2] & EX_LENGTH_MASK) as usize + 2;
    if frame.len() != crc_index + 1 {
        return Err(JetiExError::Protocol(format!(
            "EX length mismatch: header says {} bytes, got {}",
            crc_index + 1,
            frame.len()
        )));
    }

    let received_crc = frame[crc_index];
    let calculated_crc = frame_crc(&frame[..crc_index]);
    if received_crc != calculated_crc {
        return Err(JetiExError::Protocol(format!(
            "CRC mismatch: expected 0x{:02X}, got 0x{:02X}",
            calculated_crc, received_crc
        )));
    }

    let manufacturer_id = u16::from_le_bytes([frame[3], frame[4]]);
    let device_id = u16::from_le_bytes([frame[5], frame[6]]);
    let payload = &frame[EX_HEADER_LEN..crc_index];

    let body = if frame[2] & EX_PACKET_DATA != 0 {
        ExBody::Values {
            entries: decode_values(payload)?,
        }
    } else {
        decode_dictionary(payload)?
    };

    Ok(ExPacket {
        manufacturer_id,
        device_id,
        body,
    })
}

fn decode_dictionary(payload: &[u8]) -> Result<ExBody> {
    if payload.len() < 2 {
        return Err(JetiExError::Protocol("Dictionary entry too short".to_string()));
    }

    let id = payload[0];
    let label_len = (payload[1] >> 3) as usize;
    let unit_len = (payload[1] & 0x07) as usize;
    let text = &payload[2..];

    if text.len() < label_len + unit_len {
        return Err(JetiExError::Protocol(format!(
            "Dictionary text too short: {} bytes for {}+{}",
            text.len(),
            label_len,
            unit_len
        )));
    }

    let label = String::from_utf8_lossy(&text[..label_len]).into_owned();
    let unit = String::from_utf8_lossy(&text[label_len..label_len + unit_len]).into_owned();

    Ok(if id == 0 {
        ExBody::Name { name: label }
    } else {
        ExBody::Dictionary { id, label, unit }
    })
}

fn decode_values(mut payload: &[u8]) -> Result<Vec<ValueEntry>> {
    let mut entries = Vec::new();

    while let Some(&head) = payload.first() {
        let type_code = head & 0x0F;
        let data_type = DataType::from_code(type_code).ok_or_else(|| {
            JetiExError::Protocol(format!("Unknown data type code: {}", type_code))
        })?;

        let (id, id_len) = match head >> 4 {
            0 => match payload.get(1) {
                Some(&id) => (id, 2),
                None => {
                    return Err(JetiExError::Protocol("Missing extended id byte".to_string()))
                }
            },
            short => (short, 1),
        };

        let (value, precision) = decode_value(&payload[id_len..], data_type).ok_or_else(|| {
            JetiExError::Protocol(format!("Truncated value for sensor {}", id))
        })?;

        entries.push(ValueEntry {
            id,
            data_type,
            value,
            precision: precision.decimals(),
        });
        payload = &payload[id_len + data_type.payload_len()..];
    }

    Ok(entries)
}
