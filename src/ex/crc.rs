//! # Jeti EX CRC8 Implementation
//!
//! CRC-8 checksum as published in the Jeti telemetry protocol.
//!
//! **Polynomial**: 0x07 (x^8 + x^2 + x + 1)
//! **Initial Value**: 0x00
//!
//! The checksum covers an EX frame from byte 2 (length/type) up to the last
//! payload byte; start and separator bytes are excluded.

/// Jeti EX CRC8 polynomial
const CRC8_POLY: u8 = 0x07;

/// Offset of the first byte covered by the frame CRC
pub const CRC_START: usize = 2;

/// Precomputed CRC8 lookup table
const CRC8_TABLE: [u8; 256] = generate_crc8_table();

/// Generate CRC8 lookup table at compile time
const fn generate_crc8_table() -> [u8; 256] {
    let mut table = [0u8; 256];
    let mut i = 0;

    while i < 256 {
        let mut crc = i as u8;
        let mut j = 0;

        while j < 8 {
            if (crc & 0x80) != 0 {
                crc = (crc << 1) ^ CRC8_POLY;
            } else {
                crc <<= 1;
            }
            j += 1;
        }

        table[i] = crc;
        i += 1;
    }

    table
}

/// Calculate the Jeti CRC8 over a byte slice
///
/// # Examples
///
/// ```
/// use jetiex_uplink::ex::crc::crc8;
///
/// assert_eq!(crc8(b"123456789"), 0xF4);
/// ```
pub fn crc8(data: &[u8]) -> u8 {
    data.iter()
        .fold(0u8, |crc, &byte| CRC8_TABLE[(crc ^ byte) as usize])
}

/// CRC of an EX frame whose CRC byte goes at `frame.len()`
///
/// `frame` holds the header and payload; bytes before [`CRC_START`] are
/// skipped.
pub fn frame_crc(frame: &[u8]) -> u8 {
    crc8(frame.get(CRC_START..).unwrap_or(&[]))
}

/// Bitwise form of the published `update_crc` routine, kept to cross-check the table
#[allow(dead_code)]
fn crc8_slow(data: &[u8]) -> u8 {
    let mut crc: u8 = 0;

    for &byte in data {
        crc ^= byte;

        for _ in 0..8 {
            crc = if (crc & 0x80) != 0 {
                CRC8_POLY ^ (crc << 1)
            } else {
                crc << 1
            };
        }
    }

    crc
}
