//! # EX Protocol Module
//!
//! Implementation of the Jeti EX telemetry protocol.
//!
//! This module handles:
//! - Sensor catalog with values, priorities and active flags
//! - Value encoding for the six EX numeric formats
//! - Name, dictionary and value frame assembly within the 29 byte budget
//! - CRC8 checksum calculation
//! - Jetibox text frames and key codes
//! - Decoding of the resulting word stream

pub mod protocol;
pub mod crc;
pub mod value;
pub mod catalog;
pub mod encoder;
pub mod decoder;
pub mod jetibox;
