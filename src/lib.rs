//! # JetiEx Uplink Library
//!
//! Sensor-side Jeti EX telemetry: publish sensor values to a Jeti Duplex
//! receiver over its half-duplex 9-bit serial line.
//!
//! This library provides the sensor catalog, the EX value and frame encoding,
//! the transmission scheduler and the interrupt-driven serial link, plus a
//! receiver-side decoder and host adapters for bench use.

pub mod config;
pub mod error;
pub mod ex;
pub mod serial;
pub mod telemetry;
