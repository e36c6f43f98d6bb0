//! Device abstraction under the half-duplex link, so the link can run
//! against a real USART, the host adapter or a test double

use crate::error::Result;

/// Number of data bits per UART word
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataBits {
    Eight,
    Nine,
}

/// Parity mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parity {
    None,
    Even,
    Odd,
}

/// Number of stop bits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopBits {
    One,
    Two,
}

/// Line settings applied once when the link starts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineSettings {
    pub baud_rate: u32,
    pub data_bits: DataBits,
    pub parity: Parity,
    pub stop_bits: StopBits,
}

impl LineSettings {
    /// EX line format (9O2) at the given baud rate
    pub const fn ex(baud_rate: u32) -> Self {
        Self {
            baud_rate,
            data_bits: DataBits::Nine,
            parity: Parity::Odd,
            stop_bits: StopBits::Two,
        }
    }
}

impl Default for LineSettings {
    fn default() -> Self {
        Self::ex(EX_BAUD_RATE)
    }
}

/// Nominal EX baud rate
pub const EX_BAUD_RATE: u32 = 9600;

/// Direction of the shared wire and which interrupts are armed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineMode {
    /// Configured, receiver off, no interrupts armed
    #[default]
    Idle,
    /// Receiver off, tx-ready interrupt armed
    Transmit,
    /// Last word handed to the shift register, tx-complete interrupt armed
    Draining,
    /// Receiver on, transmit interrupts off
    Receive,
}

/// Register-level operations of a 9-bit capable UART
#[cfg_attr(test, mockall::automock)]
pub trait SerialDevice: Send {
    /// Apply baud rate and word format
    fn configure(&mut self, settings: &LineSettings) -> Result<()>;

    /// Switch direction and interrupt enables
    fn set_mode(&mut self, mode: LineMode);

    /// Load one word into the transmit register
    fn write_word(&mut self, data: u8, ninth_bit: bool);

    /// Take the received byte, if any
    fn read_byte(&mut self) -> Option<u8>;
}

#[cfg(test)]
pub mod mocks {
    use super::*;
    use crate::error::JetiExError;
    use crate::ex::protocol::Word;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Device double recording everything the link does to it
    #[derive(Clone, Default)]
    pub struct RecordingDevice {
        pub written: Arc<Mutex<Vec<Word>>>,
        pub modes: Arc<Mutex<Vec<LineMode>>>,
        pub configured: Arc<Mutex<Vec<LineSettings>>>,
        pub incoming: Arc<Mutex<VecDeque<u8>>>,
        pub configure_error: Arc<Mutex<Option<String>>>,
    }

    impl RecordingDevice {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn written(&self) -> Vec<Word> {
            self.written.lock().unwrap().clone()
        }

        pub fn written_bytes(&self) -> Vec<u8> {
            self.written().iter().map(|w| w.data).collect()
        }

        pub fn modes(&self) -> Vec<LineMode> {
            self.modes.lock().unwrap().clone()
        }

        pub fn configured(&self) -> Vec<LineSettings> {
            self.configured.lock().unwrap().clone()
        }

        pub fn receive(&self, byte: u8) {
            self.incoming.lock().unwrap().push_back(byte);
        }

        pub fn set_configure_error(&self, message: &str) {
            *self.configure_error.lock().unwrap() = Some(message.to_string());
        }
    }

    impl SerialDevice for RecordingDevice {
        fn configure(&mut self, settings: &LineSettings) -> Result<()> {
            if let Some(message) = self.configure_error.lock().unwrap().clone() {
                return Err(JetiExError::Serial(message));
            }
            self.configured.lock().unwrap().push(*settings);
            Ok(())
        }

        fn set_mode(&mut self, mode: LineMode) {
            self.modes.lock().unwrap().push(mode);
        }

        fn write_word(&mut self, data: u8, ninth_bit: bool) {
            self.written.lock().unwrap().push(Word::new(data, ninth_bit));
        }

        fn read_byte(&mut self) -> Option<u8> {
            self.incoming.lock().unwrap().pop_front()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_line_settings() {
        let settings = LineSettings::default();
        assert_eq!(settings.baud_rate, 9600);
        assert_eq!(settings.data_bits, DataBits::Nine);
        assert_eq!(settings.parity, Parity::Odd);
        assert_eq!(settings.stop_bits, StopBits::Two);
    }

    #[test]
    fn test_ex_settings_keep_format() {
        let settings = LineSettings::ex(9800);
        assert_eq!(settings.baud_rate, 9800);
        assert_eq!(settings.data_bits, DataBits::Nine);
    }

    #[test]
    fn test_automock_device() {
        let mut device = MockSerialDevice::new();
        device.expect_read_byte().times(1).returning(|| Some(0x70));
        device
            .expect_write_word()
            .withf(|&data, &ninth| data == 0x7E && !ninth)
            .times(1)
            .return_const(());

        assert_eq!(device.read_byte(), Some(0x70));
        device.write_word(0x7E, false);
    }
}
