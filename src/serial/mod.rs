//! # Serial Communication Module
//!
//! Handles the single half-duplex EX wire.
//!
//! This module handles:
//! - 9-bit UART device abstraction (9O2 line format)
//! - Interrupt-driven transmit/receive ring buffers
//! - Turning the line around after each transmit burst
//! - Interrupt vector binding for the active link
//! - Host-side adapter and pump over tokio-serial

pub mod device;
pub mod host;
pub mod irq;
pub mod link;

use std::sync::Arc;

use crate::error::Result;
use crate::ex::protocol::Word;

pub use device::{LineMode, LineSettings, SerialDevice};
pub use link::HalfDuplexLink;

/// Byte-oriented half-duplex transport used by the telemetry scheduler
pub trait ExTransport {
    /// Bring the transport up; must be harmless to call twice
    fn start(&self) -> Result<()> {
        Ok(())
    }

    /// Queue one byte with its ninth-bit marker
    fn send(&self, data: u8, ninth_bit: bool);

    /// Take one received key code
    fn getchar(&self) -> Option<u8>;

    fn send_words(&self, words: &[Word]) {
        for word in words {
            self.send(word.data, word.ninth_bit);
        }
    }
}

impl<D: SerialDevice> ExTransport for HalfDuplexLink<D> {
    fn start(&self) -> Result<()> {
        HalfDuplexLink::start(self)
    }

    fn send(&self, data: u8, ninth_bit: bool) {
        HalfDuplexLink::send(self, data, ninth_bit);
    }

    fn getchar(&self) -> Option<u8> {
        HalfDuplexLink::getchar(self)
    }
}

impl<T: ExTransport + ?Sized> ExTransport for &T {
    fn start(&self) -> Result<()> {
        (**self).start()
    }

    fn send(&self, data: u8, ninth_bit: bool) {
        (**self).send(data, ninth_bit);
    }

    fn getchar(&self) -> Option<u8> {
        (**self).getchar()
    }
}

impl<T: ExTransport + ?Sized> ExTransport for Arc<T> {
    fn start(&self) -> Result<()> {
        (**self).start()
    }

    fn send(&self, data: u8, ninth_bit: bool) {
        (**self).send(data, ninth_bit);
    }

    fn getchar(&self) -> Option<u8> {
        (**self).getchar()
    }
}


#[cfg(test)]
mod tests {
    use super::mocks::MockTransport;
    use super::*;
    use crate::serial::device::mocks::RecordingDevice;

    #[test]
    fn test_send_words_keeps_markers() {
        let transport = MockTransport::new();
        transport.send_words(&[Word::new(0x7E, false), Word::new(0x2F, true)]);

        assert_eq!(
            transport.take_sent(),
            vec![Word::new(0x7E, false), Word::new(0x2F, true)]
        );
    }

    #[test]
    fn test_link_as_transport() {
        let device = RecordingDevice::new();
        let link = Arc::new(HalfDuplexLink::new(device.clone(), LineSettings::default()));

        let transport: &dyn ExTransport = &link;
        transport.start().unwrap();
        transport.send_words(&[Word::new(0xFE, false), Word::new(0x20, true)]);

        assert_eq!(link.pending_words(), 2);
        assert_eq!(device.configured().len(), 1);
        assert_eq!(transport.getchar(), None);
    }

    #[test]
    fn test_reference_forwarding() {
        let transport = MockTransport::new();
        let by_ref = &transport;
        by_ref.start().unwrap();
        by_ref.send(0x01, true);

        assert_eq!(transport.starts.get(), 1);
        assert_eq!(transport.take_sent().len(), 1);
    }
}
