//! # Half-Duplex Link
//!
//! Interrupt-driven driver for the single EX wire. Words queued by the
//! scheduler are drained by the tx-ready interrupt; once the last word has
//! left the shift register the tx-complete interrupt turns the line around to
//! receive Jetibox key codes.
//!
//! All state shared between the scheduler and interrupt context sits in one
//! `critical_section::Mutex`; every access is a short critical section.
//!
//! ```text
//!  Idle --send--> Transmit --tx empty--> Draining --tx complete--> Receive
//!                    ^                      |                         |
//!                    +-------send-----------+-----------send----------+
//! ```

use core::cell::RefCell;

use critical_section::Mutex;
use heapless::Deque;
use tracing::{debug, info};

use super::device::{LineMode, LineSettings, SerialDevice};
use crate::error::Result;
use crate::ex::jetibox::is_key_code;
use crate::ex::protocol::Word;

/// Transmit ring capacity in 9-bit words
pub const TX_CAPACITY: usize = 64;

/// Receive ring capacity in key codes
pub const RX_CAPACITY: usize = 4;

struct LinkState<D> {
    device: D,
    settings: LineSettings,
    tx: Deque<u16, TX_CAPACITY>,
    rx: Deque<u8, RX_CAPACITY>,
    mode: LineMode,
    sending: bool,
    started: bool,
    dropped_tx: u32,
}

/// Half-duplex EX link over a [`SerialDevice`]
pub struct HalfDuplexLink<D> {
    state: Mutex<RefCell<LinkState<D>>>,
}

impl<D: SerialDevice> HalfDuplexLink<D> {
    pub const fn new(device: D, settings: LineSettings) -> Self {
        Self {
            state: Mutex::new(RefCell::new(LinkState {
                device,
                settings,
                tx: Deque::new(),
                rx: Deque::new(),
                mode: LineMode::Idle,
                sending: false,
                started: false,
                dropped_tx: 0,
            })),
        }
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut LinkState<D>) -> R) -> R {
        critical_section::with(|cs| f(&mut self.state.borrow_ref_mut(cs)))
    }

    /// Configure the device; the receiver stays off until the first burst completes
    ///
    /// Starting an already started link does nothing.
    ///
    /// # Errors
    ///
    /// Returns error if the device rejects the line settings
    pub fn start(&self) -> Result<()> {
        let settings = self.with_state(|s| -> Result<Option<LineSettings>> {
            if s.started {
                return Ok(None);
            }
            s.device.configure(&s.settings)?;
            s.mode = LineMode::Idle;
            s.device.set_mode(LineMode::Idle);
            s.started = true;
            Ok(Some(s.settings))
        })?;

        if let Some(settings) = settings {
            info!(
                "EX link started: {} baud, {:?}/{:?}/{:?}",
                settings.baud_rate, settings.data_bits, settings.parity, settings.stop_bits
            );
        }
        Ok(())
    }

    /// Queue one word and turn the line to transmit if it is not already sending
    ///
    /// A full transmit ring drops the word.
    pub fn send(&self, data: u8, ninth_bit: bool) {
        let dropped = self.with_state(|s| {
            let dropped = s.tx.push_back(Word::new(data, ninth_bit).to_bits()).is_err();
            if dropped {
                s.dropped_tx = s.dropped_tx.saturating_add(1);
            }
            if !s.sending {
                s.sending = true;
                s.mode = LineMode::Transmit;
                s.device.set_mode(LineMode::Transmit);
            }
            dropped
        });

        if dropped {
            debug!("TX ring full, dropped 0x{:02X}", data);
        }
    }

    /// Take one received key code
    pub fn getchar(&self) -> Option<u8> {
        self.with_state(|s| s.rx.pop_front())
    }

    /// Tx-ready interrupt: hand the next word to the device, or arm tx-complete
    pub fn on_tx_ready(&self) {
        self.with_state(|s| {
            if s.mode != LineMode::Transmit {
                return;
            }
            match s.tx.pop_front() {
                Some(bits) => {
                    let word = Word::from_bits(bits);
                    s.device.write_word(word.data, word.ninth_bit);
                }
                None => {
                    s.mode = LineMode::Draining;
                    s.device.set_mode(LineMode::Draining);
                    s.sending = false;
                }
            }
        });
    }

    /// Tx-complete interrupt: the burst is out, listen for keys
    pub fn on_tx_complete(&self) {
        self.with_state(|s| {
            if s.mode != LineMode::Draining || !s.tx.is_empty() {
                return;
            }
            s.mode = LineMode::Receive;
            s.device.set_mode(LineMode::Receive);
            s.rx.clear();
        });
    }

    /// Rx interrupt: keep key codes, drop everything else
    pub fn on_rx_ready(&self) {
        self.with_state(|s| {
            if s.mode != LineMode::Receive {
                return;
            }
            if let Some(byte) = s.device.read_byte() {
                if is_key_code(byte) {
                    // full ring drops the key
                    let _ = s.rx.push_back(byte);
                }
            }
        });
    }

    pub fn line_mode(&self) -> LineMode {
        self.with_state(|s| s.mode)
    }

    pub fn is_sending(&self) -> bool {
        self.with_state(|s| s.sending)
    }

    /// Words waiting in the transmit ring
    pub fn pending_words(&self) -> usize {
        self.with_state(|s| s.tx.len())
    }

    /// Words dropped because the transmit ring was full
    pub fn dropped_words(&self) -> u32 {
        self.with_state(|s| s.dropped_tx)
    }

    /// Run `f` on the device inside the link's critical section
    pub fn with_device<R>(&self, f: impl FnOnce(&mut D) -> R) -> R {
        self.with_state(|s| f(&mut s.device))
    }
}
