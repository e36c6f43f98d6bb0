//! # Interrupt Vectors
//!
//! A target has one USART and therefore one link serving its interrupts. The
//! link is bound here once at startup; the `usart_*` entry points are what the
//! interrupt handlers (or the host pump) call.

use core::cell::Cell;

use critical_section::Mutex;
use tracing::{info, warn};

use super::device::SerialDevice;
use super::link::HalfDuplexLink;

/// Interrupt-side half of a link
pub trait LinkInterrupts: Sync {
    fn tx_ready(&self);
    fn tx_complete(&self);
    fn rx_ready(&self);
}

impl<D: SerialDevice> LinkInterrupts for HalfDuplexLink<D> {
    fn tx_ready(&self) {
        self.on_tx_ready();
    }

    fn tx_complete(&self) {
        self.on_tx_complete();
    }

    fn rx_ready(&self) {
        self.on_rx_ready();
    }
}

static ACTIVE_LINK: Mutex<Cell<Option<&'static dyn LinkInterrupts>>> = Mutex::new(Cell::new(None));

/// Route the interrupt vectors to `link`, replacing any previous binding
pub fn bind(link: &'static dyn LinkInterrupts) {
    let previous = critical_section::with(|cs| ACTIVE_LINK.borrow(cs).replace(Some(link)));
    if previous.is_some() {
        warn!("Interrupt vectors rebound to a new link");
    } else {
        info!("Interrupt vectors bound");
    }
}

/// Detach the vectors; later interrupts are ignored
pub fn unbind() {
    critical_section::with(|cs| ACTIVE_LINK.borrow(cs).set(None));
}

pub fn is_bound() -> bool {
    active().is_some()
}

fn active() -> Option<&'static dyn LinkInterrupts> {
    critical_section::with(|cs| ACTIVE_LINK.borrow(cs).get())
}

/// USART data register empty
pub fn usart_tx_ready() {
    if let Some(link) = active() {
        link.tx_ready();
    }
}

/// USART transmit complete
pub fn usart_tx_complete() {
    if let Some(link) = active() {
        link.tx_complete();
    }
}

/// USART receive complete
pub fn usart_rx_ready() {
    if let Some(link) = active() {
        link.rx_ready();
    }
}

/// Serializes tests that bind the process-wide vectors
#[cfg(test)]
pub(crate) fn test_binding_lock() -> std::sync::MutexGuard<'static, ()> {
    static LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());
    LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
