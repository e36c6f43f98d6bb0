//! # Host Adapter
//!
//! Runs the link on a desktop machine. [`HostUart`] stands in for the USART
//! registers and [`LinkPump`] plays the interrupt controller: it fires the
//! vectors, moves transmitted words to a [`WireIo`] and feeds received bytes
//! back.
//!
//! USB serial adapters have no ninth data bit, so only the data bytes reach
//! the wire. The word markers are still visible to the frame capture.

use std::collections::VecDeque;
use std::io;
use std::time::Duration;

use async_trait::async_trait;
use bytes::{BufMut, BytesMut};
use tokio_serial::SerialPortBuilderExt;
use tracing::{debug, info, trace, warn};

use super::device::{DataBits, LineMode, LineSettings, SerialDevice};
use super::irq;
use super::link::{HalfDuplexLink, TX_CAPACITY};
use crate::error::{JetiExError, Result};
use crate::ex::decoder::PacketAssembler;
use crate::ex::protocol::Word;
use crate::telemetry::capture::FrameCapture;

/// Bytes read from the wire per pump pass
const RX_READ_CHUNK: usize = 16;

/// USART stand-in that stages written words for the pump
#[derive(Debug, Default)]
pub struct HostUart {
    settings: Option<LineSettings>,
    mode: LineMode,
    staged: Vec<Word>,
    incoming: VecDeque<u8>,
}

impl HostUart {
    pub const fn new() -> Self {
        Self {
            settings: None,
            mode: LineMode::Idle,
            staged: Vec::new(),
            incoming: VecDeque::new(),
        }
    }

    /// Words written since the last call
    pub fn take_staged(&mut self) -> Vec<Word> {
        std::mem::take(&mut self.staged)
    }

    /// Make a byte available to the next rx interrupt
    pub fn feed(&mut self, byte: u8) {
        self.incoming.push_back(byte);
    }

    pub fn settings(&self) -> Option<LineSettings> {
        self.settings
    }

    pub fn mode(&self) -> LineMode {
        self.mode
    }
}

impl SerialDevice for HostUart {
    fn configure(&mut self, settings: &LineSettings) -> Result<()> {
        if settings.data_bits == DataBits::Nine {
            debug!("Host adapter has 8 data bits, ninth bit markers stay local");
        }
        self.settings = Some(*settings);
        Ok(())
    }

    fn set_mode(&mut self, mode: LineMode) {
        trace!("Line mode {:?}", mode);
        self.mode = mode;
    }

    fn write_word(&mut self, data: u8, ninth_bit: bool) {
        self.staged.push(Word::new(data, ninth_bit));
    }

    fn read_byte(&mut self) -> Option<u8> {
        self.incoming.pop_front()
    }
}

/// Byte-level access to the physical wire
#[async_trait]
pub trait WireIo: Send {
    /// Write all data to the wire
    async fn write_all(&mut self, data: &[u8]) -> io::Result<()>;

    /// Flush the output buffer
    async fn flush(&mut self) -> io::Result<()>;

    /// Read whatever arrived, returning 0 when nothing did
    async fn read_available(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

/// Wire backed by a tokio-serial port
pub struct TokioSerialPort {
    port: tokio_serial::SerialStream,
    read_timeout: Duration,
}

impl std::fmt::Debug for TokioSerialPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokioSerialPort")
            .field("read_timeout", &self.read_timeout)
            .finish_non_exhaustive()
    }
}

impl TokioSerialPort {
    /// Open a serial adapter with the EX parity and stop bits
    ///
    /// # Arguments
    ///
    /// * `path` - Device path (e.g., "/dev/ttyUSB0")
    /// * `baud_rate` - Line speed
    /// * `read_timeout` - How long one read waits for key codes
    ///
    /// # Errors
    ///
    /// Returns error if the port cannot be opened
    pub fn open(path: &str, baud_rate: u32, read_timeout: Duration) -> Result<Self> {
        let port = tokio_serial::new(path, baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::Odd)
            .stop_bits(tokio_serial::StopBits::Two)
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()
            .map_err(|e| JetiExError::Serial(format!("Failed to open {}: {}", path, e)))?;

        info!("Opened serial adapter at {} ({} baud)", path, baud_rate);
        Ok(Self { port, read_timeout })
    }
}

#[async_trait]
impl WireIo for TokioSerialPort {
    async fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        use tokio::io::AsyncWriteExt;
        self.port.write_all(data).await
    }

    async fn flush(&mut self) -> io::Result<()> {
        use tokio::io::AsyncWriteExt;
        self.port.flush().await
    }

    async fn read_available(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        use tokio::io::AsyncReadExt;
        match tokio::time::timeout(self.read_timeout, self.port.read(buf)).await {
            Ok(result) => result,
            Err(_) => Ok(0),
        }
    }
}

/// Wire that discards output and never receives
#[derive(Debug, Default)]
pub struct NullWire {
    written: usize,
}

impl NullWire {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes discarded so far
    pub fn written(&self) -> usize {
        self.written
    }
}

#[async_trait]
impl WireIo for NullWire {
    async fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        self.written += data.len();
        Ok(())
    }

    async fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }

    async fn read_available(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        Ok(0)
    }
}

/// Drives a host link through the interrupt vectors
///
/// The link must be bound with [`irq::bind`] before the pump runs.
pub struct LinkPump<W> {
    link: &'static HalfDuplexLink<HostUart>,
    wire: W,
    capture: Option<FrameCapture>,
    assembler: PacketAssembler,
}

impl<W: WireIo> LinkPump<W> {
    pub fn new(link: &'static HalfDuplexLink<HostUart>, wire: W) -> Self {
        Self {
            link,
            wire,
            capture: None,
            assembler: PacketAssembler::new(),
        }
    }

    /// Decode every transmitted burst into `capture`
    pub fn with_capture(mut self, capture: FrameCapture) -> Self {
        self.capture = Some(capture);
        self
    }

    pub fn wire(&self) -> &W {
        &self.wire
    }

    /// One service pass: drain the transmit ring, turn the line around and
    /// collect key codes
    ///
    /// # Returns
    ///
    /// * `Result<usize>` - Number of words put on the wire
    ///
    /// # Errors
    ///
    /// Returns error if the wire fails or the capture file cannot be written
    pub async fn service(&mut self) -> Result<usize> {
        let mut fired = 0;
        while self.link.line_mode() == LineMode::Transmit && fired <= TX_CAPACITY {
            irq::usart_tx_ready();
            fired += 1;
        }

        let words = self.link.with_device(HostUart::take_staged);
        if !words.is_empty() {
            let mut out = BytesMut::with_capacity(words.len());
            for word in &words {
                out.put_u8(word.data);
            }
            self.wire.write_all(&out).await?;
            self.wire.flush().await?;
            trace!("Wrote {} bytes to the wire", out.len());

            self.record(&words)?;
        }

        if self.link.line_mode() == LineMode::Draining {
            irq::usart_tx_complete();
        }

        if self.link.line_mode() == LineMode::Receive {
            let mut buf = [0u8; RX_READ_CHUNK];
            let n = self.wire.read_available(&mut buf).await?;
            for &byte in &buf[..n] {
                self.link.with_device(|uart| uart.feed(byte));
                irq::usart_rx_ready();
            }
        }

        Ok(words.len())
    }

    fn record(&mut self, words: &[Word]) -> Result<()> {
        let Some(capture) = self.capture.as_mut() else {
            return Ok(());
        };

        for &word in words {
            match self.assembler.push(word) {
                Some(Ok(packet)) => capture.record(&packet)?,
                Some(Err(e)) => warn!("Undecodable packet on the wire: {}", e),
                None => {}
            }
        }
        Ok(())
    }
}
