//! # Transmission Scheduler
//!
//! Decides what goes on the wire at each tick. One decision per send cycle:
//! a pending exit, a pending alarm, or the next EX frame, always followed by
//! the Jetibox text frame.
//!
//! Frame counter `n` selects the EX frame: `0` is the name frame, even
//! counters up to twice the sensor count carry the dictionary, everything
//! else carries values. The counter wraps at 256 so the dictionary is
//! repeated periodically.
//!
//! After start, a warm-up replays the text frame and the dictionary every
//! 150 ms while the warm-up window is open. It advances one step per tick.

use std::time::{Duration, Instant};

use tracing::{debug, info, trace};

use crate::ex::catalog::SensorCatalog;
use crate::ex::encoder::{alarm_words, exit_words, ExFrame, FrameBuilder, ValueCursor};
use crate::ex::jetibox::JetiboxText;
use crate::serial::ExTransport;

/// Default interval between two sends
pub const DEFAULT_SEND_CYCLE: Duration = Duration::from_millis(150);

/// Shortest accepted send cycle
pub const MIN_SEND_CYCLE: Duration = Duration::from_millis(75);

/// Default length of the warm-up window
pub const DEFAULT_WARMUP: Duration = Duration::from_secs(2);

/// Pause between two warm-up steps
pub const WARMUP_STEP: Duration = Duration::from_millis(150);

/// Text frames sent at the start of each warm-up pass
const WARMUP_TEXT_FRAMES: usize = 4;

/// Kind of EX frame that went out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Name,
    Dictionary,
    Values,
}

/// What a tick put on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Not due yet
    Idle,
    /// A warm-up step
    Warmup,
    Exit,
    Alarm(u8),
    Frame(FrameKind),
    /// Text frame only, no catalog registered
    Text,
}

#[derive(Debug, Clone, Copy)]
struct Warmup {
    deadline: Instant,
    step: usize,
    next_at: Instant,
}

/// Send state machine
#[derive(Debug)]
pub struct Scheduler {
    builder: FrameBuilder,
    frame_cnt: u8,
    dict_cursor: usize,
    value_cursor: ValueCursor,
    send_cycle: Duration,
    warmup_len: Duration,
    last_send: Option<Instant>,
    pending_exit: bool,
    pending_alarm: Option<u8>,
    warmup: Option<Warmup>,
}

impl Scheduler {
    pub fn new(builder: FrameBuilder) -> Self {
        Self {
            builder,
            frame_cnt: 0,
            dict_cursor: 0,
            value_cursor: ValueCursor::default(),
            send_cycle: DEFAULT_SEND_CYCLE,
            warmup_len: DEFAULT_WARMUP,
            last_send: None,
            pending_exit: false,
            pending_alarm: None,
            warmup: None,
        }
    }

    pub fn builder(&self) -> &FrameBuilder {
        &self.builder
    }

    pub fn builder_mut(&mut self) -> &mut FrameBuilder {
        &mut self.builder
    }

    pub fn frame_count(&self) -> u8 {
        self.frame_cnt
    }

    pub fn value_cursor(&self) -> ValueCursor {
        self.value_cursor
    }

    pub fn send_cycle(&self) -> Duration {
        self.send_cycle
    }

    /// Set the send cycle, clamped to [`MIN_SEND_CYCLE`]
    pub fn set_send_cycle(&mut self, cycle: Duration) {
        self.send_cycle = cycle.max(MIN_SEND_CYCLE);
    }

    pub fn set_warmup(&mut self, warmup: Duration) {
        self.warmup_len = warmup;
    }

    pub fn is_warming_up(&self) -> bool {
        self.warmup.is_some()
    }

    pub fn request_exit(&mut self) {
        self.pending_exit = true;
    }

    /// Queue an alarm code; a later call before the next send replaces it
    pub fn set_alarm(&mut self, code: u8) {
        self.pending_alarm = if code == 0 { None } else { Some(code) };
    }

    /// Restart dictionary and value rotation; the priority cycle keeps counting
    pub fn reset_cursors(&mut self) {
        self.frame_cnt = 0;
        self.dict_cursor = 0;
        self.value_cursor.index = 0;
    }

    /// Reset all send state and open the warm-up window at `now`
    pub fn begin(&mut self, now: Instant, with_warmup: bool) {
        self.frame_cnt = 0;
        self.dict_cursor = 0;
        self.value_cursor = ValueCursor::default();
        self.last_send = None;

        self.warmup = if with_warmup && !self.warmup_len.is_zero() {
            info!("Warm-up for {:?}", self.warmup_len);
            Some(Warmup {
                deadline: now + self.warmup_len,
                step: 0,
                next_at: now,
            })
        } else {
            None
        };
    }

    /// Run one scheduling step
    ///
    /// # Arguments
    ///
    /// * `now` - Current time
    /// * `catalog` - Registered sensors, if any
    /// * `text` - Jetibox display contents
    /// * `transport` - Where the words go
    ///
    /// # Returns
    ///
    /// * `TickOutcome` - What was sent, or `Idle` when nothing was due
    pub fn tick<T: ExTransport + ?Sized>(
        &mut self,
        now: Instant,
        catalog: Option<&SensorCatalog>,
        text: &JetiboxText,
        transport: &T,
    ) -> TickOutcome {
        if let Some(warmup) = self.warmup {
            if now < warmup.next_at {
                return TickOutcome::Idle;
            }

            if warmup.step != 0 || now < warmup.deadline {
                if let Some(catalog) = catalog {
                    self.warmup_step(now, warmup, catalog, text, transport);
                    return TickOutcome::Warmup;
                }
            }

            self.finish_warmup(transport);
        }

        if let Some(last) = self.last_send {
            if now.duration_since(last) < self.send_cycle {
                return TickOutcome::Idle;
            }
        }
        self.last_send = Some(now);

        let outcome = if self.pending_exit {
            self.pending_exit = false;
            transport.send_words(&exit_words());
            TickOutcome::Exit
        } else if let Some(code) = self.pending_alarm.take() {
            transport.send_words(&alarm_words(code));
            TickOutcome::Alarm(code)
        } else if let Some(catalog) = catalog {
            let (frame, kind) = self.ex_frame(self.frame_cnt, catalog);
            self.frame_cnt = self.frame_cnt.wrapping_add(1);
            send_frame(transport, &frame);
            TickOutcome::Frame(kind)
        } else {
            TickOutcome::Text
        };

        transport.send_words(&text.frame_words());
        debug!("Sent {:?}", outcome);
        outcome
    }

    fn warmup_step<T: ExTransport + ?Sized>(
        &mut self,
        now: Instant,
        mut warmup: Warmup,
        catalog: &SensorCatalog,
        text: &JetiboxText,
        transport: &T,
    ) {
        let steps = WARMUP_TEXT_FRAMES + catalog.len() + 1;

        if warmup.step >= WARMUP_TEXT_FRAMES {
            let counter = ((warmup.step - WARMUP_TEXT_FRAMES) * 2) as u8;
            let (frame, kind) = self.ex_frame(counter, catalog);
            trace!("Warm-up step {}: {:?}", warmup.step, kind);
            send_frame(transport, &frame);
        }
        transport.send_words(&text.frame_words());

        warmup.step = (warmup.step + 1) % steps;
        warmup.next_at = now + WARMUP_STEP;
        self.warmup = Some(warmup);
    }

    fn finish_warmup<T: ExTransport + ?Sized>(&mut self, transport: &T) {
        let mut flushed = 0usize;
        while transport.getchar().is_some() {
            flushed += 1;
        }
        self.warmup = None;
        info!("Warm-up finished, {} stale key(s) flushed", flushed);
    }

    fn ex_frame(&mut self, counter: u8, catalog: &SensorCatalog) -> (ExFrame, FrameKind) {
        if counter == 0 {
            return (self.builder.name_frame(), FrameKind::Name);
        }

        if counter % 2 == 0 && (counter / 2) as usize <= catalog.len() {
            if let Some(frame) = self.builder.dictionary_frame(catalog, &mut self.dict_cursor) {
                return (frame, FrameKind::Dictionary);
            }
        }

        (
            self.builder.value_frame(catalog, &mut self.value_cursor),
            FrameKind::Values,
        )
    }
}

fn send_frame<T: ExTransport + ?Sized>(transport: &T, frame: &ExFrame) {
    for word in frame.words() {
        transport.send(word.data, word.ninth_bit);
    }
}
