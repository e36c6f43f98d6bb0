//! # Telemetry Module
//!
//! The sensor-side EX uplink as seen by an application.
//!
//! This module handles:
//! - Holding the sensor catalog and the Jetibox text
//! - Scheduling name, dictionary, value, alarm and exit frames
//! - Reading Jetibox keys coming back from the receiver
//! - Capturing transmitted packets to rotating JSONL files
//!
//! # Examples
//!
//! ```
//! use std::time::Instant;
//! use jetiex_uplink::ex::protocol::{DataType, Precision, SensorDefinition};
//! use jetiex_uplink::ex::jetibox::TextLine;
//! use jetiex_uplink::telemetry::ExTelemetry;
//! # use jetiex_uplink::serial::ExTransport;
//! # struct Sink;
//! # impl ExTransport for Sink {
//! #     fn send(&self, _: u8, _: bool) {}
//! #     fn getchar(&self) -> Option<u8> { None }
//! # }
//! # let transport = Sink;
//!
//! static SENSORS: [SensorDefinition; 2] = [
//!     SensorDefinition::new(1, "Voltage", "V", DataType::Int14, Precision::One),
//!     SensorDefinition::END,
//! ];
//!
//! let mut telemetry = ExTelemetry::new(transport);
//! telemetry.register_catalog(&SENSORS);
//! telemetry.start("Battery", Instant::now())?;
//!
//! telemetry.set_value(1, 126);
//! telemetry.set_text(TextLine::Line1, "12.6 V");
//! telemetry.tick(Instant::now());
//! # Ok::<(), jetiex_uplink::error::JetiExError>(())
//! ```

pub mod capture;
pub mod scheduler;

use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::error::Result;
use crate::ex::catalog::SensorCatalog;
use crate::ex::encoder::FrameBuilder;
use crate::ex::jetibox::{JetiboxKey, JetiboxText, TextLine};
use crate::ex::protocol::{priority, SensorDefinition};
use crate::ex::value::SensorValue;
use crate::serial::ExTransport;

pub use scheduler::{FrameKind, Scheduler, TickOutcome};

/// EX telemetry endpoint over one transport
pub struct ExTelemetry<T: ExTransport> {
    transport: T,
    catalog: Option<SensorCatalog>,
    text: JetiboxText,
    scheduler: Scheduler,
    started: bool,
}

impl<T: ExTransport> ExTelemetry<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            catalog: None,
            text: JetiboxText::new(),
            scheduler: Scheduler::new(FrameBuilder::new("")),
            started: false,
        }
    }

    /// Register the sensor table; only the first registration takes effect
    pub fn register_catalog(&mut self, definitions: &'static [SensorDefinition]) {
        if self.catalog.is_some() {
            debug!("Sensor catalog already registered");
            return;
        }
        let catalog = SensorCatalog::new(definitions);
        info!("Registered {} sensor(s)", catalog.len());
        self.catalog = Some(catalog);
    }

    /// Bring up the transport and begin the frame sequence
    ///
    /// With a catalog registered, the following ticks replay the dictionary
    /// during the warm-up window before normal cycling begins. Starting an
    /// already started endpoint does nothing.
    ///
    /// # Errors
    ///
    /// Returns error if the transport cannot be started
    pub fn start(&mut self, name: &str, now: Instant) -> Result<()> {
        if self.started {
            debug!("EX telemetry already started");
            return Ok(());
        }
        self.transport.start()?;

        let device_id = self.scheduler.builder().device_id();
        let builder = self.scheduler.builder_mut();
        *builder = FrameBuilder::new(name);
        builder.set_device_id(device_id);

        self.scheduler.begin(now, self.catalog.is_some());
        self.started = true;
        info!("EX telemetry started as {:?}", name);
        Ok(())
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Enable or disable a sensor; known ids restart dictionary and value rotation
    pub fn set_sensor_active(&mut self, id: u8, enabled: bool) {
        let Some(catalog) = self.catalog.as_mut() else {
            return;
        };
        if catalog.set_active(id, enabled) {
            debug!("Sensor {} {}", id, if enabled { "enabled" } else { "disabled" });
            self.scheduler.reset_cursors();
        }
    }

    pub fn is_sensor_active(&self, id: u8) -> bool {
        self.catalog
            .as_ref()
            .map(|catalog| catalog.is_active(id))
            .unwrap_or(false)
    }

    /// Set a value sent with every value frame
    pub fn set_value(&mut self, id: u8, value: impl Into<SensorValue>) {
        self.set_value_with_priority(id, value, priority::ULTRA_HIGH);
    }

    /// Set a value sent only in every `priority`-th round
    pub fn set_value_with_priority(&mut self, id: u8, value: impl Into<SensorValue>, priority: u8) {
        if let Some(catalog) = self.catalog.as_mut() {
            catalog.set_value(id, value.into().to_raw(), priority);
        }
    }

    /// Queue a morse alarm; upper case sounds, lower case is silent
    pub fn set_alarm(&mut self, code: u8) {
        self.scheduler.set_alarm(code);
    }

    /// Leave the Jetibox navigation at the next send
    pub fn request_exit(&mut self) {
        self.scheduler.request_exit();
    }

    pub fn set_text(&mut self, line: TextLine, text: &str) {
        self.text.set_line(line, text);
    }

    pub fn set_send_cycle(&mut self, cycle: Duration) {
        self.scheduler.set_send_cycle(cycle);
    }

    pub fn set_warmup(&mut self, warmup: Duration) {
        self.scheduler.set_warmup(warmup);
    }

    /// Override the device id; useful with several sensor devices on one receiver
    pub fn set_device_id(&mut self, device_id: u16) {
        self.scheduler.builder_mut().set_device_id(device_id);
    }

    /// Next key pressed on the Jetibox, if any
    pub fn jetibox_key(&self) -> Option<JetiboxKey> {
        self.transport.getchar().and_then(JetiboxKey::from_code)
    }

    /// Run the scheduler; call this often, it sends at most once per cycle
    pub fn tick(&mut self, now: Instant) -> TickOutcome {
        if !self.started {
            return TickOutcome::Idle;
        }
        self.scheduler
            .tick(now, self.catalog.as_ref(), &self.text, &self.transport)
    }

    pub fn catalog(&self) -> Option<&SensorCatalog> {
        self.catalog.as_ref()
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }
}
