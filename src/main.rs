//! # JetiEx Uplink
//!
//! Host bench for the EX uplink: runs the telemetry scheduler against a USB
//! serial adapter (or a null wire) with a small demo sensor set.
//!
//! ```bash
//! jetiex-uplink config/default.toml
//! RUST_LOG=jetiex_uplink=debug jetiex-uplink
//! ```

use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use chrono::{Datelike, Local, Timelike};
use tokio::time::{interval, Duration};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use jetiex_uplink::config::Config;
use jetiex_uplink::ex::jetibox::TextLine;
use jetiex_uplink::ex::protocol::{priority, DataType, Precision, SensorDefinition};
use jetiex_uplink::ex::value::SensorValue;
use jetiex_uplink::serial::host::{HostUart, LinkPump, NullWire, TokioSerialPort, WireIo};
use jetiex_uplink::serial::{irq, HalfDuplexLink, LineSettings};
use jetiex_uplink::telemetry::capture::FrameCapture;
use jetiex_uplink::telemetry::ExTelemetry;

const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Scheduler and pump period; well below the shortest send cycle
const TICK_INTERVAL: Duration = Duration::from_millis(5);

/// Ticks between two demo value updates
const UPDATE_EVERY_TICKS: u64 = 20;

const ID_VOLTAGE: u8 = 1;
const ID_ALTITUDE: u8 = 2;
const ID_TEMPERATURE: u8 = 3;
const ID_DATE: u8 = 4;
const ID_TIME: u8 = 5;
const ID_LATITUDE: u8 = 6;
const ID_LONGITUDE: u8 = 7;

static DEMO_SENSORS: [SensorDefinition; 8] = [
    SensorDefinition::new(ID_VOLTAGE, "Voltage", "V", DataType::Int14, Precision::One),
    SensorDefinition::new(ID_ALTITUDE, "Altitude", "m", DataType::Int22, Precision::Zero),
    SensorDefinition::new(ID_TEMPERATURE, "Temp", "C", DataType::Int14, Precision::One),
    SensorDefinition::new(ID_DATE, "Date", " ", DataType::DateTime, Precision::One),
    SensorDefinition::new(ID_TIME, "Time", " ", DataType::DateTime, Precision::Zero),
    SensorDefinition::new(ID_LATITUDE, "Latitude", " ", DataType::Gps, Precision::Zero),
    SensorDefinition::new(ID_LONGITUDE, "Longitude", " ", DataType::Gps, Precision::Zero),
    SensorDefinition::END,
];

#[tokio::main]
async fn main() -> Result<()> {
    let config = load_config()?;
    let _log_guard = init_logging(&config);

    info!("JetiEx Uplink v{} starting...", env!("CARGO_PKG_VERSION"));

    let link: &'static HalfDuplexLink<HostUart> = Box::leak(Box::new(HalfDuplexLink::new(
        HostUart::new(),
        LineSettings::ex(config.serial.baud_rate),
    )));
    irq::bind(link);

    let mut telemetry = ExTelemetry::new(link);
    telemetry.set_device_id(config.protocol.device_id);
    telemetry.set_send_cycle(config.protocol.send_cycle());
    telemetry.set_warmup(config.protocol.warmup());
    telemetry.register_catalog(&DEMO_SENSORS);
    telemetry
        .start(&config.protocol.name, Instant::now())
        .context("Failed to start EX link")?;
    telemetry.set_text(TextLine::Line1, &config.protocol.name);

    let capture = if config.capture.enabled {
        Some(FrameCapture::from_config(&config.capture).context("Failed to open capture dir")?)
    } else {
        None
    };

    if config.serial.enabled {
        let port = TokioSerialPort::open(
            &config.serial.port,
            config.serial.baud_rate,
            config.serial.read_timeout(),
        )?;
        info!("Serial adapter opened at: {}", config.serial.port);
        run(telemetry, pump(link, port, capture)).await
    } else {
        info!("Serial adapter disabled, frames go to a null wire");
        run(telemetry, pump(link, NullWire::new(), capture)).await
    }
}

fn pump<W: WireIo>(
    link: &'static HalfDuplexLink<HostUart>,
    wire: W,
    capture: Option<FrameCapture>,
) -> LinkPump<W> {
    let pump = LinkPump::new(link, wire);
    match capture {
        Some(capture) => pump.with_capture(capture),
        None => pump,
    }
}

fn load_config() -> Result<Config> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

    if Path::new(&path).exists() {
        Config::load(&path).with_context(|| format!("Failed to load config from {}", path))
    } else {
        Ok(Config::default())
    }
}

/// Install the subscriber; the returned guard flushes the log file on drop
fn init_logging(config: &Config) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match &config.logging.dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "jetiex-uplink.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
            None
        }
    }
}

async fn run<W: WireIo>(
    mut telemetry: ExTelemetry<&'static HalfDuplexLink<HostUart>>,
    mut pump: LinkPump<W>,
) -> Result<()> {
    let mut ticker = interval(TICK_INTERVAL);
    let mut ticks: u64 = 0;
    let mut words_out: usize = 0;

    info!("Press Ctrl+C to exit");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if ticks % UPDATE_EVERY_TICKS == 0 {
                    update_demo_values(&mut telemetry, ticks);
                }
                ticks += 1;

                telemetry.tick(Instant::now());

                match pump.service().await {
                    Ok(n) => words_out += n,
                    Err(e) => warn!("Link pump failed: {}", e),
                }

                if let Some(key) = telemetry.jetibox_key() {
                    info!("Jetibox key: {}", key);
                    if key.left() && key.right() {
                        telemetry.request_exit();
                    }
                    telemetry.set_text(TextLine::Line2, &format!("Key {}", key));
                }
            }

            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }
        }
    }

    let link = telemetry.transport();
    info!(
        "Words sent: {}, dropped: {}",
        words_out,
        link.dropped_words()
    );
    irq::unbind();
    Ok(())
}

fn update_demo_values(telemetry: &mut ExTelemetry<&'static HalfDuplexLink<HostUart>>, ticks: u64) {
    let phase = (ticks / UPDATE_EVERY_TICKS) as i32;
    let now = Local::now();

    // 11.1 V to 12.6 V sawtooth, one decimal
    telemetry.set_value(ID_VOLTAGE, 111 + phase % 16);
    telemetry.set_value_with_priority(ID_ALTITUDE, 250 + (phase % 100) - 50, priority::HIGH);
    telemetry.set_value_with_priority(ID_TEMPERATURE, 215, priority::LOW);
    telemetry.set_value_with_priority(
        ID_DATE,
        SensorValue::Date {
            day: now.day() as u8,
            month: now.month() as u8,
            year: now.year().clamp(2000, 2255) as u16,
        },
        priority::ULTRA_LOW,
    );
    telemetry.set_value_with_priority(
        ID_TIME,
        SensorValue::Time {
            hour: now.hour() as u8,
            minute: now.minute() as u8,
            second: now.second() as u8,
        },
        priority::STANDARD,
    );
    telemetry.set_value_with_priority(
        ID_LATITUDE,
        SensorValue::Gps { degrees: 48.24570, longitude: false },
        priority::STANDARD,
    );
    telemetry.set_value_with_priority(
        ID_LONGITUDE,
        SensorValue::Gps { degrees: 11.55616, longitude: true },
        priority::STANDARD,
    );

    debug!("Demo values updated (phase {})", phase);
}
