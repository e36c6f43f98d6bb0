//! # Frame Capture
//!
//! Appends every packet put on the wire to JSON Lines files.
//!
//! A new file is started after `max_records_per_file` records; only the newest
//! `max_files_to_keep` files are retained.
//!
//! ```text
//! {"timestamp":"2026-10-19T08:15:02.113Z","kind":"ex","manufacturer_id":41993,...}
//! {"timestamp":"2026-10-19T08:15:02.114Z","kind":"text","line1":"Demo","line2":""}
//! ```

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::CaptureConfig;
use crate::error::Result;
use crate::ex::decoder::Packet;

const FILE_PREFIX: &str = "ex_capture_";
const FILE_SUFFIX: &str = ".jsonl";

#[derive(Serialize)]
struct CaptureRecord<'a> {
    timestamp: DateTime<Utc>,
    #[serde(flatten)]
    packet: &'a Packet,
}

/// Rotating JSONL writer for decoded packets
pub struct FrameCapture {
    dir: PathBuf,
    max_records_per_file: usize,
    max_files_to_keep: usize,
    writer: Option<BufWriter<File>>,
    current_path: Option<PathBuf>,
    records_in_file: usize,
    file_seq: u32,
}

impl std::fmt::Debug for FrameCapture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameCapture")
            .field("dir", &self.dir)
            .field("current_path", &self.current_path)
            .field("records_in_file", &self.records_in_file)
            .finish_non_exhaustive()
    }
}

impl FrameCapture {
    /// Create a capture writing into `dir`, creating it if needed
    ///
    /// # Errors
    ///
    /// Returns error if the directory cannot be created
    pub fn new<P: AsRef<Path>>(dir: P, max_records_per_file: usize, max_files_to_keep: usize) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        info!("Capturing frames to {}", dir.display());

        Ok(Self {
            dir,
            max_records_per_file: max_records_per_file.max(1),
            max_files_to_keep: max_files_to_keep.max(1),
            writer: None,
            current_path: None,
            records_in_file: 0,
            file_seq: 0,
        })
    }

    pub fn from_config(config: &CaptureConfig) -> Result<Self> {
        Self::new(&config.dir, config.max_records_per_file, config.max_files_to_keep)
    }

    /// Append one packet, rotating first if the current file is full
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be created or written
    pub fn record(&mut self, packet: &Packet) -> Result<()> {
        if self.writer.is_none() || self.records_in_file >= self.max_records_per_file {
            self.rotate()?;
        }

        let record = CaptureRecord {
            timestamp: Utc::now(),
            packet,
        };

        if let Some(writer) = self.writer.as_mut() {
            serde_json::to_writer(&mut *writer, &record)?;
            writer.write_all(b"\n")?;
            writer.flush()?;
            self.records_in_file += 1;
        }
        Ok(())
    }

    /// File currently written to
    pub fn current_file(&self) -> Option<&Path> {
        self.current_path.as_deref()
    }

    fn rotate(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
        }

        let name = format!(
            "{}{}_{:04}{}",
            FILE_PREFIX,
            Utc::now().format("%Y%m%d_%H%M%S"),
            self.file_seq,
            FILE_SUFFIX
        );
        self.file_seq = self.file_seq.wrapping_add(1);

        let path = self.dir.join(name);
        let file = File::create(&path)?;
        debug!("Capture file {}", path.display());

        self.writer = Some(BufWriter::new(file));
        self.current_path = Some(path);
        self.records_in_file = 0;

        self.prune()
    }

    fn prune(&self) -> Result<()> {
        let mut files: Vec<PathBuf> = fs::read_dir(&self.dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .map(|n| n.starts_with(FILE_PREFIX) && n.ends_with(FILE_SUFFIX))
                    .unwrap_or(false)
            })
            .collect();

        if files.len() <= self.max_files_to_keep {
            return Ok(());
        }

        files.sort();
        let excess = files.len() - self.max_files_to_keep;
        for path in files.iter().take(excess) {
            if let Err(e) = fs::remove_file(path) {
                warn!("Failed to remove old capture {}: {}", path.display(), e);
            }
        }
        Ok(())
    }
}
