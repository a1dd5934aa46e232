//! Scalar summary logging.
//!
//! Each scalar is appended as one JSON object per line, which keeps the log
//! readable while training is still writing to it.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use facesr_core::{Result, Timestamp};

/// File name of the scalar log inside a run's log directory
pub const SCALARS_FILE: &str = "scalars.jsonl";

/// One logged scalar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalarEvent {
    pub tag: String,
    pub value: f32,
    pub step: u64,
    /// Seconds since the Unix epoch
    pub wall_time: f64,
}

/// Appends scalar events to `<dir>/scalars.jsonl`
pub struct SummaryWriter {
    writer: BufWriter<File>,
    path: PathBuf,
}

impl SummaryWriter {
    /// Create (or append to) the scalar log in `dir`
    pub fn create<P: AsRef<Path>>(dir: P) -> Result<Self> {
        fs::create_dir_all(dir.as_ref())?;
        let path = dir.as_ref().join(SCALARS_FILE);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        tracing::info!(path = %path.display(), "Opened summary log");

        Ok(Self {
            writer: BufWriter::new(file),
            path,
        })
    }

    pub fn scalar(&mut self, tag: &str, value: f32, step: u64) -> Result<()> {
        let event = ScalarEvent {
            tag: tag.to_string(),
            value,
            step,
            wall_time: Timestamp::now().as_secs_f64(),
        };
        serde_json::to_writer(&mut self.writer, &event)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for SummaryWriter {
    fn drop(&mut self) {
        if let Err(e) = self.writer.flush() {
            tracing::warn!("Failed to flush summary log: {}", e);
        }
    }
}

/// Read every event from a scalar log
pub fn read_scalars<P: AsRef<Path>>(path: P) -> Result<Vec<ScalarEvent>> {
    let reader = BufReader::new(File::open(path)?);
    let mut events = Vec::new();

    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        events.push(serde_json::from_str(&line)?);
    }

    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_and_read_scalars() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let log_dir = dir.path().join("logs").join("run");

        {
            let mut writer = SummaryWriter::create(&log_dir)?;
            writer.scalar("con_loss", 0.5, 0)?;
            writer.scalar("disc_loss", 1.25, 0)?;
            writer.flush()?;
        }
        {
            // Reopening appends
            let mut writer = SummaryWriter::create(&log_dir)?;
            writer.scalar("con_loss", 0.25, 1)?;
        }

        let events = read_scalars(log_dir.join(SCALARS_FILE))?;
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].tag, "con_loss");
        assert_eq!(events[1].value, 1.25);
        assert_eq!(events[2].step, 1);
        assert!(events[2].wall_time >= events[0].wall_time);
        Ok(())
    }
}
