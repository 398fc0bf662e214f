use std::path::PathBuf;
use std::time::Duration;

use crate::ingest::DEFAULT_QUEUE_CAPACITY;
use crate::sink::DEFAULT_WRITE_BUFFER;
use crate::{Error, Result};

pub const DEFAULT_OUTPUT: &str = "output.log";
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_KEEP: usize = 9;

/// Settings fixed for the lifetime of a run.
#[derive(Debug, Clone)]
pub struct RotateConfig {
    /// Active file; backups are written next to it as `<path>.<n>`.
    pub path: PathBuf,
    pub interval: Duration,
    /// Number of backups retained. 0 keeps none.
    pub keep: usize,
    /// Lines buffered between the reader thread and the writer.
    pub queue_capacity: usize,
    /// Bytes buffered in front of the active file.
    pub write_buffer: usize,
}

impl RotateConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.path.file_name().is_none() {
            return Err(Error::InvalidConfig("output path has no file name"));
        }
        if self.interval.is_zero() {
            return Err(Error::InvalidConfig("rotation interval must be non-zero"));
        }
        if self.queue_capacity == 0 {
            return Err(Error::InvalidConfig("queue capacity must be at least 1"));
        }
        Ok(())
    }
}

impl Default for RotateConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_OUTPUT),
            interval: DEFAULT_INTERVAL,
            keep: DEFAULT_KEEP,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            write_buffer: DEFAULT_WRITE_BUFFER,
        }
    }
}
