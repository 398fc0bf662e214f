//! Time-based rotating writer for newline-delimited streams.
//!
//! Lines read from an input are appended to an active file which is retired
//! into a numbered backup chain (`<path>.1` newest) on a fixed interval.

pub mod config;
pub mod driver;
pub mod error;
pub mod ingest;
pub mod rotation;
pub mod sink;

use std::io::Read;

use log::info;

pub use config::RotateConfig;
pub use driver::{Driver, DriverState, DriverStats};
pub use error::{Error, Result};
pub use ingest::{spawn_line_reader, IngestStats, Line, LineFeed, Lines};
pub use rotation::{backup_path, rotate, FileRotator, Rotate};
pub use sink::OutputSink;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub driver: DriverStats,
    pub ingest: IngestStats,
}

/// Copies `input` into the rotating file described by `config` until the
/// input ends.
///
/// Any error is fatal: the on-disk chain is left as the last successful
/// filesystem call produced it.
pub fn run<I>(config: &RotateConfig, input: I) -> Result<RunStats>
where
    I: Read + Send + 'static,
{
    config.validate()?;
    info!(
        "writing to {} (rotate every {:?}, keep {})",
        config.path.display(),
        config.interval,
        config.keep
    );

    let rotator = FileRotator::new(&config.path, config.keep);
    let driver = Driver::start(rotator, config)?;
    let (receiver, reader) = spawn_line_reader(input, config.queue_capacity)?.into_parts();

    // On failure the reader may be parked on a blocking read; leave it.
    let driver = driver.run(&receiver)?;
    drop(receiver);
    let ingest = reader.join().map_err(|_| Error::IngestPanicked)?;

    Ok(RunStats { driver, ingest })
}
