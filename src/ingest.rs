//! Line ingestion.
//!
//! A dedicated thread reads the input, splits it on `\n` and pushes complete
//! lines into a bounded channel. A full channel blocks the thread, which in
//! turn stops reading the input. End of input (or a read error) drops the
//! sender, which is how the consumer learns no more lines will arrive.

use std::io::{self, BufRead, BufReader, Read};
use std::sync::mpsc::{self, Receiver};
use std::thread::{self, JoinHandle};

use log::{debug, warn};

use crate::{Error, Result};

pub const DEFAULT_QUEUE_CAPACITY: usize = 10_000;

/// One complete line, terminator included.
pub type Line = Vec<u8>;

/// Lazy splitter yielding complete `\n`-terminated lines.
///
/// An unterminated fragment at end of input is dropped and its length is
/// recorded in [`Lines::dropped_tail`]. A read error ends the sequence the
/// same way a clean end of input does.
pub struct Lines<R> {
    reader: R,
    done: bool,
    read_error: Option<io::Error>,
    dropped_tail: usize,
}

impl<R: BufRead> Lines<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            done: false,
            read_error: None,
            dropped_tail: 0,
        }
    }

    pub fn dropped_tail(&self) -> usize {
        self.dropped_tail
    }

    /// The read error that ended the stream, if it did not end cleanly.
    pub fn read_error(&self) -> Option<&io::Error> {
        self.read_error.as_ref()
    }
}

impl<R: BufRead> Iterator for Lines<R> {
    type Item = Line;

    fn next(&mut self) -> Option<Line> {
        if self.done {
            return None;
        }
        let mut line = Vec::new();
        loop {
            match self.reader.read_until(b'\n', &mut line) {
                Ok(_) if line.ends_with(b"\n") => return Some(line),
                // read_until only stops short of the delimiter at EOF.
                Ok(_) => {
                    self.done = true;
                    self.dropped_tail = line.len();
                    return None;
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => {
                    self.done = true;
                    self.dropped_tail = line.len();
                    self.read_error = Some(err);
                    return None;
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub lines: u64,
    pub bytes: u64,
    pub dropped_tail_bytes: u64,
}

/// Receiving half of a running line reader.
pub struct LineFeed {
    pub receiver: Receiver<Line>,
    handle: JoinHandle<IngestStats>,
}

impl LineFeed {
    /// Waits for the reader thread to finish.
    pub fn join(self) -> Result<IngestStats> {
        drop(self.receiver);
        self.handle.join().map_err(|_| Error::IngestPanicked)
    }

    /// Splits into the channel and the thread handle.
    pub fn into_parts(self) -> (Receiver<Line>, JoinHandle<IngestStats>) {
        (self.receiver, self.handle)
    }
}

/// Starts reading `input` on a background thread.
///
/// At most `capacity` lines are queued before the reader blocks.
pub fn spawn_line_reader<R>(input: R, capacity: usize) -> Result<LineFeed>
where
    R: Read + Send + 'static,
{
    let (tx, rx) = mpsc::sync_channel::<Line>(capacity);

    let handle = thread::Builder::new()
        .name("rotlog-ingest".to_string())
        .spawn(move || {
            let mut lines = Lines::new(BufReader::new(input));
            let mut stats = IngestStats::default();
            for line in lines.by_ref() {
                let len = line.len() as u64;
                if tx.send(line).is_err() {
                    debug!("line consumer hung up, stopping reader");
                    return stats;
                }
                stats.lines += 1;
                stats.bytes += len;
            }
            if let Some(err) = lines.read_error() {
                warn!("input read failed, treating as end of input: {err}");
            }
            if lines.dropped_tail() > 0 {
                warn!(
                    "dropping {} bytes of unterminated input at end of stream",
                    lines.dropped_tail()
                );
            }
            stats.dropped_tail_bytes = lines.dropped_tail() as u64;
            stats
        })?;

    Ok(LineFeed {
        receiver: rx,
        handle,
    })
}
