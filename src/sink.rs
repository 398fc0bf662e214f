use std::io::{BufWriter, Write};

use crate::{Error, Result};

pub const DEFAULT_WRITE_BUFFER: usize = 8 * 1024;

/// Buffered writer over exactly one active handle.
///
/// The handle is only ever swapped through [`OutputSink::rotate_to`], which
/// drains the buffer into the old handle before adopting the new one, so a
/// buffered byte can never land in the wrong file.
pub struct OutputSink<W: Write> {
    writer: BufWriter<W>,
    capacity: usize,
    lines: u64,
    bytes: u64,
}

impl<W: Write> OutputSink<W> {
    pub fn new(handle: W) -> Self {
        Self::with_capacity(DEFAULT_WRITE_BUFFER, handle)
    }

    /// A capacity of 0 passes every line straight to the handle.
    pub fn with_capacity(capacity: usize, handle: W) -> Self {
        Self {
            writer: BufWriter::with_capacity(capacity, handle),
            capacity,
            lines: 0,
            bytes: 0,
        }
    }

    pub fn write(&mut self, line: &[u8]) -> Result<()> {
        self.writer.write_all(line).map_err(Error::Write)?;
        self.lines += 1;
        self.bytes += line.len() as u64;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush().map_err(Error::Flush)
    }

    /// Flushes and closes the current handle, then adopts `handle`.
    pub fn rotate_to(&mut self, handle: W) -> Result<()> {
        self.flush()?;
        let old = std::mem::replace(
            &mut self.writer,
            BufWriter::with_capacity(self.capacity, handle),
        );
        drop(old);
        Ok(())
    }

    /// Final flush and close, used at shutdown.
    pub fn close(mut self) -> Result<()> {
        self.writer.flush().map_err(Error::Close)?;
        drop(self.writer);
        Ok(())
    }

    /// Lines written since the sink was created, across rotations.
    pub fn lines(&self) -> u64 {
        self.lines
    }

    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    pub fn buffered(&self) -> usize {
        self.writer.buffer().len()
    }
}
