//! Single-consumer loop tying the line queue, the rotation timer and the sink
//! together.
//!
//! # States
//!
//! ```text
//! start() ──> Running ──(queue closed)──> Draining ──(sink closed)──> Stopped
//! ```
//!
//! The driver is the only owner of the sink, so rotation and writes are
//! serialized without locks. When the timer is due, lines already waiting in
//! the queue are written to the current file first (bounded by the queue
//! capacity), then the file is rotated.

use std::sync::mpsc::{Receiver, RecvTimeoutError, TryRecvError};
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::config::RotateConfig;
use crate::ingest::Line;
use crate::rotation::Rotate;
use crate::sink::OutputSink;
use crate::Result;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DriverState {
    #[default]
    Running,
    Draining,
    Stopped,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriverStats {
    pub lines: u64,
    pub bytes: u64,
    /// Rotations after the initial one.
    pub rotations: u64,
    pub state: DriverState,
}

pub struct Driver<R: Rotate> {
    rotator: R,
    sink: OutputSink<R::Handle>,
    interval: Duration,
    drain_limit: usize,
    state: DriverState,
    rotations: u64,
}

impl<R: Rotate> Driver<R> {
    /// Performs the initial rotation so an active file exists before the
    /// first line arrives.
    pub fn start(mut rotator: R, config: &RotateConfig) -> Result<Self> {
        let handle = rotator.rotate()?;
        debug!("initial rotation complete");
        Ok(Self {
            rotator,
            sink: OutputSink::with_capacity(config.write_buffer, handle),
            interval: config.interval,
            drain_limit: config.queue_capacity.max(1),
            state: DriverState::Running,
            rotations: 0,
        })
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn stats(&self) -> DriverStats {
        DriverStats {
            lines: self.sink.lines(),
            bytes: self.sink.bytes(),
            rotations: self.rotations,
            state: self.state,
        }
    }

    pub fn write_line(&mut self, line: &[u8]) -> Result<()> {
        self.sink.write(line)
    }

    /// Retires the active file and switches the sink to a fresh one.
    pub fn rotate_now(&mut self) -> Result<()> {
        self.sink.flush()?;
        let handle = self.rotator.rotate()?;
        self.sink.rotate_to(handle)?;
        self.rotations += 1;
        info!("rotation {} complete", self.rotations);
        Ok(())
    }

    /// Flushes and closes the active file. The returned stats carry the
    /// final state, `Stopped`.
    pub fn finish(mut self) -> Result<DriverStats> {
        self.state = DriverState::Draining;
        debug!("driver {:?}", self.state);
        let mut stats = self.stats();
        self.sink.close()?;
        self.state = DriverState::Stopped;
        stats.state = self.state;
        debug!("driver {:?}", self.state);
        info!(
            "wrote {} lines ({} bytes) across {} rotations",
            stats.lines, stats.bytes, stats.rotations
        );
        Ok(stats)
    }

    /// Consumes `lines` until the sender side hangs up, rotating every
    /// `interval`.
    pub fn run(mut self, lines: &Receiver<Line>) -> Result<DriverStats> {
        let mut deadline = Instant::now().checked_add(self.interval);
        loop {
            let timeout = match deadline {
                Some(due) => {
                    let now = Instant::now();
                    if now >= due {
                        if !self.drain_ready(lines)? {
                            break;
                        }
                        self.rotate_now()?;
                        deadline = next_deadline(due, self.interval, Instant::now());
                        continue;
                    }
                    Some(due - now)
                }
                None => None,
            };

            let line = match lines.try_recv() {
                Ok(line) => line,
                Err(TryRecvError::Disconnected) => break,
                Err(TryRecvError::Empty) => {
                    // Idle: push buffered bytes out before blocking.
                    self.sink.flush()?;
                    let received = match timeout {
                        Some(timeout) => match lines.recv_timeout(timeout) {
                            Ok(line) => Some(line),
                            Err(RecvTimeoutError::Timeout) => continue,
                            Err(RecvTimeoutError::Disconnected) => None,
                        },
                        None => lines.recv().ok(),
                    };
                    match received {
                        Some(line) => line,
                        None => break,
                    }
                }
            };
            self.write_line(&line)?;
        }
        self.finish()
    }

    /// Writes lines already queued, up to the drain limit. Returns false once
    /// the queue is closed.
    fn drain_ready(&mut self, lines: &Receiver<Line>) -> Result<bool> {
        for _ in 0..self.drain_limit {
            match lines.try_recv() {
                Ok(line) => self.write_line(&line)?,
                Err(TryRecvError::Empty) => return Ok(true),
                Err(TryRecvError::Disconnected) => return Ok(false),
            }
        }
        Ok(true)
    }
}

/// First tick of a ticker anchored at `last` that falls strictly after `now`.
///
/// Missed ticks are coalesced. When the anchored tick is not representable
/// the ticker re-anchors at `now`; `None` means the timer never fires again.
pub fn next_deadline(last: Instant, interval: Duration, now: Instant) -> Option<Instant> {
    if interval.is_zero() {
        return None;
    }
    let elapsed = now.saturating_duration_since(last);
    let periods = elapsed.as_nanos() / interval.as_nanos() + 1;
    let anchored = u32::try_from(periods)
        .ok()
        .and_then(|periods| interval.checked_mul(periods))
        .and_then(|offset| last.checked_add(offset));
    if anchored.is_some() {
        return anchored;
    }
    warn!("rotation timer fell {periods} periods behind, re-anchoring");
    now.checked_add(interval)
}
