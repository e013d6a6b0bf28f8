use std::time::Duration;

use crate::error::HarnessResult;

/// Byte-oriented, half-duplex channel to the deck.
///
/// A read timeout is not an error at this layer: `read_line` returns
/// `Ok(None)` when no complete line arrived within the budget.
pub trait Link {
    /// Acquire the underlying device. Calling on an open link is a no-op.
    fn open(&mut self) -> HarnessResult<()>;
    /// Release the device. Never fails, safe to call repeatedly.
    fn close(&mut self);
    fn is_open(&self) -> bool;
    /// Send raw bytes, failing with `WriteTimeout` if the device stalls.
    fn write(&mut self, bytes: &[u8]) -> HarnessResult<()>;
    /// Block up to `timeout` for one newline-terminated line (terminator included).
    fn read_line(&mut self, timeout: Duration) -> HarnessResult<Option<Vec<u8>>>;
}

impl<L: Link + ?Sized> Link for Box<L> {
    fn open(&mut self) -> HarnessResult<()> {
        (**self).open()
    }

    fn close(&mut self) {
        (**self).close()
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }

    fn write(&mut self, bytes: &[u8]) -> HarnessResult<()> {
        (**self).write(bytes)
    }

    fn read_line(&mut self, timeout: Duration) -> HarnessResult<Option<Vec<u8>>> {
        (**self).read_line(timeout)
    }
}

/// Accumulates raw reads and splits them on `\n`.
///
/// Bytes after the last terminator stay buffered, so a line split across two
/// reads (or across a read timeout) is delivered whole once it completes.
#[derive(Debug, Default, Clone)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);
    }

    /// Take the oldest complete line, terminator included.
    pub fn next_line(&mut self) -> Option<Vec<u8>> {
        let end = self.pending.iter().position(|byte| *byte == b'\n')?;
        Some(self.pending.drain(..=end).collect())
    }

    /// Bytes received that are not yet part of a complete line.
    pub fn partial(&self) -> &[u8] {
        &self.pending
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}
