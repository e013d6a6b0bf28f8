use std::io::{self, Read, Write};
use std::time::{Duration, Instant};

use serialport::SerialPort;
use tracing::debug;

use crate::config::LinkConfig;
use crate::error::{HarnessError, HarnessResult};
use crate::link::{LineBuffer, Link};

/// Hardware link over a serial port.
pub struct SerialLink {
    config: LinkConfig,
    port: Option<Box<dyn SerialPort>>,
    buffer: LineBuffer,
}

impl SerialLink {
    pub fn new(config: LinkConfig) -> Self {
        Self {
            config,
            port: None,
            buffer: LineBuffer::new(),
        }
    }

    /// Wrap a port that is already open, e.g. one end of a pseudo-terminal pair.
    pub fn from_port(config: LinkConfig, port: Box<dyn SerialPort>) -> Self {
        Self {
            config,
            port: Some(port),
            buffer: LineBuffer::new(),
        }
    }

    fn read_line_within(&mut self, timeout: Duration) -> HarnessResult<Option<Vec<u8>>> {
        let port = self.port.as_mut().ok_or(HarnessError::NotOpen)?;
        let start = Instant::now();
        let mut chunk = [0u8; 256];

        loop {
            if let Some(line) = self.buffer.next_line() {
                return Ok(Some(line));
            }

            let remaining = timeout.saturating_sub(start.elapsed());
            if remaining.is_zero() {
                return Ok(None);
            }
            port.set_timeout(remaining)
                .map_err(|err| HarnessError::Io(err.into()))?;

            match port.read(&mut chunk) {
                Ok(0) => return Ok(None),
                Ok(n) => self.buffer.extend(&chunk[..n]),
                Err(err) if err.kind() == io::ErrorKind::TimedOut => return Ok(None),
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Put the port back on the configured timeout, which serialport shares
    /// between reads and writes.
    fn restore_timeout(&mut self) -> HarnessResult<()> {
        let timeout = self.config.timeout;
        match self.port.as_mut() {
            Some(port) if port.timeout() != timeout => port
                .set_timeout(timeout)
                .map_err(|err| HarnessError::Io(err.into())),
            _ => Ok(()),
        }
    }
}

impl Link for SerialLink {
    fn open(&mut self) -> HarnessResult<()> {
        if self.port.is_some() {
            return Ok(());
        }
        let port = serialport::new(&self.config.endpoint, self.config.baud_rate)
            .timeout(self.config.timeout)
            .open()
            .map_err(|err| HarnessError::connection(&self.config.endpoint, err))?;
        debug!(
            endpoint = %self.config.endpoint,
            baud = self.config.baud_rate,
            "serial port opened"
        );
        self.buffer.clear();
        self.port = Some(port);
        Ok(())
    }

    fn close(&mut self) {
        if self.port.take().is_some() {
            debug!(endpoint = %self.config.endpoint, "serial port closed");
        }
        self.buffer.clear();
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn write(&mut self, bytes: &[u8]) -> HarnessResult<()> {
        self.restore_timeout()?;
        let port = self.port.as_mut().ok_or(HarnessError::NotOpen)?;
        let result = port.write_all(bytes).and_then(|_| port.flush());
        match result {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::TimedOut => {
                Err(HarnessError::WriteTimeout(self.config.timeout))
            }
            Err(err) => Err(err.into()),
        }
    }

    fn read_line(&mut self, timeout: Duration) -> HarnessResult<Option<Vec<u8>>> {
        let line = self.read_line_within(timeout);
        let restored = self.restore_timeout();
        let line = line?;
        restored?;
        Ok(line)
    }
}
