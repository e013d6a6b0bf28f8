use std::time::Duration;

use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::SessionConfig;
use crate::error::{HarnessError, HarnessResult};
use crate::link::Link;
use crate::protocol::{Command, ResponseLine};

/// Exclusive owner of a [`Link`] that turns line I/O into command exchanges.
///
/// Exchanges are synchronous and self-contained: a command is written, then
/// lines are collected until the device goes quiet or the exchange deadline
/// passes. The link is closed exactly once, either by [`Session::close`] or
/// when the session is dropped.
pub struct Session<L: Link, C: Clock = SystemClock> {
    link: L,
    clock: C,
    config: SessionConfig,
    open: bool,
}

impl<L: Link> Session<L, SystemClock> {
    /// Open a session on `link` using wall-clock time.
    pub fn connect(link: L, config: SessionConfig) -> HarnessResult<Self> {
        Session::connect_with_clock(link, SystemClock::new(), config)
    }
}

impl<L: Link, C: Clock> Session<L, C> {
    /// Build an unopened session with an explicit clock.
    pub fn with_clock(link: L, clock: C, config: SessionConfig) -> Self {
        Self {
            link,
            clock,
            config,
            open: false,
        }
    }

    /// Build and open a session. Boot chatter is drained before this returns.
    pub fn connect_with_clock(link: L, clock: C, config: SessionConfig) -> HarnessResult<Self> {
        let mut session = Session::with_clock(link, clock, config);
        session.open()?;
        Ok(session)
    }

    /// Acquire the link and drain any unsolicited startup lines.
    pub fn open(&mut self) -> HarnessResult<()> {
        if self.open {
            return Ok(());
        }
        self.link.open()?;
        self.open = true;

        if !self.config.settle_delay.is_zero() {
            self.clock.sleep(self.config.settle_delay);
        }
        let drained = self.drain_boot_messages()?;
        debug!(drained, "boot drain finished");
        Ok(())
    }

    /// Release the link. Safe to call more than once.
    pub fn close(&mut self) {
        if self.open {
            self.open = false;
            self.link.close();
        }
    }

    /// True while the session holds an open link.
    pub fn is_open(&self) -> bool {
        self.open && self.link.is_open()
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Issue a typed command and echo the exchange to the log.
    pub fn send(&mut self, command: Command) -> HarnessResult<Vec<ResponseLine>> {
        self.send_command(&command.to_string(), false)
    }

    /// Issue a typed command without echoing it, for high-rate polling.
    pub fn send_quiet(&mut self, command: Command) -> HarnessResult<Vec<ResponseLine>> {
        self.send_command(&command.to_string(), true)
    }

    /// Write one command line and collect the device's reply burst.
    ///
    /// Collection stops when a read comes back empty after at least one line
    /// arrived, when a leading `CTRL:` line is all there is and the deadline
    /// is within `ctrl_margin`, or when the exchange timeout runs out. An
    /// empty result means the device stayed silent; callers decide whether
    /// that matters.
    pub fn send_command(&mut self, command: &str, quiet: bool) -> HarnessResult<Vec<ResponseLine>> {
        if !self.open {
            return Err(HarnessError::NotOpen);
        }
        let command = command.trim();
        self.link.write(format!("{command}\n").as_bytes())?;

        let mut lines: Vec<ResponseLine> = Vec::new();
        let deadline = self.clock.now() + self.config.timeout;
        loop {
            let now = self.clock.now();
            if now >= deadline {
                break;
            }
            let Some(raw) = self.link.read_line(deadline - now)? else {
                if !lines.is_empty() {
                    break;
                }
                continue;
            };
            if let Some(line) = ResponseLine::decode(&raw) {
                lines.push(line);
            }
            let leading_ctrl = lines.first().map(ResponseLine::is_ctrl).unwrap_or(false);
            if leading_ctrl && self.clock.now() + self.config.ctrl_margin > deadline {
                break;
            }
        }

        if !quiet {
            info!("> {command}");
            for line in &lines {
                info!("< {line}");
            }
        }
        for line in lines.iter().filter(|line| line.is_rejection()) {
            warn!(command, response = %line, "device rejected command");
        }
        Ok(lines)
    }

    fn drain_boot_messages(&mut self) -> HarnessResult<usize> {
        let deadline = self.clock.now() + self.config.boot_grace;
        let mut drained = 0;
        loop {
            let now = self.clock.now();
            if now >= deadline {
                break;
            }
            let budget: Duration = self.config.timeout.min(deadline - now);
            match self.link.read_line(budget)? {
                Some(raw) => {
                    if let Some(line) = ResponseLine::decode(&raw) {
                        info!("[boot] {line}");
                        drained += 1;
                    }
                }
                None => break,
            }
        }
        Ok(drained)
    }
}

impl<L: Link, C: Clock> Drop for Session<L, C> {
    fn drop(&mut self) {
        self.close();
    }
}
