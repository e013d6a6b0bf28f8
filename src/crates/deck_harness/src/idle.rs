use std::time::Duration;

use tracing::info;

use crate::clock::Clock;
use crate::error::{HarnessError, HarnessResult};
use crate::link::Link;
use crate::protocol::{extract_status_line, Command, StatusLine};
use crate::session::Session;

/// Polls `STATUS:<channel>` until the channel reports `STATE=IDLE`.
#[derive(Debug, Clone)]
pub struct IdleWaiter {
    poll_interval: Duration,
    report_interval: Duration,
}

impl IdleWaiter {
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            poll_interval,
            report_interval: Duration::from_secs(2),
        }
    }

    /// Minimum spacing between progress lines logged while the channel is busy.
    pub fn with_report_interval(mut self, interval: Duration) -> Self {
        self.report_interval = interval;
        self
    }

    /// Block until the channel is idle or `timeout` elapses.
    ///
    /// Returns the status line that carried the idle token. A poll with no
    /// status line in its reply counts as "no status yet". The loop only gives
    /// up once the deadline, sampled from the session's clock at entry, has
    /// passed.
    pub fn wait<L: Link, C: Clock>(
        &self,
        session: &mut Session<L, C>,
        channel: u8,
        timeout: Duration,
    ) -> HarnessResult<StatusLine> {
        let deadline = session.clock().now() + timeout;
        let mut next_report = session.clock().now();

        while session.clock().now() < deadline {
            let reply = session.send_quiet(Command::Status(channel))?;
            if let Some(status) = extract_status_line(&reply) {
                if status.is_idle() {
                    info!("[status] {status}");
                    return Ok(status);
                }
                let now = session.clock().now();
                if now >= next_report {
                    info!("[status] {status}");
                    next_report = now + self.report_interval;
                }
            }
            session.clock().sleep(self.poll_interval);
        }

        Err(HarnessError::Timeout { channel, timeout })
    }
}

impl Default for IdleWaiter {
    fn default() -> Self {
        Self::new(Duration::from_millis(200))
    }
}

/// Wait for idle using the default poll and report intervals.
pub fn wait_for_idle<L: Link, C: Clock>(
    session: &mut Session<L, C>,
    channel: u8,
    timeout: Duration,
) -> HarnessResult<StatusLine> {
    IdleWaiter::default().wait(session, channel, timeout)
}
